//! HTTP implementation of the backend collaborators.
//!
//! ```text
//! punch   POST {punch_url}?username=<identity>          timeout 5s
//! fetch   GET  {command_url}                            timeout 3s
//! update  PUT  {command_url}/{id}?status=<status>       timeout 5s
//!              X-Agent-Token: <agent_token>
//! ```
//!
//! Like the reader layer, the client performs no retries. A failed call is
//! returned to the agent, which logs it and carries on with the next tick.

use reqwest::{Client, header::CONTENT_TYPE};
use tapclock_core::constants::{AGENT_TOKEN_HEADER, PUNCH_IDENTITY_PARAM};
use tracing::{debug, info, trace, warn};

use crate::{
    command::PendingCommand,
    config::BackendConfig,
    error::{NetworkError, Result},
    traits::{CommandQueue, PunchService},
};

/// Backend client over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    config: BackendConfig,
}

impl HttpBackend {
    /// Create a client for the configured endpoints.
    ///
    /// # Errors
    ///
    /// Returns `Transport` if the TLS backend cannot be initialised.
    pub fn new(config: BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| NetworkError::Transport {
                operation: "client setup",
                message: e.to_string(),
            })?;

        if config.agent_token.is_none() {
            warn!("No agent token configured, command status updates will be unauthenticated");
        }

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn command_url(&self, id: i64) -> String {
        format!("{}/{id}", self.config.command_url.trim_end_matches('/'))
    }
}

impl PunchService for HttpBackend {
    async fn punch(&self, identity: &str) -> Result<String> {
        const OP: &str = "punch";
        let identity = identity.trim();
        let timeout_ms = self.config.punch_timeout_ms;

        let response = self
            .client
            .post(&self.config.punch_url)
            .query(&[(PUNCH_IDENTITY_PARAM, identity)])
            .header(CONTENT_TYPE, "application/json; charset=UTF-8")
            .timeout(self.config.punch_timeout())
            .send()
            .await
            .map_err(|e| NetworkError::from_reqwest(OP, timeout_ms, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| NetworkError::from_reqwest(OP, timeout_ms, e))?;

        info!(identity, status = status.as_u16(), "Punch sent");
        trace!(body = %body, "Punch response body");
        Ok(body)
    }
}

impl CommandQueue for HttpBackend {
    async fn fetch_pending_command(&self) -> Result<Option<PendingCommand>> {
        const OP: &str = "command fetch";
        let timeout_ms = self.config.fetch_timeout_ms;

        let response = self
            .client
            .get(&self.config.command_url)
            .timeout(self.config.fetch_timeout())
            .send()
            .await
            .map_err(|e| NetworkError::from_reqwest(OP, timeout_ms, e))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            debug!(status = status.as_u16(), "No pending command");
            return Ok(None);
        }

        let body = response
            .text()
            .await
            .map_err(|e| NetworkError::from_reqwest(OP, timeout_ms, e))?;
        let body = body.trim();
        if body.is_empty() || body == "null" {
            return Ok(None);
        }

        serde_json::from_str(body)
            .map(Some)
            .map_err(|e| NetworkError::Decode {
                operation: OP,
                message: e.to_string(),
            })
    }

    async fn update_command_status(&self, id: i64, status: &str) -> Result<()> {
        const OP: &str = "command update";
        let timeout_ms = self.config.update_timeout_ms;

        let mut request = self
            .client
            .put(self.command_url(id))
            .query(&[("status", status)])
            .timeout(self.config.update_timeout());
        if let Some(token) = &self.config.agent_token {
            request = request.header(AGENT_TOKEN_HEADER, token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NetworkError::from_reqwest(OP, timeout_ms, e))?;

        let code = response.status();
        info!(command_id = id, status, http_status = code.as_u16(), "Command status updated");
        if !code.is_success() {
            return Err(NetworkError::Status {
                operation: OP,
                status: code.as_u16(),
            });
        }
        Ok(())
    }
}
