//! Backend endpoints, credentials and timeouts.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tapclock_core::constants::{
    DEFAULT_COMMAND_URL, DEFAULT_FETCH_TIMEOUT_MS, DEFAULT_PUNCH_TIMEOUT_MS, DEFAULT_PUNCH_URL,
    DEFAULT_UPDATE_TIMEOUT_MS,
};

/// Configuration for [`HttpBackend`](crate::HttpBackend).
///
/// Every field has a default, so a partial TOML table is valid:
///
/// ```
/// use tapclock_network::BackendConfig;
///
/// let config: BackendConfig = toml::from_str(r#"
///     agent_token = "secret"
///     fetch_timeout_ms = 1500
/// "#).unwrap();
///
/// assert_eq!(config.fetch_timeout().as_millis(), 1500);
/// assert_eq!(config.punch_timeout().as_secs(), 5);
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Punch endpoint, called with `POST ?username=<identity>`.
    pub punch_url: String,

    /// Command queue endpoint; updates go to `<command_url>/<id>`.
    pub command_url: String,

    /// Token sent with command status updates.
    pub agent_token: Option<String>,

    pub punch_timeout_ms: u64,
    pub fetch_timeout_ms: u64,
    pub update_timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            punch_url: DEFAULT_PUNCH_URL.to_string(),
            command_url: DEFAULT_COMMAND_URL.to_string(),
            agent_token: None,
            punch_timeout_ms: DEFAULT_PUNCH_TIMEOUT_MS,
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            update_timeout_ms: DEFAULT_UPDATE_TIMEOUT_MS,
        }
    }
}

impl BackendConfig {
    pub fn punch_timeout(&self) -> Duration {
        Duration::from_millis(self.punch_timeout_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn update_timeout(&self) -> Duration {
        Duration::from_millis(self.update_timeout_ms)
    }

    /// Point both endpoints at `base`, keeping the default paths.
    ///
    /// Mostly useful for tests against a local server.
    pub fn with_base_url(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.punch_url = format!("{base}/api/timetracking/punch");
        self.command_url = format!("{base}/api/nfc/command");
        self
    }
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("punch_url", &self.punch_url)
            .field("command_url", &self.command_url)
            .field(
                "agent_token",
                &self.agent_token.as_ref().map(|_| "<redacted>"),
            )
            .field("punch_timeout_ms", &self.punch_timeout_ms)
            .field("fetch_timeout_ms", &self.fetch_timeout_ms)
            .field("update_timeout_ms", &self.update_timeout_ms)
            .finish()
    }
}
