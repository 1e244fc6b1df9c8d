//! `tapclock.toml` loading.
//!
//! ```toml
//! [agent]
//! stamp_cooldown_ms = 30000
//!
//! [backend]
//! punch_url = "https://clock.example.com/api/timetracking/punch"
//! command_url = "https://clock.example.com/api/nfc/command"
//!
//! [chime]
//! command = "aplay"
//! args = ["/usr/share/tapclock/success.wav"]
//! ```
//!
//! Every section and field is optional.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tapclock_agent::{AgentConfig, ChimeConfig};
use tapclock_network::BackendConfig;

/// Environment variable overriding `backend.agent_token`.
pub const TOKEN_ENV: &str = "TAPCLOCK_AGENT_TOKEN";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TapclockConfig {
    pub agent: AgentConfig,
    pub backend: BackendConfig,
    pub chime: ChimeConfig,
}

impl TapclockConfig {
    /// Load from `path` (defaults when `None`) and apply the token override
    /// from the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                Self::from_toml(&text)
                    .with_context(|| format!("Invalid config file {}", path.display()))?
            }
            None => Self::default(),
        };

        Ok(config.with_token_override(std::env::var(TOKEN_ENV).ok()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Replace the agent token when `token` is set and not empty.
    pub fn with_token_override(mut self, token: Option<String>) -> Self {
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            self.backend.agent_token = Some(token);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::time::Duration;

    #[test]
    fn test_empty_file_is_all_defaults() {
        assert_eq!(TapclockConfig::from_toml("").unwrap(), TapclockConfig::default());
    }

    #[test]
    fn test_partial_sections() {
        let config = TapclockConfig::from_toml(
            r#"
            [agent]
            stamp_cooldown_ms = 30000

            [backend]
            agent_token = "secret"

            [chime]
            command = "aplay"
            args = ["ok.wav"]
            "#,
        )
        .unwrap();

        assert_eq!(config.agent.stamp_cooldown(), Duration::from_secs(30));
        assert_eq!(config.agent.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.backend.agent_token.as_deref(), Some("secret"));
        assert_eq!(config.backend.fetch_timeout(), Duration::from_secs(3));
        assert_eq!(config.chime.command.as_deref(), Some("aplay"));
        assert_eq!(config.chime.args, vec!["ok.wav"]);
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        assert!(TapclockConfig::from_toml("[agent]\npoll_interval_ms = \"fast\"").is_err());
    }

    #[rstest]
    #[case(Some("from-env"), Some("from-env"))]
    #[case(Some("  "), Some("from-file"))]
    #[case(None, Some("from-file"))]
    fn test_token_override(#[case] env: Option<&str>, #[case] expected: Option<&str>) {
        let mut config = TapclockConfig::default();
        config.backend.agent_token = Some("from-file".into());

        let config = config.with_token_override(env.map(String::from));

        assert_eq!(config.backend.agent_token.as_deref(), expected);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = TapclockConfig::load(Some(Path::new("/nonexistent/tapclock.toml"))).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/tapclock.toml"));
    }
}
