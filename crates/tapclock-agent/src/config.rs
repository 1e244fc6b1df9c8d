//! Agent timings and success chime configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tapclock_core::constants::{
    DEFAULT_ERROR_BACKOFF_MS, DEFAULT_POLL_INTERVAL_MS, DEFAULT_PROGRAM_DEADLINE_MS,
    DEFAULT_PROGRAM_LOCK_MS, DEFAULT_READER_BACKOFF_MS, DEFAULT_STAMP_COOLDOWN_MS,
};

/// Loop timings, in milliseconds.
///
/// Every field has a default, so a partial TOML table is valid:
///
/// ```
/// use std::time::Duration;
/// use tapclock_agent::AgentConfig;
///
/// let config: AgentConfig = toml::from_str("stamp_cooldown_ms = 30000").unwrap();
/// assert_eq!(config.stamp_cooldown(), Duration::from_secs(30));
/// assert_eq!(config.poll_interval(), Duration::from_secs(1));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Wait between presence polls while nothing happens.
    pub poll_interval_ms: u64,
    /// Wait after finding no reader attached.
    pub reader_backoff_ms: u64,
    /// Wait after a reader, card or state failure.
    pub error_backoff_ms: u64,
    pub stamp_cooldown_ms: u64,
    pub program_lock_ms: u64,
    /// How long a program directive waits for a card.
    pub program_deadline_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            reader_backoff_ms: DEFAULT_READER_BACKOFF_MS,
            error_backoff_ms: DEFAULT_ERROR_BACKOFF_MS,
            stamp_cooldown_ms: DEFAULT_STAMP_COOLDOWN_MS,
            program_lock_ms: DEFAULT_PROGRAM_LOCK_MS,
            program_deadline_ms: DEFAULT_PROGRAM_DEADLINE_MS,
        }
    }
}

impl AgentConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn reader_backoff(&self) -> Duration {
        Duration::from_millis(self.reader_backoff_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    pub fn stamp_cooldown(&self) -> Duration {
        Duration::from_millis(self.stamp_cooldown_ms)
    }

    pub fn program_lock(&self) -> Duration {
        Duration::from_millis(self.program_lock_ms)
    }

    pub fn program_deadline(&self) -> Duration {
        Duration::from_millis(self.program_deadline_ms)
    }
}

/// External player used for the success chime.
///
/// With no `command` the agent stays silent.
///
/// ```toml
/// [chime]
/// command = "mpg123"
/// args = ["-q", "/usr/share/tapclock/stamp.mp3"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChimeConfig {
    pub command: Option<String>,
    pub args: Vec<String>,
}
