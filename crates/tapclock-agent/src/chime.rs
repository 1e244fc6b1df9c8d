//! Success chime.
//!
//! Playing the chime is fire-and-forget: [`Chime::play`] returns at once,
//! nothing awaits the sound, and a failing player is only logged.

use std::process::Stdio;
use std::sync::Arc;

use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::ChimeConfig;

/// Audible confirmation of a completed card write.
pub trait Chime: Send + Sync {
    /// Start the chime without waiting for it to finish.
    fn play(&self);
}

/// A chime that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentChime;

impl Chime for SilentChime {
    fn play(&self) {}
}

/// Runs an external audio player in a detached task.
#[derive(Debug, Clone)]
pub struct CommandChime {
    program: String,
    args: Vec<String>,
}

impl CommandChime {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl CommandChime {
    /// Start the player in a detached task. The handle resolves to whether
    /// the player ran and exited successfully.
    fn spawn(&self) -> JoinHandle<bool> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        let program = self.program.clone();

        tokio::spawn(async move {
            match command.status().await {
                Ok(status) if status.success() => {
                    debug!(program = %program, "Chime played");
                    true
                }
                Ok(status) => {
                    warn!(program = %program, %status, "Chime player failed");
                    false
                }
                Err(e) => {
                    warn!(program = %program, error = %e, "Chime player could not be started");
                    false
                }
            }
        })
    }
}

impl Chime for CommandChime {
    fn play(&self) {
        drop(self.spawn());
    }
}

impl ChimeConfig {
    /// Build the configured chime, silent when no player is set.
    pub fn build(&self) -> Arc<dyn Chime> {
        match &self.command {
            Some(program) => Arc::new(CommandChime::new(program.clone(), self.args.clone())),
            None => Arc::new(SilentChime),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_missing_player_is_absorbed() {
        let chime = CommandChime::new("/nonexistent/tapclock-player", Vec::new());

        chime.play();
        assert!(!chime.spawn().await.unwrap());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_player_exit_status() {
        assert!(CommandChime::new("true", Vec::new()).spawn().await.unwrap());
        assert!(!CommandChime::new("false", Vec::new()).spawn().await.unwrap());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_play_does_not_wait_for_player() {
        let chime = CommandChime::new("sleep", vec!["5".to_string()]);

        tokio::time::timeout(Duration::from_millis(100), async { chime.play() })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_silent_by_default() {
        let chime = ChimeConfig::default().build();
        chime.play();
    }
}
