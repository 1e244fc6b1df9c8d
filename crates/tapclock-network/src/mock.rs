//! In-memory backend for testing without a server.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{
    command::PendingCommand,
    error::{NetworkError, Result},
    traits::{CommandQueue, PunchService},
};

#[derive(Debug, Default)]
struct MockState {
    punch_response: Option<String>,
    punches: Vec<String>,
    pending: Option<PendingCommand>,
    fetch_count: usize,
    fetch_unreachable: bool,
    updates: Vec<(i64, String)>,
}

/// Scriptable stand-in for [`HttpBackend`](crate::HttpBackend).
///
/// Clones share state, so a test keeps one clone to script responses and
/// inspect the calls the agent made through another.
///
/// A queued command keeps being returned by every fetch until it is
/// cleared, as a real queue would redeliver it.
///
/// # Examples
///
/// ```
/// use tapclock_network::mock::MockBackend;
/// use tapclock_network::PunchService;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let backend = MockBackend::new().with_punch_response("Work Start 08:00");
///     let text = backend.punch("alice").await.unwrap();
///     assert!(text.contains("Work Start"));
///     assert_eq!(backend.punches(), vec!["alice"]);
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    /// A backend answering every punch with an empty body and holding no
    /// command.
    pub fn new() -> Self {
        let backend = Self::default();
        backend.lock().punch_response = Some(String::new());
        backend
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_punch_response(self, text: impl Into<String>) -> Self {
        self.set_punch_response(text);
        self
    }

    /// Answer subsequent punches with `text`.
    pub fn set_punch_response(&self, text: impl Into<String>) {
        self.lock().punch_response = Some(text.into());
    }

    /// Make subsequent punches fail as if the server were down.
    pub fn fail_punches(&self) {
        self.lock().punch_response = None;
    }

    /// Make subsequent fetches fail as if the server were down.
    pub fn fail_fetches(&self, unreachable: bool) {
        self.lock().fetch_unreachable = unreachable;
    }

    /// Place a directive in the queue.
    pub fn queue_command(&self, command: PendingCommand) {
        self.lock().pending = Some(command);
    }

    /// Empty the queue.
    pub fn clear_command(&self) {
        self.lock().pending = None;
    }

    /// Identities punched so far, in order.
    pub fn punches(&self) -> Vec<String> {
        self.lock().punches.clone()
    }

    /// Fetches performed so far.
    pub fn fetch_count(&self) -> usize {
        self.lock().fetch_count
    }

    /// Status updates sent so far, in order.
    pub fn updates(&self) -> Vec<(i64, String)> {
        self.lock().updates.clone()
    }
}

impl PunchService for MockBackend {
    async fn punch(&self, identity: &str) -> Result<String> {
        let mut state = self.lock();
        state.punches.push(identity.to_string());
        state
            .punch_response
            .clone()
            .ok_or_else(|| NetworkError::Transport {
                operation: "punch",
                message: "connection refused".into(),
            })
    }
}

impl CommandQueue for MockBackend {
    async fn fetch_pending_command(&self) -> Result<Option<PendingCommand>> {
        let mut state = self.lock();
        state.fetch_count += 1;
        if state.fetch_unreachable {
            return Err(NetworkError::Transport {
                operation: "command fetch",
                message: "connection refused".into(),
            });
        }
        Ok(state.pending.clone())
    }

    async fn update_command_status(&self, id: i64, status: &str) -> Result<()> {
        self.lock().updates.push((id, status.to_string()));
        Ok(())
    }
}
