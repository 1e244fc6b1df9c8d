//! Command dispatcher: turns queue polls into program directives, at most
//! once per command id.

use tapclock_network::CommandQueue;
use tracing::{debug, info, warn};

/// A program directive accepted for execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramDirective {
    pub id: Option<i64>,
    pub data: String,
}

/// Polls the command queue and filters out directives already handled.
///
/// The queue keeps returning a command until it is marked done, so the id
/// of the last handled directive is remembered and never acted on twice.
/// A directive without an id compares equal to "nothing handled yet".
#[derive(Debug, Default)]
pub struct CommandDispatcher {
    last_processed_id: Option<i64>,
}

impl CommandDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_processed_id(&self) -> Option<i64> {
        self.last_processed_id
    }

    /// Fetch the pending command, if it is a new program directive.
    ///
    /// Queue failures are logged and read as "no command".
    pub async fn poll<Q: CommandQueue>(&self, queue: &Q) -> Option<ProgramDirective> {
        let command = match queue.fetch_pending_command().await {
            Ok(Some(command)) => command,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Command queue unavailable");
                return None;
            }
        };

        if !command.is_program() {
            debug!(kind = %command.kind, "Ignoring non-program command");
            return None;
        }
        if command.id == self.last_processed_id {
            debug!(command_id = ?command.id, "Command already processed");
            return None;
        }

        info!(command_id = ?command.id, data = %command.data, "Program directive received");
        Some(ProgramDirective {
            id: command.id,
            data: command.data,
        })
    }

    /// Remember `id` as handled.
    pub fn mark_processed(&mut self, id: Option<i64>) {
        self.last_processed_id = id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tapclock_network::PendingCommand;
    use tapclock_network::mock::MockBackend;

    #[tokio::test]
    async fn test_new_directive_is_dispatched_once() {
        let backend = MockBackend::new();
        backend.queue_command(PendingCommand::program(Some(7), "carol"));
        let mut dispatcher = CommandDispatcher::new();

        let directive = dispatcher.poll(&backend).await.unwrap();
        assert_eq!(
            directive,
            ProgramDirective {
                id: Some(7),
                data: "carol".into()
            }
        );

        dispatcher.mark_processed(directive.id);
        assert_eq!(dispatcher.poll(&backend).await, None);
        assert_eq!(backend.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_next_id_is_dispatched() {
        let backend = MockBackend::new();
        let mut dispatcher = CommandDispatcher::new();
        dispatcher.mark_processed(Some(7));

        backend.queue_command(PendingCommand::program(Some(8), "dave"));
        assert!(dispatcher.poll(&backend).await.is_some());
    }

    #[tokio::test]
    async fn test_non_program_is_ignored() {
        let backend = MockBackend::new();
        backend.queue_command(PendingCommand {
            id: Some(1),
            kind: "ERASE".into(),
            data: String::new(),
        });

        assert_eq!(CommandDispatcher::new().poll(&backend).await, None);
    }

    #[tokio::test]
    async fn test_lowercase_program_is_accepted() {
        let backend = MockBackend::new();
        backend.queue_command(PendingCommand {
            id: Some(2),
            kind: "program".into(),
            data: "erin".into(),
        });

        assert!(CommandDispatcher::new().poll(&backend).await.is_some());
    }

    #[tokio::test]
    async fn test_command_without_id_before_any_processed() {
        let backend = MockBackend::new();
        backend.queue_command(PendingCommand::program(None, "frank"));
        let mut dispatcher = CommandDispatcher::new();

        assert_eq!(dispatcher.poll(&backend).await, None);

        dispatcher.mark_processed(Some(3));
        let directive = dispatcher.poll(&backend).await.unwrap();
        assert_eq!(directive.id, None);
    }

    #[tokio::test]
    async fn test_unreachable_queue_is_no_command() {
        let backend = MockBackend::new();
        backend.queue_command(PendingCommand::program(Some(1), "carol"));
        backend.fail_fetches(true);

        assert_eq!(CommandDispatcher::new().poll(&backend).await, None);
    }
}
