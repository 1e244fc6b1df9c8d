//! Program orchestrator: write a directive's text onto the next presented
//! card, within a deadline.

use std::sync::Arc;
use std::time::Duration;

use tapclock_core::{KeyCandidate, constants::{COMMAND_STATUS_DONE, TARGET_BLOCK}};
use tapclock_hardware::{CardLink, HardwareError, Presence, PresencePoller, ReaderDriver};
use tapclock_network::CommandQueue;
use tapclock_protocol::{encode_payload, hex_encode};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, warn};

use crate::{chime::Chime, config::AgentConfig, ledger::deadline_after};

/// How a programming attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramOutcome {
    /// The card was written with `key`.
    Written { key: KeyCandidate },
    /// No card could be programmed before the deadline.
    TimedOut,
}

#[derive(Debug, Clone, Copy)]
struct ProgramTimings {
    deadline: Duration,
    poll_interval: Duration,
    reader_backoff: Duration,
    error_backoff: Duration,
}

/// Waits for a card and programs it, acknowledging the directive either way.
pub struct ProgramOrchestrator<D, Q> {
    link: CardLink<D>,
    poller: PresencePoller<D>,
    queue: Arc<Q>,
    chime: Arc<dyn Chime>,
    timings: ProgramTimings,
}

impl<D: ReaderDriver, Q: CommandQueue> ProgramOrchestrator<D, Q> {
    pub fn new(
        link: CardLink<D>,
        poller: PresencePoller<D>,
        queue: Arc<Q>,
        chime: Arc<dyn Chime>,
        config: &AgentConfig,
    ) -> Self {
        Self {
            link,
            poller,
            queue,
            chime,
            timings: ProgramTimings {
                deadline: config.program_deadline(),
                poll_interval: config.poll_interval(),
                reader_backoff: config.reader_backoff(),
                error_backoff: config.error_backoff(),
            },
        }
    }

    /// Program `text` onto the next card presented before the deadline.
    ///
    /// The directive `command_id`, when present, is marked done on success
    /// and on timeout alike so the queue does not deliver it again. Write
    /// failures are retried after the error backoff until the deadline.
    pub async fn program(&self, text: &str, command_id: Option<i64>) -> ProgramOutcome {
        let block = encode_payload(text, "");
        let deadline = deadline_after(self.timings.deadline);
        info!(
            data = text,
            hex = %hex_encode(block.as_bytes()),
            ?command_id,
            deadline_secs = self.timings.deadline.as_secs(),
            "Waiting for a card to program"
        );

        loop {
            if Instant::now() >= deadline {
                warn!(?command_id, "No card programmed before the deadline");
                self.report_done(command_id).await;
                return ProgramOutcome::TimedOut;
            }

            let wait = match self.poller.poll().await {
                Err(HardwareError::NoReaderAvailable) => {
                    warn!("No card reader found");
                    self.timings.reader_backoff
                }
                Err(e) => {
                    error!(error = %e, "Presence check failed");
                    self.timings.error_backoff
                }
                Ok(Presence::CardAbsent) => {
                    debug!("Waiting for a card");
                    self.timings.poll_interval
                }
                Ok(Presence::CardPresent) => {
                    match self.link.write_block(TARGET_BLOCK, &block).await {
                        Ok(key) => {
                            info!(data = text, %key, "Card programmed");
                            self.report_done(command_id).await;
                            self.chime.play();
                            return ProgramOutcome::Written { key };
                        }
                        Err(e) => {
                            error!(error = %e, sw = ?e.status_word(), "Programming write failed");
                            self.timings.error_backoff
                        }
                    }
                }
            };

            sleep_until(deadline.min(deadline_after(wait))).await;
        }
    }

    async fn report_done(&self, command_id: Option<i64>) {
        let Some(id) = command_id else {
            return;
        };
        if let Err(e) = self.queue.update_command_status(id, COMMAND_STATUS_DONE).await {
            warn!(command_id = id, error = %e, "Failed to mark command done");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chime::SilentChime;
    use tapclock_hardware::KeyRing;
    use tapclock_hardware::mock::{MockCard, MockReader, MockReaderHandle};
    use tapclock_network::mock::MockBackend;

    fn orchestrator() -> (
        ProgramOrchestrator<MockReader, MockBackend>,
        MockReaderHandle,
        MockBackend,
    ) {
        let (driver, reader) = MockReader::new();
        let driver = Arc::new(driver);
        let backend = MockBackend::new();
        let orchestrator = ProgramOrchestrator::new(
            CardLink::new(Arc::clone(&driver), KeyRing::default()),
            PresencePoller::new(driver),
            Arc::new(backend.clone()),
            Arc::new(SilentChime),
            &AgentConfig::default(),
        );
        (orchestrator, reader, backend)
    }

    #[tokio::test(start_paused = true)]
    async fn test_programs_card_already_present() {
        let (orchestrator, reader, backend) = orchestrator();
        reader.insert_card(MockCard::blank());

        let start = Instant::now();
        let outcome = orchestrator.program("carol", Some(3)).await;

        assert!(matches!(outcome, ProgramOutcome::Written { .. }));
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(reader.card_payload().unwrap().identity, "carol");
        assert_eq!(backend.updates(), vec![(3, "done".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_without_card() {
        let (orchestrator, reader, backend) = orchestrator();

        let start = Instant::now();
        let outcome = orchestrator.program("carol", Some(4)).await;

        assert_eq!(outcome, ProgramOutcome::TimedOut);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        assert_eq!(backend.updates(), vec![(4, "done".to_string())]);
        assert_eq!(reader.connection_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_report_without_command_id() {
        let (orchestrator, reader, backend) = orchestrator();
        reader.insert_card(MockCard::blank());

        orchestrator.program("dave", None).await;

        assert!(backend.updates().is_empty());
        assert_eq!(reader.card_payload().unwrap().identity, "dave");
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_failures_retry_until_deadline() {
        let (orchestrator, reader, backend) = orchestrator();
        reader.insert_card(MockCard::blank());
        reader.reject_writes(true);

        let outcome = orchestrator.program("carol", Some(5)).await;

        assert_eq!(outcome, ProgramOutcome::TimedOut);
        // attempts at 0s, 3s, 6s and 9s, two connections each
        assert_eq!(reader.connection_count(), 8);
        assert_eq!(reader.open_connections(), 0);
        assert_eq!(backend.updates(), vec![(5, "done".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reader_backoff_when_unplugged() {
        let (orchestrator, reader, _backend) = orchestrator();
        reader.unplug_reader();

        let start = Instant::now();
        let outcome = orchestrator.program("carol", None).await;

        assert_eq!(outcome, ProgramOutcome::TimedOut);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_deadline_waits_for_card() {
        let (driver, reader) = MockReader::new();
        let driver = Arc::new(driver);
        let config = AgentConfig {
            program_deadline_ms: u64::MAX,
            ..AgentConfig::default()
        };
        let orchestrator = ProgramOrchestrator::new(
            CardLink::new(Arc::clone(&driver), KeyRing::default()),
            PresencePoller::new(driver),
            Arc::new(MockBackend::new()),
            Arc::new(SilentChime),
            &config,
        );

        let (outcome, ()) = tokio::join!(orchestrator.program("carol", None), async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            reader.insert_card(MockCard::blank());
        });

        assert!(matches!(outcome, ProgramOutcome::Written { .. }));
        assert_eq!(reader.card_payload().unwrap().identity, "carol");
    }
}
