//! The agent loop.
//!
//! One task drives everything. Each tick polls the command queue (unless a
//! directive is already being handled), checks card presence once and
//! routes to the stamp or program orchestrator. The tick returns how long to
//! wait before the next one; both the tick and the wait are raced against
//! the cancellation token.
//!
//! ```text
//!            card present                 stamped / blank
//!   Idle ─────────────────► StampProcessing ─────────────► AwaitingRemoval
//!    ▲ ▲  blocked / unreadable    │                              │
//!    │ └──────────────────────────┘          card removed        │
//!    │◄──────────────────────────────────────────────────────────┤
//!    │                                                           │ directive
//!    │ done / timed out                 field empty              ▼
//!   ProgramActive ◄──────────────────────────────────────── ProgramArmed
//! ```

use std::sync::Arc;
use std::time::Duration;

use tapclock_hardware::{CardLink, HardwareError, KeyRing, Presence, PresencePoller, ReaderDriver};
use tapclock_network::{CommandQueue, PunchService};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace, warn};

use crate::{
    chime::Chime,
    config::AgentConfig,
    dispatcher::{CommandDispatcher, ProgramDirective},
    error::{AgentError, Result},
    ledger::LockLedger,
    program::{ProgramOrchestrator, ProgramOutcome},
    stamp::StampOrchestrator,
    state_machine::{AgentState, StateMachine},
};

/// The card agent: presence polling, command dispatch and both
/// orchestrators, sharing one ledger and one state machine.
pub struct Agent<D, B> {
    config: AgentConfig,
    poller: PresencePoller<D>,
    stamp: StampOrchestrator<D, B>,
    program: ProgramOrchestrator<D, B>,
    backend: Arc<B>,
    dispatcher: CommandDispatcher,
    pending: Option<ProgramDirective>,
    machine: StateMachine,
    ledger: LockLedger,
}

impl<D, B> Agent<D, B>
where
    D: ReaderDriver,
    B: PunchService + CommandQueue,
{
    /// Create an agent using the default key candidates.
    pub fn new(driver: Arc<D>, backend: Arc<B>, chime: Arc<dyn Chime>, config: AgentConfig) -> Self {
        Self::with_key_ring(driver, backend, chime, config, KeyRing::default())
    }

    pub fn with_key_ring(
        driver: Arc<D>,
        backend: Arc<B>,
        chime: Arc<dyn Chime>,
        config: AgentConfig,
        keys: KeyRing,
    ) -> Self {
        let link = CardLink::new(Arc::clone(&driver), keys);
        let poller = PresencePoller::new(driver);

        Self {
            stamp: StampOrchestrator::new(
                link.clone(),
                Arc::clone(&backend),
                Arc::clone(&chime),
                config.stamp_cooldown(),
            ),
            program: ProgramOrchestrator::new(
                link,
                poller.clone(),
                Arc::clone(&backend),
                chime,
                &config,
            ),
            poller,
            backend,
            dispatcher: CommandDispatcher::new(),
            pending: None,
            machine: StateMachine::new(),
            ledger: LockLedger::new(),
            config,
        }
    }

    pub fn state(&self) -> AgentState {
        self.machine.current_state()
    }

    pub fn state_machine(&self) -> &StateMachine {
        &self.machine
    }

    pub fn ledger(&self) -> &LockLedger {
        &self.ledger
    }

    pub fn last_processed_id(&self) -> Option<i64> {
        self.dispatcher.last_processed_id()
    }

    /// Run until `cancel` fires.
    ///
    /// Reader, card and backend failures never end the loop; they are
    /// logged and followed by a backoff wait.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<()> {
        info!(
            poll_ms = self.config.poll_interval_ms,
            cooldown_ms = self.config.stamp_cooldown_ms,
            deadline_ms = self.config.program_deadline_ms,
            "Agent started"
        );

        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => None,
                result = self.tick() => Some(result),
            };
            let Some(result) = result else {
                break;
            };

            let wait = match result {
                Ok(wait) => wait,
                Err(e) => {
                    error!(
                        error = %e,
                        state = %self.state(),
                        recent = ?self.machine.last_transitions(3),
                        "Agent tick failed, resetting to Idle"
                    );
                    self.machine.reset();
                    self.pending = None;
                    self.config.error_backoff()
                }
            };

            if !wait.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = sleep(wait) => {}
                }
            }
        }

        info!(
            state = %self.state(),
            in_state_ms = self.machine.time_in_current_state().as_millis() as u64,
            "Agent stopped"
        );
        Ok(())
    }

    /// Run one loop iteration and return the wait before the next one.
    ///
    /// # Errors
    ///
    /// Returns an error only if the state machine rejects a transition.
    pub async fn tick(&mut self) -> Result<Duration> {
        if !self.state().is_programming() {
            if let Some(directive) = self.dispatcher.poll(self.backend.as_ref()).await {
                self.machine.transition_to(AgentState::ProgramArmed)?;
                self.pending = Some(directive);
            }
        }

        let presence = match self.poller.poll().await {
            Ok(presence) => presence,
            Err(HardwareError::NoReaderAvailable) => {
                warn!(
                    backoff_ms = self.config.reader_backoff_ms,
                    "No card reader found, waiting"
                );
                return Ok(self.config.reader_backoff());
            }
            Err(e) => {
                error!(error = %e, "Presence check failed");
                return Ok(self.config.error_backoff());
            }
        };

        match (self.state(), presence) {
            (AgentState::ProgramArmed, Presence::CardPresent) => {
                info!(
                    armed_secs = self.machine.time_in_current_state().as_secs(),
                    "Remove the card to start programming"
                );
                Ok(self.config.poll_interval())
            }
            (AgentState::ProgramArmed, Presence::CardAbsent) => self.run_program().await,
            (AgentState::Idle, Presence::CardPresent) => self.run_stamp().await,
            (AgentState::Idle, Presence::CardAbsent) => Ok(self.config.poll_interval()),
            (AgentState::AwaitingRemoval, Presence::CardPresent) => {
                trace!("Card already processed, waiting for removal");
                Ok(self.config.poll_interval())
            }
            (AgentState::AwaitingRemoval, Presence::CardAbsent) => {
                info!("Card removed, ready for the next one");
                self.machine.transition_to(AgentState::Idle)?;
                Ok(self.config.poll_interval())
            }
            (state @ (AgentState::StampProcessing | AgentState::ProgramActive), _) => {
                warn!(%state, "Interrupted operation left behind, resetting to Idle");
                self.machine.reset();
                self.pending = None;
                Ok(Duration::ZERO)
            }
        }
    }

    /// Program `text` onto the next presented card, outside the loop and
    /// with no directive to acknowledge.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::Cancelled` if `cancel` fires first.
    pub async fn program_once(
        &mut self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<ProgramOutcome> {
        self.machine.transition_to(AgentState::ProgramArmed)?;
        self.machine.transition_to(AgentState::ProgramActive)?;

        let outcome = tokio::select! {
            _ = cancel.cancelled() => None,
            outcome = self.program.program(text, None) => Some(outcome),
        };
        let Some(outcome) = outcome else {
            self.machine.reset();
            return Err(AgentError::Cancelled);
        };

        let directive = ProgramDirective {
            id: None,
            data: text.to_string(),
        };
        self.finish_program(&directive, outcome)?;
        Ok(outcome)
    }

    async fn run_stamp(&mut self) -> Result<Duration> {
        info!("Card detected, stamping");
        self.machine.transition_to(AgentState::StampProcessing)?;

        let outcome = self.stamp.stamp(&mut self.ledger).await;
        self.machine.transition_to(outcome.next_state())?;

        if outcome.is_failure() {
            Ok(self.config.error_backoff())
        } else {
            Ok(self.config.poll_interval())
        }
    }

    async fn run_program(&mut self) -> Result<Duration> {
        let Some(directive) = self.pending.take() else {
            warn!("Armed without a directive, resetting to Idle");
            self.machine.reset();
            return Ok(Duration::ZERO);
        };

        self.machine.transition_to(AgentState::ProgramActive)?;
        let outcome = self.program.program(&directive.data, directive.id).await;
        self.finish_program(&directive, outcome)?;

        Ok(Duration::ZERO)
    }

    fn finish_program(&mut self, directive: &ProgramDirective, outcome: ProgramOutcome) -> Result<()> {
        let identity = directive.data.trim();
        self.ledger.record_lock(identity, self.config.program_lock());
        self.dispatcher.mark_processed(directive.id);
        self.machine.transition_to(AgentState::Idle)?;

        info!(
            identity,
            command_id = ?directive.id,
            ?outcome,
            lock_ms = self.config.program_lock_ms,
            "Programming finished"
        );
        Ok(())
    }
}
