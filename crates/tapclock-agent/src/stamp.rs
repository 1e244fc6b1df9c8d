//! Stamp orchestrator: one presented card, one punch.
//!
//! ```text
//! read block 1 ──► decode identity ──► ledger check ──► punch ──► classify
//!                                                                    │
//!              ledger.record_cooldown ◄── write "<identity> <status>" ◄┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use tapclock_core::{StatusCode, constants::TARGET_BLOCK};
use tapclock_hardware::{CardLink, HardwareError, ReaderDriver};
use tapclock_network::PunchService;
use tapclock_protocol::{decode_payload, encode_payload, hex_encode};
use tracing::{debug, error, info, warn};

use crate::{
    chime::Chime,
    ledger::{Clearance, LockLedger},
    state_machine::AgentState,
};

/// Result of handling one presented card.
#[derive(Debug)]
pub enum StampOutcome {
    /// The punch was sent and the new status written back.
    Stamped { identity: String, status: StatusCode },
    /// The card carries no identity, or its identity block is malformed.
    Blank,
    /// The identity is locked or cooling down; nothing was sent or written.
    Blocked {
        identity: String,
        clearance: Clearance,
    },
    /// The identity block could not be read.
    ReadFailed(HardwareError),
    /// The punch was sent but the status could not be written back.
    WriteFailed {
        identity: String,
        status: StatusCode,
        error: HardwareError,
    },
}

impl StampOutcome {
    /// State the agent moves to after this outcome.
    ///
    /// A card that has been punched or found blank is not processed again
    /// until it leaves the field. A blocked or unreadable card is evaluated
    /// afresh on the next tick.
    pub fn next_state(&self) -> AgentState {
        match self {
            Self::Stamped { .. } | Self::Blank | Self::WriteFailed { .. } => {
                AgentState::AwaitingRemoval
            }
            Self::Blocked { .. } | Self::ReadFailed(_) => AgentState::Idle,
        }
    }

    /// Returns `true` if a reader or card failure occurred.
    pub fn is_failure(&self) -> bool {
        match self {
            Self::ReadFailed(error) => !error.is_absence(),
            Self::WriteFailed { .. } => true,
            _ => false,
        }
    }
}

/// Reads, punches and rewrites a presented card.
pub struct StampOrchestrator<D, P> {
    link: CardLink<D>,
    punch: Arc<P>,
    chime: Arc<dyn Chime>,
    cooldown: Duration,
}

impl<D: ReaderDriver, P: PunchService> StampOrchestrator<D, P> {
    pub fn new(link: CardLink<D>, punch: Arc<P>, chime: Arc<dyn Chime>, cooldown: Duration) -> Self {
        Self {
            link,
            punch,
            chime,
            cooldown,
        }
    }

    /// Handle the card currently in the field.
    ///
    /// The cooldown is recorded once a punch has been attempted, whether the
    /// punch or the write-back succeeded or not.
    pub async fn stamp(&self, ledger: &mut LockLedger) -> StampOutcome {
        let block = match self.link.read_block(TARGET_BLOCK).await {
            Ok(block) => block,
            Err(HardwareError::Protocol(e)) => {
                warn!(error = %e, "Identity block is malformed, skipping card");
                return StampOutcome::Blank;
            }
            Err(e) => {
                if e.is_absence() {
                    debug!(error = %e, "Card left before it could be read");
                } else {
                    error!(error = %e, sw = ?e.status_word(), "Failed to read identity block");
                }
                return StampOutcome::ReadFailed(e);
            }
        };

        let payload = decode_payload(&block);
        debug!(hex = %hex_encode(block.as_bytes()), identity = %payload.identity, "Identity block read");

        if payload.is_blank() {
            info!("No identity on card, skipping");
            return StampOutcome::Blank;
        }
        let identity = payload.identity;

        let clearance = ledger.check(&identity);
        match clearance {
            Clearance::Clear => {}
            Clearance::Locked { remaining } => {
                info!(identity = %identity, remaining_secs = remaining.as_secs(), "Stamping locked after programming");
                return StampOutcome::Blocked { identity, clearance };
            }
            Clearance::CoolingDown { remaining } => {
                info!(identity = %identity, remaining_secs = remaining.as_secs(), "Stamp cooldown active");
                return StampOutcome::Blocked { identity, clearance };
            }
        }

        let response = match self.punch.punch(&identity).await {
            Ok(text) => text,
            Err(e) => {
                warn!(identity = %identity, error = %e, "Punch failed, writing unknown status");
                String::new()
            }
        };
        let status = StatusCode::classify(&response);
        info!(identity = %identity, %status, "Punch classified");

        let data = encode_payload(&identity, status.as_str());
        let written = self.link.write_block(TARGET_BLOCK, &data).await;
        ledger.record_cooldown(&identity, self.cooldown);

        match written {
            Ok(key) => {
                info!(identity = %identity, %status, %key, "Card updated");
                self.chime.play();
                StampOutcome::Stamped { identity, status }
            }
            Err(error) => {
                error!(identity = %identity, %status, error = %error, sw = ?error.status_word(), "Failed to write status to card");
                StampOutcome::WriteFailed {
                    identity,
                    status,
                    error,
                }
            }
        }
    }
}
