//! Agent error type.
//!
//! Hardware and network failures are normally absorbed by the orchestrators
//! and turned into a backoff wait. What reaches this type is either a broken
//! state machine invariant or the loop being cancelled.

use tapclock_hardware::HardwareError;
use tapclock_network::NetworkError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Core(#[from] tapclock_core::Error),

    #[error("Reader failure: {0}")]
    Hardware(#[from] HardwareError),

    #[error("Backend failure: {0}")]
    Network(#[from] NetworkError),

    /// The cancellation token fired.
    #[error("Agent cancelled")]
    Cancelled,
}
