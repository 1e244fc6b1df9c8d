//! Card agent for the tapclock time clock.
//!
//! The agent watches a contactless reader. A presented card is read, its
//! identity punched against the time-tracking backend, and the resulting
//! status written back onto the card. On a `PROGRAM` directive from the
//! backend's command queue, the next presented card is programmed with a new
//! identity instead.
//!
//! # Components
//!
//! - [`Agent`]: the single-task loop tying everything together
//! - [`StampOrchestrator`]: read, punch, write back
//! - [`ProgramOrchestrator`]: wait for a card and program it, with a deadline
//! - [`CommandDispatcher`]: at-most-once handling of queued directives
//! - [`LockLedger`]: per-identity cooldowns and post-programming locks
//! - [`StateMachine`]: validated [`AgentState`] transitions
//! - [`Chime`]: fire-and-forget success sound
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tapclock_agent::{Agent, AgentConfig, SilentChime};
//! use tapclock_hardware::mock::MockReader;
//! use tapclock_network::{BackendConfig, HttpBackend};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (reader, _handle) = MockReader::new();
//! let backend = HttpBackend::new(BackendConfig::default())?;
//! let mut agent = Agent::new(
//!     Arc::new(reader),
//!     Arc::new(backend),
//!     Arc::new(SilentChime),
//!     AgentConfig::default(),
//! );
//!
//! agent.run(CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod chime;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod ledger;
pub mod program;
pub mod stamp;
pub mod state_machine;

pub use agent::Agent;
pub use chime::{Chime, CommandChime, SilentChime};
pub use config::{AgentConfig, ChimeConfig};
pub use dispatcher::{CommandDispatcher, ProgramDirective};
pub use error::{AgentError, Result};
pub use ledger::{Clearance, LockLedger};
pub use program::{ProgramOrchestrator, ProgramOutcome};
pub use stamp::{StampOrchestrator, StampOutcome};
pub use state_machine::{AgentState, StateMachine, StateTransition};
