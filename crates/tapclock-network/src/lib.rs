//! Time-tracking backend collaborators for the tapclock agent.
//!
//! This crate provides the two remote operations the agent depends on,
//! behind traits so the agent can be tested without a server:
//!
//! - [`PunchService`]: exchange an identity for a punch decision text
//! - [`CommandQueue`]: fetch programming directives and acknowledge them
//!
//! [`HttpBackend`] implements both over HTTPS with per-request timeouts;
//! [`mock::MockBackend`] implements both in memory.
//!
//! # Example
//!
//! ```no_run
//! use tapclock_network::{BackendConfig, CommandQueue, HttpBackend};
//!
//! # async fn example() -> tapclock_network::Result<()> {
//! let backend = HttpBackend::new(BackendConfig::default())?;
//! if let Some(command) = backend.fetch_pending_command().await? {
//!     println!("pending: {command:?}");
//! }
//! # Ok(())
//! # }
//! ```

mod client;
pub mod command;
pub mod config;
pub mod error;
pub mod mock;
pub mod traits;

pub use client::HttpBackend;
pub use command::PendingCommand;
pub use config::BackendConfig;
pub use error::{NetworkError, Result};
pub use traits::{CommandQueue, PunchService};
