//! Backend collaborator traits.
//!
//! The agent talks to the time-tracking service through two narrow seams:
//! punching an identity, and the programming command queue. Both use native
//! `async fn` and are consumed as generic parameters.

#![allow(async_fn_in_trait)]

use crate::{command::PendingCommand, error::Result};

/// Records a clock-in or clock-out for an identity.
pub trait PunchService: Send + Sync {
    /// Send a punch for `identity` and return the backend's response text.
    ///
    /// The text is returned whatever the HTTP status; callers classify it.
    ///
    /// # Errors
    ///
    /// Returns an error only if no response was received at all.
    async fn punch(&self, identity: &str) -> Result<String>;
}

/// Remote queue of card programming directives.
pub trait CommandQueue: Send + Sync {
    /// Fetch the currently pending directive, if any.
    async fn fetch_pending_command(&self) -> Result<Option<PendingCommand>>;

    /// Mark directive `id` with `status`.
    async fn update_command_status(&self, id: i64, status: &str) -> Result<()>;
}
