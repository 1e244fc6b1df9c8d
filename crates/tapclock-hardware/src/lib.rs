//! Reader and card access for the tapclock agent.
//!
//! This crate owns everything that touches the contactless reader:
//!
//! - [`traits`]: the driver seam ([`ReaderDriver`], [`CardChannel`])
//! - [`link`]: connect, authenticate, read or write one block, disconnect
//! - [`auth`]: ordered key candidates for reads and the primary/fallback
//!   pair for writes
//! - [`presence`]: non-blocking "is a card in the field" polling
//! - [`mock`]: an emulated reader and MIFARE Classic card for tests
//! - `pcsc_reader` (feature `hardware-pcsc`): the PC/SC driver for real readers
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tapclock_core::constants::TARGET_BLOCK;
//! use tapclock_hardware::{CardLink, KeyRing};
//! use tapclock_hardware::mock::{MockCard, MockReader};
//! use tapclock_protocol::decode_payload;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> tapclock_hardware::Result<()> {
//!     let (reader, handle) = MockReader::new();
//!     handle.insert_card(MockCard::with_payload("alice I"));
//!
//!     let link = CardLink::new(Arc::new(reader), KeyRing::default());
//!     let block = link.read_block(TARGET_BLOCK).await?;
//!     assert_eq!(decode_payload(&block).identity, "alice");
//!     Ok(())
//! }
//! ```
//!
//! # Async Traits
//!
//! The driver traits use native `async fn` (Edition 2024 RPITIT) and are
//! therefore used as generic parameters rather than trait objects.

pub mod auth;
pub mod error;
pub mod link;
pub mod mock;
#[cfg(feature = "hardware-pcsc")]
pub mod pcsc_reader;
pub mod presence;
pub mod traits;

pub use auth::KeyRing;
pub use error::{HardwareError, Result};
pub use link::{CardHandle, CardLink};
pub use presence::{Presence, PresencePoller};
pub use traits::{CardChannel, ReaderDriver};

#[cfg(feature = "hardware-pcsc")]
pub use pcsc_reader::{PcscChannel, PcscReader};
