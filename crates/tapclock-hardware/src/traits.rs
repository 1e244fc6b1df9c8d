//! Reader driver trait definitions.
//!
//! These traits are the seam between the agent and the reader driver layer
//! (PC/SC on real hardware, [`MockReader`](crate::mock::MockReader) in tests).
//! The agent only needs to list readers, ask whether a card is in the field,
//! open a connection and exchange raw frames over it.
//!
//! All traits use native `async fn` methods (Rust 1.90 + Edition 2024 RPITIT),
//! eliminating the need for the `async_trait` macro.

#![allow(async_fn_in_trait)]

use crate::error::Result;

/// Reader enumeration and connection.
///
/// # Object Safety
///
/// Like the other async traits in this crate, `ReaderDriver` is not
/// object-safe. Use it as a generic parameter:
///
/// ```no_run
/// use tapclock_hardware::traits::ReaderDriver;
/// use tapclock_hardware::Result;
///
/// async fn first_reader<D: ReaderDriver>(driver: &D) -> Result<Option<String>> {
///     Ok(driver.list_readers().await?.into_iter().next())
/// }
/// ```
pub trait ReaderDriver: Send + Sync {
    /// Connection type returned by [`connect`](ReaderDriver::connect).
    type Channel: CardChannel;

    /// List attached readers in driver order.
    ///
    /// An empty list means no reader is attached; it is not an error.
    async fn list_readers(&self) -> Result<Vec<String>>;

    /// Check whether a card is currently in the field of `reader`.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader disappeared or the driver failed.
    async fn is_card_present(&self, reader: &str) -> Result<bool>;

    /// Open a connection to the card in the field of `reader`.
    ///
    /// # Errors
    ///
    /// Returns `NoCardPresent` when the field is empty and `ConnectionError`
    /// for any other failure.
    async fn connect(&self, reader: &str) -> Result<Self::Channel>;
}

/// An open connection to one card.
pub trait CardChannel: Send {
    /// Send one raw command frame and return the raw response, status word
    /// included.
    ///
    /// # Errors
    ///
    /// Returns `CommunicationError` if the exchange itself failed (card
    /// removed, reader unplugged). A refusal by the card is not an error at
    /// this level; it comes back as a non-`9000` status word.
    async fn transmit(&mut self, frame: &[u8]) -> Result<Vec<u8>>;

    /// Close the connection, leaving the card powered in the field.
    async fn disconnect(self) -> Result<()>
    where
        Self: Sized;
}
