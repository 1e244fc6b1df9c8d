//! Card link: one physical exchange against one card.
//!
//! A [`CardLink`] opens a fresh connection for every operation and always
//! closes it again, on success and on every failure branch. No session is
//! kept between polling iterations, and nothing here retries: retry policy
//! belongs to the callers.
//!
//! ```text
//! CardLink::read_block
//!     connect ──► load key ──► authenticate ──► read ──► disconnect
//!                 └──── KeyRing::authenticate_for_read ───┘
//!
//! CardLink::write_block (per write candidate, fresh connection each)
//!     connect ──► load key ──► authenticate ──► write ──► disconnect
//! ```

use std::sync::Arc;

use tapclock_core::{Block, KeyCandidate, KeyType};
use tapclock_protocol::{CommandFrame, ResponseFrame};
use tracing::{debug, trace, warn};

use crate::auth::KeyRing;
use crate::error::{HardwareError, Result};
use crate::traits::{CardChannel, ReaderDriver};

/// Connection to the card in the field of the first attached reader.
pub struct CardLink<D> {
    driver: Arc<D>,
    keys: KeyRing,
}

impl<D> Clone for CardLink<D> {
    fn clone(&self) -> Self {
        Self {
            driver: Arc::clone(&self.driver),
            keys: self.keys.clone(),
        }
    }
}

impl<D: ReaderDriver> CardLink<D> {
    /// Create a link over `driver` using `keys` for authentication.
    pub fn new(driver: Arc<D>, keys: KeyRing) -> Self {
        Self { driver, keys }
    }

    /// Key candidates used by this link.
    pub fn keys(&self) -> &KeyRing {
        &self.keys
    }

    /// Name of the reader operations will target (always the first one).
    ///
    /// # Errors
    ///
    /// Returns `NoReaderAvailable` if no reader is attached.
    pub async fn first_reader(&self) -> Result<String> {
        self.driver
            .list_readers()
            .await?
            .into_iter()
            .next()
            .ok_or(HardwareError::NoReaderAvailable)
    }

    /// Open a connection to the card on the first reader.
    ///
    /// Every successful `connect` must be paired with
    /// [`CardHandle::disconnect`].
    pub async fn connect(&self) -> Result<CardHandle<D::Channel>> {
        let reader = self.first_reader().await?;
        let channel = self.driver.connect(&reader).await?;
        debug!(reader = %reader, "Connected to card");
        Ok(CardHandle { channel, reader })
    }

    /// Read one block using the read key candidates.
    pub async fn read_block(&self, block: u8) -> Result<Block> {
        let mut handle = self.connect().await?;
        let result = async {
            let candidate = self.keys.authenticate_for_read(&mut handle, block).await?;
            trace!(block, %candidate, "Authenticated for read");
            handle.read_block(block).await
        }
        .await;
        handle.disconnect().await;
        result
    }

    /// Write one block using the primary write key, falling back to the
    /// secondary key on any failure.
    ///
    /// Returns the candidate that succeeded. When both fail, the fallback's
    /// error is returned.
    pub async fn write_block(&self, block: u8, data: &Block) -> Result<KeyCandidate> {
        let (candidate, ()) = self
            .keys
            .authenticate_for_write(move |candidate| self.write_with_key(block, data, candidate))
            .await?;
        debug!(block, %candidate, "Block written");
        Ok(candidate)
    }

    async fn write_with_key(&self, block: u8, data: &Block, candidate: KeyCandidate) -> Result<()> {
        let mut handle = self.connect().await?;
        let result = async {
            KeyRing::authenticate_with(&mut handle, block, &candidate).await?;
            handle.write_block(block, data).await
        }
        .await;
        handle.disconnect().await;
        result
    }
}

/// An open connection to a card, valid for one operation.
#[derive(Debug)]
pub struct CardHandle<C> {
    channel: C,
    reader: String,
}

impl<C: CardChannel> CardHandle<C> {
    /// Reader the card sits on.
    pub fn reader(&self) -> &str {
        &self.reader
    }

    async fn exchange(&mut self, frame: &CommandFrame) -> Result<ResponseFrame> {
        trace!(?frame, "Transmit");
        let raw = self.channel.transmit(frame.as_bytes()).await?;
        let response = ResponseFrame::parse(&raw)?;
        trace!(status = %response.status(), len = response.data().len(), "Response");
        Ok(response)
    }

    /// Load a key into a volatile reader slot.
    ///
    /// # Errors
    ///
    /// Returns `KeyLoadRejected` for any status word other than `9000`.
    pub async fn load_key(&mut self, slot: u8, key: &[u8; 6]) -> Result<()> {
        let response = self.exchange(&CommandFrame::load_key(slot, key)).await?;
        if response.is_success() {
            Ok(())
        } else {
            Err(HardwareError::KeyLoadRejected {
                slot,
                status: response.status(),
            })
        }
    }

    /// Authenticate `block` with the key loaded in `slot`.
    ///
    /// # Errors
    ///
    /// Returns `AuthRejected` for any status word other than `9000`.
    pub async fn authenticate(&mut self, block: u8, slot: u8, key_type: KeyType) -> Result<()> {
        let response = self
            .exchange(&CommandFrame::authenticate(block, slot, key_type))
            .await?;
        if response.is_success() {
            Ok(())
        } else {
            Err(HardwareError::AuthRejected {
                block,
                status: response.status(),
            })
        }
    }

    /// Read the 16 bytes of an authenticated block.
    ///
    /// # Errors
    ///
    /// Returns `ReadRejected` for any status word other than `9000`, and a
    /// protocol error if the card returned something other than 16 bytes.
    pub async fn read_block(&mut self, block: u8) -> Result<Block> {
        let response = self.exchange(&CommandFrame::read_binary(block)).await?;
        if !response.is_success() {
            return Err(HardwareError::ReadRejected {
                block,
                status: response.status(),
            });
        }
        Ok(response.block()?)
    }

    /// Write 16 bytes into an authenticated block.
    ///
    /// # Errors
    ///
    /// Returns `WriteRejected` for any status word other than `9000`.
    pub async fn write_block(&mut self, block: u8, data: &Block) -> Result<()> {
        let response = self
            .exchange(&CommandFrame::update_binary(block, data))
            .await?;
        if response.is_success() {
            Ok(())
        } else {
            Err(HardwareError::WriteRejected {
                block,
                status: response.status(),
            })
        }
    }

    /// Close the connection.
    ///
    /// A failing disconnect is logged and otherwise ignored: the operation's
    /// own result is what callers act on.
    pub async fn disconnect(self) {
        let reader = self.reader;
        if let Err(e) = self.channel.disconnect().await {
            warn!(reader = %reader, error = %e, "Disconnect failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockCard, MockReader};
    use rstest::rstest;
    use tapclock_core::constants::{KEY_FACTORY_DEFAULT, KEY_MAD_PUBLIC, TARGET_BLOCK};
    use tapclock_protocol::encode_payload;

    fn link(reader: MockReader) -> CardLink<MockReader> {
        CardLink::new(Arc::new(reader), KeyRing::default())
    }

    #[rstest]
    #[case::factory_key(KEY_FACTORY_DEFAULT, KEY_FACTORY_DEFAULT, Some("alice"))]
    #[case::second_read_key(KEY_MAD_PUBLIC, KEY_MAD_PUBLIC, Some("alice"))]
    #[case::unknown_keys([0x11; 6], [0x22; 6], None)]
    #[tokio::test]
    async fn test_read_block_key_selection(
        #[case] key_a: [u8; 6],
        #[case] key_b: [u8; 6],
        #[case] expected: Option<&str>,
    ) {
        let (reader, handle) = MockReader::new();
        handle.insert_card(MockCard::with_payload("alice I").with_sector_keys(0, key_a, key_b));

        let result = link(reader).read_block(TARGET_BLOCK).await;

        match expected {
            Some(identity) => {
                assert_eq!(result.unwrap(), encode_payload(identity, "I"));
            }
            None => {
                assert!(matches!(
                    result,
                    Err(HardwareError::AllKeysExhausted { attempted: 2, .. })
                ));
            }
        }
        assert_eq!(handle.connection_count(), 1);
        assert_eq!(handle.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_short_block_is_protocol_error() {
        let (reader, handle) = MockReader::new();
        handle.insert_card(MockCard::with_payload("alice I"));
        handle.truncate_reads(Some(4));

        let err = link(reader).read_block(TARGET_BLOCK).await.unwrap_err();
        assert!(matches!(err, HardwareError::Protocol(_)));
        assert_eq!(handle.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_connect_without_reader() {
        let (reader, handle) = MockReader::new();
        handle.unplug_reader();

        let err = link(reader).connect().await.unwrap_err();
        assert!(matches!(err, HardwareError::NoReaderAvailable));
    }

    #[tokio::test]
    async fn test_connect_without_card() {
        let (reader, _handle) = MockReader::new();

        let err = link(reader).read_block(TARGET_BLOCK).await.unwrap_err();
        assert!(matches!(err, HardwareError::NoCardPresent { .. }));
    }

    #[tokio::test]
    async fn test_write_block_with_primary_key() {
        let (reader, handle) = MockReader::new();
        handle.insert_card(MockCard::blank().with_sector_keys(0, KEY_MAD_PUBLIC, KEY_FACTORY_DEFAULT));

        let data = encode_payload("carol", "");
        let used = link(reader).write_block(TARGET_BLOCK, &data).await.unwrap();

        assert_eq!(used.key, KEY_MAD_PUBLIC);
        assert_eq!(handle.block(TARGET_BLOCK), Some(*data.as_bytes()));
        assert_eq!(handle.connection_count(), 1);
        assert_eq!(handle.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_write_block_falls_back_to_key_b() {
        let (reader, handle) = MockReader::new();
        handle.insert_card(MockCard::blank());

        let data = encode_payload("carol", "");
        let used = link(reader).write_block(TARGET_BLOCK, &data).await.unwrap();

        assert_eq!(used.key, KEY_FACTORY_DEFAULT);
        assert_eq!(used.key_type, KeyType::B);
        assert_eq!(handle.block(TARGET_BLOCK), Some(*data.as_bytes()));
        assert_eq!(handle.connection_count(), 2);
        assert_eq!(handle.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_write_block_reports_fallback_failure() {
        let (reader, handle) = MockReader::new();
        handle.insert_card(MockCard::blank().with_sector_keys(0, [0x11; 6], [0x22; 6]));

        let err = link(reader)
            .write_block(TARGET_BLOCK, &encode_payload("x", ""))
            .await
            .unwrap_err();

        assert!(matches!(err, HardwareError::AuthRejected { block: 1, .. }));
        assert_eq!(handle.connection_count(), 2);
        assert_eq!(handle.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_card_removed_mid_read_disconnects() {
        let (reader, handle) = MockReader::new();
        handle.insert_card(MockCard::with_payload("alice"));
        handle.remove_card_after_transmits(2);

        let err = link(reader).read_block(TARGET_BLOCK).await.unwrap_err();
        assert!(matches!(err, HardwareError::CommunicationError { .. }));
        assert_eq!(handle.open_connections(), 0);
    }
}
