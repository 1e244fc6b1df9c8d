//! Mock PC/SC reader with an emulated MIFARE Classic 1K card.
//!
//! The mock interprets the same pseudo-APDUs a real contactless reader
//! accepts (load key, authenticate, read binary, update binary) and answers
//! with the status words a real card would. Every connection is counted so
//! tests can assert that no connection outlives its operation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tapclock_core::{
    CardPayload,
    constants::{
        BLOCK_SIZE, BLOCKS_PER_SECTOR, CLA_READER, INS_AUTHENTICATE, INS_LOAD_KEY,
        INS_READ_BINARY, INS_UPDATE_BINARY, KEY_FACTORY_DEFAULT, KEY_SIZE, KEY_TYPE_A,
        KEY_TYPE_B, PAYLOAD_PAD, SW_NOT_SUPPORTED, SW_OPERATION_FAILED,
        SW_SECURITY_NOT_SATISFIED, SW_WRONG_LENGTH, SW_WRONG_PARAMETERS, TARGET_BLOCK,
    },
};
use tapclock_protocol::{ResponseFrame, StatusWord, decode_payload};

use crate::{
    HardwareError, Result,
    traits::{CardChannel, ReaderDriver},
};

/// Default name reported by [`MockReader::new`].
pub const MOCK_READER_NAME: &str = "Mock ACR122U PICC Interface 00 00";

const SECTORS: usize = 16;
const BLOCKS: usize = SECTORS * BLOCKS_PER_SECTOR as usize;
const KEY_SLOTS: usize = 2;

/// An emulated MIFARE Classic 1K card.
///
/// Every sector starts with the factory key `FFFFFFFFFFFF` as both key A and
/// key B, and every data block starts zeroed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCard {
    blocks: [[u8; BLOCK_SIZE]; BLOCKS],
    sector_keys: [([u8; KEY_SIZE], [u8; KEY_SIZE]); SECTORS],
}

impl MockCard {
    /// A factory-fresh card.
    pub fn blank() -> Self {
        Self {
            blocks: [[0u8; BLOCK_SIZE]; BLOCKS],
            sector_keys: [(KEY_FACTORY_DEFAULT, KEY_FACTORY_DEFAULT); SECTORS],
        }
    }

    /// A card whose identity block holds `text`, space padded and truncated
    /// to 16 bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// use tapclock_hardware::mock::MockCard;
    ///
    /// let card = MockCard::with_payload("alice I");
    /// assert_eq!(card.payload().identity, "alice");
    /// ```
    pub fn with_payload(text: &str) -> Self {
        let mut block = [PAYLOAD_PAD; BLOCK_SIZE];
        for (slot, byte) in block.iter_mut().zip(text.bytes()) {
            *slot = byte;
        }
        Self::blank().with_block(TARGET_BLOCK, block)
    }

    /// Replace the content of one block.
    pub fn with_block(mut self, block: u8, data: [u8; BLOCK_SIZE]) -> Self {
        if let Some(slot) = self.blocks.get_mut(block as usize) {
            *slot = data;
        }
        self
    }

    /// Replace key A and key B of one sector.
    pub fn with_sector_keys(mut self, sector: u8, key_a: [u8; KEY_SIZE], key_b: [u8; KEY_SIZE]) -> Self {
        if let Some(keys) = self.sector_keys.get_mut(sector as usize) {
            *keys = (key_a, key_b);
        }
        self
    }

    /// Raw content of one block.
    pub fn block(&self, block: u8) -> Option<[u8; BLOCK_SIZE]> {
        self.blocks.get(block as usize).copied()
    }

    /// Decoded identity block.
    pub fn payload(&self) -> CardPayload {
        decode_payload(&tapclock_core::Block::new(self.blocks[TARGET_BLOCK as usize]))
    }

    fn key(&self, sector: usize, key_type: u8) -> Option<[u8; KEY_SIZE]> {
        let (key_a, key_b) = self.sector_keys.get(sector)?;
        match key_type {
            KEY_TYPE_A => Some(*key_a),
            KEY_TYPE_B => Some(*key_b),
            _ => None,
        }
    }
}

impl Default for MockCard {
    fn default() -> Self {
        Self::blank()
    }
}

#[derive(Debug)]
struct MockState {
    readers: Vec<String>,
    card: Option<MockCard>,
    /// Bumped every time a card enters or leaves the field.
    generation: u64,
    open_connections: usize,
    connection_count: usize,
    transmitted: Vec<Vec<u8>>,
    write_count: usize,
    reject_key_loads: bool,
    reject_writes: bool,
    remove_after: Option<usize>,
    /// Per-key status words answered to a key load.
    key_load_status: HashMap<[u8; KEY_SIZE], u16>,
    /// Per-key status words answered to an authentication.
    auth_status: HashMap<[u8; KEY_SIZE], u16>,
    truncate_reads: Option<usize>,
}

impl MockState {
    fn new(reader: String) -> Self {
        Self {
            readers: vec![reader],
            card: None,
            generation: 0,
            open_connections: 0,
            connection_count: 0,
            transmitted: Vec::new(),
            write_count: 0,
            reject_key_loads: false,
            reject_writes: false,
            remove_after: None,
            key_load_status: HashMap::new(),
            auth_status: HashMap::new(),
            truncate_reads: None,
        }
    }

    fn remove_card(&mut self) {
        if self.card.take().is_some() {
            self.generation += 1;
        }
    }
}

type SharedState = Arc<Mutex<MockState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock reader driver.
///
/// # Examples
///
/// ```
/// use tapclock_hardware::mock::{MockCard, MockReader};
/// use tapclock_hardware::traits::ReaderDriver;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> tapclock_hardware::Result<()> {
///     let (reader, handle) = MockReader::new();
///     let name = reader.list_readers().await?.remove(0);
///     assert!(!reader.is_card_present(&name).await?);
///
///     handle.insert_card(MockCard::with_payload("alice I"));
///     assert!(reader.is_card_present(&name).await?);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MockReader {
    state: SharedState,
}

impl MockReader {
    /// Create a mock with one attached reader and an empty field.
    pub fn new() -> (Self, MockReaderHandle) {
        Self::with_name(MOCK_READER_NAME)
    }

    /// Create a mock whose single reader has a custom name.
    pub fn with_name(name: impl Into<String>) -> (Self, MockReaderHandle) {
        let state = Arc::new(Mutex::new(MockState::new(name.into())));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockReaderHandle { state },
        )
    }
}

impl ReaderDriver for MockReader {
    type Channel = MockChannel;

    async fn list_readers(&self) -> Result<Vec<String>> {
        Ok(lock(&self.state).readers.clone())
    }

    async fn is_card_present(&self, reader: &str) -> Result<bool> {
        let state = lock(&self.state);
        if !state.readers.iter().any(|r| r == reader) {
            return Err(HardwareError::communication(format!(
                "Reader {reader} not attached"
            )));
        }
        Ok(state.card.is_some())
    }

    async fn connect(&self, reader: &str) -> Result<MockChannel> {
        let mut state = lock(&self.state);
        if !state.readers.iter().any(|r| r == reader) {
            return Err(HardwareError::connection(format!(
                "Reader {reader} not attached"
            )));
        }
        if state.card.is_none() {
            return Err(HardwareError::no_card(reader));
        }

        state.open_connections += 1;
        state.connection_count += 1;

        Ok(MockChannel {
            state: Arc::clone(&self.state),
            generation: state.generation,
            slots: [None; KEY_SLOTS],
            authenticated: None,
        })
    }
}

/// An open connection to the mock card.
///
/// Dropping a channel without calling
/// [`disconnect`](CardChannel::disconnect) leaves it counted as open.
#[derive(Debug)]
pub struct MockChannel {
    state: SharedState,
    generation: u64,
    slots: [Option<[u8; KEY_SIZE]>; KEY_SLOTS],
    authenticated: Option<usize>,
}

impl MockChannel {
    fn respond(&mut self, state: &mut MockState, frame: &[u8]) -> ResponseFrame {
        let status = |sw: u16| ResponseFrame::new(Vec::new(), StatusWord::new(sw));

        if frame.len() < 5 || frame[0] != CLA_READER {
            return status(SW_NOT_SUPPORTED);
        }

        match frame[1] {
            INS_LOAD_KEY => {
                let slot = frame[3] as usize;
                if frame.len() != 5 + KEY_SIZE {
                    return status(SW_WRONG_LENGTH);
                }
                if slot >= KEY_SLOTS {
                    return status(SW_WRONG_PARAMETERS);
                }
                if state.reject_key_loads {
                    return status(SW_OPERATION_FAILED);
                }
                let mut key = [0u8; KEY_SIZE];
                key.copy_from_slice(&frame[5..]);
                if let Some(&sw) = state.key_load_status.get(&key) {
                    return status(sw);
                }
                self.slots[slot] = Some(key);
                ResponseFrame::new(Vec::new(), StatusWord::SUCCESS)
            }
            INS_AUTHENTICATE => {
                if frame.len() != 10 {
                    return status(SW_WRONG_LENGTH);
                }
                let (block, key_type, slot) = (frame[7] as usize, frame[8], frame[9] as usize);
                let sector = block / BLOCKS_PER_SECTOR as usize;
                let loaded = self.slots.get(slot).copied().flatten();
                let expected = state.card.as_ref().and_then(|card| card.key(sector, key_type));

                self.authenticated = None;
                if let Some(sw) = loaded.and_then(|key| state.auth_status.get(&key).copied()) {
                    return status(sw);
                }
                match (loaded, expected) {
                    (Some(loaded), Some(expected)) if loaded == expected => {
                        self.authenticated = Some(sector);
                        ResponseFrame::new(Vec::new(), StatusWord::SUCCESS)
                    }
                    _ => status(SW_OPERATION_FAILED),
                }
            }
            INS_READ_BINARY => {
                let block = frame[3] as usize;
                if self.authenticated != Some(block / BLOCKS_PER_SECTOR as usize) {
                    return status(SW_SECURITY_NOT_SATISFIED);
                }
                match state.card.as_ref().and_then(|card| card.blocks.get(block)) {
                    Some(data) => {
                        let len = state.truncate_reads.unwrap_or(BLOCK_SIZE).min(BLOCK_SIZE);
                        ResponseFrame::new(data[..len].to_vec(), StatusWord::SUCCESS)
                    }
                    None => status(SW_WRONG_PARAMETERS),
                }
            }
            INS_UPDATE_BINARY => {
                let block = frame[3] as usize;
                if frame.len() != 5 + BLOCK_SIZE {
                    return status(SW_WRONG_LENGTH);
                }
                if self.authenticated != Some(block / BLOCKS_PER_SECTOR as usize) {
                    return status(SW_SECURITY_NOT_SATISFIED);
                }
                if state.reject_writes {
                    return status(SW_OPERATION_FAILED);
                }
                match state.card.as_mut().and_then(|card| card.blocks.get_mut(block)) {
                    Some(data) => {
                        data.copy_from_slice(&frame[5..]);
                        state.write_count += 1;
                        ResponseFrame::new(Vec::new(), StatusWord::SUCCESS)
                    }
                    None => status(SW_WRONG_PARAMETERS),
                }
            }
            _ => status(SW_NOT_SUPPORTED),
        }
    }
}

impl CardChannel for MockChannel {
    async fn transmit(&mut self, frame: &[u8]) -> Result<Vec<u8>> {
        let state_ref = Arc::clone(&self.state);
        let mut state = lock(&state_ref);
        state.transmitted.push(frame.to_vec());

        match state.remove_after {
            Some(0) => {
                state.remove_after = None;
                state.remove_card();
            }
            Some(n) => state.remove_after = Some(n - 1),
            None => {}
        }

        if state.readers.is_empty() {
            return Err(HardwareError::communication("Reader unplugged"));
        }
        if state.card.is_none() || state.generation != self.generation {
            return Err(HardwareError::communication("Card removed from field"));
        }

        Ok(self.respond(&mut state, frame).to_vec())
    }

    async fn disconnect(self) -> Result<()> {
        let mut state = lock(&self.state);
        state.open_connections = state.open_connections.saturating_sub(1);
        Ok(())
    }
}

/// Handle for controlling a mock reader from a test.
#[derive(Debug, Clone)]
pub struct MockReaderHandle {
    state: SharedState,
}

impl MockReaderHandle {
    /// Place a card in the field, replacing any card already there.
    pub fn insert_card(&self, card: MockCard) {
        let mut state = lock(&self.state);
        state.card = Some(card);
        state.generation += 1;
    }

    /// Take the card out of the field and return it.
    pub fn remove_card(&self) -> Option<MockCard> {
        let mut state = lock(&self.state);
        let card = state.card.clone();
        state.remove_card();
        card
    }

    /// Let `count` more frames through, then pull the card out of the field.
    pub fn remove_card_after_transmits(&self, count: usize) {
        lock(&self.state).remove_after = Some(count);
    }

    /// Returns `true` if a card is in the field.
    pub fn has_card(&self) -> bool {
        lock(&self.state).card.is_some()
    }

    /// Attach a reader after the existing ones.
    pub fn plug_reader(&self, name: impl Into<String>) {
        lock(&self.state).readers.push(name.into());
    }

    /// Detach every reader.
    pub fn unplug_reader(&self) {
        lock(&self.state).readers.clear();
    }

    /// Make the reader refuse every key load.
    pub fn reject_key_loads(&self, reject: bool) {
        lock(&self.state).reject_key_loads = reject;
    }

    /// Make the card refuse every block write.
    pub fn reject_writes(&self, reject: bool) {
        lock(&self.state).reject_writes = reject;
    }

    /// Answer `sw` whenever `key` is loaded, instead of storing it.
    pub fn reject_key_load_of(&self, key: [u8; KEY_SIZE], sw: u16) {
        lock(&self.state).key_load_status.insert(key, sw);
    }

    /// Answer `sw` to every authentication attempted with `key` loaded.
    pub fn reject_auth_with(&self, key: [u8; KEY_SIZE], sw: u16) {
        lock(&self.state).auth_status.insert(key, sw);
    }

    /// Return only the first `len` bytes of every block read, with a
    /// success status word. `None` restores full reads.
    pub fn truncate_reads(&self, len: Option<usize>) {
        lock(&self.state).truncate_reads = len;
    }

    /// Connections opened and not yet disconnected.
    pub fn open_connections(&self) -> usize {
        lock(&self.state).open_connections
    }

    /// Connections opened so far.
    pub fn connection_count(&self) -> usize {
        lock(&self.state).connection_count
    }

    /// Successful block writes so far.
    pub fn write_count(&self) -> usize {
        lock(&self.state).write_count
    }

    /// Every frame transmitted so far.
    pub fn transmitted(&self) -> Vec<Vec<u8>> {
        lock(&self.state).transmitted.clone()
    }

    /// Instruction byte of every frame transmitted so far.
    pub fn transmitted_instructions(&self) -> Vec<u8> {
        lock(&self.state)
            .transmitted
            .iter()
            .filter_map(|frame| frame.get(1).copied())
            .collect()
    }

    /// Raw content of one block of the card in the field.
    pub fn block(&self, block: u8) -> Option<[u8; BLOCK_SIZE]> {
        lock(&self.state).card.as_ref()?.block(block)
    }

    /// Decoded identity block of the card in the field.
    pub fn card_payload(&self) -> Option<CardPayload> {
        lock(&self.state).card.as_ref().map(MockCard::payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tapclock_core::{Block, KeyType, constants::KEY_MAD_PUBLIC};
    use tapclock_protocol::CommandFrame;

    async fn exchange(channel: &mut MockChannel, frame: CommandFrame) -> ResponseFrame {
        let raw = channel.transmit(frame.as_bytes()).await.unwrap();
        ResponseFrame::parse(&raw).unwrap()
    }

    #[tokio::test]
    async fn test_read_requires_authentication() {
        let (reader, handle) = MockReader::new();
        handle.insert_card(MockCard::with_payload("alice I"));

        let mut channel = reader.connect(MOCK_READER_NAME).await.unwrap();
        let response = exchange(&mut channel, CommandFrame::read_binary(TARGET_BLOCK)).await;
        assert_eq!(response.status(), StatusWord::new(SW_SECURITY_NOT_SATISFIED));

        let response = exchange(&mut channel, CommandFrame::load_key(0, &KEY_FACTORY_DEFAULT)).await;
        assert!(response.is_success());
        let response = exchange(&mut channel, CommandFrame::authenticate(TARGET_BLOCK, 0, KeyType::A)).await;
        assert!(response.is_success());
        let response = exchange(&mut channel, CommandFrame::read_binary(TARGET_BLOCK)).await;
        assert_eq!(response.block().unwrap(), Block::new(*b"alice I         "));

        channel.disconnect().await.unwrap();
        assert_eq!(handle.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_load_key_rejects_unknown_slot() {
        let (reader, handle) = MockReader::new();
        handle.insert_card(MockCard::blank());

        let mut channel = reader.connect(MOCK_READER_NAME).await.unwrap();
        let response = exchange(&mut channel, CommandFrame::load_key(5, &KEY_FACTORY_DEFAULT)).await;
        assert_eq!(response.status(), StatusWord::new(SW_WRONG_PARAMETERS));
        channel.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_wrong_key_fails_authentication() {
        let (reader, handle) = MockReader::new();
        handle.insert_card(MockCard::blank());

        let mut channel = reader.connect(MOCK_READER_NAME).await.unwrap();
        exchange(&mut channel, CommandFrame::load_key(0, &KEY_MAD_PUBLIC)).await;
        let response = exchange(&mut channel, CommandFrame::authenticate(TARGET_BLOCK, 0, KeyType::A)).await;
        assert_eq!(response.status(), StatusWord::new(SW_OPERATION_FAILED));
        channel.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_truncated_read_keeps_success_status() {
        let (reader, handle) = MockReader::new();
        handle.insert_card(MockCard::with_payload("alice I"));
        handle.truncate_reads(Some(4));

        let mut channel = reader.connect(MOCK_READER_NAME).await.unwrap();
        exchange(&mut channel, CommandFrame::load_key(0, &KEY_FACTORY_DEFAULT)).await;
        exchange(&mut channel, CommandFrame::authenticate(TARGET_BLOCK, 0, KeyType::A)).await;
        let response = exchange(&mut channel, CommandFrame::read_binary(TARGET_BLOCK)).await;

        assert!(response.is_success());
        assert_eq!(response.data(), b"alic");
        assert!(response.block().is_err());
        channel.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_per_key_status_words() {
        let (reader, handle) = MockReader::new();
        handle.insert_card(MockCard::blank());
        handle.reject_key_load_of(KEY_MAD_PUBLIC, 0x6300);
        handle.reject_auth_with(KEY_FACTORY_DEFAULT, 0x6982);

        let mut channel = reader.connect(MOCK_READER_NAME).await.unwrap();
        let response = exchange(&mut channel, CommandFrame::load_key(0, &KEY_MAD_PUBLIC)).await;
        assert_eq!(response.status(), StatusWord::new(0x6300));

        exchange(&mut channel, CommandFrame::load_key(0, &KEY_FACTORY_DEFAULT)).await;
        let response = exchange(&mut channel, CommandFrame::authenticate(TARGET_BLOCK, 0, KeyType::A)).await;
        assert_eq!(response.status(), StatusWord::new(0x6982));
        channel.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_leaked_channel_stays_open() {
        let (reader, handle) = MockReader::new();
        handle.insert_card(MockCard::blank());

        let channel = reader.connect(MOCK_READER_NAME).await.unwrap();
        drop(channel);
        assert_eq!(handle.open_connections(), 1);
    }

    #[tokio::test]
    async fn test_reinserted_card_invalidates_channel() {
        let (reader, handle) = MockReader::new();
        handle.insert_card(MockCard::blank());

        let mut channel = reader.connect(MOCK_READER_NAME).await.unwrap();
        let card = handle.remove_card().unwrap();
        handle.insert_card(card);

        let err = channel
            .transmit(CommandFrame::read_binary(TARGET_BLOCK).as_bytes())
            .await
            .unwrap_err();
        assert!(matches!(err, HardwareError::CommunicationError { .. }));
        channel.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_unplugged_reader_is_not_listed() {
        let (reader, handle) = MockReader::new();
        handle.unplug_reader();
        assert!(reader.list_readers().await.unwrap().is_empty());

        handle.plug_reader("Second Reader");
        assert_eq!(reader.list_readers().await.unwrap(), vec!["Second Reader"]);
    }
}
