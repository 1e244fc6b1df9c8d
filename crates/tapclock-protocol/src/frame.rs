use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;
use tapclock_core::{Block, Error, KeyCandidate, KeyType, Result, constants::*};

/// Command frame sent to the reader.
///
/// Frames are reader pseudo-APDUs (`CLA = 0xFF`) that the reader firmware
/// translates into MIFARE Classic operations on the card in its field.
///
/// # Wire Format
///
/// ```text
/// FF 82 00 00 06 A0 A1 A2 A3 A4 A5        load key A0A1A2A3A4A5 into slot 0
/// FF 86 00 00 05 01 00 01 60 00           authenticate block 1 with key A from slot 0
/// FF B0 00 01 10                          read 16 bytes of block 1
/// FF D6 00 01 10 <16 bytes>               write block 1
/// ```
///
/// # Basic Usage
///
/// ```
/// use tapclock_protocol::CommandFrame;
/// use tapclock_core::KeyType;
///
/// let frame = CommandFrame::authenticate(1, 0, KeyType::A);
/// assert_eq!(
///     frame.as_bytes(),
///     &[0xFF, 0x86, 0x00, 0x00, 0x05, 0x01, 0x00, 0x01, 0x60, 0x00]
/// );
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct CommandFrame {
    data: Bytes,
}

impl CommandFrame {
    fn header(ins: u8, p1: u8, p2: u8, len: u8, capacity: usize) -> BytesMut {
        let mut buf = BytesMut::with_capacity(capacity);
        buf.put_u8(CLA_READER);
        buf.put_u8(ins);
        buf.put_u8(p1);
        buf.put_u8(p2);
        buf.put_u8(len);
        buf
    }

    /// Load six key bytes into the reader's volatile key slot.
    pub fn load_key(slot: u8, key: &[u8; KEY_SIZE]) -> Self {
        let mut buf = Self::header(
            INS_LOAD_KEY,
            KEY_STRUCTURE_VOLATILE,
            slot,
            KEY_SIZE as u8,
            5 + KEY_SIZE,
        );
        buf.put_slice(key);
        Self { data: buf.freeze() }
    }

    /// Load the key material of a candidate into its slot.
    pub fn load_candidate(candidate: &KeyCandidate) -> Self {
        Self::load_key(candidate.slot, &candidate.key)
    }

    /// Authenticate `block` with the key held in `slot`.
    pub fn authenticate(block: u8, slot: u8, key_type: KeyType) -> Self {
        let mut buf = Self::header(INS_AUTHENTICATE, 0x00, 0x00, AUTH_DATA_LENGTH, 10);
        buf.put_u8(AUTH_DATA_VERSION);
        buf.put_u8(0x00);
        buf.put_u8(block);
        buf.put_u8(key_type.code());
        buf.put_u8(slot);
        Self { data: buf.freeze() }
    }

    /// Read the 16 bytes of `block`.
    pub fn read_binary(block: u8) -> Self {
        let buf = Self::header(INS_READ_BINARY, 0x00, block, BLOCK_SIZE as u8, 5);
        Self { data: buf.freeze() }
    }

    /// Write a full block.
    pub fn update_binary(block: u8, data: &Block) -> Self {
        let mut buf = Self::header(
            INS_UPDATE_BINARY,
            0x00,
            block,
            BLOCK_SIZE as u8,
            5 + BLOCK_SIZE,
        );
        buf.put_slice(data.as_bytes());
        Self { data: buf.freeze() }
    }

    /// Get the raw bytes of the frame
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Instruction byte of the frame.
    pub fn instruction(&self) -> u8 {
        self.data[1]
    }
}

/// Load key frames carry key material, so only the header is printed.
impl fmt::Debug for CommandFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = if self.instruction() == INS_LOAD_KEY {
            &self.data[..5]
        } else {
            &self.data[..]
        };
        write!(f, "CommandFrame({}", crate::codec::hex_encode(shown))?;
        if shown.len() < self.data.len() {
            write!(f, "..")?;
        }
        write!(f, ")")
    }
}

/// Two-byte status word terminating every reader response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusWord(u16);

impl StatusWord {
    pub const SUCCESS: StatusWord = StatusWord(SW_SUCCESS);

    #[must_use]
    pub const fn new(sw: u16) -> Self {
        StatusWord(sw)
    }

    #[must_use]
    pub fn from_bytes(sw1: u8, sw2: u8) -> Self {
        StatusWord(u16::from_be_bytes([sw1, sw2]))
    }

    /// `0x9000` is the only success value.
    #[inline]
    #[must_use]
    pub fn is_success(self) -> bool {
        self.0 == SW_SUCCESS
    }

    #[must_use]
    pub fn as_u16(self) -> u16 {
        self.0
    }

    #[must_use]
    pub fn to_bytes(self) -> [u8; STATUS_WORD_LENGTH] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:04X}", self.0)
    }
}

/// Response returned by the reader: optional data followed by a status word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    data: Bytes,
    status: StatusWord,
}

impl ResponseFrame {
    /// Build a response from data and status word.
    pub fn new(data: impl Into<Bytes>, status: StatusWord) -> Self {
        Self {
            data: data.into(),
            status,
        }
    }

    /// Split a raw reader response into data and status word.
    ///
    /// # Errors
    /// Returns `Error::InvalidFrame` if the response is shorter than the
    /// two status bytes.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        if raw.len() < STATUS_WORD_LENGTH {
            return Err(Error::InvalidFrame(format!(
                "Response too short: {} bytes",
                raw.len()
            )));
        }
        let split = raw.len() - STATUS_WORD_LENGTH;
        Ok(Self {
            data: Bytes::copy_from_slice(&raw[..split]),
            status: StatusWord::from_bytes(raw[split], raw[split + 1]),
        })
    }

    /// Serialize back to the raw wire form.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut raw = Vec::with_capacity(self.data.len() + STATUS_WORD_LENGTH);
        raw.extend_from_slice(&self.data);
        raw.extend_from_slice(&self.status.to_bytes());
        raw
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn status(&self) -> StatusWord {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Interpret the response data as one block.
    ///
    /// # Errors
    /// Returns `Error::InvalidBlock` if the data is not exactly 16 bytes.
    pub fn block(&self) -> Result<Block> {
        Block::from_slice(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_load_key_frame() {
        let frame = CommandFrame::load_key(0, &KEY_MAD_PUBLIC);
        assert_eq!(
            frame.as_bytes(),
            &[0xFF, 0x82, 0x00, 0x00, 0x06, 0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5]
        );
    }

    #[test]
    fn test_load_key_debug_hides_key() {
        let frame = CommandFrame::load_key(0, &KEY_MAD_PUBLIC);
        assert_eq!(format!("{frame:?}"), "CommandFrame(FF82000006..)");
    }

    #[rstest]
    #[case(KeyType::A, 0x60)]
    #[case(KeyType::B, 0x61)]
    fn test_authenticate_frame(#[case] key_type: KeyType, #[case] code: u8) {
        let frame = CommandFrame::authenticate(1, 0, key_type);
        assert_eq!(
            frame.as_bytes(),
            &[0xFF, 0x86, 0x00, 0x00, 0x05, 0x01, 0x00, 0x01, code, 0x00]
        );
    }

    #[test]
    fn test_read_binary_frame() {
        let frame = CommandFrame::read_binary(1);
        assert_eq!(frame.as_bytes(), &[0xFF, 0xB0, 0x00, 0x01, 0x10]);
        assert_eq!(format!("{frame:?}"), "CommandFrame(FFB0000110)");
    }

    #[test]
    fn test_update_binary_frame() {
        let block = Block::new(*b"alice I         ");
        let frame = CommandFrame::update_binary(1, &block);
        assert_eq!(frame.as_bytes().len(), 21);
        assert_eq!(&frame.as_bytes()[..5], &[0xFF, 0xD6, 0x00, 0x01, 0x10]);
        assert_eq!(&frame.as_bytes()[5..], block.as_bytes());
    }

    #[test]
    fn test_parse_success_with_data() {
        let mut raw = b"alice I         ".to_vec();
        raw.extend_from_slice(&[0x90, 0x00]);
        let response = ResponseFrame::parse(&raw).unwrap();
        assert!(response.is_success());
        assert_eq!(response.block().unwrap().as_bytes(), b"alice I         ");
        assert_eq!(response.to_vec(), raw);
    }

    #[test]
    fn test_parse_failure_status() {
        let response = ResponseFrame::parse(&[0x63, 0x00]).unwrap();
        assert!(!response.is_success());
        assert_eq!(response.status().to_string(), "6300");
        assert!(response.data().is_empty());
        assert!(response.block().is_err());
    }

    #[rstest]
    #[case(vec![])]
    #[case(vec![0x90])]
    fn test_parse_too_short(#[case] raw: Vec<u8>) {
        assert!(matches!(
            ResponseFrame::parse(&raw),
            Err(Error::InvalidFrame(_))
        ));
    }
}
