use crate::{
    Result,
    constants::{
        BLOCK_SIZE, KEY_SIZE, KEY_TYPE_A, KEY_TYPE_B, PUNCH_MARKER_END, PUNCH_MARKER_START,
        STATUS_CLOCK_IN, STATUS_CLOCK_OUT, STATUS_UNKNOWN,
    },
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One 16-byte MIFARE Classic data block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Block([u8; BLOCK_SIZE]);

impl Block {
    /// Create a block from exactly [`BLOCK_SIZE`] bytes.
    #[must_use]
    pub const fn new(bytes: [u8; BLOCK_SIZE]) -> Self {
        Block(bytes)
    }

    /// Create a block from a slice.
    ///
    /// # Errors
    /// Returns `Error::InvalidBlock` if the slice is not exactly 16 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; BLOCK_SIZE] = bytes.try_into().map_err(|_| Error::InvalidBlock {
            expected: BLOCK_SIZE,
            actual: bytes.len(),
        })?;
        Ok(Block(array))
    }

    /// Get the raw block bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; BLOCK_SIZE] {
        &self.0
    }
}

impl AsRef<[u8]> for Block {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Decoded content of the identity block.
///
/// `identity` is the text before the first space (conventionally a username),
/// `status` whatever follows it, usually a single status character.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CardPayload {
    pub identity: String,
    pub status: String,
}

impl CardPayload {
    /// Returns `true` if the card carries no identity.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.identity.is_empty()
    }

    /// Parse the status part as a known status code.
    #[must_use]
    pub fn status_code(&self) -> Option<StatusCode> {
        let mut chars = self.status.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => StatusCode::from_char(c),
            _ => None,
        }
    }
}

/// Status written back to the card after a punch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    /// Work period started.
    ClockIn,
    /// Work period ended.
    ClockOut,
    /// Response could not be classified (including an empty response).
    Unknown,
}

impl StatusCode {
    /// Classify a punch response body.
    ///
    /// "Work Start" wins over "Work End" when both appear, anything else
    /// (including an empty body from a failed request) is `Unknown`.
    ///
    /// # Examples
    ///
    /// ```
    /// use tapclock_core::StatusCode;
    ///
    /// assert_eq!(StatusCode::classify("{\"msg\":\"Work Start\"}"), StatusCode::ClockIn);
    /// assert_eq!(StatusCode::classify("Work End at 17:02"), StatusCode::ClockOut);
    /// assert_eq!(StatusCode::classify(""), StatusCode::Unknown);
    /// ```
    #[must_use]
    pub fn classify(response: &str) -> Self {
        if response.contains(PUNCH_MARKER_START) {
            StatusCode::ClockIn
        } else if response.contains(PUNCH_MARKER_END) {
            StatusCode::ClockOut
        } else {
            StatusCode::Unknown
        }
    }

    /// Parse a status character.
    #[must_use]
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            STATUS_CLOCK_IN => Some(StatusCode::ClockIn),
            STATUS_CLOCK_OUT => Some(StatusCode::ClockOut),
            STATUS_UNKNOWN => Some(StatusCode::Unknown),
            _ => None,
        }
    }

    /// Status character stored on the card.
    #[inline]
    #[must_use]
    pub fn as_char(self) -> char {
        match self {
            StatusCode::ClockIn => STATUS_CLOCK_IN,
            StatusCode::ClockOut => STATUS_CLOCK_OUT,
            StatusCode::Unknown => STATUS_UNKNOWN,
        }
    }

    /// Status as a one-character string slice.
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StatusCode::ClockIn => "I",
            StatusCode::ClockOut => "O",
            StatusCode::Unknown => "X",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// MIFARE key type used for authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum KeyType {
    A = KEY_TYPE_A,
    B = KEY_TYPE_B,
}

impl KeyType {
    /// Create a key type from its authenticate code.
    ///
    /// # Errors
    /// Returns `Error::Decode` if the code is neither `0x60` nor `0x61`.
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            KEY_TYPE_A => Ok(KeyType::A),
            KEY_TYPE_B => Ok(KeyType::B),
            _ => Err(Error::Decode(format!("Unknown key type code 0x{code:02X}"))),
        }
    }

    /// Numeric code sent in the authenticate frame.
    #[inline]
    #[must_use]
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            KeyType::A => write!(f, "A"),
            KeyType::B => write!(f, "B"),
        }
    }
}

/// A key to try during authentication: key material, reader key slot and key type.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyCandidate {
    pub key: [u8; KEY_SIZE],
    pub slot: u8,
    pub key_type: KeyType,
}

impl KeyCandidate {
    #[must_use]
    pub const fn new(key: [u8; KEY_SIZE], slot: u8, key_type: KeyType) -> Self {
        Self {
            key,
            slot,
            key_type,
        }
    }
}

/// Key material is kept out of debug output; only a short prefix is shown.
impl fmt::Debug for KeyCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyCandidate")
            .field("key", &format!("{:02X}{:02X}..", self.key[0], self.key[1]))
            .field("slot", &self.slot)
            .field("key_type", &self.key_type)
            .finish()
    }
}

impl fmt::Display for KeyCandidate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "key {} {:02X}{:02X}.. in slot {}",
            self.key_type, self.key[0], self.key[1], self.slot
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::KEY_MAD_PUBLIC;
    use rstest::rstest;

    #[test]
    fn test_block_from_slice() {
        let block = Block::from_slice(&[0x41; 16]).unwrap();
        assert_eq!(block.as_bytes(), &[0x41; 16]);
    }

    #[rstest]
    #[case(0)]
    #[case(15)]
    #[case(17)]
    fn test_block_rejects_wrong_length(#[case] len: usize) {
        let err = Block::from_slice(&vec![0u8; len]).unwrap_err();
        assert!(matches!(err, Error::InvalidBlock { expected: 16, actual } if actual == len));
    }

    #[rstest]
    #[case("Work Start recorded", StatusCode::ClockIn)]
    #[case("Work End recorded", StatusCode::ClockOut)]
    #[case("Work Start / Work End", StatusCode::ClockIn)]
    #[case("user not found", StatusCode::Unknown)]
    #[case("", StatusCode::Unknown)]
    #[case("work start", StatusCode::Unknown)]
    fn test_status_classification(#[case] response: &str, #[case] expected: StatusCode) {
        assert_eq!(StatusCode::classify(response), expected);
    }

    #[test]
    fn test_status_char_roundtrip() {
        for status in [StatusCode::ClockIn, StatusCode::ClockOut, StatusCode::Unknown] {
            assert_eq!(StatusCode::from_char(status.as_char()), Some(status));
            assert_eq!(status.to_string().len(), 1);
        }
        assert_eq!(StatusCode::from_char('Z'), None);
    }

    #[test]
    fn test_payload_status_code() {
        let payload = CardPayload {
            identity: "alice".to_string(),
            status: "O".to_string(),
        };
        assert_eq!(payload.status_code(), Some(StatusCode::ClockOut));
        assert!(!payload.is_blank());

        let multi = CardPayload {
            identity: "alice".to_string(),
            status: "IO".to_string(),
        };
        assert_eq!(multi.status_code(), None);
        assert!(CardPayload::default().is_blank());
    }

    #[rstest]
    #[case(0x60, KeyType::A)]
    #[case(0x61, KeyType::B)]
    fn test_key_type_codes(#[case] code: u8, #[case] expected: KeyType) {
        assert_eq!(KeyType::from_code(code).unwrap(), expected);
        assert_eq!(expected.code(), code);
    }

    #[test]
    fn test_key_type_unknown_code() {
        assert!(KeyType::from_code(0x62).is_err());
    }

    #[test]
    fn test_key_candidate_hides_key_material() {
        let candidate = KeyCandidate::new(KEY_MAD_PUBLIC, 0, KeyType::A);
        let debug = format!("{candidate:?}");
        assert!(debug.contains("A0A1.."));
        assert!(!debug.contains("A2"));
        assert_eq!(candidate.to_string(), "key A A0A1.. in slot 0");
    }

    #[test]
    fn test_status_code_serialization() {
        let json = serde_json::to_string(&StatusCode::ClockIn).unwrap();
        let back: StatusCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, StatusCode::ClockIn);
    }
}
