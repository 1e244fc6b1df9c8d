//! Hex and payload encoding for the identity block.
//!
//! The identity block stores a fixed 16-byte ASCII payload:
//!
//! ```text
//! a l i c e ␠ I ␠ ␠ ␠ ␠ ␠ ␠ ␠ ␠ ␠
//! └─identity─┘ │ └──padding───────┘
//!              └ status
//! ```
//!
//! Payloads are right-padded with spaces, or truncated to 16 bytes when the
//! text is longer. Blank cards usually hold sixteen `0x00` bytes, which decode
//! to an empty identity.
//!
//! # Examples
//!
//! ```
//! use tapclock_protocol::codec::{ascii_to_payload, decode_payload, encode_payload, hex_encode};
//!
//! let text = ascii_to_payload("alice", "I");
//! assert_eq!(text, "alice I         ");
//!
//! let block = encode_payload("alice", "I");
//! assert_eq!(hex_encode(block.as_bytes()).len(), 32);
//!
//! let payload = decode_payload(&block);
//! assert_eq!(payload.identity, "alice");
//! assert_eq!(payload.status, "I");
//! ```

use tapclock_core::{
    Block, CardPayload, Error, Result,
    constants::{BLOCK_SIZE, PAYLOAD_PAD, PAYLOAD_SEPARATOR},
};

/// Encode bytes as uppercase hex, two digits per byte.
#[must_use]
pub fn hex_encode(bytes: &[u8]) -> String {
    hex::encode_upper(bytes)
}

/// Decode a hex string (either case) into bytes.
///
/// # Errors
/// Returns `Error::Decode` if the string has odd length or contains a
/// character that is not a hex digit.
pub fn hex_decode(text: &str) -> Result<Vec<u8>> {
    hex::decode(text).map_err(|e| Error::Decode(format!("Invalid hex {text:?}: {e}")))
}

/// Build the 16-character payload text for `text` and optional `status`.
///
/// The status is appended after a single space when non-empty. Characters
/// outside ASCII are replaced with `?`, then the result is right-padded with
/// spaces or truncated to exactly 16 characters. Never fails.
#[must_use]
pub fn ascii_to_payload(text: &str, status: &str) -> String {
    let combined = if status.is_empty() {
        text.to_string()
    } else {
        format!("{text}{PAYLOAD_SEPARATOR}{status}")
    };

    let mut payload: String = combined
        .chars()
        .map(|c| if c.is_ascii() { c } else { '?' })
        .take(BLOCK_SIZE)
        .collect();
    while payload.len() < BLOCK_SIZE {
        payload.push(PAYLOAD_PAD as char);
    }
    payload
}

/// Encode `text` and `status` into a block ready to be written.
#[must_use]
pub fn encode_payload(text: &str, status: &str) -> Block {
    let payload = ascii_to_payload(text, status);
    let mut bytes = [PAYLOAD_PAD; BLOCK_SIZE];
    bytes.copy_from_slice(payload.as_bytes());
    Block::new(bytes)
}

/// Decode a raw block into identity and status.
///
/// Each byte is read as one character, surrounding control characters and
/// spaces (including the NUL fill of blank cards) are trimmed, and the text is
/// split on the first space.
#[must_use]
pub fn decode_payload(block: &Block) -> CardPayload {
    let text: String = block.as_bytes().iter().map(|&b| b as char).collect();
    let trimmed = text.trim_matches(|c: char| c <= ' ');

    match trimmed.split_once(PAYLOAD_SEPARATOR) {
        Some((identity, status)) => CardPayload {
            identity: identity.to_string(),
            status: status.to_string(),
        },
        None => CardPayload {
            identity: trimmed.to_string(),
            status: String::new(),
        },
    }
}

/// Decode a hex-encoded block.
///
/// # Errors
/// Returns `Error::Decode` for malformed hex and `Error::InvalidBlock` when the
/// decoded data is not exactly 16 bytes.
pub fn decode_payload_hex(hex: &str) -> Result<CardPayload> {
    let bytes = hex_decode(hex)?;
    let block = Block::from_slice(&bytes)?;
    Ok(decode_payload(&block))
}
