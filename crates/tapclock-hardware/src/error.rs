//! Error types for reader and card operations.
//!
//! Rejections (a status word other than `0x9000`) are ordinary outcomes of a
//! card exchange and get their own variants so callers can decide whether to
//! try the next key. Transport failures and missing hardware are separate.

use tapclock_protocol::StatusWord;

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur while talking to a reader or a card.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// No reader is attached (the list of readers is empty).
    #[error("No card reader available")]
    NoReaderAvailable,

    /// The reader is attached but no card is in its field.
    #[error("No card present on {reader}")]
    NoCardPresent { reader: String },

    /// Connecting to the card failed for another reason.
    #[error("Connection error: {message}")]
    ConnectionError { message: String },

    /// Reader refused to load the key into the requested slot.
    #[error("Key load into slot {slot} rejected (SW {status})")]
    KeyLoadRejected { slot: u8, status: StatusWord },

    /// Card refused authentication with the loaded key.
    #[error("Authentication of block {block} rejected (SW {status})")]
    AuthRejected { block: u8, status: StatusWord },

    /// Card refused to return the block.
    #[error("Read of block {block} rejected (SW {status})")]
    ReadRejected { block: u8, status: StatusWord },

    /// Card refused to store the block.
    #[error("Write of block {block} rejected (SW {status})")]
    WriteRejected { block: u8, status: StatusWord },

    /// Every key candidate was tried without success.
    ///
    /// `last` holds the most recent failure, if any candidate got far enough
    /// to produce one.
    #[error("All {attempted} key candidates exhausted")]
    AllKeysExhausted {
        attempted: usize,
        #[source]
        last: Option<Box<HardwareError>>,
    },

    /// Transport-level failure while exchanging a frame.
    #[error("Communication error: {message}")]
    CommunicationError { message: String },

    /// Malformed frame or block data.
    #[error("Protocol error: {0}")]
    Protocol(#[from] tapclock_core::Error),
}

impl HardwareError {
    /// Create a new no-card error.
    pub fn no_card(reader: impl Into<String>) -> Self {
        Self::NoCardPresent {
            reader: reader.into(),
        }
    }

    /// Create a new connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::ConnectionError {
            message: message.into(),
        }
    }

    /// Create a new communication error.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::CommunicationError {
            message: message.into(),
        }
    }

    /// Status word carried by a rejection, following `AllKeysExhausted` to
    /// its last failure.
    pub fn status_word(&self) -> Option<StatusWord> {
        match self {
            Self::KeyLoadRejected { status, .. }
            | Self::AuthRejected { status, .. }
            | Self::ReadRejected { status, .. }
            | Self::WriteRejected { status, .. } => Some(*status),
            Self::AllKeysExhausted { last, .. } => last.as_ref().and_then(|e| e.status_word()),
            _ => None,
        }
    }

    /// Returns `true` if the card answered but refused the operation.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::KeyLoadRejected { .. }
                | Self::AuthRejected { .. }
                | Self::ReadRejected { .. }
                | Self::WriteRejected { .. }
                | Self::AllKeysExhausted { .. }
        )
    }

    /// Returns `true` if the failure means the card is gone or the reader
    /// is missing, rather than a refusal by the card.
    pub fn is_absence(&self) -> bool {
        matches!(self, Self::NoReaderAvailable | Self::NoCardPresent { .. })
    }
}
