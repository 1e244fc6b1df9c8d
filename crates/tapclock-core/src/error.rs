use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Codec errors
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid block length: expected {expected} bytes, got {actual}")]
    InvalidBlock { expected: usize, actual: usize },

    #[error("Invalid response frame: {0}")]
    InvalidFrame(String),

    // Agent state errors
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },
}

pub type Result<T> = std::result::Result<T, Error>;
