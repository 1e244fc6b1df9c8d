//! Frame codec for the tapclock card agent.
//!
//! Pure, stateless transforms with no I/O:
//!
//! - [`codec`]: hex encoding and the 16-byte identity payload format
//! - [`frame`]: reader command frames and status-word responses

pub mod codec;
pub mod frame;

pub use codec::{
    ascii_to_payload, decode_payload, decode_payload_hex, encode_payload, hex_decode, hex_encode,
};
pub use frame::{CommandFrame, ResponseFrame, StatusWord};
