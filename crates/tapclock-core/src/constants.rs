//! Core constants for the tapclock card agent.
//!
//! This module defines the byte-level constants of the reader command set
//! (PC/SC pseudo-APDUs understood by ACR122U-class readers), the default
//! MIFARE Classic keys, and the default timings of the agent loop.
//!
//! # Command Frames
//!
//! Every command sent to the reader shares the same header layout:
//!
//! ```text
//! CLA INS P1 P2 Lc [DATA...] [Le]
//! ```
//!
//! | Command | INS | P1 | P2 | Lc/Le | Data |
//! |---------|-----|----|----|-------|------|
//! | Load key | `0x82` | `0x00` | key slot | `0x06` | 6 key bytes |
//! | Authenticate | `0x86` | `0x00` | `0x00` | `0x05` | `01 00 <block> <key type> <slot>` |
//! | Read binary | `0xB0` | `0x00` | block | `0x10` | - |
//! | Update binary | `0xD6` | `0x00` | block | `0x10` | 16 block bytes |
//!
//! Each response ends with a two-byte status word; [`SW_SUCCESS`] is the only
//! value treated as success.
//!
//! # Usage
//!
//! ```
//! use tapclock_core::constants::*;
//!
//! assert_eq!(BLOCK_SIZE, 16);
//! assert_eq!(SW_SUCCESS, 0x9000);
//! assert_eq!(TARGET_BLOCK, 1);
//! ```

// ============================================================================
// Card Layout
// ============================================================================

/// Size of a MIFARE Classic data block in bytes.
pub const BLOCK_SIZE: usize = 16;

/// Size of a MIFARE Classic key in bytes.
pub const KEY_SIZE: usize = 6;

/// Block holding the identity payload (sector 0, block 1).
pub const TARGET_BLOCK: u8 = 1;

/// Number of blocks per sector in the first 32 sectors of MIFARE Classic.
pub const BLOCKS_PER_SECTOR: u8 = 4;

/// Padding byte used to fill payloads up to [`BLOCK_SIZE`].
pub const PAYLOAD_PAD: u8 = b' ';

/// Separator between identity and status inside a payload.
pub const PAYLOAD_SEPARATOR: char = ' ';

// ============================================================================
// Reader Command Set
// ============================================================================

/// Class byte of reader pseudo-APDUs.
pub const CLA_READER: u8 = 0xFF;

/// Load authentication key into reader memory.
pub const INS_LOAD_KEY: u8 = 0x82;

/// General authenticate.
pub const INS_AUTHENTICATE: u8 = 0x86;

/// Read binary block.
pub const INS_READ_BINARY: u8 = 0xB0;

/// Update binary block.
pub const INS_UPDATE_BINARY: u8 = 0xD6;

/// Key structure byte for load key (volatile reader memory).
pub const KEY_STRUCTURE_VOLATILE: u8 = 0x00;

/// Version byte of the authenticate data object.
pub const AUTH_DATA_VERSION: u8 = 0x01;

/// Length of the authenticate data object.
pub const AUTH_DATA_LENGTH: u8 = 0x05;

/// Key type code for MIFARE key A.
pub const KEY_TYPE_A: u8 = 0x60;

/// Key type code for MIFARE key B.
pub const KEY_TYPE_B: u8 = 0x61;

/// Default volatile key slot.
pub const DEFAULT_KEY_SLOT: u8 = 0x00;

// ============================================================================
// Status Words
// ============================================================================

/// The only status word signaling success.
pub const SW_SUCCESS: u16 = 0x9000;

/// Generic operation failure (authentication failed, wrong key).
pub const SW_OPERATION_FAILED: u16 = 0x6300;

/// Security status not satisfied (block not authenticated).
pub const SW_SECURITY_NOT_SATISFIED: u16 = 0x6982;

/// Wrong length in command.
pub const SW_WRONG_LENGTH: u16 = 0x6700;

/// Function not supported.
pub const SW_NOT_SUPPORTED: u16 = 0x6A81;

/// Key slot or block address out of range.
pub const SW_WRONG_PARAMETERS: u16 = 0x6B00;

/// Status word length in bytes.
pub const STATUS_WORD_LENGTH: usize = 2;

// ============================================================================
// Default Keys
// ============================================================================

/// Factory transport key (all `0xFF`).
pub const KEY_FACTORY_DEFAULT: [u8; KEY_SIZE] = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];

/// MIFARE Application Directory public key A.
pub const KEY_MAD_PUBLIC: [u8; KEY_SIZE] = [0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5];

// ============================================================================
// Stamp Status Codes
// ============================================================================

/// Status written after a "work start" punch.
pub const STATUS_CLOCK_IN: char = 'I';

/// Status written after a "work end" punch.
pub const STATUS_CLOCK_OUT: char = 'O';

/// Status written when the punch response could not be classified.
pub const STATUS_UNKNOWN: char = 'X';

/// Marker in the punch response for a started work period.
pub const PUNCH_MARKER_START: &str = "Work Start";

/// Marker in the punch response for an ended work period.
pub const PUNCH_MARKER_END: &str = "Work End";

// ============================================================================
// Remote Collaborators
// ============================================================================

/// Default time-tracking punch endpoint.
pub const DEFAULT_PUNCH_URL: &str = "https://api.chrono-logisch.ch/api/timetracking/punch";

/// Default command-queue endpoint.
pub const DEFAULT_COMMAND_URL: &str = "https://api.chrono-logisch.ch/api/nfc/command";

/// Query parameter carrying the identity on punch requests.
pub const PUNCH_IDENTITY_PARAM: &str = "username";

/// Header carrying the agent token on command status updates.
pub const AGENT_TOKEN_HEADER: &str = "X-Agent-Token";

/// Directive type that arms programming.
pub const DIRECTIVE_PROGRAM: &str = "PROGRAM";

/// Command status reported once a directive is resolved.
pub const COMMAND_STATUS_DONE: &str = "done";

// ============================================================================
// Timing Defaults (milliseconds)
// ============================================================================

/// Interval between presence polls while idle.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Wait after no reader was found.
pub const DEFAULT_READER_BACKOFF_MS: u64 = 3000;

/// Wait after a hardware or transport error.
pub const DEFAULT_ERROR_BACKOFF_MS: u64 = 3000;

/// Minimum time between two stamps of the same identity.
pub const DEFAULT_STAMP_COOLDOWN_MS: u64 = 60_000;

/// Stamp lock applied to an identity right after it was programmed.
pub const DEFAULT_PROGRAM_LOCK_MS: u64 = 10_000;

/// How long programming waits for a card before giving up.
pub const DEFAULT_PROGRAM_DEADLINE_MS: u64 = 10_000;

/// Connect/read timeout of the punch request.
pub const DEFAULT_PUNCH_TIMEOUT_MS: u64 = 5000;

/// Timeout of the pending-command fetch.
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 3000;

/// Timeout of the command status update.
pub const DEFAULT_UPDATE_TIMEOUT_MS: u64 = 5000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_types_are_distinct() {
        assert_ne!(KEY_TYPE_A, KEY_TYPE_B);
    }

    #[test]
    fn test_target_block_is_in_sector_zero() {
        assert_eq!(TARGET_BLOCK / BLOCKS_PER_SECTOR, 0);
    }

    #[test]
    fn test_status_codes_are_ascii() {
        for status in [STATUS_CLOCK_IN, STATUS_CLOCK_OUT, STATUS_UNKNOWN] {
            assert!(status.is_ascii_uppercase());
        }
    }
}
