//! Property-based tests for the payload and hex codecs.
//!
//! These tests use proptest to generate random inputs and verify that the
//! block layout invariants hold for every identity/status combination.

use proptest::prelude::*;
use tapclock_core::StatusCode;
use tapclock_protocol::{ascii_to_payload, decode_payload, encode_payload, hex_decode, hex_encode};

/// Strategy for identities as stored on cards: printable ASCII without spaces.
fn valid_identity() -> impl Strategy<Value = String> {
    prop::string::string_regex("[!-~]{1,14}").expect("Failed to create identity regex strategy")
}

/// Strategy for identities that may exceed the block.
fn long_identity() -> impl Strategy<Value = String> {
    prop::string::string_regex("[!-~]{16,40}").expect("Failed to create identity regex strategy")
}

/// Strategy for the status codes written by the agent.
fn valid_status() -> impl Strategy<Value = StatusCode> {
    prop_oneof![
        Just(StatusCode::ClockIn),
        Just(StatusCode::ClockOut),
        Just(StatusCode::Unknown),
    ]
}

proptest! {
    /// Property: identity and status survive an encode/decode cycle.
    #[test]
    fn prop_payload_roundtrip(identity in valid_identity(), status in valid_status()) {
        let block = encode_payload(&identity, status.as_str());
        let payload = decode_payload(&block);

        prop_assert_eq!(&payload.identity, &identity);
        prop_assert_eq!(payload.status_code(), Some(status));
    }

    /// Property: payload text is always exactly 16 bytes, whatever the input.
    #[test]
    fn prop_payload_is_sixteen_bytes(text in ".{0,40}", status in ".{0,3}") {
        let payload = ascii_to_payload(&text, &status);
        prop_assert_eq!(payload.len(), 16);
        prop_assert!(payload.is_ascii());
    }

    /// Property: an over-long identity decodes to the truncated 16-byte prefix.
    #[test]
    fn prop_long_identity_truncated(identity in long_identity(), status in valid_status()) {
        let block = encode_payload(&identity, status.as_str());
        let payload = decode_payload(&block);

        let combined = format!("{identity} {status}");
        prop_assert_eq!(block.as_bytes().as_slice(), &combined.as_bytes()[..16]);
        prop_assert_eq!(payload.identity.as_str(), &identity[..16]);
        prop_assert!(payload.status.is_empty());
    }

    /// Property: hex encoding is reversible and uses two uppercase digits per byte.
    #[test]
    fn prop_hex_roundtrip(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        let hex = hex_encode(&bytes);
        prop_assert_eq!(hex.len(), bytes.len() * 2);
        prop_assert!(!hex.chars().any(|c| c.is_ascii_lowercase()));
        prop_assert_eq!(hex_decode(&hex).unwrap(), bytes);
    }
}

#[test]
fn test_alice_clock_in_scenario() {
    let block = encode_payload("alice", StatusCode::classify("... Work Start ...").as_str());
    let payload = decode_payload(&block);

    assert_eq!(payload.identity, "alice");
    assert_eq!(payload.status, "I");
    assert_eq!(hex_encode(block.as_bytes()).len(), 32);
}

#[test]
fn test_fourteen_char_identity_fills_block_exactly() {
    let text = ascii_to_payload("bob12345678901", "O");
    assert_eq!(text, "bob12345678901 O");

    let payload = decode_payload(&encode_payload("bob12345678901", "O"));
    assert_eq!(payload.identity, "bob12345678901");
    assert_eq!(payload.status, "O");
}
