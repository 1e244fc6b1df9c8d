//! Remote command queue payloads.

use serde::{Deserialize, Serialize};
use tapclock_core::constants::DIRECTIVE_PROGRAM;

/// A directive fetched from the command queue.
///
/// Every field is optional on the wire: a missing `id` means the command
/// cannot be acknowledged, missing `type` or `data` read as empty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PendingCommand {
    #[serde(default)]
    pub id: Option<i64>,

    /// Directive type; only `PROGRAM` (any case) is acted on.
    #[serde(rename = "type", default)]
    pub kind: String,

    /// Text to program onto the next presented card.
    #[serde(default)]
    pub data: String,
}

impl PendingCommand {
    /// Create a program directive.
    pub fn program(id: Option<i64>, data: impl Into<String>) -> Self {
        Self {
            id,
            kind: DIRECTIVE_PROGRAM.to_string(),
            data: data.into(),
        }
    }

    /// Returns `true` for a `PROGRAM` directive, ignoring case.
    pub fn is_program(&self) -> bool {
        self.kind.eq_ignore_ascii_case(DIRECTIVE_PROGRAM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("PROGRAM", true)]
    #[case("program", true)]
    #[case("Program", true)]
    #[case("ERASE", false)]
    #[case("", false)]
    fn test_is_program(#[case] kind: &str, #[case] expected: bool) {
        let command = PendingCommand {
            id: Some(1),
            kind: kind.to_string(),
            data: String::new(),
        };
        assert_eq!(command.is_program(), expected);
    }

    #[test]
    fn test_deserialize_full() {
        let command: PendingCommand =
            serde_json::from_str(r#"{"id": 42, "type": "PROGRAM", "data": "carol"}"#).unwrap();
        assert_eq!(command, PendingCommand::program(Some(42), "carol"));
    }

    #[test]
    fn test_deserialize_missing_fields() {
        let command: PendingCommand = serde_json::from_str(r#"{"type": "program"}"#).unwrap();
        assert_eq!(command.id, None);
        assert_eq!(command.data, "");
        assert!(command.is_program());
    }

    #[test]
    fn test_deserialize_ignores_unknown_fields() {
        let command: PendingCommand = serde_json::from_str(
            r#"{"id": 7, "type": "PROGRAM", "data": "dave", "status": "pending", "createdAt": "2024-01-01"}"#,
        )
        .unwrap();
        assert_eq!(command.id, Some(7));
    }
}
