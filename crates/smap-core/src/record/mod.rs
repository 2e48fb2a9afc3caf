//! Conversion between one `(path, PathRecord)` and its [`WireRecord`].
//!
//! [`build_record`] flattens the nested record into the wire shape and
//! [`read_record`] inverts it.  Both are pure: no I/O, no shared state.
//!
//! [`WireRecord`]: crate::protocol::messages::WireRecord

mod builder;
mod reader;

use thiserror::Error;

use crate::keypath::KeyPathError;

pub use builder::build_record;
pub use reader::{read_record, DecodedRecord};

/// Errors raised while building or reading a single record.
///
/// Every variant names the offending path so that a failure inside a batch
/// can be traced back to its source entry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    /// The textual UUID could not be parsed.
    #[error("{path}: invalid identifier '{value}'")]
    InvalidIdentifier { path: String, value: String },

    /// A reading value is not numeric.
    #[error("{path}: reading {index} has non-numeric value '{value}'")]
    InvalidReading {
        path: String,
        index: usize,
        value: String,
    },

    /// A property value is a nested map instead of a scalar.
    #[error("{path}: property '{key}' is not a scalar value")]
    InvalidProperty { path: String, key: String },

    /// A metadata key is both a leaf and an inner node, or two leaves
    /// flatten to the same key.
    #[error("{path}: conflicting metadata key '{key}'")]
    ConflictingPath { path: String, key: String },

    /// A required wire field is missing.
    #[error("malformed record: {0}")]
    MalformedRecord(String),
}

impl RecordError {
    /// Attaches `path` to a key-path failure.
    pub(crate) fn from_key_path(path: &str, err: KeyPathError) -> Self {
        match err {
            KeyPathError::ConflictingPath { key } => RecordError::ConflictingPath {
                path: path.to_string(),
                key,
            },
            KeyPathError::EmptySeparator => {
                RecordError::MalformedRecord(format!("{path}: {err}"))
            }
        }
    }

    /// The path of the record that failed, when known.
    pub fn path(&self) -> Option<&str> {
        match self {
            RecordError::InvalidIdentifier { path, .. }
            | RecordError::InvalidReading { path, .. }
            | RecordError::InvalidProperty { path, .. }
            | RecordError::ConflictingPath { path, .. } => Some(path),
            RecordError::MalformedRecord(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_key_path_conflict_keeps_key_and_adds_path() {
        let err = RecordError::from_key_path(
            "/a",
            KeyPathError::ConflictingPath { key: "x/y".into() },
        );
        assert_eq!(
            err,
            RecordError::ConflictingPath {
                path: "/a".into(),
                key: "x/y".into()
            }
        );
        assert_eq!(err.path(), Some("/a"));
    }

    #[test]
    fn test_error_messages_name_path_and_key() {
        let err = RecordError::InvalidProperty {
            path: "/fast/sensor0".into(),
            key: "UnitofMeasure".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/fast/sensor0"));
        assert!(msg.contains("UnitofMeasure"));
    }
}
