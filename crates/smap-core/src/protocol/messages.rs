//! Wire-level message types.
//!
//! These mirror the fixed schema exactly: every field is a scalar, a fixed
//! 16-byte identifier, or a flat list.  Nesting only exists in the
//! [`crate::document`] model and is encoded into pair keys by
//! [`crate::keypath`].

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Protocol constants ────────────────────────────────────────────────────────

/// Current protocol version byte.
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Size of the request header in bytes.
pub const HEADER_SIZE: usize = 8;

// ── Request kinds ─────────────────────────────────────────────────────────────

/// Discriminant byte carried in the request header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum RequestKind {
    /// Credential only, no body.
    Void = 0x00,
    /// Credential plus a list of records.
    WriteData = 0x01,
}

impl TryFrom<u8> for RequestKind {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(RequestKind::Void),
            0x01 => Ok(RequestKind::WriteData),
            _ => Err(()),
        }
    }
}

// ── Record payload structs ────────────────────────────────────────────────────

/// A flat `{key, value}` entry used for properties and flattened metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pair {
    pub key: String,
    pub value: String,
}

impl Pair {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// One `{time, data}` sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WireReading {
    pub time: i64,
    pub data: f64,
}

/// The schema-bound representation of one path's record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRecord {
    /// Hierarchical path; an empty string means the path is missing.
    pub path: String,
    /// Always 16 bytes on the wire; nil when the record has no identifier.
    pub uuid: Uuid,
    pub contents: Vec<String>,
    pub readings: Vec<WireReading>,
    /// Properties in source insertion order.
    pub properties: Vec<Pair>,
    /// Flattened metadata; keys encode the original nesting.
    pub metadata: Vec<Pair>,
}

// ── Requests ──────────────────────────────────────────────────────────────────

/// A credential plus an ordered list of records, sent as one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    /// Opaque bearer string; never validated by the codec.
    pub credential: String,
    pub records: Vec<WireRecord>,
}

/// Any decodable request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    Void { credential: String },
    WriteData(BatchRequest),
}

impl Request {
    pub fn kind(&self) -> RequestKind {
        match self {
            Request::Void { .. } => RequestKind::Void,
            Request::WriteData(_) => RequestKind::WriteData,
        }
    }

    pub fn credential(&self) -> &str {
        match self {
            Request::Void { credential } => credential,
            Request::WriteData(batch) => &batch.credential,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_kind_try_from_known_bytes() {
        assert_eq!(RequestKind::try_from(0x00), Ok(RequestKind::Void));
        assert_eq!(RequestKind::try_from(0x01), Ok(RequestKind::WriteData));
    }

    #[test]
    fn test_request_kind_try_from_unknown_byte_fails() {
        assert!(RequestKind::try_from(0x02).is_err());
        assert!(RequestKind::try_from(0xFF).is_err());
    }

    #[test]
    fn test_request_exposes_credential_and_kind() {
        let void = Request::Void {
            credential: "key".into(),
        };
        let write = Request::WriteData(BatchRequest {
            credential: "other".into(),
            records: vec![],
        });

        assert_eq!(void.kind(), RequestKind::Void);
        assert_eq!(void.credential(), "key");
        assert_eq!(write.kind(), RequestKind::WriteData);
        assert_eq!(write.credential(), "other");
    }
}
