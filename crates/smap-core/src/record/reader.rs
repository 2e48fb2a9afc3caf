//! [`WireRecord`] → `(path, PathRecord)`.

use crate::document::{Identifier, Node, NodeMap, PathRecord, Reading, ReadingValue};
use crate::keypath::{unflatten, KeyPathConfig};
use crate::protocol::messages::WireRecord;
use crate::record::RecordError;

/// A record recovered from the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRecord {
    pub path: String,
    /// The nested record; `uuid` holds the canonical hyphenated text, or
    /// `None` when the wire carried the nil UUID.
    pub record: PathRecord,
    /// The identifier bytes exactly as received, for identity comparisons.
    pub raw_uuid: [u8; 16],
}

/// Reads one wire record back into the nested document shape.
///
/// Duplicate property keys resolve "last write wins": a later pair
/// overwrites the value of an earlier one.
///
/// # Errors
///
/// - [`RecordError::MalformedRecord`] if the path is missing (empty).
/// - [`RecordError::ConflictingPath`] if the metadata pairs cannot be
///   unflattened.
pub fn read_record(wire: &WireRecord, config: &KeyPathConfig) -> Result<DecodedRecord, RecordError> {
    if wire.path.is_empty() {
        return Err(RecordError::MalformedRecord("record path is missing".to_string()));
    }
    let path = wire.path.as_str();

    let mut properties = NodeMap::with_capacity(wire.properties.len());
    for pair in &wire.properties {
        properties.insert(pair.key.clone(), Node::Leaf(pair.value.clone()));
    }

    let metadata = unflatten(
        wire.metadata.iter().map(|p| (p.key.as_str(), p.value.as_str())),
        config,
    )
    .map_err(|e| RecordError::from_key_path(path, e))?;

    let readings = wire
        .readings
        .iter()
        .map(|r| Reading {
            time: r.time,
            value: ReadingValue::Number(r.data),
        })
        .collect();

    let uuid = if wire.uuid.is_nil() {
        None
    } else {
        Some(Identifier::from(wire.uuid))
    };

    Ok(DecodedRecord {
        path: path.to_string(),
        record: PathRecord {
            contents: wire.contents.clone(),
            properties,
            metadata,
            readings,
            uuid,
        },
        raw_uuid: *wire.uuid.as_bytes(),
    })
}
