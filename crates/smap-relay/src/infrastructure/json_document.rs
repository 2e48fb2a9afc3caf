//! Conversion between JSON sMAP documents and [`Document`].
//!
//! The JSON shape is one object per path:
//!
//! ```json
//! {
//!   "/fast/sensor0": {
//!     "Contents": ["child"],
//!     "Properties": { "UnitofMeasure": "V" },
//!     "Metadata": { "Site": "Test Site", "Nested": { "key": "value" } },
//!     "Readings": [[9182731928374, 30]],
//!     "uuid": "b86df176-6b40-5d58-8f29-3b85f5cfbf1e"
//!   }
//! }
//! ```
//!
//! Scalars inside `Metadata` and `Properties` are stored as their text form.
//! Nested objects under `Properties` are kept as maps and rejected later by
//! the record builder.  Reading values that are neither numbers nor strings
//! are kept as their JSON text and rejected later as well.

use serde_json::{Map, Value};
use smap_core::{Document, Identifier, Node, NodeMap, PathRecord, Reading, ReadingValue};
use thiserror::Error;
use uuid::Uuid;

const CONTENTS: &str = "Contents";
const PROPERTIES: &str = "Properties";
const METADATA: &str = "Metadata";
const READINGS: &str = "Readings";
const UUID: &str = "uuid";

/// Largest magnitude an `f64` holds without losing integer precision.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Error type for JSON document conversion.
#[derive(Debug, Error)]
pub enum JsonDocumentError {
    /// The input is not valid JSON.
    #[error("invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// The top-level value is not an object keyed by path.
    #[error("document root must be a JSON object keyed by path")]
    RootNotAnObject,

    /// A path entry is not an object.
    #[error("entry for path '{path}' must be a JSON object")]
    EntryNotAnObject { path: String },

    /// A known field has the wrong shape.
    #[error("path '{path}': field '{field}' {reason}")]
    InvalidField {
        path: String,
        field: &'static str,
        reason: String,
    },

    /// A reading timestamp is not a JSON integer.
    #[error("path '{path}': reading {index} has a non-integer timestamp")]
    InvalidTimestamp { path: String, index: usize },
}

// ── JSON → Document ───────────────────────────────────────────────────────────

/// Parses a JSON document from text.
///
/// # Errors
///
/// See [`document_from_json`].
pub fn document_from_str(text: &str) -> Result<Document, JsonDocumentError> {
    let value: Value = serde_json::from_str(text)?;
    document_from_json(&value)
}

/// Converts a parsed JSON document, keeping the path order of the input.
///
/// Unknown fields inside a path entry are ignored.
///
/// # Errors
///
/// Returns a [`JsonDocumentError`] naming the path and field at fault.
pub fn document_from_json(value: &Value) -> Result<Document, JsonDocumentError> {
    let root = value.as_object().ok_or(JsonDocumentError::RootNotAnObject)?;
    let mut document = Document::new();
    for (path, entry) in root {
        let entry = entry
            .as_object()
            .ok_or_else(|| JsonDocumentError::EntryNotAnObject { path: path.clone() })?;
        document.insert(path.clone(), record_from_json(path, entry)?);
    }
    Ok(document)
}

fn record_from_json(path: &str, entry: &Map<String, Value>) -> Result<PathRecord, JsonDocumentError> {
    let invalid = |field: &'static str, reason: &str| JsonDocumentError::InvalidField {
        path: path.to_string(),
        field,
        reason: reason.to_string(),
    };

    let mut record = PathRecord::default();

    if let Some(contents) = entry.get(CONTENTS) {
        let items = contents
            .as_array()
            .ok_or_else(|| invalid(CONTENTS, "must be an array of strings"))?;
        record.contents = items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| invalid(CONTENTS, "must contain only strings"))?;
    }

    if let Some(properties) = entry.get(PROPERTIES) {
        let object = properties
            .as_object()
            .ok_or_else(|| invalid(PROPERTIES, "must be an object"))?;
        record.properties = node_map_from_json(object);
    }

    if let Some(metadata) = entry.get(METADATA) {
        let object = metadata
            .as_object()
            .ok_or_else(|| invalid(METADATA, "must be an object"))?;
        record.metadata = node_map_from_json(object);
    }

    if let Some(readings) = entry.get(READINGS) {
        let items = readings
            .as_array()
            .ok_or_else(|| invalid(READINGS, "must be an array of [time, value] pairs"))?;
        record.readings = items
            .iter()
            .enumerate()
            .map(|(index, item)| reading_from_json(path, index, item))
            .collect::<Result<Vec<_>, _>>()?;
    }

    match entry.get(UUID) {
        None | Some(Value::Null) => {}
        Some(Value::String(text)) => record.uuid = Some(Identifier::Text(text.clone())),
        Some(_) => return Err(invalid(UUID, "must be a string")),
    }

    Ok(record)
}

fn reading_from_json(path: &str, index: usize, item: &Value) -> Result<Reading, JsonDocumentError> {
    let pair = match item.as_array() {
        Some(pair) if pair.len() == 2 => pair,
        _ => {
            return Err(JsonDocumentError::InvalidField {
                path: path.to_string(),
                field: READINGS,
                reason: format!("entry {index} must be a [time, value] pair"),
            })
        }
    };
    let time = pair[0]
        .as_i64()
        .ok_or_else(|| JsonDocumentError::InvalidTimestamp {
            path: path.to_string(),
            index,
        })?;
    let value = match &pair[1] {
        Value::Number(n) => match n.as_f64() {
            Some(f) => ReadingValue::Number(f),
            None => ReadingValue::Text(n.to_string()),
        },
        Value::String(s) => ReadingValue::Text(s.clone()),
        other => ReadingValue::Text(other.to_string()),
    };
    Ok(Reading { time, value })
}

fn node_map_from_json(object: &Map<String, Value>) -> NodeMap {
    object
        .iter()
        .map(|(key, value)| (key.clone(), node_from_json(value)))
        .collect()
}

fn node_from_json(value: &Value) -> Node {
    match value {
        Value::Object(object) => Node::Map(node_map_from_json(object)),
        Value::String(s) => Node::Leaf(s.clone()),
        other => Node::Leaf(other.to_string()),
    }
}

// ── Document → JSON ───────────────────────────────────────────────────────────

/// Renders `document` in the same JSON shape it is read from.
///
/// Empty sections are omitted.  Whole-number readings render as integers.
pub fn document_to_json(document: &Document) -> Value {
    let mut root = Map::new();
    for (path, record) in document.iter() {
        root.insert(path.to_string(), Value::Object(record_to_json(record)));
    }
    Value::Object(root)
}

fn record_to_json(record: &PathRecord) -> Map<String, Value> {
    let mut entry = Map::new();
    if !record.contents.is_empty() {
        entry.insert(
            CONTENTS.into(),
            Value::Array(record.contents.iter().cloned().map(Value::String).collect()),
        );
    }
    if !record.properties.is_empty() {
        entry.insert(PROPERTIES.into(), node_map_to_json(&record.properties));
    }
    if !record.metadata.is_empty() {
        entry.insert(METADATA.into(), node_map_to_json(&record.metadata));
    }
    if !record.readings.is_empty() {
        let readings = record
            .readings
            .iter()
            .map(|r| Value::Array(vec![Value::from(r.time), reading_value_to_json(&r.value)]))
            .collect();
        entry.insert(READINGS.into(), Value::Array(readings));
    }
    if let Some(uuid) = &record.uuid {
        let text = match uuid {
            Identifier::Text(text) => text.clone(),
            Identifier::Bytes(bytes) => Uuid::from_bytes(*bytes).hyphenated().to_string(),
        };
        entry.insert(UUID.into(), Value::String(text));
    }
    entry
}

fn node_map_to_json(map: &NodeMap) -> Value {
    Value::Object(
        map.iter()
            .map(|(key, node)| {
                let value = match node {
                    Node::Leaf(s) => Value::String(s.clone()),
                    Node::Map(children) => node_map_to_json(children),
                };
                (key.clone(), value)
            })
            .collect(),
    )
}

fn reading_value_to_json(value: &ReadingValue) -> Value {
    match value {
        ReadingValue::Number(n) if n.fract() == 0.0 && n.abs() < MAX_EXACT_INTEGER => {
            Value::from(*n as i64)
        }
        // Non-finite values have no JSON form.
        ReadingValue::Number(n) => serde_json::Number::from_f64(*n)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ReadingValue::Text(s) => Value::String(s.clone()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const FIXTURE: &str = r#"
{
    "/": { "Contents": ["fast"] },
    "/fast": { "Contents": ["sensor0"] },
    "/fast/sensor0": {
        "Properties": {
            "ReadingType": "long",
            "Timezone": "America/Los_Angeles",
            "UnitofMeasure": "V",
            "UnitofTime": "s"
        },
        "Metadata": {
            "Site": "Test Site",
            "Nested": { "key": "value", "other": "value" }
        },
        "Readings": [[9182731928374, 30]],
        "uuid": "b86df176-6b40-5d58-8f29-3b85f5cfbf1e"
    }
}
"#;

    #[test]
    fn test_fixture_parses_in_file_order() {
        // Act
        let doc = document_from_str(FIXTURE).unwrap();

        // Assert
        let paths: Vec<&str> = doc.iter().map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["/", "/fast", "/fast/sensor0"]);
        let sensor = doc.get("/fast/sensor0").unwrap();
        assert_eq!(sensor.properties.len(), 4);
        assert_eq!(sensor.readings, vec![Reading::new(9_182_731_928_374, 30.0)]);
        assert_eq!(
            sensor.uuid,
            Some(Identifier::Text("b86df176-6b40-5d58-8f29-3b85f5cfbf1e".into()))
        );
        let nested = sensor.metadata.get("Nested").and_then(Node::as_map).unwrap();
        assert_eq!(nested.get("key").and_then(Node::as_leaf), Some("value"));
    }

    #[test]
    fn test_metadata_scalars_are_stringified() {
        let doc = document_from_json(&json!({
            "/a": { "Metadata": { "Floor": 4, "Active": true, "Ratio": 0.5, "Gone": null } }
        }))
        .unwrap();

        let metadata = &doc.get("/a").unwrap().metadata;
        assert_eq!(metadata.get("Floor").and_then(Node::as_leaf), Some("4"));
        assert_eq!(metadata.get("Active").and_then(Node::as_leaf), Some("true"));
        assert_eq!(metadata.get("Ratio").and_then(Node::as_leaf), Some("0.5"));
        assert_eq!(metadata.get("Gone").and_then(Node::as_leaf), Some("null"));
    }

    #[test]
    fn test_property_object_is_kept_as_map() {
        let doc = document_from_json(&json!({
            "/a": { "Properties": { "Unit": { "si": "V" } } }
        }))
        .unwrap();

        let properties = &doc.get("/a").unwrap().properties;
        assert!(properties.get("Unit").and_then(Node::as_map).is_some());
    }

    #[test]
    fn test_reading_values_keep_their_kind() {
        let doc = document_from_json(&json!({
            "/a": { "Readings": [[1, 2.5], [2, "3.5"], [3, [1]]] }
        }))
        .unwrap();

        let readings = &doc.get("/a").unwrap().readings;
        assert_eq!(readings[0].value, ReadingValue::Number(2.5));
        assert_eq!(readings[1].value, ReadingValue::Text("3.5".into()));
        assert_eq!(readings[2].value, ReadingValue::Text("[1]".into()));
    }

    #[test]
    fn test_fractional_timestamp_is_rejected() {
        let err = document_from_json(&json!({ "/a": { "Readings": [[1.5, 2]] } })).unwrap_err();
        assert!(matches!(
            err,
            JsonDocumentError::InvalidTimestamp { ref path, index: 0 } if path == "/a"
        ));
    }

    #[test]
    fn test_reading_that_is_not_a_pair_is_rejected() {
        let err = document_from_json(&json!({ "/a": { "Readings": [[1, 2, 3]] } })).unwrap_err();
        assert!(matches!(
            err,
            JsonDocumentError::InvalidField { field: "Readings", .. }
        ));
    }

    #[test]
    fn test_non_string_contents_is_rejected() {
        let err = document_from_json(&json!({ "/a": { "Contents": ["x", 1] } })).unwrap_err();
        assert!(matches!(
            err,
            JsonDocumentError::InvalidField { field: "Contents", .. }
        ));
    }

    #[test]
    fn test_non_string_uuid_is_rejected() {
        let err = document_from_json(&json!({ "/a": { "uuid": 7 } })).unwrap_err();
        assert!(matches!(err, JsonDocumentError::InvalidField { field: "uuid", .. }));
    }

    #[test]
    fn test_root_and_entry_shapes_are_checked() {
        assert!(matches!(
            document_from_json(&json!([1, 2])),
            Err(JsonDocumentError::RootNotAnObject)
        ));
        assert!(matches!(
            document_from_json(&json!({ "/a": "nope" })),
            Err(JsonDocumentError::EntryNotAnObject { .. })
        ));
        assert!(matches!(
            document_from_str("{ not json"),
            Err(JsonDocumentError::Parse(_))
        ));
    }

    #[test]
    fn test_render_round_trips_fixture() {
        // Arrange
        let input: Value = serde_json::from_str(FIXTURE).unwrap();

        // Act
        let rendered = document_to_json(&document_from_json(&input).unwrap());

        // Assert
        assert_eq!(rendered, input);
    }

    #[test]
    fn test_render_raw_identifier_and_fractional_reading() {
        let mut doc = Document::new();
        doc.insert(
            "/a",
            PathRecord {
                readings: vec![Reading::new(1, 0.25)],
                uuid: Some(Identifier::Bytes([0xAB; 16])),
                ..Default::default()
            },
        );

        let rendered = document_to_json(&doc);

        assert_eq!(
            rendered,
            json!({
                "/a": {
                    "Readings": [[1, 0.25]],
                    "uuid": "abababab-abab-abab-abab-abababababab"
                }
            })
        );
    }
}
