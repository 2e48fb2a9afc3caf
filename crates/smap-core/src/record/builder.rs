//! `(path, PathRecord)` → [`WireRecord`].

use std::collections::HashSet;

use uuid::Uuid;

use crate::document::{Identifier, Node, PathRecord, ReadingValue};
use crate::keypath::{flatten, unflatten, KeyPathConfig};
use crate::protocol::messages::{Pair, WireReading, WireRecord};
use crate::record::RecordError;

/// Builds the wire record for one document entry.
///
/// Contents and readings keep their source order, properties keep insertion
/// order, and metadata is flattened with the configured separator.  A record
/// without an identifier is sent with the nil UUID.
///
/// # Errors
///
/// - [`RecordError::MalformedRecord`] for an empty path.
/// - [`RecordError::InvalidIdentifier`] if a textual UUID does not parse.
/// - [`RecordError::InvalidReading`] if a reading value is not a finite
///   number.  `NaN` and the infinities are rejected in either form.
/// - [`RecordError::InvalidProperty`] if a property value is a map.
/// - [`RecordError::ConflictingPath`] if two metadata leaves flatten to the
///   same key, or a flattened key would be both a leaf and an inner node on
///   the receiving side (`a` next to `a/b`).
///
/// # Examples
///
/// ```rust
/// use smap_core::{build_record, KeyPathConfig, PathRecord, Reading};
///
/// let record = PathRecord {
///     readings: vec![Reading::new(9182731928374, 30.0)],
///     uuid: Some("b86df176-6b40-5d58-8f29-3b85f5cfbf1e".into()),
///     ..Default::default()
/// };
/// let wire = build_record("/fast/sensor0", &record, &KeyPathConfig::default()).unwrap();
/// assert_eq!(wire.readings[0].time, 9182731928374);
/// assert_eq!(wire.uuid.as_bytes()[0], 0xb8);
/// ```
pub fn build_record(
    path: &str,
    record: &PathRecord,
    config: &KeyPathConfig,
) -> Result<WireRecord, RecordError> {
    if path.is_empty() {
        return Err(RecordError::MalformedRecord("record path is empty".to_string()));
    }

    let uuid = match &record.uuid {
        None => Uuid::nil(),
        Some(Identifier::Bytes(raw)) => Uuid::from_bytes(*raw),
        Some(Identifier::Text(text)) => {
            Uuid::parse_str(text).map_err(|_| RecordError::InvalidIdentifier {
                path: path.to_string(),
                value: text.clone(),
            })?
        }
    };

    let mut readings = Vec::with_capacity(record.readings.len());
    for (index, reading) in record.readings.iter().enumerate() {
        let data = match &reading.value {
            ReadingValue::Number(n) => Some(*n),
            ReadingValue::Text(text) => text.trim().parse::<f64>().ok(),
        }
        .filter(|n| n.is_finite())
        .ok_or_else(|| RecordError::InvalidReading {
            path: path.to_string(),
            index,
            value: match &reading.value {
                ReadingValue::Number(n) => n.to_string(),
                ReadingValue::Text(text) => text.clone(),
            },
        })?;
        readings.push(WireReading {
            time: reading.time,
            data,
        });
    }

    let mut properties = Vec::with_capacity(record.properties.len());
    for (key, value) in &record.properties {
        match value {
            Node::Leaf(leaf) => properties.push(Pair::new(key.clone(), leaf.clone())),
            Node::Map(_) => {
                return Err(RecordError::InvalidProperty {
                    path: path.to_string(),
                    key: key.clone(),
                })
            }
        }
    }

    let flat = flatten("", &record.metadata, config);
    let mut seen = HashSet::with_capacity(flat.len());
    for (key, _) in &flat {
        if !seen.insert(key.as_str()) {
            return Err(RecordError::ConflictingPath {
                path: path.to_string(),
                key: key.clone(),
            });
        }
    }
    unflatten(flat.iter().map(|(k, v)| (k.as_str(), v.as_str())), config)
        .map_err(|e| RecordError::from_key_path(path, e))?;
    let metadata = flat
        .into_iter()
        .map(|(key, value)| Pair { key, value })
        .collect();

    Ok(WireRecord {
        path: path.to_string(),
        uuid,
        contents: record.contents.clone(),
        readings,
        properties,
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{NodeMap, Reading};
    use crate::keypath::Suppression;

    fn config() -> KeyPathConfig {
        KeyPathConfig::default()
    }

    fn sensor_record() -> PathRecord {
        let mut properties = NodeMap::new();
        properties.insert("UnitofMeasure".into(), Node::from("V"));
        let mut nested = NodeMap::new();
        nested.insert("key".into(), Node::from("value"));
        let mut metadata = NodeMap::new();
        metadata.insert("Site".into(), Node::from("Test Site"));
        metadata.insert("Nested".into(), Node::Map(nested));
        PathRecord {
            contents: vec![],
            properties,
            metadata,
            readings: vec![Reading::new(9_182_731_928_374, 30i64)],
            uuid: Some("b86df176-6b40-5d58-8f29-3b85f5cfbf1e".into()),
        }
    }

    #[test]
    fn test_build_sensor_record() {
        // Arrange
        let record = sensor_record();

        // Act
        let wire = build_record("/fast/sensor0", &record, &config()).unwrap();

        // Assert
        assert_eq!(wire.path, "/fast/sensor0");
        assert_eq!(
            wire.metadata,
            vec![Pair::new("Site", "Test Site"), Pair::new("Nested/key", "value")]
        );
        assert_eq!(
            wire.readings,
            vec![WireReading {
                time: 9_182_731_928_374,
                data: 30.0
            }]
        );
        assert_eq!(wire.properties, vec![Pair::new("UnitofMeasure", "V")]);
        assert_eq!(
            wire.uuid.as_bytes(),
            &[
                0xb8, 0x6d, 0xf1, 0x76, 0x6b, 0x40, 0x5d, 0x58, 0x8f, 0x29, 0x3b, 0x85, 0xf5, 0xcf,
                0xbf, 0x1e
            ]
        );
    }

    #[test]
    fn test_absent_fields_become_empty_lists_and_nil_uuid() {
        let record = PathRecord {
            contents: vec!["fast".into()],
            ..Default::default()
        };

        let wire = build_record("/", &record, &config()).unwrap();

        assert_eq!(wire.contents, vec!["fast".to_string()]);
        assert!(wire.readings.is_empty());
        assert!(wire.properties.is_empty());
        assert!(wire.metadata.is_empty());
        assert!(wire.uuid.is_nil());
    }

    #[test]
    fn test_raw_identifier_bytes_are_copied() {
        let raw = [7u8; 16];
        let record = PathRecord {
            uuid: Some(Identifier::Bytes(raw)),
            ..Default::default()
        };
        let wire = build_record("/a", &record, &config()).unwrap();
        assert_eq!(wire.uuid.as_bytes(), &raw);
    }

    #[test]
    fn test_invalid_identifier_text_fails() {
        let record = PathRecord {
            uuid: Some("not-a-uuid".into()),
            ..Default::default()
        };
        let err = build_record("/a", &record, &config()).unwrap_err();
        assert_eq!(
            err,
            RecordError::InvalidIdentifier {
                path: "/a".into(),
                value: "not-a-uuid".into()
            }
        );
    }

    #[test]
    fn test_numeric_text_reading_is_parsed() {
        let record = PathRecord {
            readings: vec![Reading::new(1, ReadingValue::Text(" 12.5 ".into()))],
            ..Default::default()
        };
        let wire = build_record("/a", &record, &config()).unwrap();
        assert_eq!(wire.readings[0].data, 12.5);
    }

    #[test]
    fn test_non_numeric_reading_fails_with_index() {
        let record = PathRecord {
            readings: vec![
                Reading::new(1, 1.0),
                Reading::new(2, ReadingValue::Text("high".into())),
            ],
            ..Default::default()
        };
        let err = build_record("/a", &record, &config()).unwrap_err();
        assert_eq!(
            err,
            RecordError::InvalidReading {
                path: "/a".into(),
                index: 1,
                value: "high".into()
            }
        );
    }

    #[test]
    fn test_readings_keep_source_order_without_dedup() {
        let record = PathRecord {
            readings: vec![Reading::new(3, 1.0), Reading::new(1, 2.0), Reading::new(3, 1.0)],
            ..Default::default()
        };
        let wire = build_record("/a", &record, &config()).unwrap();
        let times: Vec<i64> = wire.readings.iter().map(|r| r.time).collect();
        assert_eq!(times, vec![3, 1, 3]);
    }

    #[test]
    fn test_nested_property_fails() {
        let mut properties = NodeMap::new();
        properties.insert("Timezone".into(), Node::from("America/Los_Angeles"));
        properties.insert("Bad".into(), Node::Map(NodeMap::new()));
        let record = PathRecord {
            properties,
            ..Default::default()
        };
        let err = build_record("/a", &record, &config()).unwrap_err();
        assert_eq!(
            err,
            RecordError::InvalidProperty {
                path: "/a".into(),
                key: "Bad".into()
            }
        );
    }

    #[test]
    fn test_properties_keep_insertion_order() {
        let mut properties = NodeMap::new();
        for key in ["ReadingType", "Timezone", "UnitofMeasure", "UnitofTime"] {
            properties.insert(key.into(), Node::from("x"));
        }
        let record = PathRecord {
            properties,
            ..Default::default()
        };
        let wire = build_record("/a", &record, &config()).unwrap();
        let keys: Vec<&str> = wire.properties.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["ReadingType", "Timezone", "UnitofMeasure", "UnitofTime"]);
    }

    #[test]
    fn test_colliding_metadata_paths_fail() {
        // {"a": {"b": "1"}, "a/b": "2"} flattens "a/b" twice
        let mut inner = NodeMap::new();
        inner.insert("b".into(), Node::from("1"));
        let mut metadata = NodeMap::new();
        metadata.insert("a".into(), Node::Map(inner));
        metadata.insert("a/b".into(), Node::from("2"));
        let record = PathRecord {
            metadata,
            ..Default::default()
        };

        let err = build_record("/a", &record, &config()).unwrap_err();

        assert_eq!(
            err,
            RecordError::ConflictingPath {
                path: "/a".into(),
                key: "a/b".into()
            }
        );
    }

    #[test]
    fn test_leaf_beside_nested_key_fails() {
        // {"a": "1", "a/b": "2"} has unique flat keys but "a" cannot be both
        let mut metadata = NodeMap::new();
        metadata.insert("a".into(), Node::from("1"));
        metadata.insert("a/b".into(), Node::from("2"));
        let record = PathRecord {
            metadata,
            ..Default::default()
        };

        let err = build_record("/x", &record, &config()).unwrap_err();

        assert_eq!(
            err,
            RecordError::ConflictingPath {
                path: "/x".into(),
                key: "a/b".into()
            }
        );
    }

    #[test]
    fn test_suppressed_key_beside_leaf_is_allowed() {
        // "a/c" stays unsplit on the receiving side, so it never needs "a" as a map
        let config = KeyPathConfig::default().suppress(Suppression::Exact("a/c".into()));
        let mut metadata = NodeMap::new();
        metadata.insert("a".into(), Node::from("1"));
        metadata.insert("a/c".into(), Node::from("2"));
        let record = PathRecord {
            metadata,
            ..Default::default()
        };

        let wire = build_record("/x", &record, &config).unwrap();

        assert_eq!(wire.metadata, vec![Pair::new("a", "1"), Pair::new("a/c", "2")]);
    }

    #[test]
    fn test_non_finite_readings_fail() {
        for (value, shown) in [
            (ReadingValue::Text("NaN".into()), "NaN"),
            (ReadingValue::Text(" inf ".into()), " inf "),
            (ReadingValue::Number(f64::NEG_INFINITY), "-inf"),
        ] {
            let record = PathRecord {
                readings: vec![Reading::new(1, value)],
                ..Default::default()
            };
            let err = build_record("/a", &record, &config()).unwrap_err();
            assert_eq!(
                err,
                RecordError::InvalidReading {
                    path: "/a".into(),
                    index: 0,
                    value: shown.into()
                }
            );
        }
    }

    #[test]
    fn test_empty_path_is_malformed() {
        let err = build_record("", &PathRecord::default(), &config()).unwrap_err();
        assert!(matches!(err, RecordError::MalformedRecord(_)));
    }
}
