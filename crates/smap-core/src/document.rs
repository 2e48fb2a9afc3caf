//! The nested document model exchanged with producers and consumers.
//!
//! A [`Document`] maps hierarchical paths to [`PathRecord`]s.  Metadata and
//! properties are trees of [`Node`]s: either a scalar leaf rendered as a
//! string, or a nested map.  The closed enum replaces runtime type
//! inspection of an untyped tree.

use std::fmt;

use indexmap::IndexMap;
use uuid::Uuid;

/// Insertion-ordered map of child nodes.
///
/// Equality ignores order: two maps are equal when they hold the same keys
/// with equal values.
pub type NodeMap = IndexMap<String, Node>;

/// One node of a metadata or property tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// A scalar value, already rendered as text.
    Leaf(String),
    /// A nested map of named children.
    Map(NodeMap),
}

impl Node {
    /// Returns the leaf text, or `None` for a map.
    pub fn as_leaf(&self) -> Option<&str> {
        match self {
            Node::Leaf(value) => Some(value),
            Node::Map(_) => None,
        }
    }

    /// Returns the child map, or `None` for a leaf.
    pub fn as_map(&self) -> Option<&NodeMap> {
        match self {
            Node::Leaf(_) => None,
            Node::Map(children) => Some(children),
        }
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Node::Leaf(value.to_string())
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Node::Leaf(value)
    }
}

impl From<NodeMap> for Node {
    fn from(children: NodeMap) -> Self {
        Node::Map(children)
    }
}

/// Stream identifier as supplied by a producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    /// Textual UUID, e.g. `b86df176-6b40-5d58-8f29-3b85f5cfbf1e`.
    Text(String),
    /// The 16 raw bytes.
    Bytes([u8; 16]),
}

impl From<Uuid> for Identifier {
    fn from(uuid: Uuid) -> Self {
        Identifier::Text(uuid.hyphenated().to_string())
    }
}

impl From<&str> for Identifier {
    fn from(text: &str) -> Self {
        Identifier::Text(text.to_string())
    }
}

/// The value half of a reading.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadingValue {
    Number(f64),
    /// Text that must parse as a number when the record is built.
    Text(String),
}

impl From<f64> for ReadingValue {
    fn from(value: f64) -> Self {
        ReadingValue::Number(value)
    }
}

impl From<i64> for ReadingValue {
    fn from(value: i64) -> Self {
        ReadingValue::Number(value as f64)
    }
}

impl fmt::Display for ReadingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadingValue::Number(n) => write!(f, "{n}"),
            ReadingValue::Text(t) => f.write_str(t),
        }
    }
}

/// One time-series sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    /// Timestamp as supplied by the producer (unit is not interpreted).
    pub time: i64,
    pub value: ReadingValue,
}

impl Reading {
    pub fn new(time: i64, value: impl Into<ReadingValue>) -> Self {
        Self {
            time,
            value: value.into(),
        }
    }
}

/// Everything known about one path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathRecord {
    /// Names of child paths (collections only).
    pub contents: Vec<String>,
    /// Flat properties; every value must be a [`Node::Leaf`].
    pub properties: NodeMap,
    /// Arbitrarily nested metadata.
    pub metadata: NodeMap,
    /// Samples in source order.
    pub readings: Vec<Reading>,
    /// Stream identifier; collections usually have none.
    pub uuid: Option<Identifier>,
}

/// Mapping from path to record, iterated in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    entries: IndexMap<String, PathRecord>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the record at `path`, returning the previous one.
    pub fn insert(&mut self, path: impl Into<String>, record: PathRecord) -> Option<PathRecord> {
        self.entries.insert(path.into(), record)
    }

    pub fn get(&self, path: &str) -> Option<&PathRecord> {
        self.entries.get(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(path, record)` in the current entry order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PathRecord)> {
        self.entries.iter().map(|(path, record)| (path.as_str(), record))
    }

    /// Reorders entries lexicographically by path so that encoding is
    /// deterministic regardless of how the document was assembled.
    pub fn sort_paths(&mut self) {
        self.entries.sort_keys();
    }
}

impl FromIterator<(String, PathRecord)> for Document {
    fn from_iter<T: IntoIterator<Item = (String, PathRecord)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Document {
    type Item = (String, PathRecord);
    type IntoIter = indexmap::map::IntoIter<String, PathRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
