//! Bidirectional mapping between nested metadata and flat key-path pairs.
//!
//! The wire schema only carries flat `{key, value}` lists.  Nested metadata
//! such as
//!
//! ```text
//! { "Site": "Test Site", "Nested": { "key": "value" } }
//! ```
//!
//! is flattened into `[("Site", "Test Site"), ("Nested/key", "value")]` and
//! rebuilt on the receiving side by splitting each key on the separator.
//!
//! Keys that legitimately contain the separator can be exempted from
//! splitting with a [`Suppression`] entry in the [`KeyPathConfig`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::{Node, NodeMap};

/// Separator used when no other is configured.
pub const DEFAULT_SEPARATOR: &str = "/";

/// Errors produced while rebuilding a nested map from flat pairs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyPathError {
    /// A path segment would have to be both a leaf value and an inner map,
    /// e.g. both `"a"` and `"a/b"` are present.
    #[error("conflicting key path '{key}': a segment is both a leaf and a map")]
    ConflictingPath { key: String },

    /// The configured separator is the empty string.
    #[error("key path separator must not be empty")]
    EmptySeparator,
}

/// A key (or family of keys) that is kept as one atomic top-level key
/// instead of being split on the separator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Suppression {
    /// Matches a key that is exactly this string.
    Exact(String),
    /// Matches every key starting with this string.
    Prefix(String),
}

impl Suppression {
    /// Returns `true` if `key` must be left unsplit.
    pub fn matches(&self, key: &str) -> bool {
        match self {
            Suppression::Exact(exact) => key == exact,
            Suppression::Prefix(prefix) => key.starts_with(prefix.as_str()),
        }
    }
}

/// Immutable key-path settings shared by every flatten/unflatten call.
///
/// Loadable from TOML:
///
/// ```toml
/// separator = "/"
/// suppressed = [{ exact = "Location/Raw" }, { prefix = "Extra/" }]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPathConfig {
    #[serde(default = "default_separator")]
    pub separator: String,
    #[serde(default)]
    pub suppressed: Vec<Suppression>,
}

fn default_separator() -> String {
    DEFAULT_SEPARATOR.to_string()
}

impl Default for KeyPathConfig {
    fn default() -> Self {
        Self {
            separator: default_separator(),
            suppressed: Vec::new(),
        }
    }
}

impl KeyPathConfig {
    /// Creates a config with a custom separator and no suppressions.
    pub fn with_separator(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
            suppressed: Vec::new(),
        }
    }

    /// Adds a suppression entry, builder style.
    pub fn suppress(mut self, suppression: Suppression) -> Self {
        self.suppressed.push(suppression);
        self
    }

    /// Returns `true` if any suppression entry matches `key`.
    pub fn is_suppressed(&self, key: &str) -> bool {
        self.suppressed.iter().any(|s| s.matches(key))
    }
}

/// Flattens `node` into an ordered list of `(joined_key, leaf)` pairs.
///
/// Keys are joined to `prefix` with the configured separator; an empty
/// `prefix` means top level.  The output is a pre-order traversal in the
/// map's own iteration order.  Empty nested maps contribute no pairs.
///
/// # Examples
///
/// ```rust
/// use smap_core::{flatten, KeyPathConfig, Node, NodeMap};
///
/// let mut nested = NodeMap::new();
/// nested.insert("key".into(), Node::from("value"));
/// let mut metadata = NodeMap::new();
/// metadata.insert("Site".into(), Node::from("Test Site"));
/// metadata.insert("Nested".into(), Node::Map(nested));
///
/// let pairs = flatten("", &metadata, &KeyPathConfig::default());
/// assert_eq!(
///     pairs,
///     vec![
///         ("Site".to_string(), "Test Site".to_string()),
///         ("Nested/key".to_string(), "value".to_string()),
///     ]
/// );
/// ```
pub fn flatten(prefix: &str, node: &NodeMap, config: &KeyPathConfig) -> Vec<(String, String)> {
    let mut out = Vec::new();
    flatten_into(prefix, node, &config.separator, &mut out);
    out
}

fn flatten_into(prefix: &str, node: &NodeMap, separator: &str, out: &mut Vec<(String, String)>) {
    for (key, value) in node {
        let child_key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}{separator}{key}")
        };
        match value {
            Node::Map(children) => flatten_into(&child_key, children, separator, out),
            Node::Leaf(leaf) => out.push((child_key, leaf.clone())),
        }
    }
}

/// Rebuilds a nested map from flat `(key, value)` pairs.
///
/// Suppressed keys are inserted at top level without splitting.  A key that
/// repeats an existing leaf overwrites it (last write wins).
///
/// # Errors
///
/// Returns [`KeyPathError::ConflictingPath`] when a segment is required to be
/// both a leaf and a map, in whichever order the two keys arrive, and
/// [`KeyPathError::EmptySeparator`] if the separator is empty.
pub fn unflatten<'a, I>(pairs: I, config: &KeyPathConfig) -> Result<NodeMap, KeyPathError>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    if config.separator.is_empty() {
        return Err(KeyPathError::EmptySeparator);
    }

    let mut root = NodeMap::new();
    for (key, value) in pairs {
        if config.is_suppressed(key) {
            assign_leaf(&mut root, key, key, value)?;
            continue;
        }

        let segments: Vec<&str> = key.split(config.separator.as_str()).collect();
        let Some((last, parents)) = segments.split_last() else {
            continue;
        };

        let mut current = &mut root;
        for segment in parents {
            let next = current
                .entry((*segment).to_string())
                .or_insert_with(|| Node::Map(NodeMap::new()));
            current = match next {
                Node::Map(children) => children,
                Node::Leaf(_) => return Err(conflict(key)),
            };
        }
        assign_leaf(current, last, key, value)?;
    }
    Ok(root)
}

fn assign_leaf(map: &mut NodeMap, segment: &str, key: &str, value: &str) -> Result<(), KeyPathError> {
    match map.get_mut(segment) {
        Some(Node::Map(_)) => Err(conflict(key)),
        Some(Node::Leaf(existing)) => {
            *existing = value.to_string();
            Ok(())
        }
        None => {
            map.insert(segment.to_string(), Node::Leaf(value.to_string()));
            Ok(())
        }
    }
}

fn conflict(key: &str) -> KeyPathError {
    KeyPathError::ConflictingPath {
        key: key.to_string(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
