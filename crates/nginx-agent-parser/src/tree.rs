//! The merged configuration tree.
//!
//! Every file reachable from the root is merged into one [`ConfigTree`]. Leaf
//! values and block headers carry an index handle: a position in the
//! append-only [`IndexList`] that records which file and line they came from.
//!
//! # Tree Structure
//!
//! ```text
//! ConfigTree
//!  └─ name -> ConfigValue
//!       ├─ Leaf       (value, handle)          listen 80;
//!       ├─ Block      (ConfigTree, handle)     events { ... }
//!       ├─ Compound   (args -> ConfigValue)    location /status { ... }
//!       └─ List       (Vec<ConfigValue>)       server { } server { }
//! ```
//!
//! # Example
//!
//! ```
//! use nginx_agent_parser::{ConfigTree, ConfigValue, IndexList};
//!
//! let mut index = IndexList::new();
//! let mut tree = ConfigTree::default();
//! tree.append("gzip", ConfigValue::leaf("on", index.push(0, 3)));
//! tree.append("gzip", ConfigValue::leaf("off", index.push(0, 9)));
//!
//! let values: Vec<_> = tree.get("gzip").unwrap().items().iter().filter_map(|v| v.as_text()).collect();
//! assert_eq!(values, ["on", "off"]);
//! assert_eq!(index.get(1).unwrap().line, 9);
//! ```

use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Location of a tree value: registry index of the file and 1-based line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexEntry {
    pub file: usize,
    pub line: usize,
}

/// Append-only list of source locations referenced by tree values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct IndexList {
    entries: Vec<IndexEntry>,
}

impl IndexList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a location and returns its handle.
    pub fn push(&mut self, file: usize, line: usize) -> usize {
        self.entries.push(IndexEntry { file, line });
        self.entries.len() - 1
    }

    pub fn get(&self, handle: usize) -> Option<IndexEntry> {
        self.entries.get(handle).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.iter()
    }
}

/// A value stored under a directive name.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    /// Raw directive value with its index handle.
    Leaf { value: String, index: usize },
    /// Block body with the handle of its header.
    Block { tree: ConfigTree, index: usize },
    /// Blocks keyed by their normalized header arguments
    /// (`location`, `upstream`, `map`, `if`), or log formats keyed by name.
    Compound(BTreeMap<String, ConfigValue>),
    /// Repeated directives or blocks, in the order they were read.
    List(Vec<ConfigValue>),
}

impl ConfigValue {
    pub fn leaf(value: impl Into<String>, index: usize) -> Self {
        ConfigValue::Leaf {
            value: value.into(),
            index,
        }
    }

    /// Returns the leaf text, if this is a leaf.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ConfigValue::Leaf { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Returns the block body, if this is a block.
    pub fn as_block(&self) -> Option<&ConfigTree> {
        match self {
            ConfigValue::Block { tree, .. } => Some(tree),
            _ => None,
        }
    }

    pub fn as_compound(&self) -> Option<&BTreeMap<String, ConfigValue>> {
        match self {
            ConfigValue::Compound(entries) => Some(entries),
            _ => None,
        }
    }

    /// The index handle of a leaf or block.
    pub fn index(&self) -> Option<usize> {
        match self {
            ConfigValue::Leaf { index, .. } | ConfigValue::Block { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Views the value as a sequence: the elements of a list, or the value itself.
    pub fn items(&self) -> &[ConfigValue] {
        match self {
            ConfigValue::List(items) => items,
            other => std::slice::from_ref(other),
        }
    }

    /// Returns a copy without index handles.
    pub fn simplify(&self) -> SimpleValue {
        match self {
            ConfigValue::Leaf { value, .. } => SimpleValue::Text(value.clone()),
            ConfigValue::Block { tree, .. } => tree.simplify(),
            ConfigValue::Compound(entries) => SimpleValue::Tree(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.simplify()))
                    .collect(),
            ),
            ConfigValue::List(items) => {
                SimpleValue::List(items.iter().map(ConfigValue::simplify).collect())
            }
        }
    }
}

/// Leaves and blocks serialize as `[value, handle]` pairs.
impl Serialize for ConfigValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ConfigValue::Leaf { value, index } => (value, index).serialize(serializer),
            ConfigValue::Block { tree, index } => (tree, index).serialize(serializer),
            ConfigValue::Compound(entries) => entries.serialize(serializer),
            ConfigValue::List(items) => items.serialize(serializer),
        }
    }
}

/// Directive name to value mapping for one block (or the top level).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ConfigTree(BTreeMap<String, ConfigValue>);

impl ConfigTree {
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ConfigValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Stores a value; a second value under the same key turns the entry into a list.
    pub fn append(&mut self, key: &str, value: ConfigValue) {
        let merged = match self.0.remove(key) {
            None => value,
            Some(ConfigValue::List(mut items)) => {
                items.push(value);
                ConfigValue::List(items)
            }
            Some(existing) => ConfigValue::List(vec![existing, value]),
        };
        self.0.insert(key.to_string(), merged);
    }

    /// Stores a value in a list under `key`, even when it is the first one.
    pub fn append_to_list(&mut self, key: &str, value: ConfigValue) {
        let items = match self.0.remove(key) {
            None => vec![value],
            Some(ConfigValue::List(mut items)) => {
                items.push(value);
                items
            }
            Some(existing) => vec![existing, value],
        };
        self.0.insert(key.to_string(), ConfigValue::List(items));
    }

    /// Stores a value under `key`/`sub_key`. A later value with the same pair
    /// replaces the earlier one.
    pub fn insert_compound(&mut self, key: &str, sub_key: String, value: ConfigValue) {
        match self.0.get_mut(key) {
            Some(ConfigValue::Compound(entries)) => {
                entries.insert(sub_key, value);
            }
            _ => {
                self.0.insert(
                    key.to_string(),
                    ConfigValue::Compound(BTreeMap::from([(sub_key, value)])),
                );
            }
        }
    }

    /// Returns a copy of the tree without index handles.
    pub fn simplify(&self) -> SimpleValue {
        SimpleValue::Tree(
            self.0
                .iter()
                .map(|(key, value)| (key.clone(), value.simplify()))
                .collect(),
        )
    }
}

/// A tree value stripped of index handles, for display and debugging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SimpleValue {
    Text(String),
    Tree(BTreeMap<String, SimpleValue>),
    List(Vec<SimpleValue>),
}

impl SimpleValue {
    pub fn get(&self, key: &str) -> Option<&SimpleValue> {
        match self {
            SimpleValue::Tree(entries) => entries.get(key),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SimpleValue::Text(text) => Some(text),
            _ => None,
        }
    }
}
