//! Name trees (ISO 32000-1 §7.9.6).
//!
//! A name tree maps byte-string keys to values, sorted by key. Leaves carry a
//! flat `/Names [key value key value ...]` array; intermediate nodes carry
//! `/Kids` and the `/Limits [first last]` of their subtree.
//!
//! [`NameTree`] reads a whole tree into a sorted list, is edited in memory and
//! written back as a freshly balanced tree.

use crate::document::Document;
use crate::error::Result;
use crate::object::{Dictionary, Object, ObjectRef};
use std::collections::HashSet;

/// Maximum number of entries in one leaf (and kids in one intermediate node)
/// of a written tree.
pub const NAME_TREE_LEAF_SIZE: usize = 32;

/// The flattened contents of a name tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NameTree {
    entries: Vec<(Vec<u8>, Object)>,
    /// Indirect nodes seen while reading; they are replaced when the tree is
    /// written back
    nodes: Vec<ObjectRef>,
}

impl NameTree {
    /// An empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every entry reachable from `root` (a node dictionary or a reference
    /// to one), in tree order.
    ///
    /// Nodes already visited are skipped, so a `/Kids` cycle cannot loop.
    /// Malformed entries are logged and skipped.
    pub fn read(doc: &mut Document, root: &Object) -> Result<Self> {
        let mut tree = Self::new();
        let mut visited = HashSet::new();
        let mut stack = vec![root.clone()];

        while let Some(node) = stack.pop() {
            let node = match node {
                Object::Reference(id) => {
                    if !visited.insert(id) {
                        log::warn!("Name tree node {} visited twice; skipping", id);
                        continue;
                    }
                    tree.nodes.push(id);
                    doc.get(id)?
                },
                direct => direct,
            };
            let Some(dict) = node.as_dict() else {
                log::warn!("Name tree node is a {}, not a dictionary", node.type_name());
                continue;
            };

            if let Some(names) = dict.get("Names") {
                let names = doc.resolve(names)?;
                let pairs = names.as_array().map(Vec::as_slice).unwrap_or_default();
                if pairs.len() % 2 != 0 {
                    log::warn!("Name tree leaf has an odd number of items ({})", pairs.len());
                }
                for pair in pairs.chunks_exact(2) {
                    match doc.resolve(&pair[0])? {
                        Object::String(key) => tree.entries.push((key, pair[1].clone())),
                        other => log::warn!("Ignoring name tree key of type {}", other.type_name()),
                    }
                }
            }

            if let Some(kids) = dict.get("Kids") {
                let kids = doc.resolve(kids)?;
                if let Some(kids) = kids.as_array() {
                    // Reversed so the leftmost kid is read first
                    stack.extend(kids.iter().rev().cloned());
                }
            }
        }

        Ok(tree)
    }

    /// Entries in key order.
    pub fn entries(&self) -> impl Iterator<Item = (&[u8], &Object)> + '_ {
        self.entries.iter().map(|(key, value)| (key.as_slice(), value))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the tree has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Value stored under `key`.
    pub fn get(&self, key: &[u8]) -> Option<&Object> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, value)| value)
    }

    /// True if `key` is present.
    pub fn contains(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Insert `key` at its sorted position. Returns false (and changes nothing)
    /// if the key already exists.
    pub fn insert(&mut self, key: Vec<u8>, value: Object) -> bool {
        if self.contains(&key) {
            return false;
        }
        let at = self.entries.partition_point(|(k, _)| *k < key);
        self.entries.insert(at, (key, value));
        true
    }

    /// Remove `key`, returning its value.
    pub fn remove(&mut self, key: &[u8]) -> Option<Object> {
        let at = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(at).1)
    }

    /// Indirect node objects the tree was read from.
    pub fn nodes(&self) -> &[ObjectRef] {
        &self.nodes
    }

    /// Build the tree in `doc` and return the root node dictionary.
    ///
    /// Up to [`NAME_TREE_LEAF_SIZE`] entries fit in the root itself. Larger trees
    /// get leaves and intermediate nodes as new indirect objects; the root then
    /// holds only `/Kids`.
    pub fn write(&self, doc: &mut Document) -> Dictionary {
        let mut root = Dictionary::new();
        if self.entries.len() <= NAME_TREE_LEAF_SIZE {
            root.insert("Names".to_string(), names_array(&self.entries));
            return root;
        }

        let mut level: Vec<(Vec<u8>, Vec<u8>, ObjectRef)> = self
            .entries
            .chunks(NAME_TREE_LEAF_SIZE)
            .map(|chunk| {
                let first = chunk[0].0.clone();
                let last = chunk[chunk.len() - 1].0.clone();
                let mut leaf = Dictionary::new();
                leaf.insert("Limits".to_string(), limits(&first, &last));
                leaf.insert("Names".to_string(), names_array(chunk));
                (first, last, doc.put(Object::Dictionary(leaf)))
            })
            .collect();

        while level.len() > NAME_TREE_LEAF_SIZE {
            level = level
                .chunks(NAME_TREE_LEAF_SIZE)
                .map(|group| {
                    let first = group[0].0.clone();
                    let last = group[group.len() - 1].1.clone();
                    let mut node = Dictionary::new();
                    node.insert("Limits".to_string(), limits(&first, &last));
                    node.insert(
                        "Kids".to_string(),
                        Object::Array(group.iter().map(|(_, _, id)| Object::Reference(*id)).collect()),
                    );
                    (first, last, doc.put(Object::Dictionary(node)))
                })
                .collect();
        }

        root.insert(
            "Kids".to_string(),
            Object::Array(level.iter().map(|(_, _, id)| Object::Reference(*id)).collect()),
        );
        log::debug!("Wrote name tree with {} entries, {} top-level kids", self.entries.len(), level.len());
        root
    }
}

fn names_array(entries: &[(Vec<u8>, Object)]) -> Object {
    Object::Array(
        entries
            .iter()
            .flat_map(|(key, value)| [Object::String(key.clone()), value.clone()])
            .collect(),
    )
}

fn limits(first: &[u8], last: &[u8]) -> Object {
    Object::Array(vec![Object::string(first), Object::string(last)])
}
