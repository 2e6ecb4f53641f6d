//! Per-run attribute and attribute-path identity store.
//!
//! Attributes are interned by URI and paths by canonical string, so every
//! logical identity exists once per run no matter how often the walker
//! reaches it. Nothing here touches persistence.

use schemapath_model::{uri::relative_uri_part, ATTRIBUTE_DELIMITER};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PathId(usize);

#[derive(Debug, Clone)]
struct RegisteredAttribute {
    uri: String,
    name: String,
}

#[derive(Debug, Clone)]
struct RegisteredPath {
    attributes: Vec<AttributeId>,
    key: String,
    multivalue: Option<bool>,
}

/// Ordered set of path ids (insertion order, no duplicates).
#[derive(Debug, Clone, Default)]
pub struct PathSet {
    order: Vec<PathId>,
    members: HashSet<PathId>,
}

impl PathSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if `id` was already present.
    pub fn insert(&mut self, id: PathId) -> bool {
        if self.members.insert(id) {
            self.order.push(id);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, id: PathId) -> bool {
        self.members.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = PathId> + '_ {
        self.order.iter().copied()
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    attributes: Vec<RegisteredAttribute>,
    attribute_index: HashMap<String, AttributeId>,
    paths: Vec<RegisteredPath>,
    path_index: HashMap<String, PathId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create_attribute(&mut self, uri: &str) -> AttributeId {
        if let Some(id) = self.attribute_index.get(uri) {
            return *id;
        }
        let id = AttributeId(self.attributes.len());
        self.attributes.push(RegisteredAttribute {
            uri: uri.to_string(),
            name: relative_uri_part(uri).to_string(),
        });
        self.attribute_index.insert(uri.to_string(), id);
        id
    }

    /// Extend `prefix` (or the empty path) by `uri` and record the result in
    /// `paths`.
    ///
    /// An already registered path keeps its identity; its `multivalue` is
    /// only ever raised (unset → false → true), never lowered.
    pub fn add_attribute_path(
        &mut self,
        uri: &str,
        multivalue: Option<bool>,
        paths: &mut PathSet,
        prefix: Option<PathId>,
    ) -> PathId {
        let attribute = self.get_or_create_attribute(uri);

        let (mut attributes, key) = match prefix {
            Some(prefix) => {
                let base = &self.paths[prefix.0];
                let mut key = String::with_capacity(base.key.len() + 1 + uri.len());
                key.push_str(&base.key);
                key.push(ATTRIBUTE_DELIMITER);
                key.push_str(uri);
                (base.attributes.clone(), key)
            }
            None => (Vec::new(), uri.to_string()),
        };

        let id = match self.path_index.get(&key) {
            Some(id) => {
                let existing = &mut self.paths[id.0];
                existing.multivalue = upgrade_multivalue(existing.multivalue, multivalue);
                *id
            }
            None => {
                attributes.push(attribute);
                let id = PathId(self.paths.len());
                self.path_index.insert(key.clone(), id);
                self.paths.push(RegisteredPath {
                    attributes,
                    key,
                    multivalue,
                });
                id
            }
        };

        paths.insert(id);
        id
    }

    pub fn key(&self, id: PathId) -> &str {
        &self.paths[id.0].key
    }

    pub fn multivalue(&self, id: PathId) -> Option<bool> {
        self.paths[id.0].multivalue
    }

    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    pub fn path_count(&self) -> usize {
        self.paths.len()
    }

    /// Snapshot the given paths (in order) into an owned result.
    pub fn materialize(&self, ids: impl IntoIterator<Item = PathId>) -> DerivedPaths {
        let mut derived = DerivedPaths::default();
        for id in ids {
            let path = &self.paths[id.0];
            derived.push(DerivedAttributePath {
                key: path.key.clone(),
                attributes: path
                    .attributes
                    .iter()
                    .map(|attribute| {
                        let attribute = &self.attributes[attribute.0];
                        DerivedAttribute {
                            uri: attribute.uri.clone(),
                            name: attribute.name.clone(),
                        }
                    })
                    .collect(),
                multivalue: path.multivalue,
            });
        }
        derived
    }
}

/// Multivalue only rises: unset → false → true.
pub(crate) fn upgrade_multivalue(current: Option<bool>, incoming: Option<bool>) -> Option<bool> {
    match (current, incoming) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (None, other) => other,
        (Some(false), _) => Some(false),
    }
}

// ============================================================================
// Derived (not yet persisted) attribute paths
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivedAttribute {
    pub uri: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivedAttributePath {
    key: String,
    attributes: Vec<DerivedAttribute>,
    multivalue: Option<bool>,
}

impl DerivedAttributePath {
    /// Canonical string form.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn attributes(&self) -> &[DerivedAttribute] {
        &self.attributes
    }

    pub fn uris(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|a| a.uri.as_str())
    }

    pub fn multivalue(&self) -> Option<bool> {
        self.multivalue
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// Attribute paths of one derivation run, ordered and keyed by canonical
/// string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DerivedPaths {
    paths: Vec<DerivedAttributePath>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl DerivedPaths {
    fn push(&mut self, path: DerivedAttributePath) {
        if self.index.contains_key(&path.key) {
            return;
        }
        self.index.insert(path.key.clone(), self.paths.len());
        self.paths.push(path);
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DerivedAttributePath> {
        self.paths.iter()
    }

    pub fn get(&self, key: &str) -> Option<&DerivedAttributePath> {
        self.index.get(key).map(|idx| &self.paths[*idx])
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(|p| p.key.as_str())
    }
}

impl<'a> IntoIterator for &'a DerivedPaths {
    type Item = &'a DerivedAttributePath;
    type IntoIter = std::slice::Iter<'a, DerivedAttributePath>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemapath_model::path_key;

    const A: &str = "http://x.org/a";
    const B: &str = "http://x.org/b";

    #[test]
    fn same_uri_same_attribute() {
        let mut registry = Registry::new();
        let first = registry.get_or_create_attribute(A);
        let second = registry.get_or_create_attribute(A);
        assert_eq!(first, second);
        assert_eq!(registry.attribute_count(), 1);
    }

    #[test]
    fn paths_extend_their_prefix() {
        let mut registry = Registry::new();
        let mut set = PathSet::new();
        let a = registry.add_attribute_path(A, None, &mut set, None);
        let ab = registry.add_attribute_path(B, Some(true), &mut set, Some(a));

        assert_eq!(registry.key(ab), path_key([A, B]));
        assert_eq!(set.len(), 2);

        let derived = registry.materialize(set.iter());
        let path = derived.get(&path_key([A, B])).unwrap();
        assert_eq!(path.len(), 2);
        assert_eq!(path.attributes()[1].name, "b");
        assert_eq!(path.multivalue(), Some(true));
    }

    #[test]
    fn multivalue_is_never_downgraded() {
        let mut registry = Registry::new();
        let mut set = PathSet::new();

        let id = registry.add_attribute_path(A, None, &mut set, None);
        assert_eq!(registry.multivalue(id), None);

        registry.add_attribute_path(A, Some(false), &mut set, None);
        assert_eq!(registry.multivalue(id), Some(false));

        registry.add_attribute_path(A, Some(true), &mut set, None);
        assert_eq!(registry.multivalue(id), Some(true));

        registry.add_attribute_path(A, Some(false), &mut set, None);
        registry.add_attribute_path(A, None, &mut set, None);
        assert_eq!(registry.multivalue(id), Some(true));

        assert_eq!(set.len(), 1);
        assert_eq!(registry.path_count(), 1);
    }

    #[test]
    fn registered_paths_join_new_sets() {
        let mut registry = Registry::new();
        let mut first = PathSet::new();
        let mut second = PathSet::new();

        let id = registry.add_attribute_path(A, None, &mut first, None);
        let again = registry.add_attribute_path(A, None, &mut second, None);

        assert_eq!(id, again);
        assert!(second.contains(id));
    }
}
