//! Schemapath domain model
//!
//! The persisted artifacts of a schema derivation run:
//!
//! - [`Attribute`]: a term, identified by its minted URI.
//! - [`AttributePath`]: an ordered, non-empty sequence of attributes from the
//!   record root to a leaf (or sub-object boundary). Its identity is the
//!   canonical string (see [`path_key`]).
//! - [`SchemaAttributePathInstance`]: an attribute path as used by one schema,
//!   carrying per-schema `required`/`multivalue` overrides.
//! - [`Schema`]: the aggregate a derivation run produces.
//!
//! URI minting lives in [`uri`].

pub mod uri;

use serde::{Deserialize, Serialize};

// ============================================================================
// Well-known terms
// ============================================================================

/// Separator between attribute URIs in a canonical attribute path string.
///
/// ASCII "record separator"; it never appears in a minted URI because local
/// names are form-encoded.
pub const ATTRIBUTE_DELIMITER: char = '\u{1E}';

pub const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";

/// Synthetic type marker attribute (`rdf:type`).
pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

/// Synthetic value marker attribute (`rdf:value`).
pub const RDF_VALUE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#value";

/// Join attribute URIs into the canonical attribute path string.
pub fn path_key<'a, I>(uris: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut key = String::new();
    for (idx, uri) in uris.into_iter().enumerate() {
        if idx > 0 {
            key.push(ATTRIBUTE_DELIMITER);
        }
        key.push_str(uri);
    }
    key
}

/// Render a canonical path string for humans (`a / b / c`).
pub fn display_path_key(key: &str) -> String {
    key.split(ATTRIBUTE_DELIMITER).collect::<Vec<_>>().join(" / ")
}

/// True if `key` starts with any of the given prefixes.
pub fn is_excluded<S: AsRef<str>>(key: &str, excluded_prefixes: &[S]) -> bool {
    excluded_prefixes
        .iter()
        .any(|prefix| key.starts_with(prefix.as_ref()))
}

// ============================================================================
// Persisted entities
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub uuid: String,
    pub uri: String,
    /// Local (relative) part of the URI.
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributePath {
    pub uuid: String,
    pub attributes: Vec<Attribute>,
}

impl AttributePath {
    /// Canonical string form: attribute URIs joined by [`ATTRIBUTE_DELIMITER`].
    pub fn to_attribute_path(&self) -> String {
        path_key(self.attributes.iter().map(|a| a.uri.as_str()))
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// A class (used for a schema's record class).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clasz {
    pub uuid: String,
    pub uri: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaAttributePathInstance {
    pub uuid: String,
    pub attribute_path: AttributePath,
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub multivalue: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub uuid: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub base_uri: Option<String>,
    #[serde(default)]
    pub record_class: Option<Clasz>,
    #[serde(default)]
    pub attribute_paths: Vec<SchemaAttributePathInstance>,
}

impl Schema {
    pub fn new(uuid: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            name: None,
            base_uri: None,
            record_class: None,
            attribute_paths: Vec::new(),
        }
    }

    /// Look up an attached attribute path by its canonical string.
    pub fn attribute_path_by_uri_path(&self, key: &str) -> Option<&SchemaAttributePathInstance> {
        self.attribute_paths
            .iter()
            .find(|sapi| sapi.attribute_path.to_attribute_path() == key)
    }

    /// Attach an attribute path instance.
    ///
    /// Returns `false` (and leaves the schema unchanged) if a path with the
    /// same canonical string is already attached, or the path is empty.
    pub fn add_attribute_path(&mut self, sapi: SchemaAttributePathInstance) -> bool {
        if sapi.attribute_path.is_empty() {
            return false;
        }
        let key = sapi.attribute_path.to_attribute_path();
        if self.attribute_path_by_uri_path(&key).is_some() {
            return false;
        }
        self.attribute_paths.push(sapi);
        true
    }

    /// Canonical strings of all attached paths, in attachment order.
    pub fn attribute_path_keys(&self) -> Vec<String> {
        self.attribute_paths
            .iter()
            .map(|sapi| sapi.attribute_path.to_attribute_path())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr(uri: &str) -> Attribute {
        Attribute {
            uuid: format!("Attribute-{uri}"),
            uri: uri.to_string(),
            name: uri::relative_uri_part(uri).to_string(),
        }
    }

    fn sapi(uuid: &str, uris: &[&str]) -> SchemaAttributePathInstance {
        SchemaAttributePathInstance {
            uuid: uuid.to_string(),
            attribute_path: AttributePath {
                uuid: format!("AttributePath-{uuid}"),
                attributes: uris.iter().map(|u| attr(u)).collect(),
            },
            required: None,
            multivalue: None,
        }
    }

    #[test]
    fn path_key_joins_with_delimiter() {
        let key = path_key(["http://x/a", "http://x/b"]);
        assert_eq!(key, "http://x/a\u{1E}http://x/b");
        assert_eq!(display_path_key(&key), "http://x/a / http://x/b");
    }

    #[test]
    fn schema_rejects_duplicate_and_empty_paths() {
        let mut schema = Schema::new("Schema-1");
        assert!(schema.add_attribute_path(sapi("1", &["http://x/a", "http://x/b"])));
        assert!(!schema.add_attribute_path(sapi("2", &["http://x/a", "http://x/b"])));
        assert!(!schema.add_attribute_path(sapi("3", &[])));
        assert!(schema.add_attribute_path(sapi("4", &["http://x/a"])));
        assert_eq!(schema.attribute_paths.len(), 2);
        assert_eq!(
            schema
                .attribute_path_by_uri_path("http://x/a")
                .map(|s| s.uuid.as_str()),
            Some("4")
        );
    }

    #[test]
    fn exclusion_is_prefix_based() {
        let excluded = vec!["http://x/internal".to_string()];
        assert!(is_excluded("http://x/internal\u{1E}http://x/debug", &excluded));
        assert!(!is_excluded("http://x/title", &excluded));
        assert!(!is_excluded::<String>("http://x/title", &[]));
    }

    #[test]
    fn schema_serializes_round_trip() {
        let mut schema = Schema::new("Schema-2");
        schema.name = Some("demo".to_string());
        schema.add_attribute_path(sapi("1", &["http://x/a"]));
        let json = serde_json::to_string(&schema).unwrap();
        let back: Schema = serde_json::from_str(&json).unwrap();
        assert_eq!(back, schema);
    }
}
