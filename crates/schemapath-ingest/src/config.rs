//! Parser configuration.
//!
//! Loaded from a JSON file (every field optional) or built from
//! [`ParserConfig::default`].

use crate::error::{IngestError, IngestResult};
use schemapath_model::uri::{UriMinter, DEFAULT_SCHEMA_NAMESPACE_BASE, DEFAULT_TERM_NAMESPACE};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Make the record tag itself the first segment of every path.
    pub include_record_tag: bool,
    /// Namespace for terms minted without schema identity or base URI.
    pub default_namespace: String,
    /// Schema namespaces are `<schema_namespace_base><schema-uuid>/`.
    pub schema_namespace_base: String,
    /// Appended to the record tag URI to form the record class URI.
    pub record_class_suffix: String,
    /// Record class local name when the record is the whole document.
    pub default_record_class_name: String,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            include_record_tag: false,
            default_namespace: DEFAULT_TERM_NAMESPACE.to_string(),
            schema_namespace_base: DEFAULT_SCHEMA_NAMESPACE_BASE.to_string(),
            record_class_suffix: "Type".to_string(),
            default_record_class_name: "Record".to_string(),
        }
    }
}

impl ParserConfig {
    pub fn from_path(path: &Path) -> IngestResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|err| IngestError::Config {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        serde_json::from_str(&contents).map_err(|err| IngestError::Config {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })
    }

    pub fn minter(&self) -> UriMinter {
        UriMinter {
            schema_namespace_base: self.schema_namespace_base.clone(),
            default_namespace: self.default_namespace.clone(),
        }
    }
}
