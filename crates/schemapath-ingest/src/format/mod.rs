//! Source format adapters.
//!
//! Three formats are supported, and the set is closed:
//!
//! | format        | source                          | children          | markers                    |
//! |---------------|---------------------------------|-------------------|----------------------------|
//! | `JsonSchema`  | JSON Schema document            | all element-like  | `rdf:type` at objects      |
//! | `Xsd`         | XML Schema (or its JSON tree)   | `@x` attribute-like | `rdf:type` at objects, `rdf:value` at text content |
//! | `Solr`        | Solr `schema.xml` field list    | (flat)            | none                       |

pub mod json_schema;
pub mod solr;
pub mod xsd;

use crate::error::{IngestError, IngestResult};
use crate::tree::{NodeType, SchemaTreeNode};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub use solr::SolrField;

/// Prefix marking XML attributes in XSD-derived trees.
pub const XML_ATTRIBUTE_PREFIX: char = '@';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceFormat {
    JsonSchema,
    Xsd,
    Solr,
}

/// Walk order bucket for a child node: attribute-like children are walked
/// before the value marker, element-like ones after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildKind {
    AttributeLike,
    ElementLike,
}

/// A loaded source document.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceDocument {
    Tree(SchemaTreeNode),
    Fields(Vec<SolrField>),
}

impl std::str::FromStr for SourceFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" | "json-schema" | "jsonschema" => Ok(SourceFormat::JsonSchema),
            "xsd" | "xml" | "xml-schema" => Ok(SourceFormat::Xsd),
            "solr" => Ok(SourceFormat::Solr),
            other => Err(format!("unknown source format: {other}")),
        }
    }
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SourceFormat::JsonSchema => "json",
            SourceFormat::Xsd => "xsd",
            SourceFormat::Solr => "solr",
        };
        f.write_str(name)
    }
}

impl SourceFormat {
    /// Read and decode the document at `location`.
    pub fn load(&self, location: &Path) -> IngestResult<SourceDocument> {
        let label = location.display().to_string();
        let contents = std::fs::read_to_string(location)
            .map_err(|err| IngestError::unreadable(label.clone(), err))?;

        let pre_converted = location
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));

        match self {
            SourceFormat::Xsd if pre_converted => {
                json_schema::parse_tree(&contents, &label).map(SourceDocument::Tree)
            }
            _ => self.load_str(&contents, &label),
        }
    }

    /// Decode a document held in memory; `label` names it in errors and logs.
    pub fn load_str(&self, contents: &str, label: &str) -> IngestResult<SourceDocument> {
        let document = match self {
            SourceFormat::JsonSchema => SourceDocument::Tree(json_schema::parse_tree(contents, label)?),
            SourceFormat::Xsd => SourceDocument::Tree(xsd::convert(contents, label)?),
            SourceFormat::Solr => SourceDocument::Fields(solr::parse_fields(contents, label)?),
        };
        tracing::debug!(location = %label, format = %self, "loaded schema source");
        Ok(document)
    }

    pub fn classify_child(&self, name: &str) -> ChildKind {
        match self {
            SourceFormat::Xsd if name.starts_with(XML_ATTRIBUTE_PREFIX) => ChildKind::AttributeLike,
            _ => ChildKind::ElementLike,
        }
    }

    pub fn adds_type_marker(&self, node_type: &NodeType, name: &str) -> bool {
        match self {
            SourceFormat::JsonSchema => json_schema::adds_type_marker(node_type),
            SourceFormat::Xsd => xsd::adds_type_marker(node_type, name),
            SourceFormat::Solr => false,
        }
    }

    pub fn adds_value_marker(&self, node: &SchemaTreeNode, name: &str) -> bool {
        match self {
            SourceFormat::JsonSchema | SourceFormat::Solr => false,
            SourceFormat::Xsd => xsd::adds_value_marker(node, name),
        }
    }

    /// Name used for URI minting.
    pub fn local_name<'n>(&self, name: &'n str) -> &'n str {
        match self {
            SourceFormat::Xsd => name.strip_prefix(XML_ATTRIBUTE_PREFIX).unwrap_or(name),
            _ => name,
        }
    }
}
