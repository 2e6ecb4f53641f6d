//! Schemapath ingestion
//!
//! Derives the canonical attribute paths of a schema document and assembles
//! them into a persisted [`schemapath_model::Schema`]:
//!
//! ```text
//! source ──► format adapter ──► SchemaTreeNode ──► locator ──► record roots
//!                                                                  │
//!            SchemaStore ◄── assembler ◄── registry ◄── walker ◄───┘
//! ```
//!
//! - [`format`]: JSON Schema, XSD and Solr `schema.xml` adapters
//! - [`locator`]: narrows a document to its record sub-trees
//! - [`walker`]: recursive path derivation over one record
//! - [`registry`]: per-run identity store for attributes and paths
//! - [`assembler`]: [`SchemaParser`], the entry points

pub mod assembler;
pub mod config;
pub mod error;
pub mod format;
pub mod locator;
pub mod registry;
pub mod tree;
pub mod walker;

pub use assembler::{ParseOptions, SchemaParser};
pub use config::ParserConfig;
pub use error::{IngestError, IngestResult};
pub use format::{SourceDocument, SourceFormat};
pub use registry::{DerivedAttribute, DerivedAttributePath, DerivedPaths};
pub use tree::{NodeType, SchemaTreeNode};
