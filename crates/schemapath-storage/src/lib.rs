//! Schemapath storage layer
//!
//! The derivation engine never talks to a database directly; everything it
//! persists goes through [`SchemaStore`]:
//!
//! ```text
//! ┌──────────────┐  create_or_get_attribute       ┌──────────────────┐
//! │  Assembler   │ ─────────────────────────────► │                  │
//! │ (one run)    │  create_or_get_attribute_path  │   SchemaStore    │
//! │              │ ─────────────────────────────► │                  │
//! │              │  insert_schema (once, at end)  │  (MemoryStore:   │
//! │              │ ─────────────────────────────► │   JSON snapshot) │
//! └──────────────┘                                └──────────────────┘
//! ```
//!
//! A schema becomes visible in one write, after all of its paths exist.
//!
//! Attributes are keyed by URI, attribute paths by their canonical string and
//! classes by URI, so "create or get" is idempotent across runs that share a
//! store.


use parking_lot::RwLock;
use schemapath_model::{
    path_key, uri::relative_uri_part, Attribute, AttributePath, Clasz, Schema,
    SchemaAttributePathInstance,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store rejected write: {0}")]
    Rejected(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// ============================================================================
// Store interface
// ============================================================================

/// Persistence operations the schema assembler needs.
pub trait SchemaStore {
    /// Create an empty schema. A UUID is minted when none is given.
    fn create_schema(
        &mut self,
        uuid: Option<&str>,
        name: Option<&str>,
        base_uri: Option<&str>,
    ) -> StoreResult<Schema>;

    fn create_or_get_attribute(&mut self, uri: &str, name: &str) -> StoreResult<Attribute>;

    /// Attribute paths are identified by their canonical string.
    fn create_or_get_attribute_path(
        &mut self,
        attributes: &[Attribute],
    ) -> StoreResult<AttributePath>;

    fn create_schema_attribute_path_instance(
        &mut self,
        attribute_path: &AttributePath,
        required: Option<bool>,
        multivalue: Option<bool>,
    ) -> StoreResult<SchemaAttributePathInstance>;

    fn get_schema_attribute_path_instance(
        &self,
        uuid: &str,
    ) -> StoreResult<Option<SchemaAttributePathInstance>>;

    /// Classes are identified by URI; the name is the relative URI part.
    fn create_or_get_class(&mut self, uri: &str) -> StoreResult<Clasz>;

    /// Raise or set flags of a stored instance.
    fn update_schema_attribute_path_instance(
        &mut self,
        sapi: &SchemaAttributePathInstance,
    ) -> StoreResult<SchemaAttributePathInstance>;

    /// Store a fully assembled schema in one write. Rejects a known UUID.
    fn insert_schema(&mut self, schema: &Schema) -> StoreResult<Schema>;

    /// Replace a stored schema with `schema` and return the stored state.
    fn update_schema(&mut self, schema: &Schema) -> StoreResult<Schema>;

    fn schema(&self, uuid: &str) -> StoreResult<Option<Schema>>;
}

// ============================================================================
// In-memory store with JSON snapshots
// ============================================================================

/// Everything a [`MemoryStore`] holds; this is also the snapshot file format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub schemas: BTreeMap<String, Schema>,
    /// Keyed by URI.
    #[serde(default)]
    pub attributes: BTreeMap<String, Attribute>,
    /// Keyed by canonical path string.
    #[serde(default)]
    pub attribute_paths: BTreeMap<String, AttributePath>,
    /// Keyed by instance UUID.
    #[serde(default)]
    pub attribute_path_instances: BTreeMap<String, SchemaAttributePathInstance>,
    /// Keyed by URI.
    #[serde(default)]
    pub classes: BTreeMap<String, Clasz>,
}

#[derive(Debug, Default)]
struct StoreState {
    data: StoreSnapshot,
    /// Remaining successful writes before injected failures start.
    writes_remaining: Option<usize>,
}

/// A [`SchemaStore`] backed by ordered maps.
///
/// Clones share state, so a caller can hand one clone to a parser run and
/// inspect the other afterwards.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<StoreState>>,
}

/// Identity for a new entity; also used to name a schema before it is stored.
pub fn new_uuid() -> String {
    Uuid::new_v4().to_string()
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot written by [`MemoryStore::save`]; a missing file yields
    /// an empty store.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let data = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            serde_json::from_str(&contents)?
        } else {
            StoreSnapshot::default()
        };

        tracing::debug!(
            path = %path.display(),
            schemas = data.schemas.len(),
            attributes = data.attributes.len(),
            attribute_paths = data.attribute_paths.len(),
            "opened schema store"
        );

        Ok(Self::from_snapshot(data))
    }

    pub fn from_snapshot(data: StoreSnapshot) -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState {
                data,
                writes_remaining: None,
            })),
        }
    }

    pub fn save(&self, path: &Path) -> StoreResult<()> {
        let state = self.state.read();
        let json = serde_json::to_string_pretty(&state.data)?;
        std::fs::write(path, json)?;
        tracing::debug!(path = %path.display(), "saved schema store");
        Ok(())
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.state.read().data.clone()
    }

    /// Let the next `writes` write operations succeed, then reject every
    /// further write.
    pub fn fail_after(&self, writes: usize) {
        self.state.write().writes_remaining = Some(writes);
    }

    pub fn schemas(&self) -> Vec<Schema> {
        self.state.read().data.schemas.values().cloned().collect()
    }

    pub fn attribute_count(&self) -> usize {
        self.state.read().data.attributes.len()
    }

    pub fn attribute_path_count(&self) -> usize {
        self.state.read().data.attribute_paths.len()
    }

    /// Canonical path string → instance UUID for every path attached to a
    /// stored schema. Feed this back into a parse run to reuse identities.
    pub fn attribute_path_identities(
        &self,
        schema_uuid: &str,
    ) -> StoreResult<BTreeMap<String, String>> {
        let state = self.state.read();
        let schema = state
            .data
            .schemas
            .get(schema_uuid)
            .ok_or_else(|| StoreError::NotFound {
                kind: "schema",
                id: schema_uuid.to_string(),
            })?;

        Ok(schema
            .attribute_paths
            .iter()
            .map(|sapi| (sapi.attribute_path.to_attribute_path(), sapi.uuid.clone()))
            .collect())
    }
}

impl StoreState {
    fn check_write(&mut self, operation: &str) -> StoreResult<()> {
        match self.writes_remaining {
            Some(0) => Err(StoreError::Rejected(format!(
                "{operation}: write budget exhausted"
            ))),
            Some(ref mut remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl SchemaStore for MemoryStore {
    fn create_schema(
        &mut self,
        uuid: Option<&str>,
        name: Option<&str>,
        base_uri: Option<&str>,
    ) -> StoreResult<Schema> {
        let mut state = self.state.write();
        state.check_write("create_schema")?;

        let uuid = uuid.map(str::to_string).unwrap_or_else(new_uuid);
        if state.data.schemas.contains_key(&uuid) {
            return Err(StoreError::Rejected(format!("schema {uuid} already exists")));
        }

        let mut schema = Schema::new(uuid.clone());
        schema.name = name.map(str::to_string);
        schema.base_uri = base_uri.map(str::to_string);
        state.data.schemas.insert(uuid, schema.clone());
        Ok(schema)
    }

    fn create_or_get_attribute(&mut self, uri: &str, name: &str) -> StoreResult<Attribute> {
        let mut state = self.state.write();
        if let Some(existing) = state.data.attributes.get(uri) {
            return Ok(existing.clone());
        }
        state.check_write("create_or_get_attribute")?;

        let attribute = Attribute {
            uuid: new_uuid(),
            uri: uri.to_string(),
            name: name.to_string(),
        };
        state
            .data
            .attributes
            .insert(uri.to_string(), attribute.clone());
        Ok(attribute)
    }

    fn create_or_get_attribute_path(
        &mut self,
        attributes: &[Attribute],
    ) -> StoreResult<AttributePath> {
        if attributes.is_empty() {
            return Err(StoreError::Rejected(
                "attribute paths must not be empty".to_string(),
            ));
        }

        let key = path_key(attributes.iter().map(|a| a.uri.as_str()));
        let mut state = self.state.write();
        if let Some(existing) = state.data.attribute_paths.get(&key) {
            return Ok(existing.clone());
        }
        state.check_write("create_or_get_attribute_path")?;

        for attribute in attributes {
            state
                .data
                .attributes
                .entry(attribute.uri.clone())
                .or_insert_with(|| attribute.clone());
        }

        let path = AttributePath {
            uuid: new_uuid(),
            attributes: attributes.to_vec(),
        };
        state.data.attribute_paths.insert(key, path.clone());
        Ok(path)
    }

    fn create_schema_attribute_path_instance(
        &mut self,
        attribute_path: &AttributePath,
        required: Option<bool>,
        multivalue: Option<bool>,
    ) -> StoreResult<SchemaAttributePathInstance> {
        let mut state = self.state.write();
        state.check_write("create_schema_attribute_path_instance")?;

        let key = attribute_path.to_attribute_path();
        if !state.data.attribute_paths.contains_key(&key) {
            return Err(StoreError::NotFound {
                kind: "attribute path",
                id: key,
            });
        }

        let sapi = SchemaAttributePathInstance {
            uuid: new_uuid(),
            attribute_path: attribute_path.clone(),
            required,
            multivalue,
        };
        state
            .data
            .attribute_path_instances
            .insert(sapi.uuid.clone(), sapi.clone());
        Ok(sapi)
    }

    fn get_schema_attribute_path_instance(
        &self,
        uuid: &str,
    ) -> StoreResult<Option<SchemaAttributePathInstance>> {
        Ok(self
            .state
            .read()
            .data
            .attribute_path_instances
            .get(uuid)
            .cloned())
    }

    fn create_or_get_class(&mut self, uri: &str) -> StoreResult<Clasz> {
        let mut state = self.state.write();
        if let Some(existing) = state.data.classes.get(uri) {
            return Ok(existing.clone());
        }
        state.check_write("create_or_get_class")?;

        let class = Clasz {
            uuid: new_uuid(),
            uri: uri.to_string(),
            name: relative_uri_part(uri).to_string(),
        };
        state.data.classes.insert(uri.to_string(), class.clone());
        Ok(class)
    }

    fn update_schema(&mut self, schema: &Schema) -> StoreResult<Schema> {
        let mut state = self.state.write();
        if !state.data.schemas.contains_key(&schema.uuid) {
            return Err(StoreError::NotFound {
                kind: "schema",
                id: schema.uuid.clone(),
            });
        }

        check_paths(schema)?;

        state.check_write("update_schema")?;
        state
            .data
            .schemas
            .insert(schema.uuid.clone(), schema.clone());
        Ok(schema.clone())
    }

    fn insert_schema(&mut self, schema: &Schema) -> StoreResult<Schema> {
        let mut state = self.state.write();
        if state.data.schemas.contains_key(&schema.uuid) {
            return Err(StoreError::Rejected(format!(
                "schema {} already exists",
                schema.uuid
            )));
        }
        check_paths(schema)?;

        state.check_write("insert_schema")?;
        state
            .data
            .schemas
            .insert(schema.uuid.clone(), schema.clone());
        Ok(schema.clone())
    }

    fn update_schema_attribute_path_instance(
        &mut self,
        sapi: &SchemaAttributePathInstance,
    ) -> StoreResult<SchemaAttributePathInstance> {
        let mut state = self.state.write();
        if !state.data.attribute_path_instances.contains_key(&sapi.uuid) {
            return Err(StoreError::NotFound {
                kind: "schema attribute path instance",
                id: sapi.uuid.clone(),
            });
        }

        state.check_write("update_schema_attribute_path_instance")?;
        state
            .data
            .attribute_path_instances
            .insert(sapi.uuid.clone(), sapi.clone());
        Ok(sapi.clone())
    }

    fn schema(&self, uuid: &str) -> StoreResult<Option<Schema>> {
        Ok(self.state.read().data.schemas.get(uuid).cloned())
    }
}

/// Attached paths must be non-empty and unique by canonical string.
fn check_paths(schema: &Schema) -> StoreResult<()> {
    let mut seen = HashSet::new();
    for sapi in &schema.attribute_paths {
        if sapi.attribute_path.is_empty() {
            return Err(StoreError::Rejected(format!(
                "schema {} holds an empty attribute path",
                schema.uuid
            )));
        }
        let key = sapi.attribute_path.to_attribute_path();
        if !seen.insert(key.clone()) {
            return Err(StoreError::Rejected(format!(
                "schema {} holds duplicate attribute path {}",
                schema.uuid,
                schemapath_model::display_path_key(&key)
            )));
        }
    }
    Ok(())
}
