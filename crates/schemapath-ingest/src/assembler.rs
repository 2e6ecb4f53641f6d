//! Schema assembler: locate → walk → filter → persist.

use crate::config::ParserConfig;
use crate::error::IngestResult;
use crate::format::{SolrField, SourceDocument, SourceFormat};
use crate::locator::{self, RecordRoot};
use crate::registry::{upgrade_multivalue, DerivedPaths, PathSet, Registry};
use crate::walker::{SchemaContext, Walker};
use schemapath_model::{is_excluded, uri::UriMinter, Attribute, Schema};
use schemapath_storage::{new_uuid, SchemaStore, StoreError};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

/// Per-call options of a parse run.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Narrow the document to the sub-trees whose name ends with this tag.
    pub record_tag: Option<String>,
    /// Schema identity; minted by the store when absent.
    pub schema_uuid: Option<String>,
    pub schema_name: Option<String>,
    pub base_uri: Option<String>,
    /// Canonical path string → existing schema attribute-path instance UUID.
    pub existing_path_identities: Option<BTreeMap<String, String>>,
    /// Paths whose canonical string starts with one of these are dropped.
    pub excluded_path_prefixes: Vec<String>,
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record_tag(mut self, tag: impl Into<String>) -> Self {
        self.record_tag = Some(tag.into());
        self
    }

    pub fn with_schema_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.schema_uuid = Some(uuid.into());
        self
    }

    pub fn with_schema_name(mut self, name: impl Into<String>) -> Self {
        self.schema_name = Some(name.into());
        self
    }

    pub fn with_base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.base_uri = Some(base_uri.into());
        self
    }

    pub fn with_existing_path_identities(mut self, identities: BTreeMap<String, String>) -> Self {
        self.existing_path_identities = Some(identities);
        self
    }

    pub fn with_excluded_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.excluded_path_prefixes.push(prefix.into());
        self
    }
}

/// The records a document was narrowed to.
enum Located<'d> {
    Records(Vec<RecordRoot<'d>>),
    Fields(&'d [SolrField]),
}

/// Derives attribute paths from one source format and assembles schemas.
#[derive(Debug, Clone)]
pub struct SchemaParser {
    format: SourceFormat,
    config: ParserConfig,
    minter: UriMinter,
}

impl SchemaParser {
    pub fn new(format: SourceFormat, config: ParserConfig) -> Self {
        let minter = config.minter();
        Self {
            format,
            config,
            minter,
        }
    }

    pub fn format(&self) -> SourceFormat {
        self.format
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn load(&self, location: &Path) -> IngestResult<SourceDocument> {
        self.format.load(location)
    }

    // ========================================================================
    // Entry points
    // ========================================================================

    /// Full pipeline: derive the paths of the document at `location` and
    /// persist them as a schema.
    ///
    /// `Ok(None)` means no record was found (no record tag match, or an empty
    /// field list). Store failures abort the run. The schema itself is stored
    /// last, in one write, so a failed run never leaves it behind; attributes,
    /// paths and the record class accepted before the failure stay.
    pub fn parse(
        &self,
        location: &Path,
        options: &ParseOptions,
        store: &mut dyn SchemaStore,
    ) -> IngestResult<Option<Schema>> {
        let document = self.load(location)?;
        self.parse_document(&document, options, store)
    }

    pub fn parse_document(
        &self,
        document: &SourceDocument,
        options: &ParseOptions,
        store: &mut dyn SchemaStore,
    ) -> IngestResult<Option<Schema>> {
        let Some((mut schema, paths)) = self.separate(document, options, store)? else {
            return Ok(None);
        };

        let attached = self.attach_paths(&mut schema, &paths, options, store)?;
        let schema = store.insert_schema(&schema)?;

        tracing::info!(
            schema = %schema.uuid,
            format = %self.format,
            derived = paths.len(),
            attached,
            "assembled schema"
        );
        Ok(Some(schema))
    }

    /// Store the schema (with its record class but no paths) and return it
    /// together with its derived, unattached paths.
    pub fn parse_separately(
        &self,
        location: &Path,
        options: &ParseOptions,
        store: &mut dyn SchemaStore,
    ) -> IngestResult<Option<(Schema, DerivedPaths)>> {
        let document = self.load(location)?;
        let Some((schema, paths)) = self.separate(&document, options, store)? else {
            return Ok(None);
        };
        let schema = store.insert_schema(&schema)?;
        Ok(Some((schema, paths)))
    }

    /// Preview: derive the paths of a document without schema identity and
    /// without touching any store.
    pub fn parse_attribute_paths_only(
        &self,
        location: &Path,
        record_tag: Option<&str>,
    ) -> IngestResult<Option<DerivedPaths>> {
        let options = ParseOptions {
            record_tag: record_tag.map(str::to_string),
            ..ParseOptions::default()
        };
        self.parse_attribute_paths_map(location, &options)
    }

    /// Like [`Self::parse_attribute_paths_only`], honouring the schema
    /// identity, base URI and exclusions in `options`.
    pub fn parse_attribute_paths_map(
        &self,
        location: &Path,
        options: &ParseOptions,
    ) -> IngestResult<Option<DerivedPaths>> {
        let document = self.load(location)?;
        Ok(self.derive_paths(&document, options))
    }

    /// Pure derivation over an already loaded document.
    pub fn derive_paths(&self, document: &SourceDocument, options: &ParseOptions) -> Option<DerivedPaths> {
        let located = self.locate(document, options.record_tag.as_deref())?;
        let context = SchemaContext {
            schema_uuid: options.schema_uuid.as_deref(),
            base_uri: options.base_uri.as_deref(),
        };
        Some(self.derive(&located, context, &options.excluded_path_prefixes))
    }

    // ========================================================================
    // Pipeline steps
    // ========================================================================

    fn separate(
        &self,
        document: &SourceDocument,
        options: &ParseOptions,
        store: &mut dyn SchemaStore,
    ) -> IngestResult<Option<(Schema, DerivedPaths)>> {
        let Some(located) = self.locate(document, options.record_tag.as_deref()) else {
            tracing::info!(
                format = %self.format,
                record_tag = ?options.record_tag,
                "no record found in schema source"
            );
            return Ok(None);
        };

        let uuid = options.schema_uuid.clone().unwrap_or_else(new_uuid);
        if store.schema(&uuid)?.is_some() {
            return Err(StoreError::Rejected(format!("schema {uuid} already exists")).into());
        }
        let mut schema = Schema::new(uuid);
        schema.name = options.schema_name.clone();
        schema.base_uri = options.base_uri.clone();

        let record_class_uri = self.record_class_uri(&located, &schema);
        schema.record_class = Some(store.create_or_get_class(&record_class_uri)?);

        let context = SchemaContext {
            schema_uuid: Some(&schema.uuid),
            base_uri: schema.base_uri.as_deref(),
        };
        let paths = self.derive(&located, context, &options.excluded_path_prefixes);
        Ok(Some((schema, paths)))
    }

    fn locate<'d>(&self, document: &'d SourceDocument, record_tag: Option<&str>) -> Option<Located<'d>> {
        match document {
            SourceDocument::Tree(tree) => {
                let roots = locator::locate(tree, record_tag);
                if roots.is_empty() {
                    None
                } else {
                    tracing::debug!(records = roots.len(), "located record roots");
                    Some(Located::Records(roots))
                }
            }
            SourceDocument::Fields(fields) if fields.is_empty() => None,
            SourceDocument::Fields(fields) => Some(Located::Fields(fields)),
        }
    }

    fn derive(&self, located: &Located<'_>, context: SchemaContext<'_>, excluded: &[String]) -> DerivedPaths {
        let mut registry = Registry::new();
        let mut union = PathSet::new();

        match located {
            Located::Records(roots) => {
                for root in roots {
                    let record_paths = Walker::new(self.format, &self.minter, context, &mut registry)
                        .walk_record(root, self.config.include_record_tag);

                    let before = union.len();
                    for id in record_paths.iter() {
                        if !is_excluded(registry.key(id), excluded) {
                            union.insert(id);
                        }
                    }
                    tracing::debug!(
                        record = %root.name,
                        paths = record_paths.len(),
                        new = union.len() - before,
                        "walked record"
                    );
                }
            }
            Located::Fields(fields) => {
                for field in fields.iter() {
                    let uri = self
                        .minter
                        .mint_attribute_uri(&field.name, context.schema_uuid, context.base_uri);
                    let mut single = PathSet::new();
                    let id = registry.add_attribute_path(&uri, field.multi_valued, &mut single, None);
                    if !is_excluded(registry.key(id), excluded) {
                        union.insert(id);
                    }
                }
            }
        }

        registry.materialize(union.iter())
    }

    fn record_class_uri(&self, located: &Located<'_>, schema: &Schema) -> String {
        let base_uri = schema.base_uri.as_deref();
        match located {
            Located::Records(roots) => {
                let name = match roots.first() {
                    Some(root) if !root.is_document_root() => root.name.as_str(),
                    _ => self.config.default_record_class_name.as_str(),
                };
                let tag_uri = self
                    .minter
                    .mint_schema_term_uri(self.format.local_name(name), &schema.uuid, base_uri);
                format!("{tag_uri}{}", self.config.record_class_suffix)
            }
            Located::Fields(_) => format!(
                "{}{}{}",
                self.minter.schema_base(&schema.uuid, base_uri),
                self.config.default_record_class_name,
                self.config.record_class_suffix
            ),
        }
    }

    /// Persist `paths` and attach them to `schema`.
    ///
    /// Excluded paths and paths the schema already holds are skipped; a path
    /// listed in the existing-identity map is attached as that stored
    /// instance when the store still knows it, with its multivalue flag
    /// raised to the derived one.
    fn attach_paths(
        &self,
        schema: &mut Schema,
        paths: &DerivedPaths,
        options: &ParseOptions,
        store: &mut dyn SchemaStore,
    ) -> IngestResult<usize> {
        let mut attributes: HashMap<String, Attribute> = HashMap::new();
        let mut attached_keys: HashSet<String> = schema.attribute_path_keys().into_iter().collect();
        let mut attached = 0;

        for path in paths {
            let key = path.key();
            if path.is_empty() || is_excluded(key, &options.excluded_path_prefixes) {
                continue;
            }
            if attached_keys.contains(key) {
                continue;
            }

            if let Some(existing) = options
                .existing_path_identities
                .as_ref()
                .and_then(|identities| identities.get(key))
            {
                if let Some(mut sapi) = store.get_schema_attribute_path_instance(existing)? {
                    let multivalue = upgrade_multivalue(sapi.multivalue, path.multivalue());
                    if multivalue != sapi.multivalue {
                        sapi.multivalue = multivalue;
                        sapi = store.update_schema_attribute_path_instance(&sapi)?;
                    }
                    if schema.add_attribute_path(sapi) {
                        attached_keys.insert(key.to_string());
                        attached += 1;
                    }
                    continue;
                }
                tracing::debug!(sapi = %existing, "existing attribute path instance not found, minting a new one");
            }

            let mut path_attributes = Vec::with_capacity(path.len());
            for attribute in path.attributes() {
                let stored = match attributes.get(&attribute.uri) {
                    Some(stored) => stored.clone(),
                    None => {
                        let stored = store.create_or_get_attribute(&attribute.uri, &attribute.name)?;
                        attributes.insert(attribute.uri.clone(), stored.clone());
                        stored
                    }
                };
                path_attributes.push(stored);
            }

            let attribute_path = store.create_or_get_attribute_path(&path_attributes)?;
            let sapi = store.create_schema_attribute_path_instance(&attribute_path, None, path.multivalue())?;
            if schema.add_attribute_path(sapi) {
                attached_keys.insert(key.to_string());
                attached += 1;
            }
        }

        Ok(attached)
    }
}
