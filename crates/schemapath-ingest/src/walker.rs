//! Schema tree walker: turns one record sub-tree into attribute paths.

use crate::format::{ChildKind, SourceFormat};
use crate::locator::RecordRoot;
use crate::registry::{PathId, PathSet, Registry};
use crate::tree::{NodeType, SchemaTreeNode};
use schemapath_model::{uri::UriMinter, RDF_TYPE, RDF_VALUE};

/// Where minted attribute URIs live.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaContext<'a> {
    pub schema_uuid: Option<&'a str>,
    pub base_uri: Option<&'a str>,
}

pub struct Walker<'a> {
    format: SourceFormat,
    minter: &'a UriMinter,
    context: SchemaContext<'a>,
    registry: &'a mut Registry,
}

impl<'a> Walker<'a> {
    pub fn new(
        format: SourceFormat,
        minter: &'a UriMinter,
        context: SchemaContext<'a>,
        registry: &'a mut Registry,
    ) -> Self {
        Self {
            format,
            minter,
            context,
            registry,
        }
    }

    /// Walk one record root into a fresh path set.
    ///
    /// With `add_root_attribute` the record name is the first segment of
    /// every path; otherwise paths start at the record's children.
    pub fn walk_record(&mut self, root: &RecordRoot<'_>, add_root_attribute: bool) -> PathSet {
        let mut paths = PathSet::new();
        self.walk(&root.name, root.node, None, add_root_attribute, &mut paths);
        paths
    }

    pub fn walk(
        &mut self,
        name: &str,
        node: &SchemaTreeNode,
        prefix: Option<PathId>,
        add_root_attribute: bool,
        paths: &mut PathSet,
    ) {
        if name.is_empty() {
            return;
        }

        if node.node_type == NodeType::Array {
            self.walk_array(name, node, prefix, paths);
            return;
        }

        let current = if add_root_attribute {
            Some(self.add(name, None, paths, prefix))
        } else {
            prefix
        };

        if self.format.adds_type_marker(&node.node_type, name) {
            self.registry.add_attribute_path(RDF_TYPE, None, paths, current);
        }

        let value_marker = self.format.adds_value_marker(node, name);
        self.walk_content(node, current, value_marker, paths);
    }

    fn walk_array(
        &mut self,
        name: &str,
        node: &SchemaTreeNode,
        prefix: Option<PathId>,
        paths: &mut PathSet,
    ) {
        let Some(item) = node.items.as_deref() else {
            tracing::debug!(name = %name, "array without item declaration, skipped");
            return;
        };

        match &item.node_type {
            item_type
                if item_type.is_scalar()
                    && (item.enumeration.is_some()
                        || item.pattern.is_some()
                        || !item.has_properties()) =>
            {
                // Enumerated, patterned or bare scalar items: one repeated leaf.
                // Any scalar item type counts here (integer, number and boolean as well as string).
                self.add(name, Some(true), paths, prefix);
            }
            NodeType::Object => {
                let current = self.add(name, Some(true), paths, prefix);
                if self.format.adds_type_marker(&NodeType::Object, name) {
                    self.registry
                        .add_attribute_path(RDF_TYPE, None, paths, Some(current));
                }
                self.walk_children(item, Some(current), false, paths);
            }
            item_type if item_type.is_scalar() => {
                // Scalar items with child declarations (text plus attributes).
                let current = self.add(name, Some(true), paths, prefix);
                let value_marker = self.format.adds_value_marker(item, name);
                self.walk_content(item, Some(current), value_marker, paths);
            }
            NodeType::Array => {
                // Nested arrays add no segment of their own.
                self.walk_array(name, item, prefix, paths);
            }
            _ => {
                if item.has_properties() {
                    self.walk_children(item, prefix, false, paths);
                } else {
                    tracing::debug!(
                        name = %name,
                        item_type = item.node_type.as_str(),
                        "array item without usable type or properties, skipped"
                    );
                }
            }
        }
    }

    /// Children of a non-array node plus its optional value marker.
    fn walk_content(
        &mut self,
        node: &SchemaTreeNode,
        current: Option<PathId>,
        value_marker: bool,
        paths: &mut PathSet,
    ) {
        if !node.has_properties() {
            if value_marker {
                self.registry
                    .add_attribute_path(RDF_VALUE, None, paths, current);
            }
            return;
        }
        self.walk_children(node, current, value_marker, paths);
    }

    /// Attribute-like children first, then the value marker, then
    /// element-like children.
    fn walk_children(
        &mut self,
        node: &SchemaTreeNode,
        current: Option<PathId>,
        value_marker: bool,
        paths: &mut PathSet,
    ) {
        let (attributes, elements): (Vec<_>, Vec<_>) = node
            .properties
            .iter()
            .partition(|(name, _)| self.format.classify_child(name) == ChildKind::AttributeLike);

        for (name, child) in attributes {
            self.walk(name, child, current, true, paths);
        }
        if value_marker {
            self.registry
                .add_attribute_path(RDF_VALUE, None, paths, current);
        }
        for (name, child) in elements {
            self.walk(name, child, current, true, paths);
        }
    }

    fn add(
        &mut self,
        name: &str,
        multivalue: Option<bool>,
        paths: &mut PathSet,
        prefix: Option<PathId>,
    ) -> PathId {
        let uri = self.minter.mint_attribute_uri(
            self.format.local_name(name),
            self.context.schema_uuid,
            self.context.base_uri,
        );
        self.registry.add_attribute_path(&uri, multivalue, paths, prefix)
    }
}
