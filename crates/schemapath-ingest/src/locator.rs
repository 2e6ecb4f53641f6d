//! Record-tag locator: finds the sub-trees that describe one record.

use crate::tree::{NodeType, SchemaTreeNode};

/// Root name used when the whole document is the record and it has no title.
pub const ROOT_NODE_IDENTIFIER: &str = "__ROOT_NODE__";

#[derive(Debug, Clone, PartialEq)]
pub struct RecordRoot<'t> {
    pub name: String,
    pub node: &'t SchemaTreeNode,
}

impl RecordRoot<'_> {
    pub fn is_document_root(&self) -> bool {
        self.name == ROOT_NODE_IDENTIFIER
    }
}

/// Find the record roots of `tree`.
///
/// Without a tag the whole document is the single record, named by its title
/// (the title itself is not part of the walk) or [`ROOT_NODE_IDENTIFIER`].
///
/// With a tag the tree is searched depth-first for children whose name ends
/// with it. An array-typed match yields its item shape under the match's name;
/// any other match is taken as-is and ends the scan of its siblings.
/// Non-matching children are searched recursively.
pub fn locate<'t>(tree: &'t SchemaTreeNode, record_tag: Option<&str>) -> Vec<RecordRoot<'t>> {
    match record_tag.map(str::trim).filter(|tag| !tag.is_empty()) {
        None => {
            let name = tree
                .title
                .as_deref()
                .map(str::trim)
                .filter(|title| !title.is_empty())
                .unwrap_or(ROOT_NODE_IDENTIFIER)
                .to_string();
            vec![RecordRoot { name, node: tree }]
        }
        Some(tag) => {
            let mut roots = Vec::new();
            search(tree, tag, &mut roots);
            roots
        }
    }
}

fn search<'t>(node: &'t SchemaTreeNode, tag: &str, roots: &mut Vec<RecordRoot<'t>>) {
    if !node.has_properties() {
        if let Some(items) = node.items.as_deref() {
            search(items, tag, roots);
        }
        return;
    }

    for (name, child) in &node.properties {
        if name.ends_with(tag) {
            if child.node_type == NodeType::Array {
                match child.items.as_deref() {
                    Some(item) => roots.push(RecordRoot {
                        name: name.clone(),
                        node: item,
                    }),
                    None => tracing::debug!(name = %name, "record tag matches an array without items"),
                }
                continue;
            }

            roots.push(RecordRoot {
                name: name.clone(),
                node: child,
            });
            break;
        }

        search(child, tag, roots);
    }
}
