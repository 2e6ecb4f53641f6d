//! JSON Schema adapter.

use crate::error::{IngestError, IngestResult};
use crate::tree::{NodeType, SchemaTreeNode};

pub fn parse_tree(contents: &str, label: &str) -> IngestResult<SchemaTreeNode> {
    let value: serde_json::Value =
        serde_json::from_str(contents).map_err(|err| IngestError::unreadable(label, err))?;
    if !value.is_object() {
        return Err(IngestError::unreadable(
            label,
            "top-level JSON value is not an object",
        ));
    }
    Ok(SchemaTreeNode::from_json(&value))
}

pub fn adds_type_marker(node_type: &NodeType) -> bool {
    *node_type == NodeType::Object
}
