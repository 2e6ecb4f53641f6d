//! Format-agnostic schema tree.
//!
//! JSON Schema documents map onto it directly; XSD documents are converted
//! into it by [`crate::format::xsd`].

use serde_json::{Map, Value};

/// Declared type of a tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeType {
    Object,
    Array,
    String,
    /// Any other declared scalar (`integer`, `number`, `boolean`, ...).
    Scalar(String),
    /// No (usable) type declaration.
    Unknown,
}

impl NodeType {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "object" => NodeType::Object,
            "array" => NodeType::Array,
            "string" => NodeType::String,
            "" => NodeType::Unknown,
            other => NodeType::Scalar(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            NodeType::Object => "object",
            NodeType::Array => "array",
            NodeType::String => "string",
            NodeType::Scalar(tag) => tag,
            NodeType::Unknown => "unknown",
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, NodeType::String | NodeType::Scalar(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaTreeNode {
    pub node_type: NodeType,
    /// Child name → child node, in declaration order.
    pub properties: Vec<(String, SchemaTreeNode)>,
    pub items: Option<Box<SchemaTreeNode>>,
    pub enumeration: Option<Vec<String>>,
    pub pattern: Option<String>,
    pub mixed: bool,
    pub title: Option<String>,
}

impl SchemaTreeNode {
    pub fn new(node_type: NodeType) -> Self {
        Self {
            node_type,
            properties: Vec::new(),
            items: None,
            enumeration: None,
            pattern: None,
            mixed: false,
            title: None,
        }
    }

    pub fn object(properties: Vec<(String, SchemaTreeNode)>) -> Self {
        Self {
            properties,
            ..Self::new(NodeType::Object)
        }
    }

    pub fn array(items: SchemaTreeNode) -> Self {
        Self {
            items: Some(Box::new(items)),
            ..Self::new(NodeType::Array)
        }
    }

    pub fn string() -> Self {
        Self::new(NodeType::String)
    }

    pub fn with_enumeration(mut self, values: Vec<String>) -> Self {
        self.enumeration = Some(values);
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn mixed(mut self) -> Self {
        self.mixed = true;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn has_properties(&self) -> bool {
        !self.properties.is_empty()
    }

    pub fn property(&self, name: &str) -> Option<&SchemaTreeNode> {
        self.properties
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, node)| node)
    }

    /// Build a tree from a JSON Schema document.
    ///
    /// Non-object values become `Unknown` leaves. A `type` list (e.g.
    /// `["string", "null"]`) uses its first non-null entry; tuple-form
    /// `items` use their first schema.
    pub fn from_json(value: &Value) -> Self {
        let Value::Object(map) = value else {
            tracing::debug!(value = %value, "schema node is not an object");
            return Self::new(NodeType::Unknown);
        };

        let mut node = Self::new(json_type(map));

        match map.get("properties") {
            Some(Value::Object(properties)) => {
                node.properties = properties
                    .iter()
                    .map(|(name, child)| (name.clone(), Self::from_json(child)))
                    .collect();
            }
            Some(other) => {
                tracing::debug!(properties = %other, "ignoring non-object properties");
            }
            None => {}
        }

        node.items = match map.get("items") {
            Some(Value::Array(tuple)) => tuple.first().map(|item| Box::new(Self::from_json(item))),
            Some(item) => Some(Box::new(Self::from_json(item))),
            None => None,
        };

        if let Some(Value::Array(values)) = map.get("enum") {
            node.enumeration = Some(
                values
                    .iter()
                    .map(|v| match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
            );
        }

        node.pattern = map.get("pattern").and_then(Value::as_str).map(str::to_string);
        node.mixed = map.get("mixed").and_then(Value::as_bool).unwrap_or(false);
        node.title = map.get("title").and_then(Value::as_str).map(str::to_string);
        node
    }
}

fn json_type(map: &Map<String, Value>) -> NodeType {
    match map.get("type") {
        Some(Value::String(tag)) => NodeType::from_tag(tag),
        Some(Value::Array(tags)) => tags
            .iter()
            .filter_map(Value::as_str)
            .find(|tag| *tag != "null")
            .map(NodeType::from_tag)
            .unwrap_or(NodeType::Unknown),
        _ => NodeType::Unknown,
    }
}
