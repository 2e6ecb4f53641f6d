//! XML Schema adapter.
//!
//! Converts an XSD document into a [`SchemaTreeNode`]:
//!
//! - global element declarations become the root's children;
//! - `sequence`/`choice`/`all` groups are flattened into their parent;
//! - `element ref=`, `group ref=`, `attributeGroup ref=` and named types are
//!   resolved against the schema's global declarations;
//! - particles with `maxOccurs` other than `1` become arrays;
//! - attributes become `@name` string children;
//! - simple types and simple content become `string` nodes (simple content
//!   keeps its attributes as `@` children);
//! - `mixed="true"` marks an object as mixed content.
//!
//! Self-referencing global elements, named types and groups are expanded once
//! per branch; the inner occurrence is an empty object (or, for groups,
//! contributes nothing).

use super::XML_ATTRIBUTE_PREFIX;
use crate::error::{IngestError, IngestResult};
use crate::tree::{NodeType, SchemaTreeNode};
use roxmltree::{Document, Node};
use std::collections::HashMap;

const XS_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

pub fn convert(contents: &str, label: &str) -> IngestResult<SchemaTreeNode> {
    let document = Document::parse(contents).map_err(|err| IngestError::unreadable(label, err))?;
    let schema = document.root_element();
    if !is_xs(&schema, "schema") {
        return Err(IngestError::unreadable(
            label,
            format!("root element is <{}>, not xs:schema", schema.tag_name().name()),
        ));
    }

    let globals = Globals::collect(&schema);
    let mut converter = Converter {
        globals: &globals,
        expanding: Vec::new(),
    };

    let mut properties = Vec::new();
    for element in schema.children().filter(|n| is_xs(n, "element")) {
        if let Some((name, node)) = converter.element(&element) {
            push_property(&mut properties, name, node);
        }
    }

    tracing::debug!(
        location = %label,
        roots = properties.len(),
        complex_types = globals.complex_types.len(),
        "converted XML schema"
    );
    Ok(SchemaTreeNode::object(properties))
}

pub fn adds_type_marker(node_type: &NodeType, name: &str) -> bool {
    *node_type == NodeType::Object && !name.starts_with(XML_ATTRIBUTE_PREFIX)
}

pub fn adds_value_marker(node: &SchemaTreeNode, name: &str) -> bool {
    if name.starts_with(XML_ATTRIBUTE_PREFIX) {
        return false;
    }
    match node.node_type {
        NodeType::String => true,
        NodeType::Object => node.mixed,
        _ => false,
    }
}

fn is_xs(node: &Node<'_, '_>, name: &str) -> bool {
    node.is_element()
        && node.tag_name().name() == name
        && node.tag_name().namespace().map_or(true, |ns| ns == XS_NAMESPACE)
}

/// `prefix:local` → `local`.
fn local(qname: &str) -> &str {
    qname.rsplit(':').next().unwrap_or(qname)
}

/// Top-level declaration, the only kind an `element ref=` can reach.
fn is_global(node: &Node<'_, '_>) -> bool {
    node.parent_element().map_or(false, |parent| is_xs(&parent, "schema"))
}

fn is_repeated(node: &Node<'_, '_>) -> bool {
    node.attribute("maxOccurs")
        .map_or(false, |max| !matches!(max.trim(), "0" | "1"))
}

fn push_property(properties: &mut Vec<(String, SchemaTreeNode)>, name: String, node: SchemaTreeNode) {
    if properties.iter().any(|(existing, _)| *existing == name) {
        tracing::debug!(name = %name, "duplicate particle name, keeping the first declaration");
        return;
    }
    properties.push((name, node));
}

struct Globals<'a, 'input> {
    elements: HashMap<&'a str, Node<'a, 'input>>,
    complex_types: HashMap<&'a str, Node<'a, 'input>>,
    simple_types: HashMap<&'a str, Node<'a, 'input>>,
    groups: HashMap<&'a str, Node<'a, 'input>>,
    attribute_groups: HashMap<&'a str, Node<'a, 'input>>,
}

impl<'a, 'input> Globals<'a, 'input> {
    fn collect(schema: &Node<'a, 'input>) -> Self {
        let mut globals = Globals {
            elements: HashMap::new(),
            complex_types: HashMap::new(),
            simple_types: HashMap::new(),
            groups: HashMap::new(),
            attribute_groups: HashMap::new(),
        };

        for child in schema.children().filter(Node::is_element) {
            let Some(name) = child.attribute("name") else {
                continue;
            };
            let table = match child.tag_name().name() {
                "element" => &mut globals.elements,
                "complexType" => &mut globals.complex_types,
                "simpleType" => &mut globals.simple_types,
                "group" => &mut globals.groups,
                "attributeGroup" => &mut globals.attribute_groups,
                _ => continue,
            };
            table.insert(name, child);
        }
        globals
    }
}

struct Converter<'g, 'a, 'input> {
    globals: &'g Globals<'a, 'input>,
    /// Named types and groups currently being expanded.
    expanding: Vec<String>,
}

impl<'g, 'a, 'input> Converter<'g, 'a, 'input> {
    fn element(&mut self, element: &Node<'a, 'input>) -> Option<(String, SchemaTreeNode)> {
        let (name, declaration) = match element.attribute("ref") {
            Some(reference) => {
                let name = local(reference);
                match self.globals.elements.get(name) {
                    Some(declaration) => (name.to_string(), *declaration),
                    None => {
                        tracing::debug!(reference = %reference, "unresolved element reference");
                        return Some((name.to_string(), SchemaTreeNode::string()));
                    }
                }
            }
            None => {
                let Some(name) = element.attribute("name") else {
                    tracing::debug!("element declaration without name or ref");
                    return None;
                };
                (name.to_string(), *element)
            }
        };

        let content = if is_global(&declaration) {
            let key = format!("element:{name}");
            if self.expanding.contains(&key) {
                tracing::debug!(element = %name, "recursive element, not expanding again");
                SchemaTreeNode::object(Vec::new())
            } else {
                self.expanding.push(key);
                let content = self.element_content(&declaration);
                self.expanding.pop();
                content
            }
        } else {
            self.element_content(&declaration)
        };
        let node = if is_repeated(element) {
            SchemaTreeNode::array(content)
        } else {
            content
        };
        Some((name, node))
    }

    fn element_content(&mut self, declaration: &Node<'a, 'input>) -> SchemaTreeNode {
        if let Some(type_name) = declaration.attribute("type") {
            return self.named_type(local(type_name));
        }

        for child in declaration.children().filter(Node::is_element) {
            match child.tag_name().name() {
                "complexType" => return self.complex_type(&child),
                "simpleType" => return simple_type(&child),
                _ => {}
            }
        }
        SchemaTreeNode::string()
    }

    fn named_type(&mut self, name: &str) -> SchemaTreeNode {
        if let Some(complex) = self.globals.complex_types.get(name).copied() {
            let key = format!("type:{name}");
            if self.expanding.contains(&key) {
                tracing::debug!(type_name = %name, "recursive complex type, not expanding again");
                return SchemaTreeNode::object(Vec::new());
            }
            self.expanding.push(key);
            let node = self.complex_type(&complex);
            self.expanding.pop();
            return node;
        }

        match self.globals.simple_types.get(name) {
            Some(simple) => simple_type(simple),
            // Built-in datatypes (xs:string, xs:int, ...).
            None => SchemaTreeNode::string(),
        }
    }

    fn complex_type(&mut self, complex: &Node<'a, 'input>) -> SchemaTreeNode {
        let mut mixed = complex.attribute("mixed") == Some("true");
        let mut properties = Vec::new();

        for child in complex.children().filter(Node::is_element) {
            match child.tag_name().name() {
                "simpleContent" => return self.simple_content(&child),
                "complexContent" => {
                    mixed |= child.attribute("mixed") == Some("true");
                    self.complex_content(&child, &mut properties);
                }
                _ => self.content_model(&child, false, &mut properties),
            }
        }

        let node = SchemaTreeNode::object(properties);
        if mixed {
            node.mixed()
        } else {
            node
        }
    }

    /// One child of a complex type body: a particle group, a group or
    /// attribute reference, or an attribute.
    fn content_model(
        &mut self,
        node: &Node<'a, 'input>,
        repeated: bool,
        properties: &mut Vec<(String, SchemaTreeNode)>,
    ) {
        match node.tag_name().name() {
            "sequence" | "choice" | "all" => {
                let repeated = repeated || is_repeated(node);
                for particle in node.children().filter(Node::is_element) {
                    match particle.tag_name().name() {
                        "element" => {
                            if let Some((name, mut child)) = self.element(&particle) {
                                if repeated && child.node_type != NodeType::Array {
                                    child = SchemaTreeNode::array(child);
                                }
                                push_property(properties, name, child);
                            }
                        }
                        "any" => {}
                        _ => self.content_model(&particle, repeated, properties),
                    }
                }
            }
            "group" => self.group_reference(node, repeated, properties),
            "attribute" => attribute(node, properties),
            "attributeGroup" => self.attribute_group(node, properties),
            _ => {}
        }
    }

    fn group_reference(
        &mut self,
        node: &Node<'a, 'input>,
        repeated: bool,
        properties: &mut Vec<(String, SchemaTreeNode)>,
    ) {
        let Some(reference) = node.attribute("ref") else {
            return;
        };
        let name = local(reference);
        let Some(group) = self.globals.groups.get(name).copied() else {
            tracing::debug!(reference = %reference, "unresolved group reference");
            return;
        };

        let key = format!("group:{name}");
        if self.expanding.contains(&key) {
            return;
        }
        self.expanding.push(key);
        let repeated = repeated || is_repeated(node);
        for child in group.children().filter(Node::is_element) {
            self.content_model(&child, repeated, properties);
        }
        self.expanding.pop();
    }

    fn attribute_group(&mut self, node: &Node<'a, 'input>, properties: &mut Vec<(String, SchemaTreeNode)>) {
        let group = match node.attribute("ref") {
            Some(reference) => match self.globals.attribute_groups.get(local(reference)) {
                Some(group) => *group,
                None => {
                    tracing::debug!(reference = %reference, "unresolved attribute group reference");
                    return;
                }
            },
            None => *node,
        };

        let key = format!("attributeGroup:{}", group.attribute("name").unwrap_or_default());
        if self.expanding.contains(&key) {
            return;
        }
        self.expanding.push(key);
        for child in group.children().filter(Node::is_element) {
            match child.tag_name().name() {
                "attribute" => attribute(&child, properties),
                "attributeGroup" => self.attribute_group(&child, properties),
                _ => {}
            }
        }
        self.expanding.pop();
    }

    fn simple_content(&mut self, content: &Node<'a, 'input>) -> SchemaTreeNode {
        let mut properties = Vec::new();
        for derivation in content.children().filter(Node::is_element) {
            for child in derivation.children().filter(Node::is_element) {
                match child.tag_name().name() {
                    "attribute" => attribute(&child, &mut properties),
                    "attributeGroup" => self.attribute_group(&child, &mut properties),
                    _ => {}
                }
            }
        }
        SchemaTreeNode {
            properties,
            ..SchemaTreeNode::string()
        }
    }

    fn complex_content(&mut self, content: &Node<'a, 'input>, properties: &mut Vec<(String, SchemaTreeNode)>) {
        for derivation in content.children().filter(Node::is_element) {
            if derivation.tag_name().name() == "extension" {
                if let Some(base) = derivation.attribute("base") {
                    let base = self.named_type(local(base));
                    for (name, node) in base.properties {
                        push_property(properties, name, node);
                    }
                }
            }
            for child in derivation.children().filter(Node::is_element) {
                self.content_model(&child, false, properties);
            }
        }
    }
}

fn attribute(node: &Node<'_, '_>, properties: &mut Vec<(String, SchemaTreeNode)>) {
    if node.attribute("use") == Some("prohibited") {
        return;
    }
    let Some(name) = node.attribute("name").or_else(|| node.attribute("ref").map(local)) else {
        return;
    };
    push_property(
        properties,
        format!("{XML_ATTRIBUTE_PREFIX}{name}"),
        SchemaTreeNode::string(),
    );
}

fn simple_type(simple: &Node<'_, '_>) -> SchemaTreeNode {
    let mut node = SchemaTreeNode::string();
    let Some(restriction) = simple
        .children()
        .find(|child| is_xs(child, "restriction"))
    else {
        return node;
    };

    let enumeration: Vec<String> = restriction
        .children()
        .filter(|child| is_xs(child, "enumeration"))
        .filter_map(|child| child.attribute("value").map(str::to_string))
        .collect();
    if !enumeration.is_empty() {
        node.enumeration = Some(enumeration);
    }
    node.pattern = restriction
        .children()
        .find(|child| is_xs(child, "pattern"))
        .and_then(|child| child.attribute("value").map(str::to_string));
    node
}

#[cfg(test)]
mod tests {
    use super::*;

    const XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="http://example.org/rec">
  <xs:element name="records">
    <xs:complexType>
      <xs:sequence>
        <xs:element ref="record" maxOccurs="unbounded"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
  <xs:element name="record" type="recordType"/>
  <xs:complexType name="recordType">
    <xs:sequence>
      <xs:element name="title" type="titleType"/>
      <xs:element name="subject" type="xs:string" maxOccurs="unbounded"/>
      <xs:group ref="noteGroup"/>
      <xs:element name="part" type="recordType" minOccurs="0"/>
      <xs:element name="status">
        <xs:simpleType>
          <xs:restriction base="xs:string">
            <xs:enumeration value="draft"/>
            <xs:enumeration value="final"/>
          </xs:restriction>
        </xs:simpleType>
      </xs:element>
    </xs:sequence>
    <xs:attribute name="id" type="xs:ID" use="required"/>
  </xs:complexType>
  <xs:complexType name="titleType">
    <xs:simpleContent>
      <xs:extension base="xs:string">
        <xs:attribute name="lang" type="xs:language"/>
      </xs:extension>
    </xs:simpleContent>
  </xs:complexType>
  <xs:group name="noteGroup">
    <xs:sequence>
      <xs:element name="note" mixed="true">
        <xs:complexType mixed="true">
          <xs:sequence>
            <xs:element name="em" type="xs:string" minOccurs="0"/>
          </xs:sequence>
        </xs:complexType>
      </xs:element>
    </xs:sequence>
  </xs:group>
</xs:schema>"#;

    fn names(node: &SchemaTreeNode) -> Vec<&str> {
        node.properties.iter().map(|(n, _)| n.as_str()).collect()
    }

    #[test]
    fn converts_global_elements_and_references() {
        let tree = convert(XSD, "record.xsd").unwrap();
        assert_eq!(names(&tree), vec!["records", "record"]);

        let records = tree.property("records").unwrap();
        let wrapped = records.property("record").unwrap();
        assert_eq!(wrapped.node_type, NodeType::Array);
        let item = wrapped.items.as_deref().unwrap();
        assert_eq!(item.node_type, NodeType::Object);
        assert_eq!(names(item), vec!["title", "subject", "note", "part", "status", "@id"]);
    }

    #[test]
    fn simple_content_keeps_attributes() {
        let tree = convert(XSD, "record.xsd").unwrap();
        let title = tree.property("record").and_then(|r| r.property("title")).unwrap();
        assert_eq!(title.node_type, NodeType::String);
        assert_eq!(names(title), vec!["@lang"]);
    }

    #[test]
    fn repeated_mixed_enumerated_and_recursive() {
        let tree = convert(XSD, "record.xsd").unwrap();
        let record = tree.property("record").unwrap();

        assert_eq!(record.property("subject").map(|n| &n.node_type), Some(&NodeType::Array));
        assert!(record.property("note").unwrap().mixed);
        assert_eq!(
            record.property("status").unwrap().enumeration,
            Some(vec!["draft".to_string(), "final".to_string()])
        );

        // recordType inside recordType is cut off.
        let part = record.property("part").unwrap();
        assert_eq!(part.node_type, NodeType::Object);
        assert!(part.properties.is_empty());
    }

    #[test]
    fn recursive_element_reference_is_cut_off() {
        let xsd = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="node">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="label" type="xs:string"/>
        <xs:element ref="node" minOccurs="0" maxOccurs="unbounded"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;
        let tree = convert(xsd, "tree.xsd").unwrap();
        let node = tree.property("node").unwrap();
        assert_eq!(names(node), vec!["label", "node"]);

        let nested = node.property("node").unwrap();
        assert_eq!(nested.node_type, NodeType::Array);
        let item = nested.items.as_deref().unwrap();
        assert_eq!(item.node_type, NodeType::Object);
        assert!(item.properties.is_empty());
    }

    #[test]
    fn recursive_named_type_is_cut_off() {
        let xsd = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="folder" type="folderType"/>
  <xs:complexType name="folderType">
    <xs:sequence>
      <xs:element name="title" type="xs:string"/>
      <xs:element name="folder" type="folderType" minOccurs="0"/>
    </xs:sequence>
  </xs:complexType>
</xs:schema>"#;
        let tree = convert(xsd, "folders.xsd").unwrap();
        let folder = tree.property("folder").unwrap();
        assert_eq!(names(folder), vec!["title", "folder"]);

        let nested = folder.property("folder").unwrap();
        assert_eq!(nested.node_type, NodeType::Object);
        assert!(nested.properties.is_empty());
    }

    #[test]
    fn recursive_group_contributes_nothing() {
        let xsd = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:group name="branch">
    <xs:sequence>
      <xs:element name="leaf" type="xs:string"/>
      <xs:element name="child">
        <xs:complexType>
          <xs:group ref="branch"/>
        </xs:complexType>
      </xs:element>
      <xs:group ref="branch"/>
    </xs:sequence>
  </xs:group>
  <xs:element name="tree">
    <xs:complexType>
      <xs:group ref="branch"/>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;
        let tree = convert(xsd, "branches.xsd").unwrap();
        let root = tree.property("tree").unwrap();
        assert_eq!(names(root), vec!["leaf", "child"]);

        let child = root.property("child").unwrap();
        assert_eq!(child.node_type, NodeType::Object);
        assert!(child.properties.is_empty());
    }

    #[test]
    fn same_local_name_at_different_depths_is_expanded() {
        let xsd = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="section">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="section">
          <xs:complexType>
            <xs:sequence><xs:element name="para" type="xs:string"/></xs:sequence>
          </xs:complexType>
        </xs:element>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;
        let tree = convert(xsd, "sections.xsd").unwrap();
        let inner = tree
            .property("section")
            .and_then(|outer| outer.property("section"))
            .unwrap();
        assert_eq!(names(inner), vec!["para"]);
    }

    #[test]
    fn non_schema_documents_are_rejected() {
        assert!(matches!(
            convert("<root/>", "x.xsd"),
            Err(IngestError::SourceUnreadable { .. })
        ));
        assert!(matches!(
            convert("<xs:schema", "x.xsd"),
            Err(IngestError::SourceUnreadable { .. })
        ));
    }
}
