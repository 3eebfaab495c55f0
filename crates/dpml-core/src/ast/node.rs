/*
 * ast/node.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Document, Element, Content and Reference nodes.
 */

use std::path::PathBuf;

use dpml_source_map::Range;
use hashlink::LinkedHashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::expression::AttributeValue;

/// Ordered attribute map; iteration follows source order.
pub type Attributes = LinkedHashMap<String, String>;

/// The kind of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Document,
    Element,
    Content,
    Reference,
}

/// Behavior shared by every node.
pub trait AstNode {
    fn node_type(&self) -> NodeType;
    fn position(&self) -> Range;
}

/// Strictness of a processing run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentMode {
    Strict,
    #[default]
    Loose,
}

impl DocumentMode {
    /// Parse a `mode` attribute value; anything unrecognized is `None`.
    pub fn from_attribute(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "strict" => Some(DocumentMode::Strict),
            "loose" => Some(DocumentMode::Loose),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub mode: DocumentMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_path: Option<PathBuf>,
}

/// Root of a parsed document.
///
/// Its children are exactly the parsed top-level elements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub children: Vec<Node>,
    pub position: Range,
    pub metadata: DocumentMetadata,
}

/// A tagged element.
///
/// `Clone` and `Drop` walk the subtree with an explicit stack, so element
/// trees of any depth can be copied and released.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub tag_name: String,
    pub attributes: Attributes,
    pub children: Vec<Node>,
    pub position: Range,
    /// Annotations written by the processing pipeline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    /// Annotations written by the transform chain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub value: String,
    pub position: Range,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    /// Scheme; `id` when the source had none.
    pub protocol: String,
    /// Never empty; may carry a `#fragment`.
    pub path: String,
    pub position: Range,
    /// Filled in once resolution succeeds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved: Option<ResolvedValue>,
}

/// What a reference resolved to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ResolvedValue {
    Text(String),
    Json(Value),
    Element(Box<Element>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Node {
    Element(Element),
    Content(Content),
    Reference(Reference),
}

impl Document {
    pub fn new(children: Vec<Node>) -> Self {
        Self {
            children,
            ..Default::default()
        }
    }

    /// Top-level elements, skipping other node kinds.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// First element in document order whose `id` matches.
    pub fn find_by_id(&self, id: &str) -> Option<&Element> {
        let mut stack: Vec<&Element> = self.elements().collect();
        stack.reverse();
        while let Some(element) = stack.pop() {
            if element.id() == Some(id) {
                return Some(element);
            }
            stack.extend(element.child_elements().rev());
        }
        None
    }

    /// Every element in depth-first pre-order.
    pub fn all_elements(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        let mut stack: Vec<&Element> = self.elements().collect();
        stack.reverse();
        while let Some(element) = stack.pop() {
            out.push(element);
            stack.extend(element.child_elements().rev());
        }
        out
    }

    /// Every reference node in document order.
    pub fn references(&self) -> Vec<&Reference> {
        let mut out = Vec::new();
        let mut stack: Vec<&Node> = self.children.iter().rev().collect();
        while let Some(node) = stack.pop() {
            match node {
                Node::Reference(reference) => out.push(reference),
                Node::Element(element) => stack.extend(element.children.iter().rev()),
                Node::Content(_) => {}
            }
        }
        out
    }

    /// Node at an index path (first index into `children`, then into element children).
    pub fn node_at(&self, path: &[usize]) -> Option<&Node> {
        let (first, rest) = path.split_first()?;
        let mut node = self.children.get(*first)?;
        for &idx in rest {
            node = node.as_element()?.children.get(idx)?;
        }
        Some(node)
    }

    pub fn node_at_mut(&mut self, path: &[usize]) -> Option<&mut Node> {
        let (first, rest) = path.split_first()?;
        let mut node = self.children.get_mut(*first)?;
        for &idx in rest {
            node = node.as_element_mut()?.children.get_mut(idx)?;
        }
        Some(node)
    }
}

impl Element {
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            attributes: Attributes::new(),
            children: Vec::new(),
            position: Range::default(),
            metadata: None,
            meta: None,
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn with_position(mut self, position: Range) -> Self {
        self.position = position;
        self
    }

    /// Lowercased tag name, the key used for schema lookup.
    pub fn normalized_tag(&self) -> String {
        self.tag_name.to_lowercase()
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn id(&self) -> Option<&str> {
        self.attribute("id")
    }

    /// Attribute value classified as literal or expression.
    pub fn attribute_value(&self, name: &str) -> Option<AttributeValue> {
        self.attribute(name).map(AttributeValue::parse)
    }

    /// Attributes whose value is a `${...}` expression, in source order.
    pub fn expression_attributes(&self) -> Vec<(&str, String)> {
        self.attributes
            .iter()
            .filter_map(|(name, value)| match AttributeValue::parse(value) {
                AttributeValue::Expression(expr) => Some((name.as_str(), expr)),
                AttributeValue::Literal(_) => None,
            })
            .collect()
    }

    pub fn child_elements(&self) -> impl DoubleEndedIterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    pub fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(Node::as_element_mut)
    }

    /// Concatenated text of the subtree; references render as `@protocol:path`.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        let mut stack: Vec<&Node> = self.children.iter().rev().collect();
        while let Some(node) = stack.pop() {
            match node {
                Node::Content(content) => out.push_str(&content.value),
                Node::Reference(reference) => {
                    out.push('@');
                    out.push_str(&reference.cache_key());
                }
                Node::Element(element) => stack.extend(element.children.iter().rev()),
            }
        }
        out
    }

    /// Processing-pipeline annotations, created on first use.
    pub fn metadata_mut(&mut self) -> &mut Map<String, Value> {
        self.metadata.get_or_insert_with(Map::new)
    }

    /// Transform-chain annotations, created on first use.
    pub fn meta_mut(&mut self) -> &mut Map<String, Value> {
        self.meta.get_or_insert_with(Map::new)
    }

    pub fn meta_value(&self, key: &str) -> Option<&Value> {
        self.meta.as_ref().and_then(|meta| meta.get(key))
    }

    /// Copy of this element without its children.
    pub fn shallow_clone(&self) -> Element {
        Element {
            tag_name: self.tag_name.clone(),
            attributes: self.attributes.clone(),
            children: Vec::new(),
            position: self.position,
            metadata: self.metadata.clone(),
            meta: self.meta.clone(),
        }
    }
}

impl Content {
    pub fn new(value: impl Into<String>, position: Range) -> Self {
        Self {
            value: value.into(),
            position,
        }
    }
}

impl Reference {
    pub fn new(protocol: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            path: path.into(),
            position: Range::default(),
            resolved: None,
        }
    }

    pub fn with_position(mut self, position: Range) -> Self {
        self.position = position;
        self
    }

    /// The `protocol:path` key used by the resolution cache.
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.protocol, self.path)
    }

    /// Split `path` into the target and an optional `#fragment`.
    pub fn split_fragment(&self) -> (&str, Option<&str>) {
        match self.path.split_once('#') {
            Some((target, fragment)) => (target, Some(fragment)),
            None => (self.path.as_str(), None),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn as_content(&self) -> Option<&Content> {
        match self {
            Node::Content(content) => Some(content),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            Node::Reference(reference) => Some(reference),
            _ => None,
        }
    }

    /// Overwrite the position of this node and its whole subtree.
    pub fn reposition(&mut self, position: Range) {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match node {
                Node::Element(element) => {
                    element.position = position;
                    stack.extend(element.children.iter_mut());
                }
                Node::Content(content) => content.position = position,
                Node::Reference(reference) => reference.position = position,
            }
        }
    }
}

/// A copy under construction and the source children not yet copied.
struct CloneFrame<'a> {
    copy: Element,
    pending: std::slice::Iter<'a, Node>,
}

impl Clone for Element {
    fn clone(&self) -> Self {
        let mut stack: Vec<CloneFrame<'_>> = Vec::new();
        let mut current = CloneFrame {
            copy: self.shallow_clone(),
            pending: self.children.iter(),
        };
        loop {
            match current.pending.next() {
                Some(Node::Element(child)) => {
                    let frame = CloneFrame {
                        copy: child.shallow_clone(),
                        pending: child.children.iter(),
                    };
                    stack.push(std::mem::replace(&mut current, frame));
                }
                Some(Node::Content(content)) => current.copy.children.push(Node::Content(content.clone())),
                Some(Node::Reference(reference)) => {
                    current.copy.children.push(Node::Reference(reference.clone()))
                }
                None => {
                    let Some(parent) = stack.pop() else {
                        return current.copy;
                    };
                    let finished = std::mem::replace(&mut current, parent);
                    current.copy.children.push(Node::Element(finished.copy));
                }
            }
        }
    }
}

impl Drop for Element {
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.children);
        while let Some(node) = stack.pop() {
            if let Node::Element(mut element) = node {
                stack.append(&mut element.children);
            }
        }
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

impl From<Content> for Node {
    fn from(content: Content) -> Self {
        Node::Content(content)
    }
}

impl From<Reference> for Node {
    fn from(reference: Reference) -> Self {
        Node::Reference(reference)
    }
}

impl AstNode for Document {
    fn node_type(&self) -> NodeType {
        NodeType::Document
    }

    fn position(&self) -> Range {
        self.position
    }
}

impl AstNode for Element {
    fn node_type(&self) -> NodeType {
        NodeType::Element
    }

    fn position(&self) -> Range {
        self.position
    }
}

impl AstNode for Content {
    fn node_type(&self) -> NodeType {
        NodeType::Content
    }

    fn position(&self) -> Range {
        self.position
    }
}

impl AstNode for Reference {
    fn node_type(&self) -> NodeType {
        NodeType::Reference
    }

    fn position(&self) -> Range {
        self.position
    }
}

impl AstNode for Node {
    fn node_type(&self) -> NodeType {
        match self {
            Node::Element(_) => NodeType::Element,
            Node::Content(_) => NodeType::Content,
            Node::Reference(_) => NodeType::Reference,
        }
    }

    fn position(&self) -> Range {
        match self {
            Node::Element(element) => element.position,
            Node::Content(content) => content.position,
            Node::Reference(reference) => reference.position,
        }
    }
}
