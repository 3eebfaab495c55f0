/*
 * ast/pool.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Reuse of node allocations across parses.
 */

use dpml_source_map::Range;

use super::node::{Attributes, Content, Document, Element, Node, Reference};

/// Allocation counters for a [`NodePool`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Nodes handed out.
    pub acquired: usize,
    /// Of those, how many came from a free list.
    pub reused: usize,
    /// Nodes returned to a free list.
    pub recycled: usize,
}

/// Free lists of previously used nodes.
///
/// Acquired nodes are always indistinguishable from freshly constructed
/// ones: every field is reset before a node is handed out.
#[derive(Debug, Default)]
pub struct NodePool {
    elements: Vec<Element>,
    contents: Vec<Content>,
    references: Vec<Reference>,
    stats: PoolStats,
}

impl NodePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire_element(&mut self, tag_name: &str, position: Range) -> Element {
        self.stats.acquired += 1;
        match self.elements.pop() {
            Some(mut element) => {
                self.stats.reused += 1;
                element.tag_name.clear();
                element.tag_name.push_str(tag_name);
                element.position = position;
                element
            }
            None => Element::new(tag_name).with_position(position),
        }
    }

    pub fn acquire_content(&mut self, value: &str, position: Range) -> Content {
        self.stats.acquired += 1;
        match self.contents.pop() {
            Some(mut content) => {
                self.stats.reused += 1;
                content.value.clear();
                content.value.push_str(value);
                content.position = position;
                content
            }
            None => Content::new(value, position),
        }
    }

    pub fn acquire_reference(&mut self, protocol: &str, path: &str, position: Range) -> Reference {
        self.stats.acquired += 1;
        match self.references.pop() {
            Some(mut reference) => {
                self.stats.reused += 1;
                reference.protocol.clear();
                reference.protocol.push_str(protocol);
                reference.path.clear();
                reference.path.push_str(path);
                reference.position = position;
                reference
            }
            None => Reference::new(protocol, path).with_position(position),
        }
    }

    /// Return every node of a document to the pool.
    pub fn recycle(&mut self, document: Document) {
        self.recycle_nodes(document.children);
    }

    pub fn recycle_element(&mut self, element: Element) {
        self.recycle_nodes(vec![Node::Element(element)]);
    }

    // Explicit stack; arbitrarily deep trees never recurse.
    fn recycle_nodes(&mut self, nodes: Vec<Node>) {
        let mut stack = nodes;
        while let Some(node) = stack.pop() {
            match node {
                Node::Element(mut element) => {
                    stack.append(&mut element.children);
                    element.attributes = Attributes::new();
                    element.metadata = None;
                    element.meta = None;
                    element.position = Range::default();
                    self.elements.push(element);
                }
                Node::Content(mut content) => {
                    content.position = Range::default();
                    self.contents.push(content);
                }
                Node::Reference(mut reference) => {
                    reference.resolved = None;
                    reference.position = Range::default();
                    self.references.push(reference);
                }
            }
            self.stats.recycled += 1;
        }
    }

    /// Drop all pooled nodes. Counters are kept.
    pub fn clear(&mut self) {
        self.elements.clear();
        self.contents.clear();
        self.references.clear();
    }

    pub fn available(&self) -> usize {
        self.elements.len() + self.contents.len() + self.references.len()
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }
}
