/*
 * parser/converter.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Conversion from the generic markup tree to the DPML AST.
 */

use dpml_source_map::{LineIndex, Range};
use dpml_xml::{XmlChild, XmlDocument, XmlElement, XmlText};

use crate::ast::{
    Content, Document, DocumentMetadata, DocumentMode, Element, Node, NodePool, Reference,
};

use super::references::{Segment, scan};

/// An element being converted and its unconverted source children.
struct Frame {
    element: Element,
    pending: std::vec::IntoIter<XmlChild>,
}

/// Builds typed nodes from an [`XmlDocument`], splitting text runs
/// around inline references.
pub struct NodeConverter<'a> {
    index: &'a LineIndex,
    track_positions: bool,
    pool: Option<&'a mut NodePool>,
}

impl<'a> NodeConverter<'a> {
    pub fn new(index: &'a LineIndex, track_positions: bool) -> Self {
        Self {
            index,
            track_positions,
            pool: None,
        }
    }

    /// Draw nodes from `pool` instead of allocating.
    pub fn with_pool(mut self, pool: &'a mut NodePool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Convert a whole document.
    ///
    /// `mode` and `version` attributes on the first top-level element
    /// override the corresponding fields of `metadata`.
    pub fn convert(&mut self, xml: XmlDocument, mut metadata: DocumentMetadata) -> Document {
        if let Some(root) = xml.children.first() {
            if let Some(mode) = root.get_attribute("mode").and_then(DocumentMode::from_attribute) {
                metadata.mode = mode;
            }
            if let Some(version) = root.get_attribute("version") {
                metadata.version = Some(version.to_string());
            }
        }

        let children = xml
            .children
            .into_iter()
            .map(|element| Node::Element(self.convert_element(element)))
            .collect();

        Document {
            children,
            position: self.position(xml.range),
            metadata,
        }
    }

    /// Convert one element and its subtree.
    ///
    /// Works from an explicit stack, so nesting depth is bounded only by
    /// memory.
    pub fn convert_element(&mut self, xml: XmlElement) -> Element {
        let mut stack: Vec<Frame> = Vec::new();
        let mut current = self.open(xml);
        loop {
            match current.pending.next() {
                Some(XmlChild::Element(child)) => {
                    let frame = self.open(child);
                    stack.push(std::mem::replace(&mut current, frame));
                }
                Some(XmlChild::Text(text)) => self.convert_text(&text, &mut current.element.children),
                None => {
                    let Some(parent) = stack.pop() else {
                        return current.element;
                    };
                    let finished = std::mem::replace(&mut current, parent);
                    current.element.children.push(Node::Element(finished.element));
                }
            }
        }
    }

    /// Start an element: tag, position and attributes; children come later.
    fn open(&mut self, mut xml: XmlElement) -> Frame {
        let tag_name = xml.qualified_name();
        let position = self.position(xml.range);
        let mut element = match self.pool.as_deref_mut() {
            Some(pool) => pool.acquire_element(&tag_name, position),
            None => Element::new(tag_name).with_position(position),
        };

        for attribute in &xml.attributes {
            element.set_attribute(attribute.qualified_name(), attribute.value.clone());
        }

        Frame {
            element,
            pending: std::mem::take(&mut xml.children).into_iter(),
        }
    }

    fn convert_text(&mut self, text: &XmlText, out: &mut Vec<Node>) {
        for segment in scan(&text.content) {
            let position = self.segment_position(text, &segment.span());
            let node = match (&segment, self.pool.as_deref_mut()) {
                (Segment::Text(span), Some(pool)) => {
                    Node::Content(pool.acquire_content(&text.content[span.clone()], position))
                }
                (Segment::Text(span), None) => {
                    Node::Content(Content::new(&text.content[span.clone()], position))
                }
                (Segment::Reference { protocol, path, .. }, Some(pool)) => {
                    Node::Reference(pool.acquire_reference(protocol, path, position))
                }
                (Segment::Reference { protocol, path, .. }, None) => Node::Reference(
                    Reference::new(protocol.clone(), path.clone()).with_position(position),
                ),
            };
            out.push(node);
        }
    }

    fn position(&self, range: Range) -> Range {
        if self.track_positions {
            range
        } else {
            Range::zero()
        }
    }

    fn segment_position(&self, text: &XmlText, span: &std::ops::Range<usize>) -> Range {
        if !self.track_positions {
            return Range::zero();
        }
        self.index
            .range(text.source_offset(span.start), text.source_offset(span.end))
    }
}
