//! Generic markup tree produced by the parser.

use dpml_source_map::Range;

/// A parsed document: the ordered top-level elements.
///
/// DPML is permissive, so a document may hold zero, one or several
/// top-level elements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlDocument {
    pub children: Vec<XmlElement>,

    /// Span of the whole input (zero span when positions are not tracked).
    pub range: Range,
}

/// An element with its attributes and children in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    /// The local name of the element (without namespace prefix).
    pub name: String,

    /// Namespace prefix, if any (e.g. "x" in `<x:note>`).
    pub prefix: Option<String>,

    /// Attributes in source order.
    pub attributes: Vec<XmlAttribute>,

    pub children: Vec<XmlChild>,

    /// Span from the `<` of the start tag to the `>` of the end tag.
    pub range: Range,

    /// Span of the element name inside the start tag.
    pub name_range: Range,

    /// Whether the element was written as `<tag/>`.
    pub self_closing: bool,
}

/// An attribute with separate spans for its name and value.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlAttribute {
    /// The local name of the attribute (without namespace prefix).
    pub name: String,

    pub prefix: Option<String>,

    /// The attribute value after entity decoding.
    pub value: String,

    pub name_range: Range,

    /// Span of the value including its quotes.
    pub value_range: Range,
}

/// A child of an element.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlChild {
    Element(XmlElement),
    Text(XmlText),
}

/// A run of character data (plain text or CDATA).
#[derive(Debug, Clone, PartialEq)]
pub struct XmlText {
    /// The decoded text.
    pub content: String,

    /// Span of the raw text in the source.
    pub range: Range,

    /// Byte offset in the source where the decoded content begins.
    ///
    /// Equal to `range.start.offset` for plain text; for CDATA it skips the
    /// `<![CDATA[` opener.
    pub content_offset: usize,

    /// Entity and character references that were decoded, in order.
    ///
    /// Empty for CDATA and for text kept raw after a decoding failure.
    pub entities: Vec<TextEntity>,
}

/// One decoded `&...;` reference inside an [`XmlText`].
#[derive(Debug, Clone, PartialEq)]
pub struct TextEntity {
    /// Byte range of the replacement within the decoded content.
    pub decoded: std::ops::Range<usize>,

    /// Byte range of the reference in the raw text, relative to
    /// `content_offset`.
    pub raw: std::ops::Range<usize>,
}

impl XmlText {
    /// Source byte offset of a byte offset into the decoded content.
    ///
    /// An offset that falls inside a decoded reference maps to the end of
    /// that reference.
    pub fn source_offset(&self, decoded: usize) -> usize {
        let mut raw_base = 0;
        let mut decoded_base = 0;
        for entity in &self.entities {
            if decoded < entity.decoded.start {
                break;
            }
            if decoded < entity.decoded.end {
                let raw = if decoded == entity.decoded.start {
                    entity.raw.start
                } else {
                    entity.raw.end
                };
                return self.content_offset + raw;
            }
            raw_base = entity.raw.end;
            decoded_base = entity.decoded.end;
        }
        self.content_offset + raw_base + (decoded - decoded_base)
    }
}

impl XmlElement {
    /// The element name including its prefix, e.g. `x:note`.
    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.name),
            None => self.name.clone(),
        }
    }

    /// Get the value of an attribute by its qualified name.
    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.qualified_name() == name)
            .map(|a| a.value.as_str())
    }

    /// Child elements, skipping text.
    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|child| match child {
            XmlChild::Element(element) => Some(element),
            XmlChild::Text(_) => None,
        })
    }

    /// Concatenated text of the direct text children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|child| match child {
                XmlChild::Text(text) => Some(text.content.as_str()),
                XmlChild::Element(_) => None,
            })
            .collect()
    }
}

// Children are released from an explicit stack so deep trees never
// recurse in drop glue.
impl Drop for XmlElement {
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.children);
        while let Some(child) = stack.pop() {
            if let XmlChild::Element(mut element) = child {
                stack.append(&mut element.children);
            }
        }
    }
}

impl XmlAttribute {
    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.name),
            None => self.name.clone(),
        }
    }
}

/// Split a raw name into `(local, prefix)`.
pub(crate) fn split_name(full_name: &str) -> (String, Option<String>) {
    match full_name.split_once(':') {
        Some((prefix, local)) if !prefix.is_empty() && !local.is_empty() => {
            (local.to_string(), Some(prefix.to_string()))
        }
        _ => (full_name.to_string(), None),
    }
}
