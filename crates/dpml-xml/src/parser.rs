//! Markup parser that builds [`XmlDocument`] trees.

use crate::balance::check_balance;
use crate::types::split_name;
use crate::{
    Result, TextEntity, XmlAttribute, XmlChild, XmlDocument, XmlElement, XmlError, XmlParseContext,
    XmlText,
};
use dpml_error_reporting::DiagnosticMessageBuilder;
use dpml_source_map::{FileId, LineIndex, Range, SourceInfo};
use quick_xml::Reader;
use quick_xml::escape::{EscapeError, unescape};
use quick_xml::events::{BytesCData, BytesEnd, BytesStart, BytesText, Event};

/// Length of `<![CDATA[`.
const CDATA_OPEN: usize = 9;
/// Length of `]]>`.
const CDATA_CLOSE: usize = 3;

/// Options controlling the generic parse.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlParseOptions {
    /// Compute spans for every node; when off every span is [`Range::zero`].
    pub track_positions: bool,
    /// Keep whitespace-only text runs inside elements.
    pub preserve_whitespace: bool,
    /// File the source belongs to, used in diagnostic locations.
    pub file_id: FileId,
}

impl Default for XmlParseOptions {
    fn default() -> Self {
        Self {
            track_positions: true,
            preserve_whitespace: false,
            file_id: FileId(0),
        }
    }
}

/// Parse markup with default options, discarding recoverable diagnostics.
///
/// ```rust
/// use dpml_xml::parse;
///
/// let doc = parse(r#"<agent id="a"><prompt>Hi</prompt></agent>"#).unwrap();
/// assert_eq!(doc.children.len(), 1);
/// assert_eq!(doc.children[0].name, "agent");
/// assert_eq!(doc.children[0].get_attribute("id"), Some("a"));
/// ```
pub fn parse(content: &str) -> Result<XmlDocument> {
    let mut ctx = XmlParseContext::new();
    parse_with_context(content, &XmlParseOptions::default(), &mut ctx)
}

/// Parse markup, collecting recoverable diagnostics in `ctx`.
///
/// Tag balance is checked first; an unbalanced document fails before any
/// tree is built.
pub fn parse_with_context(
    content: &str,
    options: &XmlParseOptions,
    ctx: &mut XmlParseContext,
) -> Result<XmlDocument> {
    let index = LineIndex::new(content);
    check_balance(content, &index, options.file_id)?;

    let mut parser = XmlParser::new(content, options, index, ctx);
    parser.parse()
}

struct XmlParser<'a> {
    source: &'a str,
    reader: Reader<&'a [u8]>,
    options: &'a XmlParseOptions,
    index: LineIndex,
    ctx: &'a mut XmlParseContext,
    stack: Vec<BuildNode>,
    roots: Vec<XmlElement>,
}

/// An element whose end tag has not been read yet.
struct BuildNode {
    full_name: String,
    name: String,
    prefix: Option<String>,
    name_range: Range,
    attributes: Vec<XmlAttribute>,
    start_offset: usize,
    children: Vec<XmlChild>,
}

impl<'a> XmlParser<'a> {
    fn new(
        source: &'a str,
        options: &'a XmlParseOptions,
        index: LineIndex,
        ctx: &'a mut XmlParseContext,
    ) -> Self {
        let mut reader = Reader::from_str(source);
        reader.config_mut().trim_text_start = false;
        reader.config_mut().trim_text_end = false;

        Self {
            source,
            reader,
            options,
            index,
            ctx,
            stack: Vec::new(),
            roots: Vec::new(),
        }
    }

    fn parse(&mut self) -> Result<XmlDocument> {
        loop {
            let event_start = self.reader.buffer_position() as usize;

            match self.reader.read_event() {
                Ok(Event::Start(e)) => self.handle_start(&e, self.markup_start(event_start))?,
                Ok(Event::End(e)) => {
                    let element = self.handle_end(&e)?;
                    self.attach(element);
                }
                Ok(Event::Empty(e)) => {
                    let element = self.handle_empty(&e, self.markup_start(event_start))?;
                    self.attach(element);
                }
                Ok(Event::Text(e)) => self.handle_text(&e, event_start),
                Ok(Event::CData(e)) => self.handle_cdata(&e, self.markup_start(event_start)),
                Ok(Event::Comment(_) | Event::PI(_) | Event::Decl(_) | Event::DocType(_)) => {}
                Ok(Event::Eof) => break,
                Err(e) => {
                    let position = self.reader.error_position() as usize;
                    return Err(XmlError::Syntax {
                        message: e.to_string(),
                        location: Some(self.locate(position, position)),
                    });
                }
            }
        }

        if let Some(node) = self.stack.pop() {
            return Err(XmlError::UnclosedTag {
                name: node.full_name,
                location: Some(self.locate(node.start_offset, node.start_offset + 1)),
            });
        }

        Ok(XmlDocument {
            children: std::mem::take(&mut self.roots),
            range: self.make_range(0, self.source.len()),
        })
    }

    fn attach(&mut self, element: XmlElement) {
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(XmlChild::Element(element)),
            None => self.roots.push(element),
        }
    }

    fn handle_start(&mut self, e: &BytesStart<'_>, event_start: usize) -> Result<()> {
        let full_name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let (name, prefix) = split_name(&full_name);
        let name_start = event_start + 1;
        let name_range = self.make_range(name_start, name_start + e.name().as_ref().len());
        let attributes = self.parse_attributes(e, event_start)?;

        self.stack.push(BuildNode {
            full_name,
            name,
            prefix,
            name_range,
            attributes,
            start_offset: event_start,
            children: Vec::new(),
        });
        Ok(())
    }

    fn handle_end(&mut self, e: &BytesEnd<'_>) -> Result<XmlElement> {
        let end_name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let end_offset = self.reader.buffer_position() as usize;

        let Some(node) = self.stack.pop() else {
            return Err(XmlError::InvalidStructure {
                message: format!("Unexpected closing tag </{}>", end_name),
                location: Some(self.locate(end_offset.saturating_sub(end_name.len() + 3), end_offset)),
            });
        };

        if node.full_name != end_name {
            return Err(XmlError::MismatchedEndTag {
                expected: node.full_name,
                found: end_name,
                location: Some(self.locate(node.start_offset, end_offset)),
            });
        }

        Ok(XmlElement {
            name: node.name,
            prefix: node.prefix,
            attributes: node.attributes,
            children: node.children,
            range: self.make_range(node.start_offset, end_offset),
            name_range: node.name_range,
            self_closing: false,
        })
    }

    fn handle_empty(&mut self, e: &BytesStart<'_>, event_start: usize) -> Result<XmlElement> {
        let full_name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let (name, prefix) = split_name(&full_name);
        let name_start = event_start + 1;
        let name_range = self.make_range(name_start, name_start + e.name().as_ref().len());
        let attributes = self.parse_attributes(e, event_start)?;
        let end_offset = self.reader.buffer_position() as usize;

        Ok(XmlElement {
            name,
            prefix,
            attributes,
            children: Vec::new(),
            range: self.make_range(event_start, end_offset),
            name_range,
            self_closing: true,
        })
    }

    fn handle_text(&mut self, e: &BytesText<'_>, event_start: usize) {
        let raw_len = e.len();
        let raw = String::from_utf8_lossy(e);
        let (content, entities) = match unescape_tracked(&raw) {
            Ok(decoded) => decoded,
            Err(err) => {
                let location = self.locate(event_start, event_start + raw_len);
                self.ctx.add_diagnostic(
                    DiagnosticMessageBuilder::warning("Undecodable Entity")
                        .with_code("INVALID_XML")
                        .problem(format!("Text could not be decoded: {}", err))
                        .add_info("The raw text is kept as written")
                        .with_location(location)
                        .build(),
                );
                (raw.into_owned(), Vec::new())
            }
        };

        let is_blank = content.trim().is_empty();
        if self.stack.is_empty() {
            if !is_blank {
                self.warn_outside_text(event_start, event_start + raw_len);
            }
            return;
        }
        if is_blank && !self.options.preserve_whitespace {
            return;
        }

        let text = XmlText {
            content,
            range: self.make_range(event_start, event_start + raw_len),
            content_offset: event_start,
            entities,
        };
        if let Some(node) = self.stack.last_mut() {
            node.children.push(XmlChild::Text(text));
        }
    }

    fn handle_cdata(&mut self, e: &BytesCData<'_>, event_start: usize) {
        let raw_len = e.len();
        let end = event_start + CDATA_OPEN + raw_len + CDATA_CLOSE;

        if self.stack.is_empty() {
            self.warn_outside_text(event_start, end);
            return;
        }

        let text = XmlText {
            content: String::from_utf8_lossy(e).into_owned(),
            range: self.make_range(event_start, end),
            content_offset: event_start + CDATA_OPEN,
            entities: Vec::new(),
        };
        if let Some(node) = self.stack.last_mut() {
            node.children.push(XmlChild::Text(text));
        }
    }

    fn warn_outside_text(&mut self, start: usize, end: usize) {
        let location = self.locate(start, end);
        self.ctx.add_diagnostic(
            DiagnosticMessageBuilder::warning("Text Outside Element")
                .with_code("INVALID_XML")
                .problem("Text outside of any element is ignored")
                .with_location(location)
                .build(),
        );
    }

    fn parse_attributes(&mut self, e: &BytesStart<'_>, tag_start: usize) -> Result<Vec<XmlAttribute>> {
        let content_start = tag_start + 1;
        let spans = attribute_spans(e, e.name().as_ref().len());
        let mut attributes = Vec::new();

        for (idx, attr_result) in e.html_attributes().enumerate() {
            let attr = attr_result.map_err(|err| XmlError::Syntax {
                message: format!("Attribute error: {}", err),
                location: Some(self.locate(tag_start, tag_start + 1)),
            })?;

            let full_name = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let (name, prefix) = split_name(&full_name);

            let ((name_start, name_end), (value_start, value_end)) = spans
                .get(idx)
                .copied()
                .unwrap_or(((0, 0), (0, 0)));
            let name_range = self.make_range(content_start + name_start, content_start + name_end);
            let value_range = self.make_range(content_start + value_start, content_start + value_end);

            let value = match attr.unescape_value() {
                Ok(value) => value.into_owned(),
                Err(err) => {
                    let location = self.locate(content_start + value_start, content_start + value_end);
                    self.ctx.add_diagnostic(
                        DiagnosticMessageBuilder::warning("Undecodable Entity")
                            .with_code("INVALID_XML")
                            .problem(format!("Attribute `{}` could not be decoded: {}", full_name, err))
                            .add_info("The raw value is kept as written")
                            .with_location(location)
                            .build(),
                    );
                    String::from_utf8_lossy(&attr.value).into_owned()
                }
            };

            attributes.push(XmlAttribute {
                name,
                prefix,
                value,
                name_range,
                value_range,
            });
        }

        Ok(attributes)
    }

    /// Offset of the `<` opening the markup event read at `position`.
    ///
    /// Depending on the preceding text event the reader may already have
    /// consumed the `<`.
    fn markup_start(&self, position: usize) -> usize {
        let bytes = self.source.as_bytes();
        if bytes.get(position) != Some(&b'<') && position > 0 && bytes.get(position - 1) == Some(&b'<') {
            position - 1
        } else {
            position
        }
    }

    fn make_range(&self, start: usize, end: usize) -> Range {
        if self.options.track_positions {
            self.index.range(start, end)
        } else {
            Range::zero()
        }
    }

    /// Diagnostic locations are always computed, even without position tracking.
    fn locate(&self, start: usize, end: usize) -> SourceInfo {
        SourceInfo::new(self.options.file_id, self.index.range(start, end))
    }
}

/// Decode entity and character references one at a time, recording where
/// each replacement sits in both the raw and the decoded text.
fn unescape_tracked(raw: &str) -> std::result::Result<(String, Vec<TextEntity>), EscapeError> {
    let mut content = String::with_capacity(raw.len());
    let mut entities = Vec::new();
    let mut copied = 0;

    while let Some(found) = raw[copied..].find('&') {
        let start = copied + found;
        // Without a `;` the rest of the run is passed on and `unescape`
        // reports it as unterminated.
        let end = raw[start..].find(';').map_or(raw.len(), |semi| start + semi + 1);
        content.push_str(&raw[copied..start]);

        let replacement = unescape(&raw[start..end])?;
        let decoded_start = content.len();
        content.push_str(&replacement);
        entities.push(TextEntity {
            decoded: decoded_start..content.len(),
            raw: start..end,
        });
        copied = end;
    }
    content.push_str(&raw[copied..]);
    Ok((content, entities))
}

/// Name and value spans of each attribute, relative to the tag content.
///
/// `raw` is the text between `<` and the closing `>` (or `/>`); the scan
/// starts after the element name. Values keep their quotes; a valueless
/// attribute gets an empty value span at the end of its name.
fn attribute_spans(raw: &[u8], name_len: usize) -> Vec<((usize, usize), (usize, usize))> {
    let is_ws = |b: u8| b.is_ascii_whitespace();
    let mut spans = Vec::new();
    let mut i = name_len;

    loop {
        while i < raw.len() && is_ws(raw[i]) {
            i += 1;
        }
        if i >= raw.len() || raw[i] == b'/' || raw[i] == b'>' {
            break;
        }

        let name_start = i;
        while i < raw.len() && !is_ws(raw[i]) && !matches!(raw[i], b'=' | b'/' | b'>') {
            i += 1;
        }
        let name_end = i;

        let mut j = i;
        while j < raw.len() && is_ws(raw[j]) {
            j += 1;
        }
        if j < raw.len() && raw[j] == b'=' {
            j += 1;
            while j < raw.len() && is_ws(raw[j]) {
                j += 1;
            }
            let value_start = j;
            match raw.get(j) {
                Some(&quote @ (b'"' | b'\'')) => {
                    j += 1;
                    while j < raw.len() && raw[j] != quote {
                        j += 1;
                    }
                    j = (j + 1).min(raw.len());
                }
                _ => {
                    while j < raw.len() && !is_ws(raw[j]) && raw[j] != b'>' {
                        j += 1;
                    }
                }
            }
            spans.push(((name_start, name_end), (value_start, j)));
            i = j;
        } else {
            spans.push(((name_start, name_end), (name_end, name_end)));
        }

        if i == name_start {
            // No progress on a stray `=`; stop instead of looping.
            break;
        }
    }

    spans
}
