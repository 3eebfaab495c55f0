//! Shallow tag-balance scan run before the real parse.
//!
//! The scan only looks at start and end tags. Comments, CDATA sections,
//! processing instructions, declarations and self-closing tags are skipped.
//! A `<` that cannot start a tag is treated as text.

use crate::error::{Result, XmlError};
use dpml_source_map::{FileId, LineIndex, SourceInfo};

struct OpenTag<'a> {
    name: &'a str,
    name_start: usize,
}

/// Check that every start tag has a matching end tag.
pub fn check_balance(source: &str, index: &LineIndex, file_id: FileId) -> Result<()> {
    let bytes = source.as_bytes();
    let at = |start: usize, end: usize| Some(SourceInfo::new(file_id, index.range(start, end)));
    let mut stack: Vec<OpenTag<'_>> = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'<' {
            i += 1;
            continue;
        }
        let rest = &source[i..];

        if rest.starts_with("<!--") {
            i = skip_past(source, i + 4, "-->").ok_or_else(|| XmlError::Syntax {
                message: "Comment is never closed".to_string(),
                location: at(i, i + 4),
            })?;
        } else if rest.starts_with("<![CDATA[") {
            i = skip_past(source, i + 9, "]]>").ok_or_else(|| XmlError::Syntax {
                message: "CDATA section is never closed".to_string(),
                location: at(i, i + 9),
            })?;
        } else if rest.starts_with("<?") {
            i = skip_past(source, i + 2, "?>").ok_or_else(|| XmlError::Syntax {
                message: "Processing instruction is never closed".to_string(),
                location: at(i, i + 2),
            })?;
        } else if rest.starts_with("<!") {
            i = skip_past(source, i + 2, ">").ok_or_else(|| XmlError::Syntax {
                message: "Declaration is never closed".to_string(),
                location: at(i, i + 2),
            })?;
        } else if rest.starts_with("</") {
            let name_start = i + 2;
            let name_end = scan_name(bytes, name_start);
            let name = &source[name_start..name_end];
            let close = find_tag_end(bytes, name_end).ok_or_else(|| XmlError::Syntax {
                message: format!("End tag </{}> is never terminated", name),
                location: at(i, name_end),
            })?;

            match stack.pop() {
                None => {
                    return Err(XmlError::InvalidStructure {
                        message: format!("Unexpected closing tag </{}>", name),
                        location: at(i, close),
                    });
                }
                Some(open) if open.name != name => {
                    return Err(XmlError::MismatchedEndTag {
                        expected: open.name.to_string(),
                        found: name.to_string(),
                        location: at(i, close),
                    });
                }
                Some(_) => {}
            }
            i = close;
        } else if bytes.get(i + 1).is_some_and(|&b| is_name_start(b)) {
            let name_start = i + 1;
            let name_end = scan_name(bytes, name_start);
            let close = find_tag_end(bytes, name_end).ok_or_else(|| XmlError::Syntax {
                message: format!("Start tag <{}> is never terminated", &source[name_start..name_end]),
                location: at(i, name_end),
            })?;

            // `close` is one past the `>`
            if bytes[close - 2] != b'/' {
                stack.push(OpenTag {
                    name: &source[name_start..name_end],
                    name_start,
                });
            }
            i = close;
        } else {
            i += 1;
        }
    }

    match stack.pop() {
        Some(open) => Err(XmlError::UnclosedTag {
            name: open.name.to_string(),
            location: at(open.name_start, open.name_start + open.name.len()),
        }),
        None => Ok(()),
    }
}

fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b':' || b >= 0x80
}

fn is_name_char(b: u8) -> bool {
    is_name_start(b) || b.is_ascii_digit() || b == b'-' || b == b'.'
}

fn scan_name(bytes: &[u8], start: usize) -> usize {
    let mut end = start;
    while end < bytes.len() && is_name_char(bytes[end]) {
        end += 1;
    }
    end
}

/// Offset one past the `>` closing a tag, honoring quoted attribute values.
fn find_tag_end(bytes: &[u8], from: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (idx, &b) in bytes.iter().enumerate().skip(from) {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'>' => return Some(idx + 1),
            None => {}
        }
    }
    None
}

fn skip_past(source: &str, from: usize, terminator: &str) -> Option<usize> {
    source
        .get(from..)?
        .find(terminator)
        .map(|pos| from + pos + terminator.len())
}
