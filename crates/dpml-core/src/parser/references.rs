/*
 * parser/references.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Inline `@reference` extraction from text runs.
 */

//! Reference extraction.
//!
//! Grammar: `@` then an optional `scheme:` or `scheme//`, then a path of
//! `[A-Za-z0-9_.\-/?=&]+`, then an optional `#fragment`. The `@` must be at
//! the start of the text or follow whitespace, and the match must be
//! followed by whitespace, the end of the text, or one of `,.;:!?)`.
//! Trailing `.` and `?` are treated as punctuation, not path.
//!
//! ```
//! use dpml_core::parser::references::{Segment, scan};
//!
//! let segments = scan("ask @persona, not a@b.com");
//! assert_eq!(segments.len(), 3);
//! assert!(matches!(&segments[1], Segment::Reference { protocol, path, .. }
//!     if protocol == "id" && path == "persona"));
//! ```

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::{Content, Node, Reference};

static REFERENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^@(?:(?P<scheme>[A-Za-z][A-Za-z0-9+\-]*)(?::|//))?(?P<path>[A-Za-z0-9_.\-/?=&]+)(?:#(?P<fragment>[A-Za-z0-9_.\-]+))?",
    )
    .expect("reference pattern is valid")
});

/// Protocol assumed when a reference has no scheme.
pub const DEFAULT_PROTOCOL: &str = "id";

/// A piece of a text run. Spans are byte ranges into the scanned text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(Range<usize>),
    Reference {
        protocol: String,
        path: String,
        span: Range<usize>,
    },
}

impl Segment {
    pub fn span(&self) -> Range<usize> {
        match self {
            Segment::Text(span) => span.clone(),
            Segment::Reference { span, .. } => span.clone(),
        }
    }
}

fn is_boundary(c: char) -> bool {
    c.is_whitespace() || matches!(c, ',' | '.' | ';' | ':' | '!' | '?' | ')')
}

/// Try to read a reference starting at byte `at` (which holds `@`).
fn match_at(text: &str, at: usize) -> Option<(String, String, usize)> {
    let rest = &text[at..];
    let mut len = REFERENCE_RE.find(rest)?.end();
    while len > 1 && rest[..len].ends_with(['.', '?']) {
        len -= 1;
    }

    // Re-match on the trimmed slice so captures reflect what is kept.
    let caps = REFERENCE_RE.captures(&rest[..len])?;
    let whole = caps.get(0)?;
    if whole.end() != len {
        return None;
    }
    if let Some(next) = rest[len..].chars().next()
        && !is_boundary(next)
    {
        return None;
    }

    let path = caps.name("path")?.as_str();
    if path.is_empty() {
        return None;
    }
    let protocol = caps
        .name("scheme")
        .map_or(DEFAULT_PROTOCOL.to_string(), |m| m.as_str().to_ascii_lowercase());
    let path = match caps.name("fragment") {
        Some(fragment) => format!("{}#{}", path, fragment.as_str()),
        None => path.to_string(),
    };
    Some((protocol, path, at + len))
}

/// Split `text` into alternating text and reference segments.
///
/// Text with no references yields a single [`Segment::Text`] covering it;
/// empty text yields nothing.
pub fn scan(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut text_start = 0;
    let mut prev: Option<char> = None;

    for (idx, c) in text.char_indices() {
        let preceded_ok = prev.is_none_or(char::is_whitespace);
        prev = Some(c);
        if c != '@' || !preceded_ok || idx < text_start {
            continue;
        }
        let Some((protocol, path, end)) = match_at(text, idx) else {
            continue;
        };
        if idx > text_start {
            segments.push(Segment::Text(text_start..idx));
        }
        segments.push(Segment::Reference {
            protocol,
            path,
            span: idx..end,
        });
        text_start = end;
    }

    if text_start < text.len() {
        segments.push(Segment::Text(text_start..text.len()));
    }
    segments
}

/// Whether `text` holds at least one reference.
pub fn contains_reference(text: &str) -> bool {
    scan(text)
        .iter()
        .any(|s| matches!(s, Segment::Reference { .. }))
}

/// Split `text` into nodes without source positions.
pub fn extract(text: &str) -> Vec<Node> {
    scan(text)
        .into_iter()
        .map(|segment| match segment {
            Segment::Text(span) => Node::Content(Content::new(&text[span], Default::default())),
            Segment::Reference { protocol, path, .. } => {
                Node::Reference(Reference::new(protocol, path))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn references(text: &str) -> Vec<(String, String)> {
        scan(text)
            .into_iter()
            .filter_map(|s| match s {
                Segment::Reference { protocol, path, .. } => Some((protocol, path)),
                Segment::Text(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_mixed_forms_and_email() {
        let text = "see @doc and @http://x.com/y and contact a@b.com";
        assert_eq!(
            references(text),
            vec![
                ("id".to_string(), "doc".to_string()),
                ("http".to_string(), "//x.com/y".to_string()),
            ]
        );
    }

    #[test]
    fn test_segments_cover_text_exactly() {
        let text = "You are @persona helpful";
        let segments = scan(text);
        assert_eq!(
            segments,
            vec![
                Segment::Text(0..8),
                Segment::Reference {
                    protocol: "id".into(),
                    path: "persona".into(),
                    span: 8..16,
                },
                Segment::Text(16..24),
            ]
        );
        let rebuilt: String = segments.iter().map(|s| &text[s.span()]).collect();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_trailing_punctuation_is_not_path() {
        assert_eq!(references("ask @persona."), vec![("id".into(), "persona".into())]);
        assert_eq!(references("who is @persona?"), vec![("id".into(), "persona".into())]);
        assert_eq!(references("(use @tools)"), vec![("id".into(), "tools".into())]);
        assert!(references("(@tools)").is_empty());
        assert_eq!(references("@a: b"), vec![("id".into(), "a".into())]);
    }

    #[test]
    fn test_scheme_forms_and_fragments() {
        assert_eq!(
            references("@file:./base.dpml#assistant"),
            vec![("file".into(), "./base.dpml#assistant".into())]
        );
        assert_eq!(references("@https//cdn/x.json"), vec![("https".into(), "cdn/x.json".into())]);
        assert_eq!(references("@HTTP:x"), vec![("http".into(), "x".into())]);
    }

    #[test]
    fn test_rejected_boundaries() {
        assert!(references("a@b").is_empty());
        assert!(references("@ alone").is_empty());
        assert!(references("@bad*char").is_empty());
        assert!(references("x=@y").is_empty());
        assert_eq!(references("line\n@next"), vec![("id".into(), "next".into())]);
    }

    #[test]
    fn test_plain_text_is_single_segment() {
        assert_eq!(scan("nothing here"), vec![Segment::Text(0..12)]);
        assert!(scan("").is_empty());
        assert!(!contains_reference("mail me at a@b.com"));
    }

    #[test]
    fn test_extract_nodes() {
        let nodes = extract("@a and @b");
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0].as_reference().unwrap().path, "a");
        assert_eq!(nodes[1].as_content().unwrap().value, " and ");
        assert_eq!(nodes[2].as_reference().unwrap().path, "b");
    }
}
