//! Diagnostic collection during parsing.

use dpml_error_reporting::{DiagnosticKind, DiagnosticMessage};

/// Collects non-fatal diagnostics raised while parsing.
///
/// Fatal problems are returned as [`crate::XmlError`]; everything the parser
/// recovers from (dropped stray text, undecodable entities) lands here, so a
/// successful parse can still carry warnings.
///
/// ```rust
/// use dpml_xml::{parse_with_context, XmlParseContext, XmlParseOptions};
///
/// let mut ctx = XmlParseContext::new();
/// let doc = parse_with_context("stray <agent/>", &XmlParseOptions::default(), &mut ctx).unwrap();
/// assert_eq!(doc.children.len(), 1);
/// assert!(ctx.has_diagnostics());
/// assert!(!ctx.has_errors());
/// ```
#[derive(Debug, Default)]
pub struct XmlParseContext {
    diagnostics: Vec<DiagnosticMessage>,
}

impl XmlParseContext {
    pub fn new() -> Self {
        Self {
            diagnostics: Vec::new(),
        }
    }

    pub fn add_diagnostic(&mut self, diagnostic: DiagnosticMessage) {
        self.diagnostics.push(diagnostic);
    }

    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn diagnostics(&self) -> &[DiagnosticMessage] {
        &self.diagnostics
    }

    /// Take all collected diagnostics, leaving the context empty.
    pub fn take_diagnostics(&mut self) -> Vec<DiagnosticMessage> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Check if any errors (not warnings) have been collected.
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::Error)
    }
}
