/*
 * parser/mod.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * DPML parser facade.
 */

//! Parsing DPML text into a [`Document`].
//!
//! [`DpmlParser::parse`] never fails: malformed input produces a
//! [`ParseResult`] with an empty document and the problem in `errors`.
//!
//! ```
//! use dpml_core::parser::DpmlParser;
//!
//! let result = DpmlParser::default().parse("<agent><prompt>Hi @persona</prompt></agent>");
//! assert!(result.is_ok());
//! assert_eq!(result.ast.references().len(), 1);
//!
//! let broken = DpmlParser::default().parse("<agent><prompt></agent>");
//! assert!(!broken.is_ok());
//! assert!(broken.ast.children.is_empty());
//! ```

pub mod converter;
pub mod references;

pub use converter::NodeConverter;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use dpml_error_reporting::{DiagnosticKind, DiagnosticMessage};
use dpml_source_map::{FileId, LineIndex, SourceContext};
use dpml_xml::{XmlParseContext, XmlParseOptions};

use crate::ast::{Document, DocumentMetadata, NodePool};
use crate::config::ParserOptions;
use crate::error::{DpmlError, Issue, Result};
use crate::registry::{TagRegistry, Validator};

/// Output of a parse.
#[derive(Debug, Clone)]
pub struct ParseResult {
    pub ast: Document,
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
    /// Holds the source text for rendering diagnostics.
    pub source_context: SourceContext,
    pub file_id: FileId,
}

impl ParseResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Errors then warnings as located diagnostics.
    pub fn diagnostics(&self) -> Vec<DiagnosticMessage> {
        let errors = self
            .errors
            .iter()
            .map(|issue| issue.to_diagnostic(DiagnosticKind::Error, self.file_id));
        let warnings = self
            .warnings
            .iter()
            .map(|issue| issue.to_diagnostic(DiagnosticKind::Warning, self.file_id));
        errors.chain(warnings).collect()
    }

    /// Render every diagnostic with source snippets.
    pub fn render_diagnostics(&self) -> String {
        self.diagnostics()
            .iter()
            .map(|d| d.to_text(Some(&self.source_context)))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The document, or the first error.
    pub fn into_result(self) -> Result<Document> {
        match self.errors.into_iter().next() {
            Some(issue) => Err(DpmlError::Parse(issue)),
            None => Ok(self.ast),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DpmlParser {
    options: ParserOptions,
    registry: Option<Arc<TagRegistry>>,
}

impl DpmlParser {
    pub fn new(options: ParserOptions) -> Self {
        Self {
            options,
            registry: None,
        }
    }

    /// Registry used when `validate_on_parse` is set.
    pub fn with_registry(mut self, registry: Arc<TagRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    pub fn parse(&self, text: &str) -> ParseResult {
        self.parse_inner(text, None, None)
    }

    /// Parse drawing nodes from `pool`.
    pub fn parse_with_pool(&self, text: &str, pool: &mut NodePool) -> ParseResult {
        self.parse_inner(text, Some(pool), None)
    }

    /// Read and parse a file. Only I/O failures are returned as errors.
    pub async fn parse_file(&self, path: impl AsRef<Path>) -> Result<ParseResult> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(self.parse_inner(&text, None, Some(path.to_path_buf())))
    }

    fn parse_inner(
        &self,
        text: &str,
        pool: Option<&mut NodePool>,
        source_path: Option<PathBuf>,
    ) -> ParseResult {
        let file_name = self
            .options
            .file_name
            .clone()
            .or_else(|| source_path.as_ref().map(|p| p.display().to_string()))
            .unwrap_or_else(|| "<input>".to_string());
        let mut source_context = SourceContext::new();
        let file_id = source_context.add_file(file_name, Some(text.to_string()));

        let xml_options = XmlParseOptions {
            track_positions: self.options.track_positions,
            preserve_whitespace: self.options.preserve_whitespace,
            file_id,
        };
        let mut xml_ctx = XmlParseContext::new();
        let metadata = DocumentMetadata {
            mode: self.options.mode,
            version: None,
            source_path,
        };

        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let ast = match dpml_xml::parse_with_context(text, &xml_options, &mut xml_ctx) {
            Ok(xml) => {
                let index = LineIndex::new(text);
                let mut converter = NodeConverter::new(&index, self.options.track_positions);
                if let Some(pool) = pool {
                    converter = converter.with_pool(pool);
                }
                converter.convert(xml, metadata)
            }
            Err(err) => {
                tracing::debug!(code = err.code(), "Markup rejected: {}", err);
                errors.push(Issue::from_diagnostic(&err.to_diagnostic()));
                Document {
                    metadata,
                    ..Default::default()
                }
            }
        };

        for diagnostic in xml_ctx.take_diagnostics() {
            let issue = Issue::from_diagnostic(&diagnostic);
            if diagnostic.is_error() {
                errors.push(issue);
            } else {
                warnings.push(issue);
            }
        }

        if self.options.validate_on_parse
            && errors.is_empty()
            && let Some(registry) = &self.registry
        {
            let result = Validator::new(registry.clone()).validate_document(&ast);
            errors.extend(result.errors);
            warnings.extend(result.warnings);
        }

        tracing::debug!(
            elements = ast.all_elements().len(),
            errors = errors.len(),
            warnings = warnings.len(),
            "Parsed document"
        );

        ParseResult {
            ast,
            errors,
            warnings,
            source_context,
            file_id,
        }
    }
}
