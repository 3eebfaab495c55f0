/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Error codes, issues and error types for dpml-core.
 */

//! Error types for dpml-core.
//!
//! - [`ErrorCode`] is the stable taxonomy shared with the diagnostic catalog.
//! - [`Issue`] is the `{code, message, position?}` shape used for every
//!   error and warning that is *reported* rather than thrown.
//! - [`DpmlError`] is what fallible pipeline operations return.
//! - [`ReferenceError`] / [`ProtocolError`] describe resolution failures.

use std::fmt;
use std::path::PathBuf;

use dpml_error_reporting::{DiagnosticKind, DiagnosticMessage, DiagnosticMessageBuilder};
use dpml_source_map::{FileId, Range, SourceInfo};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Syntax,
    InvalidXml,
    UnclosedTag,
    InvalidAttribute,
    MissingRequiredAttribute,
    InvalidNesting,
    ReferenceNotFound,
    InvalidReference,
    CircularReference,
    DuplicateId,
    TransformError,
    ConfigError,
    UnknownError,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 13] = [
        ErrorCode::Syntax,
        ErrorCode::InvalidXml,
        ErrorCode::UnclosedTag,
        ErrorCode::InvalidAttribute,
        ErrorCode::MissingRequiredAttribute,
        ErrorCode::InvalidNesting,
        ErrorCode::ReferenceNotFound,
        ErrorCode::InvalidReference,
        ErrorCode::CircularReference,
        ErrorCode::DuplicateId,
        ErrorCode::TransformError,
        ErrorCode::ConfigError,
        ErrorCode::UnknownError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Syntax => "SYNTAX",
            ErrorCode::InvalidXml => "INVALID_XML",
            ErrorCode::UnclosedTag => "UNCLOSED_TAG",
            ErrorCode::InvalidAttribute => "INVALID_ATTRIBUTE",
            ErrorCode::MissingRequiredAttribute => "MISSING_REQUIRED_ATTRIBUTE",
            ErrorCode::InvalidNesting => "INVALID_NESTING",
            ErrorCode::ReferenceNotFound => "REFERENCE_NOT_FOUND",
            ErrorCode::InvalidReference => "INVALID_REFERENCE",
            ErrorCode::CircularReference => "CIRCULAR_REFERENCE",
            ErrorCode::DuplicateId => "DUPLICATE_ID",
            ErrorCode::TransformError => "TRANSFORM_ERROR",
            ErrorCode::ConfigError => "CONFIG_ERROR",
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// Look a code up by its string form.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == code)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reported error or warning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Range>,
}

impl Issue {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            position: None,
        }
    }

    /// Attach a source position.
    pub fn at(mut self, position: Range) -> Self {
        self.position = Some(position);
        self
    }

    /// Convert to a diagnostic located in `file_id`.
    pub fn to_diagnostic(&self, kind: DiagnosticKind, file_id: FileId) -> DiagnosticMessage {
        let title = dpml_error_reporting::get_error_info(self.code.as_str())
            .map_or_else(|| self.code.as_str().to_string(), |info| info.title.clone());
        let mut builder = DiagnosticMessageBuilder::new(kind, title)
            .with_code(self.code.as_str())
            .problem(self.message.clone());
        if let Some(position) = self.position {
            builder = builder.with_location(SourceInfo::new(file_id, position));
        }
        builder.build()
    }

    /// Build an issue from a diagnostic produced by a lower layer.
    pub fn from_diagnostic(diagnostic: &DiagnosticMessage) -> Self {
        let code = diagnostic
            .code
            .as_deref()
            .and_then(ErrorCode::from_code)
            .unwrap_or(ErrorCode::UnknownError);
        let message = diagnostic
            .problem
            .as_ref()
            .map_or_else(|| diagnostic.title.clone(), |p| p.as_str().to_string());
        Self {
            code,
            message,
            position: diagnostic.location.map(|l| l.range),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(position) = &self.position {
            write!(f, " ({}:{})", position.start.line, position.start.column)?;
        }
        Ok(())
    }
}

/// Failure inside a protocol handler.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("Permission denied reading {}", path.display())]
    PermissionDenied { path: PathBuf },

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP {status} returned by {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Request to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("Request to {url} was cancelled")]
    Cancelled { url: String },

    #[error("Network error fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("Invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Invalid JSON in {origin}: {message}")]
    InvalidJson { origin: String, message: String },

    #[error("No element with id '{id}'")]
    UnknownId { id: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A reference that could not be resolved.
#[derive(Debug, Error)]
#[error("[{code}] {message}")]
pub struct ReferenceError {
    pub code: ErrorCode,
    pub message: String,
    /// The `protocol:path` key of the reference.
    pub reference: String,
    pub position: Option<Range>,
    #[source]
    pub source: Option<ProtocolError>,
}

impl ReferenceError {
    pub fn new(code: ErrorCode, reference: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            reference: reference.into(),
            position: None,
            source: None,
        }
    }

    pub fn at(mut self, position: Range) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_source(mut self, source: ProtocolError) -> Self {
        self.source = Some(source);
        self
    }

    pub fn to_issue(&self) -> Issue {
        Issue {
            code: self.code,
            message: self.message.clone(),
            position: self.position,
        }
    }
}

/// Errors returned by fallible pipeline operations.
#[derive(Debug, Error)]
pub enum DpmlError {
    #[error("{0}")]
    Parse(Issue),

    #[error("{0}")]
    Validation(Issue),

    #[error(transparent)]
    Reference(#[from] ReferenceError),

    #[error("[TRANSFORM_ERROR] processor '{processor}' failed on <{tag_name}>: {message}")]
    Transform {
        processor: String,
        tag_name: String,
        message: String,
    },

    #[error("[CONFIG_ERROR] {0}")]
    Config(String),

    #[error(transparent)]
    Unknown(#[from] anyhow::Error),
}

impl DpmlError {
    pub fn code(&self) -> ErrorCode {
        match self {
            DpmlError::Parse(issue) | DpmlError::Validation(issue) => issue.code,
            DpmlError::Reference(err) => err.code,
            DpmlError::Transform { .. } => ErrorCode::TransformError,
            DpmlError::Config(_) => ErrorCode::ConfigError,
            DpmlError::Unknown(_) => ErrorCode::UnknownError,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        DpmlError::Config(message.into())
    }

    /// The error as a reportable issue.
    pub fn to_issue(&self) -> Issue {
        match self {
            DpmlError::Parse(issue) | DpmlError::Validation(issue) => issue.clone(),
            DpmlError::Reference(err) => err.to_issue(),
            DpmlError::Transform { .. } | DpmlError::Config(_) => {
                Issue::new(self.code(), self.to_string())
            }
            DpmlError::Unknown(err) => Issue::new(ErrorCode::UnknownError, format!("{:#}", err)),
        }
    }
}

pub type Result<T> = std::result::Result<T, DpmlError>;

#[cfg(test)]
mod tests {
    use super::*;
    use dpml_source_map::Location;

    #[test]
    fn test_codes_round_trip_through_strings() {
        for code in ErrorCode::ALL {
            assert_eq!(ErrorCode::from_code(code.as_str()), Some(code));
            assert!(
                dpml_error_reporting::get_error_info(code.as_str()).is_some(),
                "{code} missing from catalog"
            );
        }
        assert_eq!(ErrorCode::from_code("NOPE"), None);
    }

    #[test]
    fn test_code_serializes_as_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::MissingRequiredAttribute).unwrap();
        assert_eq!(json, "\"MISSING_REQUIRED_ATTRIBUTE\"");
    }

    #[test]
    fn test_issue_display() {
        let issue = Issue::new(ErrorCode::DuplicateId, "Duplicate id 'a'")
            .at(Range::new(Location::new(10, 2, 3), Location::new(14, 2, 7)));
        assert_eq!(issue.to_string(), "[DUPLICATE_ID] Duplicate id 'a' (2:3)");
    }

    #[test]
    fn test_issue_to_diagnostic() {
        let issue = Issue::new(ErrorCode::InvalidNesting, "Unknown tag <x>");
        let diagnostic = issue.to_diagnostic(DiagnosticKind::Warning, FileId(0));
        assert_eq!(diagnostic.code.as_deref(), Some("INVALID_NESTING"));
        assert_eq!(diagnostic.title, "Invalid Nesting");
        assert_eq!(diagnostic.kind, DiagnosticKind::Warning);
        assert!(diagnostic.location.is_none());

        let back = Issue::from_diagnostic(&diagnostic);
        assert_eq!(back, issue);
    }

    #[test]
    fn test_unknown_error_keeps_cause() {
        let err: DpmlError = anyhow::anyhow!("disk on fire").context("loading agent").into();
        assert_eq!(err.code(), ErrorCode::UnknownError);
        let issue = err.to_issue();
        assert!(issue.message.contains("loading agent"));
        assert!(issue.message.contains("disk on fire"));
    }

    #[test]
    fn test_reference_error_source() {
        let err = ReferenceError::new(ErrorCode::ReferenceNotFound, "id:persona", "not found")
            .with_source(ProtocolError::UnknownId {
                id: "persona".to_string(),
            });
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "No element with id 'persona'");

        let err: DpmlError = err.into();
        assert_eq!(err.code(), ErrorCode::ReferenceNotFound);
    }
}
