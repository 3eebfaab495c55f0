//! Error types for markup parsing.

use dpml_error_reporting::{DiagnosticMessage, DiagnosticMessageBuilder};
use dpml_source_map::SourceInfo;
use thiserror::Error;

/// Result type alias for dpml-xml operations.
pub type Result<T> = std::result::Result<T, XmlError>;

/// Fatal parse failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum XmlError {
    /// The tokenizer rejected the input.
    #[error("Syntax error: {message}")]
    Syntax {
        message: String,
        location: Option<SourceInfo>,
    },

    /// A start tag is still open at the end of input.
    #[error("Unclosed tag <{name}>")]
    UnclosedTag {
        name: String,
        location: Option<SourceInfo>,
    },

    /// An end tag does not match the innermost open start tag.
    #[error("Mismatched end tag: expected </{expected}>, found </{found}>")]
    MismatchedEndTag {
        expected: String,
        found: String,
        location: Option<SourceInfo>,
    },

    /// Well-tokenized but structurally invalid markup.
    #[error("Invalid markup: {message}")]
    InvalidStructure {
        message: String,
        location: Option<SourceInfo>,
    },
}

impl XmlError {
    /// The DPML error code for this failure.
    pub fn code(&self) -> &'static str {
        match self {
            XmlError::Syntax { .. } => "SYNTAX",
            XmlError::UnclosedTag { .. } | XmlError::MismatchedEndTag { .. } => "UNCLOSED_TAG",
            XmlError::InvalidStructure { .. } => "INVALID_XML",
        }
    }

    pub fn location(&self) -> Option<&SourceInfo> {
        match self {
            XmlError::Syntax { location, .. }
            | XmlError::UnclosedTag { location, .. }
            | XmlError::MismatchedEndTag { location, .. }
            | XmlError::InvalidStructure { location, .. } => location.as_ref(),
        }
    }

    pub fn to_diagnostic(&self) -> DiagnosticMessage {
        let builder = match self {
            XmlError::Syntax { message, .. } => DiagnosticMessageBuilder::error("Syntax Error")
                .problem(message.clone()),

            XmlError::UnclosedTag { name, .. } => DiagnosticMessageBuilder::error("Unclosed Tag")
                .problem(format!("Tag `<{}>` is opened but never closed", name))
                .add_hint(format!("Add a matching `</{}>`?", name)),

            XmlError::MismatchedEndTag {
                expected, found, ..
            } => DiagnosticMessageBuilder::error("Mismatched End Tag")
                .problem(format!(
                    "End tag `</{}>` does not match start tag `<{}>`",
                    found, expected
                ))
                .add_detail(format!("Expected: `</{}>`", expected))
                .add_detail(format!("Found: `</{}>`", found))
                .add_hint("Check that every opening tag has a matching closing tag?"),

            XmlError::InvalidStructure { message, .. } => {
                DiagnosticMessageBuilder::error("Invalid Markup").problem(message.clone())
            }
        };

        let mut builder = builder.with_code(self.code());
        if let Some(location) = self.location() {
            builder = builder.with_location(*location);
        }
        builder.build()
    }
}
