//! Core diagnostic message types.
//!
//! A [`DiagnosticMessage`] carries a title, an optional problem statement,
//! bulleted details and hints. Details and the message itself may point at
//! source spans.

use dpml_source_map::{SourceContext, SourceInfo};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// The kind of diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    /// An error that prevents completion
    Error,
    /// A problem that doesn't prevent completion
    Warning,
    /// Informational message
    Info,
    /// Additional context
    Note,
}

impl DiagnosticKind {
    pub fn label(&self) -> &'static str {
        match self {
            DiagnosticKind::Error => "Error",
            DiagnosticKind::Warning => "Warning",
            DiagnosticKind::Info => "Info",
            DiagnosticKind::Note => "Note",
        }
    }
}

/// How a detail bullet is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailKind {
    /// ✖ bullet
    Error,
    /// ℹ bullet
    Info,
    /// • bullet
    Note,
}

impl DetailKind {
    fn bullet(&self) -> &'static str {
        match self {
            DetailKind::Error => "✖",
            DetailKind::Info => "ℹ",
            DetailKind::Note => "•",
        }
    }
}

/// The content of a message or detail item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageContent {
    /// Plain text content
    Plain(String),
    /// Markdown content, with backticks marking code such as tag names
    Markdown(String),
}

impl MessageContent {
    /// Get the raw string content for display
    pub fn as_str(&self) -> &str {
        match self {
            MessageContent::Plain(s) | MessageContent::Markdown(s) => s,
        }
    }

    /// Convert to JSON value with type information
    pub fn to_json(&self) -> serde_json::Value {
        let kind = match self {
            MessageContent::Plain(_) => "plain",
            MessageContent::Markdown(_) => "markdown",
        };
        serde_json::json!({ "type": kind, "content": self.as_str() })
    }
}

impl From<String> for MessageContent {
    fn from(s: String) -> Self {
        MessageContent::Markdown(s)
    }
}

impl From<&str> for MessageContent {
    fn from(s: &str) -> Self {
        MessageContent::Markdown(s.to_string())
    }
}

/// A detail item in a diagnostic message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailItem {
    pub kind: DetailKind,
    pub content: MessageContent,
    /// Where in the source this detail applies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceInfo>,
}

/// A diagnostic message.
///
/// Prefer [`crate::DiagnosticMessageBuilder`] for construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticMessage {
    /// Stable error code (e.g. "INVALID_NESTING")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Brief title
    pub title: String,

    pub kind: DiagnosticKind,

    /// What went wrong
    pub problem: Option<MessageContent>,

    /// Specific details (where/why)
    pub details: Vec<DetailItem>,

    /// Suggestions for fixing
    pub hints: Vec<MessageContent>,

    /// Primary source location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceInfo>,
}

impl DiagnosticMessage {
    pub fn new(kind: DiagnosticKind, title: impl Into<String>) -> Self {
        Self {
            code: None,
            title: title.into(),
            kind,
            problem: None,
            details: Vec::new(),
            hints: Vec::new(),
            location: None,
        }
    }

    pub fn error(title: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Error, title)
    }

    pub fn warning(title: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Warning, title)
    }

    pub fn info(title: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Info, title)
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Subsystem of this message's code, from the catalog.
    pub fn subsystem(&self) -> Option<&'static str> {
        self.code
            .as_deref()
            .and_then(crate::catalog::get_subsystem)
    }

    pub fn is_error(&self) -> bool {
        self.kind == DiagnosticKind::Error
    }

    /// Render this message as text.
    ///
    /// Without a source snippet the layout is:
    /// ```text
    /// Error [CODE]: title
    /// Problem statement
    /// ✖ Error detail
    /// ℹ Info detail
    /// ? Hint
    /// ```
    /// When `ctx` holds the file of the message's location, an ariadne
    /// snippet replaces the header, problem and located details.
    ///
    /// ```
    /// use dpml_error_reporting::DiagnosticMessageBuilder;
    ///
    /// let msg = DiagnosticMessageBuilder::error("Invalid nesting")
    ///     .problem("`<llm>` can't contain `<agent>`")
    ///     .add_hint("Move `<agent>` to the top level?")
    ///     .build();
    /// let text = msg.to_text(None);
    /// assert!(text.starts_with("Error: Invalid nesting"));
    /// ```
    pub fn to_text(&self, ctx: Option<&SourceContext>) -> String {
        let snippet = ctx.and_then(|ctx| {
            let location = self
                .location
                .as_ref()
                .or_else(|| self.details.iter().find_map(|d| d.location.as_ref()))?;
            self.render_snippet(location, ctx)
        });

        let mut result = String::new();
        match snippet {
            Some(snippet) => {
                result.push_str(&snippet);
                for detail in self.details.iter().filter(|d| d.location.is_none()) {
                    let _ = writeln!(result, "{} {}", detail.kind.bullet(), detail.content.as_str());
                }
            }
            None => {
                match &self.code {
                    Some(code) => {
                        let _ = write!(result, "{} [{}]: {}", self.kind.label(), code, self.title);
                    }
                    None => {
                        let _ = write!(result, "{}: {}", self.kind.label(), self.title);
                    }
                }
                if let Some(problem) = &self.problem {
                    let _ = write!(result, "\n{}", problem.as_str());
                }
                for detail in &self.details {
                    let _ = write!(result, "\n{} {}", detail.kind.bullet(), detail.content.as_str());
                }
            }
        }

        for hint in &self.hints {
            if !result.is_empty() && !result.ends_with('\n') {
                result.push('\n');
            }
            let _ = write!(result, "? {}", hint.as_str());
        }

        result
    }

    /// Render this message as a JSON value.
    ///
    /// ```
    /// use dpml_error_reporting::DiagnosticMessage;
    ///
    /// let json = DiagnosticMessage::warning("Unknown attribute").to_json();
    /// assert_eq!(json["kind"], "warning");
    /// assert_eq!(json["title"], "Unknown attribute");
    /// ```
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;

        let mut obj = json!({
            "kind": self.kind,
            "title": self.title,
        });

        if let Some(code) = &self.code {
            obj["code"] = json!(code);
        }
        if let Some(problem) = &self.problem {
            obj["problem"] = problem.to_json();
        }
        if !self.details.is_empty() {
            let details: Vec<_> = self
                .details
                .iter()
                .map(|d| {
                    let mut detail = json!({
                        "kind": d.kind,
                        "content": d.content.to_json(),
                    });
                    if let Some(location) = &d.location {
                        detail["location"] = json!(location);
                    }
                    detail
                })
                .collect();
            obj["details"] = json!(details);
        }
        if !self.hints.is_empty() {
            let hints: Vec<_> = self.hints.iter().map(MessageContent::to_json).collect();
            obj["hints"] = json!(hints);
        }
        if let Some(location) = &self.location {
            obj["location"] = json!(location);
        }

        obj
    }

    fn render_snippet(&self, main: &SourceInfo, ctx: &SourceContext) -> Option<String> {
        use ariadne::{Color, Config, Label, Report, ReportKind, Source};

        let file = ctx.get_file(main.file_id)?;
        let content = ctx.content(main.file_id)?;

        // ariadne spans count characters
        let char_offset = |byte: usize| -> usize {
            content
                .get(..byte.min(content.len()))
                .map_or(byte, |prefix| prefix.chars().count())
        };
        let span = |info: &SourceInfo| {
            let start = char_offset(info.start_offset());
            let end = char_offset(info.end_offset()).max(start);
            start..end
        };

        let (report_kind, color) = match self.kind {
            DiagnosticKind::Error => (ReportKind::Error, Color::Red),
            DiagnosticKind::Warning => (ReportKind::Warning, Color::Yellow),
            DiagnosticKind::Info => (ReportKind::Advice, Color::Cyan),
            DiagnosticKind::Note => (ReportKind::Advice, Color::Blue),
        };

        let main_span = span(main);
        let title = match &self.code {
            Some(code) => format!("[{}] {}", code, self.title),
            None => self.title.clone(),
        };
        let label_message = self
            .problem
            .as_ref()
            .map_or(self.title.as_str(), MessageContent::as_str);

        let mut report = Report::build(report_kind, file.path.clone(), main_span.start)
            .with_config(Config::default().with_color(false))
            .with_message(title)
            .with_label(
                Label::new((file.path.clone(), main_span))
                    .with_message(label_message)
                    .with_color(color),
            );

        for detail in &self.details {
            let Some(location) = &detail.location else {
                continue;
            };
            if location.file_id != main.file_id {
                continue;
            }
            report = report.with_label(
                Label::new((file.path.clone(), span(location)))
                    .with_message(detail.content.as_str())
                    .with_color(match detail.kind {
                        DetailKind::Error => Color::Red,
                        DetailKind::Info => Color::Cyan,
                        DetailKind::Note => Color::Blue,
                    }),
            );
        }

        let mut output = Vec::new();
        report
            .finish()
            .write((file.path.clone(), Source::from(content.as_str())), &mut output)
            .ok()?;

        String::from_utf8(output).ok()
    }
}
