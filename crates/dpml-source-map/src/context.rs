//! Source context for managing files

use crate::line_index::LineIndex;
use crate::types::FileId;
use serde::{Deserialize, Serialize};

/// Registry of source files that diagnostics can point into
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceContext {
    files: Vec<SourceFile>,
}

/// A source file with content and line index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    /// File path or identifier (e.g. `<anonymous>`)
    pub path: String,
    /// File content, when held in memory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Line index for location lookups
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_index: Option<LineIndex>,
}

impl SourceContext {
    /// Create a new empty source context
    pub fn new() -> Self {
        SourceContext { files: Vec::new() }
    }

    /// Add a file to the context and return its ID.
    ///
    /// When `content` is `None` the file is treated as disk-backed and its
    /// content is read lazily by [`SourceContext::content`].
    pub fn add_file(&mut self, path: String, content: Option<String>) -> FileId {
        let id = FileId(self.files.len());
        let line_index = content.as_deref().map(LineIndex::new);
        self.files.push(SourceFile {
            path,
            content,
            line_index,
        });
        id
    }

    /// Get a file by ID
    pub fn get_file(&self, id: FileId) -> Option<&SourceFile> {
        self.files.get(id.0)
    }

    /// Content of a file, reading disk-backed files on demand.
    pub fn content(&self, id: FileId) -> Option<String> {
        let file = self.get_file(id)?;
        match &file.content {
            Some(content) => Some(content.clone()),
            None => std::fs::read_to_string(&file.path).ok(),
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
