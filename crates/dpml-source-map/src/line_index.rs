//! Offset to line/column conversion

use crate::types::{Location, Range};
use serde::{Deserialize, Serialize};

/// Line-break index for one source text.
///
/// Scans the content once so byte offsets can be turned into
/// 1-based line/column locations by binary search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineIndex {
    /// Byte offset where each line starts (line 1 starts at 0)
    line_starts: Vec<usize>,

    /// Total length of the text in bytes
    total_length: usize,

    /// Whether every byte is ASCII, so columns equal byte distances
    #[serde(skip)]
    ascii: bool,

    /// Copy of the text, kept only for non-ASCII sources
    #[serde(skip)]
    content: Option<String>,
}

impl LineIndex {
    /// Build an index by analyzing `content`.
    ///
    /// # Example
    ///
    /// ```
    /// use dpml_source_map::LineIndex;
    ///
    /// let index = LineIndex::new("hello\nworld");
    /// let loc = index.location(6);
    /// assert_eq!(loc.line, 2);
    /// assert_eq!(loc.column, 1);
    /// ```
    pub fn new(content: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            content
                .bytes()
                .enumerate()
                .filter_map(|(idx, b)| (b == b'\n').then_some(idx + 1)),
        );
        let ascii = content.is_ascii();

        LineIndex {
            line_starts,
            total_length: content.len(),
            ascii,
            content: (!ascii).then(|| content.to_string()),
        }
    }

    /// Convert a byte offset to a location.
    ///
    /// Offsets past the end are clamped to the end of the text.
    pub fn location(&self, offset: usize) -> Location {
        let offset = offset.min(self.total_length);

        // partition_point gives the number of line starts <= offset
        let line_idx = self.line_starts.partition_point(|&start| start <= offset) - 1;
        let line_start = self.line_starts[line_idx];

        let column = match (&self.content, self.ascii) {
            (Some(content), false) => content
                .get(line_start..offset)
                .map_or(offset - line_start, |s| s.chars().count()),
            _ => offset - line_start,
        };

        Location {
            offset,
            line: line_idx + 1,
            column: column + 1,
        }
    }

    /// Build a range from two byte offsets.
    pub fn range(&self, start: usize, end: usize) -> Range {
        let end = end.max(start);
        Range {
            start: self.location(start),
            end: self.location(end),
        }
    }

    /// Get the total length of the text in bytes
    pub fn total_length(&self) -> usize {
        self.total_length
    }

    /// Get the number of lines in the text
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}
