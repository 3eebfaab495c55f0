//! A range anchored to a registered file

use crate::types::{FileId, Range};
use serde::{Deserialize, Serialize};

/// Source information: which file, and where in it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub file_id: FileId,
    pub range: Range,
}

impl SourceInfo {
    pub fn new(file_id: FileId, range: Range) -> Self {
        Self { file_id, range }
    }

    pub fn start_offset(&self) -> usize {
        self.range.start.offset
    }

    pub fn end_offset(&self) -> usize {
        self.range.end.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Location;

    #[test]
    fn test_offsets() {
        let info = SourceInfo::new(
            FileId(2),
            Range::new(Location::new(4, 1, 5), Location::new(9, 1, 10)),
        );
        assert_eq!(info.start_offset(), 4);
        assert_eq!(info.end_offset(), 9);
        assert_eq!(info.file_id, FileId(2));
    }

    #[test]
    fn test_source_info_serialization() {
        let info = SourceInfo::new(FileId(0), Range::zero());
        let json = serde_json::to_string(&info).unwrap();
        let deserialized: SourceInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(info, deserialized);
    }
}
