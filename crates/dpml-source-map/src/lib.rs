//! Source positions for DPML
//!
//! This crate provides the location vocabulary shared by the DPML parser,
//! the diagnostics crate and the semantic pipeline. Every node in a DPML
//! tree carries a [`Range`], and diagnostics point at a [`SourceInfo`]
//! (a range inside a registered file).
//!
//! # Overview
//!
//! The core types are:
//! - [`Location`]: A point in the source (byte offset plus 1-based line/column)
//! - [`Range`]: A half-open span between two locations
//! - [`LineIndex`]: Fast offset to line/column conversion for one text
//! - [`SourceContext`]: Registry of source files used for rendering diagnostics
//!
//! # Example
//!
//! ```rust
//! use dpml_source_map::*;
//!
//! let mut ctx = SourceContext::new();
//! let file_id = ctx.add_file("agent.dpml".into(), Some("<agent>\n</agent>".into()));
//!
//! let index = ctx.get_file(file_id).unwrap().line_index.as_ref().unwrap();
//! let range = index.range(8, 16);
//! assert_eq!(range.start.line, 2);
//! assert_eq!(range.start.column, 1);
//!
//! let info = SourceInfo::new(file_id, range);
//! assert_eq!(info.start_offset(), 8);
//! ```

pub mod context;
pub mod line_index;
pub mod source_info;
pub mod types;

// Re-export main types
pub use context::{SourceContext, SourceFile};
pub use line_index::LineIndex;
pub use source_info::SourceInfo;
pub use types::{FileId, Location, Range};
