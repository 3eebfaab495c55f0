//! Diagnostics for DPML.
//!
//! Every problem found while parsing, validating, resolving or transforming
//! a DPML document can be turned into a [`DiagnosticMessage`]. A message is
//! structured rather than a flat string:
//!
//! - a stable **code** (e.g. `UNCLOSED_TAG`) that is looked up in the
//!   embedded [`catalog`]
//! - a short **title** and an optional **problem** statement
//! - bulleted **details**, each optionally pointing at its own source span
//! - **hints** suggesting a fix
//! - a primary **location** ([`dpml_source_map::SourceInfo`])
//!
//! Messages render to plain text (with an ariadne source snippet when the
//! file is registered in a [`dpml_source_map::SourceContext`]) or to JSON.
//!
//! # Example
//!
//! ```
//! use dpml_error_reporting::DiagnosticMessageBuilder;
//!
//! let error = DiagnosticMessageBuilder::error("Unclosed tag")
//!     .with_code("UNCLOSED_TAG")
//!     .problem("Tag `<prompt>` is opened but never closed")
//!     .add_hint("Add a matching `</prompt>`?")
//!     .build();
//!
//! assert!(error.to_text(None).contains("Unclosed tag"));
//! ```

pub mod builder;
pub mod catalog;
pub mod diagnostic;

pub use builder::DiagnosticMessageBuilder;
pub use catalog::{ERROR_CATALOG, ErrorCodeInfo, get_error_info, get_subsystem};
pub use diagnostic::{DetailItem, DetailKind, DiagnosticKind, DiagnosticMessage, MessageContent};
