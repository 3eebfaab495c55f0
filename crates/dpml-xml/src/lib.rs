//! Permissive markup parsing for DPML.
//!
//! This crate turns DPML source text into a generic, order-preserving tree
//! ([`XmlDocument`] of [`XmlElement`]s) using [`quick-xml`] for tokenizing.
//! It is deliberately more forgiving than XML:
//!
//! - any number of top-level elements (including none)
//! - stray text outside elements is dropped with a warning
//! - undecodable entities are kept verbatim with a warning
//! - valueless and unquoted attributes are accepted
//!
//! Tag balance is checked by a shallow pre-scan before the tree is built, so
//! unbalanced input fails fast with `UNCLOSED_TAG`.
//!
//! # Example
//!
//! ```rust
//! use dpml_xml::{parse, XmlChild};
//!
//! let doc = parse(r#"<agent id="a">
//!   <llm model="gpt-4"/>
//!   <prompt>You are @persona</prompt>
//! </agent>"#).unwrap();
//!
//! let agent = &doc.children[0];
//! assert_eq!(agent.get_attribute("id"), Some("a"));
//!
//! let prompt = agent.child_elements().nth(1).unwrap();
//! assert!(matches!(&prompt.children[0], XmlChild::Text(t) if t.content == "You are @persona"));
//! ```
//!
//! # Positions
//!
//! Every element, attribute and text run carries a [`dpml_source_map::Range`].
//! With [`XmlParseOptions::track_positions`] off, all ranges are the zero span.

pub mod balance;
pub mod context;
pub mod error;
pub mod parser;
pub mod types;

pub use context::XmlParseContext;
pub use error::{Result, XmlError};
pub use parser::{XmlParseOptions, parse, parse_with_context};
pub use types::{TextEntity, XmlAttribute, XmlChild, XmlDocument, XmlElement, XmlText};
