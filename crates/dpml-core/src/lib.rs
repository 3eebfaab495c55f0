/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * DPML document model, semantic processing and transforms.
 */

//! Core of the DPML prompt markup language.
//!
//! Source text flows through these stages:
//!
//! 1. [`DpmlParser`] - XML-like text to a typed [`Document`], with inline
//!    `@reference`s split out of text
//! 2. [`Processor`] - ordered [`Visitor`]s over the tree: inheritance, id
//!    and attribute validation, domain tag processors, and optionally
//!    reference resolution through a [`ReferenceResolver`]
//! 3. [`Transformer`] - per-tag [`TransformProcessor`] chains producing the
//!    final element tree, then an [`OutputAdapter`]
//!
//! # Example
//!
//! ```ignore
//! use dpml_core::{DpmlConfig, DpmlParser, Processor, TagProcessorRegistry, TagRegistry};
//! use std::sync::Arc;
//!
//! let config = DpmlConfig::default();
//! let parsed = DpmlParser::new(config.parser.clone()).parse(source);
//! let document = parsed.into_result()?;
//!
//! let processor = Processor::with_defaults(
//!     Arc::new(TagRegistry::new()),
//!     Arc::new(TagProcessorRegistry::new()),
//!     &config,
//! );
//! let processed = processor.process(document).await?;
//! ```

pub mod ast;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod parser;
pub mod processor;
pub mod registry;
pub mod resolver;
pub mod transformer;

// Re-export commonly used types
pub use ast::{
    AstNode, AttributeValue, Content, Document, DocumentMetadata, DocumentMode, Element, Node,
    NodePool, NodeType, Reference, ResolvedValue,
};
pub use config::{
    DpmlConfig, ParserOptions, ProcessingOptions, ResolverOptions, TransformOptions,
    TraversalMode,
};
pub use context::ProcessingContext;
pub use error::{DpmlError, ErrorCode, Issue, ProtocolError, ReferenceError, Result};
pub use parser::{DpmlParser, ParseResult};
pub use processor::{ProcessResult, Processor, TagProcessor, TagProcessorRegistry, Visitor};
pub use registry::{
    AttributeDefinition, AttributeType, TagDefinition, TagRegistry, ValidationResult, Validator,
};
pub use resolver::{ProtocolHandler, ReferenceResolver, ResolvedReference};
pub use transformer::{
    JsonOutputAdapter, OutputAdapter, TransformContext, TransformProcessor, TransformRegistry,
    Transformer,
};
