/*
 * ast/mod.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * The DPML abstract syntax tree.
 */

//! Typed tree produced by the parser.
//!
//! A [`Document`] owns top-level [`Element`]s; element children are a mix
//! of elements, [`Content`] text runs and [`Reference`]s extracted from text.

pub mod expression;
pub mod node;
pub mod pool;

pub use expression::{AttributeValue, is_expression};
pub use node::{
    AstNode, Attributes, Content, Document, DocumentMetadata, DocumentMode, Element, Node,
    NodeType, Reference, ResolvedValue,
};
pub use pool::{NodePool, PoolStats};
