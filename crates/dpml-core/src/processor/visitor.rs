/*
 * processor/visitor.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Visitor trait for the processing pipeline.
 */

use async_trait::async_trait;

use crate::ast::{Content, Document, Element, Reference};
use crate::context::ProcessingContext;
use crate::error::Result;

/// A pass over the AST.
///
/// Every handler defaults to a no-op, so a visitor implements only the
/// node kinds it cares about. For each node, all visitors run in priority
/// order (higher first, ties in registration order), each seeing the
/// node as left by the previous one.
///
/// # Example
///
/// ```ignore
/// struct Lowercase;
///
/// #[async_trait]
/// impl Visitor for Lowercase {
///     fn name(&self) -> &str { "lowercase" }
///
///     async fn visit_element(&self, element: &mut Element, _ctx: &mut ProcessingContext) -> Result<()> {
///         element.tag_name = element.tag_name.to_lowercase();
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Visitor: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    fn priority(&self) -> i32 {
        0
    }

    async fn visit_document(
        &self,
        _document: &mut Document,
        _ctx: &mut ProcessingContext,
    ) -> Result<()> {
        Ok(())
    }

    async fn visit_element(&self, _element: &mut Element, _ctx: &mut ProcessingContext) -> Result<()> {
        Ok(())
    }

    async fn visit_content(&self, _content: &mut Content, _ctx: &mut ProcessingContext) -> Result<()> {
        Ok(())
    }

    async fn visit_reference(
        &self,
        _reference: &mut Reference,
        _ctx: &mut ProcessingContext,
    ) -> Result<()> {
        Ok(())
    }
}
