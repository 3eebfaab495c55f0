/*
 * transformer/mod.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Transform-time processor chain.
 */

//! Transform-time processor chain.
//!
//! Independent of the semantic pipeline: a [`TransformRegistry`] maps tag
//! names (plus the `*` wildcard) to [`TransformProcessor`]s, and the
//! [`Dispatcher`] runs every eligible one per element in priority order,
//! feeding each processor's result to the next. Each element is processed
//! in its own [`TransformContext`], a nested scope that can read its
//! ancestors' results but never changes them.
//!
//! ```ignore
//! let mut registry = TransformRegistry::new();
//! registry.register("prompt", Arc::new(MarkPrompt));
//! let transformer = Transformer::new(Arc::new(registry), TransformOptions::default());
//! let json = transformer.transform_into(document, &JsonOutputAdapter::new()).await?;
//! ```

mod context;
mod dispatcher;
mod output;
mod registry;

pub use context::TransformContext;
pub use dispatcher::{Dispatcher, META_ERRORS};
pub use output::{JsonOutputAdapter, OutputAdapter};
pub use registry::{TransformProcessor, TransformRegistry};

use std::sync::Arc;

use crate::ast::Document;
use crate::config::TransformOptions;
use crate::error::Result;
use crate::processor::ProcessResult;

pub struct Transformer {
    dispatcher: Dispatcher,
}

impl Transformer {
    pub fn new(registry: Arc<TransformRegistry>, options: TransformOptions) -> Self {
        Self {
            dispatcher: Dispatcher::new(registry, options),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// An empty root scope using the configured ancestor bound.
    pub fn root_context(&self) -> TransformContext {
        TransformContext::new(self.dispatcher.options().max_ancestor_depth)
    }

    pub async fn transform(&self, document: Document) -> Result<Document> {
        self.transform_with_context(document, &self.root_context()).await
    }

    pub async fn transform_with_context(&self, document: Document, ctx: &TransformContext) -> Result<Document> {
        tracing::debug!(elements = document.children.len(), "Transforming document");
        self.dispatcher.dispatch_document(document, ctx).await
    }

    /// Transform a processed document. Processors can read the processing
    /// context through [`TransformContext::processing_context`].
    pub async fn transform_processed(&self, processed: ProcessResult) -> Result<Document> {
        let ctx = self
            .root_context()
            .with_processing_context(Arc::new(processed.context));
        self.transform_with_context(processed.document, &ctx).await
    }

    /// Transform and hand the result to `adapter`.
    pub async fn transform_into<A: OutputAdapter>(&self, document: Document, adapter: &A) -> Result<A::Output> {
        let transformed = self.transform(document).await?;
        tracing::debug!(adapter = adapter.name(), "Adapting output");
        adapter.adapt(&transformed)
    }

    /// Blocking variant of [`transform`](Self::transform) for callers
    /// outside an async runtime. Processors must not need a runtime.
    pub fn transform_blocking(&self, document: Document) -> Result<Document> {
        pollster::block_on(self.transform(document))
    }
}
