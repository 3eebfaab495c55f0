/*
 * resolver/mod.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Reference resolution through pluggable protocol handlers.
 */

//! Reference resolution.
//!
//! [`ReferenceResolver`] picks a [`ProtocolHandler`] for a reference's
//! protocol and caches successful results in the
//! [`ProcessingContext`] under the `protocol:path` key. Handlers are tried
//! newest first, so a later registration shadows an earlier one for the
//! protocols both accept.
//!
//! Resolution failures are always returned as [`ReferenceError`]s, whatever
//! the document mode.

pub mod file;
pub mod http;
pub mod id;
pub mod protocol;

pub use file::FileProtocolHandler;
pub use http::HttpProtocolHandler;
pub use id::IdProtocolHandler;
pub use protocol::ProtocolHandler;

use std::sync::Arc;

use crate::ast::{Reference, ResolvedValue};
use crate::config::ResolverOptions;
use crate::context::ProcessingContext;
use crate::error::{ErrorCode, ReferenceError};

/// A reference together with the value it resolved to.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedReference {
    pub reference: Reference,
    pub value: ResolvedValue,
}

#[derive(Default)]
pub struct ReferenceResolver {
    handlers: Vec<Arc<dyn ProtocolHandler>>,
}

impl ReferenceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver with the `id`, `file` and `http(s)` handlers.
    pub fn with_default_handlers(options: &ResolverOptions) -> Self {
        let mut resolver = Self::new();
        resolver.register(Arc::new(IdProtocolHandler));
        resolver.register(Arc::new(FileProtocolHandler::new(options.base_dir.clone())));
        resolver.register(Arc::new(HttpProtocolHandler::new(options)));
        resolver
    }

    pub fn register(&mut self, handler: Arc<dyn ProtocolHandler>) {
        self.handlers.push(handler);
    }

    /// The handler that would serve `protocol`.
    pub fn handler_for(&self, protocol: &str) -> Option<&Arc<dyn ProtocolHandler>> {
        self.handlers.iter().rev().find(|h| h.can_handle(protocol))
    }

    pub fn handler_names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    pub async fn resolve(
        &self,
        reference: &Reference,
        ctx: &mut ProcessingContext,
    ) -> Result<ResolvedReference, ReferenceError> {
        let key = reference.cache_key();

        if let Some(cached) = ctx.cached_reference(&key) {
            tracing::trace!(reference = %key, "Reference cache hit");
            return Ok(ResolvedReference {
                reference: reference.clone(),
                value: cached.value.clone(),
            });
        }

        let Some(handler) = self.handler_for(&reference.protocol) else {
            return Err(ReferenceError::new(
                ErrorCode::InvalidReference,
                key.clone(),
                format!("No handler for protocol '{}' in @{}", reference.protocol, key),
            )
            .at(reference.position));
        };

        tracing::debug!(handler = handler.name(), reference = %key, "Resolving reference");
        match handler.handle(reference, ctx).await {
            Ok(value) => {
                ctx.cache_reference(key, value.clone());
                Ok(ResolvedReference {
                    reference: reference.clone(),
                    value,
                })
            }
            Err(source) => Err(ReferenceError::new(
                ErrorCode::ReferenceNotFound,
                key.clone(),
                format!("Failed to resolve @{}: {}", key, source),
            )
            .at(reference.position)
            .with_source(source)),
        }
    }
}
