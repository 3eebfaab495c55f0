/*
 * resolver/protocol.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Protocol handler trait.
 */

use async_trait::async_trait;

use crate::ast::{Reference, ResolvedValue};
use crate::context::ProcessingContext;
use crate::error::ProtocolError;

/// Resolves references of one or more schemes.
///
/// Handlers only fetch; caching and error wrapping belong to
/// [`ReferenceResolver`](super::ReferenceResolver).
#[async_trait]
pub trait ProtocolHandler: Send + Sync {
    fn name(&self) -> &str;

    fn can_handle(&self, protocol: &str) -> bool;

    async fn handle(
        &self,
        reference: &Reference,
        ctx: &ProcessingContext,
    ) -> Result<ResolvedValue, ProtocolError>;
}

/// Decode a body as JSON when `is_json`, otherwise keep it as text.
pub(crate) fn decode_body(
    body: String,
    is_json: bool,
    origin: &str,
) -> Result<ResolvedValue, ProtocolError> {
    if !is_json {
        return Ok(ResolvedValue::Text(body));
    }
    serde_json::from_str(&body)
        .map(ResolvedValue::Json)
        .map_err(|e| ProtocolError::InvalidJson {
            origin: origin.to_string(),
            message: e.to_string(),
        })
}
