/*
 * resolver/id.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * `id:` references into the run's id map.
 */

use async_trait::async_trait;

use crate::ast::{Reference, ResolvedValue};
use crate::context::ProcessingContext;
use crate::error::ProtocolError;

use super::ProtocolHandler;

/// Looks references up in the id map built by the id validation pass.
#[derive(Debug, Default)]
pub struct IdProtocolHandler;

#[async_trait]
impl ProtocolHandler for IdProtocolHandler {
    fn name(&self) -> &str {
        "id"
    }

    fn can_handle(&self, protocol: &str) -> bool {
        protocol == "id"
    }

    async fn handle(
        &self,
        reference: &Reference,
        ctx: &ProcessingContext,
    ) -> Result<ResolvedValue, ProtocolError> {
        let (id, _) = reference.split_fragment();
        ctx.lookup_id(id)
            .map(|element| ResolvedValue::Element(Box::new(element.clone())))
            .ok_or_else(|| ProtocolError::UnknownId { id: id.to_string() })
    }
}
