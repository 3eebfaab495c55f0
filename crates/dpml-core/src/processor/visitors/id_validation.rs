/*
 * processor/visitors/id_validation.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Builds the id map and rejects duplicate ids.
 */

use async_trait::async_trait;

use crate::ast::{Document, Element};
use crate::context::ProcessingContext;
use crate::error::{DpmlError, ErrorCode, Issue, Result};
use crate::processor::Visitor;

pub const ID_VALIDATION_PRIORITY: i32 = 90;

/// Registers every `id` in the context's id map.
///
/// A duplicate is fatal in strict mode. In loose mode it is reported as a
/// warning and the first element keeps the id.
#[derive(Debug, Default)]
pub struct IdValidationVisitor {
    strict: bool,
}

impl IdValidationVisitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

#[async_trait]
impl Visitor for IdValidationVisitor {
    fn name(&self) -> &str {
        "id-validation"
    }

    fn priority(&self) -> i32 {
        ID_VALIDATION_PRIORITY
    }

    async fn visit_document(&self, _document: &mut Document, ctx: &mut ProcessingContext) -> Result<()> {
        ctx.reset_id_map();
        Ok(())
    }

    async fn visit_element(&self, element: &mut Element, ctx: &mut ProcessingContext) -> Result<()> {
        let Some(id) = element.id() else {
            return Ok(());
        };
        if ctx.register_id(id, element) {
            return Ok(());
        }

        let issue = Issue::new(
            ErrorCode::DuplicateId,
            format!("Duplicate id '{}' on <{}>", id, element.tag_name),
        )
        .at(element.position);
        if self.strict || ctx.is_strict() {
            return Err(DpmlError::Validation(issue));
        }
        ctx.add_warning(issue);
        Ok(())
    }
}
