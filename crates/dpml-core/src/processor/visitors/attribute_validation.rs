/*
 * processor/visitors/attribute_validation.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Schema checks applied during the pipeline pass.
 */

use std::sync::Arc;

use async_trait::async_trait;

use crate::ast::Element;
use crate::context::ProcessingContext;
use crate::error::{DpmlError, Result};
use crate::processor::Visitor;
use crate::registry::{TagRegistry, Validator};

pub const ATTRIBUTE_VALIDATION_PRIORITY: i32 = 80;

/// Applies declared attribute defaults, then runs the per-element schema
/// checks.
///
/// Runs after inheritance, so inherited attributes are validated too.
/// Strictness is the visitor's own flag or the document's mode.
#[derive(Debug)]
pub struct AttributeValidationVisitor {
    validator: Validator,
    strict: bool,
}

impl AttributeValidationVisitor {
    pub fn new(registry: Arc<TagRegistry>) -> Self {
        Self {
            validator: Validator::new(registry),
            strict: false,
        }
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

fn apply_defaults(element: &mut Element, registry: &TagRegistry) {
    let Some(attributes) = registry
        .get(&element.tag_name)
        .and_then(|definition| definition.attributes.as_ref())
    else {
        return;
    };
    for (name, definition) in attributes {
        if let Some(default) = &definition.default
            && !element.has_attribute(name)
        {
            element.set_attribute(name.clone(), default.clone());
        }
    }
}

#[async_trait]
impl Visitor for AttributeValidationVisitor {
    fn name(&self) -> &str {
        "attribute-validation"
    }

    fn priority(&self) -> i32 {
        ATTRIBUTE_VALIDATION_PRIORITY
    }

    async fn visit_element(&self, element: &mut Element, ctx: &mut ProcessingContext) -> Result<()> {
        if self.validator.registry().is_empty() {
            return Ok(());
        }

        apply_defaults(element, self.validator.registry());
        let result = self
            .validator
            .check_element(element, ctx.parent(), ctx.depth());

        for warning in result.warnings {
            ctx.add_warning(warning);
        }

        let strict = self.strict || ctx.is_strict();
        let mut errors = result.errors.into_iter();
        if strict && let Some(first) = errors.next() {
            return Err(DpmlError::Validation(first));
        }
        for error in errors {
            ctx.add_warning(error);
        }
        Ok(())
    }
}
