/*
 * processor/visitors/domain.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Dispatch of elements to tag processors.
 */

use std::sync::Arc;

use async_trait::async_trait;

use crate::ast::Element;
use crate::context::ProcessingContext;
use crate::error::Result;
use crate::processor::Visitor;
use crate::processor::tag_processor::TagProcessorRegistry;

pub const DOMAIN_TAG_PRIORITY: i32 = 50;

/// Hands each element to the tag processors registered for its tag.
pub struct DomainTagVisitor {
    processors: Arc<TagProcessorRegistry>,
}

impl DomainTagVisitor {
    pub fn new(processors: Arc<TagProcessorRegistry>) -> Self {
        Self { processors }
    }
}

#[async_trait]
impl Visitor for DomainTagVisitor {
    fn name(&self) -> &str {
        "domain-tag"
    }

    fn priority(&self) -> i32 {
        DOMAIN_TAG_PRIORITY
    }

    async fn visit_element(&self, element: &mut Element, ctx: &mut ProcessingContext) -> Result<()> {
        for processor in self.processors.processors_for(&element.tag_name) {
            if !processor.can_process(element) {
                continue;
            }
            tracing::trace!(processor = processor.name(), tag = %element.tag_name, "Tag processor");
            processor.process(element, ctx).await?;
        }
        Ok(())
    }
}
