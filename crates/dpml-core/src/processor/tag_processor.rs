/*
 * processor/tag_processor.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Tag-specific semantic processors.
 */

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::ast::{Element, Node};
use crate::context::ProcessingContext;
use crate::dispatch::{PriorityList, merge_by_priority};
use crate::error::Result;

/// Tag name that matches every element.
pub const WILDCARD_TAG: &str = "*";

/// Attaches semantic metadata to elements of a given tag.
#[async_trait]
pub trait TagProcessor: Send + Sync {
    fn name(&self) -> &str;

    fn priority(&self) -> i32 {
        0
    }

    fn can_process(&self, _element: &Element) -> bool {
        true
    }

    async fn process(&self, element: &mut Element, ctx: &mut ProcessingContext) -> Result<()>;
}

/// Tag processors keyed by lowercased tag name, plus wildcard processors.
#[derive(Default)]
pub struct TagProcessorRegistry {
    by_tag: HashMap<String, PriorityList<Arc<dyn TagProcessor>>>,
    sequence: u64,
}

impl TagProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register for `tag_name`, or for every element with [`WILDCARD_TAG`].
    pub fn register(&mut self, tag_name: &str, processor: Arc<dyn TagProcessor>) {
        let sequence = self.sequence;
        self.sequence += 1;
        self.by_tag
            .entry(tag_name.to_lowercase())
            .or_default()
            .push_with_sequence(processor.priority(), sequence, processor);
    }

    /// Tag-specific and wildcard processors in execution order.
    pub fn processors_for(&self, tag_name: &str) -> Vec<Arc<dyn TagProcessor>> {
        let specific = self.by_tag.get(&tag_name.to_lowercase());
        let wildcard = self.by_tag.get(WILDCARD_TAG);
        merge_by_priority(specific.into_iter().chain(wildcard).map(|l| l.entries()))
            .into_iter()
            .map(|entry| entry.item.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.values().all(PriorityList::is_empty)
    }
}

/// Records a `semantic` summary of each element it sees: tag name, id,
/// attribute names and the number of direct reference children.
#[derive(Debug, Default)]
pub struct SemanticMetadataProcessor;

#[async_trait]
impl TagProcessor for SemanticMetadataProcessor {
    fn name(&self) -> &str {
        "semantic-metadata"
    }

    async fn process(&self, element: &mut Element, _ctx: &mut ProcessingContext) -> Result<()> {
        let reference_count = element
            .children
            .iter()
            .filter(|n| matches!(n, Node::Reference(_)))
            .count();
        let attributes: Vec<Value> = element.attributes.keys().map(|k| json!(k)).collect();
        let summary = json!({
            "tagName": element.tag_name,
            "id": element.id(),
            "attributes": attributes,
            "referenceCount": reference_count,
        });
        element.metadata_mut().insert("semantic".to_string(), summary);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str, i32);

    #[async_trait]
    impl TagProcessor for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn priority(&self) -> i32 {
            self.1
        }

        async fn process(&self, _element: &mut Element, _ctx: &mut ProcessingContext) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_wildcard_merged_by_priority() {
        let mut registry = TagProcessorRegistry::new();
        registry.register("prompt", Arc::new(Named("p10", 10)));
        registry.register("*", Arc::new(Named("any20", 20)));
        registry.register("Prompt", Arc::new(Named("p20", 20)));

        let names: Vec<String> = registry
            .processors_for("PROMPT")
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(names, vec!["any20", "p20", "p10"]);
        assert_eq!(registry.processors_for("role").len(), 1);
    }

    #[test]
    fn test_semantic_metadata() {
        let mut ctx = ProcessingContext::new(Default::default());
        let mut element = Element::new("prompt")
            .with_attribute("id", "p")
            .with_child(crate::ast::Reference::new("id", "persona"));
        pollster::block_on(SemanticMetadataProcessor.process(&mut element, &mut ctx)).unwrap();

        let semantic = &element.metadata.as_ref().unwrap()["semantic"];
        assert_eq!(semantic["id"], "p");
        assert_eq!(semantic["referenceCount"], 1);
        assert_eq!(semantic["attributes"], json!(["id"]));
    }
}
