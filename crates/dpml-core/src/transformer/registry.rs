/*
 * transformer/registry.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Transform-time processors and their registry.
 */

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::ast::Element;
use crate::dispatch::{PriorityList, merge_by_priority};
use crate::processor::WILDCARD_TAG;

use super::TransformContext;

/// A step in the transform chain for one tag.
///
/// `process` receives the current element by value and returns the next
/// one. `can_process` sees the element as left by the previous processor,
/// including any `meta` it wrote.
#[async_trait]
pub trait TransformProcessor: Send + Sync {
    fn name(&self) -> &str;

    fn priority(&self) -> i32 {
        0
    }

    fn can_process(&self, _element: &Element, _ctx: &TransformContext) -> bool {
        true
    }

    async fn process(&self, element: Element, ctx: &TransformContext) -> anyhow::Result<Element>;
}

#[derive(Default)]
pub struct TransformRegistry {
    by_tag: HashMap<String, PriorityList<Arc<dyn TransformProcessor>>>,
    sequence: u64,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register for `tag_name`; [`WILDCARD_TAG`] matches every element.
    /// Equal priorities run in registration order, across tags.
    pub fn register(&mut self, tag_name: &str, processor: Arc<dyn TransformProcessor>) {
        let sequence = self.sequence;
        self.sequence += 1;
        tracing::trace!(tag = tag_name, processor = processor.name(), "Registering transform processor");
        self.by_tag
            .entry(tag_name.to_lowercase())
            .or_default()
            .push_with_sequence(processor.priority(), sequence, processor);
    }

    pub fn register_wildcard(&mut self, processor: Arc<dyn TransformProcessor>) {
        self.register(WILDCARD_TAG, processor);
    }

    pub fn processors_for(&self, tag_name: &str) -> Vec<Arc<dyn TransformProcessor>> {
        let specific = self.by_tag.get(&tag_name.to_lowercase());
        let wildcard = self.by_tag.get(WILDCARD_TAG);
        merge_by_priority(specific.into_iter().chain(wildcard).map(|l| l.entries()))
            .into_iter()
            .map(|entry| entry.item.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_tag.values().map(PriorityList::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop(&'static str, i32);

    #[async_trait]
    impl TransformProcessor for Noop {
        fn name(&self) -> &str {
            self.0
        }

        fn priority(&self) -> i32 {
            self.1
        }

        async fn process(&self, element: Element, _ctx: &TransformContext) -> anyhow::Result<Element> {
            Ok(element)
        }
    }

    fn names(registry: &TransformRegistry, tag: &str) -> Vec<String> {
        registry
            .processors_for(tag)
            .iter()
            .map(|p| p.name().to_string())
            .collect()
    }

    #[test]
    fn test_ties_follow_registration_across_wildcard() {
        let mut registry = TransformRegistry::new();
        registry.register_wildcard(Arc::new(Noop("any", 10)));
        registry.register("prompt", Arc::new(Noop("first", 10)));
        registry.register("prompt", Arc::new(Noop("high", 30)));

        assert_eq!(names(&registry, "prompt"), vec!["high", "any", "first"]);
        assert_eq!(names(&registry, "role"), vec!["any"]);
        assert_eq!(registry.len(), 3);
    }
}
