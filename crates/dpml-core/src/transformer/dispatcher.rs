/*
 * transformer/dispatcher.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Runs the transform chain over elements and their subtrees.
 */

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::ast::{Document, Element, Node};
use crate::config::TransformOptions;
use crate::error::{DpmlError, Result};

use super::{TransformContext, TransformRegistry};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Key in `Element::meta` collecting contained processor failures.
pub const META_ERRORS: &str = "errors";

pub struct Dispatcher {
    registry: Arc<TransformRegistry>,
    options: TransformOptions,
}

impl Dispatcher {
    pub fn new(registry: Arc<TransformRegistry>, options: TransformOptions) -> Self {
        Self { registry, options }
    }

    pub fn options(&self) -> &TransformOptions {
        &self.options
    }

    /// Transform every top-level element of `document`.
    pub async fn dispatch_document(&self, mut document: Document, ctx: &TransformContext) -> Result<Document> {
        let children = std::mem::take(&mut document.children);
        let mut transformed = Vec::with_capacity(children.len());
        for node in children {
            match node {
                Node::Element(element) => {
                    let scope = ctx.child(element.tag_name.clone(), None);
                    transformed.push(Node::Element(self.dispatch(element, &scope).await?));
                }
                other => transformed.push(other),
            }
        }
        document.children = transformed;
        Ok(document)
    }

    /// Run the chain on `element`, then on each child element.
    ///
    /// `ctx` is the element's own scope. Children get a nested scope whose
    /// parent result is this element as its chain left it.
    pub fn dispatch<'a>(&'a self, element: Element, ctx: &'a TransformContext) -> BoxFuture<'a, Result<Element>> {
        Box::pin(async move {
            let mut element = self.run_chain(element, ctx).await?;

            let parent_result = element.shallow_clone();
            let children = std::mem::take(&mut element.children);
            let mut transformed = Vec::with_capacity(children.len());
            for node in children {
                match node {
                    Node::Element(child) => {
                        let scope = ctx.child(child.tag_name.clone(), Some(parent_result.clone()));
                        transformed.push(Node::Element(self.dispatch(child, &scope).await?));
                    }
                    other => transformed.push(other),
                }
            }
            element.children = transformed;
            Ok(element)
        })
    }

    /// Every eligible processor for one element, in priority order.
    pub async fn run_chain(&self, mut element: Element, ctx: &TransformContext) -> Result<Element> {
        for processor in self.registry.processors_for(&element.tag_name) {
            if !processor.can_process(&element, ctx) {
                tracing::trace!(processor = processor.name(), tag = %element.tag_name, "Processor skipped");
                continue;
            }

            tracing::debug!(processor = processor.name(), tag = %element.tag_name, "Running transform processor");
            match processor.process(element.clone(), ctx).await {
                Ok(next) => element = next,
                Err(err) if self.options.ignore_errors => {
                    let message = format!("{:#}", err);
                    tracing::warn!(
                        processor = processor.name(),
                        tag = %element.tag_name,
                        error = %message,
                        "Transform processor failed, continuing"
                    );
                    record_error(&mut element, message);
                }
                Err(err) => {
                    return Err(DpmlError::Transform {
                        processor: processor.name().to_string(),
                        tag_name: element.tag_name.clone(),
                        message: format!("{:#}", err),
                    });
                }
            }

            if self.options.short_circuit {
                break;
            }
        }
        Ok(element)
    }
}

fn record_error(element: &mut Element, message: String) {
    let slot = element
        .meta_mut()
        .entry(META_ERRORS)
        .or_insert_with(|| Value::Array(Vec::new()));
    match slot {
        Value::Array(errors) => errors.push(Value::String(message)),
        other => *other = Value::Array(vec![Value::String(message)]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transformer::TransformProcessor;
    use async_trait::async_trait;
    use serde_json::json;

    struct Tagger(&'static str, i32);

    #[async_trait]
    impl TransformProcessor for Tagger {
        fn name(&self) -> &str {
            self.0
        }

        fn priority(&self) -> i32 {
            self.1
        }

        async fn process(&self, mut element: Element, _ctx: &TransformContext) -> anyhow::Result<Element> {
            let trail = element
                .meta_value("trail")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            element.meta_mut().insert("trail".into(), json!(format!("{}{}", trail, self.0)));
            Ok(element)
        }
    }

    struct Failing;

    #[async_trait]
    impl TransformProcessor for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn priority(&self) -> i32 {
            15
        }

        async fn process(&self, mut element: Element, _ctx: &TransformContext) -> anyhow::Result<Element> {
            element.set_attribute("corrupted", "yes");
            anyhow::bail!("boom")
        }
    }

    fn dispatcher(registry: TransformRegistry, ignore_errors: bool, short_circuit: bool) -> Dispatcher {
        Dispatcher::new(
            Arc::new(registry),
            TransformOptions {
                ignore_errors,
                short_circuit,
                ..Default::default()
            },
        )
    }

    fn trail(element: &Element) -> Option<&str> {
        element.meta_value("trail").and_then(Value::as_str)
    }

    #[test]
    fn test_failure_is_contained_with_ignore_errors() {
        let mut registry = TransformRegistry::new();
        registry.register("x", Arc::new(Tagger("a", 20)));
        registry.register("x", Arc::new(Failing));
        registry.register("x", Arc::new(Tagger("b", 10)));

        let result = pollster::block_on(
            dispatcher(registry, true, false).run_chain(Element::new("x"), &TransformContext::default()),
        )
        .unwrap();
        assert_eq!(trail(&result), Some("ab"));
        assert!(!result.has_attribute("corrupted"));
        assert_eq!(result.meta_value(META_ERRORS), Some(&json!(["boom"])));
    }

    #[test]
    fn test_failure_propagates_by_default() {
        let mut registry = TransformRegistry::new();
        registry.register("x", Arc::new(Failing));

        let err = pollster::block_on(
            dispatcher(registry, false, false).run_chain(Element::new("x"), &TransformContext::default()),
        )
        .unwrap_err();
        assert!(matches!(err, DpmlError::Transform { ref processor, .. } if processor == "failing"));
    }

    #[test]
    fn test_short_circuit_stops_after_first() {
        let mut registry = TransformRegistry::new();
        registry.register("x", Arc::new(Tagger("a", 20)));
        registry.register("x", Arc::new(Tagger("b", 10)));

        let result = pollster::block_on(
            dispatcher(registry, false, true).run_chain(Element::new("x"), &TransformContext::default()),
        )
        .unwrap();
        assert_eq!(trail(&result), Some("a"));
    }

    #[test]
    fn test_non_array_errors_slot_is_replaced() {
        let mut element = Element::new("x");
        element.meta_mut().insert(META_ERRORS.into(), json!("stale"));
        record_error(&mut element, "fresh".into());
        assert_eq!(element.meta_value(META_ERRORS), Some(&json!(["fresh"])));
    }
}
