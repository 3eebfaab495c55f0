/*
 * transformer/output.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Output adapters for transformed documents.
 */

use serde_json::{Map, Value, json};

use crate::ast::{Document, Element, Node, Reference, ResolvedValue};
use crate::error::Result;

/// Turns a transformed document into a target representation.
pub trait OutputAdapter: Send + Sync {
    type Output;

    fn name(&self) -> &str;

    fn adapt(&self, document: &Document) -> Result<Self::Output>;
}

/// Produces a JSON tree.
///
/// Elements become `{tag, attributes, meta, children}`, text becomes a
/// string and references become `{reference, resolved}`. Attribute order
/// is preserved.
#[derive(Debug, Default, Clone)]
pub struct JsonOutputAdapter {
    include_metadata: bool,
}

impl JsonOutputAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also emit the processing-time `metadata` of each element.
    pub fn with_metadata(mut self) -> Self {
        self.include_metadata = true;
        self
    }

    fn element(&self, element: &Element) -> Value {
        let attributes: Map<String, Value> = element
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();

        let mut out = Map::new();
        out.insert("tag".into(), Value::String(element.tag_name.clone()));
        out.insert("attributes".into(), Value::Object(attributes));
        out.insert(
            "meta".into(),
            Value::Object(element.meta.clone().unwrap_or_default()),
        );
        if self.include_metadata {
            out.insert(
                "metadata".into(),
                Value::Object(element.metadata.clone().unwrap_or_default()),
            );
        }
        out.insert(
            "children".into(),
            Value::Array(element.children.iter().map(|n| self.node(n)).collect()),
        );
        Value::Object(out)
    }

    fn reference(&self, reference: &Reference) -> Value {
        let resolved = match &reference.resolved {
            None => Value::Null,
            Some(ResolvedValue::Text(text)) => Value::String(text.clone()),
            Some(ResolvedValue::Json(value)) => value.clone(),
            Some(ResolvedValue::Element(element)) => self.element(element),
        };
        json!({
            "reference": reference.cache_key(),
            "resolved": resolved,
        })
    }

    fn node(&self, node: &Node) -> Value {
        match node {
            Node::Element(element) => self.element(element),
            Node::Content(content) => Value::String(content.value.clone()),
            Node::Reference(reference) => self.reference(reference),
        }
    }
}

impl OutputAdapter for JsonOutputAdapter {
    type Output = Value;

    fn name(&self) -> &str {
        "json"
    }

    fn adapt(&self, document: &Document) -> Result<Value> {
        Ok(Value::Array(
            document.children.iter().map(|n| self.node(n)).collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Content;
    use dpml_source_map::Range;

    #[test]
    fn test_json_shape() {
        let mut element = Element::new("prompt")
            .with_attribute("b", "2")
            .with_attribute("a", "1")
            .with_child(Content::new("Hi ", Range::zero()));
        let mut reference = Reference::new("id", "persona");
        reference.resolved = Some(ResolvedValue::Text("kind".into()));
        element.children.push(Node::Reference(reference));
        element.meta_mut().insert("seen".into(), json!(true));

        let output = JsonOutputAdapter::new()
            .adapt(&Document::new(vec![element.into()]))
            .unwrap();
        insta::assert_snapshot!(serde_json::to_string(&output).unwrap(), @r#"[{"tag":"prompt","attributes":{"b":"2","a":"1"},"meta":{"seen":true},"children":["Hi ",{"reference":"id:persona","resolved":"kind"}]}]"#);
    }
}
