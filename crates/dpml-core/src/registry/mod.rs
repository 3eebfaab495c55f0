/*
 * registry/mod.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Tag schemas and the tag registry.
 */

//! Tag registry.
//!
//! Schemas arrive in one of two shapes: [`TagSchema`] (the serializable form,
//! where `attributes` is either a plain allow-list or a map of definitions)
//! or [`TagDefinition`] built in code. Registration always normalizes to
//! [`TagDefinition`], so the validator only ever sees one shape.
//!
//! A registry is an ordinary value. Build one, wrap it in an `Arc`, and hand
//! it to the parser, validator or processor that needs it.

pub mod validator;

pub use validator::Validator;

use std::fmt;
use std::sync::Arc;

use hashlink::LinkedHashMap;
use serde::{Deserialize, Serialize};

use crate::ast::Element;
use crate::error::{DpmlError, Issue, Result};

/// Declared value type of an attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    #[default]
    String,
    Number,
    Boolean,
}

impl AttributeType {
    pub fn accepts(&self, value: &str) -> bool {
        match self {
            AttributeType::String => true,
            AttributeType::Number => value.trim().parse::<f64>().is_ok(),
            AttributeType::Boolean => matches!(value.trim(), "true" | "false"),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttributeType::String => "string",
            AttributeType::Number => "number",
            AttributeType::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

/// Custom per-attribute check; `Err` carries the message.
#[derive(Clone)]
pub struct AttributeCheck(Arc<dyn Fn(&str) -> std::result::Result<(), String> + Send + Sync>);

impl AttributeCheck {
    pub fn new(check: impl Fn(&str) -> std::result::Result<(), String> + Send + Sync + 'static) -> Self {
        Self(Arc::new(check))
    }

    pub fn check(&self, value: &str) -> std::result::Result<(), String> {
        (self.0)(value)
    }
}

impl fmt::Debug for AttributeCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AttributeCheck(..)")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttributeDefinition {
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub attr_type: Option<AttributeType>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<String>>,
    #[serde(skip)]
    pub check: Option<AttributeCheck>,
}

impl AttributeDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_type(mut self, attr_type: AttributeType) -> Self {
        self.attr_type = Some(attr_type);
        self
    }

    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_check(
        mut self,
        check: impl Fn(&str) -> std::result::Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.check = Some(AttributeCheck::new(check));
        self
    }
}

/// The `attributes` field of a serialized schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeSpec {
    List(Vec<String>),
    Definitions(LinkedHashMap<String, AttributeDefinition>),
}

/// Serializable schema for one tag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TagSchema {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<AttributeSpec>,
    /// Older form of `required: true`.
    pub required_attributes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_children: Option<Vec<String>>,
    pub self_closing: bool,
}

/// Outcome of validating an element or document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<Issue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Issue>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::ok()
    }
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn error(issue: Issue) -> Self {
        let mut result = Self::ok();
        result.push_error(issue);
        result
    }

    pub fn push_error(&mut self, issue: Issue) {
        self.valid = false;
        self.errors.push(issue);
    }

    pub fn push_warning(&mut self, issue: Issue) {
        self.warnings.push(issue);
    }

    /// Fold `other` in. Validity is recomputed from the accumulated errors
    /// alone; warnings and a bare `valid: false` never fail a result.
    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self.valid = self.errors.is_empty();
    }
}

/// What a custom validator sees besides the element.
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    pub registry: &'a TagRegistry,
    pub parent: Option<&'a Element>,
    pub depth: usize,
}

/// Whole-element custom validator, run after the built-in checks.
#[derive(Clone)]
pub struct TagValidator(
    Arc<dyn Fn(&Element, &ValidationContext<'_>) -> ValidationResult + Send + Sync>,
);

impl TagValidator {
    pub fn new(
        validate: impl Fn(&Element, &ValidationContext<'_>) -> ValidationResult + Send + Sync + 'static,
    ) -> Self {
        Self(Arc::new(validate))
    }

    pub fn validate(&self, element: &Element, ctx: &ValidationContext<'_>) -> ValidationResult {
        (self.0)(element, ctx)
    }
}

impl fmt::Debug for TagValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TagValidator(..)")
    }
}

/// Canonical schema for one tag.
#[derive(Debug, Clone, Default)]
pub struct TagDefinition {
    /// Declared attributes. `None` accepts any attribute.
    pub attributes: Option<LinkedHashMap<String, AttributeDefinition>>,
    /// Lowercased child tags. `None` accepts any child.
    pub allowed_children: Option<Vec<String>>,
    pub self_closing: bool,
    pub validator: Option<TagValidator>,
}

impl TagDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attribute(mut self, name: impl Into<String>, definition: AttributeDefinition) -> Self {
        self.attributes
            .get_or_insert_with(LinkedHashMap::new)
            .insert(name.into(), definition);
        self
    }

    /// Allow plain optional attributes.
    pub fn with_attributes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let attributes = self.attributes.get_or_insert_with(LinkedHashMap::new);
        for name in names {
            let name = name.into();
            if !attributes.contains_key(&name) {
                attributes.insert(name, AttributeDefinition::default());
            }
        }
        self
    }

    /// Mark attributes required, declaring them if needed.
    pub fn with_required<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let attributes = self.attributes.get_or_insert_with(LinkedHashMap::new);
        for name in names {
            let name = name.into();
            match attributes.get_mut(&name) {
                Some(definition) => definition.required = true,
                None => {
                    attributes.insert(name, AttributeDefinition::new().required());
                }
            }
        }
        self
    }

    pub fn with_allowed_children<I, S>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_children = Some(
            children
                .into_iter()
                .map(|c| c.as_ref().to_lowercase())
                .collect(),
        );
        self
    }

    pub fn self_closing(mut self) -> Self {
        self.self_closing = true;
        self
    }

    pub fn with_validator(
        mut self,
        validate: impl Fn(&Element, &ValidationContext<'_>) -> ValidationResult + Send + Sync + 'static,
    ) -> Self {
        self.validator = Some(TagValidator::new(validate));
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDefinition> {
        self.attributes.as_ref().and_then(|attrs| attrs.get(name))
    }

    /// Names of required attributes in declaration order.
    pub fn required_attributes(&self) -> impl Iterator<Item = &str> {
        self.attributes
            .iter()
            .flat_map(|attrs| attrs.iter())
            .filter(|(_, def)| def.required)
            .map(|(name, _)| name.as_str())
    }

    pub fn allows_child(&self, tag_name: &str) -> bool {
        match &self.allowed_children {
            Some(children) => children.iter().any(|c| *c == tag_name.to_lowercase()),
            None => true,
        }
    }
}

impl From<TagSchema> for TagDefinition {
    fn from(schema: TagSchema) -> Self {
        let mut definition = TagDefinition::new();
        match schema.attributes {
            Some(AttributeSpec::List(names)) => definition = definition.with_attributes(names),
            Some(AttributeSpec::Definitions(defs)) => definition.attributes = Some(defs),
            None => {}
        }
        if !schema.required_attributes.is_empty() {
            definition = definition.with_required(schema.required_attributes);
        }
        if let Some(children) = schema.allowed_children {
            definition = definition.with_allowed_children(children);
        }
        definition.self_closing = schema.self_closing;
        definition
    }
}

/// Case-insensitive map from tag name to [`TagDefinition`].
#[derive(Debug, Clone, Default)]
pub struct TagRegistry {
    tags: LinkedHashMap<String, TagDefinition>,
}

impl TagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the schema for `tag_name`.
    pub fn register(&mut self, tag_name: &str, definition: impl Into<TagDefinition>) {
        self.tags.insert(tag_name.to_lowercase(), definition.into());
    }

    pub fn get(&self, tag_name: &str) -> Option<&TagDefinition> {
        self.tags.get(&tag_name.to_lowercase())
    }

    pub fn is_registered(&self, tag_name: &str) -> bool {
        self.tags.contains_key(&tag_name.to_lowercase())
    }

    pub fn tag_names(&self) -> impl Iterator<Item = &str> {
        self.tags.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Register every schema in a JSON object keyed by tag name.
    pub fn load_json(&mut self, text: &str) -> Result<usize> {
        let schemas: LinkedHashMap<String, TagSchema> = serde_json::from_str(text)
            .map_err(|e| DpmlError::config(format!("Invalid tag schema JSON: {}", e)))?;
        Ok(self.register_all(schemas))
    }

    /// Register every schema in a YAML mapping keyed by tag name.
    pub fn load_yaml(&mut self, text: &str) -> Result<usize> {
        let schemas: LinkedHashMap<String, TagSchema> = serde_yaml::from_str(text)
            .map_err(|e| DpmlError::config(format!("Invalid tag schema YAML: {}", e)))?;
        Ok(self.register_all(schemas))
    }

    fn register_all(&mut self, schemas: LinkedHashMap<String, TagSchema>) -> usize {
        let count = schemas.len();
        for (name, schema) in schemas {
            self.register(&name, schema);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let mut registry = TagRegistry::new();
        registry.register("Prompt", TagDefinition::new());
        assert!(registry.is_registered("prompt"));
        assert!(registry.is_registered("PROMPT"));
        assert_eq!(registry.tag_names().collect::<Vec<_>>(), vec!["prompt"]);
    }

    #[test]
    fn test_list_and_map_shapes_normalize_alike() {
        let mut registry = TagRegistry::new();
        let count = registry
            .load_json(
                r#"{
                    "llm": {"attributes": ["model", "temperature"], "requiredAttributes": ["model"], "selfClosing": true},
                    "agent": {
                        "attributes": {
                            "id": {"required": true},
                            "mode": {"enum": ["strict", "loose"], "default": "loose"},
                            "version": {"type": "number"}
                        },
                        "allowedChildren": ["LLM", "prompt"]
                    }
                }"#,
            )
            .unwrap();
        assert_eq!(count, 2);

        let llm = registry.get("llm").unwrap();
        assert!(llm.self_closing);
        assert_eq!(llm.required_attributes().collect::<Vec<_>>(), vec!["model"]);
        assert!(llm.attribute("temperature").is_some());

        let agent = registry.get("agent").unwrap();
        assert_eq!(agent.required_attributes().collect::<Vec<_>>(), vec!["id"]);
        assert_eq!(agent.attribute("mode").unwrap().default.as_deref(), Some("loose"));
        assert_eq!(agent.attribute("version").unwrap().attr_type, Some(AttributeType::Number));
        assert!(agent.allows_child("llm"));
        assert!(!agent.allows_child("tools"));
    }

    #[test]
    fn test_yaml_schema() {
        let mut registry = TagRegistry::new();
        registry
            .load_yaml("prompt:\n  attributes: [id]\n  allowedChildren: []\n")
            .unwrap();
        let prompt = registry.get("prompt").unwrap();
        assert!(!prompt.allows_child("role"));
    }

    #[test]
    fn test_bad_schema_is_config_error() {
        let mut registry = TagRegistry::new();
        let err = registry.load_json("{\"llm\": 3}").unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConfigError);
    }

    #[test]
    fn test_attribute_types() {
        assert!(AttributeType::Number.accepts("0.7"));
        assert!(!AttributeType::Number.accepts("warm"));
        assert!(AttributeType::Boolean.accepts("true"));
        assert!(!AttributeType::Boolean.accepts("yes"));
        assert!(AttributeType::String.accepts(""));
    }

    #[test]
    fn test_validation_result_merge() {
        let mut result = ValidationResult::ok();
        result.merge(ValidationResult::ok());
        assert!(result.valid);
        result.merge(ValidationResult::error(Issue::new(ErrorCode::InvalidNesting, "bad")));
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 1);
    }
}
