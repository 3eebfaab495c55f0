/*
 * registry/validator.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Validation of elements against registered tag schemas.
 */

use std::sync::Arc;

use crate::ast::{Document, Element, is_expression};
use crate::error::{ErrorCode, Issue};

use super::{TagDefinition, TagRegistry, ValidationContext, ValidationResult};

/// Attributes every tag accepts without declaring them.
pub const GLOBAL_ATTRIBUTES: &[&str] = &["id", "extends"];

/// Checks elements against a [`TagRegistry`].
///
/// Validation only reads the tree; running it twice gives the same result.
#[derive(Debug, Clone)]
pub struct Validator {
    registry: Arc<TagRegistry>,
}

impl Validator {
    pub fn new(registry: Arc<TagRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &TagRegistry {
        &self.registry
    }

    /// Valid iff no top-level subtree produces an error.
    pub fn validate_document(&self, document: &Document) -> ValidationResult {
        let mut result = ValidationResult::ok();
        for element in document.elements() {
            result.merge(self.validate_element(element));
        }
        result
    }

    /// Validate `element` and all of its descendants, in pre-order.
    pub fn validate_element(&self, element: &Element) -> ValidationResult {
        let mut result = ValidationResult::ok();
        let mut stack: Vec<(&Element, Option<&Element>, usize)> = vec![(element, None, 0)];
        while let Some((element, parent, depth)) = stack.pop() {
            result.merge(self.check_element(element, parent, depth));
            stack.extend(
                element
                    .child_elements()
                    .rev()
                    .map(|child| (child, Some(element), depth + 1)),
            );
        }
        result
    }

    /// Checks for one element, not descending into children.
    pub fn check_element(
        &self,
        element: &Element,
        parent: Option<&Element>,
        depth: usize,
    ) -> ValidationResult {
        let mut result = ValidationResult::ok();

        let Some(definition) = self.registry.get(&element.tag_name) else {
            result.push_error(
                Issue::new(
                    ErrorCode::InvalidNesting,
                    format!("Unknown tag <{}>", element.tag_name),
                )
                .at(element.position),
            );
            return result;
        };

        check_attributes(element, definition, &mut result);

        if definition.self_closing && !element.children.is_empty() {
            result.push_error(
                Issue::new(
                    ErrorCode::InvalidNesting,
                    format!(
                        "<{}> is self-closing but has {} child node(s)",
                        element.tag_name,
                        element.children.len()
                    ),
                )
                .at(element.position),
            );
        }

        for child in element.child_elements() {
            if !definition.allows_child(&child.tag_name) {
                result.push_error(
                    Issue::new(
                        ErrorCode::InvalidNesting,
                        format!(
                            "<{}> is not allowed inside <{}>",
                            child.tag_name, element.tag_name
                        ),
                    )
                    .at(child.position),
                );
            }
        }

        if let Some(validator) = &definition.validator {
            let ctx = ValidationContext {
                registry: &self.registry,
                parent,
                depth,
            };
            result.merge(validator.validate(element, &ctx));
        }

        result
    }
}

fn check_attributes(element: &Element, definition: &TagDefinition, result: &mut ValidationResult) {
    let Some(declared) = &definition.attributes else {
        return;
    };

    for name in definition.required_attributes() {
        if !element.has_attribute(name) {
            result.push_error(
                Issue::new(
                    ErrorCode::MissingRequiredAttribute,
                    format!("<{}> is missing required attribute '{}'", element.tag_name, name),
                )
                .at(element.position),
            );
        }
    }

    for (name, value) in &element.attributes {
        let Some(attribute) = declared.get(name) else {
            if !name.starts_with("x-") && !GLOBAL_ATTRIBUTES.contains(&name.as_str()) {
                result.push_warning(
                    Issue::new(
                        ErrorCode::InvalidAttribute,
                        format!("Unknown attribute '{}' on <{}>", name, element.tag_name),
                    )
                    .at(element.position),
                );
            }
            continue;
        };

        if is_expression(value) {
            continue;
        }

        if let Some(attr_type) = attribute.attr_type
            && !attr_type.accepts(value)
        {
            result.push_error(
                Issue::new(
                    ErrorCode::InvalidAttribute,
                    format!(
                        "Attribute '{}' on <{}> must be a {}, got '{}'",
                        name, element.tag_name, attr_type, value
                    ),
                )
                .at(element.position),
            );
        }

        if let Some(allowed) = &attribute.allowed_values
            && !allowed.iter().any(|v| v == value)
        {
            result.push_error(
                Issue::new(
                    ErrorCode::InvalidAttribute,
                    format!(
                        "Attribute '{}' on <{}> must be one of [{}], got '{}'",
                        name,
                        element.tag_name,
                        allowed.join(", "),
                        value
                    ),
                )
                .at(element.position),
            );
        }

        if let Some(check) = &attribute.check
            && let Err(message) = check.check(value)
        {
            result.push_error(
                Issue::new(
                    ErrorCode::InvalidAttribute,
                    format!("Attribute '{}' on <{}>: {}", name, element.tag_name, message),
                )
                .at(element.position),
            );
        }
    }
}
