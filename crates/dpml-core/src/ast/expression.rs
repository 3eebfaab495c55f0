/*
 * ast/expression.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Attribute values that are opaque `${...}` expressions.
 */

use serde::{Deserialize, Serialize};

/// An attribute value classified as literal text or an opaque expression.
///
/// Expressions are recognized but never evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum AttributeValue {
    Literal(String),
    /// The text between `${` and `}`.
    Expression(String),
}

impl AttributeValue {
    /// Classify a raw attribute value.
    ///
    /// ```
    /// use dpml_core::ast::AttributeValue;
    ///
    /// assert_eq!(AttributeValue::parse("${user.name}"), AttributeValue::Expression("user.name".into()));
    /// assert_eq!(AttributeValue::parse("gpt-4"), AttributeValue::Literal("gpt-4".into()));
    /// ```
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed
            .strip_prefix("${")
            .and_then(|rest| rest.strip_suffix('}'))
        {
            Some(inner) => AttributeValue::Expression(inner.trim().to_string()),
            None => AttributeValue::Literal(raw.to_string()),
        }
    }

    pub fn is_expression(&self) -> bool {
        matches!(self, AttributeValue::Expression(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            AttributeValue::Literal(s) | AttributeValue::Expression(s) => s,
        }
    }
}

/// Whether a raw value has the `${...}` form.
pub fn is_expression(raw: &str) -> bool {
    AttributeValue::parse(raw).is_expression()
}
