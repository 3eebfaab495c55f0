/*
 * processor/visitors/inheritance.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * `extends` resolution and base/child merging.
 */

//! Inheritance.
//!
//! An element with `extends="target"` is merged with its base before any
//! other visitor sees it. Targets are either a bare id (optionally written
//! `#id`) looked up in the current document, or an external
//! `file:`/`http:`/`https:` location with an optional `#id` fragment. An
//! external base is the element with that id in the fetched document, or
//! its first element when there is no fragment.
//!
//! Bases may themselves extend other bases; the chain is followed to its
//! root and merged from the root down. A chain that revisits an element is
//! a `CIRCULAR_REFERENCE`.
//!
//! Merge rules:
//! - the child's attributes win over the base's; the base's `id` is never
//!   inherited, and neither are the ids inside inherited children
//! - children follow [`ChildrenPolicy`]
//! - inherited nodes take the child's source span, and the child's
//!   metadata records `inheritedFrom`

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::ast::{Attributes, Document, Element, Node, Reference, ResolvedValue};
use crate::context::ProcessingContext;
use crate::error::{DpmlError, ErrorCode, Issue, Result};
use crate::parser::DpmlParser;
use crate::processor::Visitor;
use crate::resolver::ReferenceResolver;

pub const INHERITANCE_PRIORITY: i32 = 100;

/// Longest `extends` chain followed before giving up.
const MAX_CHAIN: usize = 32;

/// How a child's children combine with its base's.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChildrenPolicy {
    /// The child's children always replace the base's.
    Replace,
    /// The base's children are used only when the child has none.
    #[default]
    InheritWhenEmpty,
    /// The base's children come first, then the child's.
    Append,
}

pub struct InheritanceVisitor {
    resolver: Option<Arc<ReferenceResolver>>,
    policy: ChildrenPolicy,
    strict: bool,
}

/// Where a bare id is looked up.
enum Scope {
    Current,
    External(Arc<Document>),
}

/// A parsed `extends` value.
#[derive(Debug, Clone, PartialEq)]
enum Target {
    Id(String),
    External { reference: Reference, fragment: Option<String> },
}

impl Target {
    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        for scheme in ["file", "http", "https"] {
            if let Some(rest) = raw.strip_prefix(scheme).and_then(|r| r.strip_prefix(':')) {
                if rest.is_empty() {
                    return None;
                }
                let (path, fragment) = match rest.split_once('#') {
                    Some((path, fragment)) => (path, Some(fragment.to_string())),
                    None => (rest, None),
                };
                return Some(Target::External {
                    reference: Reference::new(scheme, path),
                    fragment,
                });
            }
        }
        let id = raw.strip_prefix('#').unwrap_or(raw);
        (!id.is_empty()).then(|| Target::Id(id.to_string()))
    }
}

impl InheritanceVisitor {
    pub fn new(resolver: Option<Arc<ReferenceResolver>>) -> Self {
        Self {
            resolver,
            policy: ChildrenPolicy::default(),
            strict: false,
        }
    }

    pub fn with_policy(mut self, policy: ChildrenPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Collect the chain of bases, nearest first.
    async fn collect_chain(
        &self,
        element: &Element,
        extends: &str,
        ctx: &mut ProcessingContext,
    ) -> std::result::Result<Vec<Element>, Issue> {
        let mut chain = Vec::new();
        let mut seen_ids: HashSet<String> = element.id().map(str::to_string).into_iter().collect();
        let mut seen_targets = HashSet::new();
        let mut scope = Scope::Current;
        let mut next = Some(extends.to_string());

        while let Some(raw) = next.take() {
            let circular = || {
                Issue::new(
                    ErrorCode::CircularReference,
                    format!(
                        "Circular inheritance: <{}> reaches '{}' again",
                        element.tag_name, raw
                    ),
                )
                .at(element.position)
            };
            if chain.len() >= MAX_CHAIN || !seen_targets.insert(raw.clone()) {
                return Err(circular());
            }

            let target = Target::parse(&raw).ok_or_else(|| {
                Issue::new(
                    ErrorCode::InvalidReference,
                    format!("Invalid extends value '{}' on <{}>", raw, element.tag_name),
                )
                .at(element.position)
            })?;
            let (base, base_scope) = self.find_base(&target, &scope, element, ctx).await?;

            if let Some(id) = base.id()
                && !seen_ids.insert(id.to_string())
            {
                return Err(circular());
            }
            next = base.attribute("extends").map(str::to_string);
            if let Some(base_scope) = base_scope {
                scope = base_scope;
            }
            chain.push(base);
        }
        Ok(chain)
    }

    async fn find_base(
        &self,
        target: &Target,
        scope: &Scope,
        element: &Element,
        ctx: &mut ProcessingContext,
    ) -> std::result::Result<(Element, Option<Scope>), Issue> {
        let not_found = |what: &str| {
            Issue::new(
                ErrorCode::ReferenceNotFound,
                format!("Base '{}' for <{}> not found", what, element.tag_name),
            )
            .at(element.position)
        };

        match target {
            Target::Id(id) => {
                let found = match scope {
                    Scope::Current => ctx
                        .document()
                        .find_by_id(id)
                        .or_else(|| ctx.lookup_id(id))
                        .cloned(),
                    Scope::External(document) => document.find_by_id(id).cloned(),
                };
                found.map(|base| (base, None)).ok_or_else(|| not_found(id))
            }
            Target::External {
                reference,
                fragment,
            } => {
                let Some(resolver) = &self.resolver else {
                    return Err(Issue::new(
                        ErrorCode::InvalidReference,
                        format!(
                            "<{}> extends external '{}' but no resolver is configured",
                            element.tag_name,
                            reference.cache_key()
                        ),
                    )
                    .at(element.position));
                };
                let resolved = resolver
                    .resolve(&reference.clone().with_position(element.position), ctx)
                    .await
                    .map_err(|e| e.to_issue())?;

                let document = match resolved.value {
                    ResolvedValue::Element(base) => Document::new(vec![Node::Element(*base)]),
                    ResolvedValue::Text(text) => {
                        let parsed = DpmlParser::default().parse(&text);
                        if let Some(issue) = parsed.errors.into_iter().next() {
                            return Err(Issue::new(
                                ErrorCode::InvalidReference,
                                format!("Base document {} is invalid: {}", reference.cache_key(), issue.message),
                            )
                            .at(element.position));
                        }
                        parsed.ast
                    }
                    ResolvedValue::Json(_) => {
                        return Err(Issue::new(
                            ErrorCode::InvalidReference,
                            format!("Base {} is JSON, not markup", reference.cache_key()),
                        )
                        .at(element.position));
                    }
                };

                let base = match fragment {
                    Some(id) => document.find_by_id(id).cloned(),
                    None => document.elements().next().cloned(),
                };
                let base = base.ok_or_else(|| not_found(&reference.cache_key()))?;
                Ok((base, Some(Scope::External(Arc::new(document)))))
            }
        }
    }
}

/// Merge `base` into `child` in place.
pub fn merge_elements(base: &Element, child: &mut Element, policy: ChildrenPolicy) {
    let mut attributes = Attributes::new();
    for (name, value) in &base.attributes {
        if name != "id" && name != "extends" {
            attributes.insert(name.clone(), value.clone());
        }
    }
    for (name, value) in std::mem::take(&mut child.attributes) {
        attributes.insert(name, value);
    }
    child.attributes = attributes;

    let inherited = || {
        base.children.iter().cloned().map(|mut node| {
            node.reposition(child.position);
            strip_ids(&mut node);
            node
        })
    };
    match policy {
        ChildrenPolicy::Replace => {}
        ChildrenPolicy::InheritWhenEmpty => {
            if child.children.is_empty() {
                child.children = inherited().collect();
            }
        }
        ChildrenPolicy::Append => {
            let own = std::mem::take(&mut child.children);
            child.children = inherited().chain(own).collect();
        }
    }
}

/// Remove `id` from a node and its whole subtree.
fn strip_ids(node: &mut Node) {
    let mut stack = vec![node];
    while let Some(node) = stack.pop() {
        if let Node::Element(element) = node {
            element.attributes.remove("id");
            stack.extend(element.children.iter_mut());
        }
    }
}

#[async_trait]
impl Visitor for InheritanceVisitor {
    fn name(&self) -> &str {
        "inheritance"
    }

    fn priority(&self) -> i32 {
        INHERITANCE_PRIORITY
    }

    async fn visit_element(&self, element: &mut Element, ctx: &mut ProcessingContext) -> Result<()> {
        let Some(extends) = element.attribute("extends").map(str::to_string) else {
            return Ok(());
        };

        let mut chain = match self.collect_chain(element, &extends, ctx).await {
            Ok(chain) => chain,
            Err(issue) => {
                if self.strict || ctx.is_strict() {
                    return Err(DpmlError::Validation(issue));
                }
                ctx.add_warning(issue);
                return Ok(());
            }
        };

        // Fold from the root of the chain down to the nearest base.
        let Some(mut effective) = chain.pop() else {
            return Ok(());
        };
        while let Some(mut nearer) = chain.pop() {
            merge_elements(&effective, &mut nearer, self.policy);
            effective = nearer;
        }
        merge_elements(&effective, element, self.policy);

        tracing::debug!(tag = %element.tag_name, extends = %extends, "Applied inheritance");
        element
            .metadata_mut()
            .insert("inheritedFrom".to_string(), json!(extends));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Content;
    use dpml_source_map::{Location, Range};

    fn span(start: usize, end: usize) -> Range {
        Range::new(Location::new(start, 1, start + 1), Location::new(end, 1, end + 1))
    }

    #[test]
    fn test_target_forms() {
        assert_eq!(Target::parse("base"), Some(Target::Id("base".into())));
        assert_eq!(Target::parse("#base"), Some(Target::Id("base".into())));
        assert_eq!(Target::parse(""), None);
        assert_eq!(Target::parse("file:"), None);
        assert_eq!(
            Target::parse("file:./base.dpml#assistant"),
            Some(Target::External {
                reference: Reference::new("file", "./base.dpml"),
                fragment: Some("assistant".into()),
            })
        );
        assert!(matches!(
            Target::parse("https://x.io/a.dpml"),
            Some(Target::External { fragment: None, .. })
        ));
    }

    #[test]
    fn test_merge_child_attributes_win() {
        let base = Element::new("role")
            .with_attribute("id", "base")
            .with_attribute("tone", "formal")
            .with_attribute("lang", "en");
        let mut child = Element::new("role")
            .with_attribute("id", "child")
            .with_attribute("extends", "base")
            .with_attribute("tone", "casual");
        merge_elements(&base, &mut child, ChildrenPolicy::Replace);

        assert_eq!(child.attribute("id"), Some("child"));
        assert_eq!(child.attribute("tone"), Some("casual"));
        assert_eq!(child.attribute("lang"), Some("en"));
    }

    #[test]
    fn test_inherited_descendants_lose_ids() {
        let base = Element::new("role").with_attribute("id", "base").with_child(
            Element::new("prompt")
                .with_attribute("id", "p")
                .with_attribute("lang", "en")
                .with_child(Element::new("example").with_attribute("id", "ex")),
        );
        let mut child = Element::new("role").with_attribute("extends", "base");
        merge_elements(&base, &mut child, ChildrenPolicy::Append);

        let prompt = child.child_elements().next().unwrap();
        assert_eq!(prompt.id(), None);
        assert_eq!(prompt.attribute("lang"), Some("en"));
        assert_eq!(prompt.child_elements().next().unwrap().id(), None);
        // The base itself is untouched.
        assert_eq!(base.child_elements().next().unwrap().id(), Some("p"));
    }

    #[test]
    fn test_children_policies() {
        let base = Element::new("prompt").with_child(Content::new("base text", span(0, 9)));
        let own = || Element::new("prompt").with_position(span(20, 40));

        let mut empty = own();
        merge_elements(&base, &mut empty, ChildrenPolicy::InheritWhenEmpty);
        assert_eq!(empty.children.len(), 1);
        assert_eq!(empty.children[0].as_content().unwrap().position, span(20, 40));

        let mut replaced = own();
        merge_elements(&base, &mut replaced, ChildrenPolicy::Replace);
        assert!(replaced.children.is_empty());

        let mut appended = own().with_child(Content::new("mine", span(25, 29)));
        merge_elements(&base, &mut appended, ChildrenPolicy::Append);
        let texts: Vec<_> = appended
            .children
            .iter()
            .map(|n| n.as_content().unwrap().value.as_str())
            .collect();
        assert_eq!(texts, vec!["base text", "mine"]);

        let mut nonempty = own().with_child(Content::new("mine", span(25, 29)));
        merge_elements(&base, &mut nonempty, ChildrenPolicy::InheritWhenEmpty);
        assert_eq!(nonempty.children.len(), 1);
        assert_eq!(nonempty.children[0].as_content().unwrap().value, "mine");
    }
}
