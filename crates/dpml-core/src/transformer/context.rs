/*
 * transformer/context.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Immutable nested contexts for the transform chain.
 */

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::ast::Element;
use crate::context::ProcessingContext;

#[derive(Debug)]
struct Frame {
    segment: String,
    /// Result of the element one level up, as it stood when this frame
    /// was created.
    parent_result: Option<Element>,
    parent: Option<Arc<Frame>>,
    depth: usize,
}

/// Scope handed to transform processors.
///
/// Contexts are never mutated. [`child`](Self::child) and
/// [`with_variable`](Self::with_variable) return a new context that shares
/// the unchanged parts with its parent, so sibling subtrees never observe
/// each other's scopes.
#[derive(Clone)]
pub struct TransformContext {
    frame: Option<Arc<Frame>>,
    variables: Arc<HashMap<String, Value>>,
    processing: Option<Arc<ProcessingContext>>,
    max_ancestor_depth: usize,
}

impl TransformContext {
    pub fn new(max_ancestor_depth: usize) -> Self {
        Self {
            frame: None,
            variables: Arc::new(HashMap::new()),
            processing: None,
            max_ancestor_depth,
        }
    }

    /// Attach the (read-only) outcome of semantic processing.
    pub fn with_processing_context(mut self, processing: Arc<ProcessingContext>) -> Self {
        self.processing = Some(processing);
        self
    }

    pub fn processing_context(&self) -> Option<&ProcessingContext> {
        self.processing.as_deref()
    }

    /// A nested scope one path segment deeper.
    ///
    /// `parent_result` is the enclosing element's latest result; it becomes
    /// reachable through [`parent_result`](Self::parent_result).
    pub fn child(&self, segment: impl Into<String>, parent_result: Option<Element>) -> Self {
        let depth = self.depth() + 1;
        Self {
            frame: Some(Arc::new(Frame {
                segment: segment.into(),
                parent_result,
                parent: self.frame.clone(),
                depth,
            })),
            variables: self.variables.clone(),
            processing: self.processing.clone(),
            max_ancestor_depth: self.max_ancestor_depth,
        }
    }

    /// A copy of this context with one variable set.
    pub fn with_variable(&self, name: impl Into<String>, value: Value) -> Self {
        let mut variables = (*self.variables).clone();
        variables.insert(name.into(), value);
        Self {
            variables: Arc::new(variables),
            ..self.clone()
        }
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn variables(&self) -> &HashMap<String, Value> {
        &self.variables
    }

    pub fn depth(&self) -> usize {
        self.frame.as_ref().map_or(0, |f| f.depth)
    }

    pub fn max_ancestor_depth(&self) -> usize {
        self.max_ancestor_depth
    }

    /// Segment of the element this context was created for.
    pub fn segment(&self) -> Option<&str> {
        self.frame.as_deref().map(|f| f.segment.as_str())
    }

    /// Path segments from the outermost scope inward.
    pub fn path(&self) -> Vec<&str> {
        let mut segments: Vec<&str> = self.frames().map(|f| f.segment.as_str()).collect();
        segments.reverse();
        segments
    }

    /// An ancestor's result counted from the innermost: `0` is the
    /// immediate parent.
    pub fn parent_result(&self, index_from_end: usize) -> Option<&Element> {
        if index_from_end >= self.max_ancestor_depth {
            return None;
        }
        self.frames().nth(index_from_end)?.parent_result.as_ref()
    }

    /// The nearest ancestor whose path segment is `tag_name`.
    pub fn ancestor_result(&self, tag_name: &str) -> Option<&Element> {
        let mut below: Option<&Frame> = None;
        for frame in self.frames().take(self.max_ancestor_depth + 1) {
            if let Some(child) = below
                && frame.segment.eq_ignore_ascii_case(tag_name)
            {
                return child.parent_result.as_ref();
            }
            below = Some(frame);
        }
        None
    }

    fn frames(&self) -> impl Iterator<Item = &Frame> {
        std::iter::successors(self.frame.as_deref(), |f| f.parent.as_deref())
    }
}

impl Default for TransformContext {
    fn default() -> Self {
        Self::new(crate::config::TransformOptions::default().max_ancestor_depth)
    }
}

impl fmt::Debug for TransformContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformContext")
            .field("path", &self.path())
            .field("variables", &self.variables)
            .field("max_ancestor_depth", &self.max_ancestor_depth)
            .finish()
    }
}
