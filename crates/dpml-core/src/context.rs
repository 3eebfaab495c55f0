/*
 * context.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Per-run mutable state for the processing pipeline.
 */

//! Processing context.
//!
//! A [`ProcessingContext`] belongs to exactly one processing run. It owns the
//! id map, the resolved-reference cache, the parent-element stack and the
//! variable bag; nothing else in the pipeline keeps mutable shared state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use hashlink::LinkedHashMap;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::ast::{Document, DocumentMetadata, DocumentMode, Element, ResolvedValue};
use crate::error::Issue;

/// A cache entry: the resolved value and when it was stored.
#[derive(Debug, Clone)]
pub struct CachedReference {
    pub value: ResolvedValue,
    pub resolved_at: SystemTime,
}

#[derive(Debug, Clone)]
pub struct ProcessingContext {
    document: Arc<Document>,
    metadata: DocumentMetadata,
    strict: bool,
    id_map: LinkedHashMap<String, Element>,
    resolved_references: HashMap<String, CachedReference>,
    parents: Vec<Element>,
    variables: HashMap<String, Value>,
    current_document_path: Option<PathBuf>,
    warnings: Vec<Issue>,
    cancellation: CancellationToken,
}

impl ProcessingContext {
    pub fn new(document: Arc<Document>) -> Self {
        let metadata = document.metadata.clone();
        let current_document_path = metadata.source_path.clone();
        Self {
            document,
            metadata,
            strict: false,
            id_map: LinkedHashMap::new(),
            resolved_references: HashMap::new(),
            parents: Vec::new(),
            variables: HashMap::new(),
            current_document_path,
            warnings: Vec::new(),
            cancellation: CancellationToken::new(),
        }
    }

    /// Force strict mode regardless of document metadata.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_document_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.current_document_path = Some(path.into());
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Snapshot of the document. The processor takes it when the run starts
    /// and again once the visitor pass is done.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Replace the snapshot, keeping caches and the id map.
    pub fn set_document(&mut self, document: Arc<Document>) {
        self.metadata = document.metadata.clone();
        self.document = document;
    }

    pub fn metadata(&self) -> &DocumentMetadata {
        &self.metadata
    }

    /// Strict when forced on or when the document declares `mode="strict"`.
    pub fn is_strict(&self) -> bool {
        self.strict || self.metadata.mode == DocumentMode::Strict
    }

    pub fn current_document_path(&self) -> Option<&Path> {
        self.current_document_path.as_deref()
    }

    pub fn set_current_document_path(&mut self, path: Option<PathBuf>) {
        self.current_document_path = path;
    }

    /// Directory of the document being processed, if known.
    pub fn current_document_dir(&self) -> Option<&Path> {
        self.current_document_path.as_deref().and_then(Path::parent)
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    // Id map

    /// Register an element under `id`.
    ///
    /// Only a childless copy is kept; lookups read children from the
    /// document snapshot. Returns `false` and leaves the map unchanged when
    /// the id is taken.
    pub fn register_id(&mut self, id: &str, element: &Element) -> bool {
        if self.id_map.contains_key(id) {
            return false;
        }
        self.id_map.insert(id.to_string(), element.shallow_clone());
        true
    }

    /// The element registered under `id`, with its children when the
    /// snapshot holds it.
    pub fn lookup_id(&self, id: &str) -> Option<&Element> {
        let registered = self.id_map.get(id)?;
        self.document.find_by_id(id).or(Some(registered))
    }

    /// Registered ids in registration order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.id_map.keys().map(String::as_str)
    }

    pub fn id_count(&self) -> usize {
        self.id_map.len()
    }

    pub fn reset_id_map(&mut self) {
        self.id_map.clear();
    }

    // Reference cache

    pub fn cached_reference(&self, key: &str) -> Option<&CachedReference> {
        self.resolved_references.get(key)
    }

    pub fn cache_reference(&mut self, key: impl Into<String>, value: ResolvedValue) {
        self.resolved_references.insert(
            key.into(),
            CachedReference {
                value,
                resolved_at: SystemTime::now(),
            },
        );
    }

    pub fn clear_cache(&mut self) {
        self.resolved_references.clear();
    }

    pub fn cache_len(&self) -> usize {
        self.resolved_references.len()
    }

    // Parent stack

    /// Push a childless copy of `element`.
    pub fn push_parent(&mut self, element: &Element) {
        self.parents.push(element.shallow_clone());
    }

    pub fn pop_parent(&mut self) -> Option<Element> {
        self.parents.pop()
    }

    /// The innermost enclosing element.
    pub fn parent(&self) -> Option<&Element> {
        self.parents.last()
    }

    /// Enclosing elements, innermost first.
    pub fn ancestors(&self) -> impl Iterator<Item = &Element> {
        self.parents.iter().rev()
    }

    pub fn depth(&self) -> usize {
        self.parents.len()
    }

    // Variables

    pub fn set_variable(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn variables(&self) -> &HashMap<String, Value> {
        &self.variables
    }

    // Warnings

    pub fn add_warning(&mut self, issue: Issue) {
        tracing::warn!(code = %issue.code, "{}", issue.message);
        self.warnings.push(issue);
    }

    pub fn warnings(&self) -> &[Issue] {
        &self.warnings
    }

    pub fn take_warnings(&mut self) -> Vec<Issue> {
        std::mem::take(&mut self.warnings)
    }

    /// Clear all per-run state. The document snapshot and strictness are kept.
    pub fn reset(&mut self) {
        self.id_map.clear();
        self.resolved_references.clear();
        self.parents.clear();
        self.variables.clear();
        self.warnings.clear();
    }
}
