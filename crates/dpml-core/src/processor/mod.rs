/*
 * processor/mod.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * The visitor pipeline.
 */

//! Semantic processing pipeline.
//!
//! A [`Processor`] walks a [`Document`] once, depth-first pre-order, running
//! every registered [`Visitor`] on each node in priority order. The walk
//! keeps the [`ProcessingContext`]'s parent stack in step with the tree, so
//! a visitor always sees the enclosing elements of the node it is given.
//!
//! Two traversal modes produce the same visitation order:
//! - `Recursive`: one boxed future per element
//! - `Iterative`: an explicit stack of index paths, for very deep documents
//!
//! When `resolve_references` is set, a second pass resolves every
//! [`Reference`](crate::ast::Reference) node in document order, one at a
//! time, through the [`ReferenceResolver`].

pub mod tag_processor;
pub mod visitor;
pub mod visitors;

pub use tag_processor::{SemanticMetadataProcessor, TagProcessor, TagProcessorRegistry, WILDCARD_TAG};
pub use visitor::Visitor;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::ast::{Document, Node};
use crate::config::{DpmlConfig, ProcessingOptions, TraversalMode};
use crate::context::ProcessingContext;
use crate::dispatch::PriorityList;
use crate::error::{Issue, Result};
use crate::registry::TagRegistry;
use crate::resolver::ReferenceResolver;

use visitors::{AttributeValidationVisitor, DomainTagVisitor, IdValidationVisitor, InheritanceVisitor};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result of a processing run.
#[derive(Debug)]
pub struct ProcessResult {
    pub document: Document,
    pub context: ProcessingContext,
}

impl ProcessResult {
    pub fn warnings(&self) -> &[Issue] {
        self.context.warnings()
    }
}

enum Frame {
    Enter(Vec<usize>),
    Exit,
}

pub struct Processor {
    visitors: PriorityList<Arc<dyn Visitor>>,
    resolver: Option<Arc<ReferenceResolver>>,
    options: ProcessingOptions,
}

impl Processor {
    /// A processor with no visitors.
    pub fn new(options: ProcessingOptions) -> Self {
        Self {
            visitors: PriorityList::new(),
            resolver: None,
            options,
        }
    }

    /// The standard pipeline: inheritance, id validation, attribute
    /// validation and domain tag dispatch, with the default protocol
    /// handlers.
    pub fn with_defaults(
        registry: Arc<TagRegistry>,
        tag_processors: Arc<TagProcessorRegistry>,
        config: &DpmlConfig,
    ) -> Self {
        let strict = config.processing.strict_mode;
        let resolver = Arc::new(ReferenceResolver::with_default_handlers(&config.resolver));

        let mut processor = Self::new(config.processing.clone()).with_resolver(resolver.clone());
        processor.add_visitor(Arc::new(
            InheritanceVisitor::new(Some(resolver)).with_strict(strict),
        ));
        processor.add_visitor(Arc::new(IdValidationVisitor::new().with_strict(strict)));
        processor.add_visitor(Arc::new(
            AttributeValidationVisitor::new(registry).with_strict(strict),
        ));
        processor.add_visitor(Arc::new(DomainTagVisitor::new(tag_processors)));
        processor
    }

    pub fn with_resolver(mut self, resolver: Arc<ReferenceResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn add_visitor(&mut self, visitor: Arc<dyn Visitor>) {
        self.visitors.push(visitor.priority(), visitor);
    }

    /// Visitor names in execution order.
    pub fn visitor_names(&self) -> Vec<&str> {
        self.visitors.iter().map(|v| v.name()).collect()
    }

    pub fn options(&self) -> &ProcessingOptions {
        &self.options
    }

    pub fn resolver(&self) -> Option<&Arc<ReferenceResolver>> {
        self.resolver.as_ref()
    }

    /// Run the pipeline with a fresh context.
    pub async fn process(&self, document: Document) -> Result<ProcessResult> {
        let ctx = ProcessingContext::new(Arc::new(Document::default()));
        self.process_with_context(document, ctx).await
    }

    /// Run the pipeline with a caller-supplied context.
    ///
    /// The context's document snapshot is replaced with `document`, and
    /// again with the visited tree once the visitor pass finishes.
    pub async fn process_with_context(
        &self,
        mut document: Document,
        ctx: ProcessingContext,
    ) -> Result<ProcessResult> {
        let mut ctx = if self.options.strict_mode {
            ctx.with_strict(true)
        } else {
            ctx
        };
        let document_path = ctx
            .current_document_path()
            .map(ToOwned::to_owned)
            .or_else(|| document.metadata.source_path.clone());
        ctx.set_document(Arc::new(document.clone()));
        ctx.set_current_document_path(document_path);

        tracing::debug!(
            visitors = ?self.visitor_names(),
            traversal = ?self.options.traversal,
            strict = ctx.is_strict(),
            "Processing document"
        );

        for visitor in self.visitors.iter() {
            visitor.visit_document(&mut document, &mut ctx).await?;
        }

        match self.options.traversal {
            TraversalMode::Recursive => {
                for node in document.children.iter_mut() {
                    self.walk_recursive(node, &mut ctx).await?;
                }
            }
            TraversalMode::Iterative => self.walk_iterative(&mut document, &mut ctx).await?,
        }
        // Id lookups read children from the snapshot.
        ctx.set_document(Arc::new(document.clone()));

        if self.options.resolve_references {
            self.resolve_references(&mut document, &mut ctx).await?;
        }

        tracing::info!(
            ids = ctx.id_count(),
            cached_references = ctx.cache_len(),
            warnings = ctx.warnings().len(),
            "Processing complete"
        );
        Ok(ProcessResult {
            document,
            context: ctx,
        })
    }

    async fn visit_node(&self, node: &mut Node, ctx: &mut ProcessingContext) -> Result<()> {
        for visitor in self.visitors.iter() {
            tracing::trace!(visitor = visitor.name(), "Visiting node");
            match node {
                Node::Element(element) => visitor.visit_element(element, ctx).await?,
                Node::Content(content) => visitor.visit_content(content, ctx).await?,
                Node::Reference(reference) => visitor.visit_reference(reference, ctx).await?,
            }
        }
        Ok(())
    }

    fn walk_recursive<'a>(
        &'a self,
        node: &'a mut Node,
        ctx: &'a mut ProcessingContext,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.visit_node(node, ctx).await?;
            if let Node::Element(element) = node {
                ctx.push_parent(element);
                for child in element.children.iter_mut() {
                    self.walk_recursive(child, ctx).await?;
                }
                ctx.pop_parent();
            }
            Ok(())
        })
    }

    async fn walk_iterative(&self, document: &mut Document, ctx: &mut ProcessingContext) -> Result<()> {
        let mut stack: Vec<Frame> = (0..document.children.len())
            .rev()
            .map(|idx| Frame::Enter(vec![idx]))
            .collect();

        while let Some(frame) = stack.pop() {
            let path = match frame {
                Frame::Exit => {
                    ctx.pop_parent();
                    continue;
                }
                Frame::Enter(path) => path,
            };
            let Some(node) = document.node_at_mut(&path) else {
                continue;
            };

            self.visit_node(node, ctx).await?;
            if let Node::Element(element) = node {
                ctx.push_parent(element);
                stack.push(Frame::Exit);
                for idx in (0..element.children.len()).rev() {
                    let mut child = path.clone();
                    child.push(idx);
                    stack.push(Frame::Enter(child));
                }
            }
        }
        Ok(())
    }

    async fn resolve_references(
        &self,
        document: &mut Document,
        ctx: &mut ProcessingContext,
    ) -> Result<()> {
        let Some(resolver) = &self.resolver else {
            tracing::debug!("No resolver configured, skipping reference resolution");
            return Ok(());
        };

        for path in reference_paths(document) {
            let Some(Node::Reference(reference)) = document.node_at_mut(&path) else {
                continue;
            };
            match resolver.resolve(reference, ctx).await {
                Ok(resolved) => reference.resolved = Some(resolved.value),
                Err(err) if ctx.is_strict() => return Err(err.into()),
                Err(err) => ctx.add_warning(err.to_issue()),
            }
        }
        Ok(())
    }
}

/// Index paths of every reference node, in document order.
fn reference_paths(document: &Document) -> Vec<Vec<usize>> {
    let mut paths = Vec::new();
    let mut stack: Vec<(Vec<usize>, &Node)> = document
        .children
        .iter()
        .enumerate()
        .rev()
        .map(|(idx, node)| (vec![idx], node))
        .collect();

    while let Some((path, node)) = stack.pop() {
        match node {
            Node::Reference(_) => paths.push(path),
            Node::Element(element) => {
                for (idx, child) in element.children.iter().enumerate().rev() {
                    let mut child_path = path.clone();
                    child_path.push(idx);
                    stack.push((child_path, child));
                }
            }
            Node::Content(_) => {}
        }
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Content, Element, Reference};
    use crate::error::{DpmlError, ErrorCode};
    use crate::parser::DpmlParser;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Recorder {
        name: &'static str,
        priority: i32,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Visitor for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        async fn visit_element(&self, element: &mut Element, ctx: &mut ProcessingContext) -> Result<()> {
            let parent = ctx.parent().map_or("-".to_string(), |p| p.tag_name.clone());
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:{}<{}", self.name, element.tag_name, parent));
            Ok(())
        }

        async fn visit_content(&self, content: &mut Content, _ctx: &mut ProcessingContext) -> Result<()> {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:text({})", self.name, content.value));
            Ok(())
        }
    }

    fn document() -> Document {
        DpmlParser::default()
            .parse("<agent><role>r @ref</role><prompt><b>x</b></prompt></agent><tools/>")
            .ast
    }

    async fn run(traversal: TraversalMode) -> Vec<String> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut processor = Processor::new(ProcessingOptions {
            traversal,
            ..Default::default()
        });
        processor.add_visitor(Arc::new(Recorder {
            name: "late",
            priority: 1,
            log: log.clone(),
        }));
        processor.add_visitor(Arc::new(Recorder {
            name: "early",
            priority: 5,
            log: log.clone(),
        }));
        processor.process(document()).await.unwrap();
        let entries = log.lock().unwrap().clone();
        entries
    }

    #[tokio::test]
    async fn test_priority_order_per_node() {
        let log = run(TraversalMode::Recursive).await;
        assert_eq!(
            log,
            vec![
                "early:agent<-",
                "late:agent<-",
                "early:role<agent",
                "late:role<agent",
                "early:text(r )",
                "late:text(r )",
                "early:prompt<agent",
                "late:prompt<agent",
                "early:b<prompt",
                "late:b<prompt",
                "early:text(x)",
                "late:text(x)",
                "early:tools<-",
                "late:tools<-",
            ]
        );
    }

    #[tokio::test]
    async fn test_iterative_matches_recursive() {
        assert_eq!(
            run(TraversalMode::Iterative).await,
            run(TraversalMode::Recursive).await
        );
    }

    #[tokio::test]
    async fn test_iterative_handles_deep_documents() {
        let mut node = Element::new("leaf");
        for _ in 0..2_000 {
            node = Element::new("wrap").with_child(node);
        }
        let processor = Processor::new(ProcessingOptions {
            traversal: TraversalMode::Iterative,
            ..Default::default()
        });
        let result = processor
            .process(Document::new(vec![Node::Element(node)]))
            .await
            .unwrap();
        assert_eq!(result.context.depth(), 0);
        assert_eq!(result.document.all_elements().len(), 2_001);
        crate::ast::NodePool::new().recycle(result.document);
    }

    #[test]
    fn test_reference_paths_in_document_order() {
        let document = Document::new(vec![
            Element::new("a")
                .with_child(Reference::new("id", "one"))
                .with_child(Element::new("b").with_child(Reference::new("id", "two")))
                .into(),
            Node::Reference(Reference::new("id", "three")),
        ]);
        assert_eq!(reference_paths(&document), vec![vec![0, 0], vec![0, 1, 0], vec![1]]);
    }

    #[tokio::test]
    async fn test_default_pipeline_order() {
        let processor = Processor::with_defaults(
            Arc::new(TagRegistry::new()),
            Arc::new(TagProcessorRegistry::new()),
            &DpmlConfig::default(),
        );
        assert_eq!(
            processor.visitor_names(),
            vec!["inheritance", "id-validation", "attribute-validation", "domain-tag"]
        );
    }

    #[tokio::test]
    async fn test_resolution_pass_strict_and_loose() {
        let source = "<agent><role id=\"persona\">kind</role><prompt>Be @persona and @missing</prompt></agent>";
        let mut config = DpmlConfig::default();
        config.processing.resolve_references = true;
        let processor = Processor::with_defaults(
            Arc::new(TagRegistry::new()),
            Arc::new(TagProcessorRegistry::new()),
            &config,
        );

        let result = processor
            .process(DpmlParser::default().parse(source).ast)
            .await
            .unwrap();
        let references = result.document.references();
        assert!(references[0].is_resolved());
        assert!(!references[1].is_resolved());
        assert_eq!(result.warnings().len(), 1);
        assert_eq!(result.warnings()[0].code, ErrorCode::ReferenceNotFound);

        config.processing.strict_mode = true;
        let strict = Processor::with_defaults(
            Arc::new(TagRegistry::new()),
            Arc::new(TagProcessorRegistry::new()),
            &config,
        );
        let err = strict
            .process(DpmlParser::default().parse(source).ast)
            .await
            .unwrap_err();
        assert!(matches!(err, DpmlError::Reference(_)));
    }
}
