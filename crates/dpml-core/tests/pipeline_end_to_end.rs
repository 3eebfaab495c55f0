/*
 * tests/pipeline_end_to_end.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Parse, process and transform a document in one pass.
 */

mod common;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dpml_core::processor::{SemanticMetadataProcessor, WILDCARD_TAG};
use dpml_core::{
    AttributeDefinition, AttributeType, DpmlConfig, DpmlError, Element, ErrorCode,
    JsonOutputAdapter, OutputAdapter, Processor, ProcessingContext, ResolvedValue, TagDefinition,
    TagProcessorRegistry, TagRegistry, TransformContext, TransformOptions, TransformProcessor,
    TransformRegistry, Transformer, TraversalMode, Visitor,
};
use serde_json::{Value, json};

const AGENT: &str = r#"<agent version="1.0">
  <role id="persona" tone="calm">A careful reviewer</role>
  <role extends="persona"/>
  <prompt>Act as @persona, please.</prompt>
</agent>"#;

struct RenderText;

#[async_trait]
impl TransformProcessor for RenderText {
    fn name(&self) -> &str {
        "render-text"
    }

    async fn process(&self, mut element: Element, _ctx: &TransformContext) -> anyhow::Result<Element> {
        let text = element.text_content();
        element.meta_mut().insert("text".into(), json!(text));
        Ok(element)
    }
}

struct RecordPath;

#[async_trait]
impl TransformProcessor for RecordPath {
    fn name(&self) -> &str {
        "record-path"
    }

    async fn process(&self, mut element: Element, ctx: &TransformContext) -> anyhow::Result<Element> {
        element.meta_mut().insert("path".into(), json!(ctx.path().join("/")));
        Ok(element)
    }
}

#[tokio::test]
async fn test_parse_process_transform() {
    common::init_tracing();

    let document = common::parse(AGENT);
    assert_eq!(document.metadata.version.as_deref(), Some("1.0"));

    let mut config = DpmlConfig::default();
    config.processing.resolve_references = true;
    let mut tag_processors = TagProcessorRegistry::new();
    tag_processors.register(WILDCARD_TAG, Arc::new(SemanticMetadataProcessor));
    let processor = Processor::with_defaults(
        Arc::new(TagRegistry::new()),
        Arc::new(tag_processors),
        &config,
    );

    let processed = processor.process(document).await.unwrap();
    assert!(processed.warnings().is_empty(), "{:?}", processed.warnings());
    assert_eq!(processed.context.lookup_id("persona").unwrap().tag_name, "role");

    let agent = processed.document.elements().next().unwrap();
    let roles: Vec<&Element> = agent.child_elements().filter(|e| e.tag_name == "role").collect();
    assert_eq!(roles[1].attribute("tone"), Some("calm"));
    assert_eq!(roles[1].id(), None);
    assert_eq!(roles[1].text_content(), "A careful reviewer");
    assert_eq!(
        roles[1].metadata.as_ref().unwrap().get("inheritedFrom"),
        Some(&json!("persona"))
    );
    assert_eq!(
        agent.metadata.as_ref().unwrap()["semantic"]["tagName"],
        json!("agent")
    );

    let reference = processed.document.references()[0];
    assert!(matches!(&reference.resolved, Some(ResolvedValue::Element(role))
        if role.attribute("tone") == Some("calm")));

    let mut transforms = TransformRegistry::new();
    transforms.register("prompt", Arc::new(RenderText));
    transforms.register_wildcard(Arc::new(RecordPath));
    let transformer = Transformer::new(Arc::new(transforms), TransformOptions::default());
    let transformed = transformer.transform_processed(processed).await.unwrap();

    let output = JsonOutputAdapter::new().adapt(&transformed).unwrap();
    let prompt = &output[0]["children"][2];
    assert_eq!(prompt["tag"], json!("prompt"));
    assert_eq!(prompt["meta"]["text"], json!("Act as @id:persona, please."));
    assert_eq!(prompt["meta"]["path"], json!("agent/prompt"));
    assert_eq!(prompt["children"][1]["reference"], json!("id:persona"));
    assert_eq!(prompt["children"][1]["resolved"]["tag"], json!("role"));
    assert_eq!(output[0]["meta"]["path"], json!("agent"));
}

#[tokio::test]
async fn test_duplicate_id_loose_warns_strict_fails() {
    common::init_tracing();
    let source = r#"<agent><role id="a">one</role><role id="a">two</role></agent>"#;

    let loose = common::default_processor(&DpmlConfig::default())
        .process(common::parse(source))
        .await
        .unwrap();
    assert_eq!(loose.warnings().len(), 1);
    assert_eq!(loose.warnings()[0].code, ErrorCode::DuplicateId);
    assert_eq!(loose.context.lookup_id("a").unwrap().text_content(), "one");

    let err = common::default_processor(&common::strict_config())
        .process(common::parse(source))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::DuplicateId);
    assert!(matches!(err, DpmlError::Validation(_)));
}

#[tokio::test]
async fn test_document_mode_attribute_enables_strict() {
    let source = r#"<agent mode="strict"><role id="a"/><role id="a"/></agent>"#;
    let err = common::default_processor(&DpmlConfig::default())
        .process(common::parse(source))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::DuplicateId);
}

#[tokio::test]
async fn test_attribute_validation_with_defaults() {
    common::init_tracing();
    let mut registry = TagRegistry::new();
    registry.register(
        "agent",
        TagDefinition::new()
            .with_attribute("name", AttributeDefinition::new().required())
            .with_attribute(
                "temperature",
                AttributeDefinition::new()
                    .with_type(AttributeType::Number)
                    .with_default("0.7"),
            )
            .with_allowed_children(["prompt"]),
    );
    registry.register("prompt", TagDefinition::new());
    let registry = Arc::new(registry);

    let processor = Processor::with_defaults(
        registry.clone(),
        Arc::new(TagProcessorRegistry::new()),
        &DpmlConfig::default(),
    );
    let result = processor
        .process(common::parse("<agent><prompt>hi</prompt></agent>"))
        .await
        .unwrap();
    let codes: Vec<ErrorCode> = result.warnings().iter().map(|w| w.code).collect();
    assert_eq!(codes, vec![ErrorCode::MissingRequiredAttribute]);
    let agent = result.document.elements().next().unwrap();
    assert_eq!(agent.attribute("temperature"), Some("0.7"));

    let strict = Processor::with_defaults(
        registry,
        Arc::new(TagProcessorRegistry::new()),
        &common::strict_config(),
    );
    let err = strict
        .process(common::parse(r#"<agent name="a" temperature="hot"/>"#))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidAttribute);
}

#[tokio::test]
async fn test_circular_inheritance() {
    let source = r#"<agent><role id="x" extends="y"/><role id="y" extends="x"/></agent>"#;

    let loose = common::default_processor(&DpmlConfig::default())
        .process(common::parse(source))
        .await
        .unwrap();
    assert!(!loose.warnings().is_empty());
    assert!(
        loose
            .warnings()
            .iter()
            .all(|w| w.code == ErrorCode::CircularReference)
    );

    let err = common::default_processor(&common::strict_config())
        .process(common::parse(source))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::CircularReference);
}

#[tokio::test]
async fn test_inheritance_chain_folds_from_root() {
    let source = r#"<agent>
  <role id="base" tone="calm" lang="en">Base</role>
  <role id="mid" extends="base" tone="firm"/>
  <role extends="mid" lang="fr"/>
</agent>"#;
    let result = common::default_processor(&DpmlConfig::default())
        .process(common::parse(source))
        .await
        .unwrap();
    assert!(result.warnings().is_empty(), "{:?}", result.warnings());

    let agent = result.document.elements().next().unwrap();
    let leaf = agent.child_elements().last().unwrap();
    assert_eq!(leaf.attribute("tone"), Some("firm"));
    assert_eq!(leaf.attribute("lang"), Some("fr"));
    assert_eq!(leaf.text_content(), "Base");
}

#[tokio::test]
async fn test_extends_with_nested_ids_is_valid_in_strict_mode() {
    let source = r#"<agent><role id="base"><prompt id="p">hello</prompt></role><role extends="base"/></agent>"#;

    let result = common::default_processor(&common::strict_config())
        .process(common::parse(source))
        .await
        .unwrap();
    assert!(result.warnings().is_empty(), "{:?}", result.warnings());

    let agent = result.document.elements().next().unwrap();
    let derived = agent.child_elements().last().unwrap();
    let inherited = derived.child_elements().next().unwrap();
    assert_eq!(inherited.tag_name, "prompt");
    assert_eq!(inherited.id(), None);
    assert_eq!(inherited.text_content(), "hello");
    assert_eq!(result.context.ids().collect::<Vec<_>>(), vec!["base", "p"]);

    let loose = common::default_processor(&DpmlConfig::default())
        .process(common::parse(source))
        .await
        .unwrap();
    assert!(loose.warnings().is_empty(), "{:?}", loose.warnings());
}

#[tokio::test]
async fn test_deep_document_processes_iteratively() {
    const DEPTH: usize = 20_000;
    let source = format!("{}{}", "<a>".repeat(DEPTH), "</a>".repeat(DEPTH));

    let mut config = DpmlConfig::default();
    config.processing.traversal = TraversalMode::Iterative;
    let result = common::default_processor(&config)
        .process(common::parse(&source))
        .await;
    let Ok(result) = result else {
        panic!("deep document failed to process");
    };

    let mut depth = 0;
    let mut current = result.document.elements().next();
    while let Some(element) = current {
        depth += 1;
        current = element.child_elements().next();
    }
    assert_eq!(depth, DEPTH);
}

struct Trace {
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Visitor for Trace {
    fn name(&self) -> &str {
        "trace"
    }

    async fn visit_element(&self, element: &mut Element, ctx: &mut ProcessingContext) -> dpml_core::Result<()> {
        let line = format!("{}@{}", element.tag_name, ctx.depth());
        self.log.lock().unwrap().push(line);
        element.metadata_mut().insert("depth".into(), Value::from(ctx.depth()));
        Ok(())
    }
}

async fn run_with(traversal: TraversalMode) -> (Vec<String>, dpml_core::Document) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut config = DpmlConfig::default();
    config.processing.traversal = traversal;
    let mut processor = common::default_processor(&config);
    processor.add_visitor(Arc::new(Trace { log: log.clone() }));

    let source = "<a><b><c/><d>t @x</d></b><e/></a><f/>";
    let result = processor.process(common::parse(source)).await.unwrap();
    let order = log.lock().unwrap().clone();
    (order, result.document)
}

#[tokio::test]
async fn test_traversal_modes_agree() {
    let (recursive_order, recursive_doc) = run_with(TraversalMode::Recursive).await;
    let (iterative_order, iterative_doc) = run_with(TraversalMode::Iterative).await;

    assert_eq!(
        recursive_order,
        vec!["a@0", "b@1", "c@2", "d@2", "e@1", "f@0"]
    );
    assert_eq!(iterative_order, recursive_order);
    assert_eq!(iterative_doc, recursive_doc);
}
