/*
 * tests/reference_resolution.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Reference resolution through the processing pipeline.
 */

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dpml_core::{
    DpmlConfig, DpmlError, DpmlParser, ErrorCode, ProcessingContext, ProcessingOptions, Processor,
    ProtocolError, ProtocolHandler, Reference, ReferenceResolver, ResolvedValue,
};
use serde_json::json;

fn resolving_config(base_dir: Option<&std::path::Path>) -> DpmlConfig {
    let mut config = DpmlConfig::default();
    config.processing.resolve_references = true;
    config.resolver.base_dir = base_dir.map(ToOwned::to_owned);
    config
}

#[tokio::test]
async fn test_file_references_from_base_dir() {
    common::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("notes.md"), "Be concise.").unwrap();
    std::fs::write(dir.path().join("data.json"), r#"{"k": 1}"#).unwrap();

    let document = common::parse("<prompt>Read @file:notes.md and @file:data.json</prompt>");
    let result = common::default_processor(&resolving_config(Some(dir.path())))
        .process(document)
        .await
        .unwrap();

    let references = result.document.references();
    assert_eq!(references.len(), 2);
    assert_eq!(
        references[0].resolved,
        Some(ResolvedValue::Text("Be concise.".into()))
    );
    assert_eq!(references[1].resolved, Some(ResolvedValue::Json(json!({"k": 1}))));
    assert!(result.warnings().is_empty());
}

#[tokio::test]
async fn test_file_reference_relative_to_document() {
    let dir = tempfile::tempdir().unwrap();
    let sub = dir.path().join("agents");
    std::fs::create_dir(&sub).unwrap();
    std::fs::write(sub.join("persona.txt"), "A patient tutor").unwrap();
    let doc_path = sub.join("tutor.dpml");
    std::fs::write(&doc_path, "<prompt>You are @file:persona.txt</prompt>").unwrap();

    let parsed = DpmlParser::default().parse_file(&doc_path).await.unwrap();
    let result = common::default_processor(&resolving_config(None))
        .process(parsed.into_result().unwrap())
        .await
        .unwrap();

    assert_eq!(
        result.document.references()[0].resolved,
        Some(ResolvedValue::Text("A patient tutor".into()))
    );
    assert_eq!(result.context.current_document_path(), Some(doc_path.as_path()));
}

#[tokio::test]
async fn test_missing_file_loose_and_strict() {
    let dir = tempfile::tempdir().unwrap();
    let source = "<prompt>See @file:absent.md</prompt>";

    let loose = common::default_processor(&resolving_config(Some(dir.path())))
        .process(common::parse(source))
        .await
        .unwrap();
    assert!(!loose.document.references()[0].is_resolved());
    assert_eq!(loose.warnings().len(), 1);
    assert_eq!(loose.warnings()[0].code, ErrorCode::ReferenceNotFound);

    let mut strict = resolving_config(Some(dir.path()));
    strict.processing.strict_mode = true;
    let err = common::default_processor(&strict)
        .process(common::parse(source))
        .await
        .unwrap_err();
    let err = match err {
        DpmlError::Reference(err) => err,
        other => panic!("expected a reference error, got {other:?}"),
    };
    assert_eq!(err.reference, "file:absent.md");
    assert!(matches!(err.source, Some(ProtocolError::FileNotFound { .. })));
}

#[tokio::test]
async fn test_extends_external_file_fragment() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("base.dpml"),
        r#"<library><role id="assistant" tone="warm">Helpful</role><role id="other">No</role></library>"#,
    )
    .unwrap();

    let source = r#"<agent><role extends="file:base.dpml#assistant"/></agent>"#;
    let mut config = DpmlConfig::default();
    config.resolver.base_dir = Some(dir.path().to_path_buf());
    let result = common::default_processor(&config)
        .process(common::parse(source))
        .await
        .unwrap();
    assert!(result.warnings().is_empty(), "{:?}", result.warnings());

    let role = result.document.all_elements()[1];
    assert_eq!(role.attribute("tone"), Some("warm"));
    assert_eq!(role.text_content(), "Helpful");
}

#[tokio::test]
async fn test_extends_missing_external_is_a_warning() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = DpmlConfig::default();
    config.resolver.base_dir = Some(dir.path().to_path_buf());

    let result = common::default_processor(&config)
        .process(common::parse(r#"<agent><role extends="file:nope.dpml"/></agent>"#))
        .await
        .unwrap();
    assert_eq!(result.warnings().len(), 1);
    assert_eq!(result.warnings()[0].code, ErrorCode::ReferenceNotFound);
}

struct Memory {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ProtocolHandler for Memory {
    fn name(&self) -> &str {
        "memory"
    }

    fn can_handle(&self, protocol: &str) -> bool {
        protocol == "mem"
    }

    async fn handle(
        &self,
        reference: &Reference,
        _ctx: &ProcessingContext,
    ) -> Result<ResolvedValue, ProtocolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ResolvedValue::Text(reference.path.to_uppercase()))
    }
}

#[tokio::test]
async fn test_repeated_references_hit_the_cache() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut resolver = ReferenceResolver::new();
    resolver.register(Arc::new(Memory {
        calls: calls.clone(),
    }));
    let processor = Processor::new(ProcessingOptions {
        resolve_references: true,
        ..Default::default()
    })
    .with_resolver(Arc::new(resolver));

    let document = common::parse("<a>@mem:x and @mem:y<b>again @mem:x</b></a>");
    let result = processor.process(document).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(result.context.cache_len(), 2);
    let values: Vec<_> = result
        .document
        .references()
        .iter()
        .map(|r| r.resolved.clone())
        .collect();
    assert_eq!(
        values,
        vec![
            Some(ResolvedValue::Text("X".into())),
            Some(ResolvedValue::Text("Y".into())),
            Some(ResolvedValue::Text("X".into())),
        ]
    );
}
