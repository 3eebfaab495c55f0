/*
 * tests/common/mod.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Shared helpers for dpml-core integration tests.
 */

#![allow(dead_code)]

use std::sync::{Arc, Once};

use dpml_core::{
    Document, DpmlConfig, DpmlParser, Processor, TagProcessorRegistry, TagRegistry,
};
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Install a test-writer subscriber once per test binary. Set `RUST_LOG`
/// to see pipeline logs.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Parse and fail the test on any parse error.
pub fn parse(source: &str) -> Document {
    let result = DpmlParser::default().parse(source);
    assert!(result.is_ok(), "unexpected parse errors:\n{}", result.render_diagnostics());
    result.ast
}

pub fn default_processor(config: &DpmlConfig) -> Processor {
    Processor::with_defaults(
        Arc::new(TagRegistry::new()),
        Arc::new(TagProcessorRegistry::new()),
        config,
    )
}

pub fn strict_config() -> DpmlConfig {
    let mut config = DpmlConfig::default();
    config.processing.strict_mode = true;
    config
}
