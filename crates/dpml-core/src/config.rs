/*
 * config.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Configuration for parsing, processing, resolution and transforms.
 */

//! Configuration.
//!
//! [`DpmlConfig`] groups the options of every stage. All keys are camelCase
//! and every field has a default, so a partial document is valid:
//!
//! ```
//! use dpml_core::config::{DpmlConfig, TraversalMode};
//!
//! let config = DpmlConfig::from_yaml_str("processing:\n  traversal: iterative\n").unwrap();
//! assert_eq!(config.processing.traversal, TraversalMode::Iterative);
//! assert!(config.parser.track_positions);
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ast::DocumentMode;
use crate::error::{DpmlError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DpmlConfig {
    pub parser: ParserOptions,
    pub processing: ProcessingOptions,
    pub resolver: ResolverOptions,
    pub transform: TransformOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParserOptions {
    /// Record source spans on every node.
    pub track_positions: bool,
    /// Keep whitespace-only text runs.
    pub preserve_whitespace: bool,
    /// Run the tag validator after parsing when a registry is available.
    pub validate_on_parse: bool,
    /// Document mode used unless the first element declares one.
    pub mode: DocumentMode,
    /// Name reported in diagnostics.
    pub file_name: Option<String>,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            track_positions: true,
            preserve_whitespace: false,
            validate_on_parse: false,
            mode: DocumentMode::Loose,
            file_name: None,
        }
    }
}

/// How the visitor pipeline walks the tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraversalMode {
    #[default]
    Recursive,
    /// Explicit stack; bounded native stack depth on deep documents.
    Iterative,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessingOptions {
    pub strict_mode: bool,
    pub traversal: TraversalMode,
    /// Resolve every reference node after the visitor pass.
    pub resolve_references: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResolverOptions {
    /// Directory relative `file:` references fall back to.
    pub base_dir: Option<PathBuf>,
    pub http_timeout_ms: u64,
    /// Honor proxy settings from the environment.
    pub use_system_proxy: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            base_dir: None,
            http_timeout_ms: 30_000,
            use_system_proxy: true,
        }
    }
}

impl ResolverOptions {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransformOptions {
    /// Record processor failures in `meta.errors` instead of failing.
    pub ignore_errors: bool,
    /// Stop the chain for an element after the first processor that runs.
    pub short_circuit: bool,
    /// How far ancestor lookups walk up the context chain.
    pub max_ancestor_depth: usize,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            ignore_errors: false,
            short_circuit: false,
            max_ancestor_depth: 64,
        }
    }
}

impl DpmlConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| DpmlError::config(format!("Invalid JSON configuration: {}", e)))
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| DpmlError::config(format!("Invalid YAML configuration: {}", e)))
    }

    /// Load from a `.json`, `.yaml` or `.yml` file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| DpmlError::config(format!("Cannot read {}: {}", path.display(), e)))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&text),
            Some("yaml" | "yml") => Self::from_yaml_str(&text),
            _ => Err(DpmlError::config(format!(
                "Unsupported configuration format: {}",
                path.display()
            ))),
        }
    }

    /// Whether either the processing options or the parser default demand strictness.
    pub fn is_strict(&self) -> bool {
        self.processing.strict_mode || self.parser.mode == DocumentMode::Strict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_defaults() {
        let config = DpmlConfig::default();
        assert!(config.parser.track_positions);
        assert!(!config.parser.preserve_whitespace);
        assert_eq!(config.processing.traversal, TraversalMode::Recursive);
        assert_eq!(config.resolver.http_timeout(), Duration::from_secs(30));
        assert_eq!(config.transform.max_ancestor_depth, 64);
        assert!(!config.is_strict());
    }

    #[test]
    fn test_json_camel_case() {
        let config = DpmlConfig::from_json_str(
            r#"{
                "parser": {"preserveWhitespace": true, "mode": "strict"},
                "resolver": {"httpTimeoutMs": 250, "baseDir": "/agents"},
                "transform": {"ignoreErrors": true}
            }"#,
        )
        .unwrap();

        assert!(config.parser.preserve_whitespace);
        assert!(config.is_strict());
        assert_eq!(config.resolver.http_timeout_ms, 250);
        assert_eq!(config.resolver.base_dir, Some(PathBuf::from("/agents")));
        assert!(config.transform.ignore_errors);
        assert!(!config.transform.short_circuit);
    }

    #[test]
    fn test_invalid_config_is_config_error() {
        let err = DpmlConfig::from_yaml_str("processing: [1, 2").unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConfigError);
    }

    #[test]
    fn test_from_path_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("dpml.yml");
        std::fs::write(&yaml, "processing:\n  strictMode: true\n").unwrap();
        assert!(DpmlConfig::from_path(&yaml).unwrap().processing.strict_mode);

        let toml = dir.path().join("dpml.toml");
        std::fs::write(&toml, "").unwrap();
        assert!(DpmlConfig::from_path(&toml).is_err());
    }
}
