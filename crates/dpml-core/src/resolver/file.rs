/*
 * resolver/file.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * `file:` references.
 */

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::ast::{Reference, ResolvedValue};
use crate::context::ProcessingContext;
use crate::error::ProtocolError;

use super::ProtocolHandler;
use super::protocol::decode_body;

/// Reads local files.
///
/// Relative paths are tried against the current document's directory,
/// then the configured base directory, then the working directory.
/// `.json` files are parsed; anything else is returned as text.
#[derive(Debug, Default)]
pub struct FileProtocolHandler {
    base_dir: Option<PathBuf>,
}

impl FileProtocolHandler {
    pub fn new(base_dir: Option<PathBuf>) -> Self {
        Self { base_dir }
    }

    fn candidates(&self, path: &Path, ctx: &ProcessingContext) -> Vec<PathBuf> {
        if path.is_absolute() {
            return vec![path.to_path_buf()];
        }
        let mut candidates = Vec::new();
        if let Some(dir) = ctx.current_document_dir() {
            candidates.push(dir.join(path));
        }
        if let Some(dir) = &self.base_dir {
            candidates.push(dir.join(path));
        }
        candidates.push(path.to_path_buf());
        candidates
    }
}

fn is_json_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

#[async_trait]
impl ProtocolHandler for FileProtocolHandler {
    fn name(&self) -> &str {
        "file"
    }

    fn can_handle(&self, protocol: &str) -> bool {
        protocol == "file"
    }

    async fn handle(
        &self,
        reference: &Reference,
        ctx: &ProcessingContext,
    ) -> Result<ResolvedValue, ProtocolError> {
        let (target, _) = reference.split_fragment();
        let requested = PathBuf::from(target);

        for candidate in self.candidates(&requested, ctx) {
            match tokio::fs::read_to_string(&candidate).await {
                Ok(body) => {
                    tracing::debug!(path = %candidate.display(), "Read file reference");
                    let origin = candidate.display().to_string();
                    return decode_body(body, is_json_path(&candidate), &origin);
                }
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                    return Err(ProtocolError::PermissionDenied { path: candidate });
                }
                Err(source) => {
                    return Err(ProtocolError::Io {
                        path: candidate,
                        source,
                    });
                }
            }
        }

        Err(ProtocolError::FileNotFound { path: requested })
    }
}
