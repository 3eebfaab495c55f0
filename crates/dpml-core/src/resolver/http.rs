/*
 * resolver/http.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * `http:` and `https:` references.
 */

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use url::Url;

use crate::ast::{Reference, ResolvedValue};
use crate::config::ResolverOptions;
use crate::context::ProcessingContext;
use crate::error::ProtocolError;

use super::ProtocolHandler;
use super::protocol::decode_body;

/// Fetches references with a GET request.
///
/// The request races a timer and the context's cancellation token; losing
/// either race drops the in-flight request. JSON bodies (by content type
/// or a `.json` path) are parsed, everything else is returned as text.
#[derive(Debug, Clone)]
pub struct HttpProtocolHandler {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpProtocolHandler {
    pub fn new(options: &ResolverOptions) -> Self {
        let mut builder = reqwest::Client::builder();
        if !options.use_system_proxy {
            builder = builder.no_proxy();
        }
        let client = build_client(builder, options.use_system_proxy);
        Self {
            client,
            timeout: options.http_timeout(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The URL a reference points at, fragment removed.
    pub fn url_for(reference: &Reference) -> Result<Url, ProtocolError> {
        let (target, _) = reference.split_fragment();
        let raw = format!("{}:{}", reference.protocol, target);
        Url::parse(&raw).map_err(|e| ProtocolError::InvalidUrl {
            url: raw.clone(),
            message: e.to_string(),
        })
    }

    async fn fetch(&self, url: Url) -> Result<ResolvedValue, ProtocolError> {
        let origin = url.to_string();
        let network = |e: reqwest::Error| ProtocolError::Network {
            url: origin.clone(),
            message: e.to_string(),
        };

        let is_json_path = url.path().ends_with(".json");
        let response = self.client.get(url).send().await.map_err(network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProtocolError::HttpStatus {
                url: origin.clone(),
                status: status.as_u16(),
            });
        }

        let is_json = is_json_path
            || response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|ct| ct.contains("json"));
        let body = response.text().await.map_err(network)?;
        decode_body(body, is_json, &origin)
    }
}

#[async_trait]
impl ProtocolHandler for HttpProtocolHandler {
    fn name(&self) -> &str {
        "http"
    }

    fn can_handle(&self, protocol: &str) -> bool {
        matches!(protocol, "http" | "https")
    }

    async fn handle(
        &self,
        reference: &Reference,
        ctx: &ProcessingContext,
    ) -> Result<ResolvedValue, ProtocolError> {
        let url = Self::url_for(reference)?;
        let origin = url.to_string();
        tracing::debug!(url = %origin, timeout_ms = self.timeout.as_millis() as u64, "Fetching reference");

        tokio::select! {
            result = self.fetch(url) => result,
            _ = tokio::time::sleep(self.timeout) => Err(ProtocolError::Timeout {
                url: origin.clone(),
                timeout_ms: self.timeout.as_millis() as u64,
            }),
            _ = ctx.cancellation().cancelled() => Err(ProtocolError::Cancelled { url: origin.clone() }),
        }
    }
}

/// Build the client, or fall back to a default one with a warning.
fn build_client(builder: reqwest::ClientBuilder, use_system_proxy: bool) -> reqwest::Client {
    builder.build().unwrap_or_else(|err| {
        tracing::warn!(
            error = %err,
            use_system_proxy,
            "HTTP client configuration rejected, falling back to a default client"
        );
        reqwest::Client::default()
    })
}
