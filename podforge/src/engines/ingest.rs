//! HTTP client for the source-ingestion service.
//!
//! Covers both video sources (speech-to-text) and article URLs (readable
//! text extraction); the service decides by source kind.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::{IngestedSource, SourceIngestor};
use super::{classify_status, classify_transport};
use crate::Result;

const SERVICE: &str = "ingestion";

/// Client for the ingestion endpoint.
pub struct HttpSourceIngestor {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct IngestRequest<'a> {
    model: &'a str,
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct IngestResponse {
    transcript: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    duration_seconds: Option<f64>,
    #[serde(default)]
    audio_url: Option<String>,
}

impl HttpSourceIngestor {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl SourceIngestor for HttpSourceIngestor {
    async fn ingest(&self, model: &str, source_url: &str) -> Result<IngestedSource> {
        debug!(model, source_url, "Submitting source for ingestion");

        let response = self
            .http
            .post(format!("{}/v1/ingest", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&IngestRequest {
                model,
                url: source_url,
            })
            .send()
            .await
            .map_err(|e| classify_transport(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(SERVICE, status, &body));
        }

        let parsed: IngestResponse = response
            .json()
            .await
            .map_err(|e| classify_transport(SERVICE, e))?;

        Ok(IngestedSource {
            transcript: parsed.transcript,
            language: parsed.language,
            duration_secs: parsed.duration_seconds,
            audio_url: parsed.audio_url,
        })
    }
}
