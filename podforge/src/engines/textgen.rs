//! HTTP client for the text-generation engine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::TextGenerator;
use super::{classify_status, classify_transport};
use crate::{Error, Result};

const SERVICE: &str = "text-generation";

/// Client for the text-generation endpoint.
pub struct HttpTextGenerator {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<&'a serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    text: Option<String>,
}

impl HttpTextGenerator {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        schema: Option<serde_json::Value>,
    ) -> Result<String> {
        debug!(model, prompt_len = prompt.len(), structured = schema.is_some(), "Generating text");

        let response = self
            .http
            .post(format!("{}/v1/generate", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&GenerateRequest {
                model,
                prompt,
                response_schema: schema.as_ref(),
            })
            .send()
            .await
            .map_err(|e| classify_transport(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(SERVICE, status, &body));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| classify_transport(SERVICE, e))?;

        parsed.text.filter(|t| !t.is_empty()).ok_or_else(|| {
            Error::ProviderRejected {
                service: SERVICE.to_string(),
                message: "empty completion".to_string(),
            }
        })
    }
}
