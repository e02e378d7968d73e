//! HTTP client for the narration/dialogue synthesis engine.
//!
//! Episodes are produced asynchronously: creation returns an opaque id
//! which the caller polls until a terminal state.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::{EpisodeOutput, EpisodeRequest, EpisodeStatus, NarrationSynthesizer};
use super::{classify_status, classify_transport};
use crate::domain::DialogueTurn;
use crate::{Error, Result};

const SERVICE: &str = "narration";

/// Prompt decoration nudging the engine to read text verbatim instead of
/// rewriting it into dialogue. Heuristic and provider-dependent.
const LITERAL_READING_HINT: &str = "Read the following text exactly as written, word for word: ";

/// Client for the narration endpoint.
pub struct HttpNarrationSynthesizer {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct CreateEpisodeRequest<'a> {
    model: &'a str,
    text: String,
    voices: &'a [String],
    quality: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateEpisodeResponse {
    episode_id: String,
}

#[derive(Debug, Deserialize)]
struct WireTurn {
    speaker: String,
    #[serde(default)]
    speaker_name: Option<String>,
    text: String,
}

#[derive(Debug, Deserialize)]
struct EpisodeStatusResponse {
    status: String,
    #[serde(default)]
    audio_url: Option<String>,
    #[serde(default)]
    turns: Vec<WireTurn>,
    #[serde(default)]
    error: Option<String>,
}

impl HttpNarrationSynthesizer {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn episode_text(request: &EpisodeRequest) -> String {
        if request.literal_reading {
            format!("{LITERAL_READING_HINT}{}", request.text)
        } else {
            request.text.clone()
        }
    }
}

fn parse_status(parsed: EpisodeStatusResponse) -> Result<EpisodeStatus> {
    match parsed.status.as_str() {
        "pending" | "processing" => Ok(EpisodeStatus::Processing),
        "completed" => {
            let audio_url = parsed.audio_url.ok_or_else(|| Error::ProviderRejected {
                service: SERVICE.to_string(),
                message: "completed episode without audio_url".to_string(),
            })?;
            let turns = parsed
                .turns
                .into_iter()
                .map(|t| DialogueTurn {
                    speaker_name: t.speaker_name.unwrap_or_else(|| t.speaker.clone()),
                    speaker_id: t.speaker,
                    text: t.text,
                })
                .collect();
            Ok(EpisodeStatus::Completed(EpisodeOutput { audio_url, turns }))
        }
        "failed" => Ok(EpisodeStatus::Failed {
            message: parsed.error.unwrap_or_else(|| "unknown failure".to_string()),
        }),
        other => Err(Error::ProviderRejected {
            service: SERVICE.to_string(),
            message: format!("unknown episode status '{other}'"),
        }),
    }
}

#[async_trait]
impl NarrationSynthesizer for HttpNarrationSynthesizer {
    async fn create_episode(&self, model: &str, request: &EpisodeRequest) -> Result<String> {
        debug!(
            model,
            voices = request.voices.len(),
            literal = request.literal_reading,
            "Creating narration episode"
        );

        let quality = match request.quality {
            super::traits::QualityMode::Standard => "standard",
            super::traits::QualityMode::High => "high",
        };

        let response = self
            .http
            .post(format!("{}/v1/episodes", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&CreateEpisodeRequest {
                model,
                text: Self::episode_text(request),
                voices: &request.voices,
                quality,
            })
            .send()
            .await
            .map_err(|e| classify_transport(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(SERVICE, status, &body));
        }

        let parsed: CreateEpisodeResponse = response
            .json()
            .await
            .map_err(|e| classify_transport(SERVICE, e))?;
        Ok(parsed.episode_id)
    }

    async fn episode_status(&self, episode_id: &str) -> Result<EpisodeStatus> {
        let response = self
            .http
            .get(format!("{}/v1/episodes/{episode_id}", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| classify_transport(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(SERVICE, status, &body));
        }

        let parsed: EpisodeStatusResponse = response
            .json()
            .await
            .map_err(|e| classify_transport(SERVICE, e))?;
        parse_status(parsed)
    }
}
