//! Engine trait seams and their request/response types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::domain::DialogueTurn;

/// Output of source ingestion: a transcript plus source metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestedSource {
    pub transcript: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub duration_secs: Option<f64>,
    /// Durable reference to the extracted source audio, when one exists.
    #[serde(default)]
    pub audio_url: Option<String>,
}

/// Synthesis quality mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QualityMode {
    #[default]
    Standard,
    High,
}

/// Request for one narration episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeRequest {
    /// Script text, or a single line for intro/outro synthesis.
    pub text: String,
    /// 1 voice for single-speaker reads, 2 for dialogue mode.
    pub voices: Vec<String>,
    pub quality: QualityMode,
    /// Ask the engine to read the text verbatim instead of converting it
    /// into dialogue. Best-effort hint, no guarantee.
    #[serde(default)]
    pub literal_reading: bool,
}

/// Completed episode payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeOutput {
    pub audio_url: String,
    /// Per-speaker turns, populated in dialogue mode.
    #[serde(default)]
    pub turns: Vec<DialogueTurn>,
}

/// Observed state of an asynchronous episode.
#[derive(Debug, Clone, PartialEq)]
pub enum EpisodeStatus {
    Processing,
    Completed(EpisodeOutput),
    Failed { message: String },
}

/// Request for one avatar video render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvatarVideoRequest {
    pub image_url: String,
    pub audio_url: String,
    pub style: String,
}

/// Completed avatar video payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvatarVideoOutput {
    pub video_url: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub duration_secs: Option<f64>,
}

/// Observed state of an asynchronous avatar render.
#[derive(Debug, Clone, PartialEq)]
pub enum AvatarVideoStatus {
    Processing,
    Succeeded(AvatarVideoOutput),
    Failed { message: String },
}

/// Source ingestion: source URL in, transcript and audio reference out.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SourceIngestor: Send + Sync {
    async fn ingest(&self, model: &str, source_url: &str) -> Result<IngestedSource>;
}

/// Text generation, optionally constrained by a JSON output schema.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        schema: Option<serde_json::Value>,
    ) -> Result<String>;
}

/// Narration/dialogue synthesis: create an episode, then poll it by id.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NarrationSynthesizer: Send + Sync {
    async fn create_episode(&self, model: &str, request: &EpisodeRequest) -> Result<String>;
    async fn episode_status(&self, episode_id: &str) -> Result<EpisodeStatus>;
}

/// Avatar-video synthesis: create a render task, then poll it by id.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AvatarVideoEngine: Send + Sync {
    async fn create_video(&self, model: &str, request: &AvatarVideoRequest) -> Result<String>;
    async fn video_status(&self, engine_task_id: &str) -> Result<AvatarVideoStatus>;
}
