//! Application configuration.
//!
//! Everything is read from the environment once at startup (after
//! `dotenvy`), parsed into one owned `AppConfig` that the service
//! container consumes. Candidate lists are configuration data: an ordered,
//! comma-separated list of model identifiers per engine.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::adapter::ServiceCandidate;
use crate::domain::{RetryPolicy, VoiceSelection};
use crate::{Error, Result};

/// Connection settings for one external engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub base_url: String,
    pub api_key: String,
    /// Ordered fallback candidates for the adapter.
    pub candidates: Vec<ServiceCandidate>,
}

impl EngineConfig {
    fn from_env(prefix: &str, default_base: &str, default_models: &str) -> Self {
        let base_url = env_or(&format!("{prefix}_BASE_URL"), default_base);
        let api_key = std::env::var(format!("{prefix}_API_KEY")).unwrap_or_default();
        let models = env_or(&format!("{prefix}_MODELS"), default_models);
        let candidates = parse_candidates(&models);
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            candidates,
        }
    }
}

/// Worker pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Maximum concurrently executing pipelines.
    pub max_workers: usize,
    /// Whole-pipeline timeout per task in seconds.
    pub task_timeout_secs: u64,
    /// Idle poll interval in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            task_timeout_secs: 3_600,
            poll_interval_ms: 500,
        }
    }
}

impl WorkerConfig {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub storage_root: PathBuf,
    pub storage_public_base: Option<String>,
    pub work_dir: PathBuf,
    pub ffmpeg_path: String,
    pub retry: RetryPolicy,
    pub worker: WorkerConfig,
    pub ingestion: EngineConfig,
    pub textgen: EngineConfig,
    pub narration: EngineConfig,
    pub avatar: EngineConfig,
    pub default_voices: VoiceSelection,
    /// Reference image handed to the avatar engine.
    pub avatar_image_url: String,
    pub avatar_style: String,
    /// Optional intro/outro lines synthesized around the main episode.
    pub intro_text: Option<String>,
    pub outro_text: Option<String>,
    /// Terminal tasks older than this many days are purged.
    pub retention_days: i32,
}

impl AppConfig {
    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self> {
        let config = Self {
            database_url: env_or("DATABASE_URL", "sqlite:podforge.db?mode=rwc"),
            storage_root: PathBuf::from(env_or("PODFORGE_STORAGE_ROOT", "./storage")),
            storage_public_base: std::env::var("PODFORGE_STORAGE_PUBLIC_BASE").ok(),
            work_dir: PathBuf::from(env_or("PODFORGE_WORK_DIR", "./work")),
            ffmpeg_path: env_or("FFMPEG_PATH", "ffmpeg"),
            retry: RetryPolicy::default(),
            worker: WorkerConfig {
                max_workers: env_parsed("PODFORGE_MAX_WORKERS", 4)?,
                task_timeout_secs: env_parsed("PODFORGE_TASK_TIMEOUT_SECS", 3_600)?,
                poll_interval_ms: env_parsed("PODFORGE_POLL_INTERVAL_MS", 500)?,
            },
            ingestion: EngineConfig::from_env(
                "PODFORGE_INGEST",
                "https://api.ingest.example.com",
                "whisper-large-v3",
            ),
            textgen: EngineConfig::from_env(
                "PODFORGE_TEXTGEN",
                "https://api.textgen.example.com",
                "gemini-2.5-flash,gemini-2.0-flash",
            ),
            narration: EngineConfig::from_env(
                "PODFORGE_NARRATION",
                "https://api.narration.example.com",
                "dialogue-v2",
            ),
            avatar: EngineConfig::from_env(
                "PODFORGE_AVATAR",
                "https://api.avatar.example.com",
                "talking-head-v1",
            ),
            default_voices: VoiceSelection::new(
                env_or("PODFORGE_VOICE_HOST1", "voice-ava"),
                env_or("PODFORGE_VOICE_HOST2", "voice-kai"),
            ),
            avatar_image_url: env_or(
                "PODFORGE_AVATAR_IMAGE_URL",
                "https://cdn.example.com/avatars/default.png",
            ),
            avatar_style: env_or("PODFORGE_AVATAR_STYLE", "natural"),
            intro_text: std::env::var("PODFORGE_INTRO_TEXT").ok().filter(|s| !s.is_empty()),
            outro_text: std::env::var("PODFORGE_OUTRO_TEXT").ok().filter(|s| !s.is_empty()),
            retention_days: env_parsed("PODFORGE_RETENTION_DAYS", 30)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.worker.max_workers == 0 {
            return Err(Error::config("PODFORGE_MAX_WORKERS must be at least 1"));
        }
        for (name, engine) in [
            ("ingestion", &self.ingestion),
            ("textgen", &self.textgen),
            ("narration", &self.narration),
            ("avatar", &self.avatar),
        ] {
            if engine.candidates.is_empty() {
                return Err(Error::config(format!(
                    "no model candidates configured for the {name} engine"
                )));
            }
        }
        Ok(())
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).ok().filter(|v| !v.is_empty()).unwrap_or_else(|| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) if !raw.is_empty() => raw
            .parse()
            .map_err(|_| Error::config(format!("invalid value for {key}: '{raw}'"))),
        _ => Ok(default),
    }
}

/// Parse "model-a,model-b" into an ordered candidate list.
fn parse_candidates(models: &str) -> Vec<ServiceCandidate> {
    models
        .split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(|m| ServiceCandidate::new(m, m))
        .collect()
}
