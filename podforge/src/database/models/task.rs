//! Task database model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::database::now_rfc3339;
use crate::domain::{SourceInput, VoiceSelection};

/// Task database model.
/// One user-submitted request to turn a source input into an episode.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TaskDbModel {
    pub id: String,
    pub owner_id: String,
    /// Input kind: VIDEO_URL, ARTICLE_URL, RAW_TEXT
    pub input_kind: String,
    pub input_payload: String,
    /// Status: PENDING, PROCESSING, COMPLETED, FAILED
    pub status: String,
    /// Progress snapshot, written before each stage's work begins
    pub stage: String,
    pub percent: i64,
    pub message: String,
    pub eta_seconds: Option<i64>,
    /// Per-call voice overrides; None falls back to the stored preference
    pub voice_host1: Option<String>,
    pub voice_host2: Option<String>,
    /// Produced artifacts
    pub transcript: Option<String>,
    pub summary: Option<String>,
    /// JSON array of dialogue turns
    pub script: Option<String>,
    pub audio_url: Option<String>,
    pub final_audio_url: Option<String>,
    pub episode_id: Option<String>,
    pub error_message: Option<String>,
    /// ISO 8601 timestamps
    pub created_at: String,
    pub updated_at: String,
}

impl TaskDbModel {
    pub fn new(
        owner_id: impl Into<String>,
        input: &SourceInput,
        voice_override: Option<&VoiceSelection>,
    ) -> Self {
        let now = now_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            input_kind: input.kind.as_str().to_string(),
            input_payload: input.payload.clone(),
            status: TaskStatus::Pending.as_str().to_string(),
            stage: "QUEUED".to_string(),
            percent: 0,
            message: "Queued for processing".to_string(),
            eta_seconds: None,
            voice_host1: voice_override.map(|v| v.host1.clone()),
            voice_host2: voice_override.map(|v| v.host2.clone()),
            transcript: None,
            summary: None,
            script: None,
            audio_url: None,
            final_audio_url: None,
            episode_id: None,
            error_message: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// Task status values.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Created by submission, waiting to be claimed by a worker.
    Pending,
    /// Claimed; the pipeline is executing.
    Processing,
    /// Episode produced successfully.
    Completed,
    /// Pipeline gave up; `error_message` carries the user-safe cause.
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "PROCESSING" => Some(Self::Processing),
            "COMPLETED" => Some(Self::Completed),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Check if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Statuses only move forward; terminal statuses never change.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Pending, Self::Failed)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SourceInput, SourceKind};

    fn sample_input() -> SourceInput {
        SourceInput::new(SourceKind::RawText, "hello world").unwrap()
    }

    #[test]
    fn test_task_new_is_pending_and_queued() {
        let task = TaskDbModel::new("user-1", &sample_input(), None);
        assert_eq!(task.status, "PENDING");
        assert_eq!(task.stage, "QUEUED");
        assert_eq!(task.percent, 0);
        assert_eq!(task.input_kind, "RAW_TEXT");
        assert!(task.voice_host1.is_none());
    }

    #[test]
    fn test_task_new_records_voice_override() {
        let voices = VoiceSelection::new("v-a", "v-b");
        let task = TaskDbModel::new("user-1", &sample_input(), Some(&voices));
        assert_eq!(task.voice_host1.as_deref(), Some("v-a"));
        assert_eq!(task.voice_host2.as_deref(), Some("v-b"));
    }

    #[test]
    fn test_status_terminal() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Processing.is_terminal());
    }

    #[test]
    fn test_status_transitions_only_forward() {
        use TaskStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));
        assert!(!Processing.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Processing));
        assert!(!Completed.can_transition_to(Processing));
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::Processing,
            TaskStatus::Completed,
            TaskStatus::Failed,
        ] {
            assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::parse("NOPE"), None);
    }
}
