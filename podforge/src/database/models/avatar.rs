//! Avatar-video task database model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::database::now_rfc3339;

/// Avatar-video task database model.
/// One attempt to render a highlight as a talking-head video; a retry is
/// a new record, never a resurrected failed one.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AvatarVideoTaskDbModel {
    pub id: String,
    pub highlight_id: String,
    pub owner_id: String,
    pub engine_task_id: Option<String>,
    /// Status: PENDING, SUBMITTED, PROCESSING, SUCCEEDED, FAILED
    pub status: String,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub video_duration: Option<f64>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl AvatarVideoTaskDbModel {
    pub fn new(highlight_id: impl Into<String>, owner_id: impl Into<String>) -> Self {
        let now = now_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            highlight_id: highlight_id.into(),
            owner_id: owner_id.into(),
            engine_task_id: None,
            status: AvatarStatus::Pending.as_str().to_string(),
            video_url: None,
            thumbnail_url: None,
            video_duration: None,
            error_message: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// Avatar-video task status values.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AvatarStatus {
    /// Record created, engine not yet called.
    Pending,
    /// Engine accepted the render; external id persisted.
    Submitted,
    /// Engine reported the render in progress.
    Processing,
    /// Render finished; video reference captured.
    Succeeded,
    /// Render failed, timed out, or was rejected.
    Failed,
}

impl AvatarStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Submitted => "SUBMITTED",
            Self::Processing => "PROCESSING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "SUBMITTED" => Some(Self::Submitted),
            "PROCESSING" => Some(Self::Processing),
            "SUCCEEDED" => Some(Self::Succeeded),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Status advances strictly forward.
    pub fn can_transition_to(&self, next: AvatarStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        (next as u8) > (*self as u8)
    }
}
