//! Highlight database model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::database::now_rfc3339;
use crate::{Error, Result};

/// Bounds imposed by the avatar-video engine.
pub const MIN_HIGHLIGHT_SECONDS: f64 = 2.0;
pub const MAX_HIGHLIGHT_SECONDS: f64 = 60.0;

/// Highlight database model.
/// A bounded excerpt of a completed task's episode; immutable after
/// creation except deletion.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct HighlightDbModel {
    pub id: String,
    pub task_id: String,
    pub title: String,
    pub description: String,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    /// Transcript text joined from the included turns
    pub excerpt: String,
    pub audio_url: Option<String>,
    pub storage_key: Option<String>,
    pub created_at: String,
}

impl HighlightDbModel {
    /// Build a new highlight, enforcing the duration invariants.
    pub fn new(
        task_id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        start_time: f64,
        duration: f64,
        excerpt: impl Into<String>,
    ) -> Result<Self> {
        if !(MIN_HIGHLIGHT_SECONDS..=MAX_HIGHLIGHT_SECONDS).contains(&duration) {
            return Err(Error::DurationConstraint { seconds: duration });
        }
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            task_id: task_id.into(),
            title: title.into(),
            description: description.into(),
            start_time,
            end_time: start_time + duration,
            duration,
            excerpt: excerpt.into(),
            audio_url: None,
            storage_key: None,
            created_at: now_rfc3339(),
        })
    }
}
