//! Voice preference database model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::database::now_rfc3339;
use crate::domain::VoiceSelection;

/// Per-user pair of narration voices, reused across submissions unless a
/// call supplies explicit overrides.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct VoicePreferenceDbModel {
    pub user_id: String,
    pub host1_voice_id: String,
    pub host2_voice_id: String,
    pub updated_at: String,
}

impl VoicePreferenceDbModel {
    pub fn new(user_id: impl Into<String>, selection: &VoiceSelection) -> Self {
        Self {
            user_id: user_id.into(),
            host1_voice_id: selection.host1.clone(),
            host2_voice_id: selection.host2.clone(),
            updated_at: now_rfc3339(),
        }
    }

    pub fn selection(&self) -> VoiceSelection {
        VoiceSelection::new(&self.host1_voice_id, &self.host2_voice_id)
    }
}
