//! Dialogue turns and voice selection.

use serde::{Deserialize, Serialize};

/// One turn of a narrated dialogue episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueTurn {
    pub speaker_id: String,
    pub speaker_name: String,
    pub text: String,
}

impl DialogueTurn {
    pub fn new(
        speaker_id: impl Into<String>,
        speaker_name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            speaker_id: speaker_id.into(),
            speaker_name: speaker_name.into(),
            text: text.into(),
        }
    }

    /// Character count used by the highlight timing model.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// The pair of voices used for one episode.
///
/// Resolution order: per-call overrides, then the user's stored
/// preference, then the configured defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSelection {
    pub host1: String,
    pub host2: String,
}

impl VoiceSelection {
    pub fn new(host1: impl Into<String>, host2: impl Into<String>) -> Self {
        Self {
            host1: host1.into(),
            host2: host2.into(),
        }
    }
}
