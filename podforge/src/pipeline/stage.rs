//! Pipeline stages.

use serde::{Deserialize, Serialize};

/// One named phase of the sequential pipeline for a task.
///
/// The sequence is `Queued → {Transcribing | Analyzing} → Scripting →
/// Synthesizing → [Assembling] → Completed`, with `Failed` reachable from
/// any non-terminal stage.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStage {
    Queued,
    /// Video sources: speech-to-text.
    Transcribing,
    /// Article/raw-text sources: readable-text extraction.
    Analyzing,
    /// Summary plus dialogue script generation.
    Scripting,
    /// Narration episode synthesis and polling.
    Synthesizing,
    /// Intro/outro synthesis and final audio merge.
    Assembling,
    Completed,
    Failed,
}

/// Static per-stage duration estimates in seconds, used for the
/// estimated-time-remaining field of the progress snapshot.
const STAGE_ESTIMATES: &[(TaskStage, i64)] = &[
    (TaskStage::Transcribing, 120),
    (TaskStage::Scripting, 45),
    (TaskStage::Synthesizing, 240),
    (TaskStage::Assembling, 60),
];

impl TaskStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Transcribing => "TRANSCRIBING",
            Self::Analyzing => "ANALYZING",
            Self::Scripting => "SCRIPTING",
            Self::Synthesizing => "SYNTHESIZING",
            Self::Assembling => "ASSEMBLING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "QUEUED" => Some(Self::Queued),
            "TRANSCRIBING" => Some(Self::Transcribing),
            "ANALYZING" => Some(Self::Analyzing),
            "SCRIPTING" => Some(Self::Scripting),
            "SYNTHESIZING" => Some(Self::Synthesizing),
            "ASSEMBLING" => Some(Self::Assembling),
            "COMPLETED" => Some(Self::Completed),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Progress percentage reported when this stage begins.
    pub fn percent(&self) -> i64 {
        match self {
            Self::Queued => 0,
            Self::Transcribing | Self::Analyzing => 10,
            Self::Scripting => 35,
            Self::Synthesizing => 55,
            Self::Assembling => 85,
            Self::Completed => 100,
            Self::Failed => 0,
        }
    }

    /// Position in the canonical sequence, used for the ETA sum.
    /// Transcribing and Analyzing are alternatives at the same position.
    fn ordinal(&self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Transcribing | Self::Analyzing => 1,
            Self::Scripting => 2,
            Self::Synthesizing => 3,
            Self::Assembling => 4,
            Self::Completed | Self::Failed => 5,
        }
    }

    /// Estimated seconds remaining when this stage begins: the sum of the
    /// static estimates for this stage and everything after it.
    pub fn eta_seconds(&self) -> Option<i64> {
        if self.is_terminal() {
            return Some(0);
        }
        let remaining: i64 = STAGE_ESTIMATES
            .iter()
            .filter(|(stage, _)| stage.ordinal() >= self.ordinal().max(1))
            .map(|(_, secs)| secs)
            .sum();
        Some(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        for stage in [
            TaskStage::Queued,
            TaskStage::Transcribing,
            TaskStage::Analyzing,
            TaskStage::Scripting,
            TaskStage::Synthesizing,
            TaskStage::Assembling,
            TaskStage::Completed,
            TaskStage::Failed,
        ] {
            assert_eq!(TaskStage::parse(stage.as_str()), Some(stage));
        }
    }

    #[test]
    fn test_percent_is_monotonic_through_the_sequence() {
        let sequence = [
            TaskStage::Queued,
            TaskStage::Transcribing,
            TaskStage::Scripting,
            TaskStage::Synthesizing,
            TaskStage::Assembling,
            TaskStage::Completed,
        ];
        for pair in sequence.windows(2) {
            assert!(pair[0].percent() < pair[1].percent());
        }
    }

    #[test]
    fn test_eta_shrinks_as_stages_advance() {
        let queued = TaskStage::Queued.eta_seconds().unwrap();
        let scripting = TaskStage::Scripting.eta_seconds().unwrap();
        let assembling = TaskStage::Assembling.eta_seconds().unwrap();
        assert!(queued > scripting);
        assert!(scripting > assembling);
        assert_eq!(TaskStage::Completed.eta_seconds(), Some(0));
    }

    #[test]
    fn test_analyzing_and_transcribing_share_position() {
        assert_eq!(
            TaskStage::Transcribing.eta_seconds(),
            TaskStage::Analyzing.eta_seconds()
        );
    }
}
