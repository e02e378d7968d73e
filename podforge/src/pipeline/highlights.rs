//! Highlight segmentation.
//!
//! A text-generation call proposes 2-3 candidate turn ranges; deterministic
//! post-processing turns those ranges into bounded clip windows using a
//! characters-per-second timing model.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::adapter::{ServiceAdapter, ServiceCandidate};
use crate::database::models::{HighlightDbModel, TaskStatus};
use crate::database::repositories::{HighlightRepository, TaskRepository};
use crate::domain::DialogueTurn;
use crate::engines::TextGenerator;
use crate::pipeline::audio::AudioClipper;
use crate::utils::json::parse_lenient;
use crate::{Error, Result};

/// Speech pacing model: seconds of audio per transcript character.
pub const SECONDS_PER_CHAR: f64 = 0.3;

/// Clip ceiling: one second of safety margin under the avatar engine's
/// 60s hard cap.
pub const MAX_CLIP_SECONDS: f64 = 59.0;

/// Clips shorter than the avatar engine's lower bound are useless
/// downstream and are dropped.
pub const MIN_CLIP_SECONDS: f64 = 2.0;

/// Default aggregate duration target handed to the proposal prompt.
pub const DEFAULT_TARGET_SECONDS: u32 = 60;

/// One segment range proposed by the text-generation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentProposal {
    pub start_turn_index: usize,
    pub end_turn_index: usize,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rationale: String,
}

/// A resolved highlight candidate with its timed window.
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightCandidate {
    pub title: String,
    pub description: String,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    pub excerpt: String,
}

/// Seconds elapsed before `turn_index` begins: the character count of every
/// earlier turn times the pacing constant.
pub fn elapsed_seconds(turns: &[DialogueTurn], turn_index: usize) -> f64 {
    turns[..turn_index]
        .iter()
        .map(DialogueTurn::char_count)
        .sum::<usize>() as f64
        * SECONDS_PER_CHAR
}

/// Resolve proposals into timed candidates. Deterministic: same turns and
/// proposals always yield the same windows.
///
/// Per proposal: `start_time` is the elapsed time at the start turn, the
/// raw duration is `ceil(chars_in_segment * SECONDS_PER_CHAR)` clamped to
/// [`MAX_CLIP_SECONDS`], and the end time is always recomputed from the
/// clamped value so the claimed window never exceeds what a clip can hold.
pub fn resolve_candidates(
    turns: &[DialogueTurn],
    proposals: &[SegmentProposal],
) -> Vec<HighlightCandidate> {
    let mut candidates = Vec::with_capacity(proposals.len());
    let mut last_end: Option<usize> = None;

    for proposal in proposals {
        if proposal.start_turn_index > proposal.end_turn_index
            || proposal.end_turn_index >= turns.len()
        {
            warn!(
                start = proposal.start_turn_index,
                end = proposal.end_turn_index,
                turns = turns.len(),
                "Dropping proposal with out-of-range turn indices"
            );
            continue;
        }
        if let Some(last) = last_end
            && proposal.start_turn_index <= last
        {
            warn!(
                start = proposal.start_turn_index,
                previous_end = last,
                "Dropping proposal overlapping the previous segment"
            );
            continue;
        }

        let segment = &turns[proposal.start_turn_index..=proposal.end_turn_index];
        let chars: usize = segment.iter().map(DialogueTurn::char_count).sum();

        let start_time = elapsed_seconds(turns, proposal.start_turn_index);
        let raw_duration = (chars as f64 * SECONDS_PER_CHAR).ceil();
        let duration = raw_duration.min(MAX_CLIP_SECONDS);
        if duration < MIN_CLIP_SECONDS {
            warn!(
                title = %proposal.title,
                duration,
                "Dropping proposal below the minimum clip duration"
            );
            continue;
        }
        // Always the clamped value: recomputing the end from the raw
        // duration would claim a window no clip can contain.
        let end_time = start_time + duration;

        let excerpt = segment
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        last_end = Some(proposal.end_turn_index);
        candidates.push(HighlightCandidate {
            title: proposal.title.clone(),
            description: proposal.description.clone(),
            start_time,
            end_time,
            duration,
            excerpt,
        });
    }

    candidates
}

/// Proposes and resolves highlight candidates for a finished episode.
pub struct HighlightSegmenter {
    adapter: ServiceAdapter,
    textgen: Arc<dyn TextGenerator>,
    candidates: Vec<ServiceCandidate>,
}

impl HighlightSegmenter {
    pub fn new(
        adapter: ServiceAdapter,
        textgen: Arc<dyn TextGenerator>,
        candidates: Vec<ServiceCandidate>,
    ) -> Self {
        Self {
            adapter,
            textgen,
            candidates,
        }
    }

    /// Ask the text-generation engine for 2-3 segments and resolve them.
    pub async fn segment(
        &self,
        turns: &[DialogueTurn],
        target_seconds: u32,
    ) -> Result<Vec<HighlightCandidate>> {
        if turns.is_empty() {
            return Err(Error::validation("cannot segment an empty dialogue"));
        }

        let prompt = build_segmentation_prompt(turns, target_seconds);
        let schema = proposal_schema();

        let raw = self
            .adapter
            .execute("highlight segmentation", &self.candidates, |candidate| {
                let textgen = Arc::clone(&self.textgen);
                let prompt = prompt.clone();
                let schema = schema.clone();
                async move {
                    textgen
                        .generate(&candidate.model, &prompt, Some(schema))
                        .await
                }
            })
            .await?;

        let proposals: Vec<SegmentProposal> = parse_lenient("text-generation", &raw)?;
        debug!(proposed = proposals.len(), "Received segment proposals");

        let resolved = resolve_candidates(turns, &proposals);
        if resolved.is_empty() {
            return Err(Error::ProviderRejected {
                service: "text-generation".to_string(),
                message: "no usable segment proposals".to_string(),
            });
        }
        Ok(resolved)
    }
}

/// Caller-facing highlight generation for a completed task: segment the
/// episode, clip each candidate, persist the successes.
pub struct HighlightService {
    segmenter: HighlightSegmenter,
    clipper: Arc<dyn AudioClipper>,
    tasks: Arc<dyn TaskRepository>,
    highlights: Arc<dyn HighlightRepository>,
}

impl HighlightService {
    pub fn new(
        segmenter: HighlightSegmenter,
        clipper: Arc<dyn AudioClipper>,
        tasks: Arc<dyn TaskRepository>,
        highlights: Arc<dyn HighlightRepository>,
    ) -> Self {
        Self {
            segmenter,
            clipper,
            tasks,
            highlights,
        }
    }

    /// Segment a completed task's episode and clip each candidate.
    ///
    /// Candidates are attempted independently: one failed clip or upload
    /// never aborts the rest, and only successes are persisted.
    pub async fn generate_for_task(&self, task_id: &str) -> Result<Vec<HighlightDbModel>> {
        let task = self.tasks.get_task(task_id).await?;
        if TaskStatus::parse(&task.status) != Some(TaskStatus::Completed) {
            return Err(Error::validation(
                "highlights can only be generated for a completed task",
            ));
        }
        let audio_url = task
            .final_audio_url
            .or(task.audio_url)
            .ok_or_else(|| Error::validation("task has no episode audio"))?;
        let script = task
            .script
            .ok_or_else(|| Error::validation("task has no dialogue script"))?;
        let turns: Vec<DialogueTurn> = serde_json::from_str(&script)?;

        let candidates = self.segmenter.segment(&turns, DEFAULT_TARGET_SECONDS).await?;

        let mut created = Vec::new();
        for candidate in &candidates {
            match self.clip_and_persist(task_id, &audio_url, candidate).await {
                Ok(highlight) => created.push(highlight),
                Err(err) => {
                    warn!(
                        task_id,
                        title = %candidate.title,
                        error = %err,
                        "Skipping highlight that failed to clip"
                    );
                }
            }
        }
        debug!(task_id, created = created.len(), proposed = candidates.len(), "Highlights created");
        Ok(created)
    }

    async fn clip_and_persist(
        &self,
        task_id: &str,
        audio_url: &str,
        candidate: &HighlightCandidate,
    ) -> Result<HighlightDbModel> {
        let mut highlight = HighlightDbModel::new(
            task_id,
            &candidate.title,
            &candidate.description,
            candidate.start_time,
            candidate.duration,
            &candidate.excerpt,
        )?;

        let storage_key = format!("highlights/{}/{}.mp3", task_id, highlight.id);
        let clipped = self
            .clipper
            .clip(audio_url, candidate.start_time, candidate.duration, &storage_key)
            .await?;

        highlight.audio_url = Some(clipped.url);
        highlight.storage_key = Some(clipped.storage_key);
        self.highlights.create_highlight(&highlight).await?;
        Ok(highlight)
    }
}

fn build_segmentation_prompt(turns: &[DialogueTurn], target_seconds: u32) -> String {
    let mut prompt = String::with_capacity(1024);
    prompt.push_str(
        "Select 2-3 non-overlapping highlight segments from this dialogue, \
         in turn order, together totalling roughly ",
    );
    prompt.push_str(&format!("{target_seconds} seconds of speech. "));
    prompt.push_str(
        "Return a JSON array of objects with start_turn_index, \
         end_turn_index, title, description and rationale.\n\n",
    );
    for (index, turn) in turns.iter().enumerate() {
        prompt.push_str(&format!("[{index}] {}: {}\n", turn.speaker_name, turn.text));
    }
    prompt
}

fn proposal_schema() -> serde_json::Value {
    json!({
        "type": "array",
        "minItems": 2,
        "maxItems": 3,
        "items": {
            "type": "object",
            "required": ["start_turn_index", "end_turn_index", "title"],
            "properties": {
                "start_turn_index": {"type": "integer", "minimum": 0},
                "end_turn_index": {"type": "integer", "minimum": 0},
                "title": {"type": "string"},
                "description": {"type": "string"},
                "rationale": {"type": "string"}
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turns_with_lengths(lengths: &[usize]) -> Vec<DialogueTurn> {
        lengths
            .iter()
            .enumerate()
            .map(|(i, len)| {
                let speaker = if i % 2 == 0 { "host1" } else { "host2" };
                DialogueTurn::new(speaker, speaker, "x".repeat(*len))
            })
            .collect()
    }

    fn proposal(start: usize, end: usize) -> SegmentProposal {
        SegmentProposal {
            start_turn_index: start,
            end_turn_index: end,
            title: format!("Segment {start}-{end}"),
            description: String::new(),
            rationale: String::new(),
        }
    }

    #[test]
    fn test_first_three_turns_of_five() {
        // Turn lengths 20+25+18 = 63 chars: raw duration ceil(18.9) = 19,
        // no clamping.
        let turns = turns_with_lengths(&[20, 25, 18, 30, 22]);
        let candidates = resolve_candidates(&turns, &[proposal(0, 2)]);
        assert_eq!(candidates.len(), 1);
        let c = &candidates[0];
        assert_eq!(c.start_time, 0.0);
        assert_eq!(c.duration, 19.0);
        assert_eq!(c.end_time, 19.0);
    }

    #[test]
    fn test_start_time_offsets_by_preceding_turns() {
        let turns = turns_with_lengths(&[20, 25, 18, 30, 22]);
        let candidates = resolve_candidates(&turns, &[proposal(2, 3)]);
        let c = &candidates[0];
        // 45 chars precede turn 2.
        assert_eq!(c.start_time, 45.0 * SECONDS_PER_CHAR);
        assert_eq!(c.duration, ((18 + 30) as f64 * SECONDS_PER_CHAR).ceil());
        assert_eq!(c.end_time, c.start_time + c.duration);
    }

    #[test]
    fn test_long_segment_clamps_to_59_and_end_uses_clamped_value() {
        // 400 chars: raw duration 120s, clamped to 59s.
        let turns = turns_with_lengths(&[400]);
        let candidates = resolve_candidates(&turns, &[proposal(0, 0)]);
        let c = &candidates[0];
        assert_eq!(c.duration, MAX_CLIP_SECONDS);
        assert_eq!(c.end_time, c.start_time + MAX_CLIP_SECONDS);
        assert_eq!(c.end_time - c.start_time, c.duration);
    }

    #[test]
    fn test_window_invariant_holds_for_all_candidates() {
        let turns = turns_with_lengths(&[50, 80, 120, 300, 40, 90]);
        let candidates =
            resolve_candidates(&turns, &[proposal(0, 1), proposal(2, 3), proposal(4, 5)]);
        assert_eq!(candidates.len(), 3);
        for c in &candidates {
            assert!(c.duration <= MAX_CLIP_SECONDS);
            assert_eq!(c.end_time - c.start_time, c.duration);
        }
    }

    #[test]
    fn test_out_of_range_proposals_dropped() {
        let turns = turns_with_lengths(&[30, 30]);
        let candidates = resolve_candidates(
            &turns,
            &[proposal(1, 0), proposal(0, 5), proposal(0, 1)],
        );
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].title, "Segment 0-1");
    }

    #[test]
    fn test_overlapping_proposal_dropped() {
        let turns = turns_with_lengths(&[30, 30, 30, 30]);
        let candidates = resolve_candidates(&turns, &[proposal(0, 2), proposal(2, 3)]);
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn test_too_short_segment_dropped() {
        // 3 chars: ceil(0.9) = 1s, below the 2s floor.
        let turns = turns_with_lengths(&[3, 200]);
        let candidates = resolve_candidates(&turns, &[proposal(0, 0), proposal(1, 1)]);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].start_time, 3.0 * SECONDS_PER_CHAR);
    }

    #[test]
    fn test_excerpt_joins_included_turns() {
        let turns = vec![
            DialogueTurn::new("host1", "Ava", "First thought."),
            DialogueTurn::new("host2", "Kai", "Second thought."),
        ];
        let candidates = resolve_candidates(&turns, &[proposal(0, 1)]);
        assert_eq!(candidates[0].excerpt, "First thought. Second thought.");
    }

    #[tokio::test]
    async fn test_segment_uses_adapter_and_parses_fenced_output() {
        use crate::domain::RetryPolicy;
        use crate::engines::traits::MockTextGenerator;

        let mut textgen = MockTextGenerator::new();
        textgen.expect_generate().returning(|_, _, _| {
            Ok("```json\n[
                {\"start_turn_index\": 0, \"end_turn_index\": 1, \"title\": \"Opening\"},
                {\"start_turn_index\": 2, \"end_turn_index\": 3, \"title\": \"Core\"}
            ]\n```"
                .to_string())
        });

        let segmenter = HighlightSegmenter::new(
            ServiceAdapter::new(RetryPolicy::no_retry()),
            Arc::new(textgen),
            vec![ServiceCandidate::new("primary", "gemini-2.5-flash")],
        );

        let turns = turns_with_lengths(&[40, 40, 40, 40]);
        let candidates = segmenter.segment(&turns, DEFAULT_TARGET_SECONDS).await.unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].title, "Opening");
    }

    mod service {
        use super::*;
        use crate::database::models::TaskDbModel;
        use crate::database::repositories::{
            SqlxHighlightRepository, SqlxTaskRepository, TaskRepository,
        };
        use crate::database::{DbPool, init_pool, run_migrations};
        use crate::domain::{RetryPolicy, SourceInput, SourceKind};
        use crate::engines::traits::MockTextGenerator;
        use crate::pipeline::audio::{ClippedAudio, MockAudioClipper};

        async fn completed_task(pool: &DbPool, turns: &[DialogueTurn]) -> TaskDbModel {
            let tasks = SqlxTaskRepository::new(pool.clone());
            let task = TaskDbModel::new(
                "user-1",
                &SourceInput::new(SourceKind::RawText, "hello").unwrap(),
                None,
            );
            tasks.create_task(&task).await.unwrap();
            tasks.claim_next_pending().await.unwrap().unwrap();
            tasks
                .set_summary_and_script(
                    &task.id,
                    "A summary",
                    &serde_json::to_string(turns).unwrap(),
                )
                .await
                .unwrap();
            tasks
                .set_primary_audio(&task.id, "ep-1", "https://cdn.example.com/ep.mp3")
                .await
                .unwrap();
            tasks.mark_completed(&task.id).await.unwrap();
            task
        }

        fn two_segment_textgen() -> MockTextGenerator {
            let mut textgen = MockTextGenerator::new();
            textgen.expect_generate().returning(|_, _, _| {
                Ok(r#"[
                    {"start_turn_index": 0, "end_turn_index": 0, "title": "First"},
                    {"start_turn_index": 1, "end_turn_index": 1, "title": "Second"}
                ]"#
                .to_string())
            });
            textgen
        }

        fn service(
            pool: &DbPool,
            textgen: MockTextGenerator,
            clipper: MockAudioClipper,
        ) -> HighlightService {
            let segmenter = HighlightSegmenter::new(
                ServiceAdapter::new(RetryPolicy::no_retry()),
                Arc::new(textgen),
                vec![ServiceCandidate::new("primary", "gemini-2.5-flash")],
            );
            HighlightService::new(
                segmenter,
                Arc::new(clipper),
                Arc::new(SqlxTaskRepository::new(pool.clone())),
                Arc::new(SqlxHighlightRepository::new(pool.clone())),
            )
        }

        #[tokio::test]
        async fn test_one_failed_clip_does_not_abort_the_others() {
            let pool = init_pool("sqlite::memory:").await.unwrap();
            run_migrations(&pool).await.unwrap();
            let turns = turns_with_lengths(&[100, 100]);
            let task = completed_task(&pool, &turns).await;

            let mut clipper = MockAudioClipper::new();
            clipper.expect_clip().returning(|_, offset, _, key| {
                // The first candidate starts at offset 0; fail it.
                if offset == 0.0 {
                    Err(Error::Ffmpeg("stream copy failed".to_string()))
                } else {
                    Ok(ClippedAudio {
                        url: format!("https://cdn.example.com/{key}"),
                        storage_key: key.to_string(),
                    })
                }
            });

            let service = service(&pool, two_segment_textgen(), clipper);
            let created = service.generate_for_task(&task.id).await.unwrap();
            assert_eq!(created.len(), 1);
            assert_eq!(created[0].title, "Second");

            // Only the success was persisted.
            let repo = SqlxHighlightRepository::new(pool.clone());
            let persisted = repo.list_highlights_for_task(&task.id).await.unwrap();
            assert_eq!(persisted.len(), 1);
            assert!(persisted[0].audio_url.is_some());
        }

        #[tokio::test]
        async fn test_non_completed_task_rejected() {
            let pool = init_pool("sqlite::memory:").await.unwrap();
            run_migrations(&pool).await.unwrap();
            let tasks = SqlxTaskRepository::new(pool.clone());
            let task = TaskDbModel::new(
                "user-1",
                &SourceInput::new(SourceKind::RawText, "hello").unwrap(),
                None,
            );
            tasks.create_task(&task).await.unwrap();

            let service = service(&pool, MockTextGenerator::new(), MockAudioClipper::new());
            assert!(matches!(
                service.generate_for_task(&task.id).await,
                Err(Error::Validation(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_segment_empty_dialogue_rejected() {
        use crate::domain::RetryPolicy;
        use crate::engines::traits::MockTextGenerator;

        let segmenter = HighlightSegmenter::new(
            ServiceAdapter::new(RetryPolicy::no_retry()),
            Arc::new(MockTextGenerator::new()),
            vec![ServiceCandidate::new("primary", "gemini-2.5-flash")],
        );
        assert!(segmenter.segment(&[], 60).await.is_err());
    }
}
