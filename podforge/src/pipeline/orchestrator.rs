//! Pipeline orchestrator: drives one claimed task through the stage
//! sequence `{Transcribing | Analyzing} → Scripting → Synthesizing →
//! [Assembling] → Completed`.
//!
//! Every stage persists its progress snapshot before doing the stage's
//! work, performs the work through the service adapter, and either
//! advances or moves the task to the failed absorbing state with a
//! user-safe message. Raw provider errors are logged here with full
//! context and never written to the task row.

use std::sync::Arc;

use serde::Deserialize;
use tokio::time::sleep;
use tracing::{error, info, warn};

use super::progress::ProgressTracker;
use super::stage::TaskStage;
use crate::adapter::{ServiceAdapter, ServiceCandidate};
use crate::database::models::TaskDbModel;
use crate::database::repositories::{TaskRepository, VoicePreferenceRepository};
use crate::domain::{DialogueTurn, PollSchedule, SourceInput, SourceKind, VoiceSelection};
use crate::engines::{
    EpisodeOutput, EpisodeRequest, EpisodeStatus, NarrationSynthesizer, QualityMode,
    SourceIngestor, TextGenerator,
};
use crate::pipeline::audio::AudioAssembler;
use crate::utils::json::parse_lenient;
use crate::{Error, Result};

/// Candidate lists and fixed settings consumed by the orchestrator.
#[derive(Clone)]
pub struct OrchestratorConfig {
    pub ingest_candidates: Vec<ServiceCandidate>,
    pub textgen_candidates: Vec<ServiceCandidate>,
    pub narration_candidates: Vec<ServiceCandidate>,
    /// Episode polling cadence: frequent early, sparser later.
    pub episode_poll: PollSchedule,
    pub default_voices: VoiceSelection,
    pub intro_text: Option<String>,
    pub outro_text: Option<String>,
}

/// Drives one task at a time; instances are shared across workers.
pub struct PipelineOrchestrator {
    tasks: Arc<dyn TaskRepository>,
    voices: Arc<dyn VoicePreferenceRepository>,
    progress: ProgressTracker,
    adapter: ServiceAdapter,
    ingestor: Arc<dyn SourceIngestor>,
    textgen: Arc<dyn TextGenerator>,
    narration: Arc<dyn NarrationSynthesizer>,
    assembler: Arc<AudioAssembler>,
    config: OrchestratorConfig,
}

/// Script turn shape requested from the text-generation engine.
#[derive(Debug, Deserialize)]
struct WireScriptTurn {
    speaker: String,
    text: String,
}

impl PipelineOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        voices: Arc<dyn VoicePreferenceRepository>,
        progress: ProgressTracker,
        adapter: ServiceAdapter,
        ingestor: Arc<dyn SourceIngestor>,
        textgen: Arc<dyn TextGenerator>,
        narration: Arc<dyn NarrationSynthesizer>,
        assembler: Arc<AudioAssembler>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            tasks,
            voices,
            progress,
            adapter,
            ingestor,
            textgen,
            narration,
            assembler,
            config,
        }
    }

    /// Execute the pipeline for a claimed task.
    ///
    /// All pipeline failures are absorbed into the task's failed state;
    /// the returned error reflects only infrastructure problems (the
    /// failure could not even be recorded).
    pub async fn run(&self, claimed: &TaskDbModel) -> Result<()> {
        let task_id = claimed.id.clone();
        match self.execute(claimed).await {
            Ok(()) => {
                self.tasks.mark_completed(&task_id).await?;
                info!(task_id = %task_id, "Pipeline completed");
                Ok(())
            }
            Err(err) => {
                error!(
                    task_id = %task_id,
                    error = %err,
                    "Pipeline failed"
                );
                self.tasks.mark_failed(&task_id, &err.user_message()).await
            }
        }
    }

    /// Mark a task failed after the worker-level timeout fired.
    pub async fn mark_timed_out(&self, task_id: &str) -> Result<()> {
        let err = Error::timeout("Episode processing");
        self.tasks.mark_failed(task_id, &err.user_message()).await
    }

    async fn execute(&self, claimed: &TaskDbModel) -> Result<()> {
        // Reconcile against the persisted record: background execution may
        // race with later mutation of the same task, and the persisted
        // input wins over whatever the claimant was handed.
        let task = self.tasks.get_task(&claimed.id).await?;
        if task.input_payload != claimed.input_payload {
            warn!(
                task_id = %task.id,
                "Claimed input differs from the persisted record; using the persisted input"
            );
        }
        let kind = SourceKind::parse(&task.input_kind)
            .ok_or_else(|| Error::validation(format!("unknown input kind '{}'", task.input_kind)))?;
        let input = SourceInput::new(kind, task.input_payload.clone())?;

        // Stage: transcript acquisition.
        let transcript = self.acquire_transcript(&task, &input).await?;
        self.tasks.set_transcript(&task.id, &transcript).await?;

        // Stage: summary + dialogue script.
        self.progress
            .begin_stage(&task.id, TaskStage::Scripting, "Writing the episode script")
            .await?;
        let summary = self.summarize(&transcript).await?;
        let turns = self.write_script(&transcript, &summary).await?;
        self.tasks
            .set_summary_and_script(&task.id, &summary, &serde_json::to_string(&turns)?)
            .await?;

        // Stage: narration synthesis.
        self.progress
            .begin_stage(&task.id, TaskStage::Synthesizing, "Synthesizing narration")
            .await?;
        let selection = self.resolve_voices(&task).await?;
        let (episode_id, output) = self.synthesize_dialogue(&turns, &selection).await?;
        self.tasks
            .set_primary_audio(&task.id, &episode_id, &output.audio_url)
            .await?;
        if !output.turns.is_empty() {
            // The engine's actual turn split supersedes the drafted script.
            self.tasks
                .set_summary_and_script(&task.id, &summary, &serde_json::to_string(&output.turns)?)
                .await?;
        }

        // Stage: optional intro/outro synthesis and assembly.
        let final_audio = if self.config.intro_text.is_some() || self.config.outro_text.is_some() {
            self.progress
                .begin_stage(&task.id, TaskStage::Assembling, "Assembling the final episode")
                .await?;
            self.assemble(&task, &output.audio_url, &selection).await?
        } else {
            output.audio_url.clone()
        };
        self.tasks.set_final_audio(&task.id, &final_audio).await?;

        Ok(())
    }

    async fn acquire_transcript(&self, task: &TaskDbModel, input: &SourceInput) -> Result<String> {
        match input.kind {
            SourceKind::VideoUrl => {
                self.progress
                    .begin_stage(&task.id, TaskStage::Transcribing, "Transcribing the source video")
                    .await?;
                let ingested = self
                    .adapter
                    .execute("source transcription", &self.config.ingest_candidates, |c| {
                        let ingestor = Arc::clone(&self.ingestor);
                        let url = input.payload.clone();
                        async move { ingestor.ingest(&c.model, &url).await }
                    })
                    .await?;
                Ok(ingested.transcript)
            }
            SourceKind::ArticleUrl => {
                self.progress
                    .begin_stage(&task.id, TaskStage::Analyzing, "Extracting the article text")
                    .await?;
                let ingested = self
                    .adapter
                    .execute("article extraction", &self.config.ingest_candidates, |c| {
                        let ingestor = Arc::clone(&self.ingestor);
                        let url = input.payload.clone();
                        async move { ingestor.ingest(&c.model, &url).await }
                    })
                    .await?;
                Ok(ingested.transcript)
            }
            SourceKind::RawText => {
                self.progress
                    .begin_stage(&task.id, TaskStage::Analyzing, "Preparing the submitted text")
                    .await?;
                Ok(input.payload.clone())
            }
        }
    }

    async fn summarize(&self, transcript: &str) -> Result<String> {
        let prompt = format!(
            "Summarize the following content in 3-5 sentences for a podcast \
             episode description:\n\n{transcript}"
        );
        self.adapter
            .execute("summarization", &self.config.textgen_candidates, |c| {
                let textgen = Arc::clone(&self.textgen);
                let prompt = prompt.clone();
                async move { textgen.generate(&c.model, &prompt, None).await }
            })
            .await
    }

    async fn write_script(&self, transcript: &str, summary: &str) -> Result<Vec<DialogueTurn>> {
        let prompt = format!(
            "Write a two-host podcast dialogue covering this content. Hosts \
             are host1 and host2; alternate naturally. Return a JSON array \
             of objects with speaker (host1 or host2) and text.\n\n\
             Summary: {summary}\n\nContent:\n{transcript}"
        );
        let schema = serde_json::json!({
            "type": "array",
            "items": {
                "type": "object",
                "required": ["speaker", "text"],
                "properties": {
                    "speaker": {"type": "string", "enum": ["host1", "host2"]},
                    "text": {"type": "string"}
                }
            }
        });

        let raw = self
            .adapter
            .execute("script generation", &self.config.textgen_candidates, |c| {
                let textgen = Arc::clone(&self.textgen);
                let prompt = prompt.clone();
                let schema = schema.clone();
                async move { textgen.generate(&c.model, &prompt, Some(schema)).await }
            })
            .await?;

        let wire: Vec<WireScriptTurn> = parse_lenient("text-generation", &raw)?;
        if wire.is_empty() {
            return Err(Error::ProviderRejected {
                service: "text-generation".to_string(),
                message: "empty dialogue script".to_string(),
            });
        }
        Ok(wire
            .into_iter()
            .map(|t| DialogueTurn {
                speaker_name: t.speaker.clone(),
                speaker_id: t.speaker,
                text: t.text,
            })
            .collect())
    }

    /// Per-call overrides win, then the stored preference, then defaults.
    async fn resolve_voices(&self, task: &TaskDbModel) -> Result<VoiceSelection> {
        if let (Some(host1), Some(host2)) = (&task.voice_host1, &task.voice_host2) {
            return Ok(VoiceSelection::new(host1, host2));
        }
        if let Some(preference) = self.voices.get_preference(&task.owner_id).await? {
            return Ok(preference.selection());
        }
        Ok(self.config.default_voices.clone())
    }

    async fn synthesize_dialogue(
        &self,
        turns: &[DialogueTurn],
        selection: &VoiceSelection,
    ) -> Result<(String, EpisodeOutput)> {
        let script_text = turns
            .iter()
            .map(|t| format!("{}: {}", t.speaker_name, t.text))
            .collect::<Vec<_>>()
            .join("\n");
        let request = EpisodeRequest {
            text: script_text,
            voices: vec![selection.host1.clone(), selection.host2.clone()],
            quality: QualityMode::High,
            literal_reading: false,
        };

        let episode_id = self
            .adapter
            .execute("narration synthesis", &self.config.narration_candidates, |c| {
                let narration = Arc::clone(&self.narration);
                let request = request.clone();
                async move { narration.create_episode(&c.model, &request).await }
            })
            .await?;

        let output = self.await_episode(&episode_id).await?;
        Ok((episode_id, output))
    }

    /// Synthesize a single-voice line (intro or outro) and return its
    /// audio URL.
    async fn synthesize_line(&self, text: &str, voice: &str) -> Result<String> {
        let request = EpisodeRequest {
            text: text.to_string(),
            voices: vec![voice.to_string()],
            quality: QualityMode::Standard,
            literal_reading: true,
        };
        let episode_id = self
            .adapter
            .execute("intro/outro synthesis", &self.config.narration_candidates, |c| {
                let narration = Arc::clone(&self.narration);
                let request = request.clone();
                async move { narration.create_episode(&c.model, &request).await }
            })
            .await?;
        Ok(self.await_episode(&episode_id).await?.audio_url)
    }

    /// Poll one episode to a terminal state on the configured schedule.
    async fn await_episode(&self, episode_id: &str) -> Result<EpisodeOutput> {
        let mut attempt = 0u32;
        while let Some(delay) = self.config.episode_poll.delay_for_attempt(attempt) {
            sleep(delay).await;
            attempt += 1;

            match self.narration.episode_status(episode_id).await {
                Ok(EpisodeStatus::Processing) => {}
                Ok(EpisodeStatus::Completed(output)) => return Ok(output),
                Ok(EpisodeStatus::Failed { message }) => {
                    return Err(Error::ProviderRejected {
                        service: "narration".to_string(),
                        message,
                    });
                }
                Err(err @ Error::ProviderTransient { .. }) => {
                    warn!(episode_id, attempt, error = %err, "Transient error polling episode");
                }
                Err(err) => return Err(err),
            }
        }
        Err(Error::timeout("Narration synthesis"))
    }

    /// Synthesize the configured intro/outro lines and merge them around
    /// the main episode audio.
    async fn assemble(
        &self,
        task: &TaskDbModel,
        main_audio_url: &str,
        selection: &VoiceSelection,
    ) -> Result<String> {
        // Intro and outro are mutually independent; sequential synthesis
        // keeps the flow simple and is fast relative to the main episode.
        let intro_url = match &self.config.intro_text {
            Some(text) => Some(self.synthesize_line(text, &selection.host1).await?),
            None => None,
        };
        let outro_url = match &self.config.outro_text {
            Some(text) => Some(self.synthesize_line(text, &selection.host1).await?),
            None => None,
        };

        let merged = self
            .assembler
            .merge(
                intro_url.as_deref(),
                Some(main_audio_url),
                outro_url.as_deref(),
                &format!("episodes/{}/final.mp3", task.id),
            )
            .await?;
        Ok(merged.url)
    }
}
