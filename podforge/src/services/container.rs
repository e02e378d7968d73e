//! Service container for dependency injection.
//!
//! Wires the pool, repositories, engine clients, assemblers and the worker
//! pool from one `AppConfig`, and exposes the operations callers reach the
//! pipeline through: submission, progress queries, highlight generation
//! and avatar renders.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::adapter::ServiceAdapter;
use crate::config::AppConfig;
use crate::database::models::{
    AvatarVideoTaskDbModel, HighlightDbModel, TaskDbModel, VoicePreferenceDbModel,
};
use crate::database::repositories::{
    AvatarVideoTaskRepository, HighlightRepository, SqlxAvatarVideoTaskRepository,
    SqlxHighlightRepository, SqlxTaskRepository, SqlxVoicePreferenceRepository, TaskRepository,
    VoicePreferenceRepository,
};
use crate::database::{DbPool, init_pool, run_migrations};
use crate::domain::{PollSchedule, SourceInput, SourceKind, VoiceSelection};
use crate::engines::{
    HttpAvatarVideoEngine, HttpNarrationSynthesizer, HttpSourceIngestor, HttpTextGenerator,
};
use crate::pipeline::{
    AudioAssembler, AvatarVideoPipeline, HighlightSegmenter, HighlightService,
    OrchestratorConfig, PipelineOrchestrator, ProgressSnapshot, ProgressTracker, TaskQueue,
    WorkerPool,
};
use crate::storage::{LocalDirStorage, ObjectStorage};
use crate::utils::http_client;
use crate::{Error, Result};

/// Avatar render polling: fixed 10s cadence, 60 attempts (~10 minutes).
const AVATAR_POLL_INTERVAL: Duration = Duration::from_secs(10);
const AVATAR_POLL_ATTEMPTS: u32 = 60;

/// Episode polling: 5s for the first 6 attempts, then 15s, ~20 minutes.
const EPISODE_POLL_INITIAL: Duration = Duration::from_secs(5);
const EPISODE_POLL_STEADY: Duration = Duration::from_secs(15);
const EPISODE_POLL_RAMP_AFTER: u32 = 6;
const EPISODE_POLL_ATTEMPTS: u32 = 80;

/// Service container holding all application services.
pub struct ServiceContainer {
    pub pool: DbPool,
    pub tasks: Arc<dyn TaskRepository>,
    pub highlights: Arc<dyn HighlightRepository>,
    pub avatar_tasks: Arc<dyn AvatarVideoTaskRepository>,
    pub voices: Arc<dyn VoicePreferenceRepository>,
    pub progress: ProgressTracker,
    pub queue: Arc<TaskQueue>,
    pub orchestrator: Arc<PipelineOrchestrator>,
    pub highlight_service: HighlightService,
    pub avatar_pipeline: Arc<AvatarVideoPipeline>,
    worker_pool: WorkerPool,
    config: AppConfig,
}

impl ServiceContainer {
    /// Create the container: init the pool, run migrations, recover tasks
    /// interrupted by a previous process, and wire every service.
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!("Initializing service container");

        let pool = init_pool(&config.database_url).await?;
        run_migrations(&pool).await?;

        let tasks: Arc<dyn TaskRepository> = Arc::new(SqlxTaskRepository::new(pool.clone()));
        let highlights: Arc<dyn HighlightRepository> =
            Arc::new(SqlxHighlightRepository::new(pool.clone()));
        let avatar_tasks: Arc<dyn AvatarVideoTaskRepository> =
            Arc::new(SqlxAvatarVideoTaskRepository::new(pool.clone()));
        let voices: Arc<dyn VoicePreferenceRepository> =
            Arc::new(SqlxVoicePreferenceRepository::new(pool.clone()));

        // Tasks left mid-flight by a crash are terminal now; there is no
        // cross-restart resume.
        let interrupted = tasks
            .fail_interrupted_tasks("Processing was interrupted by a restart")
            .await?;
        if interrupted > 0 {
            warn!(interrupted, "Marked interrupted tasks as failed");
        }

        let http = http_client::build_client(None);
        let storage: Arc<dyn ObjectStorage> = match &config.storage_public_base {
            Some(base) => Arc::new(LocalDirStorage::with_public_base(
                &config.storage_root,
                base.clone(),
            )),
            None => Arc::new(LocalDirStorage::new(&config.storage_root)),
        };

        let adapter = ServiceAdapter::new(config.retry.clone());
        let ingestor = Arc::new(HttpSourceIngestor::new(
            http.clone(),
            config.ingestion.base_url.clone(),
            config.ingestion.api_key.clone(),
        ));
        let textgen = Arc::new(HttpTextGenerator::new(
            http.clone(),
            config.textgen.base_url.clone(),
            config.textgen.api_key.clone(),
        ));
        let narration = Arc::new(HttpNarrationSynthesizer::new(
            http.clone(),
            config.narration.base_url.clone(),
            config.narration.api_key.clone(),
        ));
        let avatar_engine = Arc::new(HttpAvatarVideoEngine::new(
            http.clone(),
            config.avatar.base_url.clone(),
            config.avatar.api_key.clone(),
        ));

        let assembler = Arc::new(AudioAssembler::new(
            http.clone(),
            Arc::clone(&storage),
            config.ffmpeg_path.clone(),
            config.work_dir.clone(),
        ));

        let progress = ProgressTracker::new(Arc::clone(&tasks));
        let orchestrator = Arc::new(PipelineOrchestrator::new(
            Arc::clone(&tasks),
            Arc::clone(&voices),
            progress.clone(),
            adapter.clone(),
            ingestor,
            Arc::clone(&textgen) as Arc<dyn crate::engines::TextGenerator>,
            narration,
            Arc::clone(&assembler),
            OrchestratorConfig {
                ingest_candidates: config.ingestion.candidates.clone(),
                textgen_candidates: config.textgen.candidates.clone(),
                narration_candidates: config.narration.candidates.clone(),
                episode_poll: PollSchedule::adaptive(
                    EPISODE_POLL_INITIAL,
                    EPISODE_POLL_STEADY,
                    EPISODE_POLL_RAMP_AFTER,
                    EPISODE_POLL_ATTEMPTS,
                ),
                default_voices: config.default_voices.clone(),
                intro_text: config.intro_text.clone(),
                outro_text: config.outro_text.clone(),
            },
        ));

        let segmenter = HighlightSegmenter::new(
            adapter.clone(),
            textgen,
            config.textgen.candidates.clone(),
        );
        let highlight_service = HighlightService::new(
            segmenter,
            assembler,
            Arc::clone(&tasks),
            Arc::clone(&highlights),
        );

        let avatar_pipeline = Arc::new(AvatarVideoPipeline::new(
            avatar_engine,
            Arc::clone(&avatar_tasks),
            adapter,
            config.avatar.candidates.clone(),
            PollSchedule::fixed(AVATAR_POLL_INTERVAL, AVATAR_POLL_ATTEMPTS),
            config.avatar_image_url.clone(),
            config.avatar_style.clone(),
        ));

        let queue = Arc::new(TaskQueue::new(Arc::clone(&tasks)));
        let worker_pool = WorkerPool::new(config.worker.clone());

        info!("Service container initialized");

        Ok(Self {
            pool,
            tasks,
            highlights,
            avatar_tasks,
            voices,
            progress,
            queue,
            orchestrator,
            highlight_service,
            avatar_pipeline,
            worker_pool,
            config,
        })
    }

    /// Start draining the task queue.
    pub fn start_workers(&self) {
        self.worker_pool
            .start(Arc::clone(&self.queue), Arc::clone(&self.orchestrator));
    }

    /// Stop workers and wait for in-flight pipelines to settle.
    pub async fn shutdown(&self) {
        self.worker_pool.stop().await;
    }

    /// Validate and submit one request. Invalid input is rejected here,
    /// synchronously, before any task record exists; the caller gets the
    /// pending task back immediately and polls progress separately.
    pub async fn submit(
        &self,
        owner_id: &str,
        kind: Option<SourceKind>,
        payload: &str,
        voice_override: Option<&VoiceSelection>,
    ) -> Result<TaskDbModel> {
        let input = match kind {
            Some(kind) => SourceInput::new(kind, payload)?,
            None => SourceInput::infer(payload)?,
        };
        self.queue.submit(owner_id, &input, voice_override).await
    }

    /// Read the progress snapshot for one task, enforcing ownership.
    pub async fn task_progress(&self, owner_id: &str, task_id: &str) -> Result<ProgressSnapshot> {
        let task = self.tasks.get_task(task_id).await?;
        if task.owner_id != owner_id {
            return Err(Error::not_found("Task", task_id));
        }
        self.progress.snapshot(task_id).await
    }

    /// Generate and clip highlights for a completed task.
    pub async fn generate_highlights(
        &self,
        owner_id: &str,
        task_id: &str,
    ) -> Result<Vec<HighlightDbModel>> {
        let task = self.tasks.get_task(task_id).await?;
        if task.owner_id != owner_id {
            return Err(Error::not_found("Task", task_id));
        }
        self.highlight_service.generate_for_task(task_id).await
    }

    /// List a user's recent tasks.
    pub async fn list_tasks(&self, owner_id: &str, limit: i32) -> Result<Vec<TaskDbModel>> {
        self.tasks.list_tasks_for_owner(owner_id, limit).await
    }

    /// List the highlights derived from one task.
    pub async fn list_highlights(
        &self,
        owner_id: &str,
        task_id: &str,
    ) -> Result<Vec<HighlightDbModel>> {
        let task = self.tasks.get_task(task_id).await?;
        if task.owner_id != owner_id {
            return Err(Error::not_found("Task", task_id));
        }
        self.highlights.list_highlights_for_task(task_id).await
    }

    /// Delete one highlight. Highlights are immutable after creation
    /// except for deletion.
    pub async fn delete_highlight(&self, owner_id: &str, highlight_id: &str) -> Result<()> {
        let highlight = self.highlights.get_highlight(highlight_id).await?;
        let task = self.tasks.get_task(&highlight.task_id).await?;
        if task.owner_id != owner_id {
            return Err(Error::not_found("Highlight", highlight_id));
        }
        self.highlights.delete_highlight(highlight_id).await
    }

    /// Start one avatar-video render for a highlight and drive it to a
    /// terminal state.
    pub async fn render_avatar_video(
        &self,
        owner_id: &str,
        highlight_id: &str,
    ) -> Result<AvatarVideoTaskDbModel> {
        let highlight = self.highlights.get_highlight(highlight_id).await?;
        let task = self.tasks.get_task(&highlight.task_id).await?;
        if task.owner_id != owner_id {
            return Err(Error::not_found("Highlight", highlight_id));
        }
        self.avatar_pipeline.render(&highlight, owner_id).await
    }

    /// Operator-invoked retention sweep. Tasks are never deleted
    /// automatically; this removes terminal tasks older than the
    /// configured window on explicit request only.
    pub async fn purge_old_tasks(&self) -> Result<i32> {
        let purged = self.tasks.cleanup_old_tasks(self.config.retention_days).await?;
        if purged > 0 {
            info!(purged, "Purged old terminal tasks");
        }
        Ok(purged)
    }

    /// Store a user's voice pair for future submissions.
    pub async fn set_voice_preference(
        &self,
        user_id: &str,
        selection: &VoiceSelection,
    ) -> Result<()> {
        self.voices
            .upsert_preference(&VoicePreferenceDbModel::new(user_id, selection))
            .await
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
