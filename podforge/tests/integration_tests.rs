//! Integration tests for the podforge database layer.
//!
//! These tests use a real SQLite database (in-memory) to verify
//! repository operations work correctly with the actual schema.

use std::sync::Arc;

use podforge::database::models::{
    AvatarStatus, AvatarVideoTaskDbModel, HighlightDbModel, TaskDbModel, TaskStatus,
    VoicePreferenceDbModel,
};
use podforge::database::repositories::{
    AvatarVideoTaskRepository, HighlightRepository, SqlxAvatarVideoTaskRepository,
    SqlxHighlightRepository, SqlxTaskRepository, SqlxVoicePreferenceRepository, TaskRepository,
    VoicePreferenceRepository,
};
use podforge::database::{DbPool, init_pool, run_migrations};
use podforge::domain::{SourceInput, SourceKind, VoiceSelection};
use podforge::pipeline::{ProgressTracker, TaskStage};

/// Helper to create a test database pool with migrations applied.
async fn setup_test_db() -> DbPool {
    let pool = init_pool("sqlite::memory:")
        .await
        .expect("Failed to create test pool");

    run_migrations(&pool).await.expect("Failed to run migrations");

    pool
}

fn raw_text_input() -> SourceInput {
    SourceInput::new(SourceKind::RawText, "Some source material.").unwrap()
}

async fn seed_task(pool: &DbPool) -> TaskDbModel {
    let repo = SqlxTaskRepository::new(pool.clone());
    let task = TaskDbModel::new("user-1", &raw_text_input(), None);
    repo.create_task(&task).await.unwrap();
    task
}

mod database_tests {
    use super::*;

    #[tokio::test]
    async fn test_database_migrations() {
        let pool = setup_test_db().await;

        let tables: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
                .fetch_all(&pool)
                .await
                .expect("Failed to query tables");

        let table_names: Vec<&str> = tables.iter().map(|t| t.0.as_str()).collect();

        assert!(table_names.contains(&"tasks"), "tasks table missing");
        assert!(table_names.contains(&"highlights"), "highlights table missing");
        assert!(
            table_names.contains(&"avatar_video_tasks"),
            "avatar_video_tasks table missing"
        );
        assert!(
            table_names.contains(&"voice_preferences"),
            "voice_preferences table missing"
        );
    }
}

mod task_repository_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_get_task() {
        let pool = setup_test_db().await;
        let repo = SqlxTaskRepository::new(pool.clone());
        let task = seed_task(&pool).await;

        let fetched = repo.get_task(&task.id).await.unwrap();
        assert_eq!(fetched.id, task.id);
        assert_eq!(fetched.status, TaskStatus::Pending.as_str());
        assert_eq!(fetched.input_payload, "Some source material.");
    }

    #[tokio::test]
    async fn test_status_never_leaves_terminal() {
        let pool = setup_test_db().await;
        let repo = SqlxTaskRepository::new(pool.clone());
        let task = seed_task(&pool).await;

        repo.claim_next_pending().await.unwrap().unwrap();
        repo.mark_completed(&task.id).await.unwrap();

        // A completed task cannot be failed, and vice versa.
        assert!(repo.mark_failed(&task.id, "late failure").await.is_err());
        assert!(repo.mark_completed(&task.id).await.is_err());

        let fetched = repo.get_task(&task.id).await.unwrap();
        assert_eq!(fetched.status, TaskStatus::Completed.as_str());
        assert_eq!(fetched.percent, 100);
    }

    #[tokio::test]
    async fn test_claim_is_exclusive_per_task() {
        let pool = setup_test_db().await;
        let repo = SqlxTaskRepository::new(pool.clone());
        seed_task(&pool).await;

        let first = repo.claim_next_pending().await.unwrap();
        assert!(first.is_some());
        let second = repo.claim_next_pending().await.unwrap();
        assert!(second.is_none(), "one pending task must be claimable once");
    }

    #[tokio::test]
    async fn test_concurrent_claims_give_each_task_to_one_worker() {
        let pool = setup_test_db().await;
        for _ in 0..4 {
            seed_task(&pool).await;
        }

        let mut handles = Vec::new();
        for _ in 0..8 {
            let repo = SqlxTaskRepository::new(pool.clone());
            handles.push(tokio::spawn(async move {
                repo.claim_next_pending().await.unwrap()
            }));
        }

        let mut claimed_ids = Vec::new();
        for handle in handles {
            if let Some(task) = handle.await.unwrap() {
                claimed_ids.push(task.id);
            }
        }
        claimed_ids.sort();
        let before = claimed_ids.len();
        claimed_ids.dedup();
        assert_eq!(before, 4, "exactly the 4 seeded tasks are claimed");
        assert_eq!(claimed_ids.len(), 4, "no task is claimed twice");
    }

    #[tokio::test]
    async fn test_fail_interrupted_tasks_only_touches_processing() {
        let pool = setup_test_db().await;
        let repo = SqlxTaskRepository::new(pool.clone());

        // One task in each non-failed state.
        let processing = seed_task(&pool).await;
        repo.claim_next_pending().await.unwrap().unwrap();
        let completed = seed_task(&pool).await;
        repo.claim_next_pending().await.unwrap().unwrap();
        repo.mark_completed(&completed.id).await.unwrap();
        let pending = seed_task(&pool).await;

        let interrupted = repo
            .fail_interrupted_tasks("Processing was interrupted by a restart")
            .await
            .unwrap();
        assert_eq!(interrupted, 1);

        let fetched = repo.get_task(&processing.id).await.unwrap();
        assert_eq!(fetched.status, TaskStatus::Failed.as_str());
        let untouched = repo.get_task(&completed.id).await.unwrap();
        assert_eq!(untouched.status, TaskStatus::Completed.as_str());
        let still_pending = repo.get_task(&pending.id).await.unwrap();
        assert_eq!(still_pending.status, TaskStatus::Pending.as_str());
    }

    #[tokio::test]
    async fn test_artifact_setters_round_trip() {
        let pool = setup_test_db().await;
        let repo = SqlxTaskRepository::new(pool.clone());
        let task = seed_task(&pool).await;
        repo.claim_next_pending().await.unwrap();

        repo.set_transcript(&task.id, "transcript text").await.unwrap();
        repo.set_summary_and_script(&task.id, "summary", "[]").await.unwrap();
        repo.set_primary_audio(&task.id, "ep-9", "https://cdn.example.com/a.mp3")
            .await
            .unwrap();
        repo.set_final_audio(&task.id, "https://cdn.example.com/f.mp3")
            .await
            .unwrap();

        let fetched = repo.get_task(&task.id).await.unwrap();
        assert_eq!(fetched.transcript.as_deref(), Some("transcript text"));
        assert_eq!(fetched.summary.as_deref(), Some("summary"));
        assert_eq!(fetched.episode_id.as_deref(), Some("ep-9"));
        assert_eq!(
            fetched.final_audio_url.as_deref(),
            Some("https://cdn.example.com/f.mp3")
        );
    }
}

mod progress_tests {
    use super::*;

    #[tokio::test]
    async fn test_snapshot_readable_independently_of_the_orchestrator() {
        let pool = setup_test_db().await;
        let repo: Arc<dyn TaskRepository> = Arc::new(SqlxTaskRepository::new(pool.clone()));
        let task = seed_task(&pool).await;
        repo.claim_next_pending().await.unwrap();

        let writer = ProgressTracker::new(Arc::clone(&repo));
        writer
            .begin_stage(&task.id, TaskStage::Synthesizing, "Synthesizing narration")
            .await
            .unwrap();

        // A second tracker over a separate repository handle sees the same
        // durable snapshot.
        let reader = ProgressTracker::new(Arc::new(SqlxTaskRepository::new(pool.clone())));
        let snapshot = reader.snapshot(&task.id).await.unwrap();
        assert_eq!(snapshot.stage, "SYNTHESIZING");
        assert_eq!(snapshot.percent, TaskStage::Synthesizing.percent());
        assert_eq!(snapshot.message, "Synthesizing narration");
        assert!(snapshot.estimated_time_remaining.unwrap() > 0);
    }
}

mod highlight_repository_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_list_delete_highlight() {
        let pool = setup_test_db().await;
        let tasks = SqlxTaskRepository::new(pool.clone());
        let repo = SqlxHighlightRepository::new(pool.clone());
        let task = seed_task(&pool).await;
        tasks.claim_next_pending().await.unwrap();
        tasks.mark_completed(&task.id).await.unwrap();

        let highlight =
            HighlightDbModel::new(&task.id, "Best moment", "desc", 12.0, 19.0, "excerpt").unwrap();
        repo.create_highlight(&highlight).await.unwrap();
        repo.set_audio(&highlight.id, "https://cdn.example.com/h.mp3", "highlights/h.mp3")
            .await
            .unwrap();

        let listed = repo.list_highlights_for_task(&task.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].end_time - listed[0].start_time, listed[0].duration);
        assert_eq!(
            listed[0].audio_url.as_deref(),
            Some("https://cdn.example.com/h.mp3")
        );

        repo.delete_highlight(&highlight.id).await.unwrap();
        assert!(repo.list_highlights_for_task(&task.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_schema_rejects_out_of_bounds_durations() {
        let pool = setup_test_db().await;
        let task = seed_task(&pool).await;

        // Bypass the model constructor to hit the database CHECK directly.
        let mut highlight =
            HighlightDbModel::new(&task.id, "t", "d", 0.0, 30.0, "e").unwrap();
        highlight.duration = 61.0;
        highlight.end_time = 61.0;

        let repo = SqlxHighlightRepository::new(pool.clone());
        assert!(repo.create_highlight(&highlight).await.is_err());
    }
}

mod avatar_repository_tests {
    use super::*;

    async fn seed_highlight(pool: &DbPool) -> HighlightDbModel {
        let task = seed_task(pool).await;
        let highlight =
            HighlightDbModel::new(&task.id, "Moment", "desc", 0.0, 30.0, "excerpt").unwrap();
        SqlxHighlightRepository::new(pool.clone())
            .create_highlight(&highlight)
            .await
            .unwrap();
        highlight
    }

    #[tokio::test]
    async fn test_full_forward_progression() {
        let pool = setup_test_db().await;
        let repo = SqlxAvatarVideoTaskRepository::new(pool.clone());
        let highlight = seed_highlight(&pool).await;

        let record = AvatarVideoTaskDbModel::new(&highlight.id, "user-1");
        repo.create_avatar_task(&record).await.unwrap();

        repo.mark_submitted(&record.id, "ext-7").await.unwrap();
        repo.mark_processing(&record.id).await.unwrap();
        repo.mark_succeeded(&record.id, "https://cdn.example.com/v.mp4", None, Some(30.0))
            .await
            .unwrap();

        let fetched = repo.get_avatar_task(&record.id).await.unwrap();
        assert_eq!(fetched.status, AvatarStatus::Succeeded.as_str());
        assert_eq!(fetched.engine_task_id.as_deref(), Some("ext-7"));
    }

    #[tokio::test]
    async fn test_terminal_records_cannot_move() {
        let pool = setup_test_db().await;
        let repo = SqlxAvatarVideoTaskRepository::new(pool.clone());
        let highlight = seed_highlight(&pool).await;

        let record = AvatarVideoTaskDbModel::new(&highlight.id, "user-1");
        repo.create_avatar_task(&record).await.unwrap();
        repo.mark_failed(&record.id, "render failed").await.unwrap();

        assert!(repo.mark_submitted(&record.id, "ext-8").await.is_err());
        assert!(
            repo.mark_succeeded(&record.id, "https://cdn.example.com/v.mp4", None, None)
                .await
                .is_err()
        );

        let fetched = repo.get_avatar_task(&record.id).await.unwrap();
        assert_eq!(fetched.status, AvatarStatus::Failed.as_str());
    }

    #[tokio::test]
    async fn test_retry_is_a_new_record() {
        let pool = setup_test_db().await;
        let repo = SqlxAvatarVideoTaskRepository::new(pool.clone());
        let highlight = seed_highlight(&pool).await;

        let failed = AvatarVideoTaskDbModel::new(&highlight.id, "user-1");
        repo.create_avatar_task(&failed).await.unwrap();
        repo.mark_failed(&failed.id, "render failed").await.unwrap();

        let retry = AvatarVideoTaskDbModel::new(&highlight.id, "user-1");
        repo.create_avatar_task(&retry).await.unwrap();

        let listed = repo
            .list_avatar_tasks_for_highlight(&highlight.id)
            .await
            .unwrap();
        assert_eq!(listed.len(), 2);
    }
}

mod voice_preference_tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_replaces_existing_pair() {
        let pool = setup_test_db().await;
        let repo = SqlxVoicePreferenceRepository::new(pool.clone());

        assert!(repo.get_preference("user-1").await.unwrap().is_none());

        repo.upsert_preference(&VoicePreferenceDbModel::new(
            "user-1",
            &VoiceSelection::new("v-1", "v-2"),
        ))
        .await
        .unwrap();
        repo.upsert_preference(&VoicePreferenceDbModel::new(
            "user-1",
            &VoiceSelection::new("v-3", "v-4"),
        ))
        .await
        .unwrap();

        let stored = repo.get_preference("user-1").await.unwrap().unwrap();
        assert_eq!(stored.selection(), VoiceSelection::new("v-3", "v-4"));
    }
}
