//! Worker pool executing claimed tasks.
//!
//! Submission never blocks on pipeline work: workers wake on queue
//! notifications (or an idle poll), claim one task each, and run the
//! orchestrator under the whole-pipeline timeout. Timeout is the only
//! mechanism that terminates a stuck pipeline.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::orchestrator::PipelineOrchestrator;
use super::queue::TaskQueue;
use crate::config::WorkerConfig;

/// A pool of workers draining the task queue.
pub struct WorkerPool {
    config: WorkerConfig,
    semaphore: Arc<Semaphore>,
    cancellation_token: CancellationToken,
    tasks: parking_lot::Mutex<Option<JoinSet<()>>>,
}

impl WorkerPool {
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(config.max_workers)),
            config,
            cancellation_token: CancellationToken::new(),
            tasks: parking_lot::Mutex::new(Some(JoinSet::new())),
        }
    }

    /// Start the worker loops.
    pub fn start(&self, queue: Arc<TaskQueue>, orchestrator: Arc<PipelineOrchestrator>) {
        let poll_interval = self.config.poll_interval();
        let task_timeout = self.config.task_timeout();

        info!(workers = self.config.max_workers, "Starting worker pool");

        let mut tasks = self.tasks.lock();
        if let Some(ref mut join_set) = *tasks {
            for i in 0..self.config.max_workers {
                let semaphore = Arc::clone(&self.semaphore);
                let cancellation_token = self.cancellation_token.clone();
                let queue = Arc::clone(&queue);
                let orchestrator = Arc::clone(&orchestrator);
                let notifier = queue.notifier();

                join_set.spawn(async move {
                    debug!(worker = i, "Worker started");

                    loop {
                        if cancellation_token.is_cancelled() {
                            debug!(worker = i, "Worker shutting down");
                            break;
                        }

                        tokio::select! {
                            _ = cancellation_token.cancelled() => break,
                            _ = notifier.notified() => {}
                            _ = tokio::time::sleep(poll_interval) => {}
                        }

                        let permit = match semaphore.clone().try_acquire_owned() {
                            Ok(p) => p,
                            Err(_) => continue,
                        };

                        let task = match queue.claim().await {
                            Ok(Some(task)) => task,
                            Ok(None) => {
                                drop(permit);
                                continue;
                            }
                            Err(e) => {
                                error!(worker = i, error = %e, "Error claiming task");
                                drop(permit);
                                continue;
                            }
                        };

                        debug!(worker = i, task_id = %task.id, "Worker picked up task");

                        match tokio::time::timeout(task_timeout, orchestrator.run(&task)).await {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => {
                                // The orchestrator could not even record the
                                // failure; nothing left to do but log it.
                                error!(task_id = %task.id, error = %e, "Failed to persist task outcome");
                            }
                            Err(_) => {
                                warn!(
                                    task_id = %task.id,
                                    timeout_secs = task_timeout.as_secs(),
                                    "Pipeline timed out"
                                );
                                if let Err(e) = orchestrator.mark_timed_out(&task.id).await {
                                    error!(task_id = %task.id, error = %e, "Failed to record timeout");
                                }
                            }
                        }

                        drop(permit);
                    }
                });
            }
        }
    }

    /// Stop the pool and wait for in-flight workers to finish.
    pub async fn stop(&self) {
        info!("Stopping worker pool");
        self.cancellation_token.cancel();

        let join_set = {
            let mut tasks = self.tasks.lock();
            tasks.take()
        };

        if let Some(mut join_set) = join_set {
            while join_set.join_next().await.is_some() {}
        }

        info!("Worker pool stopped");
    }

    /// Check if the pool is running.
    pub fn is_running(&self) -> bool {
        !self.cancellation_token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_starts_running() {
        let pool = WorkerPool::new(WorkerConfig::default());
        assert!(pool.is_running());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_without_start() {
        let pool = WorkerPool::new(WorkerConfig::default());
        pool.stop().await;
        assert!(!pool.is_running());
        pool.stop().await;
    }
}
