//! Generic retry/fallback executor for external-service calls.
//!
//! Every call to a speech-to-text, text-generation, narration-synthesis, or
//! avatar-video engine goes through [`ServiceAdapter::execute`]: an ordered
//! list of candidates is tried in order, each with a bounded
//! exponential-backoff retry budget for transient failures. The
//! classification contract:
//!
//! - transient failures (timeout, reset, DNS, 5xx) retry the same candidate
//!   until the budget is exhausted, then fall through to the next one;
//! - rate-limit failures advance to the next candidate immediately, since a
//!   different model or key may still succeed;
//! - rejected requests (malformed response, other 4xx) also advance
//!   immediately, without burning retries;
//! - authentication failures abort the whole call with no fallback.

use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::domain::RetryPolicy;
use crate::{Error, Result};

/// One endpoint/model option for a logical operation.
///
/// Candidate lists are configuration data consumed by the adapter; call
/// sites never hand-roll their own fallback loops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCandidate {
    /// Short label used in logs ("gemini-2.5-flash", "narration-primary").
    pub tag: String,
    /// Model or endpoint identifier passed to the engine client.
    pub model: String,
    /// Extra call parameters the engine client understands.
    #[serde(default)]
    pub params: serde_json::Value,
}

impl ServiceCandidate {
    pub fn new(tag: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            model: model.into(),
            params: serde_json::Value::Null,
        }
    }
}

/// How a failed call affects the candidate loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureClass {
    /// Retry the same candidate after backoff.
    Retryable,
    /// Give up on this candidate, move to the next one.
    NextCandidate,
    /// Abort the whole operation, no fallback.
    Fatal,
}

impl FailureClass {
    fn of(error: &Error) -> Self {
        match error {
            Error::ProviderTransient { .. } => Self::Retryable,
            Error::ProviderRateLimited { .. }
            | Error::ProviderRejected { .. }
            | Error::Serialization(_) => Self::NextCandidate,
            Error::ProviderUnauthorized { .. } => Self::Fatal,
            // Anything else is not a provider outcome; surface it unchanged.
            _ => Self::Fatal,
        }
    }
}

/// Executor applying the retry/fallback discipline to one logical call.
#[derive(Debug, Clone)]
pub struct ServiceAdapter {
    policy: RetryPolicy,
}

impl ServiceAdapter {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Try `candidates` in order until one call succeeds.
    ///
    /// `call` is invoked with an owned copy of the current candidate. On
    /// exhaustion of every candidate, returns one aggregated
    /// [`Error::AllCandidatesFailed`] carrying the last underlying cause.
    pub async fn execute<T, F, Fut>(
        &self,
        operation: &str,
        candidates: &[ServiceCandidate],
        call: F,
    ) -> Result<T>
    where
        F: Fn(ServiceCandidate) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if candidates.is_empty() {
            return Err(Error::config(format!(
                "no candidates configured for {operation}"
            )));
        }

        let mut last_error: Option<Error> = None;

        for candidate in candidates {
            let mut attempt = 0u32;
            loop {
                match call(candidate.clone()).await {
                    Ok(value) => {
                        debug!(operation, candidate = %candidate.tag, "Call succeeded");
                        return Ok(value);
                    }
                    Err(error) => match FailureClass::of(&error) {
                        FailureClass::Fatal => {
                            warn!(
                                operation,
                                candidate = %candidate.tag,
                                error = %error,
                                "Aborting without fallback"
                            );
                            return Err(error);
                        }
                        FailureClass::NextCandidate => {
                            warn!(
                                operation,
                                candidate = %candidate.tag,
                                error = %error,
                                "Candidate rejected the call, advancing to next candidate"
                            );
                            last_error = Some(error);
                            break;
                        }
                        FailureClass::Retryable => {
                            if !self.policy.should_retry(attempt) {
                                warn!(
                                    operation,
                                    candidate = %candidate.tag,
                                    attempts = attempt + 1,
                                    error = %error,
                                    "Retry budget exhausted for candidate"
                                );
                                last_error = Some(error);
                                break;
                            }
                            let delay = self.policy.delay_for_attempt(attempt);
                            warn!(
                                operation,
                                candidate = %candidate.tag,
                                attempt = attempt + 1,
                                max = self.policy.max_retries,
                                delay_ms = delay.as_millis() as u64,
                                error = %error,
                                "Retrying after transient error"
                            );
                            sleep(delay).await;
                            attempt += 1;
                        }
                    },
                }
            }
        }

        let last = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no error recorded".to_string());
        Err(Error::AllCandidatesFailed {
            operation: operation.to_string(),
            attempted: candidates.len(),
            last_error: last,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn instant_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay_ms: 0,
            max_delay_ms: 0,
            use_jitter: false,
        }
    }

    fn candidates(n: usize) -> Vec<ServiceCandidate> {
        (0..n)
            .map(|i| ServiceCandidate::new(format!("c{i}"), format!("model-{i}")))
            .collect()
    }

    fn transient() -> Error {
        Error::ProviderTransient {
            service: "test".to_string(),
            message: "503".to_string(),
        }
    }

    #[tokio::test]
    async fn test_first_candidate_success() {
        let adapter = ServiceAdapter::new(instant_policy());
        let calls = AtomicU32::new(0);
        let result = adapter
            .execute("op", &candidates(3), |c| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok::<_, Error>(c.model) }
            })
            .await
            .unwrap();
        assert_eq!(result, "model-0");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retryable_failures_consume_full_budget_then_fall_through() {
        let adapter = ServiceAdapter::new(instant_policy());
        let per_candidate = [AtomicU32::new(0), AtomicU32::new(0), AtomicU32::new(0)];
        let result = adapter
            .execute("op", &candidates(3), |c| {
                let idx: usize = c.tag[1..].parse().unwrap();
                per_candidate[idx].fetch_add(1, Ordering::SeqCst);
                async move {
                    if idx == 2 {
                        Ok(c.model)
                    } else {
                        Err(transient())
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(result, "model-2");
        // 1 initial call + 3 retries for each failing candidate.
        assert_eq!(per_candidate[0].load(Ordering::SeqCst), 4);
        assert_eq!(per_candidate[1].load(Ordering::SeqCst), 4);
        assert_eq!(per_candidate[2].load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_skips_to_next_candidate_immediately() {
        let adapter = ServiceAdapter::new(instant_policy());
        let per_candidate = [AtomicU32::new(0), AtomicU32::new(0)];
        let result = adapter
            .execute("op", &candidates(2), |c| {
                let idx: usize = c.tag[1..].parse().unwrap();
                per_candidate[idx].fetch_add(1, Ordering::SeqCst);
                async move {
                    if idx == 0 {
                        Err(Error::ProviderRateLimited {
                            service: "test".to_string(),
                        })
                    } else {
                        Ok(c.model)
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(result, "model-1");
        assert_eq!(per_candidate[0].load(Ordering::SeqCst), 1);
        assert_eq!(per_candidate[1].load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rejection_skips_without_retry() {
        let adapter = ServiceAdapter::new(instant_policy());
        let calls = AtomicU32::new(0);
        let result = adapter
            .execute("op", &candidates(2), |c| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if c.tag == "c0" {
                        Err(Error::ProviderRejected {
                            service: "test".to_string(),
                            message: "bad schema".to_string(),
                        })
                    } else {
                        Ok(())
                    }
                }
            })
            .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unauthorized_aborts_without_fallback() {
        let adapter = ServiceAdapter::new(instant_policy());
        let calls = AtomicU32::new(0);
        let result: Result<()> = adapter
            .execute("op", &candidates(3), |_c| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    Err(Error::ProviderUnauthorized {
                        service: "test".to_string(),
                    })
                }
            })
            .await;
        assert!(matches!(result, Err(Error::ProviderUnauthorized { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_aggregates_last_cause() {
        let adapter = ServiceAdapter::new(instant_policy());
        let result: Result<()> = adapter
            .execute("summarize", &candidates(2), |c| async move {
                Err(Error::ProviderRejected {
                    service: "test".to_string(),
                    message: format!("refused by {}", c.model),
                })
            })
            .await;
        match result {
            Err(Error::AllCandidatesFailed {
                operation,
                attempted,
                last_error,
            }) => {
                assert_eq!(operation, "summarize");
                assert_eq!(attempted, 2);
                assert!(last_error.contains("model-1"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_candidate_list_is_a_config_error() {
        let adapter = ServiceAdapter::new(instant_policy());
        let result: Result<()> = adapter.execute("op", &[], |_c| async { Ok(()) }).await;
        assert!(matches!(result, Err(Error::Configuration(_))));
    }
}
