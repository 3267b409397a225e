//! # Durable Step Orchestration
//!
//! Sync runs are sequences of named steps. Each step persists its serialized
//! output keyed by `(run_id, step_name)` before the run moves on; when a
//! failed run is retried under the same run ID, already-completed steps
//! replay their stored output instead of executing again. Side-effecting
//! steps are therefore applied at most once per run, no matter how many
//! attempts the run takes.
//!
//! [`Orchestrator`] drives whole-run retries: a bounded number of attempts
//! with exponential backoff, taken only for errors classified as retryable.

use crate::error::{EngineError, Result};
use core_store::{StepResultRepository, SyncRunId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

// ============================================================================
// Step Runner
// ============================================================================

/// Executes the named steps of one sync run, replaying persisted outputs.
pub struct StepRunner {
    steps: Arc<dyn StepResultRepository>,
    run_id: SyncRunId,
    step_timeout: Duration,
}

impl StepRunner {
    /// Create a runner bound to one run ID
    pub fn new(
        steps: Arc<dyn StepResultRepository>,
        run_id: SyncRunId,
        step_timeout: Duration,
    ) -> Self {
        Self {
            steps,
            run_id,
            step_timeout,
        }
    }

    /// The run this runner is bound to
    pub fn run_id(&self) -> &SyncRunId {
        &self.run_id
    }

    /// Execute a named step, or replay its stored output.
    ///
    /// If the step completed in an earlier attempt of this run, the stored
    /// output is deserialized and returned without executing `f`. Otherwise
    /// `f` runs under the step timeout and its output is persisted before
    /// being returned.
    ///
    /// # Errors
    ///
    /// Returns the step's own error, a timeout, or a serialization failure.
    pub async fn run<T, F, Fut>(&self, step_name: &str, f: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(stored) = self.steps.get(&self.run_id, step_name).await? {
            debug!(run_id = %self.run_id, step = step_name, "Replaying stored step output");
            return serde_json::from_str(&stored).map_err(|e| EngineError::StepSerialization {
                step: step_name.to_string(),
                message: e.to_string(),
            });
        }

        let output = tokio::time::timeout(self.step_timeout, f())
            .await
            .map_err(|_| EngineError::StepTimeout {
                step: step_name.to_string(),
                timeout_secs: self.step_timeout.as_secs(),
            })??;

        let serialized =
            serde_json::to_string(&output).map_err(|e| EngineError::StepSerialization {
                step: step_name.to_string(),
                message: e.to_string(),
            })?;
        self.steps.put(&self.run_id, step_name, &serialized).await?;

        Ok(output)
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Whole-run retry policy.
///
/// A run is re-executed under the same run ID, so completed steps replay and
/// only the failed tail re-executes. Non-retryable errors surface on the
/// first attempt; exhaustion surfaces as [`EngineError::RetriesExhausted`].
#[derive(Debug, Clone)]
pub struct Orchestrator {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl Orchestrator {
    /// Create an orchestrator with the given retry bounds
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Run `f` with bounded retries and exponential backoff.
    ///
    /// `f` is invoked once per attempt; it should re-enter the same run so
    /// that durable steps replay.
    ///
    /// # Errors
    ///
    /// Returns the original error when it is not retryable, or
    /// [`EngineError::RetriesExhausted`] after the final attempt fails.
    pub async fn run_with_retry<T, F, Fut>(&self, label: &str, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match f().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) if attempt >= self.max_attempts => {
                    return Err(EngineError::RetriesExhausted {
                        attempts: attempt,
                        last_error: e.to_string(),
                    });
                }
                Err(e) => {
                    let delay = self.backoff_delay(attempt);
                    warn!(
                        run = label,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Sync run attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(2u32.saturating_pow(exponent));
        delay.min(self.max_delay)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use core_store::schema::create_test_pool;
    use core_store::SqliteStepResultRepository;
    use remote_traits::RemoteError;
    use std::sync::atomic::{AtomicU32, Ordering};

    async fn test_runner(run_id: SyncRunId) -> StepRunner {
        let pool = create_test_pool().await.unwrap();
        let steps = Arc::new(SqliteStepResultRepository::new(pool));
        StepRunner::new(steps, run_id, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_step_executes_and_persists() {
        let runner = test_runner(SyncRunId::new()).await;

        let value: u64 = runner.run("count", || async { Ok(7u64) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_completed_step_replays_instead_of_executing() {
        let runner = test_runner(SyncRunId::new()).await;
        let executions = AtomicU32::new(0);

        for _ in 0..3 {
            let value: u64 = runner
                .run("count", || async {
                    executions.fetch_add(1, Ordering::SeqCst);
                    Ok(42u64)
                })
                .await
                .unwrap();
            assert_eq!(value, 42);
        }

        assert_eq!(executions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_step_leaves_no_output() {
        let runner = test_runner(SyncRunId::new()).await;

        let result: Result<u64> = runner
            .run("flaky", || async {
                Err(RemoteError::Network("reset".to_string()).into())
            })
            .await;
        assert!(result.is_err());

        // Next attempt executes for real
        let value: u64 = runner.run("flaky", || async { Ok(9u64) }).await.unwrap();
        assert_eq!(value, 9);
    }

    #[tokio::test]
    async fn test_runs_are_isolated_by_run_id() {
        let pool = create_test_pool().await.unwrap();
        let steps: Arc<dyn StepResultRepository> =
            Arc::new(SqliteStepResultRepository::new(pool));

        let first = StepRunner::new(steps.clone(), SyncRunId::new(), Duration::from_secs(5));
        let second = StepRunner::new(steps, SyncRunId::new(), Duration::from_secs(5));

        let a: u64 = first.run("count", || async { Ok(1u64) }).await.unwrap();
        let b: u64 = second.run("count", || async { Ok(2u64) }).await.unwrap();
        assert_eq!(a, 1);
        assert_eq!(b, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_orchestrator_retries_transient_errors() {
        let orchestrator = Orchestrator::new(3, Duration::from_millis(10), Duration::from_secs(1));
        let attempts = AtomicU32::new(0);

        let value = orchestrator
            .run_with_retry("test", || async {
                let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(RemoteError::Network("reset".to_string()).into())
                } else {
                    Ok(n)
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 3);
    }

    #[tokio::test]
    async fn test_orchestrator_stops_on_permanent_error() {
        let orchestrator = Orchestrator::new(3, Duration::from_millis(10), Duration::from_secs(1));
        let attempts = AtomicU32::new(0);

        let result: Result<()> = orchestrator
            .run_with_retry("test", || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(RemoteError::Auth("bad token".to_string()).into())
            })
            .await;

        assert!(matches!(result, Err(EngineError::Remote(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_orchestrator_exhaustion() {
        let orchestrator = Orchestrator::new(2, Duration::from_millis(10), Duration::from_secs(1));

        let result: Result<()> = orchestrator
            .run_with_retry("test", || async {
                Err(RemoteError::Network("reset".to_string()).into())
            })
            .await;

        assert!(matches!(
            result,
            Err(EngineError::RetriesExhausted { attempts: 2, .. })
        ));
    }

    #[test]
    fn test_backoff_delay_doubles_and_caps() {
        let orchestrator =
            Orchestrator::new(5, Duration::from_millis(100), Duration::from_millis(500));
        assert_eq!(orchestrator.backoff_delay(1), Duration::from_millis(100));
        assert_eq!(orchestrator.backoff_delay(2), Duration::from_millis(200));
        assert_eq!(orchestrator.backoff_delay(3), Duration::from_millis(400));
        assert_eq!(orchestrator.backoff_delay(4), Duration::from_millis(500));
        assert_eq!(orchestrator.backoff_delay(10), Duration::from_millis(500));
    }
}
