// crates/core/src/runner.rs
//! Drives one job's execution and maps outcomes to terminal states.

use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::ToolError;
use crate::job::{JobKey, JobState};
use crate::store::JobStore;

/// How a scheduled unit ended.
enum Outcome {
    Done(serde_json::Value),
    Failed(ToolError),
    TimedOut(Duration),
    Canceled,
}

/// Spawns job work as fire-and-forget background tasks and owns the
/// state transitions: Pending → Running → exactly one terminal state.
#[derive(Clone)]
pub struct JobRunner {
    store: Arc<JobStore>,
}

impl JobRunner {
    pub fn new(store: Arc<JobStore>) -> Self {
        Self { store }
    }

    /// Schedule `work` for the job at `key`.
    ///
    /// The unit is raced against `cancel` and, when set, the job's
    /// deadline. A timeout fires the same cancellation token as an
    /// explicit cancel, so cleanup inside the work is identical for both.
    /// The returned handle is informational; callers are not required to
    /// await it.
    pub fn spawn<F>(
        &self,
        key: JobKey,
        timeout: Option<Duration>,
        cancel: CancellationToken,
        work: F,
    ) -> JoinHandle<()>
    where
        F: Future<Output = Result<serde_json::Value, ToolError>> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            store.update(&key, |job| {
                job.state = JobState::Running;
                job.started_at = Some(Utc::now());
                // Visible sign that execution has begun.
                job.progress = job.progress.max(0.01);
            });

            let outcome = match timeout {
                Some(limit) => tokio::select! {
                    _ = cancel.cancelled() => Outcome::Canceled,
                    res = tokio::time::timeout(limit, work) => match res {
                        Ok(r) => Outcome::from(r),
                        Err(_) => {
                            // Drive the regular cancellation path so any
                            // in-flight chunk work cleans up the same way.
                            cancel.cancel();
                            Outcome::TimedOut(limit)
                        }
                    },
                },
                None => tokio::select! {
                    _ = cancel.cancelled() => Outcome::Canceled,
                    r = work => Outcome::from(r),
                },
            };

            finalize(&store, &key, outcome);
        })
    }
}

impl From<Result<serde_json::Value, ToolError>> for Outcome {
    fn from(res: Result<serde_json::Value, ToolError>) -> Self {
        match res {
            Ok(value) => Outcome::Done(value),
            Err(ToolError::Canceled) => Outcome::Canceled,
            Err(e) => Outcome::Failed(e),
        }
    }
}

/// Apply a terminal outcome exactly once.
///
/// Guarded against double-finalization: a job already in a terminal state
/// is left untouched, and every terminal job gets `finished_at` stamped.
fn finalize(store: &JobStore, key: &JobKey, outcome: Outcome) {
    store.update(key, |job| {
        if job.state.is_terminal() {
            tracing::debug!(job_id = %job.job_id, state = job.state.as_str(), "job already finalized");
            return;
        }
        match outcome {
            Outcome::Done(value) => {
                job.result = Some(value);
                job.progress = 1.0;
                job.state = JobState::Done;
            }
            Outcome::Failed(err) => {
                job.error = Some(err.to_string());
                job.error_type = Some(err.kind().to_string());
                // Best-effort detail for debugging, the structured
                // rendering of the full error.
                job.trace = Some(format!("{err:?}"));
                job.state = JobState::Failed;
            }
            Outcome::TimedOut(limit) => {
                job.error = Some(format!("timed out after {:.1}s", limit.as_secs_f64()));
                job.error_type = Some("timeout".to_string());
                job.state = JobState::TimedOut;
            }
            Outcome::Canceled => {
                job.error = Some("canceled".to_string());
                job.error_type = Some("canceled".to_string());
                job.state = JobState::Canceled;
            }
        }
        job.finished_at = Some(Utc::now());
        tracing::info!(
            job_id = %job.job_id,
            session_id = %job.session_id,
            state = job.state.as_str(),
            "job finished"
        );
    });
}
