// crates/core/src/job.rs
//! The job record and its state machine.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Lifecycle state of a job. `Pending` is initial; `Done`, `Failed`,
/// `TimedOut`, and `Canceled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Done,
    Failed,
    TimedOut,
    Canceled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Done | Self::Failed | Self::TimedOut | Self::Canceled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
            Self::Canceled => "canceled",
        }
    }
}

/// Store index: jobs are namespaced by session, so a caller can only
/// observe jobs created under its own session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobKey {
    pub session_id: String,
    pub job_id: String,
}

impl JobKey {
    pub fn new(session_id: impl Into<String>, job_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            job_id: job_id.into(),
        }
    }
}

/// One tracked unit of background work.
///
/// Invariants:
/// - `result` is set iff `state == Done`
/// - `error`/`error_type` are set iff `state` is Failed/TimedOut/Canceled
/// - `trace` is best-effort failure detail, set only for Failed
/// - `progress` only increases while Running; Done forces it to 1.0
/// - every terminal job has `finished_at` set
#[derive(Debug, Clone)]
pub struct Job {
    pub job_id: String,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub state: JobState,
    pub progress: f64,
    pub status: String,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub error_type: Option<String>,
    pub trace: Option<String>,
    pub timeout: Option<Duration>,
    /// Cancellation handle for the scheduled execution unit. Timeout and
    /// explicit cancel both fire this token.
    pub cancel: CancellationToken,
}

impl Job {
    pub fn new(
        job_id: impl Into<String>,
        session_id: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            session_id: session_id.into(),
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            state: JobState::Pending,
            progress: 0.0,
            status: String::new(),
            result: None,
            error: None,
            error_type: None,
            trace: None,
            timeout,
            cancel: CancellationToken::new(),
        }
    }

    pub fn key(&self) -> JobKey {
        JobKey::new(self.session_id.clone(), self.job_id.clone())
    }
}
