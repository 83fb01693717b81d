// crates/server/src/routes/jobs.rs
//! Job control surface: status, result, cancel, list.
//!
//! Every operation verifies the presented token first, derives the
//! session id from it, and resolves `(session_id, job_id)`. A key that
//! does not resolve — unknown id, foreign session, or already-popped
//! result — uniformly yields `NotFound`.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taskgate_core::{AuthError, Job, JobKey, JobState};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

/// Verify the token and derive the owning session id.
fn authorize(state: &AppState, token: Option<&str>) -> Result<String, ApiError> {
    let token = token.filter(|t| !t.is_empty()).ok_or(AuthError::MissingToken)?;
    let claims = state.authority.verify(token)?;
    Ok(claims.sid)
}

/// Read-only snapshot of one job.
#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub state: JobState,
    pub progress: f64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Job> for JobStatusResponse {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.job_id,
            state: job.state,
            progress: job.progress,
            status: job.status,
            created_at: job.created_at,
            started_at: job.started_at,
            finished_at: job.finished_at,
            error: job.error,
        }
    }
}

/// Outcome of the result operation.
#[derive(Debug, Serialize)]
pub struct JobResultResponse {
    pub job_id: String,
    pub state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<JobState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub count: usize,
    pub jobs: Vec<JobStatusResponse>,
}

/// GET /api/jobs/{id}/status — snapshot a job without touching it.
pub async fn job_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
    Query(query): Query<TokenQuery>,
) -> ApiResult<Json<JobStatusResponse>> {
    let session_id = authorize(&state, query.token.as_deref())?;
    let job = state
        .store
        .get(&JobKey::new(session_id, job_id.clone()))
        .ok_or(ApiError::JobNotFound(job_id))?;
    Ok(Json(job.into()))
}

/// POST /api/jobs/{id}/result — consume a terminal job's outcome.
///
/// The first successful call on a terminal job atomically pops it; every
/// later call with the same id sees `NotFound`. A job that is not yet
/// terminal is reported as incomplete and left in place so polling stays
/// safe.
pub async fn job_result(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
    Query(query): Query<TokenQuery>,
) -> ApiResult<Json<JobResultResponse>> {
    let session_id = authorize(&state, query.token.as_deref())?;
    let key = JobKey::new(session_id, job_id.clone());

    let job = state
        .store
        .get(&key)
        .ok_or_else(|| ApiError::JobNotFound(job_id.clone()))?;

    if !job.state.is_terminal() {
        return Ok(Json(JobResultResponse {
            job_id,
            state: job.state,
            result: None,
            error: Some("job not complete".to_string()),
            error_type: None,
            trace: None,
        }));
    }

    // Terminal: pop-on-read. The pop may lose a race with a concurrent
    // result call; the loser sees NotFound, which is exactly the
    // at-most-once contract.
    let job = state
        .store
        .pop(&key)
        .ok_or(ApiError::JobNotFound(job_id))?;

    Ok(Json(JobResultResponse {
        job_id: job.job_id,
        state: job.state,
        result: job.result,
        error: job.error,
        error_type: job.error_type,
        trace: job.trace,
    }))
}

/// POST /api/jobs/{id}/cancel — request cooperative cancellation.
///
/// Advisory: the job stops at its next checkpoint, not instantly.
pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
    Query(query): Query<TokenQuery>,
) -> ApiResult<Json<CancelResponse>> {
    let session_id = authorize(&state, query.token.as_deref())?;
    let key = JobKey::new(session_id, job_id.clone());
    let job = state
        .store
        .get(&key)
        .ok_or(ApiError::JobNotFound(job_id))?;

    if job.state.is_terminal() {
        return Ok(Json(CancelResponse {
            ok: false,
            state: Some(job.state),
            info: Some("already finished".to_string()),
        }));
    }

    tracing::info!(job_id = %job.job_id, session_id = %job.session_id, "cancel requested");
    job.cancel.cancel();

    Ok(Json(CancelResponse {
        ok: true,
        state: Some(job.state),
        info: None,
    }))
}

/// GET /api/jobs — list this session's jobs, oldest first.
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TokenQuery>,
) -> ApiResult<Json<JobListResponse>> {
    let session_id = authorize(&state, query.token.as_deref())?;
    let jobs: Vec<JobStatusResponse> = state
        .store
        .list_by_session(&session_id)
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(Json(JobListResponse {
        count: jobs.len(),
        jobs,
    }))
}

/// Create the job control router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/jobs", get(list_jobs))
        .route("/jobs/{job_id}/status", get(job_status))
        .route("/jobs/{job_id}/result", post(job_result))
        .route("/jobs/{job_id}/cancel", post(cancel_job))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use pretty_assertions::assert_eq;
    use taskgate_core::ToolRegistry;

    fn test_state() -> Arc<AppState> {
        AppState::new(ServerConfig::default(), ToolRegistry::new())
    }

    fn seeded_job(state: &AppState, sid: &str, jid: &str, job_state: JobState) -> JobKey {
        let mut job = Job::new(jid, sid, None);
        job.state = job_state;
        if job_state.is_terminal() {
            job.finished_at = Some(Utc::now());
        }
        let key = job.key();
        state.store.put(job);
        key
    }

    fn token_for(state: &AppState, sid: &str) -> String {
        state
            .authority
            .issue(sid, std::time::Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_status_requires_valid_token() {
        let state = test_state();
        seeded_job(&state, "s1", "j1", JobState::Running);

        let err = job_status(
            State(Arc::clone(&state)),
            Path("j1".into()),
            Query(TokenQuery { token: None }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Auth(AuthError::MissingToken)));

        let err = job_status(
            State(state),
            Path("j1".into()),
            Query(TokenQuery {
                token: Some("garbage".into()),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Auth(_)));
    }

    #[tokio::test]
    async fn test_status_never_mutates() {
        let state = test_state();
        seeded_job(&state, "s1", "j1", JobState::Running);
        let token = token_for(&state, "s1");

        for _ in 0..3 {
            let Json(snapshot) = job_status(
                State(Arc::clone(&state)),
                Path("j1".into()),
                Query(TokenQuery {
                    token: Some(token.clone()),
                }),
            )
            .await
            .unwrap();
            assert_eq!(snapshot.state, JobState::Running);
        }
        assert_eq!(state.store.len(), 1);
    }

    #[tokio::test]
    async fn test_foreign_session_sees_not_found() {
        let state = test_state();
        seeded_job(&state, "s1", "j1", JobState::Done);
        let foreign = token_for(&state, "s2");

        let err = job_status(
            State(Arc::clone(&state)),
            Path("j1".into()),
            Query(TokenQuery {
                token: Some(foreign.clone()),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::JobNotFound(_)));

        let err = job_result(
            State(Arc::clone(&state)),
            Path("j1".into()),
            Query(TokenQuery {
                token: Some(foreign.clone()),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::JobNotFound(_)));

        let err = cancel_job(
            State(Arc::clone(&state)),
            Path("j1".into()),
            Query(TokenQuery {
                token: Some(foreign),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::JobNotFound(_)));

        // The job itself is untouched.
        assert_eq!(state.store.len(), 1);
    }

    #[tokio::test]
    async fn test_result_is_at_most_once() {
        let state = test_state();
        let key = seeded_job(&state, "s1", "j1", JobState::Done);
        state.store.update(&key, |j| {
            j.result = Some(serde_json::json!(42));
            j.progress = 1.0;
        });
        let token = token_for(&state, "s1");

        let Json(first) = job_result(
            State(Arc::clone(&state)),
            Path("j1".into()),
            Query(TokenQuery {
                token: Some(token.clone()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(first.state, JobState::Done);
        assert_eq!(first.result, Some(serde_json::json!(42)));

        let err = job_result(
            State(state),
            Path("j1".into()),
            Query(TokenQuery {
                token: Some(token),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::JobNotFound(_)));
    }

    #[tokio::test]
    async fn test_result_on_incomplete_job_does_not_pop() {
        let state = test_state();
        seeded_job(&state, "s1", "j1", JobState::Running);
        let token = token_for(&state, "s1");

        for _ in 0..2 {
            let Json(response) = job_result(
                State(Arc::clone(&state)),
                Path("j1".into()),
                Query(TokenQuery {
                    token: Some(token.clone()),
                }),
            )
            .await
            .unwrap();
            assert_eq!(response.state, JobState::Running);
            assert_eq!(response.error.as_deref(), Some("job not complete"));
            assert!(response.result.is_none());
        }
        assert_eq!(state.store.len(), 1);
    }

    #[tokio::test]
    async fn test_result_carries_failure_detail() {
        let state = test_state();
        let key = seeded_job(&state, "s1", "j1", JobState::Failed);
        state.store.update(&key, |j| {
            j.error = Some("boom".into());
            j.error_type = Some("ValueError".into());
            j.trace = Some("Failed { kind: \"ValueError\", message: \"boom\" }".into());
        });
        let token = token_for(&state, "s1");

        let Json(response) = job_result(
            State(state),
            Path("j1".into()),
            Query(TokenQuery {
                token: Some(token),
            }),
        )
        .await
        .unwrap();
        assert_eq!(response.state, JobState::Failed);
        assert_eq!(response.error.as_deref(), Some("boom"));
        assert_eq!(response.error_type.as_deref(), Some("ValueError"));
        assert!(response.trace.as_deref().unwrap().contains("ValueError"));
        assert!(response.result.is_none());
    }

    #[tokio::test]
    async fn test_cancel_terminal_job_reports_already_finished() {
        let state = test_state();
        seeded_job(&state, "s1", "j1", JobState::Done);
        let token = token_for(&state, "s1");

        let Json(response) = cancel_job(
            State(state),
            Path("j1".into()),
            Query(TokenQuery {
                token: Some(token),
            }),
        )
        .await
        .unwrap();
        assert!(!response.ok);
        assert_eq!(response.info.as_deref(), Some("already finished"));
    }

    #[tokio::test]
    async fn test_cancel_running_job_fires_token() {
        let state = test_state();
        let key = seeded_job(&state, "s1", "j1", JobState::Running);
        let cancel = state.store.get(&key).unwrap().cancel.clone();
        let token = token_for(&state, "s1");

        let Json(response) = cancel_job(
            State(state),
            Path("j1".into()),
            Query(TokenQuery {
                token: Some(token),
            }),
        )
        .await
        .unwrap();
        assert!(response.ok);
        assert_eq!(response.state, Some(JobState::Running));
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_list_jobs_is_session_scoped() {
        let state = test_state();
        seeded_job(&state, "s1", "j1", JobState::Running);
        seeded_job(&state, "s1", "j2", JobState::Done);
        seeded_job(&state, "s2", "j3", JobState::Running);
        let token = token_for(&state, "s1");

        let Json(response) = list_jobs(
            State(state),
            Query(TokenQuery {
                token: Some(token),
            }),
        )
        .await
        .unwrap();
        assert_eq!(response.count, 2);
        assert!(response.jobs.iter().all(|j| j.job_id != "j3"));
    }
}
