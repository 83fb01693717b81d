// crates/core/src/launch.rs
//! Token-gated job launch.
//!
//! `Launcher::launch` is the adapter that turns a registered tool into a
//! background job: verify the token first (fail closed, synchronously),
//! create a Pending job under the verified session, schedule the work as a
//! fire-and-forget task, and return a ticket before the work has run.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{AuthError, LaunchError};
use crate::job::{Job, JobKey, JobState};
use crate::runner::JobRunner;
use crate::store::JobStore;
use crate::token::TokenAuthority;
use crate::tool::{Tool, ToolContext};

/// Thread-safe progress bridge injected into tools that report progress.
///
/// Safe to call from worker threads: updates go through the shared store,
/// fractions are clamped to [0, 1], and decreases are ignored so progress
/// stays monotone while the job runs.
#[derive(Clone)]
pub struct ProgressReporter {
    store: Arc<JobStore>,
    key: JobKey,
}

impl ProgressReporter {
    pub fn new(store: Arc<JobStore>, key: JobKey) -> Self {
        Self { store, key }
    }

    pub fn report(&self, fraction: f64, message: impl Into<String>) {
        let fraction = fraction.clamp(0.0, 1.0);
        let message = message.into();
        self.store.update(&self.key, |job| {
            if job.state != JobState::Running {
                return;
            }
            if fraction > job.progress {
                job.progress = fraction;
            }
            job.status = message;
        });
    }
}

/// Caller-supplied launch inputs after the protocol layer peeled them off
/// the request: the token, the optional deadline, and the tool arguments.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub token: Option<String>,
    pub timeout_s: Option<f64>,
    pub args: serde_json::Value,
}

/// Immediate launch response; the job is Pending and the work may not
/// have started yet.
#[derive(Debug, Clone, Serialize)]
pub struct LaunchTicket {
    pub job_id: String,
    pub state: JobState,
    pub progress: f64,
    pub status: String,
}

pub struct Launcher {
    authority: Arc<TokenAuthority>,
    store: Arc<JobStore>,
    runner: JobRunner,
}

impl Launcher {
    pub fn new(authority: Arc<TokenAuthority>, store: Arc<JobStore>) -> Self {
        let runner = JobRunner::new(Arc::clone(&store));
        Self {
            authority,
            store,
            runner,
        }
    }

    /// Launch `tool` as a background job.
    ///
    /// Fails only on token rejection or structurally invalid arguments;
    /// anything the tool itself does wrong is recorded on the job and
    /// surfaces through the result operation.
    pub fn launch(
        &self,
        tool: Arc<dyn Tool>,
        request: LaunchRequest,
    ) -> Result<LaunchTicket, LaunchError> {
        // 1) Token, before anything else happens.
        let token = request
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;
        let claims = self.authority.verify(token).map_err(LaunchError::Auth)?;
        let session_id = claims.sid;

        // 2) Structural argument check against the descriptor.
        let descriptor = tool.descriptor();
        let args = validate_args(descriptor, request.args)?;
        let timeout = request.timeout_s.map(Duration::from_secs_f64);

        // 3) Fresh Pending job under the verified session.
        let job_id = Uuid::new_v4().to_string();
        let job = Job::new(job_id.clone(), session_id.clone(), timeout);
        let key = job.key();
        let cancel = job.cancel.clone();
        self.store.put(job);

        tracing::info!(
            tool = %descriptor.name,
            job_id = %job_id,
            session_id = %session_id,
            timeout_s = ?request.timeout_s,
            "launching job"
        );

        // 4) Context: inject the verified session id and the progress
        // bridge only where the descriptor asks for them.
        let ctx = ToolContext {
            session_id: descriptor.accepts_session_id.then(|| session_id.clone()),
            progress: descriptor
                .accepts_progress_cb
                .then(|| ProgressReporter::new(Arc::clone(&self.store), key.clone())),
            cancel: cancel.clone(),
        };

        // 5/6) Fire and forget; the ticket returns before this runs.
        let work = async move { tool.run(args, ctx).await };
        self.runner.spawn(key, timeout, cancel, work);

        // 7) Pending ticket.
        Ok(LaunchTicket {
            job_id,
            state: JobState::Pending,
            progress: 0.0,
            status: String::new(),
        })
    }
}

/// Check the argument object against the declared parameters: required
/// ones must be present, unknown or reserved names are rejected.
fn validate_args(
    descriptor: &crate::tool::ToolDescriptor,
    args: serde_json::Value,
) -> Result<serde_json::Value, LaunchError> {
    let obj = match &args {
        serde_json::Value::Object(map) => map,
        serde_json::Value::Null => {
            return if descriptor.params.iter().any(|p| p.required) {
                Err(LaunchError::InvalidParams(
                    "missing required arguments".to_string(),
                ))
            } else {
                Ok(serde_json::Value::Object(serde_json::Map::new()))
            };
        }
        _ => {
            return Err(LaunchError::InvalidParams(
                "arguments must be an object".to_string(),
            ))
        }
    };

    for param in &descriptor.params {
        if param.required && !obj.contains_key(&param.name) {
            return Err(LaunchError::InvalidParams(format!(
                "missing required parameter {}",
                param.name
            )));
        }
    }
    for name in obj.keys() {
        if !descriptor.params.iter().any(|p| &p.name == name) {
            return Err(LaunchError::InvalidParams(format!(
                "unknown parameter {name}"
            )));
        }
    }
    Ok(args)
}
