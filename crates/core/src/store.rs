// crates/core/src/store.rs
//! In-memory job registry keyed by `(session_id, job_id)`.
//!
//! The store is the only mutable shared resource in the subsystem. It is
//! guarded by an `RwLock` because jobs are mutated from worker tasks on a
//! multi-threaded runtime; readers get cloned snapshots, never references.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use crate::job::{Job, JobKey};

pub struct JobStore {
    jobs: RwLock<HashMap<JobKey, Job>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    pub fn put(&self, job: Job) {
        match self.jobs.write() {
            Ok(mut jobs) => {
                jobs.insert(job.key(), job);
            }
            Err(e) => tracing::error!("RwLock poisoned writing jobs map: {e}"),
        }
    }

    /// Snapshot of a job, if present.
    pub fn get(&self, key: &JobKey) -> Option<Job> {
        match self.jobs.read() {
            Ok(jobs) => jobs.get(key).cloned(),
            Err(e) => {
                tracing::error!("RwLock poisoned reading jobs map: {e}");
                None
            }
        }
    }

    /// Mutate a job in place. Returns false if the key is absent.
    pub fn update(&self, key: &JobKey, f: impl FnOnce(&mut Job)) -> bool {
        match self.jobs.write() {
            Ok(mut jobs) => match jobs.get_mut(key) {
                Some(job) => {
                    f(job);
                    true
                }
                None => false,
            },
            Err(e) => {
                tracing::error!("RwLock poisoned updating jobs map: {e}");
                false
            }
        }
    }

    /// Atomically remove and return a job. This is what makes result
    /// retrieval at-most-once: the first successful pop wins, every later
    /// lookup sees nothing.
    pub fn pop(&self, key: &JobKey) -> Option<Job> {
        match self.jobs.write() {
            Ok(mut jobs) => jobs.remove(key),
            Err(e) => {
                tracing::error!("RwLock poisoned popping from jobs map: {e}");
                None
            }
        }
    }

    /// All jobs owned by one session, oldest first.
    pub fn list_by_session(&self, session_id: &str) -> Vec<Job> {
        match self.jobs.read() {
            Ok(jobs) => {
                let mut mine: Vec<Job> = jobs
                    .values()
                    .filter(|j| j.session_id == session_id)
                    .cloned()
                    .collect();
                mine.sort_by_key(|j| j.created_at);
                mine
            }
            Err(e) => {
                tracing::error!("RwLock poisoned listing jobs map: {e}");
                Vec::new()
            }
        }
    }

    /// Best-effort cleanup of old jobs; a safety net for clients that
    /// never fetch their result (crash, network loss).
    ///
    /// Removes jobs older than `max_age`, measured from `finished_at` when
    /// available and `created_at` otherwise. With `keep_running` set,
    /// pending/running jobs survive regardless of age; without it,
    /// long-stuck ones are swept too. Returns the number removed.
    pub fn sweep(&self, max_age: Duration, keep_running: bool) -> usize {
        let now = Utc::now();
        let max_age =
            chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
        match self.jobs.write() {
            Ok(mut jobs) => {
                let before = jobs.len();
                jobs.retain(|_, job| {
                    let ts = job.finished_at.unwrap_or(job.created_at);
                    if now - ts <= max_age {
                        return true;
                    }
                    keep_running && !job.state.is_terminal()
                });
                before - jobs.len()
            }
            Err(e) => {
                tracing::error!("RwLock poisoned sweeping jobs map: {e}");
                0
            }
        }
    }

    pub fn len(&self) -> usize {
        match self.jobs.read() {
            Ok(jobs) => jobs.len(),
            Err(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}
