// crates/core/src/lib.rs
//! Taskgate core library.
//!
//! Session-isolated, cancellable background job execution behind signed
//! session tokens:
//!
//! - `TokenAuthority` — stateless HMAC session tokens (issue/verify)
//! - `JobStore` — in-memory job registry keyed by `(session_id, job_id)`
//! - `JobRunner` — drives one job under an optional deadline
//! - `Launcher` — turns a registered tool into a token-gated launch
//! - `chunked` — chunked cancellable execution for long CPU-bound work

pub mod chunked;
pub mod error;
pub mod job;
pub mod launch;
pub mod runner;
pub mod store;
pub mod token;
pub mod tool;

pub use chunked::{run_chunked, ChunkPlan, ChunkWorker};
pub use error::{AuthError, LaunchError, RegistryError, ToolError};
pub use job::{Job, JobKey, JobState};
pub use launch::{LaunchRequest, LaunchTicket, Launcher, ProgressReporter};
pub use runner::JobRunner;
pub use store::JobStore;
pub use token::{TokenAuthority, TokenClaims};
pub use tool::{ParamKind, ParamSpec, Tool, ToolContext, ToolDescriptor, ToolRegistry};
