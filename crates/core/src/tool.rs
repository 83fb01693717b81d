// crates/core/src/tool.rs
//! The tool seam: what a wrapped callable looks like to the job system.
//!
//! A tool is registered once with a [`ToolDescriptor`] — an explicit
//! capability record (declared parameters, whether it wants the verified
//! session id, whether it reports progress). The launch surface consults
//! the descriptor instead of inspecting the callable at run time, and the
//! descriptor-derived launch schema is a contract for protocol layers that
//! build request schemas from it.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::{RegistryError, ToolError};
use crate::launch::ProgressReporter;

/// Parameter names owned by the launch surface. A tool may not declare
/// these: `token` and `timeout_s` are injected into every launch schema,
/// `progress_cb` and `session_id` are supplied by the adapter and must
/// never be caller-controlled.
pub const RESERVED_PARAMS: [&str; 4] = ["token", "timeout_s", "progress_cb", "session_id"];

/// JSON type of a declared parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

/// One declared tool parameter, in declaration order.
#[derive(Debug, Clone, Serialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            description: None,
        }
    }

    pub fn optional(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            description: None,
        }
    }

    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }
}

/// Capability record built once at registration time.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// The tool's own parameters: original names, order, and optionality.
    pub params: Vec<ParamSpec>,
    /// Tool wants the verified session id forwarded into its context.
    pub accepts_session_id: bool,
    /// Tool reports live progress through the injected reporter.
    pub accepts_progress_cb: bool,
}

impl ToolDescriptor {
    /// The public launch signature: the tool's declared parameters plus
    /// the injected `token` (required) and `timeout_s` (optional).
    /// `session_id` and `progress_cb` never appear here.
    pub fn launch_params(&self) -> Vec<ParamSpec> {
        let mut params = self.params.clone();
        params.push(
            ParamSpec::required("token", ParamKind::String)
                .describe("Session token from issue_token"),
        );
        params.push(
            ParamSpec::optional("timeout_s", ParamKind::Number)
                .describe("Optional wall-clock deadline in seconds"),
        );
        params
    }
}

/// Execution context handed to a running tool.
pub struct ToolContext {
    /// Verified session id; present only when the descriptor asks for it.
    /// Callers can never supply or forge this value.
    pub session_id: Option<String>,
    /// Progress bridge; present only when the descriptor asks for it.
    pub progress: Option<ProgressReporter>,
    /// Cooperative cancellation signal for this job.
    pub cancel: CancellationToken,
}

/// An opaque callable the job system can launch.
#[async_trait]
pub trait Tool: Send + Sync {
    fn descriptor(&self) -> &ToolDescriptor;

    /// Execute with already-validated arguments. Blocking work must be
    /// off-loaded (`spawn_blocking` or a dedicated worker) so the runtime
    /// is never stalled.
    async fn run(&self, args: serde_json::Value, ctx: ToolContext) -> Result<serde_json::Value, ToolError>;
}

/// Registry of launchable tools, immutable after startup wiring.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, rejecting descriptors that fight the launch
    /// surface over parameter names.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let descriptor = tool.descriptor();
        for param in &descriptor.params {
            if RESERVED_PARAMS.contains(&param.name.as_str()) {
                return Err(RegistryError::ReservedParam {
                    tool: descriptor.name.clone(),
                    param: param.name.clone(),
                });
            }
        }
        if self.tools.contains_key(&descriptor.name) {
            return Err(RegistryError::DuplicateTool(descriptor.name.clone()));
        }
        tracing::debug!(tool = %descriptor.name, "registered tool");
        self.tools.insert(descriptor.name.clone(), tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Descriptors of all registered tools, sorted by name.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        let mut all: Vec<ToolDescriptor> =
            self.tools.values().map(|t| t.descriptor().clone()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }
}
