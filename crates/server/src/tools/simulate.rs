// crates/server/src/tools/simulate.rs
//! Built-in demo tool: simulated chunked work.
//!
//! Useful for exercising the whole pipeline end to end — launch, live
//! progress, cancellation mid-run, timeouts — without any real workload
//! behind it.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::ops::Range;
use std::time::Duration;
use taskgate_core::{
    run_chunked, ChunkPlan, ChunkWorker, ParamKind, ParamSpec, Tool, ToolContext, ToolDescriptor,
    ToolError,
};

pub struct SimulateWorkTool {
    descriptor: ToolDescriptor,
}

impl SimulateWorkTool {
    pub fn new() -> Self {
        Self {
            descriptor: ToolDescriptor {
                name: "simulate_work".into(),
                description: "Simulate a long chunked computation; each unit costs step_ms, \
                              an optional fail_at unit aborts the run"
                    .into(),
                params: vec![
                    ParamSpec::optional("units", ParamKind::Integer)
                        .describe("Total work units (default 20)"),
                    ParamSpec::optional("chunk_size", ParamKind::Integer)
                        .describe("Units per chunk (default 5)"),
                    ParamSpec::optional("step_ms", ParamKind::Integer)
                        .describe("Milliseconds of work per unit (default 50)"),
                    ParamSpec::optional("fail_at", ParamKind::Integer)
                        .describe("Unit index at which to fail, for testing error paths"),
                ],
                accepts_session_id: true,
                accepts_progress_cb: true,
            },
        }
    }
}

impl Default for SimulateWorkTool {
    fn default() -> Self {
        Self::new()
    }
}

struct SleepWorker {
    step: Duration,
    fail_at: Option<usize>,
}

impl ChunkWorker for SleepWorker {
    type Output = usize;

    fn process(&mut self, span: Range<usize>) -> Result<usize, ToolError> {
        for unit in span.clone() {
            if self.fail_at == Some(unit) {
                return Err(ToolError::failed(
                    "SimulatedFailure",
                    format!("simulated failure at unit {unit}"),
                ));
            }
            std::thread::sleep(self.step);
        }
        Ok(span.len())
    }
}

fn usize_arg(args: &Value, name: &str, default: usize) -> Result<usize, ToolError> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => value
            .as_u64()
            .map(|v| v as usize)
            .ok_or_else(|| ToolError::InvalidArgs(format!("{name} must be a non-negative integer"))),
    }
}

#[async_trait]
impl Tool for SimulateWorkTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn run(&self, args: Value, ctx: ToolContext) -> Result<Value, ToolError> {
        let units = usize_arg(&args, "units", 20)?;
        let chunk_size = usize_arg(&args, "chunk_size", 5)?;
        let step_ms = usize_arg(&args, "step_ms", 50)?;
        let fail_at = match args.get("fail_at") {
            None | Some(Value::Null) => None,
            Some(value) => Some(value.as_u64().map(|v| v as usize).ok_or_else(|| {
                ToolError::InvalidArgs("fail_at must be a non-negative integer".into())
            })?),
        };

        let plan = ChunkPlan::new(units, chunk_size, 0)?;
        let chunks = plan.len();
        let step = Duration::from_millis(step_ms as u64);

        let processed: usize = run_chunked(
            move || SleepWorker { step, fail_at },
            plan,
            &ctx.cancel,
            ctx.progress.as_ref(),
        )
        .await?
        .into_iter()
        .sum();

        Ok(json!({
            "units": processed,
            "chunks": chunks,
            "session_id": ctx.session_id,
        }))
    }
}
