// crates/core/src/chunked.rs
//! Chunked cancellable execution for long CPU-bound work.
//!
//! The input is split into a deterministic, ordered sequence of fixed-size
//! spans with optional overlap. All chunks run sequentially on one
//! dedicated worker thread, so expensive per-chunk setup (a loaded model,
//! an open decoder) is built once on that thread and reused. Between
//! chunks — and only between chunks — the async driver checks the job's
//! cancellation token; an interrupted run keeps no partial output and the
//! worker's resources are released via `Drop` when its feed channel
//! disconnects.

use std::ops::Range;
use std::sync::mpsc;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::error::ToolError;
use crate::launch::ProgressReporter;

/// Ordered chunk spans over `0..total`.
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    spans: Vec<Range<usize>>,
}

impl ChunkPlan {
    /// Split `total` units into spans of `chunk_size` with `overlap` units
    /// shared between consecutive spans.
    ///
    /// A pathological `overlap >= chunk_size` is corrected by disabling
    /// overlap (with a warning) rather than failing; `chunk_size == 0` is
    /// a real argument error.
    pub fn new(total: usize, chunk_size: usize, mut overlap: usize) -> Result<Self, ToolError> {
        if chunk_size == 0 {
            return Err(ToolError::InvalidArgs("chunk_size must be > 0".into()));
        }
        if overlap >= chunk_size {
            tracing::warn!(
                overlap,
                chunk_size,
                "overlap >= chunk size; disabling overlap"
            );
            overlap = 0;
        }
        let step = chunk_size - overlap;

        let mut spans = Vec::new();
        let mut start = 0;
        while start < total {
            let end = (start + chunk_size).min(total);
            spans.push(start..end);
            if end >= total {
                break;
            }
            start += step;
        }
        Ok(Self { spans })
    }

    pub fn spans(&self) -> &[Range<usize>] {
        &self.spans
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

/// Per-run worker state, owned by the dedicated worker thread.
///
/// The worker is built lazily on the first chunk and reused for the rest
/// of the sequence. Transient resources (scratch files, loaded models)
/// belong to the implementor and are released in its `Drop`, which runs on
/// the worker thread whether the run finishes or is abandoned mid-way.
pub trait ChunkWorker: Send + 'static {
    type Output: Send + 'static;

    fn process(&mut self, span: Range<usize>) -> Result<Self::Output, ToolError>;
}

type WorkItem<O> = (Range<usize>, oneshot::Sender<Result<O, ToolError>>);

/// Run every chunk of `plan` in order on a dedicated worker thread.
///
/// `factory` is invoked once, on the worker thread, when the first chunk
/// arrives. Cancellation is observed between chunks: the remaining spans
/// are skipped, no partial output is returned, and `ToolError::Canceled`
/// propagates to the caller. Completed-chunk outputs are returned in order
/// only when the entire sequence finishes.
pub async fn run_chunked<W, F>(
    factory: F,
    plan: ChunkPlan,
    cancel: &CancellationToken,
    progress: Option<&ProgressReporter>,
) -> Result<Vec<W::Output>, ToolError>
where
    W: ChunkWorker,
    F: FnOnce() -> W + Send + 'static,
{
    let (work_tx, work_rx) = mpsc::channel::<WorkItem<W::Output>>();

    let builder = std::thread::Builder::new().name("chunk-worker".to_string());
    builder
        .spawn(move || {
            let mut factory = Some(factory);
            let mut worker: Option<W> = None;
            while let Ok((span, reply)) = work_rx.recv() {
                let worker = worker
                    .get_or_insert_with(|| (factory.take().expect("factory used once"))());
                let _ = reply.send(worker.process(span));
            }
            // Channel disconnected: the run finished or was abandoned.
            // Dropping `worker` here releases its resources either way.
        })
        .map_err(|e| ToolError::failed("worker", format!("failed to spawn chunk worker: {e}")))?;

    let total = plan.len();
    let mut outputs = Vec::with_capacity(total);
    for (index, span) in plan.spans.iter().enumerate() {
        // Checkpoint: the only place an external cancel takes effect.
        if cancel.is_cancelled() {
            tracing::info!(chunk = index, total, "chunked run canceled between chunks");
            return Err(ToolError::Canceled);
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        if work_tx.send((span.clone(), reply_tx)).is_err() {
            return Err(ToolError::failed("worker", "chunk worker exited early"));
        }
        match reply_rx.await {
            Ok(Ok(output)) => {
                outputs.push(output);
                if let Some(reporter) = progress {
                    reporter.report(
                        (index + 1) as f64 / total as f64,
                        format!("chunk {}/{}", index + 1, total),
                    );
                }
            }
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(ToolError::failed("worker", "chunk worker dropped reply")),
        }
    }

    Ok(outputs)
}
