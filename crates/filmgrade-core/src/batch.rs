//! Batch export across many photos.
//!
//! Photos run in parallel on a dedicated rayon pool. Every worker split
//! builds its own backend from the factory, so no pipeline state is shared.
//! The only shared state is the [`BatchCheckpoint`], which records finished
//! photo ids so an interrupted export resumes at a photo boundary.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::backend::RenderBackend;
use crate::error::RenderError;
use crate::image::PixelBuffer;
use crate::params::GradingParameters;

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("failed to load '{id}': {reason}")]
    Load { id: String, reason: String },
    #[error("failed to store '{id}': {reason}")]
    Store { id: String, reason: String },
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("checkpoint I/O: {0}")]
    CheckpointIo(#[from] std::io::Error),
    #[error("checkpoint format: {0}")]
    CheckpointFormat(#[from] serde_json::Error),
    #[error("thread pool: {0}")]
    Pool(String),
}

/// Where source photos come from.
pub trait PhotoSource: Sync {
    fn load(&self, id: &str) -> Result<PixelBuffer, BatchError>;
}

/// Where rendered photos go.
pub trait PhotoSink: Sync {
    fn store(&self, id: &str, image: &PixelBuffer) -> Result<(), BatchError>;
}

/// One photo and the parameters to render it with.
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub id: String,
    pub params: GradingParameters,
}

/// Cooperative cancellation, checked before each photo starts.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CheckpointState {
    completed: BTreeSet<String>,
}

/// Completed photo ids, optionally persisted as JSON after each photo.
#[derive(Debug, Default)]
pub struct BatchCheckpoint {
    path: Option<PathBuf>,
    state: Mutex<CheckpointState>,
}

impl BatchCheckpoint {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open a checkpoint file; a missing file starts empty. A leftover
    /// temp file from an interrupted write is ignored.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, BatchError> {
        let path = path.into();
        let state = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => CheckpointState::default(),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(
            path = %path.display(),
            completed = state.completed.len(),
            "opened batch checkpoint"
        );
        Ok(Self {
            path: Some(path),
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_done(&self, id: &str) -> bool {
        self.state.lock().completed.contains(id)
    }

    pub fn completed(&self) -> Vec<String> {
        self.state.lock().completed.iter().cloned().collect()
    }

    /// Record `id` as finished and persist.
    pub fn mark_done(&self, id: &str) -> Result<(), BatchError> {
        let mut state = self.state.lock();
        state.completed.insert(id.to_string());
        if let Some(path) = &self.path {
            write_atomic(path, serde_json::to_string_pretty(&*state)?.as_bytes())?;
        }
        Ok(())
    }
}

/// Sibling file the checkpoint is written to before being renamed over it.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Replace `path` with `contents` so readers see either the old file or
/// the new one, never a partial write.
fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write as _;

    let tmp = temp_path(path);
    let mut file = std::fs::File::create(&tmp)?;
    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);
    std::fs::rename(&tmp, path)
}

/// Per-photo results. One failure never aborts the rest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub rendered: Vec<String>,
    /// Already in the checkpoint.
    pub skipped: Vec<String>,
    /// `(id, error message)`.
    pub failed: Vec<(String, String)>,
    /// Not started because the batch was cancelled.
    pub cancelled: Vec<String>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.rendered.len() + self.skipped.len() + self.failed.len() + self.cancelled.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.cancelled.is_empty()
    }
}

enum Outcome {
    Rendered,
    Skipped,
    Failed(String),
    Cancelled,
}

/// Renders jobs in parallel with one backend per worker.
pub struct BatchRenderer<F> {
    factory: F,
    workers: usize,
}

impl<F> BatchRenderer<F>
where
    F: Fn() -> Box<dyn RenderBackend> + Sync + Send,
{
    /// `workers == 0` uses one thread per core.
    pub fn new(factory: F, workers: usize) -> Self {
        Self { factory, workers }
    }

    pub fn run(
        &self,
        jobs: &[BatchJob],
        source: &dyn PhotoSource,
        sink: &dyn PhotoSink,
        checkpoint: &BatchCheckpoint,
        cancel: &CancelToken,
    ) -> Result<BatchReport, BatchError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("filmgrade-batch-{i}"))
            .build()
            .map_err(|e| BatchError::Pool(e.to_string()))?;

        let total = jobs.len();
        let finished = AtomicUsize::new(0);
        tracing::info!(photos = total, workers = pool.current_num_threads(), "batch started");

        let outcomes: Vec<Outcome> = pool.install(|| {
            jobs.par_iter()
                .map_init(
                    || (self.factory)(),
                    |backend, job| {
                        if cancel.is_cancelled() {
                            return Outcome::Cancelled;
                        }
                        if checkpoint.is_done(&job.id) {
                            tracing::debug!(id = %job.id, "already exported, skipping");
                            return Outcome::Skipped;
                        }
                        let outcome = match render_one(backend.as_mut(), job, source, sink) {
                            Ok(()) => match checkpoint.mark_done(&job.id) {
                                Ok(()) => Outcome::Rendered,
                                Err(e) => Outcome::Failed(e.to_string()),
                            },
                            Err(e) => Outcome::Failed(e.to_string()),
                        };
                        let n = finished.fetch_add(1, Ordering::Relaxed) + 1;
                        match &outcome {
                            Outcome::Failed(reason) => {
                                tracing::warn!(id = %job.id, %reason, "photo failed");
                            }
                            _ => tracing::info!(id = %job.id, done = n, total, "photo rendered"),
                        }
                        outcome
                    },
                )
                .collect()
        });

        let mut report = BatchReport::default();
        for (job, outcome) in jobs.iter().zip(outcomes) {
            let id = job.id.clone();
            match outcome {
                Outcome::Rendered => report.rendered.push(id),
                Outcome::Skipped => report.skipped.push(id),
                Outcome::Failed(reason) => report.failed.push((id, reason)),
                Outcome::Cancelled => report.cancelled.push(id),
            }
        }
        tracing::info!(
            rendered = report.rendered.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            cancelled = report.cancelled.len(),
            "batch finished"
        );
        Ok(report)
    }
}

fn render_one(
    backend: &mut dyn RenderBackend,
    job: &BatchJob,
    source: &dyn PhotoSource,
    sink: &dyn PhotoSink,
) -> Result<(), BatchError> {
    let image = source.load(&job.id)?;
    let rendered = backend.render(&job.params, &image)?;
    sink.store(&job.id, &rendered)
}
