//! # Batch Dispatcher Module
//!
//! Worker pool a dimensione fissa che distribuisce i job sui worker.
//!
//! ## Flusso di esecuzione:
//! 1. **Parallelismo**: min(CPU disponibili, cap); fisso per tutto il batch
//! 2. **Submission**: ogni job entra nella coda condivisa, evento `Queued`
//! 3. **Worker**: `min(parallelismo, job)` worker prelevano un job alla volta
//! 4. **Per job**: `Compressing` → grayscale (opzionale) → engine → `Completed` | `Error`
//! 5. **Supervisor**: attende tutti i worker e poi chiude lo stream dei risultati
//! 6. **Raccolta**: il chiamante consuma lo stream ed emette il progresso aggregato
//!
//! ## Cancellazione:
//! - Cooperativa: il segnale viene controllato prima di prelevare un job e
//!   prima di ogni invocazione del motore
//! - I processi Ghostscript già avviati NON vengono terminati
//!
//! ## Error handling:
//! - L'errore di un file produce un outcome `Error` e non tocca gli altri
//! - Nessun retry: un fallimento è terminale per quel batch
//!
//! ## Ordinamento:
//! - Gli outcome arrivano in ordine di completamento, non di submission

use crate::{
    engine::{ArgumentBuilder, EngineInvoker, GrayscaleStage},
    error::CompressError,
    job::{file_name_of, BatchResult, FileJob, FileOutcome, FileStatus},
    options::{CompressionOptions, CompressionProfile},
    progress::{BatchProgress, FileProgress, ProgressSink},
};
use futures::future::join_all;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Hard cap on concurrent engine processes
pub const MAX_PARALLELISM: usize = 8;

/// Batch-scoped cooperative cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal(Arc<AtomicBool>);

impl CancellationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// State shared by the workers of one batch
struct WorkerContext {
    invoker: EngineInvoker,
    work_dir: PathBuf,
    profile: CompressionProfile,
    options: CompressionOptions,
    queue: Mutex<VecDeque<FileJob>>,
    cancel: CancellationSignal,
    sink: Arc<dyn ProgressSink>,
}

impl WorkerContext {
    fn next_job(&self) -> Option<FileJob> {
        match self.queue.lock() {
            Ok(mut queue) => queue.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        }
    }

    fn ensure_not_cancelled(&self) -> Result<(), CompressError> {
        if self.cancel.is_cancelled() {
            Err(CompressError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Bounded worker pool driving the engine for every job of a batch
#[derive(Clone)]
pub struct BatchDispatcher {
    invoker: EngineInvoker,
    work_dir: PathBuf,
    parallelism_cap: usize,
    cancel: CancellationSignal,
}

impl BatchDispatcher {
    pub fn new(invoker: EngineInvoker, work_dir: PathBuf) -> Self {
        Self {
            invoker,
            work_dir,
            parallelism_cap: MAX_PARALLELISM,
            cancel: CancellationSignal::new(),
        }
    }

    pub fn with_parallelism_cap(mut self, cap: usize) -> Self {
        self.parallelism_cap = cap.max(1);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationSignal) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation(&self) -> CancellationSignal {
        self.cancel.clone()
    }

    /// Worker count before clamping to the number of jobs
    pub fn parallelism(&self) -> usize {
        let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        cpus.min(self.parallelism_cap)
    }

    /// Process every job and return the folded result
    pub async fn run(
        &self,
        jobs: Vec<FileJob>,
        profile: CompressionProfile,
        options: &CompressionOptions,
        sink: Arc<dyn ProgressSink>,
    ) -> BatchResult {
        let total = jobs.len();

        for job in &jobs {
            sink.file_progress(FileProgress::new(job.id(), &job.file_name(), FileStatus::Queued, None));
        }

        let workers = self.parallelism().min(total);
        info!(
            "Dispatching {} files to {} workers (profile: {}, grayscale: {})",
            total, workers, profile, options.to_grayscale
        );

        let (tx, mut rx) = mpsc::channel::<FileOutcome>(total.max(1));
        let ctx = Arc::new(WorkerContext {
            invoker: self.invoker.clone(),
            work_dir: self.work_dir.clone(),
            profile,
            options: options.clone(),
            queue: Mutex::new(jobs.into()),
            cancel: self.cancel.clone(),
            sink: sink.clone(),
        });

        let handles: Vec<_> = (0..workers)
            .map(|worker_id| tokio::spawn(Self::worker(worker_id, ctx.clone(), tx.clone())))
            .collect();

        let supervisor = tokio::spawn(async move {
            for (worker_id, result) in join_all(handles).await.into_iter().enumerate() {
                if let Err(e) = result {
                    error!("Worker {} terminated abnormally: {}", worker_id, e);
                }
            }
            // Last sender: dropping it closes the outcome stream
            drop(tx);
        });

        let mut outcomes = Vec::with_capacity(total);
        while let Some(outcome) = rx.recv().await {
            outcomes.push(outcome);
            sink.batch_progress(BatchProgress::new(outcomes.len(), total));
        }

        if let Err(e) = supervisor.await {
            error!("Batch supervisor failed: {}", e);
        }
        sink.batch_progress(BatchProgress::finished(total));

        if self.cancel.is_cancelled() {
            warn!(
                "Batch cancelled: {} of {} files processed, running engine processes were left to finish",
                outcomes.len(),
                total
            );
        }

        BatchResult::from_outcomes(outcomes, total, profile)
    }

    async fn worker(worker_id: usize, ctx: Arc<WorkerContext>, tx: mpsc::Sender<FileOutcome>) {
        debug!("Worker {} started", worker_id);
        loop {
            if ctx.cancel.is_cancelled() {
                debug!("Worker {} stopping: batch cancelled", worker_id);
                break;
            }
            let Some(job) = ctx.next_job() else {
                break;
            };

            let outcome = Self::process_job(&ctx, &job, worker_id).await;
            if tx.send(outcome).await.is_err() {
                warn!("Worker {}: outcome stream closed", worker_id);
                break;
            }
        }
        debug!("Worker {} finished", worker_id);
    }

    async fn process_job(ctx: &WorkerContext, job: &FileJob, worker_id: usize) -> FileOutcome {
        let filename = job.file_name();
        let mut outcome = FileOutcome::queued(job);
        outcome.advance(FileStatus::Compressing);
        ctx.sink.file_progress(FileProgress::new(job.id(), &filename, FileStatus::Compressing, Some(worker_id)));

        match Self::compress_job(ctx, job).await {
            Ok((output_path, original_bytes, compressed_bytes)) => {
                outcome.complete(output_path, original_bytes, compressed_bytes);
                debug!(
                    "[OK] {} -> {} ({:.1}%)",
                    filename, outcome.output_name, outcome.ratio_percent
                );
                ctx.sink.file_progress(
                    FileProgress::new(job.id(), &filename, FileStatus::Completed, Some(worker_id))
                        .with_ratio(outcome.ratio_percent),
                );
            }
            Err(e) => {
                let message = e.to_string();
                warn!("[ERROR] {}: {}", job.source_path().display(), message);
                outcome.fail(message.clone());
                ctx.sink.file_progress(
                    FileProgress::new(job.id(), &filename, FileStatus::Error, Some(worker_id)).with_error(message),
                );
            }
        }

        outcome
    }

    /// Grayscale pre-pass (optional) then main compression into the job directory
    async fn compress_job(ctx: &WorkerContext, job: &FileJob) -> Result<(PathBuf, u64, u64), CompressError> {
        let source = job.source_path();
        let original_bytes = tokio::fs::metadata(source).await?.len();

        let job_dir = ctx.work_dir.join(job.id());
        tokio::fs::create_dir_all(&job_dir).await?;
        let output_path = job_dir.join(compressed_name(source));

        let grayscale = if ctx.options.to_grayscale {
            ctx.ensure_not_cancelled()?;
            Some(GrayscaleStage::new(&ctx.invoker).convert_to_grayscale(source, &job_dir).await?)
        } else {
            None
        };
        let input: &Path = grayscale.as_ref().map(|g| g.path()).unwrap_or(source);

        ctx.ensure_not_cancelled()?;
        let argv = ArgumentBuilder::compression_args(ctx.profile, &ctx.options, input, &output_path);
        let run = ctx.invoker.invoke(&argv, &output_path).await?;
        debug!("{} compressed in {:.1}s", job.file_name(), run.elapsed.as_secs_f64());
        if !run.output.trim().is_empty() {
            debug!("engine output for {}: {}", job.file_name(), run.output.trim());
        }

        if let Some(intermediate) = grayscale {
            if let Err(e) = intermediate.close() {
                warn!("Failed to remove grayscale intermediate for {}: {}", source.display(), e);
            }
        }

        let compressed_bytes = tokio::fs::metadata(&output_path).await?.len();
        Ok((output_path, original_bytes, compressed_bytes))
    }
}

/// `report.pdf` -> `report_compressed.pdf`
fn compressed_name(source: &Path) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| file_name_of(source));
    format!("{}_compressed.pdf", stem)
}
