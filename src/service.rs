//! # Compression Service Module
//!
//! Orchestratore del batch: è l'unico punto d'ingresso per i consumatori
//! (CLI o frontend).
//!
//! ## Flusso di esecuzione:
//! 1. **Validazione**: nessun file → "no files provided"; nessun motore → "engine not found"
//! 2. **Registrazione**: ogni batch riceve un id, una run directory
//!    `<work_dir>/<batch id>` e un proprio `CancellationSignal`
//! 3. **Pulizia**: rimuove le run directory rimaste, mai quelle di batch ancora attivi
//! 4. **Risoluzione**: profilo e opzioni dalla richiesta, poi dalle preferenze, poi default
//! 5. **Dispatch**: `BatchDispatcher` elabora tutti i job
//! 6. **Statistiche**: aggiornate una sola volta e pubblicate allo `StatsSink`
//! 7. **Salvataggio**: copia opzionale degli output in una cartella scelta
//!
//! ## Batch concorrenti:
//! - Più `compress_all` possono girare sullo stesso service
//! - `CancelHandle::cancel` ferma i batch attivi in quel momento, non quelli futuri
//!
//! ## Error handling:
//! - Solo gli errori pre-batch producono `success = false`
//! - Errori delle preferenze → default con warning
//! - Errori di copia → warning, il batch resta valido

use crate::{
    config::Settings,
    dispatcher::{BatchDispatcher, CancellationSignal},
    engine::{EngineEnvironment, EngineInvoker, EngineLocator},
    error::CompressError,
    file_manager::{cleanup_stale_jobs, format_signed_size, FileManager, LocalFileManager},
    job::{unique_id, BatchResult, FileJob},
    options::{CompressionOptions, CompressionProfile},
    preferences::PreferenceStore,
    progress::{NullProgress, ProgressSink},
    stats::{NullStats, StatisticsAccumulator, StatsSink, StatsSnapshot},
};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tracing::{debug, info, warn};

/// Where completed outputs are copied after the batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveLocation {
    /// Preferred download folder
    DownloadFolder,
    Directory(PathBuf),
}

/// One batch request
#[derive(Debug, Clone, Default)]
pub struct CompressionRequest {
    pub files: Vec<PathBuf>,
    pub profile: Option<CompressionProfile>,
    pub options: Option<CompressionOptions>,
    pub save_to: Option<SaveLocation>,
}

impl CompressionRequest {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self {
            files,
            ..Default::default()
        }
    }

    pub fn with_profile(mut self, profile: CompressionProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn with_options(mut self, options: CompressionOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn save_to(mut self, location: SaveLocation) -> Self {
        self.save_to = Some(location);
        self
    }
}

/// Cancels the batches running on a service
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    live: Arc<Mutex<HashMap<String, CancellationSignal>>>,
}

impl CancelHandle {
    fn live(&self) -> MutexGuard<'_, HashMap<String, CancellationSignal>> {
        match self.live.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Signal every running batch; returns how many were signalled
    pub fn cancel(&self) -> usize {
        let live = self.live();
        for signal in live.values() {
            signal.cancel();
        }
        live.len()
    }

    /// Number of batches currently running
    pub fn running(&self) -> usize {
        self.live().len()
    }

    fn register(&self, batch_id: &str) -> CancellationSignal {
        let signal = CancellationSignal::new();
        self.live().insert(batch_id.to_string(), signal.clone());
        signal
    }

    fn live_ids(&self) -> HashSet<String> {
        self.live().keys().cloned().collect()
    }
}

/// Registration of one running batch, dropped when the batch ends
struct ActiveBatch {
    handle: CancelHandle,
    id: String,
}

impl Drop for ActiveBatch {
    fn drop(&mut self) {
        self.handle.live().remove(&self.id);
    }
}

/// Batch compression service
pub struct CompressionService {
    settings: Settings,
    locator: EngineLocator,
    engine: RwLock<Option<Arc<EngineEnvironment>>>,
    preferences: Arc<dyn PreferenceStore>,
    files: Arc<dyn FileManager>,
    stats: StatisticsAccumulator,
    stats_sink: Arc<dyn StatsSink>,
    progress: Arc<dyn ProgressSink>,
    batches: CancelHandle,
    // held while a batch registers and cleans the work dir
    housekeeping: tokio::sync::Mutex<()>,
}

impl CompressionService {
    /// Create the service and locate the engine once
    pub fn new(settings: Settings, locator: EngineLocator, preferences: Arc<dyn PreferenceStore>) -> Self {
        let engine = match locator.locate() {
            Ok(env) => Some(Arc::new(env)),
            Err(e) => {
                warn!("Compression unavailable: {}", e);
                None
            }
        };

        Self {
            settings,
            locator,
            engine: RwLock::new(engine),
            preferences,
            files: Arc::new(LocalFileManager),
            stats: StatisticsAccumulator::new(),
            stats_sink: Arc::new(NullStats),
            progress: Arc::new(NullProgress),
            batches: CancelHandle::default(),
            housekeeping: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_file_manager(mut self, files: Arc<dyn FileManager>) -> Self {
        self.files = files;
        self
    }

    pub fn with_stats(mut self, stats: StatisticsAccumulator, sink: Arc<dyn StatsSink>) -> Self {
        self.stats = stats;
        self.stats_sink = sink;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Handle reaching every batch running when `cancel` is called
    pub fn cancel_handle(&self) -> CancelHandle {
        self.batches.clone()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// The located engine, if any
    pub fn engine(&self) -> Result<Arc<EngineEnvironment>, CompressError> {
        let guard = match self.engine.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        (*guard).clone().ok_or(CompressError::EngineNotFound)
    }

    /// Run the locator again, e.g. after Ghostscript was installed
    pub fn relocate_engine(&self) -> Result<Arc<EngineEnvironment>, CompressError> {
        let located = self.locator.locate().map(Arc::new);
        let mut guard = match self.engine.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = located.as_ref().ok().cloned();
        located
    }

    /// Compress every file of the request
    pub async fn compress_all(&self, request: CompressionRequest) -> BatchResult {
        let CompressionRequest {
            files,
            profile,
            options,
            save_to,
        } = request;
        let total_files = files.len();

        let engine = match self.preflight(&files) {
            Ok(engine) => engine,
            Err(e) => {
                warn!("Batch rejected: {}", e);
                return BatchResult::failed(e.to_string(), total_files, profile.unwrap_or_default());
            }
        };

        let (batch, cancel) = self.begin_batch().await;
        let run_dir = self.settings.work_dir.join(&batch.id);
        debug!("Batch {} running in {}", batch.id, run_dir.display());

        let profile = profile.unwrap_or_else(|| self.default_profile());
        let options = options.unwrap_or_else(|| self.default_options()).normalized();

        let dispatcher = BatchDispatcher::new(EngineInvoker::new(engine), run_dir)
            .with_parallelism_cap(self.settings.max_workers)
            .with_cancellation(cancel);

        let jobs = FileJob::from_paths(files);
        let mut result = dispatcher.run(jobs, profile, &options, self.progress.clone()).await;

        let snapshot = self.stats.record(result.completed_count() as u64, result.bytes_saved());
        self.stats_sink.publish(snapshot);

        if let Some(location) = save_to {
            self.save_outputs(&mut result, &location);
        }

        info!(
            "Batch finished: {} completed, {} failed, {} saved ({:.1}%)",
            result.completed_count(),
            result.error_count(),
            format_signed_size(result.bytes_saved()),
            result.overall_ratio_percent
        );

        result
    }

    /// Checks that must pass before anything is dispatched
    fn preflight(&self, files: &[PathBuf]) -> Result<Arc<EngineEnvironment>, CompressError> {
        if files.is_empty() {
            return Err(CompressError::NoInputFiles);
        }
        self.engine()
    }

    /// Register a new batch and clear run directories no live batch owns
    async fn begin_batch(&self) -> (ActiveBatch, CancellationSignal) {
        let _housekeeping = self.housekeeping.lock().await;

        let id = unique_id(self.batches.running(), &self.settings.work_dir);
        let cancel = self.batches.register(&id);
        let batch = ActiveBatch {
            handle: self.batches.clone(),
            id,
        };

        let removed = cleanup_stale_jobs(&self.settings.work_dir, &self.batches.live_ids()).await;
        if removed > 0 {
            info!("Removed {} leftover run directories", removed);
        }
        (batch, cancel)
    }

    fn default_profile(&self) -> CompressionProfile {
        self.preferences.get_default_profile().unwrap_or_else(|e| {
            warn!("Could not read default profile, using balanced: {}", e);
            CompressionProfile::default()
        })
    }

    fn default_options(&self) -> CompressionOptions {
        self.preferences.get_default_options().unwrap_or_else(|e| {
            warn!("Could not read default options, using defaults: {}", e);
            CompressionOptions::default()
        })
    }

    fn save_outputs(&self, result: &mut BatchResult, location: &SaveLocation) {
        let dest_dir = match location {
            SaveLocation::Directory(dir) => dir.clone(),
            SaveLocation::DownloadFolder => match self.preferences.get_download_folder() {
                Ok(dir) => dir,
                Err(e) => {
                    warn!("Outputs not saved: {}", e);
                    return;
                }
            },
        };

        for outcome in result.outcomes.iter_mut().filter(|o| o.is_completed()) {
            let Some(ref output) = outcome.output_path else {
                continue;
            };
            match self.files.copy_to(output, &dest_dir) {
                Ok(saved) => {
                    info!("Saved {}", saved.display());
                    outcome.saved_path = Some(saved);
                }
                Err(e) => warn!("Could not save {}: {}", outcome.output_name, e),
            }
        }
    }
}
