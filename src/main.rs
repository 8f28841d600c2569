//! # PDF Compressor - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del logging con `tracing` (stderr in modalità JSON)
//! - Caricamento di settings, preferenze e statistiche storiche
//! - Creazione del service e avvio del batch
//! - Ctrl-C → cancellazione cooperativa del batch
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI (input, profilo, opzioni, workers, ...)
//! 2. Configura il logging (`RUST_LOG` o INFO/DEBUG a seconda di `--verbose`)
//! 3. Carica `Settings` e applica gli override della CLI
//! 4. Espande le directory in input nei PDF che contengono
//! 5. Esegue il batch e stampa il riepilogo (o il messaggio JSON `complete`)
//!
//! ## Esempio di utilizzo:
//! ```bash
//! pdf-compressor ~/Documents/scans --profile aggressive --grayscale --output ~/Desktop/small
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pdf_batch_compressor::{
    file_manager::{find_pdf_files, format_signed_size, format_size},
    json_output::{JsonMessage, JsonProgress},
    progress::{ConsoleProgress, ProgressSink},
    BatchResult, CompressionOptions, CompressionProfile, CompressionRequest, CompressionService, EngineLocator,
    FileStatus, JsonPreferenceStore, PreferenceStore, SaveLocation, Settings, StatsStore,
};

#[derive(Parser)]
#[command(name = "pdf-compressor")]
#[command(about = "Compress batches of PDF files with Ghostscript")]
struct Args {
    /// PDF files or directories containing PDFs
    inputs: Vec<PathBuf>,

    /// Compression profile: balanced, aggressive or maximum
    #[arg(short, long)]
    profile: Option<String>,

    /// Target image resolution in DPI
    #[arg(long)]
    dpi: Option<u32>,

    /// Image quality (1-100)
    #[arg(short, long)]
    quality: Option<u8>,

    /// Output PDF compatibility level (1.3 - 1.7, 2.0)
    #[arg(long)]
    pdf_version: Option<String>,

    /// Strip document metadata
    #[arg(long)]
    strip_metadata: bool,

    /// Do not embed fonts
    #[arg(long)]
    no_embed_fonts: bool,

    /// Generate page thumbnails
    #[arg(long)]
    thumbnails: bool,

    /// Convert to grayscale before compressing
    #[arg(long)]
    grayscale: bool,

    /// Directory where compressed files are copied
    #[arg(short, long, conflicts_with = "save_to_downloads")]
    output: Option<PathBuf>,

    /// Copy compressed files into the download folder
    #[arg(long)]
    save_to_downloads: bool,

    /// Maximum number of parallel engine processes
    #[arg(short, long)]
    workers: Option<usize>,

    /// Path to the Ghostscript binary
    #[arg(long)]
    engine: Option<PathBuf>,

    /// Never fall back to a Ghostscript found on PATH
    #[arg(long)]
    no_system_engine: bool,

    /// Settings file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output progress and results as JSON lines
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Print which engine would be used and exit
    #[arg(long)]
    engine_info: bool,
}

impl Args {
    /// Preference defaults with command line overrides applied
    fn options(&self, mut options: CompressionOptions) -> CompressionOptions {
        if let Some(dpi) = self.dpi {
            options.target_dpi = dpi;
        }
        if let Some(quality) = self.quality {
            options.image_quality = quality;
        }
        if let Some(ref version) = self.pdf_version {
            options.pdf_version = version.clone();
        }
        options.strip_metadata |= self.strip_metadata;
        options.generate_thumbnails |= self.thumbnails;
        options.to_grayscale |= self.grayscale;
        if self.no_embed_fonts {
            options.embed_fonts = false;
        }
        options
    }

    fn save_location(&self, auto_save: bool) -> Option<SaveLocation> {
        match self.output {
            Some(ref dir) => Some(SaveLocation::Directory(dir.clone())),
            None if self.save_to_downloads || auto_save => Some(SaveLocation::DownloadFolder),
            None => None,
        }
    }
}

fn init_logging(verbose: bool, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    // stdout is reserved for JSON messages
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn load_settings(args: &Args) -> Result<Settings> {
    let mut settings = match args.config {
        Some(ref path) => Settings::from_file(path)
            .await
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => Settings::default(),
    };

    if let Some(workers) = args.workers {
        settings.max_workers = workers;
    }
    if let Some(ref engine) = args.engine {
        settings.engine_path = Some(engine.clone());
    }
    if args.no_system_engine {
        settings.allow_system_engine = false;
    }
    settings.json_output |= args.json;

    settings.validate()?;
    Ok(settings)
}

fn print_engine_info(locator: &EngineLocator) -> Result<()> {
    let env = locator.locate()?;
    println!("Engine:    {}", env.binary_path.display());
    println!("Source:    {:?}", env.source);
    for path in &env.library_search_paths {
        println!("Libraries: {}", path.display());
    }
    for path in &env.resource_search_paths {
        println!("Resources: {}", path.display());
    }
    Ok(())
}

fn print_summary(result: &BatchResult) {
    for outcome in &result.outcomes {
        match outcome.status {
            FileStatus::Completed => {
                let location = outcome.saved_path.as_ref().or(outcome.output_path.as_ref());
                println!(
                    "[OK] {}: {} -> {} ({:.1}%){}",
                    outcome.original_name,
                    format_size(outcome.original_bytes),
                    format_size(outcome.compressed_bytes),
                    outcome.ratio_percent,
                    location.map(|p| format!(" -> {}", p.display())).unwrap_or_default()
                );
            }
            _ => println!(
                "[ERROR] {}: {}",
                outcome.original_name,
                outcome.error_message.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.json);

    let settings = load_settings(&args).await?;
    let locator = EngineLocator::new(settings.engine_path.clone(), settings.allow_system_engine);

    if args.engine_info {
        return print_engine_info(&locator);
    }

    let preferences = Arc::new(
        JsonPreferenceStore::load(settings.preferences_path.clone())
            .await
            .context("loading preferences")?,
    );
    let stats_store = StatsStore::new(settings.stats_path.clone());

    let console = (!settings.json_output).then(ConsoleProgress::new);
    let progress: Arc<dyn ProgressSink> = match console {
        Some(ref bar) => Arc::new(bar.clone()),
        None => Arc::new(JsonProgress),
    };

    let files = find_pdf_files(&args.inputs);
    info!("Found {} PDF files to compress", files.len());

    let mut request = CompressionRequest::new(files)
        .with_options(args.options(preferences.get_default_options().unwrap_or_default()));
    if let Some(ref name) = args.profile {
        request = request.with_profile(CompressionProfile::parse_lenient(name));
    }
    request.save_to = args.save_location(preferences.preferences().auto_save);

    let service = CompressionService::new(settings.clone(), locator, preferences)
        .with_stats(stats_store.accumulator(), Arc::new(stats_store))
        .with_progress(progress);

    let cancel = service.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Cancellation requested: no new files will start, running engine processes will finish");
            cancel.cancel();
        }
    });

    let start = Instant::now();
    let result = service.compress_all(request).await;
    let stats = service.stats();

    if !result.success {
        let message = result.error.clone().unwrap_or_else(|| "batch failed".to_string());
        if settings.json_output {
            JsonMessage::error(message.clone(), None).emit();
        }
        return Err(anyhow::anyhow!(message));
    }

    if settings.json_output {
        JsonMessage::complete(result.clone(), stats, start.elapsed().as_secs_f64()).emit();
    } else {
        if let Some(bar) = console {
            bar.finish("done");
        }
        print_summary(&result);
        info!("=== Compression Complete ===");
        info!("Files compressed: {}/{}", result.completed_count(), result.total_files);
        info!("Errors: {}", result.error_count());
        info!(
            "Bytes saved this run: {} ({:.2}%)",
            format_signed_size(result.bytes_saved()),
            result.overall_ratio_percent
        );
        info!("--- Historical Stats ---");
        info!("Total files ever compressed: {}", stats.total_files);
        info!("Total bytes saved historically: {}", format_signed_size(stats.total_bytes_saved));
    }

    if result.error_count() > 0 || result.completed_count() < result.total_files {
        return Err(anyhow::anyhow!(
            "{} of {} files were not compressed",
            result.total_files - result.completed_count(),
            result.total_files
        ));
    }

    Ok(())
}
