//! # PDF Batch Compressor Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `config`: Settings di esecuzione e validazione parametri
//! - `error`: Tipi di errore custom (`CompressError`)
//! - `options`: Profili e opzioni di compressione
//! - `engine`: Localizzazione, argv e invocazione di Ghostscript
//! - `job`: Job per file, outcome e risultato del batch
//! - `dispatcher`: Worker pool con cancellazione cooperativa
//! - `service`: Orchestratore del batch
//! - `preferences` / `stats`: Persistence di preferenze e statistiche
//! - `file_manager`: Discovery dei PDF e copia sicura dei risultati
//! - `progress` / `json_output`: Progress bar e output JSON lines
//!
//! ## Utilizzo:
//! ```rust,ignore
//! use pdf_batch_compressor::{CompressionRequest, CompressionService, EngineLocator, Settings};
//!
//! let service = CompressionService::new(Settings::default(), EngineLocator::new(None, true), prefs);
//! let result = service.compress_all(CompressionRequest::new(files)).await;
//! ```

pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod file_manager;
pub mod job;
pub mod json_output;
pub mod options;
pub mod preferences;
pub mod progress;
pub mod service;
pub mod stats;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::Settings;
pub use dispatcher::{BatchDispatcher, CancellationSignal};
pub use engine::{EngineEnvironment, EngineLocator, EngineSource};
pub use error::CompressError;
pub use job::{BatchResult, FileJob, FileOutcome, FileStatus};
pub use options::{CompressionOptions, CompressionProfile, OptionsPatch};
pub use preferences::{JsonPreferenceStore, PreferenceStore};
pub use service::{CancelHandle, CompressionRequest, CompressionService, SaveLocation};
pub use stats::{StatsSnapshot, StatsStore};
