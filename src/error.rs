//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom della libreria.
//!
//! ## Responsabilità:
//! - Definisce `CompressError` per categorizzare tutti gli errori possibili
//! - Distingue errori fatali pre-batch da errori isolati sul singolo file
//! - Integra con `thiserror` per automatic error conversion
//!
//! ## Categorie di errori:
//! - `EngineNotFound`: nessun Ghostscript valido (blocca tutto il batch)
//! - `EngineSpawn` / `EngineExecutionFailed` / `EngineOutputMissing`: errori per file
//! - `InvalidOptions`: patch delle preferenze rifiutata
//! - `Cancelled`: batch cancellato prima dell'invocazione
//! - `NoInputFiles`: richiesta vuota
//!
//! ## Esempio:
//! ```rust,ignore
//! if !output.exists() {
//!     return Err(CompressError::EngineOutputMissing(output.to_path_buf()));
//! }
//! ```

use std::path::PathBuf;

/// Custom error types for batch compression
#[derive(thiserror::Error, Debug)]
pub enum CompressError {
    #[error("engine not found")]
    EngineNotFound,

    #[error("failed to start engine {binary}: {source}")]
    EngineSpawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("engine failed with exit code {}: {output}", code.map(|c| c.to_string()).unwrap_or_else(|| "none".to_string()))]
    EngineExecutionFailed { code: Option<i32>, output: String },

    #[error("engine reported success but did not create {}", .0.display())]
    EngineOutputMissing(PathBuf),

    #[error("invalid options: {0}")]
    InvalidOptions(String),

    #[error("compression cancelled")]
    Cancelled,

    #[error("no files provided")]
    NoInputFiles,

    #[error("preferences error: {0}")]
    Preferences(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
