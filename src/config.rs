//! # Configuration Management Module
//!
//! Questo modulo gestisce la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Settings` con i parametri di esecuzione
//! - Fornisce validazione dei parametri
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce valori di default sensati per tutti i parametri
//!
//! ## Parametri di configurazione:
//! - `work_dir`: directory dei job (default: `<tmp>/pdf-compressor`)
//! - `max_workers`: cap al parallelismo (default: 8, deve essere > 0)
//! - `engine_path`: override esplicito del binario Ghostscript
//! - `allow_system_engine`: accetta Ghostscript dal PATH (default: true)
//! - `preferences_path` / `stats_path`: file di persistence
//! - `json_output`: output JSON lines per uso programmatico
//!
//! ## Esempio:
//! ```rust,ignore
//! let settings = Settings {
//!     max_workers: 4,
//!     allow_system_engine: false,
//!     ..Default::default()
//! };
//! settings.validate()?;
//! ```

use crate::dispatcher::MAX_PARALLELISM;
use crate::preferences::JsonPreferenceStore;
use crate::stats::StatsStore;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Runtime settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root of per-job working directories
    pub work_dir: PathBuf,
    /// Upper bound on concurrent engine processes
    pub max_workers: usize,
    /// Explicit Ghostscript binary
    pub engine_path: Option<PathBuf>,
    /// Accept a Ghostscript found on PATH
    pub allow_system_engine: bool,
    pub preferences_path: PathBuf,
    pub stats_path: PathBuf,
    /// Output progress and status as JSON for programmatic use
    pub json_output: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir().join("pdf-compressor"),
            max_workers: MAX_PARALLELISM,
            engine_path: None,
            allow_system_engine: true,
            preferences_path: JsonPreferenceStore::default_path(),
            stats_path: StatsStore::default_path(),
            json_output: false,
        }
    }
}

impl Settings {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(anyhow::anyhow!("Number of workers must be greater than 0"));
        }

        if self.work_dir.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("Working directory must not be empty"));
        }

        if self.work_dir.exists() && !self.work_dir.is_dir() {
            return Err(anyhow::anyhow!(
                "Working directory is not a directory: {}",
                self.work_dir.display()
            ));
        }

        // A missing engine override is not an error here: the locator warns
        // and continues with the next candidate.
        if let Some(ref engine) = self.engine_path {
            if engine.as_os_str().is_empty() {
                return Err(anyhow::anyhow!("Engine path must not be empty"));
            }
        }

        Ok(())
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let settings: Settings = serde_json::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}
