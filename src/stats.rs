//! # Statistics Module
//!
//! Contatori di sessione e totali storici dei byte risparmiati.
//!
//! ## Responsabilità:
//! - `StatisticsAccumulator`: contatori dietro un mutex, aggiornati una sola
//!   volta per batch dal service (dopo il join dei worker)
//! - `StatsSink`: destinatario dello snapshot pubblicato dopo ogni batch
//! - `StatsStore`: persiste i totali storici in un file JSON
//!
//! ## Strategia di persistence:
//! - Un unico file `stats.json` sotto `dirs::data_dir()/pdf-compressor`
//! - File mancante o corrotto → totali a zero (con warning)
//!
//! ## Esempio struttura stats file:
//! ```json
//! {
//!   "total_files": 42,
//!   "total_bytes_saved": 73400320
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub session_files: u64,
    /// Negative when outputs grew overall
    pub session_bytes_saved: i64,
    pub total_files: u64,
    pub total_bytes_saved: i64,
}

/// Session and lifetime counters shared by the service
#[derive(Debug, Default)]
pub struct StatisticsAccumulator {
    inner: Mutex<StatsSnapshot>,
}

impl StatisticsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from lifetime totals loaded from disk
    pub fn with_totals(total_files: u64, total_bytes_saved: i64) -> Self {
        Self {
            inner: Mutex::new(StatsSnapshot {
                total_files,
                total_bytes_saved,
                ..Default::default()
            }),
        }
    }

    /// Add one batch worth of results
    pub fn record(&self, files_completed: u64, bytes_saved: i64) -> StatsSnapshot {
        let mut stats = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        stats.session_files += files_completed;
        stats.session_bytes_saved += bytes_saved;
        stats.total_files += files_completed;
        stats.total_bytes_saved += bytes_saved;
        *stats
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        match self.inner.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Receiver of statistics snapshots
pub trait StatsSink: Send + Sync {
    fn publish(&self, snapshot: StatsSnapshot);
}

/// Ignores snapshots
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStats;

impl StatsSink for NullStats {
    fn publish(&self, _snapshot: StatsSnapshot) {}
}

/// Lifetime totals as stored on disk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifetimeTotals {
    pub total_files: u64,
    pub total_bytes_saved: i64,
}

/// JSON file holding lifetime totals
#[derive(Debug, Clone)]
pub struct StatsStore {
    path: PathBuf,
}

impl StatsStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// `<data_dir>/pdf-compressor/stats.json`
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("pdf-compressor")
            .join("stats.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read totals; a missing or unreadable file counts as zero
    pub fn load(&self) -> LifetimeTotals {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!("Ignoring corrupted stats file {}: {}", self.path.display(), e);
                LifetimeTotals::default()
            }),
            Err(_) => LifetimeTotals::default(),
        }
    }

    /// Accumulator seeded with the stored totals
    pub fn accumulator(&self) -> StatisticsAccumulator {
        let totals = self.load();
        StatisticsAccumulator::with_totals(totals.total_files, totals.total_bytes_saved)
    }

    pub fn save(&self, totals: LifetimeTotals) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating stats directory {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(&totals)?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("writing stats file {}", self.path.display()))?;
        Ok(())
    }
}

impl StatsSink for StatsStore {
    fn publish(&self, snapshot: StatsSnapshot) {
        let totals = LifetimeTotals {
            total_files: snapshot.total_files,
            total_bytes_saved: snapshot.total_bytes_saved,
        };
        match self.save(totals) {
            Ok(()) => debug!("Stats saved to {}", self.path.display()),
            Err(e) => warn!("Failed to persist statistics: {:#}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_accumulator_records_session_and_totals() {
        let stats = StatisticsAccumulator::with_totals(10, 5000);
        stats.record(3, 1200);
        let snapshot = stats.record(1, -200);

        assert_eq!(snapshot.session_files, 4);
        assert_eq!(snapshot.session_bytes_saved, 1000);
        assert_eq!(snapshot.total_files, 14);
        assert_eq!(snapshot.total_bytes_saved, 6000);
        assert_eq!(stats.snapshot(), snapshot);
    }

    #[test]
    fn test_accumulator_is_shared_across_threads() {
        let stats = Arc::new(StatisticsAccumulator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = stats.clone();
                std::thread::spawn(move || stats.record(1, 10))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(stats.snapshot().session_files, 8);
        assert_eq!(stats.snapshot().total_bytes_saved, 80);
    }

    #[test]
    fn test_store_publish_and_reload() {
        let temp = TempDir::new().unwrap();
        let store = StatsStore::new(temp.path().join("nested").join("stats.json"));
        assert_eq!(store.load(), LifetimeTotals::default());

        store.publish(StatsSnapshot {
            session_files: 2,
            session_bytes_saved: 300,
            total_files: 7,
            total_bytes_saved: 900,
        });

        let reloaded = store.accumulator().snapshot();
        assert_eq!(reloaded.total_files, 7);
        assert_eq!(reloaded.total_bytes_saved, 900);
        assert_eq!(reloaded.session_files, 0);
    }

    #[test]
    fn test_corrupted_store_counts_as_zero() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("stats.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(StatsStore::new(path).load(), LifetimeTotals::default());
    }
}
