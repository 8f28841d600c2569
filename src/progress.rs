//! # Progress Reporting Module
//!
//! Questo modulo definisce gli eventi di progresso emessi dal dispatcher e i
//! sink che li consumano.
//!
//! ## Eventi:
//! - `FileProgress`: stato di un singolo file (queued, compressing, completed, error)
//! - `BatchProgress`: percentuale aggregata del batch (`phase: "batch"`)
//!
//! ## Sink disponibili:
//! - `ConsoleProgress`: progress bar `indicatif` per il terminale
//! - `JsonProgress` (in `json_output`): un oggetto JSON per riga su stdout
//! - `NullProgress`: scarta tutto
//!
//! La consegna è best-effort: nessun replay degli eventi persi.
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:00:12] [=========================>--------------] 8/12 (66%) [OK] report.pdf: 41.7% saved
//! ```

use crate::job::FileStatus;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-file progress event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileProgress {
    pub file_id: String,
    pub filename: String,
    pub status: FileStatus,
    pub percent: f64,
    /// `None` while the file is still queued
    pub worker_id: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Reduction for completed files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ratio_percent: Option<f64>,
}

impl FileProgress {
    pub fn new(file_id: &str, filename: &str, status: FileStatus, worker_id: Option<usize>) -> Self {
        let percent = match status {
            FileStatus::Queued => 0.0,
            FileStatus::Compressing => 30.0,
            FileStatus::Completed => 100.0,
            FileStatus::Error => 0.0,
        };
        Self {
            file_id: file_id.to_string(),
            filename: filename.to_string(),
            status,
            percent,
            worker_id,
            error: None,
            ratio_percent: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_ratio(mut self, ratio_percent: f64) -> Self {
        self.ratio_percent = Some(ratio_percent);
        self
    }
}

/// Aggregate batch progress event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchProgress {
    pub phase: String,
    pub percent: f64,
    pub current: usize,
    pub total: usize,
}

impl BatchProgress {
    pub fn new(current: usize, total: usize) -> Self {
        let percent = if total > 0 {
            (current as f64 / total as f64) * 100.0
        } else {
            100.0
        };
        Self {
            phase: "batch".to_string(),
            percent,
            current,
            total,
        }
    }

    /// The closing 100% event of a batch
    pub fn finished(total: usize) -> Self {
        Self {
            phase: "batch".to_string(),
            percent: 100.0,
            current: total,
            total,
        }
    }
}

/// Receiver of progress events; called concurrently from worker tasks
pub trait ProgressSink: Send + Sync {
    fn file_progress(&self, event: FileProgress);
    fn batch_progress(&self, event: BatchProgress);
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn file_progress(&self, _event: FileProgress) {}
    fn batch_progress(&self, _event: BatchProgress) {}
}

/// Terminal progress bar
#[derive(Clone)]
pub struct ConsoleProgress {
    bar: ProgressBar,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);

        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ConsoleProgress {
    fn file_progress(&self, event: FileProgress) {
        match event.status {
            FileStatus::Queued => self.bar.inc_length(1),
            FileStatus::Compressing => {
                self.bar.set_message(format!("[..] {}", event.filename));
            }
            FileStatus::Completed => {
                self.bar.set_message(format!(
                    "[OK] {}: {:.1}% saved",
                    event.filename,
                    event.ratio_percent.unwrap_or(0.0)
                ));
            }
            FileStatus::Error => {
                self.bar.set_message(format!("[ERROR] {}", event.filename));
            }
        }
    }

    fn batch_progress(&self, event: BatchProgress) {
        self.bar.set_length(event.total as u64);
        self.bar.set_position(event.current as u64);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every event in arrival order
    #[derive(Default)]
    pub struct RecordingSink {
        pub files: Mutex<Vec<FileProgress>>,
        pub batches: Mutex<Vec<BatchProgress>>,
    }

    impl RecordingSink {
        pub fn file_events(&self) -> Vec<FileProgress> {
            self.files.lock().unwrap().clone()
        }

        pub fn batch_events(&self) -> Vec<BatchProgress> {
            self.batches.lock().unwrap().clone()
        }

        pub fn count(&self, status: FileStatus) -> usize {
            self.file_events().iter().filter(|e| e.status == status).count()
        }
    }

    impl ProgressSink for RecordingSink {
        fn file_progress(&self, event: FileProgress) {
            self.files.lock().unwrap().push(event);
        }

        fn batch_progress(&self, event: BatchProgress) {
            self.batches.lock().unwrap().push(event);
        }
    }

    #[test]
    fn test_batch_progress_percent() {
        let event = BatchProgress::new(1, 4);
        assert_eq!(event.percent, 25.0);
        assert_eq!(event.phase, "batch");

        let done = BatchProgress::finished(4);
        assert_eq!(done.percent, 100.0);
        assert_eq!(done.current, 4);
    }

    #[test]
    fn test_file_progress_serialization() {
        let event = FileProgress::new("abc", "a.pdf", FileStatus::Error, Some(2)).with_error("boom");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["worker_id"], 2);
        assert_eq!(json["error"], "boom");
        assert!(json.get("ratio_percent").is_none());
    }

    #[test]
    fn test_console_progress_accepts_events() {
        let console = ConsoleProgress::new();
        console.file_progress(FileProgress::new("a", "a.pdf", FileStatus::Queued, None));
        console.file_progress(FileProgress::new("a", "a.pdf", FileStatus::Compressing, Some(0)));
        console.file_progress(FileProgress::new("a", "a.pdf", FileStatus::Completed, Some(0)).with_ratio(12.5));
        console.batch_progress(BatchProgress::finished(1));
        console.finish("done");
    }
}
