//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON per l'integrazione con
//! frontend desktop o script.
//!
//! ## Responsabilità:
//! - Emette un messaggio JSON per riga su stdout
//! - Implementa `ProgressSink` così il dispatcher non conosce il formato
//! - Riassume il `BatchResult` finale e le statistiche di sessione
//!
//! ## Tipi di messaggi:
//! - `file_progress`: cambio di stato di un singolo file
//! - `batch_progress`: percentuale aggregata del batch
//! - `complete`: fine batch con risultato e statistiche
//! - `error`: errore che impedisce l'avvio del batch

use crate::job::{BatchResult, FileStatus};
use crate::progress::{BatchProgress, FileProgress, ProgressSink};
use crate::stats::StatsSnapshot;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Tipo di messaggio JSON
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JsonMessage {
    /// Cambio di stato di un file
    #[serde(rename = "file_progress")]
    FileProgress {
        file_id: String,
        filename: String,
        status: FileStatus,
        percent: f64,
        worker_id: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        ratio_percent: Option<f64>,
    },

    /// Progresso aggregato
    #[serde(rename = "batch_progress")]
    BatchProgress {
        phase: String,
        percent: f64,
        current: usize,
        total: usize,
    },

    /// Batch completato
    #[serde(rename = "complete")]
    Complete {
        result: BatchResult,
        stats: StatsSnapshot,
        duration_seconds: f64,
    },

    /// Errore generale
    #[serde(rename = "error")]
    Error {
        message: String,
        details: Option<String>,
    },
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            let mut stdout = std::io::stdout().lock();
            let _ = writeln!(stdout, "{}", json);
            let _ = stdout.flush();
        }
    }

    pub fn complete(result: BatchResult, stats: StatsSnapshot, duration_seconds: f64) -> Self {
        Self::Complete {
            result,
            stats,
            duration_seconds,
        }
    }

    pub fn error(message: String, details: Option<String>) -> Self {
        Self::Error { message, details }
    }
}

impl From<FileProgress> for JsonMessage {
    fn from(event: FileProgress) -> Self {
        Self::FileProgress {
            file_id: event.file_id,
            filename: event.filename,
            status: event.status,
            percent: event.percent,
            worker_id: event.worker_id,
            error: event.error,
            ratio_percent: event.ratio_percent,
        }
    }
}

impl From<BatchProgress> for JsonMessage {
    fn from(event: BatchProgress) -> Self {
        Self::BatchProgress {
            phase: event.phase,
            percent: event.percent,
            current: event.current,
            total: event.total,
        }
    }
}

/// Progress sink writing JSON lines to stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonProgress;

impl ProgressSink for JsonProgress {
    fn file_progress(&self, event: FileProgress) {
        JsonMessage::from(event).emit();
    }

    fn batch_progress(&self, event: BatchProgress) {
        JsonMessage::from(event).emit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::CompressionProfile;

    #[test]
    fn test_file_progress_message() {
        let event = FileProgress::new("0123456789abcdef", "a.pdf", FileStatus::Completed, Some(1)).with_ratio(40.0);
        let json = serde_json::to_value(JsonMessage::from(event)).unwrap();

        assert_eq!(json["type"], "file_progress");
        assert_eq!(json["status"], "completed");
        assert_eq!(json["percent"], 100.0);
        assert_eq!(json["ratio_percent"], 40.0);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_batch_progress_message() {
        let json = serde_json::to_value(JsonMessage::from(BatchProgress::new(1, 2))).unwrap();
        assert_eq!(json["type"], "batch_progress");
        assert_eq!(json["phase"], "batch");
        assert_eq!(json["percent"], 50.0);
    }

    #[test]
    fn test_error_and_complete_messages() {
        let error = serde_json::to_value(JsonMessage::error("engine not found".to_string(), None)).unwrap();
        assert_eq!(error["type"], "error");
        assert_eq!(error["message"], "engine not found");

        let result = BatchResult::failed("no files provided", 0, CompressionProfile::Balanced);
        let complete = serde_json::to_value(JsonMessage::complete(result, StatsSnapshot::default(), 0.5)).unwrap();
        assert_eq!(complete["type"], "complete");
        assert_eq!(complete["result"]["success"], false);
        assert_eq!(complete["result"]["profile_used"], "balanced");
        assert_eq!(complete["stats"]["session_files"], 0);
    }
}
