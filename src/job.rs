//! # Job and Outcome Module
//!
//! Unità di lavoro per singolo file e record dei risultati.
//!
//! ## Strutture dati:
//! - `FileJob`: id univoco + path sorgente, immutabile
//! - `FileStatus`: macchina a stati Queued → Compressing → {Completed | Error}
//! - `FileOutcome`: risultato (o stato intermedio) di un singolo file
//! - `BatchResult`: aggregato del batch, calcolato solo dai file Completed
//!
//! ## Invarianti:
//! - Le transizioni di stato vanno solo in avanti, nessuna salta Compressing
//! - `overall_ratio_percent` vale 0 quando i byte originali totali sono 0
//! - I ratio possono essere negativi (il file compresso può crescere)

use crate::options::CompressionProfile;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

static JOB_NONCE: AtomicU64 = AtomicU64::new(0);

/// One input file of a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileJob {
    id: String,
    source_path: PathBuf,
}

impl FileJob {
    pub fn new(index: usize, source_path: PathBuf) -> Self {
        let id = unique_id(index, &source_path);
        Self { id, source_path }
    }

    /// Jobs for every input path, in submission order
    pub fn from_paths<I>(paths: I) -> Vec<Self>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        paths.into_iter().enumerate().map(|(i, p)| Self::new(i, p)).collect()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn file_name(&self) -> String {
        file_name_of(&self.source_path)
    }
}

/// 16 hex digits, unique per process and call
pub(crate) fn unique_id(index: usize, seed: &Path) -> String {
    let nonce = JOB_NONCE.fetch_add(1, Ordering::Relaxed);
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();

    let mut hasher = Sha256::new();
    hasher.update(std::process::id().to_le_bytes());
    hasher.update(nonce.to_le_bytes());
    hasher.update(now.to_le_bytes());
    hasher.update(index.to_le_bytes());
    hasher.update(seed.to_string_lossy().as_bytes());
    hex::encode(hasher.finalize())[..16].to_string()
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name().unwrap_or_default().to_string_lossy().to_string()
}

/// Processing state of a single file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Queued,
    Compressing,
    Completed,
    Error,
}

impl FileStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Whether `next` is the immediate successor of `self`
    pub fn can_advance_to(&self, next: FileStatus) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Compressing)
                | (Self::Compressing, Self::Completed)
                | (Self::Compressing, Self::Error)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Compressing => "compressing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

/// Signed size reduction in percent, 0 for empty originals
pub fn reduction_percent(original_bytes: u64, compressed_bytes: u64) -> f64 {
    if original_bytes == 0 {
        0.0
    } else {
        (original_bytes as f64 - compressed_bytes as f64) / original_bytes as f64 * 100.0
    }
}

/// Result record of one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileOutcome {
    pub id: String,
    pub original_name: String,
    pub output_name: String,
    pub original_bytes: u64,
    pub compressed_bytes: u64,
    pub ratio_percent: f64,
    pub output_path: Option<PathBuf>,
    /// Final location after copying into a user-chosen folder
    pub saved_path: Option<PathBuf>,
    pub status: FileStatus,
    pub error_message: Option<String>,
}

impl FileOutcome {
    /// Fresh outcome for a job that has just been submitted
    pub fn queued(job: &FileJob) -> Self {
        Self {
            id: job.id().to_string(),
            original_name: job.file_name(),
            output_name: String::new(),
            original_bytes: 0,
            compressed_bytes: 0,
            ratio_percent: 0.0,
            output_path: None,
            saved_path: None,
            status: FileStatus::Queued,
            error_message: None,
        }
    }

    /// Move to `next`; backwards or skipping transitions are refused
    pub fn advance(&mut self, next: FileStatus) -> bool {
        if self.status.can_advance_to(next) {
            self.status = next;
            true
        } else {
            false
        }
    }

    /// Compressing → Completed with measured sizes
    pub fn complete(&mut self, output_path: PathBuf, original_bytes: u64, compressed_bytes: u64) -> bool {
        if !self.advance(FileStatus::Completed) {
            return false;
        }
        self.output_name = file_name_of(&output_path);
        self.output_path = Some(output_path);
        self.original_bytes = original_bytes;
        self.compressed_bytes = compressed_bytes;
        self.ratio_percent = reduction_percent(original_bytes, compressed_bytes);
        true
    }

    /// Compressing → Error with a message
    pub fn fail(&mut self, message: impl Into<String>) -> bool {
        if !self.advance(FileStatus::Error) {
            return false;
        }
        self.error_message = Some(message.into());
        true
    }

    pub fn is_completed(&self) -> bool {
        self.status == FileStatus::Completed
    }
}

/// Aggregated result of one batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    /// Completion order, not submission order
    pub outcomes: Vec<FileOutcome>,
    pub total_files: usize,
    pub total_original_bytes: u64,
    pub total_compressed_bytes: u64,
    pub overall_ratio_percent: f64,
    pub profile_used: CompressionProfile,
    pub success: bool,
    pub error: Option<String>,
}

impl BatchResult {
    /// Fold outcomes; only Completed outcomes contribute bytes
    pub fn from_outcomes(outcomes: Vec<FileOutcome>, total_files: usize, profile_used: CompressionProfile) -> Self {
        let (total_original_bytes, total_compressed_bytes) = outcomes
            .iter()
            .filter(|o| o.is_completed())
            .fold((0u64, 0u64), |(orig, comp), o| {
                (orig + o.original_bytes, comp + o.compressed_bytes)
            });

        Self {
            outcomes,
            total_files,
            total_original_bytes,
            total_compressed_bytes,
            overall_ratio_percent: reduction_percent(total_original_bytes, total_compressed_bytes),
            profile_used,
            success: true,
            error: None,
        }
    }

    /// A batch that never started
    pub fn failed(error: impl Into<String>, total_files: usize, profile_used: CompressionProfile) -> Self {
        Self {
            outcomes: Vec::new(),
            total_files,
            total_original_bytes: 0,
            total_compressed_bytes: 0,
            overall_ratio_percent: 0.0,
            profile_used,
            success: false,
            error: Some(error.into()),
        }
    }

    pub fn completed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_completed()).count()
    }

    pub fn error_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.status == FileStatus::Error).count()
    }

    /// Bytes saved over completed files; negative when outputs grew
    pub fn bytes_saved(&self) -> i64 {
        self.total_original_bytes as i64 - self.total_compressed_bytes as i64
    }
}
