//! # File Management Module
//!
//! Questo modulo gestisce le operazioni sui file fuori dal motore.
//!
//! ## Responsabilità:
//! - Discovery ricorsiva dei PDF negli input (file o directory)
//! - Copia dei risultati in una cartella scelta dall'utente senza sovrascrivere
//! - Pulizia delle directory di job rimaste da esecuzioni precedenti
//! - Formattazione human-readable delle dimensioni
//!
//! ## Copia sicura:
//! - La directory di destinazione viene creata se manca
//! - Un file esistente non viene mai sovrascritto: `report.pdf` diventa
//!   `report (1).pdf`, `report (2).pdf`, ...
//!
//! ## Esempio:
//! ```rust,ignore
//! let files = find_pdf_files(&[PathBuf::from("/path/to/docs")]);
//! let saved = LocalFileManager.copy_to(&output, &downloads)?;
//! ```

use crate::error::CompressError;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Copies finished outputs to their final location
pub trait FileManager: Send + Sync {
    /// Copy `src` into `dest_dir` and return the created path
    fn copy_to(&self, src: &Path, dest_dir: &Path) -> Result<PathBuf, CompressError>;
}

/// Local filesystem implementation
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileManager;

impl FileManager for LocalFileManager {
    fn copy_to(&self, src: &Path, dest_dir: &Path) -> Result<PathBuf, CompressError> {
        std::fs::create_dir_all(dest_dir)?;
        let name = src.file_name().ok_or_else(|| {
            CompressError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("not a file path: {}", src.display()),
            ))
        })?;

        let dest = unique_destination(&dest_dir.join(name));
        std::fs::copy(src, &dest)?;
        debug!("Copied {} -> {}", src.display(), dest.display());
        Ok(dest)
    }
}

/// First of `name.ext`, `name (1).ext`, `name (2).ext`, ... that does not exist
pub fn unique_destination(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    let stem = path.file_stem().unwrap_or_default().to_string_lossy().to_string();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    (1u32..)
        .map(|n| parent.join(format!("{} ({}){}", stem, n, ext)))
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| path.to_path_buf())
}

/// Check if a file is a PDF by extension
pub fn is_pdf(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// Expand inputs: files are kept as given, directories are walked for PDFs
pub fn find_pdf_files(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(input)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| is_pdf(p))
                .collect();
            found.sort();
            debug!("Found {} PDFs under {}", found.len(), input.display());
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }

    files
}

/// Run and job directories are named after a 16-hex-digit id
fn is_job_dir_name(name: &str) -> bool {
    name.len() == 16 && name.chars().all(|c| c.is_ascii_hexdigit())
}

/// Remove leftovers of earlier batches inside the working directory.
/// Directories named in `live` belong to running batches and are kept.
pub async fn cleanup_stale_jobs(work_dir: &Path, live: &HashSet<String>) -> usize {
    let mut entries = match tokio::fs::read_dir(work_dir).await {
        Ok(entries) => entries,
        Err(_) => return 0,
    };

    let mut removed = 0;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if !path.is_dir() || !is_job_dir_name(&name) || live.contains(&name) {
            continue;
        }
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => removed += 1,
            Err(e) => warn!("Could not remove stale job directory {}: {}", path.display(), e),
        }
    }

    if removed > 0 {
        debug!("Removed {} stale job directories from {}", removed, work_dir.display());
    }
    removed
}

/// Get human-readable file size
pub fn format_size(size: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = size as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", size as u64, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

/// Same as `format_size` for signed quantities such as bytes saved
pub fn format_signed_size(size: i64) -> String {
    if size < 0 {
        format!("-{}", format_size(size.unsigned_abs()))
    } else {
        format_size(size as u64)
    }
}
