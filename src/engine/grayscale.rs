//! # Grayscale Stage
//!
//! Optional pre-pass converting a document to DeviceGray before the main
//! compression. The intermediate lives in its own temporary directory inside
//! the job directory and is removed when the returned handle is dropped, on
//! success and on failure alike.

use crate::engine::arguments::ArgumentBuilder;
use crate::engine::invoker::EngineInvoker;
use crate::error::CompressError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// Owning handle to a grayscale intermediate file
#[derive(Debug)]
pub struct GrayscaleIntermediate {
    path: PathBuf,
    dir: TempDir,
}

impl GrayscaleIntermediate {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the intermediate now instead of on drop
    pub fn close(self) -> std::io::Result<()> {
        self.dir.close()
    }
}

/// Runs the grayscale conversion pass
pub struct GrayscaleStage<'a> {
    invoker: &'a EngineInvoker,
}

impl<'a> GrayscaleStage<'a> {
    pub fn new(invoker: &'a EngineInvoker) -> Self {
        Self { invoker }
    }

    /// Convert `input` into a grayscale intermediate placed under `scratch_dir`
    pub async fn convert_to_grayscale(
        &self,
        input: &Path,
        scratch_dir: &Path,
    ) -> Result<GrayscaleIntermediate, CompressError> {
        tokio::fs::create_dir_all(scratch_dir).await?;
        let dir = tempfile::Builder::new().prefix("grayscale-").tempdir_in(scratch_dir)?;

        let stem = input.file_stem().unwrap_or_default().to_string_lossy();
        let path = dir.path().join(format!("{}_grayscale_temp.pdf", stem));

        debug!("Grayscale pre-pass: {} -> {}", input.display(), path.display());
        let argv = ArgumentBuilder::grayscale_args(input, &path);

        // On error `dir` is dropped here, taking any partial output with it
        self.invoker.invoke(&argv, &path).await.map_err(|e| match e {
            CompressError::EngineExecutionFailed { code, output } => CompressError::EngineExecutionFailed {
                code,
                output: format!("grayscale conversion failed: {}", output),
            },
            other => other,
        })?;

        Ok(GrayscaleIntermediate { path, dir })
    }
}
