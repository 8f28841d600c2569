//! # Engine Invoker
//!
//! Spawns Ghostscript with an explicit argument vector and the environment
//! overlay of the resolved `EngineEnvironment`.
//!
//! Success is exactly "exit code 0 AND the declared output exists". Ghostscript
//! occasionally exits cleanly without writing anything, so the output check is
//! part of the contract. There is no retry at this layer.

use crate::engine::locator::EngineEnvironment;
use crate::error::CompressError;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::debug;

/// Captured output kept in error messages
const MAX_DIAGNOSTIC_BYTES: usize = 4096;

/// Result of a successful engine run
#[derive(Debug, Clone)]
pub struct EngineRun {
    pub elapsed: Duration,
    /// Combined stdout + stderr, for diagnostics only
    pub output: String,
}

/// Runs the engine binary; cheap to clone and share across workers
#[derive(Debug, Clone)]
pub struct EngineInvoker {
    environment: Arc<EngineEnvironment>,
}

impl EngineInvoker {
    pub fn new(environment: Arc<EngineEnvironment>) -> Self {
        Self { environment }
    }

    pub fn environment(&self) -> &EngineEnvironment {
        &self.environment
    }

    /// Run the engine and verify that `expected_output` was produced
    pub async fn invoke(&self, argv: &[String], expected_output: &Path) -> Result<EngineRun, CompressError> {
        let binary = &self.environment.binary_path;
        debug!("Running {} {:?}", binary.display(), argv);

        let mut cmd = Command::new(binary);
        cmd.args(argv)
            .envs(self.environment.env_overlay())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false);

        let start_time = Instant::now();
        let output = cmd.output().await.map_err(|source| CompressError::EngineSpawn {
            binary: binary.clone(),
            source,
        })?;
        let elapsed = start_time.elapsed();

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            debug!("Engine failed after {:.1}s: {}", elapsed.as_secs_f64(), combined);
            return Err(CompressError::EngineExecutionFailed {
                code: output.status.code(),
                output: truncate_diagnostics(&combined),
            });
        }

        if !tokio::fs::try_exists(expected_output).await.unwrap_or(false) {
            return Err(CompressError::EngineOutputMissing(expected_output.to_path_buf()));
        }

        debug!("Engine finished in {:.1}s", elapsed.as_secs_f64());
        Ok(EngineRun { elapsed, output: combined })
    }
}

/// Keep the tail of the captured output; Ghostscript prints the actual error last
fn truncate_diagnostics(output: &str) -> String {
    let trimmed = output.trim();
    if trimmed.len() <= MAX_DIAGNOSTIC_BYTES {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - MAX_DIAGNOSTIC_BYTES;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &trimmed[start..])
}
