//! Shared fixtures for tests: fake Ghostscript scripts and sample inputs.

use crate::engine::invoker::EngineInvoker;
use crate::engine::locator::{EngineEnvironment, EngineSource};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Write a fake PDF of `size` bytes
pub fn write_pdf(dir: &Path, name: &str, size: usize) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    let mut data = b"%PDF-1.4\n".to_vec();
    data.resize(size.max(data.len()), b'x');
    if size == 0 {
        data.clear();
    }
    fs::write(&path, data).unwrap();
    path
}

/// One logged call of a fake engine
#[derive(Debug, Clone)]
pub struct Invocation {
    pub grayscale: bool,
    pub input: String,
    pub output: String,
    pub gs_lib: String,
}

/// Shell script standing in for `gs`. Every call is appended to a log file.
pub struct FakeEngine {
    binary: PathBuf,
    log: PathBuf,
}

impl FakeEngine {
    /// Writes half of the input to the output
    pub fn copying(root: &Path) -> Self {
        Self::with_body(root, r#"head -c $(( $(wc -c < "$in") / 2 )) "$in" > "$out""#)
    }

    /// Like `copying`, after sleeping `seconds`
    pub fn slow_copying(root: &Path, seconds: &str) -> Self {
        Self::with_body(
            root,
            &format!(r#"sleep {}; head -c $(( $(wc -c < "$in") / 2 )) "$in" > "$out""#, seconds),
        )
    }

    /// Writes the input twice, so the output is larger
    pub fn growing(root: &Path) -> Self {
        Self::with_body(root, r#"cat "$in" "$in" > "$out""#)
    }

    /// Prints `message` on stderr and exits with 1
    pub fn failing(root: &Path, message: &str) -> Self {
        Self::with_body(root, &format!("echo '{}' >&2; exit 1", message))
    }

    /// Exits with 0 without writing anything
    pub fn silent(root: &Path) -> Self {
        Self::with_body(root, "exit 0")
    }

    /// Grayscale pass succeeds, main compression fails
    pub fn gray_only(root: &Path) -> Self {
        Self::with_body(
            root,
            r#"if [ "$gray" = 1 ]; then cp "$in" "$out"; exit 0; fi; echo 'main pass failed' >&2; exit 1"#,
        )
    }

    /// Fails for inputs whose name contains `pattern`, copies otherwise
    pub fn failing_on(root: &Path, pattern: &str) -> Self {
        Self::with_body(
            root,
            &format!(
                r#"case "$in" in *{}*) echo 'broken xref' >&2; exit 1;; esac; head -c $(( $(wc -c < "$in") / 2 )) "$in" > "$out""#,
                pattern
            ),
        )
    }

    pub fn with_body(root: &Path, body: &str) -> Self {
        let dir = root.join("fake-engine");
        let bin_dir = dir.join("bin");
        fs::create_dir_all(&bin_dir).unwrap();
        let log = dir.join("calls.log");
        let binary = bin_dir.join("gs");

        let script = format!(
            r#"#!/bin/sh
out=""
in=""
gray=0
for arg in "$@"; do
  case "$arg" in
    -sOutputFile=*) out=$(printf '%s' "${{arg#-sOutputFile=}}" | sed 's/%%/%/g') ;;
    -sProcessColorModel=DeviceGray) gray=1 ;;
    -*) ;;
    *) in="$arg" ;;
  esac
done
echo "$gray|$in|$out|${{GS_LIB:-}}" >> '{log}'
{body}
"#,
            log = log.display(),
            body = body
        );

        // Written through `cp` so this process never holds a writable fd on
        // the executable (avoids ETXTBSY when another test thread forks).
        let source = dir.join("gs.src");
        fs::write(&source, script).unwrap();
        let status = std::process::Command::new("cp").arg(&source).arg(&binary).status().unwrap();
        assert!(status.success());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&binary, fs::Permissions::from_mode(0o755)).unwrap();
        }

        Self { binary, log }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn environment(&self) -> Arc<EngineEnvironment> {
        Arc::new(EngineEnvironment::bare(self.binary.clone(), EngineSource::Bundled))
    }

    pub fn invoker(&self) -> EngineInvoker {
        EngineInvoker::new(self.environment())
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        let content = fs::read_to_string(&self.log).unwrap_or_default();
        content
            .lines()
            .filter(|l| !l.is_empty())
            .map(|line| {
                let mut parts = line.splitn(4, '|');
                Invocation {
                    grayscale: parts.next() == Some("1"),
                    input: parts.next().unwrap_or_default().to_string(),
                    output: parts.next().unwrap_or_default().to_string(),
                    gs_lib: parts.next().unwrap_or_default().to_string(),
                }
            })
            .collect()
    }
}
