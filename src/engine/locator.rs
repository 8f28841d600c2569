//! # Engine Locator
//!
//! This module finds the Ghostscript binary in different environments:
//! - Explicit override (settings or `PDF_COMPRESSOR_ENGINE`)
//! - Bundled with the application (next to the executable or in the data dir)
//! - System-installed tools on `PATH`
//!
//! For a bundled copy it also derives the library and resource directories so
//! the engine never depends on a system installation at runtime.

use crate::error::CompressError;
use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const ENGINE_ENV_VAR: &str = "PDF_COMPRESSOR_ENGINE";
pub const BUNDLE_ENV_VAR: &str = "PDF_COMPRESSOR_BUNDLE_DIR";
pub const RESOURCE_ENV_VAR: &str = "GS_LIB";

/// Where the resolved engine came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineSource {
    Override,
    Bundled,
    System,
}

/// Resolved engine binary plus the search paths it needs at runtime.
///
/// Built once per `locate()` call and never mutated afterwards, so it can be
/// shared behind an `Arc` by every worker of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineEnvironment {
    pub binary_path: PathBuf,
    pub source: EngineSource,
    pub library_search_paths: Vec<PathBuf>,
    pub resource_search_paths: Vec<PathBuf>,
}

impl EngineEnvironment {
    /// Environment for a binary that needs no extra search paths
    pub fn bare(binary_path: PathBuf, source: EngineSource) -> Self {
        Self {
            binary_path,
            source,
            library_search_paths: Vec::new(),
            resource_search_paths: Vec::new(),
        }
    }

    /// Derive search paths for a bundled binary.
    ///
    /// `.../ghostscript/bin/gs` and `.../ghostscript/gs` both resolve to the
    /// bundle base `.../ghostscript`.
    pub fn for_bundle(binary_path: PathBuf, source: EngineSource) -> Self {
        let base = bundle_base(&binary_path);
        let mut library_search_paths = Vec::new();

        let lib_dir = base.join("lib");
        if lib_dir.is_dir() {
            library_search_paths.push(lib_dir);
        }
        if cfg!(windows) {
            let bin_dir = base.join("bin");
            if bin_dir.is_dir() {
                library_search_paths.push(bin_dir);
            }
        }

        let resource_search_paths = discover_resource_paths(&base.join("share").join("ghostscript"));

        debug!(
            "Bundle base {}: {} library paths, {} resource paths",
            base.display(),
            library_search_paths.len(),
            resource_search_paths.len()
        );

        Self {
            binary_path,
            source,
            library_search_paths,
            resource_search_paths,
        }
    }

    /// Variables to set on top of the inherited environment.
    ///
    /// Library directories are prepended to the platform loader variable,
    /// keeping whatever the ambient environment already had after them.
    pub fn env_overlay(&self) -> Vec<(OsString, OsString)> {
        let mut overlay = Vec::new();

        if !self.resource_search_paths.is_empty() {
            if let Ok(joined) = env::join_paths(&self.resource_search_paths) {
                overlay.push((OsString::from(RESOURCE_ENV_VAR), joined));
            }
        }

        if !self.library_search_paths.is_empty() {
            let key = loader_path_var();
            let mut paths = self.library_search_paths.clone();
            if let Some(current) = env::var_os(key) {
                paths.extend(env::split_paths(&current).filter(|p| !p.as_os_str().is_empty()));
            }
            match env::join_paths(&paths) {
                Ok(joined) => overlay.push((OsString::from(key), joined)),
                Err(e) => warn!("Cannot build {} for engine: {}", key, e),
            }
        }

        overlay
    }
}

/// Dynamic loader search variable for the current platform
pub fn loader_path_var() -> &'static str {
    if cfg!(target_os = "macos") {
        "DYLD_LIBRARY_PATH"
    } else if cfg!(windows) {
        "PATH"
    } else {
        "LD_LIBRARY_PATH"
    }
}

/// Engine executable names, in preference order
pub fn engine_binary_names() -> &'static [&'static str] {
    if cfg!(windows) {
        &["gswin64c.exe", "gswin32c.exe", "gs.exe"]
    } else {
        &["gs"]
    }
}

fn bundle_base(binary_path: &Path) -> PathBuf {
    let absolute = if binary_path.is_absolute() {
        binary_path.to_path_buf()
    } else {
        env::current_dir()
            .map(|cwd| cwd.join(binary_path))
            .unwrap_or_else(|_| binary_path.to_path_buf())
    };
    let parent = absolute.parent().unwrap_or(Path::new("")).to_path_buf();
    if parent.file_name().map(|n| n == "bin").unwrap_or(false) {
        parent.parent().map(Path::to_path_buf).unwrap_or(parent)
    } else {
        parent
    }
}

/// `share/ghostscript` itself, then `Resource/Init` and `lib` of the
/// highest-sorted version directory inside it
fn discover_resource_paths(share_root: &Path) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if !share_root.is_dir() {
        return paths;
    }
    paths.push(share_root.to_path_buf());

    let entries = match fs::read_dir(share_root) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot read {}: {}", share_root.display(), e);
            return paths;
        }
    };

    let mut versions: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|name| name.contains('.'))
        .collect();
    versions.sort();

    if let Some(best) = versions.last() {
        let version_dir = share_root.join(best);
        for candidate in [version_dir.join("Resource").join("Init"), version_dir.join("lib")] {
            if candidate.is_dir() {
                paths.push(candidate);
            }
        }
    }

    paths
}

/// Regular file with at least one execute bit (on Unix)
pub fn is_executable(path: &Path) -> bool {
    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(_) => return false,
    };
    if !metadata.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

/// Resolves the engine binary according to a fallback policy
#[derive(Debug, Clone)]
pub struct EngineLocator {
    override_path: Option<PathBuf>,
    bundle_roots: Vec<PathBuf>,
    allow_system: bool,
    search_path: Option<OsString>,
}

impl EngineLocator {
    /// Locator with the default bundle layout and environment overrides
    pub fn new(override_path: Option<PathBuf>, allow_system: bool) -> Self {
        let override_path = override_path.or_else(|| env::var_os(ENGINE_ENV_VAR).map(PathBuf::from));
        Self {
            override_path,
            bundle_roots: Self::default_bundle_roots(),
            allow_system,
            search_path: env::var_os("PATH"),
        }
    }

    /// Locator with explicit bundle roots and `PATH`, ignoring the process environment
    pub fn with_roots(bundle_roots: Vec<PathBuf>, search_path: Option<OsString>, allow_system: bool) -> Self {
        Self {
            override_path: None,
            bundle_roots,
            allow_system,
            search_path,
        }
    }

    pub fn with_override(mut self, path: PathBuf) -> Self {
        self.override_path = Some(path);
        self
    }

    fn default_bundle_roots() -> Vec<PathBuf> {
        let mut roots = Vec::new();

        if let Some(dir) = env::var_os(BUNDLE_ENV_VAR) {
            roots.push(PathBuf::from(dir));
        }

        if let Ok(exe_path) = env::current_exe() {
            if let Some(app_dir) = exe_path.parent() {
                roots.push(app_dir.join("bundled").join("ghostscript"));
                roots.push(app_dir.join("ghostscript"));
                roots.push(app_dir.join("resources").join("ghostscript"));
                roots.push(app_dir.join("..").join("Resources").join("ghostscript"));
            }
        }

        if let Some(data_dir) = dirs::data_dir() {
            roots.push(data_dir.join("pdf-compressor").join("ghostscript"));
        }

        roots
    }

    /// Resolve and validate the engine
    pub fn locate(&self) -> Result<EngineEnvironment, CompressError> {
        let mut searched = Vec::new();

        if let Some(ref path) = self.override_path {
            searched.push(path.clone());
            if is_executable(path) {
                info!("Using engine override: {}", path.display());
                return Ok(EngineEnvironment::for_bundle(path.clone(), EngineSource::Override));
            }
            warn!("Engine override is not an executable file: {}", path.display());
        }

        for root in &self.bundle_roots {
            for name in engine_binary_names() {
                for candidate in [root.join("bin").join(name), root.join(name)] {
                    debug!("Checking bundled engine: {}", candidate.display());
                    if is_executable(&candidate) {
                        info!("Using bundled engine: {}", candidate.display());
                        return Ok(EngineEnvironment::for_bundle(candidate, EngineSource::Bundled));
                    }
                    searched.push(candidate);
                }
            }
        }

        if self.allow_system {
            if let Some(path) = self.find_in_system_path(&mut searched) {
                info!("Using system engine: {}", path.display());
                return Ok(EngineEnvironment::bare(path, EngineSource::System));
            }
        } else {
            debug!("System engine fallback disabled");
        }

        warn!("Engine not found, searched {} locations", searched.len());
        for path in &searched {
            debug!("  searched: {}", path.display());
        }
        Err(CompressError::EngineNotFound)
    }

    fn find_in_system_path(&self, searched: &mut Vec<PathBuf>) -> Option<PathBuf> {
        let search_path = self.search_path.as_ref()?;
        for dir in env::split_paths(search_path) {
            for name in engine_binary_names() {
                let candidate = dir.join(name);
                if is_executable(&candidate) {
                    return Some(candidate);
                }
                searched.push(candidate);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[cfg(unix)]
    fn make_executable(path: &Path) {
        use std::os::unix::fs::PermissionsExt;
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "#!/bin/sh\nexit 0\n").unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_bundled_engine_with_versioned_resources() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("ghostscript");
        make_executable(&base.join("bin").join("gs"));
        fs::create_dir_all(base.join("lib")).unwrap();
        let share = base.join("share").join("ghostscript");
        fs::create_dir_all(share.join("9.56.1").join("Resource").join("Init")).unwrap();
        fs::create_dir_all(share.join("10.05.1").join("Resource").join("Init")).unwrap();
        fs::create_dir_all(share.join("10.05.1").join("lib")).unwrap();
        fs::create_dir_all(share.join("fonts")).unwrap();

        let locator = EngineLocator::with_roots(vec![base.clone()], None, false);
        let env = locator.locate().unwrap();

        assert_eq!(env.source, EngineSource::Bundled);
        assert_eq!(env.binary_path, base.join("bin").join("gs"));
        assert_eq!(env.library_search_paths, vec![base.join("lib")]);
        // "9.56.1" sorts after "10.05.1" lexically, so it wins
        assert_eq!(
            env.resource_search_paths,
            vec![share.clone(), share.join("9.56.1").join("Resource").join("Init")]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_flat_bundle_layout() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("gs-flat");
        make_executable(&base.join("gs"));

        let env = EngineLocator::with_roots(vec![base.clone()], None, false).locate().unwrap();
        assert_eq!(env.binary_path, base.join("gs"));
        assert!(env.library_search_paths.is_empty());
        assert!(env.resource_search_paths.is_empty());
        assert!(env.env_overlay().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_non_executable_is_rejected() {
        use std::os::unix::fs::PermissionsExt;
        let temp = TempDir::new().unwrap();
        let gs = temp.path().join("bin").join("gs");
        make_executable(&gs);
        fs::set_permissions(&gs, fs::Permissions::from_mode(0o644)).unwrap();

        let result = EngineLocator::with_roots(vec![temp.path().to_path_buf()], None, false).locate();
        assert!(matches!(result, Err(CompressError::EngineNotFound)));
    }

    #[cfg(unix)]
    #[test]
    fn test_system_fallback_respects_policy() {
        let temp = TempDir::new().unwrap();
        let system_dir = temp.path().join("usr-bin");
        make_executable(&system_dir.join("gs"));
        let search_path = env::join_paths([system_dir.clone()]).unwrap();

        let allowed = EngineLocator::with_roots(vec![temp.path().join("missing")], Some(search_path.clone()), true);
        let env = allowed.locate().unwrap();
        assert_eq!(env.source, EngineSource::System);
        assert_eq!(env.binary_path, system_dir.join("gs"));
        assert!(env.library_search_paths.is_empty());

        let denied = EngineLocator::with_roots(vec![temp.path().join("missing")], Some(search_path), false);
        assert!(denied.locate().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_bundle_preferred_over_system() {
        let temp = TempDir::new().unwrap();
        let bundle = temp.path().join("bundle");
        make_executable(&bundle.join("bin").join("gs"));
        let system_dir = temp.path().join("usr-bin");
        make_executable(&system_dir.join("gs"));
        let search_path = env::join_paths([system_dir]).unwrap();

        let env = EngineLocator::with_roots(vec![bundle], Some(search_path), true).locate().unwrap();
        assert_eq!(env.source, EngineSource::Bundled);
    }

    #[test]
    fn test_missing_override_falls_through_to_not_found() {
        let temp = TempDir::new().unwrap();
        let locator = EngineLocator::with_roots(Vec::new(), None, false)
            .with_override(temp.path().join("nope").join("gs"));
        assert!(matches!(locator.locate(), Err(CompressError::EngineNotFound)));
    }

    #[test]
    fn test_env_overlay_sets_resource_and_loader_paths() {
        let env = EngineEnvironment {
            binary_path: PathBuf::from("/opt/gs/bin/gs"),
            source: EngineSource::Bundled,
            library_search_paths: vec![PathBuf::from("/opt/gs/lib")],
            resource_search_paths: vec![PathBuf::from("/opt/gs/share/ghostscript")],
        };
        let overlay = env.env_overlay();

        let gs_lib = overlay.iter().find(|(k, _)| k == RESOURCE_ENV_VAR).unwrap();
        assert_eq!(gs_lib.1, OsString::from("/opt/gs/share/ghostscript"));

        let loader = overlay.iter().find(|(k, _)| k == loader_path_var()).unwrap();
        let first = env::split_paths(&loader.1).next().unwrap();
        assert_eq!(first, PathBuf::from("/opt/gs/lib"));
    }
}
