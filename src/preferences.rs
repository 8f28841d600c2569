//! # Preferences Module
//!
//! Preferenze utente persistite in JSON: profilo e opzioni di default,
//! cartella di download, salvataggio automatico.
//!
//! ## Responsabilità:
//! - Trait `PreferenceStore` consumato dal service (ogni getter ritorna `Result`)
//! - `JsonPreferenceStore`: implementazione su file con default se mancante
//! - `PreferencesPatch`: aggiornamento parziale tipizzato, chiavi sconosciute rifiutate
//!
//! ## Persistence:
//! - Salvataggio atomico: scrittura su file temporaneo + rename
//! - Cartella di download: preferenza esplicita → `dirs::download_dir()` → home
//!
//! ## Esempio:
//! ```rust,ignore
//! let store = JsonPreferenceStore::load(JsonPreferenceStore::default_path()).await?;
//! let patch = PreferencesPatch::from_json(r#"{"options": {"target_dpi": 96}}"#)?;
//! store.update(&patch).await?;
//! ```

use crate::error::CompressError;
use crate::options::{CompressionOptions, CompressionProfile, OptionsPatch};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tokio::fs;
use tracing::{debug, warn};

/// Source of user defaults for a batch
pub trait PreferenceStore: Send + Sync {
    fn get_default_profile(&self) -> Result<CompressionProfile, CompressError>;
    fn get_default_options(&self) -> Result<CompressionOptions, CompressError>;
    fn get_download_folder(&self) -> Result<PathBuf, CompressError>;
}

/// Stored preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub default_profile: String,
    pub default_download_folder: Option<PathBuf>,
    pub auto_save: bool,
    pub options: CompressionOptions,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            default_profile: CompressionProfile::Balanced.as_str().to_string(),
            default_download_folder: None,
            auto_save: false,
            options: CompressionOptions::default(),
        }
    }
}

/// Partial update of `Preferences`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PreferencesPatch {
    pub default_profile: Option<String>,
    pub default_download_folder: Option<PathBuf>,
    pub auto_save: Option<bool>,
    pub options: Option<OptionsPatch>,
}

impl PreferencesPatch {
    /// Parse a patch sent by a frontend; unknown keys are rejected
    pub fn from_json(json: &str) -> Result<Self, CompressError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Preferences {
    /// Apply `patch`; nothing changes if any field is invalid
    pub fn merge(&self, patch: &PreferencesPatch) -> Result<Self, CompressError> {
        let mut merged = self.clone();

        if let Some(ref name) = patch.default_profile {
            let profile: CompressionProfile = name.parse()?;
            merged.default_profile = profile.as_str().to_string();
        }
        if let Some(ref folder) = patch.default_download_folder {
            merged.default_download_folder = Some(folder.clone());
        }
        if let Some(auto_save) = patch.auto_save {
            merged.auto_save = auto_save;
        }
        if let Some(ref options) = patch.options {
            merged.options = merged.options.merge(options)?;
        }

        Ok(merged)
    }
}

/// Preferences backed by a JSON file
#[derive(Debug)]
pub struct JsonPreferenceStore {
    path: PathBuf,
    current: RwLock<Preferences>,
}

impl JsonPreferenceStore {
    /// `<config_dir>/pdf-compressor/preferences.json`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(std::env::temp_dir)
            .join("pdf-compressor")
            .join("preferences.json")
    }

    /// Load from `path`; a missing file yields defaults
    pub async fn load(path: PathBuf) -> Result<Self> {
        let current = if path.exists() {
            let content = fs::read_to_string(&path)
                .await
                .with_context(|| format!("reading preferences {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("parsing preferences {}", path.display()))?
        } else {
            debug!("No preferences at {}, using defaults", path.display());
            Preferences::default()
        };

        Ok(Self {
            path,
            current: RwLock::new(current),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn preferences(&self) -> Preferences {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Validate, persist and apply a patch
    pub async fn update(&self, patch: &PreferencesPatch) -> Result<Preferences> {
        let merged = self.preferences().merge(patch)?;
        self.save(&merged).await?;

        match self.current.write() {
            Ok(mut guard) => *guard = merged.clone(),
            Err(poisoned) => *poisoned.into_inner() = merged.clone(),
        }
        Ok(merged)
    }

    async fn save(&self, preferences: &Preferences) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(preferences)?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, content)
            .await
            .with_context(|| format!("writing {}", staging.display()))?;
        fs::rename(&staging, &self.path)
            .await
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}

impl PreferenceStore for JsonPreferenceStore {
    fn get_default_profile(&self) -> Result<CompressionProfile, CompressError> {
        Ok(CompressionProfile::parse_lenient(&self.preferences().default_profile))
    }

    fn get_default_options(&self) -> Result<CompressionOptions, CompressError> {
        Ok(self.preferences().options)
    }

    fn get_download_folder(&self) -> Result<PathBuf, CompressError> {
        if let Some(folder) = self.preferences().default_download_folder {
            return Ok(folder);
        }
        dirs::download_dir()
            .or_else(|| {
                warn!("No download directory on this platform, using home");
                dirs::home_dir()
            })
            .ok_or_else(|| CompressError::Preferences("no download folder available".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let store = JsonPreferenceStore::load(temp.path().join("prefs.json")).await.unwrap();

        assert_eq!(store.get_default_profile().unwrap(), CompressionProfile::Balanced);
        assert_eq!(store.get_default_options().unwrap(), CompressionOptions::default());
        assert!(!store.preferences().auto_save);
    }

    #[tokio::test]
    async fn test_update_persists_atomically() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config").join("prefs.json");
        let store = JsonPreferenceStore::load(path.clone()).await.unwrap();

        let patch = PreferencesPatch::from_json(
            r#"{"default_profile": "ultra", "default_download_folder": "/tmp/out", "options": {"target_dpi": 96, "to_grayscale": true}}"#,
        )
        .unwrap();
        let updated = store.update(&patch).await.unwrap();
        assert_eq!(updated.default_profile, "maximum");
        assert_eq!(updated.options.target_dpi, 96);

        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());

        let reloaded = JsonPreferenceStore::load(path).await.unwrap();
        assert_eq!(reloaded.get_default_profile().unwrap(), CompressionProfile::Maximum);
        assert!(reloaded.get_default_options().unwrap().to_grayscale);
        assert_eq!(reloaded.get_download_folder().unwrap(), PathBuf::from("/tmp/out"));
    }

    #[tokio::test]
    async fn test_invalid_patch_changes_nothing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("prefs.json");
        let store = JsonPreferenceStore::load(path.clone()).await.unwrap();

        let patch = PreferencesPatch {
            auto_save: Some(true),
            options: Some(OptionsPatch {
                image_quality: Some(0),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(store.update(&patch).await.is_err());
        assert!(!store.preferences().auto_save);
        assert!(!path.exists());

        let bad_profile = PreferencesPatch {
            default_profile: Some("extreme".to_string()),
            ..Default::default()
        };
        assert!(store.update(&bad_profile).await.is_err());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(matches!(PreferencesPatch::from_json(r#"{"theme": "dark"}"#), Err(CompressError::Json(_))));
        assert!(matches!(PreferencesPatch::from_json(r#"{"options": {"dpi": 72}}"#), Err(CompressError::Json(_))));
        assert!(PreferencesPatch::from_json("{}").is_ok());
    }

    #[tokio::test]
    async fn test_unknown_stored_profile_falls_back() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("prefs.json");
        std::fs::write(&path, r#"{"default_profile": "legacy"}"#).unwrap();

        let store = JsonPreferenceStore::load(path).await.unwrap();
        assert_eq!(store.get_default_profile().unwrap(), CompressionProfile::Balanced);
        assert_eq!(store.get_default_options().unwrap().target_dpi, 150);
    }
}
