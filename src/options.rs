//! # Compression Options Module
//!
//! Profili di compressione e opzioni avanzate passate al motore.
//!
//! ## Responsabilità:
//! - `CompressionProfile`: livello di aggressività (Balanced / Aggressive / Maximum)
//! - `CompressionOptions`: DPI, qualità, versione PDF e flag opzionali
//! - `normalized()`: recupera valori invalidi con default o clamp (mai fatale)
//! - `OptionsPatch`: aggiornamento parziale tipizzato con merge validante
//!
//! ## Default:
//! - `target_dpi`: 150
//! - `image_quality`: 85
//! - `pdf_version`: "1.4"
//! - `embed_fonts`: true

use crate::error::CompressError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_DPI: u32 = 150;
pub const MAX_DPI: u32 = 2400;
pub const DEFAULT_QUALITY: u8 = 85;
pub const DEFAULT_PDF_VERSION: &str = "1.4";
pub const SUPPORTED_PDF_VERSIONS: &[&str] = &["1.3", "1.4", "1.5", "1.6", "1.7", "2.0"];

/// Named compression level, mapped to a Ghostscript `PDFSETTINGS` preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionProfile {
    #[default]
    Balanced,
    Aggressive,
    Maximum,
}

impl CompressionProfile {
    pub const ALL: [CompressionProfile; 3] = [Self::Balanced, Self::Aggressive, Self::Maximum];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Balanced => "balanced",
            Self::Aggressive => "aggressive",
            Self::Maximum => "maximum",
        }
    }

    /// Parse a profile name, falling back to `Balanced` for anything unknown
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            warn!("Unknown compression profile '{}', using balanced", value);
            Self::Balanced
        })
    }
}

impl FromStr for CompressionProfile {
    type Err = CompressError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "balanced" | "good_enough" => Ok(Self::Balanced),
            "aggressive" => Ok(Self::Aggressive),
            "maximum" | "ultra" => Ok(Self::Maximum),
            other => Err(CompressError::InvalidOptions(format!(
                "unknown compression profile '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for CompressionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Advanced options for a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionOptions {
    /// Downsampling target for color, gray and mono images
    pub target_dpi: u32,
    /// Image quality (1-100)
    pub image_quality: u8,
    /// Output PDF compatibility level
    pub pdf_version: String,
    pub strip_metadata: bool,
    pub embed_fonts: bool,
    pub generate_thumbnails: bool,
    /// Run the grayscale pre-pass before compressing
    pub to_grayscale: bool,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            target_dpi: DEFAULT_DPI,
            image_quality: DEFAULT_QUALITY,
            pdf_version: DEFAULT_PDF_VERSION.to_string(),
            strip_metadata: false,
            embed_fonts: true,
            generate_thumbnails: false,
            to_grayscale: false,
        }
    }
}

impl CompressionOptions {
    /// Replace zero, empty and out-of-range fields with usable values
    pub fn normalized(mut self) -> Self {
        if self.target_dpi == 0 {
            self.target_dpi = DEFAULT_DPI;
        } else if self.target_dpi > MAX_DPI {
            warn!("Target DPI {} above maximum, clamping to {}", self.target_dpi, MAX_DPI);
            self.target_dpi = MAX_DPI;
        }

        if self.image_quality == 0 {
            self.image_quality = DEFAULT_QUALITY;
        } else if self.image_quality > 100 {
            warn!("Image quality {} above 100, clamping", self.image_quality);
            self.image_quality = 100;
        }

        let version = self.pdf_version.trim().to_string();
        if version.is_empty() {
            self.pdf_version = DEFAULT_PDF_VERSION.to_string();
        } else if !SUPPORTED_PDF_VERSIONS.contains(&version.as_str()) {
            warn!("Unsupported PDF version '{}', using {}", version, DEFAULT_PDF_VERSION);
            self.pdf_version = DEFAULT_PDF_VERSION.to_string();
        } else {
            self.pdf_version = version;
        }

        self
    }

    /// Apply a patch, rejecting any field that is out of range
    pub fn merge(&self, patch: &OptionsPatch) -> Result<Self, CompressError> {
        let mut merged = self.clone();

        if let Some(dpi) = patch.target_dpi {
            if dpi == 0 || dpi > MAX_DPI {
                return Err(CompressError::InvalidOptions(format!(
                    "target_dpi must be between 1 and {}, got {}",
                    MAX_DPI, dpi
                )));
            }
            merged.target_dpi = dpi;
        }
        if let Some(quality) = patch.image_quality {
            if quality == 0 || quality > 100 {
                return Err(CompressError::InvalidOptions(format!(
                    "image_quality must be between 1 and 100, got {}",
                    quality
                )));
            }
            merged.image_quality = quality;
        }
        if let Some(ref version) = patch.pdf_version {
            if !SUPPORTED_PDF_VERSIONS.contains(&version.as_str()) {
                return Err(CompressError::InvalidOptions(format!(
                    "pdf_version must be one of {}, got '{}'",
                    SUPPORTED_PDF_VERSIONS.join(", "),
                    version
                )));
            }
            merged.pdf_version = version.clone();
        }
        if let Some(value) = patch.strip_metadata {
            merged.strip_metadata = value;
        }
        if let Some(value) = patch.embed_fonts {
            merged.embed_fonts = value;
        }
        if let Some(value) = patch.generate_thumbnails {
            merged.generate_thumbnails = value;
        }
        if let Some(value) = patch.to_grayscale {
            merged.to_grayscale = value;
        }

        Ok(merged)
    }
}

/// Partial update of `CompressionOptions`; unknown keys are rejected
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptionsPatch {
    pub target_dpi: Option<u32>,
    pub image_quality: Option<u8>,
    pub pdf_version: Option<String>,
    pub strip_metadata: Option<bool>,
    pub embed_fonts: Option<bool>,
    pub generate_thumbnails: Option<bool>,
    pub to_grayscale: Option<bool>,
}

impl OptionsPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
