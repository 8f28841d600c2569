//! # Argument Builder
//!
//! Pure mapping from a profile and options to the Ghostscript argument vector.
//! No I/O happens here; the same input always yields the same argv, in the
//! same order.

use crate::args;
use crate::options::{CompressionOptions, CompressionProfile};
use crate::utils::flag;
use std::path::Path;

/// Per-channel image classes that get a downsampling pair of flags
const IMAGE_CHANNELS: [&str; 3] = ["Color", "Gray", "Mono"];

/// Builds engine argument vectors
pub struct ArgumentBuilder;

impl ArgumentBuilder {
    /// Ghostscript `PDFSETTINGS` preset for a profile
    pub fn preset(profile: CompressionProfile) -> &'static str {
        match profile {
            CompressionProfile::Balanced => "/printer",
            CompressionProfile::Aggressive => "/ebook",
            CompressionProfile::Maximum => "/screen",
        }
    }

    /// Compression flags, without input and output paths
    pub fn build(profile: CompressionProfile, options: &CompressionOptions) -> Vec<String> {
        let mut argv = args![
            "-sDEVICE=pdfwrite",
            flag('d', "PDFSETTINGS", Self::preset(profile)),
            flag('d', "CompatibilityLevel", &options.pdf_version),
            "-dNOPAUSE",
            "-dQUIET",
            "-dBATCH",
            "-dAutoRotatePages=/None",
        ];

        for channel in IMAGE_CHANNELS {
            argv.push(format!("-d{}ImageDownsampleType=/Bicubic", channel));
            argv.push(format!("-d{}ImageResolution={}", channel, options.target_dpi));
        }

        argv.extend(args![
            "-dColorConversionStrategy=/sRGB",
            flag('d', "EmbedAllFonts", options.embed_fonts),
            "-dSubsetFonts=true",
            "-dOptimize=true",
        ]);

        for channel in IMAGE_CHANNELS {
            argv.push(format!("-dDownsample{}Images=true", channel));
        }

        if profile == CompressionProfile::Maximum {
            argv.extend(args!["-dCompressFonts=true", "-dCompressStreams=true"]);
        }

        if options.strip_metadata {
            argv.extend(args!["-dPDFX", "-dUseCIEColor"]);
        }

        if options.generate_thumbnails {
            argv.push("-dGenerateThumbnails=true".to_string());
        }

        argv
    }

    /// Full argument vector for the main compression pass
    pub fn compression_args(
        profile: CompressionProfile,
        options: &CompressionOptions,
        input: &Path,
        output: &Path,
    ) -> Vec<String> {
        let mut argv = Self::build(profile, options);
        argv.push(flag('s', "OutputFile", output_file(output)));
        argv.push(input.display().to_string());
        argv
    }

    /// Fixed argument vector for the grayscale pre-pass
    pub fn grayscale_args(input: &Path, output: &Path) -> Vec<String> {
        args![
            "-sDEVICE=pdfwrite",
            "-sProcessColorModel=DeviceGray",
            "-dOverrideICC",
            "-dUseCIEColor",
            "-dCompatibilityLevel=1.4",
            "-dNOPAUSE",
            "-dQUIET",
            "-dBATCH",
            flag('s', "OutputFile", output_file(output)),
            input.display(),
        ]
    }
}

/// Ghostscript reads `OutputFile` as a printf template; a literal `%` must be doubled
fn output_file(path: &Path) -> String {
    path.display().to_string().replace('%', "%%")
}
