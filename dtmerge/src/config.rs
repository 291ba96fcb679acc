//! Configuration module for dtmerge.
//!
//! This module holds the validated settings that drive a merge: which pages
//! go in, where the TIFF goes, which compression scheme is used and how
//! continuous-tone pages are reduced to black and white. The CLI builds a
//! [`Config`] from its arguments; library callers can build one directly.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{DtMergeError, Result};

/// Resolution written to every output page, in dots per inch.
///
/// Compound pages are also rendered at this resolution.
pub const OUTPUT_DPI: u32 = 400;

/// Compression scheme for the output TIFF.
///
/// The scheme is chosen once per merge and applies to every page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionScheme {
    /// CCITT Group 4 fax compression; only bi-level pages are allowed.
    #[default]
    Group4,
    /// Lossless LZW compression; any supported pixel format.
    Lzw,
}

impl CompressionScheme {
    /// Whether pages must be reduced to 1 bit per pixel before encoding.
    pub fn requires_bilevel(&self) -> bool {
        matches!(self, Self::Group4)
    }

    /// Short identifier used on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Group4 => "g4",
            Self::Lzw => "lzw",
        }
    }
}

impl fmt::Display for CompressionScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Group4 => write!(f, "CCITT Group 4"),
            Self::Lzw => write!(f, "LZW"),
        }
    }
}

impl FromStr for CompressionScheme {
    type Err = DtMergeError;

    /// Parse a compression scheme identifier.
    ///
    /// Accepts `g4`, `group4` and `lzw` in any case.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "g4" | "group4" => Ok(Self::Group4),
            "lzw" => Ok(Self::Lzw),
            _ => Err(DtMergeError::invalid_config(format!(
                "Invalid compression scheme: {s}. Must be one of: g4, lzw"
            ))),
        }
    }
}

/// Method used to turn grayscale or color pages into bi-level pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "method", content = "level")]
pub enum Binarization {
    /// Floyd–Steinberg error diffusion against a black/white palette.
    #[default]
    Dither,
    /// Global threshold picked per page with Otsu's method.
    Otsu,
    /// Fixed global threshold: luma above the level becomes white.
    Threshold(u8),
}

impl Binarization {
    /// Default level for [`Binarization::Threshold`].
    pub const DEFAULT_LEVEL: u8 = 128;

    /// Build a binarization policy from a method name and optional level.
    ///
    /// # Errors
    ///
    /// Returns an error if the method is unknown, or a level is given for a
    /// method that does not take one.
    pub fn parse(method: &str, level: Option<u8>) -> Result<Self> {
        let binarization = match method.trim().to_lowercase().as_str() {
            "dither" => Self::Dither,
            "otsu" => Self::Otsu,
            "threshold" => Self::Threshold(level.unwrap_or(Self::DEFAULT_LEVEL)),
            _ => {
                return Err(DtMergeError::invalid_config(format!(
                    "Invalid binarization method: {method}. Must be one of: dither, otsu, threshold"
                )));
            }
        };

        if level.is_some() && !matches!(binarization, Self::Threshold(_)) {
            return Err(DtMergeError::invalid_config(
                "--threshold can only be used with --binarize threshold",
            ));
        }

        Ok(binarization)
    }
}

/// Output file overwrite behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverwriteMode {
    /// Prompt the user before overwriting (default).
    #[default]
    Prompt,
    /// Always overwrite without prompting.
    Force,
    /// Never overwrite, error if file exists.
    NoClobber,
}

/// External program used to render compound document pages.
///
/// Argument templates are split on whitespace and each piece has the
/// placeholders `{input}`, `{page}` (1-based), `{index}` (0-based), `{dpi}`
/// and `{output}` substituted before the program is spawned.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RendererConfig {
    /// Program to run. `None` disables compound document support.
    pub program: Option<PathBuf>,
    /// Arguments for printing the page count of `{input}` on stdout.
    pub count_args: String,
    /// Arguments for rendering page `{page}` of `{input}` to `{output}`.
    pub export_args: String,
}

impl RendererConfig {
    /// Default arguments for the page count command.
    pub const DEFAULT_COUNT_ARGS: &'static str = "count {input}";
    /// Default arguments for the page export command.
    pub const DEFAULT_EXPORT_ARGS: &'static str =
        "export --dpi {dpi} --compress none --page {page} {input} {output}";

    /// Renderer settings pointing at `program` with the default templates.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: Some(program.into()),
            count_args: Self::DEFAULT_COUNT_ARGS.to_string(),
            export_args: Self::DEFAULT_EXPORT_ARGS.to_string(),
        }
    }

    /// Whether a renderer program is configured.
    pub fn is_available(&self) -> bool {
        self.program.is_some()
    }
}

/// Complete configuration for a merge operation.
#[derive(Debug, Clone)]
pub struct Config {
    /// Input files, in merge order.
    pub inputs: Vec<PathBuf>,

    /// Output TIFF path.
    pub output: PathBuf,

    /// Compression scheme for every output page.
    pub compression: CompressionScheme,

    /// How non bi-level pages are reduced for Group 4.
    pub binarization: Binarization,

    /// Compound document renderer.
    pub renderer: RendererConfig,

    /// Dry run mode - build the page plan without writing output.
    pub dry_run: bool,

    /// Print the dry-run plan as JSON.
    pub json: bool,

    /// Verbose output mode.
    pub verbose: bool,

    /// Quiet mode - suppress non-error output.
    pub quiet: bool,

    /// File overwrite behavior.
    pub overwrite_mode: OverwriteMode,
}

impl Config {
    /// Configuration with defaults for everything but inputs and output.
    pub fn new(inputs: Vec<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            inputs,
            output: output.into(),
            compression: CompressionScheme::default(),
            binarization: Binarization::default(),
            renderer: RendererConfig::default(),
            dry_run: false,
            json: false,
            verbose: false,
            quiet: false,
            overwrite_mode: OverwriteMode::default(),
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No input files are specified
    /// - Verbose and quiet modes are both enabled
    /// - JSON output is requested outside of a dry run
    /// - The output path is also one of the inputs
    pub fn validate(&self) -> Result<()> {
        if self.inputs.is_empty() {
            return Err(DtMergeError::invalid_config("No input files specified"));
        }

        if self.verbose && self.quiet {
            return Err(DtMergeError::invalid_config(
                "Cannot use both --verbose and --quiet",
            ));
        }

        if self.json && !self.dry_run {
            return Err(DtMergeError::invalid_config(
                "--json is only available together with --dry-run",
            ));
        }

        if self.inputs.iter().any(|input| input == &self.output) {
            return Err(DtMergeError::invalid_config(format!(
                "Output file cannot be the same as an input file: {}",
                self.output.display()
            )));
        }

        Ok(())
    }

    /// Check if status output should be displayed.
    pub fn should_print(&self) -> bool {
        !self.quiet || self.dry_run
    }
}
