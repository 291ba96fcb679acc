//! Command-line interface for dtmerge.
//!
//! Defines the clap argument structure, converts it into a
//! [`Config`](dtmerge::config::Config) and resolves the final input list from
//! positional arguments, glob patterns and an optional list file.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use dtmerge::config::{Binarization, CompressionScheme, Config, OverwriteMode, RendererConfig};
use dtmerge::error::{DtMergeError, Result};
use dtmerge::utils::{collect_paths_for_patterns, normalize_output_path, partition_supported};

/// Merge TIFF and DocuWorks pages into a single multi-page TIFF.
///
/// Every page of every input is appended in order and written at 400 DPI.
/// Group 4 output turns grayscale and color pages into black and white;
/// LZW keeps them as they are.
#[derive(Parser, Debug)]
#[command(name = "dtmerge")]
#[command(version)]
#[command(about = "Merge TIFF and DocuWorks pages into a single multi-page TIFF", long_about = None)]
#[command(author)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Input files (.tif, .tiff, .xdw, .xbd, .xct) in merge order
    ///
    /// Glob patterns are expanded and sorted by name. Files with other
    /// extensions are skipped.
    ///
    /// Examples:
    ///   dtmerge scan.tif report.xdw -o merged.tif
    ///   dtmerge 'batch/*.tif' -o batch.tif
    #[arg(value_name = "FILE", required_unless_present = "input_list")]
    pub inputs: Vec<PathBuf>,

    /// Output TIFF file
    ///
    /// The extension is replaced with .tif unless it already is .tif or .tiff.
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// Compression for every output page
    ///
    /// - g4: CCITT Group 4, black and white only (default)
    /// - lzw: lossless, keeps grayscale and color
    #[arg(short, long, value_name = "SCHEME", default_value = "g4")]
    #[arg(value_parser = ["g4", "group4", "lzw"])]
    pub compression: String,

    /// How grayscale and color pages become black and white for g4
    ///
    /// - dither: Floyd-Steinberg error diffusion (default)
    /// - otsu: per-page automatic threshold
    /// - threshold: fixed level set with --threshold
    #[arg(long, value_name = "METHOD", default_value = "dither")]
    #[arg(value_parser = ["dither", "otsu", "threshold"])]
    pub binarize: String,

    /// Luma level for --binarize threshold; brighter pixels become white
    #[arg(long, value_name = "LEVEL")]
    pub threshold: Option<u8>,

    /// Read more inputs from a file, one per line ('-' for stdin)
    ///
    /// Blank lines and lines starting with '#' are ignored. Listed inputs
    /// are appended after the positional ones.
    #[arg(long, value_name = "FILE")]
    pub input_list: Option<PathBuf>,

    /// Program that renders DocuWorks pages
    ///
    /// Without a renderer, DocuWorks inputs are reported as unreadable.
    #[arg(long, value_name = "PROGRAM", env = "DTMERGE_RENDERER")]
    pub renderer: Option<PathBuf>,

    /// Renderer arguments that print the page count of {input}
    #[arg(
        long,
        value_name = "ARGS",
        env = "DTMERGE_RENDERER_COUNT_ARGS",
        default_value = RendererConfig::DEFAULT_COUNT_ARGS
    )]
    pub renderer_count_args: String,

    /// Renderer arguments that write page {page} of {input} to {output}
    ///
    /// Placeholders: {input}, {page} (1-based), {index} (0-based), {dpi},
    /// {output}.
    #[arg(
        long,
        value_name = "ARGS",
        env = "DTMERGE_RENDERER_EXPORT_ARGS",
        default_value = RendererConfig::DEFAULT_EXPORT_ARGS
    )]
    pub renderer_export_args: String,

    /// List the pages that would be merged without writing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Print the dry-run page list as JSON
    #[arg(long, requires = "dry_run")]
    pub json: bool,

    /// Show per-page progress details and statistics
    #[arg(short, long)]
    pub verbose: bool,

    /// Overwrite the output file without asking
    #[arg(short, long)]
    pub force: bool,

    /// Never overwrite the output file
    #[arg(long, conflicts_with = "force")]
    pub no_clobber: bool,

    /// Only print warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Inputs after pattern expansion and extension filtering.
#[derive(Debug, Default)]
pub struct CollectedInputs {
    /// Supported sources, in merge order.
    pub sources: Vec<PathBuf>,
    /// Files skipped because of their extension.
    pub ignored: Vec<PathBuf>,
}

impl Cli {
    /// Convert the arguments into a validated [`Config`].
    ///
    /// Inputs are taken verbatim; use [`get_all_inputs`](Self::get_all_inputs)
    /// for the expanded list.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for unknown schemes or methods, a threshold
    /// without the threshold method, or an invalid configuration.
    pub fn to_config(&self) -> Result<Config> {
        let overwrite_mode = if self.force {
            OverwriteMode::Force
        } else if self.no_clobber {
            OverwriteMode::NoClobber
        } else {
            OverwriteMode::Prompt
        };

        let config = Config {
            inputs: self.inputs.clone(),
            output: normalize_output_path(&self.output),
            compression: CompressionScheme::from_str(&self.compression)?,
            binarization: Binarization::parse(&self.binarize, self.threshold)?,
            renderer: self.renderer_config(),
            dry_run: self.dry_run,
            json: self.json,
            verbose: self.verbose,
            quiet: self.quiet,
            overwrite_mode,
        };

        if !config.inputs.is_empty() {
            config.validate()?;
        }

        Ok(config)
    }

    /// Check argument combinations that need no file access.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if there are no inputs at all, the scheme or
    /// method is unknown, or `--threshold` is given without
    /// `--binarize threshold`.
    pub fn validate(&self) -> Result<()> {
        if self.inputs.is_empty() && self.input_list.is_none() {
            return Err(DtMergeError::invalid_config("No input files specified"));
        }

        CompressionScheme::from_str(&self.compression)?;
        Binarization::parse(&self.binarize, self.threshold)?;

        if self.json && !self.dry_run {
            return Err(DtMergeError::invalid_config(
                "--json is only available together with --dry-run",
            ));
        }

        Ok(())
    }

    /// Resolve every input: positional arguments, then the input list,
    /// with glob patterns expanded and unsupported files set aside.
    ///
    /// # Errors
    ///
    /// Returns an error if the input list cannot be read, a pattern is
    /// malformed, or no supported input remains.
    pub async fn get_all_inputs(&self) -> Result<CollectedInputs> {
        let mut patterns = self.inputs.clone();

        if let Some(ref list) = self.input_list {
            patterns.extend(read_input_list(list).await?);
        }

        let expanded = collect_paths_for_patterns(
            patterns.iter().map(|pattern| pattern.to_string_lossy().into_owned()),
        )?;
        let (sources, ignored) = partition_supported(expanded);

        if sources.is_empty() {
            return Err(DtMergeError::NoPagesSelected);
        }

        Ok(CollectedInputs { sources, ignored })
    }

    fn renderer_config(&self) -> RendererConfig {
        RendererConfig {
            program: self.renderer.clone(),
            count_args: self.renderer_count_args.clone(),
            export_args: self.renderer_export_args.clone(),
        }
    }
}

/// Read input paths from a list file, or stdin when `path` is `-`.
async fn read_input_list(path: &Path) -> Result<Vec<PathBuf>> {
    if path.as_os_str() == "-" {
        return read_lines(BufReader::new(tokio::io::stdin()), path).await;
    }

    let file = tokio::fs::File::open(path)
        .await
        .map_err(|err| list_error(path, &err))?;
    read_lines(BufReader::new(file), path).await
}

async fn read_lines<R>(reader: R, path: &Path) -> Result<Vec<PathBuf>>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut paths = Vec::new();

    while let Some(line) = lines.next_line().await.map_err(|err| list_error(path, &err))? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        paths.push(PathBuf::from(line));
    }

    Ok(paths)
}

fn list_error(path: &Path, err: &std::io::Error) -> DtMergeError {
    DtMergeError::invalid_config(format!("Cannot read input list {}: {err}", path.display()))
}
