//! Page merging.
//!
//! This module turns an ordered page list into a single multi-page TIFF:
//! - [`pipeline`]: ordered extraction, normalization and writing
//! - [`tracker`]: per-merge document handles and scratch files
//! - [`normalize`]: pixel format adaptation for the chosen compression
//!
//! # Examples
//!
//! ```no_run
//! use dtmerge::config::Config;
//! use dtmerge::merge::merge_files;
//! use std::path::PathBuf;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::new(
//!     vec![PathBuf::from("scan.tif"), PathBuf::from("report.xdw")],
//!     PathBuf::from("merged.tif"),
//! );
//!
//! let (report, batch) = merge_files(&config).await?;
//! println!("Merged {} pages ({} files skipped)", report.statistics.total_pages, batch.errors.len());
//! # Ok(())
//! # }
//! ```

pub mod normalize;
pub mod pipeline;
pub mod tracker;

pub use normalize::FrameNormalizer;
pub use pipeline::{MergeOutput, MergePipeline, MergeReport, MergeStatistics, run_merge};
pub use tracker::ResourceTracker;

use crate::catalog::{BatchReport, PageCatalog};
use crate::config::Config;
use crate::error::{DtMergeError, Result};
use crate::utils::normalize_output_path;

/// Merge every page of the configured inputs into the configured output.
///
/// Inputs that cannot be read are skipped and reported in the returned
/// [`BatchReport`]; the remaining pages are merged in input order. An output
/// path without a `.tif`/`.tiff` extension is written as `.tif`.
///
/// # Arguments
///
/// * `config` - Merge configuration
///
/// # Returns
///
/// The merge report and the per-file outcome of reading the inputs.
///
/// # Errors
///
/// Returns `NoPagesSelected` if no input contributed a page, or any error
/// raised while merging or writing.
pub async fn merge_files(config: &Config) -> Result<(MergeReport, BatchReport)> {
    config.validate()?;

    let pipeline = MergePipeline::from_config(config);
    let mut catalog = PageCatalog::new();
    let batch = catalog.add_files(pipeline.sources(), &config.inputs);

    if catalog.is_empty() {
        return Err(DtMergeError::NoPagesSelected);
    }

    let report = run_merge(
        pipeline,
        catalog.snapshot(),
        normalize_output_path(&config.output),
        config.compression,
        |_, _, _| {},
    )
    .await?;

    Ok((report, batch))
}
