//! User-facing output.
//!
//! - [`formatter`]: quiet/verbose aware status messages
//! - [`progress`]: page progress indicator
//!
//! The helpers here render catalog, plan and merge results through an
//! [`OutputFormatter`].
//!
//! # Examples
//!
//! ```no_run
//! use dtmerge::config::Config;
//! use dtmerge::output::OutputFormatter;
//!
//! # fn example(config: Config) {
//! let formatter = OutputFormatter::from_config(&config);
//! formatter.info("Collecting pages");
//! formatter.success("Merge complete");
//! # }
//! ```

pub mod formatter;
pub mod progress;

pub use formatter::{MessageLevel, OutputFormatter};
pub use progress::{ProgressBar, ProgressStyle, format_duration};

use serde::Serialize;
use std::path::PathBuf;

use crate::catalog::BatchReport;
use crate::config::{CompressionScheme, OUTPUT_DPI};
use crate::merge::MergeReport;
use crate::source::PageReference;

/// Page sequence a merge would produce, as printed by a dry run.
#[derive(Debug, Clone, Serialize)]
pub struct MergePlan {
    /// Output file.
    pub output: PathBuf,
    /// Compression scheme.
    pub compression: CompressionScheme,
    /// Output resolution.
    pub dpi: u32,
    /// Pages in output order.
    pub pages: Vec<PlannedPage>,
}

/// One page of a [`MergePlan`].
#[derive(Debug, Clone, Serialize)]
pub struct PlannedPage {
    /// Display label such as `scan.tif-p002`.
    pub label: String,
    /// Source page.
    #[serde(flatten)]
    pub reference: PageReference,
}

impl MergePlan {
    /// Build a plan for writing `pages` to `output`.
    pub fn new(output: impl Into<PathBuf>, compression: CompressionScheme, pages: &[PageReference]) -> Self {
        Self {
            output: output.into(),
            compression,
            dpi: OUTPUT_DPI,
            pages: pages
                .iter()
                .map(|reference| PlannedPage {
                    label: reference.label(),
                    reference: reference.clone(),
                })
                .collect(),
        }
    }

    /// Render the plan as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Display the files that could not be added to the catalog.
pub fn display_batch_report(formatter: &OutputFormatter, report: &BatchReport) {
    if !report.is_clean() {
        formatter.warning(&format!("{} file(s) could not be read:", report.errors.len()));
        for line in report.summary().lines() {
            formatter.warning(&format!("  {line}"));
        }
    }

    formatter.debug(&format!(
        "Collected {} page(s) from {} file(s)",
        report.pages_added, report.files_added
    ));
}

/// Display a dry-run plan as a numbered list.
pub fn display_plan(formatter: &OutputFormatter, plan: &MergePlan) {
    formatter.section(&format!(
        "Would write {} page(s) to {} ({}, {} DPI):",
        plan.pages.len(),
        plan.output.display(),
        plan.compression,
        plan.dpi
    ));
    for (index, page) in plan.pages.iter().enumerate() {
        formatter.list_item(index + 1, &page.label);
        formatter.detail("source", &page.reference.source_path.display().to_string());
    }
}

/// Display the outcome of a completed merge.
pub fn display_merge_report(formatter: &OutputFormatter, report: &MergeReport) {
    let stats = &report.statistics;
    formatter.success(&format!(
        "Wrote {} page(s) to {} ({})",
        report.write.pages,
        report.write.output_path.display(),
        report.write.format_file_size()
    ));

    formatter.detail("Compression", &report.write.compression.to_string());
    formatter.detail("TIFF pages", &stats.raster_pages.to_string());
    formatter.detail("DocuWorks pages", &stats.compound_pages.to_string());
    formatter.detail("Documents opened", &stats.documents_opened.to_string());
    formatter.detail("Frames binarized", &stats.frames_converted.to_string());
    formatter.detail("Merge time", &format_duration(stats.merge_time));
    formatter.detail("Write time", &format_duration(report.write.write_time));
}
