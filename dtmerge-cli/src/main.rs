//! dtmerge - Merge TIFF and DocuWorks pages into a single multi-page TIFF.

mod cli;

use clap::Parser;
use std::io;
use std::process;
use std::sync::{Arc, Mutex};

use tokio::task;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use dtmerge::catalog::PageCatalog;
use dtmerge::config::{Config, OverwriteMode};
use dtmerge::error::DtMergeError;
use dtmerge::merge::{MergePipeline, run_merge};
use dtmerge::output::{
    MergePlan, OutputFormatter, ProgressBar, ProgressStyle, display_batch_report,
    display_merge_report, display_plan,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        eprintln!("Error: {err}");
        process::exit(err.exit_code());
    }
}

/// Diagnostics go to stderr; `RUST_LOG` overrides the default level.
fn init_tracing(verbose: bool) {
    let filter = if verbose { "dtmerge=debug" } else { "warn" };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), DtMergeError> {
    cli.validate()?;

    let inputs = cli.get_all_inputs().await?;
    let mut config = cli.to_config()?;
    config.inputs = inputs.sources;
    config.validate()?;

    // Keep stdout clean for the JSON plan.
    let formatter = if config.json {
        OutputFormatter::quiet()
    } else {
        OutputFormatter::from_config(&config)
    };

    formatter.section(&format!("{} v{}", dtmerge::NAME, dtmerge::VERSION));
    for path in &inputs.ignored {
        formatter.debug(&format!("Skipping unsupported file: {}", path.display()));
    }
    formatter.info(&format!("Reading {} source(s)...", config.inputs.len()));

    let pipeline = MergePipeline::from_config(&config);
    let catalog = build_catalog(&pipeline, &config, &formatter).await?;

    let plan = MergePlan::new(&config.output, config.compression, catalog.entries());
    if config.dry_run {
        if config.json {
            let json = plan
                .to_json()
                .map_err(|err| DtMergeError::other(format!("Failed to serialize plan: {err}")))?;
            println!("{json}");
        } else {
            display_plan(&formatter, &plan);
            formatter.blank_line();
            formatter.success("Dry run completed, nothing was written");
        }
        return Ok(());
    }

    handle_output_overwrite(&config, &formatter).await?;

    formatter.info(&format!(
        "Merging {} page(s) with {} compression...",
        catalog.len(),
        config.compression
    ));

    let progress = Arc::new(Mutex::new(if formatter.should_print() {
        ProgressBar::new(catalog.len(), ProgressStyle::Bar)
    } else {
        ProgressBar::disabled()
    }));
    let callback = {
        let progress = Arc::clone(&progress);
        move |done: usize, total: usize, page: &dtmerge::PageReference| {
            debug!(done, total, page = %page, "page merged");
            if let Ok(mut bar) = progress.lock() {
                bar.set_message(page.label());
                bar.update(done);
                if done == total {
                    bar.finish();
                }
            }
        }
    };

    let result = run_merge(
        pipeline,
        catalog.snapshot(),
        config.output.clone(),
        config.compression,
        callback,
    )
    .await;

    let report = match result {
        Ok(report) => report,
        Err(err) => {
            if let Ok(bar) = progress.lock() {
                bar.clear();
            }
            return Err(err);
        }
    };

    display_merge_report(&formatter, &report);
    Ok(())
}

/// Read the page lists of every input on the blocking pool.
///
/// Unreadable inputs are reported and skipped; having no pages at all is an
/// error.
async fn build_catalog(
    pipeline: &MergePipeline,
    config: &Config,
    formatter: &OutputFormatter,
) -> Result<PageCatalog, DtMergeError> {
    let sources = pipeline.sources().clone();
    let inputs = config.inputs.clone();

    let (catalog, batch) = task::spawn_blocking(move || {
        let mut catalog = PageCatalog::new();
        let batch = catalog.add_files(&sources, &inputs);
        (catalog, batch)
    })
    .await
    .map_err(|e| DtMergeError::other(format!("Catalog task failed: {e}")))?;

    display_batch_report(formatter, &batch);

    if catalog.is_empty() {
        return Err(DtMergeError::NoPagesSelected);
    }

    Ok(catalog)
}

/// Handle output file overwrite scenarios.
async fn handle_output_overwrite(
    config: &Config,
    formatter: &OutputFormatter,
) -> Result<(), DtMergeError> {
    if !config.output.exists() {
        return Ok(());
    }

    match config.overwrite_mode {
        OverwriteMode::Force => Ok(()),
        OverwriteMode::NoClobber => Err(DtMergeError::output_exists(&config.output)),
        OverwriteMode::Prompt => {
            if formatter.is_quiet() {
                return Err(DtMergeError::output_exists(&config.output));
            }

            formatter.warning(&format!(
                "Output file already exists: {}",
                config.output.display()
            ));

            use std::io::Write;
            print!("Overwrite? [y/N]: ");
            io::stdout().flush().ok();

            let mut response = String::new();
            io::stdin()
                .read_line(&mut response)
                .map_err(|err| DtMergeError::other(format!("Failed to read input: {err}")))?;

            match response.trim().to_lowercase().as_str() {
                "y" | "yes" => Ok(()),
                _ => Err(DtMergeError::Cancelled),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dtmerge::config::RendererConfig;
    use dtmerge::io::PageSources;
    use std::path::PathBuf;
    use tempfile::{NamedTempFile, TempDir};

    fn create_test_config() -> Config {
        let mut config = Config::new(vec![PathBuf::from("scan.tif")], "merged.tif");
        config.overwrite_mode = OverwriteMode::Force;
        config
    }

    #[tokio::test]
    async fn test_handle_output_overwrite_force() {
        let mut config = create_test_config();
        let existing = NamedTempFile::new().unwrap();
        config.output = existing.path().to_path_buf();

        let result = handle_output_overwrite(&config, &OutputFormatter::quiet()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_handle_output_overwrite_no_clobber() {
        let mut config = create_test_config();
        config.overwrite_mode = OverwriteMode::NoClobber;
        let existing = NamedTempFile::new().unwrap();
        config.output = existing.path().to_path_buf();

        let err = handle_output_overwrite(&config, &OutputFormatter::quiet())
            .await
            .unwrap_err();
        assert!(matches!(err, DtMergeError::OutputExists { .. }));
        assert_eq!(err.exit_code(), 4);
    }

    #[tokio::test]
    async fn test_prompt_in_quiet_mode_refuses() {
        let mut config = create_test_config();
        config.overwrite_mode = OverwriteMode::Prompt;
        let existing = NamedTempFile::new().unwrap();
        config.output = existing.path().to_path_buf();

        let result = handle_output_overwrite(&config, &OutputFormatter::quiet()).await;
        assert!(matches!(result, Err(DtMergeError::OutputExists { .. })));
    }

    #[tokio::test]
    async fn test_handle_output_overwrite_nonexistent() {
        let mut config = create_test_config();
        config.overwrite_mode = OverwriteMode::NoClobber;
        config.output = PathBuf::from("/nonexistent/dir/merged.tif");

        let result = handle_output_overwrite(&config, &OutputFormatter::quiet()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_build_catalog_without_readable_inputs() {
        let dir = TempDir::new().unwrap();
        let broken = dir.path().join("broken.tif");
        std::fs::write(&broken, b"not a tiff").unwrap();

        let mut config = create_test_config();
        config.inputs = vec![broken];
        let pipeline = MergePipeline::new(PageSources::from_renderer(RendererConfig::default()));

        let err = build_catalog(&pipeline, &config, &OutputFormatter::quiet())
            .await
            .unwrap_err();
        assert!(matches!(err, DtMergeError::NoPagesSelected));
    }
}
