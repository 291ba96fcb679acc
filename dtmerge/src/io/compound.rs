//! DocuWorks compound document access.
//!
//! Compound pages cannot be decoded directly. A [`CompoundEngine`] opens a
//! document and hands out a [`CompoundDocument`] handle that renders single
//! pages to uncompressed TIFF artifacts, which the raster reader then decodes.
//!
//! [`CommandEngine`] drives an external converter program. Without a
//! configured program it behaves like a platform without DocuWorks support:
//! every open fails with [`DtMergeError::SourceUnreadable`].

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::{debug, instrument, warn};

use crate::config::RendererConfig;
use crate::error::{DtMergeError, Result};

/// Open compound document.
///
/// Handles are owned by whoever opened them and must be closed exactly once.
pub trait CompoundDocument: Send {
    /// Path the handle was opened from.
    fn path(&self) -> &Path;

    /// Number of pages in the document.
    fn page_count(&self) -> usize;

    /// Render one page to an uncompressed TIFF at `destination`.
    ///
    /// # Errors
    ///
    /// Returns `PageIndexOutOfRange` for pages past the end of the document
    /// and `DecodeFailure` if rendering fails.
    fn export_page(&mut self, page_index: usize, destination: &Path, dpi: u32) -> Result<()>;

    /// Release the handle.
    fn close(&mut self) -> Result<()>;
}

/// Factory for compound document handles.
pub trait CompoundEngine: Send + Sync {
    /// Open a document.
    ///
    /// # Errors
    ///
    /// Returns `SourceUnreadable` if the document cannot be opened.
    fn open(&self, path: &Path) -> Result<Box<dyn CompoundDocument>>;

    /// Open a document just long enough to count its pages.
    fn page_count(&self, path: &Path) -> Result<usize> {
        let mut document = self.open(path)?;
        let count = document.page_count();
        if let Err(err) = document.close() {
            warn!(path = %path.display(), error = %err, "failed to close document after counting pages");
        }
        Ok(count)
    }
}

/// Compound engine backed by an external renderer program.
#[derive(Debug, Clone, Default)]
pub struct CommandEngine {
    config: RendererConfig,
}

impl CommandEngine {
    /// Create an engine from renderer settings.
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    /// Engine that rejects every compound document.
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Renderer settings in use.
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }
}

impl CompoundEngine for CommandEngine {
    #[instrument(skip(self, path), fields(path = %path.display()))]
    fn open(&self, path: &Path) -> Result<Box<dyn CompoundDocument>> {
        let program = self.config.program.as_ref().ok_or_else(|| {
            DtMergeError::source_unreadable(
                path,
                "no DocuWorks renderer configured (use --renderer or DTMERGE_RENDERER)",
            )
        })?;

        let metadata =
            std::fs::metadata(path).map_err(|err| DtMergeError::source_unreadable(path, err.to_string()))?;
        if !metadata.is_file() {
            return Err(DtMergeError::source_unreadable(path, "not a regular file"));
        }

        let args = expand_args(&self.config.count_args, &Placeholders::for_input(path));
        let output = run(program, &args).map_err(|reason| DtMergeError::source_unreadable(path, reason))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let page_count = parse_page_count(&stdout).ok_or_else(|| {
            DtMergeError::source_unreadable(path, format!("renderer reported no page count: {}", stdout.trim()))
        })?;

        debug!(page_count, "opened compound document");
        Ok(Box::new(CommandDocument {
            program: program.clone(),
            export_args: self.config.export_args.clone(),
            path: path.to_path_buf(),
            page_count,
        }))
    }
}

/// Handle produced by [`CommandEngine`].
///
/// The renderer is stateless between invocations, so the handle only
/// caches what was learned at open time.
#[derive(Debug)]
struct CommandDocument {
    program: PathBuf,
    export_args: String,
    path: PathBuf,
    page_count: usize,
}

impl CompoundDocument for CommandDocument {
    fn path(&self) -> &Path {
        &self.path
    }

    fn page_count(&self) -> usize {
        self.page_count
    }

    #[instrument(skip(self, destination), fields(path = %self.path.display()))]
    fn export_page(&mut self, page_index: usize, destination: &Path, dpi: u32) -> Result<()> {
        if page_index >= self.page_count {
            return Err(DtMergeError::page_out_of_range(&self.path, page_index, self.page_count));
        }

        let placeholders = Placeholders {
            input: self.path.to_string_lossy().into_owned(),
            page: (page_index + 1).to_string(),
            index: page_index.to_string(),
            dpi: dpi.to_string(),
            output: destination.to_string_lossy().into_owned(),
        };
        let args = expand_args(&self.export_args, &placeholders);
        run(&self.program, &args).map_err(|reason| DtMergeError::decode_failure(&self.path, page_index, reason))?;

        if !destination.is_file() {
            return Err(DtMergeError::decode_failure(
                &self.path,
                page_index,
                format!("renderer did not create {}", destination.display()),
            ));
        }

        debug!(page_index, artifact = %destination.display(), "rendered compound page");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Placeholders {
    input: String,
    page: String,
    index: String,
    dpi: String,
    output: String,
}

impl Placeholders {
    fn for_input(path: &Path) -> Self {
        Self {
            input: path.to_string_lossy().into_owned(),
            ..Default::default()
        }
    }
}

/// Split a template on whitespace and substitute placeholders in each piece.
///
/// Substituted values are never split, so paths with spaces stay one argument.
fn expand_args(template: &str, values: &Placeholders) -> Vec<String> {
    template
        .split_whitespace()
        .map(|piece| {
            piece
                .replace("{input}", &values.input)
                .replace("{page}", &values.page)
                .replace("{index}", &values.index)
                .replace("{dpi}", &values.dpi)
                .replace("{output}", &values.output)
        })
        .collect()
}

fn run(program: &Path, args: &[String]) -> std::result::Result<Output, String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|err| format!("failed to run {}: {err}", program.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "{} exited with {}: {}",
            program.display(),
            output.status,
            stderr.trim()
        ));
    }

    Ok(output)
}

/// First token of renderer output that parses as a page count.
fn parse_page_count(stdout: &str) -> Option<usize> {
    stdout
        .split(|c: char| !c.is_ascii_digit())
        .find(|token| !token.is_empty())
        .and_then(|token| token.parse().ok())
}
