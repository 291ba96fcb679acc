//! dtmerge - Merge TIFF and DocuWorks pages into a single multi-page TIFF.
//!
//! Pages are collected from multi-frame TIFF files and DocuWorks documents
//! (`.xdw`, `.xbd`, `.xct`), arranged in a [`PageCatalog`](catalog::PageCatalog)
//! and written as one TIFF at 400 DPI using CCITT Group 4 or LZW
//! compression. Group 4 output binarizes grayscale and color pages first.
//!
//! DocuWorks pages are rendered by an external program configured through
//! [`RendererConfig`](config::RendererConfig); any other rendering backend
//! can be plugged in by implementing [`CompoundEngine`](io::CompoundEngine).
//!
//! # Examples
//!
//! ## Merging files
//!
//! ```no_run
//! use dtmerge::config::{CompressionScheme, Config};
//! use dtmerge::merge;
//! use std::path::PathBuf;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = Config::new(
//!     vec![PathBuf::from("scan.tif"), PathBuf::from("report.xdw")],
//!     PathBuf::from("merged.tif"),
//! );
//! config.compression = CompressionScheme::Lzw;
//!
//! let (report, _) = merge::merge_files(&config).await?;
//! println!("Created {} page TIFF", report.statistics.total_pages);
//! # Ok(())
//! # }
//! ```
//!
//! ## Arranging pages by hand
//!
//! ```no_run
//! use dtmerge::catalog::{Direction, PageCatalog};
//! use dtmerge::config::{CompressionScheme, RendererConfig};
//! use dtmerge::io::PageSources;
//! use dtmerge::merge::MergePipeline;
//! use std::path::{Path, PathBuf};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let sources = PageSources::from_renderer(RendererConfig::with_program("/opt/xdw/render"));
//! let mut catalog = PageCatalog::new();
//! catalog.add_files(&sources, &[PathBuf::from("a.xdw"), PathBuf::from("b.tif")]);
//! catalog.move_entry(2, Direction::Up);
//!
//! let pipeline = MergePipeline::new(sources);
//! pipeline.merge_to_file(&catalog.snapshot(), Path::new("out.tif"), CompressionScheme::Group4)?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod catalog;
pub mod config;
pub mod error;
pub mod frame;
pub mod io;
pub mod merge;
pub mod output;
pub mod source;
pub mod utils;

pub use config::Config;
pub use error::{DtMergeError, Result};
pub use source::{PageReference, SourceKind};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
