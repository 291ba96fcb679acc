//! Merges that must fail cleanly.

use std::path::PathBuf;

use dtmerge::config::CompressionScheme;
use dtmerge::error::DtMergeError;
use dtmerge::merge::MergePipeline;
use dtmerge::source::{PageReference, SourceKind};
use rstest::rstest;
use tempfile::TempDir;

use crate::common::{ExportFault, FakeEngine, write_gray_tiff};

fn compound(path: &str, index: usize) -> PageReference {
    PageReference::new(path, index, SourceKind::CompoundDocument)
}

#[rstest]
#[case(CompressionScheme::Group4)]
#[case(CompressionScheme::Lzw)]
fn test_empty_merge_touches_nothing(#[case] scheme: CompressionScheme) {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.tif");
    let (sources, counters) = FakeEngine::new().into_sources();

    let err = MergePipeline::new(sources)
        .merge_to_file(&[], &output, scheme)
        .unwrap_err();

    assert!(matches!(err, DtMergeError::NoPagesSelected));
    assert!(!output.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    assert_eq!(counters.opened(), 0);
}

#[rstest]
#[case(ExportFault::Crash)]
#[case(ExportFault::Garbage)]
fn test_failure_midway_releases_everything(#[case] fault: ExportFault) {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.tif");
    let (sources, counters) = FakeEngine::new()
        .with_document("/virtual/docA.xdw", &[0, 50])
        .with_document("/virtual/docB.xdw", &[100, 150, 200])
        .with_fault("/virtual/docB.xdw", 0, fault)
        .into_sources();

    let pages = vec![
        compound("/virtual/docA.xdw", 0),
        compound("/virtual/docA.xdw", 1),
        compound("/virtual/docB.xdw", 0),
        compound("/virtual/docB.xdw", 1),
        compound("/virtual/docB.xdw", 2),
    ];

    let err = MergePipeline::new(sources)
        .merge_to_file(&pages, &output, CompressionScheme::Group4)
        .unwrap_err();

    match err {
        DtMergeError::DecodeFailure { path, page_index, .. } => {
            assert_eq!(path, PathBuf::from("/virtual/docB.xdw"));
            assert_eq!(page_index, 0);
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(counters.opened(), 2);
    assert_eq!(counters.closed(), 2);
    let artifacts = counters.artifacts();
    assert!(!artifacts.is_empty());
    for artifact in &artifacts {
        assert!(!artifact.exists(), "{} was left behind", artifact.display());
        assert!(!artifact.parent().unwrap().exists());
    }
    assert!(!output.exists());
}

#[test]
fn test_raster_page_out_of_range() {
    let dir = TempDir::new().unwrap();
    let scan = dir.path().join("scan.tif");
    write_gray_tiff(&scan, &[10, 20]);
    let output = dir.path().join("out.tif");
    let (sources, _) = FakeEngine::new().into_sources();

    let pages = vec![
        PageReference::new(&scan, 1, SourceKind::RasterMultiFrame),
        PageReference::new(&scan, 5, SourceKind::RasterMultiFrame),
    ];
    let err = MergePipeline::new(sources)
        .merge_to_file(&pages, &output, CompressionScheme::Lzw)
        .unwrap_err();

    assert!(matches!(
        err,
        DtMergeError::PageIndexOutOfRange { page_index: 5, .. }
    ));
    assert_eq!(err.exit_code(), 3);
    assert!(!output.exists());
}

#[test]
fn test_compound_page_out_of_range_closes_handle() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.tif");
    let (sources, counters) = FakeEngine::new()
        .with_document("/virtual/docA.xdw", &[0])
        .into_sources();

    let err = MergePipeline::new(sources)
        .merge_to_file(&[compound("/virtual/docA.xdw", 3)], &output, CompressionScheme::Group4)
        .unwrap_err();

    assert!(matches!(err, DtMergeError::PageIndexOutOfRange { .. }));
    assert_eq!(counters.closed(), counters.opened());
    assert!(!output.exists());
}

#[test]
fn test_unreadable_document_during_merge() {
    let dir = TempDir::new().unwrap();
    let scan = dir.path().join("scan.tif");
    write_gray_tiff(&scan, &[10]);
    let output = dir.path().join("out.tif");
    let (sources, counters) = FakeEngine::new()
        .with_document("/virtual/docA.xdw", &[0])
        .into_sources();

    let pages = vec![
        compound("/virtual/docA.xdw", 0),
        PageReference::new(&scan, 0, SourceKind::RasterMultiFrame),
        compound("/virtual/gone.xdw", 0),
    ];
    let err = MergePipeline::new(sources)
        .merge_to_file(&pages, &output, CompressionScheme::Group4)
        .unwrap_err();

    assert!(matches!(err, DtMergeError::SourceUnreadable { .. }));
    assert_eq!(err.file_name().as_deref(), Some("gone.xdw"));
    assert_eq!((counters.opened(), counters.closed()), (1, 1));
    assert!(!output.exists());
}

#[test]
fn test_write_failure_still_releases_documents() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("missing").join("out.tif");
    let (sources, counters) = FakeEngine::new()
        .with_document("/virtual/docA.xdw", &[0, 255])
        .into_sources();

    let pages = vec![compound("/virtual/docA.xdw", 0), compound("/virtual/docA.xdw", 1)];
    let err = MergePipeline::new(sources)
        .merge_to_file(&pages, &output, CompressionScheme::Group4)
        .unwrap_err();

    assert!(matches!(err, DtMergeError::WriteFailure { .. }));
    assert!(err.is_fatal());
    assert_eq!((counters.opened(), counters.closed()), (1, 1));
    assert!(!output.exists());
}
