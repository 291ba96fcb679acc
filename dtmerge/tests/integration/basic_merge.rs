//! End-to-end merges that are expected to succeed.

use std::path::PathBuf;

use dtmerge::catalog::{Direction, PageCatalog};
use dtmerge::config::{Binarization, CompressionScheme, Config};
use dtmerge::merge::{FrameNormalizer, MergePipeline, merge_files};
use dtmerge::source::{PageReference, SourceKind};
use tempfile::TempDir;
use tiff::decoder::ifd::Value;

use crate::common::{FakeEngine, PAGE_HEIGHT, PAGE_WIDTH, page_tags, read_pages, shade, write_gray_tiff};

#[test]
fn test_raster_merge_preserves_order_and_count() {
    let dir = TempDir::new().unwrap();
    let first = dir.path().join("first.tif");
    let second = dir.path().join("second.tif");
    write_gray_tiff(&first, &[10, 200, 30]);
    write_gray_tiff(&second, &[250]);

    let (sources, _) = FakeEngine::new().into_sources();
    let mut catalog = PageCatalog::new();
    let report = catalog.add_files(&sources, &[first, second]);
    assert!(report.is_clean());
    assert_eq!(report.pages_added, 4);

    let output = dir.path().join("merged.tif");
    let merged = MergePipeline::new(sources)
        .merge_to_file(&catalog.snapshot(), &output, CompressionScheme::Lzw)
        .unwrap();

    assert_eq!(merged.statistics.total_pages, 4);
    assert_eq!(merged.statistics.raster_pages, 4);
    assert_eq!(merged.statistics.frames_converted, 0);
    assert_eq!(merged.write.pages, 4);

    let shades: Vec<u8> = read_pages(&output).iter().map(shade).collect();
    assert_eq!(shades, vec![10, 200, 30, 250]);
}

#[test]
fn test_interleaved_compound_pages_open_each_document_once() {
    let dir = TempDir::new().unwrap();
    let doc_a = PathBuf::from("/virtual/docA.xdw");
    let doc_b = PathBuf::from("/virtual/docB.xdw");

    let (sources, counters) = FakeEngine::new()
        .with_document(&doc_a, &[0, 0])
        .with_document(&doc_b, &[255])
        .into_sources();

    let pages = vec![
        PageReference::new(&doc_a, 0, SourceKind::CompoundDocument),
        PageReference::new(&doc_b, 0, SourceKind::CompoundDocument),
        PageReference::new(&doc_a, 1, SourceKind::CompoundDocument),
    ];

    let output = dir.path().join("merged.tif");
    let merged = MergePipeline::new(sources)
        .merge_to_file(&pages, &output, CompressionScheme::Group4)
        .unwrap();

    assert_eq!(merged.statistics.compound_pages, 3);
    assert_eq!(merged.statistics.documents_opened, 2);
    assert_eq!(merged.statistics.frames_converted, 3);
    assert_eq!(counters.opened(), 2);
    assert_eq!(counters.closed(), 2);
    assert!(counters.artifacts().iter().all(|artifact| !artifact.exists()));

    let frames = read_pages(&output);
    assert_eq!(frames.len(), 3);
    assert!(frames.iter().all(|frame| frame.is_bilevel()));
    let white: Vec<_> = frames.iter().map(|frame| frame.is_white(0, 0)).collect();
    assert_eq!(white, vec![Some(false), Some(true), Some(false)]);

    for (compression, bits, resolution) in page_tags(&output) {
        assert_eq!(compression, 4);
        assert_eq!(bits, 1);
        assert!(matches!(resolution, Value::Rational(400, 1)));
    }
}

#[test]
fn test_mixed_sources_in_catalog_order() {
    let dir = TempDir::new().unwrap();
    let scan = dir.path().join("scan.tif");
    write_gray_tiff(&scan, &[40, 80]);
    let doc = PathBuf::from("/virtual/report.xdw");

    let (sources, _) = FakeEngine::new().with_document(&doc, &[120]).into_sources();
    let mut catalog = PageCatalog::new();
    catalog.add_pages(&sources, &scan).unwrap();
    catalog.add_pages(&sources, &doc).unwrap();

    // scan p1, report p1, scan p2
    assert_eq!(catalog.move_entry(2, Direction::Up), Some(1));

    let output = dir.path().join("mixed.tif");
    let merged = MergePipeline::new(sources)
        .merge_to_file(&catalog.snapshot(), &output, CompressionScheme::Lzw)
        .unwrap();

    assert_eq!(merged.statistics.raster_pages, 2);
    assert_eq!(merged.statistics.compound_pages, 1);

    let frames = read_pages(&output);
    assert!(frames.iter().all(|frame| (frame.width(), frame.height()) == (PAGE_WIDTH, PAGE_HEIGHT)));
    let shades: Vec<u8> = frames.iter().map(shade).collect();
    assert_eq!(shades, vec![40, 120, 80]);
}

#[test]
fn test_threshold_binarization_for_group4() {
    let dir = TempDir::new().unwrap();
    let scan = dir.path().join("scan.tif");
    write_gray_tiff(&scan, &[90, 160]);

    let (sources, _) = FakeEngine::new().into_sources();
    let pages = vec![
        PageReference::new(&scan, 0, SourceKind::RasterMultiFrame),
        PageReference::new(&scan, 1, SourceKind::RasterMultiFrame),
    ];

    let output = dir.path().join("bw.tif");
    MergePipeline::new(sources)
        .with_normalizer(FrameNormalizer::new(Binarization::Threshold(128)))
        .merge_to_file(&pages, &output, CompressionScheme::Group4)
        .unwrap();

    let white: Vec<_> = read_pages(&output)
        .iter()
        .map(|frame| frame.is_white(PAGE_WIDTH - 1, PAGE_HEIGHT - 1))
        .collect();
    assert_eq!(white, vec![Some(false), Some(true)]);
}

#[test]
fn test_batch_with_failures_keeps_good_files() {
    let dir = TempDir::new().unwrap();
    let good = dir.path().join("good.tif");
    let broken = dir.path().join("broken.tif");
    let last = dir.path().join("last.tif");
    write_gray_tiff(&good, &[1, 2]);
    std::fs::write(&broken, b"II*\0garbage").unwrap();
    write_gray_tiff(&last, &[3]);

    let doc = PathBuf::from("/virtual/docA.xdw");
    let locked = PathBuf::from("/virtual/locked.xdw");
    let (sources, _) = FakeEngine::new().with_document(&doc, &[4, 5]).into_sources();

    let mut catalog = PageCatalog::new();
    let report = catalog.add_files(&sources, &[good, broken, doc, locked, last]);

    assert_eq!(report.files_added, 3);
    assert_eq!(report.pages_added, 5);
    assert_eq!(report.errors.len(), 2);
    assert_eq!(catalog.len(), 5);

    let summary = report.summary();
    assert!(summary.contains("broken.tif: "));
    assert!(summary.contains("locked.xdw: document is locked"));

    let labels: Vec<_> = catalog.entries().iter().map(PageReference::label).collect();
    assert_eq!(
        labels,
        vec!["good.tif-p001", "good.tif-p002", "docA.xdw-p001", "docA.xdw-p002", "last.tif-p001"]
    );
}

#[tokio::test]
async fn test_merge_files_from_config() {
    let dir = TempDir::new().unwrap();
    let first = dir.path().join("a.tif");
    let second = dir.path().join("b.tif");
    write_gray_tiff(&first, &[12]);
    write_gray_tiff(&second, &[34, 56]);

    let mut config = Config::new(
        vec![first, dir.path().join("missing.tif"), second],
        dir.path().join("out.tif"),
    );
    config.compression = CompressionScheme::Lzw;

    let (report, batch) = merge_files(&config).await.unwrap();

    assert_eq!(batch.errors.len(), 1);
    assert_eq!(report.statistics.total_pages, 3);
    assert_eq!(report.write.output_path, config.output);

    let shades: Vec<u8> = read_pages(&config.output).iter().map(shade).collect();
    assert_eq!(shades, vec![12, 34, 56]);
}

#[tokio::test]
async fn test_merge_files_forces_tiff_extension() {
    let dir = TempDir::new().unwrap();
    let scan = dir.path().join("scan.tif");
    write_gray_tiff(&scan, &[77]);

    let mut config = Config::new(vec![scan], dir.path().join("merged.png"));
    config.compression = CompressionScheme::Lzw;

    let (report, _) = merge_files(&config).await.unwrap();

    let expected = dir.path().join("merged.tif");
    assert_eq!(report.write.output_path, expected);
    assert!(!config.output.exists());
    let shades: Vec<u8> = read_pages(&expected).iter().map(shade).collect();
    assert_eq!(shades, vec![77]);
}
