#![no_main]

use dtmerge::config::CompressionScheme;
use dtmerge::io::RasterReader;
use dtmerge::merge::FrameNormalizer;
use libfuzzer_sys::fuzz_target;
use std::io::Write;

fuzz_target!(|data: &[u8]| {
    let Ok(mut file) = tempfile::Builder::new().suffix(".tif").tempfile() else {
        return;
    };
    if file.write_all(data).is_err() {
        return;
    }

    // Arbitrary bytes must produce errors, never panics.
    let reader = RasterReader::new();
    let Ok(count) = reader.page_count(file.path()) else {
        return;
    };

    let normalizer = FrameNormalizer::default();
    for index in 0..count.min(4) {
        if let Ok(frame) = reader.extract_frame(file.path(), index) {
            let frame = normalizer.normalize(frame, CompressionScheme::Group4);
            assert!(frame.is_bilevel());
        }
    }
});
