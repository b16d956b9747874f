//! # Golden Tests
//!
//! These tests pin the exact bytes of a print job, so any change to
//! framing, bit order or orientation shows up as a diff.
//!
//! ## Regenerating Golden Files
//!
//! ```bash
//! cargo test generate_golden_files -- --ignored --nocapture
//! ```

use etiqueta::protocol::bitmap::{self, build_job, JobSettings, LabelImage};
use std::fs;

/// Path to golden test directory
const GOLDEN_DIR: &str = "tests/golden";

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// 8-dot checkerboard with the main diagonal flipped.
///
/// The diagonal is asymmetric under every rotation and mirror, so an
/// orientation slip cannot produce the same bytes.
fn checker_diagonal() -> LabelImage {
    LabelImage::from_fn(284, 96, |x, y| ((x / 8 + y / 8) % 2 == 0) ^ (x == y))
}

fn checker_job_bytes() -> Vec<u8> {
    let settings = JobSettings {
        copies: 2,
        density: 12,
        ..JobSettings::default()
    };
    build_job(&checker_diagonal(), &settings)
        .expect("valid job")
        .to_bytes()
        .expect("encodable job")
}

/// Write binary data to a golden file
fn write_golden(name: &str, ext: &str, data: &[u8]) {
    let path = format!("{}/{}.{}", GOLDEN_DIR, name, ext);
    fs::write(&path, data).unwrap_or_else(|e| panic!("Failed to write {}: {}", path, e));
    println!("Wrote {} ({} bytes)", path, data.len());
}

/// Compare data against a golden file
fn check_golden(name: &str, ext: &str, data: &[u8]) {
    let path = format!("{}/{}.{}", GOLDEN_DIR, name, ext);
    let golden = fs::read(&path).unwrap_or_else(|_| {
        panic!(
            "Golden file not found: {}. Run the ignored generate_golden_files test.",
            path
        )
    });

    if data.len() != golden.len() {
        panic!(
            "Golden file size mismatch for {}:\n\
             - Golden: {} bytes\n\
             - Actual: {} bytes",
            path,
            golden.len(),
            data.len()
        );
    }

    if data != golden {
        let first_diff = data
            .iter()
            .zip(golden.iter())
            .position(|(a, b)| a != b)
            .unwrap_or(data.len());

        panic!(
            "Golden file content mismatch for {}:\n\
             - First difference at byte {:#06x}",
            path, first_diff
        );
    }
}

// ============================================================================
// GOLDEN FILE GENERATOR
// ============================================================================

#[test]
#[ignore]
fn generate_golden_files() {
    write_golden("checker_diagonal", "bin", &checker_job_bytes());
}

// ============================================================================
// JOB BINARY TESTS
// ============================================================================

#[test]
fn test_binary_checker_job() {
    check_golden("checker_diagonal", "bin", &checker_job_bytes());
}

#[test]
fn test_golden_bitmap_unpacks_to_source() {
    let golden = fs::read(format!("{}/checker_diagonal.bin", GOLDEN_DIR)).unwrap();
    let header = b"BITMAP 0,0,12,284,1,";
    let start = golden
        .windows(header.len())
        .position(|w| w == header)
        .expect("BITMAP command in golden file")
        + header.len();

    let packed = bitmap::PackedBitmap {
        data: golden[start..start + 3408].to_vec(),
        row_bytes: 12,
        rows: 284,
    };
    let image = bitmap::unpack(&packed, 284, 96).unwrap();
    assert_eq!(image, checker_diagonal());
}
