//! # Printer Configuration
//!
//! This module defines hardware specifications for supported label printers
//! and the I/O tuning used when talking to them.
//!
//! ## Supported Printers
//!
//! | Model | Label (mm) | Image (dots) | Resolution | Device raster |
//! |-------|------------|--------------|------------|---------------|
//! | Nelko P21 | 14 × 40 | 284 × 96 | 203 DPI | 12 bytes × 284 rows |
//!
//! ## Usage
//!
//! ```
//! use etiqueta::printer::PrinterConfig;
//!
//! let config = PrinterConfig::P21;
//! println!("Label image: {}x{} dots ({} bytes)",
//!          config.image_width,
//!          config.image_height,
//!          config.bitmap_len());
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::EtiquetaError;
use crate::protocol::frame::DEFAULT_MAX_LINE_LEN;

/// # Printer Configuration
///
/// Defines the hardware characteristics of a label printer.
///
/// ## Orientation
///
/// The label image is described the way a person reads the label: wide and
/// short. The print head runs across the short side, so the device receives
/// the image rotated by a quarter turn:
///
/// ```text
///          image_width (284)
///   ┌──────────────────────────┐
///   │                          │ image_height (96)
///   └──────────────────────────┘
///
///   device raster: 284 rows of 96 dots (12 bytes each)
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrinterConfig {
    /// Printer model name
    pub name: &'static str,

    /// Label image width in dots (long side)
    pub image_width: usize,

    /// Label image height in dots (short side, across the print head)
    pub image_height: usize,

    /// Resolution in dots per inch
    pub dpi: u16,

    /// Physical label width and length in millimeters
    pub label_mm: (f32, f32),

    /// Gap between labels in millimeters
    pub gap_mm: f32,

    /// Default print density (0-15)
    pub default_density: u8,
}

impl PrinterConfig {
    /// # Nelko P21 Configuration
    ///
    /// Handheld Bluetooth label printer using a TSPL2 subset.
    ///
    /// | Property | Value |
    /// |----------|-------|
    /// | Label | 14mm × 40mm, gapped |
    /// | Printable image | 284 × 96 dots |
    /// | Resolution | 203 DPI |
    /// | Interface | Bluetooth SPP |
    pub const P21: Self = Self {
        name: "Nelko P21",
        image_width: 284,
        image_height: 96,
        dpi: 203,
        label_mm: (14.0, 40.0),
        gap_mm: 5.0,
        default_density: 15,
    };

    /// Bytes per device raster row (one column of the label image)
    #[inline]
    pub fn row_bytes(&self) -> usize {
        self.image_height.div_ceil(8)
    }

    /// Number of device raster rows (one per label image column)
    #[inline]
    pub fn rows(&self) -> usize {
        self.image_width
    }

    /// Size of the packed `BITMAP` payload in bytes
    #[inline]
    pub fn bitmap_len(&self) -> usize {
        self.row_bytes() * self.rows()
    }
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self::P21
    }
}

// ============================================================================
// LINK CONFIGURATION
// ============================================================================

/// I/O tuning for one connection to the printer.
///
/// Loaded from JSON when the defaults don't suit a particular link:
///
/// ```json
/// { "read_timeout_ms": 1500, "max_line_len": 256, "ready_attempts": 20, "ready_delay_ms": 250 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// How long a single response read may block
    pub read_timeout_ms: u64,

    /// Upper bound on a response line before the terminator must appear
    pub max_line_len: usize,

    /// Cancel-pause polls before giving up on a ready printer
    pub ready_attempts: u32,

    /// Delay between ready polls
    pub ready_delay_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: 1000,
            max_line_len: DEFAULT_MAX_LINE_LEN,
            ready_attempts: 10,
            ready_delay_ms: 200,
        }
    }
}

impl LinkConfig {
    /// Load link settings from a JSON file; absent fields keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, EtiquetaError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| {
            EtiquetaError::InvalidArgument(format!("{}: {}", path.display(), e))
        })
    }

    #[inline]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    #[inline]
    pub fn ready_delay(&self) -> Duration {
        Duration::from_millis(self.ready_delay_ms)
    }
}

// ============================================================================
// TESTS
// ============================================================================
