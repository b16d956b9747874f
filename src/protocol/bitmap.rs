//! # Bitmap Encoding and Print Jobs
//!
//! Converts a 1-bit [`LabelImage`] into the payload of the `BITMAP` command
//! and assembles the command sequence that prints it.
//!
//! ## Orientation
//!
//! A label image is 284 dots wide and 96 dots tall, as the label is read.
//! The print head spans the 96-dot side, so the device raster is the image
//! turned a quarter turn counter-clockwise: device row `r` is image column
//! `283 - r`, read top to bottom.
//!
//! ```text
//! image (284 × 96)                    device raster (284 rows × 12 bytes)
//! ┌───────────────────────┐ ◄─ col 283  row 0:   [col 283, y=0..96]
//! │                       │            row 1:   [col 282, y=0..96]
//! └───────────────────────┘            ...
//!   col 0                               row 283: [col 0,   y=0..96]
//! ```
//!
//! ## Bit Packing
//!
//! Each device row is packed MSB-first: bit 7 of the first byte is `y = 0`.
//! The printer burns a dot for a **0** bit, so ink is written as 0 and paper
//! as 1 (an all-`0xFF` payload prints nothing).
//!
//! ```text
//! ink:  █ █ ░ ░ █ ░ ░ ░
//! bits: 0 0 1 1 0 1 1 1  = 0x37
//! ```
//!
//! ## Job Layout
//!
//! ```text
//! SIZE 14.0 mm,40.0 mm
//! GAP 5.0 mm,0.0 mm
//! DIRECTION 0,0
//! DENSITY 15
//! CLS
//! BITMAP 0,0,12,284,1,<3408 bytes>
//! PRINT 1
//! ```
//!
//! Geometry and density configure the canvas, so they precede `BITMAP`;
//! `PRINT` comes last to flush it.

use serde::Deserialize;

use super::commands::{self, BitmapMode, Command};
use super::frame;
use crate::error::EtiquetaError;
use crate::printer::PrinterConfig;

/// Highest value the `DENSITY` command accepts
pub const MAX_DENSITY: u8 = 15;

// ============================================================================
// LABEL IMAGE
// ============================================================================

/// A 1-bit raster, row-major, `true` = ink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelImage {
    width: usize,
    height: usize,
    pixels: Vec<bool>,
}

impl LabelImage {
    /// A blank (all paper) image.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![false; width * height],
        }
    }

    /// A blank image with the P21's label dimensions.
    pub fn blank() -> Self {
        let config = PrinterConfig::P21;
        Self::new(config.image_width, config.image_height)
    }

    /// Wrap row-major pixels.
    ///
    /// ## Errors
    ///
    /// `InvalidArgument` unless `pixels.len() == width * height`.
    pub fn from_pixels(width: usize, height: usize, pixels: Vec<bool>) -> Result<Self, EtiquetaError> {
        if pixels.len() != width * height {
            return Err(EtiquetaError::InvalidArgument(format!(
                "{}x{} image needs {} pixels, got {}",
                width,
                height,
                width * height,
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Build an image by evaluating `ink(x, y)` for every pixel.
    pub fn from_fn<F>(width: usize, height: usize, ink: F) -> Self
    where
        F: Fn(usize, usize) -> bool,
    {
        let mut pixels = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                pixels.push(ink(x, y));
            }
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> bool {
        self.pixels[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, ink: bool) {
        self.pixels[y * self.width + x] = ink;
    }

    pub fn pixels(&self) -> &[bool] {
        &self.pixels
    }

    /// Number of inked pixels.
    pub fn ink_count(&self) -> usize {
        self.pixels.iter().filter(|&&p| p).count()
    }
}

// ============================================================================
// PACKING
// ============================================================================

/// Payload of a `BITMAP` command plus the geometry it declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedBitmap {
    pub data: Vec<u8>,
    /// Bytes per device row
    pub row_bytes: usize,
    /// Device rows
    pub rows: usize,
}

/// Pack a row of bits MSB-first, padding the last byte with zeros.
///
/// ```
/// use etiqueta::protocol::bitmap::pack_bits;
///
/// assert_eq!(pack_bits(&[true, true, false, false, true, false, true, false]), vec![0xCA]);
/// assert_eq!(pack_bits(&[true; 12]), vec![0xFF, 0xF0]);
/// ```
pub fn pack_bits(bits: &[bool]) -> Vec<u8> {
    let mut bytes = vec![0u8; bits.len().div_ceil(8)];
    for (i, &bit) in bits.iter().enumerate() {
        if bit {
            bytes[i / 8] |= 1 << (7 - (i % 8));
        }
    }
    bytes
}

/// Pack an image for the P21.
pub fn pack(image: &LabelImage) -> Result<PackedBitmap, EtiquetaError> {
    pack_for(image, &PrinterConfig::P21)
}

/// Pack an image into the device raster of `config`.
///
/// ## Errors
///
/// `ImageSize` unless the image is exactly `image_width × image_height`.
pub fn pack_for(image: &LabelImage, config: &PrinterConfig) -> Result<PackedBitmap, EtiquetaError> {
    if image.width() != config.image_width || image.height() != config.image_height {
        return Err(EtiquetaError::ImageSize {
            expected_width: config.image_width,
            expected_height: config.image_height,
            width: image.width(),
            height: image.height(),
        });
    }

    let rows = config.rows();
    let row_bytes = config.row_bytes();
    let mut data = Vec::with_capacity(rows * row_bytes);
    let mut row = vec![false; image.height()];

    for r in 0..rows {
        let x = image.width() - 1 - r;
        for (y, bit) in row.iter_mut().enumerate() {
            // 1 = paper, 0 = burn
            *bit = !image.get(x, y);
        }
        let packed = pack_bits(&row);
        data.extend_from_slice(&packed);
        // Pad bits past the image edge are paper too
        if image.height() % 8 != 0 {
            let last = data.len() - 1;
            data[last] |= 0xFF >> (image.height() % 8);
        }
    }

    Ok(PackedBitmap {
        data,
        row_bytes,
        rows,
    })
}

/// Inverse of [`pack_for`]: recover the label image from a device raster.
pub fn unpack(packed: &PackedBitmap, width: usize, height: usize) -> Result<LabelImage, EtiquetaError> {
    if packed.rows != width
        || packed.row_bytes != height.div_ceil(8)
        || packed.data.len() != packed.rows * packed.row_bytes
    {
        return Err(EtiquetaError::ImageSize {
            expected_width: width,
            expected_height: height,
            width: packed.rows,
            height: packed.row_bytes * 8,
        });
    }

    let mut image = LabelImage::new(width, height);
    for (r, row) in packed.data.chunks(packed.row_bytes).enumerate() {
        let x = width - 1 - r;
        for y in 0..height {
            let paper = (row[y / 8] >> (7 - (y % 8))) & 1 == 1;
            image.set(x, y, !paper);
        }
    }
    Ok(image)
}

// ============================================================================
// PRINT JOB
// ============================================================================

/// Per-job geometry and darkness.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct JobSettings {
    /// Number of labels to print
    pub copies: u32,
    /// Label width × length in millimeters
    pub label_mm: (f32, f32),
    /// Gap and gap offset in millimeters
    pub gap_mm: (f32, f32),
    /// Darkness, 0-15
    pub density: u8,
    /// `DIRECTION` arguments, passed through unchanged
    pub direction: (u8, u8),
}

impl Default for JobSettings {
    fn default() -> Self {
        Self::for_printer(&PrinterConfig::P21)
    }
}

impl JobSettings {
    pub fn for_printer(config: &PrinterConfig) -> Self {
        Self {
            copies: 1,
            label_mm: config.label_mm,
            gap_mm: (config.gap_mm, 0.0),
            density: config.default_density,
            direction: (0, 0),
        }
    }

    /// Check the settings before anything is sent.
    pub fn validate(&self) -> Result<(), EtiquetaError> {
        if self.copies == 0 {
            return Err(EtiquetaError::InvalidArgument(
                "copies must be at least 1".to_string(),
            ));
        }
        if self.density > MAX_DENSITY {
            return Err(EtiquetaError::InvalidArgument(format!(
                "density must be 0-{}, got {}",
                MAX_DENSITY, self.density
            )));
        }
        let (w, l) = self.label_mm;
        if !(w.is_finite() && l.is_finite() && w > 0.0 && l > 0.0) {
            return Err(EtiquetaError::InvalidArgument(format!(
                "label size must be positive, got {}x{} mm",
                w, l
            )));
        }
        let (g, o) = self.gap_mm;
        if !(g.is_finite() && o.is_finite() && g >= 0.0) {
            return Err(EtiquetaError::InvalidArgument(format!(
                "gap must be non-negative, got {} mm (offset {} mm)",
                g, o
            )));
        }
        Ok(())
    }
}

/// An ordered, fire-and-forget command sequence that prints one image.
#[derive(Debug, Clone, PartialEq)]
pub struct PrintJob {
    commands: Vec<Command>,
    copies: u32,
}

impl PrintJob {
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn copies(&self) -> u32 {
        self.copies
    }

    /// Command names in transmission order.
    pub fn names(&self) -> Vec<String> {
        self.commands.iter().map(Command::name).collect()
    }

    /// The whole job as wire bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, EtiquetaError> {
        let mut out = Vec::new();
        for command in &self.commands {
            out.extend(frame::encode(command)?);
        }
        Ok(out)
    }
}

/// Assemble a print job for the P21.
///
/// ## Errors
///
/// `InvalidArgument` for bad settings and `ImageSize` for a wrong-sized
/// image. Both are raised here, before anything touches a transport.
///
/// ## Example
///
/// ```
/// use etiqueta::protocol::bitmap::{build_job, JobSettings, LabelImage};
///
/// let job = build_job(&LabelImage::blank(), &JobSettings::default())?;
/// assert_eq!(
///     job.names(),
///     ["SIZE", "GAP", "DIRECTION", "DENSITY", "CLS", "BITMAP", "PRINT"]
/// );
/// # Ok::<(), etiqueta::error::EtiquetaError>(())
/// ```
pub fn build_job(image: &LabelImage, settings: &JobSettings) -> Result<PrintJob, EtiquetaError> {
    build_job_for(image, settings, &PrinterConfig::P21)
}

/// Assemble a print job for `config`.
pub fn build_job_for(
    image: &LabelImage,
    settings: &JobSettings,
    config: &PrinterConfig,
) -> Result<PrintJob, EtiquetaError> {
    settings.validate()?;
    let packed = pack_for(image, config)?;

    let commands = vec![
        commands::size(settings.label_mm.0, settings.label_mm.1),
        commands::gap(settings.gap_mm.0, settings.gap_mm.1),
        commands::direction(settings.direction.0, settings.direction.1),
        commands::density(settings.density),
        commands::cls(),
        commands::bitmap(
            0,
            0,
            packed.row_bytes,
            packed.rows,
            BitmapMode::Or,
            packed.data,
        ),
        commands::print(settings.copies),
    ];

    Ok(PrintJob {
        commands,
        copies: settings.copies,
    })
}

// ============================================================================
// TESTS
// ============================================================================
