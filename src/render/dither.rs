//! # Dithering
//!
//! Converts continuous-tone intensity into the 1-bit [`LabelImage`] the
//! printer burns. Intensity follows printer convention: 0.0 is white
//! paper, 1.0 is full ink.
//!
//! ## Algorithms
//!
//! | Algorithm | Speed | Quality | Artifacts |
//! |-----------|-------|---------|-----------|
//! | Floyd-Steinberg | Slow | Best on photos | Worms |
//! | Bayer 8x8 | Fast | Good | Regular pattern |
//! | Threshold | Fastest | Line art only | Banding |
//!
//! Floyd-Steinberg is the default. At 284×96 the whole label is small
//! enough that error diffusion costs nothing noticeable.
//!
//! ## Usage Example
//!
//! ```
//! use etiqueta::render::dither::{self, DitheringAlgorithm};
//!
//! // Left half white, right half black
//! let image = dither::dither(284, 96, |x, _y| if x < 142 { 0.0 } else { 1.0 },
//!     DitheringAlgorithm::FloydSteinberg);
//!
//! assert!(!image.get(0, 0));
//! assert!(image.get(283, 95));
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::protocol::bitmap::LabelImage;

/// Bayer 8x8 dithering matrix
///
/// Values range from 0-63; low values switch on first as intensity rises.
pub const BAYER8: [[u8; 8]; 8] = [
    [0, 32, 8, 40, 2, 34, 10, 42],
    [48, 16, 56, 24, 50, 18, 58, 26],
    [12, 44, 4, 36, 14, 46, 6, 38],
    [60, 28, 52, 20, 62, 30, 54, 22],
    [3, 35, 11, 43, 1, 33, 9, 41],
    [51, 19, 59, 27, 49, 17, 57, 25],
    [15, 47, 7, 39, 13, 45, 5, 37],
    [63, 31, 55, 23, 61, 29, 53, 21],
];

/// Cut-off for [`DitheringAlgorithm::Threshold`] and the error-diffusion
/// quantizer
pub const MIDPOINT: f32 = 0.5;

/// How grayscale is reduced to ink/no-ink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DitheringAlgorithm {
    /// Plain cut at 50%
    Threshold,
    /// Ordered 8x8 Bayer matrix
    Bayer,
    /// Error diffusion
    #[default]
    FloydSteinberg,
}

impl FromStr for DitheringAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "threshold" => Ok(Self::Threshold),
            "bayer" | "ordered" => Ok(Self::Bayer),
            "floyd-steinberg" | "floyd_steinberg" | "fs" => Ok(Self::FloydSteinberg),
            other => Err(format!(
                "unknown dithering algorithm '{}' (expected threshold, bayer or floyd-steinberg)",
                other
            )),
        }
    }
}

impl fmt::Display for DitheringAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Threshold => "threshold",
            Self::Bayer => "bayer",
            Self::FloydSteinberg => "floyd-steinberg",
        })
    }
}

/// Bayer threshold for a pixel position, in (0, 1).
///
/// `(matrix_value + 0.5) / 64` keeps full black always printing and full
/// white never printing.
#[inline]
pub fn threshold(x: usize, y: usize) -> f32 {
    let matrix_value = BAYER8[y & 7][x & 7];
    (matrix_value as f32 + 0.5) / 64.0
}

/// Ordered-dither decision for one pixel.
///
/// ```
/// use etiqueta::render::dither::should_print;
///
/// assert!(should_print(0, 0, 1.0));
/// assert!(!should_print(0, 0, 0.0));
/// ```
#[inline]
pub fn should_print(x: usize, y: usize, intensity: f32) -> bool {
    intensity > threshold(x, y)
}

/// Dither an intensity function into a `width`×`height` label image.
pub fn dither<F>(width: usize, height: usize, intensity_fn: F, algorithm: DitheringAlgorithm) -> LabelImage
where
    F: Fn(usize, usize) -> f32,
{
    match algorithm {
        DitheringAlgorithm::Threshold => {
            LabelImage::from_fn(width, height, |x, y| intensity_fn(x, y) > MIDPOINT)
        }
        DitheringAlgorithm::Bayer => {
            LabelImage::from_fn(width, height, |x, y| should_print(x, y, intensity_fn(x, y)))
        }
        DitheringAlgorithm::FloydSteinberg => {
            let mut buffer = Vec::with_capacity(width * height);
            for y in 0..height {
                for x in 0..width {
                    buffer.push(intensity_fn(x, y).clamp(0.0, 1.0));
                }
            }
            floyd_steinberg(width, height, &mut buffer)
        }
    }
}

/// Error-diffusion dither of a row-major intensity buffer, in place.
///
/// Weights, relative to the current pixel `*`:
///
/// ```text
///          *   7/16
///  3/16  5/16  1/16
/// ```
pub fn floyd_steinberg(width: usize, height: usize, buffer: &mut [f32]) -> LabelImage {
    let mut image = LabelImage::new(width, height);

    for y in 0..height {
        for x in 0..width {
            let idx = y * width + x;
            let old = buffer[idx];
            let ink = old > MIDPOINT;
            image.set(x, y, ink);

            let err = old - if ink { 1.0 } else { 0.0 };
            if x + 1 < width {
                buffer[idx + 1] += err * 7.0 / 16.0;
            }
            if y + 1 < height {
                let below = idx + width;
                if x > 0 {
                    buffer[below - 1] += err * 3.0 / 16.0;
                }
                buffer[below] += err * 5.0 / 16.0;
                if x + 1 < width {
                    buffer[below + 1] += err * 1.0 / 16.0;
                }
            }
        }
    }

    image
}

// ============================================================================
// TESTS
// ============================================================================
