//! # Image Loading
//!
//! Turns an arbitrary picture file into a label-sized [`LabelImage`].
//!
//! ## Pipeline
//!
//! 1. Decode (any format the `image` crate reads)
//! 2. Rotate portrait inputs a quarter turn so the long side runs along the
//!    label
//! 3. Grayscale, stretch to the full 0-255 range, boost contrast around
//!    mid-gray
//! 4. Scale to fit inside the label, nearest neighbour, aspect preserved
//! 5. Center on a white canvas and dither
//!
//! Thermal paper has no gray, so the contrast boost matters more than any
//! resampling filter: text and line art survive it, photos get posterized
//! before dithering spreads the tones back out.

use std::path::Path;

use image::{imageops::FilterType, DynamicImage, GrayImage};
use serde::Deserialize;
use tracing::debug;

use super::dither::{self, DitheringAlgorithm};
use crate::error::EtiquetaError;
use crate::printer::PrinterConfig;
use crate::protocol::bitmap::LabelImage;

/// Knobs for [`load_label`].
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Stretch the darkest pixel to black and the lightest to white
    pub autocontrast: bool,
    /// Contrast factor around mid-gray; 1.0 leaves the image alone
    pub contrast: f32,
    /// Rotate portrait images to landscape
    pub auto_rotate: bool,
    /// Swap ink and paper
    pub invert: bool,
    pub dither: DitheringAlgorithm,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            autocontrast: true,
            contrast: 2.0,
            auto_rotate: true,
            invert: false,
            dither: DitheringAlgorithm::default(),
        }
    }
}

/// Decode `path` and prepare it for the P21.
pub fn load_label<P: AsRef<Path>>(path: P, options: &LoadOptions) -> Result<LabelImage, EtiquetaError> {
    load_label_for(path, options, &PrinterConfig::P21)
}

/// Decode `path` and prepare it for `config`.
pub fn load_label_for<P: AsRef<Path>>(
    path: P,
    options: &LoadOptions,
    config: &PrinterConfig,
) -> Result<LabelImage, EtiquetaError> {
    let path = path.as_ref();
    let source = image::open(path)
        .map_err(|e| EtiquetaError::Image(format!("Failed to open {}: {}", path.display(), e)))?;
    debug!(
        path = %path.display(),
        width = source.width(),
        height = source.height(),
        "decoded image"
    );
    Ok(prepare_for_label(source, options, config))
}

/// Run the pipeline on an already decoded image.
pub fn prepare_for_label(source: DynamicImage, options: &LoadOptions, config: &PrinterConfig) -> LabelImage {
    let rotated = if options.auto_rotate && source.height() > source.width() {
        source.rotate90()
    } else {
        source
    };

    let mut gray = rotated.to_luma8();
    if options.autocontrast {
        stretch_levels(&mut gray);
    }
    if options.contrast != 1.0 {
        apply_contrast(&mut gray, options.contrast);
    }

    let target_w = config.image_width as u32;
    let target_h = config.image_height as u32;
    let (fit_w, fit_h) = fit_within(gray.width(), gray.height(), target_w, target_h);
    let fitted = image::imageops::resize(&gray, fit_w, fit_h, FilterType::Nearest);

    let offset_x = ((target_w - fit_w) / 2) as usize;
    let offset_y = ((target_h - fit_h) / 2) as usize;
    let (fw, fh) = (fit_w as usize, fit_h as usize);

    dither::dither(
        config.image_width,
        config.image_height,
        |x, y| {
            if x < offset_x || y < offset_y || x >= offset_x + fw || y >= offset_y + fh {
                return 0.0;
            }
            let luma = fitted.get_pixel((x - offset_x) as u32, (y - offset_y) as u32)[0];
            let ink = 1.0 - luma as f32 / 255.0;
            if options.invert { 1.0 - ink } else { ink }
        },
        options.dither,
    )
}

/// Largest `w`×`h` with the source aspect ratio that fits the target.
fn fit_within(src_w: u32, src_h: u32, target_w: u32, target_h: u32) -> (u32, u32) {
    if src_w == 0 || src_h == 0 {
        return (target_w, target_h);
    }
    let scale = (target_w as f32 / src_w as f32).min(target_h as f32 / src_h as f32);
    let w = ((src_w as f32 * scale).round() as u32).clamp(1, target_w);
    let h = ((src_h as f32 * scale).round() as u32).clamp(1, target_h);
    (w, h)
}

/// Linear stretch so the darkest pixel becomes 0 and the lightest 255.
fn stretch_levels(gray: &mut GrayImage) {
    let (min, max) = gray
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
    if max <= min {
        return;
    }
    let range = (max - min) as f32;
    for pixel in gray.pixels_mut() {
        pixel[0] = (((pixel[0] - min) as f32 / range) * 255.0).round() as u8;
    }
}

fn apply_contrast(gray: &mut GrayImage, factor: f32) {
    for pixel in gray.pixels_mut() {
        let val = (pixel[0] as f32 - 128.0) * factor + 128.0;
        pixel[0] = val.clamp(0.0, 255.0) as u8;
    }
}
