//! # PNG Preview
//!
//! Shows what a label will look like before paper is spent on it. Ink is
//! black, paper is white.

use std::io::Cursor;
use std::path::Path;

use image::{imageops::FilterType, DynamicImage, GrayImage, ImageFormat, Luma};

use crate::error::EtiquetaError;
use crate::protocol::bitmap::LabelImage;

/// Rasterize a label, each dot becoming a `scale`×`scale` block.
pub fn to_gray_image(label: &LabelImage, scale: u32) -> GrayImage {
    let mut img = GrayImage::new(label.width() as u32, label.height() as u32);
    for y in 0..label.height() {
        for x in 0..label.width() {
            let color = if label.get(x, y) { 0u8 } else { 255u8 };
            img.put_pixel(x as u32, y as u32, Luma([color]));
        }
    }

    if scale > 1 {
        image::imageops::resize(&img, img.width() * scale, img.height() * scale, FilterType::Nearest)
    } else {
        img
    }
}

/// Encode a label as PNG bytes.
pub fn to_png(label: &LabelImage, scale: u32) -> Result<Vec<u8>, EtiquetaError> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(to_gray_image(label, scale))
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|e| EtiquetaError::Image(format!("Failed to encode PNG: {}", e)))?;
    Ok(out.into_inner())
}

/// Write a label to `path` as PNG.
pub fn save_png<P: AsRef<Path>>(label: &LabelImage, path: P, scale: u32) -> Result<(), EtiquetaError> {
    let path = path.as_ref();
    to_gray_image(label, scale)
        .save_with_format(path, ImageFormat::Png)
        .map_err(|e| EtiquetaError::Image(format!("Failed to save {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ink_is_black() {
        let label = LabelImage::from_fn(4, 2, |x, _| x == 1);
        let img = to_gray_image(&label, 1);
        assert_eq!(img.get_pixel(0, 0)[0], 255);
        assert_eq!(img.get_pixel(1, 1)[0], 0);
    }

    #[test]
    fn test_scaled_dimensions() {
        let img = to_gray_image(&LabelImage::blank(), 3);
        assert_eq!((img.width(), img.height()), (284 * 3, 96 * 3));
    }

    #[test]
    fn test_png_signature() {
        let png = to_png(&LabelImage::blank(), 1).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn test_save_and_reload() {
        let label = LabelImage::from_fn(284, 96, |x, y| (x + y) % 3 == 0);
        let path = std::env::temp_dir().join(format!("etiqueta-preview-{}.png", std::process::id()));

        save_png(&label, &path, 1).unwrap();
        let reloaded = image::open(&path).unwrap().to_luma8();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(reloaded.get_pixel(0, 0)[0], 0);
        assert_eq!(reloaded.get_pixel(1, 0)[0], 255);
    }
}
