//! # Rendering Module
//!
//! Image glue between picture files and the 1-bit [`LabelImage`] the
//! protocol layer packs.
//!
//! ## Modules
//!
//! - [`dither`]: Floyd-Steinberg, Bayer and threshold reduction to 1 bit
//! - [`image`]: decode, orient, fit and dither a picture file
//! - [`preview`]: rasterize a label back to PNG
//!
//! ## Usage Example
//!
//! ```
//! use etiqueta::render::dither::{self, DitheringAlgorithm};
//! use etiqueta::render::preview;
//!
//! // Horizontal gradient, white to black
//! let label = dither::dither(284, 96, |x, _y| x as f32 / 283.0, DitheringAlgorithm::Bayer);
//! let png = preview::to_png(&label, 2)?;
//! assert!(png.starts_with(b"\x89PNG"));
//! # Ok::<(), etiqueta::error::EtiquetaError>(())
//! ```
//!
//! [`LabelImage`]: crate::protocol::bitmap::LabelImage

pub mod dither;
pub mod image;
pub mod preview;
