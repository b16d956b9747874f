//! # TSPL2 Protocol Implementation
//!
//! This module provides the wire-level pieces of the label printer protocol.
//!
//! ## Module Structure
//!
//! - [`commands`]: Command builders (`SIZE`, `BITMAP`, `BEEP`, `ESC!?`, ...)
//! - [`frame`]: Encoding commands and reading bounded replies
//! - [`response`]: Typed decoding of query replies and status frames
//! - [`bitmap`]: Label image packing and print job assembly
//!
//! ## Usage Example
//!
//! ```
//! use etiqueta::protocol::bitmap;
//!
//! let image = bitmap::LabelImage::from_fn(284, 96, |x, _y| x < 142);
//! let job = bitmap::build_job(&image, &bitmap::JobSettings::default())?;
//!
//! let bytes = job.to_bytes()?;
//! assert!(bytes.starts_with(b"SIZE 14.0 mm,40.0 mm\r\n"));
//! assert!(bytes.ends_with(b"PRINT 1\r\n"));
//! # Ok::<(), etiqueta::error::EtiquetaError>(())
//! ```

pub mod bitmap;
pub mod commands;
pub mod frame;
pub mod response;

pub use bitmap::{JobSettings, LabelImage, PrintJob};
pub use commands::Command;
pub use frame::{Decoder, Response};
pub use response::{BatteryStatus, DeviceConfig, PrinterStatus, Readiness, TimeoutSetting};
