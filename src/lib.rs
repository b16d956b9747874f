//! # Etiqueta - Thermal Label Printer Library
//!
//! Etiqueta drives small Bluetooth thermal label printers that speak a
//! TSPL2 dialect over RFCOMM. It provides:
//!
//! - **Protocol implementation**: command builders, CR LF framing, typed
//!   query replies and the checksummed status frame
//! - **Bitmap encoding**: 1-bit label images packed into `BITMAP` payloads
//! - **Sessions**: ready polling and job submission over one owned transport
//! - **Rendering**: dithering, picture loading and PNG previews
//! - **Transport**: raw TTY serial/RFCOMM plus an in-memory mock
//!
//! ## Quick Start
//!
//! ```no_run
//! use etiqueta::{
//!     printer::LinkConfig,
//!     protocol::bitmap::{build_job, JobSettings},
//!     render::image::{load_label, LoadOptions},
//!     session::PrintSession,
//!     transport::SerialTransport,
//! };
//!
//! // Open connection to printer
//! let transport = SerialTransport::open("/dev/rfcomm0")?;
//! let mut session = PrintSession::new(transport, &LinkConfig::default());
//!
//! // Prepare the artwork
//! let label = load_label("badge.png", &LoadOptions::default())?;
//! let job = build_job(&label, &JobSettings { copies: 2, ..JobSettings::default() })?;
//!
//! // Wait for the printer, then send
//! let receipt = session.submit(&job)?;
//! println!("printed after {} polls", receipt.attempts);
//!
//! # Ok::<(), etiqueta::error::EtiquetaError>(())
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`protocol`] | Commands, framing, replies, bitmap packing |
//! | [`session`] | Protocol engine and print state machine |
//! | [`render`] | Dithering, image loading, previews |
//! | [`transport`] | Communication backends |
//! | [`printer`] | Printer and link configuration |
//! | [`error`] | Error types |
//!
//! ## Supported Printers
//!
//! Currently tested with:
//! - Nelko P21 (14×40 mm labels, 203 DPI, Bluetooth)

pub mod error;
pub mod printer;
pub mod protocol;
pub mod render;
pub mod session;
pub mod transport;

// Re-exports for convenience
pub use error::EtiquetaError;
pub use printer::{LinkConfig, PrinterConfig};
pub use session::PrintSession;
pub use transport::SerialTransport;
