//! # Printer Module
//!
//! This module provides printer-specific configurations.
//!
//! ## Modules
//!
//! - [`config`]: Printer hardware specifications and link tuning

pub mod config;

pub use config::{LinkConfig, PrinterConfig};
