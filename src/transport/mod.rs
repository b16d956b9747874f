//! # Printer Transport Layer
//!
//! This module provides the byte pipes the protocol runs over.
//!
//! ## Available Transports
//!
//! - [`serial`]: Bluetooth RFCOMM (or any serial TTY) device node (Linux)
//! - [`mock`]: Scripted in-memory transport for tests
//!
//! The core never opens or discovers a connection on its own; it is handed
//! something that implements [`Transport`] and owns it exclusively.

use std::time::Duration;

use crate::error::EtiquetaError;

pub mod mock;
pub mod serial;

pub use mock::MockTransport;
pub use serial::SerialTransport;

/// A duplex, reliable, ordered byte stream.
///
/// The protocol has no request IDs, so an implementation is only ever used
/// by one owner at a time; methods take `&mut self`.
pub trait Transport {
    /// Write every byte of `data`, flushing before returning.
    fn write_all(&mut self, data: &[u8]) -> Result<(), EtiquetaError>;

    /// Read up to `buf.len()` bytes, blocking at most `timeout`.
    ///
    /// Returns the number of bytes read. `Ok(0)` means nothing arrived
    /// before the deadline; a closed or broken pipe is an error.
    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, EtiquetaError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write_all(&mut self, data: &[u8]) -> Result<(), EtiquetaError> {
        (**self).write_all(data)
    }

    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, EtiquetaError> {
        (**self).read_timeout(buf, timeout)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write_all(&mut self, data: &[u8]) -> Result<(), EtiquetaError> {
        (**self).write_all(data)
    }

    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, EtiquetaError> {
        (**self).read_timeout(buf, timeout)
    }
}
