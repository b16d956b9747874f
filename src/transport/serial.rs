//! # Serial / Bluetooth RFCOMM Transport
//!
//! This module provides communication with label printers over a TTY device
//! node, typically a Bluetooth Serial Port Profile (SPP) link bound with
//! `rfcomm`.
//!
//! ## Bluetooth Setup (Linux)
//!
//! Pairing and binding happen outside this crate:
//!
//! ```bash
//! $ bluetoothctl
//! [bluetooth]# pair XX:XX:XX:XX:XX:XX
//! $ sudo rfcomm bind 0 XX:XX:XX:XX:XX:XX 1
//! # This creates /dev/rfcomm0
//! ```
//!
//! ## TTY Configuration
//!
//! The device is opened in raw mode so binary bitmap data and status bytes
//! pass through unmodified:
//!
//! - **No input processing**: no CR/LF translation, no XON/XOFF
//! - **No output processing**: OPOST disabled
//! - **8-bit characters**: CS8, no parity
//! - **Non-canonical mode**: reads return as soon as any byte is available
//!
//! ## Reads
//!
//! Reads wait with `poll(2)` so every read is bounded by the caller's
//! timeout. A timeout is reported as `Ok(0)`; a hang-up is an error.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use super::Transport;
use crate::error::EtiquetaError;

/// Default RFCOMM device path
pub const DEFAULT_DEVICE: &str = "/dev/rfcomm0";

/// Default chunk size for writes (bytes)
const CHUNK_SIZE: usize = 1024;

/// Delay between chunks (milliseconds)
const CHUNK_DELAY_MS: u64 = 2;

/// # Serial Printer Transport
///
/// Owns an open TTY device for the lifetime of a session. The device is
/// closed when the transport is dropped.
///
/// ## Example
///
/// ```no_run
/// use etiqueta::transport::{SerialTransport, Transport};
///
/// let mut transport = SerialTransport::open("/dev/rfcomm0")?;
/// transport.write_all(b"SELFTEST\r\n")?;
///
/// # Ok::<(), etiqueta::error::EtiquetaError>(())
/// ```
pub struct SerialTransport {
    file: File,
    chunk_size: usize,
    chunk_delay: Duration,
}

impl SerialTransport {
    /// Open a connection to the printer.
    ///
    /// ## Errors
    ///
    /// Returns an error if:
    /// - The device doesn't exist (not bound with `rfcomm bind`)
    /// - Permission denied (may need root or dialout group)
    /// - TTY configuration fails
    pub fn open<P: AsRef<Path>>(device: P) -> Result<Self, EtiquetaError> {
        let path = device.as_ref();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| {
                EtiquetaError::Transport(format!("Failed to open {}: {}", path.display(), e))
            })?;

        configure_tty_raw(file.as_raw_fd())?;
        debug!(device = %path.display(), "opened serial transport");

        Ok(Self {
            file,
            chunk_size: CHUNK_SIZE,
            chunk_delay: Duration::from_millis(CHUNK_DELAY_MS),
        })
    }

    /// Open with default device path (/dev/rfcomm0)
    pub fn open_default() -> Result<Self, EtiquetaError> {
        Self::open(DEFAULT_DEVICE)
    }

    /// Set the chunk size for large writes.
    ///
    /// Default is 1024 bytes.
    pub fn set_chunk_size(&mut self, size: usize) {
        self.chunk_size = size.max(1);
    }

    /// Set the delay between chunks.
    ///
    /// Default is 2ms.
    pub fn set_chunk_delay(&mut self, delay: Duration) {
        self.chunk_delay = delay;
    }
}

impl Transport for SerialTransport {
    /// Small writes are sent directly. Large writes (bitmap jobs) are
    /// chunked so the Bluetooth buffer isn't overrun.
    fn write_all(&mut self, data: &[u8]) -> Result<(), EtiquetaError> {
        if data.len() <= self.chunk_size {
            self.file
                .write_all(data)
                .map_err(|e| EtiquetaError::Transport(format!("Write failed: {}", e)))?;
        } else {
            for chunk in data.chunks(self.chunk_size) {
                self.file
                    .write_all(chunk)
                    .map_err(|e| EtiquetaError::Transport(format!("Write failed: {}", e)))?;

                if !self.chunk_delay.is_zero() {
                    thread::sleep(self.chunk_delay);
                }
            }
        }

        self.file
            .flush()
            .map_err(|e| EtiquetaError::Transport(format!("Flush failed: {}", e)))
    }

    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, EtiquetaError> {
        if buf.is_empty() {
            return Ok(0);
        }

        if !wait_readable(self.file.as_raw_fd(), timeout)? {
            return Ok(0);
        }

        match self.file.read(buf) {
            Ok(0) => Err(EtiquetaError::Transport(
                "Device closed the connection".to_string(),
            )),
            Ok(n) => Ok(n),
            Err(e) => Err(EtiquetaError::Transport(format!("Read failed: {}", e))),
        }
    }
}

/// Block until `fd` is readable or `timeout` elapses.
///
/// Returns `Ok(false)` on timeout.
fn wait_readable(fd: i32, timeout: Duration) -> Result<bool, EtiquetaError> {
    // None when the timeout is too large to land on the clock
    let deadline = Instant::now().checked_add(timeout);

    loop {
        let remaining = deadline.map_or(timeout, |d| d.saturating_duration_since(Instant::now()));
        let timeout_ms = poll_timeout_ms(remaining);
        let mut pfd = libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        };

        let result = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
        if result < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(EtiquetaError::Transport(format!("poll failed: {}", err)));
        }
        if result == 0 {
            return Ok(false);
        }

        if pfd.revents & libc::POLLIN != 0 {
            return Ok(true);
        }
        // POLLHUP / POLLERR without data: the link is gone
        return Err(EtiquetaError::Transport(format!(
            "Device hung up (revents 0x{:x})",
            pfd.revents
        )));
    }
}

/// Milliseconds for `poll`, rounded up so a sub-millisecond remainder
/// still waits instead of spinning.
fn poll_timeout_ms(remaining: Duration) -> i32 {
    let ms = remaining.as_micros().div_ceil(1000);
    ms.min(i32::MAX as u128) as i32
}

/// Configure a file descriptor for raw TTY mode.
///
/// This disables all input/output processing so binary data passes through
/// unmodified. Essential for printer communication.
///
/// ## What Gets Disabled
///
/// - **Input flags**: IGNBRK, BRKINT, PARMRK, ISTRIP, INLCR, IGNCR, ICRNL, IXON, IXOFF, IXANY
/// - **Output flags**: OPOST
/// - **Local flags**: ECHO, ECHONL, ICANON, ISIG, IEXTEN
/// - **Control flags**: CSIZE, PARENB (then CS8 | CREAD | CLOCAL is set)
///
/// IXON/IXOFF/IXANY must be off: 0x11 and 0x13 appear in bitmap payloads.
/// The line speed is set to 115200 for wired adapters; RFCOMM ignores it.
fn configure_tty_raw(fd: i32) -> Result<(), EtiquetaError> {
    use std::mem::MaybeUninit;

    let mut termios = MaybeUninit::uninit();
    let result = unsafe { libc::tcgetattr(fd, termios.as_mut_ptr()) };
    if result != 0 {
        return Err(EtiquetaError::Transport(format!(
            "tcgetattr failed: {}",
            io::Error::last_os_error()
        )));
    }
    let mut termios = unsafe { termios.assume_init() };

    termios.c_iflag &= !(libc::IGNBRK
        | libc::BRKINT
        | libc::PARMRK
        | libc::ISTRIP
        | libc::INLCR
        | libc::IGNCR
        | libc::ICRNL
        | libc::IXON
        | libc::IXOFF
        | libc::IXANY);

    termios.c_oflag &= !libc::OPOST;

    termios.c_lflag &= !(libc::ECHO | libc::ECHONL | libc::ICANON | libc::ISIG | libc::IEXTEN);

    termios.c_cflag &= !(libc::CSIZE | libc::PARENB);
    termios.c_cflag |= libc::CS8 | libc::CREAD | libc::CLOCAL;

    // read() returns once at least one byte is available; poll() bounds the wait
    termios.c_cc[libc::VMIN] = 1;
    termios.c_cc[libc::VTIME] = 0;

    unsafe {
        libc::cfsetispeed(&mut termios, libc::B115200);
        libc::cfsetospeed(&mut termios, libc::B115200);
    }

    let result = unsafe { libc::tcsetattr(fd, libc::TCSANOW, &termios) };
    if result != 0 {
        return Err(EtiquetaError::Transport(format!(
            "tcsetattr failed: {}",
            io::Error::last_os_error()
        )));
    }

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
