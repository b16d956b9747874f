//! # Frame Codec
//!
//! Turns [`Command`]s into wire bytes and reads replies back off a
//! [`Transport`].
//!
//! ## Outgoing
//!
//! ```text
//! Text:      NAME SP arg , arg , ... CR LF
//! Binary:    NAME SP arg , ... , arg , <declared_len raw bytes> CR LF
//! Real-time: ESC ! code CR LF
//! ```
//!
//! Binary payloads are copied verbatim. A CR LF inside bitmap data is just
//! data: the payload length is known up front, so nothing ever scans it.
//!
//! ## Incoming
//!
//! Text replies are `TAG SP payload CR LF`. The terminator is the only
//! sentinel, so the decoder bounds how many bytes it will buffer before
//! giving up. When the payload size is known, a terminator appearing inside
//! the payload is not mistaken for the end of the line; if the read window
//! then closes right after a terminator, the short line is returned as is.
//!
//! Real-time replies carry no terminator at all and are read by length.
//!
//! ## Failure Modes
//!
//! | Situation | Error |
//! |-----------|-------|
//! | no byte arrived before the deadline | `Timeout` |
//! | some bytes, then silence | `Framing` |
//! | line grew past the bound without CR LF | `Framing` |
//! | binary payload length ≠ declared length | `Framing` |

use std::time::{Duration, Instant};

use tracing::trace;

use super::commands::{Arg, Command, ESC};
use crate::error::EtiquetaError;
use crate::printer::LinkConfig;
use crate::transport::Transport;

/// CR LF - line terminator in both directions
pub const TERMINATOR: &[u8; 2] = b"\r\n";

/// Default bound on a reply line, terminator included
pub const DEFAULT_MAX_LINE_LEN: usize = 256;

// ============================================================================
// ENCODING
// ============================================================================

fn push_args(out: &mut Vec<u8>, args: &[Arg]) {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            out.push(b',');
        }
        arg.write_to(out);
    }
}

/// Render a command as wire bytes, terminator included.
///
/// ## Errors
///
/// `Framing` if a binary payload's length differs from its declared length;
/// sending it would desynchronize the printer's parser.
///
/// ## Example
///
/// ```
/// use etiqueta::protocol::{commands, frame};
///
/// assert_eq!(frame::encode(&commands::print(2))?, b"PRINT 2\r\n");
/// assert_eq!(frame::encode(&commands::ready_query())?, b"\x1b!?\r\n");
/// # Ok::<(), etiqueta::error::EtiquetaError>(())
/// ```
pub fn encode(command: &Command) -> Result<Vec<u8>, EtiquetaError> {
    let mut out = Vec::new();

    match command {
        Command::Text { name, args } => {
            out.extend_from_slice(name.as_bytes());
            if !args.is_empty() {
                out.push(b' ');
                push_args(&mut out, args);
            }
        }
        Command::Binary {
            name,
            args,
            declared_len,
            payload,
        } => {
            if payload.len() != *declared_len {
                return Err(EtiquetaError::Framing {
                    reason: format!(
                        "{} declares {} payload bytes but carries {}",
                        name,
                        declared_len,
                        payload.len()
                    ),
                    received: String::new(),
                });
            }
            out.reserve(name.len() + 32 + payload.len());
            out.extend_from_slice(name.as_bytes());
            out.push(b' ');
            push_args(&mut out, args);
            if !args.is_empty() {
                out.push(b',');
            }
            out.extend_from_slice(payload);
        }
        Command::Realtime(code) => {
            out.extend_from_slice(&[ESC, b'!', *code]);
        }
    }

    out.extend_from_slice(TERMINATOR);
    Ok(out)
}

// ============================================================================
// DECODING
// ============================================================================

/// A parsed text reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// The line without its terminator
    pub raw: Vec<u8>,
    /// Everything before the first space
    pub tag: String,
    /// Everything after the first space
    pub payload: Vec<u8>,
}

impl Response {
    /// Split a terminator-less line on its first space.
    pub fn parse(raw: Vec<u8>) -> Self {
        let (tag, payload) = match raw.iter().position(|&b| b == b' ') {
            Some(pos) => (&raw[..pos], raw[pos + 1..].to_vec()),
            None => (&raw[..], Vec::new()),
        };
        Self {
            tag: String::from_utf8_lossy(tag).into_owned(),
            payload,
            raw,
        }
    }

    /// Raw line as hex, for error messages.
    pub fn hex(&self) -> String {
        hex::encode(&self.raw)
    }
}

/// Bounded reader for replies.
///
/// Reads one byte at a time so it never consumes bytes belonging to a
/// later reply.
#[derive(Debug, Clone, Copy)]
pub struct Decoder {
    timeout: Duration,
    max_line_len: usize,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::from_link(&LinkConfig::default())
    }
}

impl Decoder {
    pub fn new(timeout: Duration, max_line_len: usize) -> Self {
        Self {
            timeout,
            max_line_len,
        }
    }

    pub fn from_link(link: &LinkConfig) -> Self {
        Self::new(link.read_timeout(), link.max_line_len)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Read one CR LF terminated reply.
    pub fn decode<T: Transport + ?Sized>(&self, stream: &mut T) -> Result<Response, EtiquetaError> {
        self.read_line(stream, 0, "reply line").map(Response::parse)
    }

    /// Read a reply whose payload is known to be at least `payload_len` bytes.
    ///
    /// A CR LF occurring before `tag SP payload` is complete is treated as
    /// payload, not as the end of the line.
    pub fn decode_sized<T: Transport + ?Sized>(
        &self,
        stream: &mut T,
        tag: &str,
        payload_len: usize,
    ) -> Result<Response, EtiquetaError> {
        let min_len = tag.len() + 1 + payload_len;
        self.read_line(stream, min_len, tag).map(Response::parse)
    }

    /// Read exactly `len` unterminated bytes (real-time replies).
    pub fn read_exact<T: Transport + ?Sized>(
        &self,
        stream: &mut T,
        len: usize,
        waiting_for: &str,
    ) -> Result<Vec<u8>, EtiquetaError> {
        let start = Instant::now();
        let mut frame = vec![0u8; len];
        let mut filled = 0;

        while filled < len {
            let remaining = self.timeout.saturating_sub(start.elapsed());
            let n = if remaining.is_zero() {
                0
            } else {
                stream.read_timeout(&mut frame[filled..], remaining)?
            };
            if n == 0 {
                return Err(self.expired(&frame[..filled], waiting_for, start, |got| {
                    format!("{} ended after {} of {} bytes", waiting_for, got, len)
                }));
            }
            filled += n;
        }

        trace!(waiting_for, frame = %hex::encode(&frame), "read frame");
        Ok(frame)
    }

    fn read_line<T: Transport + ?Sized>(
        &self,
        stream: &mut T,
        min_len: usize,
        waiting_for: &str,
    ) -> Result<Vec<u8>, EtiquetaError> {
        let bound = self.max_line_len.max(min_len + TERMINATOR.len());
        let start = Instant::now();
        let mut line = Vec::with_capacity(64);
        let mut byte = [0u8; 1];

        loop {
            let remaining = self.timeout.saturating_sub(start.elapsed());
            let n = if remaining.is_zero() {
                0
            } else {
                stream.read_timeout(&mut byte, remaining)?
            };
            if n == 0 {
                // Terminated but shorter than expected: hand it up as a
                // complete line so the payload check can report it
                if line.ends_with(TERMINATOR) {
                    line.truncate(line.len() - TERMINATOR.len());
                    return Ok(line);
                }
                return Err(self.expired(&line, waiting_for, start, |_| {
                    format!("{} unterminated when the read window closed", waiting_for)
                }));
            }
            line.push(byte[0]);

            if line.len() >= min_len + TERMINATOR.len() && line.ends_with(TERMINATOR) {
                line.truncate(line.len() - TERMINATOR.len());
                trace!(waiting_for, line = %hex::encode(&line), "read line");
                return Ok(line);
            }
            if line.len() >= bound {
                return Err(EtiquetaError::framing(
                    format!("no terminator within {} bytes", bound),
                    &line,
                ));
            }
        }
    }

    /// Nothing at all → `Timeout`; a partial reply → `Framing`.
    fn expired(
        &self,
        partial: &[u8],
        waiting_for: &str,
        start: Instant,
        reason: impl FnOnce(usize) -> String,
    ) -> EtiquetaError {
        if partial.is_empty() {
            EtiquetaError::Timeout {
                waiting_for: waiting_for.to_string(),
                waited_ms: start.elapsed().as_millis(),
            }
        } else {
            EtiquetaError::framing(reason(partial.len()), partial)
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
