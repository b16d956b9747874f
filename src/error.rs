//! # Error Types
//!
//! This module defines error types used throughout the etiqueta library.
//!
//! ## Taxonomy
//!
//! | Variant | Raised when | Session afterwards |
//! |---------|-------------|--------------------|
//! | `Transport` / `Io` | the byte pipe failed | Faulted |
//! | `Framing` | terminator missing, line too long, bad CRC, length mismatch | Faulted |
//! | `Timeout` | no byte at all arrived before the read deadline | usable |
//! | `Protocol` | well-framed reply with the wrong tag or a short payload | usable |
//! | `UnknownStatus` | status byte outside the known table | usable |
//! | `ReadyTimeout` | ready polling ran out of attempts | usable |
//! | `ImageSize` / `InvalidArgument` | caller input rejected before any I/O | usable |
//! | `Faulted` | an operation was attempted on a faulted session | Faulted |

use thiserror::Error;

/// Main error type for etiqueta operations
#[derive(Debug, Error)]
pub enum EtiquetaError {
    /// Transport-level errors (connection, I/O)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Nothing arrived before the read deadline
    #[error("Timed out after {waited_ms}ms waiting for {waiting_for}")]
    Timeout {
        waiting_for: String,
        waited_ms: u128,
    },

    /// Malformed or unterminated bytes on the wire
    #[error("Framing error: {reason} (received: {received})")]
    Framing { reason: String, received: String },

    /// Well-framed response that does not match what the command expects
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Status byte not present in the readiness table
    #[error("Unknown printer status byte 0x{0:02x}")]
    UnknownStatus(u8),

    /// Image does not have the fixed label dimensions
    #[error("Image must be {expected_width}x{expected_height} dots, got {width}x{height}")]
    ImageSize {
        expected_width: usize,
        expected_height: usize,
        width: usize,
        height: usize,
    },

    /// Invalid command parameter
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Ready polling exhausted its attempt budget
    #[error("Printer not ready after {attempts} attempts (last status: {last_status})")]
    ReadyTimeout { attempts: u32, last_status: String },

    /// The session hit an unrecoverable error earlier and must be discarded
    #[error("Session is faulted; open a new transport to continue")]
    Faulted,

    /// Image loading error
    #[error("Image error: {0}")]
    Image(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EtiquetaError {
    /// Build a framing error, rendering the offending bytes as hex.
    pub fn framing(reason: impl Into<String>, received: &[u8]) -> Self {
        Self::Framing {
            reason: reason.into(),
            received: hex::encode(received),
        }
    }

    /// Whether this error leaves the byte stream in an unknown position.
    ///
    /// Fatal errors move a [`PrintSession`](crate::session::PrintSession)
    /// to the terminal `Faulted` state.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Io(_) | Self::Framing { .. } | Self::Faulted
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(EtiquetaError::Transport("gone".into()).is_fatal());
        assert!(EtiquetaError::framing("no terminator", b"AB").is_fatal());
        assert!(EtiquetaError::Io(std::io::Error::other("x")).is_fatal());

        assert!(!EtiquetaError::Protocol("wrong tag".into()).is_fatal());
        assert!(!EtiquetaError::UnknownStatus(0x42).is_fatal());
        assert!(
            !EtiquetaError::Timeout {
                waiting_for: "BATTERY".into(),
                waited_ms: 1000
            }
            .is_fatal()
        );
    }

    #[test]
    fn test_framing_renders_hex() {
        let err = EtiquetaError::framing("line too long", &[0x0d, 0xff]);
        assert_eq!(
            err.to_string(),
            "Framing error: line too long (received: 0dff)"
        );
    }

    #[test]
    fn test_unknown_status_message() {
        assert_eq!(
            EtiquetaError::UnknownStatus(0x05).to_string(),
            "Unknown printer status byte 0x05"
        );
    }
}
