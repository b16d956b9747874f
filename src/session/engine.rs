//! # Command Protocol Engine
//!
//! One method per device operation, each a strict write-then-read pair on
//! the owned transport. The protocol has no request IDs and no pipelining,
//! so an engine must never be shared between callers.
//!
//! ## Operations
//!
//! | Method | Sends | Reads |
//! |--------|-------|-------|
//! | [`Engine::query_battery`] | `BATTERY?` | `BATTERY` line |
//! | [`Engine::query_config`] | `CONFIG?` | `CONFIG` line |
//! | [`Engine::query_ready`] | `ESC!?` | 1 status byte |
//! | [`Engine::query_status`] | `ESC!o` | 16-byte status frame |
//! | [`Engine::cancel_pause`] | `ESC!o` × n | until ready or budget spent |
//! | [`Engine::set_beep`] / [`Engine::set_timeout`] / [`Engine::self_test`] | setting | nothing |
//! | [`Engine::send`] | any command | nothing |

use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::EtiquetaError;
use crate::printer::LinkConfig;
use crate::protocol::commands::{self, Command};
use crate::protocol::frame::{self, Decoder};
use crate::protocol::response::{
    BATTERY_TAG, BatteryStatus, CONFIG_LEN, CONFIG_TAG, DeviceConfig, PrinterStatus, Readiness,
    STATUS_FRAME_LEN, TimeoutSetting,
};
use crate::transport::Transport;

/// Payload bytes a `BATTERY` reply must carry before its terminator counts
const BATTERY_MIN_PAYLOAD: usize = 1;

/// Longest payload prefix written to the debug log
const LOG_PREFIX_LEN: usize = 48;

/// Attempt budget for [`Engine::cancel_pause`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl PollPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    pub fn from_link(link: &LinkConfig) -> Self {
        Self::new(link.ready_attempts, link.ready_delay())
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from_link(&LinkConfig::default())
    }
}

/// Result of a successful ready poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyPoll {
    /// The status frame that reported ready
    pub status: PrinterStatus,
    /// How many cancel-pause commands were sent
    pub attempts: u32,
}

/// Request/response driver over one transport.
pub struct Engine<T> {
    transport: T,
    decoder: Decoder,
}

impl<T: Transport> Engine<T> {
    pub fn new(transport: T, link: &LinkConfig) -> Self {
        Self {
            transport,
            decoder: Decoder::from_link(link),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Encode and write one command without waiting for a reply.
    pub fn send(&mut self, command: &Command) -> Result<(), EtiquetaError> {
        let bytes = frame::encode(command)?;
        self.write_frame(command, &bytes)
    }

    /// Write bytes already produced by [`frame::encode`] for `command`.
    pub fn write_frame(&mut self, command: &Command, bytes: &[u8]) -> Result<(), EtiquetaError> {
        debug!(
            command = %command,
            len = bytes.len(),
            wire = %hex::encode(&bytes[..bytes.len().min(LOG_PREFIX_LEN)]),
            "send"
        );
        self.transport.write_all(bytes)
    }

    /// `BATTERY?` → charge level.
    pub fn query_battery(&mut self) -> Result<BatteryStatus, EtiquetaError> {
        self.send(&commands::battery_query())?;
        let response = self
            .decoder
            .decode_sized(&mut self.transport, BATTERY_TAG, BATTERY_MIN_PAYLOAD)?;
        BatteryStatus::from_response(&response)
    }

    /// `CONFIG?` → device settings snapshot.
    pub fn query_config(&mut self) -> Result<DeviceConfig, EtiquetaError> {
        self.send(&commands::config_query())?;
        let response = self
            .decoder
            .decode_sized(&mut self.transport, CONFIG_TAG, CONFIG_LEN)?;
        DeviceConfig::from_response(&response)
    }

    /// `ESC!?` → readiness from the single status byte.
    pub fn query_readiness(&mut self) -> Result<Readiness, EtiquetaError> {
        self.send(&commands::ready_query())?;
        let reply = self.decoder.read_exact(&mut self.transport, 1, "ready byte")?;
        Readiness::from_byte(reply[0])
    }

    /// `ESC!?` → whether the printer will accept a job.
    ///
    /// Unknown status bytes are errors, never "ready".
    pub fn query_ready(&mut self) -> Result<bool, EtiquetaError> {
        self.query_readiness().map(Readiness::is_ready)
    }

    /// One `ESC!o`: release a pause and read the checksummed status frame.
    pub fn query_status(&mut self) -> Result<PrinterStatus, EtiquetaError> {
        self.send(&commands::cancel_pause())?;
        let frame = self
            .decoder
            .read_exact(&mut self.transport, STATUS_FRAME_LEN, "status frame")?;
        PrinterStatus::from_frame(&frame)
    }

    /// Poll `ESC!o` until the printer reports ready.
    ///
    /// A read timeout counts as a failed attempt. Any other error ends the
    /// poll immediately.
    ///
    /// ## Errors
    ///
    /// `ReadyTimeout` once `policy.max_attempts` polls have been spent.
    pub fn cancel_pause(&mut self, policy: &PollPolicy) -> Result<ReadyPoll, EtiquetaError> {
        let mut last_status = String::from("none");

        for attempt in 1..=policy.max_attempts {
            if attempt > 1 && !policy.delay.is_zero() {
                thread::sleep(policy.delay);
            }

            match self.query_status() {
                Ok(status) if status.readiness.is_ready() => {
                    info!(attempt, "printer ready");
                    return Ok(ReadyPoll {
                        status,
                        attempts: attempt,
                    });
                }
                Ok(status) => {
                    warn!(attempt, readiness = %status.readiness, "printer not ready");
                    last_status = status.readiness.to_string();
                }
                Err(EtiquetaError::Timeout { .. }) => {
                    warn!(attempt, "no status reply");
                    last_status = "no reply".to_string();
                }
                Err(e) => return Err(e),
            }
        }

        Err(EtiquetaError::ReadyTimeout {
            attempts: policy.max_attempts,
            last_status,
        })
    }

    /// `BEEP` on or off.
    pub fn set_beep(&mut self, enabled: bool) -> Result<(), EtiquetaError> {
        self.send(&commands::beep(enabled))
    }

    /// `TIMEOUT` (auto power-off).
    pub fn set_timeout(&mut self, setting: TimeoutSetting) -> Result<(), EtiquetaError> {
        self.send(&commands::timeout(setting))
    }

    /// `SELFTEST` page.
    pub fn self_test(&mut self) -> Result<(), EtiquetaError> {
        self.send(&commands::selftest())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::response::status_frame;
    use crate::transport::MockTransport;
    use pretty_assertions::assert_eq;

    const ROLL: [u8; 13] = [0x0c, 1, 0x12, 3, 0, 3, 1, 0x12, 0x12, 0x15, 0x28, 0x0f, 0x0e];

    fn engine(mock: MockTransport) -> Engine<MockTransport> {
        Engine::new(mock, &LinkConfig::default())
    }

    fn fast(attempts: u32) -> PollPolicy {
        PollPolicy::new(attempts, Duration::ZERO)
    }

    #[test]
    fn test_query_battery() {
        let mut mock = MockTransport::new();
        mock.reply_to(b"BATTERY?", b"BATTERY \x67\x00\r\n");

        let mut engine = engine(mock);
        let battery = engine.query_battery().unwrap();
        assert_eq!(battery.percent, 67);
        assert_eq!(engine.transport().writes(), &[b"BATTERY?\r\n".to_vec()]);
    }

    #[test]
    fn test_query_battery_wrong_tag() {
        let mut mock = MockTransport::new();
        mock.reply_to(b"BATTERY?", b"CONFIG \x43\x00\r\n");

        let err = engine(mock).query_battery().unwrap_err();
        assert!(matches!(err, EtiquetaError::Protocol(_)));
    }

    #[test]
    fn test_query_config() {
        let mut mock = MockTransport::new();
        mock.reply_to(b"CONFIG?", b"CONFIG \x00\xcb\x00\x00\x03\x04\x02\x04\x00\x01\r\n");

        let config = engine(mock).query_config().unwrap();
        assert_eq!(config.dpi_code, 0xcb);
        assert_eq!(config.timeout, TimeoutSetting::Never);
        assert!(config.beep_enabled);
    }

    #[test]
    fn test_query_config_short_payload() {
        let mut mock = MockTransport::new();
        mock.reply_to(b"CONFIG?", b"CONFIG \x00\xcb\r\n");

        let err = engine(mock).query_config().unwrap_err();
        assert!(matches!(err, EtiquetaError::Protocol(_)));
    }

    #[test]
    fn test_query_ready() {
        let mut mock = MockTransport::new();
        mock.reply_to(b"\x1b!?", &[0x00]).reply_to(b"\x1b!?", &[0x20]);

        let mut engine = engine(mock);
        assert!(engine.query_ready().unwrap());
        assert!(!engine.query_ready().unwrap());
    }

    #[test]
    fn test_query_ready_unknown_byte_is_error() {
        let mut mock = MockTransport::new();
        mock.reply_to(b"\x1b!?", &[0x42]);

        let err = engine(mock).query_ready().unwrap_err();
        assert!(matches!(err, EtiquetaError::UnknownStatus(0x42)));
    }

    #[test]
    fn test_query_ready_silence_is_timeout() {
        let err = engine(MockTransport::new()).query_ready().unwrap_err();
        assert!(matches!(err, EtiquetaError::Timeout { .. }));
    }

    #[test]
    fn test_cancel_pause_ready_on_third_poll() {
        let mut mock = MockTransport::new();
        mock.reply_to(b"\x1b!o", &status_frame(0x20, &ROLL))
            .reply_to(b"\x1b!o", &status_frame(0x01, &ROLL))
            .reply_to(b"\x1b!o", &status_frame(0x00, &ROLL))
            .reply_to(b"\x1b!o", &status_frame(0x00, &ROLL));

        let mut engine = engine(mock);
        let poll = engine.cancel_pause(&fast(10)).unwrap();
        assert_eq!(poll.attempts, 3);
        assert_eq!(engine.transport().writes().len(), 3);
        assert_eq!(engine.transport().unused_replies(), 1);
    }

    #[test]
    fn test_cancel_pause_budget_exhausted() {
        let mut mock = MockTransport::new();
        for _ in 0..3 {
            mock.reply_to(b"\x1b!o", &status_frame(0x04, &ROLL));
        }

        let mut engine = engine(mock);
        let err = engine.cancel_pause(&fast(3)).unwrap_err();
        match err {
            EtiquetaError::ReadyTimeout {
                attempts,
                last_status,
            } => {
                assert_eq!(attempts, 3);
                assert_eq!(last_status, "Paper not loaded");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(engine.transport().writes().len(), 3);
    }

    #[test]
    fn test_cancel_pause_timeouts_count_as_attempts() {
        let mut mock = MockTransport::new();
        mock.reply_to(b"\x1b!o", b"")
            .reply_to(b"\x1b!o", &status_frame(0x00, &ROLL));

        let poll = engine(mock).cancel_pause(&fast(5)).unwrap();
        assert_eq!(poll.attempts, 2);
    }

    #[test]
    fn test_cancel_pause_stops_on_unknown_status() {
        let mut mock = MockTransport::new();
        mock.reply_to(b"\x1b!o", &status_frame(0x09, &ROLL));

        let mut engine = engine(mock);
        let err = engine.cancel_pause(&fast(5)).unwrap_err();
        assert!(matches!(err, EtiquetaError::UnknownStatus(0x09)));
        assert_eq!(engine.transport().writes().len(), 1);
    }

    #[test]
    fn test_settings_commands() {
        let mut engine = engine(MockTransport::new());
        engine.set_beep(true).unwrap();
        engine.set_timeout(TimeoutSetting::Minutes60).unwrap();
        engine.self_test().unwrap();

        assert_eq!(
            engine.transport().written(),
            b"BEEP \x01\r\nTIMEOUT \x03\r\nSELFTEST\r\n".to_vec()
        );
        assert_eq!(engine.transport().read_calls(), 0);
    }
}
