//! # Print Session
//!
//! Owns the transport for its whole life and sequences a print job:
//!
//! ```text
//!            submit                ready              last command written
//!   Idle ─────────────▶ AwaitingReady ─────▶ Printing ─────────────────────▶ Idle
//!     ▲                      │
//!     └── ReadyTimeout ──────┘
//!
//!   any state ── transport / framing error ──▶ Faulted (terminal)
//! ```
//!
//! The printer never acknowledges a finished job. "Done" means every byte
//! reached the transport; poll [`PrintSession::ready`] afterwards if the
//! caller needs more than that.

use std::fmt;

use serde::Serialize;
use tracing::{info, warn};

use super::engine::{Engine, PollPolicy, ReadyPoll};
use crate::error::EtiquetaError;
use crate::printer::LinkConfig;
use crate::protocol::bitmap::PrintJob;
use crate::protocol::commands::Command;
use crate::protocol::frame;
use crate::protocol::response::{BatteryStatus, DeviceConfig, PrinterStatus, Readiness, TimeoutSetting};
use crate::transport::Transport;

/// Where a session is in the job lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Idle,
    AwaitingReady,
    Printing,
    Faulted,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::AwaitingReady => "awaiting ready",
            Self::Printing => "printing",
            Self::Faulted => "faulted",
        };
        f.write_str(name)
    }
}

/// What [`PrintSession::submit`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobReceipt {
    /// Ready polls spent before printing started
    pub attempts: u32,
    /// Commands written
    pub commands: usize,
    /// Bytes written for the job itself
    pub bytes: usize,
}

/// Single-owner print session over one transport.
pub struct PrintSession<T> {
    engine: Engine<T>,
    state: SessionState,
    policy: PollPolicy,
}

impl<T: Transport> PrintSession<T> {
    pub fn new(transport: T, link: &LinkConfig) -> Self {
        Self {
            engine: Engine::new(transport, link),
            state: SessionState::Idle,
            policy: PollPolicy::from_link(link),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn engine(&self) -> &Engine<T> {
        &self.engine
    }

    pub fn poll_policy(&self) -> PollPolicy {
        self.policy
    }

    pub fn set_poll_policy(&mut self, policy: PollPolicy) {
        self.policy = policy;
    }

    /// Give the transport back, e.g. to inspect a mock after a test.
    pub fn into_transport(self) -> T {
        self.engine.into_transport()
    }

    fn transition(&mut self, to: SessionState) {
        if self.state != to {
            info!(from = %self.state, to = %to, "session state");
            self.state = to;
        }
    }

    fn fault(&mut self, err: &EtiquetaError) {
        warn!(error = %err, "session faulted");
        self.transition(SessionState::Faulted);
    }

    /// Run one engine operation, refusing outright when faulted and
    /// faulting on errors that leave the stream position unknown.
    fn guard<R>(
        &mut self,
        op: impl FnOnce(&mut Engine<T>) -> Result<R, EtiquetaError>,
    ) -> Result<R, EtiquetaError> {
        if self.state == SessionState::Faulted {
            return Err(EtiquetaError::Faulted);
        }
        let result = op(&mut self.engine);
        if let Err(ref e) = result {
            if e.is_fatal() {
                self.fault(e);
            }
        }
        result
    }

    // ========================================================================
    // QUERIES AND SETTINGS
    // ========================================================================

    pub fn battery(&mut self) -> Result<BatteryStatus, EtiquetaError> {
        self.guard(Engine::query_battery)
    }

    pub fn config(&mut self) -> Result<DeviceConfig, EtiquetaError> {
        self.guard(Engine::query_config)
    }

    pub fn ready(&mut self) -> Result<bool, EtiquetaError> {
        self.guard(Engine::query_ready)
    }

    pub fn readiness(&mut self) -> Result<Readiness, EtiquetaError> {
        self.guard(Engine::query_readiness)
    }

    /// One cancel-pause exchange, returning the full status frame.
    pub fn status(&mut self) -> Result<PrinterStatus, EtiquetaError> {
        self.guard(Engine::query_status)
    }

    /// Poll until ready using the session's policy, without printing.
    pub fn wait_ready(&mut self) -> Result<ReadyPoll, EtiquetaError> {
        let policy = self.policy;
        self.guard(|engine| engine.cancel_pause(&policy))
    }

    pub fn set_beep(&mut self, enabled: bool) -> Result<(), EtiquetaError> {
        self.guard(|engine| engine.set_beep(enabled))
    }

    pub fn set_timeout(&mut self, setting: TimeoutSetting) -> Result<(), EtiquetaError> {
        self.guard(|engine| engine.set_timeout(setting))
    }

    pub fn self_test(&mut self) -> Result<(), EtiquetaError> {
        self.guard(Engine::self_test)
    }

    /// Fire-and-forget a single command.
    ///
    /// Queries are refused: their reply would be left in the stream. A
    /// command that fails to encode is rejected before any I/O and does
    /// not fault the session.
    pub fn send(&mut self, command: &Command) -> Result<(), EtiquetaError> {
        if self.state == SessionState::Faulted {
            return Err(EtiquetaError::Faulted);
        }
        let wire = encode_fire_and_forget(command)?;
        self.guard(|engine| engine.write_frame(command, &wire))
    }

    // ========================================================================
    // JOBS
    // ========================================================================

    /// Wait for the printer, then write every command of `job` in order.
    ///
    /// ## Errors
    ///
    /// - `Faulted` straight away, with no I/O, if the session is faulted
    /// - `ReadyTimeout` (and other non-fatal poll errors) leave the session
    ///   `Idle` with nothing printed
    /// - transport and framing errors fault the session
    pub fn submit(&mut self, job: &PrintJob) -> Result<JobReceipt, EtiquetaError> {
        let policy = self.policy;
        self.submit_with(job, Some(&policy))
    }

    /// Write `job` without polling first (the printer is known to be ready).
    pub fn submit_now(&mut self, job: &PrintJob) -> Result<JobReceipt, EtiquetaError> {
        self.submit_with(job, None)
    }

    fn submit_with(
        &mut self,
        job: &PrintJob,
        policy: Option<&PollPolicy>,
    ) -> Result<JobReceipt, EtiquetaError> {
        if self.state == SessionState::Faulted {
            return Err(EtiquetaError::Faulted);
        }

        // Encode up front so a malformed job never leaves half a canvas
        // configured on the device
        let encoded = job
            .commands()
            .iter()
            .map(encode_fire_and_forget)
            .collect::<Result<Vec<_>, _>>()?;

        info!(copies = job.copies(), commands = encoded.len(), "submitting job");

        let mut attempts = 0;
        if let Some(policy) = policy {
            self.transition(SessionState::AwaitingReady);
            match self.engine.cancel_pause(policy) {
                Ok(poll) => attempts = poll.attempts,
                Err(e) if e.is_fatal() => {
                    self.fault(&e);
                    return Err(e);
                }
                Err(e) => {
                    self.transition(SessionState::Idle);
                    return Err(e);
                }
            }
        }

        self.transition(SessionState::Printing);
        let mut bytes = 0;
        for (command, wire) in job.commands().iter().zip(&encoded) {
            if let Err(e) = self.engine.write_frame(command, wire) {
                warn!(command = %command.name(), "write failed mid-job");
                self.fault(&e);
                return Err(e);
            }
            bytes += wire.len();
        }

        self.transition(SessionState::Idle);
        info!(bytes, "job written");

        Ok(JobReceipt {
            attempts,
            commands: encoded.len(),
            bytes,
        })
    }
}

/// Encode a command that must not draw a reply from the printer.
fn encode_fire_and_forget(command: &Command) -> Result<Vec<u8>, EtiquetaError> {
    if command.expects_reply() {
        return Err(EtiquetaError::InvalidArgument(format!(
            "{} expects a reply; use the matching query method",
            command.name()
        )));
    }
    frame::encode(command)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::protocol::bitmap::{build_job, JobSettings, LabelImage};
    use crate::protocol::commands;
    use crate::protocol::response::status_frame;
    use crate::transport::MockTransport;
    use pretty_assertions::assert_eq;

    const ROLL: [u8; 13] = [0x0c, 1, 0x12, 3, 0, 3, 1, 0x12, 0x12, 0x15, 0x28, 0x0f, 0x0e];

    fn session(mock: MockTransport) -> PrintSession<MockTransport> {
        let mut session = PrintSession::new(mock, &LinkConfig::default());
        session.set_poll_policy(PollPolicy::new(5, Duration::ZERO));
        session
    }

    fn job() -> PrintJob {
        build_job(&LabelImage::blank(), &JobSettings::default()).unwrap()
    }

    #[test]
    fn test_submit_polls_then_writes_job() {
        let mut mock = MockTransport::new();
        mock.reply_to(b"\x1b!o", &status_frame(0x20, &ROLL))
            .reply_to(b"\x1b!o", &status_frame(0x00, &ROLL));

        let mut session = session(mock);
        let receipt = session.submit(&job()).unwrap();
        assert_eq!(receipt.attempts, 2);
        assert_eq!(receipt.commands, 7);
        assert_eq!(session.state(), SessionState::Idle);

        let mock = session.into_transport();
        let writes = mock.writes();
        assert_eq!(writes.len(), 2 + 7);
        assert!(writes[2].starts_with(b"SIZE "));
        assert_eq!(writes.last().unwrap(), b"PRINT 1\r\n");
        assert_eq!(receipt.bytes, writes[2..].iter().map(Vec::len).sum::<usize>());
    }

    #[test]
    fn test_ready_timeout_returns_to_idle() {
        let mut mock = MockTransport::new();
        for _ in 0..5 {
            mock.reply_to(b"\x1b!o", &status_frame(0x01, &ROLL));
        }

        let mut session = session(mock);
        let err = session.submit(&job()).unwrap_err();
        assert!(matches!(err, EtiquetaError::ReadyTimeout { attempts: 5, .. }));
        assert_eq!(session.state(), SessionState::Idle);

        // Nothing but polls went out
        let mock = session.into_transport();
        assert!(mock.writes().iter().all(|w| w.starts_with(b"\x1b!o")));
    }

    #[test]
    fn test_bad_crc_faults_session() {
        let mut frame = status_frame(0x00, &ROLL);
        frame[15] ^= 0xFF;
        let mut mock = MockTransport::new();
        mock.reply_to(b"\x1b!o", &frame);

        let mut session = session(mock);
        let err = session.submit(&job()).unwrap_err();
        assert!(matches!(err, EtiquetaError::Framing { .. }));
        assert_eq!(session.state(), SessionState::Faulted);
    }

    #[test]
    fn test_faulted_session_does_no_io() {
        let mut mock = MockTransport::new();
        mock.reply_to(b"BATTERY?", b"BATTERY \x43");

        let mut session = session(mock);
        assert!(matches!(
            session.battery().unwrap_err(),
            EtiquetaError::Framing { .. }
        ));
        assert_eq!(session.state(), SessionState::Faulted);

        let before = session.engine().transport().io_count();
        assert!(matches!(session.battery(), Err(EtiquetaError::Faulted)));
        assert!(matches!(session.config(), Err(EtiquetaError::Faulted)));
        assert!(matches!(session.ready(), Err(EtiquetaError::Faulted)));
        assert!(matches!(session.set_beep(false), Err(EtiquetaError::Faulted)));
        assert!(matches!(session.submit(&job()), Err(EtiquetaError::Faulted)));
        assert_eq!(session.engine().transport().io_count(), before);
    }

    #[test]
    fn test_non_fatal_errors_keep_session_usable() {
        let mut mock = MockTransport::new();
        mock.reply_to(b"BATTERY?", b"CONFIG \x43\x00\r\n")
            .reply_to(b"BATTERY?", b"BATTERY \x67\x00\r\n");

        let mut session = session(mock);
        assert!(matches!(session.battery(), Err(EtiquetaError::Protocol(_))));
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.battery().unwrap().percent, 67);
    }

    #[test]
    fn test_write_failure_mid_job_faults() {
        let mut mock = MockTransport::new();
        mock.disconnect();

        let mut session = session(mock);
        let err = session.submit_now(&job()).unwrap_err();
        assert!(matches!(err, EtiquetaError::Transport(_)));
        assert_eq!(session.state(), SessionState::Faulted);
    }

    #[test]
    fn test_send_rejects_bad_payload_without_faulting() {
        let bad = Command::Binary {
            name: "BITMAP".to_string(),
            args: vec![],
            declared_len: 4,
            payload: vec![0xFF; 2],
        };

        let mut session = session(MockTransport::new());
        assert!(matches!(session.send(&bad), Err(EtiquetaError::Framing { .. })));
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.engine().transport().io_count(), 0);

        session.send(&commands::cls()).unwrap();
        assert_eq!(session.into_transport().written(), b"CLS\r\n".to_vec());
    }

    #[test]
    fn test_send_refuses_queries() {
        let mut session = session(MockTransport::new());
        for query in [commands::battery_query(), commands::ready_query()] {
            assert!(matches!(
                session.send(&query),
                Err(EtiquetaError::InvalidArgument(_))
            ));
        }
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.engine().transport().io_count(), 0);
    }

    #[test]
    fn test_submit_now_skips_polling() {
        let mut session = session(MockTransport::new());
        let receipt = session.submit_now(&job()).unwrap();
        assert_eq!(receipt.attempts, 0);

        let mock = session.into_transport();
        assert_eq!(mock.writes().len(), 7);
        assert_eq!(mock.read_calls(), 0);
    }
}
