//! # Sessions
//!
//! - [`engine`]: one request/response exchange per device operation
//! - [`print`]: the job state machine that owns the transport
//!
//! ## Example
//!
//! ```
//! use etiqueta::printer::LinkConfig;
//! use etiqueta::protocol::bitmap::{build_job, JobSettings, LabelImage};
//! use etiqueta::protocol::response::status_frame;
//! use etiqueta::session::{PrintSession, SessionState};
//! use etiqueta::transport::MockTransport;
//!
//! let mut mock = MockTransport::new();
//! mock.reply_to(b"\x1b!o", &status_frame(0x00, &[0; 13]));
//!
//! let mut session = PrintSession::new(mock, &LinkConfig::default());
//! let job = build_job(&LabelImage::blank(), &JobSettings::default())?;
//! let receipt = session.submit(&job)?;
//!
//! assert_eq!(receipt.attempts, 1);
//! assert_eq!(session.state(), SessionState::Idle);
//! # Ok::<(), etiqueta::error::EtiquetaError>(())
//! ```

pub mod engine;
pub mod print;

pub use engine::{Engine, PollPolicy, ReadyPoll};
pub use print::{JobReceipt, PrintSession, SessionState};
