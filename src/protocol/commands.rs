//! # TSPL2 Command Builders
//!
//! This module implements the subset of the TSPL2 command language spoken by
//! the Nelko P21 label printer.
//!
//! ## Protocol Overview
//!
//! TSPL2 is line oriented. Each command is an ASCII name, a space, then
//! comma-separated positional arguments, terminated by CR LF:
//!
//! ```text
//! SIZE 14.0 mm,40.0 mm\r\n
//! DENSITY 15\r\n
//! CLS\r\n
//! ```
//!
//! Three shapes of command exist on the wire:
//!
//! | Shape | Example | Notes |
//! |-------|---------|-------|
//! | Text | `PRINT 1` | arguments may be raw single bytes (`BEEP 0x01`) |
//! | Binary | `BITMAP 0,0,12,284,1,<3408 bytes>` | payload is unescaped, length is declared |
//! | Real-time | `ESC ! ?` | answered with fixed-size binary replies |
//!
//! There is no escaping and no checksum on outgoing commands.
//!
//! ## Reference
//!
//! TSC "TSPL/TSPL2 Programming Language" manual, plus observation of the
//! P21's replies for the query commands.

use std::fmt;

use super::response::TimeoutSetting;

/// ESC (Escape) - prefix of the real-time commands
pub const ESC: u8 = 0x1B;

/// Real-time code: cancel pause, answered with a 16-byte status frame
pub const CANCEL_PAUSE: u8 = b'o';

/// Real-time code: ready query, answered with a single status byte
pub const READY_QUERY: u8 = b'?';

/// One positional argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// Rendered as ASCII text
    Text(String),
    /// Emitted as a single raw byte (e.g. `BEEP` and `TIMEOUT` values)
    Byte(u8),
}

impl Arg {
    pub(crate) fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            Arg::Text(s) => out.extend_from_slice(s.as_bytes()),
            Arg::Byte(b) => out.push(*b),
        }
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::Text(s.to_string())
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Arg::Text(s)
    }
}

macro_rules! arg_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Arg {
            fn from(n: $t) -> Self {
                Arg::Text(n.to_string())
            }
        })*
    };
}

arg_from_int!(u8, u16, u32, usize);

/// # Outbound Command
///
/// Built once, never mutated. Turned into wire bytes by
/// [`frame::encode`](super::frame::encode).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `NAME arg,arg,...`
    Text { name: String, args: Vec<Arg> },

    /// `NAME arg,...,arg,<payload>` where the payload is raw bytes whose
    /// length was declared when the command was built.
    Binary {
        name: String,
        args: Vec<Arg>,
        declared_len: usize,
        payload: Vec<u8>,
    },

    /// `ESC ! code`
    Realtime(u8),
}

impl Command {
    /// Build a text command from any name and arguments.
    ///
    /// Used for pass-through commands whose device behaviour isn't pinned
    /// down; nothing is validated beyond what goes on the wire.
    pub fn text<I, A>(name: &str, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Arg>,
    {
        Command::Text {
            name: name.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Command name as it appears on the wire (`ESC!x` for real-time ones).
    pub fn name(&self) -> String {
        match self {
            Command::Text { name, .. } | Command::Binary { name, .. } => name.clone(),
            Command::Realtime(code) => format!("ESC!{}", *code as char),
        }
    }

    /// Whether the printer answers this command.
    pub fn expects_reply(&self) -> bool {
        match self {
            Command::Realtime(_) => true,
            Command::Text { name, .. } => name.ends_with('?'),
            Command::Binary { .. } => false,
        }
    }
}

impl fmt::Display for Command {
    /// Human-readable form for logs; binary payloads are summarized.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn render(args: &[Arg]) -> String {
            args.iter()
                .map(|a| match a {
                    Arg::Text(s) => s.clone(),
                    Arg::Byte(b) => format!("0x{:02x}", b),
                })
                .collect::<Vec<_>>()
                .join(",")
        }
        match self {
            Command::Text { name, args } if args.is_empty() => write!(f, "{}", name),
            Command::Text { name, args } => write!(f, "{} {}", name, render(args)),
            Command::Binary {
                name,
                args,
                declared_len,
                ..
            } => write!(f, "{} {},<{} bytes>", name, render(args), declared_len),
            Command::Realtime(code) => write!(f, "ESC!{}", *code as char),
        }
    }
}

// ============================================================================
// LABEL SETUP COMMANDS
// ============================================================================

/// Render a millimeter quantity the way the P21 app does (`14.0 mm`).
fn mm(value: f32) -> String {
    format!("{:.1} mm", value)
}

/// # Label Size (SIZE w,h)
///
/// ```
/// use etiqueta::protocol::{commands, frame};
///
/// let cmd = commands::size(14.0, 40.0);
/// assert_eq!(frame::encode(&cmd)?, b"SIZE 14.0 mm,40.0 mm\r\n");
/// # Ok::<(), etiqueta::error::EtiquetaError>(())
/// ```
pub fn size(width_mm: f32, length_mm: f32) -> Command {
    Command::text("SIZE", [mm(width_mm), mm(length_mm)])
}

/// # Gap Between Labels (GAP m,n)
///
/// `gap_mm` is the gap itself, `offset_mm` the gap offset (0 for the P21).
pub fn gap(gap_mm: f32, offset_mm: f32) -> Command {
    Command::text("GAP", [mm(gap_mm), mm(offset_mm)])
}

/// # Print Direction (DIRECTION n,m)
///
/// Sent as-is. On the P21 neither argument has a visible effect.
pub fn direction(direction: u8, mirror: u8) -> Command {
    Command::text("DIRECTION", [direction, mirror])
}

/// # Print Darkness (DENSITY n)
///
/// `n` ranges 0-15; the range is checked when a job is built.
pub fn density(level: u8) -> Command {
    Command::text("DENSITY", [level])
}

/// # Clear Image Buffer (CLS)
pub fn cls() -> Command {
    Command::text("CLS", Vec::<Arg>::new())
}

// ============================================================================
// GRAPHICS AND PRINTING
// ============================================================================

/// Drawing mode of the `BITMAP` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum BitmapMode {
    Overwrite = 0,
    #[default]
    Or = 1,
    Xor = 2,
}

/// # Bitmap (BITMAP x,y,width_bytes,height,mode,data)
///
/// The payload is `row_bytes × rows` raw bytes appended after the final
/// comma. Its length travels with the command so the encoder never has to
/// scan the payload for a terminator.
///
/// ```
/// use etiqueta::protocol::commands::{self, BitmapMode};
///
/// let cmd = commands::bitmap(0, 0, 1, 2, BitmapMode::Or, vec![0xFF, 0x0D]);
/// assert_eq!(cmd.to_string(), "BITMAP 0,0,1,2,1,<2 bytes>");
/// ```
pub fn bitmap(
    x: u16,
    y: u16,
    row_bytes: usize,
    rows: usize,
    mode: BitmapMode,
    payload: Vec<u8>,
) -> Command {
    Command::Binary {
        name: "BITMAP".to_string(),
        args: vec![
            x.into(),
            y.into(),
            row_bytes.into(),
            rows.into(),
            (mode as u8).into(),
        ],
        declared_len: row_bytes * rows,
        payload,
    }
}

/// # Print Labels (PRINT n)
pub fn print(copies: u32) -> Command {
    Command::text("PRINT", [copies])
}

/// Fields of a TSPL `BARCODE` command.
///
/// Emitted verbatim; the P21 prints something for this command but the
/// result hasn't been characterized, so no rendering guarantees are made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Barcode {
    pub x: u16,
    pub y: u16,
    pub symbology: String,
    pub height: u16,
    pub human_readable: u8,
    pub rotation: u16,
    pub narrow: u8,
    pub wide: u8,
    pub content: String,
}

/// # Barcode (BARCODE x,y,"type",height,readable,rotation,narrow,wide,"content")
pub fn barcode(code: &Barcode) -> Command {
    Command::text(
        "BARCODE",
        [
            Arg::from(code.x),
            Arg::from(code.y),
            Arg::Text(format!("\"{}\"", code.symbology)),
            Arg::from(code.height),
            Arg::from(code.human_readable),
            Arg::from(code.rotation),
            Arg::from(code.narrow),
            Arg::from(code.wide),
            Arg::Text(format!("\"{}\"", code.content)),
        ],
    )
}

// ============================================================================
// DEVICE SETTINGS
// ============================================================================

/// # Beeper On/Off (BEEP b)
///
/// The value is a raw byte, not an ASCII digit.
pub fn beep(enabled: bool) -> Command {
    Command::text("BEEP", [Arg::Byte(u8::from(enabled))])
}

/// # Auto Power-Off (TIMEOUT b)
///
/// The value is the raw [`TimeoutSetting`] byte.
pub fn timeout(setting: TimeoutSetting) -> Command {
    Command::text("TIMEOUT", [Arg::Byte(setting as u8)])
}

/// # Self-Test Page (SELFTEST)
pub fn selftest() -> Command {
    Command::text("SELFTEST", Vec::<Arg>::new())
}

// ============================================================================
// QUERIES
// ============================================================================

/// # Battery Query (BATTERY?)
///
/// Answered with `BATTERY <percent><charging>\r\n`.
pub fn battery_query() -> Command {
    Command::text("BATTERY?", Vec::<Arg>::new())
}

/// # Configuration Query (CONFIG?)
///
/// Answered with `CONFIG <10 bytes>\r\n`.
pub fn config_query() -> Command {
    Command::text("CONFIG?", Vec::<Arg>::new())
}

/// # Cancel Pause (ESC ! o)
///
/// Releases a paused printer and answers with a 16-byte status frame.
pub fn cancel_pause() -> Command {
    Command::Realtime(CANCEL_PAUSE)
}

/// # Ready Query (ESC ! ?)
///
/// Answered with a single readiness byte.
pub fn ready_query() -> Command {
    Command::Realtime(READY_QUERY)
}

// ============================================================================
// TESTS
// ============================================================================
