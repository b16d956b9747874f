//! # Reply Decoding
//!
//! Typed views of the printer's answers to query commands.
//!
//! ## Reply Layouts
//!
//! ```text
//! BATTERY <percent:1 BCD><charging:1> CR LF
//! CONFIG  <protocol:1><dpi:1><fwA:3><fwB:3><timeout:1><beep:1> CR LF
//! ESC!?   <readiness:1>                         (no terminator)
//! ESC!o   <readiness:1><13 roll/state bytes><crc16:2>  (no terminator)
//! ```
//!
//! ## Readiness Table
//!
//! | Byte | Meaning |
//! |------|---------|
//! | 0x00 | Ready |
//! | 0x01 | Lid open |
//! | 0x04 | Out of paper |
//! | 0x20 | Busy |
//!
//! Any other byte is an error. Nothing is ever assumed ready.

use std::fmt;

use serde::Serialize;

use super::frame::Response;
use crate::error::EtiquetaError;

/// Tag of the `BATTERY?` reply
pub const BATTERY_TAG: &str = "BATTERY";

/// Tag of the `CONFIG?` reply
pub const CONFIG_TAG: &str = "CONFIG";

/// Payload bytes of a `CONFIG` reply
pub const CONFIG_LEN: usize = 10;

/// Bytes in an `ESC!o` status frame, checksum included
pub const STATUS_FRAME_LEN: usize = 16;

/// Reject replies whose tag doesn't match the query.
fn expect_tag(response: &Response, tag: &str) -> Result<(), EtiquetaError> {
    if response.tag != tag {
        return Err(EtiquetaError::Protocol(format!(
            "expected {} reply, got tag {:?} (raw: {})",
            tag,
            response.tag,
            response.hex()
        )));
    }
    Ok(())
}

// ============================================================================
// BATTERY
// ============================================================================

/// Charge state reported by `BATTERY?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatteryStatus {
    /// Charge in percent (0-100), sent as packed BCD
    pub percent: u8,
    /// Second payload byte; the printer reports 99% while this is set
    pub charging: bool,
}

impl BatteryStatus {
    pub fn from_response(response: &Response) -> Result<Self, EtiquetaError> {
        expect_tag(response, BATTERY_TAG)?;

        let Some(&level) = response.payload.first() else {
            return Err(EtiquetaError::Protocol(format!(
                "BATTERY reply has no payload (raw: {})",
                response.hex()
            )));
        };
        let percent = bcd_to_u8(level)
            .filter(|&p| p <= 100)
            .ok_or_else(|| {
                EtiquetaError::Protocol(format!(
                    "BATTERY level 0x{:02x} is not a BCD percentage (raw: {})",
                    level,
                    response.hex()
                ))
            })?;

        Ok(Self {
            percent,
            charging: response.payload.get(1).is_some_and(|&b| b != 0),
        })
    }
}

/// Decode a packed BCD byte (`0x67` → 67). `None` if either nibble exceeds 9.
fn bcd_to_u8(byte: u8) -> Option<u8> {
    let (tens, ones) = (byte >> 4, byte & 0x0f);
    (tens <= 9 && ones <= 9).then_some(tens * 10 + ones)
}

impl fmt::Display for BatteryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Battery Level: {}%", self.percent)?;
        if self.charging {
            write!(f, " (charging; unplug for a current reading)")?;
        }
        Ok(())
    }
}

// ============================================================================
// CONFIG
// ============================================================================

/// Auto power-off setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TimeoutSetting {
    Never = 0,
    Minutes15 = 1,
    Minutes30 = 2,
    Minutes60 = 3,
}

impl TimeoutSetting {
    /// Map a minute count (0 meaning never) onto the device's enum.
    pub fn from_minutes(minutes: u32) -> Result<Self, EtiquetaError> {
        match minutes {
            0 => Ok(Self::Never),
            15 => Ok(Self::Minutes15),
            30 => Ok(Self::Minutes30),
            60 => Ok(Self::Minutes60),
            other => Err(EtiquetaError::InvalidArgument(format!(
                "timeout must be 0, 15, 30 or 60 minutes, got {}",
                other
            ))),
        }
    }

    pub fn minutes(self) -> Option<u32> {
        match self {
            Self::Never => None,
            Self::Minutes15 => Some(15),
            Self::Minutes30 => Some(30),
            Self::Minutes60 => Some(60),
        }
    }
}

impl TryFrom<u8> for TimeoutSetting {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, u8> {
        match byte {
            0 => Ok(Self::Never),
            1 => Ok(Self::Minutes15),
            2 => Ok(Self::Minutes30),
            3 => Ok(Self::Minutes60),
            other => Err(other),
        }
    }
}

impl fmt::Display for TimeoutSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.minutes() {
            None => write!(f, "Never"),
            Some(m) => write!(f, "{} minutes", m),
        }
    }
}

/// A `major.minor.patch` firmware triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FirmwareVersion(pub u8, pub u8, pub u8);

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.0, self.1, self.2)
    }
}

/// Snapshot of the `CONFIG?` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeviceConfig {
    pub protocol_type: u8,
    /// Resolution code (0xCB ≈ 203 DPI)
    pub dpi_code: u8,
    pub firmware_a: FirmwareVersion,
    pub firmware_b: FirmwareVersion,
    pub timeout: TimeoutSetting,
    pub beep_enabled: bool,
}

impl DeviceConfig {
    pub fn from_response(response: &Response) -> Result<Self, EtiquetaError> {
        expect_tag(response, CONFIG_TAG)?;
        Self::from_payload(&response.payload)
    }

    /// Decode the fixed 10-byte layout.
    ///
    /// ```
    /// use etiqueta::protocol::response::{DeviceConfig, FirmwareVersion, TimeoutSetting};
    ///
    /// let config = DeviceConfig::from_payload(&[0x00, 0xcb, 0, 0, 3, 4, 2, 4, 0, 1])?;
    /// assert_eq!(config.dpi_code, 0xcb);
    /// assert_eq!(config.firmware_b, FirmwareVersion(4, 2, 4));
    /// assert_eq!(config.timeout, TimeoutSetting::Never);
    /// assert!(config.beep_enabled);
    /// # Ok::<(), etiqueta::error::EtiquetaError>(())
    /// ```
    pub fn from_payload(payload: &[u8]) -> Result<Self, EtiquetaError> {
        if payload.len() != CONFIG_LEN {
            return Err(EtiquetaError::Protocol(format!(
                "CONFIG payload must be {} bytes, got {} ({})",
                CONFIG_LEN,
                payload.len(),
                hex::encode(payload)
            )));
        }

        let timeout = TimeoutSetting::try_from(payload[8]).map_err(|byte| {
            EtiquetaError::Protocol(format!(
                "CONFIG timeout byte 0x{:02x} not recognized ({})",
                byte,
                hex::encode(payload)
            ))
        })?;

        Ok(Self {
            protocol_type: payload[0],
            dpi_code: payload[1],
            firmware_a: FirmwareVersion(payload[2], payload[3], payload[4]),
            firmware_b: FirmwareVersion(payload[5], payload[6], payload[7]),
            timeout,
            beep_enabled: payload[9] != 0,
        })
    }
}

impl fmt::Display for DeviceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Protocol Type: {}", self.protocol_type)?;
        writeln!(f, "DPI Code: 0x{:02x}", self.dpi_code)?;
        writeln!(f, "Hardware Version: {}", self.firmware_a)?;
        writeln!(f, "Firmware Version: {}", self.firmware_b)?;
        writeln!(f, "Timeout: {}", self.timeout)?;
        write!(f, "Beep: {}", if self.beep_enabled { "On" } else { "Off" })
    }
}

// ============================================================================
// STATUS
// ============================================================================

/// Printer readiness, from the first status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Ready,
    LidOpen,
    OutOfPaper,
    Busy,
}

impl Readiness {
    /// Look a status byte up in the fixed table.
    ///
    /// ## Errors
    ///
    /// `UnknownStatus` for any byte outside the table.
    pub fn from_byte(byte: u8) -> Result<Self, EtiquetaError> {
        match byte {
            0x00 => Ok(Self::Ready),
            0x01 => Ok(Self::LidOpen),
            0x04 => Ok(Self::OutOfPaper),
            0x20 => Ok(Self::Busy),
            other => Err(EtiquetaError::UnknownStatus(other)),
        }
    }

    pub fn is_ready(self) -> bool {
        self == Self::Ready
    }
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Ready => "Ready",
            Self::LidOpen => "Lid Open",
            Self::OutOfPaper => "Paper not loaded",
            Self::Busy => "Busy",
        };
        f.write_str(text)
    }
}

/// The 16-byte frame answered to `ESC!o`.
///
/// Only the readiness byte is interpreted. The middle bytes describe the
/// loaded roll (read from its tag) and are kept raw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PrinterStatus {
    pub readiness: Readiness,
    pub raw: [u8; STATUS_FRAME_LEN],
}

impl PrinterStatus {
    /// Validate and decode a status frame.
    ///
    /// ## Errors
    ///
    /// - `Framing` on a wrong length or checksum mismatch
    /// - `UnknownStatus` if the readiness byte is outside the table
    pub fn from_frame(frame: &[u8]) -> Result<Self, EtiquetaError> {
        let raw: [u8; STATUS_FRAME_LEN] = frame.try_into().map_err(|_| {
            EtiquetaError::framing(
                format!("status frame must be {} bytes, got {}", STATUS_FRAME_LEN, frame.len()),
                frame,
            )
        })?;

        let (body, tail) = raw.split_at(STATUS_FRAME_LEN - 2);
        let provided = u16::from_be_bytes([tail[0], tail[1]]);
        let computed = crc16(body);
        if provided != computed {
            return Err(EtiquetaError::framing(
                format!(
                    "status checksum mismatch: frame says {:04x}, computed {:04x}",
                    provided, computed
                ),
                frame,
            ));
        }

        Ok(Self {
            readiness: Readiness::from_byte(raw[0])?,
            raw,
        })
    }

    /// Body length byte as reported by the printer.
    pub fn data_length(&self) -> u8 {
        self.raw[1]
    }
}

impl fmt::Display for PrinterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (frame: {})", self.readiness, hex::encode(self.raw))
    }
}

/// CRC-16/MODBUS (reflected poly 0xA001, init 0xFFFF).
///
/// ```
/// use etiqueta::protocol::response::crc16;
///
/// assert_eq!(crc16(b"123456789"), 0x4B37);
/// ```
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= byte as u16;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// Build a checksummed status frame. Handy for tests and simulators.
pub fn status_frame(readiness_byte: u8, body: &[u8; 13]) -> [u8; STATUS_FRAME_LEN] {
    let mut frame = [0u8; STATUS_FRAME_LEN];
    frame[0] = readiness_byte;
    frame[1..14].copy_from_slice(body);
    let crc = crc16(&frame[..14]).to_be_bytes();
    frame[14] = crc[0];
    frame[15] = crc[1];
    frame
}

// ============================================================================
// TESTS
// ============================================================================
