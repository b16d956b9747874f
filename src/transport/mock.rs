//! # Mock Transport
//!
//! An in-memory [`Transport`] for exercising the protocol without a printer.
//!
//! Replies are scripted against the command that triggers them: each
//! scripted entry names a prefix, and the first write starting with that
//! prefix releases the reply into the read buffer. Writes that match nothing
//! (fire-and-forget commands) release nothing. Reading from an empty buffer
//! returns `Ok(0)` straight away, which callers see as a read timeout.
//!
//! ```
//! use std::time::Duration;
//! use etiqueta::transport::{MockTransport, Transport};
//!
//! let mut mock = MockTransport::new();
//! mock.reply_to(b"BATTERY?", b"BATTERY \x43\x00\r\n");
//!
//! mock.write_all(b"CLS\r\n")?;
//! mock.write_all(b"BATTERY?\r\n")?;
//!
//! let mut buf = [0u8; 32];
//! let n = mock.read_timeout(&mut buf, Duration::from_secs(1))?;
//! assert_eq!(&buf[..n], b"BATTERY \x43\x00\r\n");
//! # Ok::<(), etiqueta::error::EtiquetaError>(())
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use super::Transport;
use crate::error::EtiquetaError;

/// Scripted in-memory transport.
#[derive(Debug, Default)]
pub struct MockTransport {
    script: VecDeque<(Vec<u8>, Vec<u8>)>,
    pending: VecDeque<u8>,
    writes: Vec<Vec<u8>>,
    read_calls: usize,
    max_read: Option<usize>,
    disconnected: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `reply` to be released by the next write starting with `prefix`.
    ///
    /// Entries are consumed in order; an empty prefix matches any write.
    pub fn reply_to(&mut self, prefix: &[u8], reply: &[u8]) -> &mut Self {
        self.script.push_back((prefix.to_vec(), reply.to_vec()));
        self
    }

    /// Make bytes readable immediately, independent of any write.
    pub fn feed(&mut self, bytes: &[u8]) -> &mut Self {
        self.pending.extend(bytes);
        self
    }

    /// Deliver at most `n` bytes per read call, like a slow link would.
    pub fn trickle(&mut self, n: usize) -> &mut Self {
        self.max_read = Some(n.max(1));
        self
    }

    /// Fail every subsequent read and write.
    pub fn disconnect(&mut self) -> &mut Self {
        self.disconnected = true;
        self
    }

    /// Every write, in order.
    pub fn writes(&self) -> &[Vec<u8>] {
        &self.writes
    }

    /// All written bytes concatenated.
    pub fn written(&self) -> Vec<u8> {
        self.writes.concat()
    }

    /// Number of `read_timeout` calls made so far.
    pub fn read_calls(&self) -> usize {
        self.read_calls
    }

    /// Total number of reads and writes attempted.
    pub fn io_count(&self) -> usize {
        self.writes.len() + self.read_calls
    }

    /// Scripted replies that were never triggered.
    pub fn unused_replies(&self) -> usize {
        self.script.len()
    }

    /// Bytes released but not yet read.
    pub fn unread(&self) -> usize {
        self.pending.len()
    }
}

impl Transport for MockTransport {
    fn write_all(&mut self, data: &[u8]) -> Result<(), EtiquetaError> {
        if self.disconnected {
            return Err(EtiquetaError::Transport("Write failed: broken pipe".to_string()));
        }
        self.writes.push(data.to_vec());

        let matches = self
            .script
            .front()
            .is_some_and(|(prefix, _)| data.starts_with(prefix));
        if matches {
            if let Some((_, reply)) = self.script.pop_front() {
                self.pending.extend(reply);
            }
        }
        Ok(())
    }

    fn read_timeout(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize, EtiquetaError> {
        self.read_calls += 1;
        if self.disconnected {
            return Err(EtiquetaError::Transport("Read failed: connection reset".to_string()));
        }

        let limit = self.max_read.unwrap_or(usize::MAX).min(buf.len());
        let n = limit.min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAIT: Duration = Duration::from_millis(10);

    #[test]
    fn test_unmatched_write_releases_nothing() {
        let mut mock = MockTransport::new();
        mock.reply_to(b"CONFIG?", b"CONFIG x\r\n");

        mock.write_all(b"CLS\r\n").unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(mock.read_timeout(&mut buf, WAIT).unwrap(), 0);
        assert_eq!(mock.unused_replies(), 1);
    }

    #[test]
    fn test_replies_consumed_in_order() {
        let mut mock = MockTransport::new();
        mock.reply_to(b"A", b"1").reply_to(b"A", b"2");

        let mut buf = [0u8; 4];
        mock.write_all(b"A").unwrap();
        assert_eq!(mock.read_timeout(&mut buf, WAIT).unwrap(), 1);
        assert_eq!(buf[0], b'1');
        mock.write_all(b"A").unwrap();
        assert_eq!(mock.read_timeout(&mut buf, WAIT).unwrap(), 1);
        assert_eq!(buf[0], b'2');
        assert_eq!(mock.io_count(), 4);
    }

    #[test]
    fn test_trickle_limits_read_size() {
        let mut mock = MockTransport::new();
        mock.feed(b"abcdef").trickle(2);

        let mut buf = [0u8; 8];
        assert_eq!(mock.read_timeout(&mut buf, WAIT).unwrap(), 2);
        assert_eq!(&buf[..2], b"ab");
        assert_eq!(mock.unread(), 4);
    }

    #[test]
    fn test_disconnect_fails_io() {
        let mut mock = MockTransport::new();
        mock.disconnect();
        assert!(matches!(
            mock.write_all(b"CLS\r\n"),
            Err(EtiquetaError::Transport(_))
        ));
        let mut buf = [0u8; 1];
        assert!(mock.read_timeout(&mut buf, WAIT).is_err());
    }
}
