//! Frame reader: `read_until` over a [`Port`].
//!
//! A [`Port`] only moves bytes and knows nothing about frames. The reader
//! keeps bytes that arrived after a complete frame, so a device that
//! answers `?;` and then the data in one burst is read correctly on the
//! next attempt. Leftovers are dropped whenever the engine flushes the
//! port before a new write.

use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use rigcat_core::error::{Error, Result};
use rigcat_core::port::Port;

use crate::protocol::{self, printable};

/// Size of one `receive()` call.
const CHUNK: usize = 256;

/// What one bounded read produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A complete frame, terminator included.
    Frame(Vec<u8>),
    /// `max_len` bytes arrived without any accepted terminator.
    Unterminated(Vec<u8>),
    /// The deadline passed first. `partial` bytes were read and discarded.
    TimedOut { partial: usize },
}

/// Accumulates received bytes and cuts them into frames.
#[derive(Debug, Default)]
pub struct FrameReader {
    pending: Vec<u8>,
}

impl FrameReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop buffered bytes; called together with `Port::flush_input`.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Number of buffered bytes not yet returned as a frame.
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    /// Read until a complete frame, `max_len` bytes, or `timeout`.
    ///
    /// # Errors
    ///
    /// Port errors other than [`Error::Timeout`] are returned as-is;
    /// [`Error::OutOfMemory`] if the receive buffer cannot grow.
    pub async fn read_frame<P: Port + ?Sized>(
        &mut self,
        port: &mut P,
        accepted: &[u8],
        max_len: usize,
        timeout: Duration,
    ) -> Result<ReadOutcome> {
        let max_len = max_len.max(1);
        let deadline = Instant::now() + timeout;
        let mut chunk = [0u8; CHUNK];

        loop {
            let window = self.pending.len().min(max_len);
            if let Some(n) = protocol::scan_frame(&self.pending[..window], accepted) {
                let frame: Vec<u8> = self.pending.drain(..n).collect();
                trace!(frame = %printable(&frame), "frame received");
                return Ok(ReadOutcome::Frame(frame));
            }
            if self.pending.len() >= max_len {
                let raw: Vec<u8> = self.pending.drain(..max_len).collect();
                trace!(raw = %printable(&raw), max_len, "reply buffer full without terminator");
                return Ok(ReadOutcome::Unterminated(raw));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(self.timed_out());
            }

            let want = (max_len - self.pending.len()).min(CHUNK);
            match port.receive(&mut chunk[..want], deadline - now).await {
                Ok(0) => return Ok(self.timed_out()),
                Ok(n) => {
                    self.pending.try_reserve(n)?;
                    self.pending.extend_from_slice(&chunk[..n]);
                }
                Err(Error::Timeout) => return Ok(self.timed_out()),
                Err(e) => return Err(e),
            }
        }
    }

    fn timed_out(&mut self) -> ReadOutcome {
        let partial = self.pending.len();
        if partial > 0 {
            trace!(partial = %printable(&self.pending), "read timed out mid-frame");
        }
        self.pending.clear();
        ReadOutcome::TimedOut { partial }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigcat_core::port::Port;
    use rigcat_test_harness::MockPort;

    const TIMEOUT: Duration = Duration::from_millis(100);

    #[tokio::test]
    async fn reads_single_frame() {
        let mut port = MockPort::new();
        port.inject(b"ID019;");
        let mut reader = FrameReader::new();

        let out = reader
            .read_frame(&mut port, b";", 128, TIMEOUT)
            .await
            .unwrap();
        assert_eq!(out, ReadOutcome::Frame(b"ID019;".to_vec()));
        assert_eq!(reader.buffered(), 0);
    }

    #[tokio::test]
    async fn assembles_frame_from_chunks() {
        let mut port = MockPort::new();
        port.inject(b"FA0001");
        port.inject(b"4074000;");
        let mut reader = FrameReader::new();

        let out = reader
            .read_frame(&mut port, b";", 128, TIMEOUT)
            .await
            .unwrap();
        assert_eq!(out, ReadOutcome::Frame(b"FA00014074000;".to_vec()));
        assert_eq!(port.receive_count(), 2);
    }

    #[tokio::test]
    async fn keeps_bytes_after_frame() {
        let mut port = MockPort::new();
        port.inject(b"?;FA00014074000;");
        let mut reader = FrameReader::new();

        let first = reader
            .read_frame(&mut port, b";", 128, TIMEOUT)
            .await
            .unwrap();
        assert_eq!(first, ReadOutcome::Frame(b"?;".to_vec()));
        assert_eq!(reader.buffered(), 14);

        let second = reader
            .read_frame(&mut port, b";", 128, TIMEOUT)
            .await
            .unwrap();
        assert_eq!(second, ReadOutcome::Frame(b"FA00014074000;".to_vec()));
        assert_eq!(port.receive_count(), 1);
    }

    #[tokio::test]
    async fn terminator_only_reply_is_a_frame() {
        let mut port = MockPort::new();
        port.inject(b";");
        let mut reader = FrameReader::new();

        let out = reader
            .read_frame(&mut port, b";", 128, TIMEOUT)
            .await
            .unwrap();
        assert_eq!(out, ReadOutcome::Frame(b";".to_vec()));
    }

    #[tokio::test]
    async fn nothing_read_times_out() {
        let mut port = MockPort::new();
        let mut reader = FrameReader::new();

        let out = reader
            .read_frame(&mut port, b";", 128, TIMEOUT)
            .await
            .unwrap();
        assert_eq!(out, ReadOutcome::TimedOut { partial: 0 });
    }

    #[tokio::test]
    async fn partial_frame_times_out() {
        let mut port = MockPort::new();
        port.inject(b"FA0001");
        let mut reader = FrameReader::new();

        let out = reader
            .read_frame(&mut port, b";", 128, TIMEOUT)
            .await
            .unwrap();
        assert_eq!(out, ReadOutcome::TimedOut { partial: 6 });
        assert_eq!(reader.buffered(), 0);
    }

    #[tokio::test]
    async fn capacity_reached_without_terminator() {
        let mut port = MockPort::new();
        port.inject(b"FA00014074000FA00014074000;");
        let mut reader = FrameReader::new();

        let out = reader
            .read_frame(&mut port, b";", 8, TIMEOUT)
            .await
            .unwrap();
        assert_eq!(out, ReadOutcome::Unterminated(b"FA000140".to_vec()));
    }

    #[tokio::test]
    async fn terminator_beyond_capacity_is_not_seen() {
        let mut port = MockPort::new();
        port.inject(b"IF000140740000;");
        let mut reader = FrameReader::new();

        let out = reader
            .read_frame(&mut port, b";", 4, TIMEOUT)
            .await
            .unwrap();
        assert!(matches!(out, ReadOutcome::Unterminated(_)));
    }

    #[tokio::test]
    async fn port_errors_propagate() {
        let mut port = MockPort::new();
        port.set_connected(false);
        let mut reader = FrameReader::new();

        let err = reader
            .read_frame(&mut port, b";", 128, TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotConnected));
        assert!(!port.is_connected());
    }
}
