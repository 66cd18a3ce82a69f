//! Mock port for deterministic testing of the transaction engine.
//!
//! [`MockPort`] implements the [`Port`] trait with pre-loaded
//! request/reply scripts. Each expected request may answer with several
//! separate reply chunks, which lets a test model a device that answers
//! `?;` (busy) first and the real data on a later read without another
//! write in between.
//!
//! # Example
//!
//! ```
//! use rigcat_test_harness::MockPort;
//!
//! let mut mock = MockPort::new();
//! // When the engine writes "ID;", the next read yields "ID019;".
//! mock.expect(b"ID;", b"ID019;");
//! // When it writes "FA;", the first read yields "?;" and the second the data.
//! mock.expect_replies(b"FA;", &[b"?;", b"FA00014074000;"]);
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use rigcat_core::error::{Error, Result};
use rigcat_core::port::Port;

/// A pre-loaded request and the reply chunks it releases.
#[derive(Debug, Clone)]
struct Expectation {
    /// The exact bytes we expect to be sent.
    request: Vec<u8>,
    /// Chunks made readable once the request is seen, one per `receive()`.
    replies: Vec<Vec<u8>>,
}

/// A scripted [`Port`] for testing without hardware.
///
/// Expectations are consumed in order. A `send()` that does not match the
/// next expectation fails with [`Error::Transport`] so that a test sees
/// the mismatch directly. Reply chunks are appended to an input queue;
/// `receive()` returns at most one chunk per call and reports
/// [`Error::Timeout`] when the queue is empty. `flush_input()` discards
/// whatever is still queued, just like a real serial driver.
#[derive(Debug)]
pub struct MockPort {
    expectations: VecDeque<Expectation>,
    /// Bytes "on the wire" waiting to be read, grouped by arrival.
    input: VecDeque<Vec<u8>>,
    connected: bool,
    sent_log: Vec<Vec<u8>>,
    receive_calls: usize,
    flush_calls: usize,
    discarded: usize,
    /// Error kind the next `receive()` fails with, if any.
    read_failure: Option<io::ErrorKind>,
}

impl MockPort {
    /// Create a new mock port in the connected state.
    pub fn new() -> Self {
        MockPort {
            expectations: VecDeque::new(),
            input: VecDeque::new(),
            connected: true,
            sent_log: Vec::new(),
            receive_calls: 0,
            flush_calls: 0,
            discarded: 0,
            read_failure: None,
        }
    }

    /// Add an expected request with a single reply.
    ///
    /// An empty `reply` means the device stays silent.
    pub fn expect(&mut self, request: &[u8], reply: &[u8]) {
        let replies = if reply.is_empty() {
            Vec::new()
        } else {
            vec![reply.to_vec()]
        };
        self.expectations.push_back(Expectation {
            request: request.to_vec(),
            replies,
        });
    }

    /// Add an expected request whose reply arrives in separate chunks.
    pub fn expect_replies(&mut self, request: &[u8], replies: &[&[u8]]) {
        self.expectations.push_back(Expectation {
            request: request.to_vec(),
            replies: replies.iter().map(|r| r.to_vec()).collect(),
        });
    }

    /// Put bytes on the wire without any request, e.g. the stale tail of
    /// an earlier exchange or an unsolicited status frame.
    pub fn inject(&mut self, data: &[u8]) {
        self.input.push_back(data.to_vec());
    }

    /// All data sent through this port, one element per `send()` call.
    pub fn sent_data(&self) -> &[Vec<u8>] {
        &self.sent_log
    }

    /// Number of expectations that have not yet been consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.expectations.len()
    }

    /// Number of reply chunks still waiting to be read.
    pub fn pending_input(&self) -> usize {
        self.input.len()
    }

    /// Number of `receive()` calls made so far, including ones that timed out.
    pub fn receive_count(&self) -> usize {
        self.receive_calls
    }

    /// Number of `flush_input()` calls made so far.
    pub fn flush_count(&self) -> usize {
        self.flush_calls
    }

    /// Number of queued chunks thrown away by `flush_input()`.
    pub fn discarded_chunks(&self) -> usize {
        self.discarded
    }

    /// Make the next `receive()` fail with an [`Error::Io`] of `kind`.
    ///
    /// Queued input is left in place, so a later read still sees it.
    pub fn fail_next_receive(&mut self, kind: io::ErrorKind) {
        self.read_failure = Some(kind);
    }

    /// Set the connected state of the mock port.
    ///
    /// When set to `false`, subsequent calls return [`Error::NotConnected`].
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }
}

impl Default for MockPort {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Port for MockPort {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        self.sent_log.push(data.to_vec());

        let expectation = self
            .expectations
            .pop_front()
            .ok_or_else(|| Error::Transport("no more expectations in mock port".into()))?;
        if data != expectation.request.as_slice() {
            return Err(Error::Transport(format!(
                "unexpected send data: expected {:?}, got {:?}",
                String::from_utf8_lossy(&expectation.request),
                String::from_utf8_lossy(data)
            )));
        }
        self.input.extend(expectation.replies);
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        self.receive_calls += 1;

        if let Some(kind) = self.read_failure.take() {
            return Err(Error::Io(io::Error::new(kind, "scripted read failure")));
        }
        let Some(chunk) = self.input.front_mut() else {
            return Err(Error::Timeout);
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n == chunk.len() {
            self.input.pop_front();
        } else {
            chunk.drain(..n);
        }
        Ok(n)
    }

    async fn flush_input(&mut self) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        self.flush_calls += 1;
        self.discarded += self.input.len();
        self.input.clear();
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.connected = false;
        self.input.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn basic_send_receive() {
        let mut mock = MockPort::new();
        mock.expect(b"ID;", b"ID019;");

        mock.send(b"ID;").await.unwrap();

        let mut buf = [0u8; 64];
        let n = mock
            .receive(&mut buf, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"ID019;");
        assert_eq!(mock.receive_count(), 1);
    }

    #[tokio::test]
    async fn chunks_are_read_one_per_call() {
        let mut mock = MockPort::new();
        mock.expect_replies(b"FA;", &[b"?;", b"FA00014074000;"]);
        mock.send(b"FA;").await.unwrap();

        let mut buf = [0u8; 64];
        let n = mock.receive(&mut buf, Duration::ZERO).await.unwrap();
        assert_eq!(&buf[..n], b"?;");
        let n = mock.receive(&mut buf, Duration::ZERO).await.unwrap();
        assert_eq!(&buf[..n], b"FA00014074000;");
        let err = mock.receive(&mut buf, Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, Error::Timeout));
    }

    #[tokio::test]
    async fn silent_reply_times_out() {
        let mut mock = MockPort::new();
        mock.expect(b"FA00014074000;", b"");
        mock.send(b"FA00014074000;").await.unwrap();

        let mut buf = [0u8; 8];
        let err = mock.receive(&mut buf, Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, Error::Timeout));
    }

    #[tokio::test]
    async fn partial_receive_keeps_remainder() {
        let mut mock = MockPort::new();
        mock.expect(b"ID;", b"ID019;");
        mock.send(b"ID;").await.unwrap();

        let mut buf = [0u8; 4];
        let n = mock.receive(&mut buf, Duration::ZERO).await.unwrap();
        assert_eq!(&buf[..n], b"ID01");
        let n = mock.receive(&mut buf, Duration::ZERO).await.unwrap();
        assert_eq!(&buf[..n], b"9;");
    }

    #[tokio::test]
    async fn scripted_read_failure_fires_once() {
        let mut mock = MockPort::new();
        mock.expect(b"ID;", b"ID019;");
        mock.send(b"ID;").await.unwrap();
        mock.fail_next_receive(io::ErrorKind::BrokenPipe);

        let mut buf = [0u8; 64];
        let err = mock.receive(&mut buf, Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::BrokenPipe));
        assert_eq!(mock.pending_input(), 1);

        let n = mock.receive(&mut buf, Duration::ZERO).await.unwrap();
        assert_eq!(&buf[..n], b"ID019;");
        assert_eq!(mock.receive_count(), 2);
    }

    #[tokio::test]
    async fn flush_discards_queued_input() {
        let mut mock = MockPort::new();
        mock.inject(b"FA00007000000;");
        assert_eq!(mock.pending_input(), 1);

        mock.flush_input().await.unwrap();
        assert_eq!(mock.pending_input(), 0);
        assert_eq!(mock.flush_count(), 1);
        assert_eq!(mock.discarded_chunks(), 1);
    }

    #[tokio::test]
    async fn wrong_data_errors() {
        let mut mock = MockPort::new();
        mock.expect(b"ID;", b"ID019;");

        let err = mock.send(b"FA;").await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[tokio::test]
    async fn no_expectations_errors() {
        let mut mock = MockPort::new();
        let err = mock.send(b"ID;").await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[tokio::test]
    async fn disconnect() {
        let mut mock = MockPort::new();
        assert!(mock.is_connected());

        mock.close().await.unwrap();
        assert!(!mock.is_connected());

        let err = mock.send(b"ID;").await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));
        let err = mock.flush_input().await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));
    }

    #[tokio::test]
    async fn remaining_expectations() {
        let mut mock = MockPort::new();
        mock.expect(b"ID;", b"ID019;");
        mock.expect(b"FA;", b"FA00014074000;");
        assert_eq!(mock.remaining_expectations(), 2);

        mock.send(b"ID;").await.unwrap();
        assert_eq!(mock.remaining_expectations(), 1);
        assert_eq!(mock.sent_data(), &[b"ID;".to_vec()]);
    }
}
