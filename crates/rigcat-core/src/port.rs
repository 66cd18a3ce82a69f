//! Port trait for rig communication.
//!
//! The [`Port`] trait abstracts over the byte stream to a transceiver.
//! Implementations exist for serial ports and TCP sockets in
//! `rigcat-transport`, and a scripted `MockPort` for testing lives in
//! `rigcat-test-harness`.
//!
//! The transaction engine in `rigcat-engine` owns one `Port` per session
//! and never shares it. Framing (finding the terminator) happens in the
//! engine, so a `Port` only moves bytes.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Asynchronous byte-level port to a rig.
#[async_trait]
pub trait Port: Send + Sync {
    /// Send raw bytes to the rig.
    ///
    /// Implementations should not return until all bytes have been handed
    /// to the underlying device (serial TX buffer, TCP socket, etc.).
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive bytes from the rig into the provided buffer.
    ///
    /// Returns the number of bytes actually read, which may be less than a
    /// full reply. Waits up to `timeout` for data to arrive; returns
    /// [`Error::Timeout`](crate::error::Error::Timeout) if nothing arrives
    /// within the deadline.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Discard any bytes already received but not yet read.
    ///
    /// Called before every command write so that the tail of an earlier,
    /// timed-out exchange cannot be mistaken for the new reply.
    async fn flush_input(&mut self) -> Result<()>;

    /// Close the port.
    ///
    /// After calling `close()`, subsequent `send()` and `receive()` calls
    /// should return [`Error::NotConnected`](crate::error::Error::NotConnected).
    async fn close(&mut self) -> Result<()>;

    /// Check whether the port is currently open.
    fn is_connected(&self) -> bool;
}
