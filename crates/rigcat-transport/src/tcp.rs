//! TCP [`Port`] for networked rigs and serial-to-network bridges.
//!
//! Several Kenwood-family rigs expose their CAT stream on a TCP socket
//! (TS-890S LAN, Elecraft K4), and serial device servers do the same for
//! older radios. The byte stream is identical to the serial one.
//!
//! # Example
//!
//! ```no_run
//! use rigcat_transport::TcpPort;
//! use rigcat_core::Port;
//! use std::time::Duration;
//!
//! # async fn example() -> rigcat_core::Result<()> {
//! let mut port = TcpPort::connect("192.168.1.50:4532").await?;
//! port.send(b"ID;").await?;
//!
//! let mut buf = [0u8; 64];
//! let n = port.receive(&mut buf, Duration::from_millis(500)).await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use rigcat_core::error::{Error, Result};
use rigcat_core::port::Port;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// TCP connection to a transceiver or serial bridge.
#[derive(Debug)]
pub struct TcpPort {
    /// The underlying TCP stream, `None` after `close()` is called.
    stream: Option<TcpStream>,
    /// The address string for logging/debugging.
    addr: String,
}

impl TcpPort {
    /// Connect to a `host:port` endpoint using the default timeout.
    pub async fn connect(addr: &str) -> Result<Self> {
        Self::connect_with_timeout(addr, DEFAULT_CONNECT_TIMEOUT).await
    }

    /// Connect, giving up after `timeout`.
    pub async fn connect_with_timeout(addr: &str, timeout: Duration) -> Result<Self> {
        tracing::debug!(
            addr = %addr,
            timeout_ms = timeout.as_millis(),
            "connecting"
        );

        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                tracing::error!(addr = %addr, "TCP connection timed out");
                Error::Timeout
            })?
            .map_err(|e| {
                tracing::error!(addr = %addr, error = %e, "TCP connection failed");
                map_connect_error(e, addr)
            })?;

        // CAT frames are a few bytes; Nagle would hold them back.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::warn!(
                addr = %addr,
                error = %e,
                "failed to set TCP_NODELAY"
            );
        }

        tracing::info!(addr = %addr, "TCP port connected");

        Ok(Self {
            stream: Some(stream),
            addr: addr.to_string(),
        })
    }

    /// Wrap an already-connected stream; `addr` labels log output.
    pub fn from_stream(stream: TcpStream, addr: String) -> Self {
        Self {
            stream: Some(stream),
            addr,
        }
    }

    /// Address this port was connected to.
    pub fn addr(&self) -> &str {
        &self.addr
    }
}

#[async_trait]
impl Port for TcpPort {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;
        tracing::trace!(addr = %self.addr, data = %data.escape_ascii(), "send");

        stream.write_all(data).await.map_err(|e| {
            tracing::error!(addr = %self.addr, error = %e, "TCP write failed");
            map_io_error(e)
        })?;
        stream.flush().await.map_err(map_io_error)
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        match tokio::time::timeout(timeout, stream.read(buf)).await {
            Ok(Ok(0)) => {
                tracing::warn!(addr = %self.addr, "peer closed connection");
                Err(Error::ConnectionLost)
            }
            Ok(Ok(n)) => {
                tracing::trace!(addr = %self.addr, data = %buf[..n].escape_ascii(), "receive");
                Ok(n)
            }
            Ok(Err(e)) => {
                tracing::error!(addr = %self.addr, error = %e, "TCP read failed");
                Err(map_io_error(e))
            }
            Err(_) => Err(Error::Timeout),
        }
    }

    /// Drop bytes that have already arrived, without waiting for more.
    async fn flush_input(&mut self) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;
        let mut scratch = [0u8; 256];
        let mut dropped = 0usize;
        loop {
            match stream.try_read(&mut scratch) {
                Ok(0) => return Err(Error::ConnectionLost),
                Ok(n) => dropped += n,
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(map_io_error(e)),
            }
        }
        if dropped > 0 {
            tracing::debug!(addr = %self.addr, dropped, "discarded stale input");
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                tracing::warn!(addr = %self.addr, error = %e, "TCP shutdown failed");
            }
            tracing::info!(addr = %self.addr, "TCP port closed");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

/// Map a connection-time I/O error to the appropriate [`Error`] variant.
fn map_connect_error(e: std::io::Error, addr: &str) -> Error {
    match e.kind() {
        std::io::ErrorKind::ConnectionRefused => {
            Error::Transport(format!("connection refused: {}", addr))
        }
        _ => Error::Io(e),
    }
}

/// Map a data-path I/O error to the appropriate [`Error`] variant.
fn map_io_error(e: std::io::Error) -> Error {
    match e.kind() {
        std::io::ErrorKind::ConnectionReset
        | std::io::ErrorKind::BrokenPipe
        | std::io::ErrorKind::NotConnected
        | std::io::ErrorKind::ConnectionAborted => Error::ConnectionLost,
        _ => Error::Io(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn listener() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        (listener, addr)
    }

    #[tokio::test]
    async fn identification_round_trip() {
        let (listener, addr) = listener().await;
        let rig = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 16];
            let n = stream.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], b"ID;");
            stream.write_all(b"ID019;").await.unwrap();
        });

        let mut port = TcpPort::connect(&addr).await.unwrap();
        assert!(port.is_connected());
        assert_eq!(port.addr(), addr);
        port.send(b"ID;").await.unwrap();

        let mut buf = [0u8; 16];
        let n = port.receive(&mut buf, Duration::from_secs(2)).await.unwrap();
        assert_eq!(&buf[..n], b"ID019;");

        port.close().await.unwrap();
        rig.await.unwrap();
    }

    #[tokio::test]
    async fn flush_input_discards_stale_bytes() {
        let (listener, addr) = listener().await;
        let rig = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(b"FA00007000000;").await.unwrap();
            let mut buf = [0u8; 16];
            let n = stream.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], b"ID;");
            stream.write_all(b"ID019;").await.unwrap();
        });

        let mut port = TcpPort::connect(&addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        port.flush_input().await.unwrap();
        port.send(b"ID;").await.unwrap();

        let mut buf = [0u8; 16];
        let n = port.receive(&mut buf, Duration::from_secs(2)).await.unwrap();
        assert_eq!(&buf[..n], b"ID019;");
        rig.await.unwrap();
    }

    #[tokio::test]
    async fn flush_input_on_quiet_line_returns_at_once() {
        let (listener, addr) = listener().await;
        let rig = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let mut port = TcpPort::connect(&addr).await.unwrap();
        port.flush_input().await.unwrap();
        rig.abort();
    }

    #[tokio::test]
    async fn silent_peer_times_out() {
        let (listener, addr) = listener().await;
        let rig = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let mut port = TcpPort::connect(&addr).await.unwrap();
        let mut buf = [0u8; 16];
        let result = port.receive(&mut buf, Duration::from_millis(100)).await;
        assert!(matches!(result, Err(Error::Timeout)));
        rig.abort();
    }

    #[tokio::test]
    async fn peer_hangup_is_connection_lost() {
        let (listener, addr) = listener().await;
        let rig = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let mut port = TcpPort::connect(&addr).await.unwrap();
        rig.await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut buf = [0u8; 16];
        let result = port.receive(&mut buf, Duration::from_secs(2)).await;
        assert!(matches!(result, Err(Error::ConnectionLost)), "{result:?}");
    }

    #[tokio::test]
    async fn refused_connection_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = TcpPort::connect(&addr).await.unwrap_err();
        assert!(matches!(err, Error::Transport(ref msg) if msg.contains("refused")));
    }

    #[tokio::test]
    async fn closed_port_is_not_connected() {
        let (listener, addr) = listener().await;
        let rig = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let mut port = TcpPort::connect(&addr).await.unwrap();
        port.close().await.unwrap();
        port.close().await.unwrap();
        assert!(!port.is_connected());

        assert!(matches!(port.send(b"ID;").await, Err(Error::NotConnected)));
        assert!(matches!(port.flush_input().await, Err(Error::NotConnected)));
        let mut buf = [0u8; 16];
        assert!(matches!(
            port.receive(&mut buf, Duration::from_millis(10)).await,
            Err(Error::NotConnected)
        ));
        rig.abort();
    }

    #[tokio::test]
    async fn wraps_existing_stream() {
        let (listener, addr) = listener().await;
        let rig = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(b"AI0;").await.unwrap();
        });

        let raw = TcpStream::connect(&addr).await.unwrap();
        let mut port = TcpPort::from_stream(raw, addr.clone());
        let mut buf = [0u8; 16];
        let n = port.receive(&mut buf, Duration::from_secs(2)).await.unwrap();
        assert_eq!(&buf[..n], b"AI0;");
        rig.await.unwrap();
    }
}
