//! Serial [`Port`] for USB virtual COM ports and RS-232 lines.
//!
//! Most CAT rigs present a USB virtual serial port: Kenwood HF rigs at
//! 9600 to 115200 baud, handhelds such as the TH-D74 at 9600. Frames are
//! plain ASCII, so no special line discipline is needed beyond 8N1.
//!
//! # Example
//!
//! ```no_run
//! use rigcat_transport::SerialPort;
//! use rigcat_core::Port;
//! use std::time::Duration;
//!
//! # async fn example() -> rigcat_core::Result<()> {
//! let mut port = SerialPort::open("/dev/ttyUSB0", 115200).await?;
//! port.flush_input().await?;
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
use tokio_serial::{ClearBuffer, SerialPort as _, SerialPortBuilderExt, SerialStream};

/// Serial port configuration.
///
/// Defaults are appropriate for most modern transceivers:
/// - 8 data bits
/// - 1 stop bit
/// - No parity
/// - No flow control
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Baud rate (e.g., 9600, 19200, 38400, 115200)
    pub baud_rate: u32,
    /// Number of data bits (typically 8)
    pub data_bits: DataBits,
    /// Number of stop bits (typically 1)
    pub stop_bits: StopBits,
    /// Parity checking (typically None)
    pub parity: Parity,
    /// Flow control (typically None; some older rigs want RTS/CTS)
    pub flow_control: FlowControl,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            flow_control: FlowControl::None,
        }
    }
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl From<DataBits> for tokio_serial::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => tokio_serial::DataBits::Five,
            DataBits::Six => tokio_serial::DataBits::Six,
            DataBits::Seven => tokio_serial::DataBits::Seven,
            DataBits::Eight => tokio_serial::DataBits::Eight,
        }
    }
}

/// Number of stop bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    Two,
}

impl From<StopBits> for tokio_serial::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => tokio_serial::StopBits::One,
            StopBits::Two => tokio_serial::StopBits::Two,
        }
    }
}

/// Parity checking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl From<Parity> for tokio_serial::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => tokio_serial::Parity::None,
            Parity::Odd => tokio_serial::Parity::Odd,
            Parity::Even => tokio_serial::Parity::Even,
        }
    }
}

/// Flow control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControl {
    None,
    Software,
    Hardware,
}

impl From<FlowControl> for tokio_serial::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => tokio_serial::FlowControl::None,
            FlowControl::Software => tokio_serial::FlowControl::Software,
            FlowControl::Hardware => tokio_serial::FlowControl::Hardware,
        }
    }
}

/// Serial line to a transceiver.
pub struct SerialPort {
    /// `None` after `close()`.
    stream: Option<SerialStream>,
    /// Path for log output.
    path: String,
}

impl SerialPort {
    /// Open `path` at `baud_rate`, 8N1 without flow control.
    pub async fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let config = SerialConfig {
            baud_rate,
            ..Default::default()
        };
        Self::open_with_config(path, config).await
    }

    /// Open a serial port with full line settings.
    ///
    /// ```no_run
    /// # use rigcat_transport::{SerialPort, SerialConfig, FlowControl};
    /// # async fn example() -> rigcat_core::Result<()> {
    /// let config = SerialConfig {
    ///     baud_rate: 9600,
    ///     flow_control: FlowControl::Hardware,
    ///     ..Default::default()
    /// };
    /// let port = SerialPort::open_with_config("/dev/ttyACM0", config).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn open_with_config(path: &str, config: SerialConfig) -> Result<Self> {
        tracing::debug!(
            port = %path,
            baud_rate = config.baud_rate,
            data_bits = ?config.data_bits,
            stop_bits = ?config.stop_bits,
            parity = ?config.parity,
            flow_control = ?config.flow_control,
            "opening serial port"
        );

        let mut stream = tokio_serial::new(path, config.baud_rate)
            .data_bits(config.data_bits.into())
            .stop_bits(config.stop_bits.into())
            .parity(config.parity.into())
            .flow_control(config.flow_control.into())
            .open_native_async()
            .map_err(|e| {
                tracing::error!(port = %path, error = %e, "failed to open serial port");
                Error::Transport(format!("failed to open serial port {path}: {e}"))
            })?;

        // DTR and RTS are often wired to PTT or CW key inputs; an OS that
        // asserts them on open would key the transmitter.
        if let Err(e) = stream.write_data_terminal_ready(false) {
            tracing::warn!(port = %path, error = %e, "failed to de-assert DTR");
        }
        if let Err(e) = stream.write_request_to_send(false) {
            tracing::warn!(port = %path, error = %e, "failed to de-assert RTS");
        }

        tracing::info!(port = %path, baud_rate = config.baud_rate, "serial port open");

        Ok(Self {
            stream: Some(stream),
            path: path.to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

#[async_trait]
impl Port for SerialPort {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;
        tracing::trace!(port = %self.path, data = %data.escape_ascii(), "send");

        stream.write_all(data).await.map_err(|e| {
            tracing::error!(port = %self.path, error = %e, "serial write failed");
            map_io_error(e)
        })?;
        stream.flush().await.map_err(|e| {
            tracing::error!(port = %self.path, error = %e, "serial flush failed");
            map_io_error(e)
        })
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        match tokio::time::timeout(timeout, stream.read(buf)).await {
            Ok(Ok(n)) => {
                tracing::trace!(port = %self.path, data = %buf[..n].escape_ascii(), "receive");
                Ok(n)
            }
            Ok(Err(e)) => {
                tracing::error!(port = %self.path, error = %e, "serial read failed");
                Err(map_io_error(e))
            }
            Err(_) => Err(Error::Timeout),
        }
    }

    async fn flush_input(&mut self) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;
        stream.clear(ClearBuffer::Input).map_err(|e| {
            tracing::warn!(port = %self.path, error = %e, "failed to clear serial input");
            Error::Transport(format!("failed to clear input of {}: {e}", self.path))
        })
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.flush().await {
                tracing::warn!(port = %self.path, error = %e, "flush before close failed");
            }
            tracing::info!(port = %self.path, "serial port closed");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

fn map_io_error(e: std::io::Error) -> Error {
    match e.kind() {
        std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::NotConnected => Error::ConnectionLost,
        _ => Error::Io(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_line_settings_are_8n1() {
        let config = SerialConfig::default();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.data_bits, DataBits::Eight);
        assert_eq!(config.stop_bits, StopBits::One);
        assert_eq!(config.parity, Parity::None);
        assert_eq!(config.flow_control, FlowControl::None);
    }

    #[test]
    fn line_settings_convert() {
        assert_eq!(
            tokio_serial::DataBits::from(DataBits::Seven),
            tokio_serial::DataBits::Seven
        );
        assert_eq!(
            tokio_serial::StopBits::from(StopBits::Two),
            tokio_serial::StopBits::Two
        );
        assert_eq!(tokio_serial::Parity::from(Parity::Even), tokio_serial::Parity::Even);
        assert_eq!(
            tokio_serial::FlowControl::from(FlowControl::Hardware),
            tokio_serial::FlowControl::Hardware
        );
    }

    #[test]
    fn broken_pipe_is_connection_lost() {
        let err = map_io_error(std::io::Error::from(std::io::ErrorKind::BrokenPipe));
        assert!(matches!(err, Error::ConnectionLost));
        let err = map_io_error(std::io::Error::from(std::io::ErrorKind::InvalidData));
        assert!(matches!(err, Error::Io(_)));
    }

    #[tokio::test]
    async fn opening_missing_device_fails() {
        let err = SerialPort::open("/dev/rigcat-does-not-exist", 9600)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::Transport(_)));
    }
}
