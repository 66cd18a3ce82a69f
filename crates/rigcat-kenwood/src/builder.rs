//! KenwoodBuilder -- fluent builder for opening [`KenwoodRig`] instances.
//!
//! Separates configuration from construction so that callers can set up
//! serial port parameters, attempt budgets and timeouts before the port is
//! opened and the rig identified.
//!
//! # Example
//!
//! ```no_run
//! use rigcat_kenwood::builder::KenwoodBuilder;
//! use rigcat_kenwood::models::ts_590s;
//! use std::time::Duration;
//!
//! # async fn example() -> rigcat_core::Result<()> {
//! let rig = KenwoodBuilder::new(ts_590s())
//!     .serial_port("/dev/ttyUSB0")
//!     .baud_rate(57_600)
//!     .read_timeout(Duration::from_millis(300))
//!     .build()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use rigcat_core::error::{Error, Result};
use rigcat_core::port::Port;
use rigcat_engine::DeviceConfig;
use rigcat_transport::{SerialPort, TcpPort};

use crate::models::KenwoodModel;
use crate::rig::KenwoodRig;

/// Fluent builder for [`KenwoodRig`].
///
/// Everything not set explicitly comes from the [`KenwoodModel`]:
///
/// ```ignore
/// let rig = KenwoodBuilder::new(ts_2000())
///     .serial_port("/dev/ttyUSB0")
///     .build()
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct KenwoodBuilder {
    model: KenwoodModel,
    serial_port: Option<String>,
    baud_rate: Option<u32>,
    max_attempts: Option<u32>,
    read_timeout: Option<Duration>,
    post_write_delay: Option<Duration>,
}

impl KenwoodBuilder {
    pub fn new(model: KenwoodModel) -> Self {
        KenwoodBuilder {
            model,
            serial_port: None,
            baud_rate: None,
            max_attempts: None,
            read_timeout: None,
            post_write_delay: None,
        }
    }

    /// Set the serial port path (e.g. `/dev/ttyUSB0` or `COM3`).
    pub fn serial_port(mut self, port: &str) -> Self {
        self.serial_port = Some(port.to_string());
        self
    }

    /// Override the model's default baud rate.
    pub fn baud_rate(mut self, baud: u32) -> Self {
        self.baud_rate = Some(baud);
        self
    }

    /// Total attempts per transaction, first one included (default: 4).
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = Some(n);
        self
    }

    /// How long one read waits for a complete reply (default: 500ms).
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Pause after every write, for rigs that drop characters sent too
    /// quickly. Skipped for emulators.
    pub fn post_write_delay(mut self, delay: Duration) -> Self {
        self.post_write_delay = Some(delay);
        self
    }

    /// The engine configuration the rig will be opened with.
    pub fn device_config(&self) -> DeviceConfig {
        let mut config = self.model.device_config();
        if let Some(n) = self.max_attempts {
            config = config.with_max_attempts(n);
        }
        if let Some(timeout) = self.read_timeout {
            config = config.with_read_timeout(timeout);
        }
        if let Some(delay) = self.post_write_delay {
            config = config.with_post_write_delay(delay);
        }
        config
    }

    /// Open the rig on a caller-provided port.
    ///
    /// This is the entry point for tests (pass a `MockPort` from
    /// `rigcat-test-harness`) and for callers that manage the port
    /// themselves.
    pub async fn build_with_port(self, port: Box<dyn Port>) -> Result<KenwoodRig> {
        if self.max_attempts == Some(0) {
            return Err(Error::InvalidArgument(
                "max_attempts must be at least 1".into(),
            ));
        }
        let config = self.device_config();
        KenwoodRig::open_with_config(port, self.model, config).await
    }

    /// Open the rig on a serial port.
    ///
    /// Requires [`serial_port()`](Self::serial_port). The baud rate
    /// defaults to the model's.
    pub async fn build(self) -> Result<KenwoodRig> {
        let path = self.serial_port.as_deref().ok_or_else(|| {
            Error::InvalidArgument("serial_port is required for build()".into())
        })?;
        let baud = self.baud_rate.unwrap_or(self.model.default_baud_rate);

        let port = SerialPort::open(path, baud).await?;
        self.build_with_port(Box::new(port)).await
    }

    /// Open the rig through a TCP serial server or a networked rig at
    /// `addr` (`host:port`).
    pub async fn build_tcp(self, addr: &str) -> Result<KenwoodRig> {
        let port = TcpPort::connect(addr).await?;
        self.build_with_port(Box::new(port)).await
    }
}
