//! [`Port`](rigcat_core::Port) implementations for real hardware.
//!
//! - [`SerialPort`]: USB virtual COM ports and RS-232 lines
//! - [`TcpPort`]: networked rigs and serial device servers
//!
//! Both ports only move bytes. Framing, retries and reply validation live
//! in `rigcat-engine`.

pub mod serial;
pub mod tcp;

pub use serial::{DataBits, FlowControl, Parity, SerialConfig, SerialPort, StopBits};
pub use tcp::TcpPort;
