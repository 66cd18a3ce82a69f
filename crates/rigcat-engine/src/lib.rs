//! Command transaction engine for terminator-delimited CAT protocols.
//!
//! Kenwood, Elecraft and many Yaesu rigs speak the same text protocol:
//! a command is a short mnemonic plus optional data, every frame ends in a
//! terminator, and a reply echoes the mnemonic of the command it answers.
//! This crate turns "write a command, get a validated reply" into a single
//! call that survives a noisy serial line, a busy device and devices that
//! never answer set commands.
//!
//! # Architecture
//!
//! - [`protocol`] -- frame encoding, scanning and echo checks
//! - [`reader`] -- bounded `read_until` over a [`Port`](rigcat_core::Port)
//! - [`config`] -- per-model [`DeviceConfig`] and [`RetryPolicy`]
//! - [`dialect`] -- [`Dialect`] hooks for per-family quirks
//! - [`transaction`] -- the retrying [`transact`] state machine
//! - [`verified`] -- reply length verification on top of it
//! - [`session`] -- [`Session`], the serialized entry point
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rigcat_engine::{DeviceConfig, GenericDialect, Session};
//!
//! # async fn demo(port: Box<dyn rigcat_core::Port>) -> rigcat_core::Result<()> {
//! let config = Arc::new(DeviceConfig::default().with_expected_length("FA", 13));
//! let session = Session::new(port, config, Arc::new(GenericDialect));
//!
//! let id = session.execute("ID", Some(5)).await?;
//! println!("model {}", id.payload());
//!
//! session.send("FA00014074000").await?;
//! let freq = session.query("FA").await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dialect;
pub mod protocol;
pub mod reader;
pub mod session;
pub mod transaction;
pub mod verified;

pub use config::{DeviceConfig, RetryAction, RetryPolicy};
pub use dialect::{Dialect, GenericDialect, StatusSignal};
pub use reader::{FrameReader, ReadOutcome};
pub use session::{Link, Session, SessionState, TransactionGuard};
pub use transaction::{transact, Reply, RetryReason};
pub use verified::transact_expecting_length;
