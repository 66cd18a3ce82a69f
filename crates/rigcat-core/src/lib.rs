//! rigcat-core: Port trait, error type, and meter calibration for rigcat.
//!
//! This crate holds the pieces every other rigcat crate agrees on. The
//! transaction engine consumes a [`Port`], dialect modules interpret replies
//! into [`types`], and raw meter readings pass through a
//! [`CalibrationTable`].
//!
//! # Key types
//!
//! - [`Port`] -- byte-level communication channel
//! - [`CalibrationTable`] -- piecewise-linear meter calibration
//! - [`Error`] / [`Result`] -- error handling

pub mod calibration;
pub mod error;
pub mod port;
pub mod types;

pub use calibration::{CalPoint, CalibrationTable, MAX_CAL_POINTS};
pub use error::{Error, Result};
pub use port::Port;
pub use types::{Mode, Vfo};
