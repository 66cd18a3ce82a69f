//! Kenwood CAT dialect for rigcat.
//!
//! Kenwood rigs speak the terminator-delimited text protocol the
//! `rigcat-engine` transaction engine handles; this crate supplies what is
//! specific to them:
//!
//! - **Dialect** ([`dialect`]) -- the engine hooks for Kenwood quirks:
//!   `RX` is never verified, `IF` answers to `TX`/`RX` are accepted,
//!   state-changing commands drop the cached status block.
//! - **Command builders** ([`commands`]) -- frequency, mode, PTT, split,
//!   auto-information and meter commands, their parsers, and the `IF`
//!   status block decoder.
//! - **Model definitions** ([`models`]) -- TS-590S, TS-590SG, TS-890S,
//!   TS-2000 and the TH-D74 handheld, with meter calibration.
//! - **Rig driver** ([`rig`]) -- [`KenwoodRig`], opened over any
//!   [`Port`](rigcat_core::Port).
//! - **Builder** ([`builder`]) -- [`KenwoodBuilder`] for serial or TCP
//!   connections with per-rig timeouts.
//!
//! # Example
//!
//! ```
//! use rigcat_core::Vfo;
//! use rigcat_kenwood::commands::{self, IfStatus};
//!
//! assert_eq!(commands::set_frequency(Vfo::A, 14_250_000).unwrap(), "FA00014250000");
//!
//! let status = IfStatus::parse("IF00014250000     +000000000020010000").unwrap();
//! assert_eq!(status.frequency_hz, 14_250_000);
//! assert!(status.split);
//! assert_eq!(status.tx_vfo(), Vfo::B);
//! ```

pub mod builder;
pub mod commands;
pub mod dialect;
pub mod models;
pub mod rig;

pub use builder::KenwoodBuilder;
pub use commands::IfStatus;
pub use dialect::KenwoodDialect;
pub use models::KenwoodModel;
pub use rig::KenwoodRig;
