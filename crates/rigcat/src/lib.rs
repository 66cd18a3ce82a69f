//! # rigcat -- CAT command transactions for amateur radio transceivers
//!
//! `rigcat` talks to transceivers whose CAT protocol is short ASCII
//! commands ending in a terminator (`;` or CR): Kenwood, and the many rigs
//! and SDR programs that emulate one. Every exchange is a transaction:
//! write the command, read a validated reply or confirm a set command with
//! a verification query, and retry through line noise and busy replies.
//!
//! ## Quick Start
//!
//! ```no_run
//! use rigcat::Vfo;
//! use rigcat::kenwood::{KenwoodBuilder, models::ts_590s};
//!
//! # async fn example() -> rigcat::Result<()> {
//! let rig = KenwoodBuilder::new(ts_590s())
//!     .serial_port("/dev/ttyUSB0")
//!     .build()
//!     .await?;
//!
//! rig.set_frequency(Vfo::A, 14_074_000).await?;
//! println!("S-meter: {} dB over S9", rig.s_meter().await?);
//! rig.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! | Crate                 | Purpose                                          |
//! |-----------------------|--------------------------------------------------|
//! | `rigcat-core`         | [`Port`] trait, [`Error`], meter calibration     |
//! | `rigcat-engine`       | Framing, retrying transactions, sessions         |
//! | `rigcat-transport`    | Serial and TCP ports                             |
//! | `rigcat-kenwood`      | Kenwood dialect, models and rig driver           |
//! | **`rigcat`**          | This facade crate -- re-exports everything       |
//!
//! ## Feature Flags
//!
//! | Feature    | Enables                              | Default |
//! |------------|--------------------------------------|---------|
//! | `kenwood`  | [`kenwood`] module (Kenwood CAT)     | yes     |

pub use rigcat_core::*;

/// The transaction engine: [`Session`](engine::Session),
/// [`DeviceConfig`](engine::DeviceConfig) and the [`Dialect`](engine::Dialect)
/// hooks, for driving a terminator-delimited device without a dialect crate.
pub mod engine {
    pub use rigcat_engine::*;
}

/// Serial and TCP [`Port`](crate::Port) implementations.
pub mod transport {
    pub use rigcat_transport::*;
}

/// Kenwood CAT dialect.
///
/// Provides [`KenwoodRig`](kenwood::KenwoodRig) and
/// [`KenwoodBuilder`](kenwood::KenwoodBuilder).
#[cfg(feature = "kenwood")]
pub mod kenwood {
    pub use rigcat_kenwood::*;
}

/// A rig model some enabled dialect supports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RigDefinition {
    pub manufacturer: &'static str,
    pub model_name: &'static str,
    /// Payload of the rig's identification reply.
    pub id_code: &'static str,
    pub default_baud_rate: u32,
}

/// All rig models supported by the enabled dialect features, e.g. for a
/// model picker.
///
/// ```
/// for rig in rigcat::supported_rigs() {
///     println!("{} {} (ID {})", rig.manufacturer, rig.model_name, rig.id_code);
/// }
/// ```
pub fn supported_rigs() -> Vec<RigDefinition> {
    #[allow(unused_mut)]
    let mut rigs = Vec::new();

    #[cfg(feature = "kenwood")]
    {
        rigs.extend(
            kenwood::models::all_kenwood_models()
                .iter()
                .map(|m| RigDefinition {
                    manufacturer: "Kenwood",
                    model_name: m.name,
                    id_code: m.id_code,
                    default_baud_rate: m.default_baud_rate,
                }),
        );
    }

    rigs
}
