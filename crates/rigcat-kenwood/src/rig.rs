//! KenwoodRig -- a Kenwood transceiver driven through a rigcat [`Session`].
//!
//! Opening a rig identifies it, switches off auto-information so that
//! unsolicited frames do not interleave with replies, and seeds the split
//! state from the `IF` status block. Every operation afterwards is one or
//! two engine transactions built from [`commands`].
//!
//! Handheld models share the identification step but none of the HF
//! command set; their HF operations fail with [`Error::Unsupported`].

use std::sync::Arc;

use tracing::{debug, info, warn};

use rigcat_core::calibration::CalibrationTable;
use rigcat_core::error::{Error, Result};
use rigcat_core::port::Port;
use rigcat_core::types::{Mode, Vfo};
use rigcat_engine::{DeviceConfig, Session, SessionState, TransactionGuard};

use crate::commands::{self, IfStatus};
use crate::models::{self, KenwoodModel};

/// Identification assumed for rigs that do not answer `ID` and for
/// TS-2000 emulators.
const TS2000_ID: &str = "019";

/// A connected Kenwood transceiver.
///
/// Constructed with [`KenwoodRig::open`] or through
/// [`KenwoodBuilder`](crate::builder::KenwoodBuilder).
pub struct KenwoodRig {
    session: Session,
    model: KenwoodModel,
    id: String,
    emulation: bool,
    str_cal: CalibrationTable<i32>,
    swr_cal: CalibrationTable<f32>,
}

impl KenwoodRig {
    /// Open `model` on `port` with the model's default configuration.
    pub async fn open(port: Box<dyn Port>, model: KenwoodModel) -> Result<Self> {
        let config = model.device_config();
        Self::open_with_config(port, model, config).await
    }

    /// Open `model` on `port` with an explicit engine configuration.
    ///
    /// # Errors
    ///
    /// Any transaction error from the identification or setup queries, or
    /// [`Error::InvalidArgument`] if the model's calibration tables are
    /// malformed.
    pub async fn open_with_config(
        port: Box<dyn Port>,
        model: KenwoodModel,
        config: DeviceConfig,
    ) -> Result<Self> {
        let str_cal = model.str_table()?;
        let swr_cal = model.swr_table()?;
        let session = Session::new(port, Arc::new(config), Arc::new(model.dialect()));

        let (id, emulation) = {
            let mut guard = session.begin().await;
            let id = identify(&mut guard, &model).await?;
            if model.has_status_block() {
                disable_auto_info(&mut guard).await?;
                refresh_status(&mut guard).await?;
            }
            (id, guard.state().is_emulation)
        };

        info!(model = model.name, id = %id, emulation, "Kenwood rig opened");
        Ok(KenwoodRig {
            session,
            model,
            id,
            emulation,
            str_cal,
            swr_cal,
        })
    }

    /// Restore the auto-information level found at open and close the port.
    ///
    /// A failure to restore is logged; the port is closed regardless.
    pub async fn close(self) -> Result<()> {
        let saved = self.session.state().await.saved_auto_info;
        if let Some(level) = saved.filter(|&l| l != 0) {
            let restored = match commands::set_auto_info(level) {
                Ok(cmd) => self.session.send(&cmd).await,
                Err(e) => Err(e),
            };
            if let Err(e) = restored {
                warn!(level, error = %e, "could not restore auto-information");
            }
        }
        debug!(model = self.model.name, "closing Kenwood rig");
        self.session.close().await
    }

    pub fn model(&self) -> &KenwoodModel {
        &self.model
    }

    /// Identification code the rig reported at open.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The far end announced itself as a TS-2000 emulator.
    pub fn is_emulation(&self) -> bool {
        self.emulation
    }

    /// The underlying session, for commands this type does not wrap.
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub async fn state(&self) -> SessionState {
        self.session.state().await
    }

    fn require_status_block(&self, operation: &str) -> Result<()> {
        if self.model.has_status_block() {
            Ok(())
        } else {
            Err(Error::Unsupported(format!(
                "{operation} on {}",
                self.model.name
            )))
        }
    }

    // -----------------------------------------------------------------
    // Status
    // -----------------------------------------------------------------

    /// Read the `IF` status block. Repeated reads within the status cache
    /// lifetime are served without a transaction.
    pub async fn status(&self) -> Result<IfStatus> {
        self.require_status_block("status")?;
        let mut guard = self.session.begin().await;
        refresh_status(&mut guard).await
    }

    // -----------------------------------------------------------------
    // Frequency and mode
    // -----------------------------------------------------------------

    pub async fn frequency(&self, vfo: Vfo) -> Result<u64> {
        self.require_status_block("frequency")?;
        let reply = self.session.query(commands::read_frequency(vfo)?).await?;
        commands::parse_frequency(reply.payload())
    }

    pub async fn set_frequency(&self, vfo: Vfo, freq_hz: u64) -> Result<()> {
        self.require_status_block("set_frequency")?;
        let cmd = commands::set_frequency(vfo, freq_hz)?;
        debug!(%vfo, freq_hz, "set frequency");
        self.session.send(&cmd).await
    }

    pub async fn mode(&self) -> Result<Mode> {
        self.require_status_block("mode")?;
        let mut guard = self.session.begin().await;
        let reply = guard.query(commands::READ_MODE).await?;
        let mode = commands::parse_mode(reply.payload())?;
        guard.state_mut().mode = Some(mode);
        Ok(mode)
    }

    pub async fn set_mode(&self, mode: Mode) -> Result<()> {
        self.require_status_block("set_mode")?;
        let mut guard = self.session.begin().await;
        guard.send(&commands::set_mode(mode)).await?;
        guard.state_mut().mode = Some(mode);
        Ok(())
    }

    // -----------------------------------------------------------------
    // PTT and split
    // -----------------------------------------------------------------

    /// Whether the rig is transmitting, from the status block.
    pub async fn ptt(&self) -> Result<bool> {
        Ok(self.status().await?.transmitting)
    }

    /// Key (`TX`) or unkey (`RX`) the transmitter. `RX` is written without
    /// verification.
    pub async fn set_ptt(&self, on: bool) -> Result<()> {
        self.require_status_block("set_ptt")?;
        debug!(on, "set PTT");
        self.session.send(commands::set_ptt(on)).await
    }

    pub async fn split(&self) -> Result<bool> {
        Ok(self.status().await?.split)
    }

    /// VFO the rig transmits on.
    pub async fn tx_vfo(&self) -> Result<Vfo> {
        Ok(self.status().await?.tx_vfo())
    }

    /// Turn split on (receive on the other VFO, transmit on `tx_vfo`) or
    /// off (receive and transmit on `tx_vfo`).
    pub async fn set_split(&self, split: bool, tx_vfo: Vfo) -> Result<()> {
        self.require_status_block("set_split")?;
        let rx_vfo = match (split, tx_vfo) {
            (_, Vfo::Memory) => {
                return Err(Error::InvalidArgument(
                    "split needs VFO A or B for transmit".into(),
                ))
            }
            (false, vfo) => vfo,
            (true, Vfo::A) => Vfo::B,
            (true, Vfo::B) => Vfo::A,
        };

        let mut guard = self.session.begin().await;
        guard.send(&commands::set_rx_vfo(rx_vfo)).await?;
        guard.send(&commands::set_tx_vfo(tx_vfo)).await?;
        let state = guard.state_mut();
        state.split = Some(split);
        state.tx_vfo = Some(tx_vfo);
        debug!(split, %rx_vfo, %tx_vfo, "split set");
        Ok(())
    }

    // -----------------------------------------------------------------
    // Meters
    // -----------------------------------------------------------------

    /// Raw S-meter reading of the main receiver.
    pub async fn raw_s_meter(&self) -> Result<i32> {
        self.require_status_block("s_meter")?;
        let reply = self.session.query(commands::READ_S_METER).await?;
        commands::parse_meter(reply.payload())
    }

    /// Signal strength in dB relative to S9.
    pub async fn s_meter(&self) -> Result<i32> {
        if self.str_cal.is_empty() {
            return Err(Error::Unsupported(format!(
                "calibrated S-meter on {}",
                self.model.name
            )));
        }
        let raw = self.raw_s_meter().await?;
        Ok(self.str_cal.value_at(raw))
    }

    /// Raw SWR meter reading.
    pub async fn raw_swr(&self) -> Result<i32> {
        self.require_status_block("swr")?;
        let reply = self.session.query(commands::READ_SWR_METER).await?;
        let payload = reply.payload();
        if !payload.starts_with('1') {
            return Err(Error::ProtocolViolation(format!(
                "expected SWR meter reading, got {:?}",
                reply.body()
            )));
        }
        commands::parse_meter(payload)
    }

    pub async fn swr(&self) -> Result<f32> {
        if self.swr_cal.is_empty() {
            return Err(Error::Unsupported(format!(
                "calibrated SWR meter on {}",
                self.model.name
            )));
        }
        let raw = self.raw_swr().await?;
        Ok(self.swr_cal.value_at(raw))
    }
}

impl std::fmt::Debug for KenwoodRig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KenwoodRig")
            .field("model", &self.model.name)
            .field("id", &self.id)
            .field("emulation", &self.emulation)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Open sequence
// ---------------------------------------------------------------------------

/// Ask the rig who it is.
///
/// A rig that ignores `ID` but answers `FA` is treated as a TS-2000 and
/// verified with `FA` from then on.
async fn identify(guard: &mut TransactionGuard<'_>, model: &KenwoodModel) -> Result<String> {
    let capacity = guard.config().max_body_len();
    let id = match guard.probe(commands::IDENTIFY, capacity).await {
        Ok(reply) if commands::is_emulator_id(reply.body()) => {
            info!(reply = reply.body(), "TS-2000 emulator detected");
            guard.state_mut().is_emulation = true;
            TS2000_ID.to_string()
        }
        Ok(reply) => reply.payload().trim().to_string(),
        Err(Error::Timeout) => {
            debug!("no answer to ID, trying FA");
            guard.query("FA").await?;
            let verify = format!("FA{}", char::from(guard.config().terminator));
            guard.state_mut().verify_command = verify;
            info!("rig answers FA but not ID, assuming TS-2000");
            TS2000_ID.to_string()
        }
        Err(e) => return Err(e),
    };

    if id != model.id_code {
        let detected = models::model_for_id(&id).map_or("unknown", |m| m.name);
        warn!(
            expected = model.id_code,
            id = %id,
            detected,
            "rig identifies as a different model"
        );
    }
    Ok(id)
}

/// Save the auto-information level and switch it off.
async fn disable_auto_info(guard: &mut TransactionGuard<'_>) -> Result<()> {
    let level = match guard.query(commands::READ_AUTO_INFO).await {
        Ok(reply) => commands::parse_auto_info(reply.payload())?,
        Err(Error::Rejected(reason)) => {
            warn!(%reason, "rig does not report auto-information");
            return Ok(());
        }
        Err(e) => return Err(e),
    };
    guard.state_mut().saved_auto_info = Some(level);
    if level != 0 {
        debug!(level, "turning auto-information off");
        guard.send(&commands::set_auto_info(0)?).await?;
    }
    Ok(())
}

/// Read the `IF` block and record split, TX VFO and mode.
async fn refresh_status(guard: &mut TransactionGuard<'_>) -> Result<IfStatus> {
    let reply = guard.query(commands::READ_STATUS).await?;
    let status = IfStatus::parse(reply.body())?;
    let state = guard.state_mut();
    state.split = Some(status.split);
    state.tx_vfo = Some(status.tx_vfo());
    if status.mode.is_some() {
        state.mode = status.mode;
    }
    Ok(status)
}
