//! Kenwood model definitions.
//!
//! Each supported rig is described by a [`KenwoodModel`]: its identification
//! code, serial defaults, which command family it speaks and its meter
//! calibration. [`KenwoodModel::device_config`] turns a model into the
//! immutable [`DeviceConfig`] the transaction engine runs with.
//!
//! | Model    | ID     | Baud    | Terminator | Family   |
//! |----------|--------|---------|------------|----------|
//! | TS-590S  | `021`  | 115200  | `;`        | HF       |
//! | TS-590SG | `023`  | 115200  | `;`        | HF       |
//! | TS-890S  | `024`  | 115200  | `;`        | HF       |
//! | TS-2000  | `019`  | 57600   | `;`        | HF       |
//! | TH-D74   | `TH-D74` | 9600  | CR         | Handheld |

use std::time::Duration;

use rigcat_core::calibration::CalibrationTable;
use rigcat_core::error::Result;
use rigcat_engine::protocol::{CARRIAGE_RETURN, SEMICOLON};
use rigcat_engine::DeviceConfig;

use crate::dialect::KenwoodDialect;

/// Command family a model speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    /// `;`-terminated HF command set with the 37-character `IF` block.
    Hf,
    /// CR-terminated handheld command set; no `IF` block, free-length replies.
    Handheld,
}

/// Static model definition for a Kenwood transceiver.
#[derive(Debug, Clone)]
pub struct KenwoodModel {
    /// Human-readable model name (e.g. "TS-590S").
    pub name: &'static str,
    /// Payload of the rig's reply to `ID`.
    pub id_code: &'static str,
    /// Factory CAT baud rate.
    pub default_baud_rate: u32,
    pub family: Family,
    /// Pause the rig needs after each command.
    pub post_write_delay: Duration,
    /// S-meter reading to dB relative to S9, as `(raw, value)` points.
    pub str_cal: &'static [(i32, i32)],
    /// SWR meter reading to SWR.
    pub swr_cal: &'static [(i32, f32)],
}

/// Length of the `IF` status body, mnemonic included.
pub const IF_LEN: usize = 37;

impl KenwoodModel {
    pub fn terminator(&self) -> u8 {
        match self.family {
            Family::Hf => SEMICOLON,
            Family::Handheld => CARRIAGE_RETURN,
        }
    }

    pub fn has_status_block(&self) -> bool {
        self.family == Family::Hf
    }

    pub fn dialect(&self) -> KenwoodDialect {
        match self.family {
            Family::Hf => KenwoodDialect::hf(),
            Family::Handheld => KenwoodDialect::handheld(),
        }
    }

    pub fn str_table(&self) -> Result<CalibrationTable<i32>> {
        CalibrationTable::from_pairs(self.str_cal)
    }

    pub fn swr_table(&self) -> Result<CalibrationTable<f32>> {
        CalibrationTable::from_pairs(self.swr_cal)
    }

    /// Engine configuration for this model.
    pub fn device_config(&self) -> DeviceConfig {
        let config =
            DeviceConfig::new(self.terminator()).with_post_write_delay(self.post_write_delay);
        match self.family {
            Family::Hf => config
                .with_expected_length("IF", IF_LEN)
                .with_expected_length("FA", 13)
                .with_expected_length("FB", 13)
                .with_expected_length("MD", 3)
                .with_expected_length("AI", 3)
                .with_expected_length("FR", 3)
                .with_expected_length("FT", 3)
                .with_expected_length("SM0", 7)
                .with_expected_length("RM", 7)
                .with_status_cache("IF", Duration::from_millis(500)),
            Family::Handheld => config,
        }
    }
}

const TS590_STR_CAL: &[(i32, i32)] = &[
    (0, -60),
    (3, -48),
    (6, -36),
    (9, -24),
    (12, -12),
    (15, 0),
    (20, 20),
    (25, 40),
    (30, 60),
];

const TS2000_STR_CAL: &[(i32, i32)] = &[
    (0, -54),
    (3, -48),
    (6, -36),
    (9, -24),
    (12, -12),
    (15, 0),
    (20, 20),
    (25, 40),
    (30, 60),
];

const TS590_SWR_CAL: &[(i32, f32)] = &[(0, 1.0), (6, 1.5), (12, 2.0), (18, 3.0), (30, 10.0)];

/// TS-590S, Kenwood's 2010 HF+6m transceiver.
pub fn ts_590s() -> KenwoodModel {
    KenwoodModel {
        name: "TS-590S",
        id_code: "021",
        default_baud_rate: 115_200,
        family: Family::Hf,
        post_write_delay: Duration::ZERO,
        str_cal: TS590_STR_CAL,
        swr_cal: TS590_SWR_CAL,
    }
}

/// TS-590SG, the 2014 refresh of the TS-590S with the same command set.
pub fn ts_590sg() -> KenwoodModel {
    KenwoodModel {
        name: "TS-590SG",
        id_code: "023",
        ..ts_590s()
    }
}

/// TS-890S. Its meters are not calibrated here; only raw readings are
/// available.
pub fn ts_890s() -> KenwoodModel {
    KenwoodModel {
        name: "TS-890S",
        id_code: "024",
        default_baud_rate: 115_200,
        family: Family::Hf,
        post_write_delay: Duration::ZERO,
        str_cal: &[],
        swr_cal: &[],
    }
}

/// TS-2000. Emulators (PowerSDR, SmartSDR, DDUtil) also identify as one.
pub fn ts_2000() -> KenwoodModel {
    KenwoodModel {
        name: "TS-2000",
        id_code: "019",
        default_baud_rate: 57_600,
        family: Family::Hf,
        post_write_delay: Duration::ZERO,
        str_cal: TS2000_STR_CAL,
        swr_cal: &[],
    }
}

/// TH-D74 handheld, CR-terminated.
pub fn th_d74() -> KenwoodModel {
    KenwoodModel {
        name: "TH-D74",
        id_code: "TH-D74",
        default_baud_rate: 9_600,
        family: Family::Handheld,
        post_write_delay: Duration::ZERO,
        str_cal: &[],
        swr_cal: &[],
    }
}

pub fn all_kenwood_models() -> Vec<KenwoodModel> {
    vec![ts_590s(), ts_590sg(), ts_890s(), ts_2000(), th_d74()]
}

/// The model answering `ID` with `id_code`, if known.
pub fn model_for_id(id_code: &str) -> Option<KenwoodModel> {
    all_kenwood_models()
        .into_iter()
        .find(|m| m.id_code == id_code)
}
