//! Interpreted rig state shared by dialect modules.
//!
//! Dialects reduce raw status strings into these values; the engine itself
//! never looks inside a reply body.

use std::fmt;

/// Which VFO (or memory) a receiver or transmitter is operating from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vfo {
    A,
    B,
    Memory,
}

impl fmt::Display for Vfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Vfo::A => "VFO-A",
            Vfo::B => "VFO-B",
            Vfo::Memory => "MEM",
        };
        write!(f, "{s}")
    }
}

/// Operating mode of the transceiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Upper sideband voice.
    USB,
    /// Lower sideband voice.
    LSB,
    /// CW (morse), upper sideband offset.
    CW,
    /// CW reverse (lower sideband offset).
    CWR,
    /// Amplitude modulation.
    AM,
    /// Frequency modulation.
    FM,
    /// Radio teletype (FSK).
    RTTY,
    /// Radio teletype, reverse shift.
    RTTYR,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Mode::USB => "USB",
            Mode::LSB => "LSB",
            Mode::CW => "CW",
            Mode::CWR => "CWR",
            Mode::AM => "AM",
            Mode::FM => "FM",
            Mode::RTTY => "RTTY",
            Mode::RTTYR => "RTTYR",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_display() {
        assert_eq!(Mode::CWR.to_string(), "CWR");
        assert_eq!(Mode::RTTYR.to_string(), "RTTYR");
    }

    #[test]
    fn vfo_display() {
        assert_eq!(Vfo::A.to_string(), "VFO-A");
        assert_eq!(Vfo::Memory.to_string(), "MEM");
    }
}
