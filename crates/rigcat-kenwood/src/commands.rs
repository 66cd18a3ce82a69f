//! Kenwood CAT command builders and response parsers.
//!
//! Builders return the command text without its terminator; the
//! transaction engine frames it with the model's terminator. Parsers take
//! the reply payload (the body after the two-letter mnemonic) unless noted
//! otherwise.
//!
//! All functions are pure. Frequencies are 11 ASCII digits in hertz,
//! zero-padded on the left; mode codes are single digits.

use rigcat_core::{Error, Mode, Result, Vfo};

use crate::models::IF_LEN;

/// Largest frequency the 11-digit field can carry.
pub const MAX_FREQUENCY_HZ: u64 = 99_999_999_999;

// ---------------------------------------------------------------
// Mnemonics
// ---------------------------------------------------------------

pub const IDENTIFY: &str = "ID";
pub const READ_STATUS: &str = "IF";
pub const READ_MODE: &str = "MD";
pub const READ_AUTO_INFO: &str = "AI";
pub const READ_S_METER: &str = "SM0";
/// Read the SWR meter. The rig answers with one frame per meter.
pub const READ_SWR_METER: &str = "RM";

// ---------------------------------------------------------------
// Command builders
// ---------------------------------------------------------------

/// `FA` or `FB` for reading a VFO frequency.
pub fn read_frequency(vfo: Vfo) -> Result<&'static str> {
    match vfo {
        Vfo::A => Ok("FA"),
        Vfo::B => Ok("FB"),
        Vfo::Memory => Err(Error::InvalidArgument(
            "memory channels have no frequency register".into(),
        )),
    }
}

/// `FA{freq:011}` or `FB{freq:011}`.
pub fn set_frequency(vfo: Vfo, freq_hz: u64) -> Result<String> {
    if freq_hz > MAX_FREQUENCY_HZ {
        return Err(Error::InvalidArgument(format!(
            "frequency {freq_hz} Hz does not fit in 11 digits"
        )));
    }
    Ok(format!("{}{freq_hz:011}", read_frequency(vfo)?))
}

/// `MD{code}`.
pub fn set_mode(mode: Mode) -> String {
    format!("MD{}", mode_to_kenwood(mode))
}

/// `TX` keys the transmitter, `RX` returns to receive.
pub fn set_ptt(on: bool) -> &'static str {
    if on {
        "TX"
    } else {
        "RX"
    }
}

/// `AI{level}`; 0 turns auto-information off.
pub fn set_auto_info(level: u8) -> Result<String> {
    if level > 9 {
        return Err(Error::InvalidArgument(format!(
            "auto-information level {level} is not a single digit"
        )));
    }
    Ok(format!("AI{level}"))
}

/// `FR{vfo}`: the VFO the rig receives on.
pub fn set_rx_vfo(vfo: Vfo) -> String {
    format!("FR{}", vfo_to_kenwood(vfo))
}

/// `FT{vfo}`: the VFO the rig transmits on.
pub fn set_tx_vfo(vfo: Vfo) -> String {
    format!("FT{}", vfo_to_kenwood(vfo))
}

// ---------------------------------------------------------------
// Response parsers
// ---------------------------------------------------------------

/// Parse the 11-digit payload of an `FA`/`FB` reply.
pub fn parse_frequency(data: &str) -> Result<u64> {
    if data.len() != 11 {
        return Err(Error::ProtocolViolation(format!(
            "expected 11 digits for frequency, got {} characters: {data:?}",
            data.len()
        )));
    }
    parse_digits(data, "frequency")
}

/// Parse the payload of an `MD` reply.
pub fn parse_mode(data: &str) -> Result<Mode> {
    kenwood_to_mode(data)
}

/// Parse the payload of an `AI` reply.
pub fn parse_auto_info(data: &str) -> Result<u8> {
    if data.len() != 1 {
        return Err(Error::ProtocolViolation(format!(
            "expected one digit for auto-information, got {data:?}"
        )));
    }
    parse_digits(data, "auto-information level")
}

/// Parse an `SM` or `RM` payload: a selector digit followed by four digits.
pub fn parse_meter(data: &str) -> Result<i32> {
    if data.len() != 5 {
        return Err(Error::ProtocolViolation(format!(
            "expected 5 characters for meter (selector + 4 digits), got {} characters: {data:?}",
            data.len()
        )));
    }
    // Skip the selector digit.
    parse_digits(&data[1..], "meter reading")
}

/// Translate an `FR`/`FT`/`IF` VFO digit.
pub fn parse_vfo(code: u8) -> Result<Vfo> {
    match code {
        b'0' => Ok(Vfo::A),
        b'1' => Ok(Vfo::B),
        b'2' => Ok(Vfo::Memory),
        _ => Err(Error::ProtocolViolation(format!(
            "unknown Kenwood VFO code: {:?}",
            char::from(code)
        ))),
    }
}

/// Identification codes announced by software emulating a TS-2000.
pub fn is_emulator_id(body: &str) -> bool {
    matches!(
        body,
        "ID900" | "ID904" | "ID905" | "ID906" | "ID907" | "ID908" | "ID909" | "IDID900"
    )
}

fn parse_digits<T: std::str::FromStr>(data: &str, what: &str) -> Result<T> {
    if !data.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::ProtocolViolation(format!(
            "invalid {what} digits: {data:?}"
        )));
    }
    data.parse()
        .map_err(|_| Error::ProtocolViolation(format!("invalid {what} digits: {data:?}")))
}

// ---------------------------------------------------------------
// IF status block
// ---------------------------------------------------------------

/// Decoded `IF` status block.
///
/// Offsets index the full reply body, `IF` included:
///
/// | Field            | Offset   |
/// |------------------|----------|
/// | frequency        | 2..13    |
/// | RIT/XIT offset   | 18..23   |
/// | RIT on           | 23       |
/// | XIT on           | 24       |
/// | memory channel   | 26..28   |
/// | transmitting     | 28       |
/// | mode             | 29       |
/// | function (VFO)   | 30       |
/// | scan             | 31       |
/// | split            | 32       |
/// | tone             | 33       |
/// | tone number      | 34..36   |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfStatus {
    pub frequency_hz: u64,
    pub rit_offset_hz: i32,
    pub rit: bool,
    pub xit: bool,
    pub memory_channel: u8,
    pub transmitting: bool,
    /// `None` for mode codes this crate does not model.
    pub mode: Option<Mode>,
    /// VFO (or memory) the rig is operating from.
    pub function: Vfo,
    pub scan: bool,
    pub split: bool,
    pub tone: u8,
    pub tone_number: u8,
}

impl IfStatus {
    /// Parse a full `IF` reply body.
    ///
    /// # Errors
    ///
    /// [`Error::ProtocolViolation`] if the body is shorter than the block
    /// or a field does not hold the digits it should.
    pub fn parse(body: &str) -> Result<Self> {
        if !body.starts_with(READ_STATUS) {
            return Err(Error::ProtocolViolation(format!(
                "not an IF status block: {body:?}"
            )));
        }
        if body.len() < IF_LEN {
            return Err(Error::ProtocolViolation(format!(
                "IF status block too short: {} of {IF_LEN} characters",
                body.len()
            )));
        }

        let flag = |at: usize| -> Result<bool> {
            match byte(body, at)? {
                b'0' => Ok(false),
                b'1' => Ok(true),
                other => Err(Error::ProtocolViolation(format!(
                    "IF flag at {at} is {:?}",
                    char::from(other)
                ))),
            }
        };

        Ok(IfStatus {
            frequency_hz: parse_frequency(field(body, 2, 13)?)?,
            rit_offset_hz: parse_offset(field(body, 18, 23)?)?,
            rit: flag(23)?,
            xit: flag(24)?,
            memory_channel: parse_digits(field(body, 26, 28)?, "memory channel")?,
            transmitting: flag(28)?,
            mode: kenwood_to_mode(field(body, 29, 30)?).ok(),
            function: parse_vfo(byte(body, 30)?)?,
            scan: byte(body, 31)? != b'0',
            split: flag(32)?,
            tone: parse_digits(field(body, 33, 34)?, "tone")?,
            tone_number: parse_digits(field(body, 34, 36)?, "tone number")?,
        })
    }

    /// VFO the rig transmits on.
    ///
    /// In split the transmitter uses the other VFO until the rig is keyed,
    /// when the block reports the VFO in use as the function.
    pub fn tx_vfo(&self) -> Vfo {
        let swapped = self.split && !self.transmitting;
        match self.function {
            Vfo::A if swapped => Vfo::B,
            Vfo::A => Vfo::A,
            Vfo::B if swapped => Vfo::A,
            Vfo::B => Vfo::B,
            Vfo::Memory => Vfo::Memory,
        }
    }
}

fn field(body: &str, start: usize, end: usize) -> Result<&str> {
    body.get(start..end).ok_or_else(|| {
        Error::ProtocolViolation(format!(
            "field {start}..{end} missing from {} character reply",
            body.len()
        ))
    })
}

fn byte(body: &str, at: usize) -> Result<u8> {
    body.as_bytes().get(at).copied().ok_or_else(|| {
        Error::ProtocolViolation(format!(
            "offset {at} missing from {} character reply",
            body.len()
        ))
    })
}

/// Signed 5-character offset such as `+0150` or `-0020`.
fn parse_offset(data: &str) -> Result<i32> {
    let (sign, digits) = data.split_at(1.min(data.len()));
    let magnitude: i32 = parse_digits(digits, "RIT offset")?;
    match sign {
        "+" | "0" | " " => Ok(magnitude),
        "-" => Ok(-magnitude),
        _ => Err(Error::ProtocolViolation(format!(
            "invalid RIT offset sign: {data:?}"
        ))),
    }
}

// ---------------------------------------------------------------
// Mode and VFO codes
// ---------------------------------------------------------------

fn mode_to_kenwood(mode: Mode) -> char {
    match mode {
        Mode::LSB => '1',
        Mode::USB => '2',
        Mode::CW => '3',
        Mode::FM => '4',
        Mode::AM => '5',
        Mode::RTTY => '6',
        Mode::CWR => '7',
        Mode::RTTYR => '9',
    }
}

fn kenwood_to_mode(code: &str) -> Result<Mode> {
    match code {
        "1" => Ok(Mode::LSB),
        "2" => Ok(Mode::USB),
        "3" => Ok(Mode::CW),
        "4" => Ok(Mode::FM),
        "5" => Ok(Mode::AM),
        "6" => Ok(Mode::RTTY),
        "7" => Ok(Mode::CWR),
        "9" => Ok(Mode::RTTYR),
        _ => Err(Error::ProtocolViolation(format!(
            "unknown Kenwood mode code: {code:?}"
        ))),
    }
}

fn vfo_to_kenwood(vfo: Vfo) -> char {
    match vfo {
        Vfo::A => '0',
        Vfo::B => '1',
        Vfo::Memory => '2',
    }
}
