//! Dialect policy hooks.
//!
//! The engine runs the same transaction for every CAT dialect. Where
//! dialects genuinely differ (how much of the mnemonic is echoed, which
//! single-letter replies are status codes, which commands never answer)
//! the engine asks the session's [`Dialect`]. Each dialect crate provides
//! one implementation; [`GenericDialect`] uses the defaults.

/// Control signal carried by a one-letter reply such as `?;`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSignal {
    /// Command understood but its data was invalid. Never retried.
    NegativeAck,
    /// Too many characters arrived at the device without a terminator.
    Overflow,
    /// The device saw a framing or parity error on its input.
    CommunicationError,
    /// Command not understood, or the device is busy.
    Busy,
}

/// Dialect-specific behaviour consulted by the transaction engine.
pub trait Dialect: Send + Sync {
    /// Short name for log output.
    fn name(&self) -> &str;

    /// Number of leading command characters a reply must echo.
    fn echo_width(&self) -> usize {
        2
    }

    /// Interpret the letter of a one-letter reply.
    ///
    /// `None` means the letter is ordinary data.
    fn status_signal(&self, code: u8) -> Option<StatusSignal> {
        match code {
            b'N' => Some(StatusSignal::NegativeAck),
            b'O' => Some(StatusSignal::Overflow),
            b'E' => Some(StatusSignal::CommunicationError),
            b'?' => Some(StatusSignal::Busy),
            _ => None,
        }
    }

    /// Commands that are written and never verified or read back.
    fn is_fire_and_forget(&self, _command: &str) -> bool {
        false
    }

    /// Accept a verification reply that would otherwise fail the echo check.
    fn accepts_verification(&self, _command: &str, _verify_command: &str, _reply: &[u8]) -> bool {
        false
    }

    /// Whether writing `command` makes a cached status block stale.
    ///
    /// By default anything longer than a bare two-letter query is a set.
    fn invalidates_status_cache(&self, command: &str) -> bool {
        command.len() > 2
    }

    /// Whether replies have a fixed length worth verifying.
    fn checks_reply_length(&self) -> bool {
        true
    }
}

/// Dialect with every hook at its default.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericDialect;

impl Dialect for GenericDialect {
    fn name(&self) -> &str {
        "generic"
    }
}
