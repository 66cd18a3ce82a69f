//! Error types for rigcat.
//!
//! All fallible operations across the workspace return [`Result<T>`], which
//! uses [`Error`] as the error type. Port failures, framing failures, and
//! device-level refusals are all captured here so that a caller can decide
//! whether to retry at a higher level, abandon the session, or report a
//! device defect.

/// The error type for all rigcat operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The caller asked for something that cannot be executed, e.g. a
    /// transaction with neither a command nor an expected reply.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An underlying I/O error, or a device-reported communication error
    /// that persisted through every retry.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A transport-level setup error (port cannot be opened, connection
    /// refused).
    #[error("transport error: {0}")]
    Transport(String),

    /// No complete, terminated reply arrived within the allotted time
    /// across all attempts.
    ///
    /// This typically indicates the rig is powered off or the baud rate
    /// is wrong.
    #[error("timeout waiting for response")]
    Timeout,

    /// The device negatively acknowledged the command, or stayed busy
    /// through every attempt. Resending the same command will not help.
    #[error("command rejected by device: {0}")]
    Rejected(String),

    /// A reply arrived without a valid terminator, overflowed the device's
    /// input buffer, or failed mnemonic-echo verification.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// The reply body length never matched the length the caller declared.
    #[error("reply length mismatch: expected {expected}, got {actual}")]
    LengthMismatch {
        /// Length the caller declared for the reply body.
        expected: usize,
        /// Length of the last body actually received.
        actual: usize,
    },

    /// A frame or reply buffer could not be allocated.
    #[error("out of memory")]
    OutOfMemory,

    /// The port has not been opened or was already closed.
    #[error("not connected")]
    NotConnected,

    /// The connection to the rig was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// Another transaction is already in flight on this session.
    #[error("transaction already in flight")]
    TransactionInFlight,

    /// The requested operation is not supported by this rig model.
    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

impl Error {
    /// Whether a caller may reasonably retry the whole operation later.
    ///
    /// `false` for refusals and caller mistakes, which fail the same way
    /// every time, and for a dead link, which needs a new session.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Io(_)
                | Error::Timeout
                | Error::ProtocolViolation(_)
                | Error::LengthMismatch { .. }
                | Error::TransactionInFlight
        )
    }
}

impl From<std::collections::TryReserveError> for Error {
    fn from(_: std::collections::TryReserveError) -> Self {
        Error::OutOfMemory
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
