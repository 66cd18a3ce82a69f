//! Frame codec for terminator-delimited CAT text protocols.
//!
//! Every command and every reply on the wire has the same shape:
//!
//! ```text
//! <ascii bytes><terminator>
//! ```
//!
//! The terminator is a per-device constant, usually `;` (Kenwood, Elecraft,
//! Yaesu) or CR (handhelds and some older rigs). There are no length
//! prefixes and no sequence numbers, so the terminator is the only frame
//! boundary.
//!
//! Replies echo the leading one or two characters of the command that
//! solicited them (`FA;` is answered by `FA00014074000;`). A reply that
//! consists of a single status letter, e.g. `?;`, is a control signal and
//! not data; see [`crate::dialect::StatusSignal`].

use bytes::{BufMut, BytesMut};

/// Semicolon terminator used by Kenwood-family HF rigs.
pub const SEMICOLON: u8 = b';';

/// Carriage-return terminator used by handhelds and older dialects.
pub const CARRIAGE_RETURN: u8 = b'\r';

/// Encode a command into a frame ready for transmission.
///
/// Appends `terminator` unless the command already ends in one of the
/// `accepted` terminators, so a frame never carries a doubled terminator.
///
/// # Example
///
/// ```
/// use rigcat_engine::protocol::encode_frame;
///
/// assert_eq!(encode_frame("ID", b';', b";"), b"ID;");
/// assert_eq!(encode_frame("FA00014074000;", b';', b";"), b"FA00014074000;");
/// ```
pub fn encode_frame(command: &str, terminator: u8, accepted: &[u8]) -> Vec<u8> {
    let bytes = command.as_bytes();
    let terminated = bytes
        .last()
        .is_some_and(|b| *b == terminator || accepted.contains(b));

    let mut buf = BytesMut::with_capacity(bytes.len() + 1);
    buf.put_slice(bytes);
    if !terminated {
        buf.put_u8(terminator);
    }
    buf.to_vec()
}

/// Scan received bytes for one complete frame.
///
/// Returns the length of the first frame including its terminator, or
/// `None` if no accepted terminator has arrived yet. A reply consisting of
/// only the terminator yields `Some(1)`, which is distinct from `None`.
///
/// ```
/// use rigcat_engine::protocol::scan_frame;
///
/// assert_eq!(scan_frame(b"ID019;FA", b";"), Some(6));
/// assert_eq!(scan_frame(b";", b";"), Some(1));
/// assert_eq!(scan_frame(b"ID01", b";"), None);
/// assert_eq!(scan_frame(b"", b";"), None);
/// ```
pub fn scan_frame(buf: &[u8], accepted: &[u8]) -> Option<usize> {
    buf.iter().position(|b| accepted.contains(b)).map(|pos| pos + 1)
}

/// Strip a trailing accepted terminator from a command, if present.
pub fn strip_terminator<'a>(command: &'a str, accepted: &[u8]) -> &'a str {
    match command.as_bytes().last() {
        Some(b) if accepted.contains(b) => &command[..command.len() - 1],
        _ => command,
    }
}

/// Check the mnemonic echo of a raw reply frame.
///
/// The first `width` bytes of `expected` (or all of it, if shorter) must
/// appear at the start of `reply`. Single-letter dialects pass `width = 1`.
///
/// ```
/// use rigcat_engine::protocol::echo_matches;
///
/// assert!(echo_matches(b"FA", b"FA00014074000;", 2));
/// assert!(!echo_matches(b"FA", b"FB00014074000;", 2));
/// assert!(echo_matches(b"FA", b"FB00014074000;", 1));
/// assert!(echo_matches(b";", b";", 2));
/// ```
pub fn echo_matches(expected: &[u8], reply: &[u8], width: usize) -> bool {
    let n = width.min(expected.len());
    reply.len() >= n && reply[..n] == expected[..n]
}

/// Render raw bytes for log output, terminators included.
pub(crate) fn printable(bytes: &[u8]) -> String {
    bytes.escape_ascii().to_string()
}
