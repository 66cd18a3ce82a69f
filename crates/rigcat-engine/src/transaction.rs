//! The command transaction: one command, one validated reply.
//!
//! [`transact`] writes a command, waits for a terminated reply, interprets
//! one-letter status replies, verifies the mnemonic echo, and retries
//! transient failures within the device's attempt budget. When the caller
//! expects no reply, the session's verification command is written right
//! behind the real command and its reply is awaited instead, so that an
//! error caused by the real command still surfaces.
//!
//! Per call the engine moves through
//! `Idle -> Writing -> AwaitingReply -> {Complete | RetryWrite | RetryRead | Failed}`.
//! Each retry carries a [`RetryReason`]; the [`RetryPolicy`] and the reason
//! decide whether the next attempt rewrites the command or only re-reads.

use std::fmt;

use tracing::{debug, trace, warn};

use rigcat_core::error::{Error, Result};
use rigcat_core::port::Port;

use crate::config::{DeviceConfig, RetryAction, RetryPolicy};
use crate::dialect::{Dialect, StatusSignal};
use crate::protocol::{self, printable};
use crate::reader::ReadOutcome;
use crate::session::Link;

// ---------------------------------------------------------------------------
// Reply
// ---------------------------------------------------------------------------

/// A validated, terminator-stripped reply.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reply {
    body: String,
    echo_len: usize,
}

impl Reply {
    pub(crate) fn new(body: String, echo_len: usize) -> Self {
        let echo_len = echo_len.min(body.len());
        Reply { body, echo_len }
    }

    /// Reply of a command that produces none.
    pub fn empty() -> Self {
        Reply::default()
    }

    /// The full reply body, mnemonic echo included (`"ID019"`).
    pub fn body(&self) -> &str {
        &self.body
    }

    /// The reply body after the mnemonic echo (`"019"`).
    pub fn payload(&self) -> &str {
        &self.body[self.echo_len..]
    }

    /// Length of the full body.
    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Fixed-offset field `[start, end)` of the full body.
    ///
    /// # Errors
    ///
    /// [`Error::ProtocolViolation`] if the body is too short.
    pub fn field(&self, start: usize, end: usize) -> Result<&str> {
        self.body.get(start..end).ok_or_else(|| {
            Error::ProtocolViolation(format!(
                "reply {:?} too short for field {start}..{end}",
                self.body
            ))
        })
    }

    /// Single character at `index` of the full body.
    pub fn byte_at(&self, index: usize) -> Result<u8> {
        self.body.as_bytes().get(index).copied().ok_or_else(|| {
            Error::ProtocolViolation(format!(
                "reply {:?} too short for offset {index}",
                self.body
            ))
        })
    }

    pub fn into_body(self) -> String {
        self.body
    }
}

// ---------------------------------------------------------------------------
// Retry reasons
// ---------------------------------------------------------------------------

/// Why an attempt did not complete.
#[derive(Debug)]
pub enum RetryReason {
    /// No complete reply before the read timeout.
    Timeout,
    /// The port failed while reading.
    ReadFailed(std::io::Error),
    /// The reply buffer filled without a terminator.
    Unterminated,
    /// The reply contained non-ASCII bytes.
    Garbled,
    /// The device reported input overflow.
    Overflow,
    /// The device reported a communication error.
    CommunicationError,
    /// The device is busy or did not understand the command.
    Busy,
    /// The reply does not echo the command it answers.
    EchoMismatch { reply: String },
}

impl RetryReason {
    /// The error surfaced once no attempts remain.
    fn into_error(self, command: &str) -> Error {
        match self {
            RetryReason::Timeout => Error::Timeout,
            RetryReason::ReadFailed(e) => Error::Io(e),
            RetryReason::Unterminated => {
                Error::ProtocolViolation(format!("reply to {command:?} is not terminated"))
            }
            RetryReason::Garbled => {
                Error::ProtocolViolation(format!("reply to {command:?} is not ASCII"))
            }
            RetryReason::Overflow => {
                Error::ProtocolViolation(format!("device input overflow on {command:?}"))
            }
            RetryReason::CommunicationError => Error::Io(std::io::Error::other(format!(
                "device reported a communication error on {command:?}"
            ))),
            RetryReason::Busy => Error::Rejected(format!("device busy, {command:?} not accepted")),
            RetryReason::EchoMismatch { reply } => Error::ProtocolViolation(format!(
                "reply {reply:?} does not echo {command:?}"
            )),
        }
    }
}

impl fmt::Display for RetryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryReason::Timeout => write!(f, "timeout"),
            RetryReason::ReadFailed(e) => write!(f, "read failed: {e}"),
            RetryReason::Unterminated => write!(f, "unterminated reply"),
            RetryReason::Garbled => write!(f, "garbled reply"),
            RetryReason::Overflow => write!(f, "device overflow"),
            RetryReason::CommunicationError => write!(f, "device communication error"),
            RetryReason::Busy => write!(f, "device busy"),
            RetryReason::EchoMismatch { reply } => write!(f, "wrong reply {reply:?}"),
        }
    }
}

/// Next step for `reason`, or `None` if the reason is not retryable.
fn next_action(
    policy: &RetryPolicy,
    reason: &RetryReason,
    expects_reply: bool,
) -> Option<RetryAction> {
    match reason {
        RetryReason::Timeout => Some(policy.on_timeout.unwrap_or(if expects_reply {
            RetryAction::Rewrite
        } else {
            RetryAction::Reread
        })),
        // Without an expected reply the verification read is the only
        // signal; a broken port will not recover by rewriting.
        RetryReason::ReadFailed(_) => expects_reply.then_some(RetryAction::Rewrite),
        RetryReason::Busy => Some(policy.on_busy),
        RetryReason::Unterminated
        | RetryReason::Garbled
        | RetryReason::Overflow
        | RetryReason::CommunicationError
        | RetryReason::EchoMismatch { .. } => Some(RetryAction::Rewrite),
    }
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

enum Verdict {
    /// A reply to the command, terminator stripped, not yet truncated.
    Answered(String),
    /// The verification reply confirmed a command that produces no reply.
    Verified,
    Retry(RetryReason),
    Failed(Error),
}

/// Per-call values derived once from the arguments.
struct Exchange<'a> {
    mnemonic: Option<&'a str>,
    display: &'a str,
    verify: &'a str,
    capacity: Option<usize>,
    echo_width: usize,
}

/// Run one command transaction on `link`.
///
/// `command` is written (terminator appended if missing) unless `None`, in
/// which case only a reply is read. `expected_reply_len` is the largest
/// body the caller accepts; `None` means the command produces no reply and
/// the verification command is used to confirm it.
///
/// # Errors
///
/// - [`Error::InvalidArgument`] if there is neither a command nor a reply
///   to wait for, or the command is empty.
/// - [`Error::Rejected`] on a negative acknowledgement (not retried) or a
///   device that stays busy.
/// - [`Error::Timeout`], [`Error::ProtocolViolation`], [`Error::Io`] once
///   the attempt budget is spent.
/// - Port errors from writing or flushing, immediately.
pub async fn transact<P: Port + ?Sized>(
    link: &mut Link<P>,
    config: &DeviceConfig,
    dialect: &dyn Dialect,
    command: Option<&str>,
    expected_reply_len: Option<usize>,
) -> Result<Reply> {
    if command.is_none() && expected_reply_len.is_none() {
        return Err(Error::InvalidArgument(
            "transaction needs a command or an expected reply".into(),
        ));
    }
    if command.is_some_and(str::is_empty) {
        return Err(Error::InvalidArgument("empty command".into()));
    }

    let accepted = config.accepted_terminators.as_slice();
    let mnemonic = command.map(|c| protocol::strip_terminator(c, accepted));
    let verify = link.state.verify_command.clone();
    let exchange = Exchange {
        mnemonic,
        display: mnemonic.unwrap_or(""),
        verify: &verify,
        capacity: expected_reply_len.map(|n| n.min(config.max_body_len())),
        echo_width: dialect.echo_width(),
    };
    let expects_reply = exchange.capacity.is_some();

    let is_status_query = matches!(
        (mnemonic, config.status_command.as_deref()),
        (Some(m), Some(s)) if m == s
    );
    if is_status_query && expects_reply {
        if let Some(body) = link.state.status_cache.fresh(config.status_cache_ttl) {
            trace!(command = exchange.display, "status cache hit");
            return Ok(truncated(body, &exchange));
        }
    }
    if let Some(m) = mnemonic {
        if dialect.invalidates_status_cache(m) {
            link.state.status_cache.invalidate();
        }
    }

    let frame = command.map(|c| protocol::encode_frame(c, config.terminator, accepted));
    let verify_frame = protocol::encode_frame(&verify, config.terminator, accepted);
    let max_len = if expects_reply {
        config.reply_capacity
    } else {
        (verify_frame.len() + 32).min(config.reply_capacity)
    };
    let max_attempts = config.retry.max_attempts.max(1);

    let mut attempt: u32 = 1;
    let mut action = RetryAction::Rewrite;

    loop {
        if action == RetryAction::Rewrite {
            if let (Some(frame), Some(m)) = (&frame, mnemonic) {
                link.port.flush_input().await?;
                link.reader.clear();
                write(link, config, frame).await?;

                if dialect.is_fire_and_forget(m) {
                    debug!(command = m, "fire-and-forget command, not verified");
                    return Ok(Reply::empty());
                }
                if !expects_reply {
                    write(link, config, &verify_frame).await?;
                }
            }
        }

        let outcome = link
            .reader
            .read_frame(&mut *link.port, accepted, max_len, config.read_timeout)
            .await;

        let reason = match outcome {
            Ok(ReadOutcome::Frame(raw)) => match check_frame(&raw, &exchange, dialect) {
                Verdict::Answered(body) => {
                    // The cache keeps the whole body; callers may ask for less.
                    if is_status_query {
                        link.state.status_cache.store(&body);
                    }
                    debug!(command = exchange.display, attempt, "transaction complete");
                    return Ok(truncated(&body, &exchange));
                }
                Verdict::Verified => {
                    debug!(command = exchange.display, attempt, "transaction verified");
                    return Ok(Reply::empty());
                }
                Verdict::Failed(e) => return Err(e),
                Verdict::Retry(reason) => reason,
            },
            Ok(ReadOutcome::Unterminated(_)) => RetryReason::Unterminated,
            Ok(ReadOutcome::TimedOut { .. }) => RetryReason::Timeout,
            Err(Error::Io(e)) => RetryReason::ReadFailed(e),
            Err(e) => return Err(e),
        };

        let next = match next_action(&config.retry, &reason, expects_reply) {
            Some(next) if attempt < max_attempts => next,
            _ => {
                debug!(
                    command = exchange.display,
                    attempt,
                    reason = %reason,
                    "transaction failed"
                );
                return Err(reason.into_error(exchange.display));
            }
        };

        warn!(
            command = exchange.display,
            attempt,
            reason = %reason,
            action = ?next,
            "CAT transaction retry"
        );
        if matches!(reason, RetryReason::Busy) {
            tokio::time::sleep(config.busy_settle_delay).await;
        }
        attempt += 1;
        action = next;
    }
}

async fn write<P: Port + ?Sized>(
    link: &mut Link<P>,
    config: &DeviceConfig,
    frame: &[u8],
) -> Result<()> {
    trace!(frame = %printable(frame), "writing frame");
    link.port.send(frame).await?;
    if !link.state.is_emulation && !config.post_write_delay.is_zero() {
        tokio::time::sleep(config.post_write_delay).await;
    }
    Ok(())
}

/// Classify one complete frame.
fn check_frame(raw: &[u8], exchange: &Exchange<'_>, dialect: &dyn Dialect) -> Verdict {
    let body = &raw[..raw.len().saturating_sub(1)];

    if let [code] = body {
        if let Some(signal) = dialect.status_signal(*code) {
            debug!(command = exchange.display, signal = ?signal, "status reply");
            return match signal {
                StatusSignal::NegativeAck => Verdict::Failed(Error::Rejected(format!(
                    "negative acknowledgement for {:?}",
                    exchange.display
                ))),
                StatusSignal::Overflow => Verdict::Retry(RetryReason::Overflow),
                StatusSignal::CommunicationError => {
                    Verdict::Retry(RetryReason::CommunicationError)
                }
                StatusSignal::Busy => Verdict::Retry(RetryReason::Busy),
            };
        }
    }

    if !body.is_ascii() {
        return Verdict::Retry(RetryReason::Garbled);
    }
    let text: String = body.iter().map(|&b| char::from(b)).collect();

    if exchange.capacity.is_some() {
        if let Some(m) = exchange.mnemonic {
            if !protocol::echo_matches(m.as_bytes(), raw, exchange.echo_width) {
                return Verdict::Retry(RetryReason::EchoMismatch {
                    reply: printable(raw),
                });
            }
        }
        return Verdict::Answered(text);
    }

    if let Some(m) = exchange.mnemonic {
        if dialect.accepts_verification(m, exchange.verify, raw) {
            trace!(command = m, reply = %printable(raw), "verification reply accepted by dialect");
            return Verdict::Verified;
        }
    }
    if !protocol::echo_matches(exchange.verify.as_bytes(), raw, exchange.echo_width) {
        return Verdict::Retry(RetryReason::EchoMismatch {
            reply: printable(raw),
        });
    }
    Verdict::Verified
}

/// Build a reply, cutting the body down to the caller's capacity.
fn truncated(body: &str, exchange: &Exchange<'_>) -> Reply {
    let cap = exchange.capacity.unwrap_or(body.len());
    let end = body.len().min(cap);
    let echo = exchange
        .mnemonic
        .map_or(exchange.echo_width, |m| m.len().min(exchange.echo_width));
    Reply::new(body[..end].to_string(), echo)
}
