//! Immutable per-device configuration for the transaction engine.
//!
//! A [`DeviceConfig`] is built once per rig model (see the model factory
//! functions in dialect crates such as `rigcat-kenwood`) and shared
//! read-only by every session talking to that model.

use std::collections::HashMap;
use std::time::Duration;

use crate::protocol::SEMICOLON;

/// What the engine does before the next attempt of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    /// Flush input and write the command again, then read.
    Rewrite,
    /// Read again without writing; the device may still answer.
    Reread,
}

/// Retry budget and per-reason retry behaviour.
///
/// Busy replies and timeouts are separate retry classes. Both are
/// configurable because devices disagree about which one recovers: most
/// want to be left alone and re-read after a busy reply, a few only
/// answer once the command is written again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts per transaction, the first one included.
    pub max_attempts: u32,
    /// Action after a read timeout.
    ///
    /// `None` rewrites when the caller expects a reply and re-reads when
    /// waiting on the verification command.
    pub on_timeout: Option<RetryAction>,
    /// Action after a busy (`?`) reply. The busy settle delay is always
    /// observed first.
    pub on_busy: RetryAction,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 4,
            on_timeout: None,
            on_busy: RetryAction::Reread,
        }
    }
}

/// Static configuration for one device model.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Terminator appended to every outgoing command.
    pub terminator: u8,
    /// Terminators recognised when scanning replies and when deciding
    /// whether a command is already terminated. Always includes
    /// `terminator`.
    pub accepted_terminators: Vec<u8>,
    pub retry: RetryPolicy,
    /// Bounded wait for one read attempt.
    pub read_timeout: Duration,
    /// Pause before retrying after a busy reply.
    pub busy_settle_delay: Duration,
    /// Pause before retrying after a reply of the wrong length.
    pub length_settle_delay: Duration,
    /// Pause after every write. Skipped for emulations.
    pub post_write_delay: Duration,
    /// Largest frame the engine will read, terminator included.
    pub reply_capacity: usize,
    /// Command written after a command that produces no reply.
    pub verify_command: String,
    /// Expected reply body length per query mnemonic, mnemonic included.
    pub expected_lengths: HashMap<String, usize>,
    /// Full-status query whose reply is cached, e.g. `IF`.
    pub status_command: Option<String>,
    pub status_cache_ttl: Duration,
}

impl DeviceConfig {
    /// Default configuration for a device using `terminator`.
    pub fn new(terminator: u8) -> Self {
        DeviceConfig {
            terminator,
            accepted_terminators: vec![terminator],
            retry: RetryPolicy::default(),
            read_timeout: Duration::from_millis(500),
            busy_settle_delay: Duration::from_millis(500),
            length_settle_delay: Duration::from_millis(50),
            post_write_delay: Duration::ZERO,
            reply_capacity: 128,
            verify_command: format!("ID{}", terminator as char),
            expected_lengths: HashMap::new(),
            status_command: None,
            status_cache_ttl: Duration::from_millis(500),
        }
    }

    /// Also accept `extra` as a reply terminator.
    pub fn accept_terminator(mut self, extra: u8) -> Self {
        if !self.accepted_terminators.contains(&extra) {
            self.accepted_terminators.push(extra);
        }
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.retry.max_attempts = attempts.max(1);
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_busy_settle_delay(mut self, delay: Duration) -> Self {
        self.busy_settle_delay = delay;
        self
    }

    pub fn with_length_settle_delay(mut self, delay: Duration) -> Self {
        self.length_settle_delay = delay;
        self
    }

    pub fn with_post_write_delay(mut self, delay: Duration) -> Self {
        self.post_write_delay = delay;
        self
    }

    pub fn with_reply_capacity(mut self, capacity: usize) -> Self {
        self.reply_capacity = capacity.max(2);
        self
    }

    pub fn with_verify_command(mut self, command: &str) -> Self {
        self.verify_command = command.to_string();
        self
    }

    /// Declare the reply body length of a query, mnemonic included.
    pub fn with_expected_length(mut self, mnemonic: &str, len: usize) -> Self {
        self.expected_lengths.insert(mnemonic.to_string(), len);
        self
    }

    /// Cache replies to `command` for `ttl`.
    pub fn with_status_cache(mut self, command: &str, ttl: Duration) -> Self {
        self.status_command = Some(command.to_string());
        self.status_cache_ttl = ttl;
        self
    }

    /// Expected reply body length for a query mnemonic, if declared.
    pub fn expected_length(&self, mnemonic: &str) -> Option<usize> {
        self.expected_lengths.get(mnemonic).copied()
    }

    /// Largest reply body the engine can return.
    pub fn max_body_len(&self) -> usize {
        self.reply_capacity.saturating_sub(1)
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self::new(SEMICOLON)
    }
}
