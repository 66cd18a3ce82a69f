//! Sessions: one open device, one transaction at a time.
//!
//! A [`Session`] owns the [`Port`] together with the mutable per-session
//! state the transaction engine needs (verification command, emulation
//! flag, cached status block). Every transaction goes through a
//! [`TransactionGuard`], which holds the session lock for its lifetime, so
//! commands never interleave on the wire. Dialect code that must run a
//! dependent sequence (save, change, restore) keeps one guard across the
//! whole sequence.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;
use tracing::debug;

use rigcat_core::error::{Error, Result};
use rigcat_core::port::Port;
use rigcat_core::types::{Mode, Vfo};

use crate::config::DeviceConfig;
use crate::dialect::Dialect;
use crate::reader::FrameReader;
use crate::transaction::{transact, Reply};
use crate::verified::transact_expecting_length;

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// Last status block read from the device and when it arrived.
#[derive(Debug, Clone, Default)]
pub(crate) struct StatusCache {
    entry: Option<(String, Instant)>,
}

impl StatusCache {
    pub(crate) fn fresh(&self, ttl: Duration) -> Option<&str> {
        self.entry
            .as_ref()
            .filter(|(_, at)| at.elapsed() < ttl)
            .map(|(body, _)| body.as_str())
    }

    pub(crate) fn store(&mut self, body: &str) {
        self.entry = Some((body.to_string(), Instant::now()));
    }

    pub(crate) fn invalidate(&mut self) {
        self.entry = None;
    }
}

/// Mutable per-session state.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// Command written after a command that produces no reply. Starts as
    /// the device default and may be changed while opening, e.g. when the
    /// device does not answer the identification query.
    pub verify_command: String,
    /// The far end is a software emulation; post-write delays are skipped.
    pub is_emulation: bool,
    pub split: Option<bool>,
    pub tx_vfo: Option<Vfo>,
    pub mode: Option<Mode>,
    /// Auto-information level found at open, restored at close.
    pub saved_auto_info: Option<u8>,
    pub(crate) status_cache: StatusCache,
}

impl SessionState {
    pub fn new(verify_command: &str) -> Self {
        SessionState {
            verify_command: verify_command.to_string(),
            ..Default::default()
        }
    }

    /// Forget the cached status block.
    pub fn invalidate_status_cache(&mut self) {
        self.status_cache.invalidate();
    }

    pub fn has_cached_status(&self) -> bool {
        self.status_cache.entry.is_some()
    }
}

// ---------------------------------------------------------------------------
// Link
// ---------------------------------------------------------------------------

/// A port plus everything the engine keeps between transactions.
pub struct Link<P: ?Sized = dyn Port> {
    pub state: SessionState,
    pub(crate) reader: FrameReader,
    pub(crate) port: Box<P>,
}

impl<P: Port + ?Sized> Link<P> {
    pub fn new(port: Box<P>, verify_command: &str) -> Self {
        Link {
            state: SessionState::new(verify_command),
            reader: FrameReader::new(),
            port,
        }
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn is_connected(&self) -> bool {
        self.port.is_connected()
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// An open device.
///
/// `Session` is `Send + Sync`; share it behind an `Arc` to issue commands
/// from several tasks. Transactions are serialized: [`begin`](Self::begin)
/// waits for the running one, [`try_begin`](Self::try_begin) fails with
/// [`Error::TransactionInFlight`] instead.
pub struct Session {
    link: Mutex<Link>,
    in_flight: AtomicBool,
    config: Arc<DeviceConfig>,
    dialect: Arc<dyn Dialect>,
}

impl Session {
    pub fn new(port: Box<dyn Port>, config: Arc<DeviceConfig>, dialect: Arc<dyn Dialect>) -> Self {
        let link = Link::new(port, &config.verify_command);
        debug!(dialect = dialect.name(), "session created");
        Session {
            link: Mutex::new(link),
            in_flight: AtomicBool::new(false),
            config,
            dialect,
        }
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    /// Whether a transaction currently holds the session.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Wait for exclusive use of the session.
    pub async fn begin(&self) -> TransactionGuard<'_> {
        let link = self.link.lock().await;
        self.guard(link)
    }

    /// Take exclusive use of the session without waiting.
    ///
    /// # Errors
    ///
    /// [`Error::TransactionInFlight`] if another transaction holds it.
    pub fn try_begin(&self) -> Result<TransactionGuard<'_>> {
        let link = self
            .link
            .try_lock()
            .map_err(|_| Error::TransactionInFlight)?;
        Ok(self.guard(link))
    }

    fn guard<'a>(&'a self, link: MutexGuard<'a, Link>) -> TransactionGuard<'a> {
        self.in_flight.store(true, Ordering::Release);
        TransactionGuard {
            link,
            in_flight: &self.in_flight,
            config: self.config.as_ref(),
            dialect: self.dialect.as_ref(),
        }
    }

    /// Run one command. `expected_reply_len` of `None` means the command
    /// produces no reply and is confirmed with the verification command.
    pub async fn execute(&self, command: &str, expected_reply_len: Option<usize>) -> Result<Reply> {
        self.begin().await.execute(command, expected_reply_len).await
    }

    /// Like [`execute`](Self::execute), but fail instead of waiting for a
    /// transaction already in flight.
    pub async fn try_execute(
        &self,
        command: &str,
        expected_reply_len: Option<usize>,
    ) -> Result<Reply> {
        self.try_begin()?.execute(command, expected_reply_len).await
    }

    /// Run a command that produces no reply.
    pub async fn send(&self, command: &str) -> Result<()> {
        self.begin().await.send(command).await
    }

    pub async fn execute_expecting_length(&self, command: &str, expected_len: usize) -> Result<Reply> {
        self.begin()
            .await
            .execute_expecting_length(command, expected_len)
            .await
    }

    /// Query a mnemonic, checking its reply length when the device
    /// declares one.
    pub async fn query(&self, mnemonic: &str) -> Result<Reply> {
        self.begin().await.query(mnemonic).await
    }

    /// Snapshot of the session state.
    pub async fn state(&self) -> SessionState {
        self.link.lock().await.state.clone()
    }

    pub async fn is_connected(&self) -> bool {
        self.link.lock().await.is_connected()
    }

    /// Close the port. Later transactions fail with the port's error.
    pub async fn close(&self) -> Result<()> {
        let mut guard = self.begin().await;
        guard.link.state.invalidate_status_cache();
        guard.link.port.close().await
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("dialect", &self.dialect.name())
            .field("in_flight", &self.is_in_flight())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// TransactionGuard
// ---------------------------------------------------------------------------

/// Exclusive use of a [`Session`].
///
/// Dropping the guard, on success, error, or unwind, releases the session
/// and clears the in-flight flag.
pub struct TransactionGuard<'a> {
    link: MutexGuard<'a, Link>,
    in_flight: &'a AtomicBool,
    config: &'a DeviceConfig,
    dialect: &'a dyn Dialect,
}

impl TransactionGuard<'_> {
    pub async fn execute(&mut self, command: &str, expected_reply_len: Option<usize>) -> Result<Reply> {
        transact(
            &mut *self.link,
            self.config,
            self.dialect,
            Some(command),
            expected_reply_len,
        )
        .await
    }

    pub async fn send(&mut self, command: &str) -> Result<()> {
        self.execute(command, None).await.map(|_| ())
    }

    pub async fn execute_expecting_length(
        &mut self,
        command: &str,
        expected_len: usize,
    ) -> Result<Reply> {
        transact_expecting_length(
            &mut *self.link,
            self.config,
            self.dialect,
            command,
            expected_len,
        )
        .await
    }

    pub async fn query(&mut self, mnemonic: &str) -> Result<Reply> {
        match self.config.expected_length(mnemonic) {
            Some(len) if self.dialect.checks_reply_length() => {
                self.execute_expecting_length(mnemonic, len).await
            }
            _ => {
                let capacity = self.config.max_body_len();
                self.execute(mnemonic, Some(capacity)).await
            }
        }
    }

    /// Run `command` once, without retries. Used for identification
    /// probes, where silence is an answer rather than a fault.
    pub async fn probe(&mut self, command: &str, expected_reply_len: usize) -> Result<Reply> {
        let mut config = self.config.clone();
        config.retry.max_attempts = 1;
        transact(
            &mut *self.link,
            &config,
            self.dialect,
            Some(command),
            Some(expected_reply_len),
        )
        .await
    }

    /// Read one reply without writing anything.
    pub async fn read_reply(&mut self, expected_reply_len: usize) -> Result<Reply> {
        transact(
            &mut *self.link,
            self.config,
            self.dialect,
            None,
            Some(expected_reply_len),
        )
        .await
    }

    pub fn state(&self) -> &SessionState {
        &self.link.state
    }

    pub fn state_mut(&mut self) -> &mut SessionState {
        &mut self.link.state
    }

    pub fn config(&self) -> &DeviceConfig {
        self.config
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect
    }
}

impl Drop for TransactionGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rigcat_test_harness::MockPort;

    use crate::dialect::GenericDialect;

    fn session(mock: MockPort) -> Session {
        session_with(mock, DeviceConfig::default())
    }

    fn session_with(mock: MockPort, config: DeviceConfig) -> Session {
        let config = config.with_read_timeout(Duration::from_millis(100));
        Session::new(Box::new(mock), Arc::new(config), Arc::new(GenericDialect))
    }

    #[test]
    fn session_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Session>();
    }

    #[tokio::test]
    async fn execute_returns_reply() {
        let mut mock = MockPort::new();
        mock.expect(b"ID;", b"ID019;");
        let session = session(mock);

        let reply = session.execute("ID", Some(5)).await.unwrap();
        assert_eq!(reply.payload(), "019");
        assert!(!session.is_in_flight());
    }

    #[tokio::test]
    async fn send_uses_verification_command() {
        let mut mock = MockPort::new();
        mock.expect(b"FA00014074000;", b"");
        mock.expect(b"ID;", b"ID019;");
        let session = session(mock);

        session.send("FA00014074000").await.unwrap();
    }

    #[tokio::test]
    async fn changed_verification_command_is_used() {
        let mut mock = MockPort::new();
        mock.expect(b"FA00014074000;", b"");
        mock.expect(b"FA;", b"FA00014074000;");
        let session = session(mock);

        {
            let mut guard = session.begin().await;
            guard.state_mut().verify_command = "FA;".into();
        }
        session.send("FA00014074000").await.unwrap();
        assert_eq!(session.state().await.verify_command, "FA;");
    }

    #[tokio::test(start_paused = true)]
    async fn query_checks_declared_length() {
        let mut mock = MockPort::new();
        mock.expect(b"FA;", b"FA0001;");
        mock.expect(b"FA;", b"FA00014074000;");
        let session = session_with(mock, DeviceConfig::default().with_expected_length("FA", 13));

        let reply = session.query("FA").await.unwrap();
        assert_eq!(reply.body(), "FA00014074000");
    }

    #[tokio::test]
    async fn query_without_declared_length() {
        let mut mock = MockPort::new();
        mock.expect(b"AI;", b"AI2;");
        let session = session(mock);

        let reply = session.query("AI").await.unwrap();
        assert_eq!(reply.payload(), "2");
    }

    #[tokio::test]
    async fn second_transaction_is_refused_while_in_flight() {
        let mut mock = MockPort::new();
        mock.expect(b"ID;", b"ID019;");
        let session = session(mock);

        let guard = session.begin().await;
        assert!(session.is_in_flight());
        let err = session.try_execute("ID", Some(5)).await.unwrap_err();
        assert!(matches!(err, Error::TransactionInFlight));

        drop(guard);
        assert!(!session.is_in_flight());
        session.try_execute("ID", Some(5)).await.unwrap();
    }

    #[tokio::test]
    async fn in_flight_cleared_after_error() {
        let mut mock = MockPort::new();
        mock.expect(b"FA;", b"N;");
        let session = session(mock);

        let err = session.execute("FA", Some(13)).await.unwrap_err();
        assert!(matches!(err, Error::Rejected(_)));
        assert!(!session.is_in_flight());
    }

    #[tokio::test]
    async fn concurrent_callers_are_serialized() {
        let mut mock = MockPort::new();
        mock.expect(b"FA;", b"FA00014074000;");
        mock.expect(b"FB;", b"FB00007000000;");
        let session = Arc::new(session(mock));

        // The mock rejects any write out of order, so interleaving fails.
        let a = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.execute("FA", Some(13)).await })
        };
        let first = a.await.unwrap().unwrap();
        let b = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.execute("FB", Some(13)).await })
        };
        let second = b.await.unwrap().unwrap();
        assert_eq!(first.payload(), "00014074000");
        assert_eq!(second.payload(), "00007000000");
    }

    #[tokio::test]
    async fn guard_runs_dependent_sequence() {
        let mut mock = MockPort::new();
        mock.expect(b"AI;", b"AI2;");
        mock.expect(b"AI0;", b"");
        mock.expect(b"ID;", b"ID019;");
        let session = session(mock);

        let mut guard = session.begin().await;
        let ai = guard.query("AI").await.unwrap();
        guard.state_mut().saved_auto_info = Some(ai.payload().parse().unwrap());
        guard.send("AI0").await.unwrap();
        drop(guard);

        assert_eq!(session.state().await.saved_auto_info, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn probe_gives_up_after_one_attempt() {
        let mut mock = MockPort::new();
        mock.expect(b"ID;", b"");
        let session = session_with(mock, DeviceConfig::default().with_max_attempts(4));

        let err = session.begin().await.probe("ID", 16).await.unwrap_err();
        assert!(matches!(err, Error::Timeout));
    }

    #[tokio::test]
    async fn read_reply_without_write() {
        let mut mock = MockPort::new();
        mock.inject(b"FA00014074000;");
        let session = session(mock);

        let reply = session.begin().await.read_reply(13).await.unwrap();
        assert_eq!(reply.body(), "FA00014074000");
    }

    #[tokio::test]
    async fn closed_session_refuses_commands() {
        let session = session(MockPort::new());
        session.close().await.unwrap();
        assert!(!session.is_connected().await);

        let err = session.execute("ID", Some(5)).await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));
    }
}
