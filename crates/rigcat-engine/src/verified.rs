//! Length-verified transactions.
//!
//! Fixed-format queries (`IF`, `FA`) have a known reply length. A reply of
//! any other length usually means the device answered a neighbouring
//! command or a frame was cut short, so it is discarded and the query is
//! repeated after a short settle delay.

use tracing::warn;

use rigcat_core::error::{Error, Result};
use rigcat_core::port::Port;

use crate::config::DeviceConfig;
use crate::dialect::Dialect;
use crate::session::Link;
use crate::transaction::{transact, Reply};

/// Run `command` and require a reply body of exactly `expected_len`
/// characters, mnemonic included.
///
/// `expected_len == 0` declares that the command produces no reply; the
/// transaction then only waits for the verification command's answer.
/// Dialects that report `checks_reply_length() == false` skip the check.
///
/// # Errors
///
/// [`Error::LengthMismatch`] once the attempt budget is spent, or any
/// error of the underlying transaction, which is returned immediately.
pub async fn transact_expecting_length<P: Port + ?Sized>(
    link: &mut Link<P>,
    config: &DeviceConfig,
    dialect: &dyn Dialect,
    command: &str,
    expected_len: usize,
) -> Result<Reply> {
    if expected_len == 0 {
        return transact(link, config, dialect, Some(command), None).await;
    }

    let max_attempts = config.retry.max_attempts.max(1);
    let mut attempt: u32 = 1;
    loop {
        let capacity = Some(config.max_body_len());
        let reply = transact(link, config, dialect, Some(command), capacity).await?;
        let actual = reply.len();
        if actual == expected_len || !dialect.checks_reply_length() {
            return Ok(reply);
        }

        warn!(command, expected_len, actual, attempt, "reply length mismatch");
        // A cached status block of the wrong length must not be served again.
        link.state.invalidate_status_cache();
        if attempt >= max_attempts {
            return Err(Error::LengthMismatch {
                expected: expected_len,
                actual,
            });
        }
        attempt += 1;
        tokio::time::sleep(config.length_settle_delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use rigcat_test_harness::MockPort;

    use crate::dialect::GenericDialect;

    fn config() -> DeviceConfig {
        DeviceConfig::default()
            .with_read_timeout(Duration::from_millis(100))
            .with_max_attempts(3)
    }

    /// Dialect whose replies vary in length.
    struct FreeForm;

    impl Dialect for FreeForm {
        fn name(&self) -> &str {
            "free-form"
        }

        fn checks_reply_length(&self) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn correct_length_first_time() {
        let mut port = MockPort::new();
        port.expect(b"FA;", b"FA00014074000;");
        let mut link = Link::new(Box::new(port), "ID;");

        let reply = transact_expecting_length(&mut link, &config(), &GenericDialect, "FA", 13)
            .await
            .unwrap();
        assert_eq!(reply.payload(), "00014074000");
        assert_eq!(link.port.sent_data().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn short_reply_is_repeated() {
        let mut port = MockPort::new();
        port.expect(b"FA;", b"FA0001407;");
        port.expect(b"FA;", b"FA00014074000;");
        let mut link = Link::new(Box::new(port), "ID;");

        let start = tokio::time::Instant::now();
        let reply = transact_expecting_length(&mut link, &config(), &GenericDialect, "FA", 13)
            .await
            .unwrap();
        assert_eq!(reply.body(), "FA00014074000");
        assert_eq!(link.port.sent_data().len(), 2);
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_mismatch_reports_lengths() {
        let mut port = MockPort::new();
        for _ in 0..3 {
            port.expect(b"FA;", b"FA0001407;");
        }
        let mut link = Link::new(Box::new(port), "ID;");

        let err = transact_expecting_length(&mut link, &config(), &GenericDialect, "FA", 13)
            .await
            .unwrap_err();
        match err {
            Error::LengthMismatch { expected, actual } => {
                assert_eq!(expected, 13);
                assert_eq!(actual, 9);
            }
            other => panic!("expected LengthMismatch, got {other:?}"),
        }
        assert_eq!(link.port.remaining_expectations(), 0);
    }

    #[tokio::test]
    async fn zero_length_reads_only_the_verification_reply() {
        let mut port = MockPort::new();
        port.expect(b"FA00014074000;", b"");
        port.expect(b"ID;", b"ID019;");
        let mut link = Link::new(Box::new(port), "ID;");

        let reply = transact_expecting_length(
            &mut link,
            &config(),
            &GenericDialect,
            "FA00014074000",
            0,
        )
        .await
        .unwrap();
        assert!(reply.is_empty());
        assert_eq!(link.port.receive_count(), 1);
    }

    #[tokio::test]
    async fn hard_errors_are_not_repeated() {
        let mut port = MockPort::new();
        port.expect(b"FA;", b"N;");
        let mut link = Link::new(Box::new(port), "ID;");

        let err = transact_expecting_length(&mut link, &config(), &GenericDialect, "FA", 13)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Rejected(_)));
        assert_eq!(link.port.sent_data().len(), 1);
    }

    #[tokio::test]
    async fn dialect_without_length_check_accepts_any_length() {
        let mut port = MockPort::new();
        port.expect(b"FA;", b"FA14074000;");
        let mut link = Link::new(Box::new(port), "ID;");

        let reply = transact_expecting_length(&mut link, &config(), &FreeForm, "FA", 13)
            .await
            .unwrap();
        assert_eq!(reply.payload(), "14074000");
    }
}
