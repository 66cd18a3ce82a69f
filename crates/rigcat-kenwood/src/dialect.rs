//! Kenwood quirks for the transaction engine.

use rigcat_engine::Dialect;

/// Kenwood CAT dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KenwoodDialect {
    fixed_length_replies: bool,
}

impl KenwoodDialect {
    /// `;`-terminated HF rigs with fixed-length replies.
    pub fn hf() -> Self {
        KenwoodDialect {
            fixed_length_replies: true,
        }
    }

    /// CR-terminated handhelds, whose replies vary in length.
    pub fn handheld() -> Self {
        KenwoodDialect {
            fixed_length_replies: false,
        }
    }
}

impl Dialect for KenwoodDialect {
    fn name(&self) -> &str {
        "kenwood"
    }

    /// `RX` is never verified: a rig already receiving may answer the
    /// verification query with `?`.
    fn is_fire_and_forget(&self, command: &str) -> bool {
        command == "RX"
    }

    /// While switching between receive and transmit some rigs answer the
    /// `IF` verification query with a status block the echo check rejects.
    fn accepts_verification(&self, command: &str, verify_command: &str, _reply: &[u8]) -> bool {
        let switches_tx = command.starts_with("RX") || command.starts_with("TX");
        switches_tx && verify_command.starts_with("IF")
    }

    fn invalidates_status_cache(&self, command: &str) -> bool {
        command.len() > 2
            || command == "RX"
            || command.starts_with("TX")
            || command.starts_with("ZZTX")
    }

    fn checks_reply_length(&self) -> bool {
        self.fixed_length_replies
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigcat_engine::StatusSignal;

    #[test]
    fn rx_is_fire_and_forget() {
        let d = KenwoodDialect::hf();
        assert!(d.is_fire_and_forget("RX"));
        assert!(!d.is_fire_and_forget("TX"));
        assert!(!d.is_fire_and_forget("RX1"));
    }

    #[test]
    fn tx_switch_verified_by_status_block() {
        let d = KenwoodDialect::hf();
        assert!(d.accepts_verification("TX", "IF;", b"IF00014074000;"));
        assert!(d.accepts_verification("RX", "IF;", b"?;"));
        assert!(!d.accepts_verification("TX", "ID;", b"IF;"));
        assert!(!d.accepts_verification("FA00014074000", "IF;", b"IF;"));
    }

    #[test]
    fn status_cache_invalidation() {
        let d = KenwoodDialect::hf();
        assert!(d.invalidates_status_cache("RX"));
        assert!(d.invalidates_status_cache("TX"));
        assert!(d.invalidates_status_cache("MD2"));
        assert!(d.invalidates_status_cache("ZZTX1"));
        assert!(!d.invalidates_status_cache("IF"));
        assert!(!d.invalidates_status_cache("FA"));
    }

    #[test]
    fn kenwood_status_letters() {
        let d = KenwoodDialect::hf();
        assert_eq!(d.status_signal(b'?'), Some(StatusSignal::Busy));
        assert_eq!(d.status_signal(b'N'), Some(StatusSignal::NegativeAck));
        assert_eq!(d.echo_width(), 2);
    }

    #[test]
    fn handheld_skips_length_checks() {
        assert!(KenwoodDialect::hf().checks_reply_length());
        assert!(!KenwoodDialect::handheld().checks_reply_length());
    }
}
