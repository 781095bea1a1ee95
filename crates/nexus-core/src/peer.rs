//! A single connected repeater (§3, §4.5): transport address, handshake
//! state, counters, and its owned subscription store.

use std::net::SocketAddr;

use chrono::{DateTime, Utc};

use crate::ids::PeerId;
use crate::subscription::SubscriptionStore;

/// Handshake state graph (§4.5). All terminal transitions except `Connected`
/// fall back to `Disconnected` on error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandshakeState {
    Disconnected,
    RptlReceived,
    Authenticated,
    ConfigReceived,
    Connected,
}

/// Free-form configuration carried by `RPTC` (§4.1); every field arrives as
/// an ASCII wire string and is kept as-is.
#[derive(Clone, Debug, Default)]
pub struct PeerConfig {
    pub callsign: String,
    pub rx_freq: String,
    pub tx_freq: String,
    pub tx_power: String,
    pub color_code: String,
    pub latitude: String,
    pub longitude: String,
    pub height: String,
    pub location: String,
    pub description: String,
    pub url: String,
    pub software_id: String,
    pub package_id: String,
}

pub struct Peer {
    pub id: PeerId,
    pub address: SocketAddr,
    pub state: HandshakeState,
    pub nonce: Option<u32>,
    pub connected_at: DateTime<Utc>,
    pub last_heard: DateTime<Utc>,
    pub config: PeerConfig,
    pub packet_count: u64,
    pub byte_count: u64,
    pub subscriptions: SubscriptionStore,
}

impl Peer {
    /// Creates a fresh peer entry in `RPTLReceived`, as step 1 of §4.5
    /// mandates on every accepted `RPTL`.
    pub fn new_on_rptl(id: PeerId, address: SocketAddr, nonce: u32, now: DateTime<Utc>) -> Self {
        Peer {
            id,
            address,
            state: HandshakeState::RptlReceived,
            nonce: Some(nonce),
            connected_at: now,
            last_heard: now,
            config: PeerConfig::default(),
            packet_count: 0,
            byte_count: 0,
            subscriptions: SubscriptionStore::new(),
        }
    }

    pub fn mark_authenticated(&mut self) {
        self.nonce = None;
        self.state = HandshakeState::Authenticated;
    }

    pub fn mark_connected(&mut self, config: PeerConfig) {
        self.config = config;
        self.state = HandshakeState::Connected;
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_heard = now;
    }

    pub fn record_packet(&mut self, bytes: u64) {
        self.packet_count += 1;
        self.byte_count += bytes;
    }

    pub fn is_dead(&self, now: DateTime<Utc>, ping_time_s: u32, max_missed: u32) -> bool {
        let budget = chrono::Duration::seconds((ping_time_s * max_missed) as i64);
        now - self.last_heard > budget
    }
}

/// Masks a socket address for consumer snapshots (§6, §8 invariant 10):
/// keeps the first two octets of an IPv4 address and replaces the rest with
/// `*`. IPv6 addresses are passed through unmasked.
pub fn mask_address(addr: SocketAddr) -> String {
    match addr.ip() {
        std::net::IpAddr::V4(v4) => {
            let o = v4.octets();
            format!("{}.{}.*.*", o[0], o[1])
        }
        std::net::IpAddr::V6(v6) => v6.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn new_peer_starts_in_rptl_received_with_nonce() {
        let p = Peer::new_on_rptl(PeerId(1), addr("10.1.2.3:62031"), 0xDEAD_BEEF, t(0));
        assert_eq!(p.state, HandshakeState::RptlReceived);
        assert_eq!(p.nonce, Some(0xDEAD_BEEF));
    }

    #[test]
    fn authentication_zeroes_nonce_and_advances_state() {
        let mut p = Peer::new_on_rptl(PeerId(1), addr("10.1.2.3:62031"), 42, t(0));
        p.mark_authenticated();
        assert_eq!(p.state, HandshakeState::Authenticated);
        assert_eq!(p.nonce, None);
    }

    #[test]
    fn dead_peer_detection_uses_ping_time_times_max_missed() {
        let mut p = Peer::new_on_rptl(PeerId(1), addr("10.1.2.3:62031"), 42, t(0));
        p.touch(t(0));
        assert!(!p.is_dead(t(14), 5, 3));
        assert!(p.is_dead(t(16), 5, 3));
    }

    #[test]
    fn address_masking_keeps_first_two_octets() {
        assert_eq!(mask_address(addr("198.51.100.23:62031")), "198.51.*.*");
    }
}
