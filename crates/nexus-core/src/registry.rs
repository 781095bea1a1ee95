//! Peer registry (§4.5, §4.7): exactly one peer per `peer_id` and per
//! transport address, plus the pluggable connect/disconnect hooks consumed
//! by the dashboard and publisher.

use std::collections::HashMap;
use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use nexus_proto::Timeslot;
use parking_lot::RwLock;

use crate::ids::PeerId;
use crate::peer::{mask_address, HandshakeState, Peer};

/// Invoked on the network thread; implementations MUST NOT block — push to
/// a bounded channel and return (§4.7).
pub trait RegistryHooks: Send + Sync {
    fn on_peer_connected(&self, id: PeerId, callsign: &str, address: SocketAddr);
    fn on_peer_disconnected(&self, id: PeerId);
}

/// A no-op implementation for tests and for servers with no dashboard or
/// publisher configured.
pub struct NoopHooks;
impl RegistryHooks for NoopHooks {
    fn on_peer_connected(&self, _id: PeerId, _callsign: &str, _address: SocketAddr) {}
    fn on_peer_disconnected(&self, _id: PeerId) {}
}

#[derive(Clone, Debug)]
pub struct PeerSnapshot {
    pub id: PeerId,
    pub callsign: String,
    pub location: String,
    pub state: HandshakeState,
    pub connected_at: DateTime<Utc>,
    pub last_heard: DateTime<Utc>,
    pub packets: u64,
    pub bytes: u64,
    pub address: String,
}

/// Single global registry shared across every configured listener — the
/// router and stream tracker operate over all connected peers regardless of
/// which system accepted them (§4.6 step 3).
#[derive(Default)]
pub struct PeerRegistry {
    by_id: RwLock<HashMap<PeerId, Peer>>,
    address_to_id: RwLock<HashMap<SocketAddr, PeerId>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        PeerRegistry { by_id: RwLock::new(HashMap::new()), address_to_id: RwLock::new(HashMap::new()) }
    }

    /// Creates or replaces the entry for `id`, binding it to `address` and
    /// evicting whatever peer previously held that address. Atomic under a
    /// single write-lock acquisition per §5's shared-resource policy.
    pub fn insert_on_rptl(&self, peer: Peer) {
        let mut by_id = self.by_id.write();
        let mut by_addr = self.address_to_id.write();

        if let Some(prior_id) = by_addr.get(&peer.address).copied() {
            if prior_id != peer.id {
                by_id.remove(&prior_id);
            }
        }
        if let Some(old) = by_id.get(&peer.id) {
            by_addr.remove(&old.address);
        }

        by_addr.insert(peer.address, peer.id);
        by_id.insert(peer.id, peer);
    }

    pub fn with_peer_mut<R>(&self, id: PeerId, f: impl FnOnce(&mut Peer) -> R) -> Option<R> {
        self.by_id.write().get_mut(&id).map(f)
    }

    pub fn with_peer<R>(&self, id: PeerId, f: impl FnOnce(&Peer) -> R) -> Option<R> {
        self.by_id.read().get(&id).map(f)
    }

    pub fn id_for_address(&self, address: SocketAddr) -> Option<PeerId> {
        self.address_to_id.read().get(&address).copied()
    }

    pub fn remove(&self, id: PeerId) -> Option<Peer> {
        let removed = self.by_id.write().remove(&id);
        if let Some(peer) = &removed {
            self.address_to_id.write().remove(&peer.address);
        }
        removed
    }

    pub fn contains(&self, id: PeerId) -> bool {
        self.by_id.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.by_id.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.read().is_empty()
    }

    /// Peers subscribed to `(tgid, ts)`, excluding `exclude`, per router
    /// step 3 (§4.6). Expired dynamic subscriptions are lazily collected.
    pub fn subscribed_peers(&self, tgid: u32, ts: Timeslot, exclude: PeerId, now: DateTime<Utc>) -> Vec<PeerId> {
        let mut by_id = self.by_id.write();
        by_id
            .iter_mut()
            .filter(|(id, _)| **id != exclude)
            .filter(|(_, peer)| peer.subscriptions.has(tgid, ts, now))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Dead-peer sweep per §4.5: `now - last_heard > ping_time * max_missed`.
    pub fn sweep_dead(&self, now: DateTime<Utc>, ping_time_s: u32, max_missed: u32) -> Vec<PeerId> {
        let dead: Vec<PeerId> = self
            .by_id
            .read()
            .values()
            .filter(|p| p.is_dead(now, ping_time_s, max_missed))
            .map(|p| p.id)
            .collect();
        for id in &dead {
            self.remove(*id);
        }
        dead
    }

    pub fn snapshot(&self, id: PeerId) -> Option<PeerSnapshot> {
        self.by_id.read().get(&id).map(peer_snapshot)
    }

    /// Consumer-facing `list_peers()` (§6).
    pub fn list(&self) -> Vec<PeerSnapshot> {
        self.by_id.read().values().map(peer_snapshot).collect()
    }
}

fn peer_snapshot(peer: &Peer) -> PeerSnapshot {
    PeerSnapshot {
        id: peer.id,
        callsign: peer.config.callsign.clone(),
        location: peer.config.location.clone(),
        state: peer.state,
        connected_at: peer.connected_at,
        last_heard: peer.last_heard,
        packets: peer.packet_count,
        bytes: peer.byte_count,
        address: mask_address(peer.address),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::PeerConfig;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn rebinding_address_evicts_prior_holder() {
        let registry = PeerRegistry::new();
        let a = addr("10.0.0.1:62031");
        registry.insert_on_rptl(Peer::new_on_rptl(PeerId(1), a, 1, t(0)));
        assert!(registry.contains(PeerId(1)));

        registry.insert_on_rptl(Peer::new_on_rptl(PeerId(2), a, 2, t(1)));
        assert!(!registry.contains(PeerId(1)));
        assert!(registry.contains(PeerId(2)));
        assert_eq!(registry.id_for_address(a), Some(PeerId(2)));
    }

    #[test]
    fn reregistering_same_id_clears_old_address_mapping() {
        let registry = PeerRegistry::new();
        let old_addr = addr("10.0.0.1:62031");
        let new_addr = addr("10.0.0.2:62031");
        registry.insert_on_rptl(Peer::new_on_rptl(PeerId(1), old_addr, 1, t(0)));
        registry.insert_on_rptl(Peer::new_on_rptl(PeerId(1), new_addr, 2, t(1)));
        assert_eq!(registry.id_for_address(old_addr), None);
        assert_eq!(registry.id_for_address(new_addr), Some(PeerId(1)));
    }

    #[test]
    fn sweep_removes_only_dead_peers() {
        let registry = PeerRegistry::new();
        registry.insert_on_rptl(Peer::new_on_rptl(PeerId(1), addr("10.0.0.1:1"), 1, t(0)));
        registry.insert_on_rptl(Peer::new_on_rptl(PeerId(2), addr("10.0.0.2:1"), 2, t(90)));
        let dead = registry.sweep_dead(t(100), 5, 3);
        assert_eq!(dead, vec![PeerId(1)]);
        assert!(!registry.contains(PeerId(1)));
        assert!(registry.contains(PeerId(2)));
    }

    #[test]
    fn subscribed_peers_excludes_the_source() {
        let registry = PeerRegistry::new();
        let mut a = Peer::new_on_rptl(PeerId(1), addr("10.0.0.1:1"), 1, t(0));
        a.mark_connected(PeerConfig::default());
        a.subscriptions.apply_options(&crate::subscription::parse_options("TS1=7000"));
        registry.insert_on_rptl(a);

        let mut b = Peer::new_on_rptl(PeerId(2), addr("10.0.0.2:1"), 2, t(0));
        b.mark_connected(PeerConfig::default());
        b.subscriptions.apply_options(&crate::subscription::parse_options("TS1=7000"));
        registry.insert_on_rptl(b);

        let targets = registry.subscribed_peers(7000, Timeslot::One, PeerId(1), t(0));
        assert_eq!(targets, vec![PeerId(2)]);
    }
}
