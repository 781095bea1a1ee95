//! Dynamic bridges (§3, §4.6): lazily created `(tgid, timeslot)` routing
//! contexts, destroyed by the sweeper once idle with no subscribers.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use nexus_proto::Timeslot;

use crate::ids::PeerId;

pub const DEFAULT_DYNAMIC_IDLE: chrono::Duration = chrono::Duration::minutes(5);

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct BridgeKey(pub u32, pub Timeslot);

pub struct DynamicBridge {
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub subscribers: HashSet<PeerId>,
}

#[derive(Default)]
pub struct DynamicBridgeTable {
    bridges: HashMap<BridgeKey, DynamicBridge>,
}

impl DynamicBridgeTable {
    pub fn new() -> Self {
        DynamicBridgeTable { bridges: HashMap::new() }
    }

    /// Gets or creates the bridge for `(tgid, ts)`, bumping `last_activity`.
    pub fn touch(&mut self, tgid: u32, ts: Timeslot, now: DateTime<Utc>) -> &mut DynamicBridge {
        self.bridges
            .entry(BridgeKey(tgid, ts))
            .and_modify(|b| b.last_activity = now)
            .or_insert_with(|| DynamicBridge {
                created_at: now,
                last_activity: now,
                subscribers: HashSet::new(),
            })
    }

    pub fn subscribe(&mut self, tgid: u32, ts: Timeslot, peer: PeerId, now: DateTime<Utc>) {
        self.touch(tgid, ts, now).subscribers.insert(peer);
    }

    pub fn unsubscribe_peer_everywhere(&mut self, peer: PeerId) {
        for bridge in self.bridges.values_mut() {
            bridge.subscribers.remove(&peer);
        }
    }

    pub fn get(&self, tgid: u32, ts: Timeslot) -> Option<&DynamicBridge> {
        self.bridges.get(&BridgeKey(tgid, ts))
    }

    /// Destroys every bridge with no subscribers whose `last_activity` is
    /// older than `idle` (default 5 minutes, §3).
    pub fn sweep(&mut self, now: DateTime<Utc>, idle: chrono::Duration) {
        self.bridges
            .retain(|_, b| !b.subscribers.is_empty() || now - b.last_activity <= idle);
    }

    /// Sorted ascending by `tgid`, per §5's `list_dynamic_bridges` contract.
    pub fn list(&self) -> Vec<(BridgeKey, &DynamicBridge)> {
        let mut out: Vec<_> = self.bridges.iter().map(|(k, v)| (*k, v)).collect();
        out.sort_by_key(|(k, _)| k.0);
        out
    }

    pub fn len(&self) -> usize {
        self.bridges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bridges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn touch_creates_then_reuses_bridge() {
        let mut table = DynamicBridgeTable::new();
        table.touch(5000, Timeslot::One, t(0));
        assert_eq!(table.len(), 1);
        table.touch(5000, Timeslot::One, t(10));
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(5000, Timeslot::One).unwrap().last_activity, t(10));
    }

    #[test]
    fn sweep_spares_bridges_with_subscribers() {
        let mut table = DynamicBridgeTable::new();
        table.subscribe(5000, Timeslot::One, PeerId(1), t(0));
        table.sweep(t(10_000), DEFAULT_DYNAMIC_IDLE);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn sweep_destroys_idle_bridge_once_empty() {
        let mut table = DynamicBridgeTable::new();
        table.subscribe(5000, Timeslot::One, PeerId(1), t(0));
        table.unsubscribe_peer_everywhere(PeerId(1));
        table.sweep(t(301), chrono::Duration::seconds(300));
        assert!(table.is_empty());
    }

    #[test]
    fn list_is_sorted_ascending_by_tgid() {
        let mut table = DynamicBridgeTable::new();
        table.touch(9000, Timeslot::One, t(0));
        table.touch(1000, Timeslot::Two, t(0));
        table.touch(5000, Timeslot::One, t(0));
        let tgids: Vec<u32> = table.list().iter().map(|(k, _)| k.0).collect();
        assert_eq!(tgids, vec![1000, 5000, 9000]);
    }
}
