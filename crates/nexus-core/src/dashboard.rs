//! Consumer-facing read-only snapshots (§6): the types and assembly
//! functions behind `list_peers`, `list_bridges`, `list_dynamic_bridges`,
//! and `list_transmissions`. The actual HTTP surface (the `web` config
//! section) is an external collaborator out of scope here; this module only
//! builds the DTOs it would serialize.

use chrono::{DateTime, Utc};
use nexus_proto::Timeslot;
use serde::Serialize;

use crate::bridge::RuleSet;
use crate::dynamic_bridge::DynamicBridgeTable;
use crate::persist::{Page, TransmissionFilter, TransmissionStore};
use crate::peer::HandshakeState;
use crate::registry::PeerRegistry;

#[derive(Clone, Debug, Serialize)]
pub struct PeerView {
    pub id: u32,
    pub callsign: String,
    pub location: String,
    pub state: &'static str,
    pub connected_at: DateTime<Utc>,
    pub last_heard: DateTime<Utc>,
    pub packets: u64,
    pub bytes: u64,
    pub address: String,
}

fn state_label(state: HandshakeState) -> &'static str {
    match state {
        HandshakeState::Disconnected => "disconnected",
        HandshakeState::RptlReceived => "rptl_received",
        HandshakeState::Authenticated => "authenticated",
        HandshakeState::ConfigReceived => "config_received",
        HandshakeState::Connected => "connected",
    }
}

pub fn list_peers(registry: &PeerRegistry) -> Vec<PeerView> {
    registry
        .list()
        .into_iter()
        .map(|p| PeerView {
            id: p.id.0,
            callsign: p.callsign,
            location: p.location,
            state: state_label(p.state),
            connected_at: p.connected_at,
            last_heard: p.last_heard,
            packets: p.packets,
            bytes: p.bytes,
            address: p.address,
        })
        .collect()
}

#[derive(Clone, Debug, Serialize)]
pub struct BridgeRuleView {
    pub system: String,
    pub tgid: u32,
    pub timeslot: Timeslot,
    pub active: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct BridgeView {
    pub name: String,
    pub rules: Vec<BridgeRuleView>,
}

pub fn list_bridges(rule_sets: &[RuleSet]) -> Vec<BridgeView> {
    rule_sets
        .iter()
        .map(|set| BridgeView {
            name: set.name.clone(),
            rules: set
                .rules()
                .iter()
                .map(|r| BridgeRuleView {
                    system: r.system.as_str().to_string(),
                    tgid: r.tgid,
                    timeslot: r.timeslot,
                    active: r.active,
                })
                .collect(),
        })
        .collect()
}

#[derive(Clone, Debug, Serialize)]
pub struct DynamicBridgeView {
    pub tgid: u32,
    pub timeslot: Timeslot,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub subscribers: Vec<u32>,
}

pub fn list_dynamic_bridges(table: &DynamicBridgeTable) -> Vec<DynamicBridgeView> {
    table
        .list()
        .into_iter()
        .map(|(key, bridge)| {
            let mut subscribers: Vec<u32> = bridge.subscribers.iter().map(|p| p.0).collect();
            subscribers.sort_unstable();
            DynamicBridgeView {
                tgid: key.0,
                timeslot: key.1,
                created_at: bridge.created_at,
                last_activity: bridge.last_activity,
                subscribers,
            }
        })
        .collect()
}

pub async fn list_transmissions(
    store: &dyn TransmissionStore,
    page: i64,
    per_page: i64,
) -> crate::errors::NexusResult<Page<crate::transmission::Transmission>> {
    store.list(TransmissionFilter::None, page, per_page).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::Rule;
    use crate::ids::SystemName;

    #[test]
    fn list_bridges_projects_rule_fields() {
        let rule = Rule {
            system: SystemName::new("bm-3100"),
            tgid: 3100,
            timeslot: Timeslot::One,
            active: true,
            on: vec![],
            off: vec![],
            timeout_minutes: 0,
        };
        let sets = vec![RuleSet::new("main", vec![rule])];
        let views = list_bridges(&sets);
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].rules[0].system, "bm-3100");
        assert!(views[0].rules[0].active);
    }

    #[test]
    fn dynamic_bridge_view_sorts_subscribers() {
        let mut table = DynamicBridgeTable::new();
        let now = Utc::now();
        table.subscribe(5000, Timeslot::One, crate::ids::PeerId(312_002), now);
        table.subscribe(5000, Timeslot::One, crate::ids::PeerId(312_001), now);
        let views = list_dynamic_bridges(&table);
        assert_eq!(views[0].subscribers, vec![312_001, 312_002]);
    }
}
