//! Router (§4.6): combines static bridge rules, dynamic per-peer
//! subscriptions, and dynamic bridges into a deduplicated fan-out target set.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use nexus_proto::{Dmrd, Timeslot};

use crate::bridge::RuleSet;
use crate::dynamic_bridge::DynamicBridgeTable;
use crate::ids::{PeerId, StreamId, SystemName};
use crate::registry::PeerRegistry;
use crate::stream_tracker::StreamTracker;

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Target {
    Peer(PeerId),
    System(SystemName),
}

pub struct RouteOutcome {
    pub targets: Vec<Target>,
    /// Set when the packet was a voice terminator; the caller must call
    /// [`StreamTracker::end`] after writing to the targets above.
    pub should_end_stream: bool,
}

/// Routes `packet`, received from `source` system. `rule_sets` are
/// consulted for static targets in configuration order.
pub fn route(
    packet: &Dmrd,
    source: &SystemName,
    tracker: &mut StreamTracker,
    rule_sets: &[RuleSet],
    registry: &PeerRegistry,
    now: DateTime<Utc>,
) -> RouteOutcome {
    let stream_id = StreamId(packet.stream_id);

    if !tracker.track(stream_id, source, now) {
        return RouteOutcome { targets: Vec::new(), should_end_stream: false };
    }

    let mut seen: HashSet<Target> = HashSet::new();
    let mut targets = Vec::new();

    for rule_set in rule_sets {
        for rule in rule_set.matching(packet.destination_id, packet.timeslot, source) {
            let target = Target::System(rule.system.clone());
            if seen.insert(target.clone()) {
                targets.push(target);
            }
        }
    }

    for peer_id in registry.subscribed_peers(
        packet.destination_id,
        packet.timeslot,
        PeerId(packet.repeater_id),
        now,
    ) {
        let target = Target::Peer(peer_id);
        if seen.insert(target.clone()) {
            targets.push(target);
        }
    }

    RouteOutcome { targets, should_end_stream: packet.is_voice_terminator() }
}

/// Updates the dynamic bridge for the packet's `(tgid, timeslot)`, recording
/// the sending peer's own activity (§4.5 voice-path step 6).
pub fn record_dynamic_activity(bridges: &mut DynamicBridgeTable, packet: &Dmrd, peer: PeerId, now: DateTime<Utc>) {
    bridges.subscribe(packet.destination_id, packet.timeslot, peer, now);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{Rule, RuleSet};
    use crate::peer::{Peer, PeerConfig};
    use chrono::TimeZone;
    use nexus_proto::{CallType, FrameClass, SLOT_TYPE_VOICE_HEADER, SLOT_TYPE_VOICE_TERMINATOR};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn dmrd(source: u32, dest: u32, repeater: u32, ts: Timeslot, stream: u32, frame: u8) -> Dmrd {
        Dmrd {
            sequence: 0,
            source_id: source,
            destination_id: dest,
            repeater_id: repeater,
            timeslot: ts,
            call_type: CallType::Group,
            frame_class: FrameClass::DataSync,
            dtype_or_vseq: frame,
            stream_id: stream,
            payload: [0; 33],
        }
    }

    fn addr(s: &str) -> std::net::SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn static_rule_fans_out_excluding_source() {
        let rule = Rule {
            system: SystemName::new("bm-3100"),
            tgid: 3100,
            timeslot: Timeslot::One,
            active: true,
            on: vec![],
            off: vec![],
            timeout_minutes: 0,
        };
        let rule_sets = vec![RuleSet::new("main", vec![rule])];
        let registry = PeerRegistry::new();
        let mut tracker = StreamTracker::new();

        let packet = dmrd(312_000, 3100, 312_000, Timeslot::One, 1, SLOT_TYPE_VOICE_HEADER);
        let outcome = route(&packet, &SystemName::new("local"), &mut tracker, &rule_sets, &registry, t(0));
        assert_eq!(outcome.targets, vec![Target::System(SystemName::new("bm-3100"))]);
    }

    #[test]
    fn duplicate_stream_from_same_source_returns_empty() {
        // A real static target, so a non-empty `first` proves dedup (not an
        // empty fixture) is what makes `second` come back empty.
        let rule = Rule {
            system: SystemName::new("bm-7000"),
            tgid: 7000,
            timeslot: Timeslot::Two,
            active: true,
            on: vec![],
            off: vec![],
            timeout_minutes: 0,
        };
        let rule_sets = vec![RuleSet::new("main", vec![rule])];
        let registry = PeerRegistry::new();
        let mut tracker = StreamTracker::new();
        let source = SystemName::new("local");

        let packet = dmrd(312_000, 7000, 312_000, Timeslot::Two, 42, SLOT_TYPE_VOICE_HEADER);
        let first = route(&packet, &source, &mut tracker, &rule_sets, &registry, t(0));
        assert_eq!(first.targets, vec![Target::System(SystemName::new("bm-7000"))]);

        let second = route(&packet, &source, &mut tracker, &rule_sets, &registry, t(1));
        assert!(second.targets.is_empty());
    }

    #[test]
    fn dynamic_subscriber_is_targeted_and_excludes_repeater_source() {
        let rule_sets: Vec<RuleSet> = vec![];
        let registry = PeerRegistry::new();
        let mut tracker = StreamTracker::new();

        let mut b = Peer::new_on_rptl(PeerId(312_001), addr("10.0.0.2:1"), 1, t(0));
        b.mark_connected(PeerConfig::default());
        b.subscriptions.apply_options(&crate::subscription::parse_options("TS2=7000"));
        registry.insert_on_rptl(b);

        let packet = dmrd(312_000, 7000, 312_000, Timeslot::Two, 42, SLOT_TYPE_VOICE_HEADER);
        let outcome = route(&packet, &SystemName::new("local"), &mut tracker, &rule_sets, &registry, t(0));
        assert_eq!(outcome.targets, vec![Target::Peer(PeerId(312_001))]);
    }

    #[test]
    fn voice_terminator_flags_stream_end() {
        let rule_sets: Vec<RuleSet> = vec![];
        let registry = PeerRegistry::new();
        let mut tracker = StreamTracker::new();
        let packet = dmrd(312_000, 7000, 312_000, Timeslot::One, 42, SLOT_TYPE_VOICE_TERMINATOR);
        let outcome = route(&packet, &SystemName::new("local"), &mut tracker, &rule_sets, &registry, t(0));
        assert!(outcome.should_end_stream);
    }
}
