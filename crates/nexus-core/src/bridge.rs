//! Static bridge rule sets (§4.3): named tables of `(system, tgid, timeslot)`
//! routes with in-band activation/deactivation and per-rule inactivity
//! timers.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use nexus_proto::Timeslot;
use serde::{Deserialize, Serialize};

use crate::ids::SystemName;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    pub system: String,
    pub tgid: u32,
    pub timeslot: Timeslot,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub on: Vec<u32>,
    #[serde(default)]
    pub off: Vec<u32>,
    /// Inactivity timeout in minutes; `0` or absent disables the timer.
    #[serde(default, rename = "timeout_min")]
    pub timeout_minutes: u32,
}

#[derive(Clone, Debug)]
pub struct Rule {
    pub system: SystemName,
    pub tgid: u32,
    pub timeslot: Timeslot,
    pub active: bool,
    pub on: Vec<u32>,
    pub off: Vec<u32>,
    pub timeout_minutes: u32,
}

impl From<&RuleConfig> for Rule {
    fn from(cfg: &RuleConfig) -> Self {
        Rule {
            system: SystemName::new(&cfg.system),
            tgid: cfg.tgid,
            timeslot: cfg.timeslot,
            active: cfg.active,
            on: cfg.on.clone(),
            off: cfg.off.clone(),
            timeout_minutes: cfg.timeout_minutes,
        }
    }
}

/// A named rule set ("bridge"), §3. `RuleSet` owns its rules; timer
/// bookkeeping lives in the separate [`BridgeTimerRegistry`] so one registry
/// can be shared across rule sets keyed by `(system, tgid, timeslot)`.
pub struct RuleSet {
    pub name: String,
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(name: impl Into<String>, rules: Vec<Rule>) -> Self {
        RuleSet { name: name.into(), rules }
    }

    /// Active rules matching `(tgid, timeslot)` whose system differs from
    /// `source`, as required by the router (§4.6 step 2).
    pub fn matching(&self, tgid: u32, ts: Timeslot, source: &SystemName) -> Vec<&Rule> {
        self.rules
            .iter()
            .filter(|r| r.active && r.tgid == tgid && r.timeslot == ts && &r.system != source)
            .collect()
    }

    /// Whether any active rule in this set targets `(tgid, timeslot)`,
    /// regardless of system — used to decide whether a dynamic bridge may be
    /// created for that pair (§3: dynamic bridges only cover talkgroups not
    /// already covered by a static rule).
    pub fn covers(&self, tgid: u32, ts: Timeslot) -> bool {
        self.rules.iter().any(|r| r.active && r.tgid == tgid && r.timeslot == ts)
    }

    /// Scans rules whose `on[]` contains `tgid` and activates them, returning
    /// the `(system, tgid, timeslot)` keys touched (for timer scheduling).
    pub fn process_activation(&mut self, tgid: u32) -> Vec<(SystemName, u32, Timeslot)> {
        let mut touched = Vec::new();
        for rule in &mut self.rules {
            if rule.on.contains(&tgid) {
                rule.active = true;
                touched.push((rule.system.clone(), rule.tgid, rule.timeslot));
            }
        }
        touched
    }

    /// Scans rules whose `off[]` contains `tgid` and deactivates them.
    pub fn process_deactivation(&mut self, tgid: u32) -> Vec<(SystemName, u32, Timeslot)> {
        let mut touched = Vec::new();
        for rule in &mut self.rules {
            if rule.off.contains(&tgid) {
                rule.active = false;
                touched.push((rule.system.clone(), rule.tgid, rule.timeslot));
            }
        }
        touched
    }

    /// Finds the rule at `(system, tgid, timeslot)`, if any, and sets its
    /// `active` flag. Used when a timer in [`BridgeTimerRegistry`] expires.
    pub fn deactivate_exact(&mut self, system: &SystemName, tgid: u32, ts: Timeslot) {
        for rule in &mut self.rules {
            if &rule.system == system && rule.tgid == tgid && rule.timeslot == ts {
                rule.active = false;
            }
        }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

type TimerKey = (SystemName, u32, Timeslot);

/// Tracks per-rule inactivity deadlines, keyed by `(system, tgid, timeslot)`
/// so repeated activations idempotently refresh the same timer (§4.3).
#[derive(Default)]
pub struct BridgeTimerRegistry {
    deadlines: HashMap<TimerKey, DateTime<Utc>>,
}

impl BridgeTimerRegistry {
    pub fn new() -> Self {
        BridgeTimerRegistry { deadlines: HashMap::new() }
    }

    /// Starts or refreshes the timer for `key`, expiring `timeout_minutes`
    /// from `now`. A `timeout_minutes` of `0` clears any existing timer —
    /// the rule no longer self-deactivates.
    pub fn refresh(&mut self, key: TimerKey, timeout_minutes: u32, now: DateTime<Utc>) {
        if timeout_minutes == 0 {
            self.deadlines.remove(&key);
            return;
        }
        let deadline = now + chrono::Duration::minutes(timeout_minutes as i64);
        self.deadlines.insert(key, deadline);
    }

    pub fn cancel(&mut self, key: &TimerKey) {
        self.deadlines.remove(key);
    }

    /// Returns, and removes, every key whose timer has expired as of `now`.
    pub fn expired(&mut self, now: DateTime<Utc>) -> Vec<TimerKey> {
        let expired: Vec<TimerKey> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            self.deadlines.remove(key);
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn rule(system: &str, tgid: u32, ts: Timeslot, active: bool) -> Rule {
        Rule {
            system: SystemName::new(system),
            tgid,
            timeslot: ts,
            active,
            on: vec![],
            off: vec![],
            timeout_minutes: 0,
        }
    }

    #[test]
    fn matching_excludes_source_system_and_inactive_rules() {
        let rules = vec![
            rule("bm-3100", 3100, Timeslot::One, true),
            rule("bm-3100-off", 3100, Timeslot::One, false),
            rule("bm-wrong-ts", 3100, Timeslot::Two, true),
        ];
        let set = RuleSet::new("main", rules);
        let out = set.matching(3100, Timeslot::One, &SystemName::new("elsewhere"));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].system.as_str(), "bm-3100");

        let out_excl_source = set.matching(3100, Timeslot::One, &SystemName::new("bm-3100"));
        assert!(out_excl_source.is_empty());
    }

    #[test]
    fn covers_ignores_system_but_not_active_flag() {
        let rules = vec![
            rule("bm-3100", 3100, Timeslot::One, true),
            rule("bm-9000", 9000, Timeslot::One, false),
        ];
        let set = RuleSet::new("main", rules);
        assert!(set.covers(3100, Timeslot::One));
        assert!(!set.covers(3100, Timeslot::Two));
        assert!(!set.covers(9000, Timeslot::One));
    }

    #[test]
    fn in_band_activation_and_deactivation() {
        let mut rule = rule("bm-3100", 3100, Timeslot::One, false);
        rule.on = vec![9];
        rule.off = vec![9000];
        let mut set = RuleSet::new("main", vec![rule]);

        let touched = set.process_activation(9);
        assert_eq!(touched.len(), 1);
        assert!(set.rules()[0].active);

        let touched = set.process_deactivation(9000);
        assert_eq!(touched.len(), 1);
        assert!(!set.rules()[0].active);
    }

    #[test]
    fn timer_registry_refresh_is_idempotent_and_expires() {
        let mut timers = BridgeTimerRegistry::new();
        let key = (SystemName::new("bm-3100"), 3100, Timeslot::One);
        timers.refresh(key.clone(), 5, t(0));
        timers.refresh(key.clone(), 5, t(100));
        assert!(timers.expired(t(200)).is_empty());
        assert_eq!(timers.expired(t(401)), vec![key]);
    }

    #[test]
    fn zero_timeout_clears_the_timer() {
        let mut timers = BridgeTimerRegistry::new();
        let key = (SystemName::new("bm-3100"), 3100, Timeslot::One);
        timers.refresh(key.clone(), 5, t(0));
        timers.refresh(key, 0, t(1));
        assert!(timers.expired(t(1_000_000)).is_empty());
    }
}
