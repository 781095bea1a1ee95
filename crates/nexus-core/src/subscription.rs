//! Per-peer subscription store (§4.4): static entries parsed once from the
//! `RPTC` options substring, dynamic entries refreshed by voice traffic and
//! expiring after their TTL.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use nexus_proto::Timeslot;

/// Floor applied to a dynamic TTL when `AUTO` is absent or implausibly low.
pub const MIN_DYNAMIC_TTL_SECS: i64 = 60;
pub const DEFAULT_DYNAMIC_TTL_SECS: i64 = 600;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
struct Key(u32, Timeslot);

enum Entry {
    Static,
    Dynamic { expires_at: DateTime<Utc> },
}

/// Options parsed from an `RPTC.description` tail (§4.4 grammar).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedOptions {
    pub ts1: Vec<u32>,
    pub ts2: Vec<u32>,
    pub auto_ttl_secs: Option<i64>,
}

/// Parses `KEY=VALUE;KEY=VALUE` segments. Malformed segments are skipped
/// silently; unknown keys are ignored, per §4.4.
pub fn parse_options(s: &str) -> ParsedOptions {
    let mut out = ParsedOptions::default();
    for segment in s.split(';') {
        let segment = segment.trim();
        let Some((key, value)) = segment.split_once('=') else {
            continue;
        };
        let key = key.trim().to_ascii_uppercase();
        let value = value.trim();
        match key.as_str() {
            "TS1" => out.ts1.extend(value.split(',').filter_map(|v| v.trim().parse().ok())),
            "TS2" => out.ts2.extend(value.split(',').filter_map(|v| v.trim().parse().ok())),
            "AUTO" => {
                if let Ok(secs) = value.parse::<i64>() {
                    out.auto_ttl_secs = Some(secs);
                }
            }
            _ => {}
        }
    }
    out
}

#[derive(Default)]
pub struct SubscriptionStore {
    entries: HashMap<Key, Entry>,
    auto_ttl_secs: i64,
}

impl SubscriptionStore {
    pub fn new() -> Self {
        SubscriptionStore { entries: HashMap::new(), auto_ttl_secs: DEFAULT_DYNAMIC_TTL_SECS }
    }

    /// Applies parsed `RPTC` options: static `TS1`/`TS2` entries and the
    /// per-peer `AUTO` TTL override, bounded below by [`MIN_DYNAMIC_TTL_SECS`].
    pub fn apply_options(&mut self, opts: &ParsedOptions) {
        if let Some(auto) = opts.auto_ttl_secs {
            self.auto_ttl_secs = auto.max(MIN_DYNAMIC_TTL_SECS);
        }
        for tgid in &opts.ts1 {
            self.entries.insert(Key(*tgid, Timeslot::One), Entry::Static);
        }
        for tgid in &opts.ts2 {
            self.entries.insert(Key(*tgid, Timeslot::Two), Entry::Static);
        }
    }

    /// True if a static entry exists, or a dynamic entry exists whose expiry
    /// is strictly after `now`. Expired dynamic entries found here are
    /// removed lazily.
    pub fn has(&mut self, tgid: u32, ts: Timeslot, now: DateTime<Utc>) -> bool {
        let key = Key(tgid, ts);
        match self.entries.get(&key) {
            Some(Entry::Static) => true,
            Some(Entry::Dynamic { expires_at }) => {
                if *expires_at > now {
                    true
                } else {
                    self.entries.remove(&key);
                    false
                }
            }
            None => false,
        }
    }

    /// Inserts or refreshes a dynamic entry's expiry to `now + AUTO_TTL`.
    /// A pre-existing static entry for the same key is left untouched.
    pub fn add_dynamic(&mut self, tgid: u32, ts: Timeslot, now: DateTime<Utc>) {
        let key = Key(tgid, ts);
        if matches!(self.entries.get(&key), Some(Entry::Static)) {
            return;
        }
        let expires_at = now + chrono::Duration::seconds(self.auto_ttl_secs);
        self.entries.insert(key, Entry::Dynamic { expires_at });
    }

    /// Eagerly removes all expired dynamic entries.
    pub fn expire_sweep(&mut self, now: DateTime<Utc>) {
        self.entries.retain(|_, entry| match entry {
            Entry::Static => true,
            Entry::Dynamic { expires_at } => *expires_at > now,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
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
    fn parses_ts1_ts2_and_auto() {
        let opts = parse_options("TS1=3100,3101;TS2=91;AUTO=300");
        assert_eq!(opts.ts1, vec![3100, 3101]);
        assert_eq!(opts.ts2, vec![91]);
        assert_eq!(opts.auto_ttl_secs, Some(300));
    }

    #[test]
    fn skips_malformed_segments_and_unknown_keys() {
        let opts = parse_options("garbage;TS1=3100;FOO=bar;=nope");
        assert_eq!(opts.ts1, vec![3100]);
        assert!(opts.ts2.is_empty());
    }

    #[test]
    fn static_subscription_never_expires() {
        let mut store = SubscriptionStore::new();
        store.apply_options(&parse_options("TS1=3100"));
        assert!(store.has(3100, Timeslot::One, t(10_000_000)));
    }

    #[test]
    fn dynamic_subscription_expires_after_ttl() {
        let mut store = SubscriptionStore::new();
        store.apply_options(&parse_options("AUTO=300"));
        store.add_dynamic(5000, Timeslot::One, t(0));
        assert!(store.has(5000, Timeslot::One, t(0)));
        assert!(store.has(5000, Timeslot::One, t(299)));
        assert!(!store.has(5000, Timeslot::One, t(301)));
    }

    #[test]
    fn auto_ttl_is_floored() {
        let mut store = SubscriptionStore::new();
        store.apply_options(&parse_options("AUTO=5"));
        store.add_dynamic(5000, Timeslot::One, t(0));
        assert!(store.has(5000, Timeslot::One, t(59)));
        assert!(!store.has(5000, Timeslot::One, t(61)));
    }

    #[test]
    fn refresh_extends_expiry() {
        let mut store = SubscriptionStore::new();
        store.apply_options(&parse_options("AUTO=300"));
        store.add_dynamic(5000, Timeslot::One, t(0));
        store.add_dynamic(5000, Timeslot::One, t(200));
        assert!(store.has(5000, Timeslot::One, t(400)));
    }

    #[test]
    fn expire_sweep_removes_only_expired_dynamic_entries() {
        let mut store = SubscriptionStore::new();
        store.apply_options(&parse_options("TS1=1;AUTO=100"));
        store.add_dynamic(2, Timeslot::One, t(0));
        store.expire_sweep(t(200));
        assert!(store.has(1, Timeslot::One, t(200)));
        assert!(!store.has(2, Timeslot::One, t(200)));
    }
}
