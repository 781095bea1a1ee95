//! Stream tracker (§4.2): the primary loop-prevention mechanism. Tracks, per
//! live `stream_id`, the set of system names that have already handled it.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::ids::{StreamId, SystemName};

struct StreamRecord {
    created_at: DateTime<Utc>,
    handlers: HashSet<SystemName>,
}

#[derive(Default)]
pub struct StreamTracker {
    streams: HashMap<StreamId, StreamRecord>,
}

impl StreamTracker {
    pub fn new() -> Self {
        StreamTracker { streams: HashMap::new() }
    }

    /// Records `system` as a handler of `stream_id`. Returns `true` if this
    /// is the first time `system` has seen this stream (forward), `false`
    /// if `system` already handled it (reflection — do not forward).
    pub fn track(&mut self, stream_id: StreamId, system: &SystemName, now: DateTime<Utc>) -> bool {
        match self.streams.get_mut(&stream_id) {
            None => {
                let mut handlers = HashSet::new();
                handlers.insert(system.clone());
                self.streams.insert(stream_id, StreamRecord { created_at: now, handlers });
                true
            }
            Some(record) => {
                if record.handlers.contains(system) {
                    false
                } else {
                    record.handlers.insert(system.clone());
                    true
                }
            }
        }
    }

    /// Drops the record for `stream_id`. Called on voice-terminator frames
    /// and by the sweep below.
    pub fn end(&mut self, stream_id: StreamId) {
        self.streams.remove(&stream_id);
    }

    /// Evicts streams idle for longer than `max_age` (default 60 s, §5).
    pub fn sweep(&mut self, now: DateTime<Utc>, max_age: chrono::Duration) {
        self.streams.retain(|_, record| now - record.created_at <= max_age);
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
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
    fn first_handler_forwards() {
        let mut tracker = StreamTracker::new();
        let sys = SystemName::new("sys-a");
        assert!(tracker.track(StreamId(42), &sys, t(0)));
    }

    #[test]
    fn same_system_twice_is_a_reflection() {
        let mut tracker = StreamTracker::new();
        let sys = SystemName::new("sys-a");
        assert!(tracker.track(StreamId(42), &sys, t(0)));
        assert!(!tracker.track(StreamId(42), &sys, t(1)));
    }

    #[test]
    fn distinct_systems_each_forward_once() {
        let mut tracker = StreamTracker::new();
        let a = SystemName::new("sys-a");
        let b = SystemName::new("sys-b");
        assert!(tracker.track(StreamId(42), &a, t(0)));
        assert!(tracker.track(StreamId(42), &b, t(0)));
        assert!(!tracker.track(StreamId(42), &a, t(1)));
        assert!(!tracker.track(StreamId(42), &b, t(1)));
    }

    #[test]
    fn end_clears_the_record_so_a_new_one_begins() {
        let mut tracker = StreamTracker::new();
        let sys = SystemName::new("sys-a");
        tracker.track(StreamId(42), &sys, t(0));
        tracker.end(StreamId(42));
        assert!(tracker.track(StreamId(42), &sys, t(1)));
    }

    #[test]
    fn sweep_evicts_only_stale_streams() {
        let mut tracker = StreamTracker::new();
        let sys = SystemName::new("sys-a");
        tracker.track(StreamId(1), &sys, t(0));
        tracker.track(StreamId(2), &sys, t(100));
        tracker.sweep(t(130), chrono::Duration::seconds(60));
        assert!(!tracker.streams.contains_key(&StreamId(1)));
        assert!(tracker.streams.contains_key(&StreamId(2)));
    }
}
