//! Transmission logger (§4.8): aggregates per-stream packet flows into
//! `Transmission` records, filtering out anything under 0.5 s.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use nexus_proto::Timeslot;

use crate::ids::StreamId;

pub const MIN_TRANSMISSION_DURATION_SECS: f64 = 0.5;
pub const STALE_MAX_AGE_SECS: i64 = 60;

#[derive(Clone, Debug, PartialEq)]
pub struct Transmission {
    pub radio_id: u32,
    pub tgid: u32,
    pub timeslot: Timeslot,
    pub stream_id: u32,
    pub repeater_id: u32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: f64,
    pub packet_count: u32,
}

struct InFlight {
    radio_id: u32,
    tgid: u32,
    timeslot: Timeslot,
    repeater_id: u32,
    start_time: DateTime<Utc>,
    last_seen: DateTime<Utc>,
    packet_count: u32,
}

impl InFlight {
    fn finish(&self, end_time: DateTime<Utc>, stream_id: u32) -> Transmission {
        let duration_seconds = (end_time - self.start_time).num_milliseconds() as f64 / 1000.0;
        Transmission {
            radio_id: self.radio_id,
            tgid: self.tgid,
            timeslot: self.timeslot,
            stream_id,
            repeater_id: self.repeater_id,
            start_time: self.start_time,
            end_time,
            duration_seconds,
            packet_count: self.packet_count,
        }
    }
}

#[derive(Default)]
pub struct TransmissionLogger {
    in_flight: HashMap<StreamId, InFlight>,
}

impl TransmissionLogger {
    pub fn new() -> Self {
        TransmissionLogger { in_flight: HashMap::new() }
    }

    /// Records one `DMRD` packet for `stream_id`, inserting a new in-flight
    /// record on first sight or bumping `last_seen`/`packet_count`.
    pub fn record_packet(
        &mut self,
        stream_id: StreamId,
        radio_id: u32,
        tgid: u32,
        timeslot: Timeslot,
        repeater_id: u32,
        now: DateTime<Utc>,
    ) {
        self.in_flight
            .entry(stream_id)
            .and_modify(|r| {
                r.last_seen = now;
                r.packet_count += 1;
            })
            .or_insert_with(|| InFlight {
                radio_id,
                tgid,
                timeslot,
                repeater_id,
                start_time: now,
                last_seen: now,
                packet_count: 1,
            });
    }

    /// Called on a voice-terminator frame: finishes the stream and returns
    /// the record if it met the 0.5 s duration floor.
    pub fn finish_stream(&mut self, stream_id: StreamId) -> Option<Transmission> {
        let record = self.in_flight.remove(&stream_id)?;
        let transmission = record.finish(record.last_seen, stream_id.0);
        (transmission.duration_seconds >= MIN_TRANSMISSION_DURATION_SECS).then_some(transmission)
    }

    /// Stale-stream sweep (§4.8, runs every 30 s with `max_age = 60 s`):
    /// flushes and removes every entry idle longer than `max_age`.
    pub fn sweep_stale(&mut self, now: DateTime<Utc>, max_age: chrono::Duration) -> Vec<Transmission> {
        let stale_ids: Vec<StreamId> = self
            .in_flight
            .iter()
            .filter(|(_, r)| now - r.last_seen > max_age)
            .map(|(id, _)| *id)
            .collect();

        let mut flushed = Vec::new();
        for id in stale_ids {
            if let Some(record) = self.in_flight.remove(&id) {
                let transmission = record.finish(record.last_seen, id.0);
                if transmission.duration_seconds >= MIN_TRANSMISSION_DURATION_SECS {
                    flushed.push(transmission);
                }
            }
        }
        flushed
    }

    /// Flushes every in-flight stream meeting the duration floor,
    /// regardless of staleness. Used on graceful shutdown (§5).
    pub fn flush_all(&mut self) -> Vec<Transmission> {
        let now_markers: Vec<StreamId> = self.in_flight.keys().copied().collect();
        let mut flushed = Vec::new();
        for id in now_markers {
            if let Some(record) = self.in_flight.remove(&id) {
                let transmission = record.finish(record.last_seen, id.0);
                if transmission.duration_seconds >= MIN_TRANSMISSION_DURATION_SECS {
                    flushed.push(transmission);
                }
            }
        }
        flushed
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }
}
