//! RadioID lookup (§9 expansion): optional callsign annotation for a radio
//! id. The registry and transmission logger hold this behind an `Arc<dyn
//! RadioIdLookup>` and never block on it — a cache miss is just a missing
//! callsign, never an error.

use std::collections::HashMap;

use async_trait::async_trait;

#[async_trait]
pub trait RadioIdLookup: Send + Sync {
    async fn lookup_callsign(&self, radio_id: u32) -> Option<String>;
}

pub struct NoopRadioIdLookup;

#[async_trait]
impl RadioIdLookup for NoopRadioIdLookup {
    async fn lookup_callsign(&self, _radio_id: u32) -> Option<String> {
        None
    }
}

/// In-memory lookup populated from a CSV sync (radioid.net-style export);
/// the sync job itself is an external collaborator out of scope here — this
/// type only holds the resulting table and answers lookups from it.
#[derive(Default)]
pub struct StaticRadioIdLookup {
    table: HashMap<u32, String>,
}

impl StaticRadioIdLookup {
    pub fn new(table: HashMap<u32, String>) -> Self {
        StaticRadioIdLookup { table }
    }

    /// Parses `radio_id,callsign` rows, skipping a header line if present
    /// and any row that fails to parse.
    pub fn from_csv(csv: &str) -> Self {
        let mut table = HashMap::new();
        for line in csv.lines() {
            let mut fields = line.splitn(2, ',');
            let (Some(id_field), Some(callsign_field)) = (fields.next(), fields.next()) else {
                continue;
            };
            if let Ok(id) = id_field.trim().parse::<u32>() {
                table.insert(id, callsign_field.trim().to_string());
            }
        }
        StaticRadioIdLookup { table }
    }
}

#[async_trait]
impl RadioIdLookup for StaticRadioIdLookup {
    async fn lookup_callsign(&self, radio_id: u32) -> Option<String> {
        self.table.get(&radio_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_lookup_always_returns_none() {
        assert_eq!(NoopRadioIdLookup.lookup_callsign(312_000).await, None);
    }

    #[tokio::test]
    async fn csv_lookup_finds_known_id_and_skips_bad_rows() {
        let lookup = StaticRadioIdLookup::from_csv("RADIO_ID,CALLSIGN\n312000,W1ABC\nnotanumber,XXXXX\n");
        assert_eq!(lookup.lookup_callsign(312_000).await, Some("W1ABC".to_string()));
        assert_eq!(lookup.lookup_callsign(999).await, None);
    }
}
