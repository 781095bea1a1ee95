//! Persistence interface (§6): `Transmission.create`, paged read-back, and
//! bulk delete by age. Mirrors the repo-trait-plus-sqlx-impl split the
//! control plane uses for its own tables.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use crate::errors::{NexusError, NexusResult};
use crate::transmission::Transmission;

#[derive(Clone, Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

#[derive(Clone, Copy, Debug, Default)]
pub enum TransmissionFilter {
    #[default]
    None,
    RadioId(u32),
    Tgid(u32),
}

#[async_trait]
pub trait TransmissionStore: Send + Sync {
    async fn create(&self, record: &Transmission) -> NexusResult<()>;
    async fn list(&self, filter: TransmissionFilter, page: i64, per_page: i64) -> NexusResult<Page<Transmission>>;
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> NexusResult<u64>;
}

pub struct SqlxTransmissionStore {
    pool: PgPool,
}

impl SqlxTransmissionStore {
    pub fn new(pool: PgPool) -> Self {
        SqlxTransmissionStore { pool }
    }

    pub async fn run_migrations(&self) -> NexusResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS transmissions (
                id BIGSERIAL PRIMARY KEY,
                radio_id BIGINT NOT NULL,
                tgid BIGINT NOT NULL,
                timeslot SMALLINT NOT NULL,
                stream_id BIGINT NOT NULL,
                repeater_id BIGINT NOT NULL,
                start_time TIMESTAMPTZ NOT NULL,
                end_time TIMESTAMPTZ NOT NULL,
                duration_seconds DOUBLE PRECISION NOT NULL,
                packet_count INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| NexusError::Persistence(e.to_string()))?;
        Ok(())
    }
}

fn timeslot_to_i16(ts: nexus_proto::Timeslot) -> i16 {
    ts.as_u8() as i16
}

fn timeslot_from_i16(v: i16) -> nexus_proto::Timeslot {
    nexus_proto::Timeslot::from_bit(v == 2)
}

#[async_trait]
impl TransmissionStore for SqlxTransmissionStore {
    async fn create(&self, record: &Transmission) -> NexusResult<()> {
        sqlx::query(
            r#"
            INSERT INTO transmissions
                (radio_id, tgid, timeslot, stream_id, repeater_id, start_time, end_time, duration_seconds, packet_count)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(record.radio_id as i64)
        .bind(record.tgid as i64)
        .bind(timeslot_to_i16(record.timeslot))
        .bind(record.stream_id as i64)
        .bind(record.repeater_id as i64)
        .bind(record.start_time)
        .bind(record.end_time)
        .bind(record.duration_seconds)
        .bind(record.packet_count as i32)
        .execute(&self.pool)
        .await
        .map_err(|e| NexusError::Persistence(e.to_string()))?;
        Ok(())
    }

    async fn list(&self, filter: TransmissionFilter, page: i64, per_page: i64) -> NexusResult<Page<Transmission>> {
        let offset = (page.max(1) - 1) * per_page;

        let (where_clause, bind_value): (&str, Option<i64>) = match filter {
            TransmissionFilter::None => ("", None),
            TransmissionFilter::RadioId(id) => ("WHERE radio_id = $3", Some(id as i64)),
            TransmissionFilter::Tgid(id) => ("WHERE tgid = $3", Some(id as i64)),
        };

        let query = format!(
            "SELECT radio_id, tgid, timeslot, stream_id, repeater_id, start_time, end_time, duration_seconds, packet_count
             FROM transmissions {where_clause}
             ORDER BY start_time DESC
             LIMIT $1 OFFSET $2"
        );
        let mut q = sqlx::query(&query).bind(per_page).bind(offset);
        if let Some(v) = bind_value {
            q = q.bind(v);
        }
        let rows = q.fetch_all(&self.pool).await.map_err(|e| NexusError::Persistence(e.to_string()))?;

        let items = rows
            .into_iter()
            .map(|r| Transmission {
                radio_id: r.get::<i64, _>("radio_id") as u32,
                tgid: r.get::<i64, _>("tgid") as u32,
                timeslot: timeslot_from_i16(r.get::<i16, _>("timeslot")),
                stream_id: r.get::<i64, _>("stream_id") as u32,
                repeater_id: r.get::<i64, _>("repeater_id") as u32,
                start_time: r.get("start_time"),
                end_time: r.get("end_time"),
                duration_seconds: r.get("duration_seconds"),
                packet_count: r.get::<i32, _>("packet_count") as u32,
            })
            .collect();

        let count_query = format!("SELECT COUNT(*) AS n FROM transmissions {where_clause}");
        let mut cq = sqlx::query(&count_query);
        if let Some(v) = bind_value {
            cq = cq.bind(v);
        }
        let total: i64 = cq
            .fetch_one(&self.pool)
            .await
            .map_err(|e| NexusError::Persistence(e.to_string()))?
            .get("n");

        Ok(Page { items, total, page, per_page })
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> NexusResult<u64> {
        let result = sqlx::query("DELETE FROM transmissions WHERE start_time < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| NexusError::Persistence(e.to_string()))?;
        Ok(result.rows_affected())
    }
}

/// In-memory store for tests and for servers with no database configured.
#[derive(Default)]
pub struct InMemoryTransmissionStore {
    records: parking_lot::RwLock<Vec<Transmission>>,
}

impl InMemoryTransmissionStore {
    pub fn new() -> Self {
        InMemoryTransmissionStore { records: parking_lot::RwLock::new(Vec::new()) }
    }
}

#[async_trait]
impl TransmissionStore for InMemoryTransmissionStore {
    async fn create(&self, record: &Transmission) -> NexusResult<()> {
        self.records.write().push(record.clone());
        Ok(())
    }

    async fn list(&self, filter: TransmissionFilter, page: i64, per_page: i64) -> NexusResult<Page<Transmission>> {
        let records = self.records.read();
        let mut matching: Vec<&Transmission> = records
            .iter()
            .filter(|r| match filter {
                TransmissionFilter::None => true,
                TransmissionFilter::RadioId(id) => r.radio_id == id,
                TransmissionFilter::Tgid(id) => r.tgid == id,
            })
            .collect();
        matching.sort_by(|a, b| b.start_time.cmp(&a.start_time));

        let total = matching.len() as i64;
        let start = ((page.max(1) - 1) * per_page).max(0) as usize;
        let items = matching
            .into_iter()
            .skip(start)
            .take(per_page.max(0) as usize)
            .cloned()
            .collect();

        Ok(Page { items, total, page, per_page })
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> NexusResult<u64> {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|r| r.start_time >= cutoff);
        Ok((before - records.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use nexus_proto::Timeslot;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn sample(stream_id: u32, start_secs: i64) -> Transmission {
        Transmission {
            radio_id: 312_000,
            tgid: 3100,
            timeslot: Timeslot::One,
            stream_id,
            repeater_id: 312_100,
            start_time: t(start_secs),
            end_time: t(start_secs + 2),
            duration_seconds: 2.0,
            packet_count: 10,
        }
    }

    #[tokio::test]
    async fn create_then_list_is_ordered_by_start_time_desc() {
        let store = InMemoryTransmissionStore::new();
        store.create(&sample(1, 0)).await.unwrap();
        store.create(&sample(2, 100)).await.unwrap();
        let page = store.list(TransmissionFilter::None, 1, 10).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].stream_id, 2);
        assert_eq!(page.items[1].stream_id, 1);
    }

    #[tokio::test]
    async fn filter_by_radio_id() {
        let store = InMemoryTransmissionStore::new();
        let mut other = sample(1, 0);
        other.radio_id = 999;
        store.create(&other).await.unwrap();
        store.create(&sample(2, 0)).await.unwrap();

        let page = store.list(TransmissionFilter::RadioId(312_000), 1, 10).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].stream_id, 2);
    }

    #[tokio::test]
    async fn pagination_splits_results() {
        let store = InMemoryTransmissionStore::new();
        for i in 0..5 {
            store.create(&sample(i, i as i64)).await.unwrap();
        }
        let page = store.list(TransmissionFilter::None, 1, 2).await.unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, 5);
    }

    #[tokio::test]
    async fn delete_older_than_removes_matching_rows() {
        let store = InMemoryTransmissionStore::new();
        store.create(&sample(1, 0)).await.unwrap();
        store.create(&sample(2, 1_000)).await.unwrap();
        let removed = store.delete_older_than(t(500)).await.unwrap();
        assert_eq!(removed, 1);
        let page = store.list(TransmissionFilter::None, 1, 10).await.unwrap();
        assert_eq!(page.total, 1);
    }
}
