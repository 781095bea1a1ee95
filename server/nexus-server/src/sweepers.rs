//! Periodic maintenance tasks (§5 tasks 2-6): keepalive/timeout, stream
//! eviction, transmission-logger stale flush, dynamic-bridge cleanup, and
//! bridge-rule inactivity timers. Each runs on its own interval and observes
//! the shared cancellation token between ticks.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use nexus_core::dynamic_bridge::DEFAULT_DYNAMIC_IDLE;
use nexus_core::transmission::STALE_MAX_AGE_SECS;

use crate::state::ServerState;

const STREAM_SWEEP_INTERVAL: Duration = Duration::from_secs(30);
const STREAM_MAX_AGE_SECS: i64 = 60;
const TRANSMISSION_SWEEP_INTERVAL: Duration = Duration::from_secs(30);
const DYNAMIC_BRIDGE_SWEEP_INTERVAL: Duration = Duration::from_secs(10);
const BRIDGE_TIMER_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

async fn run_periodic(token: CancellationToken, period: Duration, mut tick: impl FnMut()) {
    let mut ticker = interval(period);
    loop {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = ticker.tick() => tick(),
        }
    }
}

/// Dead-peer sweep at `ping_time` seconds (§4.5): evicts peers silent for
/// longer than `ping_time * max_missed` and fires the disconnect hooks.
pub async fn keepalive_sweeper(state: Arc<ServerState>, token: CancellationToken) {
    let period = Duration::from_secs(state.ping_time_s.max(1) as u64);
    let mut ticker = interval(period);
    loop {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = ticker.tick() => {
                let now = Utc::now();
                let dead = state.registry.sweep_dead(now, state.ping_time_s, state.max_missed);
                if dead.is_empty() {
                    continue;
                }
                for id in &dead {
                    state.forget_peer(*id);
                    state.hooks.on_peer_disconnected(*id);
                }
                state.peer_metrics.peer_sweep_evicted(dead.len());
                info!(count = dead.len(), "evicted dead peers");
            }
        }
    }
}

pub async fn stream_sweeper(state: Arc<ServerState>, token: CancellationToken) {
    run_periodic(token, STREAM_SWEEP_INTERVAL, move || {
        let now = Utc::now();
        state.tracker.lock().sweep(now, chrono::Duration::seconds(STREAM_MAX_AGE_SECS));
    })
    .await;
}

pub async fn transmission_sweeper(state: Arc<ServerState>, token: CancellationToken) {
    let period = TRANSMISSION_SWEEP_INTERVAL;
    let mut ticker = interval(period);
    loop {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = ticker.tick() => {
                let now = Utc::now();
                let flushed = state
                    .transmission_logger
                    .lock()
                    .sweep_stale(now, chrono::Duration::seconds(STALE_MAX_AGE_SECS));
                for tx in flushed {
                    state.transmission_metrics.transmission_logged(tx.duration_seconds);
                    if let Err(e) = state.transmission_store.create(&tx).await {
                        state.transmission_metrics.persistence_error();
                        warn!(error = %e, "failed to persist stale-swept transmission");
                    }
                }
            }
        }
    }
}

pub async fn dynamic_bridge_sweeper(state: Arc<ServerState>, token: CancellationToken) {
    run_periodic(token, DYNAMIC_BRIDGE_SWEEP_INTERVAL, move || {
        let now = Utc::now();
        state.dynamic_bridges.lock().sweep(now, DEFAULT_DYNAMIC_IDLE);
    })
    .await;
}

/// Applies every expired bridge-rule inactivity timer (§4.3) by deactivating
/// the owning rule in whichever rule set holds it.
pub async fn bridge_timer_sweeper(state: Arc<ServerState>, token: CancellationToken) {
    run_periodic(token, BRIDGE_TIMER_SWEEP_INTERVAL, move || {
        let now = Utc::now();
        let expired = state.bridge_timers.lock().expired(now);
        if expired.is_empty() {
            return;
        }
        let mut rule_sets = state.rule_sets.write();
        for (system, tgid, ts) in expired {
            for rule_set in rule_sets.iter_mut() {
                rule_set.deactivate_exact(&system, tgid, ts);
            }
        }
    })
    .await;
}
