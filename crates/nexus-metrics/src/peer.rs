use metrics::counter;
use nexus_core::metrics_hooks::PeerMetrics;

pub struct PrometheusPeerMetrics {
    ns: &'static str,
}

impl PrometheusPeerMetrics {
    pub fn new(namespace: &'static str) -> Self {
        PrometheusPeerMetrics { ns: namespace }
    }
}

impl PeerMetrics for PrometheusPeerMetrics {
    fn peer_connected(&self) {
        counter!(format!("{}_peer_connected_total", self.ns)).increment(1);
    }

    fn peer_disconnected(&self) {
        counter!(format!("{}_peer_disconnected_total", self.ns)).increment(1);
    }

    fn auth_failure(&self) {
        counter!(format!("{}_peer_auth_failure_total", self.ns)).increment(1);
    }

    fn peer_sweep_evicted(&self, count: usize) {
        counter!(format!("{}_peer_sweep_evicted_total", self.ns)).increment(count as u64);
    }
}
