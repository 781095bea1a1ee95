use metrics::{counter, histogram};
use nexus_core::metrics_hooks::RouterMetrics;

pub struct PrometheusRouterMetrics {
    ns: &'static str,
}

impl PrometheusRouterMetrics {
    pub fn new(namespace: &'static str) -> Self {
        PrometheusRouterMetrics { ns: namespace }
    }
}

impl RouterMetrics for PrometheusRouterMetrics {
    fn packet_routed(&self, fanout: usize) {
        counter!(format!("{}_router_packets_routed_total", self.ns)).increment(1);
        histogram!(format!("{}_router_fanout", self.ns)).record(fanout as f64);
    }

    fn stream_dedup_drop(&self) {
        counter!(format!("{}_router_stream_dedup_drops_total", self.ns)).increment(1);
    }
}
