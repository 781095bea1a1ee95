//! Prometheus-backed implementations of the metric hook traits `nexus-core`
//! declares (`RouterMetrics`, `PeerMetrics`, `TransmissionMetrics`,
//! `AclMetrics`), grouped one module per component the way the teacher's
//! metrics crate groups `voice`/`gateway`/`control`. The scrape HTTP surface
//! is the only exporter this crate builds; the rest of "metrics export" is
//! out of scope per the spec.

pub mod acl;
pub mod config;
pub mod http;
pub mod peer;
pub mod router;
pub mod transmission;

pub use acl::PrometheusAclMetrics;
pub use config::MetricsConfig;
pub use http::MetricsServer;
pub use peer::PrometheusPeerMetrics;
pub use router::PrometheusRouterMetrics;
pub use transmission::PrometheusTransmissionMetrics;

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_core::metrics_hooks::{AclMetrics, PeerMetrics, RouterMetrics, TransmissionMetrics};

    #[test]
    fn prometheus_impls_do_not_panic_without_an_installed_recorder() {
        // `metrics` macros no-op until a recorder is installed; these calls
        // exercise every hook without requiring `MetricsServer::install`.
        PrometheusRouterMetrics::new("dmr_nexus").packet_routed(2);
        PrometheusRouterMetrics::new("dmr_nexus").stream_dedup_drop();
        PrometheusPeerMetrics::new("dmr_nexus").peer_connected();
        PrometheusPeerMetrics::new("dmr_nexus").peer_sweep_evicted(3);
        PrometheusTransmissionMetrics::new("dmr_nexus").transmission_logged(2.0);
        PrometheusAclMetrics::new("dmr_nexus").acl_reject("tg2_acl");
    }
}
