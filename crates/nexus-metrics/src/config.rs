/// Metrics HTTP exporter configuration; built from the config schema's
/// `metrics.prometheus` section (§6).
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    /// Bind address for the Prometheus scrape endpoint, e.g. `0.0.0.0:9100`.
    pub listen: String,

    /// Path the scrape endpoint is served on, e.g. `/metrics`.
    pub path: String,

    /// Namespace prefix applied to every metric name, e.g. `dmr_nexus`.
    pub namespace: &'static str,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        MetricsConfig {
            listen: "0.0.0.0:9100".to_string(),
            path: "/metrics".to_string(),
            namespace: "dmr_nexus",
        }
    }
}
