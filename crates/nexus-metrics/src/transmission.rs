use metrics::{counter, histogram};
use nexus_core::metrics_hooks::TransmissionMetrics;

pub struct PrometheusTransmissionMetrics {
    ns: &'static str,
}

impl PrometheusTransmissionMetrics {
    pub fn new(namespace: &'static str) -> Self {
        PrometheusTransmissionMetrics { ns: namespace }
    }
}

impl TransmissionMetrics for PrometheusTransmissionMetrics {
    fn transmission_logged(&self, duration_seconds: f64) {
        counter!(format!("{}_transmission_logged_total", self.ns)).increment(1);
        histogram!(format!("{}_transmission_duration_seconds", self.ns)).record(duration_seconds);
    }

    fn transmission_discarded_too_short(&self) {
        counter!(format!("{}_transmission_discarded_too_short_total", self.ns)).increment(1);
    }

    fn persistence_error(&self) {
        counter!(format!("{}_transmission_persistence_errors_total", self.ns)).increment(1);
    }
}
