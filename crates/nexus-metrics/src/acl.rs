use metrics::counter;
use nexus_core::metrics_hooks::AclMetrics;

pub struct PrometheusAclMetrics {
    ns: &'static str,
}

impl PrometheusAclMetrics {
    pub fn new(namespace: &'static str) -> Self {
        PrometheusAclMetrics { ns: namespace }
    }
}

impl AclMetrics for PrometheusAclMetrics {
    fn acl_reject(&self, acl: &'static str) {
        counter!(format!("{}_acl_rejected_total", self.ns), "acl" => acl).increment(1);
    }
}
