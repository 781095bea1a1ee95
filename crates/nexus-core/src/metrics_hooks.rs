//! Metrics hook traits, grouped by component the way the teacher's metrics
//! crate groups `voice`/`gateway`/`control` modules. Concrete `metrics`-crate
//! backed implementations live in `nexus-metrics`; these traits let core
//! code stay free of that dependency's details.

/// Router/dedup/fan-out counters.
pub trait RouterMetrics: Send + Sync {
    fn packet_routed(&self, fanout: usize);
    fn stream_dedup_drop(&self);
}

/// Peer registry and handshake counters.
pub trait PeerMetrics: Send + Sync {
    fn peer_connected(&self);
    fn peer_disconnected(&self);
    fn auth_failure(&self);
    fn peer_sweep_evicted(&self, count: usize);
}

/// Transmission-logger counters.
pub trait TransmissionMetrics: Send + Sync {
    fn transmission_logged(&self, duration_seconds: f64);
    fn transmission_discarded_too_short(&self);
    fn persistence_error(&self);
}

/// ACL evaluation counters.
pub trait AclMetrics: Send + Sync {
    fn acl_reject(&self, acl: &'static str);
}

pub struct NoopRouterMetrics;
impl RouterMetrics for NoopRouterMetrics {
    fn packet_routed(&self, _fanout: usize) {}
    fn stream_dedup_drop(&self) {}
}

pub struct NoopPeerMetrics;
impl PeerMetrics for NoopPeerMetrics {
    fn peer_connected(&self) {}
    fn peer_disconnected(&self) {}
    fn auth_failure(&self) {}
    fn peer_sweep_evicted(&self, _count: usize) {}
}

pub struct NoopTransmissionMetrics;
impl TransmissionMetrics for NoopTransmissionMetrics {
    fn transmission_logged(&self, _duration_seconds: f64) {}
    fn transmission_discarded_too_short(&self) {}
    fn persistence_error(&self) {}
}

pub struct NoopAclMetrics;
impl AclMetrics for NoopAclMetrics {
    fn acl_reject(&self, _acl: &'static str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_impls_do_not_panic() {
        NoopRouterMetrics.packet_routed(3);
        NoopRouterMetrics.stream_dedup_drop();
        NoopPeerMetrics.peer_connected();
        NoopTransmissionMetrics.transmission_logged(1.2);
        NoopAclMetrics.acl_reject("sub_acl");
    }
}
