//! Shared server state (§5): every collection the dispatch loop and
//! sweepers touch lives behind `Arc` plus the internal lock each type
//! already owns (`PeerRegistry`) or a `parking_lot::Mutex` wrapping the ones
//! whose API takes `&mut self` (`StreamTracker`, `BridgeTimerRegistry`,
//! `DynamicBridgeTable`, `TransmissionLogger`). Rule sets are read far more
//! often than written (only in-band activation mutates them), so they sit
//! behind a `RwLock` instead.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::net::UdpSocket;

use nexus_core::acl::AclSet;
use nexus_core::bridge::{BridgeTimerRegistry, RuleSet};
use nexus_core::dynamic_bridge::DynamicBridgeTable;
use nexus_core::events::EventHub;
use nexus_core::ids::{PeerId, SystemName};
use nexus_core::metrics_hooks::{AclMetrics, PeerMetrics, RouterMetrics, TransmissionMetrics};
use nexus_core::persist::TransmissionStore;
use nexus_core::publisher::EventPublisher;
use nexus_core::radioid::RadioIdLookup;
use nexus_core::registry::{PeerRegistry, RegistryHooks};
use nexus_core::stream_tracker::StreamTracker;
use nexus_core::transmission::TransmissionLogger;

/// One configured `systems:` entry, resolved into the pieces the dispatch
/// loop needs per datagram.
pub struct ListenerState {
    pub name: SystemName,
    pub passphrase: String,
    pub repeat: bool,
    pub acl: AclSet,
    pub socket: Arc<UdpSocket>,
}

/// Everything shared across every listener task and sweeper. Built once in
/// the supervisor and handed out as `Arc<ServerState>`.
pub struct ServerState {
    pub registry: PeerRegistry,
    pub tracker: Mutex<StreamTracker>,
    pub rule_sets: RwLock<Vec<RuleSet>>,
    pub bridge_timers: Mutex<BridgeTimerRegistry>,
    pub dynamic_bridges: Mutex<DynamicBridgeTable>,
    pub transmission_logger: Mutex<TransmissionLogger>,
    pub transmission_store: Arc<dyn TransmissionStore>,
    pub radioid: Arc<dyn RadioIdLookup>,
    pub publisher: Arc<dyn EventPublisher>,
    pub hooks: Arc<dyn RegistryHooks>,
    pub events: Arc<EventHub>,

    pub router_metrics: Arc<dyn RouterMetrics>,
    pub peer_metrics: Arc<dyn PeerMetrics>,
    pub transmission_metrics: Arc<dyn TransmissionMetrics>,
    pub acl_metrics: Arc<dyn AclMetrics>,

    /// Which named listener accepted a peer, so a static rule's `System`
    /// target and a `repeat` listener's egress can resolve back to a socket
    /// and a live peer set. The host application owns this mapping; the
    /// spec explicitly leaves egress-by-system-name to the host (§4.5 step 8).
    pub peer_system: RwLock<HashMap<PeerId, SystemName>>,
    pub listener_sockets: RwLock<HashMap<SystemName, Arc<UdpSocket>>>,

    pub ping_time_s: u32,
    pub max_missed: u32,
}

impl ServerState {
    /// Peers currently attributed to `system`, with their transport address.
    pub fn peers_of_system(&self, system: &SystemName) -> Vec<(PeerId, SocketAddr)> {
        let owners = self.peer_system.read();
        owners
            .iter()
            .filter(|(_, sys)| *sys == system)
            .filter_map(|(id, _)| self.registry.with_peer(*id, |p| (*id, p.address)))
            .collect()
    }

    pub fn socket_for_system(&self, system: &SystemName) -> Option<Arc<UdpSocket>> {
        self.listener_sockets.read().get(system).cloned()
    }

    pub fn forget_peer(&self, id: PeerId) {
        self.peer_system.write().remove(&id);
        self.dynamic_bridges.lock().unsubscribe_peer_everywhere(id);
    }
}
