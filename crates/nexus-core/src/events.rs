//! Concurrent event fan-out (§4.7): the registry's `on_peer_connected`/
//! `on_peer_disconnected` hooks feed a bounded channel per subscriber,
//! mirroring the teacher's push-hub pattern — never block the network task.

use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::ids::PeerId;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NexusEvent {
    PeerConnected { id: u32, callsign: String, address: String },
    PeerDisconnected { id: u32 },
}

/// Bounded per-subscriber queues; a full queue drops the event rather than
/// block the caller, the same trade-off the teacher's `PushHub` makes.
#[derive(Default)]
pub struct EventHub {
    subscribers: RwLock<Vec<mpsc::Sender<NexusEvent>>>,
}

impl EventHub {
    pub fn new() -> Self {
        EventHub { subscribers: RwLock::new(Vec::new()) }
    }

    pub fn subscribe(&self, capacity: usize) -> mpsc::Receiver<NexusEvent> {
        let (tx, rx) = mpsc::channel(capacity);
        self.subscribers.write().push(tx);
        rx
    }

    fn publish(&self, event: NexusEvent) {
        let mut subs = self.subscribers.write();
        subs.retain(|tx| tx.try_send(event.clone()).is_ok() || !tx.is_closed());
    }
}

use crate::registry::RegistryHooks;

impl RegistryHooks for EventHub {
    fn on_peer_connected(&self, id: PeerId, callsign: &str, address: SocketAddr) {
        self.publish(NexusEvent::PeerConnected {
            id: id.0,
            callsign: callsign.to_string(),
            address: crate::peer::mask_address(address),
        });
    }

    fn on_peer_disconnected(&self, id: PeerId) {
        self.publish(NexusEvent::PeerDisconnected { id: id.0 });
    }
}

/// Combines an [`EventHub`] with any number of additional hooks (dashboard
/// live feed, publisher) so the registry only ever needs one hook object.
pub struct HookChain {
    hooks: Vec<Arc<dyn RegistryHooks>>,
}

impl HookChain {
    pub fn new(hooks: Vec<Arc<dyn RegistryHooks>>) -> Self {
        HookChain { hooks }
    }
}

impl RegistryHooks for HookChain {
    fn on_peer_connected(&self, id: PeerId, callsign: &str, address: SocketAddr) {
        for hook in &self.hooks {
            hook.on_peer_connected(id, callsign, address);
        }
    }

    fn on_peer_disconnected(&self, id: PeerId) {
        for hook in &self.hooks {
            hook.on_peer_disconnected(id);
        }
    }
}
