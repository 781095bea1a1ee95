//! DMR-Nexus core: the peer registry, subscription model, stream tracker,
//! bridge rule sets, router, and transmission logger that make up the DMR
//! conference-bridge state machine. Everything here is transport-agnostic —
//! `nexus-server` owns the UDP sockets and drives these types from decoded
//! `nexus_proto` messages.

pub mod acl;
pub mod bridge;
pub mod config;
pub mod dashboard;
pub mod dynamic_bridge;
pub mod errors;
pub mod events;
pub mod ids;
pub mod metrics_hooks;
pub mod peer;
pub mod persist;
pub mod publisher;
pub mod radioid;
pub mod registry;
pub mod router;
pub mod stream_tracker;
pub mod subscription;
pub mod transmission;

pub use errors::{NexusError, NexusResult};
pub use ids::{PeerId, StreamId, SystemName, Timeslot};
