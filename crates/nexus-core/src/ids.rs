use std::fmt;
use std::sync::Arc;

pub use nexus_proto::Timeslot;

/// A connected radio repeater, keyed by the 32-bit id it presents at `RPTL`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub u32);

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self.0)
    }
}
impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl From<u32> for PeerId {
    fn from(v: u32) -> Self {
        PeerId(v)
    }
}

/// Per-transmission identifier chosen by the originating peer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(pub u32);

impl fmt::Debug for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamId({})", self.0)
    }
}
impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl From<u32> for StreamId {
    fn from(v: u32) -> Self {
        StreamId(v)
    }
}

/// The name of a configured listener ("system"), used for loop prevention
/// and as the target identifier in static bridge rules.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SystemName(Arc<str>);

impl SystemName {
    pub fn new(s: impl AsRef<str>) -> Self {
        SystemName(Arc::from(s.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name used to track a listener's own loop-back traffic in the stream
    /// tracker when its `repeat` mode is enabled (§9 open question).
    pub fn self_loop(&self) -> Self {
        SystemName::new(format!("{}.self", self.0))
    }
}

impl fmt::Debug for SystemName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}
impl fmt::Display for SystemName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl From<&str> for SystemName {
    fn from(s: &str) -> Self {
        SystemName::new(s)
    }
}
impl From<String> for SystemName {
    fn from(s: String) -> Self {
        SystemName::new(s)
    }
}
