use thiserror::Error;

pub type NexusResult<T> = Result<T, NexusError>;

/// Error kinds per §7. Every variant is non-fatal to the server process —
/// the dispatcher decides whether to drop, NAK, or evict based on which
/// variant it receives. The only fatal errors (config load, listener bind,
/// persistence backend open) are plain `anyhow::Error` at the supervisor
/// boundary, never this type.
#[derive(Error, Debug)]
pub enum NexusError {
    #[error("malformed wire message: {0}")]
    Parse(#[from] nexus_proto::ParseError),

    #[error("authentication failed: {0}")]
    Auth(&'static str),

    #[error("ACL rejected: {0}")]
    AclReject(&'static str),

    #[error("source address mismatch for known peer")]
    Spoof,

    #[error("timed out: {0}")]
    Timeout(&'static str),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("socket send error: {0}")]
    Socket(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("not found: {0}")]
    NotFound(&'static str),
}
