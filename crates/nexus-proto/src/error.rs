use thiserror::Error;

/// Failure modes for decoding a single UDP datagram into a [`crate::Message`].
///
/// Every variant is deliberately non-fatal to the caller: a `ParseError` means
/// "drop this datagram", never "the connection is broken".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("datagram length {got} does not match expected length for tag {tag:?} ({expected})")]
    WrongLength {
        tag: &'static str,
        expected: LengthExpectation,
        got: usize,
    },

    #[error("unrecognized tag in first bytes of datagram")]
    BadTag,

    #[error("malformed field `{0}`")]
    BadField(&'static str),
}

/// A tag's expected length is either exact, or (RPTC only) a minimum — see
/// the RPTC decoding note in `message.rs` for why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthExpectation {
    Exact(usize),
    AtLeast(usize),
}

impl std::fmt::Display for LengthExpectation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LengthExpectation::Exact(n) => write!(f, "exactly {n}"),
            LengthExpectation::AtLeast(n) => write!(f, "at least {n}"),
        }
    }
}
