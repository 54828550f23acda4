//! Error taxonomy for the engine.

use thiserror::Error;

/// Every fallible core operation returns this type.
///
/// Recoverable errors surface here as returned values; `InternalInvariantViolation`
/// is reserved for conditions that indicate a bug in the engine itself, never
/// memory pressure or bad user input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A rule string could not be parsed. The current rule is left untouched.
    #[error("rule parse error: {0}")]
    RuleParse(String),

    /// The rule's background flickers (B0 without the Smax partner) and the
    /// hashed engine cannot represent it.
    #[error("rule `{0}` has a live background without the Smax partner and cannot run in the hashed engine")]
    UnsupportedByHashed(String),

    /// A `.mc` line referenced an out-of-range node, or was otherwise malformed.
    #[error("macrocell parse error: {0}")]
    MacrocellParse(String),

    /// `set_increment` was given a value that does not factor as `2^k * odd`
    /// with `odd` fitting in 31 bits.
    #[error("increment `{0}` does not factor as 2^k * odd(<=31 bits)")]
    IncrementFactor(String),

    /// Cooperative cancellation signalled by the poller. Not a hard error;
    /// callers that see this know the operation stopped at a consistent
    /// boundary rather than mid-computation.
    #[error("operation interrupted by poller")]
    Interrupted,

    /// An invariant the engine itself must uphold was violated. This
    /// indicates a bug, not user error or resource exhaustion.
    #[error("internal invariant violation: {0}")]
    InternalInvariantViolation(String),

    /// A resize or allocation could not be satisfied. Not returned to abort
    /// an operation; the engine degrades (longer hash chains, a raised
    /// memory limit) and logs a warning through its configured `ErrorSink`.
    #[error("allocator refused a resize; continuing with degraded performance")]
    OutOfMemoryDegraded,
}

impl EngineError {
    pub fn rule_parse(msg: impl Into<String>) -> Self {
        EngineError::RuleParse(msg.into())
    }

    pub fn macrocell(msg: impl Into<String>) -> Self {
        EngineError::MacrocellParse(msg.into())
    }
}
