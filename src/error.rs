//! Error types for the avsafe library.
//!
//! The taxonomy separates recoverable engine failures (out of memory,
//! invalid input) from violated API preconditions and from capability
//! probes that simply have no answer. Protocol rejections (feeding a full
//! codec, draining a hungry one) are *not* errors — they surface as
//! boolean or `Option` returns on the codec API.

use crate::properties::MediaKind;

/// Error type for all fallible avsafe operations
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    /// The engine could not allocate memory for the named object.
    #[error("out of memory allocating {0}")]
    OutOfMemory(&'static str),

    /// Malformed packet/frame content or an unsupported parameter combination.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A lifecycle or protocol precondition was violated by the caller.
    ///
    /// With the `fatal-preconditions` feature enabled this variant is never
    /// returned; the process aborts at the violation site instead.
    #[error("precondition violated: {0}")]
    Precondition(&'static str),

    /// The engine does not publish the requested capability list for this codec.
    #[error("codec {codec} does not publish a {list} list")]
    CapabilityUnknown {
        codec: &'static str,
        list: &'static str,
    },

    /// A capability query was issued against a codec of the wrong media kind.
    #[error("wrong media kind: codec is {actual:?}, query applies to {expected:?}")]
    WrongMediaKind {
        expected: MediaKind,
        actual: MediaKind,
    },

    /// No codec with the given id or name is registered with the engine.
    #[error("codec not found: {0}")]
    CodecNotFound(String),

    /// Unexpected engine failure outside the classified-result contract.
    #[error("engine failure: {0}")]
    Engine(String),
}

/// Result type for avsafe operations
pub type MediaResult<T> = Result<T, MediaError>;

/// Build a precondition-violation error, or abort when the
/// `fatal-preconditions` feature is enabled.
#[inline]
pub(crate) fn precondition(what: &'static str) -> MediaError {
    #[cfg(feature = "fatal-preconditions")]
    {
        panic!("precondition violated: {what}");
    }
    #[cfg(not(feature = "fatal-preconditions"))]
    {
        log::error!("precondition violated: {what}");
        MediaError::Precondition(what)
    }
}

impl MediaError {
    /// Check if this is a violated precondition
    #[inline]
    pub fn is_precondition(&self) -> bool {
        matches!(self, MediaError::Precondition(_))
    }

    /// Check if this is an out-of-memory condition
    #[inline]
    pub fn is_oom(&self) -> bool {
        matches!(self, MediaError::OutOfMemory(_))
    }

    /// Check if this is an unknown-capability condition
    ///
    /// Callers probing capabilities speculatively treat this as
    /// "assume compatible", not as a hard failure.
    #[inline]
    pub fn is_capability_unknown(&self) -> bool {
        matches!(self, MediaError::CapabilityUnknown { .. })
    }
}
