//! Identifier types for deferred values.
//!
//! Identifiers are allocated from a sequence owned by the event loop, so two
//! loops never share counters and a fresh loop starts numbering from one.

use core::fmt;

/// A unique identifier for a deferred value within one event loop.
///
/// Used for the chain-recursion identity check and for diagnostics.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeferredId(u64);

impl DeferredId {
    /// Creates an identifier from a loop sequence number (internal use).
    #[must_use]
    pub(crate) const fn from_seq(seq: u64) -> Self {
        Self(seq)
    }

    /// Returns the raw sequence number.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Creates an identifier for testing purposes.
    #[doc(hidden)]
    #[must_use]
    pub const fn new_for_test(seq: u64) -> Self {
        Self(seq)
    }
}

impl fmt::Debug for DeferredId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeferredId({})", self.0)
    }
}

impl fmt::Display for DeferredId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "D{}", self.0)
    }
}
