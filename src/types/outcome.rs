//! Three-valued settlement outcome.
//!
//! A settled deferred value holds exactly one of:
//!
//! - `Success(T)`: the task produced a value
//! - `Failure(Error)`: the task, a handler, or the machinery failed
//! - `Aborted(AbortReason)`: the value was aborted
//!
//! Unlike a plain `Result`, abort is a first-class outcome rather than a
//! special error, so chain handlers can route it separately.

use super::abort::AbortReason;
use super::state::Phase;
use crate::error::Error;
use core::fmt;

/// The terminal outcome of a deferred value.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    /// Settled with a value.
    Success(T),
    /// Settled with an error.
    Failure(Error),
    /// Aborted with a reason.
    Aborted(AbortReason),
}

impl<T> Outcome<T> {
    /// Returns true if this outcome is `Success`.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns true if this outcome is `Failure`.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// Returns true if this outcome is `Aborted`.
    #[must_use]
    pub const fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted(_))
    }

    /// Returns the promise-style phase for this outcome.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        match self {
            Self::Success(_) => Phase::Fulfilled,
            Self::Failure(_) => Phase::Rejected,
            Self::Aborted(_) => Phase::Aborted,
        }
    }

    /// Returns the error, if this is a failure.
    #[must_use]
    pub const fn failure(&self) -> Option<&Error> {
        match self {
            Self::Failure(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the abort reason, if aborted.
    #[must_use]
    pub const fn abort_reason(&self) -> Option<&AbortReason> {
        match self {
            Self::Aborted(r) => Some(r),
            _ => None,
        }
    }

    /// Returns true if `other` provably settled the same way.
    ///
    /// Success values cannot be compared, so two successes are never the
    /// same settlement. Failures compare with [`Error::same_failure`] and
    /// aborts compare by kind.
    #[must_use]
    pub fn same_settlement<U>(&self, other: &Outcome<U>) -> bool {
        match (self, other) {
            (Self::Failure(a), Outcome::Failure(b)) => a.same_failure(b),
            (Self::Aborted(a), Outcome::Aborted(b)) => a.kind() == b.kind(),
            _ => false,
        }
    }

    /// Converts to a `Result`, treating abort as an [`ErrorKind::Aborted`](crate::ErrorKind::Aborted) error.
    pub fn into_result(self) -> crate::Result<T> {
        match self {
            Self::Success(v) => Ok(v),
            Self::Failure(e) => Err(e),
            Self::Aborted(r) => Err(Error::aborted(&r)),
        }
    }

    /// Returns the success value, discarding failures and aborts.
    pub fn ok(self) -> Option<T> {
        match self {
            Self::Success(v) => Some(v),
            _ => None,
        }
    }

    /// Maps the success value using the provided function.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Self::Success(v) => Outcome::Success(f(v)),
            Self::Failure(e) => Outcome::Failure(e),
            Self::Aborted(r) => Outcome::Aborted(r),
        }
    }

    /// Returns the success value or panics.
    ///
    /// # Panics
    ///
    /// Panics if the outcome is not `Success`.
    #[track_caller]
    pub fn unwrap(self) -> T {
        match self {
            Self::Success(v) => v,
            Self::Failure(e) => panic!("called `Outcome::unwrap()` on a `Failure` value: {e}"),
            Self::Aborted(r) => panic!("called `Outcome::unwrap()` on an `Aborted` value: {r}"),
        }
    }

    /// Returns the success value or a default.
    pub fn unwrap_or(self, default: T) -> T {
        match self {
            Self::Success(v) => v,
            _ => default,
        }
    }
}

impl<T> From<crate::Result<T>> for Outcome<T> {
    fn from(result: crate::Result<T>) -> Self {
        match result {
            Ok(v) => Self::Success(v),
            Err(e) => Self::Failure(e),
        }
    }
}

impl<T: fmt::Debug> fmt::Display for Outcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success(v) => write!(f, "success({v:?})"),
            Self::Failure(e) => write!(f, "failure({e})"),
            Self::Aborted(r) => write!(f, "aborted({r})"),
        }
    }
}
