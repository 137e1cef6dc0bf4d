//! Lifecycle states of a deferred value.
//!
//! ```text
//! Constructing -> Ready                      (preparer returned management functions)
//! Constructing -> Succeeded|Failed|Aborted   (immediate construction)
//! Ready -> Running                           (start)
//! Running <-> Paused                         (pause / resume)
//! Running <-> Idle                           (controller idles / wakes)
//! {Constructing,Ready,Running,Paused,Idle} -> Aborted
//! {non-terminal} -> Succeeded|Failed         (controller settles)
//! ```
//!
//! Every lifecycle operation is a match over [`State`] producing a
//! [`Transition`]; nothing leaves a terminal state.

use core::fmt;

/// Full lifecycle state of a deferred value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Preparer has not completed yet.
    Constructing,
    /// Prepared, waiting for `start`.
    Ready,
    /// Started and allowed to make progress.
    Running,
    /// Paused externally; the next cooperative point parks.
    Paused,
    /// The task yielded itself and waits to be woken.
    Idle,
    /// Settled with a value.
    Succeeded,
    /// Settled with an error.
    Failed,
    /// Aborted with a reason.
    Aborted,
}

/// Reduced, promise-style view of [`State`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Not settled.
    Pending,
    /// Settled with a value.
    Fulfilled,
    /// Settled with an error.
    Rejected,
    /// Aborted.
    Aborted,
}

/// Result of applying a lifecycle operation to a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transition {
    /// Move to the given state.
    Apply(State),
    /// Already where the operation leads; nothing to do.
    NoOp,
    /// Forbidden from the current state.
    Reject,
}

impl State {
    /// Returns true once the value has succeeded, failed or been aborted.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Aborted)
    }

    /// Returns true while the value may still settle.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if the task body was started and has not settled.
    #[must_use]
    pub const fn is_started(self) -> bool {
        matches!(self, Self::Running | Self::Paused | Self::Idle)
    }

    /// Returns the reduced promise-style phase.
    #[must_use]
    pub const fn phase(self) -> Phase {
        match self {
            Self::Constructing | Self::Ready | Self::Running | Self::Paused | Self::Idle => {
                Phase::Pending
            }
            Self::Succeeded => Phase::Fulfilled,
            Self::Failed => Phase::Rejected,
            Self::Aborted => Phase::Aborted,
        }
    }

    /// Lowercase name used in labels and messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Constructing => "constructing",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Idle => "idle",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Aborted => "aborted",
        }
    }

    pub(crate) const fn on_start(self) -> Transition {
        match self {
            Self::Ready => Transition::Apply(Self::Running),
            Self::Running | Self::Paused | Self::Idle => Transition::NoOp,
            Self::Constructing | Self::Succeeded | Self::Failed | Self::Aborted => {
                Transition::Reject
            }
        }
    }

    pub(crate) const fn on_pause(self) -> Transition {
        match self {
            Self::Running | Self::Idle => Transition::Apply(Self::Paused),
            Self::Paused => Transition::NoOp,
            Self::Constructing | Self::Ready | Self::Succeeded | Self::Failed | Self::Aborted => {
                Transition::Reject
            }
        }
    }

    pub(crate) const fn on_resume(self) -> Transition {
        match self {
            Self::Paused | Self::Idle => Transition::Apply(Self::Running),
            Self::Running => Transition::NoOp,
            Self::Constructing | Self::Ready | Self::Succeeded | Self::Failed | Self::Aborted => {
                Transition::Reject
            }
        }
    }

    pub(crate) const fn on_abort(self) -> Transition {
        match self {
            Self::Constructing | Self::Ready | Self::Running | Self::Paused | Self::Idle => {
                Transition::Apply(Self::Aborted)
            }
            Self::Aborted => Transition::NoOp,
            Self::Succeeded | Self::Failed => Transition::Reject,
        }
    }

    pub(crate) const fn on_idle(self) -> Transition {
        match self {
            Self::Running => Transition::Apply(Self::Idle),
            Self::Idle => Transition::NoOp,
            Self::Constructing
            | Self::Ready
            | Self::Paused
            | Self::Succeeded
            | Self::Failed
            | Self::Aborted => Transition::Reject,
        }
    }

    pub(crate) const fn on_wake(self) -> Transition {
        match self {
            Self::Idle => Transition::Apply(Self::Running),
            Self::Running => Transition::NoOp,
            Self::Constructing
            | Self::Ready
            | Self::Paused
            | Self::Succeeded
            | Self::Failed
            | Self::Aborted => Transition::Reject,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Fulfilled => f.write_str("fulfilled"),
            Self::Rejected => f.write_str("rejected"),
            Self::Aborted => f.write_str("aborted"),
        }
    }
}
