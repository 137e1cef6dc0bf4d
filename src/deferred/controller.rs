//! Capabilities handed to task code.
//!
//! A [`Controller`] lets the task body settle its own value and yield at
//! cooperative points; it cannot abort. A [`Resolver`] is the external
//! counterpart returned by [`Deferred::deferred`]. [`Prepared`] carries the
//! starter and aborter a preparer hands back.

use super::continuable::Resolution;
use super::Deferred;
use crate::error::{Error, Result};
use crate::tracing_compat::{debug, trace};
use crate::types::state::Transition;
use crate::types::{AbortReason, DeferredId, Outcome, State};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// A piece of task code run with the controller: a starter or a parked continuation.
pub(crate) type Continuation<T> = Box<dyn FnOnce(Controller<T>)>;

/// Abort hook; the returned value, if any, settles once the abort has taken effect.
pub(crate) type Aborter<T> = Box<dyn FnOnce(AbortReason, Controller<T>) -> Option<Deferred<()>>>;

/// Management functions returned by a preparer.
pub struct Prepared<T> {
    pub(crate) starter: Option<Continuation<T>>,
    pub(crate) aborter: Option<Aborter<T>>,
}

impl<T> Prepared<T> {
    /// Starter and aborter.
    ///
    /// The aborter receives the reason and a controller and may return a
    /// completion value; the abort is confirmed to subscribers once that
    /// completion settles.
    #[must_use]
    pub fn new<S, A>(starter: S, aborter: A) -> Self
    where
        S: FnOnce(Controller<T>) + 'static,
        A: FnOnce(AbortReason, Controller<T>) -> Option<Deferred<()>> + 'static,
    {
        Self {
            starter: Some(Box::new(starter)),
            aborter: Some(Box::new(aborter)),
        }
    }

    /// A starter with nothing to do on abort.
    #[must_use]
    pub fn with_starter<S>(starter: S) -> Self
    where
        S: FnOnce(Controller<T>) + 'static,
    {
        Self {
            starter: Some(Box::new(starter)),
            aborter: None,
        }
    }

    /// Nothing to start, nothing to abort; settled from elsewhere.
    #[must_use]
    pub fn inert() -> Self {
        Self {
            starter: None,
            aborter: None,
        }
    }

    /// Replaces the aborter.
    #[must_use]
    pub fn aborter<A>(mut self, aborter: A) -> Self
    where
        A: FnOnce(AbortReason, Controller<T>) -> Option<Deferred<()>> + 'static,
    {
        self.aborter = Some(Box::new(aborter));
        self
    }
}

impl<T> std::fmt::Debug for Prepared<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prepared")
            .field("starter", &self.starter.is_some())
            .field("aborter", &self.aborter.is_some())
            .finish()
    }
}

/// Settlement capability bound to one deferred value.
pub struct Controller<T> {
    target: Deferred<T>,
}

impl<T> Clone for Controller<T> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
        }
    }
}

impl<T: Clone + 'static> Controller<T> {
    pub(crate) const fn new(target: Deferred<T>) -> Self {
        Self { target }
    }

    pub(crate) const fn deferred(&self) -> &Deferred<T> {
        &self.target
    }

    /// Settles the value to success.
    ///
    /// A later settlement attempt is ignored and logged; one that disagrees
    /// with the stored outcome is counted as a conflict.
    pub fn success(&self, value: T) {
        self.target.settle(Outcome::Success(value));
    }

    /// Settles the value to failure.
    pub fn failure(&self, error: Error) {
        self.target.settle(Outcome::Failure(error));
    }

    /// Settles with a value or follows a continuation to its outcome.
    pub fn resolve(&self, resolution: Resolution<T>) {
        match resolution {
            Resolution::Value(v) => self.success(v),
            Resolution::Continue(next) => self.target.absorb(next),
        }
    }

    /// Id of the controlled value.
    #[must_use]
    pub fn id(&self) -> DeferredId {
        self.target.id()
    }

    /// Current state of the controlled value.
    #[must_use]
    pub fn state(&self) -> State {
        self.target.state()
    }

    /// True once the value has been aborted. Long-running task code should poll this.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.state() == State::Aborted
    }

    /// Runs `next` on a later turn if the value is running.
    ///
    /// While the value is paused, idle or not yet started, `next` is parked
    /// until it runs again; once settled, `next` is dropped.
    pub fn checkpoint(&self, next: impl FnOnce(Self) + 'static) {
        self.target.schedule_continuation(Box::new(next));
    }

    /// Yields: a running value becomes idle and `next` waits for [`wake`](Self::wake)
    /// (or `resume`/`pause`+`resume` from outside).
    pub fn idle(&self, next: impl FnOnce(Self) + 'static) {
        {
            let mut core = self.target.core.borrow_mut();
            let state = core.state;
            if let Transition::Apply(to) = state.on_idle() {
                core.state = to;
                debug!(deferred_id = %core.id, from = %state, to = %to, "went idle");
            }
        }
        if self.state().is_terminal() {
            trace!(deferred_id = %self.id(), "idle continuation dropped after settlement");
        } else {
            self.target.park(Box::new(next));
        }
    }

    /// Wakes an idle value and reschedules its parked continuations.
    pub fn wake(&self) {
        let woke = {
            let mut core = self.target.core.borrow_mut();
            let state = core.state;
            match state.on_wake() {
                Transition::Apply(to) => {
                    core.state = to;
                    debug!(deferred_id = %core.id, from = %state, to = %to, "woke");
                    true
                }
                Transition::NoOp | Transition::Reject => {
                    trace!(deferred_id = %core.id, state = %state, "wake ignored");
                    false
                }
            }
        };
        if woke {
            self.target.dispatch_parked();
        }
    }

    /// Diagnostic label of the controlled value.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}Controller", self.target.label())
    }
}

impl<T> std::fmt::Debug for Controller<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let core = self.target.core.borrow();
        f.debug_struct("Controller")
            .field("id", &core.id)
            .field("state", &core.state)
            .finish()
    }
}

/// External settlement handle for a value created with [`Deferred::deferred`].
pub struct Resolver<T> {
    target: Deferred<T>,
}

impl<T> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
        }
    }
}

impl<T: Clone + 'static> Resolver<T> {
    pub(crate) const fn new(target: Deferred<T>) -> Self {
        Self { target }
    }

    /// Settles the value to success.
    pub fn success(&self, value: T) {
        self.target.settle(Outcome::Success(value));
    }

    /// Settles the value to failure.
    pub fn failure(&self, error: Error) {
        self.target.settle(Outcome::Failure(error));
    }

    /// Settles with a value or follows a continuation.
    pub fn resolve(&self, resolution: Resolution<T>) {
        Controller::new(self.target.clone()).resolve(resolution);
    }

    /// Aborts the value.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidStateTransition`](crate::ErrorKind::InvalidStateTransition)
    /// if the value already succeeded or failed.
    pub fn abort(&self, message: Option<String>) -> Result<()> {
        self.target.abort(message).map(|_| ())
    }
}

impl<T> std::fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("id", &self.target.core.borrow().id)
            .finish()
    }
}

impl<T: Clone + 'static> Deferred<T> {
    /// Schedules task code to run on a later turn under the running check.
    pub(crate) fn schedule_continuation(&self, next: Continuation<T>) {
        let handle = self.core.borrow().handle.clone();
        let this = self.clone();
        handle.defer(move || this.run_continuation(next));
    }

    fn run_continuation(&self, next: Continuation<T>) {
        match self.state() {
            State::Running => {
                let ctl = Controller::new(self.clone());
                if let Err(payload) = catch_unwind(AssertUnwindSafe(move || next(ctl))) {
                    self.settle(Outcome::Failure(Error::callback_panicked(payload.as_ref())));
                }
            }
            State::Constructing | State::Ready | State::Paused | State::Idle => self.park(next),
            State::Succeeded | State::Failed | State::Aborted => {
                trace!(deferred_id = %self.id(), "continuation dropped after settlement");
            }
        }
    }

    pub(crate) fn park(&self, next: Continuation<T>) {
        let mut core = self.core.borrow_mut();
        core.parked.push_back(next);
        trace!(deferred_id = %core.id, parked = core.parked.len(), "continuation parked");
    }

    /// Reschedules every parked continuation.
    pub(crate) fn dispatch_parked(&self) {
        let parked = std::mem::take(&mut self.core.borrow_mut().parked);
        for next in parked {
            self.schedule_continuation(next);
        }
    }
}
