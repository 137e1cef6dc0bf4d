//! Deferred values: a promise-like primitive with pause, resume and abort.
//!
//! - [`core`]: settlement state, outcome slot, subscriber queues
//! - [`controller`]: [`Controller`], [`Resolver`], [`Prepared`]
//! - [`lifecycle`]: `start` / `pause` / `resume` / `abort`
//! - [`chain`]: `then` / `catch` / `aborted` / `finally`
//! - [`continuable`]: absorbing other continuables into a value
//!
//! # Example
//!
//! ```
//! use settle::runtime::EventLoop;
//! use settle::{Deferred, Prepared, State};
//!
//! let mut event_loop = EventLoop::default();
//! let handle = event_loop.handle();
//!
//! let task = Deferred::new(&handle, |_ctl| {
//!     Some(Prepared::with_starter(|ctl| ctl.success(40)))
//! });
//! task.start_when_ready();
//! let answer = task.map(|v| v + 2);
//!
//! event_loop.run_until_idle();
//! assert_eq!(task.state(), State::Succeeded);
//! assert_eq!(answer.outcome().and_then(|o| o.ok()), Some(42));
//! ```

pub mod chain;
pub mod continuable;
pub mod controller;
pub(crate) mod core;
pub mod lifecycle;

pub use chain::Handlers;
pub use continuable::{Capabilities, Continuable, ContinueFn, Resolution, Sink};
pub use controller::{Controller, Prepared, Resolver};

use self::core::Core;
use crate::error::Error;
use crate::runtime::Handle;
use crate::tracing_compat::debug;
use crate::types::{AbortReason, DeferredId, Outcome, Phase, State};
use std::cell::RefCell;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

/// A deferred value: eventually succeeds, fails, or is aborted.
///
/// Cloning is cheap and yields another handle to the same value.
pub struct Deferred<T> {
    pub(crate) core: Rc<RefCell<Core<T>>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            core: Rc::clone(&self.core),
        }
    }
}

/// Point-in-time view of a value's bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostics {
    /// Identity.
    pub id: DeferredId,
    /// `Deferred<{created}-{suffix}:{state}>`.
    pub label: String,
    /// Lifecycle state.
    pub state: State,
    /// Number of continuations absorbed so far; only the latest one counts.
    pub then_chain_depth: u32,
    /// An absorbed continuable could not report failure.
    pub lost_failure: bool,
    /// An absorbed continuable could not report abort.
    pub lost_abort: bool,
    /// Settlement attempts that disagreed with the stored outcome.
    pub conflicts: u32,
    /// Success subscribers waiting for publication.
    pub pending_success: usize,
    /// Failure subscribers waiting for publication.
    pub pending_failure: usize,
    /// Abort subscribers waiting for publication.
    pub pending_abort: usize,
    /// The abort has been confirmed and published.
    pub abort_confirmed: bool,
}

impl<T: Clone + 'static> Deferred<T> {
    /// Creates a value whose `preparer` runs on a later turn.
    ///
    /// The preparer returns the starter and aborter, or settles through the
    /// controller and returns `None`. Returning `None` without settling fails
    /// the value with [`ErrorKind::InvalidPreparation`](crate::ErrorKind::InvalidPreparation);
    /// a panic fails it with [`ErrorKind::CallbackPanicked`](crate::ErrorKind::CallbackPanicked).
    /// If the value is aborted before the preparer runs, the preparer is skipped.
    pub fn new<F>(handle: &Handle, preparer: F) -> Self
    where
        F: FnOnce(&Controller<T>) -> Option<Prepared<T>> + 'static,
    {
        let this = Self::with_core(Core::new(handle, State::Constructing));
        let target = this.clone();
        handle.defer(move || target.prepare(preparer));
        debug!(deferred_id = %this.id(), "constructed");
        this
    }

    fn prepare<F>(&self, preparer: F)
    where
        F: FnOnce(&Controller<T>) -> Option<Prepared<T>>,
    {
        if self.state() != State::Constructing {
            debug!(deferred_id = %self.id(), state = %self.state(), "preparer skipped");
            return;
        }
        let ctl = Controller::new(self.clone());
        match catch_unwind(AssertUnwindSafe(|| preparer(&ctl))) {
            Err(payload) => {
                self.settle(Outcome::Failure(Error::callback_panicked(payload.as_ref())));
            }
            Ok(prepared) => match (self.state(), prepared) {
                (State::Constructing, Some(prepared)) => self.apply_prepared(prepared),
                (State::Constructing, None) => {
                    self.settle(Outcome::Failure(Error::invalid_preparation(self.id())));
                }
                (state, _) => {
                    debug!(deferred_id = %self.id(), state = %state, "settled during preparation");
                }
            },
        }
    }

    fn apply_prepared(&self, prepared: Prepared<T>) {
        let autostart = {
            let mut core = self.core.borrow_mut();
            core.starter = prepared.starter;
            core.aborter = prepared.aborter;
            core.state = State::Ready;
            debug!(deferred_id = %core.id, label = %core.label(), "prepared");
            core.autostart
        };
        if autostart {
            if let Err(err) = self.start() {
                debug!(deferred_id = %self.id(), error = %err, "auto-start rejected");
            }
        }
    }

    /// Creates a value that is already `Ready` with the given management functions.
    pub(crate) fn ready(handle: &Handle, prepared: Prepared<T>) -> Self {
        let mut core = Core::new(handle, State::Ready);
        core.starter = prepared.starter;
        core.aborter = prepared.aborter;
        Self::with_core(core)
    }

    /// Creates a value already settled to `outcome`.
    pub fn from_outcome(handle: &Handle, outcome: Outcome<T>) -> Self {
        let mut core = Core::new(handle, outcome.phase_state());
        core.outcome = Some(outcome);
        core.published = true;
        debug!(deferred_id = %core.id, state = %core.state, "constructed already settled");
        Self::with_core(core)
    }

    /// Creates a value that already succeeded.
    pub fn succeeded(handle: &Handle, value: T) -> Self {
        Self::from_outcome(handle, Outcome::Success(value))
    }

    /// Creates a value that already failed.
    pub fn failed(handle: &Handle, error: Error) -> Self {
        Self::from_outcome(handle, Outcome::Failure(error))
    }

    /// Creates a value that was already aborted by the user.
    pub fn already_aborted(handle: &Handle, message: Option<String>) -> Self {
        Self::from_outcome(handle, Outcome::Aborted(AbortReason::user(message)))
    }

    /// Promise-style `resolve`: a plain value succeeds at once, a continuation is absorbed.
    pub fn resolved(handle: &Handle, resolution: Resolution<T>) -> Self {
        match resolution {
            Resolution::Value(v) => Self::succeeded(handle, v),
            Resolution::Continue(next) => {
                let (this, resolver) = Self::deferred(handle);
                resolver.resolve(Resolution::Continue(next));
                this
            }
        }
    }

    /// A value settled from outside through the returned [`Resolver`].
    ///
    /// The value is `Ready` at once and has nothing to start or abort.
    pub fn deferred(handle: &Handle) -> (Self, Resolver<T>) {
        let this = Self::ready(handle, Prepared::inert());
        debug!(deferred_id = %this.id(), "deferred created");
        let resolver = Resolver::new(this.clone());
        (this, resolver)
    }

    /// A `Deferred<()>` that settles the same way once this value publishes its outcome.
    pub fn completion(&self) -> Deferred<()> {
        let handle = self.handle();
        let (done, resolver) = Deferred::<()>::deferred(&handle);
        let target = done.clone();
        self.on_publish(move |outcome| match outcome {
            Outcome::Success(_) => resolver.success(()),
            Outcome::Failure(e) => resolver.failure(e),
            Outcome::Aborted(r) => {
                if let Err(err) = target.abort_with(r) {
                    debug!(deferred_id = %target.id(), error = %err, "completion abort rejected");
                }
            }
        });
        done
    }
}

impl<T> Deferred<T> {
    /// Identity of this value on its loop.
    #[must_use]
    pub fn id(&self) -> DeferredId {
        self.core.borrow().id
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> State {
        self.core.borrow().state
    }

    /// Reduced promise-style phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.state().phase()
    }

    /// `Deferred<{created:.3}-{suffix}:{state:<12}>`.
    #[must_use]
    pub fn label(&self) -> String {
        self.core.borrow().label()
    }

    /// The loop this value lives on.
    #[must_use]
    pub fn handle(&self) -> Handle {
        self.core.borrow().handle.clone()
    }

    /// True once an abort has been confirmed and published to subscribers.
    #[must_use]
    pub fn abort_confirmed(&self) -> bool {
        let core = self.core.borrow();
        core.state == State::Aborted && core.published
    }

    pub(crate) fn then_chain_depth(&self) -> u32 {
        self.core.borrow().then_chain_depth
    }

    /// Snapshot of the bookkeeping behind this value.
    #[must_use]
    pub fn diagnostics(&self) -> Diagnostics {
        let core = self.core.borrow();
        Diagnostics {
            id: core.id,
            label: core.label(),
            state: core.state,
            then_chain_depth: core.then_chain_depth,
            lost_failure: core.lost_failure,
            lost_abort: core.lost_abort,
            conflicts: core.conflicts,
            pending_success: core.on_success.len(),
            pending_failure: core.on_failure.len(),
            pending_abort: core.on_abort.len(),
            abort_confirmed: core.state == State::Aborted && core.published,
        }
    }
}

impl<T: Clone> Deferred<T> {
    /// The stored outcome, once settled.
    #[must_use]
    pub fn outcome(&self) -> Option<Outcome<T>> {
        self.core.borrow().outcome.clone()
    }
}

impl<T> Outcome<T> {
    const fn phase_state(&self) -> State {
        match self {
            Self::Success(_) => State::Succeeded,
            Self::Failure(_) => State::Failed,
            Self::Aborted(_) => State::Aborted,
        }
    }
}

impl<T> fmt::Display for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.core.borrow();
        f.debug_struct("Deferred")
            .field("id", &core.id)
            .field("state", &core.state)
            .field("published", &core.published)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_utils::test_loop;

    // =========================================================================
    // Construction
    // =========================================================================

    #[test]
    fn preparer_runs_on_a_later_turn() {
        let mut lp = test_loop();
        let ran = Rc::new(std::cell::Cell::new(false));
        let flag = Rc::clone(&ran);
        let d = Deferred::<u8>::new(&lp.handle(), move |_| {
            flag.set(true);
            Some(Prepared::inert())
        });
        assert!(!ran.get());
        assert_eq!(d.state(), State::Constructing);
        lp.turn();
        assert!(ran.get());
        assert_eq!(d.state(), State::Ready);
    }

    #[test]
    fn preparer_returning_nothing_fails() {
        let mut lp = test_loop();
        let d = Deferred::<u8>::new(&lp.handle(), |_| None);
        lp.run_until_idle();
        let err = d.outcome().and_then(|o| o.failure().cloned()).unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidPreparation);
    }

    #[test]
    fn preparer_may_settle_directly() {
        let mut lp = test_loop();
        let d = Deferred::new(&lp.handle(), |ctl| {
            ctl.success("done");
            None
        });
        lp.run_until_idle();
        assert_eq!(d.outcome().and_then(Outcome::ok), Some("done"));
    }

    #[test]
    fn preparer_panic_becomes_failure() {
        let mut lp = test_loop();
        let d = Deferred::<u8>::new(&lp.handle(), |_| panic!("prep exploded"));
        lp.run_until_idle();
        let err = d.outcome().and_then(|o| o.failure().cloned()).unwrap();
        assert_eq!(err.kind(), ErrorKind::CallbackPanicked);
        assert_eq!(err.message(), Some("prep exploded"));
    }

    #[test]
    fn immediate_constructors() {
        let lp = test_loop();
        let h = lp.handle();
        assert_eq!(Deferred::succeeded(&h, 1).state(), State::Succeeded);
        assert_eq!(
            Deferred::<u8>::failed(&h, Error::user("x")).phase(),
            Phase::Rejected
        );
        let aborted = Deferred::<u8>::already_aborted(&h, Some("early".into()));
        assert!(aborted.abort_confirmed());
        assert_eq!(
            aborted.outcome().unwrap().abort_reason().and_then(AbortReason::message),
            Some("early")
        );
    }

    #[test]
    fn deferred_is_ready_and_inert() {
        let mut lp = test_loop();
        let (d, resolver) = Deferred::<u8>::deferred(&lp.handle());
        assert_eq!(d.state(), State::Ready);
        d.start().unwrap();
        lp.run_until_idle();
        assert_eq!(d.state(), State::Running);
        resolver.success(4);
        lp.run_until_idle();
        assert_eq!(d.outcome().and_then(Outcome::ok), Some(4));
    }

    #[test]
    fn completion_mirrors_publication() {
        let mut lp = test_loop();
        let (d, resolver) = Deferred::<u8>::deferred(&lp.handle());
        let done = d.completion();
        resolver.failure(Error::user("nope"));
        lp.run_until_idle();
        assert_eq!(done.phase(), Phase::Rejected);
    }

    #[test]
    fn diagnostics_snapshot() {
        let lp = test_loop();
        let d = Deferred::succeeded(&lp.handle(), 0u8);
        let diag = d.diagnostics();
        assert_eq!(diag.id, d.id());
        assert_eq!(diag.state, State::Succeeded);
        assert_eq!(diag.label, d.to_string());
        assert!(!diag.abort_confirmed);
    }
}
