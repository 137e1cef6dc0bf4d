//! Absorbing continuables.
//!
//! A handler (or a controller) may settle a value with another continuable
//! instead of a plain value. The value then follows that continuable to its
//! outcome. Absorption checks capabilities once through [`Continuable::capabilities`];
//! a continuable that cannot report failure or abort is still followed, and
//! the lost capability is recorded for diagnostics.
//!
//! Every absorption bumps the value's then-chain depth. Only the [`Sink`]
//! carrying the current depth may settle the value; a sink from an earlier
//! absorption is ignored.

use super::Deferred;
use crate::error::{Error, Result};
use crate::tracing_compat::{debug, trace, warn};
use crate::types::{AbortReason, DeferredId, Outcome};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// What a continuable can report besides success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capabilities {
    /// Can report failure.
    pub failure: bool,
    /// Can report abort.
    pub abort: bool,
}

impl Capabilities {
    /// Success, failure and abort.
    pub const ALL: Self = Self {
        failure: true,
        abort: true,
    };

    /// Success and failure, like a plain promise.
    pub const NO_ABORT: Self = Self {
        failure: true,
        abort: false,
    };

    /// Success only.
    pub const SUCCESS_ONLY: Self = Self {
        failure: false,
        abort: false,
    };
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::ALL
    }
}

/// Something a deferred value can follow to an outcome.
pub trait Continuable<T> {
    /// Outcomes this continuable can report. Checked once per absorption.
    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    /// Identity, when the continuable is itself a deferred value.
    fn deferred_id(&self) -> Option<DeferredId> {
        None
    }

    /// Registers `sink` to receive the eventual outcome.
    ///
    /// # Errors
    ///
    /// A registration failure fails the absorbing value.
    fn continue_with(self: Box<Self>, sink: Sink<T>) -> Result<()>;
}

/// Result of a handler: a plain value or a continuable to follow.
pub enum Resolution<T> {
    /// Settle with this value.
    Value(T),
    /// Follow this continuable.
    Continue(Box<dyn Continuable<T>>),
}

impl<T> Resolution<T> {
    /// Settle with `value`.
    pub const fn value(value: T) -> Self {
        Self::Value(value)
    }

    /// Follow `next`.
    pub fn continue_with(next: impl Continuable<T> + 'static) -> Self {
        Self::Continue(Box::new(next))
    }
}

impl<T: 'static> From<Deferred<T>> for Resolution<T>
where
    T: Clone,
{
    fn from(d: Deferred<T>) -> Self {
        Self::Continue(Box::new(d))
    }
}

impl<T: fmt::Debug> fmt::Debug for Resolution<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Continue(next) => f
                .debug_struct("Continue")
                .field("deferred_id", &next.deferred_id())
                .field("capabilities", &next.capabilities())
                .finish(),
        }
    }
}

/// A continuable built from a closure.
///
/// ```
/// use settle::runtime::EventLoop;
/// use settle::{Capabilities, ContinueFn, Deferred, Resolution, Sink};
///
/// let mut event_loop = EventLoop::default();
/// let handle = event_loop.handle();
/// let foreign = ContinueFn::new(|sink: Sink<i32>| -> settle::Result<()> {
///     sink.success(7);
///     Ok(())
/// })
/// .with_capabilities(Capabilities::NO_ABORT);
/// let value = Deferred::resolved(&handle, Resolution::continue_with(foreign));
/// event_loop.run_until_idle();
/// assert_eq!(value.outcome().and_then(|o| o.ok()), Some(7));
/// assert!(value.diagnostics().lost_abort);
/// ```
pub struct ContinueFn<F> {
    f: F,
    capabilities: Capabilities,
}

impl<F> ContinueFn<F> {
    /// Wraps `f`; declared capabilities default to [`Capabilities::ALL`].
    pub const fn new(f: F) -> Self {
        Self {
            f,
            capabilities: Capabilities::ALL,
        }
    }

    /// Declares what this continuable can report.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }
}

impl<T, F> Continuable<T> for ContinueFn<F>
where
    F: FnOnce(Sink<T>) -> Result<()>,
{
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn continue_with(self: Box<Self>, sink: Sink<T>) -> Result<()> {
        (self.f)(sink)
    }
}

impl<F> fmt::Debug for ContinueFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContinueFn")
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

/// Receives the outcome of an absorbed continuable on behalf of a deferred value.
pub struct Sink<T> {
    target: Deferred<T>,
    depth: u32,
}

impl<T> Clone for Sink<T> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            depth: self.depth,
        }
    }
}

impl<T: Clone + 'static> Sink<T> {
    fn is_current(&self, what: &str) -> bool {
        let current = self.target.then_chain_depth();
        if current == self.depth {
            return true;
        }
        debug!(
            deferred_id = %self.target.id(),
            current,
            ignored = what,
            "continuation #{} has been replaced",
            self.depth
        );
        false
    }

    /// Forwards success.
    pub fn success(&self, value: T) {
        if self.is_current("success") {
            self.target.settle(Outcome::Success(value));
        }
    }

    /// Forwards failure.
    pub fn failure(&self, error: Error) {
        if self.is_current("failure") {
            self.target.settle(Outcome::Failure(error));
        }
    }

    /// Forwards an abort.
    pub fn abort(&self, reason: AbortReason) {
        if !self.is_current("abort") {
            return;
        }
        if self.target.state().is_terminal() {
            self.target.report_conflict(&Outcome::<()>::Aborted(reason));
        } else if let Err(err) = self.target.abort_with(reason) {
            debug!(deferred_id = %self.target.id(), error = %err, "forwarded abort rejected");
        }
    }

    /// Forwards a value or follows yet another continuable.
    pub fn resolve(&self, resolution: Resolution<T>) {
        match resolution {
            Resolution::Value(v) => self.success(v),
            Resolution::Continue(next) => {
                if self.is_current("continuation") {
                    self.target.absorb(next);
                }
            }
        }
    }

    /// Id of the value this sink settles.
    #[must_use]
    pub fn target_id(&self) -> DeferredId {
        self.target.id()
    }
}

impl<T> fmt::Debug for Sink<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink")
            .field("target", &self.target.core.borrow().id)
            .field("depth", &self.depth)
            .finish()
    }
}

impl<T: Clone + 'static> Deferred<T> {
    /// Follows `next` to its outcome.
    pub(crate) fn absorb(&self, next: Box<dyn Continuable<T>>) {
        if self.state().is_terminal() {
            self.report_conflict(&Outcome::<()>::Success(()));
            return;
        }
        let id = self.id();
        if next.deferred_id() == Some(id) {
            debug!(deferred_id = %id, "resolved with itself");
            self.settle(Outcome::Failure(Error::chain_recursion(id)));
            return;
        }

        let capabilities = next.capabilities();
        let (depth, handle) = {
            let mut core = self.core.borrow_mut();
            core.then_chain_depth += 1;
            if !capabilities.failure {
                core.lost_failure = true;
                core.lost_abort = true;
            } else if !capabilities.abort {
                core.lost_abort = true;
            }
            if !capabilities.failure || !capabilities.abort {
                warn!(
                    deferred_id = %id,
                    failure = capabilities.failure,
                    abort = capabilities.abort,
                    "absorbed continuable cannot report every outcome"
                );
            }
            debug!(
                deferred_id = %id,
                depth = core.then_chain_depth,
                source = ?next.deferred_id(),
                "absorbing continuation"
            );
            (core.then_chain_depth, core.handle.clone())
        };

        let sink = Sink {
            target: self.clone(),
            depth,
        };
        let target = self.clone();
        handle.defer(move || {
            let error = match catch_unwind(AssertUnwindSafe(move || next.continue_with(sink))) {
                Ok(Ok(())) => return,
                Ok(Err(err)) => err,
                Err(payload) => Error::callback_panicked(payload.as_ref()),
            };
            if target.then_chain_depth() == depth && !target.state().is_terminal() {
                target.settle(Outcome::Failure(error));
            } else {
                trace!(deferred_id = %target.id(), error = %error, "stale registration failure ignored");
            }
        });
    }
}

impl<T: Clone + 'static> Continuable<T> for Deferred<T> {
    fn deferred_id(&self) -> Option<DeferredId> {
        Some(self.id())
    }

    fn continue_with(self: Box<Self>, sink: Sink<T>) -> Result<()> {
        self.start_when_ready();
        let (on_success, on_failure, on_abort) = (sink.clone(), sink.clone(), sink);
        self.subscribe(
            Box::new(move |v| on_success.success(v)),
            Box::new(move |e| on_failure.failure(e)),
            Box::new(move |r| on_abort.abort(r)),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_utils::test_loop;
    use crate::types::State;
    use std::cell::RefCell;
    use std::rc::Rc;

    // =========================================================================
    // Recursion
    // =========================================================================

    #[test]
    fn resolving_with_itself_fails() {
        let mut lp = test_loop();
        let (d, resolver) = Deferred::<u8>::deferred(&lp.handle());
        resolver.resolve(d.clone().into());
        lp.run_until_idle();
        let err = d.outcome().and_then(|o| o.failure().cloned()).unwrap();
        assert_eq!(err.kind(), ErrorKind::ChainRecursion);
        assert_eq!(d.then_chain_depth(), 0);
    }

    // =========================================================================
    // Following a continuable
    // =========================================================================

    #[test]
    fn follows_another_deferred() {
        let mut lp = test_loop();
        let h = lp.handle();
        let (inner, inner_resolver) = Deferred::<u8>::deferred(&h);
        let outer = Deferred::<u8>::resolved(&h, inner.into());
        lp.run_until_idle();
        assert_eq!(outer.state(), State::Ready);
        inner_resolver.success(11);
        lp.run_until_idle();
        assert_eq!(outer.outcome().and_then(Outcome::ok), Some(11));
    }

    #[test]
    fn stale_sink_is_ignored() {
        let mut lp = test_loop();
        let h = lp.handle();
        let first: Rc<RefCell<Option<Sink<u8>>>> = Rc::new(RefCell::new(None));
        let slot = Rc::clone(&first);
        let (d, resolver) = Deferred::<u8>::deferred(&h);
        resolver.resolve(Resolution::continue_with(ContinueFn::new(move |sink: Sink<u8>| -> Result<()> {
            *slot.borrow_mut() = Some(sink);
            Ok(())
        })));
        lp.run_until_idle();

        let (second, second_resolver) = Deferred::<u8>::deferred(&h);
        resolver.resolve(second.into());
        lp.run_until_idle();
        assert_eq!(d.then_chain_depth(), 2);

        let stale = first.borrow_mut().take().unwrap();
        stale.success(1);
        assert_eq!(d.state(), State::Ready);
        second_resolver.success(2);
        lp.run_until_idle();
        assert_eq!(d.outcome().and_then(Outcome::ok), Some(2));
        assert_eq!(d.diagnostics().conflicts, 0);
    }

    #[test]
    fn registration_error_fails_the_value() {
        let mut lp = test_loop();
        let d = Deferred::<u8>::resolved(
            &lp.handle(),
            Resolution::continue_with(ContinueFn::new(|_sink: Sink<u8>| -> Result<()> {
                Err(Error::continuation_failed("refused"))
            })),
        );
        lp.run_until_idle();
        let err = d.outcome().and_then(|o| o.failure().cloned()).unwrap();
        assert_eq!(err.kind(), ErrorKind::ContinuationFailed);
    }

    #[test]
    fn panicking_registration_fails_the_value() {
        let mut lp = test_loop();
        let d = Deferred::<u8>::resolved(
            &lp.handle(),
            Resolution::continue_with(ContinueFn::new(|_sink: Sink<u8>| -> Result<()> {
                panic!("registration exploded")
            })),
        );
        lp.run_until_idle();
        let err = d.outcome().and_then(|o| o.failure().cloned()).unwrap();
        assert_eq!(err.kind(), ErrorKind::CallbackPanicked);
    }

    // =========================================================================
    // Capabilities
    // =========================================================================

    #[test]
    fn lost_capabilities_are_recorded() {
        let mut lp = test_loop();
        let h = lp.handle();
        let success_only = Deferred::<u8>::resolved(
            &h,
            Resolution::continue_with(
                ContinueFn::new(|sink: Sink<u8>| -> Result<()> {
                    sink.success(1);
                    Ok(())
                })
                .with_capabilities(Capabilities::SUCCESS_ONLY),
            ),
        );
        let no_abort = Deferred::<u8>::resolved(
            &h,
            Resolution::continue_with(
                ContinueFn::new(|sink: Sink<u8>| -> Result<()> {
                    sink.failure(Error::user("x"));
                    Ok(())
                })
                .with_capabilities(Capabilities::NO_ABORT),
            ),
        );
        lp.run_until_idle();
        let a = success_only.diagnostics();
        assert!(a.lost_failure && a.lost_abort);
        let b = no_abort.diagnostics();
        assert!(!b.lost_failure && b.lost_abort);
        assert_eq!(no_abort.phase(), crate::types::Phase::Rejected);
    }

    #[test]
    fn absorbed_abort_aborts_the_value() {
        let mut lp = test_loop();
        let h = lp.handle();
        let (inner, _inner_resolver) = Deferred::<u8>::deferred(&h);
        let outer = Deferred::<u8>::resolved(&h, inner.clone().into());
        lp.run_until_idle();
        inner.abort(Some("inner gave up".into())).unwrap();
        lp.run_until_idle();
        let reason = outer.outcome().and_then(|o| o.abort_reason().cloned()).unwrap();
        assert_eq!(reason.message(), Some("inner gave up"));
    }
}
