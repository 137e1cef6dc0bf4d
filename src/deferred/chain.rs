//! Chaining: `then`, `catch`, `aborted` and `finally`.
//!
//! Each call creates a link: a new deferred value that settles from the
//! source's outcome through the matching handler. Handlers never run
//! synchronously inside the call that registers them, even when the source
//! has already settled.
//!
//! The link starts its source when started and aborts its source when
//! aborted; its own abort is confirmed once the source's settlement has
//! been published.

use super::continuable::Resolution;
use super::controller::{Controller, Prepared};
use super::Deferred;
use crate::error::{Error, Result};
use crate::tracing_compat::{debug, trace};
use crate::types::{AbortReason, Outcome};
use std::cell::RefCell;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

type SuccessHandler<T, U> = Box<dyn FnOnce(T) -> Result<Resolution<U>>>;
type FailureHandler<U> = Box<dyn FnOnce(Error) -> Result<Resolution<U>>>;
type AbortHandler<U> = Box<dyn FnOnce(AbortReason) -> Result<Resolution<U>>>;

/// The handlers of one chain link.
///
/// A missing failure handler forwards the failure unchanged; a missing
/// abort handler aborts the link with the same reason.
pub struct Handlers<T, U> {
    on_success: SuccessHandler<T, U>,
    on_failure: Option<FailureHandler<U>>,
    on_abort: Option<AbortHandler<U>>,
}

impl<T: 'static, U: 'static> Handlers<T, U> {
    /// Handles success with `f`.
    pub fn new(f: impl FnOnce(T) -> Result<Resolution<U>> + 'static) -> Self {
        Self {
            on_success: Box::new(f),
            on_failure: None,
            on_abort: None,
        }
    }

    /// Handles failure with `f`.
    #[must_use]
    pub fn on_failure(mut self, f: impl FnOnce(Error) -> Result<Resolution<U>> + 'static) -> Self {
        self.on_failure = Some(Box::new(f));
        self
    }

    /// Handles abort with `f`.
    #[must_use]
    pub fn on_abort(
        mut self,
        f: impl FnOnce(AbortReason) -> Result<Resolution<U>> + 'static,
    ) -> Self {
        self.on_abort = Some(Box::new(f));
        self
    }
}

impl<T: 'static> Handlers<T, T> {
    /// Passes success through unchanged.
    #[must_use]
    pub fn passthrough() -> Self {
        Self::new(|v| Ok(Resolution::Value(v)))
    }
}

impl<T, U> fmt::Debug for Handlers<T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers")
            .field("on_failure", &self.on_failure.is_some())
            .field("on_abort", &self.on_abort.is_some())
            .finish_non_exhaustive()
    }
}

impl<T: Clone + 'static> Deferred<T> {
    /// Creates a link that settles through `handlers` once this value settles.
    ///
    /// Aborting the link aborts this value on the next turn, and the link's
    /// abort is confirmed once this value has published. A continuation the
    /// link absorbed from a handler is not aborted with it; abort that value
    /// directly if it must stop.
    pub fn then_with<U: Clone + 'static>(&self, handlers: Handlers<T, U>) -> Deferred<U> {
        let handle = self.handle();
        let to_start = self.clone();
        let to_abort = self.clone();
        let link = Deferred::<U>::ready(
            &handle,
            Prepared::new(
                move |_ctl| {
                    to_start.start_when_ready();
                },
                move |reason, _ctl| {
                    if to_abort.state().is_terminal() {
                        return None;
                    }
                    // One hop per turn: a long chain never nests aborters on the stack.
                    let source = to_abort.clone();
                    to_abort.handle().defer(move || {
                        if source.state().is_terminal() {
                            return;
                        }
                        if let Err(err) = source.abort_with(reason) {
                            debug!(deferred_id = %source.id(), error = %err, "source abort rejected");
                        }
                    });
                    Some(to_abort.completion())
                },
            ),
        );
        debug!(source_id = %self.id(), link_id = %link.id(), "chain link created");

        let Handlers {
            on_success,
            on_failure,
            on_abort,
        } = handlers;
        let (on_s, on_f, on_a) = (link.clone(), link.clone(), link.clone());
        self.subscribe(
            Box::new(move |v| run_handler(&on_s, move || on_success(v))),
            Box::new(move |e| match on_failure {
                Some(f) => run_handler(&on_f, move || f(e)),
                None => forward(&on_f, Outcome::Failure(e)),
            }),
            Box::new(move |r| match on_abort {
                Some(f) => run_handler(&on_a, move || f(r)),
                None => forward(&on_a, Outcome::Aborted(r)),
            }),
        );

        if self.state().is_started() {
            if let Err(err) = link.start() {
                debug!(link_id = %link.id(), error = %err, "link start rejected");
            }
        }
        link
    }

    /// Continues with `f` on success; failure and abort pass through.
    pub fn then<U, F>(&self, f: F) -> Deferred<U>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Result<Resolution<U>> + 'static,
    {
        self.then_with(Handlers::new(f))
    }

    /// Maps the success value.
    pub fn map<U, F>(&self, f: F) -> Deferred<U>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> U + 'static,
    {
        self.then(move |v| Ok(Resolution::Value(f(v))))
    }

    /// Recovers from failure with `f`.
    pub fn catch<F>(&self, f: F) -> Self
    where
        F: FnOnce(Error) -> Result<Resolution<T>> + 'static,
    {
        self.then_with(Handlers::passthrough().on_failure(f))
    }

    /// Recovers from failure and from abort.
    pub fn catch_with<F, A>(&self, on_failure: F, on_abort: A) -> Self
    where
        F: FnOnce(Error) -> Result<Resolution<T>> + 'static,
        A: FnOnce(AbortReason) -> Result<Resolution<T>> + 'static,
    {
        self.then_with(Handlers::passthrough().on_failure(on_failure).on_abort(on_abort))
    }

    /// Handles abort with `f`; success and failure pass through.
    pub fn aborted<A>(&self, f: A) -> Self
    where
        A: FnOnce(AbortReason) -> Result<Resolution<T>> + 'static,
    {
        self.then_with(Handlers::passthrough().on_abort(f))
    }

    /// Runs `f` after any outcome, then settles the same way.
    ///
    /// If `f` fails, the link fails with that error instead.
    pub fn finally<F>(&self, f: F) -> Self
    where
        F: FnOnce() -> Result<()> + 'static,
    {
        let slot = Rc::new(RefCell::new(Some(f)));
        let (on_s, on_f, on_a) = (Rc::clone(&slot), Rc::clone(&slot), slot);
        let handle = self.handle();
        self.then_with(
            Handlers::new(move |v| {
                run_once(&on_s)?;
                Ok(Resolution::Value(v))
            })
            .on_failure(move |e| {
                run_once(&on_f)?;
                Err(e)
            })
            .on_abort(move |r| {
                run_once(&on_a)?;
                Ok(Deferred::<T>::from_outcome(&handle, Outcome::Aborted(r)).into())
            }),
        )
    }
}

fn run_once<F: FnOnce() -> Result<()>>(slot: &RefCell<Option<F>>) -> Result<()> {
    let f = slot.borrow_mut().take();
    f.map_or(Ok(()), |f| f())
}

/// Settles `link` from a handler, unless the link settled first.
fn run_handler<U: Clone + 'static>(
    link: &Deferred<U>,
    handler: impl FnOnce() -> Result<Resolution<U>>,
) {
    if link.state().is_terminal() {
        trace!(link_id = %link.id(), state = %link.state(), "handler skipped; link already settled");
        return;
    }
    match catch_unwind(AssertUnwindSafe(handler)) {
        Ok(Ok(resolution)) => Controller::new(link.clone()).resolve(resolution),
        Ok(Err(err)) => link.settle(Outcome::Failure(err)),
        Err(payload) => link.settle(Outcome::Failure(Error::callback_panicked(payload.as_ref()))),
    }
}

/// Passes an unhandled failure or abort on to `link`.
fn forward<U: Clone + 'static>(link: &Deferred<U>, outcome: Outcome<U>) {
    if link.state().is_terminal() {
        trace!(link_id = %link.id(), "forward skipped; link already settled");
        return;
    }
    link.settle(outcome);
}
