//! Settlement core: lifecycle state, the single outcome slot and the
//! subscriber queues.
//!
//! Settling changes state at once; subscribers run later, from one publish
//! job that pops callbacks one at a time so a callback may subscribe again
//! (or settle other values) without re-entering a borrow. A subscriber that
//! arrives after publication gets its own job carrying the stored payload.

use super::controller::{Aborter, Continuation};
use super::Deferred;
use crate::error::{panic_message, Error};
use crate::runtime::Handle;
use crate::tracing_compat::{debug, error, trace, warn};
use crate::types::{AbortReason, DeferredId, Outcome, State};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;
use std::time::Duration;

pub(crate) type SuccessCallback<T> = Box<dyn FnOnce(T)>;
pub(crate) type FailureCallback = Box<dyn FnOnce(Error)>;
pub(crate) type AbortCallback = Box<dyn FnOnce(AbortReason)>;

pub(crate) struct Core<T> {
    pub(crate) id: DeferredId,
    pub(crate) handle: Handle,
    pub(crate) state: State,
    pub(crate) outcome: Option<Outcome<T>>,
    /// Subscribers have been (or are being) drained; late subscribers get their own job.
    pub(crate) published: bool,
    pub(crate) on_success: VecDeque<SuccessCallback<T>>,
    pub(crate) on_failure: VecDeque<FailureCallback>,
    pub(crate) on_abort: VecDeque<AbortCallback>,
    pub(crate) then_chain_depth: u32,
    pub(crate) lost_failure: bool,
    pub(crate) lost_abort: bool,
    pub(crate) conflicts: u32,
    pub(crate) created: Duration,
    pub(crate) suffix: char,
    pub(crate) starter: Option<Continuation<T>>,
    pub(crate) aborter: Option<Aborter<T>>,
    pub(crate) parked: VecDeque<Continuation<T>>,
    pub(crate) autostart: bool,
}

/// Things released at settlement, dropped once the borrow is gone.
pub(crate) struct Discarded<T> {
    _success: VecDeque<SuccessCallback<T>>,
    _failure: VecDeque<FailureCallback>,
    _abort: VecDeque<AbortCallback>,
    _starter: Option<Continuation<T>>,
    _aborter: Option<Aborter<T>>,
    _parked: VecDeque<Continuation<T>>,
}

enum Delivery<T> {
    Success(SuccessCallback<T>, T),
    Failure(FailureCallback, Error),
    Abort(AbortCallback, AbortReason),
}

impl<T> Delivery<T> {
    fn invoke_isolated(self, id: DeferredId) {
        let result = catch_unwind(AssertUnwindSafe(move || match self {
            Self::Success(cb, v) => cb(v),
            Self::Failure(cb, e) => cb(e),
            Self::Abort(cb, r) => cb(r),
        }));
        if let Err(payload) = result {
            error!(
                deferred_id = %id,
                panic = %panic_message(payload.as_ref()),
                "subscriber panicked"
            );
        }
    }
}

impl<T> Core<T> {
    pub(crate) fn new(handle: &Handle, state: State) -> Self {
        Self {
            id: handle.next_id(),
            handle: handle.clone(),
            state,
            outcome: None,
            published: false,
            on_success: VecDeque::new(),
            on_failure: VecDeque::new(),
            on_abort: VecDeque::new(),
            then_chain_depth: 0,
            lost_failure: false,
            lost_abort: false,
            conflicts: 0,
            created: handle.now(),
            suffix: handle.next_suffix(),
            starter: None,
            aborter: None,
            parked: VecDeque::new(),
            autostart: false,
        }
    }

    pub(crate) fn label(&self) -> String {
        format!(
            "Deferred<{:.3}-{}:{:<12}>",
            self.created.as_secs_f64(),
            self.suffix,
            self.state
        )
    }

    /// Releases everything a settled value no longer needs: management
    /// functions, parked continuations and the queues of the other outcomes.
    pub(crate) fn discard_for_settlement(&mut self) -> Discarded<T> {
        let state = self.state;
        Discarded {
            _success: if state == State::Succeeded {
                VecDeque::new()
            } else {
                std::mem::take(&mut self.on_success)
            },
            _failure: if state == State::Failed {
                VecDeque::new()
            } else {
                std::mem::take(&mut self.on_failure)
            },
            _abort: if state == State::Aborted {
                VecDeque::new()
            } else {
                std::mem::take(&mut self.on_abort)
            },
            _starter: self.starter.take(),
            _aborter: self.aborter.take(),
            _parked: std::mem::take(&mut self.parked),
        }
    }
}

impl<T: Clone> Core<T> {
    fn pop_ready(&mut self) -> Option<Delivery<T>> {
        match self.outcome.as_ref()? {
            Outcome::Success(v) => {
                let cb = self.on_success.pop_front()?;
                Some(Delivery::Success(cb, v.clone()))
            }
            Outcome::Failure(e) => {
                let cb = self.on_failure.pop_front()?;
                Some(Delivery::Failure(cb, e.clone()))
            }
            Outcome::Aborted(r) => {
                let cb = self.on_abort.pop_front()?;
                Some(Delivery::Abort(cb, r.clone()))
            }
        }
    }
}

impl<T: Clone + 'static> Deferred<T> {
    pub(crate) fn with_core(core: Core<T>) -> Self {
        Self {
            core: Rc::new(RefCell::new(core)),
        }
    }

    /// Settles to success or failure; an abort outcome is routed through
    /// [`abort_with`](Self::abort_with). A second settlement is reported, not applied.
    pub(crate) fn settle(&self, outcome: Outcome<T>) {
        if self.state().is_terminal() {
            self.report_conflict(&outcome);
            return;
        }
        let outcome = match outcome {
            Outcome::Aborted(reason) => {
                if let Err(err) = self.abort_with(reason) {
                    debug!(deferred_id = %self.id(), error = %err, "abort settlement rejected");
                }
                return;
            }
            other => other,
        };
        let discarded = {
            let mut core = self.core.borrow_mut();
            core.state = if outcome.is_success() {
                State::Succeeded
            } else {
                State::Failed
            };
            core.outcome = Some(outcome);
            debug!(
                deferred_id = %core.id,
                label = %core.label(),
                pending_callbacks = core.on_success.len() + core.on_failure.len(),
                "settled"
            );
            core.discard_for_settlement()
        };
        drop(discarded);
        self.schedule_publish();
    }

    /// Records an attempt to settle an already-settled value.
    pub(crate) fn report_conflict<U>(&self, attempt: &Outcome<U>) {
        let mut core = self.core.borrow_mut();
        let same = core
            .outcome
            .as_ref()
            .is_some_and(|existing| existing.same_settlement(attempt));
        if same {
            debug!(
                deferred_id = %core.id,
                state = %core.state,
                "repeat settlement ignored"
            );
        } else {
            core.conflicts += 1;
            warn!(
                deferred_id = %core.id,
                label = %core.label(),
                attempted = %attempt.phase(),
                conflicts = core.conflicts,
                "conflicting settlement ignored"
            );
        }
    }

    pub(crate) fn schedule_publish(&self) {
        let handle = self.core.borrow().handle.clone();
        let this = self.clone();
        handle.defer(move || this.publish());
    }

    /// Drains the matching subscriber queue. Runs at most once.
    pub(crate) fn publish(&self) {
        let id = {
            let mut core = self.core.borrow_mut();
            if core.published || core.outcome.is_none() {
                return;
            }
            core.published = true;
            trace!(deferred_id = %core.id, state = %core.state, "publishing settlement");
            core.id
        };
        loop {
            let next = self.core.borrow_mut().pop_ready();
            match next {
                Some(delivery) => delivery.invoke_isolated(id),
                None => break,
            }
        }
    }

    /// Registers raw callbacks; exactly one of them eventually runs, on a later turn.
    pub(crate) fn subscribe(
        &self,
        on_success: SuccessCallback<T>,
        on_failure: FailureCallback,
        on_abort: AbortCallback,
    ) {
        let mut guard = self.core.borrow_mut();
        let core = &mut *guard;
        let late = match (&core.outcome, core.published) {
            (None, _) => {
                core.on_success.push_back(on_success);
                core.on_failure.push_back(on_failure);
                core.on_abort.push_back(on_abort);
                None
            }
            (Some(outcome), false) => {
                match outcome {
                    Outcome::Success(_) => core.on_success.push_back(on_success),
                    Outcome::Failure(_) => core.on_failure.push_back(on_failure),
                    Outcome::Aborted(_) => core.on_abort.push_back(on_abort),
                }
                None
            }
            (Some(outcome), true) => Some(match outcome {
                Outcome::Success(v) => Delivery::Success(on_success, v.clone()),
                Outcome::Failure(e) => Delivery::Failure(on_failure, e.clone()),
                Outcome::Aborted(r) => Delivery::Abort(on_abort, r.clone()),
            }),
        };
        trace!(deferred_id = %core.id, late = late.is_some(), "subscriber registered");
        if let Some(delivery) = late {
            let id = core.id;
            let handle = core.handle.clone();
            drop(guard);
            handle.defer(move || delivery.invoke_isolated(id));
        }
    }

    /// Runs `f` with the outcome once this value publishes it.
    pub(crate) fn on_publish(&self, f: impl FnOnce(Outcome<T>) + 'static) {
        let slot = Rc::new(RefCell::new(Some(f)));
        let (s, e, a) = (Rc::clone(&slot), Rc::clone(&slot), slot);
        self.subscribe(
            Box::new(move |v| fire(&s, Outcome::Success(v))),
            Box::new(move |err| fire(&e, Outcome::Failure(err))),
            Box::new(move |r| fire(&a, Outcome::Aborted(r))),
        );
    }
}

fn fire<T, F: FnOnce(Outcome<T>)>(slot: &RefCell<Option<F>>, outcome: Outcome<T>) {
    let f = slot.borrow_mut().take();
    if let Some(f) = f {
        f(outcome);
    }
}
