//! Lifecycle controls: `start`, `pause`, `resume` and `abort`.
//!
//! Each operation consults the transition table on [`State`] and either
//! applies the move, ignores it, or rejects it with
//! [`ErrorKind::InvalidStateTransition`](crate::ErrorKind::InvalidStateTransition).
//! A rejected call leaves the value untouched.

use super::controller::Controller;
use super::Deferred;
use crate::error::{panic_message, Error, Result};
use crate::tracing_compat::{debug, error, trace};
use crate::types::state::Transition;
use crate::types::{AbortReason, Outcome, State};
use std::panic::{catch_unwind, AssertUnwindSafe};

impl<T: Clone + 'static> Deferred<T> {
    /// Applies a plain state move. Returns whether the state changed.
    fn transition(&self, op: &str, rule: fn(State) -> Transition) -> Result<bool> {
        let mut core = self.core.borrow_mut();
        let from = core.state;
        match rule(from) {
            Transition::Apply(to) => {
                core.state = to;
                debug!(deferred_id = %core.id, op, from = %from, to = %to, "state transition");
                Ok(true)
            }
            Transition::NoOp => {
                trace!(deferred_id = %core.id, op, state = %from, "transition is a no-op");
                Ok(false)
            }
            Transition::Reject => Err(Error::invalid_transition(op, core.id, from)),
        }
    }

    /// Starts the value: its starter runs on a later turn.
    ///
    /// A no-op while running, paused or idle.
    ///
    /// # Errors
    ///
    /// Rejected while constructing and after settlement.
    pub fn start(&self) -> Result<&Self> {
        if self.transition("start", State::on_start)? {
            let starter = self.core.borrow_mut().starter.take();
            if let Some(starter) = starter {
                self.schedule_continuation(starter);
            }
            self.dispatch_parked();
        }
        Ok(self)
    }

    /// Starts now if ready, or as soon as the preparer has run.
    pub fn start_when_ready(&self) -> &Self {
        match self.state() {
            State::Ready => {
                if let Err(err) = self.start() {
                    debug!(deferred_id = %self.id(), error = %err, "start rejected");
                }
            }
            State::Constructing => self.core.borrow_mut().autostart = true,
            _ => {}
        }
        self
    }

    /// Pauses the value. Work in flight finishes; the next checkpoint waits.
    ///
    /// # Errors
    ///
    /// Rejected before starting and after settlement.
    pub fn pause(&self) -> Result<&Self> {
        self.transition("pause", State::on_pause)?;
        Ok(self)
    }

    /// Resumes a paused or idle value and reschedules its parked work.
    ///
    /// # Errors
    ///
    /// Rejected before starting and after settlement.
    pub fn resume(&self) -> Result<&Self> {
        if self.transition("resume", State::on_resume)? {
            self.dispatch_parked();
        }
        Ok(self)
    }

    /// Aborts the value on behalf of the user.
    ///
    /// # Errors
    ///
    /// Rejected if the value already succeeded or failed. Aborting an
    /// aborted value is a no-op.
    pub fn abort(&self, message: Option<String>) -> Result<&Self> {
        self.abort_with(AbortReason::user(message))
    }

    /// Aborts the value with an explicit reason.
    ///
    /// The reason is recorded at once. The aborter, if any, runs synchronously;
    /// subscribers hear about the abort once the aborter's completion value
    /// has published, or on a later turn when there is none.
    ///
    /// # Errors
    ///
    /// Rejected if the value already succeeded or failed.
    pub fn abort_with(&self, reason: AbortReason) -> Result<&Self> {
        let (aborter, discarded) = {
            let mut core = self.core.borrow_mut();
            let from = core.state;
            match from.on_abort() {
                Transition::Reject => {
                    return Err(Error::invalid_transition("abort", core.id, from));
                }
                Transition::NoOp => {
                    debug!(deferred_id = %core.id, reason = %reason, "repeat abort ignored");
                    return Ok(self);
                }
                Transition::Apply(to) => {
                    core.state = to;
                    core.outcome = Some(Outcome::Aborted(reason.clone()));
                    debug!(
                        deferred_id = %core.id,
                        label = %core.label(),
                        from = %from,
                        reason = %reason,
                        "aborted"
                    );
                    let aborter = core.aborter.take();
                    (aborter, core.discard_for_settlement())
                }
            }
        };
        drop(discarded);

        let completion = aborter.and_then(|aborter| {
            let ctl = Controller::new(self.clone());
            match catch_unwind(AssertUnwindSafe(move || aborter(reason, ctl))) {
                Ok(completion) => completion,
                Err(payload) => {
                    error!(
                        deferred_id = %self.id(),
                        panic = %panic_message(payload.as_ref()),
                        "aborter panicked"
                    );
                    None
                }
            }
        });
        match completion {
            Some(completion) => {
                trace!(
                    deferred_id = %self.id(),
                    completion_id = %completion.id(),
                    "abort confirmation waits for completion"
                );
                let this = self.clone();
                completion.on_publish(move |_| this.publish());
            }
            None => self.schedule_publish(),
        }
        Ok(self)
    }
}
