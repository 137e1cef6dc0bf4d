//! `race`: the first entry to settle decides.
//!
//! # Semantics
//!
//! `race(entries)`:
//! 1. A plain value (or plain error) is an immediate winner (or loser); the
//!    lowest-indexed plain entry decides before any deferred entry can
//! 2. Otherwise the first entry to publish a success wins and the first to
//!    publish a failure loses; either way the race settles the same way
//! 3. Once decided, every other pending entry is aborted with a message
//!    naming the deciding index (`"#z won the race"` / `"#z lost the race"`)
//! 4. An entry abort while the race is pending aborts the race
//!
//! Aborting the race aborts every pending entry; the abort is confirmed once
//! every entry has confirmed.
//!
//! # Algebraic Laws
//!
//! - Identity: `race([]) ≃ never`
//! - `race([a]) ≃ a` up to abort reasons

use super::entry::{cascade_abort, classify, Child, Entry, Immediate};
use crate::deferred::{Deferred, Prepared};
use crate::runtime::Handle;
use crate::tracing_compat::debug;
use crate::types::{AbortReason, Outcome};
use std::rc::Rc;

struct Shared<T> {
    this: Deferred<T>,
    children: Vec<Child<T>>,
}

/// Races `entries`: settles like the first entry to settle.
///
/// An empty race never settles.
///
/// ```
/// use settle::runtime::EventLoop;
/// use settle::{race, Deferred, Entry};
///
/// let mut event_loop = EventLoop::default();
/// let h = event_loop.handle();
/// let (slow, _resolver) = Deferred::<&str>::deferred(&h);
/// let first = race(&h, vec![slow.clone().into(), Entry::Value("fast")]);
/// event_loop.run_until_idle();
/// assert_eq!(first.outcome().and_then(|o| o.ok()), Some("fast"));
/// assert!(slow.abort_confirmed());
/// ```
pub fn race<T: Clone + 'static>(handle: &Handle, entries: Vec<Entry<T>>) -> Deferred<T> {
    let h = handle.clone();
    Deferred::<T>::new(handle, move |ctl| {
        let (immediates, children) = classify(&h, entries);
        debug!(
            deferred_id = %ctl.id(),
            immediates = immediates.len(),
            children = children.len(),
            "race prepared"
        );
        let shared = Rc::new(Shared {
            this: ctl.deferred().clone(),
            children,
        });

        for child in &shared.children {
            let index = child.index;
            let (on_s, on_f, on_a) =
                (Rc::clone(&shared), Rc::clone(&shared), Rc::clone(&shared));
            child.value.subscribe(
                Box::new(move |v| on_s.decide(index, Outcome::Success(v))),
                Box::new(move |e| on_f.decide(index, Outcome::Failure(e))),
                Box::new(move |r| on_a.entry_aborted(index, &r)),
            );
        }

        if let Some((index, immediate)) = immediates.into_iter().next() {
            let outcome = match immediate {
                Immediate::Value(v) => Outcome::Success(v),
                Immediate::Failed(e) => Outcome::Failure(e),
            };
            shared.decide(index, outcome);
        }

        let to_start = Rc::clone(&shared);
        let to_abort = shared;
        Some(Prepared::new(
            move |_ctl| {
                for child in &to_start.children {
                    child.value.start_when_ready();
                }
            },
            move |reason, ctl| {
                let handle = ctl.deferred().handle();
                Some(cascade_abort(&handle, &to_abort.children, &reason))
            },
        ))
    })
}

impl<T: Clone + 'static> Shared<T> {
    /// Settles the race from entry `index`, unless it is already decided.
    fn decide(&self, index: usize, outcome: Outcome<T>) {
        if self.this.state().is_terminal() {
            return;
        }
        let (verdict, won) = match &outcome {
            Outcome::Success(_) => (format!("#{index} won the race"), true),
            _ => (format!("#{index} lost the race"), false),
        };
        debug!(deferred_id = %self.this.id(), entry = index, won, "race decided");
        self.this.settle(outcome);
        for child in &self.children {
            if child.index == index || !child.abortable || !child.value.state().is_pending() {
                continue;
            }
            let reason = if won {
                AbortReason::race_lost(verdict.clone())
            } else {
                AbortReason::fail_fast(verdict.clone())
            };
            if let Err(err) = child.value.abort_with(reason) {
                debug!(entry = child.index, error = %err, "loser abort rejected");
            }
        }
    }

    fn entry_aborted(&self, index: usize, reason: &AbortReason) {
        if self.this.state().is_terminal() {
            return;
        }
        let propagated =
            AbortReason::propagated(format!("Abort from #{index} -- {}", reason.summary()));
        if let Err(err) = self.this.abort_with(propagated) {
            debug!(deferred_id = %self.this.id(), error = %err, "propagated abort rejected");
        }
    }
}
