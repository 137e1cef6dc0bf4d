//! `all`: wait for every entry.
//!
//! # Semantics
//!
//! `all(entries)`:
//! 1. Plain values count as immediate successes, plain errors as immediate failures
//! 2. Success once every entry succeeded, with results in input order
//! 3. On the first failure event, fail with the lowest-indexed failure known
//!    at that moment and abort every other pending entry without waiting
//! 4. An entry abort while the combinator is pending aborts the combinator
//!
//! Aborting the combinator aborts every pending entry; the abort is confirmed
//! once every entry has confirmed (see [`ForeignAbortPolicy`](crate::runtime::ForeignAbortPolicy)
//! for entries that cannot be aborted).
//!
//! # Algebraic Laws
//!
//! - Identity: `all([]) ≃ succeeded([])`
//! - Order: `all([a, b])` yields `[a, b]` regardless of settlement order

use super::entry::{cascade_abort, classify, Child, Entry, Immediate};
use crate::deferred::{Deferred, Prepared};
use crate::error::Error;
use crate::runtime::Handle;
use crate::tracing_compat::{debug, trace};
use crate::types::{AbortReason, Outcome, State};
use smallvec::SmallVec;
use std::cell::RefCell;
use std::rc::Rc;

struct Progress<T> {
    results: Vec<Option<T>>,
    waiting: usize,
    /// Plain errors among the entries, by index.
    failed: SmallVec<[(usize, Error); 2]>,
}

struct Shared<T> {
    this: Deferred<Vec<T>>,
    children: Vec<Child<T>>,
    progress: RefCell<Progress<T>>,
}

/// Combines `entries` into a value that succeeds with all of their results.
///
/// The combinator must be started (or chained from a running value) for
/// deferred entries to start.
///
/// ```
/// use settle::runtime::EventLoop;
/// use settle::{all, Deferred, Entry};
///
/// let mut event_loop = EventLoop::default();
/// let h = event_loop.handle();
/// let both = all(&h, vec![Entry::Value(1), Deferred::succeeded(&h, 2).into()]);
/// both.start_when_ready();
/// event_loop.run_until_idle();
/// assert_eq!(both.outcome().and_then(|o| o.ok()), Some(vec![1, 2]));
/// ```
pub fn all<T: Clone + 'static>(handle: &Handle, entries: Vec<Entry<T>>) -> Deferred<Vec<T>> {
    let h = handle.clone();
    Deferred::<Vec<T>>::new(handle, move |ctl| {
        let len = entries.len();
        let (immediates, children) = classify(&h, entries);
        let mut progress = Progress {
            results: (0..len).map(|_| None).collect(),
            waiting: children.len(),
            failed: SmallVec::new(),
        };
        for (index, immediate) in immediates {
            match immediate {
                Immediate::Value(v) => progress.results[index] = Some(v),
                Immediate::Failed(e) => progress.failed.push((index, e)),
            }
        }
        debug!(
            deferred_id = %ctl.id(),
            entries = len,
            waiting = progress.waiting,
            "all prepared"
        );
        let shared = Rc::new(Shared {
            this: ctl.deferred().clone(),
            children,
            progress: RefCell::new(progress),
        });

        for child in &shared.children {
            let index = child.index;
            let (on_s, on_f, on_a) =
                (Rc::clone(&shared), Rc::clone(&shared), Rc::clone(&shared));
            child.value.subscribe(
                Box::new(move |v| on_s.entry_succeeded(index, v)),
                Box::new(move |_| on_f.entry_failed()),
                Box::new(move |r| on_a.entry_aborted(index, &r)),
            );
        }
        shared.may_settle();

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
    fn entry_succeeded(&self, index: usize, value: T) {
        {
            let mut progress = self.progress.borrow_mut();
            progress.results[index] = Some(value);
            progress.waiting -= 1;
            trace!(
                deferred_id = %self.this.id(),
                entry = index,
                waiting = progress.waiting,
                "entry succeeded"
            );
        }
        self.may_settle();
    }

    fn entry_failed(&self) {
        self.may_settle();
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

    /// Lowest-indexed failure known right now, among plain errors and failed children.
    fn first_failure(&self) -> Option<(usize, Error)> {
        let progress = self.progress.borrow();
        let plain = progress.failed.iter().map(|(i, e)| (*i, e.clone()));
        let settled = self
            .children
            .iter()
            .filter(|c| c.value.state() == State::Failed)
            .filter_map(|c| {
                let error = c.value.outcome()?.failure()?.clone();
                Some((c.index, error))
            });
        plain.chain(settled).min_by_key(|(i, _)| *i)
    }

    fn may_settle(&self) {
        if self.this.state().is_terminal() {
            return;
        }
        if let Some((failed, error)) = self.first_failure() {
            debug!(deferred_id = %self.this.id(), entry = failed, "all failed");
            self.this.settle(Outcome::Failure(error));
            for child in &self.children {
                if child.index == failed || !child.abortable || !child.value.state().is_pending() {
                    continue;
                }
                let reason = AbortReason::fail_fast(format!(
                    "Aborted as #{} -- #{failed} failed",
                    child.index
                ));
                if let Err(err) = child.value.abort_with(reason) {
                    debug!(entry = child.index, error = %err, "fail-fast abort rejected");
                }
            }
            return;
        }
        let results = {
            let mut progress = self.progress.borrow_mut();
            if progress.waiting > 0 {
                return;
            }
            progress.results.iter_mut().map(Option::take).collect::<Option<Vec<T>>>()
        };
        match results {
            Some(results) => self.this.settle(Outcome::Success(results)),
            None => self
                .this
                .settle(Outcome::Failure(Error::internal("all: missing entry result"))),
        }
    }
}
