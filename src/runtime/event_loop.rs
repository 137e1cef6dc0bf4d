//! Single-threaded cooperative event loop.
//!
//! A turn runs exactly one queued job to completion. Jobs are FIFO and never
//! run re-entrantly: a job that defers more work only appends to the queue.
//! Every "asynchronous" step of a deferred value (running a preparer, a
//! starter, publishing a settlement, invoking a late subscriber) is one job,
//! which makes ordering claims observable by driving the loop turn by turn.
//!
//! All sequence state (ids, label suffixes, turn counts) belongs to the loop
//! instance, so a fresh loop starts from a clean slate.

use super::clock::{TimeSource, WallClock};
use super::config::LoopConfig;
use super::label::SuffixCycler;
use crate::error::panic_message;
use crate::tracing_compat::{debug_span, error, trace, warn};
use crate::types::DeferredId;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;
use std::time::Duration;

type Job = Box<dyn FnOnce()>;

struct LoopInner {
    queue: RefCell<VecDeque<Job>>,
    config: LoopConfig,
    turns: Cell<u64>,
    next_id: Cell<u64>,
    suffixes: RefCell<SuffixCycler>,
    clock: Rc<dyn TimeSource>,
}

/// The event loop that owns the job queue.
///
/// ```
/// use settle::runtime::{EventLoop, LoopConfig};
/// use settle::Deferred;
///
/// let mut event_loop = EventLoop::new(LoopConfig::default());
/// let value = Deferred::succeeded(&event_loop.handle(), 2).map(|v| v * 21);
/// event_loop.run_until_idle();
/// assert_eq!(value.outcome().and_then(|o| o.ok()), Some(42));
/// ```
pub struct EventLoop {
    inner: Rc<LoopInner>,
}

impl EventLoop {
    /// Creates a loop reading time from the wall clock.
    #[must_use]
    pub fn new(config: LoopConfig) -> Self {
        Self::with_clock(config, Rc::new(WallClock::new()))
    }

    /// Creates a loop reading time from `clock`.
    #[must_use]
    pub fn with_clock(mut config: LoopConfig, clock: Rc<dyn TimeSource>) -> Self {
        config.normalize();
        let suffixes = SuffixCycler::new(&config.label_alphabet);
        Self {
            inner: Rc::new(LoopInner {
                queue: RefCell::new(VecDeque::new()),
                config,
                turns: Cell::new(0),
                next_id: Cell::new(0),
                suffixes: RefCell::new(suffixes),
                clock,
            }),
        }
    }

    /// Returns a handle for constructing deferred values on this loop.
    #[must_use]
    pub fn handle(&self) -> Handle {
        Handle {
            inner: Rc::clone(&self.inner),
        }
    }

    /// Returns the loop configuration.
    #[must_use]
    pub fn config(&self) -> &LoopConfig {
        &self.inner.config
    }

    /// Total number of turns executed so far.
    #[must_use]
    pub fn turns(&self) -> u64 {
        self.inner.turns.get()
    }

    /// Number of jobs waiting to run.
    #[must_use]
    pub fn pending_jobs(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    /// Returns true if no job is queued.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.inner.queue.borrow().is_empty()
    }

    /// Runs exactly one queued job. Returns `false` if the queue was empty.
    ///
    /// A panicking job is caught and logged; the loop stays usable.
    pub fn turn(&mut self) -> bool {
        let job = self.inner.queue.borrow_mut().pop_front();
        let Some(job) = job else {
            return false;
        };
        let turn = self.inner.turns.get() + 1;
        self.inner.turns.set(turn);
        trace!(turn, "running turn");
        if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
            error!(
                turn,
                panic = %panic_message(payload.as_ref()),
                "event loop job panicked"
            );
        }
        true
    }

    /// Runs turns until the queue is empty or `max_turns` is reached.
    ///
    /// Returns the number of turns executed by this call.
    pub fn run_until_idle(&mut self) -> u64 {
        let span = debug_span!("run_until_idle", pending = self.pending_jobs());
        let _guard = span.enter();
        let start = self.turns();
        while !self.is_idle() {
            if let Some(max) = self.inner.config.max_turns {
                if self.turns() - start >= max {
                    warn!(
                        max_turns = max,
                        pending = self.pending_jobs(),
                        "turn limit reached before the loop went idle"
                    );
                    break;
                }
            }
            self.turn();
        }
        self.turns() - start
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new(LoopConfig::default())
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        // Queued jobs own deferred values, which own handles back to the loop.
        let pending = std::mem::take(&mut *self.inner.queue.borrow_mut());
        drop(pending);
    }
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop")
            .field("turns", &self.turns())
            .field("pending_jobs", &self.pending_jobs())
            .finish_non_exhaustive()
    }
}

/// Cheap, cloneable access to an [`EventLoop`] from deferred values.
#[derive(Clone)]
pub struct Handle {
    inner: Rc<LoopInner>,
}

impl Handle {
    /// Enqueues `job` to run on a later turn.
    pub fn defer(&self, job: impl FnOnce() + 'static) {
        let mut queue = self.inner.queue.borrow_mut();
        queue.push_back(Box::new(job));
        trace!(pending = queue.len(), "job deferred");
    }

    /// Current time from the loop's time source.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.inner.clock.now()
    }

    /// Allocates the next deferred id on this loop.
    #[must_use]
    pub fn next_id(&self) -> DeferredId {
        let next = self.inner.next_id.get() + 1;
        self.inner.next_id.set(next);
        DeferredId::from_seq(next)
    }

    /// Next label suffix from the loop's cycler.
    #[must_use]
    pub fn next_suffix(&self) -> char {
        self.inner.suffixes.borrow_mut().next_suffix()
    }

    /// Returns the loop configuration.
    #[must_use]
    pub fn config(&self) -> &LoopConfig {
        &self.inner.config
    }

    /// Returns true if both handles refer to the same loop.
    #[must_use]
    pub fn same_loop(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("pending_jobs", &self.inner.queue.borrow().len())
            .finish_non_exhaustive()
    }
}
