//! Combinator inputs and the abort cascade shared by `all` and `race`.

use crate::deferred::{Continuable, Deferred, Resolution};
use crate::error::Error;
use crate::runtime::{ForeignAbortPolicy, Handle};
use crate::tracing_compat::{debug, warn};
use crate::types::{AbortReason, State};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// One input of a combinator.
pub enum Entry<T> {
    /// A plain value; counts as an immediate success.
    Value(T),
    /// A plain error; counts as an immediate failure.
    Failed(Error),
    /// A deferred value; started and aborted along with the combinator.
    Deferred(Deferred<T>),
    /// A foreign continuable; followed, but never started or aborted.
    Foreign(Box<dyn Continuable<T>>),
}

impl<T> Entry<T> {
    /// Wraps a foreign continuable.
    pub fn foreign(next: impl Continuable<T> + 'static) -> Self {
        Self::Foreign(Box::new(next))
    }
}

impl<T> From<Deferred<T>> for Entry<T> {
    fn from(d: Deferred<T>) -> Self {
        Self::Deferred(d)
    }
}

impl<T: fmt::Debug> fmt::Debug for Entry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Failed(e) => f.debug_tuple("Failed").field(e).finish(),
            Self::Deferred(d) => f.debug_tuple("Deferred").field(d).finish(),
            Self::Foreign(next) => f
                .debug_struct("Foreign")
                .field("capabilities", &next.capabilities())
                .finish(),
        }
    }
}

/// An entry that settles later.
pub(crate) struct Child<T> {
    pub(crate) index: usize,
    pub(crate) value: Deferred<T>,
    /// False for foreign entries.
    pub(crate) abortable: bool,
}

impl<T> Clone for Child<T> {
    fn clone(&self) -> Self {
        Self {
            index: self.index,
            value: self.value.clone(),
            abortable: self.abortable,
        }
    }
}

/// An entry that is already decided.
pub(crate) enum Immediate<T> {
    Value(T),
    Failed(Error),
}

/// Splits entries into decided ones and children, keeping input indexes.
///
/// A foreign continuable is followed through an internal deferred value.
pub(crate) fn classify<T: Clone + 'static>(
    handle: &Handle,
    entries: Vec<Entry<T>>,
) -> (Vec<(usize, Immediate<T>)>, Vec<Child<T>>) {
    let mut immediates = Vec::new();
    let mut children = Vec::new();
    for (index, entry) in entries.into_iter().enumerate() {
        match entry {
            Entry::Value(v) => immediates.push((index, Immediate::Value(v))),
            Entry::Failed(e) => immediates.push((index, Immediate::Failed(e))),
            Entry::Deferred(value) => children.push(Child {
                index,
                value,
                abortable: true,
            }),
            Entry::Foreign(next) => {
                let (value, resolver) = Deferred::deferred(handle);
                resolver.resolve(Resolution::Continue(next));
                children.push(Child {
                    index,
                    value,
                    abortable: false,
                });
            }
        }
    }
    (immediates, children)
}

/// Aborts every pending abortable child and returns a value that succeeds
/// once all of them have confirmed.
///
/// Under [`ForeignAbortPolicy::Block`] a pending foreign child keeps the
/// returned value pending forever.
pub(crate) fn cascade_abort<T: Clone + 'static>(
    handle: &Handle,
    children: &[Child<T>],
    reason: &AbortReason,
) -> Deferred<()> {
    let policy = handle.config().foreign_abort_policy;
    let summary = reason.summary();
    let (done, resolver) = Deferred::<()>::deferred(handle);
    let mut confirmations = Vec::new();
    let mut blocked = false;

    for child in children {
        let state = child.value.state();
        if matches!(state, State::Succeeded | State::Failed) {
            continue;
        }
        if !child.abortable {
            if state.is_pending() {
                match policy {
                    ForeignAbortPolicy::Block => {
                        warn!(
                            entry = child.index,
                            "foreign entry cannot be aborted; abort confirmation blocked"
                        );
                        blocked = true;
                    }
                    ForeignAbortPolicy::Ignore => {
                        debug!(entry = child.index, "foreign entry left running");
                    }
                }
            }
            continue;
        }
        let cascade = AbortReason::cascade(format!("Aborted as #{} -- {summary}", child.index));
        if let Err(err) = child.value.abort_with(cascade) {
            debug!(entry = child.index, error = %err, "entry abort rejected");
            continue;
        }
        confirmations.push(child.value.completion());
    }

    if blocked {
        return done;
    }
    if confirmations.is_empty() {
        resolver.success(());
        return done;
    }
    let remaining = Rc::new(Cell::new(confirmations.len()));
    for confirmation in confirmations {
        let remaining = Rc::clone(&remaining);
        let resolver = resolver.clone();
        confirmation.on_publish(move |_| {
            remaining.set(remaining.get() - 1);
            if remaining.get() == 0 {
                resolver.success(());
            }
        });
    }
    done
}
