//! Settle: deferred values with cooperative pause/resume and abort propagation.
//!
//! # Overview
//!
//! A [`Deferred`] is a promise-like value that eventually succeeds, fails, or
//! is aborted. Unlike a plain promise it has a lifecycle: it is prepared,
//! started, may be paused and resumed, and can be aborted. Abort travels along
//! chains and combinators: aborting a derived value aborts its source, and
//! aborting an `all`/`race` aborts every entry still pending.
//!
//! Everything runs on a single-threaded [`runtime::EventLoop`]. Settlement is
//! immediate but subscribers always run on a later turn, in registration
//! order.
//!
//! # Core Guarantees
//!
//! - **Single settlement**: the first outcome wins; later attempts are logged, never applied
//! - **Asynchronous delivery**: no callback runs during the call that registered or settled it
//! - **Confirmed aborts**: an abort publishes only once the aborted work has confirmed
//! - **Panic containment**: a panicking task, handler or preparer fails its value, not the loop
//!
//! # Module Structure
//!
//! - [`types`]: Identifiers, lifecycle states, outcomes, abort reasons
//! - [`runtime`]: Event loop, handle, clock and configuration
//! - [`deferred`]: The deferred value, its controller, chains and continuations
//! - [`combinator`]: `all` and `race`
//! - [`error`]: Error types
//!
//! # Example
//!
//! ```
//! use settle::runtime::EventLoop;
//! use settle::{all, Deferred, Entry, Prepared};
//!
//! let mut event_loop = EventLoop::default();
//! let h = event_loop.handle();
//!
//! let slow = Deferred::new(&h, |_| Some(Prepared::with_starter(|ctl| ctl.success(2))));
//! let sum = all(&h, vec![Entry::Value(1), slow.into()]).map(|v| v.iter().sum::<i32>());
//! sum.start_when_ready();
//!
//! event_loop.run_until_idle();
//! assert_eq!(sum.outcome().and_then(|o| o.ok()), Some(3));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::type_complexity)]

pub mod combinator;
pub mod deferred;
pub mod error;
pub mod runtime;
#[doc(hidden)]
pub mod tracing_compat;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-exports for convenient access to core types
pub use combinator::{all, race, Entry};
pub use deferred::{
    Capabilities, Continuable, ContinueFn, Controller, Deferred, Diagnostics, Handlers, Prepared,
    Resolution, Resolver, Sink,
};
pub use error::{Error, ErrorCategory, ErrorContext, ErrorKind, Result, ResultExt};
pub use runtime::{EventLoop, Handle, LoopConfig};
pub use types::{AbortKind, AbortReason, DeferredId, Outcome, Phase, State};
