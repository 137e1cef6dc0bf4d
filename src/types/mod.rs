//! Core types for settle.
//!
//! - [`id`]: `DeferredId`, the loop-scoped identity of a deferred value
//! - [`state`]: full lifecycle `State` and the reduced `Phase` view
//! - [`abort`]: abort reason and kind types
//! - [`outcome`]: three-valued settlement outcome

pub mod abort;
pub mod id;
pub mod outcome;
pub mod state;

pub use abort::{AbortKind, AbortReason};
pub use id::DeferredId;
pub use outcome::Outcome;
pub use state::{Phase, State};
