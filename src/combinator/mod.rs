//! Combinators over sets of deferred values.
//!
//! - [`all`](fn@all): wait for every entry, fail fast on the first failure
//! - [`race`](fn@race): first entry to settle decides
//!
//! Both accept [`Entry`] inputs: plain values, plain errors, deferred values
//! and foreign continuables. Deferred entries are started when the
//! combinator starts and aborted when it is aborted; foreign entries are only
//! followed.

pub mod all;
pub mod entry;
pub mod race;

pub use all::all;
pub use entry::Entry;
pub use race::race;
