//! Test utilities for settle.
//!
//! This module provides shared helpers for unit tests:
//! - Consistent tracing-based logging initialization
//! - Phase/section macros for readable test output
//! - Event loop constructors on a virtual clock
//! - Outcome assertion macros

#![allow(dead_code)]

use crate::runtime::{EventLoop, LoopConfig, VirtualClock};
use std::rc::Rc;
use std::sync::{Mutex, Once};
use tracing_subscriber::fmt::format::FmtSpan;

static INIT_LOGGING: Once = Once::new();
static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Initialize test logging with trace-level output.
///
/// Safe to call multiple times; only initializes once.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Initialize test logging with a custom level.
///
/// The first call wins; later calls are no-ops.
pub fn init_test_logging_with_level(level: tracing::Level) {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(false)
            .try_init();
    });
}

/// Acquire the global environment lock for tests that mutate env vars.
pub(crate) fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Event loop on a virtual clock with default configuration.
#[must_use]
pub fn test_loop() -> EventLoop {
    test_loop_with(LoopConfig::default())
}

/// Event loop on a virtual clock with the given configuration.
#[must_use]
pub fn test_loop_with(config: LoopConfig) -> EventLoop {
    init_test_logging();
    EventLoop::with_clock(config, Rc::new(VirtualClock::new()))
}

/// Log a test phase transition with a visual separator.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(phase = %$name, "========================================");
        tracing::info!(phase = %$name, "TEST PHASE: {}", $name);
        tracing::info!(phase = %$name, "========================================");
    };
}

/// Log a section within a test phase.
#[macro_export]
macro_rules! test_section {
    ($name:expr) => {
        tracing::debug!(section = %$name, "--- {} ---", $name);
    };
}

/// Log test completion with summary.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = %$name, "test completed successfully: {}", $name);
    };
    ($name:expr, $($key:ident = $value:expr),* $(,)?) => {
        tracing::info!(
            test = %$name,
            $($key = %$value,)*
            "test completed successfully: {}",
            $name
        );
    };
}

/// Log before assertions for context.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        tracing::debug!(
            expected = ?$expected,
            actual = ?$actual,
            "Asserting: {}",
            $msg
        );
        assert!($cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}

/// Assert that a deferred value succeeded with a specific value.
#[macro_export]
macro_rules! assert_succeeded {
    ($deferred:expr, $expected:expr) => {
        match $deferred.outcome() {
            Some($crate::types::Outcome::Success(v)) => assert_eq!(v, $expected),
            other => unreachable!("expected Success({:?}), got {:?}", $expected, other),
        }
    };
}

/// Assert that a deferred value failed.
#[macro_export]
macro_rules! assert_failed {
    ($deferred:expr) => {
        match $deferred.outcome() {
            Some($crate::types::Outcome::Failure(_)) => {}
            other => unreachable!("expected Failure, got {:?}", other),
        }
    };
}

/// Assert that a deferred value was aborted.
#[macro_export]
macro_rules! assert_aborted {
    ($deferred:expr) => {
        match $deferred.outcome() {
            Some($crate::types::Outcome::Aborted(_)) => {}
            other => unreachable!("expected Aborted, got {:?}", other),
        }
    };
}
