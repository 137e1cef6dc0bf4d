//! Error types and error handling strategy for settle.
//!
//! Error handling follows these principles:
//!
//! - Errors are explicit and typed (no stringly-typed errors)
//! - Usage errors (invalid lifecycle transitions) are returned to the caller, never panicked
//! - Settlement conflicts are logged rather than surfaced, so in-flight chains stay stable
//! - Panics inside user closures are isolated and converted to [`ErrorKind::CallbackPanicked`]
//!
//! # Error Categories
//!
//! - **Usage**: the caller violated the lifecycle contract (starting a settled value, ...)
//! - **Settlement**: chain recursion and failed continuation registration
//! - **Callback**: a preparer, starter or handler panicked
//! - **Abort**: an aborted outcome converted into a `Result`
//! - **Config**: an invalid loop configuration override
//! - **Internal**: bugs and impossible states
//! - **User**: failures produced by application code

use core::fmt;
use std::any::Any;
use std::sync::Arc;

use crate::types::{AbortReason, DeferredId, State};

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // === Usage ===
    /// A lifecycle operation was invoked from a state that forbids it.
    InvalidStateTransition,
    /// A preparer neither settled its value nor returned management functions.
    InvalidPreparation,

    // === Settlement ===
    /// A value was resolved with itself.
    ChainRecursion,
    /// A continuable refused or failed to register its continuation.
    ContinuationFailed,

    // === Callbacks ===
    /// A user-supplied closure panicked.
    CallbackPanicked,

    // === Abort ===
    /// The value was aborted (only produced when converting outcomes to results).
    Aborted,

    // === Configuration ===
    /// A configuration value could not be applied.
    Config,

    // === Internal ===
    /// Internal error (bug).
    Internal,

    // === User ===
    /// Application-level failure.
    User,
}

impl ErrorKind {
    /// Returns the category for this error kind.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidStateTransition | Self::InvalidPreparation => ErrorCategory::Usage,
            Self::ChainRecursion | Self::ContinuationFailed => ErrorCategory::Settlement,
            Self::CallbackPanicked => ErrorCategory::Callback,
            Self::Aborted => ErrorCategory::Abort,
            Self::Config => ErrorCategory::Config,
            Self::Internal => ErrorCategory::Internal,
            Self::User => ErrorCategory::User,
        }
    }
}

/// High-level error category for grouping error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Lifecycle contract violations.
    Usage,
    /// Settlement and absorption failures.
    Settlement,
    /// Panics in user closures.
    Callback,
    /// Abort converted to an error.
    Abort,
    /// Configuration failures.
    Config,
    /// Internal errors.
    Internal,
    /// User-originated errors.
    User,
}

/// Diagnostic context for an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// The deferred value the error refers to.
    pub deferred_id: Option<DeferredId>,
    /// The lifecycle state observed when the error was raised.
    pub state: Option<State>,
}

/// The main error type for settle operations.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
    context: ErrorContext,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
            context: ErrorContext {
                deferred_id: None,
                state: None,
            },
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// Returns true if this error is a lifecycle usage error.
    #[must_use]
    pub const fn is_usage(&self) -> bool {
        matches!(self.kind.category(), ErrorCategory::Usage)
    }

    /// Returns true if this error reports chain recursion.
    #[must_use]
    pub const fn is_chain_recursion(&self) -> bool {
        matches!(self.kind, ErrorKind::ChainRecursion)
    }

    /// Returns true if this error stands for an abort.
    #[must_use]
    pub const fn is_aborted(&self) -> bool {
        matches!(self.kind, ErrorKind::Aborted)
    }

    /// Adds a message description to the error.
    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Adds structured context to the error.
    #[must_use]
    pub fn with_context(mut self, ctx: ErrorContext) -> Self {
        self.context = ctx;
        self
    }

    /// Adds a source error to the chain.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Returns the error message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns the error context.
    #[must_use]
    pub fn context(&self) -> &ErrorContext {
        &self.context
    }

    /// Returns true if `other` describes the same failure (kind, message and context).
    ///
    /// Source chains are not compared.
    #[must_use]
    pub fn same_failure(&self, other: &Self) -> bool {
        self.kind == other.kind && self.message == other.message && self.context == other.context
    }

    /// Creates an application-level failure.
    #[must_use]
    pub fn user(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::User).with_message(msg)
    }

    /// Creates a usage error for an operation attempted from a forbidden state.
    #[must_use]
    pub fn invalid_transition(op: &str, id: DeferredId, state: State) -> Self {
        let detail = match state {
            State::Constructing => format!("cannot {op} while still constructing"),
            State::Ready => format!("cannot {op} before starting"),
            s if s.is_terminal() => format!("cannot {op} after settled ({s})"),
            s => format!("cannot {op} from state {s}"),
        };
        Self::new(ErrorKind::InvalidStateTransition)
            .with_message(detail)
            .with_context(ErrorContext {
                deferred_id: Some(id),
                state: Some(state),
            })
    }

    /// Creates the error reported when a preparer returns nothing while still constructing.
    #[must_use]
    pub fn invalid_preparation(id: DeferredId) -> Self {
        Self::new(ErrorKind::InvalidPreparation)
            .with_message("preparer neither settled nor provided management functions")
            .with_context(ErrorContext {
                deferred_id: Some(id),
                state: Some(State::Constructing),
            })
    }

    /// Creates the error used when a value is resolved with itself.
    #[must_use]
    pub fn chain_recursion(id: DeferredId) -> Self {
        Self::new(ErrorKind::ChainRecursion)
            .with_message("chain recursion prohibited")
            .with_context(ErrorContext {
                deferred_id: Some(id),
                state: None,
            })
    }

    /// Creates a continuation failure.
    #[must_use]
    pub fn continuation_failed(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::ContinuationFailed).with_message(detail)
    }

    /// Converts a caught panic payload into an error.
    #[must_use]
    pub fn callback_panicked(payload: &(dyn Any + Send)) -> Self {
        Self::new(ErrorKind::CallbackPanicked).with_message(panic_message(payload))
    }

    /// Creates an error standing for an abort.
    #[must_use]
    pub fn aborted(reason: &AbortReason) -> Self {
        Self::new(ErrorKind::Aborted).with_message(reason.to_string())
    }

    /// Creates an internal error (bug).
    #[must_use]
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal).with_message(detail)
    }
}

/// Extracts a printable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl From<crate::runtime::ConfigError> for Error {
    fn from(e: crate::runtime::ConfigError) -> Self {
        Self::new(ErrorKind::Config)
            .with_message(e.to_string())
            .with_source(e)
    }
}

/// Extension trait for adding context to Results.
#[allow(clippy::result_large_err)]
pub trait ResultExt<T> {
    /// Attach a context message on error.
    fn context(self, msg: impl Into<String>) -> Result<T>;
    /// Attach context message computed lazily on error.
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for core::result::Result<T, E> {
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_message(msg))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| e.into().with_message(f()))
    }
}

/// A specialized Result type for settle operations.
#[allow(clippy::result_large_err)]
pub type Result<T> = core::result::Result<T, Error>;
