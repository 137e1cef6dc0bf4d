//! Abort reason and kind types.
//!
//! Abort is an explicit protocol, not a silent drop: every aborted value
//! carries a reason describing where the abort came from.

use core::fmt;

/// Where an abort originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AbortKind {
    /// Explicit `abort()` from user code.
    User,
    /// An upstream value or combinator entry aborted and the abort travelled along the chain.
    Propagated,
    /// A combinator was aborted and forwarded the abort to its entries.
    Cascade,
    /// A sibling entry of `all` failed.
    FailFast,
    /// Another entry of `race` settled first.
    RaceLost,
}

impl fmt::Display for AbortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Propagated => write!(f, "propagated"),
            Self::Cascade => write!(f, "cascade"),
            Self::FailFast => write!(f, "fail-fast"),
            Self::RaceLost => write!(f, "race lost"),
        }
    }
}

/// The reason for an abort: kind plus optional message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbortReason {
    kind: AbortKind,
    message: Option<String>,
}

impl AbortReason {
    /// Creates a reason of the given kind with no message.
    #[must_use]
    pub const fn new(kind: AbortKind) -> Self {
        Self {
            kind,
            message: None,
        }
    }

    /// Creates a user abort with an optional message.
    #[must_use]
    pub fn user(message: Option<String>) -> Self {
        Self {
            kind: AbortKind::User,
            message,
        }
    }

    /// Abort that travelled from an upstream value.
    #[must_use]
    pub fn propagated(message: impl Into<String>) -> Self {
        Self::new(AbortKind::Propagated).with_message(message)
    }

    /// Abort forwarded by an aborted combinator to one of its entries.
    #[must_use]
    pub fn cascade(message: impl Into<String>) -> Self {
        Self::new(AbortKind::Cascade).with_message(message)
    }

    /// Abort sent to `all` entries after a sibling failed.
    #[must_use]
    pub fn fail_fast(message: impl Into<String>) -> Self {
        Self::new(AbortKind::FailFast).with_message(message)
    }

    /// Abort sent to `race` entries after another entry settled.
    #[must_use]
    pub fn race_lost(message: impl Into<String>) -> Self {
        Self::new(AbortKind::RaceLost).with_message(message)
    }

    /// Replaces the message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Returns the kind.
    #[must_use]
    pub const fn kind(&self) -> AbortKind {
        self.kind
    }

    /// Returns the message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// The message, or the kind name when there is none.
    ///
    /// Used when an abort is re-labelled for propagation (`"Abort from #2 -- {summary}"`).
    #[must_use]
    pub fn summary(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| self.kind.to_string())
    }
}

impl Default for AbortReason {
    fn default() -> Self {
        Self::new(AbortKind::User)
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_message() {
        assert_eq!(AbortReason::default().to_string(), "user");
        assert_eq!(
            AbortReason::user(Some("stop".into())).to_string(),
            "user: stop"
        );
        assert_eq!(
            AbortReason::race_lost("#1 won the race").to_string(),
            "race lost: #1 won the race"
        );
    }

    #[test]
    fn summary_falls_back_to_kind() {
        assert_eq!(AbortReason::new(AbortKind::Cascade).summary(), "cascade");
        assert_eq!(AbortReason::fail_fast("#0 failed").summary(), "#0 failed");
    }

    #[test]
    fn with_message_replaces() {
        let reason = AbortReason::user(Some("a".into())).with_message("b");
        assert_eq!(reason.message(), Some("b"));
        assert_eq!(reason.kind(), AbortKind::User);
    }
}
