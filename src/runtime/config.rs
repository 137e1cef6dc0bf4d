//! Event loop configuration.
//!
//! # Defaults
//!
//! | Field | Default |
//! |-------|---------|
//! | `max_turns` | `Some(1_000_000)` |
//! | `label_alphabet` | `"ABCDEFGHIJKLMNOPQRSTUVWXYZ"` |
//! | `foreign_abort_policy` | [`ForeignAbortPolicy::Block`] |

/// Default bound on the turns executed by one `run_until_idle` call.
pub const DEFAULT_MAX_TURNS: u64 = 1_000_000;

/// Default alphabet for diagnostic label suffixes.
pub const DEFAULT_LABEL_ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// How a combinator's abort confirmation treats entries that cannot be aborted.
///
/// Foreign continuables expose no abort capability, so a combinator can never
/// learn that they stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ForeignAbortPolicy {
    /// A pending foreign entry holds the confirmation back forever.
    #[default]
    Block,
    /// Confirm once every abort-capable entry confirmed; foreign entries are
    /// left running with no guarantee.
    Ignore,
}

impl ForeignAbortPolicy {
    /// Lowercase name accepted by the environment override.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::Ignore => "ignore",
        }
    }
}

/// Configuration for an [`EventLoop`](super::EventLoop).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopConfig {
    /// Upper bound on the turns one `run_until_idle` call executes (`None` = unbounded).
    pub max_turns: Option<u64>,
    /// Characters cycled through for label suffixes.
    pub label_alphabet: String,
    /// Abort confirmation policy for non-abortable combinator entries.
    pub foreign_abort_policy: ForeignAbortPolicy,
}

impl LoopConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the turn bound for `run_until_idle`.
    #[must_use]
    pub const fn max_turns(mut self, max_turns: Option<u64>) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Sets the label suffix alphabet.
    #[must_use]
    pub fn label_alphabet(mut self, alphabet: impl Into<String>) -> Self {
        self.label_alphabet = alphabet.into();
        self
    }

    /// Sets the foreign abort policy.
    #[must_use]
    pub const fn foreign_abort_policy(mut self, policy: ForeignAbortPolicy) -> Self {
        self.foreign_abort_policy = policy;
        self
    }

    /// Normalize configuration values to safe defaults.
    pub fn normalize(&mut self) {
        if self.max_turns == Some(0) {
            self.max_turns = Some(DEFAULT_MAX_TURNS);
        }
        if self.label_alphabet.chars().count() < 2 {
            self.label_alphabet = DEFAULT_LABEL_ALPHABET.to_string();
        }
    }

    /// Defaults, then `SETTLE_*` environment overrides, then normalization.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`](super::ConfigError) if a variable is set to an
    /// unparseable value.
    pub fn from_env() -> Result<Self, super::ConfigError> {
        let mut config = Self::default();
        super::env_config::apply_env_overrides(&mut config)?;
        config.normalize();
        Ok(config)
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_turns: Some(DEFAULT_MAX_TURNS),
            label_alphabet: DEFAULT_LABEL_ALPHABET.to_string(),
            foreign_abort_policy: ForeignAbortPolicy::Block,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = LoopConfig::default();
        assert_eq!(config.max_turns, Some(DEFAULT_MAX_TURNS));
        assert_eq!(config.label_alphabet, DEFAULT_LABEL_ALPHABET);
        assert_eq!(config.foreign_abort_policy, ForeignAbortPolicy::Block);
    }

    #[test]
    fn builder_setters() {
        let config = LoopConfig::new()
            .max_turns(None)
            .label_alphabet("xyz")
            .foreign_abort_policy(ForeignAbortPolicy::Ignore);
        assert_eq!(config.max_turns, None);
        assert_eq!(config.label_alphabet, "xyz");
        assert_eq!(config.foreign_abort_policy, ForeignAbortPolicy::Ignore);
    }

    #[test]
    fn normalize_repairs_degenerate_values() {
        let mut config = LoopConfig::new().max_turns(Some(0)).label_alphabet("Q");
        config.normalize();
        assert_eq!(config.max_turns, Some(DEFAULT_MAX_TURNS));
        assert_eq!(config.label_alphabet, DEFAULT_LABEL_ALPHABET);

        let mut empty = LoopConfig::new().label_alphabet("");
        empty.normalize();
        assert_eq!(empty.label_alphabet, DEFAULT_LABEL_ALPHABET);
    }

    #[test]
    fn normalize_keeps_valid_values() {
        let mut config = LoopConfig::new().max_turns(None).label_alphabet("ab");
        config.normalize();
        assert_eq!(config.max_turns, None);
        assert_eq!(config.label_alphabet, "ab");
    }
}
