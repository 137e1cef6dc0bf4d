//! Environment variable and config file support for [`LoopConfig`].
//!
//! # Configuration Precedence
//!
//! Settings are resolved in this order (highest priority first):
//!
//! 1. **Programmatic** : values set via builder methods (`max_turns(None)`)
//! 2. **Environment variables** : values from `SETTLE_*` env vars
//! 3. **Config file** : values loaded from a TOML file (requires `config-file` feature)
//! 4. **Defaults** : built-in defaults from [`LoopConfig::default()`]
//!
//! # Supported Environment Variables
//!
//! | Variable | Type | Maps to |
//! |----------|------|---------|
//! | `SETTLE_MAX_TURNS` | `u64`, or `0`/`none`/`unbounded` | `max_turns` |
//! | `SETTLE_LABEL_ALPHABET` | `String` | `label_alphabet` |
//! | `SETTLE_FOREIGN_ABORT_POLICY` | `block`/`ignore` | `foreign_abort_policy` |

use crate::runtime::config::{ForeignAbortPolicy, LoopConfig};

/// Environment variable name for the `run_until_idle` turn bound.
pub const ENV_MAX_TURNS: &str = "SETTLE_MAX_TURNS";
/// Environment variable name for the label suffix alphabet.
pub const ENV_LABEL_ALPHABET: &str = "SETTLE_LABEL_ALPHABET";
/// Environment variable name for the foreign abort policy.
pub const ENV_FOREIGN_ABORT_POLICY: &str = "SETTLE_FOREIGN_ABORT_POLICY";

/// Errors raised while reading configuration overrides.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable held a value of the wrong shape.
    #[error("invalid value for {var}: expected {expected}, got {value:?}")]
    InvalidValue {
        /// Variable name.
        var: &'static str,
        /// The rejected value.
        value: String,
        /// What was expected instead.
        expected: &'static str,
    },
    /// A config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// File path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A config file was not valid TOML for [`LoopTomlConfig`].
    #[cfg(feature = "config-file")]
    #[error("failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Apply environment variable overrides to a [`LoopConfig`].
///
/// Only variables that are set in the environment are applied.
///
/// # Errors
///
/// Returns an error if a variable is set but contains an unparseable value.
pub fn apply_env_overrides(config: &mut LoopConfig) -> Result<(), ConfigError> {
    if let Some(val) = read_env(ENV_MAX_TURNS) {
        config.max_turns = parse_turn_limit(ENV_MAX_TURNS, &val)?;
    }
    if let Some(val) = read_env(ENV_LABEL_ALPHABET) {
        config.label_alphabet = val;
    }
    if let Some(val) = read_env(ENV_FOREIGN_ABORT_POLICY) {
        config.foreign_abort_policy = parse_policy(ENV_FOREIGN_ABORT_POLICY, &val)?;
    }
    Ok(())
}

/// Read an environment variable, returning `None` if unset.
fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parse_turn_limit(var: &'static str, val: &str) -> Result<Option<u64>, ConfigError> {
    match val.trim().to_lowercase().as_str() {
        "0" | "none" | "unbounded" => Ok(None),
        other => other
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                var,
                value: val.to_string(),
                expected: "unsigned integer or none/unbounded",
            }),
    }
}

fn parse_policy(var: &'static str, val: &str) -> Result<ForeignAbortPolicy, ConfigError> {
    match val.trim().to_lowercase().as_str() {
        "block" => Ok(ForeignAbortPolicy::Block),
        "ignore" => Ok(ForeignAbortPolicy::Ignore),
        _ => Err(ConfigError::InvalidValue {
            var,
            value: val.to_string(),
            expected: "block or ignore",
        }),
    }
}

// =========================================================================
// TOML config file support (feature-gated)
// =========================================================================

/// TOML-deserializable loop configuration.
///
/// ```toml
/// [loop]
/// max_turns = 50000
/// label_alphabet = "abc"
/// foreign_abort_policy = "ignore"
/// ```
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
pub struct LoopTomlConfig {
    /// Loop settings.
    #[serde(default, rename = "loop")]
    pub event_loop: LoopToml,
}

/// `[loop]` section of the TOML config.
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
pub struct LoopToml {
    /// Turn bound for `run_until_idle` (0 = unbounded).
    pub max_turns: Option<u64>,
    /// Label suffix alphabet.
    pub label_alphabet: Option<String>,
    /// `"block"` or `"ignore"`.
    pub foreign_abort_policy: Option<TomlAbortPolicy>,
}

/// Serde mirror of [`ForeignAbortPolicy`].
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TomlAbortPolicy {
    /// See [`ForeignAbortPolicy::Block`].
    Block,
    /// See [`ForeignAbortPolicy::Ignore`].
    Ignore,
}

#[cfg(feature = "config-file")]
impl From<TomlAbortPolicy> for ForeignAbortPolicy {
    fn from(p: TomlAbortPolicy) -> Self {
        match p {
            TomlAbortPolicy::Block => Self::Block,
            TomlAbortPolicy::Ignore => Self::Ignore,
        }
    }
}

/// Apply a parsed TOML config to a [`LoopConfig`].
///
/// Only fields that are `Some` in the TOML struct override the config.
#[cfg(feature = "config-file")]
pub fn apply_toml_config(config: &mut LoopConfig, toml: &LoopTomlConfig) {
    if let Some(v) = toml.event_loop.max_turns {
        config.max_turns = if v == 0 { None } else { Some(v) };
    }
    if let Some(ref v) = toml.event_loop.label_alphabet {
        config.label_alphabet.clone_from(v);
    }
    if let Some(v) = toml.event_loop.foreign_abort_policy {
        config.foreign_abort_policy = v.into();
    }
}

/// Parse a TOML string into a [`LoopTomlConfig`].
///
/// # Errors
///
/// Returns [`ConfigError::Toml`] on malformed input.
#[cfg(feature = "config-file")]
pub fn parse_toml_str(toml_str: &str) -> Result<LoopTomlConfig, ConfigError> {
    Ok(toml::from_str(toml_str)?)
}

/// Read and parse a TOML file into a [`LoopTomlConfig`].
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read, or
/// [`ConfigError::Toml`] if it does not parse.
#[cfg(feature = "config-file")]
pub fn parse_toml_file(path: &std::path::Path) -> Result<LoopTomlConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_toml_str(&content)
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn with_clean_env<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = crate::test_utils::env_lock();
        clean_env_locked();
        let result = f();
        clean_env_locked();
        result
    }

    fn with_env<F, R>(var: &str, val: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        with_clean_env(|| {
            std::env::set_var(var, val);
            f()
        })
    }

    fn clean_env_locked() {
        for var in &[ENV_MAX_TURNS, ENV_LABEL_ALPHABET, ENV_FOREIGN_ABORT_POLICY] {
            std::env::remove_var(var);
        }
    }

    // --- parse helpers ---

    #[test]
    fn parse_turn_limit_values() {
        assert_eq!(parse_turn_limit("TEST", "42").unwrap(), Some(42));
        assert_eq!(parse_turn_limit("TEST", " 100 ").unwrap(), Some(100));
        assert_eq!(parse_turn_limit("TEST", "0").unwrap(), None);
        assert_eq!(parse_turn_limit("TEST", "Unbounded").unwrap(), None);
        assert_eq!(parse_turn_limit("TEST", "none").unwrap(), None);
    }

    #[test]
    fn parse_turn_limit_invalid() {
        assert!(parse_turn_limit("TEST", "abc").is_err());
        assert!(parse_turn_limit("TEST", "-1").is_err());
        assert!(parse_turn_limit("TEST", "").is_err());
    }

    #[test]
    fn parse_policy_values() {
        assert_eq!(
            parse_policy("TEST", "BLOCK").unwrap(),
            ForeignAbortPolicy::Block
        );
        assert_eq!(
            parse_policy("TEST", " ignore ").unwrap(),
            ForeignAbortPolicy::Ignore
        );
        assert!(parse_policy("TEST", "maybe").is_err());
    }

    // --- apply_env_overrides ---

    #[test]
    fn env_overrides_max_turns() {
        with_env(ENV_MAX_TURNS, "500", || {
            let mut config = LoopConfig::default();
            apply_env_overrides(&mut config).unwrap();
            assert_eq!(config.max_turns, Some(500));
        });
    }

    #[test]
    fn env_overrides_label_alphabet() {
        with_env(ENV_LABEL_ALPHABET, "xyz", || {
            let mut config = LoopConfig::default();
            apply_env_overrides(&mut config).unwrap();
            assert_eq!(config.label_alphabet, "xyz");
        });
    }

    #[test]
    fn env_overrides_policy() {
        with_env(ENV_FOREIGN_ABORT_POLICY, "ignore", || {
            let config = LoopConfig::from_env().unwrap();
            assert_eq!(config.foreign_abort_policy, ForeignAbortPolicy::Ignore);
        });
    }

    #[test]
    fn env_overrides_unset_vars_leave_defaults() {
        with_clean_env(|| {
            let mut config = LoopConfig::default();
            apply_env_overrides(&mut config).unwrap();
            assert_eq!(config, LoopConfig::default());
        });
    }

    #[test]
    fn from_env_normalizes() {
        with_env(ENV_LABEL_ALPHABET, "Z", || {
            let config = LoopConfig::from_env().unwrap();
            assert_eq!(
                config.label_alphabet,
                crate::runtime::config::DEFAULT_LABEL_ALPHABET
            );
        });
    }

    #[test]
    fn env_overrides_invalid_value_returns_error() {
        with_env(ENV_MAX_TURNS, "not_a_number", || {
            let mut config = LoopConfig::default();
            let msg = apply_env_overrides(&mut config).unwrap_err().to_string();
            assert!(
                msg.contains(ENV_MAX_TURNS),
                "error should mention var name: {msg}"
            );
            assert!(
                msg.contains("not_a_number"),
                "error should mention bad value: {msg}"
            );
        });
    }
}

#[cfg(all(test, feature = "config-file"))]
mod toml_tests {
    use super::*;

    #[test]
    fn parse_toml_full_config() {
        let toml_str = r#"
[loop]
max_turns = 5000
label_alphabet = "abc"
foreign_abort_policy = "ignore"
"#;
        let parsed = parse_toml_str(toml_str).unwrap();
        assert_eq!(parsed.event_loop.max_turns, Some(5000));
        assert_eq!(parsed.event_loop.label_alphabet.as_deref(), Some("abc"));
        assert_eq!(
            parsed.event_loop.foreign_abort_policy,
            Some(TomlAbortPolicy::Ignore)
        );
    }

    #[test]
    fn parse_toml_empty_config() {
        let parsed = parse_toml_str("").unwrap();
        assert_eq!(parsed.event_loop.max_turns, None);
        assert!(parsed.event_loop.label_alphabet.is_none());
    }

    #[test]
    fn parse_toml_invalid_syntax() {
        let msg = parse_toml_str("not valid toml {{{{")
            .unwrap_err()
            .to_string();
        assert!(msg.contains("TOML"));
    }

    #[test]
    fn apply_toml_overrides_config() {
        let parsed = parse_toml_str("[loop]\nmax_turns = 0\n").unwrap();
        let mut config = LoopConfig::default();
        apply_toml_config(&mut config, &parsed);
        assert_eq!(config.max_turns, None);
        assert_eq!(config.label_alphabet, LoopConfig::default().label_alphabet);
    }

    #[test]
    fn toml_file_not_found() {
        let msg = parse_toml_file(std::path::Path::new("/nonexistent/settle.toml"))
            .unwrap_err()
            .to_string();
        assert!(msg.contains("failed to read"));
    }

    #[test]
    fn toml_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settle.toml");
        std::fs::write(&path, "[loop]\nlabel_alphabet = \"pq\"\n").unwrap();

        let parsed = parse_toml_file(&path).unwrap();
        let mut config = LoopConfig::default();
        apply_toml_config(&mut config, &parsed);
        assert_eq!(config.label_alphabet, "pq");
    }
}
