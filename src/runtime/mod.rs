//! Event loop and its configuration.
//!
//! - [`event_loop`]: the single-threaded job queue and the [`Handle`] deferred values hold
//! - [`clock`]: time sources used to stamp diagnostic labels
//! - [`label`]: cycling label suffixes
//! - [`config`]: loop configuration types
//! - [`env_config`]: `SETTLE_*` environment and TOML overrides
//!
//! ```
//! use settle::runtime::{EventLoop, LoopConfig};
//!
//! let mut event_loop = EventLoop::new(LoopConfig::from_env()?);
//! event_loop.run_until_idle();
//! # Ok::<(), settle::runtime::ConfigError>(())
//! ```

pub mod clock;
pub mod config;
pub mod env_config;
pub mod event_loop;
pub mod label;

pub use clock::{TimeSource, VirtualClock, WallClock};
pub use config::{ForeignAbortPolicy, LoopConfig};
pub use env_config::{apply_env_overrides, ConfigError};
#[cfg(feature = "config-file")]
pub use env_config::{apply_toml_config, parse_toml_file, parse_toml_str, LoopTomlConfig};
pub use event_loop::{EventLoop, Handle};
pub use label::SuffixCycler;
