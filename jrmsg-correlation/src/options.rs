//! Correlation options
//!
//! # Environment
//!
//! `Options::default()` reads two overrides:
//! - `JRMSG_CALLBACK_TIMEOUT_MS`: default window in milliseconds
//! - `JRMSG_AUTO_FIRE`: `true`/`false` (also `1`/`0`, `yes`/`no`, `on`/`off`)
//!
//! Unparseable values are ignored with a warning.

use std::time::Duration;

/// Window used when a request is registered without an explicit timeout
pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_millis(60_000);

/// Environment variable overriding [`Options::default_timeout`]
pub const TIMEOUT_ENV: &str = "JRMSG_CALLBACK_TIMEOUT_MS";

/// Environment variable overriding [`Options::auto_fire_callbacks`]
pub const AUTO_FIRE_ENV: &str = "JRMSG_AUTO_FIRE";

/// Behaviour switches for a [`crate::RpcContext`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Deliver a Response to its pending request as soon as the context
    /// builds or receives it
    pub auto_fire_callbacks: bool,
    /// Timeout applied by `register` and the context's request helpers
    pub default_timeout: Duration,
}

impl Options {
    /// Built-in defaults, ignoring the environment
    pub const fn new() -> Self {
        Self {
            auto_fire_callbacks: true,
            default_timeout: DEFAULT_CALLBACK_TIMEOUT,
        }
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Self {
        let mut options = Self::new();

        if let Ok(raw) = std::env::var(TIMEOUT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => options.default_timeout = Duration::from_millis(ms),
                _ => tracing::warn!(var = TIMEOUT_ENV, value = %raw, "Ignoring invalid timeout"),
            }
        }

        if let Ok(raw) = std::env::var(AUTO_FIRE_ENV) {
            match parse_flag(&raw) {
                Some(flag) => options.auto_fire_callbacks = flag,
                None => tracing::warn!(var = AUTO_FIRE_ENV, value = %raw, "Ignoring invalid flag"),
            }
        }

        options
    }

    /// Turn auto-fire on or off
    pub fn with_auto_fire(mut self, enable: bool) -> Self {
        self.auto_fire_callbacks = enable;
        self
    }

    /// Set the default correlation window
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::from_env()
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
