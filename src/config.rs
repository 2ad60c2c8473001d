// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the [`Config`] loaded from
//! them once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `MEMVAULT_CALLBACK_PORT_START` | First loopback callback port | `52370` |
//! | `MEMVAULT_CALLBACK_PORT_END` | Last loopback callback port (inclusive) | `52389` |
//! | `MEMVAULT_CHALLENGE_TTL_SECS` | Challenge lifetime and wait timeout | `120` |
//! | `MEMVAULT_SWEEP_INTERVAL_SECS` | Expired-entry sweep period | `300` |
//! | `MEMVAULT_MAX_ENTRIES` | Maximum unlocked records held | `256` |
//! | `MEMVAULT_UNLOCK_DURATION_SECS` | Unlock window per record | `3600` |
//! | `MEMVAULT_SESSION_MAX_AGE_SECS` | Maximum age of a persisted session | `86400` |
//! | `MEMVAULT_BACKEND_URL` | Access backend base URL | Unset (unlock disabled) |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,memvault=debug` |

use std::ops::RangeInclusive;
use std::time::Duration;

use tracing::warn;

use crate::auth::challenge::DEFAULT_CHALLENGE_TTL;
use crate::auth::session::DEFAULT_SESSION_MAX_AGE;
use crate::auth::{AuthenticatorConfig, DEFAULT_CALLBACK_PORTS};
use crate::storage::{DEFAULT_MAX_ENTRIES, DEFAULT_SWEEP_INTERVAL};
use crate::unlock::DEFAULT_UNLOCK_DURATION;

/// First port tried for the loopback callback listener.
///
/// # Default
/// `52370`
pub const CALLBACK_PORT_START_ENV: &str = "MEMVAULT_CALLBACK_PORT_START";

/// Last port tried for the loopback callback listener (inclusive).
///
/// # Default
/// `52389`
pub const CALLBACK_PORT_END_ENV: &str = "MEMVAULT_CALLBACK_PORT_END";

/// Lifetime of a sign-in challenge, in seconds. Also bounds how long an
/// authentication attempt waits for its callback.
pub const CHALLENGE_TTL_ENV: &str = "MEMVAULT_CHALLENGE_TTL_SECS";

/// Period of the background expiry sweep, in seconds.
pub const SWEEP_INTERVAL_ENV: &str = "MEMVAULT_SWEEP_INTERVAL_SECS";

/// Maximum number of unlocked records. The least recently used record is
/// evicted beyond this.
pub const MAX_ENTRIES_ENV: &str = "MEMVAULT_MAX_ENTRIES";

/// How long an unlocked record stays readable, in seconds.
pub const UNLOCK_DURATION_ENV: &str = "MEMVAULT_UNLOCK_DURATION_SECS";

/// Maximum age of a persisted wallet session, in seconds.
pub const SESSION_MAX_AGE_ENV: &str = "MEMVAULT_SESSION_MAX_AGE_SECS";

/// Base URL of the access backend.
///
/// # Example
/// `https://access.example.com`
pub const BACKEND_URL_ENV: &str = "MEMVAULT_BACKEND_URL";

/// Logging format: `json` for structured output, anything else for pretty.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("callback port range is inverted: {start} > {end}")]
    InvertedPortRange { start: u16, end: u16 },
}

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub callback_ports: RangeInclusive<u16>,
    pub challenge_ttl: Duration,
    pub sweep_interval: Duration,
    pub max_entries: usize,
    pub unlock_duration: Duration,
    pub session_max_age: Duration,
    pub backend_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            callback_ports: DEFAULT_CALLBACK_PORTS,
            challenge_ttl: DEFAULT_CHALLENGE_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            max_entries: DEFAULT_MAX_ENTRIES,
            unlock_duration: DEFAULT_UNLOCK_DURATION,
            session_max_age: DEFAULT_SESSION_MAX_AGE,
            backend_url: None,
        }
    }
}

impl Config {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using `lookup` to resolve variables.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let start = parse_or(&lookup, CALLBACK_PORT_START_ENV, *defaults.callback_ports.start());
        let end = parse_or(&lookup, CALLBACK_PORT_END_ENV, *defaults.callback_ports.end());
        if start > end {
            return Err(ConfigError::InvertedPortRange { start, end });
        }

        let secs = |name: &str, default: Duration| {
            Duration::from_secs(parse_or(&lookup, name, default.as_secs()))
        };

        Ok(Self {
            callback_ports: start..=end,
            challenge_ttl: secs(CHALLENGE_TTL_ENV, defaults.challenge_ttl),
            sweep_interval: secs(SWEEP_INTERVAL_ENV, defaults.sweep_interval),
            max_entries: parse_or(&lookup, MAX_ENTRIES_ENV, defaults.max_entries),
            unlock_duration: secs(UNLOCK_DURATION_ENV, defaults.unlock_duration),
            session_max_age: secs(SESSION_MAX_AGE_ENV, defaults.session_max_age),
            backend_url: lookup(BACKEND_URL_ENV)
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty()),
        })
    }

    pub fn authenticator(&self) -> AuthenticatorConfig {
        AuthenticatorConfig {
            port_range: self.callback_ports.clone(),
            challenge_ttl: self.challenge_ttl,
            ..AuthenticatorConfig::default()
        }
    }
}

/// Parse a positive number, falling back to `default` with a warning.
fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> T
where
    T: std::str::FromStr + PartialOrd + Default + Copy + std::fmt::Display,
{
    let Some(raw) = lookup(name) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => value,
        _ => {
            warn!(
                variable = name,
                value = %raw,
                default = %default,
                "Invalid configuration value, using default"
            );
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.callback_ports, 52370..=52389);
        assert_eq!(config.challenge_ttl, Duration::from_secs(120));
        assert_eq!(config.sweep_interval, Duration::from_secs(300));
        assert_eq!(config.max_entries, 256);
        assert!(config.backend_url.is_none());
    }

    #[test]
    fn reads_overrides() {
        let config = load(&[
            (CALLBACK_PORT_START_ENV, "40000"),
            (CALLBACK_PORT_END_ENV, "40005"),
            (CHALLENGE_TTL_ENV, "30"),
            (MAX_ENTRIES_ENV, "8"),
            (BACKEND_URL_ENV, " https://access.example.com "),
        ])
        .unwrap();
        assert_eq!(config.callback_ports, 40000..=40005);
        assert_eq!(config.challenge_ttl, Duration::from_secs(30));
        assert_eq!(config.max_entries, 8);
        assert_eq!(config.backend_url.as_deref(), Some("https://access.example.com"));

        let auth = config.authenticator();
        assert_eq!(auth.port_range, 40000..=40005);
        assert_eq!(auth.challenge_ttl, Duration::from_secs(30));
    }

    #[test]
    fn invalid_numbers_fall_back() {
        let config = load(&[
            (SWEEP_INTERVAL_ENV, "often"),
            (MAX_ENTRIES_ENV, "0"),
            (UNLOCK_DURATION_ENV, "-5"),
        ])
        .unwrap();
        assert_eq!(config.sweep_interval, DEFAULT_SWEEP_INTERVAL);
        assert_eq!(config.max_entries, DEFAULT_MAX_ENTRIES);
        assert_eq!(config.unlock_duration, DEFAULT_UNLOCK_DURATION);
    }

    #[test]
    fn inverted_port_range_is_error() {
        let err = load(&[
            (CALLBACK_PORT_START_ENV, "50010"),
            (CALLBACK_PORT_END_ENV, "50000"),
        ])
        .unwrap_err();
        assert_eq!(err, ConfigError::InvertedPortRange { start: 50010, end: 50000 });
    }

    #[test]
    fn empty_backend_url_is_unset() {
        let config = load(&[(BACKEND_URL_ENV, "  ")]).unwrap();
        assert!(config.backend_url.is_none());
    }
}
