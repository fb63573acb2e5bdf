//! Bridge configuration.
//!
//! Loads from environment variables with defaults for everything:
//!
//! | Variable | Default |
//! |---|---|
//! | `APM_BRIDGE_CHANNEL_NAME` | `apm_bridge` |
//! | `APM_BRIDGE_CHANNEL_CAPACITY` | `64` |
//! | `APM_BRIDGE_SUPERSEDE_POLICY` | `replace` |
//! | `APM_BRIDGE_METRICS_ADDR` | unset |
//! | `APM_BRIDGE_LOG_FILTER` | `info` |

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable holds a value that cannot be used
    #[error("Invalid value '{value}' for {key}: {reason}")]
    Invalid {
        /// Variable name
        key: &'static str,
        /// Offending value
        value: String,
        /// Why it was rejected
        reason: String,
    },
}

/// What to do when a start arrives for a name that is already live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupersedePolicy {
    /// Overwrite the registry entry; the old handle is dropped without being
    /// stopped and never reaches the engine again. For transactions the
    /// components filed under the old handle are dropped with it.
    #[default]
    Replace,
    /// Stop the old handle as it is replaced. For transactions this also stops
    /// the components still filed under the old handle.
    Finalize,
}

impl FromStr for SupersedePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "replace" => Ok(Self::Replace),
            "finalize" => Ok(Self::Finalize),
            other => Err(format!("expected 'replace' or 'finalize', got '{other}'")),
        }
    }
}

impl fmt::Display for SupersedePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Replace => write!(f, "replace"),
            Self::Finalize => write!(f, "finalize"),
        }
    }
}

/// Configuration for a bridge instance
///
/// # Example
///
/// ```
/// use apm_bridge_runtime::config::{BridgeConfig, SupersedePolicy};
///
/// let config = BridgeConfig::default()
///     .with_channel_capacity(16)
///     .with_supersede_policy(SupersedePolicy::Finalize);
///
/// assert_eq!(config.channel_name, "apm_bridge");
/// assert_eq!(config.channel_capacity, 16);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Name the channel is registered under (used in logs)
    pub channel_name: String,
    /// Maximum number of queued, not yet dispatched calls
    pub channel_capacity: usize,
    /// Handling of a second start for a live name
    pub supersede_policy: SupersedePolicy,
    /// Where the host exposes Prometheus metrics, if at all
    pub metrics_addr: Option<SocketAddr>,
    /// Default `tracing` filter when `RUST_LOG` is not set
    pub log_filter: String,
}

impl BridgeConfig {
    /// Load configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a variable is set to an unusable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a variable is set to an unusable value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let channel_capacity = match lookup("APM_BRIDGE_CHANNEL_CAPACITY") {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(0) => return Err(invalid("APM_BRIDGE_CHANNEL_CAPACITY", raw, "must be at least 1")),
                Ok(capacity) => capacity,
                Err(e) => return Err(invalid("APM_BRIDGE_CHANNEL_CAPACITY", raw, e)),
            },
            None => defaults.channel_capacity,
        };

        let supersede_policy = match lookup("APM_BRIDGE_SUPERSEDE_POLICY") {
            Some(raw) => raw
                .parse()
                .map_err(|e: String| invalid("APM_BRIDGE_SUPERSEDE_POLICY", raw.clone(), e))?,
            None => defaults.supersede_policy,
        };

        let metrics_addr = match lookup("APM_BRIDGE_METRICS_ADDR") {
            Some(raw) if raw.trim().is_empty() => None,
            Some(raw) => Some(
                raw.trim()
                    .parse()
                    .map_err(|e| invalid("APM_BRIDGE_METRICS_ADDR", raw.clone(), e))?,
            ),
            None => defaults.metrics_addr,
        };

        Ok(Self {
            channel_name: lookup("APM_BRIDGE_CHANNEL_NAME").unwrap_or(defaults.channel_name),
            channel_capacity,
            supersede_policy,
            metrics_addr,
            log_filter: lookup("APM_BRIDGE_LOG_FILTER").unwrap_or(defaults.log_filter),
        })
    }

    /// Set the channel name
    #[must_use]
    pub fn with_channel_name(mut self, name: impl Into<String>) -> Self {
        self.channel_name = name.into();
        self
    }

    /// Set the channel capacity
    #[must_use]
    pub const fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Set the supersede policy
    #[must_use]
    pub const fn with_supersede_policy(mut self, policy: SupersedePolicy) -> Self {
        self.supersede_policy = policy;
        self
    }

    /// Set the metrics address
    #[must_use]
    pub const fn with_metrics_addr(mut self, addr: SocketAddr) -> Self {
        self.metrics_addr = Some(addr);
        self
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            channel_name: "apm_bridge".to_string(),
            channel_capacity: 64,
            supersede_policy: SupersedePolicy::Replace,
            metrics_addr: None,
            log_filter: "info".to_string(),
        }
    }
}

fn invalid(key: &'static str, value: String, reason: impl fmt::Display) -> ConfigError {
    ConfigError::Invalid {
        key,
        value,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<BridgeConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        BridgeConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(load(&[]), Ok(BridgeConfig::default()));
    }

    #[test]
    fn reads_every_variable() {
        let config = load(&[
            ("APM_BRIDGE_CHANNEL_NAME", "apm_mobileapm"),
            ("APM_BRIDGE_CHANNEL_CAPACITY", "8"),
            ("APM_BRIDGE_SUPERSEDE_POLICY", "Finalize"),
            ("APM_BRIDGE_METRICS_ADDR", "127.0.0.1:9090"),
            ("APM_BRIDGE_LOG_FILTER", "debug"),
        ]);

        let Ok(config) = config else {
            unreachable!("valid environment should load: {config:?}");
        };
        assert_eq!(config.channel_name, "apm_mobileapm");
        assert_eq!(config.channel_capacity, 8);
        assert_eq!(config.supersede_policy, SupersedePolicy::Finalize);
        assert_eq!(config.metrics_addr.map(|a| a.port()), Some(9090));
        assert_eq!(config.log_filter, "debug");
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(matches!(
            load(&[("APM_BRIDGE_CHANNEL_CAPACITY", "0")]),
            Err(ConfigError::Invalid { key: "APM_BRIDGE_CHANNEL_CAPACITY", .. })
        ));
    }

    #[test]
    fn unknown_policy_is_rejected() {
        assert!(matches!(
            load(&[("APM_BRIDGE_SUPERSEDE_POLICY", "ignore")]),
            Err(ConfigError::Invalid { key: "APM_BRIDGE_SUPERSEDE_POLICY", .. })
        ));
    }

    #[test]
    fn blank_metrics_addr_means_disabled() {
        assert_eq!(load(&[("APM_BRIDGE_METRICS_ADDR", " ")]).map(|c| c.metrics_addr), Ok(None));
        assert!(load(&[("APM_BRIDGE_METRICS_ADDR", "localhost")]).is_err());
    }

    #[test]
    fn policy_round_trips_through_display() {
        for policy in [SupersedePolicy::Replace, SupersedePolicy::Finalize] {
            assert_eq!(policy.to_string().parse::<SupersedePolicy>(), Ok(policy));
        }
    }
}
