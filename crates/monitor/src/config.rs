//! Monitor configuration loaded from environment variables.

use std::time::Duration;

use pingview_channel::endpoint::DEFAULT_RECORDING_PATH;
use pingview_channel::reconnect::{DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_DELAY};
use pingview_channel::{ChannelConfig, RetryPolicy};

/// Server used when `PINGVIEW_SERVER` is unset.
pub const DEFAULT_SERVER: &str = "localhost:6060";

/// Ceiling for the exponential backoff delay.
const EXPONENTIAL_MAX_DELAY: Duration = Duration::from_secs(60);

/// Everything the `pingview-monitor` daemon needs to run.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Server address, `host:port` or `http(s)://...`.
    pub server: String,
    pub channel: ChannelConfig,
    /// Refresh the session table over REST whenever the channel connects.
    pub rest_sync: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            channel: ChannelConfig::default(),
            rest_sync: true,
        }
    }
}

impl MonitorConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                           | Default          |
    /// |-----------------------------------|------------------|
    /// | `PINGVIEW_SERVER`                 | `localhost:6060` |
    /// | `PINGVIEW_WS_PATH`                | `/ws/recording`  |
    /// | `PINGVIEW_RECONNECT_DELAY_MS`     | `5000`           |
    /// | `PINGVIEW_MAX_RECONNECT_ATTEMPTS` | `5`              |
    /// | `PINGVIEW_BACKOFF`                | `fixed`          |
    /// | `PINGVIEW_REST_SYNC`              | `true`           |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup` instead of the process
    /// environment.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let server = var("PINGVIEW_SERVER").unwrap_or_else(|| DEFAULT_SERVER.into());
        let path = var("PINGVIEW_WS_PATH").unwrap_or_else(|| DEFAULT_RECORDING_PATH.into());

        let delay = match var("PINGVIEW_RECONNECT_DELAY_MS") {
            Some(raw) => Duration::from_millis(parse("PINGVIEW_RECONNECT_DELAY_MS", &raw)?),
            None => DEFAULT_RECONNECT_DELAY,
        };

        let max_attempts = match var("PINGVIEW_MAX_RECONNECT_ATTEMPTS") {
            Some(raw) => parse("PINGVIEW_MAX_RECONNECT_ATTEMPTS", &raw)?,
            None => DEFAULT_MAX_RECONNECT_ATTEMPTS,
        };

        let backoff = var("PINGVIEW_BACKOFF").map(|v| v.to_ascii_lowercase());
        let retry = match backoff.as_deref() {
            None | Some("fixed") => RetryPolicy {
                delay,
                max_attempts,
                ..RetryPolicy::default()
            },
            Some("exponential") => {
                RetryPolicy::exponential(delay, max_attempts, EXPONENTIAL_MAX_DELAY.max(delay))
            }
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "PINGVIEW_BACKOFF",
                    value: other.to_string(),
                    reason: "expected `fixed` or `exponential`".into(),
                })
            }
        };

        let rest_sync = match var("PINGVIEW_REST_SYNC") {
            Some(raw) => parse_bool("PINGVIEW_REST_SYNC", &raw)?,
            None => true,
        };

        Ok(Self {
            server,
            channel: ChannelConfig { path, retry },
            rest_sync,
        })
    }
}

fn parse<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value: raw.to_string(),
            reason: "expected a boolean".into(),
        }),
    }
}

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}
