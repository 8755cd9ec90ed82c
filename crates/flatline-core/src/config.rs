//! flatline.toml configuration parser.
//!
//! Every field has a default, so an empty file (or no file at all) yields
//! a working configuration against a local Consul agent.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::duration::parse_duration;
use crate::error::{ConfigError, ConfigResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlatlineConfig {
    pub consul: ConsulConfig,
    pub lock: LockConfig,
    pub aws: AwsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsulConfig {
    /// Base URL of the Consul HTTP API.
    pub url: String,
    /// Server-side wait for blocking health queries.
    pub wait: String,
    /// Client-side bound on a single request. Must exceed `wait`.
    pub http_timeout: String,
    /// Sleep between attempts of a retrying call.
    pub retry_backoff: String,
}

impl Default for ConsulConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8500/".to_string(),
            wait: "60s".to_string(),
            http_timeout: "70s".to_string(),
            retry_backoff: "10s".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// KV key used as the leader lock.
    pub key: String,
    /// `Name` attached to the Consul session.
    pub session_name: String,
    /// Sleep between failed acquire attempts.
    pub acquire_delay: String,
    /// Interval between lock ownership and worker liveness checks.
    pub check_interval: String,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            key: "flatline".to_string(),
            session_name: "flatline".to_string(),
            acquire_delay: "5s".to_string(),
            check_interval: "5s".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    /// Region override; the standard AWS environment chain is used otherwise.
    pub region: Option<String>,
    /// Log health changes without calling `SetInstanceHealth`.
    pub dry_run: bool,
}

impl FlatlineConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: FlatlineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every duration parses and the timing constraints hold.
    pub fn validate(&self) -> ConfigResult<()> {
        let wait = self.consul.wait()?;
        let timeout = self.consul.http_timeout()?;
        let retry_backoff = self.consul.retry_backoff()?;
        let acquire_delay = self.lock.acquire_delay()?;
        let check_interval = self.lock.check_interval()?;

        if self.consul.url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "consul.url",
                reason: "must not be empty".to_string(),
            });
        }
        if self.lock.key.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "lock.key",
                reason: "must not be empty".to_string(),
            });
        }
        if timeout <= wait {
            return Err(ConfigError::Invalid {
                field: "consul.http_timeout",
                reason: format!("{timeout:?} must be longer than consul.wait ({wait:?})"),
            });
        }
        // Zero would turn the retry and acquire loops into busy loops.
        let intervals = [
            ("consul.retry_backoff", retry_backoff),
            ("lock.acquire_delay", acquire_delay),
            ("lock.check_interval", check_interval),
        ];
        for (field, interval) in intervals {
            if interval.is_zero() {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }
}

impl ConsulConfig {
    pub fn wait(&self) -> ConfigResult<Duration> {
        duration_field("consul.wait", &self.wait)
    }

    pub fn http_timeout(&self) -> ConfigResult<Duration> {
        duration_field("consul.http_timeout", &self.http_timeout)
    }

    pub fn retry_backoff(&self) -> ConfigResult<Duration> {
        duration_field("consul.retry_backoff", &self.retry_backoff)
    }
}

impl LockConfig {
    pub fn acquire_delay(&self) -> ConfigResult<Duration> {
        duration_field("lock.acquire_delay", &self.acquire_delay)
    }

    pub fn check_interval(&self) -> ConfigResult<Duration> {
        duration_field("lock.check_interval", &self.check_interval)
    }
}

fn duration_field(field: &'static str, value: &str) -> ConfigResult<Duration> {
    parse_duration(value).ok_or_else(|| ConfigError::Duration {
        field,
        value: value.to_string(),
    })
}
