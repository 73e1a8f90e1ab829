//! Configuration management for Ratewarden.
//!
//! Settings come from an optional YAML file overlaid by `RATELIMIT_*`
//! environment variables:
//!
//! | Variable                     | Key               | Required |
//! |------------------------------|-------------------|----------|
//! | `RATELIMIT`                  | `default_limit`   | yes      |
//! | `RATELIMIT_CLEANUP_INTERVAL` | `cleanup_interval`| yes (ms) |
//! | `RATELIMIT_BLOCK_TIME`       | `block_time`      | yes (ms) |
//! | `RATELIMIT_REDIS_URL`        | `redis_url`       | yes      |
//! | `RATELIMIT_REDIS_DB`         | `redis_db`        | no       |
//! | `RATELIMIT_REDIS_PASSWORD`   | `redis_password`  | no       |
//! | `RATELIMIT_HTTP_ADDR`        | `http_addr`       | no       |
//! | `RATELIMIT_TOKEN_LIST`       | `token_list`      | no       |

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use config::{Environment, File, FileFormat};
use redis::{ConnectionAddr, ConnectionInfo, IntoConnectionInfo, RedisConnectionInfo};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{RatewardenError, Result};
use crate::ratelimit::LimiterSettings;

/// Prefix shared by all environment variables.
const ENV_PREFIX: &str = "RATELIMIT";

/// Port used when `redis_url` names only a host.
const DEFAULT_REDIS_PORT: u16 = 6379;

/// Main configuration for the Ratewarden service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// HTTP listen address; a leading `:` binds all interfaces
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// Requests allowed per identity without a token override
    pub default_limit: u64,

    /// Cleanup sweep period in milliseconds (0 disables the sweeper)
    pub cleanup_interval: u64,

    /// Block duration in milliseconds
    pub block_time: u64,

    /// Comma separated token budgets, e.g. `10,20`
    #[serde(default)]
    pub token_list: String,

    /// Redis address, `host:port` or a full `redis://` URL
    pub redis_url: String,

    /// Redis password
    #[serde(default)]
    pub redis_password: Option<String>,

    /// Redis logical database
    #[serde(default)]
    pub redis_db: i64,
}

fn default_http_addr() -> String {
    ":8080".to_string()
}

impl ServiceConfig {
    /// Load configuration from an optional YAML file and the process environment.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::build(file, std::env::vars().collect())
    }

    /// Load configuration from the given environment variables only.
    pub fn from_env_map(vars: HashMap<String, String>) -> Result<Self> {
        Self::build(None, vars)
    }

    fn build(file: Option<&Path>, vars: HashMap<String, String>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = file {
            info!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(File::from(path).format(FileFormat::Yaml));
        }

        // The bare `RATELIMIT` variable carries the default budget.
        let default_limit = vars.get(ENV_PREFIX).filter(|v| !v.is_empty()).cloned();

        let config: ServiceConfig = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .ignore_empty(true)
                    .source(Some(vars.into_iter().collect())),
            )
            .set_override_option("default_limit", default_limit)?
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.default_limit == 0 {
            return Err(RatewardenError::Config(
                "default_limit (RATELIMIT) must be greater than zero".to_string(),
            ));
        }
        if self.redis_url.trim().is_empty() {
            return Err(RatewardenError::Config(
                "redis_url (RATELIMIT_REDIS_URL) must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Cleanup sweep period.
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval)
    }

    /// How long an identity stays blocked.
    pub fn block_duration(&self) -> Duration {
        Duration::from_millis(self.block_time)
    }

    /// Engine settings derived from this configuration.
    pub fn limiter_settings(&self) -> LimiterSettings {
        LimiterSettings {
            default_budget: self.default_limit,
            cleanup_interval: self.cleanup_interval(),
            block_duration: self.block_duration(),
        }
    }

    /// The socket address to listen on.
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        let addr = if self.http_addr.starts_with(':') {
            format!("0.0.0.0{}", self.http_addr)
        } else {
            self.http_addr.clone()
        };

        addr.parse().map_err(|e| {
            RatewardenError::Config(format!("invalid http_addr {:?}: {}", self.http_addr, e))
        })
    }

    /// Redis connection parameters combining address, password and database.
    ///
    /// A `redis_url` that already carries a scheme is parsed as a URL and used
    /// unchanged. Otherwise it is a `host[:port]` address and the password is
    /// passed through verbatim, so it may contain any character.
    pub fn redis_connection_info(&self) -> Result<ConnectionInfo> {
        if self.redis_url.contains("://") {
            return self.redis_url.as_str().into_connection_info().map_err(|e| {
                RatewardenError::Config(format!("invalid redis_url {:?}: {}", self.redis_url, e))
            });
        }

        let (host, port) = match self.redis_url.rsplit_once(':') {
            Some((host, port)) if !host.ends_with(':') => {
                let port = port.parse::<u16>().map_err(|e| {
                    RatewardenError::Config(format!("invalid redis_url port {:?}: {}", port, e))
                })?;
                (host, port)
            }
            _ => (self.redis_url.as_str(), DEFAULT_REDIS_PORT),
        };
        let host = host.trim_start_matches('[').trim_end_matches(']');

        Ok(ConnectionInfo {
            addr: ConnectionAddr::Tcp(host.to_string(), port),
            redis: RedisConnectionInfo {
                db: self.redis_db,
                password: self.redis_password.clone().filter(|p| !p.is_empty()),
                ..Default::default()
            },
        })
    }
}
