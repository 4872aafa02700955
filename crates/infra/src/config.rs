//! Process configuration, read from environment variables.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use stockledger_observability::LogFormat;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5000;

const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is required when {reason}")]
    Missing { var: &'static str, reason: &'static str },

    #[error("invalid {var} '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Postgres { url: String, max_connections: u32 },
}

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub storage: StorageBackend,
    pub lock_timeout: Duration,
    pub log_format: LogFormat,
}

impl LedgerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build a config from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let bind_addr = parse_var("BIND_ADDR", get("BIND_ADDR"), DEFAULT_BIND_ADDR.parse().ok())?;

        let jwt_secret = get("JWT_SECRET").unwrap_or_else(|| DEV_JWT_SECRET.to_string());

        let storage = match get("STORAGE_BACKEND")
            .map(|v| v.trim().to_ascii_lowercase())
            .as_deref()
        {
            None | Some("memory") => StorageBackend::Memory,
            Some("postgres") => {
                let url = get("DATABASE_URL").ok_or(ConfigError::Missing {
                    var: "DATABASE_URL",
                    reason: "STORAGE_BACKEND=postgres",
                })?;
                let max_connections = parse_var(
                    "DATABASE_MAX_CONNECTIONS",
                    get("DATABASE_MAX_CONNECTIONS"),
                    Some(DEFAULT_MAX_CONNECTIONS),
                )?;
                if max_connections == 0 {
                    return Err(ConfigError::Invalid {
                        var: "DATABASE_MAX_CONNECTIONS",
                        value: "0".to_string(),
                        reason: "must be at least 1".to_string(),
                    });
                }
                StorageBackend::Postgres { url, max_connections }
            }
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "STORAGE_BACKEND",
                    value: other.to_string(),
                    reason: "expected 'memory' or 'postgres'".to_string(),
                });
            }
        };

        let lock_timeout_ms: u64 = parse_var(
            "LOCK_TIMEOUT_MS",
            get("LOCK_TIMEOUT_MS"),
            Some(DEFAULT_LOCK_TIMEOUT_MS),
        )?;
        if lock_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                var: "LOCK_TIMEOUT_MS",
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let log_format = match get("LOG_FORMAT") {
            None => LogFormat::default(),
            Some(v) => v.parse().map_err(|e: stockledger_observability::UnknownLogFormat| {
                ConfigError::Invalid {
                    var: "LOG_FORMAT",
                    value: v.clone(),
                    reason: e.to_string(),
                }
            })?,
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            storage,
            lock_timeout: Duration::from_millis(lock_timeout_ms),
            log_format,
        })
    }

    /// True when `JWT_SECRET` was not provided and the insecure default is in use.
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

fn parse_var<T>(var: &'static str, raw: Option<String>, default: Option<T>) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
        None => default.ok_or(ConfigError::Missing {
            var,
            reason: "no default exists",
        }),
    }
}
