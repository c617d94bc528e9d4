use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::accrual::AccrualConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub accrual: AccrualConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub method: AuthMethod,
    /// Header carrying the user id when `method = "header"`.
    #[serde(default = "default_user_header")]
    pub user_header: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            method: AuthMethod::default(),
            user_header: default_user_header(),
        }
    }
}

fn default_user_header() -> String {
    "x-user-id".to_string()
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Every request is attributed to the anonymous user.
    None,
    /// Trust a user-id header set by an upstream gateway.
    #[default]
    Header,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("loyalty.db")
}

/// Sanitized config for API responses
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub auth: SanitizedAuthConfig,
    pub server: ServerConfig,
    pub accrual: SanitizedAccrualConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAuthConfig {
    pub method: String,
}

/// Accrual settings without the upstream address.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAccrualConfig {
    pub base_url_configured: bool,
    pub request_timeout_secs: u64,
    pub worker_count: usize,
    pub throttle_sleep_ms: u64,
    pub recovery_interval_ms: u64,
    pub queue_capacity: usize,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            auth: SanitizedAuthConfig {
                method: match config.auth.method {
                    AuthMethod::None => "none".to_string(),
                    AuthMethod::Header => "header".to_string(),
                },
            },
            server: config.server.clone(),
            accrual: SanitizedAccrualConfig {
                base_url_configured: !config.accrual.base_url.is_empty(),
                request_timeout_secs: config.accrual.request_timeout_secs,
                worker_count: config.accrual.worker_count,
                throttle_sleep_ms: config.accrual.throttle_sleep_ms,
                recovery_interval_ms: config.accrual.recovery_interval_ms,
                queue_capacity: config.accrual.queue_capacity,
            },
        }
    }
}
