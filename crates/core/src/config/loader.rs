use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::net::ToSocketAddrs;
use std::path::Path;
use tracing::debug;

use super::{types::Config, ConfigError};

/// Load configuration from file with environment variable overrides.
///
/// Precedence, lowest first: the TOML file, `LOYALTY_`-prefixed variables
/// (`__` separates nested keys), then the flat `DATABASE_URI`,
/// `ACCRUAL_SYSTEM_ADDRESS`, `ACCRUAL_REQUEST_TIMEOUT` and `RUN_ADDRESS`
/// variables. A missing file is skipped, so the environment alone can carry
/// a complete configuration.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let mut figment = Figment::new();
    if path.exists() {
        figment = figment.merge(Toml::file(path));
    } else {
        debug!(path = %path.display(), "No config file, reading environment only");
    }

    let mut config: Config = figment
        .merge(Env::prefixed("LOYALTY_").split("__"))
        .merge(legacy_env())
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    if let Ok(run_address) = std::env::var("RUN_ADDRESS") {
        apply_run_address(&mut config, &run_address)?;
    }

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// `ACCRUAL_REQUEST_TIMEOUT` is a whole number of seconds.
fn legacy_env() -> Env {
    Env::raw()
        .only(&["DATABASE_URI", "ACCRUAL_SYSTEM_ADDRESS", "ACCRUAL_REQUEST_TIMEOUT"])
        .map(|key| {
            if key == "DATABASE_URI" {
                "database.path".into()
            } else if key == "ACCRUAL_REQUEST_TIMEOUT" {
                "accrual.request_timeout_secs".into()
            } else {
                "accrual.base_url".into()
            }
        })
}

/// `RUN_ADDRESS` is a `host:port` pair where host may be a name.
fn apply_run_address(config: &mut Config, run_address: &str) -> Result<(), ConfigError> {
    let addr = run_address
        .to_socket_addrs()
        .map_err(|e| ConfigError::ParseError(format!("RUN_ADDRESS {}: {}", run_address, e)))?
        .next()
        .ok_or_else(|| {
            ConfigError::ParseError(format!("RUN_ADDRESS {} did not resolve", run_address))
        })?;

    config.server.host = addr.ip();
    config.server.port = addr.port();
    Ok(())
}
