use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Accrual base URL is an http(s) URL
/// - Worker count, queue capacity and engine intervals are non-zero
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    let accrual = &config.accrual;

    if accrual.base_url.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "accrual.base_url must be set".to_string(),
        ));
    }

    if !(accrual.base_url.starts_with("http://") || accrual.base_url.starts_with("https://")) {
        return Err(ConfigError::ValidationError(format!(
            "accrual.base_url must be an http(s) URL, got {}",
            accrual.base_url
        )));
    }

    if accrual.worker_count == 0 {
        return Err(ConfigError::ValidationError(
            "accrual.worker_count must be at least 1".to_string(),
        ));
    }

    if accrual.queue_capacity == 0 {
        return Err(ConfigError::ValidationError(
            "accrual.queue_capacity must be at least 1".to_string(),
        ));
    }

    if accrual.request_timeout_secs == 0
        || accrual.throttle_sleep_ms == 0
        || accrual.recovery_interval_ms == 0
    {
        return Err(ConfigError::ValidationError(
            "accrual timeouts and intervals cannot be 0".to_string(),
        ));
    }

    Ok(())
}
