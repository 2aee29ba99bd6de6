use crate::config::types::{
    BackoffConfig, BrowserConfig, Config, FetchConfig, HarvestConfig, OutputConfig,
};
use crate::ConfigError;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_browser_config(&config.browser)?;
    validate_harvest_config(&config.harvest)?;
    validate_backoff_config(&config.backoff)?;
    validate_output_config(&config.output)?;
    validate_fetch_config(&config.fetch)?;
    Ok(())
}

fn validate_browser_config(config: &BrowserConfig) -> Result<(), ConfigError> {
    if config.navigation_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "navigation_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.window_width < 320 || config.window_height < 240 {
        return Err(ConfigError::Validation(format!(
            "window size must be at least 320x240, got {}x{}",
            config.window_width, config.window_height
        )));
    }

    Ok(())
}

/// Validates harvest loop limits
fn validate_harvest_config(config: &HarvestConfig) -> Result<(), ConfigError> {
    if config.response_timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "response_timeout_ms must be >= 100ms, got {}ms",
            config.response_timeout_ms
        )));
    }

    if config.stall_limit < 1 {
        return Err(ConfigError::Validation(
            "stall_limit must be >= 1".to_string(),
        ));
    }

    if config.max_rate_limit_retries < 1 {
        return Err(ConfigError::Validation(
            "max_rate_limit_retries must be >= 1".to_string(),
        ));
    }

    if config.first_page_timeouts < 1 {
        return Err(ConfigError::Validation(
            "first_page_timeouts must be >= 1".to_string(),
        ));
    }

    if config.batch_size < 1 {
        return Err(ConfigError::Validation(
            "batch_size must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_backoff_config(config: &BackoffConfig) -> Result<(), ConfigError> {
    if config.base_ms < 1 {
        return Err(ConfigError::Validation(
            "backoff base_ms must be >= 1".to_string(),
        ));
    }

    if config.max_ms < config.base_ms {
        return Err(ConfigError::Validation(format!(
            "backoff max_ms ({}) must be >= base_ms ({})",
            config.max_ms, config.base_ms
        )));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.folder.trim().is_empty() {
        return Err(ConfigError::Validation(
            "output folder cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "fetch user_agent cannot be empty".to_string(),
        ));
    }

    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(
            "fetch max_attempts must be >= 1".to_string(),
        ));
    }

    if config.concurrency < 1 || config.concurrency > 64 {
        return Err(ConfigError::Validation(format!(
            "fetch concurrency must be between 1 and 64, got {}",
            config.concurrency
        )));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "fetch timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}
