use crate::config::types::{
    Config, DownloaderConfig, PacingConfig, PipelineConfig, SearchConfig, TrackerConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_tracker_config(&config.tracker)?;
    validate_downloader_config(&config.downloader)?;
    validate_search_config(&config.search)?;
    validate_pacing_config(&config.pacing)?;
    validate_pipeline_config(&config.pipeline)?;
    Ok(())
}

/// Validates tracker configuration
fn validate_tracker_config(config: &TrackerConfig) -> Result<(), ConfigError> {
    if config.host.is_empty() {
        return Err(ConfigError::Validation(
            "tracker host cannot be empty".to_string(),
        ));
    }

    if config.id.is_empty() {
        return Err(ConfigError::Validation(
            "tracker id cannot be empty".to_string(),
        ));
    }

    Url::parse(&config.url())
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid tracker url: {}", e)))?;

    Ok(())
}

/// Validates the downloader nickname: non-empty, alphanumeric plus '-' and '_'
fn validate_downloader_config(config: &DownloaderConfig) -> Result<(), ConfigError> {
    if config.nick.is_empty() {
        return Err(ConfigError::Validation(
            "downloader nick cannot be empty".to_string(),
        ));
    }

    if !config
        .nick
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "downloader nick must contain only alphanumeric characters, hyphens and underscores, got '{}'",
            config.nick
        )));
    }

    Ok(())
}

/// Validates search endpoint configuration
fn validate_search_config(config: &SearchConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "base-url '{}' must use http or https",
            config.base_url
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates pacing configuration
fn validate_pacing_config(config: &PacingConfig) -> Result<(), ConfigError> {
    if config.min_delay > config.max_delay {
        return Err(ConfigError::Validation(format!(
            "min-delay ({}s) must not exceed max-delay ({}s)",
            config.min_delay, config.max_delay
        )));
    }

    Ok(())
}

/// Validates pipeline configuration
fn validate_pipeline_config(config: &PipelineConfig) -> Result<(), ConfigError> {
    if config.data_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "data-dir cannot be empty".to_string(),
        ));
    }

    if config.file_prefix.is_empty() || config.file_prefix.contains('/') {
        return Err(ConfigError::Validation(format!(
            "file-prefix must be a non-empty file name fragment, got '{}'",
            config.file_prefix
        )));
    }

    if config.concurrent_items < 1 || config.concurrent_items > 20 {
        return Err(ConfigError::Validation(format!(
            "concurrent-items must be between 1 and 20, got {}",
            config.concurrent_items
        )));
    }

    if config.rsync_threads < 1 || config.rsync_threads > 4 {
        return Err(ConfigError::Validation(format!(
            "rsync-threads must be between 1 and 4, got {}",
            config.rsync_threads
        )));
    }

    if config.scraper_max_tries < 1 {
        return Err(ConfigError::Validation(format!(
            "scraper-max-tries must be >= 1, got {}",
            config.scraper_max_tries
        )));
    }

    Ok(())
}
