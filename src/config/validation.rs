use crate::config::types::{CacheConfig, Config, CrawlerConfig, NotionConfig, OutputConfig};
use crate::model::is_valid_id;
use crate::ConfigError;
use std::path::{Component, Path};
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_notion_config(&config.notion)?;
    validate_crawler_config(&config.crawler)?;
    validate_directories(&config.cache, &config.output)?;
    Ok(())
}

/// Validates API access settings
fn validate_notion_config(config: &NotionConfig) -> Result<(), ConfigError> {
    if config.api_token.trim().is_empty() {
        return Err(ConfigError::Validation(
            "api-token cannot be empty (set it in the config file or NOTION_TOKEN)".to_string(),
        ));
    }

    if !is_valid_id(config.root_id.trim()) {
        return Err(ConfigError::InvalidId(format!(
            "root-id must be a 32 character Notion ID, got '{}'",
            config.root_id
        )));
    }

    let base = Url::parse(&config.api_base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid api-base-url: {}", e)))?;
    if base.scheme() != "http" && base.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "api-base-url must use http or https, got '{}'",
            base.scheme()
        )));
    }

    if config.notion_version.trim().is_empty() {
        return Err(ConfigError::Validation(
            "notion-version cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_requests < 1 || config.max_concurrent_requests > 64 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-requests must be between 1 and 64, got {}",
            config.max_concurrent_requests
        )));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates cache and output locations
fn validate_directories(cache: &CacheConfig, output: &OutputConfig) -> Result<(), ConfigError> {
    if output.dir.trim().is_empty() {
        return Err(ConfigError::Validation(
            "output dir cannot be empty".to_string(),
        ));
    }

    if cache.dir.trim().is_empty() {
        return Err(ConfigError::Validation(
            "cache dir cannot be empty".to_string(),
        ));
    }

    if normalized(&cache.dir).eq(normalized(&output.dir)) {
        return Err(ConfigError::Validation(format!(
            "cache dir and output dir must differ, both are '{}'",
            output.dir
        )));
    }

    Ok(())
}

fn normalized(dir: &str) -> impl Iterator<Item = Component<'_>> {
    Path::new(dir.trim())
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
}
