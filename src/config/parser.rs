use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use std::path::Path;

/// Loads a configuration file, applies environment overrides and validates it
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use notion_wiki::config::load_config;
///
/// let config = load_config(Path::new("config.toml")).unwrap();
/// println!("Output directory: {}", config.output.dir);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Same as [`load_config`] with an explicit environment lookup
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
/// * `lookup` - Returns the value of an environment variable, if set
pub fn load_config_with_env<F>(path: &Path, lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    // Read the configuration file
    let content = std::fs::read_to_string(path)?;

    let mut config = parse_config(&content)?;
    apply_env_overrides(&mut config, lookup)?;

    // Validate the configuration
    validate(&config)?;

    Ok(config)
}

/// Parses TOML text without validating it
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Overrides file values with environment variables
///
/// | Variable | Field |
/// |----------|-------|
/// | `NOTION_TOKEN` | `notion.api-token` |
/// | `NOTION_ROOT_PAGE_ID` | `notion.root-id` |
/// | `NOTION_OUTPUT_DIR` | `output.dir` |
/// | `NOTION_CACHE_DIR` | `cache.dir` |
/// | `NOTION_USE_CACHE` | `cache.enabled` |
///
/// Empty variables are ignored.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(token) = get("NOTION_TOKEN") {
        config.notion.api_token = token;
    }
    if let Some(root) = get("NOTION_ROOT_PAGE_ID") {
        config.notion.root_id = root;
    }
    if let Some(dir) = get("NOTION_OUTPUT_DIR") {
        config.output.dir = dir;
    }
    if let Some(dir) = get("NOTION_CACHE_DIR") {
        config.cache.dir = dir;
    }
    if let Some(flag) = get("NOTION_USE_CACHE") {
        config.cache.enabled = parse_flag(&flag).ok_or_else(|| {
            ConfigError::Validation(format!(
                "NOTION_USE_CACHE must be true or false, got '{}'",
                flag
            ))
        })?;
    }

    Ok(())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
