//! Notion-Wiki: mirrors a Notion workspace into a tree of linked Markdown files
//!
//! This crate crawls a page hierarchy (pages, sub-pages and databases) from the
//! Notion API, caches the raw responses locally, converts every block tree into
//! Markdown and finally rewrites internal links into relative paths.

pub mod cache;
pub mod config;
pub mod crawler;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod source;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Notion-Wiki operations
///
/// Only failures that abort a whole run end up here. Per-node fetch failures,
/// per-block conversion failures and broken links are contained and reported
/// in the run summary instead.
#[derive(Debug, Error)]
pub enum WikiError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Root page {id} is unavailable: {source}")]
    RootUnavailable {
        id: String,
        source: source::FetchError,
    },

    #[error("Cannot create output directory {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cache error: {0}")]
    Cache(#[from] cache::CacheError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Fetch task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid Notion ID: {0}")]
    InvalidId(String),
}

/// Result type alias for Notion-Wiki operations
pub type Result<T> = std::result::Result<T, WikiError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use model::{normalize_id, NodeId};
pub use pipeline::{run, run_pipeline, PipelineOptions};
