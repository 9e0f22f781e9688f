//! Configuration module for Notion-Wiki
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Environment variables override file values before validation runs.
//!
//! # Example
//!
//! ```no_run
//! use notion_wiki::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Mirroring {} into {}", config.notion.root_id, config.output.dir);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{CacheConfig, Config, CrawlerConfig, NotionConfig, OutputConfig};

// Re-export parser functions
pub use parser::{apply_env_overrides, load_config, load_config_with_env, parse_config};
pub use validation::validate;
