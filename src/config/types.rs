use serde::Deserialize;
use std::fmt;

/// Main configuration structure for Notion-Wiki
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub notion: NotionConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Notion API access
#[derive(Clone, Deserialize)]
pub struct NotionConfig {
    /// Integration token (`secret_...` or `ntn_...`)
    #[serde(rename = "api-token", default)]
    pub api_token: String,

    /// ID of the page the mirror starts from
    #[serde(rename = "root-id", default)]
    pub root_id: String,

    /// Base URL of the REST API
    #[serde(rename = "api-base-url", default = "default_api_base_url")]
    pub api_base_url: String,

    /// Value of the `Notion-Version` header
    #[serde(rename = "notion-version", default = "default_notion_version")]
    pub notion_version: String,
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            root_id: String::new(),
            api_base_url: default_api_base_url(),
            notion_version: default_notion_version(),
        }
    }
}

impl fmt::Debug for NotionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotionConfig")
            .field("api_token", &"<redacted>")
            .field("root_id", &self.root_id)
            .field("api_base_url", &self.api_base_url)
            .field("notion_version", &self.notion_version)
            .finish()
    }
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of API requests in flight
    #[serde(rename = "max-concurrent-requests", default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: u32,

    /// Minimum time between two API requests (milliseconds)
    #[serde(rename = "min-request-interval-ms", default = "default_min_request_interval_ms")]
    pub min_request_interval_ms: u64,

    /// Retries for rate-limited, server-error and network failures
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay between retries (milliseconds), doubled on each attempt
    #[serde(rename = "retry-delay-ms", default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_max_concurrent_requests(),
            min_request_interval_ms: default_min_request_interval_ms(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Response cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Directory holding cached API responses
    #[serde(default = "default_cache_dir")]
    pub dir: String,

    /// Age after which a cached response is refetched
    #[serde(rename = "ttl-seconds", default = "default_ttl_seconds")]
    pub ttl_seconds: u64,

    /// Read and write the cache at all
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            ttl_seconds: default_ttl_seconds(),
            enabled: true,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Root directory of the generated Markdown tree
    #[serde(default = "default_output_dir")]
    pub dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://api.notion.com/v1".to_string()
}

fn default_notion_version() -> String {
    "2022-06-28".to_string()
}

fn default_max_concurrent_requests() -> u32 {
    4
}

fn default_min_request_interval_ms() -> u64 {
    // Notion allows an average of three requests per second
    334
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_cache_dir() -> String {
    "_notion_cache".to_string()
}

fn default_ttl_seconds() -> u64 {
    86_400
}

fn default_output_dir() -> String {
    "notion_wiki".to_string()
}

fn default_true() -> bool {
    true
}
