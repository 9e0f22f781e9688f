//! Notion REST API client
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the HTTP client with timeouts and compression
//! - Authentication and API version headers
//! - Spacing requests to stay under the API rate limit
//! - Retry logic for rate limiting, server errors and network failures
//! - Error classification into [`FetchError`]

use crate::cache::ResourceKind;
use crate::config::{CrawlerConfig, NotionConfig};
use crate::source::{ContentSource, FetchError, FetchResult, Paginated};
use crate::{ConfigError, WikiError};
use async_trait::async_trait;
use reqwest::{header::RETRY_AFTER, Client, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use url::Url;

/// Page size requested from list endpoints (the API maximum)
const PAGE_SIZE: u32 = 100;

/// Longest `Retry-After` the client is willing to honour
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `timeout` - Total timeout for a single request
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    let user_agent = format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// [`ContentSource`] backed by the Notion REST API
pub struct HttpSource {
    client: Client,
    base_url: Url,
    token: String,
    version: String,

    /// Start time of the most recent request
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
    max_retries: u32,
    retry_delay: Duration,
}

impl HttpSource {
    /// Creates a client from validated configuration
    ///
    /// # Returns
    ///
    /// * `Ok(HttpSource)` - Ready to use client
    /// * `Err(WikiError)` - Invalid base URL or the HTTP client could not be built
    pub fn new(notion: &NotionConfig, crawler: &CrawlerConfig) -> Result<Self, WikiError> {
        let mut base_url = Url::parse(&notion.api_base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid api-base-url: {}", e)))?;

        // Url::join replaces the last segment unless the path ends with '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = build_http_client(Duration::from_secs(crawler.request_timeout_secs))?;

        Ok(Self {
            client,
            base_url,
            token: notion.api_token.clone(),
            version: notion.notion_version.clone(),
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(crawler.min_request_interval_ms),
            max_retries: crawler.max_retries,
            retry_delay: Duration::from_millis(crawler.retry_delay_ms),
        })
    }

    fn endpoint(&self, kind: ResourceKind, id: &str, path: &str) -> FetchResult<Url> {
        self.base_url.join(path).map_err(|e| FetchError::InvalidResponse {
            resource: kind.as_str(),
            id: id.to_string(),
            message: format!("cannot build request URL: {}", e),
        })
    }

    /// Waits until the minimum request interval has passed since the last request
    async fn throttle(&self) {
        if self.min_interval.is_zero() {
            return;
        }

        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Sends a request with retries and returns the decoded JSON body
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 2xx | Decode body, `InvalidResponse` if not JSON |
    /// | HTTP 404 / 403 | Immediate → `NotFound` |
    /// | HTTP 429 | Retry after `Retry-After` (or backoff) |
    /// | HTTP 5xx | Retry with exponential backoff |
    /// | Network error / timeout | Retry with exponential backoff |
    /// | Other HTTP 4xx | Immediate → `Rejected` |
    ///
    /// Retryable failures become `Transient` once `max_retries` is exhausted.
    async fn send<F>(&self, kind: ResourceKind, id: &str, build: F) -> FetchResult<Value>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0u32;

        loop {
            self.throttle().await;

            let request = build()
                .bearer_auth(&self.token)
                .header("Notion-Version", &self.version);

            let (failure, server_delay) = match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return response.json::<Value>().await.map_err(|e| {
                            FetchError::InvalidResponse {
                                resource: kind.as_str(),
                                id: id.to_string(),
                                message: e.to_string(),
                            }
                        });
                    }

                    if status == StatusCode::NOT_FOUND || status == StatusCode::FORBIDDEN {
                        return Err(FetchError::NotFound {
                            resource: kind.as_str(),
                            id: id.to_string(),
                        });
                    }

                    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                        (format!("HTTP {}", status.as_u16()), retry_after(&response))
                    } else {
                        return Err(FetchError::Rejected {
                            resource: kind.as_str(),
                            id: id.to_string(),
                            status: status.as_u16(),
                            message: error_message(response).await,
                        });
                    }
                }
                Err(e) if e.is_timeout() => ("request timeout".to_string(), None),
                Err(e) if e.is_connect() => (format!("connection failed: {}", e), None),
                Err(e) => (e.to_string(), None),
            };

            if attempt >= self.max_retries {
                return Err(FetchError::Transient {
                    resource: kind.as_str(),
                    id: id.to_string(),
                    message: format!("{} (after {} retries)", failure, attempt),
                });
            }

            let delay = server_delay.unwrap_or_else(|| {
                self.retry_delay
                    .checked_mul(2u32.saturating_pow(attempt))
                    .map_or(MAX_RETRY_AFTER, |d| d.min(MAX_RETRY_AFTER))
            });
            tracing::debug!(
                "Retrying {} {} in {:?} after {}",
                kind,
                id,
                delay,
                failure
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Parses a `Retry-After` header given in seconds
fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| Duration::from_secs_f64(secs).min(MAX_RETRY_AFTER))
}

/// Extracts the `message` field of a Notion error body
async fn error_message(response: Response) -> String {
    let status = response.status();
    response
        .json::<Value>()
        .await
        .ok()
        .and_then(|body| body["message"].as_str().map(String::from))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string())
}

/// Splits a list response into results and the next cursor
fn paginated(kind: ResourceKind, id: &str, mut body: Value) -> FetchResult<Paginated> {
    let results = match body.get_mut("results").map(Value::take) {
        Some(Value::Array(results)) => results,
        _ => {
            return Err(FetchError::InvalidResponse {
                resource: kind.as_str(),
                id: id.to_string(),
                message: "list response without a results array".to_string(),
            })
        }
    };

    let next_cursor = if body["has_more"].as_bool().unwrap_or(false) {
        body["next_cursor"].as_str().map(String::from)
    } else {
        None
    };

    Ok(Paginated {
        results,
        next_cursor,
    })
}

#[async_trait]
impl ContentSource for HttpSource {
    async fn get_page(&self, id: &str) -> FetchResult<Value> {
        let kind = ResourceKind::Page;
        let url = self.endpoint(kind, id, &format!("pages/{}", id))?;
        self.send(kind, id, || self.client.get(url.clone())).await
    }

    async fn get_child_blocks(&self, id: &str, cursor: Option<&str>) -> FetchResult<Paginated> {
        let kind = ResourceKind::Blocks;
        let mut url = self.endpoint(kind, id, &format!("blocks/{}/children", id))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("page_size", &PAGE_SIZE.to_string());
            if let Some(cursor) = cursor {
                query.append_pair("start_cursor", cursor);
            }
        }

        let body = self.send(kind, id, || self.client.get(url.clone())).await?;
        paginated(kind, id, body)
    }

    async fn get_database(&self, id: &str) -> FetchResult<Value> {
        let kind = ResourceKind::Database;
        let url = self.endpoint(kind, id, &format!("databases/{}", id))?;
        self.send(kind, id, || self.client.get(url.clone())).await
    }

    async fn query_database(&self, id: &str, cursor: Option<&str>) -> FetchResult<Paginated> {
        let kind = ResourceKind::Query;
        let url = self.endpoint(kind, id, &format!("databases/{}/query", id))?;

        let mut payload = json!({ "page_size": PAGE_SIZE });
        if let Some(cursor) = cursor {
            payload["start_cursor"] = json!(cursor);
        }

        let body = self
            .send(kind, id, || self.client.post(url.clone()).json(&payload))
            .await?;
        paginated(kind, id, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> (NotionConfig, CrawlerConfig) {
        let notion = NotionConfig {
            api_token: "secret_test".to_string(),
            root_id: "0123456789abcdef0123456789abcdef".to_string(),
            ..NotionConfig::default()
        };
        (notion, CrawlerConfig::default())
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let (notion, crawler) = create_test_config();
        let source = HttpSource::new(&notion, &crawler).unwrap();

        let url = source.endpoint(ResourceKind::Page, "abc", "pages/abc").unwrap();
        assert_eq!(url.as_str(), "https://api.notion.com/v1/pages/abc");
    }

    #[test]
    fn test_invalid_base_url() {
        let (mut notion, crawler) = create_test_config();
        notion.api_base_url = "::nope".to_string();
        assert!(matches!(
            HttpSource::new(&notion, &crawler),
            Err(WikiError::Config(ConfigError::InvalidUrl(_)))
        ));
    }

    #[test]
    fn test_paginated_follows_has_more() {
        let body = json!({"results": [1, 2], "has_more": true, "next_cursor": "c2"});
        let page = paginated(ResourceKind::Blocks, "x", body).unwrap();
        assert_eq!(page.results.len(), 2);
        assert_eq!(page.next_cursor.as_deref(), Some("c2"));

        let last = json!({"results": [], "has_more": false, "next_cursor": "ignored"});
        assert!(paginated(ResourceKind::Blocks, "x", last).unwrap().next_cursor.is_none());
    }

    #[test]
    fn test_paginated_requires_results() {
        let result = paginated(ResourceKind::Query, "x", json!({"object": "list"}));
        assert!(matches!(result, Err(FetchError::InvalidResponse { .. })));
    }
}
