//! Remote content sources
//!
//! The crawler talks to the Notion API through the [`ContentSource`] trait:
//! - [`HttpSource`] is the real REST client
//! - `MemorySource` serves a fixed in-memory workspace; it exists for tests and
//!   is hidden from the documented API
//!
//! Sources return raw JSON payloads; [`wire`] turns them into the typed model.

mod http;
mod memory;
pub mod wire;

pub use http::HttpSource;
#[doc(hidden)]
pub use memory::MemorySource;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// One page of a paginated listing
#[derive(Debug, Clone, Default)]
pub struct Paginated {
    pub results: Vec<Value>,

    /// Cursor for the next page, `None` when the listing is exhausted
    pub next_cursor: Option<String>,
}

/// Errors surfaced by a content source
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The resource does not exist or the integration has no access to it
    #[error("{resource} {id} not found or not shared with the integration")]
    NotFound { resource: &'static str, id: String },

    /// Network failure, rate limiting or server error that survived retries
    #[error("Transient error fetching {resource} {id}: {message}")]
    Transient {
        resource: &'static str,
        id: String,
        message: String,
    },

    /// The API refused the request for another reason (bad token, bad request)
    #[error("Request for {resource} {id} rejected with HTTP {status}: {message}")]
    Rejected {
        resource: &'static str,
        id: String,
        status: u16,
        message: String,
    },

    /// The response could not be understood
    #[error("Invalid response for {resource} {id}: {message}")]
    InvalidResponse {
        resource: &'static str,
        id: String,
        message: String,
    },
}

impl FetchError {
    /// Returns true for the "not found / no access" condition
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if a later attempt could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// Result type for source operations
pub type FetchResult<T> = Result<T, FetchError>;

/// Capability-typed access to the remote workspace
///
/// Implementations handle authentication, retries and rate limiting; callers
/// only see payloads or a classified [`FetchError`].
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Retrieves a page object
    async fn get_page(&self, id: &str) -> FetchResult<Value>;

    /// Lists one page of child blocks of a page or block
    async fn get_child_blocks(&self, id: &str, cursor: Option<&str>) -> FetchResult<Paginated>;

    /// Retrieves a database object (title and declared properties)
    async fn get_database(&self, id: &str) -> FetchResult<Value>;

    /// Lists one page of database records
    async fn query_database(&self, id: &str, cursor: Option<&str>) -> FetchResult<Paginated>;
}
