//! Local cache of raw API responses
//!
//! Responses are stored as JSON envelopes keyed by (resource kind, resource id)
//! and expire after a configurable time-to-live. A repeated run inside the TTL
//! window is served entirely from here.

mod store;

pub use store::{CacheEntry, CachePolicy, CacheStore};

use std::fmt;
use thiserror::Error;

/// Kinds of cached API resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// A page object (`GET /pages/{id}`)
    Page,

    /// All child blocks of a page or block, every cursor concatenated
    Blocks,

    /// A database object (`GET /databases/{id}`)
    Database,

    /// All records of a database query, every cursor concatenated
    Query,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [Self::Page, Self::Blocks, Self::Database, Self::Query];

    /// Directory name used for this kind inside the cache root
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Blocks => "blocks",
            Self::Database => "database",
            Self::Query => "query",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while managing the cache directory
///
/// Lookups and writes never return these: a bad entry is a miss and a failed
/// write is logged. Only explicit maintenance (`clear`) reports errors.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cannot access cache directory {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

/// Result type for cache maintenance operations
pub type CacheResult<T> = Result<T, CacheError>;
