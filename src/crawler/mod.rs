//! Crawler module for content graph discovery
//!
//! This module contains the first pipeline phase, including:
//! - Breadth-first discovery of pages, databases and records
//! - Bounded concurrent fetching through the response cache
//! - Output path reservation and the frozen Id-to-Path table
//! - Overall crawl coordination

mod coordinator;
mod paths;
mod scheduler;

pub use coordinator::{CrawlOutput, CrawlStats, Crawler, NodeFailure};
pub use paths::{join, relative_path, slugify, IdPathTable, PathEntry, PathRegistry, MAX_SLUG_LEN};
pub use scheduler::{QueuedNode, Scheduler, TaskKind};

use crate::cache::CacheStore;
use crate::source::ContentSource;
use crate::WikiError;
use std::sync::Arc;

/// Runs a complete crawl
///
/// This is the main entry point for the discovery phase. It will:
/// 1. Fetch the root page (failure is fatal)
/// 2. Fetch every discovered page, database and record level by level
/// 3. Reserve an output stem for every node as it is discovered
/// 4. Freeze the Id-to-Path table
///
/// # Arguments
///
/// * `source` - Remote API access
/// * `cache` - Response cache
/// * `root_id` - ID of the root page
/// * `max_concurrent` - Maximum number of node fetches in flight
///
/// # Returns
///
/// * `Ok(CrawlOutput)` - Crawl completed, possibly with contained per-node failures
/// * `Err(WikiError)` - The root could not be fetched
pub async fn crawl<S: ContentSource + 'static>(
    source: Arc<S>,
    cache: Arc<CacheStore>,
    root_id: &str,
    max_concurrent: usize,
) -> Result<CrawlOutput, WikiError> {
    Crawler::new(source, cache, max_concurrent).crawl(root_id).await
}
