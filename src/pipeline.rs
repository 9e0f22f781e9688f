//! Run orchestration
//!
//! Sequences the phases of one run: crawl (which freezes the path table),
//! convert, resolve links, write. Nothing is written until the crawl has
//! completed, so a root failure leaves the output directory untouched.

use crate::cache::{CachePolicy, CacheStore};
use crate::config::Config;
use crate::crawler;
use crate::output::{self, RunSummary};
use crate::source::{ContentSource, HttpSource};
use crate::WikiError;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Settings of a single run that are independent of the content source
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub output_dir: PathBuf,
    pub max_concurrent_requests: usize,
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            output_dir: PathBuf::from(&config.output.dir),
            max_concurrent_requests: config.crawler.max_concurrent_requests as usize,
        }
    }
}

/// Runs the whole pipeline against an arbitrary content source
///
/// # Arguments
///
/// * `source` - Remote API access
/// * `cache` - Response cache
/// * `root_id` - ID of the root page
/// * `options` - Output directory and crawl concurrency
///
/// # Returns
///
/// * `Ok(RunSummary)` - Run completed, possibly with contained failures
/// * `Err(WikiError)` - Root unavailable or output directory unusable
pub async fn run_pipeline<S: ContentSource + 'static>(
    source: Arc<S>,
    cache: Arc<CacheStore>,
    root_id: &str,
    options: &PipelineOptions,
) -> Result<RunSummary, WikiError> {
    let started = Instant::now();

    let crawl = crawler::crawl(source, cache, root_id, options.max_concurrent_requests).await?;
    tracing::info!(
        "Crawl finished: {} nodes, {} failed",
        crawl.graph.len(),
        crawl.failures.len()
    );

    let mut documents = output::build_documents(&crawl);
    tracing::info!("Converted {} documents", documents.len());

    let links = output::resolve(&mut documents, &crawl.table);
    if !links.broken.is_empty() {
        tracing::warn!("{} broken links", links.broken.len());
    }

    let written = output::write_documents(&options.output_dir, &documents)?;
    tracing::info!(
        "Wrote {} files to {} ({} unchanged, {} failed)",
        written.written,
        options.output_dir.display(),
        written.unchanged,
        written.failed.len()
    );

    Ok(RunSummary {
        nodes_discovered: crawl.graph.len(),
        documents: documents.len(),
        files_written: written.written,
        files_unchanged: written.unchanged,
        links_resolved: links.resolved,
        crawl: crawl.stats,
        failures: crawl.failures,
        broken_links: links.broken,
        write_failures: written.failed,
        duration: started.elapsed(),
    })
}

/// Builds the cache store described by the configuration
///
/// With `fresh` set the cache is not read, but fetched responses still
/// refresh it.
pub fn open_cache(config: &Config, fresh: bool) -> CacheStore {
    let policy = if config.cache.enabled {
        CachePolicy {
            read: !fresh,
            ..CachePolicy::new(config.cache.ttl_seconds)
        }
    } else {
        CachePolicy::disabled()
    };
    CacheStore::new(&config.cache.dir, policy)
}

/// Removes every cached response under the configured cache directory
///
/// Returns how many entries were removed.
pub fn clear_cache(config: &Config) -> Result<usize, WikiError> {
    let removed = open_cache(config, false).clear()?;
    Ok(removed)
}

/// Runs the pipeline against the Notion API as configured
pub async fn run(config: &Config, fresh: bool) -> Result<RunSummary, WikiError> {
    let source = Arc::new(HttpSource::new(&config.notion, &config.crawler)?);
    let cache = Arc::new(open_cache(config, fresh));
    let options = PipelineOptions::from_config(config);

    run_pipeline(source, cache, &config.notion.root_id, &options).await
}
