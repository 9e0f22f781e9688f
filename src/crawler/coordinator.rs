//! Crawler coordinator - breadth-first discovery of the content graph
//!
//! This module contains the main crawl loop, including:
//! - Fetching the root page and seeding the frontier
//! - Fetching each breadth-first level concurrently under the semaphore
//! - Merging results in queue order (node discovery and path reservation)
//! - Serving fetches from the cache and filling it
//! - Containing per-node failures
//! - Freezing the Id-to-Path table once the frontier is exhausted

use crate::cache::{CacheStore, ResourceKind};
use crate::crawler::paths::{IdPathTable, PathRegistry};
use crate::crawler::scheduler::{QueuedNode, Scheduler, TaskKind};
use crate::model::{
    child_references, normalize_id, Block, BlockKind, Column, ContentGraph, Node, NodeId,
    NodeKind, NodeStatus,
};
use crate::source::wire::{self, RecordData};
use crate::source::{ContentSource, FetchError, FetchResult};
use crate::{ConfigError, WikiError};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// A node whose content could not be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeFailure {
    pub id: NodeId,
    pub title: String,
    pub reason: String,

    /// The node does not exist or is not shared with the integration
    pub not_found: bool,
}

/// Counters describing one crawl
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlStats {
    pub nodes: usize,
    pub remote_calls: usize,
    pub cache_hits: usize,
    pub levels: u32,
}

/// Everything the later phases need from the crawl
#[derive(Debug)]
pub struct CrawlOutput {
    pub root_id: NodeId,
    pub graph: ContentGraph,

    /// Block trees of pages and records, keyed by node ID
    pub blocks: HashMap<NodeId, Vec<Block>>,

    /// Frozen output paths; failed nodes are absent
    pub table: IdPathTable,
    pub failures: Vec<NodeFailure>,
    pub stats: CrawlStats,
}

/// Content fetched for one queued node
#[derive(Debug)]
enum FetchedContent {
    Blocks(Vec<Block>),
    Database {
        columns: Vec<Column>,
        records: Vec<RecordData>,
    },

    /// Another task already claimed this node
    AlreadyFetched,
}

/// Mutable crawl state shared between the merge loop and fetch tasks
#[derive(Debug, Default)]
struct CrawlState {
    graph: ContentGraph,
    blocks: HashMap<NodeId, Vec<Block>>,
    registry: PathRegistry,

    /// IDs whose content fetch has started
    fetched: HashSet<NodeId>,
    failures: Vec<NodeFailure>,
}

#[derive(Debug, Default)]
struct Counters {
    remote_calls: AtomicUsize,
    cache_hits: AtomicUsize,
}

/// Cache-first access to the content source, cheap to clone into tasks
struct Fetcher<S> {
    source: Arc<S>,
    cache: Arc<CacheStore>,
    counters: Arc<Counters>,
}

impl<S> Clone for Fetcher<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            cache: Arc::clone(&self.cache),
            counters: Arc::clone(&self.counters),
        }
    }
}

impl<S: ContentSource> Fetcher<S> {
    async fn fetch_node(&self, task: &QueuedNode) -> FetchResult<FetchedContent> {
        match task.kind {
            TaskKind::Page | TaskKind::Record => {
                self.fetch_block_tree(&task.id).await.map(FetchedContent::Blocks)
            }
            TaskKind::Database => {
                let database = self.fetch_object(ResourceKind::Database, &task.id).await?;
                let columns = wire::database_columns(&database);

                let records = self
                    .fetch_list(ResourceKind::Query, &task.id)
                    .await?
                    .iter()
                    .filter_map(|raw| match wire::parse_record(raw) {
                        Ok(record) => Some(record),
                        Err(e) => {
                            tracing::warn!("Skipping record of database {}: {}", task.id, e);
                            None
                        }
                    })
                    .collect();

                Ok(FetchedContent::Database { columns, records })
            }
        }
    }

    /// Fetches a page or database object
    async fn fetch_object(&self, kind: ResourceKind, id: &str) -> FetchResult<Value> {
        if let Some(payload) = self.cache.get_fresh::<Value>(kind, id) {
            self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Cache hit for {} {}", kind, id);
            return Ok(payload);
        }

        self.counters.remote_calls.fetch_add(1, Ordering::Relaxed);
        let result = match kind {
            ResourceKind::Database => self.source.get_database(id).await,
            _ => self.source.get_page(id).await,
        };

        match result {
            Ok(payload) => {
                self.cache.put(kind, id, &payload);
                Ok(payload)
            }
            Err(e) => self.stale_or(kind, id, e),
        }
    }

    /// Fetches every page of a block listing or database query
    async fn fetch_list(&self, kind: ResourceKind, id: &str) -> FetchResult<Vec<Value>> {
        if let Some(items) = self.cache.get_fresh::<Vec<Value>>(kind, id) {
            self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Cache hit for {} {}", kind, id);
            return Ok(items);
        }

        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            self.counters.remote_calls.fetch_add(1, Ordering::Relaxed);
            let result = match kind {
                ResourceKind::Query => self.source.query_database(id, cursor.as_deref()).await,
                _ => self.source.get_child_blocks(id, cursor.as_deref()).await,
            };

            let page = match result {
                Ok(page) => page,
                Err(e) => return self.stale_or(kind, id, e),
            };
            items.extend(page.results);

            match page.next_cursor {
                Some(next) if cursor.as_deref() == Some(next.as_str()) => {
                    return Err(FetchError::InvalidResponse {
                        resource: kind.as_str(),
                        id: id.to_string(),
                        message: format!("pagination cursor {} repeated", next),
                    });
                }
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        self.cache.put(kind, id, &items);
        Ok(items)
    }

    /// Falls back to an expired cache entry when the remote call failed transiently
    fn stale_or<T: serde::de::DeserializeOwned>(
        &self,
        kind: ResourceKind,
        id: &str,
        error: FetchError,
    ) -> FetchResult<T> {
        if error.is_transient() {
            if let Some(payload) = self.cache.get::<T>(kind, id) {
                tracing::warn!("Using expired cache entry for {} {}: {}", kind, id, error);
                return Ok(payload);
            }
        }
        Err(error)
    }

    /// Fetches the complete block tree below a page or record
    ///
    /// Child lists are fetched breadth-first and assembled afterwards, so the
    /// depth of the tree never translates into recursion across await points.
    async fn fetch_block_tree(&self, id: &str) -> FetchResult<Vec<Block>> {
        let mut lists: HashMap<String, Vec<Block>> = HashMap::new();
        let mut seen: HashSet<String> = HashSet::from([id.to_string()]);
        let mut pending = vec![id.to_string()];

        while let Some(parent) = pending.pop() {
            let blocks: Vec<Block> = self
                .fetch_list(ResourceKind::Blocks, &parent)
                .await?
                .iter()
                .map(wire::parse_block_lenient)
                .collect();

            for block in &blocks {
                if block.needs_children() && seen.insert(block.id.clone()) {
                    pending.push(block.id.clone());
                }
            }
            lists.insert(parent, blocks);
        }

        Ok(assemble(id, &mut lists))
    }
}

/// Attaches fetched child lists to their parent blocks
fn assemble(parent: &str, lists: &mut HashMap<String, Vec<Block>>) -> Vec<Block> {
    let blocks = lists.remove(parent).unwrap_or_default();
    blocks
        .into_iter()
        .map(|mut block| {
            if block.needs_children() {
                block.children = assemble(&block.id, lists);
            }
            block
        })
        .collect()
}

/// Main crawler structure
pub struct Crawler<S> {
    fetcher: Fetcher<S>,
    scheduler: Scheduler,
    state: Arc<Mutex<CrawlState>>,
}

impl<S: ContentSource + 'static> Crawler<S> {
    /// Creates a new crawler
    ///
    /// # Arguments
    ///
    /// * `source` - Remote API access
    /// * `cache` - Response cache consulted before every remote call
    /// * `max_concurrent` - Maximum number of node fetches in flight
    pub fn new(source: Arc<S>, cache: Arc<CacheStore>, max_concurrent: usize) -> Self {
        Self {
            fetcher: Fetcher {
                source,
                cache,
                counters: Arc::new(Counters::default()),
            },
            scheduler: Scheduler::new(max_concurrent),
            state: Arc::new(Mutex::new(CrawlState::default())),
        }
    }

    /// Crawls everything reachable from `root_id`
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlOutput)` - The complete graph and frozen path table
    /// * `Err(WikiError)` - The root ID is invalid or the root could not be fetched
    pub async fn crawl(mut self, root_id: &str) -> Result<CrawlOutput, WikiError> {
        let root_id =
            normalize_id(root_id).ok_or_else(|| ConfigError::InvalidId(root_id.to_string()))?;
        tracing::info!("Starting crawl from root page {}", root_id);

        let root_page = self
            .fetcher
            .fetch_object(ResourceKind::Page, &root_id)
            .await
            .map_err(|source| WikiError::RootUnavailable {
                id: root_id.clone(),
                source,
            })?;

        let title = wire::page_title(&root_page);
        self.state
            .lock()
            .await
            .graph
            .insert(Node::new(root_id.clone(), NodeKind::Page, title));
        self.scheduler.enqueue(QueuedNode {
            id: root_id.clone(),
            kind: TaskKind::Page,
        });

        while !self.scheduler.is_empty() {
            let level = self.scheduler.next_level();
            let level_size = level.len();

            let mut handles = Vec::with_capacity(level_size);
            for task in level {
                let fetcher = self.fetcher.clone();
                let state = Arc::clone(&self.state);
                let semaphore = self.scheduler.semaphore();

                handles.push(tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await;
                    let first_visit = state.lock().await.fetched.insert(task.id.clone());
                    let outcome = if first_visit {
                        fetcher.fetch_node(&task).await
                    } else {
                        Ok(FetchedContent::AlreadyFetched)
                    };
                    (task, outcome)
                }));
            }

            // Merge in queue order so discovery does not depend on timing
            for handle in handles {
                let (task, outcome) = handle.await?;
                self.merge(&root_id, task, outcome).await?;
            }

            tracing::info!(
                "Level {}: {} nodes fetched, {} discovered for the next level",
                self.scheduler.levels(),
                level_size,
                self.scheduler.frontier_size()
            );
        }

        let CrawlState {
            mut graph,
            blocks,
            failures,
            ..
        } = std::mem::take(&mut *self.state.lock().await);

        let table = IdPathTable::freeze(&mut graph, &root_id);
        let stats = CrawlStats {
            nodes: graph.len(),
            remote_calls: self.fetcher.counters.remote_calls.load(Ordering::Relaxed),
            cache_hits: self.fetcher.counters.cache_hits.load(Ordering::Relaxed),
            levels: self.scheduler.levels(),
        };

        tracing::info!(
            "Crawl completed: {} nodes, {} failed, {} remote calls, {} cache hits",
            stats.nodes,
            failures.len(),
            stats.remote_calls,
            stats.cache_hits
        );

        Ok(CrawlOutput {
            root_id,
            graph,
            blocks,
            table,
            failures,
            stats,
        })
    }

    /// Applies one fetch result to the graph and queues newly discovered nodes
    async fn merge(
        &mut self,
        root_id: &str,
        task: QueuedNode,
        outcome: FetchResult<FetchedContent>,
    ) -> Result<(), WikiError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let content = match outcome {
            Ok(content) => content,
            Err(source) if task.id == root_id => {
                return Err(WikiError::RootUnavailable {
                    id: task.id,
                    source,
                });
            }
            Err(error) => {
                record_failure(state, &task.id, &error);
                return Ok(());
            }
        };

        match content {
            FetchedContent::AlreadyFetched => return Ok(()),
            FetchedContent::Blocks(blocks) => {
                let children: Vec<(NodeId, String, TaskKind)> = child_references(&blocks)
                    .into_iter()
                    .filter_map(|(id, kind)| match kind {
                        BlockKind::ChildPage { title } => {
                            Some((id.to_string(), title.clone(), TaskKind::Page))
                        }
                        BlockKind::ChildDatabase { title } => {
                            Some((id.to_string(), title.clone(), TaskKind::Database))
                        }
                        _ => None,
                    })
                    .collect();

                for (id, title, kind) in children {
                    let node = Node::new(id, NodeKind::Page, title);
                    discover(state, &mut self.scheduler, &task, node, kind);
                }
                state.blocks.insert(task.id.clone(), blocks);
            }
            FetchedContent::Database { columns, records } => {
                if let Some(node) = state.graph.get_mut(&task.id) {
                    node.columns = columns;
                }
                for record in records {
                    let mut node = Node::new(record.id, NodeKind::DatabaseRecord, record.title);
                    node.cells = record.cells;
                    discover(state, &mut self.scheduler, &task, node, TaskKind::Record);
                }
            }
        }

        if let Some(node) = state.graph.get_mut(&task.id) {
            node.status = NodeStatus::Fetched;
        }
        Ok(())
    }
}

/// Registers a newly found node under `parent`, reserving its output stem
///
/// A node that is already known keeps its first parent and is not queued again.
fn discover(
    state: &mut CrawlState,
    scheduler: &mut Scheduler,
    parent: &QueuedNode,
    mut node: Node,
    kind: TaskKind,
) {
    if state.graph.contains(&node.id) {
        tracing::debug!(
            "{} is already known, not adding it under {}",
            node.id,
            parent.id
        );
        return;
    }

    let dir = state
        .graph
        .get(&parent.id)
        .map(|p| p.stem.clone())
        .unwrap_or_default();
    node.stem = state.registry.reserve(&dir, &node.title);
    node.parent_id = Some(parent.id.clone());
    node.is_database = kind == TaskKind::Database;

    let id = node.id.clone();
    tracing::debug!("Discovered {:?} {} \"{}\" at {}", kind, id, node.title, node.stem);
    state.graph.insert(node);
    if let Some(parent_node) = state.graph.get_mut(&parent.id) {
        parent_node.child_ids.push(id.clone());
    }

    scheduler.enqueue(QueuedNode { id, kind });
}

fn record_failure(state: &mut CrawlState, id: &str, error: &FetchError) {
    let not_found = error.is_not_found();
    let Some(node) = state.graph.get_mut(id) else {
        return;
    };

    if not_found {
        tracing::warn!("Skipping \"{}\" ({}): not found or no access", node.title, id);
    } else {
        tracing::warn!("Skipping \"{}\" ({}): {}", node.title, id, error);
    }

    node.status = NodeStatus::Failed {
        reason: error.to_string(),
        not_found,
    };
    state.failures.push(NodeFailure {
        id: id.to_string(),
        title: node.title.clone(),
        reason: error.to_string(),
        not_found,
    });
}
