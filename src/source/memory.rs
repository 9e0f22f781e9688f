//! In-memory content source
//!
//! Serves a fixed workspace of raw payloads with the same pagination contract as
//! the REST API. Every call is counted per resource so callers can verify how
//! often something was fetched; failures can be injected per resource.

use crate::cache::ResourceKind;
use crate::model::{normalize_id, NodeId};
use crate::source::{ContentSource, FetchError, FetchResult, Paginated};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug)]
pub struct MemorySource {
    pages: HashMap<NodeId, Value>,
    blocks: HashMap<NodeId, Vec<Value>>,
    databases: HashMap<NodeId, Value>,
    records: HashMap<NodeId, Vec<Value>>,
    failures: HashMap<(ResourceKind, NodeId), FetchError>,
    page_size: usize,
    calls: Mutex<HashMap<(ResourceKind, NodeId), usize>>,
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySource {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            blocks: HashMap::new(),
            databases: HashMap::new(),
            records: HashMap::new(),
            failures: HashMap::new(),
            page_size: 100,
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Number of results returned per listing call (at least 1)
    pub fn set_page_size(&mut self, page_size: usize) -> &mut Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Registers a page object
    pub fn insert_page(&mut self, id: &str, page: Value) -> &mut Self {
        self.pages.insert(key(id), page);
        self
    }

    /// Registers the child blocks of a page or block
    pub fn insert_blocks(&mut self, parent_id: &str, blocks: Vec<Value>) -> &mut Self {
        self.blocks.insert(key(parent_id), blocks);
        self
    }

    /// Registers a database object
    pub fn insert_database(&mut self, id: &str, database: Value) -> &mut Self {
        self.databases.insert(key(id), database);
        self
    }

    /// Registers the records returned by a database query
    pub fn insert_records(&mut self, database_id: &str, records: Vec<Value>) -> &mut Self {
        self.records.insert(key(database_id), records);
        self
    }

    /// Makes every call for one resource fail with `error`
    pub fn fail(&mut self, kind: ResourceKind, id: &str, error: FetchError) -> &mut Self {
        self.failures.insert((kind, key(id)), error);
        self
    }

    /// Number of calls made for one resource, pagination calls included
    pub fn calls(&self, kind: ResourceKind, id: &str) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.get(&(kind, key(id))).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Number of calls made for any resource
    pub fn total_calls(&self) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.values().sum())
            .unwrap_or(0)
    }

    /// Counts the call and returns an injected failure, if any
    fn record_call(&self, kind: ResourceKind, id: &str) -> FetchResult<()> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry((kind, id.to_string())).or_insert(0) += 1;
        }
        match self.failures.get(&(kind, id.to_string())) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn page_of(&self, items: &[Value], cursor: Option<&str>) -> Paginated {
        let start = cursor.and_then(|c| c.parse::<usize>().ok()).unwrap_or(0);
        let end = (start + self.page_size).min(items.len());
        let results = items.get(start..end).map(<[Value]>::to_vec).unwrap_or_default();
        let next_cursor = (end < items.len()).then(|| end.to_string());

        Paginated {
            results,
            next_cursor,
        }
    }
}

fn key(id: &str) -> NodeId {
    normalize_id(id).unwrap_or_else(|| id.to_string())
}

fn not_found(kind: ResourceKind, id: &str) -> FetchError {
    FetchError::NotFound {
        resource: kind.as_str(),
        id: id.to_string(),
    }
}

#[async_trait]
impl ContentSource for MemorySource {
    async fn get_page(&self, id: &str) -> FetchResult<Value> {
        let kind = ResourceKind::Page;
        self.record_call(kind, id)?;
        self.pages.get(id).cloned().ok_or_else(|| not_found(kind, id))
    }

    async fn get_child_blocks(&self, id: &str, cursor: Option<&str>) -> FetchResult<Paginated> {
        self.record_call(ResourceKind::Blocks, id)?;
        let blocks = self.blocks.get(id).map(Vec::as_slice).unwrap_or_default();
        Ok(self.page_of(blocks, cursor))
    }

    async fn get_database(&self, id: &str) -> FetchResult<Value> {
        let kind = ResourceKind::Database;
        self.record_call(kind, id)?;
        self.databases.get(id).cloned().ok_or_else(|| not_found(kind, id))
    }

    async fn query_database(&self, id: &str, cursor: Option<&str>) -> FetchResult<Paginated> {
        let kind = ResourceKind::Query;
        self.record_call(kind, id)?;
        if !self.databases.contains_key(id) {
            return Err(not_found(kind, id));
        }
        let records = self.records.get(id).map(Vec::as_slice).unwrap_or_default();
        Ok(self.page_of(records, cursor))
    }
}
