//! Scheduler for the crawl frontier
//!
//! This module handles:
//! - FIFO queue management for nodes waiting to be fetched
//! - Handing out the frontier one breadth-first level at a time
//! - Global concurrency limiting via a semaphore

use crate::model::NodeId;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// What has to be fetched for a queued node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Block tree of a regular page
    Page,

    /// Schema and records of a database
    Database,

    /// Block tree of a database record
    Record,
}

/// A node queued for fetching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedNode {
    pub id: NodeId,
    pub kind: TaskKind,
}

/// Scheduler manages the frontier queue and the fetch concurrency limit
///
/// The frontier is drained level by level: everything queued while a level is
/// being merged belongs to the next level. Within a level the original queue
/// order is kept so results can be merged deterministically.
pub struct Scheduler {
    /// Global semaphore for limiting concurrent fetches
    semaphore: Arc<Semaphore>,

    /// Nodes waiting to be fetched, in discovery order
    frontier: VecDeque<QueuedNode>,

    /// Number of levels handed out so far
    levels: u32,
}

impl Scheduler {
    /// Creates a new scheduler
    ///
    /// # Arguments
    ///
    /// * `max_concurrent` - Maximum number of fetches in flight (at least 1)
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            frontier: VecDeque::new(),
            levels: 0,
        }
    }

    /// Adds a node to the back of the frontier
    pub fn enqueue(&mut self, node: QueuedNode) {
        self.frontier.push_back(node);
    }

    /// Takes every queued node, in queue order
    pub fn next_level(&mut self) -> Vec<QueuedNode> {
        if !self.frontier.is_empty() {
            self.levels += 1;
        }
        self.frontier.drain(..).collect()
    }

    /// Semaphore each fetch task must hold a permit of
    pub fn semaphore(&self) -> Arc<Semaphore> {
        Arc::clone(&self.semaphore)
    }

    pub fn frontier_size(&self) -> usize {
        self.frontier.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frontier.is_empty()
    }

    /// Number of breadth-first levels handed out so far
    pub fn levels(&self) -> u32 {
        self.levels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queued(id: &str) -> QueuedNode {
        QueuedNode {
            id: id.to_string(),
            kind: TaskKind::Page,
        }
    }

    #[test]
    fn test_levels_keep_queue_order() {
        let mut scheduler = Scheduler::new(4);
        scheduler.enqueue(queued("b"));
        scheduler.enqueue(queued("a"));

        let level = scheduler.next_level();
        let ids: Vec<&str> = level.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert!(scheduler.is_empty());
        assert_eq!(scheduler.levels(), 1);

        scheduler.enqueue(queued("c"));
        assert_eq!(scheduler.frontier_size(), 1);
        assert_eq!(scheduler.next_level(), vec![queued("c")]);
        assert_eq!(scheduler.levels(), 2);
    }

    #[test]
    fn test_empty_level_is_not_counted() {
        let mut scheduler = Scheduler::new(1);
        assert!(scheduler.next_level().is_empty());
        assert_eq!(scheduler.levels(), 0);
    }

    #[tokio::test]
    async fn test_semaphore_bounds_permits() {
        let scheduler = Scheduler::new(2);
        let semaphore = scheduler.semaphore();

        let _a = semaphore.clone().acquire_owned().await.unwrap();
        let _b = semaphore.clone().acquire_owned().await.unwrap();
        assert!(semaphore.clone().try_acquire_owned().is_err());
    }

    #[test]
    fn test_zero_concurrency_is_clamped() {
        let scheduler = Scheduler::new(0);
        assert_eq!(scheduler.semaphore().available_permits(), 1);
    }
}
