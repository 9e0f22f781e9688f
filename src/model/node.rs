use crate::model::{CellValue, Column, NodeId};
use std::collections::HashMap;

/// Kind of a node in the content graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A regular page (databases are pages flagged with `is_database`)
    Page,

    /// One row of a database
    DatabaseRecord,
}

/// Fetch progress of a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeStatus {
    /// Discovered, content not fetched yet
    Discovered,

    /// Content fetched successfully
    Fetched,

    /// Content could not be fetched; the node and its subtree are skipped
    Failed { reason: String, not_found: bool },
}

/// One page, database or database record
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub title: String,
    pub parent_id: Option<NodeId>,
    pub child_ids: Vec<NodeId>,
    pub is_database: bool,

    /// Declared columns, in declared order (databases only)
    pub columns: Vec<Column>,

    /// Property values keyed by column name (records only)
    pub cells: HashMap<String, CellValue>,

    /// Output location without extension, reserved at discovery
    pub stem: String,

    /// Final relative output path, set once when the path table is frozen
    pub output_path: Option<String>,

    pub status: NodeStatus,
}

impl Node {
    pub fn new(id: NodeId, kind: NodeKind, title: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            title: title.into(),
            parent_id: None,
            child_ids: Vec::new(),
            is_database: false,
            columns: Vec::new(),
            cells: HashMap::new(),
            stem: String::new(),
            output_path: None,
            status: NodeStatus::Discovered,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, NodeStatus::Failed { .. })
    }
}

/// In-memory content graph, iterable in discovery order
#[derive(Debug, Clone, Default)]
pub struct ContentGraph {
    nodes: HashMap<NodeId, Node>,
    order: Vec<NodeId>,
}

impl ContentGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a node unless its ID is already present
    ///
    /// Returns false (and leaves the graph untouched) for a known ID.
    pub fn insert(&mut self, node: Node) -> bool {
        if self.nodes.contains_key(&node.id) {
            return false;
        }
        self.order.push(node.id.clone());
        self.nodes.insert(node.id.clone(), node);
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// Iterates nodes in discovery order
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    /// Children of a node that were fetched successfully, in order
    pub fn live_children(&self, id: &str) -> Vec<&Node> {
        self.get(id)
            .map(|node| {
                node.child_ids
                    .iter()
                    .filter_map(|child| self.get(child))
                    .filter(|child| !child.is_failed())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_is_first_wins() {
        let mut graph = ContentGraph::new();
        assert!(graph.insert(Node::new("a".into(), NodeKind::Page, "First")));
        assert!(!graph.insert(Node::new("a".into(), NodeKind::Page, "Second")));
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.get("a").unwrap().title, "First");
    }

    #[test]
    fn test_iter_follows_discovery_order() {
        let mut graph = ContentGraph::new();
        for id in ["c", "a", "b"] {
            graph.insert(Node::new(id.into(), NodeKind::Page, id));
        }
        let ids: Vec<&str> = graph.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_live_children_skip_failed() {
        let mut graph = ContentGraph::new();
        let mut parent = Node::new("p".into(), NodeKind::Page, "Parent");
        parent.child_ids = vec!["ok".into(), "bad".into()];
        graph.insert(parent);
        graph.insert(Node::new("ok".into(), NodeKind::Page, "Ok"));
        let mut bad = Node::new("bad".into(), NodeKind::Page, "Bad");
        bad.status = NodeStatus::Failed {
            reason: "gone".into(),
            not_found: true,
        };
        graph.insert(bad);

        let live: Vec<&str> = graph
            .live_children("p")
            .iter()
            .map(|n| n.id.as_str())
            .collect();
        assert_eq!(live, vec!["ok"]);
    }
}
