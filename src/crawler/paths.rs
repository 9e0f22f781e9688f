//! Output path assignment
//!
//! Every node reserves a stem (`<parent-dir>/<slug>`) when it is discovered.
//! Once the crawl is complete the stems are frozen into the [`IdPathTable`],
//! which the link resolver treats as immutable.

use crate::model::{ContentGraph, NodeId};
use std::collections::{HashMap, HashSet};

/// Maximum length of a slug, in characters
pub const MAX_SLUG_LEN: usize = 80;

/// File name reserved in every directory for the page owning it
const INDEX: &str = "index";

/// Device names Windows refuses as file names, with or without an extension
const WINDOWS_RESERVED: [&str; 22] = [
    "con", "prn", "aux", "nul", "com1", "com2", "com3", "com4", "com5", "com6", "com7", "com8",
    "com9", "lpt1", "lpt2", "lpt3", "lpt4", "lpt5", "lpt6", "lpt7", "lpt8", "lpt9",
];

/// Turns a title into a file-name-safe slug
///
/// Lower-cases, keeps alphanumeric characters, collapses every other run of
/// characters into one `-` and trims `-` from both ends. The result is cut to
/// [`MAX_SLUG_LEN`] characters; an empty result becomes `untitled`. Windows
/// device names such as `con` or `lpt1` get a `_` prefix.
///
/// # Example
///
/// ```
/// use notion_wiki::crawler::slugify;
///
/// assert_eq!(slugify("Team Handbook: 2024!"), "team-handbook-2024");
/// assert_eq!(slugify("???"), "untitled");
/// assert_eq!(slugify("Aux"), "_aux");
/// ```
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;

    for c in title.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    let mut slug: String = slug.chars().take(MAX_SLUG_LEN).collect();
    while slug.ends_with('-') {
        slug.pop();
    }

    if slug.is_empty() {
        "untitled".to_string()
    } else if WINDOWS_RESERVED.contains(&slug.as_str()) {
        format!("_{}", slug)
    } else {
        slug
    }
}

/// Joins a directory and a name with `/`; the output root is the empty string
pub fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Names already taken, per directory
#[derive(Debug, Default)]
pub struct PathRegistry {
    taken: HashMap<String, HashSet<String>>,
}

impl PathRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves a unique stem for `title` inside `dir`
    ///
    /// The first occurrence of a slug keeps it bare; later ones get `-2`, `-3`
    /// and so on in reservation order. `index` is never handed out.
    pub fn reserve(&mut self, dir: &str, title: &str) -> String {
        let base = slugify(title);
        let taken = self.taken.entry(dir.to_string()).or_default();

        let mut candidate = base.clone();
        let mut n = 1;
        while candidate == INDEX || taken.contains(&candidate) {
            n += 1;
            candidate = format!("{}-{}", base, n);
        }

        taken.insert(candidate.clone());
        join(dir, &candidate)
    }
}

/// Frozen output location of one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEntry {
    /// Path relative to the output root, with `.md` extension
    pub path: String,
    pub title: String,
}

/// Mapping from node ID to output path, immutable after the crawl
#[derive(Debug, Clone, Default)]
pub struct IdPathTable {
    entries: HashMap<NodeId, PathEntry>,
}

impl IdPathTable {
    /// Assigns final output paths and builds the table
    ///
    /// Layout:
    /// - the root node → `index.md`
    /// - a database → `<stem>.md` (its records live under `<stem>/`)
    /// - a page or record with live children → `<stem>/index.md`
    /// - anything else → `<stem>.md`
    ///
    /// Failed nodes get no path, so references to them resolve as broken.
    pub fn freeze(graph: &mut ContentGraph, root_id: &str) -> Self {
        let assigned: Vec<(NodeId, String)> = graph
            .iter()
            .filter(|node| !node.is_failed())
            .map(|node| {
                let path = if node.id == root_id {
                    format!("{}.md", INDEX)
                } else if !node.is_database && !graph.live_children(&node.id).is_empty() {
                    format!("{}/{}.md", node.stem, INDEX)
                } else {
                    format!("{}.md", node.stem)
                };
                (node.id.clone(), path)
            })
            .collect();

        let mut entries = HashMap::with_capacity(assigned.len());
        for (id, path) in assigned {
            if let Some(node) = graph.get_mut(&id) {
                node.output_path = Some(path.clone());
                entries.insert(
                    id,
                    PathEntry {
                        path,
                        title: node.title.clone(),
                    },
                );
            }
        }

        Self { entries }
    }

    pub fn get(&self, id: &str) -> Option<&PathEntry> {
        self.entries.get(id)
    }

    pub fn path(&self, id: &str) -> Option<&str> {
        self.entries.get(id).map(|entry| entry.path.as_str())
    }

    pub fn title(&self, id: &str) -> Option<&str> {
        self.entries.get(id).map(|entry| entry.title.as_str())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Relative link from one output file to another
///
/// Both paths are relative to the output root and use `/` separators.
///
/// # Example
///
/// ```
/// use notion_wiki::crawler::relative_path;
///
/// assert_eq!(relative_path("guides/index.md", "index.md"), "../index.md");
/// assert_eq!(relative_path("index.md", "guides/setup.md"), "guides/setup.md");
/// ```
pub fn relative_path(from_file: &str, to_file: &str) -> String {
    let mut from_dir: Vec<&str> = from_file.split('/').collect();
    from_dir.pop();

    let to_parts: Vec<&str> = to_file.split('/').collect();
    let Some((file, to_dir)) = to_parts.split_last() else {
        return to_file.to_string();
    };

    let common = from_dir
        .iter()
        .zip(to_dir)
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = vec![".."; from_dir.len() - common];
    parts.extend(&to_dir[common..]);
    parts.push(file);
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Node, NodeKind, NodeStatus};

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Getting Started"), "getting-started");
        assert_eq!(slugify("  --Hello,   World--  "), "hello-world");
        assert_eq!(slugify("C++ / Rust"), "c-rust");
        assert_eq!(slugify("Über Café"), "über-café");
        assert_eq!(slugify(""), "untitled");
        assert_eq!(slugify("🚀"), "untitled");
    }

    #[test]
    fn test_slugify_truncates() {
        let title = "a".repeat(200);
        assert_eq!(slugify(&title).chars().count(), MAX_SLUG_LEN);

        // Truncation never leaves a trailing dash
        let title = format!("{} b", "a".repeat(MAX_SLUG_LEN - 1));
        assert!(!slugify(&title).ends_with('-'));
    }

    #[test]
    fn test_duplicate_siblings_are_numbered() {
        let mut registry = PathRegistry::new();
        assert_eq!(registry.reserve("", "Notes"), "notes");
        assert_eq!(registry.reserve("", "Notes"), "notes-2");
        assert_eq!(registry.reserve("", "notes!"), "notes-3");
        // Other directories are independent
        assert_eq!(registry.reserve("guides", "Notes"), "guides/notes");
    }

    #[test]
    fn test_windows_device_names_are_prefixed() {
        assert_eq!(slugify("CON"), "_con");
        assert_eq!(slugify("nul"), "_nul");
        assert_eq!(slugify("Com1"), "_com1");
        assert_eq!(slugify("LPT9!"), "_lpt9");
        // Only exact device names are affected
        assert_eq!(slugify("Console"), "console");
        assert_eq!(slugify("com10"), "com10");
        assert_eq!(slugify("Aux Notes"), "aux-notes");

        let mut registry = PathRegistry::new();
        assert_eq!(registry.reserve("", "Aux"), "_aux");
        assert_eq!(registry.reserve("", "aux"), "_aux-2");
    }

    #[test]
    fn test_index_is_reserved() {
        let mut registry = PathRegistry::new();
        assert_eq!(registry.reserve("docs", "Index"), "docs/index-2");
        assert_eq!(registry.reserve("docs", "Index"), "docs/index-3");
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(relative_path("index.md", "a.md"), "a.md");
        assert_eq!(relative_path("a/b.md", "a/c.md"), "c.md");
        assert_eq!(relative_path("a/b/c.md", "a/d/e.md"), "../d/e.md");
        assert_eq!(relative_path("a/b/c.md", "index.md"), "../../index.md");
        assert_eq!(relative_path("a/index.md", "a/index.md"), "index.md");
    }

    #[test]
    fn test_freeze_layout() {
        let mut graph = ContentGraph::new();

        let mut root = Node::new("root".into(), NodeKind::Page, "Home");
        root.child_ids = vec!["guide".into(), "leaf".into(), "db".into(), "gone".into()];
        graph.insert(root);

        let mut guide = Node::new("guide".into(), NodeKind::Page, "Guide");
        guide.stem = "guide".into();
        guide.child_ids = vec!["setup".into()];
        graph.insert(guide);

        let mut setup = Node::new("setup".into(), NodeKind::Page, "Setup");
        setup.stem = "guide/setup".into();
        graph.insert(setup);

        let mut leaf = Node::new("leaf".into(), NodeKind::Page, "Leaf");
        leaf.stem = "leaf".into();
        graph.insert(leaf);

        let mut db = Node::new("db".into(), NodeKind::Page, "Tasks");
        db.stem = "tasks".into();
        db.is_database = true;
        db.child_ids = vec!["rec".into()];
        graph.insert(db);

        let mut rec = Node::new("rec".into(), NodeKind::DatabaseRecord, "Ship it");
        rec.stem = "tasks/ship-it".into();
        graph.insert(rec);

        let mut gone = Node::new("gone".into(), NodeKind::Page, "Gone");
        gone.stem = "gone".into();
        gone.status = NodeStatus::Failed {
            reason: "404".into(),
            not_found: true,
        };
        graph.insert(gone);

        let table = IdPathTable::freeze(&mut graph, "root");

        assert_eq!(table.path("root"), Some("index.md"));
        assert_eq!(table.path("guide"), Some("guide/index.md"));
        assert_eq!(table.path("setup"), Some("guide/setup.md"));
        assert_eq!(table.path("leaf"), Some("leaf.md"));
        assert_eq!(table.path("db"), Some("tasks.md"));
        assert_eq!(table.path("rec"), Some("tasks/ship-it.md"));
        assert!(!table.contains("gone"));
        assert_eq!(table.title("rec"), Some("Ship it"));
        assert_eq!(graph.get("leaf").unwrap().output_path.as_deref(), Some("leaf.md"));
        assert!(graph.get("gone").unwrap().output_path.is_none());
    }

    #[test]
    fn test_page_whose_children_all_failed_is_a_leaf() {
        let mut graph = ContentGraph::new();
        let mut root = Node::new("root".into(), NodeKind::Page, "Home");
        root.child_ids = vec!["p".into()];
        graph.insert(root);

        let mut page = Node::new("p".into(), NodeKind::Page, "Parent");
        page.stem = "parent".into();
        page.child_ids = vec!["c".into()];
        graph.insert(page);

        let mut child = Node::new("c".into(), NodeKind::Page, "Child");
        child.stem = "parent/child".into();
        child.status = NodeStatus::Failed {
            reason: "timeout".into(),
            not_found: false,
        };
        graph.insert(child);

        let table = IdPathTable::freeze(&mut graph, "root");
        assert_eq!(table.path("p"), Some("parent.md"));
    }
}
