//! Integration tests for the full pipeline
//!
//! These tests run crawl, conversion, link resolution and writing against an
//! in-memory workspace and inspect the generated Markdown tree.

use notion_wiki::cache::{CachePolicy, CacheStore, ResourceKind};
use notion_wiki::source::{FetchError, MemorySource};
use notion_wiki::{run_pipeline, PipelineOptions, WikiError};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const ROOT: u32 = 1;
const GUIDE: u32 = 2;
const NOTES: u32 = 3;
const NOTES_2: u32 = 4;
const SETUP: u32 = 5;
const NOTES_3: u32 = 6;
const PRIVATE: u32 = 7;
const TASKS: u32 = 10;
const WRITE_DOCS: u32 = 11;
const REVIEW: u32 = 12;
const GHOST: u32 = 99;

fn id(n: u32) -> String {
    format!("{:032x}", n)
}

fn text(content: &str) -> Value {
    json!({"type": "text", "plain_text": content, "text": {"content": content}})
}

fn mention(target: u32, label: &str) -> Value {
    json!({"type": "mention", "plain_text": label,
           "mention": {"type": "page", "page": {"id": id(target)}}})
}

fn page(title: &str) -> Value {
    json!({"object": "page", "properties": {"title": {"type": "title", "title": [text(title)]}}})
}

fn paragraph(block_id: &str, spans: Vec<Value>) -> Value {
    json!({"id": block_id, "type": "paragraph", "has_children": false,
           "paragraph": {"rich_text": spans}})
}

fn child_page(target: u32, title: &str) -> Value {
    json!({"id": id(target), "type": "child_page", "has_children": true,
           "child_page": {"title": title}})
}

fn child_database(target: u32, title: &str) -> Value {
    json!({"id": id(target), "type": "child_database", "has_children": false,
           "child_database": {"title": title}})
}

fn record(record_id: u32, title: &str, done: Option<bool>, related: &[u32]) -> Value {
    let mut properties = serde_json::Map::new();
    properties.insert("Name".into(), json!({"type": "title", "title": [text(title)]}));
    if let Some(done) = done {
        properties.insert("Done".into(), json!({"type": "checkbox", "checkbox": done}));
    }
    let relation: Vec<Value> = related.iter().map(|r| json!({"id": id(*r)})).collect();
    properties.insert("Related".into(), json!({"type": "relation", "relation": relation}));

    json!({"object": "page", "id": id(record_id), "properties": properties})
}

/// A small workspace covering nesting, duplicate titles, a database with a
/// relation cycle, a shared child, a broken mention and an inaccessible page
fn workspace() -> MemorySource {
    let mut source = MemorySource::new();
    source
        .set_page_size(3)
        .insert_page(&id(ROOT), page("Home"))
        .insert_blocks(
            &id(ROOT),
            vec![
                paragraph("r1", vec![text("Start with "), mention(SETUP, "Setup")]),
                child_page(GUIDE, "Guide"),
                child_page(NOTES, "Notes"),
                child_page(NOTES_2, "Notes"),
                child_page(NOTES_3, "Notes"),
                child_database(TASKS, "Tasks"),
                child_page(PRIVATE, "Private"),
            ],
        )
        .insert_blocks(
            &id(GUIDE),
            vec![
                paragraph(
                    "g1",
                    vec![json!({"type": "text", "plain_text": "Back home",
                                "text": {"content": "Back home", "link": {"url": format!("/{}", id(ROOT))}}})],
                ),
                child_page(SETUP, "Setup"),
                // Same page again: must not be fetched twice
                child_page(NOTES, "Notes"),
            ],
        )
        .insert_blocks(&id(SETUP), vec![paragraph("s1", vec![text("Install it.")])])
        .insert_blocks(
            &id(NOTES),
            vec![paragraph("n1", vec![text("See "), mention(GHOST, "Ghost")])],
        )
        .insert_database(
            &id(TASKS),
            json!({
                "object": "database",
                "title": [text("Tasks")],
                "properties": {
                    "Name": {"type": "title", "title": {}},
                    "Done": {"type": "checkbox", "checkbox": {}},
                    "Related": {"type": "relation", "relation": {}}
                }
            }),
        )
        .insert_records(
            &id(TASKS),
            vec![
                record(WRITE_DOCS, "Write docs", Some(true), &[REVIEW]),
                record(REVIEW, "Review", None, &[WRITE_DOCS]),
            ],
        )
        .insert_blocks(&id(WRITE_DOCS), vec![paragraph("w1", vec![text("Draft first.")])])
        .fail(
            ResourceKind::Blocks,
            &id(PRIVATE),
            FetchError::NotFound {
                resource: "blocks",
                id: id(PRIVATE),
            },
        );
    source
}

fn options(output: &Path, max_concurrent_requests: usize) -> PipelineOptions {
    PipelineOptions {
        output_dir: output.to_path_buf(),
        max_concurrent_requests,
    }
}

fn cache(dir: &Path) -> Arc<CacheStore> {
    Arc::new(CacheStore::new(dir, CachePolicy::new(3600)))
}

/// Reads every file below `dir`, keyed by its relative path
fn read_tree(dir: &Path) -> BTreeMap<String, String> {
    fn walk(root: &Path, dir: &Path, out: &mut BTreeMap<String, String>) {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(root, &path, out);
            } else {
                let relative = path.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/");
                out.insert(relative, fs::read_to_string(&path).unwrap());
            }
        }
    }

    let mut out = BTreeMap::new();
    walk(dir, dir, &mut out);
    out
}

#[tokio::test]
async fn test_full_run_layout() {
    let work = TempDir::new().unwrap();
    let output = work.path().join("wiki");
    let source = Arc::new(workspace());

    let summary = run_pipeline(source, cache(&work.path().join("cache")), &id(ROOT), &options(&output, 4))
        .await
        .unwrap();

    let tree = read_tree(&output);
    let files: Vec<&str> = tree.keys().map(String::as_str).collect();
    assert_eq!(
        files,
        vec![
            "guide/index.md",
            "guide/setup.md",
            "index.md",
            "notes-2.md",
            "notes-3.md",
            "notes.md",
            "tasks.md",
            "tasks/review.md",
            "tasks/write-docs.md",
        ]
    );
    assert_eq!(summary.files_written, 9);
    assert_eq!(summary.documents, 9);
    assert_eq!(summary.nodes_discovered, 10);
}

#[tokio::test]
async fn test_links_resolve_regardless_of_discovery_order() {
    let work = TempDir::new().unwrap();
    let output = work.path().join("wiki");

    run_pipeline(
        Arc::new(workspace()),
        cache(&work.path().join("cache")),
        &id(ROOT),
        &options(&output, 4),
    )
    .await
    .unwrap();

    let index = fs::read_to_string(output.join("index.md")).unwrap();
    // Setup is only discovered two levels below the page that mentions it
    assert!(index.contains("Start with [Setup](guide/setup.md)"));
    assert!(index.contains("[Guide](guide/index.md)"));
    assert!(index.contains("[Tasks](tasks.md)"));

    let guide = fs::read_to_string(output.join("guide/index.md")).unwrap();
    assert!(guide.contains("[Back home](../index.md)"));
    assert!(guide.contains("[Setup](setup.md)"));
    assert!(guide.contains("[Notes](../notes.md)"));
}

#[tokio::test]
async fn test_duplicate_titles_are_numbered_in_order() {
    let work = TempDir::new().unwrap();
    let output = work.path().join("wiki");

    run_pipeline(
        Arc::new(workspace()),
        cache(&work.path().join("cache")),
        &id(ROOT),
        &options(&output, 4),
    )
    .await
    .unwrap();

    let index = fs::read_to_string(output.join("index.md")).unwrap();
    assert!(index.contains("[Notes](notes.md)\n\n[Notes](notes-2.md)\n\n[Notes](notes-3.md)"));
}

#[tokio::test]
async fn test_broken_links_and_failed_pages_are_contained() {
    let work = TempDir::new().unwrap();
    let output = work.path().join("wiki");

    let summary = run_pipeline(
        Arc::new(workspace()),
        cache(&work.path().join("cache")),
        &id(ROOT),
        &options(&output, 4),
    )
    .await
    .unwrap();

    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].id, id(PRIVATE));
    assert!(summary.failures[0].not_found);
    assert!(!output.join("private.md").exists());

    // The ghost mention and the link to the inaccessible page
    assert_eq!(summary.broken_links.len(), 2);
    let notes = fs::read_to_string(output.join("notes.md")).unwrap();
    assert!(notes.contains("See Ghost [broken link]"));
    let index = fs::read_to_string(output.join("index.md")).unwrap();
    assert!(index.contains("Private [broken link]"));

    // Siblings of the failed page are still written
    assert!(output.join("notes-3.md").exists());
    assert!(output.join("tasks.md").exists());
}

#[tokio::test]
async fn test_database_table_and_record_pages() {
    let work = TempDir::new().unwrap();
    let output = work.path().join("wiki");

    run_pipeline(
        Arc::new(workspace()),
        cache(&work.path().join("cache")),
        &id(ROOT),
        &options(&output, 4),
    )
    .await
    .unwrap();

    let table = fs::read_to_string(output.join("tasks.md")).unwrap();
    assert_eq!(
        table,
        "# Tasks\n\n\
         | Name | Done | Related |\n\
         | --- | --- | --- |\n\
         | [Write docs](tasks/write-docs.md) | X | [Review](tasks/review.md) |\n\
         | [Review](tasks/review.md) |  | [Write docs](tasks/write-docs.md) |\n"
    );

    let review = fs::read_to_string(output.join("tasks/review.md")).unwrap();
    assert!(review.starts_with("# Review\n\n*Database record: [Tasks](../tasks.md)*\n"));
    // Missing property: empty cell
    assert!(review.contains("| Done |  |"));
    assert!(review.contains("## Referenced by [Tasks](../tasks.md)"));
    assert!(review.contains("| [Write docs](write-docs.md) | Related |"));

    let write_docs = fs::read_to_string(output.join("tasks/write-docs.md")).unwrap();
    assert!(write_docs.contains("| Done | X |"));
    assert!(write_docs.contains("Draft first."));
}

#[tokio::test]
async fn test_nothing_is_fetched_twice() {
    let work = TempDir::new().unwrap();
    let source = Arc::new(workspace());

    run_pipeline(
        Arc::clone(&source),
        cache(&work.path().join("cache")),
        &id(ROOT),
        &options(&work.path().join("wiki"), 4),
    )
    .await
    .unwrap();

    // Shared child page
    assert_eq!(source.calls(ResourceKind::Blocks, &id(NOTES)), 1);
    // Records pointing at each other through relations
    assert_eq!(source.calls(ResourceKind::Blocks, &id(WRITE_DOCS)), 1);
    assert_eq!(source.calls(ResourceKind::Blocks, &id(REVIEW)), 1);
    assert_eq!(source.calls(ResourceKind::Database, &id(TASKS)), 1);
    assert_eq!(source.calls(ResourceKind::Query, &id(TASKS)), 1);
    // The root block list spans three pages of three
    assert_eq!(source.calls(ResourceKind::Blocks, &id(ROOT)), 3);
}

#[tokio::test]
async fn test_second_run_is_idempotent_and_served_from_cache() {
    let work = TempDir::new().unwrap();
    let output = work.path().join("wiki");
    let cache_dir = work.path().join("cache");
    let source = Arc::new(workspace());

    let first = run_pipeline(Arc::clone(&source), cache(&cache_dir), &id(ROOT), &options(&output, 4))
        .await
        .unwrap();
    let tree = read_tree(&output);
    let calls_after_first = source.total_calls();
    assert!(first.crawl.remote_calls > 0);

    let second = run_pipeline(Arc::clone(&source), cache(&cache_dir), &id(ROOT), &options(&output, 4))
        .await
        .unwrap();

    assert_eq!(read_tree(&output), tree);
    assert_eq!(second.files_written, 0);
    assert_eq!(second.files_unchanged, 9);
    // Only the inaccessible page is asked for again; it was never cached
    assert_eq!(source.total_calls() - calls_after_first, 1);
    assert_eq!(second.crawl.remote_calls, 1);
    assert_eq!(source.calls(ResourceKind::Blocks, &id(PRIVATE)), 2);
}

#[tokio::test]
async fn test_output_does_not_depend_on_concurrency() {
    let work = TempDir::new().unwrap();
    let serial = work.path().join("serial");
    let parallel = work.path().join("parallel");

    run_pipeline(
        Arc::new(workspace()),
        cache(&work.path().join("cache-a")),
        &id(ROOT),
        &options(&serial, 1),
    )
    .await
    .unwrap();
    run_pipeline(
        Arc::new(workspace()),
        cache(&work.path().join("cache-b")),
        &id(ROOT),
        &options(&parallel, 16),
    )
    .await
    .unwrap();

    assert_eq!(read_tree(&serial), read_tree(&parallel));
}

#[tokio::test]
async fn test_corrupt_cache_entries_are_misses() {
    let work = TempDir::new().unwrap();
    let output = work.path().join("wiki");
    let cache_dir = work.path().join("cache");
    let source = Arc::new(workspace());

    run_pipeline(Arc::clone(&source), cache(&cache_dir), &id(ROOT), &options(&output, 4))
        .await
        .unwrap();
    let tree = read_tree(&output);
    let root_page_calls = source.calls(ResourceKind::Page, &id(ROOT));

    for entry in fs::read_dir(cache_dir.join("page")).unwrap() {
        fs::write(entry.unwrap().path(), "{ not json").unwrap();
    }

    run_pipeline(Arc::clone(&source), cache(&cache_dir), &id(ROOT), &options(&output, 4))
        .await
        .unwrap();

    assert_eq!(source.calls(ResourceKind::Page, &id(ROOT)), root_page_calls + 1);
    assert_eq!(read_tree(&output), tree);
}

#[tokio::test]
async fn test_root_failure_writes_nothing() {
    let work = TempDir::new().unwrap();
    let output = work.path().join("wiki");

    let result = run_pipeline(
        Arc::new(MemorySource::new()),
        cache(&work.path().join("cache")),
        &id(ROOT),
        &options(&output, 4),
    )
    .await;

    assert!(matches!(result, Err(WikiError::RootUnavailable { .. })));
    assert!(!output.exists());
}
