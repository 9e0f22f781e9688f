//! Output module for turning the crawled graph into Markdown files
//!
//! This module handles:
//! - Converting block trees into documents with deferred links
//! - Projecting databases and their records into tables
//! - Resolving internal links against the frozen path table
//! - Writing the files and summarizing the run

pub mod document;
mod links;
mod markdown;
pub mod stats;
mod table;
mod writer;

pub use document::{Document, Line, LinkReference, LinkState, BROKEN_LINK_MARKER};
pub use links::{resolve, BrokenLink, ResolveReport};
pub use markdown::{convert, render_blocks};
pub use stats::{print_summary, RunSummary};
pub use table::{
    build_reverse_references, project_record, project_table, render_cell, ReverseGroup,
    ReverseReference,
};
pub use writer::{write_documents, WriteFailure, WriteReport};

use crate::crawler::CrawlOutput;
use crate::model::NodeKind;

/// Converts every fetched node of a crawl into a document
///
/// Nodes are visited in discovery order: databases go through the table
/// projector, records through the record projector and everything else through
/// the block converter. Failed nodes produce no document.
pub fn build_documents(crawl: &CrawlOutput) -> Vec<Document> {
    let reverse = build_reverse_references(&crawl.graph);
    let no_blocks = Vec::new();
    let mut documents = Vec::with_capacity(crawl.table.len());

    for node in crawl.graph.iter() {
        if node.is_failed() || node.output_path.is_none() {
            continue;
        }
        let blocks = crawl.blocks.get(&node.id).unwrap_or(&no_blocks);

        let doc = if node.is_database {
            let records: Vec<_> = node
                .child_ids
                .iter()
                .filter_map(|id| crawl.graph.get(id))
                .filter(|child| child.kind == NodeKind::DatabaseRecord)
                .collect();
            project_table(node, &records)
        } else if node.kind == NodeKind::DatabaseRecord {
            let database = node.parent_id.as_deref().and_then(|id| crawl.graph.get(id));
            let groups = reverse.get(&node.id).map(Vec::as_slice).unwrap_or_default();
            project_record(node, database, blocks, groups)
        } else {
            convert(node, blocks)
        };

        tracing::debug!("Converted {} -> {}", node.id, doc.path);
        documents.push(doc);
    }

    documents
}
