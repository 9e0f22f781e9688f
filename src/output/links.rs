//! Link resolution against the frozen path table
//!
//! Runs once every document has been converted. Each pending link reference
//! becomes a relative path from its document to the target file, or a broken
//! link when the target has no file.

use crate::crawler::{relative_path, IdPathTable};
use crate::model::NodeId;
use crate::output::document::{Document, LinkState};

/// A link whose target has no output file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokenLink {
    /// Path of the referencing document
    pub document: String,
    pub target: NodeId,
    pub text: String,
}

/// Outcome of a resolution pass
#[derive(Debug, Clone, Default)]
pub struct ResolveReport {
    pub resolved: usize,
    pub broken: Vec<BrokenLink>,
}

/// Resolves every pending link of every document
///
/// Links with empty display text take the target's title from the table, or
/// the target ID when the target is unknown. Already resolved links are left
/// alone, so running the pass twice changes nothing.
pub fn resolve(documents: &mut [Document], table: &IdPathTable) -> ResolveReport {
    let mut report = ResolveReport::default();

    for doc in documents.iter_mut() {
        for link in doc.links.iter_mut() {
            if link.state != LinkState::Pending {
                continue;
            }

            match table.get(&link.target) {
                Some(entry) => {
                    if link.text.is_empty() {
                        link.text = entry.title.clone();
                    }
                    link.state = LinkState::Resolved(relative_path(&doc.path, &entry.path));
                    report.resolved += 1;
                }
                None => {
                    if link.text.is_empty() {
                        link.text = link.target.clone();
                    }
                    tracing::warn!(
                        "Broken link in {}: \"{}\" points to {}, which has no output file",
                        doc.path,
                        link.text,
                        link.target
                    );
                    link.state = LinkState::Broken;
                    report.broken.push(BrokenLink {
                        document: doc.path.clone(),
                        target: link.target.clone(),
                        text: link.text.clone(),
                    });
                }
            }
        }
    }

    tracing::debug!(
        "Resolved {} links, {} broken",
        report.resolved,
        report.broken.len()
    );
    report
}
