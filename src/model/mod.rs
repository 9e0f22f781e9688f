//! Core content model
//!
//! Everything the crawler, converter and projector operate on lives here.
//! API payloads are turned into these closed types at the boundary
//! (`source::wire`), so nothing past that point inspects raw JSON.

mod block;
mod cell;
mod node;
mod rich_text;

pub use block::{child_references, Block, BlockKind};
pub use cell::{CellValue, Column, DateValue, IsoDate};
pub use node::{ContentGraph, Node, NodeKind, NodeStatus};
pub use rich_text::{LinkTarget, RichText, Span, Style};

/// Opaque Notion identifier in its normalized form (32 lower-case hex chars)
pub type NodeId = String;

/// Normalizes a Notion ID to its compact lower-case form
///
/// The API returns dashed UUIDs while URLs embed the compact form; both map to
/// the same key here. Returns `None` when the input is not a Notion ID.
///
/// # Example
///
/// ```
/// use notion_wiki::normalize_id;
///
/// assert_eq!(
///     normalize_id("1A2B3C4D-0000-4000-8000-00000000000F").as_deref(),
///     Some("1a2b3c4d00004000800000000000000f")
/// );
/// assert_eq!(normalize_id("not-an-id"), None);
/// ```
pub fn normalize_id(raw: &str) -> Option<NodeId> {
    let trimmed = raw.trim();
    let dashed = trimmed.len() == 36
        && trimmed
            .char_indices()
            .all(|(i, c)| matches!(i, 8 | 13 | 18 | 23) == (c == '-'));
    if trimmed.len() != 32 && !dashed {
        return None;
    }

    let compact: String = trimmed
        .chars()
        .filter(|c| *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect();

    if compact.len() == 32 && compact.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(compact)
    } else {
        None
    }
}

/// Returns true if the string is a Notion ID in dashed or compact form
pub fn is_valid_id(raw: &str) -> bool {
    normalize_id(raw).is_some()
}
