//! Run summary and its console report
//!
//! Everything that went wrong without aborting the run (skipped nodes, broken
//! links, files that could not be written) ends up here and is printed once
//! the run is over.

use crate::crawler::{CrawlStats, NodeFailure};
use crate::output::links::BrokenLink;
use crate::output::writer::WriteFailure;
use std::time::Duration;

/// Outcome of a complete run
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Nodes discovered during the crawl, failed ones included
    pub nodes_discovered: usize,

    /// Documents produced by conversion
    pub documents: usize,

    /// Files created or replaced
    pub files_written: usize,

    /// Files left untouched because their content did not change
    pub files_unchanged: usize,

    pub links_resolved: usize,

    pub crawl: CrawlStats,

    /// Nodes skipped because their content could not be fetched
    pub failures: Vec<NodeFailure>,

    pub broken_links: Vec<BrokenLink>,

    pub write_failures: Vec<WriteFailure>,

    pub duration: Duration,
}

impl RunSummary {
    /// Percentage of discovered nodes that made it into the output
    pub fn success_rate(&self) -> f64 {
        if self.nodes_discovered == 0 {
            return 0.0;
        }
        let converted = self.nodes_discovered.saturating_sub(self.failures.len());
        (converted as f64 / self.nodes_discovered as f64) * 100.0
    }

    /// Percentage of fetches served from the cache
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.crawl.cache_hits + self.crawl.remote_calls;
        if total == 0 {
            return 0.0;
        }
        (self.crawl.cache_hits as f64 / total as f64) * 100.0
    }

    /// True if nothing was skipped, broken or left unwritten
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.broken_links.is_empty() && self.write_failures.is_empty()
    }
}

/// Prints the summary to stdout in a formatted manner
pub fn print_summary(summary: &RunSummary) {
    println!("=== Notion-Wiki Summary ===\n");

    println!("Overview:");
    println!("  Nodes discovered: {}", summary.nodes_discovered);
    println!("  Documents generated: {}", summary.documents);
    println!(
        "  Files written: {} ({} unchanged)",
        summary.files_written, summary.files_unchanged
    );
    println!("  Links resolved: {}", summary.links_resolved);
    println!("  Duration: {:.1}s", summary.duration.as_secs_f64());
    println!();

    println!("Fetching:");
    println!("  Crawl levels: {}", summary.crawl.levels);
    println!("  Remote calls: {}", summary.crawl.remote_calls);
    println!(
        "  Cache hits: {} ({:.1}%)",
        summary.crawl.cache_hits,
        summary.cache_hit_rate()
    );
    println!();

    if !summary.failures.is_empty() {
        println!("Skipped Nodes ({}):", summary.failures.len());
        for failure in &summary.failures {
            let kind = if failure.not_found {
                "not found"
            } else {
                "failed"
            };
            println!(
                "  - {} ({}) {}: {}",
                failure.title, failure.id, kind, failure.reason
            );
        }
        println!();
    }

    if !summary.broken_links.is_empty() {
        println!("Broken Links ({}):", summary.broken_links.len());
        for link in &summary.broken_links {
            println!("  - {}: \"{}\" -> {}", link.document, link.text, link.target);
        }
        println!();
    }

    if !summary.write_failures.is_empty() {
        println!("Write Failures ({}):", summary.write_failures.len());
        for failure in &summary.write_failures {
            println!("  - {}: {}", failure.path.display(), failure.error);
        }
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} / {} nodes converted)",
        summary.success_rate(),
        summary.nodes_discovered.saturating_sub(summary.failures.len()),
        summary.nodes_discovered
    );
}
