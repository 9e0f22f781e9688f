//! Writes rendered documents below the output directory

use crate::output::document::Document;
use crate::WikiError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A document that could not be written
#[derive(Debug)]
pub struct WriteFailure {
    pub path: PathBuf,
    pub error: io::Error,
}

/// Outcome of writing a document set
#[derive(Debug, Default)]
pub struct WriteReport {
    /// Files created or replaced
    pub written: usize,

    /// Files already byte-identical on disk
    pub unchanged: usize,
    pub failed: Vec<WriteFailure>,
}

/// Writes every document to `<output_dir>/<document path>`
///
/// Files whose content is already identical are not touched. A file that
/// cannot be written is recorded in the report and the remaining documents
/// are still written.
///
/// # Returns
///
/// * `Ok(WriteReport)` - All documents were attempted
/// * `Err(WikiError::OutputDir)` - The output directory could not be created
pub fn write_documents(output_dir: &Path, documents: &[Document]) -> Result<WriteReport, WikiError> {
    fs::create_dir_all(output_dir).map_err(|source| WikiError::OutputDir {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let mut report = WriteReport::default();
    for doc in documents {
        let path = output_dir.join(&doc.path);
        let content = doc.render();

        match write_if_changed(&path, content.as_bytes()) {
            Ok(true) => {
                tracing::debug!("Wrote {}", path.display());
                report.written += 1;
            }
            Ok(false) => report.unchanged += 1,
            Err(error) => {
                tracing::warn!("Failed to write {}: {}", path.display(), error);
                report.failed.push(WriteFailure { path, error });
            }
        }
    }

    Ok(report)
}

/// Returns false if the file already holds exactly `content`
fn write_if_changed(path: &Path, content: &[u8]) -> io::Result<bool> {
    if let Ok(existing) = fs::read(path) {
        if existing == content {
            return Ok(false);
        }
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(true)
}
