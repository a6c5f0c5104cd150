//! Append-only decision journal.
//!
//! Writes structured JSON entries, one per line. Each append opens the file
//! in append mode, issues a single write of the full line, and drops the
//! handle, so concurrent writers never interleave partial lines and no
//! descriptor outlives the write.
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error};

use super::record::DecisionRecord;
use super::tier::ValidationTier;
use super::AuditError;

/// JSON Lines journal keyed by a writable path.
#[derive(Debug, Clone)]
pub struct DecisionJournal {
    path: PathBuf,
}

impl DecisionJournal {
    /// Create a journal targeting `path`. Nothing is touched until the first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Target file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append the record's canonical form as one line.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Io`] when the directory or file cannot be written.
    pub fn log(&self, record: &DecisionRecord) -> Result<(), AuditError> {
        append_json_line(&self.path, record)?;
        debug!(
            task_id = record.task_id(),
            action_type = record.action_type(),
            path = %self.path.display(),
            "decision journaled"
        );
        Ok(())
    }

    /// Read every entry back, skipping lines that are not valid JSON.
    ///
    /// A journal that does not exist yet is empty.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Io`] when the file exists but cannot be read.
    pub fn entries(&self) -> Result<Vec<serde_json::Value>, AuditError> {
        let file = match std::fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut entries = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(value) => entries.push(value),
                Err(e) => debug!(error = %e, "skipping malformed journal line"),
            }
        }
        Ok(entries)
    }

    /// Number of non-empty lines, without decoding them.
    ///
    /// A journal that does not exist yet has no lines.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Io`] when the file exists but cannot be read.
    pub fn count(&self) -> Result<usize, AuditError> {
        let file = match std::fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let mut count: usize = 0;
        for line in BufReader::new(file).lines() {
            if !line?.trim().is_empty() {
                count = count.saturating_add(1);
            }
        }
        Ok(count)
    }
}

/// Minimal self-contained entry written when the primary journal is unusable.
#[derive(Debug, Clone, Serialize)]
pub struct LastResortEntry {
    /// Caller-assigned task id.
    pub task_id: String,
    /// Execution lane.
    pub lane: String,
    /// Action type string.
    pub action_type: String,
    /// Expected outcome text.
    pub expected_outcome: String,
    /// Prior confidence.
    pub confidence_pre: f64,
    /// Tier, when the action itself succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_tier: Option<ValidationTier>,
    /// Operation error, when the action failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Why the primary journal could not be used.
    pub audit_error: String,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
}

/// Write a last-resort entry to `path`, never failing.
///
/// Returns `true` when the entry reached disk.
pub fn write_last_resort(path: &Path, entry: &LastResortEntry) -> bool {
    match append_json_line(path, entry) {
        Ok(()) => true,
        Err(e) => {
            error!(
                task_id = %entry.task_id,
                action_type = %entry.action_type,
                path = %path.display(),
                error = %e,
                "last-resort audit write failed; decision not recorded"
            );
            false
        }
    }
}

/// Serialize `value` and append it plus a newline in a single write.
fn append_json_line(path: &Path, value: &impl Serialize) -> Result<(), AuditError> {
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    file.write_all(&line)?;
    file.flush()?;
    Ok(())
}
