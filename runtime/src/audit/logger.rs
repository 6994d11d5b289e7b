//! JSONL review queue: append-only record of what needs operator follow-up.
//!
//! - One JSON object per line, tagged by `event`
//! - Rotation when the file exceeds the size cap (default 50MB)
//! - Rotated files named `.1`, `.2`, etc. (max 5 rotations)

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::resolver::{AcquisitionFailure, Document, DocumentOrigin};
use zoneatlas::{AttemptOutcome, CanonicalizeError};

/// Default size cap before rotation (50 MB).
pub const DEFAULT_MAX_SIZE: u64 = 50 * 1024 * 1024;

/// Maximum number of rotated files to keep.
const MAX_ROTATIONS: u32 = 5;

/// What happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReviewKind {
    /// A ladder returned a document.
    AcquisitionOutcome {
        origin: DocumentOrigin,
        attempts: usize,
        stale: bool,
    },
    /// A ladder was exhausted; the source needs manual or PDF retrieval.
    AcquisitionFailure {
        attempts: usize,
        last_outcome: Option<AttemptOutcome>,
        errors: Vec<String>,
    },
    /// A fragment could not be canonicalized.
    MalformedFragment { reason: String },
}

/// A single review-queue line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewEvent {
    pub timestamp: DateTime<Utc>,
    pub run_id: String,
    pub jurisdiction: String,
    #[serde(flatten)]
    pub kind: ReviewKind,
}

/// Append-only JSONL review queue with rotation.
pub struct ReviewQueue {
    file: File,
    path: PathBuf,
    run_id: String,
    max_size: u64,
    /// Approximate current size (re-read on open).
    current_size: u64,
}

impl ReviewQueue {
    /// Open or create the queue file; every event carries a fresh run id.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open review queue: {}", path.display()))?;

        let current_size = file.metadata().map(|m| m.len()).unwrap_or(0);

        Ok(Self {
            file,
            path: path.to_path_buf(),
            run_id: uuid::Uuid::new_v4().to_string(),
            max_size: DEFAULT_MAX_SIZE,
            current_size,
        })
    }

    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an event.
    pub fn log(&mut self, jurisdiction: &str, kind: ReviewKind) -> Result<()> {
        if self.current_size >= self.max_size {
            self.rotate()?;
        }

        let event = ReviewEvent {
            timestamp: Utc::now(),
            run_id: self.run_id.clone(),
            jurisdiction: jurisdiction.to_string(),
            kind,
        };
        let json = serde_json::to_string(&event)?;
        writeln!(self.file, "{json}").context("failed to append review event")?;
        self.current_size += json.len() as u64 + 1;
        Ok(())
    }

    pub fn record_document(&mut self, doc: &Document) -> Result<()> {
        self.log(
            &doc.jurisdiction_id,
            ReviewKind::AcquisitionOutcome {
                origin: doc.origin,
                attempts: doc.attempts.len(),
                stale: doc.is_stale(),
            },
        )
    }

    pub fn record_failure(&mut self, failure: &AcquisitionFailure) -> Result<()> {
        self.log(
            &failure.jurisdiction,
            ReviewKind::AcquisitionFailure {
                attempts: failure.attempts.len(),
                last_outcome: failure.last_outcome,
                errors: failure
                    .attempts
                    .iter()
                    .filter_map(|a| a.error.as_ref().map(|e| format!("{}: {e}", a.strategy)))
                    .collect(),
            },
        )
    }

    pub fn record_rejects(&mut self, rejects: &[CanonicalizeError]) -> Result<()> {
        for reject in rejects {
            let CanonicalizeError::MalformedFragment {
                jurisdiction,
                reason,
            } = reject;
            self.log(
                jurisdiction,
                ReviewKind::MalformedFragment {
                    reason: reason.clone(),
                },
            )?;
        }
        Ok(())
    }

    /// Rotate: review.jsonl → review.jsonl.1, .1 → .2, etc.
    fn rotate(&mut self) -> Result<()> {
        self.file.flush()?;

        for i in (1..MAX_ROTATIONS).rev() {
            let from = rotation_path(&self.path, i);
            let to = rotation_path(&self.path, i + 1);
            if from.exists() {
                let _ = std::fs::rename(&from, &to);
            }
        }
        let _ = std::fs::rename(&self.path, rotation_path(&self.path, 1));

        self.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .context("failed to reopen review queue after rotation")?;
        self.current_size = 0;
        tracing::debug!("rotated review queue {}", self.path.display());
        Ok(())
    }
}

/// Path of a rotated file: `review.jsonl.1`, `review.jsonl.2`, etc.
pub fn rotation_path(base: &Path, index: u32) -> PathBuf {
    let name = format!(
        "{}.{index}",
        base.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("review.jsonl")
    );
    base.with_file_name(name)
}

/// Read all events from a queue file, skipping unparseable lines.
pub fn read_events(path: &Path) -> Result<Vec<ReviewEvent>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read review queue: {}", path.display()))?;
    Ok(content
        .lines()
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::AcquisitionAttempt;
    use zoneatlas::ProviderKind;

    fn failure() -> AcquisitionFailure {
        AcquisitionFailure {
            jurisdiction: "orange-county-fl".to_string(),
            last_outcome: Some(AttemptOutcome::Blocked),
            attempts: vec![AcquisitionAttempt {
                strategy: "http:static".to_string(),
                provider: Some(ProviderKind::Http),
                outcome: AttemptOutcome::Error,
                wait_ms: 0,
                timeout_ms: 20_000,
                escalated: false,
                length: 0,
                markers: Vec::new(),
                error: Some("HTTP 503".to_string()),
                elapsed_ms: 12,
            }],
        }
    }

    #[test]
    fn test_events_are_appended_as_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("review.jsonl");
        let mut queue = ReviewQueue::open(&path).unwrap();

        queue.record_failure(&failure()).unwrap();
        queue
            .record_rejects(&[CanonicalizeError::MalformedFragment {
                jurisdiction: "orange-county-fl".to_string(),
                reason: "table names unknown district R-9Z".to_string(),
            }])
            .unwrap();

        let events = read_events(&path).unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.run_id == queue.run_id()));
        match &events[0].kind {
            ReviewKind::AcquisitionFailure { errors, last_outcome, .. } => {
                assert_eq!(errors, &vec!["http:static: HTTP 503".to_string()]);
                assert_eq!(*last_outcome, Some(AttemptOutcome::Blocked));
            }
            other => panic!("unexpected event {other:?}"),
        }

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.lines().next().unwrap().contains("\"event\":\"acquisition_failure\""));
    }

    #[test]
    fn test_rotation_at_size_cap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("review.jsonl");
        let mut queue = ReviewQueue::open(&path).unwrap().with_max_size(64);

        queue.record_failure(&failure()).unwrap();
        queue.record_failure(&failure()).unwrap();

        assert!(rotation_path(&path, 1).exists());
        assert_eq!(read_events(&path).unwrap().len(), 1);
        assert_eq!(read_events(&rotation_path(&path, 1)).unwrap().len(), 1);
    }
}
