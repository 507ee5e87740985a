// src/store/json.rs
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

use super::{SeenRecord, SeenStore};

#[derive(Debug, Default, Serialize, Deserialize)]
struct SeenFile {
    items: Vec<SeenRecord>,
}

/// Seen-set persisted as a single JSON file (`{"items": [...]}`).
///
/// No cross-process locking: two overlapping runs can race on
/// load-merge-append. The deployment must guarantee single-run-at-a-time
/// execution.
pub struct JsonSeenStore {
    path: PathBuf,
}

impl JsonSeenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_file(&self) -> Result<SeenFile> {
        if !self.path.exists() {
            return Ok(SeenFile::default());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("reading seen-set from {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("parsing seen-set from {}", self.path.display()))
    }

    fn write_file(&self, file: &SeenFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        let content = serde_json::to_string_pretty(file).context("serializing seen-set")?;
        fs::write(&self.path, content)
            .with_context(|| format!("writing seen-set to {}", self.path.display()))
    }
}

#[async_trait::async_trait]
impl SeenStore for JsonSeenStore {
    async fn load_all(&self) -> Result<Vec<SeenRecord>> {
        let file = self.read_file()?;
        debug!(count = file.items.len(), path = %self.path.display(), "seen-set loaded");
        Ok(file.items)
    }

    async fn append_new(&self, records: &[SeenRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut file = self.read_file()?;
        let present: HashSet<&str> = file.items.iter().map(|r| r.id.as_str()).collect();
        let fresh: Vec<SeenRecord> = records
            .iter()
            .filter(|r| !present.contains(r.id.as_str()))
            .cloned()
            .collect();
        if fresh.is_empty() {
            return Ok(());
        }
        debug!(appended = fresh.len(), "seen-set append");
        file.items.extend(fresh);
        self.write_file(&file)
    }

    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut file = self.read_file()?;
        let before = file.items.len();
        file.items.retain(|r| r.published_at >= cutoff);
        let removed = before - file.items.len();
        if removed > 0 {
            self.write_file(&file)?;
        }
        debug!(removed, "seen-set prune");
        Ok(removed)
    }
}
