// src/store/mod.rs
pub mod json;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ingest::types::Item;

pub use json::JsonSeenStore;

/// One persisted identity record. Only the identity-bearing subset of an
/// item survives the run; `published_at` exists to support age pruning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SeenRecord {
    pub id: String,
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub published_at: DateTime<Utc>,
    pub source_name: String,
}

impl From<&Item> for SeenRecord {
    fn from(item: &Item) -> Self {
        Self {
            id: item.id.clone(),
            title: item.title.clone(),
            url: item.url.clone(),
            description: item.description.clone(),
            published_at: item.published_at,
            source_name: item.source_name.clone(),
        }
    }
}

/// Persistence boundary for previously delivered item identities. The
/// pipeline reads the full set once per run and appends once at the end.
#[async_trait::async_trait]
pub trait SeenStore: Send + Sync {
    async fn load_all(&self) -> Result<Vec<SeenRecord>>;

    /// Idempotent under id: appending an id already present is a no-op.
    async fn append_new(&self, records: &[SeenRecord]) -> Result<()>;

    /// Remove records strictly older than `cutoff`; returns how many went.
    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}
