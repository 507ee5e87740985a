// src/ingest/types.rs
use chrono::{DateTime, Utc};

/// One normalized content record from a feed. Immutable after construction;
/// `id` is derived from `(url, title)` and nothing else.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct Item {
    pub id: String,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub body: Option<String>,
    pub published_at: DateTime<Utc>,
    pub source_name: String,
}

impl Item {
    pub fn new(
        title: String,
        url: String,
        description: Option<String>,
        body: Option<String>,
        published_at: DateTime<Utc>,
        source_name: String,
    ) -> Self {
        let id = item_id(&url, &title);
        Self {
            id,
            title,
            url,
            description,
            body,
            published_at,
            source_name,
        }
    }
}

/// Stable item identity: SHA-256 over the url bytes followed by the title
/// bytes, no separator, full digest as lowercase hex.
///
/// Persisted seen-sets depend on this exact scheme. Do not change it.
pub fn item_id(url: &str, title: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hasher.update(title.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
