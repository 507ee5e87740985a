// src/ingest/mod.rs
pub mod feed;
pub mod fetcher;
pub mod types;

use metrics::{counter, describe_counter, describe_histogram};
use once_cell::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::config::Source;
use crate::ingest::fetcher::SourceFetcher;
use crate::ingest::types::Item;

/// One-time metrics registration (so series show up on any installed recorder).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_events_total", "Records parsed from feeds.");
        describe_counter!(
            "ingest_kept_total",
            "Items surviving normalization across the whole batch."
        );
        describe_counter!(
            "ingest_parse_skips_total",
            "Records dropped for missing required fields."
        );
        describe_counter!("ingest_fetch_attempts_total", "Individual fetch attempts.");
        describe_counter!(
            "ingest_provider_errors_total",
            "Sources that exhausted their retry budget."
        );
        describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
    });
}

/// Normalize feed text: decode HTML entities, strip tags, normalize quote
/// characters, collapse whitespace. Capped at 1500 chars.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out = out.trim().to_string();

    if out.chars().count() > 1500 {
        out = out.chars().take(1500).collect();
    }

    out
}

/// Result of one fan-out: the merged batch plus enough bookkeeping to
/// recognize the degenerate everything-failed case.
#[derive(Debug)]
pub struct FetchOutcome {
    pub items: Vec<Item>,
    pub attempted: usize,
    pub failed: usize,
}

impl FetchOutcome {
    pub fn all_failed(&self) -> bool {
        self.attempted > 0 && self.failed == self.attempted
    }
}

/// Fans a batch of sources out to the fetcher concurrently and joins all
/// results. A source that exhausts its retries contributes nothing instead
/// of aborting the batch.
pub struct FetchCoordinator {
    fetcher: SourceFetcher,
}

impl FetchCoordinator {
    pub fn new(fetcher: SourceFetcher) -> Self {
        Self { fetcher }
    }

    /// Within one source, item order is whatever the feed returned; across
    /// sources no order is guaranteed.
    pub async fn fetch_all(&self, sources: &[Source]) -> FetchOutcome {
        ensure_metrics_described();

        let enabled: Vec<&Source> = sources.iter().filter(|s| s.enabled).collect();
        debug!(
            configured = sources.len(),
            enabled = enabled.len(),
            "starting fetch fan-out"
        );

        let fetches = enabled.iter().map(|s| self.fetcher.fetch(s));
        let results = futures::future::join_all(fetches).await;

        let mut items = Vec::new();
        let mut failed = 0usize;
        for (source, res) in enabled.iter().zip(results) {
            match res {
                Ok(mut v) => {
                    info!(source = %source.name, count = v.len(), "source fetched");
                    items.append(&mut v);
                }
                Err(e) => {
                    failed += 1;
                    warn!(source = %source.name, error = %e, "source dropped from batch");
                }
            }
        }

        counter!("ingest_kept_total").increment(items.len() as u64);
        FetchOutcome {
            items,
            attempted: enabled.len(),
            failed,
        }
    }
}
