// src/pipeline.rs
//! Run orchestration: fetch, filter, dedupe, rank, deliver, persist, prune.
//!
//! Containment policy: per-source fetch failures and malformed records are
//! absorbed upstream; a failed seen-set *load* or an exhausted delivery
//! aborts the run; failed append/prune after a successful delivery does not
//! (the items may simply be redelivered next run).

use chrono::{Duration as ChronoDuration, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Source;
use crate::dedup;
use crate::error::PipelineError;
use crate::filter::{self, MatchSpec};
use crate::ingest::FetchCoordinator;
use crate::notify::webhook::WebhookNotifier;
use crate::notify::Digest;
use crate::rank;
use crate::store::{SeenRecord, SeenStore};

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub skip_deliver_if_empty: bool,
    pub max_items: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            skip_deliver_if_empty: false,
            max_items: 9,
        }
    }
}

/// Per-stage counts for one completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub fetched: usize,
    pub matched: usize,
    pub fresh: usize,
    pub delivered: usize,
    pub pruned: usize,
}

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("watch_runs_total", "Pipeline runs started.");
        describe_counter!("watch_delivered_total", "Items delivered to the sink.");
        describe_counter!("watch_pruned_total", "Seen-set records pruned by age.");
        describe_gauge!("watch_last_run_ts", "Unix ts when a run last completed.");
    });
}

pub struct Pipeline {
    coordinator: FetchCoordinator,
    notifier: WebhookNotifier,
    store: Arc<dyn SeenStore>,
    retention: ChronoDuration,
}

impl Pipeline {
    pub fn new(
        coordinator: FetchCoordinator,
        notifier: WebhookNotifier,
        store: Arc<dyn SeenStore>,
        retention_days: u32,
    ) -> Self {
        Self {
            coordinator,
            notifier,
            store,
            retention: ChronoDuration::days(i64::from(retention_days)),
        }
    }

    pub async fn run(
        &self,
        sources: &[Source],
        spec: &MatchSpec,
        opts: &RunOptions,
    ) -> Result<RunReport, PipelineError> {
        ensure_metrics_described();
        counter!("watch_runs_total").increment(1);

        // Without the seen-set snapshot, dedupe is unsafe; bail out early.
        let seen = self
            .store
            .load_all()
            .await
            .map_err(|e| PipelineError::Storage(format!("loading seen-set: {e:#}")))?;
        let seen_ids: HashSet<String> = seen.into_iter().map(|r| r.id).collect();

        let outcome = self.coordinator.fetch_all(sources).await;
        if outcome.all_failed() {
            return Err(PipelineError::AllSourcesFailed(outcome.attempted));
        }
        let fetched = outcome.items.len();

        let matched_items = filter::filter(outcome.items, spec);
        let matched = matched_items.len();
        let fresh_items = dedup::exclude(matched_items, &seen_ids);
        let fresh = fresh_items.len();
        let deliverable = rank::limit(rank::rank(fresh_items), opts.max_items);

        info!(
            fetched,
            matched,
            fresh,
            deliverable = deliverable.len(),
            "pipeline stages complete"
        );

        if deliverable.is_empty() && opts.skip_deliver_if_empty {
            info!("nothing new and skip-if-empty set, run done");
            gauge!("watch_last_run_ts").set(Utc::now().timestamp() as f64);
            return Ok(RunReport {
                fetched,
                matched,
                fresh,
                delivered: 0,
                pruned: 0,
            });
        }

        let digest = Digest {
            run_at: Utc::now(),
            fetched,
            matched,
            fresh,
            keywords: spec.keywords.clone(),
            items: deliverable,
        };
        if let Err(err) = self.notifier.deliver(&digest).await {
            self.notifier
                .deliver_notice(&format!("feedwatch: run aborted, {err}"))
                .await;
            return Err(err);
        }
        let delivered = digest.items.len();
        counter!("watch_delivered_total").increment(delivered as u64);

        // The run already succeeded; from here failures only mean stale
        // bookkeeping and possible redelivery next run.
        let records: Vec<SeenRecord> = digest.items.iter().map(SeenRecord::from).collect();
        if let Err(e) = self.store.append_new(&records).await {
            warn!(error = ?e, "seen-set append failed");
        }
        let cutoff = Utc::now() - self.retention;
        let pruned = match self.store.prune_older_than(cutoff).await {
            Ok(n) => n,
            Err(e) => {
                warn!(error = ?e, "seen-set prune failed");
                0
            }
        };
        counter!("watch_pruned_total").increment(pruned as u64);
        gauge!("watch_last_run_ts").set(Utc::now().timestamp() as f64);

        Ok(RunReport {
            fetched,
            matched,
            fresh,
            delivered,
            pruned,
        })
    }
}
