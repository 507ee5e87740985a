// src/scheduler.rs
use metrics::counter;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::config::Source;
use crate::filter::MatchSpec;
use crate::pipeline::{Pipeline, RunOptions};

#[derive(Clone, Copy, Debug)]
pub struct WatchSchedulerCfg {
    pub interval_secs: u64,
}

/// Spawn the periodic watch loop. A fatal error inside a tick is logged and
/// the loop keeps going; the next tick retries from scratch.
pub fn spawn_watch_loop(
    cfg: WatchSchedulerCfg,
    pipeline: Arc<Pipeline>,
    sources: Vec<Source>,
    spec: MatchSpec,
    opts: RunOptions,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(cfg.interval_secs));
        loop {
            ticker.tick().await;
            counter!("watch_ticks_total").increment(1);
            match pipeline.run(&sources, &spec, &opts).await {
                Ok(report) => tracing::info!(
                    target: "watch",
                    fetched = report.fetched,
                    matched = report.matched,
                    fresh = report.fresh,
                    delivered = report.delivered,
                    pruned = report.pruned,
                    "watch tick"
                ),
                Err(e) => tracing::error!(target: "watch", error = %e, "watch tick failed"),
            }
        }
    })
}
