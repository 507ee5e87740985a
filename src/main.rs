//! Feedwatch — Binary Entrypoint
//! Loads configuration, wires the pipeline, and runs once or on a loop.

use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use feedwatch::config::AppConfig;
use feedwatch::ingest::fetcher::{HttpFeedTransport, RetryPolicy, SourceFetcher};
use feedwatch::ingest::FetchCoordinator;
use feedwatch::notify::webhook::WebhookNotifier;
use feedwatch::notify::LangPolicy;
use feedwatch::pipeline::Pipeline;
use feedwatch::scheduler::{spawn_watch_loop, WatchSchedulerCfg};
use feedwatch::store::JsonSeenStore;
use feedwatch::PipelineError;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

fn build_pipeline(cfg: &AppConfig) -> Result<Pipeline, PipelineError> {
    let transport = Arc::new(HttpFeedTransport::new(Duration::from_secs(
        cfg.fetch.timeout_secs,
    )));
    let fetcher = SourceFetcher::new(transport, RetryPolicy::from(&cfg.fetch));
    let coordinator = FetchCoordinator::new(fetcher);

    let webhook_url = cfg
        .delivery
        .webhook_url
        .clone()
        .ok_or_else(|| PipelineError::Config("webhook url missing after validation".into()))?;
    let notifier = WebhookNotifier::from_config(&cfg.delivery, webhook_url).with_lang_policy(
        LangPolicy {
            translate_threshold: cfg.lang.translate_threshold,
        },
    );

    let store = Arc::new(JsonSeenStore::new(cfg.store.path.clone()));
    Ok(Pipeline::new(
        coordinator,
        notifier,
        store,
        cfg.store.retention_days,
    ))
}

async fn run() -> Result<(), PipelineError> {
    let cfg = AppConfig::load()?;
    let pipeline = Arc::new(build_pipeline(&cfg)?);
    let spec = cfg.match_spec();
    let opts = cfg.run_options();
    let sources = cfg.sources.clone();

    match cfg.run.interval_secs {
        Some(secs) if secs > 0 => {
            tracing::info!(
                interval_secs = secs,
                sources = sources.len(),
                "starting watch loop"
            );
            let handle = spawn_watch_loop(
                WatchSchedulerCfg {
                    interval_secs: secs,
                },
                pipeline,
                sources,
                spec,
                opts,
            );
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "watch loop task aborted");
            }
        }
        _ => {
            let report = pipeline.run(&sources, &spec, &opts).await?;
            tracing::info!(
                fetched = report.fetched,
                matched = report.matched,
                fresh = report.fresh,
                delivered = report.delivered,
                pruned = report.pruned,
                "run complete"
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "fatal");
        eprintln!("feedwatch: {e}");
        std::process::exit(1);
    }
}
