// src/ingest/fetcher.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::config::{FetchConfig, Source};
use crate::error::PipelineError;
use crate::ingest::feed;
use crate::ingest::types::Item;

/// Linear backoff: wait `attempt * base_delay` after the attempt-th failure
/// (attempt is 1-indexed).
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl From<&FetchConfig> for RetryPolicy {
    fn from(cfg: &FetchConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts,
            base_delay: Duration::from_secs(cfg.base_delay_secs),
        }
    }
}

/// Transport seam for feed retrieval. Production goes through reqwest;
/// tests plug in stubs.
#[async_trait]
pub trait FeedTransport: Send + Sync {
    async fn get_text(&self, url: &str) -> Result<String>;
}

pub struct HttpFeedTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFeedTransport {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

#[async_trait]
impl FeedTransport for HttpFeedTransport {
    async fn get_text(&self, url: &str) -> Result<String> {
        let rsp = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .context("feed http get")?;
        let rsp = rsp.error_for_status().context("feed http status")?;
        rsp.text().await.context("feed http body")
    }
}

/// Retrieves and normalizes one source per call, with retry. A source that
/// exhausts its budget fails with `PipelineError::Fetch` — fatal for this
/// source only; the coordinator absorbs it.
pub struct SourceFetcher {
    transport: Arc<dyn FeedTransport>,
    retry: RetryPolicy,
}

impl SourceFetcher {
    pub fn new(transport: Arc<dyn FeedTransport>, retry: RetryPolicy) -> Self {
        Self { transport, retry }
    }

    pub async fn fetch(&self, source: &Source) -> Result<Vec<Item>, PipelineError> {
        let mut last_err: Option<anyhow::Error> = None;
        for attempt in 1..=self.retry.max_attempts {
            counter!("ingest_fetch_attempts_total").increment(1);
            match self.attempt(source).await {
                Ok(items) => return Ok(items),
                Err(e) => {
                    warn!(source = %source.name, attempt, error = ?e, "fetch attempt failed");
                    last_err = Some(e);
                    if attempt < self.retry.max_attempts {
                        tokio::time::sleep(self.retry.backoff_after(attempt)).await;
                    }
                }
            }
        }
        counter!("ingest_provider_errors_total").increment(1);
        Err(PipelineError::Fetch {
            source: source.name.clone(),
            attempts: self.retry.max_attempts,
            message: last_err
                .map(|e| format!("{e:#}"))
                .unwrap_or_else(|| "unknown".into()),
        })
    }

    async fn attempt(&self, source: &Source) -> Result<Vec<Item>> {
        let body = self.transport.get_text(&source.url).await?;
        feed::parse_feed(source.kind, &body, &source.name)
    }
}
