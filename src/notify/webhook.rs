// src/notify/webhook.rs
use async_trait::async_trait;
use metrics::counter;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{render_digest, Digest, LangPolicy, Translator, WebhookPayload};
use crate::config::DeliveryConfig;
use crate::error::PipelineError;
use crate::ingest::fetcher::RetryPolicy;

/// Wait this long on a 429 that carries no usable hint.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(5);

/// Outcome of a single webhook POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostStatus {
    Delivered,
    RateLimited { retry_after: Duration },
    Failed { message: String },
}

/// Transport seam for delivery. Production posts over reqwest; tests plug
/// in recording stubs.
#[async_trait]
pub trait DeliveryTransport: Send + Sync {
    async fn post(&self, payload: &WebhookPayload) -> PostStatus;
}

pub struct HttpWebhookTransport {
    url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpWebhookTransport {
    pub fn new(url: String, timeout: Duration) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

#[async_trait]
impl DeliveryTransport for HttpWebhookTransport {
    async fn post(&self, payload: &WebhookPayload) -> PostStatus {
        let res = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await;

        match res {
            Ok(rsp) => {
                if rsp.status() == StatusCode::TOO_MANY_REQUESTS {
                    let retry_after = match header_retry_after(&rsp) {
                        Some(d) => d,
                        None => body_retry_after(rsp).await.unwrap_or(DEFAULT_RETRY_AFTER),
                    };
                    return PostStatus::RateLimited { retry_after };
                }
                if let Err(e) = rsp.error_for_status_ref() {
                    return PostStatus::Failed {
                        message: format!("webhook HTTP error: {e}"),
                    };
                }
                PostStatus::Delivered
            }
            Err(e) => PostStatus::Failed {
                message: format!("webhook request failed: {e}"),
            },
        }
    }
}

fn header_retry_after(rsp: &reqwest::Response) -> Option<Duration> {
    rsp.headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(Duration::from_secs_f64)
}

// Discord-style rate limit bodies carry the hint as JSON seconds.
#[derive(serde::Deserialize)]
struct RateLimitBody {
    retry_after: f64,
}

async fn body_retry_after(rsp: reqwest::Response) -> Option<Duration> {
    rsp.json::<RateLimitBody>()
        .await
        .ok()
        .filter(|b| b.retry_after.is_finite() && b.retry_after >= 0.0)
        .map(|b| Duration::from_secs_f64(b.retry_after))
}

/// Posts a rendered digest to the sink with retry. A 429 hint overrides the
/// linear backoff: the client waits exactly as long as the sink asked.
pub struct WebhookNotifier {
    transport: Arc<dyn DeliveryTransport>,
    retry: RetryPolicy,
    lang: LangPolicy,
    translator: Option<Arc<dyn Translator>>,
}

impl WebhookNotifier {
    pub fn new(transport: Arc<dyn DeliveryTransport>, retry: RetryPolicy) -> Self {
        Self {
            transport,
            retry,
            lang: LangPolicy::default(),
            translator: None,
        }
    }

    pub fn from_config(cfg: &DeliveryConfig, webhook_url: String) -> Self {
        let transport = Arc::new(HttpWebhookTransport::new(
            webhook_url,
            Duration::from_secs(cfg.timeout_secs),
        ));
        Self::new(
            transport,
            RetryPolicy {
                max_attempts: cfg.max_attempts,
                base_delay: Duration::from_secs(cfg.base_delay_secs),
            },
        )
    }

    pub fn with_lang_policy(mut self, lang: LangPolicy) -> Self {
        self.lang = lang;
        self
    }

    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    /// Fatal for the run when the attempt budget is exhausted.
    pub async fn deliver(&self, digest: &Digest) -> Result<(), PipelineError> {
        let payload = render_digest(digest, &self.lang, self.translator.as_deref()).await;
        self.post_with_retry(&payload).await
    }

    async fn post_with_retry(&self, payload: &WebhookPayload) -> Result<(), PipelineError> {
        let mut last = String::from("no attempts made");
        for attempt in 1..=self.retry.max_attempts {
            counter!("deliver_attempts_total").increment(1);
            match self.transport.post(payload).await {
                PostStatus::Delivered => {
                    debug!(attempt, "payload delivered");
                    return Ok(());
                }
                PostStatus::RateLimited { retry_after } => {
                    warn!(
                        attempt,
                        wait_secs = retry_after.as_secs_f64(),
                        "delivery rate limited"
                    );
                    last = format!("rate limited (hinted wait {:.1}s)", retry_after.as_secs_f64());
                    if attempt < self.retry.max_attempts {
                        tokio::time::sleep(retry_after).await;
                    }
                }
                PostStatus::Failed { message } => {
                    warn!(attempt, error = message.as_str(), "delivery attempt failed");
                    last = message;
                    if attempt < self.retry.max_attempts {
                        tokio::time::sleep(self.retry.backoff_after(attempt)).await;
                    }
                }
            }
        }
        counter!("deliver_failures_total").increment(1);
        Err(PipelineError::Delivery(format!(
            "gave up after {} attempts: {last}",
            self.retry.max_attempts
        )))
    }

    /// Best-effort secondary notification. Failures are logged, never
    /// re-raised, so a broken error report cannot cascade.
    pub async fn deliver_notice(&self, message: &str) {
        let payload = WebhookPayload::notice(message);
        match self.transport.post(&payload).await {
            PostStatus::Delivered => {}
            PostStatus::RateLimited { .. } => warn!("notice dropped: rate limited"),
            PostStatus::Failed { message } => {
                warn!(error = message.as_str(), "notice dropped")
            }
        }
    }
}
