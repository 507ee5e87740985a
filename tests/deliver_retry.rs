// tests/deliver_retry.rs
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use feedwatch::error::PipelineError;
use feedwatch::ingest::fetcher::RetryPolicy;
use feedwatch::notify::webhook::{DeliveryTransport, PostStatus, WebhookNotifier};
use feedwatch::notify::{Digest, WebhookPayload};

fn digest() -> Digest {
    Digest {
        run_at: Utc::now(),
        fetched: 1,
        matched: 1,
        fresh: 1,
        keywords: vec!["rust".into()],
        items: vec![],
    }
}

fn policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_secs(2),
    }
}

/// Scripted sink: plays back a fixed sequence of outcomes.
struct ScriptedSink {
    script: Vec<PostStatus>,
    calls: Mutex<usize>,
}

impl ScriptedSink {
    fn new(script: Vec<PostStatus>) -> Self {
        Self {
            script,
            calls: Mutex::new(0),
        }
    }

    fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl DeliveryTransport for ScriptedSink {
    async fn post(&self, _payload: &WebhookPayload) -> PostStatus {
        let mut calls = self.calls.lock();
        let status = self.script[(*calls).min(self.script.len() - 1)].clone();
        *calls += 1;
        status
    }
}

#[tokio::test(start_paused = true)]
async fn rate_limit_hint_overrides_backoff() {
    let sink = Arc::new(ScriptedSink::new(vec![
        PostStatus::RateLimited {
            retry_after: Duration::from_secs(2),
        },
        PostStatus::RateLimited {
            retry_after: Duration::from_secs(2),
        },
        PostStatus::Delivered,
    ]));
    let notifier = WebhookNotifier::new(sink.clone(), policy());

    let start = tokio::time::Instant::now();
    notifier.deliver(&digest()).await.unwrap();

    assert_eq!(sink.calls(), 3);
    // waited the hinted 2s before attempt 2 and again before attempt 3
    assert_eq!(start.elapsed(), Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn plain_failures_back_off_linearly() {
    let sink = Arc::new(ScriptedSink::new(vec![
        PostStatus::Failed {
            message: "503".into(),
        },
        PostStatus::Failed {
            message: "503".into(),
        },
        PostStatus::Delivered,
    ]));
    let notifier = WebhookNotifier::new(sink.clone(), policy());

    let start = tokio::time::Instant::now();
    notifier.deliver(&digest()).await.unwrap();

    assert_eq!(sink.calls(), 3);
    // 1 * base after the first failure, 2 * base after the second
    assert_eq!(start.elapsed(), Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn exhausted_attempts_fail_the_delivery() {
    let sink = Arc::new(ScriptedSink::new(vec![PostStatus::Failed {
        message: "sink down".into(),
    }]));
    let notifier = WebhookNotifier::new(sink.clone(), policy());

    let err = notifier.deliver(&digest()).await.unwrap_err();
    assert_eq!(sink.calls(), 3);
    assert!(matches!(err, PipelineError::Delivery(_)));
    assert!(err.to_string().contains("sink down"));
}

#[tokio::test]
async fn notice_failures_are_swallowed() {
    let sink = Arc::new(ScriptedSink::new(vec![PostStatus::Failed {
        message: "sink down".into(),
    }]));
    let notifier = WebhookNotifier::new(sink.clone(), policy());

    // must not panic or error; one attempt only, no retries for notices
    notifier.deliver_notice("pipeline failed").await;
    assert_eq!(sink.calls(), 1);
}
