// src/notify/mod.rs
//! Delivery payloads and rendering for the webhook sink.

pub mod webhook;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::ingest::types::Item;

/// Sinks cap a message at ten blocks: one summary plus up to nine items.
pub const MAX_ITEM_BLOCKS: usize = 9;
const KEYWORD_DISPLAY_MAX: usize = 180;

/// What one pipeline run wants delivered.
#[derive(Debug, Clone)]
pub struct Digest {
    pub run_at: DateTime<Utc>,
    pub fetched: usize,
    pub matched: usize,
    pub fresh: usize,
    pub keywords: Vec<String>,
    pub items: Vec<Item>,
}

impl Digest {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Wire payload for the webhook sink.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WebhookPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Embed {
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl WebhookPayload {
    pub fn notice(message: &str) -> Self {
        Self {
            content: Some(message.to_string()),
            embeds: Vec::new(),
        }
    }
}

/// External translation hook. Rendering works without one; wiring one in
/// only augments titles the language policy flags.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str) -> anyhow::Result<String>;
}

/// Replaceable display policy, not a pipeline invariant: a title whose
/// alphabetic characters are mostly non-ASCII is offered for translation.
#[derive(Debug, Clone, Copy)]
pub struct LangPolicy {
    pub translate_threshold: f32,
}

impl Default for LangPolicy {
    fn default() -> Self {
        Self {
            translate_threshold: 0.5,
        }
    }
}

impl LangPolicy {
    /// Share of alphabetic characters that are ASCII; 1.0 when there is
    /// nothing alphabetic to judge.
    pub fn latin_ratio(text: &str) -> f32 {
        let mut alphabetic = 0usize;
        let mut ascii = 0usize;
        for c in text.chars() {
            if c.is_alphabetic() {
                alphabetic += 1;
                if c.is_ascii_alphabetic() {
                    ascii += 1;
                }
            }
        }
        if alphabetic == 0 {
            return 1.0;
        }
        ascii as f32 / alphabetic as f32
    }

    pub fn wants_translation(&self, text: &str) -> bool {
        Self::latin_ratio(text) < self.translate_threshold
    }
}

fn keyword_display(keywords: &[String]) -> String {
    let joined = keywords.join(", ");
    if joined.chars().count() <= KEYWORD_DISPLAY_MAX {
        return joined;
    }
    let mut out: String = joined.chars().take(KEYWORD_DISPLAY_MAX).collect();
    out.push('…');
    out
}

/// Render a digest into the webhook payload: one summary block, then up to
/// [`MAX_ITEM_BLOCKS`] item blocks. An empty digest renders an explicit
/// "no new items" message. Translation failures never fail rendering.
pub async fn render_digest(
    digest: &Digest,
    lang: &LangPolicy,
    translator: Option<&dyn Translator>,
) -> WebhookPayload {
    let summary_tail = format!(
        "{} fetched, {} matched, {} new\nKeywords: {}",
        digest.fetched,
        digest.matched,
        digest.fresh,
        keyword_display(&digest.keywords)
    );

    if digest.items.is_empty() {
        return WebhookPayload {
            content: None,
            embeds: vec![Embed {
                title: "No new items".to_string(),
                description: summary_tail,
                url: None,
                timestamp: Some(digest.run_at.to_rfc3339()),
            }],
        };
    }

    let shown = digest.items.len().min(MAX_ITEM_BLOCKS);
    let mut embeds = Vec::with_capacity(1 + shown);
    embeds.push(Embed {
        title: format!("{} new item(s)", digest.items.len()),
        description: summary_tail,
        url: None,
        timestamp: Some(digest.run_at.to_rfc3339()),
    });

    for item in digest.items.iter().take(MAX_ITEM_BLOCKS) {
        let mut title = item.title.clone();
        if let Some(tr) = translator {
            if lang.wants_translation(&item.title) {
                match tr.translate(&item.title).await {
                    Ok(t) if !t.trim().is_empty() => title = format!("{title} — {t}"),
                    Ok(_) => {}
                    Err(e) => tracing::debug!(error = ?e, "translation skipped"),
                }
            }
        }
        embeds.push(Embed {
            title,
            description: item.source_name.clone(),
            url: Some(item.url.clone()),
            timestamp: Some(item.published_at.to_rfc3339()),
        });
    }

    WebhookPayload {
        content: None,
        embeds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str, url: &str) -> Item {
        Item::new(
            title.to_string(),
            url.to_string(),
            None,
            None,
            Utc::now(),
            "src".into(),
        )
    }

    fn digest(items: Vec<Item>) -> Digest {
        Digest {
            run_at: Utc::now(),
            fetched: 20,
            matched: items.len(),
            fresh: items.len(),
            keywords: vec!["rust".into(), "go".into()],
            items,
        }
    }

    #[tokio::test]
    async fn empty_digest_renders_no_new_items_block() {
        let payload = render_digest(&digest(vec![]), &LangPolicy::default(), None).await;
        assert_eq!(payload.embeds.len(), 1);
        assert_eq!(payload.embeds[0].title, "No new items");
    }

    #[tokio::test]
    async fn item_blocks_are_capped_at_nine() {
        let items: Vec<Item> = (0..15)
            .map(|i| item(&format!("t{i}"), &format!("https://x.test/{i}")))
            .collect();
        let payload = render_digest(&digest(items), &LangPolicy::default(), None).await;
        assert_eq!(payload.embeds.len(), 1 + MAX_ITEM_BLOCKS);
        assert!(payload.embeds[0].title.starts_with("15 new"));
    }

    #[tokio::test]
    async fn item_block_carries_url_timestamp_and_source() {
        let payload = render_digest(
            &digest(vec![item("hello", "https://x.test/hello")]),
            &LangPolicy::default(),
            None,
        )
        .await;
        let block = &payload.embeds[1];
        assert_eq!(block.url.as_deref(), Some("https://x.test/hello"));
        assert_eq!(block.description, "src");
        assert!(block.timestamp.is_some());
    }

    #[test]
    fn keyword_display_is_bounded() {
        let many: Vec<String> = (0..100).map(|i| format!("keyword-{i}")).collect();
        let shown = keyword_display(&many);
        assert!(shown.chars().count() <= KEYWORD_DISPLAY_MAX + 1);
        assert!(shown.ends_with('…'));
    }

    #[test]
    fn latin_ratio_flags_non_ascii_titles() {
        assert_eq!(LangPolicy::latin_ratio("plain ascii"), 1.0);
        assert_eq!(LangPolicy::latin_ratio("1234 !!"), 1.0);
        let policy = LangPolicy::default();
        assert!(policy.wants_translation("Заседание совета директоров"));
        assert!(!policy.wants_translation("Fed meeting minutes"));
    }

    struct UpperTranslator;

    #[async_trait]
    impl Translator for UpperTranslator {
        async fn translate(&self, text: &str) -> anyhow::Result<String> {
            Ok(text.to_uppercase())
        }
    }

    #[tokio::test]
    async fn translator_augments_only_flagged_titles() {
        let items = vec![
            item("Čísla týdne šla nahoru", "https://x.test/cz"),
            item("Plain english", "https://x.test/en"),
        ];
        // Czech is latin-script, so force the policy to flag everything.
        let lang = LangPolicy {
            translate_threshold: 2.0,
        };
        let payload = render_digest(&digest(items), &lang, Some(&UpperTranslator)).await;
        assert!(payload.embeds[1].title.contains("ČÍSLA"));
        assert!(payload.embeds[2].title.contains("PLAIN ENGLISH"));
    }
}
