// src/ingest/feed.rs
//! Feed envelope parsing and per-record normalization.
//!
//! An unparseable envelope is an error (the fetcher retries it); a single
//! malformed record is not — it is dropped with a warning, or patched up
//! when only its timestamp is bad.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::config::SourceKind;
use crate::ingest::normalize_text;
use crate::ingest::types::Item;

// --- RSS 2.0 ---

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    #[serde(rename = "content:encoded")]
    content: Option<String>,
}

// --- Atom ---

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<AtomText>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    summary: Option<AtomText>,
    content: Option<AtomText>,
    published: Option<String>,
    updated: Option<String>,
}

// Atom text constructs carry a `type` attribute, so a plain String target
// does not deserialize; take the text node explicitly.
#[derive(Debug, Deserialize)]
struct AtomText {
    #[serde(rename = "$text")]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

/// One record as it came off the wire, before normalization.
struct RawEntry {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    body: Option<String>,
    published: Option<DateTime<Utc>>,
}

/// Parse a fetched feed document into normalized items.
pub fn parse_feed(kind: SourceKind, xml: &str, source_name: &str) -> Result<Vec<Item>> {
    let t0 = std::time::Instant::now();
    let xml_clean = scrub_html_entities_for_xml(xml);

    let raw = match kind {
        SourceKind::Rss => {
            let rss: Rss = from_str(&xml_clean)
                .with_context(|| format!("parsing rss envelope from '{source_name}'"))?;
            rss.channel.items.into_iter().map(raw_from_rss).collect()
        }
        SourceKind::Atom => {
            let feed: AtomFeed = from_str(&xml_clean)
                .with_context(|| format!("parsing atom envelope from '{source_name}'"))?;
            feed.entries.into_iter().map(raw_from_atom).collect()
        }
    };

    let items = build_items(raw, source_name);

    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("ingest_parse_ms").record(ms);
    counter!("ingest_events_total").increment(items.len() as u64);
    Ok(items)
}

fn raw_from_rss(it: RssItem) -> RawEntry {
    RawEntry {
        title: it.title,
        link: it.link,
        description: it.description,
        body: it.content,
        published: it.pub_date.as_deref().and_then(parse_rfc2822_utc),
    }
}

fn raw_from_atom(e: AtomEntry) -> RawEntry {
    let link = pick_atom_link(&e.links);
    let published = e
        .published
        .as_deref()
        .and_then(parse_rfc3339_utc)
        .or_else(|| e.updated.as_deref().and_then(parse_rfc3339_utc));
    RawEntry {
        title: e.title.and_then(|t| t.value),
        link,
        description: e.summary.and_then(|t| t.value),
        body: e.content.and_then(|t| t.value),
        published,
    }
}

// Prefer rel="alternate" (or no rel), else whatever came first.
fn pick_atom_link(links: &[AtomLink]) -> Option<String> {
    links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| links.first())
        .and_then(|l| l.href.clone())
}

/// Drop records missing a title or url; patch a missing/bad timestamp with
/// the current wall-clock time. Never fails the whole feed.
fn build_items(raw: Vec<RawEntry>, source_name: &str) -> Vec<Item> {
    let mut out = Vec::with_capacity(raw.len());
    for entry in raw {
        let title = entry
            .title
            .as_deref()
            .map(normalize_text)
            .unwrap_or_default();
        let url = entry.link.map(|l| l.trim().to_string()).unwrap_or_default();
        if title.is_empty() || url.is_empty() {
            warn!(
                source = source_name,
                has_title = !title.is_empty(),
                has_url = !url.is_empty(),
                "dropping record missing required field"
            );
            counter!("ingest_parse_skips_total").increment(1);
            continue;
        }

        let published_at = match entry.published {
            Some(ts) => ts,
            None => {
                debug!(source = source_name, %title, "record has no parseable timestamp, using now");
                Utc::now()
            }
        };

        let description = entry
            .description
            .as_deref()
            .map(normalize_text)
            .filter(|s| !s.is_empty());
        let body = entry
            .body
            .as_deref()
            .map(normalize_text)
            .filter(|s| !s.is_empty());

        out.push(Item::new(
            title,
            url,
            description,
            body,
            published_at,
            source_name.to_string(),
        ));
    }
    out
}

fn parse_rfc2822_utc(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    // The well-known parser only takes numeric zones; feeds love "GMT".
    let owned;
    let ts = match ts
        .strip_suffix(" GMT")
        .or_else(|| ts.strip_suffix(" UTC"))
        .or_else(|| ts.strip_suffix(" UT"))
    {
        Some(head) => {
            owned = format!("{head} +0000");
            owned.as_str()
        }
        None => ts,
    };
    OffsetDateTime::parse(ts, &Rfc2822)
        .ok()
        .and_then(|dt| DateTime::<Utc>::from_timestamp(dt.unix_timestamp(), 0))
}

fn parse_rfc3339_utc(ts: &str) -> Option<DateTime<Utc>> {
    OffsetDateTime::parse(ts.trim(), &Rfc3339)
        .ok()
        .and_then(|dt| DateTime::<Utc>::from_timestamp(dt.unix_timestamp(), 0))
}

// Feeds love sprinkling HTML entities into what should be XML.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
