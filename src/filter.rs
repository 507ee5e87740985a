// src/filter.rs
//! Keyword matching over item text fields. Pure substring containment —
//! no tokenization, no stemming.

use serde::Deserialize;

use crate::ingest::types::Item;

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatchStrategy {
    /// At least one keyword must match.
    #[default]
    Any,
    /// Every keyword must match.
    All,
}

/// Which item fields contribute to the searchable text.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct MatchFields {
    #[serde(default = "on")]
    pub title: bool,
    #[serde(default = "on")]
    pub description: bool,
    #[serde(default)]
    pub body: bool,
}

impl Default for MatchFields {
    fn default() -> Self {
        Self {
            title: true,
            description: true,
            body: false,
        }
    }
}

fn on() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchSpec {
    pub keywords: Vec<String>,
    pub strategy: MatchStrategy,
    pub case_sensitive: bool,
    pub fields: MatchFields,
}

impl MatchSpec {
    pub fn any(keywords: Vec<String>) -> Self {
        Self {
            keywords,
            strategy: MatchStrategy::Any,
            case_sensitive: false,
            fields: MatchFields::default(),
        }
    }
}

// Fixed field order: title, description, body.
fn searchable_text(item: &Item, fields: &MatchFields) -> String {
    let mut parts: Vec<&str> = Vec::with_capacity(3);
    if fields.title {
        parts.push(&item.title);
    }
    if fields.description {
        if let Some(d) = item.description.as_deref() {
            parts.push(d);
        }
    }
    if fields.body {
        if let Some(b) = item.body.as_deref() {
            parts.push(b);
        }
    }
    parts.join(" ")
}

/// An empty keyword list matches everything (pass-through). The config
/// layer never lets one through; see `AppConfig::validate`.
pub fn matches(item: &Item, spec: &MatchSpec) -> bool {
    if spec.keywords.is_empty() {
        return true;
    }

    let text = searchable_text(item, &spec.fields);
    let hay = if spec.case_sensitive {
        text
    } else {
        text.to_lowercase()
    };

    let hit = |kw: &String| -> bool {
        if spec.case_sensitive {
            hay.contains(kw.as_str())
        } else {
            hay.contains(&kw.to_lowercase())
        }
    };

    match spec.strategy {
        MatchStrategy::Any => spec.keywords.iter().any(hit),
        MatchStrategy::All => spec.keywords.iter().all(hit),
    }
}

/// Order-preserving filter; pure.
pub fn filter(items: Vec<Item>, spec: &MatchSpec) -> Vec<Item> {
    items.into_iter().filter(|i| matches(i, spec)).collect()
}
