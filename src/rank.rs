// src/rank.rs
//! Recency ordering and truncation. Both functions are pure.

use crate::ingest::types::Item;

/// Stable descending sort by publication time; equal timestamps keep their
/// input order.
pub fn rank(mut items: Vec<Item>) -> Vec<Item> {
    items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    items
}

pub fn limit(mut items: Vec<Item>, n: usize) -> Vec<Item> {
    items.truncate(n);
    items
}
