// src/dedup.rs
//! Content-addressed deduplication against the persisted seen-set.
//! Identity itself lives in `ingest::types::item_id`.

use std::collections::HashSet;

use crate::ingest::types::Item;

/// Order-preserving filter: keep items whose id is not in `seen`; pure.
pub fn exclude(items: Vec<Item>, seen: &HashSet<String>) -> Vec<Item> {
    items.into_iter().filter(|i| !seen.contains(&i.id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(title: &str) -> Item {
        Item::new(
            title.to_string(),
            format!("https://example.test/{title}"),
            None,
            None,
            Utc::now(),
            "src".into(),
        )
    }

    #[test]
    fn seen_item_is_excluded() {
        let x = item("X");
        let y = item("Y");
        let seen: HashSet<String> = [x.id.clone()].into_iter().collect();
        let out = exclude(vec![x, y.clone()], &seen);
        assert_eq!(out, vec![y]);
    }

    #[test]
    fn empty_seen_set_keeps_everything() {
        let items = vec![item("A"), item("B")];
        let out = exclude(items.clone(), &HashSet::new());
        assert_eq!(out, items);
    }
}
