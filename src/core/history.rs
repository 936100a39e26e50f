// src/core/history.rs
//! Bounded, pin-aware, deduplicated clipboard history
//!
//! The store owns every ordering and capacity invariant: pinned entries first
//! (newest first), then unpinned entries (newest first), with the unpinned
//! tail trimmed so the total stays within `capacity`. Pinned entries are never
//! evicted, even when they alone exceed the capacity. A one-shot ignore token
//! lets callers suppress the echo of their own programmatic clipboard writes.

use tracing::debug;

use crate::core::item::{new_item_id, now_unix, HistoryItem};

/// Default maximum number of retained entries (pinned entries may exceed it).
pub const DEFAULT_CAPACITY: usize = 20;

pub struct HistoryStore {
    items: Vec<HistoryItem>,
    capacity: usize,
    ignore_next: Option<String>,
}

impl HistoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Vec::new(),
            capacity,
            ignore_next: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Record a captured payload as the newest entry.
    ///
    /// Trailing newline/carriage-return characters are stripped first; a blank
    /// result is rejected without touching anything. A pending ignore token is
    /// consumed by the first non-blank call regardless of match: when it equals
    /// the trimmed text the capture is suppressed, otherwise ingestion proceeds
    /// normally. Re-capturing known text refreshes its timestamp and moves it
    /// to the front while keeping its id and pin flag.
    ///
    /// Returns true when the store changed.
    pub fn add(&mut self, text: &str) -> bool {
        let text = text.trim_end_matches(['\r', '\n']);
        if text.trim().is_empty() {
            return false;
        }

        if let Some(token) = self.ignore_next.take() {
            if token == text {
                debug!("suppressed echo of a programmatic clipboard write");
                return false;
            }
        }

        // Move-to-front dedupe; an existing entry donates its id and pin flag.
        let (id, pinned) = match self.items.iter().position(|it| it.text == text) {
            Some(pos) => {
                let old = self.items.remove(pos);
                (old.id, old.pinned)
            }
            None => (new_item_id(), false),
        };
        self.items.insert(
            0,
            HistoryItem {
                id,
                text: text.to_string(),
                pinned,
                ts: now_unix(),
            },
        );
        self.normalize();
        true
    }

    /// Flip the pin flag of the matching entry. Returns true when it existed.
    pub fn toggle_pin(&mut self, id: &str) -> bool {
        let Some(pos) = self.items.iter().position(|it| it.id == id) else {
            return false;
        };
        self.items[pos] = self.items[pos].with_pin_toggled();
        self.normalize();
        true
    }

    /// Delete the matching entry unconditionally, pinned or not.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|it| it.id != id);
        let removed = self.items.len() != before;
        if removed {
            self.normalize();
        }
        removed
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.items.clear();
        self.normalize();
    }

    /// Arm the one-shot suppression token, replacing any unconsumed one.
    pub fn set_ignore_next(&mut self, value: impl Into<String>) {
        self.ignore_next = Some(value.into());
    }

    /// The canonically ordered sequence; the store keeps itself normalized.
    pub fn snapshot(&self) -> &[HistoryItem] {
        &self.items
    }

    /// Replace the whole contents with an unordered batch (used by load).
    pub fn replace_all(&mut self, items: Vec<HistoryItem>) {
        self.items = items;
        self.normalize();
    }

    /// The single enforcement point for ordering and capacity: partition into
    /// pinned/unpinned, stable-sort each newest first (ties keep prior order),
    /// then trim the unpinned tail to the slots the pinned entries leave free.
    fn normalize(&mut self) {
        let mut pinned: Vec<HistoryItem> = Vec::new();
        let mut unpinned: Vec<HistoryItem> = Vec::new();
        for item in self.items.drain(..) {
            if item.pinned {
                pinned.push(item);
            } else {
                unpinned.push(item);
            }
        }
        pinned.sort_by(|a, b| b.ts.total_cmp(&a.ts));
        unpinned.sort_by(|a, b| b.ts.total_cmp(&a.ts));
        unpinned.truncate(self.capacity.saturating_sub(pinned.len()));
        pinned.append(&mut unpinned);
        self.items = pinned;
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn item(text: &str, pinned: bool, ts: f64) -> HistoryItem {
        HistoryItem {
            id: new_item_id(),
            text: text.to_string(),
            pinned,
            ts,
        }
    }

    fn texts(store: &HistoryStore) -> Vec<&str> {
        store.snapshot().iter().map(|it| it.text.as_str()).collect()
    }

    #[test]
    fn test_add_inserts_newest_first() {
        let mut store = HistoryStore::new(5);
        assert!(store.add("one"));
        assert!(store.add("two"));
        assert!(store.add("three"));
        assert_eq!(texts(&store), vec!["three", "two", "one"]);
    }

    #[test]
    fn test_add_rejects_blank_text() {
        let mut store = HistoryStore::new(5);
        store.add("keep");
        for blank in ["", "  \n", "\r\n", "   "] {
            assert!(!store.add(blank));
            assert_eq!(store.len(), 1);
        }
    }

    #[test]
    fn test_add_trims_only_trailing_newlines() {
        let mut store = HistoryStore::new(5);
        assert!(store.add("  indented\r\n\n"));
        assert_eq!(store.snapshot()[0].text, "  indented");
    }

    #[test]
    fn test_re_add_refreshes_timestamp_and_keeps_identity() {
        let mut store = HistoryStore::new(5);
        store.add("first");
        store.add("second");
        let original = store.snapshot()[1].clone();
        store.toggle_pin(&original.id);

        assert!(store.add("first"));
        assert_eq!(store.len(), 2);
        let refreshed = store
            .snapshot()
            .iter()
            .find(|it| it.text == "first")
            .cloned()
            .unwrap();
        assert_eq!(refreshed.id, original.id);
        assert!(refreshed.pinned);
        assert!(refreshed.ts >= original.ts);
    }

    #[test]
    fn test_re_add_moves_entry_to_front_without_duplicating() {
        let mut store = HistoryStore::new(5);
        store.add("first");
        store.add("second");
        assert!(store.add("first"));

        assert_eq!(texts(&store), vec!["first", "second"]);
        assert!(!store.snapshot()[0].pinned);
    }

    #[test]
    fn test_ignore_token_suppresses_exact_match_once() {
        let mut store = HistoryStore::new(5);
        store.set_ignore_next("foo");
        assert!(!store.add("foo"));
        assert!(store.is_empty());

        // Token was consumed; the same text now ingests normally.
        assert!(store.add("foo"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_ignore_token_consumed_by_non_matching_add() {
        let mut store = HistoryStore::new(5);
        store.set_ignore_next("foo");
        assert!(store.add("bar"));
        assert!(store.add("foo"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_ignore_token_survives_blank_add() {
        let mut store = HistoryStore::new(5);
        store.set_ignore_next("foo");
        assert!(!store.add("\n"));
        assert!(!store.add("foo"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_set_ignore_next_overwrites_pending_token() {
        let mut store = HistoryStore::new(5);
        store.set_ignore_next("old");
        store.set_ignore_next("new");
        assert!(store.add("old"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_capacity_trims_oldest_unpinned() {
        let mut store = HistoryStore::new(20);
        let mut batch = Vec::new();
        for i in 0..5 {
            batch.push(item(&format!("pinned {i}"), true, 1000.0 + i as f64));
        }
        for i in 0..30 {
            batch.push(item(&format!("plain {i}"), false, 2000.0 + i as f64));
        }
        store.replace_all(batch);

        // 5 pinned entries leave 15 slots for the newest unpinned ones.
        assert_eq!(store.len(), 20);
        let snap = store.snapshot();
        assert!(snap[..5].iter().all(|it| it.pinned));
        assert_eq!(snap[0].text, "pinned 4");
        assert_eq!(snap[5].text, "plain 29");
        assert_eq!(snap[19].text, "plain 15");
        assert!(snap[5..].iter().all(|it| !it.pinned));
    }

    #[test]
    fn test_pinned_entries_may_exceed_capacity() {
        let mut store = HistoryStore::new(2);
        store.replace_all(vec![
            item("p1", true, 10.0),
            item("p2", true, 20.0),
            item("p3", true, 30.0),
            item("u1", false, 40.0),
        ]);
        // Pinned entries are never trimmed, even past capacity, and then
        // leave no slots for unpinned ones.
        assert_eq!(texts(&store), vec!["p3", "p2", "p1"]);

        // New captures are still accepted but trimmed straight away.
        assert!(store.add("u2"));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_toggle_pin_round_trip_keeps_membership() {
        let mut store = HistoryStore::new(2);
        store.add("a");
        store.add("b");
        let ids: Vec<String> = store.snapshot().iter().map(|it| it.id.clone()).collect();
        for id in &ids {
            store.toggle_pin(id);
        }

        let pinned_texts: Vec<String> = texts(&store).iter().map(|s| s.to_string()).collect();
        let target = store.snapshot()[0].id.clone();
        assert!(store.toggle_pin(&target));
        assert!(store.toggle_pin(&target));
        assert_eq!(texts(&store), pinned_texts);
    }

    #[test]
    fn test_toggle_pin_missing_id_is_noop() {
        let mut store = HistoryStore::new(5);
        store.add("only");
        let before = store.snapshot().to_vec();
        assert!(!store.toggle_pin("not-an-id"));
        assert_eq!(store.snapshot(), &before[..]);
    }

    #[test]
    fn test_remove_deletes_pinned_entries_too() {
        let mut store = HistoryStore::new(5);
        store.add("victim");
        let id = store.snapshot()[0].id.clone();
        store.toggle_pin(&id);

        assert!(store.remove(&id));
        assert!(store.is_empty());
        assert!(!store.remove(&id));
    }

    #[test]
    fn test_clear_empties_the_store() {
        let mut store = HistoryStore::new(5);
        store.add("a");
        store.add("b");
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_replace_all_orders_unsorted_batch() {
        let mut store = HistoryStore::new(3);
        store.replace_all(vec![
            item("old plain", false, 10.0),
            item("pinned", true, 5.0),
            item("new plain", false, 30.0),
            item("mid plain", false, 20.0),
        ]);
        assert_eq!(texts(&store), vec!["pinned", "new plain", "mid plain"]);
    }

    #[test]
    fn test_equal_timestamps_keep_input_order() {
        let mut store = HistoryStore::new(10);
        store.replace_all(vec![
            item("first", false, 42.0),
            item("second", false, 42.0),
            item("third", false, 42.0),
        ]);
        assert_eq!(texts(&store), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_invariants_hold_across_add_sequences() {
        let mut store = HistoryStore::new(4);
        for i in 0..40 {
            store.add(&format!("text {}", i % 7));

            let snap = store.snapshot();
            let unpinned = snap.iter().filter(|it| !it.pinned).count();
            assert!(unpinned <= store.capacity());
            for (n, a) in snap.iter().enumerate() {
                assert!(!a.text.is_empty());
                for b in &snap[n + 1..] {
                    assert_ne!(a.text, b.text);
                    assert_ne!(a.id, b.id);
                }
            }
        }
    }
}
