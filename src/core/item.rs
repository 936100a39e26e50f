// src/core/item.rs
//! History entry value type plus id and clock helpers

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single captured clipboard snapshot.
///
/// Items are treated as immutable values: anything that "changes" an item
/// builds a replacement and swaps it into the store. The `id` survives pin
/// toggles and re-captures of the same text, so callers can keep addressing
/// an entry across refreshes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    /// Opaque unique identifier, stable for the item's lifetime.
    pub id: String,
    /// Captured text with trailing newline characters stripped; never blank.
    pub text: String,
    /// Pinned entries are exempt from capacity eviction.
    pub pinned: bool,
    /// Capture instant as unix seconds (fractional); ordering key, newest first.
    pub ts: f64,
}

impl HistoryItem {
    /// Build a fresh, unpinned item stamped with the current instant.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: new_item_id(),
            text: text.into(),
            pinned: false,
            ts: now_unix(),
        }
    }

    /// Replacement value with `pinned` flipped; id, text and timestamp carry over.
    pub fn with_pin_toggled(&self) -> Self {
        Self {
            pinned: !self.pinned,
            ..self.clone()
        }
    }
}

/// Mint an opaque 32-character lowercase hex identifier.
pub fn new_item_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Current unix time in seconds, fractional part included.
pub fn now_unix() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_item_is_unpinned_and_stamped() {
        let item = HistoryItem::new("hello");
        assert_eq!(item.text, "hello");
        assert!(!item.pinned);
        assert!(item.ts > 0.0);
    }

    #[test]
    fn test_item_ids_are_unique_hex() {
        let a = new_item_id();
        let b = new_item_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_pin_toggle_preserves_identity() {
        let item = HistoryItem::new("hello");
        let pinned = item.with_pin_toggled();
        assert!(pinned.pinned);
        assert_eq!(pinned.id, item.id);
        assert_eq!(pinned.ts, item.ts);

        let back = pinned.with_pin_toggled();
        assert_eq!(back, item);
    }
}
