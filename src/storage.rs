// src/storage.rs
//! Best-effort atomic persistence of the history document
//!
//! The durable form is a small versioned JSON document. Persistence never
//! fails the caller: a missing or mangled file loads as an empty history, a
//! failed save is logged and forgotten, and the in-memory store stays
//! authoritative for the running session. Saves go through a temporary file
//! that is fsynced and then renamed over the destination, so the document is
//! never observed half-written.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::core::item::{new_item_id, now_unix, HistoryItem};

pub const DOCUMENT_VERSION: u32 = 1;

#[derive(Serialize)]
struct HistoryDocument<'a> {
    version: u32,
    saved_at: String,
    items: &'a [HistoryItem],
}

pub struct PersistenceLayer {
    path: PathBuf,
}

impl PersistenceLayer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Per-user default location of the history document.
    pub fn default_path() -> PathBuf {
        let base = dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("clip-tracker").join("history.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and sanitize the stored history. Structural failures yield an
    /// empty batch; damaged rows are repaired or dropped individually.
    pub fn load(&self) -> Vec<HistoryItem> {
        if !self.path.exists() {
            return Vec::new();
        }
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("History load failed, starting empty: {e}");
                return Vec::new();
            }
        };
        let doc: Value = match serde_json::from_str(&raw) {
            Ok(doc) => doc,
            Err(e) => {
                warn!("History file is not valid JSON, starting empty: {e}");
                return Vec::new();
            }
        };

        let Some(rows) = doc.get("items").and_then(Value::as_array) else {
            return Vec::new();
        };
        let mut items = Vec::new();
        for row in rows {
            // Rows without usable text carry nothing worth keeping.
            let Some(text) = row.get("text").and_then(Value::as_str) else {
                continue;
            };
            let text = text.trim_end_matches(['\r', '\n']);
            if text.trim().is_empty() {
                continue;
            }
            let id = row
                .get("id")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(String::from)
                .unwrap_or_else(new_item_id);
            let pinned = row.get("pinned").and_then(Value::as_bool).unwrap_or(false);
            let mut ts = row.get("ts").and_then(Value::as_f64).unwrap_or(0.0);
            if ts <= 0.0 {
                ts = now_unix();
            }
            items.push(HistoryItem {
                id,
                text: text.to_string(),
                pinned,
                ts,
            });
        }
        debug!("Loaded {} history entries from {}", items.len(), self.path.display());
        items
    }

    /// Atomically persist the snapshot. Failures are logged and swallowed.
    pub fn save(&self, items: &[HistoryItem]) {
        if let Err(e) = self.try_save(items) {
            warn!("History save failed, keeping in-memory state: {e:#}");
        }
    }

    fn try_save(&self, items: &[HistoryItem]) -> Result<()> {
        let doc = HistoryDocument {
            version: DOCUMENT_VERSION,
            saved_at: Utc::now().to_rfc3339(),
            items,
        };
        let body = serde_json::to_string_pretty(&doc).context("serializing history document")?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);

        let mut file =
            fs::File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
        file.write_all(body.as_bytes())
            .with_context(|| format!("writing {}", tmp.display()))?;
        file.sync_all()
            .with_context(|| format!("syncing {}", tmp.display()))?;
        drop(file);

        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;
        debug!("Saved {} history entries to {}", items.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::history::HistoryStore;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn layer_in(dir: &tempfile::TempDir) -> PersistenceLayer {
        PersistenceLayer::new(dir.path().join("history.json"))
    }

    #[test]
    fn test_round_trip_reproduces_the_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let layer = layer_in(&dir);

        let mut store = HistoryStore::new(10);
        store.add("alpha");
        store.add("beta");
        let id = store.snapshot()[1].id.clone();
        store.toggle_pin(&id);
        layer.save(store.snapshot());

        let mut restored = HistoryStore::new(10);
        restored.replace_all(layer.load());
        assert_eq!(restored.snapshot(), store.snapshot());
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(layer_in(&dir).load().is_empty());
    }

    #[test]
    fn test_load_malformed_json_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let layer = layer_in(&dir);
        fs::write(layer.path(), "{ not json").unwrap();
        assert!(layer.load().is_empty());

        fs::write(layer.path(), "[1, 2, 3]").unwrap();
        assert!(layer.load().is_empty());
    }

    #[test]
    fn test_load_repairs_or_drops_damaged_rows() {
        let dir = tempfile::tempdir().unwrap();
        let layer = layer_in(&dir);
        let doc = json!({
            "version": 99,
            "saved_at": "whenever",
            "items": [
                { "id": "good", "text": "kept as-is", "pinned": true, "ts": 1700000000.5 },
                { "id": "blank", "text": "   \n", "pinned": false, "ts": 1.0 },
                { "id": "", "text": "id regenerated", "ts": 2.0 },
                { "text": "timestamp repaired", "ts": "not a number" },
                { "text": "negative repaired", "ts": -4.0 },
                { "pinned": true, "ts": 3.0 },
                "not even an object"
            ]
        });
        fs::write(layer.path(), doc.to_string()).unwrap();

        let items = layer.load();
        assert_eq!(items.len(), 4);

        assert_eq!(items[0].id, "good");
        assert_eq!(items[0].text, "kept as-is");
        assert!(items[0].pinned);
        assert_eq!(items[0].ts, 1700000000.5);

        assert_eq!(items[1].text, "id regenerated");
        assert_eq!(items[1].id.len(), 32);

        assert!(items[2].ts > 0.0);
        assert!(items[3].ts > 0.0);
    }

    #[test]
    fn test_save_writes_versioned_document_and_no_leftover_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let layer = layer_in(&dir);
        layer.save(&[HistoryItem::new("hello")]);

        assert!(layer.path().exists());
        assert!(!dir.path().join("history.json.tmp").exists());

        let doc: Value = serde_json::from_str(&fs::read_to_string(layer.path()).unwrap()).unwrap();
        assert_eq!(doc["version"], 1);
        assert_eq!(doc["items"][0]["text"], "hello");
        let saved_at = doc["saved_at"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(saved_at).is_ok());
    }

    #[test]
    fn test_save_creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let layer = PersistenceLayer::new(dir.path().join("nested").join("deep").join("h.json"));
        layer.save(&[HistoryItem::new("hello")]);
        assert_eq!(layer.load().len(), 1);
    }

    #[test]
    fn test_save_replaces_previous_document() {
        let dir = tempfile::tempdir().unwrap();
        let layer = layer_in(&dir);
        layer.save(&[HistoryItem::new("first")]);
        layer.save(&[HistoryItem::new("second"), HistoryItem::new("third")]);

        let items = layer.load();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].text, "second");
    }
}
