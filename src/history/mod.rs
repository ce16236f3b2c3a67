//! Recent submission history.
//!
//! A most-recent-first list of at most [`HISTORY_CAPACITY`] entries, stored
//! as a JSON array under [`HISTORY_KEY`] in a [`KeyValueStore`]. Missing or
//! corrupt stored data always reads as an empty history.
//!
//! # Example
//!
//! ```rust
//! use research_console::history::{HistoryStore, MemoryStore};
//!
//! let mut history = HistoryStore::load(Box::new(MemoryStore::new()));
//! history.record("What is X?", "o3-min");
//! assert_eq!(history.list()[0].question, "What is X?");
//! ```

mod store;

pub use store::{FileStore, KeyValueStore, MemoryStore};

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// Storage key of the serialized history.
pub const HISTORY_KEY: &str = "researchHistory";

/// Maximum number of entries kept.
pub const HISTORY_CAPACITY: usize = 10;

/// One past submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub question: String,
    pub model_id: String,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    /// Question shortened to `max_chars` characters, with `...` appended when cut.
    #[must_use]
    pub fn label(&self, max_chars: usize) -> String {
        if self.question.chars().count() <= max_chars {
            return self.question.clone();
        }
        let mut out: String = self.question.chars().take(max_chars).collect();
        out.push_str("...");
        out
    }

    /// Timestamp in local time, for display.
    #[must_use]
    pub fn display_time(&self) -> String {
        self.timestamp
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }
}

/// Ordered, size-capped submission history.
#[derive(Debug)]
pub struct HistoryStore {
    store: Box<dyn KeyValueStore>,
    entries: Vec<HistoryEntry>,
}

impl HistoryStore {
    /// Read the history from `store`, treating bad data as empty.
    pub fn load(store: Box<dyn KeyValueStore>) -> Self {
        let entries = match store.get(HISTORY_KEY) {
            Ok(Some(raw)) => parse_entries(&raw),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(
                    name: "history.load.failed",
                    error = %e,
                    "Could not read history; starting empty"
                );
                Vec::new()
            }
        };
        Self { store, entries }
    }

    /// Prepend a new entry stamped with the current time.
    pub fn record(&mut self, question: impl Into<String>, model_id: impl Into<String>) -> &HistoryEntry {
        self.record_at(question, model_id, Utc::now())
    }

    /// Prepend a new entry with an explicit timestamp.
    pub fn record_at(
        &mut self,
        question: impl Into<String>,
        model_id: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> &HistoryEntry {
        self.entries.insert(
            0,
            HistoryEntry {
                question: question.into(),
                model_id: model_id.into(),
                timestamp,
            },
        );
        self.entries.truncate(HISTORY_CAPACITY);
        self.persist();
        &self.entries[0]
    }

    /// Entries, most recent first.
    #[must_use]
    pub fn list(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Entry at `index`, for re-populating the input. Pure read.
    #[must_use]
    pub fn select_entry(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn persist(&mut self) {
        let result = serde_json::to_string(&self.entries)
            .map_err(Into::into)
            .and_then(|raw| self.store.set(HISTORY_KEY, raw));
        if let Err(e) = result {
            tracing::warn!(
                name: "history.persist.failed",
                error = %e,
                "Could not persist history; keeping it in memory"
            );
        }
    }
}

fn parse_entries(raw: &str) -> Vec<HistoryEntry> {
    match serde_json::from_str::<Option<Vec<HistoryEntry>>>(raw) {
        Ok(entries) => {
            let mut entries = entries.unwrap_or_default();
            entries.truncate(HISTORY_CAPACITY);
            entries
        }
        Err(e) => {
            tracing::warn!(
                name: "history.load.corrupt",
                error = %e,
                "Stored history is corrupt; starting empty"
            );
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty() -> HistoryStore {
        HistoryStore::load(Box::new(MemoryStore::new()))
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut history = empty();
        for i in 0..11 {
            history.record(format!("q{i}"), "m");
        }
        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert_eq!(history.list()[0].question, "q10");
        assert!(history.list().iter().all(|e| e.question != "q0"));
        assert_eq!(history.list()[9].question, "q1");
    }

    #[test]
    fn test_corrupt_storage_is_empty() {
        for raw in ["{oops", "null", "42", r#"[{"question":1}]"#] {
            let history = HistoryStore::load(Box::new(MemoryStore::with_value(HISTORY_KEY, raw)));
            assert!(history.is_empty(), "{raw} should load as empty");
        }
    }

    #[test]
    fn test_reads_browser_style_entries() {
        let raw = r#"[{"question":"Q","modelId":"openai/gpt-4o","timestamp":"2024-05-01T10:00:00.000Z"}]"#;
        let history = HistoryStore::load(Box::new(MemoryStore::with_value(HISTORY_KEY, raw)));
        let entry = history.select_entry(0).unwrap();
        assert_eq!(entry.question, "Q");
        assert_eq!(entry.model_id, "openai/gpt-4o");
        assert!(history.select_entry(1).is_none());
    }

    #[test]
    fn test_oversized_storage_is_truncated() {
        let entries: Vec<_> = (0..15)
            .map(|i| HistoryEntry {
                question: format!("q{i}"),
                model_id: "m".to_string(),
                timestamp: Utc::now(),
            })
            .collect();
        let raw = serde_json::to_string(&entries).unwrap();
        let history = HistoryStore::load(Box::new(MemoryStore::with_value(HISTORY_KEY, raw)));
        assert_eq!(history.len(), HISTORY_CAPACITY);
    }

    #[test]
    fn test_label_truncates_by_characters() {
        let entry = HistoryEntry {
            question: "é".repeat(31),
            model_id: "m".to_string(),
            timestamp: Utc::now(),
        };
        assert_eq!(entry.label(30), format!("{}...", "é".repeat(30)));
        assert_eq!(entry.label(31), "é".repeat(31));
    }
}
