//! crates/healthlens_core/src/history.rs
//!
//! The client-local history of past analyses: a newest-first log capped at
//! `MAX_HISTORY_ITEMS`, stored as one JSON array under a fixed key.
//!
//! History is best effort. Write failures are logged and swallowed, and a
//! corrupt stored value reads as an empty history.

use crate::domain::{AnalysisResult, HistoryItem, UNKNOWN_PRODUCT};
use crate::ports::{KeyValueStore, PortError, PortResult};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// The storage key holding the serialized history.
pub const HISTORY_KEY: &str = "healthlens_history";

/// Entries beyond this count are evicted, oldest first, on save.
pub const MAX_HISTORY_ITEMS: usize = 50;

/// A source of epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A serialized snapshot of the history, ready to be written out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryExport {
    pub file_name: String,
    pub contents: String,
}

pub struct HistoryCache {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl HistoryCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Records a finished analysis at the front of the history.
    ///
    /// Returns the stored item, or `None` if it could not be persisted.
    pub fn save(
        &self,
        analysis_type: &str,
        result: &AnalysisResult,
        image_thumbnail: Option<String>,
    ) -> Option<HistoryItem> {
        let mut history = self.get_all();
        let timestamp = self.clock.now_millis();

        // Ids are creation times, bumped past the newest entry so two saves
        // within one millisecond still get distinct ids.
        let newest = history
            .iter()
            .filter_map(|item| item.id.parse::<i64>().ok())
            .max();
        let id = match newest {
            Some(n) if n >= timestamp => n.checked_add(1).unwrap_or(timestamp),
            _ => timestamp,
        };

        let product_name = result
            .data
            .as_ref()
            .and_then(|d| d.product_name())
            .unwrap_or(UNKNOWN_PRODUCT)
            .to_string();

        let item = HistoryItem {
            id: id.to_string(),
            timestamp,
            analysis_type: analysis_type.to_string(),
            result: result.clone(),
            image_thumbnail,
            product_name,
        };

        history.insert(0, item.clone());
        history.truncate(MAX_HISTORY_ITEMS);

        match self.write(&history) {
            Ok(()) => {
                debug!(id = %item.id, entries = history.len(), "Saved analysis to history.");
                Some(item)
            }
            Err(e) => {
                error!("Error saving to history: {}", e);
                None
            }
        }
    }

    /// All entries, newest first. Missing or unreadable history is empty.
    pub fn get_all(&self) -> Vec<HistoryItem> {
        let stored = match self.store.get(HISTORY_KEY) {
            Ok(Some(stored)) => stored,
            Ok(None) => return Vec::new(),
            Err(e) => {
                error!("Error reading history: {}", e);
                return Vec::new();
            }
        };
        serde_json::from_str(&stored).unwrap_or_else(|e| {
            warn!("Stored history is corrupt, treating it as empty: {}", e);
            Vec::new()
        })
    }

    pub fn get_by_id(&self, id: &str) -> Option<HistoryItem> {
        self.get_all().into_iter().find(|item| item.id == id)
    }

    /// Removes the entry with the given id. Unknown ids leave the store untouched.
    pub fn delete_by_id(&self, id: &str) {
        let mut history = self.get_all();
        let before = history.len();
        history.retain(|item| item.id != id);
        if history.len() == before {
            return;
        }
        if let Err(e) = self.write(&history) {
            error!("Error deleting history item {}: {}", id, e);
        }
    }

    pub fn clear(&self) {
        if let Err(e) = self.store.remove(HISTORY_KEY) {
            error!("Error clearing history: {}", e);
        }
    }

    /// Serializes the full history as pretty-printed JSON with a timestamped file name.
    pub fn export(&self) -> PortResult<HistoryExport> {
        let contents = serde_json::to_string_pretty(&self.get_all())
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(HistoryExport {
            file_name: format!("healthlens-history-{}.json", self.clock.now_millis()),
            contents,
        })
    }

    fn write(&self, history: &[HistoryItem]) -> PortResult<()> {
        let serialized =
            serde_json::to_string(history).map_err(|e| PortError::Unexpected(e.to_string()))?;
        self.store.set(HISTORY_KEY, &serialized)
    }
}
