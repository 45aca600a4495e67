//! In-memory cache of full analysis responses.
//!
//! Keyed by `signature:DRUG:mode`. Only successful explanations are stored,
//! and an entry whose explanation carries the failure marker is never served.
//! Concurrent misses for the same key may both generate; the last `set` wins.

use lru::LruCache;
use pgx_common::{AnalysisReport, ExplanationMode};
use std::num::NonZeroUsize;
use tokio::sync::Mutex;
use tracing::debug;

/// Cache key for one (variant set, drug, mode) triple
pub fn cache_key(signature: &str, drug: &str, mode: ExplanationMode) -> String {
    format!("{}:{}:{}", signature, drug.to_uppercase(), mode.as_str())
}

/// LRU-bounded explanation cache, one per process
pub struct ExplanationCache {
    entries: Mutex<LruCache<String, AnalysisReport>>,
}

impl ExplanationCache {
    /// * `capacity` - maximum stored responses; zero is treated as one
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Stored response for `key`, unless absent or holding a failed explanation
    pub async fn get(&self, key: &str) -> Option<AnalysisReport> {
        let mut entries = self.entries.lock().await;
        let report = entries.get(key)?;

        if report.llm_generated_explanation.is_failure() {
            debug!("Ignoring cached failure for {}", key);
            return None;
        }
        Some(report.clone())
    }

    /// Store a response. Returns false (and stores nothing) for a failed explanation.
    pub async fn set(&self, key: String, report: AnalysisReport) -> bool {
        if report.llm_generated_explanation.is_failure() {
            return false;
        }
        self.entries.lock().await.put(key, report);
        true
    }

    /// Insert without the success check, to plant stale failure entries
    #[cfg(test)]
    pub(crate) async fn insert_unchecked(&self, key: String, report: AnalysisReport) {
        self.entries.lock().await.put(key, report);
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }
}

impl Default for ExplanationCache {
    fn default() -> Self {
        Self::new(10_000)
    }
}
