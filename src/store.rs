// src/store.rs
//! Per-symbol sentiment store: append-only history of analyzed items,
//! pruned to the trailing 24 hours.
//!
//! Aggregation reads point-in-time snapshots (cloned vectors); concurrent
//! appends never corrupt a read in progress.

use crate::types::AnalyzedSentimentItem;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

/// Retention window in hours.
const RETENTION_HOURS: i64 = 24;

#[derive(Debug, Default)]
pub struct SymbolStore {
    inner: RwLock<HashMap<String, Vec<AnalyzedSentimentItem>>>,
}

impl SymbolStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the item to every symbol it matched.
    pub fn append(&self, item: &AnalyzedSentimentItem) {
        let mut map = self.inner.write().expect("symbol store poisoned");
        for sym in &item.symbols {
            map.entry(sym.clone()).or_default().push(item.clone());
        }
    }

    /// Drop everything older than the trailing 24h window. Idempotent:
    /// pruning twice at the same instant is a no-op the second time.
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::hours(RETENTION_HOURS);
        let mut removed = 0usize;
        let mut map = self.inner.write().expect("symbol store poisoned");
        map.retain(|_, items| {
            let before = items.len();
            items.retain(|it| it.timestamp >= cutoff);
            removed += before - items.len();
            !items.is_empty()
        });
        removed
    }

    /// Point-in-time copy of one symbol's items.
    pub fn snapshot(&self, symbol: &str) -> Vec<AnalyzedSentimentItem> {
        self.inner
            .read()
            .expect("symbol store poisoned")
            .get(symbol)
            .cloned()
            .unwrap_or_default()
    }

    /// Items with a timestamp at or after `cutoff`.
    pub fn items_since(&self, symbol: &str, cutoff: DateTime<Utc>) -> Vec<AnalyzedSentimentItem> {
        self.inner
            .read()
            .expect("symbol store poisoned")
            .get(symbol)
            .map(|items| {
                items
                    .iter()
                    .filter(|it| it.timestamp >= cutoff)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn symbols(&self) -> Vec<String> {
        let mut v: Vec<String> = self
            .inner
            .read()
            .expect("symbol store poisoned")
            .keys()
            .cloned()
            .collect();
        v.sort();
        v
    }

    pub fn item_count(&self, symbol: &str) -> usize {
        self.inner
            .read()
            .expect("symbol store poisoned")
            .get(symbol)
            .map(|v| v.len())
            .unwrap_or(0)
    }

    pub fn total_items(&self) -> usize {
        self.inner
            .read()
            .expect("symbol store poisoned")
            .values()
            .map(|v| v.len())
            .sum()
    }

    pub fn clear(&self) {
        self.inner.write().expect("symbol store poisoned").clear();
    }
}
