// src/history.rs
//! Baseline history: 30-day rolling snapshots of per-symbol aggregates and
//! per-keyword hourly mention counts. Feeds anomaly baselines, historical
//! percentiles, and trending growth.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

const RETENTION_DAYS: i64 = 30;
/// Keyword baselines keep a shorter tail; trending only needs recent hours.
const KEYWORD_RETENTION_HOURS: i64 = 48;

#[derive(Debug, Clone, Copy)]
struct Snapshot {
    ts: DateTime<Utc>,
    score: f32,
    volume_1h: u32,
}

#[derive(Debug, Default)]
struct Inner {
    /// Per symbol: aggregate snapshots recorded each aggregation cycle.
    symbols: HashMap<String, VecDeque<Snapshot>>,
    /// Per keyword: (ts, mentions-in-trailing-hour) samples.
    keywords: HashMap<String, VecDeque<(DateTime<Utc>, u32)>>,
}

/// Thread-safe baseline store.
#[derive(Debug, Default)]
pub struct BaselineHistory {
    inner: Mutex<Inner>,
}

impl BaselineHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one aggregation-cycle snapshot for a symbol, pruning past 30d.
    pub fn record(&self, symbol: &str, score: f32, volume_1h: u32, now: DateTime<Utc>) {
        let cutoff = now - Duration::days(RETENTION_DAYS);
        let mut inner = self.inner.lock().expect("baseline history poisoned");
        let buf = inner.symbols.entry(symbol.to_string()).or_default();
        buf.push_back(Snapshot {
            ts: now,
            score,
            volume_1h,
        });
        while let Some(front) = buf.front() {
            if front.ts < cutoff {
                buf.pop_front();
            } else {
                break;
            }
        }
    }

    /// Mean snapshot score, or None with no history.
    pub fn sentiment_baseline(&self, symbol: &str) -> Option<f32> {
        let inner = self.inner.lock().expect("baseline history poisoned");
        let buf = inner.symbols.get(symbol)?;
        if buf.is_empty() {
            return None;
        }
        let sum: f32 = buf.iter().map(|s| s.score).sum();
        Some(sum / buf.len() as f32)
    }

    /// Mean 1h volume across snapshots, or None with no history.
    pub fn avg_volume(&self, symbol: &str) -> Option<f32> {
        let inner = self.inner.lock().expect("baseline history poisoned");
        let buf = inner.symbols.get(symbol)?;
        if buf.is_empty() {
            return None;
        }
        let sum: u64 = buf.iter().map(|s| s.volume_1h as u64).sum();
        Some(sum as f32 / buf.len() as f32)
    }

    /// Percentile rank (0..=100) of `score` against recorded snapshots.
    pub fn percentile(&self, symbol: &str, score: f32) -> Option<f32> {
        let inner = self.inner.lock().expect("baseline history poisoned");
        let buf = inner.symbols.get(symbol)?;
        if buf.is_empty() {
            return None;
        }
        let below = buf.iter().filter(|s| s.score <= score).count();
        Some(100.0 * below as f32 / buf.len() as f32)
    }

    pub fn snapshot_count(&self, symbol: &str) -> usize {
        self.inner
            .lock()
            .expect("baseline history poisoned")
            .symbols
            .get(symbol)
            .map(|b| b.len())
            .unwrap_or(0)
    }

    /// Record a keyword's current trailing-hour mention count.
    pub fn record_keyword(&self, keyword: &str, mentions: u32, now: DateTime<Utc>) {
        let cutoff = now - Duration::hours(KEYWORD_RETENTION_HOURS);
        let mut inner = self.inner.lock().expect("baseline history poisoned");
        let buf = inner.keywords.entry(keyword.to_string()).or_default();
        buf.push_back((now, mentions));
        while let Some((ts, _)) = buf.front() {
            if *ts < cutoff {
                buf.pop_front();
            } else {
                break;
            }
        }
    }

    /// Historical mean hourly mentions for a keyword, excluding samples from
    /// the last hour (those describe the current window, not the baseline).
    pub fn keyword_baseline(&self, keyword: &str, now: DateTime<Utc>) -> Option<f32> {
        let recent_cutoff = now - Duration::hours(1);
        let inner = self.inner.lock().expect("baseline history poisoned");
        let buf = inner.keywords.get(keyword)?;
        let older: Vec<u32> = buf
            .iter()
            .filter(|(ts, _)| *ts < recent_cutoff)
            .map(|(_, n)| *n)
            .collect();
        if older.is_empty() {
            return None;
        }
        Some(older.iter().sum::<u32>() as f32 / older.len() as f32)
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("baseline history poisoned");
        inner.symbols.clear();
        inner.keywords.clear();
    }
}
