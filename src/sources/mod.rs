// src/sources/mod.rs
//! Source registry and per-source health tracking.
//!
//! The registry is the only place source configuration is validated; the
//! health board is advisory only and never halts ingestion.

pub mod adapters;
pub mod scheduler;

use crate::types::{HealthStatus, SentimentSource, SourceHealth};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, RwLock};

/// Consecutive failures before a source is reported in `error` state.
const ERROR_FAILURE_THRESHOLD: u32 = 5;
/// A source is `offline` once silent for this multiple of its interval.
const OFFLINE_INTERVAL_MULTIPLIER: i64 = 3;

/// Validated table of configured sources.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    inner: RwLock<HashMap<String, SentimentSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source. Rejects duplicate ids and invalid rate/frequency
    /// values synchronously; nothing is silently accepted.
    pub fn register(&self, source: SentimentSource) -> Result<()> {
        if source.id.trim().is_empty() {
            return Err(anyhow!("source id must not be empty"));
        }
        if source.reliability_weight > 100 {
            return Err(anyhow!(
                "source '{}': reliability_weight {} out of range 0..=100",
                source.id,
                source.reliability_weight
            ));
        }
        if source.update_frequency_secs == 0 {
            return Err(anyhow!("source '{}': update_frequency_secs must be > 0", source.id));
        }
        if source.hourly_request_ceiling == 0 {
            return Err(anyhow!("source '{}': hourly_request_ceiling must be > 0", source.id));
        }

        let mut map = self.inner.write().expect("source registry poisoned");
        if map.contains_key(&source.id) {
            return Err(anyhow!("duplicate source id: {}", source.id));
        }
        map.insert(source.id.clone(), source);
        Ok(())
    }

    pub fn set_active(&self, id: &str, active: bool) -> Result<()> {
        let mut map = self.inner.write().expect("source registry poisoned");
        match map.get_mut(id) {
            Some(s) => {
                s.active = active;
                Ok(())
            }
            None => Err(anyhow!("unknown source id: {id}")),
        }
    }

    pub fn get(&self, id: &str) -> Option<SentimentSource> {
        self.inner
            .read()
            .expect("source registry poisoned")
            .get(id)
            .cloned()
    }

    pub fn reliability_weight(&self, id: &str) -> u8 {
        self.get(id).map(|s| s.reliability_weight).unwrap_or(50)
    }

    /// Clone the table so callers can iterate without holding the lock.
    pub fn snapshot(&self) -> Vec<SentimentSource> {
        let map = self.inner.read().expect("source registry poisoned");
        let mut v: Vec<_> = map.values().cloned().collect();
        v.sort_by(|a, b| a.id.cmp(&b.id));
        v
    }

    pub fn active_count(&self) -> usize {
        self.inner
            .read()
            .expect("source registry poisoned")
            .values()
            .filter(|s| s.active)
            .count()
    }

    pub fn clear(&self) {
        self.inner.write().expect("source registry poisoned").clear();
    }
}

#[derive(Debug, Default)]
struct HealthEntry {
    registered_at: Option<DateTime<Utc>>,
    last_update: Option<DateTime<Utc>>,
    consecutive_failures: u32,
    /// Request timestamps within the trailing hour; pruned on touch.
    requests: VecDeque<DateTime<Utc>>,
    items_ingested: u64,
}

/// Tracks liveness/error/rate-limit state per source.
#[derive(Debug, Default)]
pub struct HealthBoard {
    inner: Mutex<HashMap<String, HealthEntry>>,
}

impl HealthBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&self, source_id: &str, now: DateTime<Utc>) {
        let mut map = self.inner.lock().expect("health board poisoned");
        map.entry(source_id.to_string()).or_default().registered_at = Some(now);
    }

    /// Record one outgoing request; returns the count within the last hour
    /// including this one, so the scheduler can enforce the ceiling.
    pub fn record_request(&self, source_id: &str, now: DateTime<Utc>) -> u32 {
        let mut map = self.inner.lock().expect("health board poisoned");
        let e = map.entry(source_id.to_string()).or_default();
        e.requests.push_back(now);
        prune_hour(&mut e.requests, now);
        e.requests.len() as u32
    }

    /// Count without recording, for the pre-fetch ceiling check.
    pub fn requests_last_hour(&self, source_id: &str, now: DateTime<Utc>) -> u32 {
        let mut map = self.inner.lock().expect("health board poisoned");
        let e = map.entry(source_id.to_string()).or_default();
        prune_hour(&mut e.requests, now);
        e.requests.len() as u32
    }

    pub fn record_success(&self, source_id: &str, items: u64, now: DateTime<Utc>) {
        let mut map = self.inner.lock().expect("health board poisoned");
        let e = map.entry(source_id.to_string()).or_default();
        e.last_update = Some(now);
        e.consecutive_failures = 0;
        e.items_ingested += items;
    }

    pub fn record_failure(&self, source_id: &str) {
        let mut map = self.inner.lock().expect("health board poisoned");
        let e = map.entry(source_id.to_string()).or_default();
        e.consecutive_failures += 1;
    }

    /// Advisory state snapshot for every tracked source. Precedence:
    /// rate_limited > error > offline > healthy.
    pub fn snapshot(&self, registry: &SourceRegistry, now: DateTime<Utc>) -> Vec<SourceHealth> {
        let mut map = self.inner.lock().expect("health board poisoned");
        let mut out = Vec::with_capacity(map.len());

        for source in registry.snapshot() {
            let e = map.entry(source.id.clone()).or_default();
            prune_hour(&mut e.requests, now);
            let requests_last_hour = e.requests.len() as u32;

            let silent_since = e.last_update.or(e.registered_at);
            let offline = match silent_since {
                Some(ts) => {
                    now.signed_duration_since(ts)
                        > Duration::seconds(
                            OFFLINE_INTERVAL_MULTIPLIER * source.update_frequency_secs as i64,
                        )
                }
                None => false,
            };

            let status = if requests_last_hour >= source.hourly_request_ceiling {
                HealthStatus::RateLimited
            } else if e.consecutive_failures >= ERROR_FAILURE_THRESHOLD {
                HealthStatus::Error
            } else if offline {
                HealthStatus::Offline
            } else {
                HealthStatus::Healthy
            };

            out.push(SourceHealth {
                source_id: source.id,
                status,
                last_update: e.last_update,
                consecutive_failures: e.consecutive_failures,
                requests_last_hour,
                items_ingested: e.items_ingested,
            });
        }
        out
    }

    /// Drops request timestamps older than an hour for every source.
    pub fn prune_hour(&self, now: DateTime<Utc>) {
        let mut map = self.inner.lock().expect("health board poisoned");
        for e in map.values_mut() {
            prune_hour(&mut e.requests, now);
        }
    }

    pub fn clear(&self) {
        self.inner.lock().expect("health board poisoned").clear();
    }
}

fn prune_hour(requests: &mut VecDeque<DateTime<Utc>>, now: DateTime<Utc>) {
    let cutoff = now - Duration::hours(1);
    while let Some(front) = requests.front() {
        if *front < cutoff {
            requests.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PlatformFamily;

    fn src(id: &str, freq: u64) -> SentimentSource {
        SentimentSource {
            id: id.into(),
            platform: PlatformFamily::Social,
            credential: None,
            reliability_weight: 60,
            update_frequency_secs: freq,
            hourly_request_ceiling: 100,
            active: true,
        }
    }

    #[test]
    fn register_rejects_duplicates_and_invalid_values() {
        let reg = SourceRegistry::new();
        reg.register(src("a", 10)).unwrap();
        assert!(reg.register(src("a", 10)).is_err());
        assert!(reg.register(src("", 10)).is_err());
        assert!(reg.register(src("b", 0)).is_err());

        let mut bad_weight = src("c", 10);
        bad_weight.reliability_weight = 101;
        assert!(reg.register(bad_weight).is_err());

        let mut bad_ceiling = src("d", 10);
        bad_ceiling.hourly_request_ceiling = 0;
        assert!(reg.register(bad_ceiling).is_err());
    }

    #[test]
    fn silent_source_reports_offline_after_three_intervals() {
        let reg = SourceRegistry::new();
        reg.register(src("slow", 60)).unwrap();
        let board = HealthBoard::new();
        let t0 = Utc::now();
        board.track("slow", t0);
        board.record_success("slow", 1, t0);

        // Just under 3x the interval: still healthy.
        let h = board.snapshot(&reg, t0 + Duration::seconds(179));
        assert_eq!(h[0].status, HealthStatus::Healthy);

        // Past 3x the interval: offline.
        let h = board.snapshot(&reg, t0 + Duration::seconds(181));
        assert_eq!(h[0].status, HealthStatus::Offline);
    }

    #[test]
    fn five_consecutive_failures_report_error() {
        let reg = SourceRegistry::new();
        reg.register(src("flaky", 60)).unwrap();
        let board = HealthBoard::new();
        let now = Utc::now();
        board.track("flaky", now);
        for _ in 0..4 {
            board.record_failure("flaky");
        }
        assert_eq!(board.snapshot(&reg, now)[0].status, HealthStatus::Healthy);
        board.record_failure("flaky");
        assert_eq!(board.snapshot(&reg, now)[0].status, HealthStatus::Error);

        // A success resets the streak.
        board.record_success("flaky", 0, now);
        assert_eq!(board.snapshot(&reg, now)[0].status, HealthStatus::Healthy);
    }

    #[test]
    fn exceeding_hourly_ceiling_reports_rate_limited() {
        let reg = SourceRegistry::new();
        let mut s = src("busy", 1);
        s.hourly_request_ceiling = 3;
        reg.register(s).unwrap();
        let board = HealthBoard::new();
        let now = Utc::now();
        board.track("busy", now);
        board.record_success("busy", 0, now);
        for _ in 0..4 {
            board.record_request("busy", now);
        }
        assert_eq!(board.snapshot(&reg, now)[0].status, HealthStatus::RateLimited);

        // Requests outside the rolling hour no longer count.
        let later = now + Duration::minutes(61);
        board.record_success("busy", 0, later);
        assert_eq!(board.snapshot(&reg, later)[0].status, HealthStatus::Healthy);
    }
}
