// src/sources/scheduler.rs
//! Per-source polling loops. Each active source gets its own task that
//! ticks at the source's configured frequency, checks the hourly request
//! ceiling, fetches through the adapter, normalizes, and enqueues with a
//! priority computed from the source's reliability weight.

use crate::queue::{priority_score, IngestQueue};
use crate::sources::adapters::{normalize_text, SourceAdapter};
use crate::sources::{HealthBoard, SourceRegistry};
use crate::types::RawContentItem;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Spawns the polling loop for one source. The caller owns the handle and
/// aborts it on shutdown or deactivation.
pub fn spawn_source_loop(
    adapter: Arc<dyn SourceAdapter>,
    registry: Arc<SourceRegistry>,
    health: Arc<HealthBoard>,
    queue: Arc<IngestQueue>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let source_id = adapter.source_id().to_string();
        let Some(source) = registry.get(&source_id) else {
            warn!(source = %source_id, "loop spawned for unregistered source");
            return;
        };
        let mut ticker =
            tokio::time::interval(Duration::from_secs(source.update_frequency_secs.max(1)));
        loop {
            ticker.tick().await;
            let now = chrono::Utc::now();

            // Deactivated sources idle rather than exit, so reactivation
            // needs no respawn.
            match registry.get(&source_id) {
                Some(s) if s.active => {}
                _ => continue,
            }

            if health.requests_last_hour(&source_id, now) >= source.hourly_request_ceiling {
                counter!("sentiment_source_rate_limited_total", "source" => source_id.clone())
                    .increment(1);
                debug!(source = %source_id, "hourly ceiling reached; skipping tick");
                continue;
            }
            health.record_request(&source_id, now);

            // Fetch without holding any lock.
            match adapter.fetch_latest().await {
                Ok(posts) => {
                    let weight = registry.reliability_weight(&source_id);
                    let mut accepted = 0u64;
                    for mut post in posts {
                        post.text = normalize_text(&post.text);
                        if post.text.is_empty() {
                            continue;
                        }
                        let priority = priority_score(weight, &post);
                        let item = RawContentItem {
                            source_id: source_id.clone(),
                            post,
                            received_at: now,
                            priority,
                        };
                        if queue.push(item) {
                            accepted += 1;
                        }
                    }
                    health.record_success(&source_id, accepted, now);
                    counter!("sentiment_items_ingested_total", "source" => source_id.clone())
                        .increment(accepted);
                    debug!(source = %source_id, accepted, "ingest tick");
                }
                Err(err) => {
                    health.record_failure(&source_id);
                    counter!("sentiment_source_errors_total", "source" => source_id.clone())
                        .increment(1);
                    warn!(source = %source_id, error = %err, "fetch failed");
                }
            }
        }
    })
}

/// One pass of a source's tick body, synchronous apart from the fetch.
/// Exists so the pipeline is testable without timers.
pub async fn poll_source_once(
    adapter: &dyn SourceAdapter,
    registry: &SourceRegistry,
    health: &HealthBoard,
    queue: &IngestQueue,
    now: chrono::DateTime<chrono::Utc>,
) -> anyhow::Result<u64> {
    let source_id = adapter.source_id();
    let source = registry
        .get(source_id)
        .ok_or_else(|| anyhow::anyhow!("unknown source: {source_id}"))?;
    if health.requests_last_hour(source_id, now) >= source.hourly_request_ceiling {
        return Ok(0);
    }
    health.record_request(source_id, now);
    match adapter.fetch_latest().await {
        Ok(posts) => {
            let weight = registry.reliability_weight(source_id);
            let mut accepted = 0u64;
            for mut post in posts {
                post.text = normalize_text(&post.text);
                if post.text.is_empty() {
                    continue;
                }
                let priority = priority_score(weight, &post);
                if queue.push(RawContentItem {
                    source_id: source_id.to_string(),
                    post,
                    received_at: now,
                    priority,
                }) {
                    accepted += 1;
                }
            }
            health.record_success(source_id, accepted, now);
            Ok(accepted)
        }
        Err(err) => {
            health.record_failure(source_id);
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::adapters::MockSocialAdapter;
    use crate::types::{PlatformFamily, SentimentSource};
    use chrono::Utc;

    fn source(id: &str, ceiling: u32) -> SentimentSource {
        SentimentSource {
            id: id.into(),
            platform: PlatformFamily::Social,
            credential: None,
            reliability_weight: 55,
            update_frequency_secs: 15,
            hourly_request_ceiling: ceiling,
            active: true,
        }
    }

    #[tokio::test]
    async fn poll_enqueues_normalized_items() {
        let registry = SourceRegistry::new();
        registry.register(source("twitter_api", 240)).unwrap();
        let health = HealthBoard::new();
        health.track("twitter_api", Utc::now());
        let queue = IngestQueue::new(crate::queue::DEFAULT_CAPACITY);
        let adapter = MockSocialAdapter::new("twitter_api");

        let n = poll_source_once(&adapter, &registry, &health, &queue, Utc::now())
            .await
            .unwrap();
        assert!(n > 0);
        assert_eq!(queue.len() as u64, n);
    }

    #[tokio::test]
    async fn ceiling_skips_the_fetch() {
        let registry = SourceRegistry::new();
        registry.register(source("twitter_api", 2)).unwrap();
        let health = HealthBoard::new();
        let now = Utc::now();
        health.track("twitter_api", now);
        health.record_request("twitter_api", now);
        health.record_request("twitter_api", now);

        let queue = IngestQueue::new(crate::queue::DEFAULT_CAPACITY);
        let adapter = MockSocialAdapter::new("twitter_api");
        let n = poll_source_once(&adapter, &registry, &health, &queue, now)
            .await
            .unwrap();
        assert_eq!(n, 0);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn unknown_source_is_an_error() {
        let registry = SourceRegistry::new();
        let health = HealthBoard::new();
        let queue = IngestQueue::new(16);
        let adapter = MockSocialAdapter::new("ghost");
        let res = poll_source_once(&adapter, &registry, &health, &queue, Utc::now()).await;
        assert!(res.is_err());
    }
}
