// src/queue.rs
//! Bounded, priority-ordered ingestion queue.
//!
//! Single serialization point between concurrent adapter producers and the
//! analyzer tick. Ordering: priority descending, then arrival sequence
//! ascending. At capacity new items are dropped and counted; the pipeline
//! never blocks on a full queue.

use crate::types::{RawContentItem, RawPost};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Mutex;

pub const DEFAULT_CAPACITY: usize = 10_000;
pub const DEFAULT_BATCH_SIZE: usize = 50;

const VERIFIED_BONUS: f32 = 15.0;
const BREAKING_BONUS: f32 = 20.0;
const ENGAGEMENT_BONUS_CAP: f32 = 15.0;

/// Priority score in 0..=100: source reliability weight plus bonuses for a
/// verified author, engagement magnitude, and breaking-news keywords.
pub fn priority_score(reliability_weight: u8, post: &RawPost) -> u8 {
    let mut p = reliability_weight as f32;
    if post.verified {
        p += VERIFIED_BONUS;
    }
    p += ((post.total_engagement() as f32) / 500.0).min(ENGAGEMENT_BONUS_CAP);
    if crate::analyzer::contains_breaking_keyword(&post.text) {
        p += BREAKING_BONUS;
    }
    p.clamp(0.0, 100.0).round() as u8
}

#[derive(Debug)]
struct QueuedItem {
    item: RawContentItem,
    /// Monotonic arrival counter; breaks priority ties FIFO.
    seq: u64,
}

impl PartialEq for QueuedItem {
    fn eq(&self, other: &Self) -> bool {
        self.item.priority == other.item.priority && self.seq == other.seq
    }
}
impl Eq for QueuedItem {}

impl Ord for QueuedItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: higher priority wins; equal priority favors lower seq.
        self.item
            .priority
            .cmp(&other.item.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug)]
struct Inner {
    heap: BinaryHeap<QueuedItem>,
    next_seq: u64,
    accepted: u64,
    dropped: u64,
}

/// Thread-safe priority queue with a soft capacity bound.
#[derive(Debug)]
pub struct IngestQueue {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl IngestQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                heap: BinaryHeap::new(),
                next_seq: 0,
                accepted: 0,
                dropped: 0,
            }),
            capacity: capacity.max(1),
        }
    }

    /// Append one item. Returns false when the queue is at capacity and the
    /// item was dropped.
    pub fn push(&self, item: RawContentItem) -> bool {
        let mut inner = self.inner.lock().expect("ingest queue poisoned");
        if inner.heap.len() >= self.capacity {
            inner.dropped += 1;
            metrics::counter!("ingest_queue_dropped_total").increment(1);
            tracing::debug!(source = %item.source_id, "queue at capacity, item dropped");
            return false;
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.accepted += 1;
        inner.heap.push(QueuedItem { item, seq });
        metrics::gauge!("ingest_queue_depth").set(inner.heap.len() as f64);
        true
    }

    /// Pop up to `n` items in priority order (ties FIFO). Loss- and
    /// duplication-free under concurrent pushes.
    pub fn drain_batch(&self, n: usize) -> Vec<RawContentItem> {
        let mut inner = self.inner.lock().expect("ingest queue poisoned");
        let mut out = Vec::with_capacity(n.min(inner.heap.len()));
        for _ in 0..n {
            match inner.heap.pop() {
                Some(q) => out.push(q.item),
                None => break,
            }
        }
        metrics::gauge!("ingest_queue_depth").set(inner.heap.len() as f64);
        out
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("ingest queue poisoned").heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cumulative count of items ever accepted, regardless of path in.
    pub fn accepted(&self) -> u64 {
        self.inner.lock().expect("ingest queue poisoned").accepted
    }

    pub fn dropped(&self) -> u64 {
        self.inner.lock().expect("ingest queue poisoned").dropped
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("ingest queue poisoned");
        inner.heap.clear();
        metrics::gauge!("ingest_queue_depth").set(0.0);
    }
}

impl Default for IngestQueue {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn post(text: &str) -> RawPost {
        RawPost {
            text: text.into(),
            author: "a".into(),
            followers: 10,
            following: 5,
            verified: false,
            likes: 0,
            comments: 0,
            shares: 0,
            published_at: Utc::now(),
            language: "en".into(),
        }
    }

    fn item(source: &str, priority: u8, text: &str) -> RawContentItem {
        RawContentItem {
            source_id: source.into(),
            post: post(text),
            received_at: Utc::now(),
            priority,
        }
    }

    #[test]
    fn drains_by_priority_then_arrival() {
        let q = IngestQueue::new(16);
        q.push(item("s", 40, "low"));
        q.push(item("s", 80, "high"));
        q.push(item("s", 40, "low-later"));

        let batch = q.drain_batch(3);
        assert_eq!(batch[0].post.text, "high");
        assert_eq!(batch[1].post.text, "low");
        assert_eq!(batch[2].post.text, "low-later");
    }

    #[test]
    fn bounded_drops_when_full() {
        let q = IngestQueue::new(2);
        assert!(q.push(item("s", 10, "a")));
        assert!(q.push(item("s", 10, "b")));
        assert!(!q.push(item("s", 99, "c")));
        assert_eq!(q.len(), 2);
        assert_eq!(q.dropped(), 1);
    }

    #[test]
    fn priority_score_bonuses_and_clamp() {
        let mut p = post("nothing special");
        assert_eq!(priority_score(50, &p), 50);

        p.verified = true;
        assert_eq!(priority_score(50, &p), 65);

        p.text = "breaking: big news".into();
        assert_eq!(priority_score(50, &p), 85);

        p.likes = 100_000; // engagement bonus caps at 15
        assert_eq!(priority_score(90, &p), 100);

        let plain = post("quiet");
        assert_eq!(priority_score(0, &plain), 0);
    }

    #[test]
    fn drain_on_empty_is_empty() {
        let q = IngestQueue::default();
        assert!(q.drain_batch(10).is_empty());
    }
}
