// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod aggregator;
pub mod alerts;
pub mod analyzer;
pub mod anomaly;
pub mod api;
pub mod config;
pub mod engine;
pub mod history;
pub mod insider;
pub mod metrics;
pub mod queue;
pub mod sources;
pub mod store;
pub mod subscriptions;
pub mod trending;
pub mod types;

// ---- Re-exports for stable public API ----
pub use crate::api::create_router;
pub use crate::engine::SentimentEngine;
pub use crate::insider::Filing;
pub use crate::subscriptions::{SubscriptionId, SubscriptionOptions};
pub use crate::types::{
    AggregatedSentiment, AlertSeverity, MarketSentimentAlert, SentimentLabel, Timeframe,
    TrendingTopic,
};
