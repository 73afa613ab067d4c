// src/subscriptions.rs
//! Subscription registry and fan-out. Callbacks run synchronously on the
//! aggregation task; a panicking subscriber is logged and skipped so it
//! cannot take the pipeline or its neighbours down.

use crate::types::{AggregatedSentiment, MarketSentimentAlert, Timeframe};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, error};

/// Matches every symbol when used in a subscription's symbol list.
pub const WILDCARD: &str = "ALL";

pub type SubscriptionId = u64;

pub type SentimentCallback = Box<dyn Fn(&AggregatedSentiment) + Send + Sync>;
pub type AlertCallback = Box<dyn Fn(&MarketSentimentAlert) + Send + Sync>;

/// Optional per-subscription filters and the alert channel.
#[derive(Default)]
pub struct SubscriptionOptions {
    pub on_alert: Option<AlertCallback>,
    /// Empty means all timeframes.
    pub timeframes: Vec<Timeframe>,
    /// Empty means all sources.
    pub sources: Vec<String>,
}

struct Subscription {
    symbols: Vec<String>,
    on_sentiment: SentimentCallback,
    options: SubscriptionOptions,
}

impl Subscription {
    fn wants_symbol(&self, symbol: &str) -> bool {
        self.symbols
            .iter()
            .any(|s| s == WILDCARD || s.eq_ignore_ascii_case(symbol))
    }

    fn wants_timeframe(&self, timeframe: Timeframe) -> bool {
        self.options.timeframes.is_empty() || self.options.timeframes.contains(&timeframe)
    }

    fn wants_update(&self, update: &AggregatedSentiment) -> bool {
        if !self.wants_symbol(&update.symbol) || !self.wants_timeframe(update.timeframe) {
            return false;
        }
        if self.options.sources.is_empty() {
            return true;
        }
        self.options
            .sources
            .iter()
            .any(|s| update.source_breakdown.iter().any(|b| b.source_id == *s))
    }
}

/// Registry plus dispatch. The lock is held only while snapshotting the
/// matching subscriptions; callbacks run outside it, so a subscriber may
/// subscribe or unsubscribe from inside its own callback.
#[derive(Default)]
pub struct SubscriptionHub {
    subs: RwLock<HashMap<SubscriptionId, Arc<Subscription>>>,
    next_id: AtomicU64,
}

impl SubscriptionHub {
    pub fn subscribe(
        &self,
        symbols: Vec<String>,
        on_sentiment: SentimentCallback,
        options: SubscriptionOptions,
    ) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let symbols = symbols
            .into_iter()
            .map(|s| s.trim().to_ascii_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        let sub = Subscription {
            symbols,
            on_sentiment,
            options,
        };
        self.subs
            .write()
            .expect("subscription hub poisoned")
            .insert(id, Arc::new(sub));
        debug!(subscription_id = id, "subscriber registered");
        id
    }

    /// Returns false for unknown ids.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subs
            .write()
            .expect("subscription hub poisoned")
            .remove(&id)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.subs.read().expect("subscription hub poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.subs.write().expect("subscription hub poisoned").clear();
    }

    /// Delivers one aggregate to every matching subscriber.
    pub fn notify_sentiment(&self, update: &AggregatedSentiment) {
        let matching: Vec<(SubscriptionId, Arc<Subscription>)> = {
            let subs = self.subs.read().expect("subscription hub poisoned");
            subs.iter()
                .filter(|(_, sub)| sub.wants_update(update))
                .map(|(id, sub)| (*id, sub.clone()))
                .collect()
        };
        for (id, sub) in matching {
            let outcome = catch_unwind(AssertUnwindSafe(|| (sub.on_sentiment)(update)));
            if outcome.is_err() {
                error!(
                    subscription_id = id,
                    symbol = %update.symbol,
                    "sentiment subscriber panicked; skipping"
                );
            }
        }
    }

    /// Delivers one alert to every matching subscriber with an alert channel.
    pub fn notify_alert(&self, alert: &MarketSentimentAlert) {
        let matching: Vec<(SubscriptionId, Arc<Subscription>)> = {
            let subs = self.subs.read().expect("subscription hub poisoned");
            subs.iter()
                .filter(|(_, sub)| {
                    sub.options.on_alert.is_some() && sub.wants_symbol(&alert.symbol)
                })
                .map(|(id, sub)| (*id, sub.clone()))
                .collect()
        };
        for (id, sub) in matching {
            let Some(on_alert) = sub.options.on_alert.as_ref() else {
                continue;
            };
            let outcome = catch_unwind(AssertUnwindSafe(|| on_alert(alert)));
            if outcome.is_err() {
                error!(
                    subscription_id = id,
                    symbol = %alert.symbol,
                    "alert subscriber panicked; skipping"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AlertKind, AlertSeverity};
    use chrono::Utc;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn update(symbol: &str, timeframe: Timeframe) -> AggregatedSentiment {
        AggregatedSentiment::empty(symbol, timeframe, Utc::now())
    }

    fn alert(symbol: &str) -> MarketSentimentAlert {
        MarketSentimentAlert {
            id: "alert-000001".into(),
            created_at: Utc::now(),
            symbol: symbol.into(),
            kind: AlertKind::VolumeSpike,
            severity: AlertSeverity::Warning,
            message: "test".into(),
            data: serde_json::json!({}),
            recommended_actions: vec![],
            processed: false,
        }
    }

    #[test]
    fn symbol_and_timeframe_filters() {
        let hub = SubscriptionHub::default();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        hub.subscribe(
            vec!["aapl".into()],
            Box::new(move |_| {
                h.fetch_add(1, Ordering::Relaxed);
            }),
            SubscriptionOptions {
                timeframes: vec![Timeframe::H1],
                ..Default::default()
            },
        );

        hub.notify_sentiment(&update("AAPL", Timeframe::H1));
        hub.notify_sentiment(&update("AAPL", Timeframe::M5)); // wrong timeframe
        hub.notify_sentiment(&update("TSLA", Timeframe::H1)); // wrong symbol
        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn wildcard_matches_every_symbol() {
        let hub = SubscriptionHub::default();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        hub.subscribe(
            vec![WILDCARD.into()],
            Box::new(move |_| {
                h.fetch_add(1, Ordering::Relaxed);
            }),
            SubscriptionOptions::default(),
        );
        hub.notify_sentiment(&update("AAPL", Timeframe::M1));
        hub.notify_sentiment(&update("TSLA", Timeframe::D24));
        assert_eq!(hits.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn panicking_subscriber_does_not_block_others() {
        let hub = SubscriptionHub::default();
        hub.subscribe(
            vec!["AAPL".into()],
            Box::new(|_| panic!("subscriber bug")),
            SubscriptionOptions::default(),
        );
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        hub.subscribe(
            vec!["AAPL".into()],
            Box::new(move |_| {
                h.fetch_add(1, Ordering::Relaxed);
            }),
            SubscriptionOptions::default(),
        );

        hub.notify_sentiment(&update("AAPL", Timeframe::M1));
        hub.notify_sentiment(&update("AAPL", Timeframe::M1));
        assert_eq!(hits.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn subscriber_may_unsubscribe_itself_from_inside_the_callback() {
        let hub = Arc::new(SubscriptionHub::default());
        let slot = Arc::new(AtomicU64::new(0));
        let (h, s) = (hub.clone(), slot.clone());
        let id = hub.subscribe(
            vec![WILDCARD.into()],
            Box::new(move |_| {
                assert!(h.unsubscribe(s.load(Ordering::Relaxed)));
            }),
            SubscriptionOptions::default(),
        );
        slot.store(id, Ordering::Relaxed);

        hub.notify_sentiment(&update("AAPL", Timeframe::M1));
        assert!(hub.is_empty());
        // Already gone; no second delivery.
        hub.notify_sentiment(&update("AAPL", Timeframe::M1));
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let hub = SubscriptionHub::default();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let id = hub.subscribe(
            vec![WILDCARD.into()],
            Box::new(move |_| {
                h.fetch_add(1, Ordering::Relaxed);
            }),
            SubscriptionOptions::default(),
        );
        hub.notify_sentiment(&update("AAPL", Timeframe::M1));
        assert!(hub.unsubscribe(id));
        assert!(!hub.unsubscribe(id));
        hub.notify_sentiment(&update("AAPL", Timeframe::M1));
        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn alerts_only_reach_alert_subscribers() {
        let hub = SubscriptionHub::default();
        let sentiment_hits = Arc::new(AtomicUsize::new(0));
        let alert_hits = Arc::new(AtomicUsize::new(0));

        let s = sentiment_hits.clone();
        hub.subscribe(
            vec!["AAPL".into()],
            Box::new(move |_| {
                s.fetch_add(1, Ordering::Relaxed);
            }),
            SubscriptionOptions::default(),
        );

        let a = alert_hits.clone();
        hub.subscribe(
            vec!["AAPL".into()],
            Box::new(|_| {}),
            SubscriptionOptions {
                on_alert: Some(Box::new(move |_| {
                    a.fetch_add(1, Ordering::Relaxed);
                })),
                ..Default::default()
            },
        );

        hub.notify_alert(&alert("AAPL"));
        hub.notify_alert(&alert("TSLA"));
        assert_eq!(alert_hits.load(Ordering::Relaxed), 1);
        assert_eq!(sentiment_hits.load(Ordering::Relaxed), 0);
    }
}
