// src/alerts.rs
//! Alert generation and the audit trail. Anomalies, insider activity, and
//! trending topics all funnel through here so severity mapping and the
//! retention policy live in one place.

use crate::types::{
    AlertKind, AlertSeverity, AnomalyKind, InsiderActivity, MarketSentimentAlert,
    SentimentAnomaly, Significance, TrendingTopic,
};
use chrono::{DateTime, Utc};
use metrics::counter;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::info;

/// Alerts retained in memory for queries and audit.
const MAX_RETAINED: usize = 1_000;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_alert_id() -> String {
    format!("alert-{:06}", NEXT_ID.fetch_add(1, Ordering::Relaxed))
}

/// Receives every generated alert, in order. The default sink only logs;
/// a delivery pipeline would hang off this seam.
pub trait AuditSink: Send + Sync {
    fn record(&self, alert: &MarketSentimentAlert);
}

/// Default sink: structured log line per alert.
pub struct LogSink;

impl AuditSink for LogSink {
    fn record(&self, alert: &MarketSentimentAlert) {
        info!(
            id = %alert.id,
            symbol = %alert.symbol,
            kind = ?alert.kind,
            severity = ?alert.severity,
            "alert generated"
        );
    }
}

/// Bounded in-memory alert book. Oldest alerts fall off the back once the
/// retention cap is hit.
pub struct AlertBook {
    inner: Mutex<VecDeque<MarketSentimentAlert>>,
    sink: Box<dyn AuditSink>,
    generated: AtomicU64,
}

impl Default for AlertBook {
    fn default() -> Self {
        Self::new(Box::new(LogSink))
    }
}

impl AlertBook {
    pub fn new(sink: Box<dyn AuditSink>) -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            sink,
            generated: AtomicU64::new(0),
        }
    }

    pub fn push(&self, alert: MarketSentimentAlert) -> MarketSentimentAlert {
        self.sink.record(&alert);
        counter!("sentiment_alerts_generated_total").increment(1);
        self.generated.fetch_add(1, Ordering::Relaxed);
        let mut book = self.inner.lock().expect("alert book poisoned");
        book.push_back(alert.clone());
        while book.len() > MAX_RETAINED {
            book.pop_front();
        }
        alert
    }

    /// Newest first, optionally filtered by symbol and minimum severity.
    pub fn query(
        &self,
        symbol: Option<&str>,
        min_severity: Option<AlertSeverity>,
        limit: usize,
    ) -> Vec<MarketSentimentAlert> {
        let book = self.inner.lock().expect("alert book poisoned");
        book.iter()
            .rev()
            .filter(|a| symbol.is_none_or(|s| a.symbol.eq_ignore_ascii_case(s)))
            .filter(|a| min_severity.is_none_or(|m| a.severity >= m))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Marks an alert processed. Returns false for unknown ids.
    pub fn mark_processed(&self, alert_id: &str) -> bool {
        let mut book = self.inner.lock().expect("alert book poisoned");
        match book.iter_mut().find(|a| a.id == alert_id) {
            Some(a) => {
                a.processed = true;
                true
            }
            None => false,
        }
    }

    pub fn generated_total(&self) -> u64 {
        self.generated.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("alert book poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.lock().expect("alert book poisoned").clear();
    }
}

/// Anomaly severities carry straight through to the alert.
pub fn from_anomaly(
    symbol: &str,
    anomaly: &SentimentAnomaly,
    now: DateTime<Utc>,
) -> MarketSentimentAlert {
    let kind = match anomaly.kind {
        AnomalyKind::SentimentShift => AlertKind::SentimentShift,
        AnomalyKind::VolumeSpike => AlertKind::VolumeSpike,
        AnomalyKind::ViralContent => AlertKind::ViralContent,
        AnomalyKind::BotActivity => AlertKind::BotActivity,
    };
    MarketSentimentAlert {
        id: next_alert_id(),
        created_at: now,
        symbol: symbol.to_string(),
        kind,
        severity: anomaly.severity,
        message: format!("{symbol}: {}", anomaly.detail),
        data: json!({
            "anomaly_kind": anomaly.kind,
            "confidence": anomaly.confidence,
            "detail": anomaly.detail,
        }),
        recommended_actions: anomaly_actions(anomaly.kind, anomaly.severity),
        processed: false,
    }
}

fn anomaly_actions(kind: AnomalyKind, severity: AlertSeverity) -> Vec<String> {
    let mut actions = vec!["Review recent posts driving the change".to_string()];
    match kind {
        AnomalyKind::SentimentShift => {
            actions.push("Check for breaking news on the symbol".into());
        }
        AnomalyKind::VolumeSpike => {
            actions.push("Compare against historical volume baseline".into());
        }
        AnomalyKind::ViralContent => {
            actions.push("Inspect the highest-engagement items".into());
        }
        AnomalyKind::BotActivity => {
            actions.push("Discount low-integrity sources in downstream models".into());
        }
    }
    if severity >= AlertSeverity::High {
        actions.push("Escalate to the trading desk".into());
    }
    actions
}

/// High and Critical significance filings alert immediately; Critical
/// significance maps to a Critical alert.
pub fn from_insider(activity: &InsiderActivity, now: DateTime<Utc>) -> Option<MarketSentimentAlert> {
    let severity = match activity.significance {
        Significance::Critical => AlertSeverity::Critical,
        Significance::High => AlertSeverity::High,
        _ => return None,
    };
    let value = activity
        .transaction
        .as_ref()
        .map(|t| t.total_value)
        .unwrap_or(0.0);
    Some(MarketSentimentAlert {
        id: next_alert_id(),
        created_at: now,
        symbol: activity.symbol.clone(),
        kind: AlertKind::InsiderActivity,
        severity,
        message: format!(
            "{}: {} by {} ({}), ${value:.0}",
            activity.symbol,
            activity_label(activity),
            activity.insider_name,
            activity.insider_title,
        ),
        data: json!({
            "activity_id": activity.id,
            "activity_type": activity.activity_type,
            "significance": activity.significance,
            "risk_score": activity.risk_score,
            "suspicious": activity.suspicious,
            "total_value": value,
            "ownership_pct": activity.ownership_pct,
        }),
        recommended_actions: vec![
            "Cross-check the filing against the symbol's sentiment trend".into(),
            "Review the insider's prior transaction history".into(),
        ],
        processed: false,
    })
}

fn activity_label(activity: &InsiderActivity) -> &'static str {
    use crate::types::InsiderActivityType::*;
    match activity.activity_type {
        Purchase => "insider purchase",
        Sale => "insider sale",
        OptionExercise => "option exercise",
        Grant => "equity grant",
        OwnershipChange => "ownership change",
    }
}

/// Topics past the alert threshold get a Warning-level heads-up.
pub fn from_trending(topic: &TrendingTopic, now: DateTime<Utc>) -> MarketSentimentAlert {
    let symbol = topic
        .symbol
        .clone()
        .unwrap_or_else(|| crate::analyzer::GENERAL_BUCKET.to_string());
    MarketSentimentAlert {
        id: next_alert_id(),
        created_at: now,
        symbol,
        kind: AlertKind::TrendingTopic,
        severity: AlertSeverity::Warning,
        message: format!(
            "\"{}\" is trending (score {:.0}, {:+.0}% mentions)",
            topic.keyword, topic.trend_score, topic.mention_growth_pct
        ),
        data: json!({
            "keyword": topic.keyword,
            "trend_score": topic.trend_score,
            "velocity": topic.velocity,
            "sentiment_trend": topic.sentiment_trend,
        }),
        recommended_actions: vec!["Sample recent posts mentioning the keyword".into()],
        processed: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insider::{process_filing, Filing};
    use crate::types::{InsiderActivityType, InsiderTransaction};

    fn anomaly(severity: AlertSeverity) -> SentimentAnomaly {
        SentimentAnomaly {
            kind: AnomalyKind::SentimentShift,
            severity,
            confidence: 0.9,
            detail: "shift 0.85 vs baseline".into(),
            detected_at: Utc::now(),
        }
    }

    #[test]
    fn anomaly_severity_passes_through() {
        let a = from_anomaly("AAPL", &anomaly(AlertSeverity::Critical), Utc::now());
        assert_eq!(a.kind, AlertKind::SentimentShift);
        assert_eq!(a.severity, AlertSeverity::Critical);
        assert!(a.message.contains("AAPL"));
        assert!(!a.processed);
        assert!(a.recommended_actions.len() >= 2);
    }

    #[test]
    fn insider_alert_only_for_high_and_critical() {
        let filing = |value: f64| Filing {
            symbol: "TSLA".into(),
            filed_at: Utc::now(),
            activity_type: InsiderActivityType::Sale,
            insider_name: "A. Smith".into(),
            insider_title: "CEO".into(),
            relationship: "officer".into(),
            transaction: Some(InsiderTransaction {
                kind: InsiderActivityType::Sale,
                shares: 1,
                price_per_share: value,
                total_value: value,
            }),
            ownership_pct: 0.5,
            days_to_earnings: None,
        };

        let critical = process_filing(&filing(20_000_000.0), None);
        let alert = from_insider(&critical, Utc::now()).expect("critical filing alerts");
        assert_eq!(alert.severity, AlertSeverity::Critical);

        let high = process_filing(&filing(2_000_000.0), None);
        let alert = from_insider(&high, Utc::now()).expect("high filing alerts");
        assert_eq!(alert.severity, AlertSeverity::High);

        let medium = process_filing(&filing(200_000.0), None);
        assert!(from_insider(&medium, Utc::now()).is_none());
    }

    #[test]
    fn book_caps_retention_and_marks_processed() {
        let book = AlertBook::default();
        let first_id;
        {
            let a = book.push(from_anomaly("MSFT", &anomaly(AlertSeverity::Warning), Utc::now()));
            first_id = a.id.clone();
        }
        for _ in 0..MAX_RETAINED {
            book.push(from_anomaly("MSFT", &anomaly(AlertSeverity::Warning), Utc::now()));
        }
        assert_eq!(book.len(), MAX_RETAINED);
        // The first alert fell off the back.
        assert!(!book.mark_processed(&first_id));

        let recent = book.query(Some("MSFT"), None, 5);
        assert_eq!(recent.len(), 5);
        assert!(book.mark_processed(&recent[0].id));
        let again = book.query(Some("MSFT"), None, 1);
        assert!(again[0].processed);
    }

    #[test]
    fn query_filters_by_severity() {
        let book = AlertBook::default();
        book.push(from_anomaly("NVDA", &anomaly(AlertSeverity::Warning), Utc::now()));
        book.push(from_anomaly("NVDA", &anomaly(AlertSeverity::Critical), Utc::now()));
        let hits = book.query(None, Some(AlertSeverity::High), 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].severity, AlertSeverity::Critical);
    }
}
