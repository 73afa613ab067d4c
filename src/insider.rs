// src/insider.rs
//! Insider-activity processing: a distinct, slower path for regulatory
//! filings. Each filing yields one immutable, risk-scored record.
//!
//! The suspicious-activity heuristic is a placeholder for a real rule
//! engine; tiers and scores are the stable contract.

use crate::types::{
    InsiderActivity, InsiderActivityType, InsiderTransaction, Significance,
};
use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};

const CRITICAL_VALUE: f64 = 10_000_000.0;
const HIGH_VALUE: f64 = 1_000_000.0;
const MEDIUM_VALUE: f64 = 100_000.0;
const CRITICAL_PCT: f32 = 10.0;
const HIGH_PCT: f32 = 5.0;
const MEDIUM_PCT: f32 = 1.0;

/// Transactions at or above this value within the pre-earnings window read
/// as suspicious.
const SUSPICIOUS_VALUE: f64 = 1_000_000.0;
const PRE_EARNINGS_DAYS: u32 = 14;
/// Baseline random flag rate, stand-in for signals the heuristic cannot see.
const BASELINE_FLAG_RATE: f64 = 0.05;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Normalized regulatory filing, as produced by the filing adapter.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Filing {
    pub symbol: String,
    pub filed_at: DateTime<Utc>,
    pub activity_type: InsiderActivityType,
    pub insider_name: String,
    pub insider_title: String,
    pub relationship: String,
    #[serde(default)]
    pub transaction: Option<InsiderTransaction>,
    /// Beneficial ownership percentage after the transaction.
    pub ownership_pct: f32,
    /// Days until the next scheduled earnings report, when known.
    #[serde(default)]
    pub days_to_earnings: Option<u32>,
}

/// Process one filing into an immutable record. `sentiment_now` is the
/// symbol's current 1h aggregate score, correlated at event time.
pub fn process_filing(filing: &Filing, sentiment_now: Option<f32>) -> InsiderActivity {
    let value = filing
        .transaction
        .as_ref()
        .map(|t| t.total_value)
        .unwrap_or(0.0);

    let significance = significance_tier(value, filing.ownership_pct);
    let impact_score = impact_score(value, filing.ownership_pct, &filing.insider_title);
    let suspicious = is_suspicious(value, filing.days_to_earnings);
    let risk_score = risk_score(value, filing.activity_type, filing.days_to_earnings, suspicious);

    let seq = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    InsiderActivity {
        id: format!("ins-{seq:06}"),
        timestamp: filing.filed_at,
        symbol: filing.symbol.clone(),
        activity_type: filing.activity_type,
        insider_name: filing.insider_name.clone(),
        insider_title: filing.insider_title.clone(),
        relationship: filing.relationship.clone(),
        transaction: filing.transaction.clone(),
        ownership_pct: filing.ownership_pct,
        significance,
        impact_score,
        risk_score,
        suspicious,
        sentiment_at_event: sentiment_now,
    }
}

/// Four tiers by transaction value or ownership percentage, whichever is
/// higher.
pub fn significance_tier(value: f64, ownership_pct: f32) -> Significance {
    if value >= CRITICAL_VALUE || ownership_pct >= CRITICAL_PCT {
        Significance::Critical
    } else if value >= HIGH_VALUE || ownership_pct >= HIGH_PCT {
        Significance::High
    } else if value >= MEDIUM_VALUE || ownership_pct >= MEDIUM_PCT {
        Significance::Medium
    } else {
        Significance::Low
    }
}

/// Market-impact score 0..=100, weighted by value, ownership, and insider
/// seniority.
fn impact_score(value: f64, ownership_pct: f32, title: &str) -> u8 {
    let value_component = ((value / CRITICAL_VALUE).min(1.0) * 45.0) as f32;
    let ownership_component = (ownership_pct / CRITICAL_PCT).min(1.0) * 30.0;
    let seniority_component = seniority_weight(title) * 25.0;
    (value_component + ownership_component + seniority_component)
        .clamp(0.0, 100.0)
        .round() as u8
}

fn seniority_weight(title: &str) -> f32 {
    let t = title.to_ascii_lowercase();
    if t.contains("ceo") || t.contains("cfo") || t.contains("chair") || t.contains("president") {
        1.0
    } else if t.contains("officer") || t.contains("coo") || t.contains("cto") {
        0.8
    } else if t.contains("director") {
        0.6
    } else if t.contains("owner") {
        0.5
    } else {
        0.3
    }
}

/// Large transaction shortly before earnings, plus a small baseline rate.
fn is_suspicious(value: f64, days_to_earnings: Option<u32>) -> bool {
    let pre_earnings =
        value >= SUSPICIOUS_VALUE && days_to_earnings.is_some_and(|d| d <= PRE_EARNINGS_DAYS);
    pre_earnings || rand::rng().random_bool(BASELINE_FLAG_RATE)
}

/// Risk 0..=100 from size, direction, blackout timing, and the suspicious
/// flag. Sales carry more signal than purchases.
fn risk_score(
    value: f64,
    activity_type: InsiderActivityType,
    days_to_earnings: Option<u32>,
    suspicious: bool,
) -> u8 {
    let mut r = ((value / CRITICAL_VALUE).min(1.0) * 40.0) as f32;
    r += match activity_type {
        InsiderActivityType::Sale => 20.0,
        InsiderActivityType::OptionExercise => 12.0,
        InsiderActivityType::OwnershipChange => 10.0,
        InsiderActivityType::Purchase => 5.0,
        InsiderActivityType::Grant => 2.0,
    };
    if days_to_earnings.is_some_and(|d| d <= PRE_EARNINGS_DAYS) {
        r += 20.0;
    }
    if suspicious {
        r += 20.0;
    }
    r.clamp(0.0, 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(total_value: f64) -> Option<InsiderTransaction> {
        Some(InsiderTransaction {
            kind: InsiderActivityType::Sale,
            shares: 1000,
            price_per_share: total_value / 1000.0,
            total_value,
        })
    }

    fn filing(value: f64, ownership_pct: f32) -> Filing {
        Filing {
            symbol: "AAPL".into(),
            filed_at: Utc::now(),
            activity_type: InsiderActivityType::Sale,
            insider_name: "J. Doe".into(),
            insider_title: "CFO".into(),
            relationship: "officer".into(),
            transaction: tx(value),
            ownership_pct,
            days_to_earnings: None,
        }
    }

    #[test]
    fn significance_tier_boundaries() {
        assert_eq!(significance_tier(10_000_000.0, 0.0), Significance::Critical);
        assert_eq!(significance_tier(9_999_999.0, 0.0), Significance::High);
        assert_eq!(significance_tier(0.0, 10.0), Significance::Critical);
        assert_eq!(significance_tier(1_000_000.0, 0.0), Significance::High);
        assert_eq!(significance_tier(999_999.0, 0.0), Significance::Medium);
        assert_eq!(significance_tier(0.0, 5.0), Significance::High);
        assert_eq!(significance_tier(100_000.0, 0.0), Significance::Medium);
        assert_eq!(significance_tier(99_999.0, 0.0), Significance::Low);
        assert_eq!(significance_tier(0.0, 1.0), Significance::Medium);
        assert_eq!(significance_tier(0.0, 0.9), Significance::Low);
    }

    #[test]
    fn processed_filing_carries_scores_and_identity() {
        let a = process_filing(&filing(12_000_000.0, 2.0), Some(0.3));
        assert_eq!(a.significance, Significance::Critical);
        assert!(a.impact_score > 50);
        assert!(a.risk_score >= 60); // large sale
        assert_eq!(a.sentiment_at_event, Some(0.3));
        assert!(a.id.starts_with("ins-"));

        let b = process_filing(&filing(50_000.0, 0.1), None);
        assert_eq!(b.significance, Significance::Low);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn pre_earnings_large_sale_is_suspicious_and_riskier() {
        let mut f = filing(5_000_000.0, 1.0);
        f.days_to_earnings = Some(7);
        let a = process_filing(&f, None);
        assert!(a.suspicious);
        assert!(a.risk_score >= 80);
    }

    #[test]
    fn seniority_orders_impact() {
        let ceo = impact_score(1_000_000.0, 1.0, "CEO");
        let dir = impact_score(1_000_000.0, 1.0, "Director");
        let other = impact_score(1_000_000.0, 1.0, "Analyst");
        assert!(ceo > dir && dir > other);
    }
}
