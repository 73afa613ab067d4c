// src/anomaly.rs
//! Statistical anomaly detection: recent 1h activity versus historical
//! baselines. Pure functions; the aggregation cycle feeds them snapshots.

use crate::types::{AlertSeverity, AnalyzedSentimentItem, AnomalyKind, SentimentAnomaly};
use chrono::{DateTime, Utc};

/// Minimum items in a symbol's 24h store before anything is evaluated.
pub const MIN_ITEMS: usize = 10;

const SHIFT_THRESHOLD: f32 = 0.6;
const SHIFT_CRITICAL: f32 = 0.8;
const VOLUME_MEDIUM_RATIO: f32 = 3.0;
const VOLUME_HIGH_RATIO: f32 = 5.0;
/// A >500% increase over baseline maps to a critical alert downstream.
const VOLUME_CRITICAL_RATIO: f32 = 6.0;
const VIRAL_ENGAGEMENT_RATE: f32 = 20.0;
const VIRAL_SHARE: f32 = 0.10;
const BOT_SHARE: f32 = 0.30;

#[derive(Debug, Clone, Copy)]
pub struct SymbolBaseline {
    /// Mean historical 1h sentiment, when any snapshots exist.
    pub sentiment: Option<f32>,
    /// Mean historical 1h volume.
    pub volume: Option<f32>,
}

/// Evaluate one symbol. `total_items` is the 24h store size for the symbol;
/// below [`MIN_ITEMS`] nothing is evaluated regardless of magnitude.
pub fn detect(
    total_items: usize,
    hour_items: &[AnalyzedSentimentItem],
    baseline: SymbolBaseline,
    now: DateTime<Utc>,
) -> Vec<SentimentAnomaly> {
    if total_items < MIN_ITEMS {
        return Vec::new();
    }

    let mut out = Vec::new();

    if let Some(a) = detect_sentiment_shift(hour_items, baseline.sentiment, now) {
        out.push(a);
    }
    if let Some(a) = detect_volume_spike(hour_items.len(), baseline.volume, now) {
        out.push(a);
    }
    if let Some(a) = detect_viral_content(hour_items, now) {
        out.push(a);
    }
    if let Some(a) = detect_bot_activity(hour_items, now) {
        out.push(a);
    }
    out
}

/// Confidence-weighted mean score of a window; None with zero total weight.
pub fn weighted_mean_score<'a, I>(items: I) -> Option<f32>
where
    I: IntoIterator<Item = &'a AnalyzedSentimentItem>,
{
    let mut sum = 0.0f32;
    let mut weight = 0.0f32;
    for it in items {
        let w = it.confidence as f32;
        sum += it.score * w;
        weight += w;
    }
    if weight > 0.0 {
        Some(sum / weight)
    } else {
        None
    }
}

fn detect_sentiment_shift(
    hour_items: &[AnalyzedSentimentItem],
    baseline: Option<f32>,
    now: DateTime<Utc>,
) -> Option<SentimentAnomaly> {
    let baseline = baseline?;
    let mean = weighted_mean_score(hour_items)?;
    let delta = (mean - baseline).abs();
    if delta <= SHIFT_THRESHOLD {
        return None;
    }
    let severity = if delta > SHIFT_CRITICAL {
        AlertSeverity::Critical
    } else {
        AlertSeverity::High
    };
    let overshoot = ((delta - SHIFT_THRESHOLD) / (1.0 - SHIFT_THRESHOLD)).clamp(0.0, 1.0);
    let sample = (hour_items.len() as f32 / 50.0).min(1.0);
    Some(SentimentAnomaly {
        kind: AnomalyKind::SentimentShift,
        severity,
        confidence: (0.5 + 0.3 * overshoot + 0.2 * sample).min(1.0),
        detail: format!(
            "1h mean sentiment {mean:.2} vs baseline {baseline:.2} (shift {delta:.2})"
        ),
        detected_at: now,
    })
}

fn detect_volume_spike(
    hour_count: usize,
    avg_volume: Option<f32>,
    now: DateTime<Utc>,
) -> Option<SentimentAnomaly> {
    let avg = avg_volume?;
    if avg <= 0.0 {
        return None;
    }
    let ratio = hour_count as f32 / avg;
    if ratio <= VOLUME_MEDIUM_RATIO {
        return None;
    }
    let severity = if ratio > VOLUME_CRITICAL_RATIO {
        AlertSeverity::Critical
    } else if ratio > VOLUME_HIGH_RATIO {
        AlertSeverity::High
    } else {
        AlertSeverity::Warning
    };
    Some(SentimentAnomaly {
        kind: AnomalyKind::VolumeSpike,
        severity,
        confidence: ((ratio - VOLUME_MEDIUM_RATIO) / VOLUME_MEDIUM_RATIO).clamp(0.2, 1.0),
        detail: format!("1h volume {hour_count} vs historical average {avg:.1} ({ratio:.1}x)"),
        detected_at: now,
    })
}

fn detect_viral_content(
    hour_items: &[AnalyzedSentimentItem],
    now: DateTime<Utc>,
) -> Option<SentimentAnomaly> {
    if hour_items.is_empty() {
        return None;
    }
    let viral = hour_items
        .iter()
        .filter(|it| it.engagement_rate > VIRAL_ENGAGEMENT_RATE)
        .count();
    let share = viral as f32 / hour_items.len() as f32;
    if share <= VIRAL_SHARE {
        return None;
    }
    Some(SentimentAnomaly {
        kind: AnomalyKind::ViralContent,
        severity: AlertSeverity::Warning,
        confidence: share.min(1.0),
        detail: format!(
            "{viral} of {} recent items exceed {VIRAL_ENGAGEMENT_RATE:.0}% engagement rate",
            hour_items.len()
        ),
        detected_at: now,
    })
}

fn detect_bot_activity(
    hour_items: &[AnalyzedSentimentItem],
    now: DateTime<Utc>,
) -> Option<SentimentAnomaly> {
    if hour_items.is_empty() {
        return None;
    }
    let bots = hour_items.iter().filter(|it| it.flags.bot).count();
    let share = bots as f32 / hour_items.len() as f32;
    if share <= BOT_SHARE {
        return None;
    }
    Some(SentimentAnomaly {
        kind: AnomalyKind::BotActivity,
        severity: AlertSeverity::High,
        confidence: share.min(1.0),
        detail: format!(
            "{bots} of {} recent items flagged as bot activity",
            hour_items.len()
        ),
        detected_at: now,
    })
}
