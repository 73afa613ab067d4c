// src/aggregator.rs
//! Windowed aggregation: recomputes a full AggregatedSentiment per
//! (symbol, timeframe) from a point-in-time item snapshot. Wholesale
//! replacement every cycle; deterministic over a frozen item set.

use crate::anomaly::weighted_mean_score;
use crate::history::BaselineHistory;
use crate::sources::SourceRegistry;
use crate::types::{
    AggregatedSentiment, AnalyzedSentimentItem, KeywordStat, SentimentAnomaly, SentimentLabel,
    SourceBreakdown, Timeframe, VolumeMetrics,
};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

const TOP_KEYWORDS: usize = 10;
/// Aggregate confidence is damped linearly below this sample size.
const FULL_CONFIDENCE_SAMPLES: usize = 10;

/// Compute one (symbol, timeframe) aggregate from the symbol's 24h items.
/// `anomalies` were evaluated once per symbol on the 1h window and ride
/// along on every timeframe's aggregate.
pub fn aggregate(
    symbol: &str,
    timeframe: Timeframe,
    items_24h: &[AnalyzedSentimentItem],
    anomalies: &[SentimentAnomaly],
    registry: &SourceRegistry,
    history: &BaselineHistory,
    now: DateTime<Utc>,
) -> AggregatedSentiment {
    let cutoff = now - Duration::seconds(timeframe.duration_secs());
    let window: Vec<&AnalyzedSentimentItem> =
        items_24h.iter().filter(|it| it.timestamp >= cutoff).collect();

    let Some(score) = weighted_mean_score(window.iter().copied()) else {
        // Zero items or zero total weight: the well-defined empty aggregate.
        return AggregatedSentiment::empty(symbol, timeframe, now);
    };

    let n = window.len();
    let magnitude = window.iter().map(|it| it.magnitude).sum::<f32>() / n as f32;
    let label = SentimentLabel::from_score(score);

    let mean_confidence = window.iter().map(|it| it.confidence as f32).sum::<f32>() / n as f32;
    let damping = (n as f32 / FULL_CONFIDENCE_SAMPLES as f32).min(1.0);
    let confidence = (mean_confidence * damping).round().clamp(0.0, 100.0) as u8;

    let volume = volume_metrics(&window, magnitude, timeframe, symbol, history);
    let source_breakdown = source_breakdown(&window, registry);
    let top_keywords = top_keywords(&window);
    let historical_percentile = history.percentile(symbol, score);

    AggregatedSentiment {
        symbol: symbol.to_string(),
        timeframe,
        score,
        magnitude,
        label,
        confidence,
        volume,
        source_breakdown,
        top_keywords,
        anomalies: anomalies.to_vec(),
        historical_percentile,
        computed_at: now,
    }
}

fn volume_metrics(
    window: &[&AnalyzedSentimentItem],
    magnitude: f32,
    timeframe: Timeframe,
    symbol: &str,
    history: &BaselineHistory,
) -> VolumeMetrics {
    let total_mentions = window.len() as u32;
    let unique_authors = {
        let mut authors: Vec<&str> = window.iter().map(|it| it.author.as_str()).collect();
        authors.sort_unstable();
        authors.dedup();
        authors.len() as u32
    };
    let total_reach: u64 = window.iter().map(|it| it.reach).sum();
    let avg_engagement_rate =
        window.iter().map(|it| it.engagement_rate).sum::<f32>() / total_mentions.max(1) as f32;

    // Trending score: mention growth vs the symbol's baseline volume, plus
    // engagement and magnitude components.
    let hourly_rate = total_mentions as f32 * 3600.0 / timeframe.duration_secs() as f32;
    let growth_component = match history.avg_volume(symbol) {
        Some(avg) if avg > 0.0 => ((hourly_rate / avg).min(3.0) / 3.0) * 50.0,
        // No baseline yet: neutral midpoint rather than an extreme.
        _ => 25.0,
    };
    let engagement_component = (avg_engagement_rate / 20.0).min(1.0) * 25.0;
    let magnitude_component = magnitude * 25.0;
    let trending_score =
        (growth_component + engagement_component + magnitude_component).clamp(0.0, 100.0);

    VolumeMetrics {
        total_mentions,
        unique_authors,
        total_reach,
        avg_engagement_rate,
        trending_score,
    }
}

fn source_breakdown(
    window: &[&AnalyzedSentimentItem],
    registry: &SourceRegistry,
) -> Vec<SourceBreakdown> {
    let mut per_source: BTreeMap<&str, (u32, f32)> = BTreeMap::new();
    for it in window {
        let e = per_source.entry(it.source_id.as_str()).or_insert((0, 0.0));
        e.0 += 1;
        e.1 += it.score;
    }
    per_source
        .into_iter()
        .map(|(source_id, (mentions, sum))| SourceBreakdown {
            source_id: source_id.to_string(),
            mentions,
            avg_score: sum / mentions as f32,
            reliability_weight: registry.reliability_weight(source_id),
        })
        .collect()
}

fn top_keywords(window: &[&AnalyzedSentimentItem]) -> Vec<KeywordStat> {
    // BTreeMap keeps the frequency tiebreak deterministic (keyword order).
    let mut table: BTreeMap<&str, (u32, f32, f32)> = BTreeMap::new();
    for it in window {
        for kw in &it.keywords {
            let e = table.entry(kw.as_str()).or_insert((0, 0.0, 0.0));
            e.0 += 1;
            e.1 += it.score;
            e.2 += it.relevance as f32;
        }
    }
    let mut stats: Vec<KeywordStat> = table
        .into_iter()
        .map(|(keyword, (mentions, score_sum, rel_sum))| KeywordStat {
            keyword: keyword.to_string(),
            mentions,
            avg_score: score_sum / mentions as f32,
            avg_relevance: rel_sum / mentions as f32,
        })
        .collect();
    stats.sort_by(|a, b| b.mentions.cmp(&a.mentions).then(a.keyword.cmp(&b.keyword)));
    stats.truncate(TOP_KEYWORDS);
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ImpactTier, IntegrityFlags, PlatformFamily, SentimentSource};

    fn registry() -> SourceRegistry {
        let reg = SourceRegistry::new();
        reg.register(SentimentSource {
            id: "twitter_api".into(),
            platform: PlatformFamily::Social,
            credential: None,
            reliability_weight: 55,
            update_frequency_secs: 15,
            hourly_request_ceiling: 240,
            active: true,
        })
        .unwrap();
        reg
    }

    fn item(
        source: &str,
        score: f32,
        confidence: u8,
        keywords: &[&str],
        age_mins: i64,
        now: DateTime<Utc>,
    ) -> AnalyzedSentimentItem {
        AnalyzedSentimentItem {
            source_id: source.into(),
            symbols: vec!["AAPL".into()],
            timestamp: now - Duration::minutes(age_mins),
            author: format!("author-{score}-{age_mins}"),
            followers: 100,
            verified: false,
            language: "en".into(),
            score,
            magnitude: score.abs(),
            label: SentimentLabel::from_score(score),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            entities: vec![],
            reach: 150,
            engagement_rate: 2.0,
            relevance: 60,
            impact: ImpactTier::Medium,
            urgency: ImpactTier::Low,
            confidence,
            flags: IntegrityFlags::default(),
        }
    }

    #[test]
    fn confidence_weighted_mean_and_breakdown() {
        let now = Utc::now();
        let reg = registry();
        let history = BaselineHistory::new();
        let items = vec![
            item("twitter_api", 1.0, 80, &["rally"], 5, now),
            item("twitter_api", 0.0, 20, &["rally", "earnings"], 10, now),
        ];
        let agg = aggregate("AAPL", Timeframe::H1, &items, &[], &reg, &history, now);
        // (1.0*80 + 0.0*20) / 100 = 0.8
        assert!((agg.score - 0.8).abs() < 1e-6);
        assert_eq!(agg.volume.total_mentions, 2);
        assert_eq!(agg.volume.unique_authors, 2);
        assert_eq!(agg.source_breakdown.len(), 1);
        assert_eq!(agg.source_breakdown[0].reliability_weight, 55);
        assert_eq!(agg.top_keywords[0].keyword, "rally");
        assert_eq!(agg.top_keywords[0].mentions, 2);
    }

    #[test]
    fn window_filter_respects_timeframe() {
        let now = Utc::now();
        let reg = registry();
        let history = BaselineHistory::new();
        let items = vec![
            item("twitter_api", 0.5, 50, &[], 0, now),
            item("twitter_api", -0.5, 50, &[], 30, now), // outside 15m
        ];
        let m15 = aggregate("AAPL", Timeframe::M15, &items, &[], &reg, &history, now);
        assert_eq!(m15.volume.total_mentions, 1);
        let h1 = aggregate("AAPL", Timeframe::H1, &items, &[], &reg, &history, now);
        assert_eq!(h1.volume.total_mentions, 2);
    }

    #[test]
    fn empty_window_yields_empty_aggregate() {
        let now = Utc::now();
        let reg = registry();
        let history = BaselineHistory::new();
        let items = vec![item("twitter_api", 0.9, 90, &[], 120, now)]; // outside 1m
        let agg = aggregate("AAPL", Timeframe::M1, &items, &[], &reg, &history, now);
        assert_eq!(agg, AggregatedSentiment::empty("AAPL", Timeframe::M1, now));
    }

    #[test]
    fn aggregation_is_deterministic_over_frozen_items() {
        let now = Utc::now();
        let reg = registry();
        let history = BaselineHistory::new();
        history.record("AAPL", 0.2, 3, now - Duration::hours(2));
        let items: Vec<_> = (0..12)
            .map(|i| item("twitter_api", 0.4, 70, &["earnings", "rally"], i, now))
            .collect();
        let a = aggregate("AAPL", Timeframe::H1, &items, &[], &reg, &history, now);
        let b = aggregate("AAPL", Timeframe::H1, &items, &[], &reg, &history, now);
        assert_eq!(a, b);
    }

    #[test]
    fn small_samples_damp_confidence() {
        let now = Utc::now();
        let reg = registry();
        let history = BaselineHistory::new();
        let one = vec![item("twitter_api", 0.5, 80, &[], 0, now)];
        let agg = aggregate("AAPL", Timeframe::H1, &one, &[], &reg, &history, now);
        assert_eq!(agg.confidence, 8); // 80 * 1/10
    }
}
