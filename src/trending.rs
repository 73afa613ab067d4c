// src/trending.rs
//! Cross-instrument trending keyword detection on a slow cadence.
//!
//! Each cycle produces a fresh, independent snapshot: keyword frequencies
//! across every symbol's last-hour items, growth against the keyword's
//! historical baseline, top 10 above the score floor.

use crate::analyzer::relevance::keyword_category;
use crate::history::BaselineHistory;
use crate::types::{AnalyzedSentimentItem, TrendingTopic};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};

/// Keywords below this mention count are ignored entirely.
pub const MIN_MENTIONS: u32 = 10;
/// Topics below this score are not reported.
pub const SCORE_FLOOR: f32 = 50.0;
/// Topics above this score raise an alert.
pub const ALERT_THRESHOLD: f32 = 80.0;

const MAX_TOPICS: usize = 10;

#[derive(Debug, Default)]
struct KeywordAccum {
    mentions: u32,
    score_sum: f32,
    engagement_sum: f32,
    sources: HashMap<String, u32>,
    symbols: BTreeMap<String, u32>,
}

/// Run one trending cycle over per-symbol last-hour item sets. Current counts
/// are recorded into the keyword baseline as a side effect, so the next cycle
/// sees this one as history.
pub fn detect_trending(
    hour_items_by_symbol: &HashMap<String, Vec<AnalyzedSentimentItem>>,
    history: &BaselineHistory,
    now: DateTime<Utc>,
) -> Vec<TrendingTopic> {
    // BTreeMap: cycle output order is deterministic before scoring.
    let mut accum: BTreeMap<String, KeywordAccum> = BTreeMap::new();

    for (symbol, items) in hour_items_by_symbol {
        for it in items {
            for kw in &it.keywords {
                let e = accum.entry(kw.clone()).or_default();
                e.mentions += 1;
                e.score_sum += it.score;
                e.engagement_sum += it.engagement_rate;
                *e.sources.entry(it.source_id.clone()).or_insert(0) += 1;
                *e.symbols.entry(symbol.clone()).or_insert(0) += 1;
            }
        }
    }

    let mut topics = Vec::new();
    for (keyword, acc) in &accum {
        if acc.mentions < MIN_MENTIONS {
            continue;
        }

        let baseline = history.keyword_baseline(keyword, now);
        let growth_pct = match baseline {
            Some(base) if base > 0.0 => 100.0 * (acc.mentions as f32 - base) / base,
            // A keyword with no history is treated as fully new.
            _ => 100.0,
        };

        let avg_score = acc.score_sum / acc.mentions as f32;
        let avg_engagement = acc.engagement_sum / acc.mentions as f32;

        let growth_component = (growth_pct.max(0.0).min(200.0) / 200.0) * 50.0;
        let sentiment_component = avg_score.abs().min(1.0) * 25.0;
        let engagement_component = (avg_engagement / 20.0).min(1.0) * 25.0;
        let trend_score =
            (growth_component + sentiment_component + engagement_component).clamp(0.0, 100.0);

        // Attribute the topic to a symbol only when one dominates.
        let symbol = acc
            .symbols
            .iter()
            .max_by_key(|(_, n)| **n)
            .filter(|(sym, n)| **n * 2 > acc.mentions && sym.as_str() != crate::analyzer::GENERAL_BUCKET)
            .map(|(sym, _)| sym.clone());

        topics.push(TrendingTopic {
            keyword: keyword.clone(),
            symbol,
            category: keyword_category(keyword).to_string(),
            trend_score,
            velocity: acc.mentions as f32 / 60.0,
            mention_growth_pct: growth_pct,
            sentiment_trend: avg_score,
            source_distribution: acc.sources.clone(),
            detected_at: now,
        });
    }

    // Record current counts for the next cycle's baselines.
    for (keyword, acc) in &accum {
        history.record_keyword(keyword, acc.mentions, now);
    }

    topics.retain(|t| t.trend_score > SCORE_FLOOR);
    topics.sort_by(|a, b| {
        b.trend_score
            .partial_cmp(&a.trend_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.keyword.cmp(&b.keyword))
    });
    topics.truncate(MAX_TOPICS);
    topics
}
