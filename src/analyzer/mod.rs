// src/analyzer/mod.rs
//! Per-item analysis: symbols, sentiment, relevance, engagement, tiers,
//! confidence, integrity flags. Pure and non-blocking; no I/O mid-analysis.

pub mod integrity;
pub mod lexicon;
pub mod relevance;
pub mod symbols;

use crate::types::{AnalyzedSentimentItem, ImpactTier, PlatformFamily, RawContentItem};
use anyhow::{anyhow, Result};

pub use integrity::{analysis_confidence, integrity_flags};
pub use lexicon::{score_text, score_text_jittered, SentimentScore};
pub use relevance::{extract_entities, extract_keywords, relevance_score};
pub use symbols::{extract_symbols, GENERAL_BUCKET};

const BREAKING_KEYWORDS: &[&str] = &[
    "breaking",
    "halt",
    "halted",
    "bankruptcy",
    "merger",
    "acquisition",
    "sec probe",
    "investigation",
    "earnings",
];

pub fn contains_breaking_keyword(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    BREAKING_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Analyze one queued item into an immutable [`AnalyzedSentimentItem`].
/// Malformed items (empty text) are rejected; the caller logs and skips.
pub fn analyze_item(item: &RawContentItem, platform: PlatformFamily) -> Result<AnalyzedSentimentItem> {
    let post = &item.post;
    if post.text.trim().is_empty() {
        return Err(anyhow!("empty text from source {}", item.source_id));
    }

    let symbols = extract_symbols(&post.text);
    let sentiment = score_text_jittered(&post.text);
    let relevance = relevance_score(&post.text, platform);
    let keywords = extract_keywords(&post.text);
    let entities = extract_entities(&post.text);

    let reach = post.followers + 2 * post.shares;
    let engagement_rate =
        (100.0 * post.total_engagement() as f32 / post.followers.max(1) as f32).min(100.0);

    let breaking = contains_breaking_keyword(&post.text);
    let impact = impact_tier(relevance, engagement_rate, breaking);
    let urgency = urgency_tier(engagement_rate, breaking, post.verified);
    let confidence = analysis_confidence(post, sentiment.score);
    let flags = integrity_flags(post);

    Ok(AnalyzedSentimentItem {
        source_id: item.source_id.clone(),
        symbols,
        timestamp: post.published_at,
        author: post.author.clone(),
        followers: post.followers,
        verified: post.verified,
        language: post.language.clone(),
        score: sentiment.score,
        magnitude: sentiment.magnitude,
        label: sentiment.label,
        keywords,
        entities,
        reach,
        engagement_rate,
        relevance,
        impact,
        urgency,
        confidence,
        flags,
    })
}

fn impact_tier(relevance: u8, engagement_rate: f32, breaking: bool) -> ImpactTier {
    if relevance >= 70 && (breaking || engagement_rate > 20.0) {
        ImpactTier::Critical
    } else if relevance >= 60 || engagement_rate > 20.0 {
        ImpactTier::High
    } else if relevance >= 30 {
        ImpactTier::Medium
    } else {
        ImpactTier::Low
    }
}

fn urgency_tier(engagement_rate: f32, breaking: bool, verified: bool) -> ImpactTier {
    if breaking && verified {
        ImpactTier::Critical
    } else if breaking {
        ImpactTier::High
    } else if engagement_rate > 10.0 {
        ImpactTier::Medium
    } else {
        ImpactTier::Low
    }
}
