// src/analyzer/relevance.rs
//! Market-relevance scoring and keyword/entity extraction.
//!
//! Relevance is 0..=100: explicit instrument mention + financial keywords +
//! general market terms + a platform bonus, capped. The keyword tables also
//! feed the per-aggregate keyword stats and the trending detector.

use crate::analyzer::symbols::has_explicit_mention;
use crate::types::PlatformFamily;
use once_cell::sync::Lazy;
use std::collections::BTreeSet;

const SYMBOL_MENTION_BONUS: u32 = 40;
const FINANCIAL_KEYWORD_BONUS: u32 = 8;
const FINANCIAL_KEYWORD_CAP: u32 = 40;
const MARKET_TERM_BONUS: u32 = 5;
const MARKET_TERM_CAP: u32 = 20;
const PLATFORM_BONUS: u32 = 10;

static FINANCIAL_KEYWORDS: Lazy<BTreeSet<&'static str>> = Lazy::new(|| {
    [
        "earnings", "revenue", "profit", "guidance", "dividend", "buyback", "upgrade",
        "downgrade", "merger", "acquisition", "ipo", "split", "valuation", "forecast",
        "outlook", "margin", "filing", "sec", "quarterly", "estimates", "breaking",
    ]
    .into_iter()
    .collect()
});

static MARKET_TERMS: Lazy<BTreeSet<&'static str>> = Lazy::new(|| {
    [
        "stock", "stocks", "market", "markets", "trading", "shares", "bullish", "bearish",
        "rally", "crash", "volume", "breakout", "resistance", "support", "volatility",
        "futures", "options", "calls", "puts",
    ]
    .into_iter()
    .collect()
});

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_lowercase())
}

/// Relevance of one text to its matched instrument(s), 0..=100.
pub fn relevance_score(text: &str, platform: PlatformFamily) -> u8 {
    let mut score: u32 = 0;

    if has_explicit_mention(text) {
        score += SYMBOL_MENTION_BONUS;
    }

    let mut fin = 0u32;
    let mut mkt = 0u32;
    for t in tokens(text) {
        if FINANCIAL_KEYWORDS.contains(t.as_str()) {
            fin += FINANCIAL_KEYWORD_BONUS;
        } else if MARKET_TERMS.contains(t.as_str()) {
            mkt += MARKET_TERM_BONUS;
        }
    }
    score += fin.min(FINANCIAL_KEYWORD_CAP);
    score += mkt.min(MARKET_TERM_CAP);

    if matches!(platform, PlatformFamily::News | PlatformFamily::Regulatory) {
        score += PLATFORM_BONUS;
    }

    score.min(100) as u8
}

/// Keywords worth tracking: financial keywords and market terms present in
/// the text, deduplicated, in first-seen order.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for t in tokens(text) {
        if (FINANCIAL_KEYWORDS.contains(t.as_str()) || MARKET_TERMS.contains(t.as_str()))
            && seen.insert(t.clone())
        {
            out.push(t);
        }
    }
    out
}

/// Coarse category for a tracked keyword, used by the trending detector.
pub fn keyword_category(keyword: &str) -> &'static str {
    if FINANCIAL_KEYWORDS.contains(keyword) {
        "financial"
    } else if MARKET_TERMS.contains(keyword) {
        "market"
    } else {
        "general"
    }
}

/// Crude entity pass: capitalized multi-letter words that are not sentence
/// starters and not cashtags. Good enough for breakdowns and debugging.
pub fn extract_entities(text: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    let words: Vec<&str> = text.split_whitespace().collect();
    for (i, w) in words.iter().enumerate() {
        let clean: String = w.chars().filter(|c| c.is_alphanumeric()).collect();
        if i == 0 || clean.len() < 3 || w.starts_with('$') {
            continue;
        }
        let mut chars = clean.chars();
        let first_upper = chars.next().is_some_and(|c| c.is_uppercase());
        let rest_lower = chars.all(|c| c.is_lowercase());
        if first_upper && rest_lower && seen.insert(clean.clone()) {
            out.push(clean);
        }
    }
    out
}
