// src/analyzer/symbols.rs
//! Symbol extraction: cashtags, "<SYMBOL> stock" phrasing, and a known-symbol
//! allowlist. No match falls back to the synthetic "GENERAL" bucket.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

pub const GENERAL_BUCKET: &str = "GENERAL";

static RE_CASHTAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$([A-Z]{1,6})\b").unwrap());
static RE_STOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([A-Z]{1,6})\s+stock\b").unwrap());

/// Symbols recognized without a cashtag. Kept small on purpose; the real
/// universe comes from the instrument service upstream.
static ALLOWLIST: Lazy<BTreeSet<&'static str>> = Lazy::new(|| {
    [
        "AAPL", "MSFT", "GOOGL", "AMZN", "META", "NVDA", "TSLA", "AMD", "NFLX", "INTC", "SPY",
        "QQQ", "GME", "AMC", "COIN", "JPM", "BAC", "GS", "DIS", "BA",
    ]
    .into_iter()
    .collect()
});

/// Extract the matched symbols for one text, deduplicated and uppercased.
/// Always returns at least one entry.
pub fn extract_symbols(text: &str) -> Vec<String> {
    let mut found: BTreeSet<String> = BTreeSet::new();

    for cap in RE_CASHTAG.captures_iter(text) {
        found.insert(cap[1].to_string());
    }
    for cap in RE_STOCK.captures_iter(text) {
        found.insert(cap[1].to_string());
    }
    for token in text.split(|c: char| !c.is_ascii_alphanumeric()) {
        if token.len() >= 2 && ALLOWLIST.contains(token) {
            found.insert(token.to_string());
        }
    }

    if found.is_empty() {
        vec![GENERAL_BUCKET.to_string()]
    } else {
        found.into_iter().collect()
    }
}

/// True when the text names the instrument explicitly (cashtag or allowlist
/// hit), as opposed to landing in the GENERAL bucket.
pub fn has_explicit_mention(text: &str) -> bool {
    RE_CASHTAG.is_match(text)
        || RE_STOCK.is_match(text)
        || text
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|t| t.len() >= 2 && ALLOWLIST.contains(t))
}
