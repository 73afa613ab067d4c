// src/sources/adapters.rs
//! Adapter boundary: every platform normalizes into the fixed [`RawPost`]
//! shape before entering the shared pipeline. The mock adapters below are
//! stand-ins for real streaming/polling clients behind the same contract.

use crate::insider::Filing;
use crate::types::{InsiderActivityType, InsiderTransaction, RawPost};
use anyhow::Result;
use chrono::Utc;
use rand::seq::IndexedRandom;
use rand::Rng;

#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Registry id of the source this adapter feeds.
    fn source_id(&self) -> &str;
    /// Fetch and normalize the latest platform payloads. Runs outside any
    /// shared lock; errors are isolated to this source.
    async fn fetch_latest(&self) -> Result<Vec<RawPost>>;
}

/// Normalize raw platform text before queueing: decode HTML entities, strip
/// tags, fold typographic quotes, collapse whitespace, cap length.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out = out.trim().to_string();

    // Length cap: 1500 chars
    if out.chars().count() > 1500 {
        out = out.chars().take(1500).collect();
    }

    out
}

const MOCK_SYMBOLS: &[&str] = &["AAPL", "TSLA", "NVDA", "MSFT", "AMZN", "SPY", "GME"];

const SOCIAL_TEMPLATES: &[&str] = &[
    "${SYM} breaking out, bullish!",
    "loading up on ${SYM}, this rally has legs",
    "${SYM} looks weak, taking profit before the crash",
    "why is nobody talking about ${SYM} earnings? massive beat",
    "${SYM} to the moon, guaranteed gains, get in now",
    "dumped all my ${SYM} today, downtrend confirmed",
    "${SYM} volume surge is insane, something is brewing",
    "holding ${SYM}, strong growth story intact",
];

const NEWS_TEMPLATES: &[&str] = &[
    "${SYM} stock surges after analyst upgrade on strong profit outlook",
    "${SYM} stock falls as regulators open a probe into its accounting",
    "Breaking: ${SYM} announces record quarterly revenue and a buyback",
    "${SYM} faces downgrade amid weak guidance and slowing demand",
    "Markets steady as investors weigh rate decision ahead of earnings",
];

/// Simulated social stream. Placeholder for a real streaming client.
pub struct MockSocialAdapter {
    source_id: String,
}

impl MockSocialAdapter {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
        }
    }
}

#[async_trait::async_trait]
impl SourceAdapter for MockSocialAdapter {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    async fn fetch_latest(&self) -> Result<Vec<RawPost>> {
        let mut rng = rand::rng();
        let n = rng.random_range(1..=4);
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            let sym = *MOCK_SYMBOLS.choose(&mut rng).expect("non-empty symbol table");
            let template = *SOCIAL_TEMPLATES.choose(&mut rng).expect("non-empty templates");
            let text = template.replace("${SYM}", &format!("${sym}"));
            let followers = rng.random_range(0..200_000u64);
            out.push(RawPost {
                text,
                author: format!("trader_{}", rng.random_range(100..10_000u32)),
                followers,
                following: rng.random_range(0..5_000),
                verified: rng.random_bool(0.1),
                likes: rng.random_range(0..2_000),
                comments: rng.random_range(0..300),
                shares: rng.random_range(0..500),
                published_at: Utc::now(),
                language: "en".into(),
            });
        }
        Ok(out)
    }
}

/// Simulated news wire. Placeholder for a real polling client.
pub struct MockNewsAdapter {
    source_id: String,
}

impl MockNewsAdapter {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
        }
    }
}

#[async_trait::async_trait]
impl SourceAdapter for MockNewsAdapter {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    async fn fetch_latest(&self) -> Result<Vec<RawPost>> {
        let mut rng = rand::rng();
        let n = rng.random_range(0..=2);
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            let sym = *MOCK_SYMBOLS.choose(&mut rng).expect("non-empty symbol table");
            let template = *NEWS_TEMPLATES.choose(&mut rng).expect("non-empty templates");
            out.push(RawPost {
                text: template.replace("${SYM}", sym),
                author: "newswire".into(),
                followers: 500_000,
                following: 10,
                verified: true,
                likes: rng.random_range(0..500),
                comments: rng.random_range(0..100),
                shares: rng.random_range(0..800),
                published_at: Utc::now(),
                language: "en".into(),
            });
        }
        Ok(out)
    }
}

const INSIDER_TITLES: &[(&str, &str)] = &[
    ("CEO", "officer"),
    ("CFO", "officer"),
    ("COO", "officer"),
    ("Director", "director"),
    ("10% Owner", "owner"),
    ("VP Engineering", "other"),
];

/// Regulatory-feed boundary: filings go straight to the insider path,
/// bypassing the sentiment queue.
#[async_trait::async_trait]
pub trait FilingAdapter: Send + Sync {
    fn source_id(&self) -> &str;
    async fn fetch_latest(&self) -> Result<Vec<Filing>>;
}

/// Simulated regulatory filing feed. Placeholder for a real EDGAR client.
pub struct MockFilingAdapter {
    source_id: String,
}

impl MockFilingAdapter {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
        }
    }
}

#[async_trait::async_trait]
impl FilingAdapter for MockFilingAdapter {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Zero or one filing per poll. Filings are rare relative to posts, so
    /// most ticks produce nothing.
    async fn fetch_latest(&self) -> Result<Vec<Filing>> {
        let mut rng = rand::rng();
        if !rng.random_bool(0.4) {
            return Ok(Vec::new());
        }
        let sym = *MOCK_SYMBOLS.choose(&mut rng).expect("non-empty symbol table");
        let (title, relationship) =
            *INSIDER_TITLES.choose(&mut rng).expect("non-empty title table");
        let kind = *[
            InsiderActivityType::Sale,
            InsiderActivityType::Purchase,
            InsiderActivityType::OptionExercise,
            InsiderActivityType::Grant,
            InsiderActivityType::OwnershipChange,
        ]
        .choose(&mut rng)
        .expect("non-empty activity table");
        let shares = rng.random_range(500..200_000u64);
        let price_per_share = rng.random_range(5.0..800.0f64);
        Ok(vec![Filing {
            symbol: sym.to_string(),
            filed_at: Utc::now(),
            activity_type: kind,
            insider_name: format!("Insider {}", rng.random_range(1..500u32)),
            insider_title: title.to_string(),
            relationship: relationship.to_string(),
            transaction: Some(InsiderTransaction {
                kind,
                shares,
                price_per_share,
                total_value: shares as f64 * price_per_share,
            }),
            ownership_pct: rng.random_range(0.0..12.0f32),
            days_to_earnings: if rng.random_bool(0.5) {
                Some(rng.random_range(1..90u32))
            } else {
                None
            },
        }])
    }
}
