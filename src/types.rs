//! Core data model shared across the pipeline.
//!
//! Everything here is plain data: serde-friendly, no I/O, no locks. The
//! mutable registries live in `engine.rs`; these types only describe the
//! items flowing between stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Fixed set of aggregation windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "24h")]
    D24,
}

impl Timeframe {
    pub const fn duration_secs(self) -> i64 {
        match self {
            Timeframe::M1 => 60,
            Timeframe::M5 => 5 * 60,
            Timeframe::M15 => 15 * 60,
            Timeframe::H1 => 3600,
            Timeframe::H4 => 4 * 3600,
            Timeframe::D24 => 24 * 3600,
        }
    }

    pub const fn all() -> [Timeframe; 6] {
        [
            Timeframe::M1,
            Timeframe::M5,
            Timeframe::M15,
            Timeframe::H1,
            Timeframe::H4,
            Timeframe::D24,
        ]
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D24 => "24h",
        }
    }
}

impl FromStr for Timeframe {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1m" => Ok(Timeframe::M1),
            "5m" => Ok(Timeframe::M5),
            "15m" => Ok(Timeframe::M15),
            "1h" => Ok(Timeframe::H1),
            "4h" => Ok(Timeframe::H4),
            "24h" => Ok(Timeframe::D24),
            other => Err(anyhow::anyhow!("unknown timeframe: {other}")),
        }
    }
}

/// Five-level sentiment label with fixed score thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentLabel {
    VeryPositive,
    Positive,
    Neutral,
    Negative,
    VeryNegative,
}

impl SentimentLabel {
    /// Thresholds: >0.6 very_positive, >0.2 positive, >-0.2 neutral,
    /// >-0.6 negative, else very_negative.
    pub fn from_score(score: f32) -> Self {
        if score > 0.6 {
            SentimentLabel::VeryPositive
        } else if score > 0.2 {
            SentimentLabel::Positive
        } else if score > -0.2 {
            SentimentLabel::Neutral
        } else if score > -0.6 {
            SentimentLabel::Negative
        } else {
            SentimentLabel::VeryNegative
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformFamily {
    Social,
    News,
    Regulatory,
}

/// Per-source configuration. Created at configuration time; mutated only by
/// config updates through the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentSource {
    pub id: String,
    pub platform: PlatformFamily,
    #[serde(default)]
    pub credential: Option<String>,
    /// Trust weight in 0..=100; feeds queue priority and source breakdowns.
    pub reliability_weight: u8,
    /// Poll/stream interval in seconds.
    pub update_frequency_secs: u64,
    /// Hard ceiling on requests per rolling hour.
    pub hourly_request_ceiling: u32,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

/// The one normalized shape every adapter must produce, regardless of the
/// platform wire protocol behind it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPost {
    pub text: String,
    pub author: String,
    pub followers: u64,
    pub following: u64,
    pub verified: bool,
    pub likes: u64,
    pub comments: u64,
    pub shares: u64,
    pub published_at: DateTime<Utc>,
    pub language: String,
}

impl RawPost {
    pub fn total_engagement(&self) -> u64 {
        self.likes + self.comments + self.shares
    }
}

/// Ephemeral queue entry: produced by an adapter, consumed once by the
/// analyzer tick.
#[derive(Debug, Clone)]
pub struct RawContentItem {
    pub source_id: String,
    pub post: RawPost,
    pub received_at: DateTime<Utc>,
    pub priority: u8,
}

/// Impact / urgency tiers assigned during analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactTier {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityFlags {
    pub bot: bool,
    pub spam: bool,
    pub manipulation: bool,
    pub coordinated: bool,
}

/// One analyzed item, appended to every matched symbol's store. Immutable
/// after creation; pruned after 24h.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzedSentimentItem {
    pub source_id: String,
    /// At least one entry; "GENERAL" when nothing matched.
    pub symbols: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub author: String,
    pub followers: u64,
    pub verified: bool,
    pub language: String,
    /// Sentiment score in -1..=1.
    pub score: f32,
    /// Sentiment magnitude in 0..=1.
    pub magnitude: f32,
    pub label: SentimentLabel,
    pub keywords: Vec<String>,
    pub entities: Vec<String>,
    pub reach: u64,
    /// Engagement per follower, as a percentage capped at 100.
    pub engagement_rate: f32,
    /// 0..=100 relevance to the matched instrument(s).
    pub relevance: u8,
    pub impact: ImpactTier,
    pub urgency: ImpactTier,
    /// 0..=100 confidence in the analysis itself.
    pub confidence: u8,
    pub flags: IntegrityFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    SentimentShift,
    VolumeSpike,
    ViralContent,
    BotActivity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentAnomaly {
    pub kind: AnomalyKind,
    pub severity: AlertSeverity,
    /// 0..=1, scaled by distance past the threshold and sample size.
    pub confidence: f32,
    pub detail: String,
    pub detected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeMetrics {
    pub total_mentions: u32,
    pub unique_authors: u32,
    pub total_reach: u64,
    pub avg_engagement_rate: f32,
    pub trending_score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceBreakdown {
    pub source_id: String,
    pub mentions: u32,
    pub avg_score: f32,
    pub reliability_weight: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordStat {
    pub keyword: String,
    pub mentions: u32,
    pub avg_score: f32,
    pub avg_relevance: f32,
}

/// Full aggregation for one (symbol, timeframe). Recomputed wholesale each
/// cycle; never patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedSentiment {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub score: f32,
    pub magnitude: f32,
    pub label: SentimentLabel,
    pub confidence: u8,
    pub volume: VolumeMetrics,
    pub source_breakdown: Vec<SourceBreakdown>,
    pub top_keywords: Vec<KeywordStat>,
    pub anomalies: Vec<SentimentAnomaly>,
    /// Rank of the current score within the 30-day snapshot history.
    pub historical_percentile: Option<f32>,
    pub computed_at: DateTime<Utc>,
}

impl AggregatedSentiment {
    /// The well-defined zero-item aggregation: neutral, zero confidence,
    /// empty breakdowns.
    pub fn empty(symbol: &str, timeframe: Timeframe, now: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.to_string(),
            timeframe,
            score: 0.0,
            magnitude: 0.0,
            label: SentimentLabel::Neutral,
            confidence: 0,
            volume: VolumeMetrics::default(),
            source_breakdown: Vec::new(),
            top_keywords: Vec::new(),
            anomalies: Vec::new(),
            historical_percentile: None,
            computed_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsiderActivityType {
    Purchase,
    Sale,
    OptionExercise,
    Grant,
    OwnershipChange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Significance {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsiderTransaction {
    pub kind: InsiderActivityType,
    pub shares: u64,
    pub price_per_share: f64,
    pub total_value: f64,
}

/// Risk-scored record produced once per filing; immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsiderActivity {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub activity_type: InsiderActivityType,
    pub insider_name: String,
    pub insider_title: String,
    pub relationship: String,
    pub transaction: Option<InsiderTransaction>,
    /// Beneficial ownership percentage after the transaction.
    pub ownership_pct: f32,
    pub significance: Significance,
    pub impact_score: u8,
    pub risk_score: u8,
    pub suspicious: bool,
    /// Confidence-weighted 1h sentiment at the time the filing landed.
    pub sentiment_at_event: Option<f32>,
}

/// One trending keyword snapshot. Superseded, not merged, by later cycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendingTopic {
    pub keyword: String,
    pub symbol: Option<String>,
    pub category: String,
    /// 0..=100 composite of growth, sentiment magnitude, and engagement.
    pub trend_score: f32,
    /// Mentions per minute over the last hour.
    pub velocity: f32,
    pub mention_growth_pct: f32,
    pub sentiment_trend: f32,
    pub source_distribution: HashMap<String, u32>,
    pub detected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    SentimentShift,
    VolumeSpike,
    ViralContent,
    BotActivity,
    InsiderActivity,
    TrendingTopic,
}

/// Structured, severity-ranked alert. Mutated only to mark processed;
/// retained for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSentimentAlert {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub symbol: String,
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub message: String,
    pub data: serde_json::Value,
    pub recommended_actions: Vec<String>,
    pub processed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Offline,
    Error,
    RateLimited,
}

/// Advisory per-source liveness snapshot. Never halts ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceHealth {
    pub source_id: String,
    pub status: HealthStatus,
    pub last_update: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub requests_last_hour: u32,
    pub items_ingested: u64,
}

/// Operational counters exposed through `get_metrics()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineMetrics {
    pub items_ingested: u64,
    pub items_analyzed: u64,
    pub items_dropped: u64,
    pub queue_depth: usize,
    pub tracked_symbols: usize,
    pub active_sources: usize,
    pub alerts_generated: u64,
    pub subscriptions: usize,
}
