// tests/pipeline_e2e.rs
//
// End-to-end pipeline: submit → analyze → aggregate → query/notify,
// driven synchronously with a frozen clock.

use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use market_sentiment_engine::engine::SentimentEngine;
use market_sentiment_engine::subscriptions::SubscriptionOptions;
use market_sentiment_engine::types::{
    AlertSeverity, PlatformFamily, RawPost, SentimentLabel, SentimentSource, Timeframe,
};

fn source(id: &str, platform: PlatformFamily, weight: u8) -> SentimentSource {
    SentimentSource {
        id: id.into(),
        platform,
        credential: None,
        reliability_weight: weight,
        update_frequency_secs: 15,
        hourly_request_ceiling: 240,
        active: true,
    }
}

fn post(text: &str, verified: bool, likes: u64) -> RawPost {
    RawPost {
        text: text.into(),
        author: format!("author-{likes}"),
        followers: 10_000,
        following: 300,
        verified,
        likes,
        comments: likes / 4,
        shares: likes / 10,
        published_at: Utc::now(),
        language: "en".into(),
    }
}

fn engine_with_sources() -> SentimentEngine {
    SentimentEngine::with_sources(vec![
        source("twitter_api", PlatformFamily::Social, 55),
        source("financial_news", PlatformFamily::News, 85),
    ])
    .expect("engine")
}

#[tokio::test]
async fn bullish_posts_produce_positive_aggregate() {
    let engine = engine_with_sources();
    let now = Utc::now();

    for text in [
        "$AAPL bullish breakout, expecting a strong rally",
        "$AAPL beat earnings, upgrade across the board",
        "$AAPL record profit, soaring to all-time high",
    ] {
        engine.submit_post("twitter_api", post(text, true, 100)).unwrap();
    }
    engine.submit_post(
        "financial_news",
        post("$AAPL surges on strong growth and bullish guidance", true, 300),
    )
    .unwrap();

    assert_eq!(engine.run_analysis_once(now), 4);
    engine.run_aggregation_once(now);

    let agg = engine.get_sentiment("AAPL", Timeframe::H1).expect("aggregate");
    assert!(agg.score > 0.2, "score {} should read positive", agg.score);
    assert!(matches!(
        agg.label,
        SentimentLabel::Positive | SentimentLabel::VeryPositive
    ));
    assert_eq!(agg.volume.total_mentions, 4);
    // Both sources appear in the breakdown, news weighted above social.
    assert_eq!(agg.source_breakdown.len(), 2);
    let news = agg
        .source_breakdown
        .iter()
        .find(|b| b.source_id == "financial_news")
        .expect("news breakdown");
    assert_eq!(news.reliability_weight, 85);
    assert!(!agg.top_keywords.is_empty());
}

#[tokio::test]
async fn every_timeframe_gets_an_aggregate() {
    let engine = engine_with_sources();
    let now = Utc::now();
    engine
        .submit_post("twitter_api", post("$MSFT bullish momentum", true, 50))
        .unwrap();
    engine.run_analysis_once(now);
    engine.run_aggregation_once(now);

    for tf in Timeframe::all() {
        let agg = engine.get_sentiment("MSFT", tf).expect("aggregate per timeframe");
        assert_eq!(agg.timeframe, tf);
        assert_eq!(agg.volume.total_mentions, 1);
    }
}

#[tokio::test]
async fn unmatched_text_lands_in_the_general_bucket() {
    let engine = engine_with_sources();
    let now = Utc::now();
    engine
        .submit_post("twitter_api", post("markets look bullish today overall", true, 10))
        .unwrap();
    engine.run_analysis_once(now);

    let agg = engine
        .get_sentiment("GENERAL", Timeframe::H1)
        .expect("general bucket");
    assert_eq!(agg.volume.total_mentions, 1);
}

#[tokio::test]
async fn small_samples_never_raise_anomalies() {
    let engine = engine_with_sources();
    let now = Utc::now();
    // 9 items is below the anomaly minimum, whatever their content.
    for i in 0..9 {
        engine
            .submit_post(
                "twitter_api",
                post("$TSLA crash imminent, bearish collapse, sell everything", false, i),
            )
            .unwrap();
    }
    engine.run_analysis_once(now);
    engine.run_aggregation_once(now);

    let agg = engine.get_sentiment("TSLA", Timeframe::H1).expect("aggregate");
    assert!(agg.anomalies.is_empty());
    assert!(engine
        .get_alerts(Some("TSLA"), Some(AlertSeverity::Warning), 10)
        .is_empty());
}

#[tokio::test]
async fn subscriber_panic_does_not_starve_other_subscribers() {
    let engine = engine_with_sources();
    let now = Utc::now();
    engine
        .submit_post("twitter_api", post("$AAPL bullish", true, 10))
        .unwrap();
    engine.run_analysis_once(now);

    engine.subscribe(
        vec!["ALL".into()],
        Box::new(|_| panic!("bad subscriber")),
        SubscriptionOptions::default(),
    );
    let hits = Arc::new(AtomicUsize::new(0));
    let h = hits.clone();
    let id = engine.subscribe(
        vec!["AAPL".into()],
        Box::new(move |_| {
            h.fetch_add(1, Ordering::Relaxed);
        }),
        SubscriptionOptions {
            timeframes: vec![Timeframe::H1],
            ..Default::default()
        },
    );

    engine.run_aggregation_once(now);
    assert_eq!(hits.load(Ordering::Relaxed), 1);

    assert!(engine.unsubscribe(id));
    engine.run_aggregation_once(now);
    assert_eq!(hits.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn trending_cycle_surfaces_repeated_keywords() {
    let engine = engine_with_sources();
    let now = Utc::now();
    // 15 high-engagement mentions of one keyword, all on one symbol.
    for i in 0..15 {
        engine
            .submit_post(
                "twitter_api",
                post("$NVDA breakout rally, very bullish", true, 4_000 + i),
            )
            .unwrap();
    }
    engine.run_analysis_once(now);
    let topics = engine.run_trending_once(now);

    assert!(!topics.is_empty(), "repeated keyword should trend");
    let top = &topics[0];
    assert!(top.trend_score > 50.0);
    assert_eq!(top.symbol.as_deref(), Some("NVDA"));
    assert_eq!(engine.get_trending_topics(5).len(), topics.len().min(5));
}
