// src/api.rs
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;

use crate::engine::SentimentEngine;
use crate::insider::Filing;
use crate::types::{
    AggregatedSentiment, AlertSeverity, EngineMetrics, InsiderActivity, MarketSentimentAlert,
    SentimentSource, SourceHealth, Timeframe, TrendingTopic,
};

#[derive(Clone)]
pub struct AppState {
    pub engine: SentimentEngine,
}

pub fn create_router(engine: SentimentEngine) -> Router {
    let state = AppState { engine };
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/sentiment/{symbol}", get(get_sentiment))
        .route("/trending", get(get_trending))
        .route("/insider", get(get_insider))
        .route("/filings", post(post_filing))
        .route("/alerts", get(get_alerts))
        .route("/alerts/{id}/processed", post(mark_processed))
        .route("/sources", get(get_sources))
        .route("/sources/health", get(get_source_health))
        .route("/engine/metrics", get(get_engine_metrics))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Deserialize)]
struct SentimentQuery {
    #[serde(default)]
    timeframe: Option<String>,
}

async fn get_sentiment(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(q): Query<SentimentQuery>,
) -> Result<Json<AggregatedSentiment>, (StatusCode, String)> {
    let timeframe = match q.timeframe.as_deref() {
        Some(raw) => raw
            .parse::<Timeframe>()
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?,
        None => Timeframe::H1,
    };
    state
        .engine
        .get_sentiment(&symbol, timeframe)
        .map(Json)
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                format!("no sentiment data for {symbol}"),
            )
        })
}

#[derive(Deserialize)]
struct LimitQuery {
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    10
}

async fn get_trending(
    State(state): State<AppState>,
    Query(q): Query<LimitQuery>,
) -> Json<Vec<TrendingTopic>> {
    Json(state.engine.get_trending_topics(q.limit))
}

#[derive(Deserialize)]
struct InsiderQuery {
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default = "default_limit")]
    limit: usize,
}

async fn get_insider(
    State(state): State<AppState>,
    Query(q): Query<InsiderQuery>,
) -> Json<Vec<InsiderActivity>> {
    Json(
        state
            .engine
            .get_insider_activities(q.symbol.as_deref(), q.limit),
    )
}

async fn post_filing(
    State(state): State<AppState>,
    Json(filing): Json<Filing>,
) -> (StatusCode, Json<InsiderActivity>) {
    let activity = state.engine.ingest_filing(&filing);
    (StatusCode::CREATED, Json(activity))
}

#[derive(Deserialize)]
struct AlertsQuery {
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    severity: Option<AlertSeverity>,
    #[serde(default = "default_alert_limit")]
    limit: usize,
}

fn default_alert_limit() -> usize {
    50
}

async fn get_alerts(
    State(state): State<AppState>,
    Query(q): Query<AlertsQuery>,
) -> Json<Vec<MarketSentimentAlert>> {
    Json(
        state
            .engine
            .get_alerts(q.symbol.as_deref(), q.severity, q.limit),
    )
}

async fn mark_processed(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    if state.engine.mark_alert_processed(&id) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn get_sources(State(state): State<AppState>) -> Json<Vec<SentimentSource>> {
    Json(state.engine.get_sources())
}

async fn get_source_health(State(state): State<AppState>) -> Json<Vec<SourceHealth>> {
    Json(state.engine.get_source_health())
}

async fn get_engine_metrics(State(state): State<AppState>) -> Json<EngineMetrics> {
    Json(state.engine.get_metrics())
}
