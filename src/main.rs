//! Market Sentiment Engine — Binary Entrypoint
//! Boots the ingestion engine and the Axum HTTP server.

use std::sync::Arc;

use market_sentiment_engine::api;
use market_sentiment_engine::config;
use market_sentiment_engine::engine::SentimentEngine;
use market_sentiment_engine::metrics::Metrics;
use market_sentiment_engine::sources::adapters::{
    MockFilingAdapter, MockNewsAdapter, MockSocialAdapter,
};
use market_sentiment_engine::types::PlatformFamily;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("market_sentiment_engine=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let metrics = Metrics::init();

    let sources = config::load_sources_default()?;
    let engine = SentimentEngine::new();
    for source in sources {
        // Adapters are mocks until real platform credentials are wired in.
        match source.platform {
            PlatformFamily::Regulatory => engine.register_filing_source(
                source.clone(),
                Arc::new(MockFilingAdapter::new(&source.id)),
            )?,
            PlatformFamily::News => {
                engine.register_source(source.clone(), Arc::new(MockNewsAdapter::new(&source.id)))?
            }
            _ => engine
                .register_source(source.clone(), Arc::new(MockSocialAdapter::new(&source.id)))?,
        }
    }
    engine.start();

    let router = api::create_router(engine).merge(metrics.router());

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, router).await?;
    Ok(())
}
