// src/engine.rs
//! The engine facade: owns every shared component, spawns the background
//! timers, and exposes the query and subscription API. Cheap to clone;
//! all state lives behind one `Arc`.
//!
//! Timer bodies are thin wrappers around `run_*_once(now)` so every cycle
//! is testable synchronously with a frozen clock.

use crate::alerts::{self, AlertBook};
use crate::analyzer;
use crate::anomaly::{self, SymbolBaseline};
use crate::history::BaselineHistory;
use crate::insider::{process_filing, Filing};
use crate::queue::{self, IngestQueue};
use crate::sources::adapters::{FilingAdapter, SourceAdapter};
use crate::sources::scheduler::spawn_source_loop;
use crate::sources::{HealthBoard, SourceRegistry};
use crate::store::SymbolStore;
use crate::subscriptions::{
    SentimentCallback, SubscriptionHub, SubscriptionId, SubscriptionOptions,
};
use crate::types::{
    AggregatedSentiment, AlertSeverity, EngineMetrics, InsiderActivity, MarketSentimentAlert,
    PlatformFamily, RawContentItem, SentimentSource, SourceHealth, Timeframe, TrendingTopic,
};
use crate::{aggregator, trending};
use anyhow::{bail, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use metrics::{counter, gauge};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const ANALYSIS_TICK: Duration = Duration::from_secs(1);
const AGGREGATION_TICK: Duration = Duration::from_secs(60);
const TRENDING_TICK: Duration = Duration::from_secs(300);
const HEALTH_TICK: Duration = Duration::from_secs(30);

/// Insider records retained in memory.
const MAX_INSIDER_RECORDS: usize = 5_000;

#[derive(Clone)]
pub struct SentimentEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    registry: Arc<SourceRegistry>,
    health: Arc<HealthBoard>,
    queue: Arc<IngestQueue>,
    store: SymbolStore,
    history: BaselineHistory,
    alerts: AlertBook,
    subscriptions: SubscriptionHub,
    adapters: Mutex<HashMap<String, Arc<dyn SourceAdapter>>>,
    filing_adapters: Mutex<HashMap<String, Arc<dyn FilingAdapter>>>,
    aggregates: RwLock<HashMap<(String, Timeframe), AggregatedSentiment>>,
    insider: Mutex<Vec<InsiderActivity>>,
    trending: Mutex<Vec<TrendingTopic>>,
    items_analyzed: AtomicU64,
    running: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Default for SentimentEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SentimentEngine {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(EngineInner {
                registry: Arc::new(SourceRegistry::new()),
                health: Arc::new(HealthBoard::new()),
                queue: Arc::new(IngestQueue::new(queue::DEFAULT_CAPACITY)),
                store: SymbolStore::new(),
                history: BaselineHistory::new(),
                alerts: AlertBook::default(),
                subscriptions: SubscriptionHub::default(),
                adapters: Mutex::new(HashMap::new()),
                filing_adapters: Mutex::new(HashMap::new()),
                aggregates: RwLock::new(HashMap::new()),
                insider: Mutex::new(Vec::new()),
                trending: Mutex::new(Vec::new()),
                items_analyzed: AtomicU64::new(0),
                running: AtomicBool::new(false),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Builds an engine with the given sources registered up front.
    /// Adapterless sources are registered for manual injection only.
    pub fn with_sources(sources: Vec<SentimentSource>) -> Result<Self> {
        let engine = Self::new();
        let now = Utc::now();
        for source in sources {
            engine.inner.health.track(&source.id, now);
            engine.inner.registry.register(source)?;
        }
        Ok(engine)
    }

    // ---- source management -------------------------------------------------

    /// Registers a source and its adapter. If the engine is already running,
    /// the polling loop starts immediately.
    pub fn register_source(
        &self,
        source: SentimentSource,
        adapter: Arc<dyn SourceAdapter>,
    ) -> Result<()> {
        if source.id != adapter.source_id() {
            bail!(
                "adapter id {:?} does not match source id {:?}",
                adapter.source_id(),
                source.id
            );
        }
        let id = source.id.clone();
        self.inner.health.track(&id, Utc::now());
        self.inner.registry.register(source)?;
        self.inner
            .adapters
            .lock()
            .expect("adapter map poisoned")
            .insert(id.clone(), adapter.clone());
        if self.inner.running.load(Ordering::SeqCst) {
            self.spawn_loop(adapter);
        }
        info!(source = %id, "source registered");
        Ok(())
    }

    /// Registers a regulatory source whose adapter emits filings instead of
    /// posts. Filings feed [`Self::ingest_filing`] on the source's own
    /// (slow) timer.
    pub fn register_filing_source(
        &self,
        source: SentimentSource,
        adapter: Arc<dyn FilingAdapter>,
    ) -> Result<()> {
        if source.id != adapter.source_id() {
            bail!(
                "adapter id {:?} does not match source id {:?}",
                adapter.source_id(),
                source.id
            );
        }
        let id = source.id.clone();
        self.inner.health.track(&id, Utc::now());
        self.inner.registry.register(source)?;
        self.inner
            .filing_adapters
            .lock()
            .expect("filing adapter map poisoned")
            .insert(id.clone(), adapter.clone());
        if self.inner.running.load(Ordering::SeqCst) {
            self.spawn_filing_loop(adapter);
        }
        info!(source = %id, "filing source registered");
        Ok(())
    }

    pub fn set_source_active(&self, id: &str, active: bool) -> Result<()> {
        self.inner.registry.set_active(id, active)
    }

    /// Enqueues one post directly, bypassing adapters. The source must be
    /// registered; its reliability weight drives the priority.
    pub fn submit_post(&self, source_id: &str, post: crate::types::RawPost) -> Result<bool> {
        if self.inner.registry.get(source_id).is_none() {
            bail!("unknown source: {source_id}");
        }
        let weight = self.inner.registry.reliability_weight(source_id);
        let priority = queue::priority_score(weight, &post);
        Ok(self.inner.queue.push(RawContentItem {
            source_id: source_id.to_string(),
            post,
            received_at: Utc::now(),
            priority,
        }))
    }

    // ---- lifecycle ---------------------------------------------------------

    /// Spawns the background timers and one polling loop per registered
    /// adapter. A second call on a running engine is a no-op.
    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            debug!("engine already running");
            return;
        }
        info!(
            sources = self.inner.registry.active_count(),
            "engine starting"
        );

        let adapters: Vec<Arc<dyn SourceAdapter>> = self
            .inner
            .adapters
            .lock()
            .expect("adapter map poisoned")
            .values()
            .cloned()
            .collect();
        for adapter in adapters {
            self.spawn_loop(adapter);
        }
        let filing_adapters: Vec<Arc<dyn FilingAdapter>> = self
            .inner
            .filing_adapters
            .lock()
            .expect("filing adapter map poisoned")
            .values()
            .cloned()
            .collect();
        for adapter in filing_adapters {
            self.spawn_filing_loop(adapter);
        }

        let mut tasks = self.inner.tasks.lock().expect("task list poisoned");
        tasks.push(self.spawn_timer(ANALYSIS_TICK, |e, now| {
            e.run_analysis_once(now);
        }));
        tasks.push(self.spawn_timer(AGGREGATION_TICK, |e, now| {
            e.run_aggregation_once(now);
        }));
        tasks.push(self.spawn_timer(TRENDING_TICK, |e, now| {
            e.run_trending_once(now);
        }));
        tasks.push(self.spawn_timer(HEALTH_TICK, |e, now| {
            e.inner.health.prune_hour(now);
            gauge!("sentiment_queue_depth").set(e.inner.queue.len() as f64);
            gauge!("sentiment_tracked_symbols").set(e.inner.store.symbols().len() as f64);
        }));
    }

    /// Stops all tasks and drops all in-memory state. Idempotent.
    pub fn shutdown(&self) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("engine shutting down");
        for task in self
            .inner
            .tasks
            .lock()
            .expect("task list poisoned")
            .drain(..)
        {
            task.abort();
        }
        self.inner.queue.clear();
        self.inner.store.clear();
        self.inner.health.clear();
        self.inner.history.clear();
        self.inner.alerts.clear();
        self.inner.subscriptions.clear();
        self.inner
            .aggregates
            .write()
            .expect("aggregate cache poisoned")
            .clear();
        self.inner.insider.lock().expect("insider log poisoned").clear();
        self.inner
            .trending
            .lock()
            .expect("trending cache poisoned")
            .clear();
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    fn spawn_loop(&self, adapter: Arc<dyn SourceAdapter>) {
        let handle = spawn_source_loop(
            adapter,
            self.inner.registry.clone(),
            self.inner.health.clone(),
            self.inner.queue.clone(),
        );
        self.inner
            .tasks
            .lock()
            .expect("task list poisoned")
            .push(handle);
    }

    fn spawn_filing_loop(&self, adapter: Arc<dyn FilingAdapter>) {
        let engine = self.clone();
        let handle = tokio::spawn(async move {
            let source_id = adapter.source_id().to_string();
            let Some(source) = engine.inner.registry.get(&source_id) else {
                warn!(source = %source_id, "loop spawned for unregistered filing source");
                return;
            };
            let mut ticker =
                tokio::time::interval(Duration::from_secs(source.update_frequency_secs.max(1)));
            loop {
                ticker.tick().await;
                if let Err(err) = engine.poll_filings_once(&source_id, Utc::now()).await {
                    warn!(source = %source_id, error = %err, "filing poll failed");
                }
            }
        });
        self.inner
            .tasks
            .lock()
            .expect("task list poisoned")
            .push(handle);
    }

    /// One filing-source tick: ceiling check, fetch, process each filing.
    /// Returns filings processed.
    pub async fn poll_filings_once(&self, source_id: &str, now: DateTime<Utc>) -> Result<u64> {
        let adapter = self
            .inner
            .filing_adapters
            .lock()
            .expect("filing adapter map poisoned")
            .get(source_id)
            .cloned();
        let Some(adapter) = adapter else {
            bail!("unknown filing source: {source_id}");
        };
        let source = match self.inner.registry.get(source_id) {
            Some(s) if s.active => s,
            _ => return Ok(0),
        };
        if self.inner.health.requests_last_hour(source_id, now) >= source.hourly_request_ceiling {
            return Ok(0);
        }
        self.inner.health.record_request(source_id, now);
        match adapter.fetch_latest().await {
            Ok(filings) => {
                for filing in &filings {
                    self.ingest_filing(filing);
                }
                self.inner
                    .health
                    .record_success(source_id, filings.len() as u64, now);
                Ok(filings.len() as u64)
            }
            Err(err) => {
                self.inner.health.record_failure(source_id);
                Err(err)
            }
        }
    }

    fn spawn_timer(
        &self,
        period: Duration,
        body: fn(&SentimentEngine, DateTime<Utc>),
    ) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await; // first tick fires immediately; skip it
            loop {
                ticker.tick().await;
                body(&engine, Utc::now());
            }
        })
    }

    // ---- pipeline cycles ---------------------------------------------------

    /// One analysis cycle: drain a priority batch, score it, append to the
    /// 24h store, and prune expired items. Returns items analyzed.
    pub fn run_analysis_once(&self, now: DateTime<Utc>) -> usize {
        let batch = self.inner.queue.drain_batch(queue::DEFAULT_BATCH_SIZE);
        let mut analyzed = 0usize;
        for item in &batch {
            let platform = self
                .inner
                .registry
                .get(&item.source_id)
                .map(|s| s.platform)
                .unwrap_or(PlatformFamily::Social);
            match analyzer::analyze_item(item, platform) {
                Ok(analyzed_item) => {
                    self.inner.store.append(&analyzed_item);
                    analyzed += 1;
                }
                Err(err) => {
                    debug!(source = %item.source_id, error = %err, "item rejected");
                }
            }
        }
        if analyzed > 0 {
            self.inner
                .items_analyzed
                .fetch_add(analyzed as u64, Ordering::Relaxed);
            counter!("sentiment_items_analyzed_total").increment(analyzed as u64);
        }
        let pruned = self.inner.store.prune(now);
        if pruned > 0 {
            debug!(pruned, "expired items pruned");
        }
        analyzed
    }

    /// One aggregation cycle: recompute every (symbol, timeframe) aggregate,
    /// evaluate anomalies on the 1h window, record baselines, raise alerts,
    /// and notify subscribers.
    pub fn run_aggregation_once(&self, now: DateTime<Utc>) {
        let hour_cutoff = now - ChronoDuration::hours(1);
        let mut live: HashSet<String> = HashSet::new();
        for symbol in self.inner.store.symbols() {
            let items_24h = self.inner.store.snapshot(&symbol);
            if items_24h.is_empty() {
                continue;
            }
            live.insert(symbol.clone());
            let hour_items: Vec<_> = items_24h
                .iter()
                .filter(|it| it.timestamp >= hour_cutoff)
                .cloned()
                .collect();

            let baseline = SymbolBaseline {
                sentiment: self.inner.history.sentiment_baseline(&symbol),
                volume: self.inner.history.avg_volume(&symbol),
            };
            let anomalies = anomaly::detect(items_24h.len(), &hour_items, baseline, now);

            for timeframe in Timeframe::all() {
                let agg = aggregator::aggregate(
                    &symbol,
                    timeframe,
                    &items_24h,
                    &anomalies,
                    &self.inner.registry,
                    &self.inner.history,
                    now,
                );
                if timeframe == Timeframe::H1 {
                    self.inner
                        .history
                        .record(&symbol, agg.score, hour_items.len() as u32, now);
                }
                self.inner.subscriptions.notify_sentiment(&agg);
                self.inner
                    .aggregates
                    .write()
                    .expect("aggregate cache poisoned")
                    .insert((symbol.clone(), timeframe), agg);
            }

            for a in &anomalies {
                let alert = self.inner.alerts.push(alerts::from_anomaly(&symbol, a, now));
                self.inner.subscriptions.notify_alert(&alert);
            }
        }

        // The cache holds exactly this cycle's output; symbols whose 24h
        // history emptied out stop being served.
        self.inner
            .aggregates
            .write()
            .expect("aggregate cache poisoned")
            .retain(|(symbol, _), _| live.contains(symbol));
    }

    /// One trending cycle over every symbol's last-hour items.
    pub fn run_trending_once(&self, now: DateTime<Utc>) -> Vec<TrendingTopic> {
        let hour_cutoff = now - ChronoDuration::hours(1);
        let mut by_symbol: HashMap<String, Vec<_>> = HashMap::new();
        for symbol in self.inner.store.symbols() {
            let items = self.inner.store.items_since(&symbol, hour_cutoff);
            if !items.is_empty() {
                by_symbol.insert(symbol, items);
            }
        }
        let topics = trending::detect_trending(&by_symbol, &self.inner.history, now);

        for topic in &topics {
            if topic.trend_score > trending::ALERT_THRESHOLD {
                let alert = self.inner.alerts.push(alerts::from_trending(topic, now));
                self.inner.subscriptions.notify_alert(&alert);
            }
        }
        *self.inner.trending.lock().expect("trending cache poisoned") = topics.clone();
        topics
    }

    // ---- insider path ------------------------------------------------------

    /// Processes a filing immediately: risk-scores it, stores the record,
    /// and raises an alert for High/Critical significance.
    pub fn ingest_filing(&self, filing: &Filing) -> InsiderActivity {
        let sentiment_now = self
            .get_sentiment(&filing.symbol, Timeframe::H1)
            .map(|a| a.score);
        let activity = process_filing(filing, sentiment_now);
        counter!("sentiment_filings_processed_total").increment(1);

        if let Some(alert) = alerts::from_insider(&activity, Utc::now()) {
            let alert = self.inner.alerts.push(alert);
            self.inner.subscriptions.notify_alert(&alert);
        }
        if activity.suspicious {
            warn!(
                symbol = %activity.symbol,
                id = %activity.id,
                "suspicious insider activity flagged"
            );
        }

        let mut log = self.inner.insider.lock().expect("insider log poisoned");
        log.push(activity.clone());
        if log.len() > MAX_INSIDER_RECORDS {
            let excess = log.len() - MAX_INSIDER_RECORDS;
            log.drain(..excess);
        }
        activity
    }

    // ---- queries -----------------------------------------------------------

    /// Last computed aggregate for the pair, or a fresh on-demand computation
    /// when no aggregation cycle has covered the symbol yet.
    pub fn get_sentiment(&self, symbol: &str, timeframe: Timeframe) -> Option<AggregatedSentiment> {
        let symbol = symbol.trim().to_ascii_uppercase();
        if let Some(agg) = self
            .inner
            .aggregates
            .read()
            .expect("aggregate cache poisoned")
            .get(&(symbol.clone(), timeframe))
        {
            return Some(agg.clone());
        }
        let items = self.inner.store.snapshot(&symbol);
        if items.is_empty() {
            return None;
        }
        Some(aggregator::aggregate(
            &symbol,
            timeframe,
            &items,
            &[],
            &self.inner.registry,
            &self.inner.history,
            Utc::now(),
        ))
    }

    /// Newest first; `symbol` filters when given.
    pub fn get_insider_activities(
        &self,
        symbol: Option<&str>,
        limit: usize,
    ) -> Vec<InsiderActivity> {
        let log = self.inner.insider.lock().expect("insider log poisoned");
        log.iter()
            .rev()
            .filter(|a| symbol.is_none_or(|s| a.symbol.eq_ignore_ascii_case(s)))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn get_trending_topics(&self, limit: usize) -> Vec<TrendingTopic> {
        let topics = self.inner.trending.lock().expect("trending cache poisoned");
        topics.iter().take(limit).cloned().collect()
    }

    pub fn get_alerts(
        &self,
        symbol: Option<&str>,
        min_severity: Option<AlertSeverity>,
        limit: usize,
    ) -> Vec<MarketSentimentAlert> {
        self.inner.alerts.query(symbol, min_severity, limit)
    }

    pub fn mark_alert_processed(&self, alert_id: &str) -> bool {
        self.inner.alerts.mark_processed(alert_id)
    }

    pub fn get_source_health(&self) -> Vec<SourceHealth> {
        self.inner.health.snapshot(&self.inner.registry, Utc::now())
    }

    pub fn get_sources(&self) -> Vec<SentimentSource> {
        self.inner.registry.snapshot()
    }

    pub fn get_metrics(&self) -> EngineMetrics {
        EngineMetrics {
            items_ingested: self.inner.queue.accepted(),
            items_analyzed: self.inner.items_analyzed.load(Ordering::Relaxed),
            items_dropped: self.inner.queue.dropped(),
            queue_depth: self.inner.queue.len(),
            tracked_symbols: self.inner.store.symbols().len(),
            active_sources: self.inner.registry.active_count(),
            alerts_generated: self.inner.alerts.generated_total(),
            subscriptions: self.inner.subscriptions.len(),
        }
    }

    // ---- subscriptions -----------------------------------------------------

    pub fn subscribe(
        &self,
        symbols: Vec<String>,
        on_sentiment: SentimentCallback,
        options: SubscriptionOptions,
    ) -> SubscriptionId {
        self.inner.subscriptions.subscribe(symbols, on_sentiment, options)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.subscriptions.unsubscribe(id)
    }
}
