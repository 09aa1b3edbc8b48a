//! Market impact tracking scheduler
//!
//! Starts observing an event when the classifier flags it, samples prices on
//! the event's urgency schedule and hands the collected snapshots to the
//! analysis engine once the observation window has elapsed.

use crate::{
    analysis::{EventAnalyzer, ImpactAnalysisEngine},
    clock::{Clock, SystemClock},
    config::TrackerConfig,
    constants::EVENT_CHANNEL_CAPACITY,
    error::{AnalysisError, ProviderError},
    metrics::{MetricsCollector, ProviderMetrics},
    notifier::{FailureAlert, FailureNotifier, ReportConsumer},
    provider::PriceProvider,
    providers::{CoinGeckoProvider, FailoverProvider, StooqProvider},
    rate_limiter::RateLimiter,
    repository::{ImpactRepository, JsonlRepository, MemoryRepository},
    store::{TaskEntry, TaskSlot, TaskStore},
    types::{
        AssetClass, Classification, ComponentHealth, HealthStatus, MarketAssessment, Metadata,
        PriceMap, Snapshot, TrackerEvent, TrackingTask, UrgencyProfile,
    },
};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use futures::FutureExt;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// What a call to [`MarketImpactTracker::tick`] did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickSummary {
    /// Snapshots captured, catch-up samples included
    pub captures: usize,
    /// Events whose window closed and which left the active set
    pub finalized: Vec<String>,
    /// Reports produced by those finalizations
    pub reports: usize,
}

#[derive(Debug, Default)]
struct TaskProgress {
    captures: usize,
    finalized: bool,
    report: bool,
}

/// Market impact tracker
///
/// Owns the active tracking tasks. Scheduling takes the first snapshot right
/// away; everything after that is driven by [`tick`](Self::tick), either
/// called by the host or by [`spawn_ticker`](Self::spawn_ticker).
///
/// # Example
/// ```no_run
/// use market_impact_tracker::{MarketImpactTracker, Metadata, TrackerConfig};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = TrackerConfig::from_env()?;
/// let tracker = Arc::new(MarketImpactTracker::from_config(&config)?);
/// let _ticker = tracker.spawn_ticker(Duration::from_secs(30));
///
/// tracker
///     .schedule_event("post-123", "immediate", Metadata::new())
///     .await;
/// # Ok(())
/// # }
/// ```
pub struct MarketImpactTracker {
    enabled: bool,
    profiles: HashMap<String, UrgencyProfile>,
    crypto_symbols: RwLock<Vec<String>>,
    index_symbols: RwLock<Vec<String>>,
    provider_timeout: Duration,
    crypto_provider: Option<Arc<dyn PriceProvider>>,
    index_provider: Option<Arc<dyn PriceProvider>>,
    repository: Arc<dyn ImpactRepository>,
    analyzer: Arc<dyn EventAnalyzer>,
    consumer: Option<Arc<dyn ReportConsumer>>,
    notifier: Option<Arc<dyn FailureNotifier>>,
    clock: Arc<dyn Clock>,
    store: TaskStore,
    crypto_metrics: MetricsCollector,
    index_metrics: MetricsCollector,
    events: broadcast::Sender<TrackerEvent>,
}

impl MarketImpactTracker {
    /// Creates a tracker without price providers
    ///
    /// Providers, clock, analyzer and collaborators are attached with the
    /// `with_*` builders. Use [`from_config`](Self::from_config) to get the
    /// CoinGecko and Stooq providers wired up.
    pub fn new(config: &TrackerConfig, repository: Arc<dyn ImpactRepository>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            enabled: config.enabled,
            profiles: config
                .urgency_profiles
                .iter()
                .map(|(label, profile)| (label.trim().to_lowercase(), *profile))
                .collect(),
            crypto_symbols: RwLock::new(normalize_symbols(config.crypto_symbols())),
            index_symbols: RwLock::new(normalize_symbols(config.index_symbols())),
            provider_timeout: config.provider_timeout,
            crypto_provider: None,
            index_provider: None,
            repository,
            analyzer: Arc::new(ImpactAnalysisEngine::new(config.outlier_threshold_percent)),
            consumer: None,
            notifier: None,
            clock: Arc::new(SystemClock),
            store: TaskStore::new(),
            crypto_metrics: MetricsCollector::new(AssetClass::Crypto),
            index_metrics: MetricsCollector::new(AssetClass::Indices),
            events,
        }
    }

    /// Creates a tracker with the providers and repository described by `config`
    ///
    /// Crypto prices come from CoinGecko and index quotes from Stooq, each
    /// paced by its own rate limiter. Configured fallback hosts are tried in
    /// order behind a [`FailoverProvider`] sharing that limiter. Snapshots and
    /// reports go to the JSON-lines file when one is configured, to memory
    /// otherwise.
    pub fn from_config(config: &TrackerConfig) -> Result<Self, ProviderError> {
        let repository: Arc<dyn ImpactRepository> = match &config.jsonl_path {
            Some(path) => Arc::new(JsonlRepository::new(path)),
            None => Arc::new(MemoryRepository::new()),
        };

        let mut tracker = Self::new(config, repository);

        if !config.crypto_ids.is_empty() {
            let limiter = Arc::new(RateLimiter::new(config.crypto_min_interval));
            let coingecko =
                || CoinGeckoProvider::new(config.crypto_ids.clone(), &config.fiat, limiter.clone());
            let mut chain: Vec<Arc<dyn PriceProvider>> = vec![Arc::new(coingecko()?)];
            for url in &config.crypto_fallback_urls {
                chain.push(Arc::new(coingecko()?.with_base_url(url.as_str())));
            }
            tracker = tracker.with_crypto_provider(provider_chain(chain));
        }

        if !config.index_ids.is_empty() {
            let limiter = Arc::new(RateLimiter::new(config.index_min_interval));
            let stooq = || {
                StooqProvider::new(
                    config.index_ids.clone(),
                    config.index_currencies.clone(),
                    limiter.clone(),
                )
            };
            let mut chain: Vec<Arc<dyn PriceProvider>> = vec![Arc::new(stooq()?)];
            for url in &config.index_fallback_urls {
                chain.push(Arc::new(stooq()?.with_quote_url(url.as_str())));
            }
            tracker = tracker.with_index_provider(provider_chain(chain));
        }

        Ok(tracker)
    }

    pub fn with_crypto_provider(mut self, provider: Arc<dyn PriceProvider>) -> Self {
        self.crypto_provider = Some(provider);
        self
    }

    pub fn with_index_provider(mut self, provider: Arc<dyn PriceProvider>) -> Self {
        self.index_provider = Some(provider);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn EventAnalyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// Sets the callback that receives every finished report
    pub fn with_report_consumer(mut self, consumer: Arc<dyn ReportConsumer>) -> Self {
        self.consumer = Some(consumer);
        self
    }

    /// Sets the collaborator told about provider and analysis failures
    pub fn with_failure_notifier(mut self, notifier: Arc<dyn FailureNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Starts tracking an event
    ///
    /// Declines (returns false, nothing captured) when the tracker is
    /// disabled, the urgency has no usable profile, no symbols are configured,
    /// or the event is already tracked. A profile is unusable when its
    /// interval is zero or its first sample or window end is not a
    /// representable date. Otherwise the task is created, the
    /// initial snapshot is captured and persisted, and the next sample is due
    /// one interval from now.
    pub async fn schedule_event(&self, event_id: &str, urgency: &str, metadata: Metadata) -> bool {
        if !self.enabled {
            tracing::debug!(event_id = %event_id, "Market impact tracking disabled, ignoring event");
            return false;
        }

        let urgency = urgency.trim().to_lowercase();
        let Some(profile) = self.profiles.get(&urgency).copied() else {
            tracing::debug!(
                event_id = %event_id,
                urgency = %urgency,
                "No tracking profile for urgency"
            );
            return false;
        };

        if profile.interval_seconds == 0 {
            tracing::warn!(urgency = %urgency, "Urgency profile has a zero sample interval");
            return false;
        }

        let now = self.clock.now();
        let Some((first_sample, window_end)) = profile
            .sample_interval()
            .zip(profile.total_duration())
            .and_then(|(interval, total)| {
                Some((now.checked_add_signed(interval)?, now.checked_add_signed(total)?))
            })
        else {
            tracing::warn!(
                urgency = %urgency,
                interval_secs = profile.interval_seconds,
                duration_secs = profile.duration_seconds,
                "Urgency profile does not fit in a calendar window"
            );
            return false;
        };

        let crypto_symbols = read_symbols(&self.crypto_symbols);
        let index_symbols = read_symbols(&self.index_symbols);
        if crypto_symbols.is_empty() && index_symbols.is_empty() {
            tracing::warn!(event_id = %event_id, "No asset symbols configured for market impact tracking");
            return false;
        }

        let task = TrackingTask {
            event_id: event_id.to_string(),
            urgency: urgency.clone(),
            interval_seconds: profile.interval_seconds,
            window_end,
            next_run: now,
            crypto_symbols,
            index_symbols,
            metadata,
            run_count: 0,
        };

        let Some(mut entry) = self.store.insert_locked(task).await else {
            tracing::debug!(event_id = %event_id, "Event already tracked");
            return false;
        };

        tracing::info!(
            event_id = %event_id,
            urgency = %urgency,
            interval_secs = profile.interval_seconds,
            window_end = %window_end,
            "Scheduled market impact tracking"
        );
        self.publish(TrackerEvent::EventScheduled {
            id: Uuid::new_v4(),
            event_id: event_id.to_string(),
            urgency,
            window_end,
            timestamp: now,
        });

        self.capture(&mut entry, now, true).await;
        entry.task.next_run = first_sample;

        true
    }

    /// Schedules tracking from a classifier verdict
    ///
    /// The classifier and market-assessment fields are recorded under
    /// `llm_score`, `llm_urgency`, `llm_reasoning`, `llm_model`,
    /// `market_score` and `impact_level`; `post_metadata` is laid over them.
    pub async fn handle_analysis_event(
        &self,
        event_id: &str,
        classification: &Classification,
        market: &MarketAssessment,
        post_metadata: Metadata,
    ) -> bool {
        if !self.enabled {
            return false;
        }

        let Some(urgency) = classification
            .urgency
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
        else {
            tracing::debug!(event_id = %event_id, "Classification carries no urgency");
            return false;
        };

        let mut metadata = Metadata::new();
        metadata.insert("llm_score".to_string(), serde_json::json!(classification.score));
        metadata.insert("llm_urgency".to_string(), serde_json::json!(urgency.to_lowercase()));
        metadata.insert(
            "llm_reasoning".to_string(),
            serde_json::json!(classification.reasoning),
        );
        metadata.insert("llm_model".to_string(), serde_json::json!(classification.model));
        metadata.insert("market_score".to_string(), serde_json::json!(market.impact_score));
        metadata.insert("impact_level".to_string(), serde_json::json!(market.impact_level));
        metadata.extend(post_metadata);

        self.schedule_event(event_id, urgency, metadata).await
    }

    /// Advances every active task to `now`
    ///
    /// Due samples are captured (several per task if ticks were missed, all
    /// stamped `now`), then tasks whose window has passed are finalized and
    /// dropped. Tasks are advanced concurrently; one event's slow capture
    /// does not hold up the others.
    pub async fn tick(&self, now: DateTime<Utc>) -> TickSummary {
        let slots = self.store.slots().await;

        let progress = join_all(
            slots
                .into_iter()
                .map(|(event_id, slot)| async move {
                    let progress = self.advance_task(&event_id, slot, now).await;
                    (event_id, progress)
                }),
        )
        .await;

        let mut summary = TickSummary::default();
        for (event_id, progress) in progress {
            summary.captures += progress.captures;
            if progress.finalized {
                summary.finalized.push(event_id);
            }
            if progress.report {
                summary.reports += 1;
            }
        }

        if summary.captures > 0 || !summary.finalized.is_empty() {
            tracing::debug!(
                captures = summary.captures,
                finalized = summary.finalized.len(),
                "Tracker tick processed"
            );
        }

        summary
    }

    /// Ticks with the tracker's own clock
    pub async fn run_pending(&self) -> TickSummary {
        self.tick(self.clock.now()).await
    }

    /// Starts a background task calling [`run_pending`](Self::run_pending)
    /// every `period`
    ///
    /// The task runs until the returned handle is aborted.
    pub fn spawn_ticker(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let tracker = self.clone();

        tokio::spawn(async move {
            tracing::info!(
                period_ms = period.as_millis() as u64,
                "Starting market impact tracker ticker"
            );

            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                tracker.run_pending().await;
            }
        })
    }

    async fn advance_task(&self, event_id: &str, slot: TaskSlot, now: DateTime<Utc>) -> TaskProgress {
        let mut entry = slot.lock().await;
        let mut progress = TaskProgress::default();

        // Finalized by a concurrent tick while we waited for the lock
        if entry.finished {
            return progress;
        }

        while entry.task.is_due(now) {
            self.capture(&mut entry, now, false).await;
            progress.captures += 1;
            match entry.task.next_run.checked_add_signed(entry.task.sample_interval()) {
                Some(next_run) => entry.task.next_run = next_run,
                // No representable next sample, the window can only expire now
                None => {
                    entry.task.next_run = DateTime::<Utc>::MAX_UTC;
                    break;
                }
            }
        }

        if entry.task.is_expired(now) {
            entry.finished = true;
            progress.report = self.finalize(&mut entry, now).await;
            self.store.remove(event_id).await;
            progress.finalized = true;
        }

        progress
    }

    /// Captures one snapshot for a task and appends it to the accumulator
    async fn capture(&self, entry: &mut TaskEntry, now: DateTime<Utc>, initial: bool) {
        let mut snapshot = Snapshot::for_task(&entry.task, now, initial);

        let (crypto, indices) = tokio::join!(
            self.fetch_family(&entry.task, AssetClass::Crypto),
            self.fetch_family(&entry.task, AssetClass::Indices),
        );
        if let Some(result) = crypto {
            snapshot.set_family(AssetClass::Crypto, result);
        }
        if let Some(result) = indices {
            snapshot.set_family(AssetClass::Indices, result);
        }

        match self.repository.record_snapshot(&snapshot).await {
            Ok(id) => snapshot.id = Some(id),
            Err(e) => tracing::warn!(
                event_id = %snapshot.event_id,
                sequence = snapshot.sequence,
                error = %e,
                "Failed to persist snapshot"
            ),
        }

        entry.task.run_count += 1;
        tracing::debug!(
            event_id = %snapshot.event_id,
            sequence = snapshot.sequence,
            initial = initial,
            crypto = snapshot.crypto.len(),
            indices = snapshot.indices.len(),
            "Captured market snapshot"
        );
        self.publish(TrackerEvent::SnapshotCaptured {
            id: Uuid::new_v4(),
            event_id: snapshot.event_id.clone(),
            sequence: snapshot.sequence,
            timestamp: now,
        });

        entry.snapshots.push(snapshot);
    }

    /// Fetches one asset family for a task
    ///
    /// Returns `None` when the family has no symbols or no provider.
    async fn fetch_family(
        &self,
        task: &TrackingTask,
        class: AssetClass,
    ) -> Option<Result<PriceMap, String>> {
        let symbols = task.symbols(class);
        if symbols.is_empty() {
            return None;
        }

        let Some(provider) = self.provider(class) else {
            tracing::debug!(asset_class = %class, "No provider configured, skipping family");
            return None;
        };

        let start = Instant::now();
        let call = AssertUnwindSafe(provider.fetch_prices(symbols)).catch_unwind();
        let result = match tokio::time::timeout(self.provider_timeout, call).await {
            Ok(Ok(result)) => result,
            Ok(Err(payload)) => Err(ProviderError::ApiError(format!(
                "provider panicked: {}",
                panic_message(payload)
            ))),
            Err(_) => Err(ProviderError::Timeout(self.provider_timeout)),
        };
        let elapsed = start.elapsed();

        match result {
            Ok(prices) => {
                self.metrics(class).record_success(elapsed).await;
                Some(Ok(prices))
            }
            Err(e) => {
                let message = e.to_string();
                self.metrics(class).record_failure(elapsed, &message).await;

                tracing::warn!(
                    event_id = %task.event_id,
                    asset_class = %class,
                    provider = provider.provider_name(),
                    error = %e,
                    "Price capture failed"
                );
                self.publish(TrackerEvent::CaptureFailed {
                    id: Uuid::new_v4(),
                    event_id: task.event_id.clone(),
                    asset_class: class,
                    error_message: message.clone(),
                    timestamp: self.clock.now(),
                });
                self.notify_failure(
                    FailureAlert::new(
                        "Market impact snapshot failed",
                        format!("Failed to fetch {} prices", class),
                    )
                    .with_detail("event_id", task.event_id.clone())
                    .with_detail("asset_class", class.as_str())
                    .with_detail("provider", provider.provider_name())
                    .with_detail("error", message.clone()),
                )
                .await;

                Some(Err(message))
            }
        }
    }

    /// Turns a closed task into a report
    ///
    /// # Returns
    /// True if a report was produced
    async fn finalize(&self, entry: &mut TaskEntry, now: DateTime<Utc>) -> bool {
        let snapshots = std::mem::take(&mut entry.snapshots);
        let task = &entry.task;

        if snapshots.is_empty() {
            tracing::debug!(event_id = %task.event_id, "No snapshots captured, discarding task");
            return false;
        }

        let analyzer = &self.analyzer;
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
            analyzer.analyze_event(&task.event_id, &snapshots, &task.metadata, now)
        }))
        .unwrap_or_else(|payload| Err(AnalysisError::Panicked(panic_message(payload))));

        let mut report = match outcome {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(
                    event_id = %task.event_id,
                    snapshots = snapshots.len(),
                    error = %e,
                    "Impact analysis failed"
                );
                self.publish(TrackerEvent::FinalizationFailed {
                    id: Uuid::new_v4(),
                    event_id: task.event_id.clone(),
                    error_message: e.to_string(),
                    timestamp: now,
                });
                self.notify_failure(
                    FailureAlert::new("Market impact analysis failed", e.to_string())
                        .with_detail("event_id", task.event_id.clone())
                        .with_detail("snapshots", snapshots.len().to_string()),
                )
                .await;
                return false;
            }
        };

        report.urgency = Some(task.urgency.clone());
        report.completed_at = Some(now);
        report.runs = Some(task.run_count);

        match self.repository.record_analysis_report(&report).await {
            Ok(id) => report.id = Some(id),
            Err(e) => tracing::warn!(
                event_id = %task.event_id,
                error = %e,
                "Failed to persist impact report"
            ),
        }

        tracing::info!(
            event_id = %task.event_id,
            urgency = %task.urgency,
            runs = task.run_count,
            "Market impact tracking complete"
        );

        if let Some(consumer) = &self.consumer {
            let failure = match AssertUnwindSafe(consumer.consume(&report)).catch_unwind().await {
                Ok(Ok(())) => None,
                Ok(Err(e)) => {
                    tracing::warn!(
                        event_id = %task.event_id,
                        error = %e,
                        "Report consumer failed"
                    );
                    Some(e.to_string())
                }
                Err(payload) => {
                    let message = panic_message(payload);
                    tracing::error!(
                        event_id = %task.event_id,
                        panic = %message,
                        "Report consumer panicked"
                    );
                    Some(format!("consumer panicked: {message}"))
                }
            };

            if let Some(error) = failure {
                self.notify_failure(
                    FailureAlert::new("Impact report consumer failed", error.clone())
                        .with_detail("event_id", task.event_id.clone())
                        .with_detail("error", error),
                )
                .await;
            }
        }

        self.publish(TrackerEvent::ReportGenerated {
            id: Uuid::new_v4(),
            event_id: task.event_id.clone(),
            runs: task.run_count,
            timestamp: now,
        });

        true
    }

    async fn notify_failure(&self, alert: FailureAlert) {
        let Some(notifier) = &self.notifier else {
            return;
        };

        let title = alert.title.clone();
        match AssertUnwindSafe(notifier.send_failure_alert(alert))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(title = %title, error = %e, "Failure notifier returned an error"),
            Err(payload) => tracing::error!(
                title = %title,
                panic = %panic_message(payload),
                "Failure notifier panicked"
            ),
        }
    }

    fn publish(&self, event: TrackerEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn provider(&self, class: AssetClass) -> Option<&Arc<dyn PriceProvider>> {
        match class {
            AssetClass::Crypto => self.crypto_provider.as_ref(),
            AssetClass::Indices => self.index_provider.as_ref(),
        }
    }

    fn metrics(&self, class: AssetClass) -> &MetricsCollector {
        match class {
            AssetClass::Crypto => &self.crypto_metrics,
            AssetClass::Indices => &self.index_metrics,
        }
    }

    /// Replaces the symbols new tasks will capture
    ///
    /// Tasks already scheduled keep the symbols they were created with.
    pub fn update_symbols(&self, class: AssetClass, symbols: Vec<String>) {
        let lock = match class {
            AssetClass::Crypto => &self.crypto_symbols,
            AssetClass::Indices => &self.index_symbols,
        };
        *lock.write().unwrap_or_else(|e| e.into_inner()) = normalize_symbols(symbols);
    }

    /// Symbols new tasks will capture for an asset family
    pub fn symbols(&self, class: AssetClass) -> Vec<String> {
        match class {
            AssetClass::Crypto => read_symbols(&self.crypto_symbols),
            AssetClass::Indices => read_symbols(&self.index_symbols),
        }
    }

    /// Subscribes to tracker events
    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.events.subscribe()
    }

    /// Event ids currently tracked, in scheduling order
    pub async fn active_events(&self) -> Vec<String> {
        self.store.event_ids().await
    }

    pub async fn is_tracking(&self, event_id: &str) -> bool {
        self.store.contains(event_id).await
    }

    /// Current scheduling state of a tracked event
    ///
    /// Waits for an in-flight capture of that event to finish.
    pub async fn task(&self, event_id: &str) -> Option<TrackingTask> {
        let slot = self.store.get(event_id).await?;
        let entry = slot.lock().await;
        (!entry.finished).then(|| entry.task.clone())
    }

    /// Gets provider metrics for both asset families
    pub async fn provider_metrics(&self) -> Vec<ProviderMetrics> {
        join_all(
            AssetClass::all()
                .iter()
                .map(|class| self.metrics(*class).get_metrics()),
        )
        .await
    }

    /// Perform a health check on the market impact tracker
    ///
    /// # Returns
    /// ComponentHealth indicating the status of the tracker and its providers
    pub async fn health_check(&self) -> ComponentHealth {
        let mut details = HashMap::new();

        let active = self.store.len().await;
        details.insert("active_events".to_string(), serde_json::json!(active));
        details.insert("enabled".to_string(), serde_json::json!(self.enabled));

        let crypto_symbols = self.symbols(AssetClass::Crypto);
        let index_symbols = self.symbols(AssetClass::Indices);
        details.insert("crypto_symbols".to_string(), serde_json::json!(crypto_symbols));
        details.insert("index_symbols".to_string(), serde_json::json!(index_symbols));

        // Families whose provider fails more often than it succeeds
        let mut failing = Vec::new();
        for metrics in self.provider_metrics().await {
            details.insert(
                format!("{}_success_rate", metrics.asset_class),
                serde_json::json!(metrics.success_rate),
            );
            if metrics.total_requests > 0 && metrics.success_rate < 0.5 {
                failing.push(metrics.asset_class.to_string());
            }
        }

        let status = if !self.enabled || (crypto_symbols.is_empty() && index_symbols.is_empty()) {
            HealthStatus::Unhealthy
        } else if !failing.is_empty() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        let message = match status {
            HealthStatus::Healthy => format!("Market impact tracker is tracking {} events", active),
            HealthStatus::Degraded => {
                format!("Price providers failing for: {}", failing.join(", "))
            }
            HealthStatus::Unhealthy if !self.enabled => {
                "Market impact tracker is disabled".to_string()
            }
            HealthStatus::Unhealthy => "No asset symbols configured".to_string(),
        };

        ComponentHealth {
            name: "market_impact_tracker".to_string(),
            status,
            message: Some(message),
            details,
            last_checked: self.clock.now(),
        }
    }
}

/// A single provider as is, several behind a failover in the given order
fn provider_chain(mut chain: Vec<Arc<dyn PriceProvider>>) -> Arc<dyn PriceProvider> {
    if chain.len() == 1 {
        if let Some(provider) = chain.pop() {
            return provider;
        }
    }
    Arc::new(FailoverProvider::new(chain))
}

/// Lowercases and trims symbols, dropping blanks and repeats
///
/// First occurrence wins, so the caller's order is kept.
fn normalize_symbols(symbols: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    symbols
        .into_iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty() && seen.insert(s.clone()))
        .collect()
}

fn read_symbols(lock: &RwLock<Vec<String>>) -> Vec<String> {
    lock.read().unwrap_or_else(|e| e.into_inner()).clone()
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
