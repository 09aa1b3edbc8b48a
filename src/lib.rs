//! # Market Impact Tracker
//!
//! Measures how markets move after a market-moving post. When the upstream
//! classifier flags a post as urgent, the tracker samples a configured basket
//! of crypto assets and stock indices on a schedule chosen by the urgency,
//! and once the observation window closes turns the samples into an
//! [`ImpactReport`]: price change, volatility, drawdown, outliers, liquidity
//! and trend per asset.
//!
//! ## Usage
//!
//! ```no_run
//! use market_impact_tracker::{MarketImpactTracker, Metadata, TrackerConfig};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // MARKET_IMPACT_CRYPTO_IDS=btc:bitcoin,eth:ethereum
//! // MARKET_IMPACT_INDEX_IDS=spx:^spx
//! let config = TrackerConfig::from_env()?;
//! let tracker = Arc::new(MarketImpactTracker::from_config(&config)?);
//!
//! // Drive due samples and finalization in the background
//! let ticker = tracker.spawn_ticker(Duration::from_secs(30));
//!
//! // Takes the first snapshot right away
//! let scheduled = tracker
//!     .schedule_event("post-123", "immediate", Metadata::new())
//!     .await;
//! println!("tracking started: {}", scheduled);
//!
//! let mut events = tracker.subscribe();
//! while let Ok(event) = events.recv().await {
//!     println!("{}", event);
//! }
//! # ticker.abort();
//! # Ok(())
//! # }
//! ```
//!
//! ## Urgency profiles
//!
//! | urgency     | sample interval | window   |
//! |-------------|-----------------|----------|
//! | `immediate` | 10 minutes      | 6 hours  |
//! | `hours`     | 20 minutes      | 24 hours |
//!
//! ## Architecture
//!
//! ```text
//! schedule_event / handle_analysis_event
//!     ↓
//! MarketImpactTracker ── tick(now) ──> PriceProvider (CoinGecko, Stooq)
//!     │                                   ↑ RateLimiter
//!     ├── TaskStore (live tasks + snapshot accumulators)
//!     ├── ImpactRepository (snapshots, reports)
//!     └── EventAnalyzer ──> ImpactReport ──> ReportConsumer
//! ```
//!
//! ## Error Handling
//!
//! Nothing here fails the host. Provider errors are recorded on the snapshot,
//! persistence errors are logged, and analysis errors end the event without a
//! report. Failures are forwarded to an optional [`FailureNotifier`].

pub mod analysis;
pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod metrics;
pub mod notifier;
pub mod provider;
pub mod providers;
pub mod rate_limiter;
pub mod report;
pub mod repository;
pub mod store;
pub mod tracker;
pub mod types;

// Re-export commonly used types
pub use analysis::{EventAnalyzer, ImpactAnalysisEngine};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::TrackerConfig;
pub use error::{AnalysisError, CollaboratorError, ConfigError, ProviderError, RepositoryError};
pub use metrics::ProviderMetrics;
pub use notifier::{ChannelReportConsumer, FailureAlert, FailureNotifier, ReportConsumer};
pub use provider::PriceProvider;
pub use rate_limiter::RateLimiter;
pub use report::{AssetStats, ImpactReport, TrendDirection};
pub use repository::{ImpactRepository, JsonlRepository, MemoryRepository};
pub use tracker::{MarketImpactTracker, TickSummary};
pub use types::{
    AssetClass, Classification, ComponentHealth, HealthStatus, MarketAssessment, Metadata,
    PricePoint, Snapshot, TrackerEvent, TrackingTask, UrgencyProfile,
};
