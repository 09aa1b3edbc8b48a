//! Impact report structures produced when a tracking window closes

use crate::types::{AssetClass, Metadata};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-symbol statistics for one asset family
pub type AssetStatsMap = BTreeMap<String, AssetStats>;

/// Finalized statistical summary of one tracked event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactReport {
    /// Storage identifier, assigned by the repository when absent
    #[serde(default, rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub event_id: String,
    pub generated_at: DateTime<Utc>,
    pub metadata: Metadata,
    pub overview: Overview,
    pub assets: AssetBreakdown,
    #[serde(rename = "report")]
    pub report_text: String,

    /// Attached by the scheduler at finalization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runs: Option<u32>,
}

impl ImpactReport {
    /// Statistics for one asset, if it was observed
    pub fn asset(&self, class: AssetClass, symbol: &str) -> Option<&AssetStats> {
        self.assets.family(class).get(symbol)
    }
}

/// Statistics split by asset family
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetBreakdown {
    pub crypto: AssetStatsMap,
    pub indices: AssetStatsMap,
}

impl AssetBreakdown {
    pub fn family(&self, class: AssetClass) -> &AssetStatsMap {
        match class {
            AssetClass::Crypto => &self.crypto,
            AssetClass::Indices => &self.indices,
        }
    }
}

/// Event-level summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overview {
    /// Number of snapshots analyzed
    pub observation_count: usize,
    /// Time span covered by the snapshots, absent when there were none
    pub window: Option<ObservationWindow>,
    pub movers: TopMovers,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_seconds: f64,
}

/// Largest absolute mover per family
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopMovers {
    pub crypto: Option<TopMover>,
    pub indices: Option<TopMover>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopMover {
    pub symbol: String,
    pub percent_change: Option<f64>,
    pub trend: Trend,
}

/// Derived statistics for one asset over the tracking window
///
/// When the asset never had a usable price only `observations`, `liquidity`,
/// `trend` (unknown) and `notes` carry information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetStats {
    /// Observations with a usable price (or all observations when there were none)
    pub observations: usize,
    pub first_observation: Option<Observation>,
    pub last_observation: Option<Observation>,
    pub change: Option<PriceChange>,
    pub high: Option<Observation>,
    pub low: Option<Observation>,
    pub volatility: Volatility,
    pub max_drawdown: Option<Drawdown>,
    pub outliers: Vec<Outlier>,
    pub liquidity: Liquidity,
    pub trend: Trend,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl AssetStats {
    /// Percent change between first and last observation
    pub fn percent_change(&self) -> Option<f64> {
        self.change.as_ref().and_then(|c| c.percent)
    }

    /// True when at least one price was observed
    pub fn has_prices(&self) -> bool {
        self.first_observation.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceChange {
    pub absolute: f64,
    /// Absent when the first price was zero
    pub percent: Option<f64>,
    /// Compounded simple return over consecutive valid prices (fraction)
    pub cumulative_return: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Volatility {
    /// Population standard deviation of step log-returns
    pub step_standard_deviation: f64,
    pub percent: f64,
    pub return_samples: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Drawdown {
    /// Worst decline from the running peak (0.0 or negative)
    pub percent: f64,
    pub from_timestamp: DateTime<Utc>,
    pub to_timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_price: Option<f64>,
}

/// A single sampling step whose move met the outlier threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Outlier {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub from_price: f64,
    pub percent_move: f64,
    pub threshold_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Liquidity {
    Available {
        average: f64,
        /// Absent when the first volume reading was zero
        change_percent: Option<f64>,
    },
    Unavailable,
}

impl Liquidity {
    pub fn has_volume(&self) -> bool {
        matches!(self, Liquidity::Available { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Uptrend,
    Downtrend,
    Flat,
    Unknown,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Uptrend => "uptrend",
            TrendDirection::Downtrend => "downtrend",
            TrendDirection::Flat => "flat",
            TrendDirection::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub direction: TrendDirection,
    pub confidence: f64,
    pub magnitude_percent: Option<f64>,
}

impl Trend {
    pub fn unknown() -> Self {
        Self {
            direction: TrendDirection::Unknown,
            confidence: 0.0,
            magnitude_percent: None,
        }
    }
}
