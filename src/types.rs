//! Types for the market impact tracker

use crate::constants::{
    HOURS_DURATION_SECS, HOURS_INTERVAL_SECS, IMMEDIATE_DURATION_SECS, IMMEDIATE_INTERVAL_SECS,
    URGENCY_HOURS, URGENCY_IMMEDIATE,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Opaque caller context carried from scheduling through to the final report
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Prices captured for one asset family, keyed by symbol
pub type PriceMap = BTreeMap<String, PricePoint>;

/// Asset families tracked by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    /// Cryptocurrencies (CoinGecko and friends)
    Crypto,
    /// Stock indices and equities (Stooq and friends)
    Indices,
}

impl AssetClass {
    /// Get the family name as used in snapshots and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetClass::Crypto => "crypto",
            AssetClass::Indices => "indices",
        }
    }

    /// Get all asset families
    pub fn all() -> &'static [AssetClass] {
        &[AssetClass::Crypto, AssetClass::Indices]
    }
}

fn seconds_to_duration(secs: u64) -> Option<Duration> {
    i64::try_from(secs).ok().and_then(Duration::try_seconds)
}

impl std::fmt::Display for AssetClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sampling policy for one urgency label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrgencyProfile {
    /// Seconds between captures
    pub interval_seconds: u64,
    /// Length of the observation window in seconds
    pub duration_seconds: u64,
}

impl UrgencyProfile {
    pub fn new(interval_seconds: u64, duration_seconds: u64) -> Self {
        Self {
            interval_seconds,
            duration_seconds,
        }
    }

    /// Time between captures, or `None` when it does not fit a chrono duration
    pub fn sample_interval(&self) -> Option<Duration> {
        seconds_to_duration(self.interval_seconds)
    }

    /// Length of the window, or `None` when it does not fit a chrono duration
    pub fn total_duration(&self) -> Option<Duration> {
        seconds_to_duration(self.duration_seconds)
    }

    /// The built-in profile table: `immediate` and `hours`
    pub fn defaults() -> HashMap<String, UrgencyProfile> {
        HashMap::from([
            (
                URGENCY_IMMEDIATE.to_string(),
                UrgencyProfile::new(IMMEDIATE_INTERVAL_SECS, IMMEDIATE_DURATION_SECS),
            ),
            (
                URGENCY_HOURS.to_string(),
                UrgencyProfile::new(HOURS_INTERVAL_SECS, HOURS_DURATION_SECS),
            ),
        ])
    }
}

/// Price reported by a provider for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Last price, absent when the provider knows the symbol but has no quote
    pub price: Option<f64>,

    /// Quote currency
    pub currency: Option<String>,

    /// Data source
    pub provider: String,

    /// Traded volume, when the provider reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,

    /// Untouched provider payload
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl PricePoint {
    /// Create a new price point
    pub fn new(price: Option<f64>, currency: Option<String>, provider: impl Into<String>) -> Self {
        Self {
            price,
            currency,
            provider: provider.into(),
            volume: None,
            raw: serde_json::Value::Null,
        }
    }

    pub fn with_volume(mut self, volume: Option<f64>) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_raw(mut self, raw: serde_json::Value) -> Self {
        self.raw = raw;
        self
    }

    /// Volume for liquidity analysis
    ///
    /// Prefers the explicit `volume` field, then falls back to a `volume` or
    /// `Volume` entry in the raw payload. String values may carry thousands
    /// separators ("1,234,000").
    pub fn volume_reading(&self) -> Option<f64> {
        if self.volume.is_some() {
            return self.volume;
        }

        let raw = self.raw.as_object()?;
        let value = raw
            .get("volume")
            .filter(|v| !v.is_null())
            .or_else(|| raw.get("Volume"))?;

        match value {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.replace(',', "").trim().parse::<f64>().ok(),
            _ => None,
        }
    }
}

/// Live scheduling state for one tracked event
#[derive(Debug, Clone)]
pub struct TrackingTask {
    pub event_id: String,
    pub urgency: String,
    pub interval_seconds: u64,
    pub window_end: DateTime<Utc>,
    pub next_run: DateTime<Utc>,
    pub crypto_symbols: Vec<String>,
    pub index_symbols: Vec<String>,
    pub metadata: Metadata,
    pub run_count: u32,
}

impl TrackingTask {
    /// Time between captures, saturating at the largest chrono duration
    pub fn sample_interval(&self) -> Duration {
        seconds_to_duration(self.interval_seconds).unwrap_or(Duration::MAX)
    }

    /// Symbols copied onto this task for an asset family
    pub fn symbols(&self, class: AssetClass) -> &[String] {
        match class {
            AssetClass::Crypto => &self.crypto_symbols,
            AssetClass::Indices => &self.index_symbols,
        }
    }

    /// True when a capture is owed at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_run <= now && now <= self.window_end
    }

    /// True once the observation window has elapsed
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.window_end
    }
}

/// One timestamped capture of prices for a tracked event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Storage identifier, assigned by the repository when absent
    #[serde(default, rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub event_id: String,
    pub urgency: String,
    pub captured_at: DateTime<Utc>,
    /// Run count of the task at capture time (0 for the initial capture)
    pub sequence: u32,
    pub interval_seconds: u64,
    pub initial_capture: bool,
    pub metadata: Metadata,
    pub crypto: PriceMap,
    pub indices: PriceMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crypto_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_error: Option<String>,
}

impl Snapshot {
    /// Create an empty snapshot for the task's current run
    pub fn for_task(task: &TrackingTask, captured_at: DateTime<Utc>, initial: bool) -> Self {
        Self {
            id: None,
            event_id: task.event_id.clone(),
            urgency: task.urgency.clone(),
            captured_at,
            sequence: task.run_count,
            interval_seconds: task.interval_seconds,
            initial_capture: initial,
            metadata: task.metadata.clone(),
            crypto: PriceMap::new(),
            indices: PriceMap::new(),
            crypto_error: None,
            index_error: None,
        }
    }

    /// Prices captured for an asset family
    pub fn prices(&self, class: AssetClass) -> &PriceMap {
        match class {
            AssetClass::Crypto => &self.crypto,
            AssetClass::Indices => &self.indices,
        }
    }

    /// Records a family's fetch result on the snapshot
    pub fn set_family(&mut self, class: AssetClass, result: Result<PriceMap, String>) {
        let (prices, error) = match class {
            AssetClass::Crypto => (&mut self.crypto, &mut self.crypto_error),
            AssetClass::Indices => (&mut self.indices, &mut self.index_error),
        };
        match result {
            Ok(map) => *prices = map,
            Err(message) => *error = Some(message),
        }
    }

    /// Fetch error recorded for an asset family
    pub fn error(&self, class: AssetClass) -> Option<&str> {
        match class {
            AssetClass::Crypto => self.crypto_error.as_deref(),
            AssetClass::Indices => self.index_error.as_deref(),
        }
    }
}

/// Urgency verdict handed over by the post classifier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub urgency: Option<String>,
    pub score: Option<f64>,
    pub reasoning: Option<String>,
    pub model: Option<String>,
}

/// Keyword-based market assessment of the same post
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketAssessment {
    pub impact_score: Option<f64>,
    pub impact_level: Option<String>,
}

/// Events published by the tracker
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackerEvent {
    /// Tracking started for an event
    EventScheduled {
        id: Uuid,
        event_id: String,
        urgency: String,
        window_end: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    /// A snapshot was captured
    SnapshotCaptured {
        id: Uuid,
        event_id: String,
        sequence: u32,
        timestamp: DateTime<Utc>,
    },

    /// A provider call failed during capture
    CaptureFailed {
        id: Uuid,
        event_id: String,
        asset_class: AssetClass,
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    /// The impact report for an event is ready
    ReportGenerated {
        id: Uuid,
        event_id: String,
        runs: u32,
        timestamp: DateTime<Utc>,
    },

    /// Finalization ended without a report
    FinalizationFailed {
        id: Uuid,
        event_id: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

impl TrackerEvent {
    /// Get the event ID
    pub fn id(&self) -> Uuid {
        match self {
            TrackerEvent::EventScheduled { id, .. } => *id,
            TrackerEvent::SnapshotCaptured { id, .. } => *id,
            TrackerEvent::CaptureFailed { id, .. } => *id,
            TrackerEvent::ReportGenerated { id, .. } => *id,
            TrackerEvent::FinalizationFailed { id, .. } => *id,
        }
    }

    /// Get the tracked event this notification belongs to
    pub fn event_id(&self) -> &str {
        match self {
            TrackerEvent::EventScheduled { event_id, .. }
            | TrackerEvent::SnapshotCaptured { event_id, .. }
            | TrackerEvent::CaptureFailed { event_id, .. }
            | TrackerEvent::ReportGenerated { event_id, .. }
            | TrackerEvent::FinalizationFailed { event_id, .. } => event_id,
        }
    }

    /// Get the event type as string
    pub fn event_type(&self) -> &'static str {
        match self {
            TrackerEvent::EventScheduled { .. } => "EVENT_SCHEDULED",
            TrackerEvent::SnapshotCaptured { .. } => "SNAPSHOT_CAPTURED",
            TrackerEvent::CaptureFailed { .. } => "CAPTURE_FAILED",
            TrackerEvent::ReportGenerated { .. } => "REPORT_GENERATED",
            TrackerEvent::FinalizationFailed { .. } => "FINALIZATION_FAILED",
        }
    }
}

impl std::fmt::Display for TrackerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackerEvent::EventScheduled {
                event_id, urgency, ..
            } => write!(f, "Tracking scheduled: {} ({})", event_id, urgency),
            TrackerEvent::SnapshotCaptured {
                event_id, sequence, ..
            } => write!(f, "Snapshot #{} captured for {}", sequence, event_id),
            TrackerEvent::CaptureFailed {
                event_id,
                asset_class,
                error_message,
                ..
            } => write!(
                f,
                "{} capture failed for {}: {}",
                asset_class, event_id, error_message
            ),
            TrackerEvent::ReportGenerated { event_id, runs, .. } => {
                write!(f, "Impact report for {} after {} runs", event_id, runs)
            }
            TrackerEvent::FinalizationFailed {
                event_id,
                error_message,
                ..
            } => write!(f, "Finalization failed for {}: {}", event_id, error_message),
        }
    }
}

/// Overall system health status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// System is healthy and all components are operational
    Healthy,
    /// System is degraded but still functional
    Degraded,
    /// System is unhealthy and requires attention
    Unhealthy,
}

/// Component health information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional status message
    pub message: Option<String>,
    /// Component-specific details
    pub details: HashMap<String, serde_json::Value>,
    /// Last checked timestamp
    pub last_checked: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_profiles() {
        let profiles = UrgencyProfile::defaults();
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles["immediate"].sample_interval(), Some(Duration::minutes(10)));
        assert_eq!(profiles["immediate"].total_duration(), Some(Duration::hours(6)));
        assert_eq!(profiles["hours"].sample_interval(), Some(Duration::minutes(20)));
        assert_eq!(profiles["hours"].total_duration(), Some(Duration::hours(24)));
    }

    #[test]
    fn test_oversized_profiles_do_not_convert() {
        assert_eq!(UrgencyProfile::new(u64::MAX, 3600).sample_interval(), None);
        assert_eq!(
            UrgencyProfile::new(60, 10_000_000_000_000_000).total_duration(),
            None
        );
        assert_eq!(
            UrgencyProfile::new(60, 3600).total_duration(),
            Some(Duration::hours(1))
        );
    }

    #[test]
    fn test_volume_reading_prefers_explicit_volume() {
        let point = PricePoint::new(Some(1.0), None, "test")
            .with_volume(Some(42.0))
            .with_raw(json!({ "volume": 7.0 }));
        assert_eq!(point.volume_reading(), Some(42.0));
    }

    #[test]
    fn test_volume_reading_from_raw_payload() {
        let numeric = PricePoint::new(Some(1.0), None, "test").with_raw(json!({ "volume": 7.5 }));
        assert_eq!(numeric.volume_reading(), Some(7.5));

        let text = PricePoint::new(Some(1.0), None, "stooq")
            .with_raw(json!({ "Close": "5000", "Volume": "1,234,000" }));
        assert_eq!(text.volume_reading(), Some(1_234_000.0));

        let garbage = PricePoint::new(Some(1.0), None, "stooq").with_raw(json!({ "Volume": "N/D" }));
        assert_eq!(garbage.volume_reading(), None);

        let none = PricePoint::new(Some(1.0), None, "test");
        assert_eq!(none.volume_reading(), None);
    }

    #[test]
    fn test_task_due_and_expiry() {
        let start = Utc::now();
        let task = TrackingTask {
            event_id: "e".to_string(),
            urgency: "immediate".to_string(),
            interval_seconds: 600,
            window_end: start + Duration::hours(1),
            next_run: start + Duration::minutes(10),
            crypto_symbols: vec!["btc".to_string()],
            index_symbols: vec![],
            metadata: Metadata::new(),
            run_count: 1,
        };

        assert!(!task.is_due(start));
        assert!(task.is_due(start + Duration::minutes(10)));
        assert!(task.is_due(start + Duration::hours(1)));
        assert!(!task.is_due(start + Duration::hours(2)));
        assert!(!task.is_expired(start + Duration::hours(1)));
        assert!(task.is_expired(start + Duration::hours(1) + Duration::seconds(1)));
        assert_eq!(task.symbols(AssetClass::Crypto), ["btc".to_string()]);
        assert!(task.symbols(AssetClass::Indices).is_empty());
    }

    #[test]
    fn test_snapshot_serializes_storage_shape() {
        let mut snapshot = Snapshot {
            id: None,
            event_id: "post-1".to_string(),
            urgency: "hours".to_string(),
            captured_at: Utc::now(),
            sequence: 0,
            interval_seconds: 1200,
            initial_capture: true,
            metadata: Metadata::new(),
            crypto: PriceMap::new(),
            indices: PriceMap::new(),
            crypto_error: None,
            index_error: None,
        };
        snapshot.set_family(AssetClass::Crypto, Err("boom".to_string()));

        let value = serde_json::to_value(&snapshot).unwrap();
        assert!(value.get("_id").is_none());
        assert_eq!(value["crypto_error"], "boom");
        assert!(value.get("index_error").is_none());
        assert_eq!(snapshot.error(AssetClass::Crypto), Some("boom"));
    }

    #[test]
    fn test_tracker_event_display() {
        let event = TrackerEvent::CaptureFailed {
            id: Uuid::new_v4(),
            event_id: "post-9".to_string(),
            asset_class: AssetClass::Indices,
            error_message: "Request timeout".to_string(),
            timestamp: Utc::now(),
        };
        assert_eq!(event.event_type(), "CAPTURE_FAILED");
        assert_eq!(event.event_id(), "post-9");
        assert_eq!(
            event.to_string(),
            "indices capture failed for post-9: Request timeout"
        );
    }
}
