//! Provider health metrics collection and reporting
//!
//! Tracks call latency percentiles and success rates per asset family, as
//! seen by the scheduler (including its own call timeout).

use crate::types::AssetClass;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::RwLock;

/// Maximum number of samples to keep for metrics calculation
const MAX_SAMPLES: usize = 100;

/// Metrics for the provider serving one asset family
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderMetrics {
    /// Asset family the provider serves
    pub asset_class: AssetClass,
    /// 50th percentile latency in milliseconds
    pub latency_p50_ms: f64,
    /// 99th percentile latency in milliseconds
    pub latency_p99_ms: f64,
    /// Success rate (0.0 to 1.0)
    pub success_rate: f64,
    /// Total number of calls tracked
    pub total_requests: u64,
    /// Number of failed calls
    pub failed_requests: u64,
    /// Message of the most recent failure
    pub last_error: Option<String>,
}

impl ProviderMetrics {
    /// Creates metrics with no data
    pub fn empty(asset_class: AssetClass) -> Self {
        Self {
            asset_class,
            latency_p50_ms: 0.0,
            latency_p99_ms: 0.0,
            success_rate: 1.0,
            total_requests: 0,
            failed_requests: 0,
            last_error: None,
        }
    }
}

/// Internal sample for latency tracking
#[derive(Debug, Clone)]
struct LatencySample {
    duration_ms: f64,
    success: bool,
}

#[derive(Debug, Default)]
struct MetricsState {
    /// Rolling window of latency samples
    samples: VecDeque<LatencySample>,
    /// Total calls (lifetime)
    total_requests: u64,
    /// Failed calls (lifetime)
    failed_requests: u64,
    last_error: Option<String>,
}

/// Collects and computes metrics for one asset family
pub struct MetricsCollector {
    asset_class: AssetClass,
    state: RwLock<MetricsState>,
}

impl MetricsCollector {
    /// Creates a new metrics collector
    pub fn new(asset_class: AssetClass) -> Self {
        Self {
            asset_class,
            state: RwLock::new(MetricsState {
                samples: VecDeque::with_capacity(MAX_SAMPLES),
                ..MetricsState::default()
            }),
        }
    }

    /// Records a successful call
    pub async fn record_success(&self, duration: Duration) {
        self.record(duration, None).await;
    }

    /// Records a failed call
    pub async fn record_failure(&self, duration: Duration, error: &str) {
        self.record(duration, Some(error)).await;
    }

    async fn record(&self, duration: Duration, error: Option<&str>) {
        let mut state = self.state.write().await;

        state.total_requests += 1;
        if let Some(error) = error {
            state.failed_requests += 1;
            state.last_error = Some(error.to_string());
        }

        if state.samples.len() >= MAX_SAMPLES {
            state.samples.pop_front();
        }
        state.samples.push_back(LatencySample {
            duration_ms: duration.as_secs_f64() * 1000.0,
            success: error.is_none(),
        });
    }

    /// Computes current metrics from collected samples
    pub async fn get_metrics(&self) -> ProviderMetrics {
        let state = self.state.read().await;

        if state.samples.is_empty() {
            return ProviderMetrics::empty(self.asset_class);
        }

        // Extract successful latencies for percentile calculation
        let mut latencies: Vec<f64> = state
            .samples
            .iter()
            .filter(|s| s.success)
            .map(|s| s.duration_ms)
            .collect();

        latencies.sort_by(|a, b| a.total_cmp(b));

        let success_rate = if state.total_requests > 0 {
            (state.total_requests - state.failed_requests) as f64 / state.total_requests as f64
        } else {
            1.0
        };

        ProviderMetrics {
            asset_class: self.asset_class,
            latency_p50_ms: percentile(&latencies, 50.0),
            latency_p99_ms: percentile(&latencies, 99.0),
            success_rate,
            total_requests: state.total_requests,
            failed_requests: state.failed_requests,
            last_error: state.last_error.clone(),
        }
    }
}

/// Nearest-rank percentile of ascending values
///
/// Returns the smallest sample with at least `p` percent of the samples at or
/// below it, so the result is always an observed latency.
fn percentile(sorted_values: &[f64], p: f64) -> f64 {
    let n = sorted_values.len();
    if n == 0 {
        return 0.0;
    }

    let rank = (p.clamp(0.0, 100.0) / 100.0 * n as f64).ceil() as usize;
    sorted_values[rank.clamp(1, n) - 1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_metrics_collector() {
        let collector = MetricsCollector::new(AssetClass::Crypto);

        collector.record_success(Duration::from_millis(100)).await;
        collector.record_success(Duration::from_millis(200)).await;
        collector
            .record_failure(Duration::from_millis(150), "Rate limit exceeded")
            .await;

        let metrics = collector.get_metrics().await;

        assert_eq!(metrics.asset_class, AssetClass::Crypto);
        assert_eq!(metrics.total_requests, 3);
        assert_eq!(metrics.failed_requests, 1);
        assert!(metrics.success_rate > 0.6 && metrics.success_rate < 0.7);
        assert_eq!(metrics.last_error.as_deref(), Some("Rate limit exceeded"));
        assert_eq!(metrics.latency_p50_ms, 100.0);
        assert_eq!(metrics.latency_p99_ms, 200.0);
    }

    #[tokio::test]
    async fn test_empty_metrics() {
        let collector = MetricsCollector::new(AssetClass::Indices);
        assert_eq!(
            collector.get_metrics().await,
            ProviderMetrics::empty(AssetClass::Indices)
        );
    }

    #[tokio::test]
    async fn test_sample_window_is_bounded() {
        let collector = MetricsCollector::new(AssetClass::Crypto);
        for i in 0..(MAX_SAMPLES + 10) {
            collector.record_success(Duration::from_millis(i as u64)).await;
        }

        let metrics = collector.get_metrics().await;
        assert_eq!(metrics.total_requests, (MAX_SAMPLES + 10) as u64);
        assert_eq!(collector.state.read().await.samples.len(), MAX_SAMPLES);
    }

    #[test]
    fn test_percentile() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        assert_eq!(percentile(&values, 50.0), 5.0);
        assert_eq!(percentile(&values, 90.0), 9.0);
        assert_eq!(percentile(&values, 99.0), 10.0);
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 100.0), 10.0);
        assert_eq!(percentile(&[42.0], 50.0), 42.0);
        assert_eq!(percentile(&[], 50.0), 0.0);
    }
}
