//! Statistical analysis of completed tracking sessions
//!
//! Turns the ordered snapshots of one event into an [`ImpactReport`]: per-asset
//! price change, volatility of step log-returns, running-peak drawdown,
//! outlier moves, liquidity and a trend verdict, plus a plain-text rendering.
//! Everything here is pure; the engine never mutates its input.

use crate::{
    constants::{DEFAULT_OUTLIER_THRESHOLD_PCT, OUTLIER_VOLATILITY_MULTIPLIER},
    error::AnalysisError,
    report::{
        AssetBreakdown, AssetStats, AssetStatsMap, Drawdown, ImpactReport, Liquidity,
        Observation, ObservationWindow, Outlier, Overview, PriceChange, TopMover, TopMovers, Trend,
        TrendDirection, Volatility,
    },
    types::{AssetClass, Metadata, Snapshot},
};
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeMap;

const NO_SNAPSHOTS_NOTE: &str = "No snapshots available for analysis.";
const NO_DATA_TEXT: &str = "No market data was captured for this event.";
const NO_PRICE_NOTE: &str = "No price data captured.";

/// Produces an impact report from the snapshots of a finished tracking task
pub trait EventAnalyzer: Send + Sync {
    fn analyze_event(
        &self,
        event_id: &str,
        snapshots: &[Snapshot],
        metadata: &Metadata,
        generated_at: DateTime<Utc>,
    ) -> Result<ImpactReport, AnalysisError>;
}

/// One observation of an asset inside a snapshot
#[derive(Debug, Clone, Copy)]
struct SeriesPoint {
    timestamp: DateTime<Utc>,
    price: Option<f64>,
    volume: Option<f64>,
}

/// Log-return between two consecutive usable prices
#[derive(Debug, Clone, Copy)]
struct StepReturn {
    from: Observation,
    to: Observation,
    log_return: f64,
}

/// Default analysis engine
#[derive(Debug, Clone)]
pub struct ImpactAnalysisEngine {
    /// Percent move that always counts as an outlier, whatever the volatility
    outlier_threshold_pct: f64,
}

impl Default for ImpactAnalysisEngine {
    fn default() -> Self {
        Self::new(DEFAULT_OUTLIER_THRESHOLD_PCT)
    }
}

impl ImpactAnalysisEngine {
    pub fn new(outlier_threshold_pct: f64) -> Self {
        Self {
            outlier_threshold_pct: outlier_threshold_pct.abs(),
        }
    }

    pub fn outlier_threshold_pct(&self) -> f64 {
        self.outlier_threshold_pct
    }

    fn build_asset_statistics(
        &self,
        snapshots: &[&Snapshot],
        class: AssetClass,
    ) -> Result<AssetStatsMap, AnalysisError> {
        let mut per_asset: BTreeMap<&str, Vec<SeriesPoint>> = BTreeMap::new();

        for snapshot in snapshots {
            for (symbol, point) in snapshot.prices(class) {
                per_asset.entry(symbol.as_str()).or_default().push(SeriesPoint {
                    timestamp: snapshot.captured_at,
                    price: point.price.filter(|p| p.is_finite()),
                    volume: point.volume_reading(),
                });
            }
        }

        per_asset
            .into_iter()
            .map(|(symbol, series)| {
                self.compute_series_metrics(symbol, &series)
                    .map(|stats| (symbol.to_string(), stats))
            })
            .collect()
    }

    fn compute_series_metrics(
        &self,
        symbol: &str,
        series: &[SeriesPoint],
    ) -> Result<AssetStats, AnalysisError> {
        let clean: Vec<Observation> = series
            .iter()
            .filter_map(|point| {
                point.price.map(|price| Observation {
                    timestamp: point.timestamp,
                    price,
                })
            })
            .collect();

        let liquidity = compute_liquidity(series);

        let (Some(first), Some(last)) = (clean.first().copied(), clean.last().copied()) else {
            return Ok(AssetStats {
                observations: series.len(),
                first_observation: None,
                last_observation: None,
                change: None,
                high: None,
                low: None,
                volatility: Volatility::default(),
                max_drawdown: None,
                outliers: Vec::new(),
                liquidity,
                trend: Trend::unknown(),
                notes: Some(NO_PRICE_NOTE.to_string()),
            });
        };

        // First occurrence wins on ties
        let high = clean.iter().skip(1).fold(first, |best, point| {
            if point.price > best.price {
                *point
            } else {
                best
            }
        });
        let low = clean.iter().skip(1).fold(first, |best, point| {
            if point.price < best.price {
                *point
            } else {
                best
            }
        });

        let percent = safe_percent_change(last.price, first.price);
        let change = PriceChange {
            absolute: last.price - first.price,
            percent,
            cumulative_return: compute_cumulative_return(&clean),
        };

        let returns = compute_step_returns(&clean);
        let log_returns: Vec<f64> = returns.iter().map(|r| r.log_return).collect();
        let deviation = if log_returns.len() > 1 {
            population_std_dev(&log_returns)
        } else {
            0.0
        };

        let volatility = Volatility {
            step_standard_deviation: deviation,
            percent: deviation * 100.0,
            return_samples: returns.len(),
        };

        let drawdown = compute_max_drawdown(first, &clean);
        let outliers = self.detect_outliers(&returns, deviation);

        ensure_finite(symbol, "absolute change", change.absolute)?;
        ensure_finite(symbol, "cumulative return", change.cumulative_return)?;
        ensure_finite(symbol, "volatility", deviation)?;
        ensure_finite(symbol, "drawdown", drawdown.percent)?;
        if let Some(percent) = percent {
            ensure_finite(symbol, "percent change", percent)?;
        }

        Ok(AssetStats {
            observations: clean.len(),
            first_observation: Some(first),
            last_observation: Some(last),
            change: Some(change),
            high: Some(high),
            low: Some(low),
            volatility,
            max_drawdown: Some(drawdown),
            outliers,
            liquidity,
            trend: classify_trend(percent),
            notes: None,
        })
    }

    /// Flags steps whose absolute log-return reaches the threshold
    ///
    /// The threshold is the larger of the fixed percent threshold and three
    /// step standard deviations.
    fn detect_outliers(&self, returns: &[StepReturn], deviation: f64) -> Vec<Outlier> {
        if returns.is_empty() {
            return Vec::new();
        }

        let threshold = (self.outlier_threshold_pct / 100.0)
            .max(OUTLIER_VOLATILITY_MULTIPLIER * deviation);

        returns
            .iter()
            .filter(|step| step.log_return.abs() >= threshold)
            .map(|step| Outlier {
                timestamp: step.to.timestamp,
                price: step.to.price,
                from_price: step.from.price,
                percent_move: step.log_return.exp_m1() * 100.0,
                threshold_percent: threshold * 100.0,
            })
            .collect()
    }
}

impl EventAnalyzer for ImpactAnalysisEngine {
    fn analyze_event(
        &self,
        event_id: &str,
        snapshots: &[Snapshot],
        metadata: &Metadata,
        generated_at: DateTime<Utc>,
    ) -> Result<ImpactReport, AnalysisError> {
        if let Some(foreign) = snapshots.iter().find(|s| s.event_id != event_id) {
            return Err(AnalysisError::EventMismatch {
                expected: event_id.to_string(),
                found: foreign.event_id.clone(),
            });
        }

        let mut ordered: Vec<&Snapshot> = snapshots.iter().collect();
        ordered.sort_by_key(|snapshot| snapshot.captured_at);

        let (Some(first), Some(last)) = (ordered.first(), ordered.last()) else {
            return Ok(ImpactReport {
                id: None,
                event_id: event_id.to_string(),
                generated_at,
                metadata: metadata.clone(),
                overview: Overview {
                    observation_count: 0,
                    window: None,
                    movers: TopMovers::default(),
                    notes: Some(NO_SNAPSHOTS_NOTE.to_string()),
                },
                assets: AssetBreakdown::default(),
                report_text: NO_DATA_TEXT.to_string(),
                urgency: None,
                completed_at: None,
                runs: None,
            });
        };

        let window = ObservationWindow {
            start: first.captured_at,
            end: last.captured_at,
            duration_seconds: (last.captured_at - first.captured_at).num_milliseconds() as f64
                / 1000.0,
        };

        let assets = AssetBreakdown {
            crypto: self.build_asset_statistics(&ordered, AssetClass::Crypto)?,
            indices: self.build_asset_statistics(&ordered, AssetClass::Indices)?,
        };

        let overview = Overview {
            observation_count: ordered.len(),
            window: Some(window),
            movers: TopMovers {
                crypto: top_mover(&assets.crypto),
                indices: top_mover(&assets.indices),
            },
            notes: None,
        };

        let report_text = render_report(event_id, &overview, &assets);

        Ok(ImpactReport {
            id: None,
            event_id: event_id.to_string(),
            generated_at,
            metadata: metadata.clone(),
            overview,
            assets,
            report_text,
            urgency: None,
            completed_at: None,
            runs: None,
        })
    }
}

fn ensure_finite(symbol: &str, metric: &'static str, value: f64) -> Result<(), AnalysisError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(AnalysisError::non_finite(symbol, metric))
    }
}

/// Percent change from `base` to `current`; `None` when the base is zero
///
/// Divides by the magnitude of the base so the sign always follows
/// `current - base`.
fn safe_percent_change(current: f64, base: f64) -> Option<f64> {
    if base == 0.0 {
        return None;
    }
    Some((current - base) / base.abs() * 100.0)
}

/// Consecutive pairs of strictly positive prices
fn valid_pairs(series: &[Observation]) -> impl Iterator<Item = (Observation, Observation)> + '_ {
    series
        .windows(2)
        .map(|pair| (pair[0], pair[1]))
        .filter(|(prev, curr)| prev.price > 0.0 && curr.price > 0.0)
}

fn compute_step_returns(series: &[Observation]) -> Vec<StepReturn> {
    valid_pairs(series)
        .map(|(from, to)| StepReturn {
            from,
            to,
            log_return: (to.price / from.price).ln(),
        })
        .collect()
}

/// Compounded simple return over valid steps, as a fraction
fn compute_cumulative_return(series: &[Observation]) -> f64 {
    valid_pairs(series).fold(1.0, |acc, (prev, curr)| acc * (curr.price / prev.price)) - 1.0
}

fn population_std_dev(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

/// Worst decline from the running peak
///
/// The peak moves to every new high; each later point is measured against
/// the peak in force at that moment, and the worst such excursion is kept
/// together with the peak it was measured from.
fn compute_max_drawdown(start: Observation, series: &[Observation]) -> Drawdown {
    let mut peak = start;
    let mut worst = 0.0;
    let mut episode: Option<(Observation, Observation)> = None;

    for point in series.iter().skip(1) {
        if point.price > peak.price {
            peak = *point;
            continue;
        }

        if let Some(drawdown) = safe_percent_change(point.price, peak.price) {
            if drawdown < worst {
                worst = drawdown;
                episode = Some((peak, *point));
            }
        }
    }

    match episode {
        Some((from, to)) => Drawdown {
            percent: worst,
            from_timestamp: from.timestamp,
            to_timestamp: to.timestamp,
            from_price: Some(from.price),
            to_price: Some(to.price),
        },
        None => Drawdown {
            percent: 0.0,
            from_timestamp: peak.timestamp,
            to_timestamp: peak.timestamp,
            from_price: None,
            to_price: None,
        },
    }
}

fn compute_liquidity(series: &[SeriesPoint]) -> Liquidity {
    let volumes: Vec<f64> = series
        .iter()
        .filter_map(|point| point.volume)
        .filter(|v| v.is_finite())
        .collect();

    let (Some(&first), Some(&last)) = (volumes.first(), volumes.last()) else {
        return Liquidity::Unavailable;
    };

    Liquidity::Available {
        average: volumes.iter().sum::<f64>() / volumes.len() as f64,
        change_percent: safe_percent_change(last, first),
    }
}

fn classify_trend(percent_change: Option<f64>) -> Trend {
    let Some(percent) = percent_change else {
        return Trend::unknown();
    };

    let direction = if percent > 0.0 {
        TrendDirection::Uptrend
    } else if percent < 0.0 {
        TrendDirection::Downtrend
    } else {
        TrendDirection::Flat
    };

    let magnitude = percent.abs();
    let confidence = if magnitude >= 5.0 {
        0.9
    } else if magnitude >= 2.0 {
        0.7
    } else if magnitude >= 1.0 {
        0.5
    } else {
        0.3
    };

    Trend {
        direction,
        confidence,
        magnitude_percent: Some(percent),
    }
}

/// Symbol with the largest absolute percent change among assets that had prices
fn top_mover(stats: &AssetStatsMap) -> Option<TopMover> {
    let mut best: Option<(&String, &AssetStats)> = None;

    for (symbol, asset) in stats.iter().filter(|(_, a)| a.has_prices()) {
        let magnitude = asset.percent_change().unwrap_or(0.0).abs();
        let better = match best {
            None => true,
            Some((_, current)) => magnitude > current.percent_change().unwrap_or(0.0).abs(),
        };
        if better {
            best = Some((symbol, asset));
        }
    }

    best.map(|(symbol, asset)| TopMover {
        symbol: symbol.clone(),
        percent_change: asset.percent_change(),
        trend: asset.trend,
    })
}

fn timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn render_report(event_id: &str, overview: &Overview, assets: &AssetBreakdown) -> String {
    let mut lines = vec![format!("Event Impact Report - {}", event_id)];

    if let Some(window) = &overview.window {
        lines.push(format!(
            "Window: {} -> {} ({:.1} min, {} samples)",
            timestamp(window.start),
            timestamp(window.end),
            window.duration_seconds / 60.0,
            overview.observation_count
        ));
    }

    render_section(&mut lines, "Crypto", &assets.crypto);
    render_section(&mut lines, "Indices", &assets.indices);

    let any_prices = assets
        .crypto
        .values()
        .chain(assets.indices.values())
        .any(AssetStats::has_prices);
    if !any_prices {
        lines.push(NO_DATA_TEXT.to_string());
    }

    lines.join("\n")
}

fn render_section(lines: &mut Vec<String>, title: &str, stats: &AssetStatsMap) {
    if stats.is_empty() {
        lines.push(format!("{}: no data captured.", title));
        return;
    }

    lines.push(format!("{}:", title));
    for (symbol, asset) in stats {
        let (Some(high), Some(low)) = (asset.high, asset.low) else {
            lines.push(format!(
                "  - {}: no price data ({} observations)",
                symbol.to_uppercase(),
                asset.observations
            ));
            continue;
        };

        let change = match asset.percent_change() {
            Some(percent) => format!("{:+.2}%", percent),
            None => "n/a".to_string(),
        };
        lines.push(format!(
            "  - {}: {} (High {:.2} @ {}, Low {:.2} @ {}, Trend: {})",
            symbol.to_uppercase(),
            change,
            high.price,
            timestamp(high.timestamp),
            low.price,
            timestamp(low.timestamp),
            asset.trend.direction
        ));

        if let Some(first) = asset.outliers.first() {
            lines.push(format!(
                "    outliers: {} move(s) >= {:.2}%",
                asset.outliers.len(),
                first.threshold_percent
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PriceMap, PricePoint};
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
    }

    fn snapshot(sequence: u32, crypto: &[(&str, Option<f64>)]) -> Snapshot {
        Snapshot {
            id: None,
            event_id: "post-1".to_string(),
            urgency: "immediate".to_string(),
            captured_at: start() + Duration::minutes(10 * sequence as i64),
            sequence,
            interval_seconds: 600,
            initial_capture: sequence == 0,
            metadata: Metadata::new(),
            crypto: crypto
                .iter()
                .map(|(symbol, price)| {
                    (
                        symbol.to_string(),
                        PricePoint::new(*price, Some("usd".to_string()), "test"),
                    )
                })
                .collect(),
            indices: PriceMap::new(),
            crypto_error: None,
            index_error: None,
        }
    }

    fn series(symbol: &str, prices: &[f64]) -> Vec<Snapshot> {
        prices
            .iter()
            .enumerate()
            .map(|(i, price)| snapshot(i as u32, &[(symbol, Some(*price))]))
            .collect()
    }

    fn analyze(snapshots: &[Snapshot]) -> ImpactReport {
        ImpactAnalysisEngine::default()
            .analyze_event("post-1", snapshots, &Metadata::new(), start())
            .unwrap()
    }

    #[test]
    fn test_reference_series() {
        let report = analyze(&series("btc", &[100.0, 101.5, 99.4, 102.0]));
        let btc = report.asset(AssetClass::Crypto, "btc").unwrap();

        assert_eq!(btc.observations, 4);
        assert_relative_eq!(btc.percent_change().unwrap(), 2.0, epsilon = 1e-9);
        assert_relative_eq!(btc.change.unwrap().absolute, 2.0, epsilon = 1e-9);
        assert_relative_eq!(btc.change.unwrap().cumulative_return, 0.02, epsilon = 1e-9);
        assert_eq!(btc.high.unwrap().price, 102.0);
        assert_eq!(btc.high.unwrap().timestamp, start() + Duration::minutes(30));
        assert_eq!(btc.low.unwrap().price, 99.4);
        assert_eq!(btc.low.unwrap().timestamp, start() + Duration::minutes(20));
        assert_eq!(btc.trend.direction, TrendDirection::Uptrend);
        assert_eq!(btc.volatility.return_samples, 3);
        assert_relative_eq!(btc.volatility.percent, 1.99562, epsilon = 1e-4);
        assert!(btc.outliers.is_empty());

        let drawdown = btc.max_drawdown.unwrap();
        assert_relative_eq!(drawdown.percent, (99.4 - 101.5) / 101.5 * 100.0, epsilon = 1e-9);
        assert_eq!(drawdown.from_price, Some(101.5));
        assert_eq!(drawdown.to_price, Some(99.4));
    }

    #[test]
    fn test_strictly_increasing_series_has_no_drawdown() {
        let report = analyze(&series("eth", &[10.0, 11.0, 12.5, 13.0, 20.0]));
        let drawdown = report.asset(AssetClass::Crypto, "eth").unwrap().max_drawdown.unwrap();

        assert_eq!(drawdown.percent, 0.0);
        assert_eq!(drawdown.from_timestamp, drawdown.to_timestamp);
        assert_eq!(drawdown.from_price, None);
    }

    #[test]
    fn test_drawdown_keeps_worst_episode() {
        let report = analyze(&series("btc", &[100.0, 120.0, 90.0, 130.0, 125.0]));
        let drawdown = report.asset(AssetClass::Crypto, "btc").unwrap().max_drawdown.unwrap();

        assert_relative_eq!(drawdown.percent, -25.0, epsilon = 1e-9);
        assert_eq!(drawdown.from_timestamp, start() + Duration::minutes(10));
        assert_eq!(drawdown.to_timestamp, start() + Duration::minutes(20));
    }

    #[test]
    fn test_outlier_detection() {
        let mut prices = vec![100.0; 20];
        prices.push(110.0);
        let report = analyze(&series("btc", &prices));
        let btc = report.asset(AssetClass::Crypto, "btc").unwrap();

        assert_eq!(btc.outliers.len(), 1);
        let outlier = btc.outliers[0];
        assert_eq!(outlier.timestamp, start() + Duration::minutes(200));
        assert_eq!(outlier.price, 110.0);
        assert_eq!(outlier.from_price, 100.0);
        assert_relative_eq!(outlier.percent_move, 10.0, epsilon = 1e-9);
        assert!(outlier.threshold_percent > 2.5);
        assert!(report.report_text.contains("outliers: 1 move(s)"));
    }

    #[test]
    fn test_fixed_threshold_applies_when_volatility_is_low() {
        let engine = ImpactAnalysisEngine::new(-1.0);
        assert_eq!(engine.outlier_threshold_pct(), 1.0);

        let steps = vec![
            StepReturn {
                from: Observation { timestamp: start(), price: 100.0 },
                to: Observation { timestamp: start(), price: 101.0 },
                log_return: (1.01f64).ln(),
            },
            StepReturn {
                from: Observation { timestamp: start(), price: 101.0 },
                to: Observation { timestamp: start(), price: 101.5 },
                log_return: (101.5f64 / 101.0).ln(),
            },
        ];
        let outliers = engine.detect_outliers(&steps, 0.0);

        assert_eq!(outliers.len(), 0);
        let outliers = ImpactAnalysisEngine::new(0.5).detect_outliers(&steps, 0.0);
        assert_eq!(outliers.len(), 1);
        assert_relative_eq!(outliers[0].threshold_percent, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_missing_prices_are_skipped() {
        let snapshots = vec![
            snapshot(0, &[("btc", Some(100.0))]),
            snapshot(1, &[("btc", None)]),
            snapshot(2, &[("btc", Some(105.0))]),
        ];
        let report = analyze(&snapshots);
        let btc = report.asset(AssetClass::Crypto, "btc").unwrap();

        assert_eq!(btc.observations, 2);
        assert_eq!(btc.volatility.return_samples, 1);
        assert_relative_eq!(btc.percent_change().unwrap(), 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_unordered_input_is_sorted() {
        let mut snapshots = series("btc", &[100.0, 101.5, 99.4, 102.0]);
        let ordered = analyze(&snapshots);
        snapshots.reverse();
        let reversed = analyze(&snapshots);

        assert_eq!(ordered, reversed);
    }

    #[test]
    fn test_asset_without_prices() {
        let snapshots = vec![snapshot(0, &[("xrp", None)]), snapshot(1, &[("xrp", None)])];
        let report = analyze(&snapshots);
        let xrp = report.asset(AssetClass::Crypto, "xrp").unwrap();

        assert_eq!(xrp.observations, 2);
        assert!(!xrp.has_prices());
        assert_eq!(xrp.trend.direction, TrendDirection::Unknown);
        assert_eq!(xrp.notes.as_deref(), Some(NO_PRICE_NOTE));
        assert!(report.overview.movers.crypto.is_none());
        assert!(report.report_text.contains("XRP: no price data (2 observations)"));
        assert!(report.report_text.contains(NO_DATA_TEXT));
    }

    #[test]
    fn test_liquidity() {
        let mut snapshots = series("spx", &[5000.0, 5010.0, 5020.0]);
        for (snapshot, volume) in snapshots.iter_mut().zip(["1,000", "1,500", "2,000"]) {
            let point = snapshot.crypto.remove("spx").unwrap();
            snapshot
                .indices
                .insert("spx".to_string(), point.with_raw(json!({ "Volume": volume })));
        }

        let report = analyze(&snapshots);
        let spx = report.asset(AssetClass::Indices, "spx").unwrap();
        assert_eq!(
            spx.liquidity,
            Liquidity::Available {
                average: 1500.0,
                change_percent: Some(100.0)
            }
        );

        let plain = analyze(&series("btc", &[1.0, 2.0]));
        assert!(!plain.asset(AssetClass::Crypto, "btc").unwrap().liquidity.has_volume());
    }

    #[test]
    fn test_top_movers() {
        let snapshots = vec![
            snapshot(0, &[("btc", Some(100.0)), ("eth", Some(10.0))]),
            snapshot(1, &[("btc", Some(101.0)), ("eth", Some(9.0))]),
        ];
        let report = analyze(&snapshots);

        let mover = report.overview.movers.crypto.as_ref().unwrap();
        assert_eq!(mover.symbol, "eth");
        assert_relative_eq!(mover.percent_change.unwrap(), -10.0, epsilon = 1e-9);
        assert_eq!(mover.trend.direction, TrendDirection::Downtrend);
        assert!(report.overview.movers.indices.is_none());
    }

    #[test]
    fn test_classify_trend() {
        assert_eq!(classify_trend(Some(6.0)).confidence, 0.9);
        assert_eq!(classify_trend(Some(-5.0)).confidence, 0.9);
        assert_eq!(classify_trend(Some(2.5)).confidence, 0.7);
        assert_eq!(classify_trend(Some(-1.0)).confidence, 0.5);
        assert_eq!(classify_trend(Some(0.2)).confidence, 0.3);
        assert_eq!(classify_trend(Some(0.0)).direction, TrendDirection::Flat);
        assert_eq!(classify_trend(Some(-0.2)).direction, TrendDirection::Downtrend);
        assert_eq!(classify_trend(None), Trend::unknown());
    }

    #[test]
    fn test_percent_sign_follows_price_move() {
        assert!(safe_percent_change(-5.0, -10.0).unwrap() > 0.0);
        assert!(safe_percent_change(90.0, 100.0).unwrap() < 0.0);
        assert_eq!(safe_percent_change(1.0, 0.0), None);
    }

    #[test]
    fn test_report_text() {
        let report = analyze(&series("btc", &[100.0, 101.5, 99.4, 102.0]));
        let lines: Vec<&str> = report.report_text.lines().collect();

        assert_eq!(lines[0], "Event Impact Report - post-1");
        assert_eq!(
            lines[1],
            "Window: 2025-01-01T12:00:00Z -> 2025-01-01T12:30:00Z (30.0 min, 4 samples)"
        );
        assert_eq!(lines[2], "Crypto:");
        assert_eq!(
            lines[3],
            "  - BTC: +2.00% (High 102.00 @ 2025-01-01T12:30:00Z, \
             Low 99.40 @ 2025-01-01T12:20:00Z, Trend: uptrend)"
        );
        assert_eq!(lines[4], "Indices: no data captured.");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_empty_snapshots() {
        let report = analyze(&[]);

        assert_eq!(report.overview.observation_count, 0);
        assert!(report.overview.window.is_none());
        assert!(report.assets.crypto.is_empty());
        assert_eq!(report.report_text, NO_DATA_TEXT);
    }

    #[test]
    fn test_window_and_metadata() {
        let metadata = Metadata::from([("platform".to_string(), json!("truth_social"))]);
        let report = ImpactAnalysisEngine::default()
            .analyze_event("post-1", &series("btc", &[1.0, 2.0, 3.0]), &metadata, start())
            .unwrap();

        let window = report.overview.window.as_ref().unwrap();
        assert_eq!(window.duration_seconds, 1200.0);
        assert_eq!(report.overview.observation_count, 3);
        assert_eq!(report.metadata, metadata);
        assert_eq!(report.generated_at, start());
    }

    #[test]
    fn test_foreign_snapshot_is_rejected() {
        let mut snapshots = series("btc", &[1.0, 2.0]);
        snapshots[1].event_id = "post-2".to_string();

        let result = ImpactAnalysisEngine::default().analyze_event(
            "post-1",
            &snapshots,
            &Metadata::new(),
            start(),
        );
        assert_eq!(
            result,
            Err(AnalysisError::EventMismatch {
                expected: "post-1".to_string(),
                found: "post-2".to_string()
            })
        );
    }

    #[test]
    fn test_overflowing_prices_fail_analysis() {
        let result = ImpactAnalysisEngine::default().analyze_event(
            "post-1",
            &series("btc", &[-f64::MAX, f64::MAX]),
            &Metadata::new(),
            start(),
        );
        assert!(matches!(result, Err(AnalysisError::NonFinite { .. })));
    }
}
