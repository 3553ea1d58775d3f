//! Snapshot indicator computation.
//!
//! Every metric is computed over the trailing `window` bars of a history.
//! A metric whose required history is missing yields `None`.

use chrono::NaiveDate;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

use crate::config::IndicatorConfig;
use crate::data::{DailyBar, SecurityHistory};
use crate::stats;

use super::types::{Metric, MetricValues};

/// Trading days per year used for annualisation.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Benchmark closes keyed by date.
#[derive(Debug, Clone, Default)]
pub struct BenchmarkSeries {
    closes: BTreeMap<NaiveDate, f64>,
}

impl BenchmarkSeries {
    pub fn from_history(history: &SecurityHistory) -> Self {
        Self {
            closes: history.close_by_date(),
        }
    }

    pub fn close_on(&self, date: NaiveDate) -> Option<f64> {
        self.closes.get(&date).copied()
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }
}

/// Computes the enabled metrics of each candidate.
pub struct IndicatorEngine {
    config: IndicatorConfig,
    enabled: BTreeSet<Metric>,
}

impl IndicatorEngine {
    pub fn new(config: IndicatorConfig, enabled: BTreeSet<Metric>) -> Self {
        Self { config, enabled }
    }

    pub fn enabled(&self) -> &BTreeSet<Metric> {
        &self.enabled
    }

    /// Compute metrics for many histories in parallel.
    ///
    /// Output order matches input order.
    pub fn compute_all(
        &self,
        histories: &[&SecurityHistory],
        benchmark: Option<&BenchmarkSeries>,
    ) -> Vec<MetricValues> {
        histories
            .par_iter()
            .map(|h| self.compute(h, benchmark))
            .collect()
    }

    /// Compute metrics for one history.
    pub fn compute(
        &self,
        history: &SecurityHistory,
        benchmark: Option<&BenchmarkSeries>,
    ) -> MetricValues {
        let bars = history.tail(self.config.window);
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let mut values = MetricValues::new();

        for metric in &self.enabled {
            let value = match metric {
                Metric::Adx => adx(bars, self.config.adx_period),
                Metric::TrendR2 => trend_r2(&closes, self.config.trend_min_bars),
                Metric::PriceEfficiency => efficiency_ratio(&closes, self.config.efficiency_window),
                Metric::Momentum20d | Metric::Momentum60d | Metric::Momentum120d => {
                    metric.lookback_days().and_then(|days| momentum(&closes, days))
                }
                Metric::ExcessReturn20d | Metric::ExcessReturn60d => benchmark.and_then(|b| {
                    metric
                        .lookback_days()
                        .and_then(|days| excess_return(bars, b, days))
                }),
                Metric::RiskAdjustedExcess => benchmark
                    .and_then(|b| information_ratio(bars, b, self.config.risk_adjusted_min_bars)),
                Metric::Liquidity => liquidity_score(bars, self.config.liquidity_window),
                Metric::VolumeTrend => {
                    volume_trend(bars, self.config.volume_short, self.config.volume_long)
                }
            };
            values.set(*metric, value);
        }

        values
    }
}

// ============================================================================
// Indicator Functions
// ============================================================================

/// Latest Wilder ADX value.
///
/// Needs at least `2 * period + 1` bars.
pub fn adx(bars: &[DailyBar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < 2 * period + 1 {
        return None;
    }

    let n = bars.len();
    let mut tr = Vec::with_capacity(n - 1);
    let mut plus_dm = Vec::with_capacity(n - 1);
    let mut minus_dm = Vec::with_capacity(n - 1);

    for i in 1..n {
        let up_move = bars[i].high - bars[i - 1].high;
        let down_move = bars[i - 1].low - bars[i].low;
        plus_dm.push(if up_move > down_move && up_move > 0.0 { up_move } else { 0.0 });
        minus_dm.push(if down_move > up_move && down_move > 0.0 { down_move } else { 0.0 });
        tr.push(bars[i].true_range(bars[i - 1].close));
    }

    let p = period as f64;
    let mut sm_tr: f64 = tr[..period].iter().sum();
    let mut sm_plus: f64 = plus_dm[..period].iter().sum();
    let mut sm_minus: f64 = minus_dm[..period].iter().sum();

    let dx_at = |sm_tr: f64, sm_plus: f64, sm_minus: f64| -> f64 {
        if sm_tr <= f64::EPSILON {
            return 0.0;
        }
        let plus_di = 100.0 * sm_plus / sm_tr;
        let minus_di = 100.0 * sm_minus / sm_tr;
        let sum = plus_di + minus_di;
        if sum <= f64::EPSILON {
            0.0
        } else {
            100.0 * (plus_di - minus_di).abs() / sum
        }
    };

    let mut dx = vec![dx_at(sm_tr, sm_plus, sm_minus)];
    for i in period..tr.len() {
        sm_tr = sm_tr - sm_tr / p + tr[i];
        sm_plus = sm_plus - sm_plus / p + plus_dm[i];
        sm_minus = sm_minus - sm_minus / p + minus_dm[i];
        dx.push(dx_at(sm_tr, sm_plus, sm_minus));
    }

    if dx.len() < period {
        return None;
    }

    let mut value: f64 = dx[..period].iter().sum::<f64>() / p;
    for d in &dx[period..] {
        value = (value * (p - 1.0) + d) / p;
    }
    value.is_finite().then_some(value)
}

/// R² of ln(close) regressed on bar index.
pub fn trend_r2(closes: &[f64], min_bars: usize) -> Option<f64> {
    if closes.len() < min_bars.max(3) || closes.iter().any(|c| *c <= 0.0) {
        return None;
    }
    let y: Vec<f64> = closes.iter().map(|c| c.ln()).collect();
    let x: Vec<f64> = (0..closes.len()).map(|i| i as f64).collect();
    stats::pearson(&x, &y).map(|r| r * r)
}

/// Simple return over the last `days` bars.
pub fn momentum(closes: &[f64], days: usize) -> Option<f64> {
    if days == 0 || closes.len() <= days {
        return None;
    }
    let last = closes[closes.len() - 1];
    let base = closes[closes.len() - 1 - days];
    (base > 0.0).then(|| last / base - 1.0)
}

/// Momentum minus benchmark momentum over the same dates.
pub fn excess_return(bars: &[DailyBar], benchmark: &BenchmarkSeries, days: usize) -> Option<f64> {
    if days == 0 || bars.len() <= days {
        return None;
    }
    let end = &bars[bars.len() - 1];
    let start = &bars[bars.len() - 1 - days];
    if start.close <= 0.0 {
        return None;
    }
    let bench_start = benchmark.close_on(start.date)?;
    let bench_end = benchmark.close_on(end.date)?;
    if bench_start <= 0.0 {
        return None;
    }
    Some((end.close / start.close - 1.0) - (bench_end / bench_start - 1.0))
}

/// Annualised mean / std of daily excess returns on dates shared with the benchmark.
pub fn information_ratio(
    bars: &[DailyBar],
    benchmark: &BenchmarkSeries,
    min_obs: usize,
) -> Option<f64> {
    let excess: Vec<f64> = bars
        .windows(2)
        .filter_map(|w| {
            let b0 = benchmark.close_on(w[0].date)?;
            let b1 = benchmark.close_on(w[1].date)?;
            if w[0].close <= 0.0 || b0 <= 0.0 {
                return None;
            }
            Some((w[1].close / w[0].close - 1.0) - (b1 / b0 - 1.0))
        })
        .collect();

    if excess.len() < min_obs.max(2) {
        return None;
    }
    let mean = stats::mean(&excess)?;
    let sd = stats::std_dev(&excess)?;
    if sd <= f64::EPSILON {
        return None;
    }
    Some(mean / sd * TRADING_DAYS_PER_YEAR.sqrt())
}

/// ln(1 + mean turnover) over the last `window` bars.
pub fn liquidity_score(bars: &[DailyBar], window: usize) -> Option<f64> {
    if window == 0 || bars.len() < window {
        return None;
    }
    let amounts: Vec<f64> = bars[bars.len() - window..].iter().map(|b| b.amount.max(0.0)).collect();
    stats::mean(&amounts).map(f64::ln_1p)
}

/// Kaufman efficiency ratio: net move / path length over `window` bars.
pub fn efficiency_ratio(closes: &[f64], window: usize) -> Option<f64> {
    if window == 0 || closes.len() <= window {
        return None;
    }
    let slice = &closes[closes.len() - 1 - window..];
    let net = (slice[slice.len() - 1] - slice[0]).abs();
    let path: f64 = slice.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
    (path > f64::EPSILON).then(|| net / path)
}

/// Mean volume of the last `short` bars over that of the last `long` bars.
pub fn volume_trend(bars: &[DailyBar], short: usize, long: usize) -> Option<f64> {
    if short == 0 || long < short || bars.len() < long {
        return None;
    }
    let volumes: Vec<f64> = bars[bars.len() - long..].iter().map(|b| b.volume).collect();
    let long_mean = stats::mean(&volumes)?;
    let short_mean = stats::mean(&volumes[volumes.len() - short..])?;
    (long_mean > f64::EPSILON).then(|| short_mean / long_mean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, 2).unwrap()
    }

    fn bars_from(closes: &[f64]) -> Vec<DailyBar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| DailyBar {
                date: start() + Duration::days(i as i64),
                open: *c,
                high: c * 1.01,
                low: c * 0.99,
                close: *c,
                volume: 1_000.0 + i as f64,
                amount: 1_000_000.0,
            })
            .collect()
    }

    fn trending(n: usize, step: f64) -> Vec<f64> {
        (0..n).map(|i| 100.0 * (1.0 + step).powi(i as i32)).collect()
    }

    #[test]
    fn test_adx_requires_history() {
        let bars = bars_from(&trending(28, 0.01));
        assert_eq!(adx(&bars, 14), None);
        let bars = bars_from(&trending(29, 0.01));
        assert!(adx(&bars, 14).is_some());
    }

    #[test]
    fn test_adx_strong_trend_beats_chop() {
        let trend = bars_from(&trending(80, 0.01));
        let chop: Vec<f64> = (0..80).map(|i| if i % 2 == 0 { 100.0 } else { 101.0 }).collect();
        let chop = bars_from(&chop);
        let a_trend = adx(&trend, 14).unwrap();
        let a_chop = adx(&chop, 14).unwrap();
        assert!(a_trend > a_chop, "trend {} chop {}", a_trend, a_chop);
        assert!((0.0..=100.0).contains(&a_trend));
    }

    #[test]
    fn test_trend_r2_exponential_is_perfect() {
        let r2 = trend_r2(&trending(100, 0.005), 60).unwrap();
        assert!((r2 - 1.0).abs() < 1e-9);
        assert_eq!(trend_r2(&trending(30, 0.005), 60), None);
        assert_eq!(trend_r2(&[1.0; 80], 60), None);
    }

    #[test]
    fn test_momentum() {
        let closes = [100.0, 105.0, 110.0];
        assert!((momentum(&closes, 2).unwrap() - 0.1).abs() < 1e-12);
        assert_eq!(momentum(&closes, 3), None);
    }

    #[test]
    fn test_excess_return_against_benchmark() {
        let bars = bars_from(&[100.0, 110.0, 120.0]);
        let bench = SecurityHistory::new("IDX", "IDX", bars_from(&[50.0, 51.0, 55.0]));
        let series = BenchmarkSeries::from_history(&bench);
        let excess = excess_return(&bars, &series, 2).unwrap();
        assert!((excess - (0.2 - 0.1)).abs() < 1e-12);

        let empty = BenchmarkSeries::default();
        assert_eq!(excess_return(&bars, &empty, 2), None);
    }

    #[test]
    fn test_information_ratio_sign() {
        let sec: Vec<f64> = (0..80)
            .map(|i| 100.0 + i as f64 + if i % 3 == 0 { 0.5 } else { 0.0 })
            .collect();
        let bench: Vec<f64> = (0..80).map(|i| 100.0 + 0.2 * i as f64).collect();
        let bars = bars_from(&sec);
        let bench =
            BenchmarkSeries::from_history(&SecurityHistory::new("IDX", "IDX", bars_from(&bench)));
        assert!(information_ratio(&bars, &bench, 60).unwrap() > 0.0);
        assert_eq!(information_ratio(&bars[..30], &bench, 60), None);
    }

    #[test]
    fn test_efficiency_ratio() {
        assert!((efficiency_ratio(&[1.0, 2.0, 3.0, 4.0], 3).unwrap() - 1.0).abs() < 1e-12);
        let zigzag = [1.0, 2.0, 1.0, 2.0, 1.0];
        assert!(efficiency_ratio(&zigzag, 4).unwrap().abs() < 1e-12);
        assert_eq!(efficiency_ratio(&[1.0, 1.0, 1.0], 2), None);
    }

    #[test]
    fn test_volume_trend_and_liquidity() {
        let bars = bars_from(&trending(60, 0.0));
        let ratio = volume_trend(&bars, 20, 60).unwrap();
        assert!(ratio > 1.0);
        assert_eq!(volume_trend(&bars[..59], 20, 60), None);

        let liq = liquidity_score(&bars, 20).unwrap();
        assert!((liq - 1_000_000.0f64.ln_1p()).abs() < 1e-9);
    }

    #[test]
    fn test_engine_computes_only_enabled_metrics() {
        let history = SecurityHistory::new("A", "A", bars_from(&trending(150, 0.003)));
        let enabled: BTreeSet<Metric> = [Metric::Adx, Metric::Momentum20d].into_iter().collect();
        let engine = IndicatorEngine::new(IndicatorConfig::default(), enabled);
        let values = engine.compute(&history, None);
        assert!(values.get(Metric::Adx).is_some());
        assert!(values.get(Metric::Momentum20d).is_some());
        assert_eq!(values.get(Metric::TrendR2), None);
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_engine_without_benchmark_leaves_excess_missing() {
        let history = SecurityHistory::new("A", "A", bars_from(&trending(150, 0.003)));
        let engine = IndicatorEngine::new(
            IndicatorConfig::default(),
            [Metric::ExcessReturn20d, Metric::RiskAdjustedExcess].into_iter().collect(),
        );
        assert!(engine.compute(&history, None).is_empty());
    }

    #[test]
    fn test_compute_all_preserves_order() {
        let a = SecurityHistory::new("A", "A", bars_from(&trending(130, 0.01)));
        let b = SecurityHistory::new("B", "B", bars_from(&trending(130, -0.002)));
        let engine = IndicatorEngine::new(
            IndicatorConfig::default(),
            [Metric::Momentum60d].into_iter().collect(),
        );
        let values = engine.compute_all(&[&a, &b], None);
        assert!(values[0].get(Metric::Momentum60d).unwrap() > 0.0);
        assert!(values[1].get(Metric::Momentum60d).unwrap() < 0.0);
    }
}
