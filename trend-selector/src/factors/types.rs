//! Metric identifiers, factor groups and the scored candidate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Factor Group
// ============================================================================

/// Named group of related metrics sharing one group weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorGroup {
    /// Trend strength and quality
    Trend,
    /// Absolute and benchmark-relative returns
    Return,
    /// Trading activity
    Liquidity,
    /// Return per unit of tracking risk
    RiskAdjusted,
}

impl FactorGroup {
    pub const ALL: [FactorGroup; 4] = [
        FactorGroup::Trend,
        FactorGroup::Return,
        FactorGroup::Liquidity,
        FactorGroup::RiskAdjusted,
    ];

    /// Metrics belonging to this group.
    pub fn metrics(&self) -> impl Iterator<Item = Metric> + '_ {
        Metric::ALL.into_iter().filter(move |m| m.group() == *self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trend => "trend",
            Self::Return => "return",
            Self::Liquidity => "liquidity",
            Self::RiskAdjusted => "risk_adjusted",
        }
    }
}

impl fmt::Display for FactorGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Metric
// ============================================================================

/// A scalar factor computed per candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Metric {
    /// Wilder ADX
    #[serde(rename = "adx")]
    Adx,
    /// R² of ln(close) against time
    #[serde(rename = "trend_r2")]
    TrendR2,
    /// Kaufman efficiency ratio
    #[serde(rename = "price_efficiency")]
    PriceEfficiency,
    #[serde(rename = "momentum_20d")]
    Momentum20d,
    #[serde(rename = "momentum_60d")]
    Momentum60d,
    #[serde(rename = "momentum_120d")]
    Momentum120d,
    #[serde(rename = "excess_return_20d")]
    ExcessReturn20d,
    #[serde(rename = "excess_return_60d")]
    ExcessReturn60d,
    /// Annualised information ratio against the benchmark
    #[serde(rename = "risk_adjusted_excess")]
    RiskAdjustedExcess,
    /// ln(1 + mean daily turnover)
    #[serde(rename = "liquidity")]
    Liquidity,
    /// Short / long average volume
    #[serde(rename = "volume_trend")]
    VolumeTrend,
}

impl Metric {
    pub const ALL: [Metric; 11] = [
        Metric::Adx,
        Metric::TrendR2,
        Metric::PriceEfficiency,
        Metric::Momentum20d,
        Metric::Momentum60d,
        Metric::Momentum120d,
        Metric::ExcessReturn20d,
        Metric::ExcessReturn60d,
        Metric::RiskAdjustedExcess,
        Metric::Liquidity,
        Metric::VolumeTrend,
    ];

    /// The group this metric is weighted under.
    pub fn group(&self) -> FactorGroup {
        match self {
            Self::Adx | Self::TrendR2 | Self::PriceEfficiency => FactorGroup::Trend,
            Self::Momentum20d
            | Self::Momentum60d
            | Self::Momentum120d
            | Self::ExcessReturn20d
            | Self::ExcessReturn60d => FactorGroup::Return,
            Self::Liquidity | Self::VolumeTrend => FactorGroup::Liquidity,
            Self::RiskAdjustedExcess => FactorGroup::RiskAdjusted,
        }
    }

    /// Whether computing this metric needs a benchmark series.
    pub fn requires_benchmark(&self) -> bool {
        matches!(
            self,
            Self::ExcessReturn20d | Self::ExcessReturn60d | Self::RiskAdjustedExcess
        )
    }

    /// Lookback in bars for the period-based return metrics.
    pub fn lookback_days(&self) -> Option<usize> {
        match self {
            Self::Momentum20d | Self::ExcessReturn20d => Some(20),
            Self::Momentum60d | Self::ExcessReturn60d => Some(60),
            Self::Momentum120d => Some(120),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Adx => "adx",
            Self::TrendR2 => "trend_r2",
            Self::PriceEfficiency => "price_efficiency",
            Self::Momentum20d => "momentum_20d",
            Self::Momentum60d => "momentum_60d",
            Self::Momentum120d => "momentum_120d",
            Self::ExcessReturn20d => "excess_return_20d",
            Self::ExcessReturn60d => "excess_return_60d",
            Self::RiskAdjustedExcess => "risk_adjusted_excess",
            Self::Liquidity => "liquidity",
            Self::VolumeTrend => "volume_trend",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Metric Values
// ============================================================================

/// Raw metric values of one candidate. Only present, finite values are stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricValues(BTreeMap<Metric, f64>);

impl MetricValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a value; `None` and non-finite values are dropped.
    pub fn set(&mut self, metric: Metric, value: Option<f64>) {
        match value.filter(|v| v.is_finite()) {
            Some(v) => {
                self.0.insert(metric, v);
            }
            None => {
                self.0.remove(&metric);
            }
        }
    }

    pub fn get(&self, metric: Metric) -> Option<f64> {
        self.0.get(&metric).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, f64)> + '_ {
        self.0.iter().map(|(m, v)| (*m, *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(Metric, f64)> for MetricValues {
    fn from_iter<I: IntoIterator<Item = (Metric, f64)>>(iter: I) -> Self {
        let mut values = Self::new();
        for (metric, value) in iter {
            values.set(metric, Some(value));
        }
        values
    }
}

// ============================================================================
// Candidate
// ============================================================================

/// A scored security.
///
/// Built once by the scorer and shared read-only (`Arc<Candidate>`) by every
/// later stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Symbol (unique key)
    pub symbol: String,
    /// Display name
    pub display_name: String,
    /// Industry label; absent labels are already mapped to the catch-all
    pub industry: String,
    /// 1-based rank by `final_score`
    pub rank: usize,
    /// Composite score in [0, 1]
    pub final_score: f64,
    /// Optional backtest quality metric
    pub return_dd_ratio: Option<f64>,
    /// Raw metric values
    pub metrics: MetricValues,
    /// Percentile-normalized values in (0, 1] for present metrics
    pub normalized: BTreeMap<Metric, f64>,
}
