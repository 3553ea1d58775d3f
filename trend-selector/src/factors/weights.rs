//! Hierarchical scoring weights.
//!
//! Effective weight of a metric = group weight × sub-weight.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use trend_common::validation::{check_range, combine};
use trend_common::{Validate, ValidationError, ValidationResult};

use super::types::{FactorGroup, Metric};

/// Tolerance on the group-weight sum.
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

/// Weight of one factor group and its metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupWeights {
    /// Group weight
    pub weight: f64,
    /// Sub-weights of the metrics inside the group
    #[serde(default)]
    pub metrics: BTreeMap<Metric, f64>,
}

impl GroupWeights {
    pub fn new(weight: f64, metrics: impl IntoIterator<Item = (Metric, f64)>) -> Self {
        Self {
            weight,
            metrics: metrics.into_iter().collect(),
        }
    }
}

/// Scoring weights keyed by factor group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoringWeights(BTreeMap<FactorGroup, GroupWeights>);

impl Default for ScoringWeights {
    fn default() -> Self {
        Self::new([
            (
                FactorGroup::Trend,
                GroupWeights::new(
                    0.40,
                    [
                        (Metric::Adx, 0.4),
                        (Metric::TrendR2, 0.4),
                        (Metric::PriceEfficiency, 0.2),
                    ],
                ),
            ),
            (
                FactorGroup::Return,
                GroupWeights::new(
                    0.35,
                    [
                        (Metric::Momentum20d, 0.3),
                        (Metric::Momentum60d, 0.4),
                        (Metric::Momentum120d, 0.3),
                    ],
                ),
            ),
            (
                FactorGroup::Liquidity,
                GroupWeights::new(0.15, [(Metric::Liquidity, 0.7), (Metric::VolumeTrend, 0.3)]),
            ),
            (
                FactorGroup::RiskAdjusted,
                GroupWeights::new(0.10, [(Metric::RiskAdjustedExcess, 1.0)]),
            ),
        ])
    }
}

impl ScoringWeights {
    pub fn new(groups: impl IntoIterator<Item = (FactorGroup, GroupWeights)>) -> Self {
        Self(groups.into_iter().collect())
    }

    /// Weights consisting of a single group at weight 1.0.
    pub fn single(group: FactorGroup, metrics: impl IntoIterator<Item = (Metric, f64)>) -> Self {
        Self::new([(group, GroupWeights::new(1.0, metrics))])
    }

    /// Iterate groups in a fixed order.
    pub fn groups(&self) -> impl Iterator<Item = (FactorGroup, &GroupWeights)> + '_ {
        self.0.iter().map(|(g, w)| (*g, w))
    }

    pub fn group(&self, group: FactorGroup) -> Option<&GroupWeights> {
        self.0.get(&group)
    }

    /// Mutable access to a group, inserting a zero-weight entry if absent.
    pub fn group_mut(&mut self, group: FactorGroup) -> &mut GroupWeights {
        self.0
            .entry(group)
            .or_insert_with(|| GroupWeights {
                weight: 0.0,
                metrics: BTreeMap::new(),
            })
    }

    /// Group weight × sub-weight.
    pub fn effective_weight(&self, metric: Metric) -> f64 {
        self.0
            .get(&metric.group())
            .map(|g| g.weight * g.metrics.get(&metric).copied().unwrap_or(0.0))
            .unwrap_or(0.0)
    }

    /// Metrics with a positive effective weight. Only these get computed.
    pub fn enabled_metrics(&self) -> BTreeSet<Metric> {
        Metric::ALL
            .into_iter()
            .filter(|m| self.effective_weight(*m) > 0.0)
            .collect()
    }

    /// Whether any enabled metric needs the benchmark series.
    pub fn requires_benchmark(&self) -> bool {
        self.enabled_metrics().iter().any(|m| m.requires_benchmark())
    }

    /// Sum of the group weights.
    pub fn total_group_weight(&self) -> f64 {
        self.0.values().map(|g| g.weight).sum()
    }
}

impl Validate for ScoringWeights {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        for (group, weights) in self.groups() {
            let field = format!("weights.{}.weight", group);
            if let Err(e) = check_range(&field, weights.weight, 0.0, 1.0) {
                errors.push(e);
            }

            for (metric, sub) in &weights.metrics {
                let field = format!("weights.{}.metrics.{}", group, metric);
                if metric.group() != group {
                    errors.push(ValidationError::InvalidValue {
                        field,
                        reason: format!("metric belongs to group '{}'", metric.group()),
                    });
                } else if let Err(e) = check_range(&field, *sub, 0.0, 1.0) {
                    errors.push(e);
                }
            }
        }

        let total = self.total_group_weight();
        if !total.is_finite() || (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            errors.push(ValidationError::InvalidValue {
                field: "weights".into(),
                reason: format!(
                    "group weights sum to {:.3}, expected 1.0 ± {}",
                    total, WEIGHT_SUM_TOLERANCE
                ),
            });
        }

        combine(errors)
    }
}
