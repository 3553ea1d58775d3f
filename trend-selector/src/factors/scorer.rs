//! Cross-sectional factor scoring.
//!
//! Each metric is replaced by its percentile rank inside the pool, then the
//! ranks are combined through the hierarchical weights into `final_score`.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use super::types::{Candidate, Metric, MetricValues};
use super::weights::ScoringWeights;

/// Identity and raw metrics of a Stage-1 survivor, before scoring.
#[derive(Debug, Clone)]
pub struct ScoringInput {
    pub symbol: String,
    pub display_name: String,
    pub industry: String,
    pub return_dd_ratio: Option<f64>,
    pub metrics: MetricValues,
}

/// Percentile-normalizes metrics and ranks candidates.
pub struct FactorScorer {
    weights: ScoringWeights,
}

impl FactorScorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Score the whole pool and return it sorted by `final_score` descending.
    ///
    /// Ties keep input order. Nothing is truncated.
    pub fn score(&self, inputs: Vec<ScoringInput>) -> Vec<Arc<Candidate>> {
        let enabled = self.weights.enabled_metrics();

        let mut normalized: Vec<BTreeMap<Metric, f64>> = vec![BTreeMap::new(); inputs.len()];
        for metric in &enabled {
            let values: Vec<Option<f64>> = inputs.iter().map(|i| i.metrics.get(*metric)).collect();
            for (slot, pct) in normalized.iter_mut().zip(percentile_ranks(&values)) {
                if let Some(p) = pct {
                    slot.insert(*metric, p);
                }
            }
        }

        let scores: Vec<f64> = normalized.iter().map(|n| self.composite(n)).collect();

        let mut order: Vec<usize> = (0..inputs.len()).collect();
        order.sort_by(|a, b| scores[*b].total_cmp(&scores[*a]));

        let mut slots: Vec<Option<(ScoringInput, BTreeMap<Metric, f64>)>> =
            inputs.into_iter().zip(normalized).map(Some).collect();

        let mut ranked = Vec::with_capacity(order.len());
        for (position, idx) in order.into_iter().enumerate() {
            let Some((input, normalized)) = slots[idx].take() else {
                continue;
            };
            debug!(
                symbol = %input.symbol,
                rank = position + 1,
                final_score = scores[idx],
                "Scored candidate"
            );
            ranked.push(Arc::new(Candidate {
                symbol: input.symbol,
                display_name: input.display_name,
                industry: input.industry,
                rank: position + 1,
                final_score: scores[idx],
                return_dd_ratio: input.return_dd_ratio.filter(|v| v.is_finite()),
                metrics: input.metrics,
                normalized,
            }));
        }
        ranked
    }

    /// Σ_group (group_weight × Σ_metric (sub_weight × normalized)); missing metrics add 0.
    fn composite(&self, normalized: &BTreeMap<Metric, f64>) -> f64 {
        self.weights
            .groups()
            .filter(|(_, g)| g.weight > 0.0)
            .map(|(_, g)| {
                let inner: f64 = g
                    .metrics
                    .iter()
                    .map(|(m, sub)| sub * normalized.get(m).copied().unwrap_or(0.0))
                    .sum();
                g.weight * inner
            })
            .sum::<f64>()
            .clamp(0.0, 1.0)
    }
}

/// Fraction of present values less than or equal to each present value.
///
/// Missing inputs map to `None`; present ones land in `(0, 1]`.
pub fn percentile_ranks(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return vec![None; values.len()];
    }
    present.sort_by(|a, b| a.total_cmp(b));
    let n = present.len() as f64;

    values
        .iter()
        .map(|v| {
            v.map(|x| {
                let at_or_below = present.partition_point(|p| p.total_cmp(&x).is_le());
                at_or_below as f64 / n
            })
        })
        .collect()
}
