//! Stage 3b: greedy correlation-constrained portfolio construction.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::policy::SelectionPolicy;
use crate::correlation::CorrelationMatrix;
use crate::factors::Candidate;

/// Why the greedy pass left a candidate out.
#[derive(Debug, Clone, PartialEq)]
pub enum GreedyRejection {
    NotInMatrix,
    /// In the matrix, but no pair against the selection is known
    MissingPairData,
    CorrelationLimit { value: f64, closest: Option<String> },
    TargetSizeReached,
}

#[derive(Debug, Clone)]
pub struct GreedyOutcome {
    /// Selected in acceptance order (which is rank order)
    pub selected: Vec<Arc<Candidate>>,
    /// Every other candidate with its reason, in rank order
    pub rejected: Vec<(Arc<Candidate>, GreedyRejection)>,
    /// True when no candidate was in the matrix and the top-N fallback ran
    pub fallback_used: bool,
}

pub struct GreedyDiversifier {
    target_size: usize,
    max_correlation: f64,
    policy: SelectionPolicy,
}

impl GreedyDiversifier {
    pub fn new(target_size: usize, max_correlation: f64, policy: SelectionPolicy) -> Self {
        Self {
            target_size,
            max_correlation,
            policy,
        }
    }

    pub fn run(&self, candidates: &[Arc<Candidate>], matrix: &CorrelationMatrix) -> GreedyOutcome {
        if !candidates.iter().any(|c| matrix.contains(&c.symbol)) {
            warn!(
                candidates = candidates.len(),
                target_size = self.target_size,
                "No candidate in the correlation matrix, falling back to top-ranked"
            );
            let split = candidates.len().min(self.target_size);
            return GreedyOutcome {
                selected: candidates[..split].to_vec(),
                rejected: candidates[split..]
                    .iter()
                    .map(|c| (Arc::clone(c), GreedyRejection::TargetSizeReached))
                    .collect(),
                fallback_used: true,
            };
        }

        let mut selected: Vec<Arc<Candidate>> = Vec::new();
        let mut rejected = Vec::new();

        for candidate in candidates {
            if !matrix.contains(&candidate.symbol) {
                rejected.push((Arc::clone(candidate), GreedyRejection::NotInMatrix));
                continue;
            }
            if selected.len() >= self.target_size {
                rejected.push((Arc::clone(candidate), GreedyRejection::TargetSizeReached));
                continue;
            }

            let pairs = evaluable_pairs(matrix, candidate, &selected);
            if pairs.is_empty() && !selected.is_empty() {
                debug!(
                    symbol = %candidate.symbol,
                    selected = selected.len(),
                    "Rejected, no known correlation against the selection"
                );
                rejected.push((Arc::clone(candidate), GreedyRejection::MissingPairData));
                continue;
            }
            let corrs: Vec<f64> = pairs.iter().map(|(_, c)| *c).collect();
            if self.policy.criterion.admits(&corrs, self.max_correlation) {
                debug!(symbol = %candidate.symbol, rank = candidate.rank, "Selected");
                selected.push(Arc::clone(candidate));
            } else {
                let value = self.policy.criterion.aggregate(&corrs).unwrap_or(0.0);
                let closest = pairs
                    .iter()
                    .max_by(|a, b| a.1.total_cmp(&b.1))
                    .map(|(s, _)| s.to_string());
                debug!(
                    symbol = %candidate.symbol,
                    value,
                    closest = ?closest,
                    "Rejected by correlation limit"
                );
                rejected.push((
                    Arc::clone(candidate),
                    GreedyRejection::CorrelationLimit { value, closest },
                ));
            }
        }

        info!(
            selected = selected.len(),
            target_size = self.target_size,
            criterion = self.policy.criterion.name(),
            "Greedy diversification complete"
        );

        GreedyOutcome {
            selected,
            rejected,
            fallback_used: false,
        }
    }
}

/// Present |corr| of `candidate` against each member of `selection`.
pub fn evaluable_pairs<'a>(
    matrix: &CorrelationMatrix,
    candidate: &Candidate,
    selection: &'a [Arc<Candidate>],
) -> Vec<(&'a str, f64)> {
    selection
        .iter()
        .filter(|s| s.symbol != candidate.symbol)
        .filter_map(|s| {
            matrix
                .get(&candidate.symbol, &s.symbol)
                .map(|c| (s.symbol.as_str(), c.abs()))
        })
        .collect()
}
