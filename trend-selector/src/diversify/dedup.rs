//! Stage 3a: adaptive deduplication of near-identical candidates.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::policy::{IndustryCensus, Keep, SelectionPolicy};
use crate::correlation::CorrelationMatrix;
use crate::factors::Candidate;

/// A candidate dropped as a duplicate of a kept one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateRemoval {
    pub symbol: String,
    pub kept: String,
    pub correlation: f64,
    pub threshold: f64,
}

/// Result of the threshold cascade.
#[derive(Debug, Clone)]
pub struct DedupOutcome {
    /// Survivors in rank order
    pub survivors: Vec<Arc<Candidate>>,
    pub removed: Vec<DuplicateRemoval>,
    /// Accepted threshold; `None` for an empty cascade
    pub threshold_used: Option<f64>,
    /// Whether the accepted threshold met the survivor floor
    pub floor_met: bool,
    /// Thresholds evaluated
    pub attempts: usize,
}

pub struct AdaptiveDeduplicator {
    thresholds: Vec<f64>,
    min_ratio: f64,
    policy: SelectionPolicy,
}

impl AdaptiveDeduplicator {
    pub fn new(thresholds: Vec<f64>, min_ratio: f64, policy: SelectionPolicy) -> Self {
        Self {
            thresholds,
            min_ratio,
            policy,
        }
    }

    /// Run the cascade over `pool` (rank order). Each threshold starts from
    /// the full pool; the first meeting the floor is accepted, otherwise the
    /// last one.
    pub fn run(&self, pool: &[Arc<Candidate>], matrix: &CorrelationMatrix) -> DedupOutcome {
        let floor = self.min_ratio * pool.len() as f64;
        let mut last = None;

        for (attempt, &threshold) in self.thresholds.iter().enumerate() {
            let (survivors, removed) = self.pass(pool, matrix, threshold);
            let floor_met = survivors.len() as f64 >= floor;
            debug!(
                threshold,
                survivors = survivors.len(),
                removed = removed.len(),
                floor_met,
                "Dedup threshold evaluated"
            );
            let outcome = DedupOutcome {
                survivors,
                removed,
                threshold_used: Some(threshold),
                floor_met,
                attempts: attempt + 1,
            };
            if floor_met {
                info!(
                    threshold,
                    survivors = outcome.survivors.len(),
                    pool = pool.len(),
                    "Dedup accepted"
                );
                return outcome;
            }
            last = Some(outcome);
        }

        match last {
            Some(outcome) => {
                warn!(
                    threshold = ?outcome.threshold_used,
                    survivors = outcome.survivors.len(),
                    pool = pool.len(),
                    "No dedup threshold met the survivor floor, using the most permissive"
                );
                outcome
            }
            None => DedupOutcome {
                survivors: pool.to_vec(),
                removed: Vec::new(),
                threshold_used: None,
                floor_met: true,
                attempts: 0,
            },
        }
    }

    /// One pass at a fixed threshold.
    pub fn pass(
        &self,
        pool: &[Arc<Candidate>],
        matrix: &CorrelationMatrix,
        threshold: f64,
    ) -> (Vec<Arc<Candidate>>, Vec<DuplicateRemoval>) {
        let indexed: Vec<(usize, Option<usize>)> = pool
            .iter()
            .enumerate()
            .map(|(pos, c)| (pos, matrix.index_of(&c.symbol)))
            .collect();

        let mut census = IndustryCensus::from_candidates(pool);
        let mut removed_at: HashSet<usize> = HashSet::new();
        let mut removed = Vec::new();

        for (a_pos, a_idx) in &indexed {
            let Some(a_idx) = a_idx else { continue };
            for (b_pos, b_idx) in indexed.iter().skip(a_pos + 1) {
                if removed_at.contains(a_pos) {
                    break;
                }
                let Some(b_idx) = b_idx else { continue };
                if removed_at.contains(b_pos) {
                    continue;
                }
                let Some(corr) = matrix.get_by_index(*a_idx, *b_idx) else {
                    continue;
                };
                if corr.abs() <= threshold {
                    continue;
                }

                let (a, b) = (&pool[*a_pos], &pool[*b_pos]);
                let (keep, drop, drop_pos) = match self.policy.tie_break.resolve(a, b, &census) {
                    Keep::First => (a, b, *b_pos),
                    Keep::Second => (b, a, *a_pos),
                };
                debug!(
                    kept = %keep.symbol,
                    removed = %drop.symbol,
                    correlation = corr,
                    threshold,
                    "Duplicate removed"
                );
                census.remove(&drop.industry);
                removed_at.insert(drop_pos);
                removed.push(DuplicateRemoval {
                    symbol: drop.symbol.clone(),
                    kept: keep.symbol.clone(),
                    correlation: corr,
                    threshold,
                });
            }
        }

        let survivors = pool
            .iter()
            .enumerate()
            .filter(|(pos, _)| !removed_at.contains(pos))
            .map(|(_, c)| Arc::clone(c))
            .collect();
        (survivors, removed)
    }
}
