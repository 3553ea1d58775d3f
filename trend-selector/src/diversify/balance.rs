//! Stage 3c: soft per-industry cap on the final selection.
//!
//! Over-represented industries give up their lowest-ranked member in favour
//! of the best unselected candidate from an under-represented industry that
//! still passes the correlation criterion. Portfolio size never changes.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use super::greedy::evaluable_pairs;
use super::policy::{IndustryCensus, SelectionPolicy};
use crate::correlation::CorrelationMatrix;
use crate::factors::Candidate;

/// One replacement made by the balancer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndustrySwap {
    pub removed: String,
    pub removed_industry: String,
    pub added: String,
    pub added_industry: String,
}

#[derive(Debug, Clone)]
pub struct BalanceOutcome {
    /// Final selection in rank order
    pub selected: Vec<Arc<Candidate>>,
    pub swaps: Vec<IndustrySwap>,
    pub cap: usize,
}

pub struct IndustryBalancer {
    target_size: usize,
    max_correlation: f64,
    policy: SelectionPolicy,
}

impl IndustryBalancer {
    pub fn new(target_size: usize, max_correlation: f64, policy: SelectionPolicy) -> Self {
        Self {
            target_size,
            max_correlation,
            policy,
        }
    }

    /// `ceil(target_size / represented) + 1`
    pub fn soft_cap(&self, represented: usize) -> usize {
        if represented == 0 {
            return self.target_size;
        }
        self.target_size.div_ceil(represented) + 1
    }

    /// Rebalance `selected` using replacements from `pool` (the deduplicated
    /// candidates, rank order).
    pub fn run(
        &self,
        selected: Vec<Arc<Candidate>>,
        pool: &[Arc<Candidate>],
        matrix: &CorrelationMatrix,
    ) -> BalanceOutcome {
        let mut census = IndustryCensus::from_candidates(&selected);
        let cap = self.soft_cap(census.represented());
        let mut selected = selected;
        let mut swaps = Vec::new();

        for _ in 0..self.target_size {
            let Some(industry) = over_cap(&census, cap) else {
                break;
            };

            let Some(out_pos) = selected
                .iter()
                .enumerate()
                .filter(|(_, c)| c.industry == industry)
                .max_by_key(|(_, c)| c.rank)
                .map(|(pos, _)| pos)
            else {
                break;
            };

            let remaining: Vec<Arc<Candidate>> = selected
                .iter()
                .enumerate()
                .filter(|(pos, _)| *pos != out_pos)
                .map(|(_, c)| Arc::clone(c))
                .collect();
            let chosen: HashSet<&str> = selected.iter().map(|c| c.symbol.as_str()).collect();

            let replacement = pool.iter().find(|c| {
                !chosen.contains(c.symbol.as_str())
                    && matrix.contains(&c.symbol)
                    && c.industry != industry
                    && census.count(&c.industry) < cap
                    && {
                        let corrs: Vec<f64> = evaluable_pairs(matrix, c, &remaining)
                            .into_iter()
                            .map(|(_, v)| v)
                            .collect();
                        (remaining.is_empty() || !corrs.is_empty())
                            && self.policy.criterion.admits(&corrs, self.max_correlation)
                    }
            });

            let Some(replacement) = replacement.cloned() else {
                debug!(industry = %industry, cap, "No eligible replacement, stopping");
                break;
            };

            let outgoing = Arc::clone(&selected[out_pos]);
            debug!(
                removed = %outgoing.symbol,
                added = %replacement.symbol,
                industry = %industry,
                "Industry swap"
            );
            census.remove(&outgoing.industry);
            census.add(&replacement.industry);
            swaps.push(IndustrySwap {
                removed: outgoing.symbol.clone(),
                removed_industry: outgoing.industry.clone(),
                added: replacement.symbol.clone(),
                added_industry: replacement.industry.clone(),
            });
            selected[out_pos] = replacement;
        }

        selected.sort_by_key(|c| c.rank);
        info!(cap, swaps = swaps.len(), "Industry balance complete");

        BalanceOutcome {
            selected,
            swaps,
            cap,
        }
    }
}

/// Largest industry above `cap`; ties go to the smaller name.
fn over_cap(census: &IndustryCensus, cap: usize) -> Option<String> {
    census
        .iter()
        .filter(|(_, n)| *n > cap)
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(industry, _)| industry.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diversify::policy::tests::candidate;

    fn ranked(specs: &[(&str, &str)]) -> Vec<Arc<Candidate>> {
        specs
            .iter()
            .enumerate()
            .map(|(i, (s, ind))| Arc::new(candidate(s, ind, i + 1, 1.0 - i as f64 * 0.01, None)))
            .collect()
    }

    fn symbols(c: &[Arc<Candidate>]) -> Vec<&str> {
        c.iter().map(|c| c.symbol.as_str()).collect()
    }

    fn uncorrelated(names: &[&str]) -> CorrelationMatrix {
        let mut entries = Vec::new();
        for (i, a) in names.iter().enumerate() {
            for b in &names[i + 1..] {
                entries.push((*a, *b, 0.1));
            }
        }
        CorrelationMatrix::from_entries(names, entries)
    }

    #[test]
    fn test_soft_cap() {
        let balancer = IndustryBalancer::new(20, 0.7, SelectionPolicy::v1());
        assert_eq!(balancer.soft_cap(3), 8);
        assert_eq!(balancer.soft_cap(4), 6);
        assert_eq!(balancer.soft_cap(0), 20);
    }

    #[test]
    fn test_no_swap_within_cap() {
        let pool = ranked(&[
            ("T1", "tech"),
            ("T2", "tech"),
            ("T3", "tech"),
            ("T4", "tech"),
            ("M1", "med"),
            ("M2", "med"),
        ]);
        let names: Vec<&str> = pool.iter().map(|c| c.symbol.as_str()).collect();
        let matrix = uncorrelated(&names);
        let balancer = IndustryBalancer::new(5, 0.7, SelectionPolicy::v2(0.05));

        // tech 4, med 1: cap = ceil(5 / 2) + 1 = 4
        let selected: Vec<_> = pool.iter().take(5).cloned().collect();
        let outcome = balancer.run(selected, &pool, &matrix);
        assert_eq!(outcome.cap, 4);
        assert!(outcome.swaps.is_empty());

        // single industry: cap = 5 + 1
        let all_tech: Vec<_> = pool.iter().take(4).cloned().collect();
        assert!(balancer.run(all_tech, &pool, &matrix).swaps.is_empty());
    }

    #[test]
    fn test_swap_replaces_and_resorts() {
        let pool = ranked(&[
            ("T1", "tech"),
            ("T2", "tech"),
            ("T3", "tech"),
            ("T4", "tech"),
            ("M1", "med"),
            ("E1", "energy"),
            ("F1", "finance"),
            ("M2", "med"),
        ]);
        // Selection: 4 tech + med + energy + finance, target 7 → cap ceil(7/4)+1 = 3.
        let selected: Vec<_> = pool.iter().take(7).cloned().collect();
        let names: Vec<&str> = pool.iter().map(|c| c.symbol.as_str()).collect();
        let matrix = uncorrelated(&names);

        let balancer = IndustryBalancer::new(7, 0.7, SelectionPolicy::v2(0.05));
        let outcome = balancer.run(selected, &pool, &matrix);

        assert_eq!(outcome.cap, 3);
        assert_eq!(outcome.swaps.len(), 1);
        assert_eq!(outcome.swaps[0].removed, "T4");
        assert_eq!(outcome.swaps[0].added, "M2");
        assert_eq!(symbols(&outcome.selected), vec!["T1", "T2", "T3", "M1", "E1", "F1", "M2"]);
    }

    #[test]
    fn test_correlated_replacement_is_skipped() {
        let pool = ranked(&[
            ("T1", "tech"),
            ("T2", "tech"),
            ("T3", "tech"),
            ("T4", "tech"),
            ("M1", "med"),
            ("E1", "energy"),
            ("F1", "finance"),
            ("M2", "med"),
        ]);
        let selected: Vec<_> = pool.iter().take(7).cloned().collect();
        let names: Vec<&str> = pool.iter().map(|c| c.symbol.as_str()).collect();
        let matrix = CorrelationMatrix::from_entries(&names, [("M2", "M1", 0.95)]);

        let balancer = IndustryBalancer::new(7, 0.7, SelectionPolicy::v2(0.05));
        let outcome = balancer.run(selected.clone(), &pool, &matrix);
        assert!(outcome.swaps.is_empty());
        assert_eq!(symbols(&outcome.selected), symbols(&selected));
    }

    #[test]
    fn test_replacement_without_known_pairs_is_skipped() {
        let pool = ranked(&[
            ("T1", "tech"),
            ("T2", "tech"),
            ("T3", "tech"),
            ("T4", "tech"),
            ("M1", "med"),
            ("E1", "energy"),
            ("F1", "finance"),
            ("M2", "med"),
        ]);
        let selected: Vec<_> = pool.iter().take(7).cloned().collect();
        let names: Vec<&str> = pool.iter().map(|c| c.symbol.as_str()).collect();
        // Known pairs among the selection only; M2 is a member with no known pair.
        let mut entries = Vec::new();
        for (i, a) in names[..7].iter().enumerate() {
            for b in &names[i + 1..7] {
                entries.push((*a, *b, 0.1));
            }
        }
        let matrix = CorrelationMatrix::from_entries(&names, entries);
        assert!(matrix.contains("M2"));

        let balancer = IndustryBalancer::new(7, 0.7, SelectionPolicy::v2(0.05));
        let outcome = balancer.run(selected.clone(), &pool, &matrix);
        assert!(outcome.swaps.is_empty());
        assert_eq!(symbols(&outcome.selected), symbols(&selected));
    }
}
