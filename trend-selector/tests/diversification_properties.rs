//! Property tests for Stage 3.
//!
//! Random pools and matrices check the size, uniqueness and ordering of the
//! selection, the V2 pairwise bound and the dedup cascade.

mod common;

use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use trend_selector::diversify::{AdaptiveDeduplicator, SelectionPolicy};
use trend_selector::factors::{
    Candidate, FactorGroup, FactorScorer, GroupWeights, Metric, ScoringInput, ScoringWeights,
};
use trend_selector::{CorrelationMatrix, SelectionPipeline, SelectorConfig};

const INDUSTRIES: [&str; 4] = ["宽基", "科技", "医药", "消费"];

fn pipeline(
    target_size: usize,
    max_correlation: f64,
    v2: bool,
    balance: bool,
) -> SelectionPipeline {
    let mut config = SelectorConfig::default();
    config.benchmark = None;
    config.weights = ScoringWeights::single(FactorGroup::Trend, [(Metric::Adx, 1.0)]);
    config.diversification.target_size = target_size;
    config.diversification.max_correlation = max_correlation;
    config.diversification.diversify_v2 = v2;
    config.diversification.balance_industries = balance;
    SelectionPipeline::new(config).unwrap()
}

fn pool(n: usize, industries: &[usize]) -> Vec<Arc<Candidate>> {
    (0..n)
        .map(|i| {
            let industry = INDUSTRIES[industries[i % industries.len()] % INDUSTRIES.len()];
            Arc::new(common::candidate(
                &format!("S{:02}", i),
                industry,
                i + 1,
                1.0 - i as f64 * 0.02,
                None,
            ))
        })
        .collect()
}

fn matrix(pool: &[Arc<Candidate>], members: &[bool], corrs: &[Option<f64>]) -> CorrelationMatrix {
    let symbols: Vec<&str> = pool
        .iter()
        .zip(members.iter().cycle())
        .filter(|(_, m)| **m)
        .map(|(c, _)| c.symbol.as_str())
        .collect();
    let mut entries = Vec::new();
    let mut k = 0;
    for i in 0..symbols.len() {
        for j in (i + 1)..symbols.len() {
            if let Some(c) = corrs[k % corrs.len()] {
                entries.push((symbols[i], symbols[j], c));
            }
            k += 1;
        }
    }
    CorrelationMatrix::from_entries(&symbols, entries)
}

proptest! {
    #[test]
    fn prop_selection_bounded_and_unique(
        n in 1usize..30,
        target in 1usize..12,
        max_corr in 0.05f64..1.0,
        v2 in any::<bool>(),
        balance in any::<bool>(),
        industries in prop::collection::vec(0usize..4, 1..8),
        members in prop::collection::vec(any::<bool>(), 1..8),
        corrs in prop::collection::vec(prop::option::of(-1.0f64..1.0), 1..40),
    ) {
        let pool = pool(n, &industries);
        let matrix = matrix(&pool, &members, &corrs);
        let outcome = pipeline(target, max_corr, v2, balance).diversify(&pool, &matrix);

        prop_assert!(outcome.selected.len() <= target);
        prop_assert!(!outcome.selected.is_empty());
        let unique: HashSet<&str> = outcome.selected.iter().map(|c| c.symbol.as_str()).collect();
        prop_assert_eq!(unique.len(), outcome.selected.len());

        let ranks: Vec<usize> = outcome.selected.iter().map(|c| c.rank).collect();
        let mut sorted = ranks.clone();
        sorted.sort_unstable();
        prop_assert_eq!(ranks, sorted);
    }

    #[test]
    fn prop_v2_pairwise_post_condition(
        n in 2usize..30,
        target in 1usize..12,
        max_corr in 0.05f64..1.0,
        balance in any::<bool>(),
        industries in prop::collection::vec(0usize..4, 1..8),
        corrs in prop::collection::vec(prop::option::of(-1.0f64..1.0), 1..40),
    ) {
        let pool = pool(n, &industries);
        let matrix = matrix(&pool, &[true], &corrs);
        let outcome = pipeline(target, max_corr, true, balance).diversify(&pool, &matrix);

        for (i, a) in outcome.selected.iter().enumerate() {
            for b in outcome.selected.iter().skip(i + 1) {
                if let Some(c) = matrix.get(&a.symbol, &b.symbol) {
                    prop_assert!(c.abs() < max_corr, "{}-{} = {}", a.symbol, b.symbol, c);
                }
            }
        }

        // Every greedy pick after the first was evaluated against an earlier one.
        if !outcome.greedy.fallback_used {
            let greedy = &outcome.greedy.selected;
            for (i, c) in greedy.iter().enumerate().skip(1) {
                prop_assert!(
                    greedy[..i].iter().any(|p| matrix.get(&c.symbol, &p.symbol).is_some()),
                    "{} admitted without a known pair",
                    c.symbol
                );
            }
        }
    }

    #[test]
    fn prop_dedup_accepts_a_configured_threshold(
        n in 1usize..20,
        thresholds in prop::collection::vec(0.5f64..1.0, 0..5),
        min_ratio in 0.05f64..1.0,
        corrs in prop::collection::vec(prop::option::of(-1.0f64..1.0), 1..40),
    ) {
        let mut thresholds = thresholds;
        thresholds.sort_by(|a, b| b.total_cmp(a));
        let pool = pool(n, &[0, 1]);
        let matrix = matrix(&pool, &[true], &corrs);
        let dedup =
            AdaptiveDeduplicator::new(thresholds.clone(), min_ratio, SelectionPolicy::v2(0.05));
        let outcome = dedup.run(&pool, &matrix);

        prop_assert!(outcome.attempts <= thresholds.len());
        prop_assert!(!outcome.survivors.is_empty());
        match outcome.threshold_used {
            Some(t) => prop_assert!(thresholds.contains(&t)),
            None => prop_assert!(thresholds.is_empty()),
        }
        if !outcome.floor_met {
            prop_assert_eq!(outcome.threshold_used, thresholds.last().copied());
        }
    }

    #[test]
    fn prop_zero_weight_groups_do_not_move_ranking(
        trend in prop::collection::vec(0.0f64..50.0, 2..20),
        noise in prop::collection::vec(-1.0f64..1.0, 1..60),
    ) {
        let weights = ScoringWeights::new([
            (
                FactorGroup::Trend,
                GroupWeights::new(1.0, [(Metric::Adx, 0.5), (Metric::TrendR2, 0.5)]),
            ),
            (FactorGroup::Return, GroupWeights::new(0.0, [(Metric::Momentum20d, 1.0)])),
            (FactorGroup::Liquidity, GroupWeights::new(0.0, [(Metric::Liquidity, 1.0)])),
        ]);
        let scorer = FactorScorer::new(weights);

        let inputs = |offset: usize| -> Vec<ScoringInput> {
            trend
                .iter()
                .enumerate()
                .map(|(i, adx)| ScoringInput {
                    symbol: format!("S{:02}", i),
                    display_name: String::new(),
                    industry: "宽基".into(),
                    return_dd_ratio: None,
                    metrics: [
                        (Metric::Adx, *adx),
                        (Metric::TrendR2, adx / 50.0),
                        (Metric::Momentum20d, noise[(i + offset) % noise.len()]),
                        (Metric::Liquidity, 1e7 * noise[(i * 7 + offset) % noise.len()].abs()),
                    ]
                    .into_iter()
                    .collect(),
                })
                .collect()
        };

        let first: Vec<(String, usize)> = scorer
            .score(inputs(0))
            .iter()
            .map(|c| (c.symbol.clone(), c.rank))
            .collect();
        let second: Vec<(String, usize)> = scorer
            .score(inputs(13))
            .iter()
            .map(|c| (c.symbol.clone(), c.rank))
            .collect();
        prop_assert_eq!(first, second);
    }
}

#[test]
fn test_dedup_terminates_when_no_threshold_meets_floor() {
    let pool = pool(6, &[0]);
    let names: Vec<&str> = pool.iter().map(|c| c.symbol.as_str()).collect();
    let mut entries = Vec::new();
    for i in 0..names.len() {
        for j in (i + 1)..names.len() {
            entries.push((names[i], names[j], 0.999));
        }
    }
    let matrix = CorrelationMatrix::from_entries(&names, entries);

    let dedup = AdaptiveDeduplicator::new(vec![0.98, 0.95, 0.92, 0.90], 0.5, SelectionPolicy::v1());
    let outcome = dedup.run(&pool, &matrix);

    assert_eq!(outcome.attempts, 4);
    assert_eq!(outcome.threshold_used, Some(0.90));
    assert!(!outcome.floor_met);
    assert_eq!(outcome.survivors.len(), 1);
    assert_eq!(outcome.survivors[0].symbol, "S00");
}

#[test]
fn test_missing_quality_uses_score_gap_not_industry() {
    // Neither side has return_dd_ratio; the score gap (0.60 vs 0.50) is decisive
    // even though the loser's industry is rarer.
    let a = Arc::new(common::candidate("A", "科技", 1, 0.60, None));
    let b = Arc::new(common::candidate("B", "黄金", 2, 0.50, None));
    let crowd: Vec<Arc<Candidate>> = (0..4)
        .map(|i| {
            let score = 0.4 - i as f64 * 0.01;
            Arc::new(common::candidate(&format!("T{}", i), "科技", 3 + i, score, None))
        })
        .collect();
    let mut pool = vec![a, b];
    pool.extend(crowd);
    let names: Vec<&str> = pool.iter().map(|c| c.symbol.as_str()).collect();
    let matrix = CorrelationMatrix::from_entries(&names, [("A", "B", 0.99)]);

    let dedup = AdaptiveDeduplicator::new(vec![0.95], 0.5, SelectionPolicy::v2(0.05));
    let outcome = dedup.run(&pool, &matrix);
    assert_eq!(outcome.removed.len(), 1);
    assert_eq!(outcome.removed[0].symbol, "B");
    assert_eq!(outcome.removed[0].kept, "A");

    // V1 on the same pool keeps the rarer industry.
    let dedup = AdaptiveDeduplicator::new(vec![0.95], 0.5, SelectionPolicy::v1());
    let outcome = dedup.run(&pool, &matrix);
    assert_eq!(outcome.removed[0].symbol, "A");
}
