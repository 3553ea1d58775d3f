//! Orchestration of the three selection stages.
//!
//! `SelectionPipeline` is synchronous and deterministic: the same universe
//! and config always produce the same `SelectionResult`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

use trend_common::{Validate, ValidationError};

use super::liquidity::LiquidityGate;
use super::types::{
    DataGapWarning, Exclusion, ExclusionReason, FilterResult, FilterStage, SelectedSecurity,
    SelectionResult,
};
use crate::config::SelectorConfig;
use crate::correlation::{CorrelationMatrix, CorrelationMatrixBuilder};
use crate::data::{SecurityHistory, Universe};
use crate::diversify::{
    AdaptiveDeduplicator, BalanceOutcome, DedupOutcome, GreedyDiversifier, GreedyOutcome,
    GreedyRejection, IndustryBalancer, SelectionPolicy,
};
use crate::error::{Result, SelectorError};
use crate::factors::{BenchmarkSeries, Candidate, FactorScorer, IndicatorEngine, ScoringInput};
use crate::industry::industry_label;

/// Stage 3 intermediate results.
#[derive(Debug, Clone)]
pub struct DiversificationOutcome {
    pub dedup: DedupOutcome,
    pub greedy: GreedyOutcome,
    pub balance: Option<BalanceOutcome>,
    /// Final portfolio in rank order
    pub selected: Vec<Arc<Candidate>>,
}

/// The full selection pipeline, built once from a validated config.
pub struct SelectionPipeline {
    config: SelectorConfig,
    policy: SelectionPolicy,
    gate: LiquidityGate,
    indicators: IndicatorEngine,
    scorer: FactorScorer,
    matrix_builder: CorrelationMatrixBuilder,
    dedup: AdaptiveDeduplicator,
    greedy: GreedyDiversifier,
    balancer: Option<IndustryBalancer>,
}

impl SelectionPipeline {
    /// Validate `config` and build the stages. The V1/V2 policy is fixed here.
    pub fn new(config: SelectorConfig) -> Result<Self> {
        config.validate()?;

        let div = &config.diversification;
        let policy = SelectionPolicy::from_config(div);
        let balancer = div.balance_industries.then(|| {
            IndustryBalancer::new(div.target_size, div.max_correlation, policy.clone())
        });

        Ok(Self {
            gate: LiquidityGate::new(config.liquidity.clone()),
            indicators: IndicatorEngine::new(
                config.indicators.clone(),
                config.weights.enabled_metrics(),
            ),
            scorer: FactorScorer::new(config.weights.clone()),
            matrix_builder: CorrelationMatrixBuilder::new(config.correlation.clone()),
            dedup: AdaptiveDeduplicator::new(
                div.dedup_thresholds.clone(),
                div.dedup_min_ratio,
                policy.clone(),
            ),
            greedy: GreedyDiversifier::new(div.target_size, div.max_correlation, policy.clone()),
            balancer,
            policy,
            config,
        })
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    pub fn policy(&self) -> &SelectionPolicy {
        &self.policy
    }

    /// Run all stages over `universe`.
    pub fn run(&self, universe: &Universe) -> Result<SelectionResult> {
        if self.config.requires_benchmark() && universe.benchmark.is_none() {
            return Err(SelectorError::Config(ValidationError::MissingField {
                field: "benchmark".into(),
            }));
        }

        let as_of = universe.as_of();
        info!(
            securities = universe.len(),
            as_of = ?as_of,
            policy = %self.policy.name(),
            "Selection run started"
        );

        let mut funnel = Vec::new();
        let mut excluded = Vec::new();
        let mut warnings = Vec::new();

        // Stage 1
        let gate = self.gate.filter(&universe.securities);
        funnel.push(gate.funnel.clone());
        excluded.extend(gate.excluded);
        if gate.passed.is_empty() {
            return Err(SelectorError::EmptyPool {
                stage: FilterStage::Liquidity,
            });
        }

        // Stage 2
        let benchmark = universe.benchmark.as_ref().map(BenchmarkSeries::from_history);
        let ranked = self.score(&gate.passed, benchmark.as_ref(), &mut warnings);
        funnel.push(FilterResult::new(FilterStage::Scoring, gate.passed.len(), ranked.len()));
        if ranked.is_empty() {
            return Err(SelectorError::EmptyPool {
                stage: FilterStage::Scoring,
            });
        }

        // Stage 3
        let by_symbol: HashMap<&str, &SecurityHistory> =
            gate.passed.iter().map(|h| (h.symbol.as_str(), *h)).collect();
        let ranked_histories: Vec<&SecurityHistory> = ranked
            .iter()
            .filter_map(|c| by_symbol.get(c.symbol.as_str()).copied())
            .collect();
        let build = self.matrix_builder.build(&ranked_histories);
        funnel.push(FilterResult::new(
            FilterStage::Correlation,
            ranked.len(),
            build.matrix.len(),
        ));
        for (symbol, reason) in &build.rejected {
            warn!(symbol = %symbol, reason = reason.code(), "Excluded from correlation matrix");
            warnings.push(DataGapWarning::new(
                symbol,
                FilterStage::Correlation,
                reason.to_string(),
            ));
        }

        let outcome = self.diversify(&ranked, &build.matrix);

        funnel.push(FilterResult::new(
            FilterStage::Dedup,
            ranked.len(),
            outcome.dedup.survivors.len(),
        ));
        funnel.push(FilterResult::new(
            FilterStage::Diversification,
            outcome.dedup.survivors.len(),
            outcome.greedy.selected.len(),
        ));
        if outcome.balance.is_some() {
            funnel.push(FilterResult::new(
                FilterStage::Balance,
                outcome.greedy.selected.len(),
                outcome.selected.len(),
            ));
        }
        if outcome.greedy.fallback_used {
            warnings.push(DataGapWarning::new(
                "*",
                FilterStage::Diversification,
                "no candidate in correlation matrix, selected top-ranked",
            ));
        }

        let matrix_rejects: HashMap<&str, &ExclusionReason> = build
            .rejected
            .iter()
            .map(|(s, r)| (s.as_str(), r))
            .collect();
        excluded.extend(stage3_exclusions(&ranked, &outcome, &matrix_rejects));
        excluded.sort_by_key(|e| e.stage);

        let result = SelectionResult {
            run_id: run_id(as_of),
            as_of,
            policy: self.policy.name(),
            universe_size: universe.len(),
            selected: outcome.selected.iter().map(|c| SelectedSecurity::from(&**c)).collect(),
            excluded,
            funnel,
            warnings,
            dedup_threshold_used: outcome.dedup.threshold_used,
            fallback_used: outcome.greedy.fallback_used,
            swaps: outcome.balance.map(|b| b.swaps).unwrap_or_default(),
        };

        info!(summary = %result.summary(), "Selection run complete");
        Ok(result)
    }

    /// Stage 3 over an already ranked pool and its matrix.
    pub fn diversify(
        &self,
        ranked: &[Arc<Candidate>],
        matrix: &CorrelationMatrix,
    ) -> DiversificationOutcome {
        let dedup = self.dedup.run(ranked, matrix);
        let greedy = self.greedy.run(&dedup.survivors, matrix);

        let (balance, selected) = match &self.balancer {
            Some(balancer) if !greedy.fallback_used => {
                let outcome = balancer.run(greedy.selected.clone(), &dedup.survivors, matrix);
                let selected = outcome.selected.clone();
                (Some(outcome), selected)
            }
            _ => (None, greedy.selected.clone()),
        };

        DiversificationOutcome {
            dedup,
            greedy,
            balance,
            selected,
        }
    }

    fn score(
        &self,
        passed: &[&SecurityHistory],
        benchmark: Option<&BenchmarkSeries>,
        warnings: &mut Vec<DataGapWarning>,
    ) -> Vec<Arc<Candidate>> {
        let metrics = self.indicators.compute_all(passed, benchmark);
        let enabled = self.indicators.enabled();

        let inputs: Vec<ScoringInput> = passed
            .iter()
            .zip(metrics)
            .map(|(history, metrics)| {
                let missing: Vec<&str> = enabled
                    .iter()
                    .filter(|m| metrics.get(**m).is_none())
                    .map(|m| m.as_str())
                    .collect();
                if !missing.is_empty() {
                    warnings.push(DataGapWarning::new(
                        &history.symbol,
                        FilterStage::Scoring,
                        format!("missing metrics: {}", missing.join(", ")),
                    ));
                }
                ScoringInput {
                    symbol: history.symbol.clone(),
                    display_name: history.display_name.clone(),
                    industry: industry_label(history.industry.as_deref()),
                    return_dd_ratio: history.return_dd_ratio,
                    metrics,
                }
            })
            .collect();

        let ranked = self.scorer.score(inputs);
        info!(
            scored = ranked.len(),
            top = ranked.first().map(|c| c.symbol.as_str()).unwrap_or("-"),
            "Factor scoring complete"
        );
        ranked
    }
}

/// Exclusions for every ranked candidate missing from the final selection.
fn stage3_exclusions(
    ranked: &[Arc<Candidate>],
    outcome: &DiversificationOutcome,
    matrix_rejects: &HashMap<&str, &ExclusionReason>,
) -> Vec<Exclusion> {
    let selected: HashSet<&str> = outcome.selected.iter().map(|c| c.symbol.as_str()).collect();
    let duplicates: HashMap<&str, ExclusionReason> = outcome
        .dedup
        .removed
        .iter()
        .map(|r| {
            (
                r.symbol.as_str(),
                ExclusionReason::Duplicate {
                    kept: r.kept.clone(),
                    correlation: r.correlation,
                    threshold: r.threshold,
                },
            )
        })
        .collect();
    let swapped_out: HashMap<&str, &str> = outcome
        .balance
        .iter()
        .flat_map(|b| b.swaps.iter())
        .map(|s| (s.removed.as_str(), s.added.as_str()))
        .collect();
    let greedy: HashMap<&str, &GreedyRejection> = outcome
        .greedy
        .rejected
        .iter()
        .map(|(c, r)| (c.symbol.as_str(), r))
        .collect();

    ranked
        .iter()
        .filter(|c| !selected.contains(c.symbol.as_str()))
        .filter_map(|c| {
            let symbol = c.symbol.as_str();
            let (stage, reason) = if let Some(reason) = duplicates.get(symbol) {
                (FilterStage::Dedup, reason.clone())
            } else if let Some(added) = swapped_out.get(symbol) {
                (
                    FilterStage::Balance,
                    ExclusionReason::IndustryRebalanced {
                        replaced_by: (*added).to_string(),
                    },
                )
            } else {
                match greedy.get(symbol)? {
                    GreedyRejection::NotInMatrix => match matrix_rejects.get(symbol) {
                        Some(reason) => (FilterStage::Correlation, (*reason).clone()),
                        None => (FilterStage::Diversification, ExclusionReason::NotInMatrix),
                    },
                    GreedyRejection::MissingPairData => {
                        (FilterStage::Diversification, ExclusionReason::MissingPairData)
                    }
                    GreedyRejection::CorrelationLimit { value, closest } => (
                        FilterStage::Diversification,
                        ExclusionReason::CorrelationLimit {
                            value: *value,
                            closest: closest.clone(),
                        },
                    ),
                    GreedyRejection::TargetSizeReached => {
                        (FilterStage::Diversification, ExclusionReason::TargetSizeReached)
                    }
                }
            };
            Some(Exclusion::new(symbol, stage, reason))
        })
        .collect()
}

fn run_id(as_of: Option<chrono::NaiveDate>) -> String {
    match as_of {
        Some(date) => format!("select_{}", date.format("%Y%m%d")),
        None => "select_undated".to_string(),
    }
}
