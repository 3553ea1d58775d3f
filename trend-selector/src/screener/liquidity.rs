//! Stage 1: history length, listing age and turnover gate.

use std::collections::HashSet;
use tracing::{debug, info};

use super::types::{Exclusion, ExclusionReason, FilterResult, FilterStage};
use crate::config::LiquidityConfig;
use crate::data::SecurityHistory;
use crate::stats;

/// Survivors and exclusions of Stage 1.
#[derive(Debug)]
pub struct GateOutcome<'a> {
    /// Passing securities in input order
    pub passed: Vec<&'a SecurityHistory>,
    pub excluded: Vec<Exclusion>,
    pub funnel: FilterResult,
}

/// Stateless Stage 1 filter.
pub struct LiquidityGate {
    config: LiquidityConfig,
}

impl LiquidityGate {
    pub fn new(config: LiquidityConfig) -> Self {
        Self { config }
    }

    /// Check one security. The first failing check is reported.
    pub fn check(&self, history: &SecurityHistory) -> Result<(), ExclusionReason> {
        let bars = history.bars.len();
        if bars < self.config.min_history_days || bars == 0 {
            return Err(ExclusionReason::InsufficientHistory {
                bars,
                required: self.config.min_history_days,
            });
        }

        let last = history.last_date();
        let listed = history.listing_date.or_else(|| history.first_date());
        if let (Some(last), Some(listed)) = (last, listed) {
            let days = (last - listed).num_days();
            if days < self.config.min_listing_days {
                return Err(ExclusionReason::BelowListingAge {
                    days,
                    required: self.config.min_listing_days,
                });
            }
        }

        let window = history.tail(self.config.turnover_window);
        let amounts: Vec<f64> = window.iter().map(|b| b.amount).collect();
        let average = stats::mean(&amounts).unwrap_or(0.0);
        if average < self.config.min_avg_turnover {
            return Err(ExclusionReason::LowTurnover {
                average,
                required: self.config.min_avg_turnover,
            });
        }

        Ok(())
    }

    /// Apply the gate to a whole universe. Repeated symbols after the first
    /// occurrence are excluded.
    pub fn filter<'a>(&self, securities: &'a [SecurityHistory]) -> GateOutcome<'a> {
        let mut seen = HashSet::new();
        let mut passed = Vec::new();
        let mut excluded = Vec::new();

        for history in securities {
            if !seen.insert(history.symbol.as_str()) {
                excluded.push(Exclusion::new(
                    &history.symbol,
                    FilterStage::Liquidity,
                    ExclusionReason::DuplicateSymbol,
                ));
                continue;
            }
            match self.check(history) {
                Ok(()) => passed.push(history),
                Err(reason) => {
                    debug!(symbol = %history.symbol, reason = reason.code(), "Stage 1 rejected");
                    excluded.push(Exclusion::new(&history.symbol, FilterStage::Liquidity, reason));
                }
            }
        }

        let funnel = FilterResult::new(FilterStage::Liquidity, securities.len(), passed.len());
        info!(
            input = funnel.input,
            passed = funnel.passed,
            eliminated = funnel.eliminated,
            "Liquidity gate complete"
        );

        GateOutcome {
            passed,
            excluded,
            funnel,
        }
    }
}
