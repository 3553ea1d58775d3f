//! Result types shared by the pipeline stages.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::diversify::IndustrySwap;
use crate::factors::{Candidate, Metric, MetricValues};

// ============================================================================
// Filter Stage
// ============================================================================

/// Stage identifier for tracking where candidates are eliminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterStage {
    /// History loading (engine only)
    Load,
    /// Stage 1: history length, listing age, turnover
    Liquidity,
    /// Stage 2: factor scoring and ranking
    Scoring,
    /// Correlation matrix membership
    Correlation,
    /// Stage 3a: adaptive deduplication
    Dedup,
    /// Stage 3b: greedy diversification
    Diversification,
    /// Stage 3c: industry balancing
    Balance,
}

impl fmt::Display for FilterStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load => write!(f, "数据加载"),
            Self::Liquidity => write!(f, "流动性筛选"),
            Self::Scoring => write!(f, "因子评分"),
            Self::Correlation => write!(f, "相关性矩阵"),
            Self::Dedup => write!(f, "自适应去重"),
            Self::Diversification => write!(f, "贪心分散"),
            Self::Balance => write!(f, "行业平衡"),
        }
    }
}

// ============================================================================
// Filter Result
// ============================================================================

/// Funnel entry for one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterResult {
    pub stage: FilterStage,
    /// Candidates entering this stage
    pub input: usize,
    /// Candidates that passed this stage
    pub passed: usize,
    /// Candidates eliminated at this stage
    pub eliminated: usize,
    /// Elimination rate (%)
    pub elimination_rate: f64,
}

impl FilterResult {
    pub fn new(stage: FilterStage, input_count: usize, passed_count: usize) -> Self {
        let eliminated = input_count.saturating_sub(passed_count);
        let elimination_rate = if input_count > 0 {
            (eliminated as f64 / input_count as f64) * 100.0
        } else {
            0.0
        };

        Self {
            stage,
            input: input_count,
            passed: passed_count,
            eliminated,
            elimination_rate,
        }
    }
}

// ============================================================================
// Exclusions and Warnings
// ============================================================================

/// Why a candidate was dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ExclusionReason {
    InsufficientHistory { bars: usize, required: usize },
    BelowListingAge { days: i64, required: i64 },
    LowTurnover { average: f64, required: f64 },
    DuplicateSymbol,
    DataUnavailable { detail: String },
    InsufficientOverlap { observations: usize, required: usize },
    ZeroVariance,
    Duplicate { kept: String, correlation: f64, threshold: f64 },
    NotInMatrix,
    MissingPairData,
    CorrelationLimit { value: f64, closest: Option<String> },
    TargetSizeReached,
    IndustryRebalanced { replaced_by: String },
}

impl ExclusionReason {
    /// Stable snake_case reason code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InsufficientHistory { .. } => "insufficient_history",
            Self::BelowListingAge { .. } => "below_listing_age",
            Self::LowTurnover { .. } => "low_turnover",
            Self::DuplicateSymbol => "duplicate_symbol",
            Self::DataUnavailable { .. } => "data_unavailable",
            Self::InsufficientOverlap { .. } => "insufficient_overlap",
            Self::ZeroVariance => "zero_variance",
            Self::Duplicate { .. } => "duplicate",
            Self::NotInMatrix => "not_in_matrix",
            Self::MissingPairData => "missing_pair_data",
            Self::CorrelationLimit { .. } => "correlation_limit",
            Self::TargetSizeReached => "target_size_reached",
            Self::IndustryRebalanced { .. } => "industry_rebalanced",
        }
    }
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientHistory { bars, required } => {
                write!(f, "历史数据不足 ({} < {} 根K线)", bars, required)
            }
            Self::BelowListingAge { days, required } => {
                write!(f, "上市时间不足 ({} < {} 天)", days, required)
            }
            Self::LowTurnover { average, required } => {
                write!(f, "成交额不足 ({:.0} < {:.0})", average, required)
            }
            Self::DuplicateSymbol => write!(f, "代码重复"),
            Self::DataUnavailable { detail } => write!(f, "数据不可用: {}", detail),
            Self::InsufficientOverlap { observations, required } => {
                write!(f, "重叠样本不足 ({} < {})", observations, required)
            }
            Self::ZeroVariance => write!(f, "收益率无波动"),
            Self::Duplicate {
                kept,
                correlation,
                threshold,
            } => write!(f, "与 {} 高度相关 ({:.3} > {:.2})", kept, correlation, threshold),
            Self::NotInMatrix => write!(f, "不在相关性矩阵中"),
            Self::MissingPairData => write!(f, "与已选标的无可用相关性数据"),
            Self::CorrelationLimit { value, closest } => match closest {
                Some(symbol) => write!(f, "相关性超限 ({:.3}, 最接近 {})", value, symbol),
                None => write!(f, "相关性超限 ({:.3})", value),
            },
            Self::TargetSizeReached => write!(f, "已达目标数量"),
            Self::IndustryRebalanced { replaced_by } => {
                write!(f, "行业平衡替换为 {}", replaced_by)
            }
        }
    }
}

/// One dropped candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exclusion {
    pub symbol: String,
    pub stage: FilterStage,
    pub reason: ExclusionReason,
}

impl Exclusion {
    pub fn new(symbol: impl Into<String>, stage: FilterStage, reason: ExclusionReason) -> Self {
        Self {
            symbol: symbol.into(),
            stage,
            reason,
        }
    }
}

/// A non-fatal data gap recovered locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataGapWarning {
    pub symbol: String,
    pub stage: FilterStage,
    pub detail: String,
}

impl DataGapWarning {
    pub fn new(symbol: impl Into<String>, stage: FilterStage, detail: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            stage,
            detail: detail.into(),
        }
    }
}

// ============================================================================
// Selection Result
// ============================================================================

/// A portfolio member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedSecurity {
    pub symbol: String,
    pub display_name: String,
    pub industry: String,
    pub rank: usize,
    pub final_score: f64,
    pub return_dd_ratio: Option<f64>,
    /// Percentile-normalised components
    pub normalized: BTreeMap<Metric, f64>,
    /// Raw metric values
    pub metrics: MetricValues,
}

impl From<&Candidate> for SelectedSecurity {
    fn from(c: &Candidate) -> Self {
        Self {
            symbol: c.symbol.clone(),
            display_name: c.display_name.clone(),
            industry: c.industry.clone(),
            rank: c.rank,
            final_score: c.final_score,
            return_dd_ratio: c.return_dd_ratio,
            normalized: c.normalized.clone(),
            metrics: c.metrics.clone(),
        }
    }
}

/// Output of one selection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    /// Derived from the as-of date
    pub run_id: String,
    /// Last bar date across the universe
    pub as_of: Option<NaiveDate>,
    /// Name of the tie-break policy in effect
    pub policy: String,
    /// Securities entering Stage 1
    pub universe_size: usize,
    /// Final portfolio ordered by rank
    pub selected: Vec<SelectedSecurity>,
    pub excluded: Vec<Exclusion>,
    pub funnel: Vec<FilterResult>,
    pub warnings: Vec<DataGapWarning>,
    /// Dedup threshold that was accepted
    pub dedup_threshold_used: Option<f64>,
    /// True when the greedy stage had no matrix member to seed from
    pub fallback_used: bool,
    pub swaps: Vec<IndustrySwap>,
}

impl SelectionResult {
    pub fn symbols(&self) -> Vec<&str> {
        self.selected.iter().map(|s| s.symbol.as_str()).collect()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.selected.iter().any(|s| s.symbol == symbol)
    }

    pub fn excluded_at(&self, stage: FilterStage) -> impl Iterator<Item = &Exclusion> + '_ {
        self.excluded.iter().filter(move |e| e.stage == stage)
    }

    pub fn exclusion_for(&self, symbol: &str) -> Option<&Exclusion> {
        self.excluded.iter().find(|e| e.symbol == symbol)
    }

    /// Selected members per industry.
    pub fn industry_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for s in &self.selected {
            *counts.entry(s.industry.as_str()).or_insert(0) += 1;
        }
        counts
    }

    /// Summary string for logging.
    pub fn summary(&self) -> String {
        format!(
            "Selected {} of {} securities ({}), {} excluded, {} warnings",
            self.selected.len(),
            self.universe_size,
            self.policy,
            self.excluded.len(),
            self.warnings.len()
        )
    }
}
