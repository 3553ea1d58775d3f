//! Tie-break and acceptance strategies for Stage 3.
//!
//! Two families, each with a V1 and a V2 implementation. The pair is chosen
//! once from configuration ([`SelectionPolicy::from_config`]) and shared by
//! the deduplicator, the greedy diversifier and the balancer.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::DiversificationConfig;
use crate::factors::Candidate;

// ============================================================================
// Quality Score
// ============================================================================

/// Optional quality value with "missing is worse than any value" ordering.
#[derive(Debug, Clone, Copy)]
pub struct QualityScore(Option<f64>);

impl QualityScore {
    /// NaN and infinities are treated as missing.
    pub fn new(value: Option<f64>) -> Self {
        Self(value.filter(|v| v.is_finite()))
    }

    pub fn missing() -> Self {
        Self(None)
    }

    pub fn value(&self) -> Option<f64> {
        self.0
    }

    pub fn is_missing(&self) -> bool {
        self.0.is_none()
    }
}

impl PartialEq for QualityScore {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QualityScore {}

impl PartialOrd for QualityScore {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QualityScore {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.0, other.0) {
            (Some(a), Some(b)) => a.total_cmp(&b),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        }
    }
}

/// Quality of both sides of a pair on a common basis.
///
/// `return_dd_ratio` when both carry it, otherwise `final_score` for both.
pub fn pair_quality(a: &Candidate, b: &Candidate) -> (QualityScore, QualityScore) {
    match (a.return_dd_ratio, b.return_dd_ratio) {
        (Some(qa), Some(qb)) if qa.is_finite() && qb.is_finite() => {
            (QualityScore::new(Some(qa)), QualityScore::new(Some(qb)))
        }
        _ => (
            QualityScore::new(Some(a.final_score)),
            QualityScore::new(Some(b.final_score)),
        ),
    }
}

// ============================================================================
// Industry Census
// ============================================================================

/// Member count per industry within the current surviving set.
#[derive(Debug, Clone, Default)]
pub struct IndustryCensus {
    counts: BTreeMap<String, usize>,
}

impl IndustryCensus {
    pub fn from_candidates<'a>(candidates: impl IntoIterator<Item = &'a Arc<Candidate>>) -> Self {
        let mut census = Self::default();
        for c in candidates {
            census.add(&c.industry);
        }
        census
    }

    pub fn count(&self, industry: &str) -> usize {
        self.counts.get(industry).copied().unwrap_or(0)
    }

    pub fn add(&mut self, industry: &str) {
        *self.counts.entry(industry.to_string()).or_insert(0) += 1;
    }

    pub fn remove(&mut self, industry: &str) {
        if let Some(n) = self.counts.get_mut(industry) {
            *n = n.saturating_sub(1);
            if *n == 0 {
                self.counts.remove(industry);
            }
        }
    }

    /// Industries with at least one member.
    pub fn represented(&self) -> usize {
        self.counts.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

// ============================================================================
// Tie-break Policies
// ============================================================================

/// Which side of a highly correlated pair survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keep {
    First,
    Second,
}

impl Keep {
    fn from_ordering(ord: Ordering) -> Option<Self> {
        match ord {
            Ordering::Greater => Some(Self::First),
            Ordering::Less => Some(Self::Second),
            Ordering::Equal => None,
        }
    }
}

/// Resolves a duplicate pair during deduplication.
pub trait TieBreakPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Decide which candidate to keep, given the industry census of the
    /// still-surviving set.
    fn resolve(&self, a: &Candidate, b: &Candidate, census: &IndustryCensus) -> Keep;
}

/// Rarer industry wins (greater means `a` is rarer).
fn scarcity(a: &Candidate, b: &Candidate, census: &IndustryCensus) -> Ordering {
    if a.industry == b.industry {
        return Ordering::Equal;
    }
    census.count(&b.industry).cmp(&census.count(&a.industry))
}

/// Better (smaller) rank wins, then the lexically smaller symbol.
fn rank_then_symbol(a: &Candidate, b: &Candidate) -> Keep {
    Keep::from_ordering(b.rank.cmp(&a.rank))
        .or_else(|| Keep::from_ordering(b.symbol.cmp(&a.symbol)))
        .unwrap_or(Keep::First)
}

/// V1: industry diversity first, then quality.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndustryFirstTieBreak;

impl TieBreakPolicy for IndustryFirstTieBreak {
    fn name(&self) -> &'static str {
        "industry_first"
    }

    fn resolve(&self, a: &Candidate, b: &Candidate, census: &IndustryCensus) -> Keep {
        let (qa, qb) = pair_quality(a, b);
        Keep::from_ordering(scarcity(a, b, census))
            .or_else(|| Keep::from_ordering(qa.cmp(&qb)))
            .unwrap_or_else(|| rank_then_symbol(a, b))
    }
}

/// V2: a decisive quality gap wins outright; near-ties fall back to scarcity.
#[derive(Debug, Clone, Copy)]
pub struct ScoreFirstTieBreak {
    pub score_diff_threshold: f64,
}

impl ScoreFirstTieBreak {
    pub fn new(score_diff_threshold: f64) -> Self {
        Self {
            score_diff_threshold,
        }
    }
}

/// Relative gap `|a - b| / max(|a|, |b|)`, 0 when both are 0.
pub fn relative_gap(a: f64, b: f64) -> f64 {
    let denom = a.abs().max(b.abs());
    if denom == 0.0 {
        0.0
    } else {
        (a - b).abs() / denom
    }
}

impl TieBreakPolicy for ScoreFirstTieBreak {
    fn name(&self) -> &'static str {
        "score_first"
    }

    fn resolve(&self, a: &Candidate, b: &Candidate, census: &IndustryCensus) -> Keep {
        let (qa, qb) = pair_quality(a, b);
        let decisive = match (qa.value(), qb.value()) {
            (Some(x), Some(y)) => relative_gap(x, y) > self.score_diff_threshold,
            (None, None) => false,
            _ => true,
        };
        if decisive {
            if let Some(keep) = Keep::from_ordering(qa.cmp(&qb)) {
                return keep;
            }
        }
        Keep::from_ordering(scarcity(a, b, census)).unwrap_or_else(|| rank_then_symbol(a, b))
    }
}

// ============================================================================
// Correlation Criteria
// ============================================================================

/// Acceptance rule for adding a candidate to a selection.
pub trait CorrelationCriterion: Send + Sync {
    fn name(&self) -> &'static str;

    /// Aggregate of the evaluable |corr| values; `None` when there are none.
    fn aggregate(&self, abs_correlations: &[f64]) -> Option<f64>;

    /// Admit when the aggregate is below `max`. An empty slice is admitted;
    /// callers reject a non-empty selection with no known pair beforehand.
    fn admits(&self, abs_correlations: &[f64], max: f64) -> bool {
        self.aggregate(abs_correlations).map_or(true, |v| v < max)
    }
}

/// V1: mean |corr| against the selection.
#[derive(Debug, Clone, Copy, Default)]
pub struct AverageCorrelationPolicy;

impl CorrelationCriterion for AverageCorrelationPolicy {
    fn name(&self) -> &'static str {
        "average_correlation"
    }

    fn aggregate(&self, abs_correlations: &[f64]) -> Option<f64> {
        crate::stats::mean(abs_correlations)
    }
}

/// V2: max |corr| against the selection.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxPairwiseCorrelationPolicy;

impl CorrelationCriterion for MaxPairwiseCorrelationPolicy {
    fn name(&self) -> &'static str {
        "max_pairwise_correlation"
    }

    fn aggregate(&self, abs_correlations: &[f64]) -> Option<f64> {
        abs_correlations.iter().copied().reduce(f64::max)
    }
}

// ============================================================================
// Selection Policy
// ============================================================================

/// The tie-break and criterion in effect for a run.
#[derive(Clone)]
pub struct SelectionPolicy {
    pub tie_break: Arc<dyn TieBreakPolicy>,
    pub criterion: Arc<dyn CorrelationCriterion>,
}

impl SelectionPolicy {
    pub fn v1() -> Self {
        Self {
            tie_break: Arc::new(IndustryFirstTieBreak),
            criterion: Arc::new(AverageCorrelationPolicy),
        }
    }

    pub fn v2(score_diff_threshold: f64) -> Self {
        Self {
            tie_break: Arc::new(ScoreFirstTieBreak::new(score_diff_threshold)),
            criterion: Arc::new(MaxPairwiseCorrelationPolicy),
        }
    }

    pub fn from_config(config: &DiversificationConfig) -> Self {
        if config.diversify_v2 {
            Self::v2(config.score_diff_threshold)
        } else {
            Self::v1()
        }
    }

    /// `"<tie_break>+<criterion>"`
    pub fn name(&self) -> String {
        format!("{}+{}", self.tie_break.name(), self.criterion.name())
    }
}

impl std::fmt::Debug for SelectionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionPolicy")
            .field("tie_break", &self.tie_break.name())
            .field("criterion", &self.criterion.name())
            .finish()
    }
}
