//! Factor computation and composite scoring (Stage 2).

pub mod indicators;
pub mod scorer;
pub mod types;
pub mod weights;

pub use indicators::{BenchmarkSeries, IndicatorEngine};
pub use scorer::{percentile_ranks, FactorScorer, ScoringInput};
pub use types::{Candidate, FactorGroup, Metric, MetricValues};
pub use weights::{GroupWeights, ScoringWeights};
