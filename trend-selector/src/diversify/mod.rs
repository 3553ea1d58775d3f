//! Stage 3: correlation-aware diversification.
//!
//! ```text
//! ranked candidates ──▶ AdaptiveDeduplicator ──▶ GreedyDiversifier ──▶ IndustryBalancer
//!                       (threshold cascade)      (criterion, target)    (optional soft cap)
//! ```
//!
//! All three stages share one [`SelectionPolicy`].

pub mod balance;
pub mod dedup;
pub mod greedy;
pub mod policy;

pub use balance::{BalanceOutcome, IndustryBalancer, IndustrySwap};
pub use dedup::{AdaptiveDeduplicator, DedupOutcome, DuplicateRemoval};
pub use greedy::{GreedyDiversifier, GreedyOutcome, GreedyRejection};
pub use policy::{
    AverageCorrelationPolicy, CorrelationCriterion, IndustryCensus, IndustryFirstTieBreak, Keep,
    MaxPairwiseCorrelationPolicy, QualityScore, ScoreFirstTieBreak, SelectionPolicy, TieBreakPolicy,
};
