//! Trend Selector Library
//!
//! Screens a universe of exchange-traded funds down to a small, diversified
//! portfolio for trend-following strategies.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    trend-selector (Rust Library)                    │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────┐      │
//! │  │  Liquidity      │  │  Factor         │  │  Diversifier    │      │
//! │  │  Gate           │─▶│  Scorer         │─▶│  (corr + dedup) │      │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────┘      │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Concepts
//!
//! ## Factor scoring
//! - Each metric is percentile-ranked across the pool
//! - Groups (trend, return, liquidity, risk-adjusted) combine ranks by weight
//!
//! ## Diversification
//! - Near-identical funds are deduplicated with a threshold cascade
//! - The portfolio is grown greedily under a correlation limit
//! - An optional soft cap keeps any single industry from dominating
//!
//! ## V1 / V2 policies
//! - V1: industry scarcity first, average correlation criterion
//! - V2: quality gap first, max pairwise correlation criterion

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod correlation;
pub mod data;
pub mod diversify;
pub mod error;
pub mod factors;
pub mod industry;
pub mod screener;
pub mod stats;

pub use config::SelectorConfig;
pub use correlation::{CorrelationMatrix, CorrelationMatrixBuilder};
pub use data::{
    DailyBar, HistoryProvider, InMemoryProvider, SecurityHistory, Universe, UniverseSnapshot,
};
pub use error::{Result, SelectorError};
pub use factors::{Candidate, FactorScorer, IndicatorEngine, ScoringWeights};
pub use industry::{IndustryClassifier, IndustryKeywordMap, UNCLASSIFIED_INDUSTRY};
pub use screener::{ScreenerEngine, SelectionPipeline, SelectionReport, SelectionResult};
