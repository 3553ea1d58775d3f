//! Selection pipeline and its async front-end.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                        趋势组合筛选流程                               │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │                                                                      │
//! │  ┌────────────────┐   ┌────────────────┐   ┌─────────────────────┐   │
//! │  │ HistoryProvider│──▶│ ScreenerEngine │──▶│  SelectionPipeline  │   │
//! │  │  (async load)  │   │ (industry fill)│   │                     │   │
//! │  └────────────────┘   └────────────────┘   └──────────┬──────────┘   │
//! │                                                       │              │
//! │  ┌────────────────────────────────────────────────────┴────────────┐ │
//! │  │ Stage 1  LiquidityGate: history, listing age, turnover          │ │
//! │  │ Stage 2  IndicatorEngine + FactorScorer: percentile composite   │ │
//! │  │ Stage 3  Correlation matrix → dedup → greedy → industry balance │ │
//! │  └─────────────────────────────────────────────────────────────────┘ │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use trend_selector::screener::{ScreenerEngine, SelectionReport, ReportFormat};
//!
//! let engine = ScreenerEngine::new(config, Arc::new(provider))?;
//! let result = engine.run().await?;
//! SelectionReport::new(result).save_to_file(&path, ReportFormat::Markdown)?;
//! ```

pub mod engine;
pub mod liquidity;
pub mod pipeline;
pub mod report;
pub mod types;

pub use engine::{LoadedUniverse, ScreenerEngine};
pub use liquidity::{GateOutcome, LiquidityGate};
pub use pipeline::{DiversificationOutcome, SelectionPipeline};
pub use report::{ReportFormat, SelectionReport};
pub use types::{
    DataGapWarning, Exclusion, ExclusionReason, FilterResult, FilterStage, SelectedSecurity,
    SelectionResult,
};
