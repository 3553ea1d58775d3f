//! Market data model consumed by the selector.
//!
//! The selector never fetches or persists data itself. Histories arrive
//! pre-loaded, either assembled by the caller into a [`Universe`] or pulled
//! through a [`HistoryProvider`].

mod provider;

pub use provider::{HistoryProvider, InMemoryProvider, ProviderError, UniverseSnapshot};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Core Data Types
// ============================================================================

/// A single daily bar (OHLCV).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    /// Trading date
    pub date: NaiveDate,
    /// Open price
    pub open: f64,
    /// High price
    pub high: f64,
    /// Low price
    pub low: f64,
    /// Close price (total-return adjusted)
    pub close: f64,
    /// Volume
    pub volume: f64,
    /// Amount (turnover in currency)
    #[serde(default)]
    pub amount: f64,
}

impl DailyBar {
    /// Bar with all prices equal to `close`, mostly useful for fixtures.
    pub fn flat(date: NaiveDate, close: f64, volume: f64, amount: f64) -> Self {
        Self {
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume,
            amount,
        }
    }

    /// True range against the previous close.
    pub fn true_range(&self, prev_close: f64) -> f64 {
        (self.high - self.low)
            .max((self.high - prev_close).abs())
            .max((self.low - prev_close).abs())
    }
}

/// Daily history and identity of one security.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityHistory {
    /// Symbol (unique key, e.g. "510300.SH")
    pub symbol: String,
    /// Display name
    #[serde(default)]
    pub display_name: String,
    /// Industry label from the external classifier
    #[serde(default)]
    pub industry: Option<String>,
    /// Listing date
    #[serde(default)]
    pub listing_date: Option<NaiveDate>,
    /// Backtest-derived return / drawdown ratio, if known
    #[serde(default)]
    pub return_dd_ratio: Option<f64>,
    /// Daily bars, ascending by date
    #[serde(default)]
    pub bars: Vec<DailyBar>,
}

impl SecurityHistory {
    /// Create a history, sorting bars and dropping duplicated dates.
    ///
    /// When a date occurs twice the later bar in input order wins.
    pub fn new(
        symbol: impl Into<String>,
        display_name: impl Into<String>,
        bars: Vec<DailyBar>,
    ) -> Self {
        let mut history = Self {
            symbol: symbol.into(),
            display_name: display_name.into(),
            industry: None,
            listing_date: None,
            return_dd_ratio: None,
            bars,
        };
        history.normalize();
        history
    }

    /// Set the industry label.
    pub fn with_industry(mut self, industry: impl Into<String>) -> Self {
        self.industry = Some(industry.into());
        self
    }

    /// Set the listing date.
    pub fn with_listing_date(mut self, date: NaiveDate) -> Self {
        self.listing_date = Some(date);
        self
    }

    /// Sort bars ascending and keep one bar per date.
    pub fn normalize(&mut self) {
        let mut by_date: BTreeMap<NaiveDate, DailyBar> = BTreeMap::new();
        for bar in self.bars.drain(..) {
            by_date.insert(bar.date, bar);
        }
        self.bars = by_date.into_values().collect();
    }

    /// Date of the last bar.
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    /// Date of the first bar.
    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    /// The trailing `n` bars (or all of them if fewer).
    pub fn tail(&self, n: usize) -> &[DailyBar] {
        let start = self.bars.len().saturating_sub(n);
        &self.bars[start..]
    }

    /// Close prices keyed by date.
    pub fn close_by_date(&self) -> BTreeMap<NaiveDate, f64> {
        self.bars.iter().map(|b| (b.date, b.close)).collect()
    }
}

/// All inputs of one selection run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Universe {
    /// Securities in input order
    pub securities: Vec<SecurityHistory>,
    /// Benchmark history, required by excess-return metrics
    #[serde(default)]
    pub benchmark: Option<SecurityHistory>,
}

impl Universe {
    /// Create a universe without a benchmark.
    pub fn new(securities: Vec<SecurityHistory>) -> Self {
        Self {
            securities,
            benchmark: None,
        }
    }

    /// Attach a benchmark history.
    pub fn with_benchmark(mut self, benchmark: SecurityHistory) -> Self {
        self.benchmark = Some(benchmark);
        self
    }

    /// Latest bar date across all securities.
    pub fn as_of(&self) -> Option<NaiveDate> {
        self.securities.iter().filter_map(|s| s.last_date()).max()
    }

    /// Number of securities.
    pub fn len(&self) -> usize {
        self.securities.len()
    }

    /// Whether there are no securities.
    pub fn is_empty(&self) -> bool {
        self.securities.is_empty()
    }
}
