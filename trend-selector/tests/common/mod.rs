//! Synthetic universes for integration tests.
//!
//! Returns are `drift + amplitude * sin(freq * t + phase)`, so closes compound
//! exactly and pairwise return correlations are controlled by frequency.

#![allow(dead_code)]

use chrono::NaiveDate;
use std::sync::Arc;
use trend_selector::factors::{Candidate, MetricValues};
use trend_selector::{DailyBar, SecurityHistory};

pub fn day(offset: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 2).unwrap() + chrono::Duration::days(offset)
}

#[derive(Debug, Clone)]
pub struct Wave {
    pub symbol: String,
    pub industry: String,
    pub drift: f64,
    pub amplitude: f64,
    pub freq: f64,
    pub phase: f64,
    /// First bar date offset
    pub start: i64,
    pub len: usize,
    pub amount: f64,
    pub volume: f64,
}

impl Wave {
    pub fn new(symbol: &str, industry: &str, drift: f64, freq: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            industry: industry.to_string(),
            drift,
            amplitude: 0.01,
            freq,
            phase: 0.0,
            start: 0,
            len: 200,
            amount: 5e7,
            volume: 1e6,
        }
    }

    pub fn phase(mut self, phase: f64) -> Self {
        self.phase = phase;
        self
    }

    pub fn span(mut self, start: i64, len: usize) -> Self {
        self.start = start;
        self.len = len;
        self
    }

    pub fn turnover(mut self, amount: f64, volume: f64) -> Self {
        self.amount = amount;
        self.volume = volume;
        self
    }

    pub fn history(&self) -> SecurityHistory {
        let mut close = 100.0;
        let bars = (0..self.len)
            .map(|i| {
                let t = i as f64;
                if i > 0 {
                    close *= 1.0 + self.drift + self.amplitude * (self.freq * t + self.phase).sin();
                }
                let volume = self.volume * (1.0 + 0.3 * (t * 0.21).sin());
                DailyBar::flat(day(self.start + i as i64), close, volume, self.amount)
            })
            .collect();
        SecurityHistory::new(&self.symbol, format!("{}ETF", self.symbol), bars)
            .with_industry(&self.industry)
    }
}

/// Ranked candidates with scores falling by 0.01 per rank.
pub fn ranked(specs: &[(&str, &str)]) -> Vec<Arc<Candidate>> {
    specs
        .iter()
        .enumerate()
        .map(|(i, (symbol, industry))| {
            Arc::new(candidate(symbol, industry, i + 1, 0.9 - i as f64 * 0.01, None))
        })
        .collect()
}

pub fn candidate(
    symbol: &str,
    industry: &str,
    rank: usize,
    final_score: f64,
    return_dd_ratio: Option<f64>,
) -> Candidate {
    Candidate {
        symbol: symbol.to_string(),
        display_name: symbol.to_string(),
        industry: industry.to_string(),
        rank,
        final_score,
        return_dd_ratio,
        metrics: MetricValues::new(),
        normalized: Default::default(),
    }
}
