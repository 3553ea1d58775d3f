//! Pairwise return correlation over a shared trailing calendar.
//!
//! The matrix is built once per run and then only read. Pairs whose joint
//! history is too short are stored as absent and mean "unknown", which the
//! downstream stages treat as not evaluable.

use chrono::NaiveDate;
use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

use crate::config::CorrelationConfig;
use crate::data::SecurityHistory;
use crate::screener::types::ExclusionReason;
use crate::stats;

// ============================================================================
// Correlation Matrix
// ============================================================================

/// Symmetric correlation matrix with unit diagonal.
///
/// Off-diagonal entries live in a row-major upper triangle.
#[derive(Debug, Clone, Default)]
pub struct CorrelationMatrix {
    symbols: Vec<String>,
    index: HashMap<String, usize>,
    upper: Vec<Option<f64>>,
}

impl CorrelationMatrix {
    fn from_parts(symbols: Vec<String>, upper: Vec<Option<f64>>) -> Self {
        let index = symbols
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), i))
            .collect();
        Self {
            symbols,
            index,
            upper,
        }
    }

    /// Build a matrix from explicit pair values. Unlisted pairs are absent.
    ///
    /// Values are clamped to `[-1, 1]`; non-finite values and pairs naming
    /// unknown symbols are ignored.
    pub fn from_entries<S: AsRef<str>>(
        symbols: &[S],
        entries: impl IntoIterator<Item = (S, S, f64)>,
    ) -> Self {
        let symbols: Vec<String> = symbols.iter().map(|s| s.as_ref().to_string()).collect();
        let n = symbols.len();
        let mut matrix = Self::from_parts(symbols, vec![None; n * n.saturating_sub(1) / 2]);
        for (a, b, value) in entries {
            let (Some(i), Some(j)) = (matrix.index_of(a.as_ref()), matrix.index_of(b.as_ref()))
            else {
                continue;
            };
            if i != j && value.is_finite() {
                let slot = matrix.slot(i, j);
                matrix.upper[slot] = Some(value.clamp(-1.0, 1.0));
            }
        }
        matrix
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Members in rank order.
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.index.contains_key(symbol)
    }

    pub fn index_of(&self, symbol: &str) -> Option<usize> {
        self.index.get(symbol).copied()
    }

    /// Correlation of two members; `None` when unknown or not a member.
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.index_of(a)?;
        let j = self.index_of(b)?;
        self.get_by_index(i, j)
    }

    pub fn get_by_index(&self, i: usize, j: usize) -> Option<f64> {
        let n = self.len();
        if i >= n || j >= n {
            return None;
        }
        if i == j {
            return Some(1.0);
        }
        self.upper[self.slot(i, j)]
    }

    /// Number of present off-diagonal pairs.
    pub fn present_pairs(&self) -> usize {
        self.upper.iter().filter(|v| v.is_some()).count()
    }

    fn slot(&self, i: usize, j: usize) -> usize {
        let (i, j) = if i < j { (i, j) } else { (j, i) };
        let n = self.len();
        i * (2 * n - i - 1) / 2 + (j - i - 1)
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Matrix plus the candidates that could not join it.
#[derive(Debug, Clone)]
pub struct MatrixBuild {
    pub matrix: CorrelationMatrix,
    /// Rejected candidates in input order
    pub rejected: Vec<(String, ExclusionReason)>,
}

/// Builds a [`CorrelationMatrix`] from close series.
pub struct CorrelationMatrixBuilder {
    config: CorrelationConfig,
}

struct Member {
    symbol: String,
    closes: Vec<(NaiveDate, f64)>,
}

impl CorrelationMatrixBuilder {
    pub fn new(config: CorrelationConfig) -> Self {
        Self { config }
    }

    /// Build over `histories`, which must already be in rank order.
    pub fn build(&self, histories: &[&SecurityHistory]) -> MatrixBuild {
        let calendar: BTreeSet<NaiveDate> = histories
            .iter()
            .flat_map(|h| h.bars.iter().map(|b| b.date))
            .collect();
        let window_start = calendar
            .iter()
            .rev()
            .take(self.config.lookback)
            .last()
            .copied();

        let mut members = Vec::new();
        let mut rejected = Vec::new();

        for history in histories {
            let closes: Vec<(NaiveDate, f64)> = match window_start {
                Some(start) => history
                    .bars
                    .iter()
                    .filter(|b| b.date >= start && b.close.is_finite() && b.close > 0.0)
                    .map(|b| (b.date, b.close))
                    .collect(),
                None => Vec::new(),
            };

            if closes.len() < self.config.min_observations + 1 {
                debug!(
                    symbol = %history.symbol,
                    closes = closes.len(),
                    "Insufficient overlap for correlation"
                );
                rejected.push((
                    history.symbol.clone(),
                    ExclusionReason::InsufficientOverlap {
                        observations: closes.len().saturating_sub(1),
                        required: self.config.min_observations,
                    },
                ));
                continue;
            }

            let prices: Vec<f64> = closes.iter().map(|(_, c)| *c).collect();
            let constant = stats::std_dev(&stats::simple_returns(&prices))
                .map_or(true, |s| s <= f64::EPSILON);
            if constant {
                debug!(symbol = %history.symbol, "Zero return variance");
                rejected.push((history.symbol.clone(), ExclusionReason::ZeroVariance));
                continue;
            }

            members.push(Member {
                symbol: history.symbol.clone(),
                closes,
            });
        }

        let n = members.len();
        let pairs: Vec<(usize, usize)> = (0..n)
            .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
            .collect();
        let min_obs = self.config.min_observations;
        let upper: Vec<Option<f64>> = pairs
            .par_iter()
            .map(|&(i, j)| pair_correlation(&members[i].closes, &members[j].closes, min_obs))
            .collect();

        let matrix = CorrelationMatrix::from_parts(
            members.into_iter().map(|m| m.symbol).collect(),
            upper,
        );

        info!(
            members = matrix.len(),
            rejected = rejected.len(),
            present_pairs = matrix.present_pairs(),
            total_pairs = pairs.len(),
            "Correlation matrix built"
        );

        MatrixBuild { matrix, rejected }
    }
}

/// Correlation of returns on common dates; `None` below `min_obs` joint returns.
fn pair_correlation(a: &[(NaiveDate, f64)], b: &[(NaiveDate, f64)], min_obs: usize) -> Option<f64> {
    let mut xs = Vec::with_capacity(a.len().min(b.len()));
    let mut ys = Vec::with_capacity(xs.capacity());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                xs.push(a[i].1);
                ys.push(b[j].1);
                i += 1;
                j += 1;
            }
        }
    }

    let rx = stats::simple_returns(&xs);
    let ry = stats::simple_returns(&ys);
    if rx.len() < min_obs || rx.len() != ry.len() {
        return None;
    }
    stats::pearson(&rx, &ry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DailyBar;

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(offset)
    }

    fn history(symbol: &str, closes: impl IntoIterator<Item = (i64, f64)>) -> SecurityHistory {
        let bars = closes
            .into_iter()
            .map(|(d, c)| DailyBar::flat(day(d), c, 1.0, 1.0))
            .collect();
        SecurityHistory::new(symbol, symbol, bars)
    }

    fn wave(n: i64, phase: f64) -> Vec<(i64, f64)> {
        (0..n)
            .map(|i| (i, 100.0 + 5.0 * ((i as f64) * 0.7 + phase).sin() + i as f64 * 0.05))
            .collect()
    }

    fn config(lookback: usize, min_observations: usize) -> CorrelationConfig {
        CorrelationConfig {
            lookback,
            min_observations,
        }
    }

    #[test]
    fn test_from_entries_symmetric_with_unit_diagonal() {
        let m = CorrelationMatrix::from_entries(
            &["A", "B", "C"],
            [("A", "B", 0.8), ("C", "A", 1.7)],
        );
        assert_eq!(m.get("A", "A"), Some(1.0));
        assert_eq!(m.get("A", "B"), Some(0.8));
        assert_eq!(m.get("B", "A"), Some(0.8));
        assert_eq!(m.get("A", "C"), Some(1.0));
        assert_eq!(m.get("B", "C"), None);
        assert_eq!(m.get("A", "Z"), None);
        assert_eq!(m.present_pairs(), 2);
    }

    #[test]
    fn test_identical_series_fully_correlated() {
        let builder = CorrelationMatrixBuilder::new(config(120, 60));
        let a = history("A", wave(100, 0.0));
        let b = history("B", wave(100, 0.0));
        let c = history("C", wave(100, 1.3));
        let build = builder.build(&[&a, &b, &c]);

        assert_eq!(build.matrix.len(), 3);
        assert!(build.rejected.is_empty());
        assert!((build.matrix.get("A", "B").unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(build.matrix.get("A", "C"), build.matrix.get("C", "A"));
        assert!(build.matrix.get("A", "C").unwrap() < 0.99);
    }

    #[test]
    fn test_short_and_flat_series_rejected() {
        let builder = CorrelationMatrixBuilder::new(config(120, 60));
        let long = history("LONG", wave(100, 0.0));
        let other = history("OTHER", wave(100, 0.4));
        let short = history("SHORT", wave(100, 0.0).into_iter().skip(70));
        let flat = history("FLAT", (0..100).map(|i| (i, 10.0)));
        let build = builder.build(&[&long, &short, &other, &flat]);

        assert_eq!(build.matrix.symbols(), &["LONG".to_string(), "OTHER".to_string()]);
        assert!(!build.matrix.contains("SHORT"));
        assert_eq!(build.rejected.len(), 2);
        assert_eq!(build.rejected[0].0, "SHORT");
        assert_eq!(build.rejected[0].1.code(), "insufficient_overlap");
        assert_eq!(build.rejected[1].1, ExclusionReason::ZeroVariance);
    }

    #[test]
    fn test_disjoint_pair_is_absent() {
        let builder = CorrelationMatrixBuilder::new(config(200, 60));
        let early = history("EARLY", wave(80, 0.0));
        let late = history("LATE", wave(160, 0.2).into_iter().skip(80));
        let build = builder.build(&[&early, &late]);

        assert_eq!(build.matrix.len(), 2);
        assert_eq!(build.matrix.get("EARLY", "LATE"), None);
        assert_eq!(build.matrix.present_pairs(), 0);
    }

    #[test]
    fn test_window_uses_last_calendar_dates() {
        // B has plenty of bars, all before the window starts.
        let builder = CorrelationMatrixBuilder::new(config(80, 60));
        let a = history("A", wave(200, 0.0));
        let b = history("B", wave(200, 0.0).into_iter().take(120));
        let build = builder.build(&[&a, &b]);
        assert!(build.matrix.contains("A"));
        assert!(!build.matrix.contains("B"));
    }

    #[test]
    fn test_parallel_build_is_deterministic() {
        let builder = CorrelationMatrixBuilder::new(config(120, 60));
        let histories: Vec<SecurityHistory> = (0..12)
            .map(|k| history(&format!("S{:02}", k), wave(130, k as f64 * 0.37)))
            .collect();
        let refs: Vec<&SecurityHistory> = histories.iter().collect();
        let first = builder.build(&refs);
        let second = builder.build(&refs);
        for a in first.matrix.symbols() {
            for b in first.matrix.symbols() {
                assert_eq!(first.matrix.get(a, b), second.matrix.get(a, b));
            }
        }
    }
}
