//! Small numeric helpers shared by the indicator and correlation code.
//!
//! Thin wrappers over `statrs` that turn undefined results (empty input,
//! zero variance, non-finite values) into `None`.

use statrs::statistics::Statistics;

/// Arithmetic mean, `None` for empty input.
pub fn mean(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() {
        return None;
    }
    finite(xs.iter().mean())
}

/// Sample standard deviation (n - 1), `None` below two observations.
pub fn std_dev(xs: &[f64]) -> Option<f64> {
    if xs.len() < 2 {
        return None;
    }
    finite(xs.iter().std_dev())
}

/// Pearson correlation of two equally long samples.
///
/// Returns `None` when either side is constant or the lengths differ.
/// The result is clamped to `[-1, 1]` to absorb rounding noise.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let sx = std_dev(xs)?;
    let sy = std_dev(ys)?;
    if sx <= f64::EPSILON || sy <= f64::EPSILON {
        return None;
    }
    let cov = finite(xs.iter().covariance(ys.iter()))?;
    Some((cov / (sx * sy)).clamp(-1.0, 1.0))
}

/// Simple returns of consecutive prices. Non-positive bases are skipped.
pub fn simple_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .filter(|r| r.is_finite())
        .collect()
}

fn finite(x: f64) -> Option<f64> {
    x.is_finite().then_some(x)
}
