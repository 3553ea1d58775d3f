//! Selector configuration.
//!
//! Loaded from `~/.codecoder/selector.json` (or the path in
//! `TREND_SELECTOR_CONFIG`), then overridden by `TREND_SELECTOR_*`
//! environment variables, then validated.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use trend_common::config::{config_dir, env_value, load_json_or_default};
use trend_common::validation::{check_non_zero, check_range, combine};
use trend_common::{ObservabilityConfig, Validate, ValidationError, ValidationResult};

use crate::factors::ScoringWeights;
use crate::industry::IndustryKeywordMap;

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "TREND_SELECTOR_CONFIG";

const ENV_PREFIX: &str = "TREND_SELECTOR";

// ============================================================================
// Main Selector Configuration
// ============================================================================

/// Configuration for one selection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Benchmark symbol for excess-return metrics
    #[serde(default = "default_benchmark")]
    pub benchmark: Option<String>,

    /// Stage 1 thresholds
    #[serde(default)]
    pub liquidity: LiquidityConfig,

    /// Indicator windows
    #[serde(default)]
    pub indicators: IndicatorConfig,

    /// Hierarchical scoring weights
    #[serde(default)]
    pub weights: ScoringWeights,

    /// Correlation matrix settings
    #[serde(default)]
    pub correlation: CorrelationConfig,

    /// Deduplication and portfolio construction
    #[serde(default)]
    pub diversification: DiversificationConfig,

    /// Keyword table used to fill missing industry labels
    #[serde(default)]
    pub industry: IndustryKeywordMap,

    #[serde(default)]
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            benchmark: default_benchmark(),
            liquidity: LiquidityConfig::default(),
            indicators: IndicatorConfig::default(),
            weights: ScoringWeights::default(),
            correlation: CorrelationConfig::default(),
            diversification: DiversificationConfig::default(),
            industry: IndustryKeywordMap::default(),
            observability: ObservabilityConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

fn default_benchmark() -> Option<String> {
    Some("000300.SH".to_string())
}

impl SelectorConfig {
    /// Default config file location.
    pub fn default_path() -> PathBuf {
        config_dir().join("selector.json")
    }

    /// Load from the configured path, apply env overrides, validate.
    pub fn load() -> anyhow::Result<Self> {
        let path = match std::env::var(CONFIG_PATH_ENV) {
            Ok(p) if !p.trim().is_empty() => PathBuf::from(p),
            _ => Self::default_path(),
        };
        Self::load_from(&path)
    }

    /// Load from `path` (defaults when absent), apply env overrides, validate.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let mut config: Self = load_json_or_default(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `TREND_SELECTOR_*` overrides.
    pub fn apply_env_overrides(&mut self) -> trend_common::Result<()> {
        let var = |name: &str| format!("{}_{}", ENV_PREFIX, name);

        if let Some(v) = env_value::<usize>(&var("TARGET_SIZE"))? {
            self.diversification.target_size = v;
        }
        if let Some(v) = env_value::<f64>(&var("MAX_CORRELATION"))? {
            self.diversification.max_correlation = v;
        }
        if let Some(v) = env_value::<bool>(&var("DIVERSIFY_V2"))? {
            self.diversification.diversify_v2 = v;
        }
        if let Some(v) = env_value::<bool>(&var("BALANCE_INDUSTRIES"))? {
            self.diversification.balance_industries = v;
        }
        if let Some(v) = env_value::<String>(&var("BENCHMARK"))? {
            self.benchmark = if v.is_empty() { None } else { Some(v) };
        }
        if let Some(v) = env_value::<String>(&var("LOG_LEVEL"))? {
            self.observability.log_level = v;
        }
        Ok(())
    }

    /// Whether any enabled metric needs a benchmark series.
    pub fn requires_benchmark(&self) -> bool {
        self.weights.requires_benchmark()
    }
}

impl Validate for SelectorConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();
        let sections: [ValidationResult<()>; 5] = [
            self.liquidity.validate(),
            self.indicators.validate(),
            self.weights.validate(),
            self.correlation.validate(),
            self.diversification.validate(),
        ];
        for result in sections {
            match result {
                Ok(()) => {}
                Err(ValidationError::Multiple(inner)) => errors.extend(inner),
                Err(e) => errors.push(e),
            }
        }

        if self.requires_benchmark() && self.benchmark.as_deref().map_or(true, str::is_empty) {
            errors.push(ValidationError::MissingField {
                field: "benchmark".into(),
            });
        }

        combine(errors)
    }
}

// ============================================================================
// Liquidity Configuration
// ============================================================================

/// Stage 1 gate thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityConfig {
    /// Minimum number of bars
    #[serde(default = "default_min_history_days")]
    pub min_history_days: usize,

    /// Minimum calendar days between listing and the last bar
    #[serde(default = "default_min_listing_days")]
    pub min_listing_days: i64,

    /// Minimum mean daily turnover (currency)
    #[serde(default = "default_min_avg_turnover")]
    pub min_avg_turnover: f64,

    /// Bars averaged for the turnover check
    #[serde(default = "default_turnover_window")]
    pub turnover_window: usize,
}

impl Default for LiquidityConfig {
    fn default() -> Self {
        Self {
            min_history_days: default_min_history_days(),
            min_listing_days: default_min_listing_days(),
            min_avg_turnover: default_min_avg_turnover(),
            turnover_window: default_turnover_window(),
        }
    }
}

fn default_min_history_days() -> usize {
    60
}

fn default_min_listing_days() -> i64 {
    120
}

fn default_min_avg_turnover() -> f64 {
    10_000_000.0
}

fn default_turnover_window() -> usize {
    20
}

impl Validate for LiquidityConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();
        if let Err(e) = check_non_zero("liquidity.turnover_window", self.turnover_window) {
            errors.push(e);
        }
        if self.min_listing_days < 0 {
            errors.push(ValidationError::InvalidValue {
                field: "liquidity.min_listing_days".into(),
                reason: "must not be negative".into(),
            });
        }
        if !(self.min_avg_turnover.is_finite() && self.min_avg_turnover >= 0.0) {
            errors.push(ValidationError::InvalidValue {
                field: "liquidity.min_avg_turnover".into(),
                reason: "must be a finite non-negative amount".into(),
            });
        }
        combine(errors)
    }
}

// ============================================================================
// Indicator Configuration
// ============================================================================

/// Trailing windows for per-candidate metrics, in bars.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorConfig {
    #[serde(default = "default_window")]
    pub window: usize,

    #[serde(default = "default_adx_period")]
    pub adx_period: usize,

    #[serde(default = "default_sixty")]
    pub trend_min_bars: usize,

    #[serde(default = "default_sixty")]
    pub risk_adjusted_min_bars: usize,

    #[serde(default = "default_twenty")]
    pub liquidity_window: usize,

    #[serde(default = "default_sixty")]
    pub efficiency_window: usize,

    #[serde(default = "default_twenty")]
    pub volume_short: usize,

    #[serde(default = "default_sixty")]
    pub volume_long: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            adx_period: default_adx_period(),
            trend_min_bars: default_sixty(),
            risk_adjusted_min_bars: default_sixty(),
            liquidity_window: default_twenty(),
            efficiency_window: default_sixty(),
            volume_short: default_twenty(),
            volume_long: default_sixty(),
        }
    }
}

fn default_window() -> usize {
    250
}

fn default_adx_period() -> usize {
    14
}

fn default_twenty() -> usize {
    20
}

fn default_sixty() -> usize {
    60
}

impl Validate for IndicatorConfig {
    fn validate(&self) -> ValidationResult<()> {
        let checks = [
            ("indicators.window", self.window),
            ("indicators.adx_period", self.adx_period),
            ("indicators.trend_min_bars", self.trend_min_bars),
            ("indicators.risk_adjusted_min_bars", self.risk_adjusted_min_bars),
            ("indicators.liquidity_window", self.liquidity_window),
            ("indicators.efficiency_window", self.efficiency_window),
            ("indicators.volume_short", self.volume_short),
            ("indicators.volume_long", self.volume_long),
        ];
        let mut errors: Vec<ValidationError> = checks
            .iter()
            .filter_map(|(field, value)| check_non_zero(field, *value).err())
            .collect();

        if self.volume_short > self.volume_long {
            errors.push(ValidationError::Conflict {
                reason: format!(
                    "indicators.volume_short ({}) exceeds indicators.volume_long ({})",
                    self.volume_short, self.volume_long
                ),
            });
        }
        combine(errors)
    }
}

// ============================================================================
// Correlation Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationConfig {
    /// Trailing calendar dates in the correlation window
    #[serde(default = "default_lookback")]
    pub lookback: usize,

    /// Minimum joint returns for a pair (and per-member returns)
    #[serde(default = "default_min_observations")]
    pub min_observations: usize,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            lookback: default_lookback(),
            min_observations: default_min_observations(),
        }
    }
}

fn default_lookback() -> usize {
    120
}

fn default_min_observations() -> usize {
    60
}

impl Validate for CorrelationConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();
        if self.min_observations < 2 {
            errors.push(ValidationError::InvalidValue {
                field: "correlation.min_observations".into(),
                reason: "at least 2 observations are needed".into(),
            });
        }
        if self.min_observations >= self.lookback {
            errors.push(ValidationError::Conflict {
                reason: format!(
                    "correlation.min_observations ({}) must be below correlation.lookback ({})",
                    self.min_observations, self.lookback
                ),
            });
        }
        combine(errors)
    }
}

// ============================================================================
// Diversification Configuration
// ============================================================================

/// Deduplication cascade and greedy construction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiversificationConfig {
    /// Maximum portfolio size
    #[serde(default = "default_target_size")]
    pub target_size: usize,

    /// Acceptance limit for the correlation criterion
    #[serde(default = "default_max_correlation")]
    pub max_correlation: f64,

    /// Dedup thresholds tried in order (non-increasing)
    #[serde(default = "default_dedup_thresholds")]
    pub dedup_thresholds: Vec<f64>,

    /// Fraction of the pool a threshold must retain
    #[serde(default = "default_dedup_min_ratio")]
    pub dedup_min_ratio: f64,

    /// Relative quality gap that counts as decisive (V2)
    #[serde(default = "default_score_diff_threshold")]
    pub score_diff_threshold: f64,

    /// Score-first tie-break and max-pairwise criterion
    #[serde(default = "default_diversify_v2")]
    pub diversify_v2: bool,

    /// Run the post-selection industry balancer
    #[serde(default)]
    pub balance_industries: bool,
}

impl Default for DiversificationConfig {
    fn default() -> Self {
        Self {
            target_size: default_target_size(),
            max_correlation: default_max_correlation(),
            dedup_thresholds: default_dedup_thresholds(),
            dedup_min_ratio: default_dedup_min_ratio(),
            score_diff_threshold: default_score_diff_threshold(),
            diversify_v2: default_diversify_v2(),
            balance_industries: false,
        }
    }
}

fn default_target_size() -> usize {
    20
}

fn default_max_correlation() -> f64 {
    0.7
}

fn default_dedup_thresholds() -> Vec<f64> {
    vec![0.98, 0.95, 0.92, 0.90]
}

fn default_dedup_min_ratio() -> f64 {
    0.5
}

fn default_score_diff_threshold() -> f64 {
    0.05
}

fn default_diversify_v2() -> bool {
    true
}

impl Validate for DiversificationConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = check_non_zero("diversification.target_size", self.target_size) {
            errors.push(e);
        }
        if let Err(e) = check_range(
            "diversification.max_correlation",
            self.max_correlation,
            0.0,
            1.0,
        ) {
            errors.push(e);
        }
        for (i, t) in self.dedup_thresholds.iter().enumerate() {
            let field = format!("diversification.dedup_thresholds[{}]", i);
            if let Err(e) = check_range(&field, *t, 0.0, 1.0) {
                errors.push(e);
            }
        }
        if self.dedup_thresholds.windows(2).any(|w| w[1] > w[0]) {
            errors.push(ValidationError::InvalidValue {
                field: "diversification.dedup_thresholds".into(),
                reason: "thresholds must be non-increasing".into(),
            });
        }
        let ratio = self.dedup_min_ratio;
        if !(ratio.is_finite() && ratio > 0.0 && ratio <= 1.0) {
            errors.push(ValidationError::OutOfRange {
                field: "diversification.dedup_min_ratio".into(),
                value: self.dedup_min_ratio,
                min: 0.0,
                max: 1.0,
            });
        }
        if !(self.score_diff_threshold.is_finite() && self.score_diff_threshold >= 0.0) {
            errors.push(ValidationError::InvalidValue {
                field: "diversification.score_diff_threshold".into(),
                reason: "must be a finite non-negative ratio".into(),
            });
        }

        combine(errors)
    }
}

// ============================================================================
// Output Configuration
// ============================================================================

/// Report output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for saved reports (defaults to `~/.codecoder/reports/selector`)
    #[serde(default)]
    pub report_dir: Option<PathBuf>,

    /// Formats to write (markdown, json)
    #[serde(default = "default_report_format")]
    pub report_format: Vec<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            report_dir: None,
            report_format: default_report_format(),
        }
    }
}

fn default_report_format() -> Vec<String> {
    vec!["markdown".to_string(), "json".to_string()]
}

impl OutputConfig {
    pub fn resolved_report_dir(&self) -> PathBuf {
        self.report_dir
            .clone()
            .unwrap_or_else(|| config_dir().join("reports").join("selector"))
    }
}
