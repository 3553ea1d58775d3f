//! Async front-end: load a universe from a provider, then select.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{info, warn};

use super::pipeline::SelectionPipeline;
use super::types::{
    DataGapWarning, Exclusion, ExclusionReason, FilterResult, FilterStage, SelectionResult,
};
use crate::config::SelectorConfig;
use crate::data::{HistoryProvider, SecurityHistory, Universe};
use crate::error::{Result, SelectorError};
use crate::industry::IndustryClassifier;

const DEFAULT_CONCURRENCY: usize = 16;

/// Universe assembled from a provider, with the symbols that failed to load.
#[derive(Debug)]
pub struct LoadedUniverse {
    pub universe: Universe,
    /// Symbols listed by the provider
    pub listed: usize,
    pub excluded: Vec<Exclusion>,
    pub warnings: Vec<DataGapWarning>,
}

/// The screener engine.
///
/// Orchestrates one selection run:
/// 1. List the universe and fetch histories (bounded concurrency, input order kept)
/// 2. Fetch the benchmark when configured
/// 3. Fill missing industry labels
/// 4. Run the selection pipeline
pub struct ScreenerEngine<P: HistoryProvider> {
    provider: Arc<P>,
    pipeline: SelectionPipeline,
    classifier: IndustryClassifier,
    concurrency: usize,
}

impl<P: HistoryProvider> ScreenerEngine<P> {
    /// Create an engine; fails when `config` does not validate.
    pub fn new(config: SelectorConfig, provider: Arc<P>) -> Result<Self> {
        let classifier = IndustryClassifier::new(config.industry.clone());
        let pipeline = SelectionPipeline::new(config)?;
        Ok(Self {
            provider,
            pipeline,
            classifier,
            concurrency: DEFAULT_CONCURRENCY,
        })
    }

    /// Maximum in-flight history requests.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn pipeline(&self) -> &SelectionPipeline {
        &self.pipeline
    }

    /// Fetch everything the pipeline needs from the provider.
    pub async fn load_universe(&self) -> Result<LoadedUniverse> {
        let symbols = self
            .provider
            .list_universe()
            .await
            .map_err(|e| SelectorError::Provider(e.to_string()))?;
        let listed = symbols.len();
        info!(provider = self.provider.name(), symbols = listed, "Loading universe");

        let provider = &self.provider;
        let fetched: Vec<_> = stream::iter(symbols)
            .map(|symbol| async move {
                let result = provider.fetch_history(&symbol).await;
                (symbol, result)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut securities: Vec<SecurityHistory> = Vec::with_capacity(fetched.len());
        let mut excluded = Vec::new();
        let mut warnings = Vec::new();

        for (symbol, result) in fetched {
            match result {
                Ok(mut history) => {
                    history.normalize();
                    self.classifier.fill(&mut history);
                    securities.push(history);
                }
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "History unavailable");
                    warnings.push(DataGapWarning::new(&symbol, FilterStage::Load, e.to_string()));
                    excluded.push(Exclusion::new(
                        symbol,
                        FilterStage::Load,
                        ExclusionReason::DataUnavailable {
                            detail: e.to_string(),
                        },
                    ));
                }
            }
        }

        let mut universe = Universe::new(securities);
        if let Some(symbol) = self.pipeline.config().benchmark.as_deref() {
            match self.provider.fetch_benchmark(symbol).await {
                Ok(mut benchmark) => {
                    benchmark.normalize();
                    universe = universe.with_benchmark(benchmark);
                }
                Err(e) => {
                    warn!(benchmark = symbol, error = %e, "Benchmark unavailable");
                    warnings.push(DataGapWarning::new(symbol, FilterStage::Load, e.to_string()));
                }
            }
        }

        info!(
            loaded = universe.len(),
            failed = excluded.len(),
            benchmark = universe.benchmark.is_some(),
            "Universe loaded"
        );

        Ok(LoadedUniverse {
            universe,
            listed,
            excluded,
            warnings,
        })
    }

    /// Load and select.
    pub async fn run(&self) -> Result<SelectionResult> {
        let loaded = self.load_universe().await?;
        let mut result = self.pipeline.run(&loaded.universe)?;

        result.universe_size = loaded.listed;
        result.funnel.insert(
            0,
            FilterResult::new(FilterStage::Load, loaded.listed, loaded.universe.len()),
        );
        result.excluded.splice(0..0, loaded.excluded);
        result.warnings.splice(0..0, loaded.warnings);

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DailyBar, InMemoryProvider};
    use crate::factors::{FactorGroup, Metric, ScoringWeights};
    use chrono::NaiveDate;

    fn history(symbol: &str, name: &str, drift: f64) -> SecurityHistory {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        let bars = (0..200)
            .map(|i| {
                let close = 10.0 * (1.0 + drift).powi(i) + ((i as f64) * 0.9).sin() * 0.1;
                DailyBar::flat(start + chrono::Duration::days(i as i64), close, 1e6, 5e7)
            })
            .collect();
        SecurityHistory::new(symbol, name, bars)
    }

    fn config() -> SelectorConfig {
        let mut config = SelectorConfig::default();
        config.benchmark = None;
        config.weights = ScoringWeights::single(FactorGroup::Return, [(Metric::Momentum60d, 1.0)]);
        config
    }

    #[tokio::test]
    async fn test_engine_reports_unavailable_symbol() {
        let mut provider = InMemoryProvider::new("memory");
        provider.insert(history("A", "半导体ETF", 0.002));
        provider.list_only("MISSING");
        provider.insert(history("B", "黄金ETF", 0.001));

        let engine = ScreenerEngine::new(config(), Arc::new(provider)).unwrap().with_concurrency(2);
        let result = engine.run().await.unwrap();

        assert_eq!(result.universe_size, 3);
        assert_eq!(result.funnel[0].stage, FilterStage::Load);
        assert_eq!(result.funnel[0].passed, 2);
        let missing = result.exclusion_for("MISSING").unwrap();
        assert_eq!(missing.reason.code(), "data_unavailable");
        assert!(!result.selected.is_empty());
        assert!(result.selected.iter().all(|s| s.symbol != "MISSING"));
    }

    #[tokio::test]
    async fn test_engine_fills_industry_labels() {
        let mut provider = InMemoryProvider::new("memory");
        provider.insert(history("A", "半导体ETF", 0.002));
        provider.insert(history("B", "某主题ETF", 0.001));

        let engine = ScreenerEngine::new(config(), Arc::new(provider)).unwrap();
        let loaded = engine.load_universe().await.unwrap();
        let industries: Vec<_> = loaded
            .universe
            .securities
            .iter()
            .map(|h| h.industry.clone().unwrap())
            .collect();
        assert_eq!(industries, vec!["半导体", "unclassified"]);
    }

    #[tokio::test]
    async fn test_engine_requires_listed_benchmark() {
        let mut provider = InMemoryProvider::new("memory");
        provider.insert(history("A", "半导体ETF", 0.002));
        let engine = ScreenerEngine::new(SelectorConfig::default(), Arc::new(provider)).unwrap();
        assert!(matches!(engine.run().await, Err(SelectorError::Config(_))));
    }
}
