//! History provider abstraction.
//!
//! Defines the `HistoryProvider` trait the screener engine pulls data from.
//! Real providers (databases, vendor APIs) live outside this crate; the
//! in-memory implementation backs tests and snapshot-driven runs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use super::{SecurityHistory, Universe};

// ============================================================================
// Provider Error
// ============================================================================

/// Errors specific to history providers.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Data not available for the requested symbol
    DataNotAvailable(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DataNotAvailable(msg) => write!(f, "Data not available: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

// ============================================================================
// History Provider Trait
// ============================================================================

/// Source of pre-loaded daily histories.
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    /// Provider name, used in logs.
    fn name(&self) -> &str;

    /// Symbols of the screening universe, in a stable order.
    async fn list_universe(&self) -> Result<Vec<String>, ProviderError>;

    /// Full daily history for one symbol.
    async fn fetch_history(&self, symbol: &str) -> Result<SecurityHistory, ProviderError>;

    /// Benchmark history. Defaults to the regular history lookup.
    async fn fetch_benchmark(&self, symbol: &str) -> Result<SecurityHistory, ProviderError> {
        self.fetch_history(symbol).await
    }
}

// ============================================================================
// Snapshot / In-Memory Provider
// ============================================================================

/// Serialized universe snapshot (what a data-access job exports).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UniverseSnapshot {
    #[serde(default)]
    pub benchmark: Option<SecurityHistory>,
    #[serde(default)]
    pub securities: Vec<SecurityHistory>,
}

impl UniverseSnapshot {
    /// Read a snapshot from a JSON file.
    pub fn load(path: &Path) -> trend_common::Result<Self> {
        let mut snapshot: Self = trend_common::config::load_json(path)?;
        for security in &mut snapshot.securities {
            security.normalize();
        }
        if let Some(benchmark) = snapshot.benchmark.as_mut() {
            benchmark.normalize();
        }
        Ok(snapshot)
    }

    /// Convert into a run universe.
    pub fn into_universe(self) -> Universe {
        Universe {
            securities: self.securities,
            benchmark: self.benchmark,
        }
    }
}

/// Provider serving histories from memory.
pub struct InMemoryProvider {
    name: String,
    order: Vec<String>,
    histories: BTreeMap<String, SecurityHistory>,
    benchmarks: BTreeMap<String, SecurityHistory>,
}

impl InMemoryProvider {
    /// Create an empty provider.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            order: Vec::new(),
            histories: BTreeMap::new(),
            benchmarks: BTreeMap::new(),
        }
    }

    /// Build from a snapshot; the benchmark is served under its own symbol.
    pub fn from_snapshot(name: impl Into<String>, snapshot: UniverseSnapshot) -> Self {
        let mut provider = Self::new(name);
        for security in snapshot.securities {
            provider.insert(security);
        }
        if let Some(benchmark) = snapshot.benchmark {
            provider.insert_benchmark(benchmark);
        }
        provider
    }

    /// Add a security to the universe.
    pub fn insert(&mut self, history: SecurityHistory) {
        if !self.histories.contains_key(&history.symbol) {
            self.order.push(history.symbol.clone());
        }
        self.histories.insert(history.symbol.clone(), history);
    }

    /// List a symbol in the universe without any history behind it.
    pub fn list_only(&mut self, symbol: impl Into<String>) {
        let symbol = symbol.into();
        if !self.order.contains(&symbol) {
            self.order.push(symbol);
        }
    }

    /// Add a benchmark series.
    pub fn insert_benchmark(&mut self, history: SecurityHistory) {
        self.benchmarks.insert(history.symbol.clone(), history);
    }
}

#[async_trait]
impl HistoryProvider for InMemoryProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_universe(&self) -> Result<Vec<String>, ProviderError> {
        Ok(self.order.clone())
    }

    async fn fetch_history(&self, symbol: &str) -> Result<SecurityHistory, ProviderError> {
        self.histories
            .get(symbol)
            .cloned()
            .ok_or_else(|| ProviderError::DataNotAvailable(symbol.to_string()))
    }

    async fn fetch_benchmark(&self, symbol: &str) -> Result<SecurityHistory, ProviderError> {
        self.benchmarks
            .get(symbol)
            .or_else(|| self.histories.get(symbol))
            .cloned()
            .ok_or_else(|| ProviderError::DataNotAvailable(format!("benchmark {}", symbol)))
    }
}
