//! Trend Selector - select a diversified trend portfolio from a universe snapshot.
//!
//! Usage: `trend-selector <universe.json> [--config <selector.json>]`

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use trend_common::logging::init_logging;
use trend_selector::screener::{ReportFormat, ScreenerEngine, SelectionReport};
use trend_selector::{InMemoryProvider, SelectorConfig, UniverseSnapshot};

#[derive(Parser, Debug)]
#[command(name = "trend-selector")]
#[command(author = "theonlyhennygod")]
#[command(version)]
#[command(
    about = "Select a diversified trend portfolio from a universe snapshot",
    long_about = None
)]
struct Args {
    /// Universe snapshot (JSON)
    snapshot: PathBuf,

    /// Selector config file; falls back to `TREND_SELECTOR_CONFIG` or the default path
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = match &args.config {
        Some(path) => SelectorConfig::load_from(path)?,
        None => SelectorConfig::load()?,
    };

    // Initialize logging
    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );

    tracing::info!("Trend Selector v{}", env!("CARGO_PKG_VERSION"));

    let snapshot = UniverseSnapshot::load(&args.snapshot)
        .with_context(|| format!("Failed to load snapshot {}", args.snapshot.display()))?;
    let provider = InMemoryProvider::from_snapshot("snapshot", snapshot);

    let output = config.output.clone();
    let engine = ScreenerEngine::new(config, Arc::new(provider))?;
    let result = engine.run().await?;
    let summary = result.summary();
    let run_id = result.run_id.clone();

    let report = SelectionReport::new(result);
    let report_dir = output.resolved_report_dir();
    for name in &output.report_format {
        let format: ReportFormat = name.parse().map_err(anyhow::Error::msg)?;
        let path = report.save_to_file(&report_dir.join(&run_id), format)?;
        tracing::info!(path = %path.display(), format = %format, "Report saved");
    }

    println!("{}", summary);
    Ok(())
}
