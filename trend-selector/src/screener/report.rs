//! Report generation for selection results.
//!
//! Generates reports in two formats:
//! - Markdown (for review)
//! - JSON (for programmatic use)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::types::SelectionResult;
use crate::factors::Metric;

// ============================================================================
// Report Format
// ============================================================================

/// Supported report formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    /// Markdown format (human-readable)
    Markdown,
    /// JSON format (machine-readable)
    Json,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Json => "json",
        }
    }
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Markdown => write!(f, "markdown"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown report format: {}", s)),
        }
    }
}

// ============================================================================
// Selection Report
// ============================================================================

/// Report generator for selection results.
pub struct SelectionReport {
    result: SelectionResult,
}

impl SelectionReport {
    pub fn new(result: SelectionResult) -> Self {
        Self { result }
    }

    /// Generate report in the specified format.
    pub fn generate(&self, format: ReportFormat) -> String {
        match format {
            ReportFormat::Markdown => self.to_markdown(),
            ReportFormat::Json => self.to_json(),
        }
    }

    /// Save report to file. A missing extension is filled in from `format`.
    pub fn save_to_file(&self, path: &Path, format: ReportFormat) -> Result<PathBuf> {
        let content = self.generate(format);

        let file_path = if path.extension().is_none() {
            path.with_extension(format.extension())
        } else {
            path.to_path_buf()
        };

        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create report directory")?;
        }

        std::fs::write(&file_path, content).context("Failed to write report file")?;

        Ok(file_path)
    }

    /// Generate markdown report.
    pub fn to_markdown(&self) -> String {
        let r = &self.result;
        let mut md = String::new();

        md.push_str(&format!(
            "# 趋势组合筛选报告\n\n**运行ID**: {}\n**数据截止**: {}\n**策略**: {}\n\n",
            r.run_id,
            r.as_of.map_or_else(|| "-".to_string(), |d| d.format("%Y-%m-%d").to_string()),
            r.policy
        ));

        md.push_str("## 筛选摘要\n\n");
        md.push_str(&format!("- **候选总数**: {}\n", r.universe_size));
        md.push_str(&format!("- **最终入选**: {}\n", r.selected.len()));
        match r.dedup_threshold_used {
            Some(t) => md.push_str(&format!("- **去重阈值**: {:.2}\n", t)),
            None => md.push_str("- **去重阈值**: -\n"),
        }
        if r.fallback_used {
            md.push_str("- **降级**: 相关性矩阵为空，按排名取前N\n");
        }
        md.push('\n');

        md.push_str("### 筛选漏斗\n\n");
        md.push_str("| 阶段 | 输入 | 通过 | 淘汰 | 淘汰率 |\n");
        md.push_str("|------|------|------|------|--------|\n");
        for fr in &r.funnel {
            md.push_str(&format!(
                "| {} | {} | {} | {} | {:.1}% |\n",
                fr.stage, fr.input, fr.passed, fr.eliminated, fr.elimination_rate
            ));
        }
        md.push('\n');

        md.push_str("## 入选组合\n\n");
        md.push_str("| 排名 | 代码 | 名称 | 行业 | 得分 | 收益回撤比 | 主要因子 |\n");
        md.push_str("|------|------|------|------|------|------------|----------|\n");
        for s in &r.selected {
            md.push_str(&format!(
                "| {} | {} | {} | {} | {:.3} | {} | {} |\n",
                s.rank,
                s.symbol,
                s.display_name,
                s.industry,
                s.final_score,
                s.return_dd_ratio.map_or_else(|| "-".to_string(), |v| format!("{:.2}", v)),
                top_components(&s.normalized, 3),
            ));
        }
        md.push('\n');

        if !r.swaps.is_empty() {
            md.push_str("## 行业平衡\n\n");
            md.push_str("| 移出 | 行业 | 移入 | 行业 |\n");
            md.push_str("|------|------|------|------|\n");
            for swap in &r.swaps {
                md.push_str(&format!(
                    "| {} | {} | {} | {} |\n",
                    swap.removed, swap.removed_industry, swap.added, swap.added_industry
                ));
            }
            md.push('\n');
        }

        if !r.excluded.is_empty() {
            md.push_str("## 淘汰明细\n\n");
            md.push_str("| 代码 | 阶段 | 原因 |\n");
            md.push_str("|------|------|------|\n");
            for e in &r.excluded {
                md.push_str(&format!("| {} | {} | {} |\n", e.symbol, e.stage, e.reason));
            }
            md.push('\n');
        }

        if !r.warnings.is_empty() {
            md.push_str("## 数据缺口\n\n");
            for w in &r.warnings {
                md.push_str(&format!("- `{}` [{}] {}\n", w.symbol, w.stage, w.detail));
            }
            md.push('\n');
        }

        md
    }

    /// Generate JSON report.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self.result).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn result(&self) -> &SelectionResult {
        &self.result
    }
}

/// Highest normalised components as `metric=value`, strongest first.
fn top_components(normalized: &std::collections::BTreeMap<Metric, f64>, n: usize) -> String {
    let mut items: Vec<(&Metric, &f64)> = normalized.iter().collect();
    items.sort_by(|a, b| b.1.total_cmp(a.1));
    let parts: Vec<String> = items
        .into_iter()
        .take(n)
        .map(|(m, v)| format!("{}={:.2}", m, v))
        .collect();
    if parts.is_empty() {
        "-".to_string()
    } else {
        parts.join(", ")
    }
}

// ============================================================================
// Tests
// ============================================================================
