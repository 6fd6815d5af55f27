use crate::types::{
    GateStatus, ImputationOutcome, ImputationReport, PlannedDecision, RunSummary,
};
use anyhow::Result;
use chrono::Local;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

// ============================================================================
// Run Report
// ============================================================================

/// Report file written by the CLI.
///
/// Wraps the [`ImputationReport`] with run metadata. The report fields are
/// flattened, so the file is a superset of the report JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Timestamp when the report was generated
    pub generated_at: String,
    pub input_file: String,
    /// Path to the imputed table, if one was written
    pub output_file: Option<String>,
    pub summary: RunSummary,
    #[serde(flatten)]
    pub report: ImputationReport,
}

/// Writes imputed tables and reports, and renders console summaries.
pub struct ReportGenerator {
    output_dir: PathBuf,
    output_name: Option<String>,
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./outputs"),
            output_name: None,
        }
    }
}

impl ReportGenerator {
    /// Create a new ReportGenerator with custom output settings.
    pub fn new(output_dir: PathBuf, output_name: Option<String>) -> Self {
        Self {
            output_dir,
            output_name,
        }
    }

    /// Path the imputed table is written to for an input named `input_stem`.
    pub fn table_path(&self, input_stem: &str) -> PathBuf {
        let file_name = self
            .output_name
            .clone()
            .unwrap_or_else(|| format!("{}_imputed", input_stem));
        self.output_dir.join(format!("{}.csv", file_name))
    }

    /// Write the imputed table as CSV.
    pub fn write_table(&self, df: &mut DataFrame, input_stem: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;
        let output_path = self.table_path(input_stem);
        let mut file = File::create(&output_path)?;

        CsvWriter::new(&mut file)
            .include_header(true)
            .with_separator(b',')
            .with_quote_char(b'"')
            .finish(df)?;

        info!("Dataset saved: {}", output_path.display());
        Ok(output_path)
    }

    /// Build the report file contents for a finished run.
    pub fn build_run_report(
        input_file: &str,
        output_file: Option<&str>,
        outcome: &ImputationOutcome,
    ) -> RunReport {
        RunReport {
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            input_file: input_file.to_string(),
            output_file: output_file.map(String::from),
            summary: outcome.summary.clone(),
            report: outcome.report.clone(),
        }
    }

    /// Write a run report as `<base>_imputation_report.json`.
    pub fn write_report_to_file(&self, report: &RunReport, report_base_name: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;

        let report_path = self
            .output_dir
            .join(format!("{}_imputation_report.json", report_base_name));
        let mut file = File::create(&report_path)?;
        file.write_all(serde_json::to_string_pretty(report)?.as_bytes())?;

        info!("Report saved: {}", report_path.display());
        Ok(report_path)
    }

    /// Human-readable summary of a finished run.
    pub fn render_summary(report: &RunReport) -> String {
        report.to_string()
    }

    /// Table of planned decisions for dry runs.
    pub fn render_plan(plan: &[PlannedDecision]) -> String {
        PlanTable(plan).to_string()
    }
}

/// The human-readable summary the CLI prints.
impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = &self.summary;
        let result = &self.report;

        writeln!(f)?;
        writeln!(f, "{}", "=".repeat(80))?;
        writeln!(f, "IMPUTATION COMPLETE - STATUS {}", result.status)?;
        writeln!(f, "{}", "=".repeat(80))?;
        writeln!(f)?;

        writeln!(
            f,
            "Input:  {} ({} rows x {} columns)",
            self.input_file, summary.rows, summary.columns_before
        )?;
        if let Some(ref output_file) = self.output_file {
            writeln!(
                f,
                "Output: {} ({} rows x {} columns)",
                output_file, summary.rows, summary.columns_after
            )?;
        }
        writeln!(f)?;

        writeln!(f, "Run Summary:")?;
        writeln!(f, "  Duration: {}ms", summary.duration_ms)?;
        writeln!(
            f,
            "  Completeness: {:.1}% -> {:.1}%",
            summary.completeness_before * 100.0,
            summary.completeness_after * 100.0
        )?;
        writeln!(f, "  Cells imputed: {}", summary.imputed_cells)?;
        writeln!(f)?;

        if !result.decisions.is_empty() {
            writeln!(f, "Decisions:")?;
            writeln!(
                f,
                "  {:<20} {:<14} {:>8} {:>8}  Reason",
                "Column", "Method", "Before", "After"
            )?;
            for decision in &result.decisions {
                writeln!(
                    f,
                    "  {:<20} {:<14} {:>8} {:>8}  {}",
                    truncate_str(&decision.column, 19),
                    decision.method.as_str(),
                    decision.missing_before,
                    decision.missing_after,
                    decision.reason
                )?;
            }
            writeln!(f)?;
        }

        if !result.validation.is_empty() {
            writeln!(f, "Validation:")?;
            for (column, metric) in &result.validation {
                writeln!(
                    f,
                    "  {:<20} PSI={:.4}  KS={:.4}  {}",
                    truncate_str(column, 19),
                    metric.psi,
                    metric.ks_statistic,
                    if metric.passed { "ok" } else { "FAILED" }
                )?;
            }
            writeln!(f)?;
        }

        if !result.warnings.is_empty() {
            writeln!(f, "Warnings:")?;
            for warning in &result.warnings {
                writeln!(f, "  - {}", warning)?;
            }
            writeln!(f)?;
        }

        let verdict = match result.status {
            GateStatus::Pass => "All checks passed.",
            GateStatus::Warn => "Some columns drifted; review before use.",
            GateStatus::Stop => "Quality gate recommends stopping; see warnings.",
        };
        writeln!(f, "{}", verdict)?;
        writeln!(f, "{}", "=".repeat(80))?;
        Ok(())
    }
}

/// Dry-run table of planned decisions.
struct PlanTable<'a>(&'a [PlannedDecision]);

impl fmt::Display for PlanTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            writeln!(f, "  No columns with missing values")?;
            return Ok(());
        }

        writeln!(
            f,
            "{:<20} {:<12} {:>8} {:>10}  {:<14} Reason",
            "Column", "Type", "Missing", "Missing %", "Method"
        )?;
        writeln!(f, "{}", "-".repeat(80))?;
        for planned in self.0 {
            writeln!(
                f,
                "{:<20} {:<12} {:>8} {:>10.1}  {:<14} {}",
                truncate_str(&planned.column, 19),
                planned.logical_type.as_str(),
                planned.missing_count,
                planned.missing_ratio * 100.0,
                planned.method.as_str(),
                planned.reason
            )?;
        }
        Ok(())
    }
}

/// Truncate a string to max length with ellipsis
fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
