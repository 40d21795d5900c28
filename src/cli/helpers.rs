//! Shared helper functions for CLI commands
//!
//! Output plumbing and the tables that more than one command prints.

use console::style;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use tabled::{builder::Builder, settings::Style};

use crate::cli::OutputFormat;
use crate::entities::comparison::{ComparisonReport, Verdict};
use crate::entities::part::PartSpec;
use crate::inspect::ToleranceConfig;

/// Tolerance overrides for commands that evaluate measurements
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ToleranceArgs {
    /// Absolute tolerance in millimeters [config: tolerance.abs_tol_mm]
    #[arg(long = "abs-tol", value_name = "MM")]
    pub abs_tol: Option<f64>,

    /// Relative tolerance in percent [config: tolerance.rel_tol_pct]
    #[arg(long = "rel-tol", value_name = "PCT")]
    pub rel_tol: Option<f64>,
}

impl ToleranceArgs {
    /// Layer the flags over the configured tolerance
    pub fn apply(&self, base: &ToleranceConfig) -> Result<ToleranceConfig> {
        let mut tolerance = *base;
        if let Some(abs) = self.abs_tol {
            tolerance.abs_tol_mm = abs;
        }
        if let Some(rel) = self.rel_tol {
            tolerance.rel_tol_pct = rel;
        }
        for (flag, value) in [
            ("--abs-tol", tolerance.abs_tol_mm),
            ("--rel-tol", tolerance.rel_tol_pct),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(miette::miette!(
                    "{} must be a non-negative number, got {}",
                    flag,
                    value
                ));
            }
        }
        Ok(tolerance)
    }
}

/// Print `value` as JSON or YAML when the format asks for it.
///
/// Returns `false` for formats the caller renders itself.
pub fn print_structured<T: Serialize>(value: &T, format: OutputFormat) -> Result<bool> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value).into_diagnostic()?;
            println!("{}", json);
            Ok(true)
        }
        OutputFormat::Yaml => {
            let yaml = serde_yml::to_string(value).into_diagnostic()?;
            print!("{}", yaml);
            Ok(true)
        }
        OutputFormat::Auto | OutputFormat::Csv => Ok(false),
    }
}

pub fn nominal_table(spec: &PartSpec) -> String {
    let mut builder = Builder::default();
    builder.push_record(["Dimension", "Nominal (mm)"]);
    for (dimension, value) in &spec.dimensions {
        builder.push_record([dimension.as_str().to_string(), format!("{:.3}", value)]);
    }
    builder.build().with(Style::markdown()).to_string()
}

/// Nominal table as `type,value_mm` CSV text
pub fn nominal_csv(spec: &PartSpec) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(["type", "value_mm"]).into_diagnostic()?;
    for (dimension, value) in &spec.dimensions {
        wtr.write_record([dimension.as_str(), value.to_string().as_str()])
            .into_diagnostic()?;
    }
    let bytes = wtr.into_inner().into_diagnostic()?;
    String::from_utf8(bytes).into_diagnostic()
}

/// Per-dimension error statistics of a report
pub fn stats_table(report: &ComparisonReport) -> String {
    let mut builder = Builder::default();
    builder.push_record(["Dimension", "Count", "Mean abs err (mm)", "Max abs err (mm)"]);
    for (dimension, stats) in &report.stats.per_dimension {
        builder.push_record([
            dimension.as_str().to_string(),
            stats.count.to_string(),
            format!("{:.3}", stats.mean_abs_err_mm),
            format!("{:.3}", stats.max_abs_err_mm),
        ]);
    }
    builder.build().with(Style::markdown()).to_string()
}

/// Per-dimension error statistics as CSV text
pub fn stats_csv(report: &ComparisonReport) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(["dimension", "count", "mean_abs_err_mm", "max_abs_err_mm"])
        .into_diagnostic()?;
    for (dimension, stats) in &report.stats.per_dimension {
        wtr.write_record([
            dimension.as_str().to_string(),
            stats.count.to_string(),
            stats.mean_abs_err_mm.to_string(),
            stats.max_abs_err_mm.to_string(),
        ])
        .into_diagnostic()?;
    }
    let bytes = wtr.into_inner().into_diagnostic()?;
    String::from_utf8(bytes).into_diagnostic()
}

/// Colored verdict for status lines
pub fn styled_verdict(verdict: Verdict) -> String {
    match verdict {
        Verdict::NotDefective => style(verdict.as_str()).green().bold().to_string(),
        Verdict::Defective => style(verdict.as_str()).red().bold().to_string(),
    }
}

/// Summary lines printed under the statistics table
pub fn print_report_summary(report: &ComparisonReport) {
    let stats = &report.stats;
    println!();
    println!(
        "{} records: {} not defective, {} defective ({:.1}% pass)",
        style(stats.total).cyan(),
        style(stats.not_defective).green(),
        style(stats.defective).red(),
        stats.pass_rate_pct
    );
    if stats.skipped > 0 {
        println!(
            "{} {} measurement(s) matched no nominal dimension",
            style("!").yellow(),
            stats.skipped
        );
    }
    match report.final_verdict() {
        Some(verdict) => println!("{} {}", style("Final verdict:").bold(), styled_verdict(verdict)),
        None => println!("{}", style("No comparable measurements").dim()),
    }
}
