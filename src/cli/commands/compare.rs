//! `dimspect compare` command - measurement log against the nominal table

use console::style;
use miette::Result;
use std::path::{Path, PathBuf};

use crate::cli::helpers::{print_report_summary, print_structured, stats_csv, stats_table, ToleranceArgs};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::Config;
use crate::entities::comparison::ComparisonReport;
use crate::entities::part::PartSpec;
use crate::inspect::{compare_log, ToleranceConfig};
use crate::store::{read_measurements, read_nominal, write_report};

#[derive(clap::Args, Debug)]
pub struct CompareArgs {
    /// Nominal table [config: outputs.nominal]
    #[arg(long)]
    pub nominal: Option<PathBuf>,

    /// Measurement log [config: outputs.measurements]
    #[arg(long)]
    pub measurements: Option<PathBuf>,

    /// Comparison report to write [config: outputs.report]
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub tolerance: ToleranceArgs,

    /// Exit with an error when the final verdict is DEFECTIVE
    #[arg(long)]
    pub fail_on_defect: bool,
}

pub fn run(args: CompareArgs, global: &GlobalOpts) -> Result<()> {
    let config = Config::load()?;
    let tolerance = args.tolerance.apply(&config.tolerance)?;
    let nominal = args.nominal.unwrap_or(config.outputs.nominal);
    let measurements = args.measurements.unwrap_or(config.outputs.measurements);
    let output = args.output.unwrap_or(config.outputs.report);

    let spec = read_nominal(&nominal)?;
    let report = compare_files(&spec, &measurements, &output, &tolerance, global)?;
    print_report(&report, global)?;
    check_verdict(&report, args.fail_on_defect)
}

/// Compare the log at `measurements` against `spec` and write the report
pub(crate) fn compare_files(
    spec: &PartSpec,
    measurements: &Path,
    output: &Path,
    tolerance: &ToleranceConfig,
    global: &GlobalOpts,
) -> Result<ComparisonReport> {
    let rows = read_measurements(measurements)?;
    let report = compare_log(&rows, spec, tolerance);
    write_report(output, &report)?;

    if global.format == OutputFormat::Auto && !global.quiet {
        println!(
            "{} Compared {} measurement(s), report written to {}",
            style("✓").green(),
            rows.len(),
            style(output.display()).cyan()
        );
    }
    Ok(report)
}

pub(crate) fn print_report(report: &ComparisonReport, global: &GlobalOpts) -> Result<()> {
    if print_structured(report, global.format)? {
        return Ok(());
    }
    if global.format == OutputFormat::Csv {
        print!("{}", stats_csv(report)?);
        return Ok(());
    }
    if global.quiet {
        return Ok(());
    }
    if !report.records.is_empty() {
        println!();
        println!("{}", stats_table(report));
    }
    print_report_summary(report);
    Ok(())
}

pub(crate) fn check_verdict(report: &ComparisonReport, fail_on_defect: bool) -> Result<()> {
    match report.final_verdict() {
        Some(verdict) if fail_on_defect && verdict.is_defective() => {
            Err(miette::miette!("Final verdict is {}", verdict))
        }
        _ => Ok(()),
    }
}
