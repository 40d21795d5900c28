//! `dimspect run` command - extract, inspect and compare in one go
//!
//! The nominal table, measurement log and report land at the configured
//! output paths, so each stage can be re-run on its own afterwards.

use miette::Result;
use std::path::PathBuf;

use crate::cli::commands::compare::{check_verdict, compare_files, print_report};
use crate::cli::commands::extract::extract;
use crate::cli::commands::inspect::{run_session, SessionArgs};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::Config;

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// CAD drawing (.dxf)
    pub cad: PathBuf,

    #[command(flatten)]
    pub session: SessionArgs,

    /// Comparison report to write [config: outputs.report]
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Exit with an error when the final verdict is DEFECTIVE
    #[arg(long)]
    pub fail_on_defect: bool,
}

pub fn run(args: RunArgs, global: &GlobalOpts) -> Result<()> {
    let config = Config::load()?;
    let spec = extract(&args.cad, Some(config.outputs.nominal.as_path()), global)?;

    let summary = run_session(spec.clone(), &args.session, &config, global)?;
    tracing::info!(
        measurements = summary.stats.measurements,
        "inspection finished"
    );

    let tolerance = args.session.tolerance.apply(&config.tolerance)?;
    let measurements = args
        .session
        .measurements
        .clone()
        .unwrap_or_else(|| config.outputs.measurements.clone());
    let output = args.output.unwrap_or_else(|| config.outputs.report.clone());
    let report = compare_files(&spec, &measurements, &output, &tolerance, global)?;

    if global.format == OutputFormat::Auto && !global.quiet && summary.stats.dropped_frames > 0 {
        println!("{} frame(s) dropped by the live loop", summary.stats.dropped_frames);
    }
    print_report(&report, global)?;
    check_verdict(&report, args.fail_on_defect)
}
