//! `dimspect inspect` command - run an inspection session over a frame stream

use console::style;
use miette::Result;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::cad::parse_cad;
use crate::cli::helpers::{
    print_report_summary, print_structured, stats_csv, stats_table, styled_verdict, ToleranceArgs,
};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::{CalibrationAnchor, Config};
use crate::entities::measurement::Measurement;
use crate::entities::part::{PartSpec, PartType};
use crate::inspect::{FrameOutcome, FrameReader, InspectionSession, RunOptions, SessionSummary};
use crate::store::{read_nominal, LiveStatus, MeasurementLog};

#[derive(clap::Args, Debug)]
pub struct InspectArgs {
    /// Nominal from a CAD drawing instead of a nominal table
    #[arg(long, conflicts_with = "nominal")]
    pub cad: Option<PathBuf>,

    /// Nominal table [config: outputs.nominal]
    #[arg(long)]
    pub nominal: Option<PathBuf>,

    /// Override the part type inferred from the nominal table
    #[arg(long, value_name = "TYPE")]
    pub part_type: Option<PartType>,

    #[command(flatten)]
    pub session: SessionArgs,
}

/// Session options shared with `dimspect run`
#[derive(clap::Args, Debug, Clone)]
pub struct SessionArgs {
    /// Frame stream, one JSON frame per line
    #[arg(long, value_name = "JSONL")]
    pub frames: PathBuf,

    /// Feed frames through a producer thread; frames the loop misses are dropped
    #[arg(long)]
    pub live: bool,

    /// Stop after this many seconds of wall-clock time
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Stop after this many frames
    #[arg(long, value_name = "N")]
    pub max_frames: Option<usize>,

    /// Live mode: pause between frames published by the producer
    #[arg(long, value_name = "MS", requires = "live")]
    pub frame_interval_ms: Option<u64>,

    /// Lock calibration from the nominal value of the primary dimension
    #[arg(long)]
    pub calibrate_from_nominal: bool,

    /// Measurement log [config: outputs.measurements]
    #[arg(long, value_name = "CSV")]
    pub measurements: Option<PathBuf>,

    /// Do not write the raw (pixel) measurement log
    #[arg(long)]
    pub no_raw: bool,

    /// Live-status file [config: outputs.live_status]
    #[arg(long, value_name = "FILE", conflicts_with = "no_live_status")]
    pub live_status: Option<PathBuf>,

    /// Do not write the live-status file
    #[arg(long)]
    pub no_live_status: bool,

    /// Start the measurement logs over instead of appending
    #[arg(long)]
    pub fresh: bool,

    #[command(flatten)]
    pub tolerance: ToleranceArgs,
}

pub fn run(args: InspectArgs, global: &GlobalOpts) -> Result<()> {
    let config = Config::load()?;

    let spec = match &args.cad {
        Some(cad) => parse_cad(cad)?,
        None => {
            let path = args.nominal.as_deref().unwrap_or(config.outputs.nominal.as_path());
            read_nominal(path)?
        }
    };
    let spec = match args.part_type {
        Some(part_type) => spec.with_part_type(part_type),
        None => spec,
    };

    let summary = run_session(spec, &args.session, &config, global)?;
    print_summary(&summary, global)
}

/// Build and drive a session from the command-line options.
///
/// Returns once the frame source is exhausted, a limit is hit, or the
/// timeout raises the stop flag.
pub(crate) fn run_session(
    spec: PartSpec,
    args: &SessionArgs,
    config: &Config,
    global: &GlobalOpts,
) -> Result<SessionSummary> {
    let tolerance = args.tolerance.apply(&config.tolerance)?;
    let part_type = spec.part_type;
    let anchor = if args.calibrate_from_nominal {
        CalibrationAnchor::Nominal {
            dimension: part_type.dimensions()[0],
        }
    } else {
        config.calibration.anchor_for(part_type)
    };

    let log_path = args
        .measurements
        .clone()
        .unwrap_or_else(|| config.outputs.measurements.clone());
    let mut session = InspectionSession::new(spec, &config.detectors, tolerance)
        .with_anchor(anchor)
        .with_log(open_log(&log_path, part_type, false, args.fresh)?);

    if !args.no_raw {
        if let Some(raw) = &config.outputs.raw_measurements {
            session = session.with_raw_log(open_log(raw, part_type, true, args.fresh)?);
        }
    }
    let live_path = if args.no_live_status {
        None
    } else {
        args.live_status
            .clone()
            .or_else(|| config.outputs.live_status.clone())
    };
    if let Some(path) = live_path {
        session = session.with_live_status(LiveStatus::new(path));
    }

    let chatty = global.format == OutputFormat::Auto && !global.quiet;
    if chatty {
        println!(
            "{} Inspecting {} parts from {}",
            style("→").dim(),
            style(part_type.label()).yellow(),
            style(args.frames.display()).cyan()
        );
    }

    let stop = Arc::new(AtomicBool::new(false));
    if let Some(secs) = args.timeout_secs {
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(secs));
            tracing::info!(secs, "inspection timeout reached");
            stop.store(true, Ordering::Relaxed);
        });
    }

    let options = RunOptions {
        max_frames: args.max_frames,
        frame_interval: args.frame_interval_ms.map(Duration::from_millis),
    };
    let frames = FrameReader::open(&args.frames)?;
    let malformed = frames.malformed_counter();
    let on_outcome = |outcome: &FrameOutcome| {
        if chatty {
            print_outcome(outcome);
        }
    };

    if args.live {
        session.run_live(frames, &stop, &options, on_outcome)?;
    } else {
        session.run_replay(frames, &stop, &options, on_outcome)?;
    }

    let malformed = malformed.load(Ordering::Relaxed);
    if malformed > 0 && !global.quiet {
        eprintln!(
            "{} skipped {} malformed frame line(s)",
            style("!").yellow(),
            malformed
        );
    }
    Ok(session.finish())
}

fn open_log(path: &Path, part_type: PartType, raw: bool, fresh: bool) -> Result<MeasurementLog> {
    let log = if fresh {
        MeasurementLog::create(path, part_type, raw)?
    } else {
        MeasurementLog::open(path, part_type, raw)?
    };
    Ok(log)
}

fn print_outcome(outcome: &FrameOutcome) {
    match outcome {
        FrameOutcome::NoDetection => {}
        FrameOutcome::CalibrationPending(err) => {
            println!("  {} {}", style("…").dim(), style(err).dim());
        }
        FrameOutcome::Measured {
            measurement,
            record,
        } => {
            let verdict = record
                .as_ref()
                .map(|r| styled_verdict(r.status))
                .unwrap_or_else(|| style("NO NOMINAL").dim().to_string());
            println!("  {}  {}", readout(measurement), verdict);
        }
    }
}

fn readout(measurement: &Measurement) -> String {
    measurement
        .part_type
        .dimensions()
        .iter()
        .map(|d| match measurement.get(*d) {
            Some(mm) => format!("{} {:.2} mm", d.as_str(), mm),
            None => format!("{} NA", d.as_str()),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn print_summary(summary: &SessionSummary, global: &GlobalOpts) -> Result<()> {
    if print_structured(summary, global.format)? {
        return Ok(());
    }
    if global.format == OutputFormat::Csv {
        print!("{}", stats_csv(&summary.report)?);
        return Ok(());
    }
    if global.quiet {
        return Ok(());
    }

    let stats = &summary.stats;
    println!();
    println!(
        "{} frames, {} detections, {} measurements",
        style(stats.frames).cyan(),
        style(stats.detections).cyan(),
        style(stats.measurements).cyan()
    );
    match summary.scale_mm_per_px {
        Some(scale) => println!("{} {:.5} mm/px", style("Scale:").bold(), scale),
        None => println!("{}", style("Calibration never locked").yellow()),
    }
    if stats.dropped_frames > 0 {
        println!("{} frame(s) dropped by the live loop", stats.dropped_frames);
    }
    if !summary.report.records.is_empty() {
        println!();
        println!("{}", stats_table(&summary.report));
    }
    print_report_summary(&summary.report);
    Ok(())
}
