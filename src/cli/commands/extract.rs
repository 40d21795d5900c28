//! `dimspect extract` command - nominal dimensions from a CAD drawing

use console::style;
use miette::Result;
use std::path::{Path, PathBuf};

use crate::cad::read_drawing;
use crate::cli::helpers::{nominal_csv, nominal_table, print_structured};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::Config;
use crate::entities::part::PartSpec;
use crate::store::write_nominal;

#[derive(clap::Args, Debug)]
pub struct ExtractArgs {
    /// CAD drawing (.dxf)
    pub cad: PathBuf,

    /// Nominal table to write [config: outputs.nominal]
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Print the nominal table without writing it
    #[arg(long)]
    pub no_write: bool,
}

pub fn run(args: ExtractArgs, global: &GlobalOpts) -> Result<()> {
    let config = Config::load()?;
    let output = (!args.no_write).then(|| args.output.unwrap_or(config.outputs.nominal));
    let spec = extract(&args.cad, output.as_deref(), global)?;

    if print_structured(&spec, global.format)? {
        return Ok(());
    }
    if global.format == OutputFormat::Csv {
        print!("{}", nominal_csv(&spec)?);
        return Ok(());
    }
    if !global.quiet {
        println!();
        println!("{}", nominal_table(&spec));
    }
    Ok(())
}

/// Parse and classify `cad`, writing the nominal table to `output` if given.
///
/// Status lines go to stdout only in the human-readable format.
pub(crate) fn extract(cad: &Path, output: Option<&Path>, global: &GlobalOpts) -> Result<PartSpec> {
    let drawing = read_drawing(cad)?;
    tracing::debug!(
        circles = drawing.circle_count(),
        loops = drawing.loop_count(),
        "drawing parsed"
    );
    let spec = drawing.classify()?;
    let chatty = global.format == OutputFormat::Auto && !global.quiet;

    if chatty {
        println!(
            "{} Classified {} as {}",
            style("✓").green(),
            style(cad.display()).cyan(),
            style(spec.part_type.label()).yellow()
        );
    }

    if let Some(path) = output {
        write_nominal(path, &spec)?;
        if chatty {
            println!(
                "{} Nominal table written to {}",
                style("✓").green(),
                style(path.display()).cyan()
            );
        }
    }

    Ok(spec)
}
