use clap::Parser;
use dimspect::cli::{Cli, Commands};
use miette::Result;

fn main() -> Result<()> {
    // Reset SIGPIPE so piping into `head` exits quietly instead of panicking
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let global = cli.global;
    init_tracing(global.verbose);

    match cli.command {
        Commands::Extract(args) => dimspect::cli::commands::extract::run(args, &global),
        Commands::Inspect(args) => dimspect::cli::commands::inspect::run(args, &global),
        Commands::Compare(args) => dimspect::cli::commands::compare::run(args, &global),
        Commands::Run(args) => dimspect::cli::commands::run::run(args, &global),
        Commands::Config(cmd) => dimspect::cli::commands::config::run(cmd, &global),
        Commands::Completions(args) => dimspect::cli::commands::completions::run(args),
    }
}

/// Logs go to stderr so stdout stays pipeable; `RUST_LOG` wins over `--verbose`
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let default = if verbose { "dimspect=debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}
