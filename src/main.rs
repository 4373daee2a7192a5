use cable_calc::{commands, config};
use clap::Parser as _;
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

const LOG_ENV: &str = "CABLE_CALC_LOG";
const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(clap::Parser)]
#[clap(version, about, author)]
struct Cli {
    #[clap(flatten)]
    config: config::Args,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    Calc(commands::calc::Args),
    Select(commands::select::Args),
    Tables(commands::tables::Args),
    /// Inspect and maintain a project file.
    #[command(subcommand)]
    Project(commands::project::Command),
}

fn end<E: std::error::Error>(r: Result<(), E>) {
    std::process::exit(match r {
        Ok(_) => 0,
        Err(e) => {
            eprintln!("error: {e}");
            let mut cause = e.source();
            while let Some(e) = cause {
                eprintln!("  because: {e}");
                cause = e.source();
            }
            1
        }
    });
}

fn main() {
    let filter_description =
        std::env::var(LOG_ENV).unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());
    let filter = filter_description
        .parse::<tracing_subscriber::filter::targets::Targets>()
        .unwrap_or_else(|e| {
            eprintln!("warning: ignoring {LOG_ENV}={filter_description:?}: {e}");
            DEFAULT_LOG_FILTER.parse().unwrap_or_default()
        });
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Calc(args) => end(commands::calc::run(args, cli.config)),
        Commands::Select(args) => end(commands::select::run(args, cli.config)),
        Commands::Tables(args) => end(commands::tables::run(args, cli.config)),
        Commands::Project(command) => end(commands::project::run(command, cli.config)),
    }
}
