mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::{enrich, merge, run, tiles};
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

/// Log to stderr; `RUST_LOG` refines the level picked by -v/-q.
fn init_logging(cli: &Cli) {
    let level = match (cli.quiet, cli.verbose) {
        (true, _) => LevelFilter::ERROR,
        (false, 0) => LevelFilter::INFO,
        (false, 1) => LevelFilter::DEBUG,
        (false, _) => LevelFilter::TRACE,
    };
    let filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

pub fn run() -> anyhow::Result<()> {
    use clap::Parser;

    let cli = Cli::parse();
    init_logging(&cli);
    match &cli.command {
        Commands::Run(args) => run::run(&cli, args),
        Commands::Tiles(args) => tiles::run(&cli, args),
        Commands::Merge(args) => merge::run(&cli, args),
        Commands::Enrich(args) => enrich::run(&cli, args),
    }
}

fn main() -> anyhow::Result<()> { run() }
