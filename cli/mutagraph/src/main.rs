//! mutagraph CLI: run the variant engine over graph fixtures.

mod commands;
mod manifest;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "mutagraph",
    version,
    about = "Variant splitting and dependency binding for build graphs"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter fixture
    Init {
        /// Fixture path to create
        path: PathBuf,
    },
    /// Split and bind the units of a fixture
    Run {
        /// Fixture file (TOML)
        fixture: PathBuf,
        /// Worker threads for parallel mutators (0 = one per core)
        #[arg(long)]
        threads: Option<usize>,
        /// Run every mutator on the calling thread
        #[arg(long)]
        serial: bool,
        /// Output format (text, json)
        #[arg(long)]
        format: Option<String>,
    },
    /// Show the ordered mutator passes
    Plan {
        /// Fixture whose variation policy to show
        fixture: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Init { path } => commands::init::run(&path),
        Commands::Run {
            fixture,
            threads,
            serial,
            format,
        } => commands::run::run(&fixture, threads, serial, format.as_deref()),
        Commands::Plan { fixture } => commands::plan::run(fixture.as_deref()),
    }
}
