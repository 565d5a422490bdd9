//! Command-line driver for the pin request handshake.
//!
//! Runs the request/accept/commit flow against an in-memory store so the
//! behavior of each path can be observed end to end:
//! - simulate: Request a pin and optionally accept it as the approver
//! - config: Print the effective processor configuration
//!
//! Configuration via environment:
//! - PINFLOW_PLACEHOLDER_ACTIVITY: class given to items created by a commit
//! - PINFLOW_VERIFY_STATES: run the post-commit self-check (default: true)
//! - PINFLOW_STRICT_VERIFY: panic on a failed self-check
//! - PINFLOW_LOG_LEVEL: logging level (default: "info"), overridden by RUST_LOG

mod commands;

use clap::{Parser, Subcommand};
use pinflow_request::ProcessorConfig;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use commands::{config::ConfigArgs, simulate::SimulateArgs};

/// Pin request handshake CLI
///
/// Prints JSON by default; pass --human for formatted output.
#[derive(Parser)]
#[command(name = "pinflow")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Output human-readable formatted text instead of JSON
    #[arg(long, global = true)]
    human: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one pin request through the handshake
    Simulate(SimulateArgs),

    /// Show the effective processor configuration
    Config(ConfigArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ProcessorConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&config.log_level);

    let result = match cli.command {
        Commands::Simulate(args) => commands::simulate::execute(config, cli.human, args).await,
        Commands::Config(args) => commands::config::execute(&config, cli.human, args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing with an environment filter. Logs go to stderr.
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
