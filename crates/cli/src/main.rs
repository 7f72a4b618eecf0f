//! orderprobe CLI - Main Entry Point
//!
//! Runs login checks or the concurrent login-and-order suite against the
//! admin order API described by a suite YAML file.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::RunArgs;

/// orderprobe - concurrent login and order checks
#[derive(Parser)]
#[command(name = "orderprobe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Suite configuration file
    #[arg(short, long, default_value = "config/config.yaml", global = true)]
    config: PathBuf,

    /// Environment to resolve the base URL for (overrides `env`)
    #[arg(long, env = "ORDERPROBE_ENV", global = true)]
    env: Option<String>,

    /// Base URL to use instead of the configured one
    #[arg(long, env = "ORDERPROBE_BASE_URL", global = true)]
    base_url: Option<String>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Output directory for the results file
    #[arg(short, long, default_value = "test-results", global = true)]
    output: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log every account in and verify the replies
    Login(RunArgs),

    /// Log in and place one order per account, all accounts concurrently
    Order {
        #[command(flatten)]
        run: RunArgs,

        /// Stop at the first failed account
        #[arg(long)]
        fail_fast: bool,

        /// Cap on concurrently running accounts
        #[arg(long)]
        max_in_flight: Option<usize>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let settings = commands::Settings {
        config: cli.config,
        env: cli.env,
        base_url: cli.base_url,
        format: cli.format,
        output: cli.output,
    };

    let result = match cli.command {
        Commands::Login(run) => commands::login(&settings, run).await,
        Commands::Order {
            run,
            fail_fast,
            max_in_flight,
        } => commands::order(&settings, run, fail_fast, max_in_flight).await,
    };

    match result {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            std::process::exit(2);
        }
    }
}
