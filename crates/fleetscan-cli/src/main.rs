//! fleetscan — point-in-time health diagnostic for worker clusters.
//!
//! # Usage
//!
//! ```text
//! fleetscan scan --registry registry.toml --output clusters.json --status STATUS.md
//! ```

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "fleetscan",
    about = "Probe every registered worker endpoint and report healthy endpoints per cluster",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Emit logs as JSON lines instead of human-readable text.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one diagnostic scan and write the cluster report
    Scan(commands::scan::ScanArgs),
}

/// Exit status when the scan completed but some member is not healthy.
const EXIT_UNHEALTHY: u8 = 2;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs)?;

    match cli.command {
        Commands::Scan(args) => {
            let tally = commands::scan::scan(&args).await?;
            if args.fail_on_unhealthy && tally.has_failures() {
                return Ok(ExitCode::from(EXIT_UNHEALTHY));
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_tracing(json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,fleetscan=info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}
