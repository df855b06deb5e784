// orderrecon CLI - runs order vs. gateway-batch reconciliation over local
// CSV exports, headless.

mod exit_codes;
mod run;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

/// Structured CLI failure: exit code + message + optional operator hint.
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Parser)]
#[command(name = "orecon")]
#[command(about = "Reconcile order-system exports against payment-gateway batch files")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a reconciliation over CSV exports and emit a report
    #[command(after_help = "\
Examples:
  orecon run --orders orders.csv --items items.csv \\
             --current currentbatch.csv --settled settledbatch.csv
  orecon run --config recon.toml --orders orders.csv --items items.csv \\
             --shipped shipped.csv --totals totals.csv \\
             --current currentbatch.csv --settled settledbatch.csv --json
  orecon run ... --output report.json

Exit codes: 0 = clean, 1 = action-required orders found, 3 = bad config,
4 = unreadable or contract-violating input.")]
    Run {
        /// Optional TOML config (tolerances, retry window)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Sales-order export
        #[arg(long)]
        orders: PathBuf,

        /// Order-items export (drives fulfillment status)
        #[arg(long)]
        items: PathBuf,

        /// Warehouse shipment-confirmation export (ASN), single
        /// process_number column
        #[arg(long)]
        shipped: Option<PathBuf>,

        /// Order-totals export for amount validation
        #[arg(long)]
        totals: Option<PathBuf>,

        /// Gateway authorization ("current") batch CSV
        #[arg(long)]
        current: PathBuf,

        /// Gateway settlement ("settled") batch CSV
        #[arg(long)]
        settled: PathBuf,

        /// Print the JSON report to stdout
        #[arg(long)]
        json: bool,

        /// Write the JSON report to a file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Validate a config file without running
    #[command(after_help = "\
Examples:
  orecon validate recon.toml")]
    Validate {
        /// Path to the TOML config file
        config: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Run {
            config,
            orders,
            items,
            shipped,
            totals,
            current,
            settled,
            json,
            output,
        } => run::cmd_run(run::RunArgs {
            config,
            orders,
            items,
            shipped,
            totals,
            current,
            settled,
            json,
            output,
        }),
        Commands::Validate { config } => run::cmd_validate(config),
    };

    match outcome {
        Ok(()) => ExitCode::from(exit_codes::EXIT_SUCCESS),
        Err(err) => {
            eprintln!("error: {}", err.message);
            if let Some(hint) = err.hint {
                eprintln!("hint: {hint}");
            }
            ExitCode::from(err.code)
        }
    }
}
