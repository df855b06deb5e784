//! `orecon run` / `orecon validate` — feed local CSV exports to the engine.

use std::path::{Path, PathBuf};

use orderrecon_engine::engine::{load_csv_rows, run, ReconInput};
use orderrecon_engine::error::ReconError;
use orderrecon_engine::{build_report, ReconcileConfig};

use crate::exit_codes::{EXIT_FINDINGS, EXIT_INVALID_CONFIG, EXIT_RUNTIME};
use crate::CliError;

pub struct RunArgs {
    pub config: Option<PathBuf>,
    pub orders: PathBuf,
    pub items: PathBuf,
    pub shipped: Option<PathBuf>,
    pub totals: Option<PathBuf>,
    pub current: PathBuf,
    pub settled: PathBuf,
    pub json: bool,
    pub output: Option<PathBuf>,
}

fn cli_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError {
        code,
        message: msg.into(),
        hint: None,
    }
}

fn engine_err(err: ReconError) -> CliError {
    let code = match err {
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => EXIT_INVALID_CONFIG,
        _ => EXIT_RUNTIME,
    };
    cli_err(code, err.to_string())
}

fn load_config(path: Option<&Path>) -> Result<ReconcileConfig, CliError> {
    let Some(path) = path else {
        return Ok(ReconcileConfig::default());
    };
    let text = std::fs::read_to_string(path).map_err(|e| {
        cli_err(
            EXIT_INVALID_CONFIG,
            format!("cannot read config {}: {e}", path.display()),
        )
    })?;
    ReconcileConfig::from_toml(&text).map_err(engine_err)
}

fn load_rows(path: &Path) -> Result<Vec<orderrecon_engine::model::RawRow>, CliError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        cli_err(EXIT_RUNTIME, format!("cannot read {}: {e}", path.display()))
    })?;
    load_csv_rows(&text)
        .map_err(|e| cli_err(EXIT_RUNTIME, format!("{}: {e}", path.display())))
}

/// The warehouse export is a single `process_number` column.
fn load_shipped(path: &Path) -> Result<Vec<String>, CliError> {
    let rows = load_rows(path)?;
    let shipped: Vec<String> = rows
        .into_iter()
        .filter_map(|row| row.get("process_number").map(|v| v.trim().to_string()))
        .filter(|v| !v.is_empty())
        .collect();
    if shipped.is_empty() {
        tracing::warn!(file = %path.display(), "no shipment confirmations loaded");
    }
    Ok(shipped)
}

pub fn cmd_run(args: RunArgs) -> Result<(), CliError> {
    let config = load_config(args.config.as_deref())?;

    let input = ReconInput {
        orders: load_rows(&args.orders)?,
        order_items: load_rows(&args.items)?,
        shipment_confirmations: match &args.shipped {
            Some(path) => load_shipped(path)?,
            None => Vec::new(),
        },
        order_totals: match &args.totals {
            Some(path) => load_rows(path)?,
            None => Vec::new(),
        },
        current_rows: load_rows(&args.current)?,
        settled_rows: load_rows(&args.settled)?,
    };

    let result = run(&config, &input).map_err(engine_err)?;
    let report = build_report(&result);

    let json_str = serde_json::to_string_pretty(&report)
        .map_err(|e| cli_err(EXIT_RUNTIME, format!("JSON serialization error: {e}")))?;

    if let Some(ref path) = args.output {
        std::fs::write(path, &json_str).map_err(|e| {
            cli_err(EXIT_RUNTIME, format!("cannot write output: {e}"))
        })?;
        eprintln!("wrote {}", path.display());
    }

    if args.json {
        println!("{json_str}");
    }

    // Human summary to stderr
    let s = &result.summary;
    eprintln!(
        "{}: {} orders — {} successful, {} failed, {} action required ({} retry successes, {} amount mismatches)",
        result.meta.config_name,
        s.total_orders,
        s.successful,
        s.failed,
        s.action_required,
        s.retry_successes,
        s.amount_mismatches,
    );
    for (reason, count) in &s.action_reason_counts {
        eprintln!("  {reason}: {count}");
    }

    if s.action_required > 0 {
        return Err(CliError {
            code: EXIT_FINDINGS,
            message: format!("{} orders require manual action", s.action_required),
            hint: Some("see the ACTION_REQUIRED rows in the report output".into()),
        });
    }

    Ok(())
}

pub fn cmd_validate(config: PathBuf) -> Result<(), CliError> {
    let config = load_config(Some(&config))?;
    eprintln!(
        "config OK: name={:?}, amount tolerance={} cents, retry window={} days",
        config.name, config.tolerance.amount_cents, config.retry.window_days,
    );
    Ok(())
}
