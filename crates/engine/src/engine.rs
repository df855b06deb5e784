use std::collections::BTreeSet;

use crate::batch::{resolve_authorizations, resolve_settlements};
use crate::classify::classify;
use crate::config::ReconcileConfig;
use crate::error::ReconError;
use crate::model::{RawRow, ReconMeta, ReconResult};
use crate::orders::{derive_fulfillment, order_totals_map, orders_from_rows};
use crate::retry::detect_retries;
use crate::summary::compute_summary;

/// Pre-fetched inputs for one reconciliation run. The engine performs no IO;
/// every collection is materialized by the caller before `run` is invoked.
#[derive(Debug, Default)]
pub struct ReconInput {
    /// Sales-order rows from the order DB.
    pub orders: Vec<RawRow>,
    /// Order-item rows used to derive fulfillment status.
    pub order_items: Vec<RawRow>,
    /// Process numbers the warehouse confirmed shipped (ASN).
    pub shipment_confirmations: Vec<String>,
    /// Order-total rows for amount validation.
    pub order_totals: Vec<RawRow>,
    /// Gateway authorization ("current") batch rows.
    pub current_rows: Vec<RawRow>,
    /// Gateway settlement ("settled") batch rows.
    pub settled_rows: Vec<RawRow>,
}

/// Run one full reconciliation: resolve both batches, normalize orders,
/// classify, correlate retries, summarize. Errors from any stage propagate
/// unmodified; there is no partial result.
pub fn run(config: &ReconcileConfig, input: &ReconInput) -> Result<ReconResult, ReconError> {
    tracing::info!(
        config = %config.name,
        orders = input.orders.len(),
        current_rows = input.current_rows.len(),
        settled_rows = input.settled_rows.len(),
        "starting reconciliation run"
    );

    let authorizations = resolve_authorizations(&input.current_rows)?;
    let settlements = resolve_settlements(&input.settled_rows)?;

    let mut orders = orders_from_rows(&input.orders)?;
    derive_fulfillment(&mut orders, &input.order_items);
    let order_totals = order_totals_map(&input.order_totals);
    let shipment_confirmations: BTreeSet<String> = input
        .shipment_confirmations
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    tracing::info!(
        orders = orders.len(),
        shipment_confirmations = shipment_confirmations.len(),
        order_totals = order_totals.len(),
        "inputs normalized"
    );

    let mut classification = classify(
        &orders,
        &authorizations,
        &settlements,
        &order_totals,
        &shipment_confirmations,
        config,
    );
    detect_retries(&orders, &mut classification, config.retry.window_days);

    let summary = compute_summary(&classification);
    tracing::info!(
        successful = summary.successful,
        failed = summary.failed,
        action_required = summary.action_required,
        retry_successes = summary.retry_successes,
        "reconciliation run completed"
    );

    Ok(ReconResult {
        meta: ReconMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        summary,
        classification,
        authorizations,
        settlements,
    })
}

/// Parse CSV text into header-keyed rows. Tolerates a UTF-8 BOM prefix and
/// short records (gateway exports pad a trailing totals row unevenly).
pub fn load_csv_rows(csv_text: &str) -> Result<Vec<RawRow>, ReconError> {
    let text = csv_text.strip_prefix('\u{feff}').unwrap_or(csv_text);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ReconError::Csv(e.to_string()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ReconError::Csv(e.to_string()))?;
        let mut row = RawRow::with_capacity(headers.len());
        for (i, header) in headers.iter().enumerate() {
            if let Some(value) = record.get(i) {
                row.insert(header.clone(), value.to_string());
            }
        }
        rows.push(row);
    }

    Ok(rows)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_csv_basic() {
        let csv = "\
Invoice Number,Auth Message
CXCL1,APPROVAL
CXCL2,DECLINED:NSF
";
        let rows = load_csv_rows(csv).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["Invoice Number"], "CXCL1");
        assert_eq!(rows[1]["Auth Message"], "DECLINED:NSF");
    }

    #[test]
    fn load_csv_strips_bom() {
        let csv = "\u{feff}Invoice Number,Auth Message\nCXCL1,APPROVAL\n";
        let rows = load_csv_rows(csv).unwrap();
        assert_eq!(rows[0]["Invoice Number"], "CXCL1");
    }

    #[test]
    fn load_csv_short_records_tolerated() {
        let csv = "\
Invoice Number,Auth Message,Sales Count
CXCL1,APPROVAL
";
        let rows = load_csv_rows(csv).unwrap();
        assert_eq!(rows[0].get("Sales Count"), None);
    }

    #[test]
    fn run_smoke() {
        let config = ReconcileConfig::default();

        let input = ReconInput {
            orders: load_csv_rows(
                "process_number,notif_email,order_date,order_state,notify_mobile_no,payment_reference_no\n\
                 CXCL1,a@example.com,2025-11-03 09:00:00,SUCCESS,,ref1\n\
                 CXCL2,b@example.com,2025-11-03 10:00:00,PAYMENT_CANCELLED,,ref2\n",
            )
            .unwrap(),
            order_items: load_csv_rows(
                "order_process_number,order_status\nCXCL1,SHIPPED\n",
            )
            .unwrap(),
            shipment_confirmations: vec!["CXCL1".to_string()],
            order_totals: load_csv_rows("process_number,order_total\nCXCL1,120.00\n").unwrap(),
            current_rows: load_csv_rows(
                "Invoice Number,Auth Message\nCXCL1,APPROVAL\n",
            )
            .unwrap(),
            settled_rows: load_csv_rows(
                "Invoice Number,Original Transaction Type,Transaction Status,Original Amount\n\
                 CXCL1,SALE,STL,120.00\n",
            )
            .unwrap(),
        };

        let result = run(&config, &input).unwrap();
        assert_eq!(result.summary.total_orders, 2);
        assert_eq!(result.summary.successful, 1);
        assert_eq!(result.summary.failed, 1);
        assert_eq!(result.classification.successful_orders, vec!["CXCL1"]);
        assert_eq!(result.classification.failed_orders, vec!["CXCL2"]);
        assert_eq!(result.meta.config_name, "reconciliation");
    }

    #[test]
    fn empty_current_batch_fails_run() {
        let config = ReconcileConfig::default();
        let input = ReconInput::default();
        let err = run(&config, &input).unwrap_err();
        assert!(err.to_string().contains("CURRENT"));
    }
}
