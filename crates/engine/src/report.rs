//! Report shaping — flattens a [`ReconResult`] into spreadsheet-ready rows.
//!
//! Pure presentation: every value is copied from the classifier's output,
//! no business rule is re-derived here.

use serde::Serialize;

use crate::model::{AmountMismatch, AuthorizationStats, BatchSummary, ReconResult, SettlementStats};

/// One flat row per order, enums rendered to their report tags.
#[derive(Debug, Clone, Serialize)]
pub struct OrderRow {
    pub order_id: String,
    pub state: String,
    pub reason: Option<String>,
    pub failure_kind: Option<String>,
    pub db_state: String,
    pub fulfillment_status: Option<String>,
    pub payment_reference_no: Option<String>,
    pub auth_status: String,
    pub settled: bool,
    pub data_issue: bool,
    pub settlement_anomaly: bool,
    pub shipment_confirmed: bool,
    pub settled_net_cents: Option<i64>,
    pub order_total_cents: Option<i64>,
    pub is_retry_success: bool,
    pub previous_failed_attempt: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
    /// Rows in order-id order, ready to write out as a sheet.
    pub orders: Vec<OrderRow>,
    pub amount_mismatches: Vec<AmountMismatch>,
    pub authorization_stats: AuthorizationStats,
    pub authorization_summary: Option<BatchSummary>,
    pub settlement_stats: SettlementStats,
    pub settlement_summary: Option<BatchSummary>,
}

/// Flatten a reconciliation result for the presentation collaborator.
pub fn build_report(result: &ReconResult) -> Report {
    let orders = result
        .classification
        .orders
        .values()
        .map(|c| OrderRow {
            order_id: c.order_id.clone(),
            state: c.state.to_string(),
            reason: c.action_reason.map(|r| r.to_string()),
            failure_kind: c.failure_kind.map(|k| k.to_string()),
            db_state: c.order_state.to_string(),
            fulfillment_status: c.fulfillment_status.as_ref().map(|s| s.to_string()),
            payment_reference_no: c.payment_reference_no.clone(),
            auth_status: c.auth_status.to_string(),
            settled: c.is_settled,
            data_issue: c.is_data_issue,
            settlement_anomaly: c.has_settlement_anomaly,
            shipment_confirmed: c.shipment_confirmed,
            settled_net_cents: c.settled_net_cents,
            order_total_cents: c.order_total_cents,
            is_retry_success: c.is_retry_success,
            previous_failed_attempt: c.previous_failed_attempt.clone(),
        })
        .collect();

    Report {
        config_name: result.meta.config_name.clone(),
        engine_version: result.meta.engine_version.clone(),
        run_at: result.meta.run_at.clone(),
        orders,
        amount_mismatches: result.classification.amount_mismatches.clone(),
        authorization_stats: result.authorizations.stats.clone(),
        authorization_summary: result.authorizations.summary.clone(),
        settlement_stats: result.settlements.stats.clone(),
        settlement_summary: result.settlements.summary.clone(),
    }
}
