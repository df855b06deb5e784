//! Order-side input normalization: DB export rows become typed [`Order`]s,
//! order items collapse into a derived fulfillment status, and the order-total
//! rows become one canonical cents map.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};

use crate::batch::parse_amount_cents;
use crate::error::ReconError;
use crate::model::{FulfillmentStatus, Order, OrderState, RawRow};

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

fn opt_field(row: &RawRow, column: &str) -> Option<String> {
    row.get(column)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Normalize raw sales-order rows. A row without a process number is a
/// structural violation and fails the whole run.
pub fn orders_from_rows(rows: &[RawRow]) -> Result<Vec<Order>, ReconError> {
    let mut orders = Vec::with_capacity(rows.len());

    for (i, row) in rows.iter().enumerate() {
        let process_number = opt_field(row, "process_number").ok_or_else(|| {
            ReconError::MalformedRow {
                context: "sales order",
                detail: format!("row {} has no process_number", i + 1),
            }
        })?;

        let order_date = row.get("order_date").and_then(|v| parse_datetime(v));
        if order_date.is_none() {
            if let Some(raw) = opt_field(row, "order_date") {
                tracing::debug!(order = %process_number, date = %raw, "unparsable order date");
            }
        }

        orders.push(Order {
            process_number,
            notif_email: opt_field(row, "notif_email"),
            notify_mobile_no: opt_field(row, "notify_mobile_no"),
            order_date,
            order_state: OrderState::parse(
                row.get("order_state").map(String::as_str).unwrap_or(""),
            ),
            fulfillment_status: None,
            payment_reference_no: opt_field(row, "payment_reference_no"),
        });
    }

    Ok(orders)
}

/// Lenient datetime parsing for DB export values. Accepts the common
/// timestamp renderings plus bare dates (midnight).
pub(crate) fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    for format in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

// ---------------------------------------------------------------------------
// Fulfillment derivation
// ---------------------------------------------------------------------------

/// Attach each order's fulfillment status: the highest-priority status among
/// its items (SHIPPED > CLAIMED > ORDERED > REJECTED > anything else).
/// Orders with no items keep `None`.
pub fn derive_fulfillment(orders: &mut [Order], item_rows: &[RawRow]) {
    let mut best: HashMap<&str, FulfillmentStatus> = HashMap::new();

    for row in item_rows {
        let (Some(process), Some(status)) = (
            row.get("order_process_number").map(|v| v.trim()).filter(|v| !v.is_empty()),
            row.get("order_status").map(|v| v.trim()).filter(|v| !v.is_empty()),
        ) else {
            continue;
        };

        let status = FulfillmentStatus::parse(status);
        match best.get(process) {
            Some(current) if current.rank() >= status.rank() => {}
            _ => {
                best.insert(process, status);
            }
        }
    }

    for order in orders.iter_mut() {
        order.fulfillment_status = best.get(order.process_number.as_str()).cloned();
    }
}

// ---------------------------------------------------------------------------
// Order totals
// ---------------------------------------------------------------------------

/// Normalize order-total rows into the one canonical map the classifier
/// consumes. Rows with a missing process number or unparsable total are
/// dropped — a missing total only disables that order's amount check.
pub fn order_totals_map(rows: &[RawRow]) -> HashMap<String, i64> {
    let mut totals = HashMap::with_capacity(rows.len());

    for row in rows {
        let Some(process) = opt_field(row, "process_number") else {
            continue;
        };
        match row.get("order_total").and_then(|v| parse_amount_cents(v)) {
            Some(cents) => {
                totals.insert(process, cents);
            }
            None => {
                tracing::debug!(order = %process, "order total missing or unparsable");
            }
        }
    }

    totals
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
