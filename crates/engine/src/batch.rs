//! Gateway batch resolution — collapses raw authorization and settlement rows
//! into one normalized record per invoice.
//!
//! Both resolvers are pure functions over their input rows: same rows in,
//! identical batch out. Invoice maps are `BTreeMap` so iteration and
//! serialization order never depend on input ordering.

use std::collections::BTreeMap;

use crate::error::ReconError;
use crate::model::{
    AnomalyReason, AuthStatus, AuthorizationBatch, AuthorizationRecord, AuthorizationStats,
    BatchKind, BatchSummary, RawRow, SettlementBatch, SettlementRecord, SettlementStats,
};

pub const REQUIRED_CURRENT_COLUMNS: &[&str] = &["Invoice Number", "Auth Message"];
pub const REQUIRED_SETTLED_COLUMNS: &[&str] = &[
    "Invoice Number",
    "Original Transaction Type",
    "Transaction Status",
    "Original Amount",
];

// ---------------------------------------------------------------------------
// Input validation + lenient parsing
// ---------------------------------------------------------------------------

/// Fatal input-contract check: the batch must be non-empty and its first row
/// must carry every required column.
fn validate_columns(
    rows: &[RawRow],
    required: &[&str],
    batch: BatchKind,
) -> Result<(), ReconError> {
    let first = rows.first().ok_or(ReconError::EmptyBatch { batch })?;

    let missing: Vec<String> = required
        .iter()
        .filter(|col| !first.contains_key(**col))
        .map(|col| col.to_string())
        .collect();

    if !missing.is_empty() {
        let mut available: Vec<String> = first.keys().cloned().collect();
        available.sort();
        return Err(ReconError::MissingColumns {
            batch,
            missing,
            available,
        });
    }

    tracing::info!(batch = %batch, "batch validation passed");
    Ok(())
}

fn field<'a>(row: &'a RawRow, column: &str) -> &'a str {
    row.get(column).map(String::as_str).unwrap_or("").trim()
}

/// Lenient currency parsing: strips `$` and `,`, rounds to cents. Unparsable
/// values become `None` and are excluded from sums — never an error.
pub(crate) fn parse_amount_cents(raw: &str) -> Option<i64> {
    let cleaned: String = raw.chars().filter(|c| *c != '$' && *c != ',').collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }
    let value: f64 = cleaned.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some((value * 100.0).round() as i64)
}

fn parse_count(raw: &str) -> Option<i64> {
    let cleaned = raw.trim();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

/// A trailing totals row: empty invoice number, populated "Sales Count".
/// Rows with neither are plain noise and are skipped by the caller.
fn parse_summary_row(row: &RawRow) -> Option<BatchSummary> {
    if field(row, "Sales Count").is_empty() {
        return None;
    }
    Some(BatchSummary {
        sales_count: parse_count(field(row, "Sales Count")),
        total_sales_cents: parse_amount_cents(field(row, "Total Sales")),
        returns_count: parse_count(field(row, "Returns Count")),
        total_returns_cents: parse_amount_cents(field(row, "Total Returns")),
        net_sales_cents: parse_amount_cents(field(row, "Net Sales")),
        others_count: parse_count(field(row, "Others Count")),
        total_count: parse_count(field(row, "Total Count")),
    })
}

// ---------------------------------------------------------------------------
// Authorization ("current") batch
// ---------------------------------------------------------------------------

/// Collapse raw authorization rows into one final status per invoice.
pub fn resolve_authorizations(rows: &[RawRow]) -> Result<AuthorizationBatch, ReconError> {
    validate_columns(rows, REQUIRED_CURRENT_COLUMNS, BatchKind::Current)?;

    tracing::info!(rows = rows.len(), "resolving authorization batch");

    struct Group {
        messages: Vec<String>,
        sequence: Vec<String>,
        row_count: usize,
    }

    let mut groups: BTreeMap<String, Group> = BTreeMap::new();
    let mut summary = None;

    for row in rows {
        let invoice = field(row, "Invoice Number");
        if invoice.is_empty() {
            if let Some(parsed) = parse_summary_row(row) {
                summary = Some(parsed);
            }
            continue;
        }

        let group = groups.entry(invoice.to_string()).or_insert_with(|| Group {
            messages: Vec::new(),
            sequence: Vec::new(),
            row_count: 0,
        });
        group.row_count += 1;

        let message = field(row, "Auth Message").to_uppercase();
        if message.is_empty() {
            group.sequence.push("NA".to_string());
        } else {
            if !group.messages.contains(&message) {
                group.messages.push(message.clone());
            }
            group.sequence.push(message);
        }
    }

    let mut invoices = BTreeMap::new();
    let mut data_inconsistencies = 0;

    for (invoice, group) in groups {
        let is_data_issue = group.messages.len() > 1;
        if is_data_issue {
            data_inconsistencies += 1;
        }

        invoices.insert(
            invoice,
            AuthorizationRecord {
                final_status: determine_auth_status(&group.messages),
                is_data_issue,
                messages: group.messages,
                sequence: group.sequence,
                row_count: group.row_count,
            },
        );
    }

    if data_inconsistencies > 0 {
        tracing::warn!(
            count = data_inconsistencies,
            "invoices with inconsistent auth messages"
        );
    }
    tracing::info!(invoices = invoices.len(), "authorization batch resolved");

    let stats = AuthorizationStats {
        total_invoices: invoices.len(),
        data_inconsistencies,
    };

    Ok(AuthorizationBatch {
        invoices,
        summary,
        stats,
    })
}

/// Pick the final authorization status from the distinct messages by fixed
/// priority. Priority hits are row-order independent; only the trailing
/// fallback keeps first-seen order.
fn determine_auth_status(messages: &[String]) -> AuthStatus {
    if messages.is_empty() {
        return AuthStatus::NoData;
    }
    let has = |m: &str| messages.iter().any(|x| x == m);

    if has("APPROVAL") {
        return AuthStatus::Approval;
    }
    if has("DECLINED:NSF") {
        return AuthStatus::DeclinedNsf;
    }
    if has("DECLINED:CLOSED") {
        return AuthStatus::DeclinedClosed;
    }
    if has("SUSPECTED FRAUD") {
        return AuthStatus::SuspectedFraud;
    }
    if has("WITHDRAWAL LIMIT") {
        return AuthStatus::WithdrawalLimit;
    }
    if let Some(msg) = messages.iter().find(|m| m.starts_with("DECLINED")) {
        return AuthStatus::Declined(msg.clone());
    }
    AuthStatus::Other(messages[0].clone())
}

// ---------------------------------------------------------------------------
// Settlement ("settled") batch
// ---------------------------------------------------------------------------

/// Group raw settlement rows per invoice, partition by transaction type, and
/// flag the ambiguities the resolver cannot adjudicate itself.
pub fn resolve_settlements(rows: &[RawRow]) -> Result<SettlementBatch, ReconError> {
    validate_columns(rows, REQUIRED_SETTLED_COLUMNS, BatchKind::Settled)?;

    tracing::info!(rows = rows.len(), "resolving settlement batch");

    struct Txn {
        kind: String,
        amount_cents: Option<i64>,
    }

    let mut groups: BTreeMap<String, Vec<Txn>> = BTreeMap::new();
    let mut summary = None;

    for row in rows {
        let invoice = field(row, "Invoice Number");
        if invoice.is_empty() {
            if let Some(parsed) = parse_summary_row(row) {
                summary = Some(parsed);
            }
            continue;
        }

        let raw_amount = field(row, "Original Amount");
        let amount_cents = parse_amount_cents(raw_amount);
        if amount_cents.is_none() && !raw_amount.is_empty() {
            tracing::debug!(invoice, amount = raw_amount, "unparsable settlement amount");
        }

        groups.entry(invoice.to_string()).or_default().push(Txn {
            kind: field(row, "Original Transaction Type").to_uppercase(),
            amount_cents,
        });
    }

    let mut invoices = BTreeMap::new();
    let mut anomaly_count = 0;
    let mut multiple_sales_count = 0;
    let mut settled_count = 0;

    for (invoice, txns) in groups {
        let sales: Vec<&Txn> = txns.iter().filter(|t| t.kind == "SALE").collect();
        let returns: Vec<&Txn> = txns.iter().filter(|t| t.kind == "RETURN").collect();
        let others: Vec<&Txn> = txns
            .iter()
            .filter(|t| t.kind != "SALE" && t.kind != "RETURN" && !t.kind.is_empty())
            .collect();

        let sale_count = sales.len();
        let return_count = returns.len();
        let settled = sale_count > 0;
        if settled {
            settled_count += 1;
        }

        let mut anomaly_reasons = Vec::new();
        if sale_count > 1 {
            multiple_sales_count += 1;
            anomaly_reasons.push(AnomalyReason::MultipleSales(sale_count));
        }
        if sale_count == 0 && return_count > 0 {
            anomaly_reasons.push(AnomalyReason::ReturnWithoutSale);
        }
        if !others.is_empty() {
            let mut types: Vec<String> = others.iter().map(|t| t.kind.clone()).collect();
            types.sort();
            types.dedup();
            anomaly_reasons.push(AnomalyReason::NonStandardTypes(types));
        }

        let has_anomaly = !anomaly_reasons.is_empty();
        if has_anomaly {
            anomaly_count += 1;
        }

        // Duplicate SALE rows are summed, not deduplicated; the MultipleSales
        // flag carries the ambiguity forward instead.
        let sale_amount_cents: i64 = sales.iter().filter_map(|t| t.amount_cents).sum();
        let return_amount_cents: i64 = returns.iter().filter_map(|t| t.amount_cents).sum();

        invoices.insert(
            invoice,
            SettlementRecord {
                settled,
                sale_count,
                return_count,
                other_count: others.len(),
                sale_amount_cents,
                return_amount_cents,
                net_amount_cents: sale_amount_cents - return_amount_cents,
                has_anomaly,
                anomaly_reasons,
            },
        );
    }

    if multiple_sales_count > 0 {
        tracing::warn!(count = multiple_sales_count, "invoices with multiple SALE rows");
    }
    if anomaly_count > 0 {
        tracing::warn!(count = anomaly_count, "invoices with settlement anomalies");
    }
    tracing::info!(invoices = invoices.len(), settled = settled_count, "settlement batch resolved");

    let stats = SettlementStats {
        total_invoices: invoices.len(),
        settled_count,
        anomaly_count,
        multiple_sales_count,
    };

    Ok(SettlementBatch {
        invoices,
        summary,
        stats,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn auth_row(invoice: &str, message: &str) -> RawRow {
        RawRow::from([
            ("Invoice Number".to_string(), invoice.to_string()),
            ("Auth Message".to_string(), message.to_string()),
        ])
    }

    fn settled_row(invoice: &str, kind: &str, amount: &str) -> RawRow {
        RawRow::from([
            ("Invoice Number".to_string(), invoice.to_string()),
            ("Original Transaction Type".to_string(), kind.to_string()),
            ("Transaction Status".to_string(), "STL".to_string()),
            ("Original Amount".to_string(), amount.to_string()),
        ])
    }

    #[test]
    fn empty_batch_is_fatal() {
        let err = resolve_authorizations(&[]).unwrap_err();
        assert!(err.to_string().contains("CURRENT"));
        assert!(err.to_string().contains("empty"));

        let err = resolve_settlements(&[]).unwrap_err();
        assert!(err.to_string().contains("SETTLED"));
    }

    #[test]
    fn missing_columns_is_fatal_and_names_them() {
        let rows = vec![RawRow::from([(
            "Invoice Number".to_string(),
            "INV1".to_string(),
        )])];
        let err = resolve_authorizations(&rows).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Auth Message"), "{msg}");
        assert!(msg.contains("Invoice Number"), "{msg}"); // available list
    }

    #[test]
    fn single_approval() {
        let batch = resolve_authorizations(&[auth_row("INV1", "Approval")]).unwrap();
        let rec = &batch.invoices["INV1"];
        assert_eq!(rec.final_status, AuthStatus::Approval);
        assert!(!rec.is_data_issue);
        assert_eq!(rec.row_count, 1);
    }

    #[test]
    fn conflicting_messages_resolve_by_priority_not_order() {
        // APPROVAL wins regardless of which row comes first.
        let forward = resolve_authorizations(&[
            auth_row("INV1", "APPROVAL"),
            auth_row("INV1", "DECLINED"),
        ])
        .unwrap();
        let backward = resolve_authorizations(&[
            auth_row("INV1", "DECLINED"),
            auth_row("INV1", "APPROVAL"),
        ])
        .unwrap();

        for batch in [&forward, &backward] {
            let rec = &batch.invoices["INV1"];
            assert_eq!(rec.final_status, AuthStatus::Approval);
            assert!(rec.is_data_issue);
        }
        assert_eq!(forward.stats.data_inconsistencies, 1);
    }

    #[test]
    fn decline_priority_ladder() {
        let batch = resolve_authorizations(&[
            auth_row("INV1", "DECLINED:EXPIRED"),
            auth_row("INV1", "DECLINED:NSF"),
            auth_row("INV2", "WITHDRAWAL LIMIT"),
            auth_row("INV2", "SUSPECTED FRAUD"),
            auth_row("INV3", "DECLINED:EXPIRED"),
            auth_row("INV4", "CALL ISSUER"),
        ])
        .unwrap();
        assert_eq!(batch.invoices["INV1"].final_status, AuthStatus::DeclinedNsf);
        assert_eq!(batch.invoices["INV2"].final_status, AuthStatus::SuspectedFraud);
        assert_eq!(
            batch.invoices["INV3"].final_status,
            AuthStatus::Declined("DECLINED:EXPIRED".into())
        );
        assert_eq!(
            batch.invoices["INV4"].final_status,
            AuthStatus::Other("CALL ISSUER".into())
        );
    }

    #[test]
    fn blank_messages_recorded_as_na_in_sequence() {
        let batch = resolve_authorizations(&[
            auth_row("INV1", ""),
            auth_row("INV1", "approval"),
        ])
        .unwrap();
        let rec = &batch.invoices["INV1"];
        assert_eq!(rec.sequence, vec!["NA", "APPROVAL"]);
        assert_eq!(rec.final_status, AuthStatus::Approval);
        // A lone blank row resolves to NoData.
        let batch = resolve_authorizations(&[auth_row("INV2", "  ")]).unwrap();
        assert_eq!(batch.invoices["INV2"].final_status, AuthStatus::NoData);
    }

    #[test]
    fn summary_row_captured_not_grouped() {
        let mut summary = RawRow::from([
            ("Invoice Number".to_string(), "".to_string()),
            ("Auth Message".to_string(), "".to_string()),
            ("Sales Count".to_string(), "12".to_string()),
            ("Total Sales".to_string(), "$1,234.50".to_string()),
            ("Net Sales".to_string(), "1200.00".to_string()),
        ]);
        summary.insert("Total Count".to_string(), "13".to_string());

        let batch =
            resolve_authorizations(&[auth_row("INV1", "APPROVAL"), summary]).unwrap();
        assert_eq!(batch.invoices.len(), 1);
        let s = batch.summary.expect("summary captured");
        assert_eq!(s.sales_count, Some(12));
        assert_eq!(s.total_sales_cents, Some(123450));
        assert_eq!(s.net_sales_cents, Some(120000));
        assert_eq!(s.total_count, Some(13));
    }

    #[test]
    fn blank_invoice_without_sales_count_is_skipped() {
        let noise = RawRow::from([
            ("Invoice Number".to_string(), " ".to_string()),
            ("Auth Message".to_string(), "".to_string()),
        ]);
        let batch = resolve_authorizations(&[auth_row("INV1", "APPROVAL"), noise]).unwrap();
        assert_eq!(batch.invoices.len(), 1);
        assert!(batch.summary.is_none());
    }

    #[test]
    fn resolver_is_idempotent() {
        let rows = vec![
            auth_row("INV1", "APPROVAL"),
            auth_row("INV2", "DECLINED:NSF"),
            auth_row("INV2", "DECLINED:NSF"),
        ];
        assert_eq!(
            resolve_authorizations(&rows).unwrap(),
            resolve_authorizations(&rows).unwrap()
        );

        let rows = vec![
            settled_row("INV1", "SALE", "10.00"),
            settled_row("INV2", "RETURN", "4.00"),
        ];
        assert_eq!(
            resolve_settlements(&rows).unwrap(),
            resolve_settlements(&rows).unwrap()
        );
    }

    #[test]
    fn single_sale_settles() {
        let batch = resolve_settlements(&[settled_row("INV1", "Sale", "$120.00")]).unwrap();
        let rec = &batch.invoices["INV1"];
        assert!(rec.settled);
        assert_eq!(rec.sale_count, 1);
        assert_eq!(rec.sale_amount_cents, 12000);
        assert_eq!(rec.net_amount_cents, 12000);
        assert!(!rec.has_anomaly);
        assert_eq!(batch.stats.settled_count, 1);
    }

    #[test]
    fn double_sale_summed_and_flagged() {
        let batch = resolve_settlements(&[
            settled_row("INV2", "SALE", "50.00"),
            settled_row("INV2", "SALE", "50.00"),
        ])
        .unwrap();
        let rec = &batch.invoices["INV2"];
        assert_eq!(rec.sale_count, 2);
        assert_eq!(rec.sale_amount_cents, 10000);
        assert!(rec.has_anomaly);
        assert_eq!(rec.anomaly_reasons, vec![AnomalyReason::MultipleSales(2)]);
        assert_eq!(batch.stats.multiple_sales_count, 1);
    }

    #[test]
    fn return_without_sale_never_settles() {
        let batch = resolve_settlements(&[settled_row("INV1", "RETURN", "25.00")]).unwrap();
        let rec = &batch.invoices["INV1"];
        assert!(!rec.settled);
        assert_eq!(rec.return_count, 1);
        assert_eq!(rec.net_amount_cents, -2500);
        assert_eq!(rec.anomaly_reasons, vec![AnomalyReason::ReturnWithoutSale]);
    }

    #[test]
    fn sale_minus_return_nets_exactly() {
        let batch = resolve_settlements(&[
            settled_row("INV1", "SALE", "100.00"),
            settled_row("INV1", "RETURN", "30.50"),
        ])
        .unwrap();
        let rec = &batch.invoices["INV1"];
        assert!(rec.settled);
        assert_eq!(rec.net_amount_cents, 10000 - 3050);
        assert!(!rec.has_anomaly);
    }

    #[test]
    fn non_standard_type_flagged() {
        let batch = resolve_settlements(&[
            settled_row("INV1", "SALE", "10.00"),
            settled_row("INV1", "VOID", "10.00"),
        ])
        .unwrap();
        let rec = &batch.invoices["INV1"];
        assert!(rec.has_anomaly);
        assert_eq!(rec.other_count, 1);
        assert_eq!(
            rec.anomaly_reasons,
            vec![AnomalyReason::NonStandardTypes(vec!["VOID".into()])]
        );
    }

    #[test]
    fn unparsable_amount_excluded_from_sums() {
        let batch = resolve_settlements(&[
            settled_row("INV1", "SALE", "not-a-number"),
            settled_row("INV1", "RETURN", "5.00"),
        ])
        .unwrap();
        let rec = &batch.invoices["INV1"];
        assert!(rec.settled); // the SALE row still counts
        assert_eq!(rec.sale_amount_cents, 0);
        assert_eq!(rec.net_amount_cents, -500);
    }

    #[test]
    fn lenient_amount_parsing() {
        assert_eq!(parse_amount_cents("$1,234.56"), Some(123456));
        assert_eq!(parse_amount_cents(" 100.10 "), Some(10010));
        assert_eq!(parse_amount_cents("-12.30"), Some(-1230));
        assert_eq!(parse_amount_cents(""), None);
        assert_eq!(parse_amount_cents("N/A"), None);
    }
}
