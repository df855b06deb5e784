//! Order classification — merges the order DB state, resolved gateway
//! batches, warehouse shipment confirmations, and order totals into one
//! definitive per-order outcome.
//!
//! The rule chain is a business-priority stack evaluated top to bottom; the
//! first matching rule wins. Later rules only ever see orders that fell
//! through all earlier ones, so reordering is a behavior change.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::config::ReconcileConfig;
use crate::model::{
    ActionReason, AmountMismatch, AuthStatus, AuthorizationBatch, ClassificationOutcome,
    ClassificationState, FailureKind, FulfillmentStatus, Order, OrderClassification,
    SettlementBatch,
};

// ---------------------------------------------------------------------------
// Fact view
// ---------------------------------------------------------------------------

/// Everything the rule chain consults for one order, gathered once so each
/// rule reads like its business statement.
struct OrderFacts<'a> {
    order: &'a Order,
    auth_status: &'a AuthStatus,
    is_data_issue: bool,
    is_settled: bool,
    has_anomaly: bool,
    settled_net_cents: Option<i64>,
    order_total_cents: Option<i64>,
    shipment_confirmed: bool,
}

impl OrderFacts<'_> {
    fn fulfillment(&self) -> Option<&FulfillmentStatus> {
        self.order.fulfillment_status.as_ref()
    }

    fn is_shipped(&self) -> bool {
        matches!(self.fulfillment(), Some(FulfillmentStatus::Shipped))
    }

    fn is_active(&self) -> bool {
        self.fulfillment().map(|s| s.is_active()).unwrap_or(false)
    }
}

/// What the chain decided before amount validation and the post-check.
enum Verdict {
    Action(ActionReason),
    Failed(FailureKind),
    Success {
        info: Option<ActionReason>,
        validate_amount: bool,
    },
}

// ---------------------------------------------------------------------------
// Rule chain
// ---------------------------------------------------------------------------

fn evaluate(facts: &OrderFacts<'_>) -> Verdict {
    use crate::model::OrderState;

    // 1. DB says the order itself errored. Nothing else matters.
    if facts.order.order_state == OrderState::Error {
        return Verdict::Action(ActionReason::CxpErrorState);
    }

    // 2. Active order the gateway has never heard of.
    if facts.order.order_state == OrderState::Success
        && facts.auth_status.is_no_data()
        && !facts.is_settled
        && facts.is_active()
    {
        return Verdict::Action(ActionReason::NoPaymentData);
    }

    // 3. User cancelled at payment. Terminal.
    if facts.order.order_state == OrderState::PaymentCancelled {
        return Verdict::Failed(FailureKind::PaymentCancelled);
    }

    // 4. Warehouse confirmed shipment but no money collected — the most
    //    expensive gap, checked before the order system's own SHIPPED flag.
    if facts.shipment_confirmed && !facts.is_settled {
        return Verdict::Action(ActionReason::AsnNotSettled);
    }

    // 5. Order system says shipped, still unsettled.
    if facts.is_shipped() && !facts.is_settled {
        return Verdict::Action(ActionReason::ShippedNotSettled);
    }

    // 6. Cancelled after authorization. The auth expires unsettled, so this
    //    is a note, not a failure.
    if matches!(facts.fulfillment(), Some(FulfillmentStatus::Rejected))
        && facts.auth_status.is_approval()
    {
        return Verdict::Success {
            info: Some(ActionReason::OrderRejected),
            validate_amount: false,
        };
    }

    // 7. Money taken, order never materialized.
    if facts.fulfillment().is_none() && facts.auth_status.is_approval() {
        return Verdict::Action(ActionReason::PaymentSuccessOrderFailed);
    }

    // 8. Settlement rows are internally inconsistent.
    if facts.has_anomaly {
        return Verdict::Action(ActionReason::SettlementAnomaly);
    }

    // 9. Shipped (either source) and settled.
    if (facts.is_shipped() || facts.shipment_confirmed) && facts.is_settled {
        return Verdict::Success {
            info: None,
            validate_amount: true,
        };
    }

    // 10. Active and authorized. A message mismatch inside the batch makes
    //     the amount untrustworthy, so it short-circuits validation.
    if facts.is_active() && facts.auth_status.is_approval() {
        if facts.is_data_issue {
            return Verdict::Success {
                info: Some(ActionReason::ConvergeDataInconsistency),
                validate_amount: false,
            };
        }
        return Verdict::Success {
            info: None,
            validate_amount: true,
        };
    }

    // 11. Bank said no.
    if facts.auth_status.is_fraud() {
        return Verdict::Failed(FailureKind::SuspectedFraud);
    }
    if facts.auth_status.is_declined() {
        return Verdict::Failed(FailureKind::Declined);
    }

    // 12. Nothing vouches for this order.
    Verdict::Failed(FailureKind::Unmatched)
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// Classify every order into exactly one of SUCCESS / FAILED /
/// ACTION_REQUIRED. Missing optional inputs (totals, shipment confirmations)
/// disable their checks and never block classification.
pub fn classify(
    orders: &[Order],
    authorizations: &AuthorizationBatch,
    settlements: &SettlementBatch,
    order_totals: &HashMap<String, i64>,
    shipment_confirmations: &BTreeSet<String>,
    config: &ReconcileConfig,
) -> ClassificationOutcome {
    tracing::info!(orders = orders.len(), "starting order classification");

    let mut result = BTreeMap::new();
    let mut successful_orders = Vec::new();
    let mut failed_orders = Vec::new();
    let mut action_required_orders = Vec::new();
    let mut rejected_orders = Vec::new();
    let mut data_inconsistencies = Vec::new();
    let mut amount_mismatches = Vec::new();

    for order in orders {
        let order_id = order.process_number.as_str();
        let auth = authorizations.record(order_id);
        let settlement = settlements.record(order_id);

        let facts = OrderFacts {
            order,
            auth_status: auth.map(|a| &a.final_status).unwrap_or(&AuthStatus::NoData),
            is_data_issue: auth.map(|a| a.is_data_issue).unwrap_or(false),
            is_settled: settlement.map(|s| s.settled).unwrap_or(false),
            has_anomaly: settlement.map(|s| s.has_anomaly).unwrap_or(false),
            settled_net_cents: settlement.map(|s| s.net_amount_cents),
            order_total_cents: order_totals.get(order_id).copied(),
            shipment_confirmed: shipment_confirmations.contains(order_id),
        };

        let (mut state, mut action_reason, failure_kind) = match evaluate(&facts) {
            Verdict::Action(reason) => (ClassificationState::ActionRequired, Some(reason), None),
            Verdict::Failed(kind) => (ClassificationState::Failed, None, Some(kind)),
            Verdict::Success { info, validate_amount } => {
                let mut state = ClassificationState::Success;
                let mut reason = info;

                if validate_amount {
                    if let Some(mismatch) = check_amounts(&facts, config) {
                        state = ClassificationState::ActionRequired;
                        reason = Some(ActionReason::SettlementAmountMismatch);
                        amount_mismatches.push(mismatch);
                    }
                }

                (state, reason, None)
            }
        };

        // Settled and marked shipped, but the warehouse never confirmed —
        // layered on top of the chain, only over otherwise-clean successes.
        if state == ClassificationState::Success
            && facts.is_settled
            && !facts.shipment_confirmed
            && facts.is_shipped()
        {
            state = ClassificationState::ActionRequired;
            action_reason = Some(ActionReason::SettledNoAsn);
        }

        match state {
            ClassificationState::Success => successful_orders.push(order_id.to_string()),
            ClassificationState::Failed => failed_orders.push(order_id.to_string()),
            ClassificationState::ActionRequired => {
                action_required_orders.push(order_id.to_string())
            }
        }
        match action_reason {
            Some(ActionReason::OrderRejected) => rejected_orders.push(order_id.to_string()),
            Some(ActionReason::ConvergeDataInconsistency) => {
                data_inconsistencies.push(order_id.to_string())
            }
            _ => {}
        }

        tracing::info!(
            order = order_id,
            state = %state,
            reason = %action_reason.map(|r| r.to_string()).unwrap_or_default(),
            fulfillment = %facts.fulfillment().map(|s| s.to_string()).unwrap_or_default(),
            db_state = %order.order_state,
            auth = %facts.auth_status,
            settled = facts.is_settled,
            "order classified"
        );

        result.insert(
            order_id.to_string(),
            OrderClassification {
                order_id: order_id.to_string(),
                state,
                action_reason,
                failure_kind,
                order_state: order.order_state.clone(),
                fulfillment_status: order.fulfillment_status.clone(),
                payment_reference_no: order.payment_reference_no.clone(),
                auth_status: facts.auth_status.clone(),
                is_settled: facts.is_settled,
                is_data_issue: facts.is_data_issue,
                has_settlement_anomaly: facts.has_anomaly,
                shipment_confirmed: facts.shipment_confirmed,
                settled_net_cents: facts.settled_net_cents,
                order_total_cents: facts.order_total_cents,
                is_retry_success: false,
                previous_failed_attempt: None,
            },
        );
    }

    for order_id in &action_required_orders {
        let reason = result[order_id]
            .action_reason
            .map(|r| r.to_string())
            .unwrap_or_else(|| "UNKNOWN".into());
        tracing::warn!(order = %order_id, reason = %reason, "attention required");
    }

    tracing::info!(
        successful = successful_orders.len(),
        failed = failed_orders.len(),
        action_required = action_required_orders.len(),
        "order classification completed"
    );

    ClassificationOutcome {
        orders: result,
        successful_orders,
        failed_orders,
        action_required_orders,
        retry_success_orders: Vec::new(),
        rejected_orders,
        data_inconsistencies,
        amount_mismatches,
    }
}

/// Compare the settled net against the order total. Best effort: with either
/// side missing there is nothing to compare and the candidate success stands.
fn check_amounts(facts: &OrderFacts<'_>, config: &ReconcileConfig) -> Option<AmountMismatch> {
    let total = facts.order_total_cents?;
    let settled = facts.settled_net_cents?;
    let difference = settled - total;
    if difference.abs() <= config.tolerance.amount_cents {
        return None;
    }
    Some(AmountMismatch {
        order_id: facts.order.process_number.clone(),
        order_total_cents: total,
        settled_cents: settled,
        difference_cents: difference,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
