use std::collections::BTreeMap;

use crate::model::{ClassificationOutcome, ReconSummary};

/// Compute aggregate statistics from a classification outcome.
pub fn compute_summary(outcome: &ClassificationOutcome) -> ReconSummary {
    let mut action_reason_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut failure_kind_counts: BTreeMap<String, usize> = BTreeMap::new();

    for classification in outcome.orders.values() {
        if let Some(reason) = classification.action_reason {
            *action_reason_counts.entry(reason.to_string()).or_insert(0) += 1;
        }
        if let Some(kind) = classification.failure_kind {
            *failure_kind_counts.entry(kind.to_string()).or_insert(0) += 1;
        }
    }

    ReconSummary {
        total_orders: outcome.orders.len(),
        successful: outcome.successful_orders.len(),
        failed: outcome.failed_orders.len(),
        action_required: outcome.action_required_orders.len(),
        retry_successes: outcome.retry_success_orders.len(),
        rejected_after_auth: outcome.rejected_orders.len(),
        data_inconsistencies: outcome.data_inconsistencies.len(),
        amount_mismatches: outcome.amount_mismatches.len(),
        action_reason_counts,
        failure_kind_counts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::model::{
        ActionReason, AuthStatus, ClassificationState, FailureKind, OrderClassification,
        OrderState,
    };

    fn classification(
        id: &str,
        state: ClassificationState,
        reason: Option<ActionReason>,
        kind: Option<FailureKind>,
    ) -> OrderClassification {
        OrderClassification {
            order_id: id.to_string(),
            state,
            action_reason: reason,
            failure_kind: kind,
            order_state: OrderState::Success,
            fulfillment_status: None,
            payment_reference_no: None,
            auth_status: AuthStatus::NoData,
            is_settled: false,
            is_data_issue: false,
            has_settlement_anomaly: false,
            shipment_confirmed: false,
            settled_net_cents: None,
            order_total_cents: None,
            is_retry_success: false,
            previous_failed_attempt: None,
        }
    }

    #[test]
    fn summary_counts() {
        let mut orders = BTreeMap::new();
        orders.insert(
            "A".to_string(),
            classification("A", ClassificationState::Success, None, None),
        );
        orders.insert(
            "B".to_string(),
            classification(
                "B",
                ClassificationState::ActionRequired,
                Some(ActionReason::ShippedNotSettled),
                None,
            ),
        );
        orders.insert(
            "C".to_string(),
            classification(
                "C",
                ClassificationState::ActionRequired,
                Some(ActionReason::ShippedNotSettled),
                None,
            ),
        );
        orders.insert(
            "D".to_string(),
            classification(
                "D",
                ClassificationState::Failed,
                None,
                Some(FailureKind::Declined),
            ),
        );

        let outcome = ClassificationOutcome {
            orders,
            successful_orders: vec!["A".into()],
            failed_orders: vec!["D".into()],
            action_required_orders: vec!["B".into(), "C".into()],
            retry_success_orders: vec!["A".into()],
            rejected_orders: Vec::new(),
            data_inconsistencies: Vec::new(),
            amount_mismatches: Vec::new(),
        };

        let summary = compute_summary(&outcome);
        assert_eq!(summary.total_orders, 4);
        assert_eq!(summary.successful, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.action_required, 2);
        assert_eq!(summary.retry_successes, 1);
        assert_eq!(summary.action_reason_counts["SHIPPED_NOT_SETTLED"], 2);
        assert_eq!(summary.failure_kind_counts["DECLINED"], 1);
    }
}
