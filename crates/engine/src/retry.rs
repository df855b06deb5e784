//! Retry detection — correlates failed and successful attempts by the same
//! customer across time.
//!
//! One-hop adjacent-pair scan over each customer's date-sorted attempts, not
//! an all-pairs search: only the immediately-preceding failure links to a
//! success, which matches single-retry recovery patterns. Chained retries
//! each link to their own immediate predecessor.

use std::collections::HashMap;

use chrono::NaiveDateTime;

use crate::model::{ClassificationOutcome, ClassificationState, Order};

/// Mark retry successes in place. Orders without a customer identity key
/// (email, else phone) or without a parseable order date are excluded.
pub fn detect_retries(
    orders: &[Order],
    outcome: &mut ClassificationOutcome,
    window_days: i64,
) {
    let mut by_customer: HashMap<&str, Vec<(NaiveDateTime, &str)>> = HashMap::new();

    for order in orders {
        let (Some(key), Some(date)) = (order.customer_key(), order.order_date) else {
            continue;
        };
        by_customer
            .entry(key)
            .or_default()
            .push((date, order.process_number.as_str()));
    }

    for (customer, mut attempts) in by_customer {
        if attempts.len() < 2 {
            continue;
        }
        // Id tie-break keeps same-timestamp attempts deterministic.
        attempts.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));

        for pair in attempts.windows(2) {
            let (prev_date, prev_id) = pair[0];
            let (next_date, next_id) = pair[1];

            let prev_state = match outcome.orders.get(prev_id) {
                Some(c) => c.state,
                None => continue,
            };
            let next_state = match outcome.orders.get(next_id) {
                Some(c) => c.state,
                None => continue,
            };

            let recovered = matches!(
                prev_state,
                ClassificationState::Failed | ClassificationState::ActionRequired
            ) && next_state == ClassificationState::Success;

            if !recovered {
                continue;
            }
            if (next_date - prev_date).num_days() > window_days {
                continue;
            }

            let entry = outcome
                .orders
                .get_mut(next_id)
                .expect("classification exists for scanned order");
            entry.is_retry_success = true;
            entry.previous_failed_attempt = Some(prev_id.to_string());
            outcome.retry_success_orders.push(next_id.to_string());

            tracing::info!(customer, order = next_id, previous = prev_id, "retry success detected");
        }
    }

    outcome.retry_success_orders.sort();
    outcome.retry_success_orders.dedup();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
