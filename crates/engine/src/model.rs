use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDateTime;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// A single raw row from any collaborator: DB export or gateway batch CSV,
/// keyed by column name. Normalized into typed records exactly once at the
/// engine boundary.
pub type RawRow = HashMap<String, String>;

/// Which gateway batch a row set belongs to. Used in error and log context so
/// an operator can tell which source file to fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    Current,
    Settled,
}

impl std::fmt::Display for BatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Current => write!(f, "Converge CURRENT"),
            Self::Settled => write!(f, "Converge SETTLED"),
        }
    }
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// Order lifecycle status as recorded by the order-management DB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderState {
    Success,
    Error,
    PaymentCancelled,
    Other(String),
}

impl OrderState {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "SUCCESS" => Self::Success,
            "ERROR" => Self::Error,
            "PAYMENT_CANCELLED" => Self::PaymentCancelled,
            other => Self::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "SUCCESS"),
            Self::Error => write!(f, "ERROR"),
            Self::PaymentCancelled => write!(f, "PAYMENT_CANCELLED"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

impl Serialize for OrderState {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Fulfillment status derived from the order-items collection. An order's
/// status is its most advanced item: SHIPPED beats CLAIMED beats ORDERED;
/// REJECTED only surfaces when nothing progressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FulfillmentStatus {
    Shipped,
    Claimed,
    Ordered,
    Rejected,
    Other(String),
}

impl FulfillmentStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "SHIPPED" => Self::Shipped,
            "CLAIMED" => Self::Claimed,
            "ORDERED" => Self::Ordered,
            "REJECTED" => Self::Rejected,
            other => Self::Other(other.to_string()),
        }
    }

    /// Priority rank when merging multiple items for one order.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Shipped => 4,
            Self::Claimed => 3,
            Self::Ordered => 2,
            Self::Rejected => 1,
            Self::Other(_) => 0,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Ordered | Self::Claimed)
    }
}

impl std::fmt::Display for FulfillmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Shipped => write!(f, "SHIPPED"),
            Self::Claimed => write!(f, "CLAIMED"),
            Self::Ordered => write!(f, "ORDERED"),
            Self::Rejected => write!(f, "REJECTED"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

impl Serialize for FulfillmentStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A normalized sales order. Read-only to the engine apart from the derived
/// `fulfillment_status`, which is attached before classification.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub process_number: String,
    pub notif_email: Option<String>,
    pub notify_mobile_no: Option<String>,
    pub order_date: Option<NaiveDateTime>,
    pub order_state: OrderState,
    pub fulfillment_status: Option<FulfillmentStatus>,
    pub payment_reference_no: Option<String>,
}

impl Order {
    /// Customer identity key for retry correlation: email when present,
    /// else mobile number. `None` excludes the order from retry analysis.
    pub fn customer_key(&self) -> Option<&str> {
        self.notif_email
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.notify_mobile_no.as_deref().filter(|s| !s.is_empty()))
    }
}

// ---------------------------------------------------------------------------
// Authorization batch
// ---------------------------------------------------------------------------

/// Normalized authorization outcome for one invoice, chosen from the raw
/// per-row messages by fixed priority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStatus {
    Approval,
    DeclinedNsf,
    DeclinedClosed,
    SuspectedFraud,
    WithdrawalLimit,
    /// Any other DECLINED* message, verbatim.
    Declined(String),
    /// Fallback: first-seen message outside the priority list.
    Other(String),
    /// Invoice absent from the batch, or no non-empty messages.
    NoData,
}

impl AuthStatus {
    pub fn is_approval(&self) -> bool {
        matches!(self, Self::Approval)
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData)
    }

    /// Declined family: typed DECLINED variants plus any stray message
    /// carrying DECLINED somewhere inside it.
    pub fn is_declined(&self) -> bool {
        match self {
            Self::DeclinedNsf | Self::DeclinedClosed | Self::Declined(_) => true,
            Self::Other(msg) => msg.contains("DECLINED"),
            _ => false,
        }
    }

    pub fn is_fraud(&self) -> bool {
        matches!(self, Self::SuspectedFraud)
    }
}

impl std::fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Approval => write!(f, "APPROVAL"),
            Self::DeclinedNsf => write!(f, "DECLINED:NSF"),
            Self::DeclinedClosed => write!(f, "DECLINED:CLOSED"),
            Self::SuspectedFraud => write!(f, "SUSPECTED FRAUD"),
            Self::WithdrawalLimit => write!(f, "WITHDRAWAL LIMIT"),
            Self::Declined(msg) | Self::Other(msg) => write!(f, "{msg}"),
            Self::NoData => write!(f, "NA"),
        }
    }
}

impl Serialize for AuthStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One invoice's resolved authorization data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorizationRecord {
    pub final_status: AuthStatus,
    /// More than one distinct non-empty message — inconsistent or duplicate
    /// submission, surfaced to the classifier rather than resolved here.
    pub is_data_issue: bool,
    /// Distinct messages in first-seen order.
    pub messages: Vec<String>,
    /// Per-row messages in input order; blank rows recorded as "NA".
    pub sequence: Vec<String>,
    pub row_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuthorizationStats {
    pub total_invoices: usize,
    pub data_inconsistencies: usize,
}

/// Resolved authorization ("current") batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorizationBatch {
    pub invoices: BTreeMap<String, AuthorizationRecord>,
    pub summary: Option<BatchSummary>,
    pub stats: AuthorizationStats,
}

impl AuthorizationBatch {
    pub fn record(&self, invoice: &str) -> Option<&AuthorizationRecord> {
        self.invoices.get(invoice)
    }
}

// ---------------------------------------------------------------------------
// Settlement batch
// ---------------------------------------------------------------------------

/// Why a settlement invoice needs a human look.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnomalyReason {
    MultipleSales(usize),
    ReturnWithoutSale,
    NonStandardTypes(Vec<String>),
}

impl std::fmt::Display for AnomalyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MultipleSales(n) => write!(f, "MULTIPLE_SALES:{n}"),
            Self::ReturnWithoutSale => write!(f, "RETURN_WITHOUT_SALE"),
            Self::NonStandardTypes(types) => {
                write!(f, "NON_STANDARD_TYPES:{}", types.join(","))
            }
        }
    }
}

impl Serialize for AnomalyReason {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One invoice's resolved settlement data. Amounts are cents; rows whose
/// amount failed lenient parsing contribute nothing to the sums.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlementRecord {
    /// At least one SALE row. RETURN rows alone never settle an invoice.
    pub settled: bool,
    pub sale_count: usize,
    pub return_count: usize,
    pub other_count: usize,
    pub sale_amount_cents: i64,
    pub return_amount_cents: i64,
    pub net_amount_cents: i64,
    pub has_anomaly: bool,
    pub anomaly_reasons: Vec<AnomalyReason>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SettlementStats {
    pub total_invoices: usize,
    pub settled_count: usize,
    pub anomaly_count: usize,
    pub multiple_sales_count: usize,
}

/// Resolved settlement ("settled") batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlementBatch {
    pub invoices: BTreeMap<String, SettlementRecord>,
    pub summary: Option<BatchSummary>,
    pub stats: SettlementStats,
}

impl SettlementBatch {
    pub fn record(&self, invoice: &str) -> Option<&SettlementRecord> {
        self.invoices.get(invoice)
    }
}

/// Trailing totals row some gateway exports append: empty invoice number,
/// populated "Sales Count". Captured for the report, excluded from grouping.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub sales_count: Option<i64>,
    pub total_sales_cents: Option<i64>,
    pub returns_count: Option<i64>,
    pub total_returns_cents: Option<i64>,
    pub net_sales_cents: Option<i64>,
    pub others_count: Option<i64>,
    pub total_count: Option<i64>,
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Final business outcome for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClassificationState {
    Success,
    Failed,
    ActionRequired,
}

impl std::fmt::Display for ClassificationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "SUCCESS"),
            Self::Failed => write!(f, "FAILED"),
            Self::ActionRequired => write!(f, "ACTION_REQUIRED"),
        }
    }
}

/// Why an order needs manual action — or, for the two informational variants
/// (`ConvergeDataInconsistency`, `OrderRejected`), what a SUCCESS order still
/// carries as a note for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionReason {
    CxpErrorState,
    NoPaymentData,
    AsnNotSettled,
    ShippedNotSettled,
    PaymentSuccessOrderFailed,
    SettlementAnomaly,
    SettlementAmountMismatch,
    SettledNoAsn,
    ConvergeDataInconsistency,
    OrderRejected,
}

impl std::fmt::Display for ActionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            Self::CxpErrorState => "CXP_ERROR_STATE",
            Self::NoPaymentData => "NO_PAYMENT_DATA",
            Self::AsnNotSettled => "ASN_NOT_SETTLED",
            Self::ShippedNotSettled => "SHIPPED_NOT_SETTLED",
            Self::PaymentSuccessOrderFailed => "PAYMENT_SUCCESS_ORDER_FAILED",
            Self::SettlementAnomaly => "SETTLEMENT_ANOMALY",
            Self::SettlementAmountMismatch => "SETTLEMENT_AMOUNT_MISMATCH",
            Self::SettledNoAsn => "SETTLED_NO_ASN",
            Self::ConvergeDataInconsistency => "CONVERGE_DATA_INCONSISTENCY",
            Self::OrderRejected => "ORDER_REJECTED",
        };
        write!(f, "{tag}")
    }
}

/// Failure sub-category for statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    PaymentCancelled,
    Declined,
    SuspectedFraud,
    /// Fell through the whole chain with no success or decline signal.
    Unmatched,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            Self::PaymentCancelled => "PAYMENT_CANCELLED",
            Self::Declined => "DECLINED",
            Self::SuspectedFraud => "SUSPECTED_FRAUD",
            Self::Unmatched => "UNMATCHED",
        };
        write!(f, "{tag}")
    }
}

/// Per-order classification plus every diagnostic the report needs, so no
/// business rule is ever re-derived downstream.
#[derive(Debug, Clone, Serialize)]
pub struct OrderClassification {
    pub order_id: String,
    pub state: ClassificationState,
    pub action_reason: Option<ActionReason>,
    pub failure_kind: Option<FailureKind>,
    pub order_state: OrderState,
    pub fulfillment_status: Option<FulfillmentStatus>,
    pub payment_reference_no: Option<String>,
    pub auth_status: AuthStatus,
    pub is_settled: bool,
    pub is_data_issue: bool,
    pub has_settlement_anomaly: bool,
    pub shipment_confirmed: bool,
    pub settled_net_cents: Option<i64>,
    pub order_total_cents: Option<i64>,
    pub is_retry_success: bool,
    pub previous_failed_attempt: Option<String>,
}

/// A settled-vs-ordered amount discrepancy beyond tolerance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AmountMismatch {
    pub order_id: String,
    pub order_total_cents: i64,
    pub settled_cents: i64,
    /// settled − total, signed.
    pub difference_cents: i64,
}

/// Everything the classifier (plus retry pass) produced for one run.
/// `successful_orders` / `failed_orders` / `action_required_orders` partition
/// the input order set; the remaining lists are diagnostic overlays.
#[derive(Debug, Clone, Serialize)]
pub struct ClassificationOutcome {
    pub orders: BTreeMap<String, OrderClassification>,
    pub successful_orders: Vec<String>,
    pub failed_orders: Vec<String>,
    pub action_required_orders: Vec<String>,
    pub retry_success_orders: Vec<String>,
    pub rejected_orders: Vec<String>,
    pub data_inconsistencies: Vec<String>,
    pub amount_mismatches: Vec<AmountMismatch>,
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ReconSummary {
    pub total_orders: usize,
    pub successful: usize,
    pub failed: usize,
    pub action_required: usize,
    pub retry_successes: usize,
    pub rejected_after_auth: usize,
    pub data_inconsistencies: usize,
    pub amount_mismatches: usize,
    pub action_reason_counts: BTreeMap<String, usize>,
    pub failure_kind_counts: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
}

/// Unit handed to the presentation collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct ReconResult {
    pub meta: ReconMeta,
    pub summary: ReconSummary,
    pub classification: ClassificationOutcome,
    pub authorizations: AuthorizationBatch,
    pub settlements: SettlementBatch,
}
