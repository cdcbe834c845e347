use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CheckoutStatus {
    Pending,
    /// Payment authorized but not captured yet
    Authorized,
    Paid,
    Declined,
    Canceled,
    Expired,
}

impl CheckoutStatus {
    /// Statuses a checkout may still leave. Stored as SQL literals in the
    /// forward-only update guards.
    pub const OPEN: [CheckoutStatus; 2] = [CheckoutStatus::Pending, CheckoutStatus::Authorized];

    pub fn is_terminal(self) -> bool {
        !Self::OPEN.contains(&self)
    }

    /// Map a provider status word onto the local vocabulary.
    ///
    /// PagBank reports `PAID`, `AUTHORIZED`, `DECLINED`, `CANCELED`, `WAITING`,
    /// `IN_ANALYSIS`, `EXPIRED`; SumUp reports `PAID`, `PENDING`, `FAILED`,
    /// `EXPIRED`. Unknown words count as pending so they never close a checkout.
    pub fn from_provider(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PAID" | "APPROVED" | "SUCCESSFUL" | "COMPLETED" => CheckoutStatus::Paid,
            "AUTHORIZED" | "IN_ANALYSIS" => CheckoutStatus::Authorized,
            "DECLINED" | "FAILED" => CheckoutStatus::Declined,
            "CANCELED" | "CANCELLED" => CheckoutStatus::Canceled,
            "EXPIRED" => CheckoutStatus::Expired,
            _ => CheckoutStatus::Pending,
        }
    }
}

/// One provider checkout session for one purchase attempt. Rows are never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkout {
    /// Provider-issued checkout id
    pub id: String,
    pub app_id: String,
    pub user_id: String,
    /// Price snapshot at checkout creation, in cents
    pub amount_cents: i64,
    pub status: CheckoutStatus,
    pub provider: String,
    /// Last raw status word reported by the provider
    pub provider_status: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct CreateCheckout {
    pub id: String,
    pub app_id: String,
    pub user_id: String,
    pub amount_cents: i64,
    pub provider: String,
}
