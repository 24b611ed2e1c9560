use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc, Duration};
use rust_decimal::Decimal;

use crate::models::common::PlanTier;

/// Where a user stands in the plan lifecycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanStatus {
    Free,
    AwaitingPayment,
    PremiumActive,
    Expired,
}

/// The plan embedded in a user record. Replaced wholesale on every
/// confirmed payment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionState {
    #[serde(rename = "type")]
    pub plan_type: PlanTier,
    pub name: String,
    pub price: Decimal,
    pub expires_at: DateTime<Utc>,
    pub payment_id: String,
    pub transaction_date: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStatusResponse {
    pub user_id: uuid::Uuid,
    pub status: PlanStatus,
    pub is_premium: bool,
    pub plan: Option<SubscriptionState>,
    pub days_until_expiry: Option<i64>,
    pub pending_checkout_id: Option<uuid::Uuid>,
}

const SECONDS_PER_DAY: i64 = 86_400;

impl SubscriptionState {
    pub fn activate(plan_type: PlanTier, payment_id: String, transaction_date: DateTime<Utc>) -> Self {
        Self {
            plan_type,
            name: plan_type.name().to_string(),
            price: plan_type.price(),
            expires_at: transaction_date + Duration::days(plan_type.duration_days()),
            payment_id,
            transaction_date,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Whole days left, counting a partial day as one. Zero once expired.
    pub fn days_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        let seconds = self.expires_at.signed_duration_since(now).num_seconds();
        if seconds <= 0 {
            0
        } else {
            (seconds + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY
        }
    }
}
