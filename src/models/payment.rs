use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;
use rust_decimal::Decimal;

use crate::models::common::PlanTier;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CheckoutStatus {
    AwaitingPayment,
    Processing,
    Confirmed,
    Declined,
    Cancelled,
}

/// A PIX checkout opened for one plan. Lives only in memory until it is
/// confirmed or abandoned.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkout {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan: PlanTier,
    pub amount: Decimal,
    pub pix_payload: String,
    pub status: CheckoutStatus,
    pub payment_id: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What the gateway is asked to settle.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub checkout_id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub pix_payload: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Success { payment_id: String },
    Declined { reason: String },
    TimedOut,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub user_id: Uuid,
    pub plan: String,
}

#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub user_id: Uuid,
}

impl Checkout {
    pub fn new(user_id: Uuid, plan: PlanTier, pix_payload: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            plan,
            amount: plan.price(),
            pix_payload,
            status: CheckoutStatus::AwaitingPayment,
            payment_id: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn update_status(&mut self, status: CheckoutStatus, failure_reason: Option<String>) {
        self.status = status;
        self.failure_reason = failure_reason;
        self.updated_at = Utc::now();
    }

    pub fn payment_request(&self) -> PaymentRequest {
        PaymentRequest {
            checkout_id: self.id,
            user_id: self.user_id,
            amount: self.amount,
            pix_payload: self.pix_payload.clone(),
        }
    }

    pub fn is_final_status(&self) -> bool {
        matches!(
            self.status,
            CheckoutStatus::Confirmed | CheckoutStatus::Declined | CheckoutStatus::Cancelled
        )
    }
}
