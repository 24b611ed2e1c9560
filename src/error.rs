use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use uuid::Uuid;

use crate::models::common::ApiResponse;

#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error("Unknown plan tier: {0}")]
    UnknownPlanTier(String),

    #[error("User {0} not found")]
    UserNotFound(Uuid),

    #[error("Checkout {0} not found")]
    CheckoutNotFound(Uuid),

    #[error("Checkout {0} is already being processed")]
    CheckoutInProgress(Uuid),

    #[error("Checkout {0} can no longer be confirmed")]
    CheckoutClosed(Uuid),

    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    #[error("Payment confirmation timed out")]
    PaymentTimedOut,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("User with email {0} already exists")]
    DuplicateEmail(String),

    #[error("Storage error: {0}")]
    Store(#[from] anyhow::Error),
}

impl ResponseError for BillingError {
    fn status_code(&self) -> StatusCode {
        match self {
            BillingError::UnknownPlanTier(_) | BillingError::Validation(_) => StatusCode::BAD_REQUEST,
            BillingError::UserNotFound(_) | BillingError::CheckoutNotFound(_) => StatusCode::NOT_FOUND,
            BillingError::CheckoutInProgress(_)
            | BillingError::CheckoutClosed(_)
            | BillingError::DuplicateEmail(_) => StatusCode::CONFLICT,
            BillingError::PaymentDeclined(_) => StatusCode::PAYMENT_REQUIRED,
            BillingError::PaymentTimedOut => StatusCode::GATEWAY_TIMEOUT,
            BillingError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            BillingError::Store(e) => {
                log::error!("Storage failure: {:?}", e);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(ApiResponse::<()>::error(message))
    }
}

pub type BillingResult<T> = Result<T, BillingError>;
