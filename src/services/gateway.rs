use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::payment::{PaymentOutcome, PaymentRequest};

/// Settles a PIX checkout. Implementations never mutate user state; the
/// caller applies the outcome.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn confirm(&self, request: &PaymentRequest) -> PaymentOutcome;
}

/// Stands in for the bank: waits a fixed delay and then answers.
#[derive(Clone)]
pub struct SimulatedPixGateway {
    delay: Duration,
    scripted: Option<PaymentOutcome>,
}

impl SimulatedPixGateway {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            scripted: None,
        }
    }

    /// Always answers `outcome` after the delay.
    pub fn scripted(delay: Duration, outcome: PaymentOutcome) -> Self {
        Self {
            delay,
            scripted: Some(outcome),
        }
    }
}

pub fn generate_payment_id() -> String {
    let token = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("PIX-{}", &token[..12])
}

#[async_trait]
impl PaymentGateway for SimulatedPixGateway {
    async fn confirm(&self, request: &PaymentRequest) -> PaymentOutcome {
        log::info!(
            "Awaiting PIX settlement for checkout {} (amount {})",
            request.checkout_id,
            request.amount
        );

        tokio::time::sleep(self.delay).await;

        let outcome = match &self.scripted {
            Some(outcome) => outcome.clone(),
            None => PaymentOutcome::Success {
                payment_id: generate_payment_id(),
            },
        };

        log::info!("Checkout {} settled: {:?}", request.checkout_id, outcome);
        outcome
    }
}
