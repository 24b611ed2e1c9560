use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{BillingError, BillingResult};
use crate::models::{
    common::{plan_catalog, PlanInfo, PlanTier},
    payment::{Checkout, CheckoutStatus, PaymentOutcome, PaymentRequest},
    subscription::{PlanStatus, SubscriptionStatusResponse},
    user::User,
};
use crate::pix::{self, Merchant};
use crate::services::{database::DatabaseService, gateway::PaymentGateway};

/// The signed-in user a lifecycle operation acts for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    pub user_id: Uuid,
    pub started_at: DateTime<Utc>,
}

/// Drives users through FREE -> AWAITING_PAYMENT -> PREMIUM_ACTIVE -> EXPIRED.
///
/// Open checkouts are held in memory; only a confirmed payment touches the
/// user store. Finished checkouts are dropped by
/// [`PlanLifecycleManager::evict_finished_checkouts`].
#[derive(Clone)]
pub struct PlanLifecycleManager {
    db: DatabaseService,
    gateway: Arc<dyn PaymentGateway>,
    merchant: Merchant,
    payment_timeout: Duration,
    checkouts: Arc<RwLock<HashMap<Uuid, Checkout>>>,
}

impl PlanLifecycleManager {
    pub fn new(
        db: DatabaseService,
        gateway: Arc<dyn PaymentGateway>,
        merchant: Merchant,
        payment_timeout: Duration,
    ) -> Self {
        Self {
            db,
            gateway,
            merchant,
            payment_timeout,
            checkouts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn database(&self) -> &DatabaseService {
        &self.db
    }

    pub fn plans(&self) -> Vec<PlanInfo> {
        plan_catalog()
    }

    /// Signs the user in and mirrors their record under the session key.
    pub async fn open_session(&self, user_id: Uuid) -> BillingResult<SessionContext> {
        let user = self.load_user(&user_id).await?;
        self.db.start_session(&user).await?;
        Ok(SessionContext {
            user_id,
            started_at: Utc::now(),
        })
    }

    /// Resolves the acting user without touching the store.
    pub async fn load_session(&self, user_id: Uuid) -> BillingResult<SessionContext> {
        self.load_user(&user_id).await?;
        Ok(SessionContext {
            user_id,
            started_at: Utc::now(),
        })
    }

    /// Opens a checkout for `tier` and renders its PIX payload. Any other
    /// checkout still awaiting payment for this user is cancelled.
    pub async fn select_plan(&self, session: &SessionContext, tier: PlanTier) -> BillingResult<Checkout> {
        self.load_user(&session.user_id).await?;

        let payload = pix::encode(tier.price(), &self.merchant);
        let checkout = Checkout::new(session.user_id, tier, payload);

        let mut checkouts = self.checkouts.write().await;
        for existing in checkouts.values_mut() {
            if existing.user_id == session.user_id && existing.status == CheckoutStatus::AwaitingPayment {
                existing.update_status(CheckoutStatus::Cancelled, Some("Superseded by a new checkout".to_string()));
            }
        }
        checkouts.insert(checkout.id, checkout.clone());

        log::info!(
            "Checkout {} opened for user {}: {} at {}",
            checkout.id,
            session.user_id,
            tier,
            checkout.amount
        );
        Ok(checkout)
    }

    pub async fn get_checkout(&self, session: &SessionContext, checkout_id: Uuid) -> BillingResult<Checkout> {
        let checkouts = self.checkouts.read().await;
        checkouts
            .get(&checkout_id)
            .filter(|c| c.user_id == session.user_id)
            .cloned()
            .ok_or(BillingError::CheckoutNotFound(checkout_id))
    }

    /// The "I have paid" action. Grants the plan only on a successful
    /// settlement; a declined or timed-out payment leaves the stored user
    /// untouched. Confirming an already confirmed checkout is a no-op.
    ///
    /// Settlement runs on its own task, so dropping the returned future does
    /// not leave the checkout stuck in `Processing`.
    pub async fn confirm_payment(&self, session: &SessionContext, checkout_id: Uuid) -> BillingResult<User> {
        let (request, tier) = {
            let mut checkouts = self.checkouts.write().await;
            let checkout = checkouts
                .get_mut(&checkout_id)
                .filter(|c| c.user_id == session.user_id)
                .ok_or(BillingError::CheckoutNotFound(checkout_id))?;

            let status = checkout.status;
            match status {
                CheckoutStatus::Confirmed => {
                    drop(checkouts);
                    log::info!("Checkout {} already confirmed", checkout_id);
                    return self.load_user(&session.user_id).await;
                }
                CheckoutStatus::Processing => return Err(BillingError::CheckoutInProgress(checkout_id)),
                CheckoutStatus::Declined | CheckoutStatus::Cancelled => {
                    return Err(BillingError::CheckoutClosed(checkout_id))
                }
                CheckoutStatus::AwaitingPayment => {
                    checkout.update_status(CheckoutStatus::Processing, None);
                    (checkout.payment_request(), checkout.plan)
                }
            }
        };

        let manager = self.clone();
        let session = session.clone();
        let settlement = tokio::spawn(async move { manager.settle(&session, checkout_id, request, tier).await });

        match settlement.await {
            Ok(result) => result,
            Err(e) => {
                log::error!("Settlement task for checkout {} failed: {}", checkout_id, e);
                self.finish_checkout(
                    checkout_id,
                    CheckoutStatus::AwaitingPayment,
                    Some("Payment settlement was interrupted".to_string()),
                    None,
                )
                .await;
                Err(BillingError::Store(anyhow::anyhow!("settlement task failed: {}", e)))
            }
        }
    }

    async fn settle(
        &self,
        session: &SessionContext,
        checkout_id: Uuid,
        request: PaymentRequest,
        tier: PlanTier,
    ) -> BillingResult<User> {
        let outcome = tokio::time::timeout(self.payment_timeout, self.gateway.confirm(&request))
            .await
            .unwrap_or(PaymentOutcome::TimedOut);

        match outcome {
            PaymentOutcome::Success { payment_id } => {
                match self.apply_payment(session, checkout_id, tier, &payment_id).await {
                    Ok(user) => {
                        self.finish_checkout(checkout_id, CheckoutStatus::Confirmed, None, Some(payment_id))
                            .await;
                        Ok(user)
                    }
                    Err(e) => {
                        self.finish_checkout(checkout_id, CheckoutStatus::AwaitingPayment, Some(e.to_string()), None)
                            .await;
                        Err(e)
                    }
                }
            }
            PaymentOutcome::Declined { reason } => {
                log::warn!("Payment for checkout {} declined: {}", checkout_id, reason);
                self.finish_checkout(checkout_id, CheckoutStatus::Declined, Some(reason.clone()), None)
                    .await;
                Err(BillingError::PaymentDeclined(reason))
            }
            PaymentOutcome::TimedOut => {
                log::warn!("Payment for checkout {} timed out", checkout_id);
                self.finish_checkout(
                    checkout_id,
                    CheckoutStatus::AwaitingPayment,
                    Some("Payment confirmation timed out".to_string()),
                    None,
                )
                .await;
                Err(BillingError::PaymentTimedOut)
            }
        }
    }

    pub async fn cancel_checkout(&self, session: &SessionContext, checkout_id: Uuid) -> BillingResult<Checkout> {
        let mut checkouts = self.checkouts.write().await;
        let checkout = checkouts
            .get_mut(&checkout_id)
            .filter(|c| c.user_id == session.user_id)
            .ok_or(BillingError::CheckoutNotFound(checkout_id))?;

        match checkout.status {
            CheckoutStatus::Processing => return Err(BillingError::CheckoutInProgress(checkout_id)),
            CheckoutStatus::Confirmed => return Err(BillingError::CheckoutClosed(checkout_id)),
            CheckoutStatus::AwaitingPayment => {
                checkout.update_status(CheckoutStatus::Cancelled, Some("Cancelled by user".to_string()));
                log::info!("Checkout {} cancelled", checkout_id);
            }
            CheckoutStatus::Declined | CheckoutStatus::Cancelled => {}
        }
        Ok(checkout.clone())
    }

    /// Reads the user's plan state, demoting them first if the plan ran out.
    pub async fn status(&self, session: &SessionContext) -> BillingResult<SubscriptionStatusResponse> {
        let now = Utc::now();
        let mut demoted = false;
        let user = self
            .db
            .modify_user(&session.user_id, |user| {
                demoted = user.demote_if_expired(now);
                demoted
            })
            .await?
            .ok_or(BillingError::UserNotFound(session.user_id))?;

        if demoted {
            log::info!("Premium expired for user {}", user.id);
        }

        let pending_checkout_id = {
            let checkouts = self.checkouts.read().await;
            checkouts
                .values()
                .filter(|c| {
                    c.user_id == user.id
                        && matches!(c.status, CheckoutStatus::AwaitingPayment | CheckoutStatus::Processing)
                })
                .max_by_key(|c| c.created_at)
                .map(|c| c.id)
        };

        let status = if pending_checkout_id.is_some() {
            PlanStatus::AwaitingPayment
        } else if user.has_active_plan(now) {
            PlanStatus::PremiumActive
        } else if user.plan.is_some() {
            PlanStatus::Expired
        } else {
            PlanStatus::Free
        };

        let days_until_expiry = user
            .plan
            .as_ref()
            .filter(|_| user.has_active_plan(now))
            .map(|plan| plan.days_until_expiry(now));

        Ok(SubscriptionStatusResponse {
            user_id: user.id,
            status,
            is_premium: user.is_premium,
            plan: user.plan,
            days_until_expiry,
            pending_checkout_id,
        })
    }

    /// Drops confirmed, declined and cancelled checkouts last touched more
    /// than `ttl` before `now`. Returns how many were removed.
    pub async fn evict_finished_checkouts(&self, ttl: Duration, now: DateTime<Utc>) -> usize {
        let mut checkouts = self.checkouts.write().await;
        let before = checkouts.len();
        checkouts.retain(|_, c| {
            let aged_out = (now - c.updated_at).to_std().map(|age| age >= ttl).unwrap_or(false);
            !(c.is_final_status() && aged_out)
        });
        before - checkouts.len()
    }

    /// Activates `tier` under the user lock. A payment id that is already the
    /// user's current plan, or that settled another checkout, is not granted
    /// again.
    async fn apply_payment(
        &self,
        session: &SessionContext,
        checkout_id: Uuid,
        tier: PlanTier,
        payment_id: &str,
    ) -> BillingResult<User> {
        let settled_elsewhere = {
            let checkouts = self.checkouts.read().await;
            checkouts.values().any(|c| {
                c.id != checkout_id
                    && c.status == CheckoutStatus::Confirmed
                    && c.payment_id.as_deref() == Some(payment_id)
            })
        };

        let mut granted = false;
        let user = self
            .db
            .modify_user(&session.user_id, |user| {
                let already_applied = user.plan.as_ref().map_or(false, |p| p.payment_id == payment_id);
                if settled_elsewhere || already_applied {
                    return false;
                }
                user.activate_plan(tier, payment_id.to_string(), Utc::now());
                granted = true;
                true
            })
            .await?
            .ok_or(BillingError::UserNotFound(session.user_id))?;

        if granted {
            log::info!(
                "User {} is premium on {} until {}",
                user.id,
                tier,
                user.plan.as_ref().map(|p| p.expires_at.to_rfc3339()).unwrap_or_default()
            );
        } else {
            log::warn!("Payment {} was already applied, not granting again", payment_id);
        }
        Ok(user)
    }

    async fn finish_checkout(
        &self,
        checkout_id: Uuid,
        status: CheckoutStatus,
        failure_reason: Option<String>,
        payment_id: Option<String>,
    ) {
        let mut checkouts = self.checkouts.write().await;
        if let Some(checkout) = checkouts.get_mut(&checkout_id) {
            checkout.update_status(status, failure_reason);
            if payment_id.is_some() {
                checkout.payment_id = payment_id;
            }
        }
    }

    async fn load_user(&self, user_id: &Uuid) -> BillingResult<User> {
        self.db
            .get_user(user_id)
            .await?
            .ok_or(BillingError::UserNotFound(*user_id))
    }
}
