use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::common::{PlanTier, UserRole};
use crate::models::subscription::SubscriptionState;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub is_premium: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<SubscriptionState>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 2, max = 100, message = "Name must be between 2 and 100 characters"))]
    pub name: String,

    #[validate(email(message = "Invalid email format"), custom = "validate_email_domain")]
    pub email: String,

    pub role: Option<UserRole>,
}

impl User {
    pub fn new(name: String, email: String, role: UserRole) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            email: email.to_lowercase(),
            role,
            is_premium: false,
            plan: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replaces any previous plan with a fresh one starting at `now`.
    pub fn activate_plan(&mut self, tier: PlanTier, payment_id: String, now: DateTime<Utc>) {
        self.plan = Some(SubscriptionState::activate(tier, payment_id, now));
        self.is_premium = true;
        self.updated_at = now;
    }

    /// Clears the premium flag when the plan has run out. Returns whether
    /// the record changed.
    pub fn demote_if_expired(&mut self, now: DateTime<Utc>) -> bool {
        let expired = self.plan.as_ref().map_or(true, |plan| plan.is_expired_at(now));
        if self.is_premium && expired {
            self.is_premium = false;
            self.updated_at = now;
            return true;
        }
        false
    }

    pub fn has_active_plan(&self, now: DateTime<Utc>) -> bool {
        self.is_premium && self.plan.as_ref().map_or(false, |plan| !plan.is_expired_at(now))
    }
}

fn validate_email_domain(email: &str) -> Result<(), ValidationError> {
    let forbidden_domains = ["tempmail.com", "10minutemail.com"];

    if let Some(domain) = email.split('@').nth(1) {
        if forbidden_domains.contains(&domain.to_lowercase().as_str()) {
            return Err(ValidationError::new("forbidden_email_domain"));
        }
    }

    Ok(())
}
