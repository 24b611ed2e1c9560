use serde::{Deserialize, Serialize};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::error::BillingError;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            error: None,
        }
    }

    pub fn success_with_message(data: T, message: String) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message),
            error: None,
        }
    }

    pub fn error(error: String) -> Self {
        Self {
            success: false,
            data: None,
            message: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    User,
    Ngo,
    Vet,
    Petshop,
    FeedStore,
}

impl Default for UserRole {
    fn default() -> Self {
        UserRole::User
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanTier {
    Basic,
    Pro,
    Elite,
}

impl PlanTier {
    pub const ALL: [PlanTier; 3] = [PlanTier::Basic, PlanTier::Pro, PlanTier::Elite];

    pub fn name(&self) -> &'static str {
        match self {
            PlanTier::Basic => "Plano Básico",
            PlanTier::Pro => "Plano Pro",
            PlanTier::Elite => "Plano Elite",
        }
    }

    pub fn price(&self) -> Decimal {
        match self {
            PlanTier::Basic => Decimal::new(29_90, 2),  // R$29,90
            PlanTier::Pro => Decimal::new(49_90, 2),    // R$49,90
            PlanTier::Elite => Decimal::new(299_90, 2), // R$299,90
        }
    }

    pub fn duration_days(&self) -> i64 {
        match self {
            PlanTier::Basic => 15,
            PlanTier::Pro => 30,
            PlanTier::Elite => 365,
        }
    }

    pub fn info(&self) -> PlanInfo {
        PlanInfo {
            tier: *self,
            name: self.name().to_string(),
            price: self.price(),
            duration_days: self.duration_days(),
        }
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanTier::Basic => write!(f, "BASIC"),
            PlanTier::Pro => write!(f, "PRO"),
            PlanTier::Elite => write!(f, "ELITE"),
        }
    }
}

impl FromStr for PlanTier {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BASIC" => Ok(PlanTier::Basic),
            "PRO" => Ok(PlanTier::Pro),
            "ELITE" => Ok(PlanTier::Elite),
            _ => Err(BillingError::UnknownPlanTier(s.to_string())),
        }
    }
}

/// Catalog entry as shown on the plans screen.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlanInfo {
    #[serde(rename = "type")]
    pub tier: PlanTier,
    pub name: String,
    pub price: Decimal,
    pub duration_days: i64,
}

pub fn plan_catalog() -> Vec<PlanInfo> {
    PlanTier::ALL.iter().map(PlanTier::info).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_reference_data() {
        assert_eq!(PlanTier::Basic.duration_days(), 15);
        assert_eq!(PlanTier::Pro.duration_days(), 30);
        assert_eq!(PlanTier::Elite.duration_days(), 365);
        assert_eq!(PlanTier::Basic.price().to_string(), "29.90");
        assert_eq!(PlanTier::Pro.price().to_string(), "49.90");
    }

    #[test]
    fn test_plan_tier_parsing() {
        assert_eq!("pro".parse::<PlanTier>().unwrap(), PlanTier::Pro);
        assert_eq!(" ELITE ".parse::<PlanTier>().unwrap(), PlanTier::Elite);
        assert!(matches!(
            "PLATINUM".parse::<PlanTier>(),
            Err(BillingError::UnknownPlanTier(tier)) if tier == "PLATINUM"
        ));
    }

    #[test]
    fn test_plan_tier_serde_names() {
        assert_eq!(serde_json::to_string(&PlanTier::Basic).unwrap(), "\"BASIC\"");
        assert!(serde_json::from_str::<PlanTier>("\"GOLD\"").is_err());
        assert_eq!(serde_json::to_string(&UserRole::FeedStore).unwrap(), "\"FEED_STORE\"");
    }

    #[test]
    fn test_catalog_lists_every_tier() {
        let catalog = plan_catalog();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog[1].tier, PlanTier::Pro);
        assert_eq!(catalog[1].name, "Plano Pro");
    }
}
