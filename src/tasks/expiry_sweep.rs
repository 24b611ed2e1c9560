use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::services::database::{DatabaseService, USERS_PREFIX};
use crate::services::subscription::PlanLifecycleManager;

const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Demotes every user whose plan ran out while still flagged premium.
/// Returns how many records were changed.
///
/// Each record is re-read under its user lock, so a plan activated while
/// the sweep is running is never overwritten with the stale one.
pub async fn run_expiry_sweep(db: &DatabaseService, now: DateTime<Utc>) -> anyhow::Result<usize> {
    let mut demoted = 0;

    for key in db.store().keys(USERS_PREFIX).await? {
        let user_id = match key.strip_prefix(USERS_PREFIX).map(Uuid::parse_str) {
            Some(Ok(id)) => id,
            _ => {
                log::warn!("Skipping malformed user key {}", key);
                continue;
            }
        };

        let mut changed = false;
        let result = db
            .modify_user(&user_id, |user| {
                changed = user.demote_if_expired(now);
                changed
            })
            .await;

        match result {
            Ok(_) if changed => {
                demoted += 1;
                log::info!("Premium expired for user {}", user_id);
            }
            Ok(_) => {}
            Err(e) => log::error!("Failed to demote user {}: {}", user_id, e),
        }
    }

    Ok(demoted)
}

/// Runs the expiry sweep and checkout eviction forever at `interval`.
pub async fn start_expiry_sweep(manager: PlanLifecycleManager, interval: Duration, checkout_ttl: Duration) {
    let interval = if interval < MIN_SWEEP_INTERVAL {
        log::warn!("Expiry sweep interval {:?} too short, using {:?}", interval, MIN_SWEEP_INTERVAL);
        MIN_SWEEP_INTERVAL
    } else {
        interval
    };
    let mut ticker = tokio::time::interval(interval);

    loop {
        ticker.tick().await;
        let now = Utc::now();

        match run_expiry_sweep(manager.database(), now).await {
            Ok(0) => log::debug!("Expiry sweep found nothing to demote"),
            Ok(count) => log::info!("Expiry sweep demoted {} user(s)", count),
            Err(e) => log::error!("Expiry sweep failed: {}", e),
        }

        let evicted = manager.evict_finished_checkouts(checkout_ttl, now).await;
        if evicted > 0 {
            log::info!("Evicted {} finished checkout(s)", evicted);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use anyhow::Result;
    use async_trait::async_trait;

    use crate::models::common::{PlanTier, UserRole};
    use crate::models::user::{CreateUserRequest, User};
    use crate::pix::Merchant;
    use crate::services::database::{InMemoryUserStore, UserStore};
    use crate::services::gateway::SimulatedPixGateway;
    use chrono::Duration as ChronoDuration;

    /// Holds back the next `get` once armed, widening the window between a
    /// reader's load and its write.
    struct SlowReadStore {
        inner: InMemoryUserStore,
        armed: AtomicBool,
    }

    #[async_trait]
    impl UserStore for SlowReadStore {
        async fn get(&self, key: &str) -> Result<Option<User>> {
            if self.armed.swap(false, Ordering::SeqCst) {
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
            self.inner.get(key).await
        }
        async fn set(&self, key: &str, user: &User) -> Result<()> {
            self.inner.set(key, user).await
        }
        async fn delete(&self, key: &str) -> Result<()> {
            self.inner.delete(key).await
        }
        async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
            self.inner.keys(prefix).await
        }
    }

    async fn premium_user(db: &DatabaseService, email: &str, tier: PlanTier, activated: DateTime<Utc>) {
        let mut user = db
            .create_user(CreateUserRequest {
                name: "Tutor".to_string(),
                email: email.to_string(),
                role: Some(UserRole::User),
            })
            .await
            .unwrap();
        user.activate_plan(tier, format!("PIX-{}", email.len()), activated);
        db.update_user(&user).await.unwrap();
    }

    #[tokio::test]
    async fn test_sweep_demotes_only_expired() {
        let db = DatabaseService::new(Arc::new(InMemoryUserStore::new()));
        let now = Utc::now();

        premium_user(&db, "old@example.com", PlanTier::Basic, now - ChronoDuration::days(16)).await;
        premium_user(&db, "fresh@example.com", PlanTier::Basic, now - ChronoDuration::days(1)).await;
        premium_user(&db, "yearly@example.com", PlanTier::Elite, now - ChronoDuration::days(200)).await;

        assert_eq!(run_expiry_sweep(&db, now).await.unwrap(), 1);

        let old = db.get_user_by_email("old@example.com").await.unwrap().unwrap();
        let fresh = db.get_user_by_email("fresh@example.com").await.unwrap().unwrap();
        let yearly = db.get_user_by_email("yearly@example.com").await.unwrap().unwrap();
        assert!(!old.is_premium);
        assert!(old.plan.is_some());
        assert!(fresh.is_premium);
        assert!(yearly.is_premium);

        assert_eq!(run_expiry_sweep(&db, now).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sweep_updates_session_mirror() {
        let db = DatabaseService::new(Arc::new(InMemoryUserStore::new()));
        let now = Utc::now();
        premium_user(&db, "old@example.com", PlanTier::Pro, now - ChronoDuration::days(31)).await;

        let user = db.get_user_by_email("old@example.com").await.unwrap().unwrap();
        db.start_session(&user).await.unwrap();

        run_expiry_sweep(&db, now).await.unwrap();
        assert!(!db.current_session_user().await.unwrap().unwrap().is_premium);
    }

    #[tokio::test]
    async fn test_sweep_does_not_undo_concurrent_activation() {
        let store = Arc::new(SlowReadStore {
            inner: InMemoryUserStore::new(),
            armed: AtomicBool::new(false),
        });
        let db = DatabaseService::new(store.clone());
        let now = Utc::now();

        let mut user = db
            .create_user(CreateUserRequest {
                name: "Tutor".to_string(),
                email: "late@example.com".to_string(),
                role: None,
            })
            .await
            .unwrap();
        user.activate_plan(PlanTier::Basic, "PIX-OLD".to_string(), now - ChronoDuration::days(20));
        db.update_user(&user).await.unwrap();

        let manager = PlanLifecycleManager::new(
            db.clone(),
            Arc::new(SimulatedPixGateway::new(Duration::from_millis(10))),
            Merchant::default(),
            Duration::from_secs(1),
        );
        let session = manager.open_session(user.id).await.unwrap();
        let checkout = manager.select_plan(&session, PlanTier::Elite).await.unwrap();

        store.armed.store(true, Ordering::SeqCst);
        let (swept, confirmed) = tokio::join!(
            run_expiry_sweep(&db, Utc::now()),
            manager.confirm_payment(&session, checkout.id)
        );
        swept.unwrap();
        assert!(confirmed.unwrap().is_premium);

        let stored = db.get_user(&user.id).await.unwrap().unwrap();
        assert!(stored.is_premium);
        let plan = stored.plan.unwrap();
        assert_eq!(plan.plan_type, PlanTier::Elite);
        assert_ne!(plan.payment_id, "PIX-OLD");
    }

    #[tokio::test]
    async fn test_sweep_survives_zero_interval() {
        let db = DatabaseService::new(Arc::new(InMemoryUserStore::new()));
        let manager = PlanLifecycleManager::new(
            db,
            Arc::new(SimulatedPixGateway::new(Duration::ZERO)),
            Merchant::default(),
            Duration::from_secs(1),
        );

        let handle = tokio::spawn(start_expiry_sweep(manager, Duration::ZERO, Duration::from_secs(60)));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());
        handle.abort();
    }
}
