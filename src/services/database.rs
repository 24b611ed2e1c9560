use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{BillingError, BillingResult};
use crate::models::user::{CreateUserRequest, User};

pub const USERS_PREFIX: &str = "onlipet:users:";
pub const SESSION_KEY: &str = "onlipet:session";

pub fn user_key(user_id: &Uuid) -> String {
    format!("{}{}", USERS_PREFIX, user_id)
}

/// Key-value boundary for user records. Last write wins.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<User>>;
    async fn set(&self, key: &str, user: &User) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
    async fn keys(&self, prefix: &str) -> Result<Vec<String>>;
}

#[derive(Clone, Default)]
pub struct InMemoryUserStore {
    records: Arc<Mutex<HashMap<String, User>>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn get(&self, key: &str) -> Result<Option<User>> {
        Ok(self.records.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, user: &User) -> Result<()> {
        self.records.lock().await.insert(key.to_string(), user.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.records.lock().await.remove(key);
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let records = self.records.lock().await;
        Ok(records.keys().filter(|k| k.starts_with(prefix)).cloned().collect())
    }
}

/// Persists the whole map as one JSON document, rewritten on every change.
#[derive(Clone)]
pub struct JsonFileUserStore {
    path: PathBuf,
    records: Arc<Mutex<HashMap<String, User>>>,
}

impl JsonFileUserStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let records: HashMap<String, User> = match tokio::fs::read(&path).await {
            Ok(bytes) if !bytes.is_empty() => serde_json::from_slice(&bytes)
                .with_context(|| format!("Corrupt user store at {}", path.display()))?,
            Ok(_) => HashMap::new(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
        };

        log::info!("Opened user store at {} ({} records)", path.display(), records.len());

        Ok(Self {
            path,
            records: Arc::new(Mutex::new(records)),
        })
    }

    async fn flush(&self, records: &HashMap<String, User>) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(records)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for JsonFileUserStore {
    async fn get(&self, key: &str) -> Result<Option<User>> {
        Ok(self.records.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, user: &User) -> Result<()> {
        let mut records = self.records.lock().await;
        records.insert(key.to_string(), user.clone());
        self.flush(&records).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut records = self.records.lock().await;
        if records.remove(key).is_some() {
            self.flush(&records).await?;
        }
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let records = self.records.lock().await;
        Ok(records.keys().filter(|k| k.starts_with(prefix)).cloned().collect())
    }
}

/// User directory on top of a [`UserStore`]: one record per user plus a
/// mirror of the signed-in user under [`SESSION_KEY`].
///
/// Read-modify-write of a user record goes through [`DatabaseService::modify_user`],
/// which holds a per-user lock across the read and the write.
#[derive(Clone)]
pub struct DatabaseService {
    store: Arc<dyn UserStore>,
    user_locks: Arc<std::sync::Mutex<HashMap<Uuid, Arc<Mutex<()>>>>>,
}

impl DatabaseService {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self {
            store,
            user_locks: Arc::new(std::sync::Mutex::new(HashMap::new())),
        }
    }

    fn user_lock(&self, user_id: &Uuid) -> Arc<Mutex<()>> {
        let mut locks = self
            .user_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(locks.entry(*user_id).or_default())
    }

    /// Re-reads the user under its lock, applies `change`, and writes the
    /// record back only when `change` reports a modification. Returns the
    /// record as stored afterwards, or `None` for an unknown user.
    pub async fn modify_user<F>(&self, user_id: &Uuid, change: F) -> BillingResult<Option<User>>
    where
        F: FnOnce(&mut User) -> bool + Send,
    {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        let mut user = match self.store.get(&user_key(user_id)).await? {
            Some(user) => user,
            None => return Ok(None),
        };

        if change(&mut user) {
            self.update_user(&user).await?;
        }
        Ok(Some(user))
    }

    pub fn store(&self) -> Arc<dyn UserStore> {
        Arc::clone(&self.store)
    }

    pub async fn create_user(&self, request: CreateUserRequest) -> BillingResult<User> {
        if self.get_user_by_email(&request.email).await?.is_some() {
            return Err(BillingError::DuplicateEmail(request.email.to_lowercase()));
        }

        let user = User::new(request.name, request.email, request.role.unwrap_or_default());
        self.store.set(&user_key(&user.id), &user).await?;

        log::info!("Created user {} ({})", user.email, user.id);
        Ok(user)
    }

    pub async fn get_user(&self, user_id: &Uuid) -> BillingResult<Option<User>> {
        Ok(self.store.get(&user_key(user_id)).await?)
    }

    pub async fn get_user_by_email(&self, email: &str) -> BillingResult<Option<User>> {
        let email = email.to_lowercase();
        for key in self.store.keys(USERS_PREFIX).await? {
            if let Some(user) = self.store.get(&key).await? {
                if user.email == email {
                    return Ok(Some(user));
                }
            }
        }
        Ok(None)
    }

    /// Writes the directory record and, when this user holds the session,
    /// the session mirror.
    pub async fn update_user(&self, user: &User) -> BillingResult<()> {
        self.store.set(&user_key(&user.id), user).await?;

        if let Some(current) = self.store.get(SESSION_KEY).await? {
            if current.id == user.id {
                self.store.set(SESSION_KEY, user).await?;
            }
        }
        Ok(())
    }

    pub async fn start_session(&self, user: &User) -> BillingResult<()> {
        self.store.set(SESSION_KEY, user).await?;
        log::info!("Session started for {} at {}", user.id, Utc::now());
        Ok(())
    }

    pub async fn current_session_user(&self) -> BillingResult<Option<User>> {
        Ok(self.store.get(SESSION_KEY).await?)
    }

    pub async fn end_session(&self) -> BillingResult<()> {
        self.store.delete(SESSION_KEY).await?;
        Ok(())
    }
}
