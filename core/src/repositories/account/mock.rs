//! Mock implementation of AccountRepository for testing

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::entities::account::Account;
use crate::domain::entities::pending_operation::TokenPurpose;
use crate::errors::DomainError;

use super::trait_::AccountRepository;

/// Mock account repository for testing
///
/// Tracks write counts and supports failure injection so tests can assert
/// exactly-once clearing and rollback behavior.
pub struct MockAccountRepository {
    accounts: Arc<RwLock<HashMap<Uuid, Account>>>,
    update_calls: AtomicUsize,
    clear_calls: AtomicUsize,
    effective_clears: AtomicUsize,
    fail_updates: AtomicBool,
    fail_clears: AtomicBool,
    update_delay_ms: AtomicU64,
}

impl MockAccountRepository {
    /// Create a new mock repository
    pub fn new() -> Self {
        Self {
            accounts: Arc::new(RwLock::new(HashMap::new())),
            update_calls: AtomicUsize::new(0),
            clear_calls: AtomicUsize::new(0),
            effective_clears: AtomicUsize::new(0),
            fail_updates: AtomicBool::new(false),
            fail_clears: AtomicBool::new(false),
            update_delay_ms: AtomicU64::new(0),
        }
    }

    /// Seed an account directly, bypassing `create`
    pub async fn insert(&self, account: Account) {
        self.accounts.write().await.insert(account.id, account);
    }

    /// Fetch the stored state of an account
    pub async fn stored(&self, id: Uuid) -> Option<Account> {
        self.accounts.read().await.get(&id).cloned()
    }

    /// Number of `update` calls made so far
    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    /// Number of `clear_pending` calls made so far
    pub fn clear_calls(&self) -> usize {
        self.clear_calls.load(Ordering::SeqCst)
    }

    /// Number of `clear_pending` calls that actually cleared a slot
    pub fn effective_clears(&self) -> usize {
        self.effective_clears.load(Ordering::SeqCst)
    }

    /// Make subsequent `update` calls fail
    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent `clear_pending` calls fail
    pub fn fail_clears(&self, fail: bool) {
        self.fail_clears.store(fail, Ordering::SeqCst);
    }

    /// Delay subsequent `update` calls to force write interleavings
    pub fn set_update_delay(&self, delay_ms: u64) {
        self.update_delay_ms.store(delay_ms, Ordering::SeqCst);
    }
}

impl Default for MockAccountRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccountRepository for MockAccountRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, DomainError> {
        let accounts = self.accounts.read().await;
        Ok(accounts.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, DomainError> {
        let accounts = self.accounts.read().await;
        Ok(accounts.values().find(|a| a.email == email).cloned())
    }

    async fn find_by_pending_token(
        &self,
        purpose: TokenPurpose,
        token_digest: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>, DomainError> {
        let accounts = self.accounts.read().await;
        Ok(accounts
            .values()
            .find(|a| a.slot(purpose).matches(token_digest, now))
            .cloned())
    }

    async fn create(&self, account: Account) -> Result<Account, DomainError> {
        let mut accounts = self.accounts.write().await;

        if accounts.values().any(|a| a.email == account.email) {
            return Err(DomainError::Validation {
                message: "Email already registered".to_string(),
            });
        }

        accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn update(&self, account: Account) -> Result<Account, DomainError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);

        let delay_ms = self.update_delay_ms.load(Ordering::SeqCst);
        if delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
        }

        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(DomainError::Internal {
                message: "Injected update failure".to_string(),
            });
        }

        let mut accounts = self.accounts.write().await;
        if !accounts.contains_key(&account.id) {
            return Err(DomainError::NotFound {
                resource: "Account".to_string(),
            });
        }

        accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn clear_pending(
        &self,
        account_id: Uuid,
        purpose: TokenPurpose,
        token_digest: &str,
    ) -> Result<bool, DomainError> {
        self.clear_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_clears.load(Ordering::SeqCst) {
            return Err(DomainError::Internal {
                message: "Injected clear failure".to_string(),
            });
        }

        let mut accounts = self.accounts.write().await;
        let Some(account) = accounts.get_mut(&account_id) else {
            return Ok(false);
        };

        let slot = account.slot_mut(purpose);
        if slot.token_digest.as_deref() == Some(token_digest) {
            slot.clear();
            account.updated_at = Utc::now();
            self.effective_clears.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
