//! Integration tests for the token lifecycle against a simulated clock

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{DateTime, Duration, Utc};
    use uuid::Uuid;

    use ag_core::domain::entities::account::Account;
    use ag_core::domain::entities::pending_operation::TokenPurpose;
    use ag_core::errors::{DomainError, LifecycleError};
    use ag_core::repositories::AccountRepository;
    use ag_core::services::clock::Clock;
    use ag_core::services::lifecycle::{
        LifecycleConfig, LifecycleService, Mailer, PasswordHasher,
    };
    use ag_core::services::scheduler::ExpiryScheduler;
    use ag_core::services::token::TOKEN_BYTES;

    // In-memory account repository
    struct InMemoryAccountRepository {
        accounts: Arc<tokio::sync::RwLock<HashMap<Uuid, Account>>>,
    }

    impl InMemoryAccountRepository {
        fn new() -> Self {
            Self {
                accounts: Arc::new(tokio::sync::RwLock::new(HashMap::new())),
            }
        }

        async fn stored(&self, id: Uuid) -> Option<Account> {
            self.accounts.read().await.get(&id).cloned()
        }
    }

    #[async_trait]
    impl AccountRepository for InMemoryAccountRepository {
        async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, DomainError> {
            Ok(self.accounts.read().await.get(&id).cloned())
        }

        async fn find_by_email(&self, email: &str) -> Result<Option<Account>, DomainError> {
            Ok(self
                .accounts
                .read()
                .await
                .values()
                .find(|a| a.email == email)
                .cloned())
        }

        async fn find_by_pending_token(
            &self,
            purpose: TokenPurpose,
            token_digest: &str,
            now: DateTime<Utc>,
        ) -> Result<Option<Account>, DomainError> {
            Ok(self
                .accounts
                .read()
                .await
                .values()
                .find(|a| a.slot(purpose).matches(token_digest, now))
                .cloned())
        }

        async fn create(&self, account: Account) -> Result<Account, DomainError> {
            self.accounts
                .write()
                .await
                .insert(account.id, account.clone());
            Ok(account)
        }

        async fn update(&self, account: Account) -> Result<Account, DomainError> {
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
            let mut accounts = self.accounts.write().await;
            let Some(account) = accounts.get_mut(&account_id) else {
                return Ok(false);
            };
            let slot = account.slot_mut(purpose);
            if slot.token_digest.as_deref() == Some(token_digest) {
                slot.clear();
                Ok(true)
            } else {
                Ok(false)
            }
        }
    }

    // Recording mailer
    struct RecordingMailer {
        bodies: Mutex<Vec<(String, String)>>,
    }

    impl RecordingMailer {
        fn new() -> Self {
            Self {
                bodies: Mutex::new(Vec::new()),
            }
        }

        fn token_sent_to(&self, to: &str) -> Option<String> {
            self.bodies
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|(recipient, _)| recipient == to)
                .and_then(|(_, body)| {
                    body.split(|c: char| !c.is_ascii_hexdigit())
                        .find(|s| s.len() == TOKEN_BYTES * 2)
                        .map(|s| s.to_string())
                })
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send_token_email(
            &self,
            to: &str,
            _subject: &str,
            body: &str,
        ) -> Result<String, String> {
            self.bodies
                .lock()
                .unwrap()
                .push((to.to_string(), body.to_string()));
            Ok("msg-1".to_string())
        }
    }

    // Transparent hasher
    struct StubHasher;

    impl PasswordHasher for StubHasher {
        fn hash_password(&self, raw: &str) -> Result<String, String> {
            Ok(format!("hashed:{raw}"))
        }

        fn verify_password(&self, raw: &str, password_hash: &str) -> Result<bool, String> {
            Ok(password_hash == format!("hashed:{raw}"))
        }
    }

    // Manually driven clock
    struct ManualClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self {
                now: Mutex::new(Utc::now()),
            }
        }

        fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap();
            *now = *now + by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }

    struct TestStack {
        repository: Arc<InMemoryAccountRepository>,
        mailer: Arc<RecordingMailer>,
        clock: Arc<ManualClock>,
        scheduler: Arc<ExpiryScheduler<InMemoryAccountRepository, ManualClock>>,
        service: LifecycleService<InMemoryAccountRepository, RecordingMailer, StubHasher, ManualClock>,
    }

    fn stack(config: LifecycleConfig) -> TestStack {
        let repository = Arc::new(InMemoryAccountRepository::new());
        let mailer = Arc::new(RecordingMailer::new());
        let clock = Arc::new(ManualClock::new());
        let scheduler = Arc::new(ExpiryScheduler::new(
            Arc::clone(&repository),
            Arc::clone(&clock),
        ));
        let service = LifecycleService::new(
            Arc::clone(&repository),
            Arc::clone(&mailer),
            Arc::new(StubHasher),
            Arc::clone(&clock),
            Arc::clone(&scheduler),
            config,
        );

        TestStack {
            repository,
            mailer,
            clock,
            scheduler,
            service,
        }
    }

    async fn seed(stack: &TestStack, email: &str) -> Account {
        let account = Account::new(email.to_string(), "hashed:secret".to_string());
        stack.repository.create(account).await.unwrap()
    }

    #[tokio::test]
    async fn reset_consumed_just_before_expiry_succeeds() {
        let stack = stack(LifecycleConfig::default());
        let account = seed(&stack, "user42@example.com").await;

        stack
            .service
            .request_password_reset("user42@example.com")
            .await
            .unwrap();
        let token = stack.mailer.token_sent_to("user42@example.com").unwrap();

        stack
            .clock
            .advance(Duration::minutes(9) + Duration::seconds(59));

        let summary = stack.service.reset_password(&token, "x").await.unwrap();
        assert_eq!(summary.id, account.id);

        let stored = stack.repository.stored(account.id).await.unwrap();
        assert_eq!(stored.password_hash, "hashed:x");
        assert!(!stored.slot(TokenPurpose::ResetPassword).is_armed());
        assert_eq!(stack.scheduler.armed_count().await, 0);
    }

    #[tokio::test]
    async fn reset_consumed_just_after_expiry_fails() {
        let stack = stack(LifecycleConfig::default());
        let account = seed(&stack, "user42@example.com").await;

        stack
            .service
            .request_password_reset("user42@example.com")
            .await
            .unwrap();
        let token = stack.mailer.token_sent_to("user42@example.com").unwrap();

        stack
            .clock
            .advance(Duration::minutes(10) + Duration::seconds(1));

        let err = stack.service.reset_password(&token, "x").await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Lifecycle(LifecycleError::InvalidOrExpiredToken)
        ));

        // The password on file is untouched.
        let stored = stack.repository.stored(account.id).await.unwrap();
        assert_eq!(stored.password_hash, "hashed:secret");
    }

    #[tokio::test]
    async fn zero_ttl_token_is_scrubbed_and_unusable() {
        let stack = stack(LifecycleConfig {
            token_ttl_minutes: 0,
            ..LifecycleConfig::default()
        });
        let account = seed(&stack, "user42@example.com").await;

        stack
            .service
            .request_password_reset("user42@example.com")
            .await
            .unwrap();
        let token = stack.mailer.token_sent_to("user42@example.com").unwrap();

        // Already at its (exclusive) expiry boundary.
        let err = stack.service.reset_password(&token, "x").await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Lifecycle(LifecycleError::InvalidOrExpiredToken)
        ));

        // The past-deadline timer fires on the next scheduling opportunity
        // and scrubs the slot from storage.
        tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;
        let stored = stack.repository.stored(account.id).await.unwrap();
        assert!(!stored.slot(TokenPurpose::ResetPassword).is_armed());
        assert_eq!(stack.scheduler.armed_count().await, 0);
    }

    #[tokio::test]
    async fn full_email_change_journey() {
        let stack = stack(LifecycleConfig::default());
        let account = seed(&stack, "old@example.com").await;

        stack
            .service
            .request_email_update(account.id, "secret")
            .await
            .unwrap();
        let update_token = stack.mailer.token_sent_to("old@example.com").unwrap();

        stack
            .service
            .apply_email_update(&update_token, "new@example.com")
            .await
            .unwrap();
        let confirm_token = stack.mailer.token_sent_to("new@example.com").unwrap();

        let summary = stack.service.confirm_email(&confirm_token).await.unwrap();
        assert_eq!(summary.email, "new@example.com");

        let stored = stack.repository.stored(account.id).await.unwrap();
        assert_eq!(stored.email, "new@example.com");
        assert!(stored.pending_email.is_none());
        for purpose in TokenPurpose::ALL {
            assert!(!stored.slot(purpose).is_armed());
        }
        assert_eq!(stack.scheduler.armed_count().await, 0);
    }
}
