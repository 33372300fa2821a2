//! Main token lifecycle service implementation

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;
use validator::validate_email;

use crate::domain::entities::account::Account;
use crate::domain::entities::pending_operation::TokenPurpose;
use crate::errors::{DomainError, DomainResult, LifecycleError};
use crate::repositories::AccountRepository;
use crate::services::clock::Clock;
use crate::services::scheduler::ExpiryScheduler;
use crate::services::token::IssuedToken;

use super::config::LifecycleConfig;
use super::traits::{Mailer, PasswordHasher};
use super::types::{AccountSummary, StartedOperation};

/// Lifecycle service orchestrating the four single-use token purposes
///
/// Each purpose exposes a start/consume pair with the same shape: start
/// supersedes any previous pending operation, issues and delivers a fresh
/// token, and arms the expiry scheduler; consume redeems the token at most
/// once, applies the purpose-specific effect, and cancels the timer.
pub struct LifecycleService<R, M, H, C>
where
    R: AccountRepository + 'static,
    M: Mailer,
    H: PasswordHasher,
    C: Clock + 'static,
{
    /// Account repository for persistence operations
    repository: Arc<R>,
    /// Outbound email delivery
    mailer: Arc<M>,
    /// Password hashing boundary
    password_hasher: Arc<H>,
    /// Shared time source, also used by the scheduler
    clock: Arc<C>,
    /// Expiry scheduler for pending operations
    scheduler: Arc<ExpiryScheduler<R, C>>,
    /// Service configuration
    config: LifecycleConfig,
}

impl<R, M, H, C> LifecycleService<R, M, H, C>
where
    R: AccountRepository + 'static,
    M: Mailer,
    H: PasswordHasher,
    C: Clock + 'static,
{
    /// Create a new lifecycle service
    ///
    /// # Arguments
    ///
    /// * `repository` - Repository for account persistence
    /// * `mailer` - Outbound email delivery
    /// * `password_hasher` - Password hashing implementation
    /// * `clock` - Time source shared with the scheduler
    /// * `scheduler` - Expiry scheduler, constructed once at process start
    /// * `config` - Service configuration
    pub fn new(
        repository: Arc<R>,
        mailer: Arc<M>,
        password_hasher: Arc<H>,
        clock: Arc<C>,
        scheduler: Arc<ExpiryScheduler<R, C>>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            repository,
            mailer,
            password_hasher,
            clock,
            scheduler,
            config,
        }
    }

    // Password reset

    /// Start a password reset for the account holding `email`
    ///
    /// Supersedes any reset already pending for the account and delivers a
    /// fresh single-use token to the address on file.
    ///
    /// # Errors
    ///
    /// * `Validation` - Malformed email address
    /// * `NotFound` - No account with this address
    /// * `PersistenceFailed` / `DeliveryFailed` - Operation rolled back
    pub async fn request_password_reset(&self, email: &str) -> DomainResult<StartedOperation> {
        let account = self.resolve_by_email(email).await?;
        let destination = account.email.clone();
        let subject = format!(
            "Your password reset token (only valid for {} mins)",
            self.config.token_ttl_minutes
        );
        let link_base = self.config.link_base_url.clone();

        self.begin_operation(
            account,
            TokenPurpose::ResetPassword,
            &destination,
            &subject,
            |token| {
                format!(
                    "Forgot your password? Submit a PATCH request with your new password to: \
                     {link_base}/reset-password/{token}\nIf you didn't forget your password, \
                     please ignore this email!"
                )
            },
        )
        .await
    }

    /// Redeem a password reset token and set a new password
    ///
    /// # Errors
    ///
    /// * `InvalidOrExpiredToken` - Uniform failure for a wrong, expired,
    ///   consumed, or unknown token
    /// * `PersistenceFailed` - Storage write failed
    pub async fn reset_password(
        &self,
        raw_token: &str,
        new_password: &str,
    ) -> DomainResult<AccountSummary> {
        let mut account = self
            .consume_operation(TokenPurpose::ResetPassword, raw_token)
            .await?;

        let password_hash = self
            .password_hasher
            .hash_password(new_password)
            .map_err(|e| DomainError::Internal {
                message: format!("Failed to hash password: {e}"),
            })?;
        account.set_password_hash(password_hash);

        let account = self
            .finish_consume(account, TokenPurpose::ResetPassword)
            .await?;

        info!(
            account_id = %account.id,
            event = "password_reset",
            "Password reset completed"
        );
        Ok(AccountSummary::from(&account))
    }

    // Email update and confirmation

    /// Start an email update for an authenticated account
    ///
    /// The token is delivered to the CURRENT address; the new address is
    /// only supplied when the token is redeemed.
    ///
    /// # Errors
    ///
    /// * `NotFound` - Unknown account id
    /// * `PreconditionFailed` - Current password does not verify
    /// * `PersistenceFailed` / `DeliveryFailed` - Operation rolled back
    pub async fn request_email_update(
        &self,
        account_id: Uuid,
        current_password: &str,
    ) -> DomainResult<StartedOperation> {
        let account = self.resolve_by_id(account_id).await?;
        self.check_password(&account, current_password)?;

        let destination = account.email.clone();
        let subject = format!(
            "Your email update token (only valid for {} mins)",
            self.config.token_ttl_minutes
        );
        let link_base = self.config.link_base_url.clone();

        self.begin_operation(
            account,
            TokenPurpose::UpdateEmail,
            &destination,
            &subject,
            |token| {
                format!(
                    "Want to change your email? Submit a PATCH request with your new email to: \
                     {link_base}/update-email/{token}\nIf you didn't want to, please ignore \
                     this email!"
                )
            },
        )
        .await
    }

    /// Redeem an email update token, staging the new address
    ///
    /// On success the new address is staged on the account and a
    /// confirmation token is immediately issued to it; the returned summary
    /// describes that chained confirmation operation.
    ///
    /// # Errors
    ///
    /// * `Validation` - Malformed new address
    /// * `InvalidOrExpiredToken` - Uniform token failure
    /// * `PersistenceFailed` / `DeliveryFailed` - From the consume or the
    ///   chained confirmation start
    pub async fn apply_email_update(
        &self,
        raw_token: &str,
        new_email: &str,
    ) -> DomainResult<StartedOperation> {
        if !validate_email(new_email) {
            return Err(DomainError::Validation {
                message: "Invalid email format".to_string(),
            });
        }

        let mut account = self
            .consume_operation(TokenPurpose::UpdateEmail, raw_token)
            .await?;
        account.stage_pending_email(new_email.to_string());
        let account = self
            .finish_consume(account, TokenPurpose::UpdateEmail)
            .await?;

        info!(
            account_id = %account.id,
            event = "email_update_applied",
            "Email update applied; confirmation pending"
        );

        // Confirmation leg: the token goes to the NEW address.
        self.begin_email_confirmation(account, new_email).await
    }

    /// Redeem an email confirmation token, promoting the staged address
    ///
    /// # Errors
    ///
    /// * `InvalidOrExpiredToken` - Uniform token failure
    /// * `PersistenceFailed` - Storage write failed
    pub async fn confirm_email(&self, raw_token: &str) -> DomainResult<AccountSummary> {
        let mut account = self
            .consume_operation(TokenPurpose::ConfirmEmail, raw_token)
            .await?;

        if !account.promote_pending_email() {
            return Err(DomainError::Internal {
                message: "No pending email staged for confirmation".to_string(),
            });
        }

        let account = self
            .finish_consume(account, TokenPurpose::ConfirmEmail)
            .await?;

        info!(
            account_id = %account.id,
            event = "email_confirmed",
            "Email address confirmed"
        );
        Ok(AccountSummary::from(&account))
    }

    // Account activation

    /// Start activation for a deactivated account
    ///
    /// # Errors
    ///
    /// * `Validation` - Malformed email address
    /// * `NotFound` - No account with this address
    /// * `PreconditionFailed` - Account is already active
    /// * `PersistenceFailed` / `DeliveryFailed` - Operation rolled back
    pub async fn request_activation(&self, email: &str) -> DomainResult<StartedOperation> {
        let account = self.resolve_by_email(email).await?;
        if account.is_active {
            return Err(LifecycleError::PreconditionFailed {
                reason: "account is already active".to_string(),
            }
            .into());
        }

        let destination = account.email.clone();
        let subject = format!(
            "Your account activation token (only valid for {} mins)",
            self.config.token_ttl_minutes
        );
        let link_base = self.config.link_base_url.clone();

        self.begin_operation(
            account,
            TokenPurpose::ActivateAccount,
            &destination,
            &subject,
            |token| {
                format!(
                    "Enter this link to activate your account: \
                     {link_base}/activate/{token}\nIf it was not you, please ignore this email."
                )
            },
        )
        .await
    }

    /// Redeem an activation token, reactivating the account
    ///
    /// # Errors
    ///
    /// * `InvalidOrExpiredToken` - Uniform token failure
    /// * `PersistenceFailed` - Storage write failed
    pub async fn activate_account(&self, raw_token: &str) -> DomainResult<AccountSummary> {
        let mut account = self
            .consume_operation(TokenPurpose::ActivateAccount, raw_token)
            .await?;
        account.activate();

        let account = self
            .finish_consume(account, TokenPurpose::ActivateAccount)
            .await?;

        info!(
            account_id = %account.id,
            event = "account_activated",
            "Account activated"
        );
        Ok(AccountSummary::from(&account))
    }

    /// Deactivate an authenticated account
    ///
    /// Deactivated accounts are the starting state the activation purpose
    /// consumes.
    ///
    /// # Errors
    ///
    /// * `NotFound` - Unknown account id
    /// * `PreconditionFailed` - Current password does not verify
    /// * `PersistenceFailed` - Storage write failed
    pub async fn deactivate_account(
        &self,
        account_id: Uuid,
        current_password: &str,
    ) -> DomainResult<AccountSummary> {
        let mut account = self.resolve_by_id(account_id).await?;
        self.check_password(&account, current_password)?;

        account.deactivate();
        let account = self.repository.update(account).await.map_err(|e| {
            LifecycleError::PersistenceFailed {
                message: e.to_string(),
            }
        })?;

        info!(
            account_id = %account.id,
            event = "account_deactivated",
            "Account deactivated"
        );
        Ok(AccountSummary::from(&account))
    }

    // Shared flow helpers

    /// Start a pending operation on an already-resolved account
    ///
    /// Implements the common start shape: supersede any previous timer for
    /// the key, issue a token, arm the slot, persist, arm the scheduler,
    /// deliver. Persistence or delivery failure rolls the slot back as if
    /// the operation never started.
    async fn begin_operation(
        &self,
        mut account: Account,
        purpose: TokenPurpose,
        destination: &str,
        subject: &str,
        body_for: impl FnOnce(&str) -> String,
    ) -> DomainResult<StartedOperation> {
        let account_id = account.id;

        // A fresh request always wins over a stale one.
        self.scheduler.disarm(purpose, account_id, true).await;

        let token = IssuedToken::issue();
        let expires_at = self.clock.now() + chrono::Duration::minutes(self.config.token_ttl_minutes);
        account
            .slot_mut(purpose)
            .arm(token.digest.clone(), expires_at);

        let mut account = match self.repository.update(account).await {
            Ok(account) => account,
            Err(e) => {
                self.scheduler.disarm(purpose, account_id, true).await;
                return Err(LifecycleError::PersistenceFailed {
                    message: e.to_string(),
                }
                .into());
            }
        };

        self.scheduler
            .arm(purpose, account_id, token.digest.clone(), expires_at)
            .await;

        let body = body_for(&token.raw);
        match self.mailer.send_token_email(destination, subject, &body).await {
            Ok(message_id) => {
                info!(
                    account_id = %account_id,
                    purpose = purpose.as_str(),
                    expires_at = %expires_at,
                    event = "operation_started",
                    "Issued security token"
                );
                Ok(StartedOperation {
                    account_id,
                    purpose,
                    delivered_to: destination.to_string(),
                    expires_at,
                    message_id,
                })
            }
            Err(e) => {
                // Treat the operation as never started.
                self.scheduler.disarm(purpose, account_id, true).await;
                account.slot_mut(purpose).clear();
                if let Err(rollback_err) = self.repository.update(account).await {
                    warn!(
                        account_id = %account_id,
                        purpose = purpose.as_str(),
                        error = %rollback_err,
                        event = "operation_rollback_failed",
                        "Failed to roll back undeliverable operation"
                    );
                }
                warn!(
                    account_id = %account_id,
                    purpose = purpose.as_str(),
                    error = %e,
                    event = "token_delivery_failed",
                    "Failed to deliver security token"
                );
                Err(LifecycleError::DeliveryFailed.into())
            }
        }
    }

    /// Chained start of the confirmation leg after an applied email update
    async fn begin_email_confirmation(
        &self,
        account: Account,
        new_email: &str,
    ) -> DomainResult<StartedOperation> {
        let subject = format!(
            "Your email confirm token (only valid for {} mins)",
            self.config.token_ttl_minutes
        );
        let link_base = self.config.link_base_url.clone();

        self.begin_operation(
            account,
            TokenPurpose::ConfirmEmail,
            new_email,
            &subject,
            |token| format!("Enter this link to confirm your email: {link_base}/confirm-email/{token}"),
        )
        .await
    }

    /// Resolve the account holding a live token for `purpose`
    ///
    /// Failures are deliberately uniform: callers cannot distinguish a
    /// wrong token from an expired one or from an unknown account.
    async fn consume_operation(
        &self,
        purpose: TokenPurpose,
        raw_token: &str,
    ) -> DomainResult<Account> {
        let token_digest = IssuedToken::digest_of(raw_token);
        let now = self.clock.now();

        let account = self
            .repository
            .find_by_pending_token(purpose, &token_digest, now)
            .await?
            .ok_or(LifecycleError::InvalidOrExpiredToken)?;

        if !account.slot(purpose).matches(&token_digest, now) {
            return Err(LifecycleError::InvalidOrExpiredToken.into());
        }

        Ok(account)
    }

    /// Clear the consumed slot, persist, and cancel the timer
    ///
    /// The scheduler's deferred safety clear is submitted only after this
    /// persistence call has been issued, so the two writes never overlap.
    async fn finish_consume(
        &self,
        mut account: Account,
        purpose: TokenPurpose,
    ) -> DomainResult<Account> {
        account.slot_mut(purpose).clear();
        let account = self.repository.update(account).await.map_err(|e| {
            LifecycleError::PersistenceFailed {
                message: e.to_string(),
            }
        })?;

        self.scheduler.disarm(purpose, account.id, false).await;
        Ok(account)
    }

    /// Resolve an account by email, validating the address format
    async fn resolve_by_email(&self, email: &str) -> DomainResult<Account> {
        if !validate_email(email) {
            return Err(DomainError::Validation {
                message: "Invalid email format".to_string(),
            });
        }
        self.repository
            .find_by_email(email)
            .await?
            .ok_or_else(|| LifecycleError::NotFound.into())
    }

    /// Resolve an account by id
    async fn resolve_by_id(&self, account_id: Uuid) -> DomainResult<Account> {
        self.repository
            .find_by_id(account_id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound.into())
    }

    /// Verify the caller-supplied current password
    fn check_password(&self, account: &Account, current_password: &str) -> DomainResult<()> {
        let verified = self
            .password_hasher
            .verify_password(current_password, &account.password_hash)
            .map_err(|e| DomainError::Internal {
                message: format!("Failed to verify password: {e}"),
            })?;

        if verified {
            Ok(())
        } else {
            Err(LifecycleError::PreconditionFailed {
                reason: "incorrect current password".to_string(),
            }
            .into())
        }
    }
}
