//! Account repository trait defining the interface for account persistence.
//!
//! The trait is async-first and returns `DomainError` for infrastructure
//! failures. Implementations own durable storage; the domain layer never
//! sees connection handles or query syntax.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::entities::account::Account;
use crate::domain::entities::pending_operation::TokenPurpose;
use crate::errors::DomainError;

/// Repository trait for Account entity persistence operations
///
/// Besides the usual lookups, the trait carries the two queries the token
/// lifecycle depends on: resolving an account from a live pending token
/// digest, and conditionally clearing a pending slot.
///
/// # Example
/// ```no_run
/// # use ag_core::repositories::AccountRepository;
/// # use ag_core::domain::entities::pending_operation::TokenPurpose;
/// # use chrono::Utc;
/// # async fn example(repo: &impl AccountRepository) -> Result<(), Box<dyn std::error::Error>> {
/// let digest = "sha256_hex_digest_of_presented_token";
///
/// match repo
///     .find_by_pending_token(TokenPurpose::ResetPassword, digest, Utc::now())
///     .await?
/// {
///     Some(account) => println!("Live reset pending for {}", account.id),
///     None => println!("No match"),
/// }
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Find an account by its unique identifier
    ///
    /// # Returns
    /// * `Ok(Some(Account))` - Account found
    /// * `Ok(None)` - No account with the given id
    /// * `Err(DomainError)` - Storage error occurred
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, DomainError>;

    /// Find an account by its primary email address
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, DomainError>;

    /// Find the account holding a live pending operation for `purpose`
    ///
    /// Matches only when the purpose's slot is active, its digest equals
    /// `token_digest`, and its expiry is strictly greater than `now`. This
    /// predicate is the authoritative expiry check: it holds even when the
    /// in-process expiry scheduler was lost to a restart.
    ///
    /// # Arguments
    /// * `purpose` - Which pending operation slot to match
    /// * `token_digest` - SHA-256 hex digest of the presented raw token
    /// * `now` - Current time from the caller's clock source
    async fn find_by_pending_token(
        &self,
        purpose: TokenPurpose,
        token_digest: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>, DomainError>;

    /// Create a new account in the repository
    ///
    /// # Returns
    /// * `Ok(Account)` - The created account
    /// * `Err(DomainError)` - Creation failed (e.g., duplicate email)
    async fn create(&self, account: Account) -> Result<Account, DomainError>;

    /// Update an existing account
    ///
    /// This is a narrow save: only the account-owned fields are written, so
    /// unrelated data never blocks a pending-slot update.
    ///
    /// # Returns
    /// * `Ok(Account)` - The updated account
    /// * `Err(DomainError)` - Update failed (e.g., account not found)
    async fn update(&self, account: Account) -> Result<Account, DomainError>;

    /// Conditionally clear a pending operation slot
    ///
    /// Clears the three slot fields only when the slot still holds
    /// `token_digest`, making a late or duplicate clear a harmless no-op: a
    /// slot that was superseded or already consumed no longer matches.
    ///
    /// # Returns
    /// * `Ok(true)` - The slot held the digest and was cleared
    /// * `Ok(false)` - The slot no longer matched; nothing was written
    /// * `Err(DomainError)` - Storage error occurred
    async fn clear_pending(
        &self,
        account_id: Uuid,
        purpose: TokenPurpose,
        token_digest: &str,
    ) -> Result<bool, DomainError>;
}
