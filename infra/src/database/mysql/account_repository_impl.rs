//! MySQL implementation of the AccountRepository trait.
//!
//! This module provides the concrete implementation of account persistence
//! using MySQL with SQLx. Each pending-operation purpose maps to a triple
//! of columns on the `accounts` table:
//!
//! ```text
//! accounts (
//!     id                           CHAR(36) PRIMARY KEY,
//!     email                        VARCHAR(255) NOT NULL UNIQUE,
//!     password_hash                VARCHAR(255) NOT NULL,
//!     pending_email                VARCHAR(255) NULL,
//!     is_active                    BOOLEAN NOT NULL DEFAULT TRUE,
//!     created_at                   TIMESTAMP(6) NOT NULL,
//!     updated_at                   TIMESTAMP(6) NOT NULL,
//!     reset_password_active        BOOLEAN NOT NULL DEFAULT FALSE,
//!     reset_password_digest        CHAR(64) NULL,
//!     reset_password_expires_at    TIMESTAMP(6) NULL,
//!     update_email_active          BOOLEAN NOT NULL DEFAULT FALSE,
//!     update_email_digest          CHAR(64) NULL,
//!     update_email_expires_at      TIMESTAMP(6) NULL,
//!     confirm_email_active         BOOLEAN NOT NULL DEFAULT FALSE,
//!     confirm_email_digest         CHAR(64) NULL,
//!     confirm_email_expires_at     TIMESTAMP(6) NULL,
//!     activate_account_active      BOOLEAN NOT NULL DEFAULT FALSE,
//!     activate_account_digest      CHAR(64) NULL,
//!     activate_account_expires_at  TIMESTAMP(6) NULL
//! )
//! ```
//!
//! `clear_pending` is a conditional update keyed on the stored digest, so a
//! late expiry sweep can never scrub a slot that was superseded or already
//! consumed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row};
use uuid::Uuid;

use ag_core::domain::entities::account::Account;
use ag_core::domain::entities::pending_operation::{PendingOperation, TokenPurpose};
use ag_core::errors::DomainError;
use ag_core::repositories::AccountRepository;

/// Column triple backing one pending-operation slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SlotColumns {
    active: &'static str,
    digest: &'static str,
    expires_at: &'static str,
}

/// Map a purpose to its column triple
fn slot_columns(purpose: TokenPurpose) -> SlotColumns {
    match purpose {
        TokenPurpose::ResetPassword => SlotColumns {
            active: "reset_password_active",
            digest: "reset_password_digest",
            expires_at: "reset_password_expires_at",
        },
        TokenPurpose::UpdateEmail => SlotColumns {
            active: "update_email_active",
            digest: "update_email_digest",
            expires_at: "update_email_expires_at",
        },
        TokenPurpose::ConfirmEmail => SlotColumns {
            active: "confirm_email_active",
            digest: "confirm_email_digest",
            expires_at: "confirm_email_expires_at",
        },
        TokenPurpose::ActivateAccount => SlotColumns {
            active: "activate_account_active",
            digest: "activate_account_digest",
            expires_at: "activate_account_expires_at",
        },
    }
}

const SELECT_COLUMNS: &str = "id, email, password_hash, pending_email, is_active, \
     created_at, updated_at, \
     reset_password_active, reset_password_digest, reset_password_expires_at, \
     update_email_active, update_email_digest, update_email_expires_at, \
     confirm_email_active, confirm_email_digest, confirm_email_expires_at, \
     activate_account_active, activate_account_digest, activate_account_expires_at";

/// MySQL implementation of AccountRepository
pub struct MySqlAccountRepository {
    /// Database connection pool
    pool: MySqlPool,
}

impl MySqlAccountRepository {
    /// Create a new MySQL account repository
    ///
    /// # Arguments
    /// * `pool` - MySQL connection pool from SQLx
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Convert a database row to a pending-operation slot
    fn slot_from_row(
        row: &sqlx::mysql::MySqlRow,
        columns: SlotColumns,
    ) -> Result<PendingOperation, DomainError> {
        Ok(PendingOperation {
            active: row.try_get(columns.active).map_err(|e| {
                DomainError::Internal {
                    message: format!("Failed to get {}: {}", columns.active, e),
                }
            })?,
            token_digest: row.try_get(columns.digest).map_err(|e| {
                DomainError::Internal {
                    message: format!("Failed to get {}: {}", columns.digest, e),
                }
            })?,
            expires_at: row.try_get(columns.expires_at).map_err(|e| {
                DomainError::Internal {
                    message: format!("Failed to get {}: {}", columns.expires_at, e),
                }
            })?,
        })
    }

    /// Convert a database row to an Account entity
    fn row_to_account(row: &sqlx::mysql::MySqlRow) -> Result<Account, DomainError> {
        let id: String = row.try_get("id").map_err(|e| DomainError::Internal {
            message: format!("Failed to get id: {}", e),
        })?;

        Ok(Account {
            id: Uuid::parse_str(&id).map_err(|e| DomainError::Internal {
                message: format!("Invalid account UUID: {}", e),
            })?,
            email: row.try_get("email").map_err(|e| DomainError::Internal {
                message: format!("Failed to get email: {}", e),
            })?,
            password_hash: row
                .try_get("password_hash")
                .map_err(|e| DomainError::Internal {
                    message: format!("Failed to get password_hash: {}", e),
                })?,
            pending_email: row
                .try_get("pending_email")
                .map_err(|e| DomainError::Internal {
                    message: format!("Failed to get pending_email: {}", e),
                })?,
            is_active: row.try_get("is_active").map_err(|e| DomainError::Internal {
                message: format!("Failed to get is_active: {}", e),
            })?,
            created_at: row
                .try_get::<DateTime<Utc>, _>("created_at")
                .map_err(|e| DomainError::Internal {
                    message: format!("Failed to get created_at: {}", e),
                })?,
            updated_at: row
                .try_get::<DateTime<Utc>, _>("updated_at")
                .map_err(|e| DomainError::Internal {
                    message: format!("Failed to get updated_at: {}", e),
                })?,
            password_reset: Self::slot_from_row(row, slot_columns(TokenPurpose::ResetPassword))?,
            email_update: Self::slot_from_row(row, slot_columns(TokenPurpose::UpdateEmail))?,
            email_confirm: Self::slot_from_row(row, slot_columns(TokenPurpose::ConfirmEmail))?,
            activation: Self::slot_from_row(row, slot_columns(TokenPurpose::ActivateAccount))?,
        })
    }
}

#[async_trait]
impl AccountRepository for MySqlAccountRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, DomainError> {
        let query = format!("SELECT {SELECT_COLUMNS} FROM accounts WHERE id = ? LIMIT 1");

        let result = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::Internal {
                message: format!("Failed to find account by id: {}", e),
            })?;

        match result {
            Some(row) => Ok(Some(Self::row_to_account(&row)?)),
            None => Ok(None),
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, DomainError> {
        let query = format!("SELECT {SELECT_COLUMNS} FROM accounts WHERE email = ? LIMIT 1");

        let result = sqlx::query(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::Internal {
                message: format!("Failed to find account by email: {}", e),
            })?;

        match result {
            Some(row) => Ok(Some(Self::row_to_account(&row)?)),
            None => Ok(None),
        }
    }

    async fn find_by_pending_token(
        &self,
        purpose: TokenPurpose,
        token_digest: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>, DomainError> {
        let columns = slot_columns(purpose);
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM accounts \
             WHERE {} = TRUE AND {} = ? AND {} > ? LIMIT 1",
            columns.active, columns.digest, columns.expires_at
        );

        let result = sqlx::query(&query)
            .bind(token_digest)
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::Internal {
                message: format!("Failed to find account by pending token: {}", e),
            })?;

        match result {
            Some(row) => Ok(Some(Self::row_to_account(&row)?)),
            None => Ok(None),
        }
    }

    async fn create(&self, account: Account) -> Result<Account, DomainError> {
        let query = "INSERT INTO accounts (\
             id, email, password_hash, pending_email, is_active, created_at, updated_at\
             ) VALUES (?, ?, ?, ?, ?, ?, ?)";

        sqlx::query(query)
            .bind(account.id.to_string())
            .bind(&account.email)
            .bind(&account.password_hash)
            .bind(account.pending_email.as_deref())
            .bind(account.is_active)
            .bind(account.created_at)
            .bind(account.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::Internal {
                message: format!("Failed to create account: {}", e),
            })?;

        Ok(account)
    }

    async fn update(&self, account: Account) -> Result<Account, DomainError> {
        // Narrow save: writes only the account-owned columns.
        let query = "UPDATE accounts SET \
             email = ?, password_hash = ?, pending_email = ?, is_active = ?, updated_at = ?, \
             reset_password_active = ?, reset_password_digest = ?, reset_password_expires_at = ?, \
             update_email_active = ?, update_email_digest = ?, update_email_expires_at = ?, \
             confirm_email_active = ?, confirm_email_digest = ?, confirm_email_expires_at = ?, \
             activate_account_active = ?, activate_account_digest = ?, activate_account_expires_at = ? \
             WHERE id = ?";

        let result = sqlx::query(query)
            .bind(&account.email)
            .bind(&account.password_hash)
            .bind(account.pending_email.as_deref())
            .bind(account.is_active)
            .bind(account.updated_at)
            .bind(account.password_reset.active)
            .bind(account.password_reset.token_digest.as_deref())
            .bind(account.password_reset.expires_at)
            .bind(account.email_update.active)
            .bind(account.email_update.token_digest.as_deref())
            .bind(account.email_update.expires_at)
            .bind(account.email_confirm.active)
            .bind(account.email_confirm.token_digest.as_deref())
            .bind(account.email_confirm.expires_at)
            .bind(account.activation.active)
            .bind(account.activation.token_digest.as_deref())
            .bind(account.activation.expires_at)
            .bind(account.id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::Internal {
                message: format!("Failed to update account: {}", e),
            })?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound {
                resource: "Account".to_string(),
            });
        }

        Ok(account)
    }

    async fn clear_pending(
        &self,
        account_id: Uuid,
        purpose: TokenPurpose,
        token_digest: &str,
    ) -> Result<bool, DomainError> {
        let columns = slot_columns(purpose);
        // Conditional on the digest: a slot that was superseded or already
        // consumed no longer matches, and nothing is written.
        let query = format!(
            "UPDATE accounts SET {} = FALSE, {} = NULL, {} = NULL, updated_at = ? \
             WHERE id = ? AND {} = ?",
            columns.active, columns.digest, columns.expires_at, columns.digest
        );

        let result = sqlx::query(&query)
            .bind(Utc::now())
            .bind(account_id.to_string())
            .bind(token_digest)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::Internal {
                message: format!("Failed to clear pending operation: {}", e),
            })?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_columns_are_distinct_per_purpose() {
        let all: Vec<SlotColumns> = TokenPurpose::ALL.iter().map(|p| slot_columns(*p)).collect();

        for (i, columns) in all.iter().enumerate() {
            for other in &all[i + 1..] {
                assert_ne!(columns.active, other.active);
                assert_ne!(columns.digest, other.digest);
                assert_ne!(columns.expires_at, other.expires_at);
            }
        }
    }

    #[test]
    fn test_slot_columns_follow_purpose_names() {
        for purpose in TokenPurpose::ALL {
            let columns = slot_columns(purpose);
            assert!(columns.active.starts_with(purpose.as_str()));
            assert!(columns.digest.starts_with(purpose.as_str()));
            assert!(columns.expires_at.starts_with(purpose.as_str()));
        }
    }

    #[test]
    fn test_select_list_covers_every_slot_column() {
        for purpose in TokenPurpose::ALL {
            let columns = slot_columns(purpose);
            assert!(SELECT_COLUMNS.contains(columns.active));
            assert!(SELECT_COLUMNS.contains(columns.digest));
            assert!(SELECT_COLUMNS.contains(columns.expires_at));
        }
    }
}
