//! Types for lifecycle operation results

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::entities::account::Account;
use crate::domain::entities::pending_operation::TokenPurpose;

/// Summary returned by a successful start operation
///
/// Deliberately opaque: the raw token only exists in the delivery email.
#[derive(Debug, Clone)]
pub struct StartedOperation {
    /// Account the operation was started for
    pub account_id: Uuid,
    /// Purpose of the pending operation
    pub purpose: TokenPurpose,
    /// Address the token was delivered to
    pub delivered_to: String,
    /// When the issued token expires
    pub expires_at: DateTime<Utc>,
    /// Delivery provider message id
    pub message_id: String,
}

/// Account summary returned by a successful consume operation
#[derive(Debug, Clone, Serialize)]
pub struct AccountSummary {
    /// Account identifier
    pub id: Uuid,
    /// Current primary email address
    pub email: String,
    /// Whether the account is active
    pub is_active: bool,
    /// Timestamp of the applied update
    pub updated_at: DateTime<Utc>,
}

impl From<&Account> for AccountSummary {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            is_active: account.is_active,
            updated_at: account.updated_at,
        }
    }
}
