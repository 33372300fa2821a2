//! Account entity representing a registered account in the AccountGuard system.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::pending_operation::{PendingOperation, TokenPurpose};

/// Account entity owned by the persistence layer.
///
/// Besides the identity fields, the entity carries four independent
/// [`PendingOperation`] slots, one per [`TokenPurpose`]. Slots are addressed
/// through [`Account::slot`] / [`Account::slot_mut`] so callers never touch
/// a purpose's fields by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier for the account.
    pub id: Uuid,

    /// Primary email address, unique across accounts.
    pub email: String,

    /// Opaque password hash; hashing happens outside the core.
    pub password_hash: String,

    /// New address staged by an email update, awaiting confirmation.
    pub pending_email: Option<String>,

    /// Whether the account is active. Deactivated accounts can be
    /// reactivated through the activation purpose.
    pub is_active: bool,

    /// Timestamp when the account was created.
    pub created_at: DateTime<Utc>,

    /// Timestamp when the account was last updated.
    pub updated_at: DateTime<Utc>,

    /// Pending password reset slot.
    pub password_reset: PendingOperation,

    /// Pending email update slot.
    pub email_update: PendingOperation,

    /// Pending email confirmation slot.
    pub email_confirm: PendingOperation,

    /// Pending account activation slot.
    pub activation: PendingOperation,
}

impl Account {
    /// Creates a new active account with empty pending operation slots.
    pub fn new(email: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email,
            password_hash,
            pending_email: None,
            is_active: true,
            created_at: now,
            updated_at: now,
            password_reset: PendingOperation::default(),
            email_update: PendingOperation::default(),
            email_confirm: PendingOperation::default(),
            activation: PendingOperation::default(),
        }
    }

    /// Returns the pending operation slot for a purpose.
    pub fn slot(&self, purpose: TokenPurpose) -> &PendingOperation {
        match purpose {
            TokenPurpose::ResetPassword => &self.password_reset,
            TokenPurpose::UpdateEmail => &self.email_update,
            TokenPurpose::ConfirmEmail => &self.email_confirm,
            TokenPurpose::ActivateAccount => &self.activation,
        }
    }

    /// Returns the mutable pending operation slot for a purpose.
    pub fn slot_mut(&mut self, purpose: TokenPurpose) -> &mut PendingOperation {
        match purpose {
            TokenPurpose::ResetPassword => &mut self.password_reset,
            TokenPurpose::UpdateEmail => &mut self.email_update,
            TokenPurpose::ConfirmEmail => &mut self.email_confirm,
            TokenPurpose::ActivateAccount => &mut self.activation,
        }
    }

    /// Replaces the password hash.
    pub fn set_password_hash(&mut self, password_hash: String) {
        self.password_hash = password_hash;
        self.updated_at = Utc::now();
    }

    /// Stages a new email address for later confirmation.
    pub fn stage_pending_email(&mut self, new_email: String) {
        self.pending_email = Some(new_email);
        self.updated_at = Utc::now();
    }

    /// Promotes the staged address to the primary email.
    ///
    /// Returns `false` when no address was staged.
    pub fn promote_pending_email(&mut self) -> bool {
        match self.pending_email.take() {
            Some(new_email) => {
                self.email = new_email;
                self.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Marks the account as active.
    pub fn activate(&mut self) {
        self.is_active = true;
        self.updated_at = Utc::now();
    }

    /// Marks the account as inactive.
    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_new_account() {
        let account = Account::new("alice@example.com".to_string(), "hash".to_string());

        assert_eq!(account.email, "alice@example.com");
        assert!(account.is_active);
        assert!(account.pending_email.is_none());
        for purpose in TokenPurpose::ALL {
            assert!(!account.slot(purpose).is_armed());
        }
    }

    #[test]
    fn test_slots_are_independent() {
        let mut account = Account::new("alice@example.com".to_string(), "hash".to_string());
        let expires_at = Utc::now() + Duration::minutes(10);

        account
            .slot_mut(TokenPurpose::ResetPassword)
            .arm("digest".to_string(), expires_at);

        assert!(account.slot(TokenPurpose::ResetPassword).is_armed());
        assert!(!account.slot(TokenPurpose::UpdateEmail).is_armed());
        assert!(!account.slot(TokenPurpose::ConfirmEmail).is_armed());
        assert!(!account.slot(TokenPurpose::ActivateAccount).is_armed());
    }

    #[test]
    fn test_promote_pending_email() {
        let mut account = Account::new("alice@example.com".to_string(), "hash".to_string());

        assert!(!account.promote_pending_email());

        account.stage_pending_email("new@example.com".to_string());
        assert!(account.promote_pending_email());
        assert_eq!(account.email, "new@example.com");
        assert!(account.pending_email.is_none());
    }

    #[test]
    fn test_activate_deactivate() {
        let mut account = Account::new("alice@example.com".to_string(), "hash".to_string());

        account.deactivate();
        assert!(!account.is_active);

        account.activate();
        assert!(account.is_active);
    }
}
