//! Pending security operation slot tracked per account, per purpose.

use chrono::{DateTime, Utc};
use constant_time_eq::constant_time_eq;
use serde::{Deserialize, Serialize};

/// The four kinds of single-use security operations an account can have
/// in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    /// A forgotten password is being reset via an emailed token.
    ResetPassword,
    /// The account owner requested a change of address.
    UpdateEmail,
    /// The new address from an email update awaits confirmation.
    ConfirmEmail,
    /// A deactivated account is being reactivated.
    ActivateAccount,
}

impl TokenPurpose {
    /// All purposes, in a fixed order.
    pub const ALL: [TokenPurpose; 4] = [
        TokenPurpose::ResetPassword,
        TokenPurpose::UpdateEmail,
        TokenPurpose::ConfirmEmail,
        TokenPurpose::ActivateAccount,
    ];

    /// Stable snake_case name used in log fields and storage column names.
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::ResetPassword => "reset_password",
            TokenPurpose::UpdateEmail => "update_email",
            TokenPurpose::ConfirmEmail => "confirm_email",
            TokenPurpose::ActivateAccount => "activate_account",
        }
    }
}

/// Per-purpose pending operation slot.
///
/// The three fields are set and cleared together as a unit: a slot is either
/// fully armed (flag set, digest and expiry present) or fully absent. Only
/// the token digest is ever stored here; the raw token exists transiently in
/// memory and in the delivery email.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOperation {
    /// Whether an operation of this purpose is currently pending.
    pub active: bool,

    /// SHA-256 hex digest of the raw token, if armed.
    pub token_digest: Option<String>,

    /// Timestamp after which the pending operation is no longer valid.
    pub expires_at: Option<DateTime<Utc>>,
}

impl PendingOperation {
    /// Arms the slot with a fresh token digest and expiry.
    ///
    /// Any previously pending operation of the same purpose is superseded:
    /// its digest is overwritten and only the new token can ever match.
    pub fn arm(&mut self, token_digest: String, expires_at: DateTime<Utc>) {
        self.active = true;
        self.token_digest = Some(token_digest);
        self.expires_at = Some(expires_at);
    }

    /// Clears all three fields, returning the slot to the absent state.
    pub fn clear(&mut self) {
        self.active = false;
        self.token_digest = None;
        self.expires_at = None;
    }

    /// Whether the slot currently holds a pending operation (expired or not).
    pub fn is_armed(&self) -> bool {
        self.active
    }

    /// Whether the slot holds an operation that has not yet expired.
    ///
    /// The expiry bound is exclusive: a slot whose `expires_at` equals `now`
    /// is no longer live.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.active && self.expires_at.map_or(false, |expires_at| expires_at > now)
    }

    /// Whether a presented token digest redeems this slot at `now`.
    ///
    /// Uses constant-time comparison for the digest equality check.
    pub fn matches(&self, token_digest: &str, now: DateTime<Utc>) -> bool {
        if !self.is_live(now) {
            return false;
        }
        match &self.token_digest {
            Some(stored) => {
                stored.len() == token_digest.len()
                    && constant_time_eq(stored.as_bytes(), token_digest.as_bytes())
            }
            None => false,
        }
    }
}
