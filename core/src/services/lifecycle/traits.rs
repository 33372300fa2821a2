//! Traits for email delivery and password hashing collaborators

use async_trait::async_trait;

/// Trait for outbound email delivery
///
/// The raw token travels through this channel exactly once; a delivery
/// failure rolls the operation back as if it never started.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver a token-bearing email; returns a provider message id
    async fn send_token_email(&self, to: &str, subject: &str, body: &str)
        -> Result<String, String>;
}

/// Trait for password hashing integration
///
/// The hashing algorithm lives outside the core; this boundary only moves
/// opaque hashes around.
pub trait PasswordHasher: Send + Sync {
    /// Hash a raw password for storage
    fn hash_password(&self, raw: &str) -> Result<String, String>;
    /// Check a raw password against a stored hash
    fn verify_password(&self, raw: &str, password_hash: &str) -> Result<bool, String>;
}
