//! Security token generation and digesting.

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Number of random bytes in a raw security token (512 bits of entropy).
pub const TOKEN_BYTES: usize = 64;

/// A freshly issued single-use security token.
///
/// `raw` is handed to the account owner exactly once, through the delivery
/// channel, and is never stored. `digest` is the only form that ever reaches
/// persistence, where it serves as the equality lookup key.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Hex-encoded random token, returned once and never stored.
    pub raw: String,

    /// SHA-256 hex digest of `raw`, suitable for storage and lookup.
    pub digest: String,
}

impl IssuedToken {
    /// Issues a new token from the OS entropy source.
    ///
    /// An exhausted entropy source aborts the process; there is no
    /// recoverable failure mode.
    pub fn issue() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        let raw = hex::encode(bytes);
        let digest = Self::digest_of(&raw);
        Self { raw, digest }
    }

    /// Computes the storage digest of a raw token.
    pub fn digest_of(raw: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(raw.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}
