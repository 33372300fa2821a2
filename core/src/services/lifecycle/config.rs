//! Configuration for the token lifecycle service

/// Default time-to-live for issued tokens (10 minutes)
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 10;

/// Configuration for the token lifecycle service
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Number of minutes before an issued token expires
    pub token_ttl_minutes: i64,
    /// Base URL embedded in token delivery emails
    pub link_base_url: String,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            token_ttl_minutes: DEFAULT_TOKEN_TTL_MINUTES,
            link_base_url: "https://app.accountguard.example".to_string(),
        }
    }
}
