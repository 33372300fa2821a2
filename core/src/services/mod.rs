//! Business services containing domain logic and use cases.

pub mod clock;
pub mod lifecycle;
pub mod scheduler;
pub mod token;

// Re-export commonly used types
pub use clock::{Clock, SystemClock};
pub use lifecycle::{
    AccountSummary, LifecycleConfig, LifecycleService, Mailer, PasswordHasher, StartedOperation,
};
pub use scheduler::ExpiryScheduler;
pub use token::{IssuedToken, TOKEN_BYTES};
