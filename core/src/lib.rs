//! # AccountGuard Core
//!
//! Core business logic and domain layer for the AccountGuard backend.
//! This crate contains the account domain entities, the single-use token
//! lifecycle services, the expiry scheduler, repository interfaces, and
//! error types that form the foundation of the application architecture.

pub mod domain;
pub mod errors;
pub mod repositories;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::entities::{Account, PendingOperation, TokenPurpose};
pub use errors::{DomainError, DomainResult, LifecycleError};
pub use repositories::AccountRepository;
pub use services::{
    Clock, ExpiryScheduler, IssuedToken, LifecycleConfig, LifecycleService, Mailer,
    PasswordHasher, SystemClock,
};
