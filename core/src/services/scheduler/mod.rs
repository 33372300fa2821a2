//! In-process expiry scheduler for pending security operations
//!
//! This module provides the timer facility that scrubs expired pending
//! operations from storage without a background polling process:
//! - One live timer at most per (purpose, account) key
//! - Cancel-and-replace semantics on re-arming
//! - Deferred, conditional clears that cannot race a consuming write
//! - Best-effort failure handling; the read path stays authoritative

mod service;


pub use service::ExpiryScheduler;
