//! Clock abstraction shared by the lifecycle controller and expiry scheduler.
//!
//! Expiry timestamps are written, timer delays computed, and consumption
//! comparisons made against a single injected time source, so the exclusive
//! expiry boundary holds consistently across components.

use chrono::{DateTime, Utc};

/// Source of "now" for all token expiry decisions.
pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation used in production.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
