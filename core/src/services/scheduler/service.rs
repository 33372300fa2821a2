//! Process-wide expiry scheduler for pending security operations.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::domain::entities::pending_operation::TokenPurpose;
use crate::repositories::AccountRepository;
use crate::services::clock::Clock;

/// Timer map key: one live timer at most per (purpose, account).
type TimerKey = (TokenPurpose, Uuid);

/// Bookkeeping for one armed timer.
struct ArmedTimer {
    /// Distinguishes this arming from any later re-arming of the same key.
    generation: u64,
    /// Digest remembered at arm time; the clear is conditional on it.
    token_digest: String,
    /// Handle of the sleeping task, aborted on cancel or replace.
    handle: JoinHandle<()>,
}

/// Expiry scheduler for pending security operations.
///
/// Guarantees that an armed pending-operation slot is cleared from storage
/// no later than a bounded delay after its expiry, exactly once, unless the
/// timer is cancelled first. One instance serves all four purposes and every
/// account; construct it once at process start and share it as an `Arc`.
///
/// The scheduler is a best-effort optimization: its state does not survive a
/// restart, and the consumption path's own expiry check remains the
/// authoritative guard. Timer callbacks run as detached tasks and are never
/// awaited by request flows.
pub struct ExpiryScheduler<R, C>
where
    R: AccountRepository + 'static,
    C: Clock + 'static,
{
    inner: Arc<SchedulerInner<R, C>>,
}

struct SchedulerInner<R, C>
where
    R: AccountRepository + 'static,
    C: Clock + 'static,
{
    /// Repository used by fire handlers to scrub expired slots.
    repository: Arc<R>,
    /// Shared time source for delay computation.
    clock: Arc<C>,
    /// Live timers, at most one per key.
    timers: Mutex<HashMap<TimerKey, ArmedTimer>>,
    /// Monotonic arming counter backing the generation check.
    generation: AtomicU64,
}

impl<R, C> ExpiryScheduler<R, C>
where
    R: AccountRepository + 'static,
    C: Clock + 'static,
{
    /// Create a new scheduler over the given repository and clock.
    pub fn new(repository: Arc<R>, clock: Arc<C>) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                repository,
                clock,
                timers: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Arm (or re-arm) the expiry timer for a key.
    ///
    /// Any existing timer for the same key is cancelled and replaced along
    /// with its remembered digest; timers replace, they never accumulate. A
    /// deadline already in the past fires on the next scheduling
    /// opportunity, never inline with the caller.
    pub async fn arm(
        &self,
        purpose: TokenPurpose,
        account_id: Uuid,
        token_digest: String,
        expires_at: DateTime<Utc>,
    ) {
        let key = (purpose, account_id);
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed);
        let delay = (expires_at - self.inner.clock.now())
            .to_std()
            .unwrap_or(Duration::ZERO);

        let mut timers = self.inner.timers.lock().await;

        // The fire task blocks on this same lock, so the new entry is
        // visible before any timer for this key can run its checks.
        let inner = Arc::clone(&self.inner);
        let digest = token_digest.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.fire(purpose, account_id, generation, digest).await;
        });

        if let Some(replaced) = timers.insert(
            key,
            ArmedTimer {
                generation,
                token_digest,
                handle,
            },
        ) {
            replaced.handle.abort();
        }

        debug!(
            account_id = %account_id,
            purpose = purpose.as_str(),
            expires_at = %expires_at,
            event = "timer_armed",
            "Armed expiry timer"
        );
    }

    /// Cancel the timer for a key, if present.
    ///
    /// With `cancel_only` the scheduler drops its bookkeeping and touches
    /// nothing in storage: the caller has already updated the slot, or is
    /// about to supersede it. Otherwise a clear-and-persist is submitted as
    /// a fresh task, so it runs after the caller's just-issued persistence
    /// call rather than alongside it; once the slot is already empty that
    /// clear is a no-op.
    ///
    /// Cancelling an already-fired or never-armed timer is a no-op.
    pub async fn disarm(&self, purpose: TokenPurpose, account_id: Uuid, cancel_only: bool) {
        let removed = {
            let mut timers = self.inner.timers.lock().await;
            timers.remove(&(purpose, account_id))
        };

        let Some(armed) = removed else {
            return;
        };
        armed.handle.abort();

        debug!(
            account_id = %account_id,
            purpose = purpose.as_str(),
            cancel_only,
            event = "timer_disarmed",
            "Disarmed expiry timer"
        );

        if cancel_only {
            return;
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner
                .clear_slot(purpose, account_id, &armed.token_digest, "deferred_clear")
                .await;
        });
    }

    /// Whether a timer is currently armed for the key.
    pub async fn is_armed(&self, purpose: TokenPurpose, account_id: Uuid) -> bool {
        self.inner
            .timers
            .lock()
            .await
            .contains_key(&(purpose, account_id))
    }

    /// Number of timers currently armed across all keys.
    pub async fn armed_count(&self) -> usize {
        self.inner.timers.lock().await.len()
    }
}

impl<R, C> SchedulerInner<R, C>
where
    R: AccountRepository + 'static,
    C: Clock + 'static,
{
    /// Fire handler: scrub the expired slot and drop bookkeeping.
    async fn fire(
        &self,
        purpose: TokenPurpose,
        account_id: Uuid,
        generation: u64,
        token_digest: String,
    ) {
        {
            let mut timers = self.timers.lock().await;
            match timers.get(&(purpose, account_id)) {
                // A superseded or cancelled timer must not clear anything.
                Some(armed) if armed.generation == generation => {
                    timers.remove(&(purpose, account_id));
                }
                _ => return,
            }
        }

        self.clear_slot(purpose, account_id, &token_digest, "expiry_fire")
            .await;
    }

    /// Clear-and-persist a slot, conditional on its remembered digest.
    ///
    /// Failures are logged and never retried: bookkeeping is already
    /// dropped, and the consumption path's expiry check keeps an expired
    /// token from being accepted regardless.
    async fn clear_slot(
        &self,
        purpose: TokenPurpose,
        account_id: Uuid,
        token_digest: &str,
        trigger: &'static str,
    ) {
        match self
            .repository
            .clear_pending(account_id, purpose, token_digest)
            .await
        {
            Ok(true) => {
                info!(
                    account_id = %account_id,
                    purpose = purpose.as_str(),
                    trigger,
                    event = "pending_operation_cleared",
                    "Cleared pending operation from storage"
                );
            }
            Ok(false) => {
                debug!(
                    account_id = %account_id,
                    purpose = purpose.as_str(),
                    trigger,
                    event = "pending_operation_clear_skipped",
                    "Slot no longer holds the remembered digest; nothing to clear"
                );
            }
            Err(err) => {
                error!(
                    account_id = %account_id,
                    purpose = purpose.as_str(),
                    trigger,
                    error = %err,
                    event = "pending_operation_clear_failed",
                    "Failed to clear pending operation from storage"
                );
            }
        }
    }
}
