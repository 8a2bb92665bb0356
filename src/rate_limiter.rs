//! Fixed-window payment-attempt guard.
//!
//! Every call into payment validation records one attempt against a
//! counter persisted in the store, so a page reload does not reset it.
//! Once the counter reaches the limit, further attempts are refused until
//! the lockout window has passed; the first check after the window resets
//! the counter to zero.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::errors::ServiceError;
use crate::models::RateLimitCounter;
use crate::store::JsonStore;

/// Outcome of a lockout check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutStatus {
    pub limited: bool,
    /// Minutes until the window opens again, rounded up. Zero when not
    /// limited.
    pub remaining_minutes: u64,
}

impl LockoutStatus {
    fn open() -> Self {
        Self {
            limited: false,
            remaining_minutes: 0,
        }
    }
}

#[derive(Clone)]
pub struct AttemptGuard {
    store: Arc<JsonStore>,
    max_attempts: u32,
    lockout: Duration,
}

impl AttemptGuard {
    pub fn new(store: Arc<JsonStore>, max_attempts: u32, lockout_minutes: i64) -> Self {
        Self {
            store,
            max_attempts,
            lockout: Duration::minutes(lockout_minutes),
        }
    }

    /// Records one attempt at `now`, bumping the persisted counter.
    pub async fn record_attempt(&self, now: DateTime<Utc>) -> Result<(), ServiceError> {
        let counter = self
            .store
            .update_payment_attempts(|c| {
                c.count += 1;
                c.last_attempt = Some(now);
            })
            .await?;
        debug!(count = counter.count, "payment attempt recorded");
        Ok(())
    }

    /// Checks whether the caller is locked out as of `now`. A counter at
    /// the limit whose window has elapsed is reset here, so the check has
    /// a write side effect in exactly that case.
    pub async fn check_lockout(&self, now: DateTime<Utc>) -> Result<LockoutStatus, ServiceError> {
        let counter = self.store.payment_attempts().await;
        if counter.count < self.max_attempts {
            return Ok(LockoutStatus::open());
        }

        if let Some(last) = counter.last_attempt {
            let since = now - last;
            if since < self.lockout {
                let remaining = self.lockout - since;
                let remaining_minutes = (remaining.num_seconds() as u64).div_ceil(60).max(1);
                warn!(remaining_minutes, "payment attempts locked out");
                return Ok(LockoutStatus {
                    limited: true,
                    remaining_minutes,
                });
            }
        }

        self.store
            .update_payment_attempts(|c| *c = RateLimitCounter::default())
            .await?;
        debug!("lockout window elapsed; attempt counter reset");
        Ok(LockoutStatus::open())
    }

    /// Current persisted attempt count.
    pub async fn attempt_count(&self) -> u32 {
        self.store.payment_attempts().await.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    async fn guard_in(dir: &tempfile::TempDir) -> AttemptGuard {
        let store = Arc::new(
            JsonStore::open(dir.path().join("store.json"))
                .await
                .unwrap(),
        );
        AttemptGuard::new(store, 3, 15)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn under_the_limit_is_never_locked() {
        let dir = tempfile::tempdir().unwrap();
        let guard = guard_in(&dir).await;
        let now = t0();

        guard.record_attempt(now).await.unwrap();
        guard.record_attempt(now).await.unwrap();
        assert_eq!(guard.check_lockout(now).await.unwrap(), LockoutStatus::open());
    }

    #[tokio::test]
    async fn at_the_limit_locks_until_the_window_passes() {
        let dir = tempfile::tempdir().unwrap();
        let guard = guard_in(&dir).await;
        let now = t0();

        for _ in 0..3 {
            guard.record_attempt(now).await.unwrap();
        }

        let status = guard.check_lockout(now + Duration::minutes(5)).await.unwrap();
        assert!(status.limited);
        assert_eq!(status.remaining_minutes, 10);

        // After the window, the check itself resets the counter.
        let status = guard
            .check_lockout(now + Duration::minutes(16))
            .await
            .unwrap();
        assert!(!status.limited);
        assert_eq!(guard.attempt_count().await, 0);
    }

    #[tokio::test]
    async fn remaining_minutes_round_up() {
        let dir = tempfile::tempdir().unwrap();
        let guard = guard_in(&dir).await;
        let now = t0();

        for _ in 0..3 {
            guard.record_attempt(now).await.unwrap();
        }

        let status = guard
            .check_lockout(now + Duration::seconds(30))
            .await
            .unwrap();
        assert!(status.limited);
        assert_eq!(status.remaining_minutes, 15);
    }

    #[tokio::test]
    async fn counter_survives_a_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let now = t0();

        {
            let guard = guard_in(&dir).await;
            for _ in 0..3 {
                guard.record_attempt(now).await.unwrap();
            }
        }

        let guard = guard_in(&dir).await;
        let status = guard.check_lockout(now + Duration::minutes(1)).await.unwrap();
        assert!(status.limited);
    }
}
