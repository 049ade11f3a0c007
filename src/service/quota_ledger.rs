//! Per (user, event, day) reward allowance with atomic consumption.
//!
//! Rows are created lazily on first access. Creation is lock-check-create
//! under the ledger's outer write lock, so two concurrent first accesses
//! for the same key share one row. Consumption holds the row's own mutex
//! across read-verify-write of `used`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::domain::{Clock, Event, EventId, Quota, QuotaKey, QuotaStatus, UserId};
use crate::error::GatewayError;

/// Ledger of daily reward allowances.
#[derive(Debug, Clone)]
pub struct QuotaLedger {
    rows: Arc<RwLock<HashMap<QuotaKey, Arc<Mutex<Quota>>>>>,
    default_allowance: u32,
    lock_timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl QuotaLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new(default_allowance: u32, lock_timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            rows: Arc::new(RwLock::new(HashMap::new())),
            default_allowance,
            lock_timeout,
            clock,
        }
    }

    /// Daily allowance given to new rows.
    #[must_use]
    pub const fn default_allowance(&self) -> u32 {
        self.default_allowance
    }

    /// Returns the row for `key`, creating it with `used = 0` if absent.
    pub async fn quota_for(&self, key: QuotaKey) -> Arc<Mutex<Quota>> {
        if let Some(row) = self.rows.read().await.get(&key) {
            return Arc::clone(row);
        }
        let mut rows = self.rows.write().await;
        let now = self.clock.now();
        let default_allowance = self.default_allowance;
        Arc::clone(
            rows.entry(key)
                .or_insert_with(|| Arc::new(Mutex::new(Quota::new(key, default_allowance, now)))),
        )
    }

    /// Current figures for `key` without creating a row.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ConcurrencyConflict`] if the row stays locked
    /// past the configured timeout.
    pub async fn peek(&self, key: QuotaKey) -> Result<QuotaStatus, GatewayError> {
        let row = self.rows.read().await.get(&key).cloned();
        match row {
            Some(row) => {
                let quota = self.acquire(row, key).await?;
                Ok(quota.status())
            }
            None => Ok(QuotaStatus::untouched(self.default_allowance)),
        }
    }

    /// Copy of the stored row for `key`, without creating one.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ConcurrencyConflict`] on lock timeout.
    pub async fn row(&self, key: QuotaKey) -> Result<Option<Quota>, GatewayError> {
        let row = self.rows.read().await.get(&key).cloned();
        match row {
            Some(row) => {
                let quota = self.acquire(row, key).await?;
                Ok(Some((*quota).clone()))
            }
            None => Ok(None),
        }
    }

    /// Puts a stored row back under its key, replacing any live row.
    pub async fn restore(&self, quota: Quota) {
        self.rows
            .write()
            .await
            .insert(quota.key(), Arc::new(Mutex::new(quota)));
    }

    /// `max_allowance - used` for `key`, creating the row if absent.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ConcurrencyConflict`] on lock timeout.
    pub async fn remaining(&self, key: QuotaKey) -> Result<u32, GatewayError> {
        Ok(self.lock(key).await?.remaining())
    }

    /// Locks the row for `key` (creating it if absent) for a multi-step
    /// atomic unit. The row stays locked until the guard is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ConcurrencyConflict`] if the row stays locked
    /// past the configured timeout.
    pub async fn lock(&self, key: QuotaKey) -> Result<OwnedMutexGuard<Quota>, GatewayError> {
        let row = self.quota_for(key).await;
        self.acquire(row, key).await
    }

    async fn acquire(
        &self,
        row: Arc<Mutex<Quota>>,
        key: QuotaKey,
    ) -> Result<OwnedMutexGuard<Quota>, GatewayError> {
        tokio::time::timeout(self.lock_timeout, row.lock_owned())
            .await
            .map_err(|_| {
                tracing::warn!(
                    user_id = %key.user_id,
                    event_id = %key.event_id,
                    date = %key.date,
                    "quota row contention timed out"
                );
                GatewayError::ConcurrencyConflict(format!(
                    "quota for {} on {} is busy",
                    key.user_id, key.date
                ))
            })
    }

    /// Checks whether `user_id` may spend `amount` on `event` on `date`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ConcurrencyConflict`] on lock timeout.
    pub async fn can_give(
        &self,
        event: &Event,
        user_id: UserId,
        amount: u32,
        date: NaiveDate,
    ) -> Result<bool, GatewayError> {
        let status = self.peek(Self::key(user_id, event.id, date)).await?;
        Ok(Self::check(event, &status, amount, date).is_ok())
    }

    /// Atomically spends `amount` from the row for (`user_id`, `event`, `date`).
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::EventNotActive`] or
    /// [`GatewayError::StateConflict`] when the event or day does not allow
    /// rewards, [`GatewayError::InsufficientQuota`] when the remaining
    /// allowance is too small, and [`GatewayError::ConcurrencyConflict`] on
    /// lock timeout.
    pub async fn consume(
        &self,
        event: &Event,
        user_id: UserId,
        amount: u32,
        date: NaiveDate,
    ) -> Result<QuotaStatus, GatewayError> {
        let mut quota = self.lock(Self::key(user_id, event.id, date)).await?;
        Self::consume_locked(event, &mut quota, amount, date)?;
        Ok(quota.status())
    }

    /// Spends `amount` from an already locked row. All checks happen before
    /// `used` is written, so a failure leaves the row untouched.
    ///
    /// # Errors
    ///
    /// Same as [`QuotaLedger::consume`], minus lock timeouts.
    pub fn consume_locked(
        event: &Event,
        quota: &mut Quota,
        amount: u32,
        date: NaiveDate,
    ) -> Result<(), GatewayError> {
        Self::check(event, &quota.status(), amount, date)?;
        quota.used = quota.used.saturating_add(amount);
        Ok(())
    }

    fn check(
        event: &Event,
        status: &QuotaStatus,
        amount: u32,
        date: NaiveDate,
    ) -> Result<(), GatewayError> {
        if amount == 0 {
            return Err(GatewayError::invalid("amount", "must be at least 1"));
        }
        if !event.accepts_rewards() {
            return Err(GatewayError::EventNotActive(event.id));
        }
        if !event.is_activity_day(date) {
            return Err(GatewayError::StateConflict(format!(
                "{date} is not an activity day of event {}",
                event.id
            )));
        }
        if status.remaining < amount {
            return Err(GatewayError::InsufficientQuota {
                remaining: status.remaining,
                used: status.used,
                max: status.max_allowance,
            });
        }
        Ok(())
    }

    /// Builds a row key.
    #[must_use]
    pub const fn key(user_id: UserId, event_id: EventId, date: NaiveDate) -> QuotaKey {
        QuotaKey {
            user_id,
            event_id,
            date,
        }
    }
}
