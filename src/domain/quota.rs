//! Per (user, event, day) reward allowance rows.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{EventId, QuotaId, UserId};

/// Unique key of a quota row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct QuotaKey {
    /// Giver.
    pub user_id: UserId,
    /// Event the allowance applies to.
    pub event_id: EventId,
    /// Day the allowance applies to.
    pub date: NaiveDate,
}

/// Reward allowance of one giver for one event day. Never rolls over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Quota {
    /// Row identifier.
    pub id: QuotaId,
    /// Giver.
    pub user_id: UserId,
    /// Event.
    pub event_id: EventId,
    /// Day.
    pub date: NaiveDate,
    /// Tokens available that day.
    pub max_allowance: u32,
    /// Tokens spent that day.
    pub used: u32,
    /// Rewards given that day.
    pub give_count_today: u32,
    /// Time of the most recent reward given.
    pub last_given_at: Option<DateTime<Utc>>,
    /// Lazy creation time.
    pub created_at: DateTime<Utc>,
}

impl Quota {
    /// Creates an unused row.
    #[must_use]
    pub fn new(key: QuotaKey, max_allowance: u32, now: DateTime<Utc>) -> Self {
        Self {
            id: QuotaId::new(),
            user_id: key.user_id,
            event_id: key.event_id,
            date: key.date,
            max_allowance,
            used: 0,
            give_count_today: 0,
            last_given_at: None,
            created_at: now,
        }
    }

    /// Key this row is stored under.
    #[must_use]
    pub const fn key(&self) -> QuotaKey {
        QuotaKey {
            user_id: self.user_id,
            event_id: self.event_id,
            date: self.date,
        }
    }

    /// Tokens still available.
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.max_allowance.saturating_sub(self.used)
    }

    /// Read-only view of the row.
    #[must_use]
    pub const fn status(&self) -> QuotaStatus {
        QuotaStatus {
            max_allowance: self.max_allowance,
            used: self.used,
            remaining: self.remaining(),
            give_count_today: self.give_count_today,
        }
    }
}

/// Snapshot of a quota row returned to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct QuotaStatus {
    /// Tokens available that day.
    pub max_allowance: u32,
    /// Tokens spent.
    pub used: u32,
    /// Tokens left.
    pub remaining: u32,
    /// Rewards given that day.
    pub give_count_today: u32,
}

impl QuotaStatus {
    /// Status of a row that has not been created yet.
    #[must_use]
    pub const fn untouched(max_allowance: u32) -> Self {
        Self {
            max_allowance,
            used: 0,
            remaining: max_allowance,
            give_count_today: 0,
        }
    }
}
