//! Append-only store of check-ins and rewards.
//!
//! Check-ins are unique per (event, user, day). Rewards are immutable once
//! appended; nothing in this module edits or deletes them.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use utoipa::ToSchema;

use super::{CheckInId, EventId, RewardId, UserId};
use crate::error::GatewayError;

/// A participant's daily reading check-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CheckIn {
    /// Check-in identifier.
    pub id: CheckInId,
    /// Event the check-in belongs to.
    pub event_id: EventId,
    /// Author of the check-in.
    pub user_id: UserId,
    /// Reading day covered.
    pub date: NaiveDate,
    /// Free-form reading note.
    pub note: Option<String>,
    /// Recording time.
    pub created_at: DateTime<Utc>,
}

/// An immutable unit of peer recognition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Reward {
    /// Reward identifier.
    pub id: RewardId,
    /// Event of the target check-in.
    pub event_id: EventId,
    /// Spender.
    pub giver_id: UserId,
    /// Beneficiary.
    pub recipient_id: UserId,
    /// Check-in being rewarded.
    pub target_id: CheckInId,
    /// Tokens spent (at least 1).
    pub amount: u32,
    /// Optional message.
    pub comment: Option<String>,
    /// Hide the giver from the recipient.
    pub anonymous: bool,
    /// Commit time.
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct CheckIns {
    by_id: HashMap<CheckInId, CheckIn>,
    by_day: HashMap<(EventId, UserId, NaiveDate), CheckInId>,
}

/// In-process log of check-ins and rewards.
#[derive(Debug, Default)]
pub struct ActivityLog {
    check_ins: RwLock<CheckIns>,
    rewards: RwLock<Vec<Reward>>,
}

impl ActivityLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a check-in, rejecting a second one for the same day.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::StateConflict`] if the user already checked in
    /// for that day.
    pub async fn record_check_in(&self, check_in: CheckIn) -> Result<CheckIn, GatewayError> {
        let mut log = self.check_ins.write().await;
        let day_key = (check_in.event_id, check_in.user_id, check_in.date);
        if log.by_day.contains_key(&day_key) {
            return Err(GatewayError::StateConflict(format!(
                "already checked in for {}",
                check_in.date
            )));
        }
        log.by_day.insert(day_key, check_in.id);
        log.by_id.insert(check_in.id, check_in.clone());
        Ok(check_in)
    }

    /// Looks up a check-in by id.
    pub async fn check_in(&self, id: CheckInId) -> Option<CheckIn> {
        self.check_ins.read().await.by_id.get(&id).cloned()
    }

    /// Distinct days on which `user_id` checked in for `event_id`.
    pub async fn check_in_days(&self, event_id: EventId, user_id: UserId) -> BTreeSet<NaiveDate> {
        self.check_ins
            .read()
            .await
            .by_day
            .keys()
            .filter(|(e, u, _)| *e == event_id && *u == user_id)
            .map(|(_, _, d)| *d)
            .collect()
    }

    /// Appends a reward. Rewards are never modified afterwards.
    pub async fn append_reward(&self, reward: Reward) {
        self.rewards.write().await.push(reward);
    }

    /// Looks up a reward by id.
    pub async fn reward(&self, id: RewardId) -> Option<Reward> {
        self.rewards.read().await.iter().find(|r| r.id == id).cloned()
    }

    /// All rewards of an event, in commit order.
    pub async fn rewards_for_event(&self, event_id: EventId) -> Vec<Reward> {
        self.rewards
            .read()
            .await
            .iter()
            .filter(|r| r.event_id == event_id)
            .cloned()
            .collect()
    }

    /// Rewards of an event committed on `date` (UTC day bounds).
    pub async fn rewards_for_event_on(&self, event_id: EventId, date: NaiveDate) -> Vec<Reward> {
        self.rewards
            .read()
            .await
            .iter()
            .filter(|r| r.event_id == event_id && r.created_at.date_naive() == date)
            .cloned()
            .collect()
    }

    /// Rewards spent by `giver_id` on `event_id` during `date`.
    pub async fn rewards_given_on(
        &self,
        event_id: EventId,
        giver_id: UserId,
        date: NaiveDate,
    ) -> Vec<Reward> {
        self.rewards
            .read()
            .await
            .iter()
            .filter(|r| {
                r.event_id == event_id && r.giver_id == giver_id && r.created_at.date_naive() == date
            })
            .cloned()
            .collect()
    }
}
