//! Leaderboard aggregation and certificate records.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{CertificateId, EventId, Reward, SnapshotId, UserId};

/// One row of a leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RankingEntry {
    /// Recipient.
    pub user_id: UserId,
    /// Sum of reward amounts received in the window.
    pub total_amount: u64,
    /// Number of rewards received in the window.
    pub reward_count: u32,
    /// Most recent reward received in the window; earlier wins ties.
    pub last_received_at: DateTime<Utc>,
    /// 1-based position, without gaps.
    pub rank: u32,
}

/// Point-in-time daily leaderboard. One per (event, date) unless regenerated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DailyRankingSnapshot {
    /// Snapshot identifier.
    pub id: SnapshotId,
    /// Event.
    pub event_id: EventId,
    /// Day covered.
    pub date: NaiveDate,
    /// Ordered rows.
    pub rankings: Vec<RankingEntry>,
    /// Generation time.
    pub generated_at: DateTime<Utc>,
}

/// Leaderboard over the whole event, available once it is completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FinalRanking {
    /// Event.
    pub event_id: EventId,
    /// Ordered rows.
    pub rankings: Vec<RankingEntry>,
    /// Generation time.
    pub generated_at: DateTime<Utc>,
}

/// Immutable achievement record for a top-ranked participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Certificate {
    /// Certificate identifier.
    pub id: CertificateId,
    /// Holder.
    pub user_id: UserId,
    /// Event.
    pub event_id: EventId,
    /// Final rank, 1 to 3.
    pub rank: u8,
    /// Final reward total of the holder.
    pub total_amount: u64,
    /// Globally unique human-readable number.
    pub certificate_number: String,
    /// Issue time.
    pub issued_at: DateTime<Utc>,
    /// Expiry date: one year after the event ends.
    pub expires_at: NaiveDate,
}

/// Groups rewards by recipient and orders them into a leaderboard.
///
/// Order: total descending, then earliest `last_received_at`, then user id.
///
/// Ranks are positions in that order, so every row has a distinct rank.
/// This is not dense ranking: two recipients with equal totals never share
/// a rank. The earlier `last_received_at` takes the better place, and the
/// user id settles a full tie so the order is stable across recomputes.
#[must_use]
pub fn rank_recipients<'a>(rewards: impl IntoIterator<Item = &'a Reward>) -> Vec<RankingEntry> {
    let mut totals: HashMap<UserId, RankingEntry> = HashMap::new();
    for reward in rewards {
        let entry = totals.entry(reward.recipient_id).or_insert(RankingEntry {
            user_id: reward.recipient_id,
            total_amount: 0,
            reward_count: 0,
            last_received_at: reward.created_at,
            rank: 0,
        });
        entry.total_amount = entry.total_amount.saturating_add(u64::from(reward.amount));
        entry.reward_count = entry.reward_count.saturating_add(1);
        entry.last_received_at = entry.last_received_at.max(reward.created_at);
    }

    let mut rows: Vec<RankingEntry> = totals.into_values().collect();
    rows.sort_by(|a, b| {
        b.total_amount
            .cmp(&a.total_amount)
            .then(a.last_received_at.cmp(&b.last_received_at))
            .then(a.user_id.cmp(&b.user_id))
    });
    for (row, rank) in rows.iter_mut().zip(1u32..) {
        row.rank = rank;
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CheckInId, RewardId};

    fn reward(recipient: UserId, amount: u32, at: DateTime<Utc>) -> Reward {
        Reward {
            id: RewardId::new(),
            event_id: EventId::new(),
            giver_id: UserId::new(),
            recipient_id: recipient,
            target_id: CheckInId::new(),
            amount,
            comment: None,
            anonymous: false,
            created_at: at,
        }
    }

    #[test]
    fn totals_are_summed_and_sorted() {
        let t0 = Utc::now();
        let (a, b) = (UserId::new(), UserId::new());
        let rewards = vec![
            reward(a, 1, t0),
            reward(b, 2, t0),
            reward(a, 3, t0 + chrono::Duration::minutes(1)),
        ];
        let rows = rank_recipients(&rewards);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.first().map(|r| (r.user_id, r.total_amount, r.rank)), Some((a, 4, 1)));
        assert_eq!(rows.get(1).map(|r| (r.user_id, r.total_amount, r.rank)), Some((b, 2, 2)));
        let sum: u64 = rows.iter().map(|r| r.total_amount).sum();
        assert_eq!(sum, 6);
    }

    #[test]
    fn ties_go_to_the_earliest_last_reward() {
        let t0 = Utc::now();
        let (a, b, c) = (UserId::new(), UserId::new(), UserId::new());
        let rewards = vec![
            reward(c, 1, t0 + chrono::Duration::seconds(2)),
            reward(a, 1, t0),
            reward(b, 1, t0 + chrono::Duration::seconds(1)),
        ];
        let order: Vec<_> = rank_recipients(&rewards)
            .into_iter()
            .map(|r| (r.user_id, r.rank))
            .collect();
        assert_eq!(order, vec![(a, 1), (b, 2), (c, 3)]);
    }

    #[test]
    fn ranking_is_deterministic() {
        let t0 = Utc::now();
        let users: Vec<UserId> = (0..5).map(|_| UserId::new()).collect();
        let rewards: Vec<Reward> = users.iter().map(|u| reward(*u, 1, t0)).collect();
        assert_eq!(rank_recipients(&rewards), rank_recipients(rewards.iter().rev()));
    }

    #[test]
    fn full_ties_still_get_distinct_ranks() {
        let t0 = Utc::now();
        let mut users: Vec<UserId> = (0..3).map(|_| UserId::new()).collect();
        let rewards: Vec<Reward> = users.iter().map(|u| reward(*u, 2, t0)).collect();
        users.sort();
        let rows = rank_recipients(&rewards);
        let ranks: Vec<u32> = rows.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
        let order: Vec<UserId> = rows.iter().map(|r| r.user_id).collect();
        assert_eq!(order, users);
    }

    #[test]
    fn empty_input_yields_empty_board() {
        assert!(rank_recipients(&Vec::<Reward>::new()).is_empty());
    }
}
