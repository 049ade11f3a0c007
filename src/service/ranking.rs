//! Daily and final leaderboards built from the reward log.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::RwLock;

use super::EngineContext;
use crate::domain::{
    ApprovalStatus, DailyRankingSnapshot, DomainEvent, EventId, EventStatus, FinalRanking, Outbox,
    SnapshotId, rank_recipients,
};
use crate::error::GatewayError;

type SnapshotMap = HashMap<(EventId, NaiveDate), DailyRankingSnapshot>;

/// Aggregates rewards into leaderboards and keeps the generated ones.
#[derive(Debug, Clone)]
pub struct RankingEngine {
    ctx: EngineContext,
    snapshots: Arc<RwLock<SnapshotMap>>,
    finals: Arc<RwLock<HashMap<EventId, FinalRanking>>>,
}

impl RankingEngine {
    /// Creates an engine with no stored leaderboards.
    #[must_use]
    pub fn new(ctx: EngineContext) -> Self {
        Self {
            ctx,
            snapshots: Arc::new(RwLock::new(HashMap::new())),
            finals: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Generates the leaderboard of rewards committed on `date`.
    ///
    /// An existing snapshot for the same day is returned as is unless
    /// `force` is set, in which case it is rebuilt from the current log.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::NotFound`] for an unknown event.
    /// - [`GatewayError::StateConflict`] if the event is not approved.
    /// - [`GatewayError::Validation`] if `date` lies outside the event.
    pub async fn daily_ranking(
        &self,
        event_id: EventId,
        date: NaiveDate,
        force: bool,
    ) -> Result<DailyRankingSnapshot, GatewayError> {
        let entry_lock = self.ctx.registry.get(event_id).await?;
        {
            let entry = entry_lock.read().await;
            if entry.event.approval_status != ApprovalStatus::Approved {
                return Err(GatewayError::StateConflict(
                    "rankings exist only for approved events".to_string(),
                ));
            }
            if date < entry.event.start_date || date > entry.event.end_date {
                return Err(GatewayError::invalid(
                    "date",
                    format!(
                        "must fall between {} and {}",
                        entry.event.start_date, entry.event.end_date
                    ),
                ));
            }
        }

        let mut snapshots = self.snapshots.write().await;
        if !force {
            if let Some(existing) = snapshots.get(&(event_id, date)) {
                return Ok(existing.clone());
            }
        }
        let rewards = self.ctx.activity.rewards_for_event_on(event_id, date).await;
        let now = self.ctx.clock.now();
        let snapshot = DailyRankingSnapshot {
            id: SnapshotId::new(),
            event_id,
            date,
            rankings: rank_recipients(&rewards),
            generated_at: now,
        };
        snapshots.insert((event_id, date), snapshot.clone());
        drop(snapshots);

        let mut outbox = Outbox::new();
        outbox.stage(DomainEvent::RankingGenerated {
            event_id,
            date,
            rankings: snapshot.rankings.clone(),
            timestamp: now,
        });
        outbox.commit(&self.ctx.event_bus);

        tracing::info!(%event_id, %date, rows = snapshot.rankings.len(), force, "daily ranking generated");
        Ok(snapshot)
    }

    /// Returns the stored snapshot for `date`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] if none was generated.
    pub async fn snapshot(
        &self,
        event_id: EventId,
        date: NaiveDate,
    ) -> Result<DailyRankingSnapshot, GatewayError> {
        self.snapshots
            .read()
            .await
            .get(&(event_id, date))
            .cloned()
            .ok_or_else(|| GatewayError::not_found("ranking snapshot", format!("{event_id}/{date}")))
    }

    /// Puts a stored snapshot back, replacing any snapshot of the same day.
    pub async fn restore_snapshot(&self, snapshot: DailyRankingSnapshot) {
        self.snapshots
            .write()
            .await
            .insert((snapshot.event_id, snapshot.date), snapshot);
    }

    /// Builds the leaderboard over the whole event. Rewards stop once an
    /// event completes, so the first result is kept and returned on later
    /// calls.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::StateConflict`] unless the event is completed.
    pub async fn finalize(&self, event_id: EventId) -> Result<FinalRanking, GatewayError> {
        let entry_lock = self.ctx.registry.get(event_id).await?;
        let status = entry_lock.read().await.event.status;
        if status != EventStatus::Completed {
            return Err(GatewayError::StateConflict(
                "final ranking requires a completed event".to_string(),
            ));
        }

        let mut finals = self.finals.write().await;
        if let Some(existing) = finals.get(&event_id) {
            return Ok(existing.clone());
        }
        let rewards = self.ctx.activity.rewards_for_event(event_id).await;
        let ranking = FinalRanking {
            event_id,
            rankings: rank_recipients(&rewards),
            generated_at: self.ctx.clock.now(),
        };
        finals.insert(event_id, ranking.clone());

        tracing::info!(%event_id, rows = ranking.rankings.len(), "final ranking computed");
        Ok(ranking)
    }

    /// Returns the final leaderboard if the event has been finalized.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] before finalization.
    pub async fn final_ranking(&self, event_id: EventId) -> Result<FinalRanking, GatewayError> {
        self.finals
            .read()
            .await
            .get(&event_id)
            .cloned()
            .ok_or_else(|| GatewayError::not_found("final ranking", event_id))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::UserId;
    use crate::domain::event::tests::date;
    use crate::service::fixtures::{Harness, day0, event_draft, harness};

    /// `giver` rewards each of `recipients` once, one minute apart.
    async fn reward_each(h: &Harness, event_id: EventId, giver: UserId, recipients: &[UserId]) {
        for recipient in recipients {
            let target = h.check_in_today(event_id, *recipient).await;
            h.clock.advance(chrono::Duration::minutes(1));
            let given = h.give(giver, &target, 1).await;
            assert!(given.is_ok(), "give failed: {given:?}");
        }
    }

    #[tokio::test]
    async fn ties_follow_first_received_order() {
        let h = harness();
        let (event_id, users) = h.started(4).await;
        let [giver, a, b, c] = users.as_slice() else {
            panic!("four users");
        };
        reward_each(&h, event_id, *giver, &[*a, *b, *c]).await;

        let Ok(snapshot) = h.engine.rankings.daily_ranking(event_id, day0(), false).await else {
            panic!("ranking");
        };
        let order: Vec<(UserId, u64, u32)> = snapshot
            .rankings
            .iter()
            .map(|r| (r.user_id, r.total_amount, r.rank))
            .collect();
        assert_eq!(order, vec![(*a, 1, 1), (*b, 1, 2), (*c, 1, 3)]);

        let Ok(again) = h.engine.rankings.daily_ranking(event_id, day0(), false).await else {
            panic!("ranking");
        };
        assert_eq!(again, snapshot);
    }

    #[tokio::test]
    async fn regeneration_requires_force() {
        let h = harness();
        let (event_id, users) = h.started(3).await;
        let [giver, a, b] = users.as_slice() else {
            panic!("three users");
        };
        let mut rx = h.engine.event_bus().subscribe();
        let target_a = h.check_in_today(event_id, *a).await;
        let target_b = h.check_in_today(event_id, *b).await;
        assert!(h.give(*giver, &target_a, 1).await.is_ok());
        h.clock.advance(chrono::Duration::minutes(1));
        assert!(h.give(*giver, &target_b, 1).await.is_ok());
        let Ok(first) = h.engine.rankings.daily_ranking(event_id, day0(), false).await else {
            panic!("ranking");
        };

        h.clock.advance(chrono::Duration::minutes(1));
        assert!(h.give(*a, &target_b, 1).await.is_ok());
        let Ok(cached) = h.engine.rankings.daily_ranking(event_id, day0(), false).await else {
            panic!("ranking");
        };
        assert_eq!(cached.id, first.id);
        assert_eq!(cached.rankings.first().map(|r| r.user_id), Some(*a));

        let Ok(forced) = h.engine.rankings.daily_ranking(event_id, day0(), true).await else {
            panic!("ranking");
        };
        assert_ne!(forced.id, first.id);
        assert_eq!(forced.rankings.first().map(|r| (r.user_id, r.total_amount)), Some((*b, 2)));
        let total: u64 = forced.rankings.iter().map(|r| r.total_amount).sum();
        assert_eq!(total, 3);

        let Ok(stored) = h.engine.rankings.snapshot(event_id, day0()).await else {
            panic!("snapshot stored");
        };
        assert_eq!(stored, forced);

        let generated = std::iter::from_fn(|| rx.try_recv().ok())
            .filter(|e| matches!(e, DomainEvent::RankingGenerated { .. }))
            .count();
        assert_eq!(generated, 2);
    }

    #[tokio::test]
    async fn ranking_dates_and_states_are_checked() {
        let h = harness();
        let Ok(draft) = h.engine.lifecycle.create_event(event_draft(), &h.leader).await else {
            panic!("event should be created");
        };
        let result = h.engine.rankings.daily_ranking(draft.event.id, day0(), false).await;
        let Err(GatewayError::StateConflict(_)) = result else {
            panic!("expected state conflict, got {result:?}");
        };

        let (event_id, _) = h.started(2).await;
        let result = h.engine.rankings.daily_ranking(event_id, date(2026, 4, 1), false).await;
        let Err(GatewayError::Validation(_)) = result else {
            panic!("expected validation error, got {result:?}");
        };
        let missing = h.engine.rankings.snapshot(event_id, day0()).await;
        let Err(GatewayError::NotFound { .. }) = missing else {
            panic!("expected not found, got {missing:?}");
        };
    }

    #[tokio::test]
    async fn final_ranking_waits_for_completion() {
        let h = harness();
        let (event_id, users) = h.started(3).await;
        let [giver, a, b] = users.as_slice() else {
            panic!("three users");
        };
        reward_each(&h, event_id, *giver, &[*a, *b]).await;

        let early = h.engine.rankings.finalize(event_id).await;
        let Err(GatewayError::StateConflict(_)) = early else {
            panic!("expected state conflict, got {early:?}");
        };
        let missing = h.engine.rankings.final_ranking(event_id).await;
        let Err(GatewayError::NotFound { .. }) = missing else {
            panic!("expected not found, got {missing:?}");
        };

        let Ok(report) = h.engine.lifecycle.complete(event_id, &h.leader).await else {
            panic!("complete");
        };
        let Ok(stored) = h.engine.rankings.final_ranking(event_id).await else {
            panic!("final ranking stored");
        };
        assert_eq!(stored, report.final_ranking);
        assert_eq!(stored.rankings.len(), 2);
    }
}
