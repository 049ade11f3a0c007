//! Durable records of the engine and the way back from them.
//!
//! Every journaled [`DomainEvent`] is expanded into a [`ChangeSet`]: the
//! event plus the current form of each record it touched. A sink that
//! upserts those records holds the full engine state, which
//! [`ReadingEngine::restore`] loads into a fresh engine at startup.

use std::collections::HashSet;

use super::ReadingEngine;
use crate::domain::{
    Certificate, CheckIn, DailyRankingSnapshot, DomainEvent, Enrollment, Event, EventEntry,
    EventId, EventStatus, Quota, ReadingSchedule, Reward,
};
use crate::error::GatewayError;

/// An event with the schedules and enrollments it owns.
#[derive(Debug, Clone)]
pub struct EventAggregate {
    /// Event record.
    pub event: Event,
    /// Reading days in order.
    pub schedules: Vec<ReadingSchedule>,
    /// Every enrollment, cancelled ones included.
    pub enrollments: Vec<Enrollment>,
}

/// A journaled event and the records it left behind.
#[derive(Debug, Clone)]
pub struct ChangeSet {
    /// The published event.
    pub event: DomainEvent,
    /// Current aggregate of the event, for changes to the event or its
    /// enrollments.
    pub aggregate: Option<EventAggregate>,
    /// Recorded check-in.
    pub check_in: Option<CheckIn>,
    /// Committed reward.
    pub reward: Option<Reward>,
    /// Quota row the reward was spent from.
    pub quota: Option<Quota>,
    /// Generated snapshot.
    pub snapshot: Option<DailyRankingSnapshot>,
    /// Issued certificate.
    pub certificate: Option<Certificate>,
}

impl ChangeSet {
    /// A change set carrying only the event.
    #[must_use]
    pub const fn bare(event: DomainEvent) -> Self {
        Self {
            event,
            aggregate: None,
            check_in: None,
            reward: None,
            quota: None,
            snapshot: None,
            certificate: None,
        }
    }
}

/// Everything a sink stored, ready to be loaded back.
#[derive(Debug, Clone, Default)]
pub struct StoredState {
    /// Event aggregates.
    pub aggregates: Vec<EventAggregate>,
    /// Check-ins.
    pub check_ins: Vec<CheckIn>,
    /// Rewards.
    pub rewards: Vec<Reward>,
    /// Quota rows.
    pub quotas: Vec<Quota>,
    /// Daily ranking snapshots.
    pub snapshots: Vec<DailyRankingSnapshot>,
    /// Certificates.
    pub certificates: Vec<Certificate>,
}

impl StoredState {
    /// Returns `true` when nothing was stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.aggregates.is_empty()
            && self.check_ins.is_empty()
            && self.rewards.is_empty()
            && self.quotas.is_empty()
            && self.snapshots.is_empty()
            && self.certificates.is_empty()
    }
}

impl ReadingEngine {
    /// Expands a journaled event into the records it touched, read from the
    /// live stores.
    ///
    /// Records reflect the state at the time of the call, which may already
    /// include later changes. Upserting them keeps a sink current either way.
    pub async fn change_set(&self, event: DomainEvent) -> ChangeSet {
        let event_id = event.event_id();
        let mut change = ChangeSet::bare(event);
        match &change.event {
            DomainEvent::RankingGenerated { date, .. } => {
                change.snapshot = self.rankings.snapshot(event_id, *date).await.ok();
            }
            DomainEvent::CertificateIssued { certificate_id, .. } => {
                change.certificate = self.certificates.certificate(*certificate_id).await;
            }
            DomainEvent::CheckInRecorded { check_in_id, .. } => {
                change.check_in = self.ctx.activity.check_in(*check_in_id).await;
                change.aggregate = self.aggregate(event_id).await;
            }
            DomainEvent::RewardGiven { reward_id, .. } => {
                let reward = self.ctx.activity.reward(*reward_id).await;
                if let Some(reward) = &reward {
                    change.quota = self.quota_row(reward).await;
                }
                change.reward = reward;
                change.aggregate = self.aggregate(event_id).await;
            }
            _ => change.aggregate = self.aggregate(event_id).await,
        }
        change
    }

    async fn aggregate(&self, event_id: EventId) -> Option<EventAggregate> {
        let entry_lock = self.ctx.registry.get(event_id).await.ok()?;
        let entry = entry_lock.read().await;
        let mut enrollments = Vec::new();
        for handle in entry.enrollments() {
            enrollments.push(handle.lock().await.clone());
        }
        Some(EventAggregate {
            event: entry.event.clone(),
            schedules: entry.schedules.clone(),
            enrollments,
        })
    }

    async fn quota_row(&self, reward: &Reward) -> Option<Quota> {
        let key = super::QuotaLedger::key(
            reward.giver_id,
            reward.event_id,
            reward.created_at.date_naive(),
        );
        match self.rewards.ledger().row(key).await {
            Ok(row) => row,
            Err(e) => {
                tracing::warn!(
                    reward_id = %reward.id,
                    error = %e,
                    "quota row unavailable for journal"
                );
                None
            }
        }
    }

    /// Loads stored records into this engine.
    ///
    /// Meant for a fresh engine before it serves requests. Nothing is
    /// published: the records already went through the journal once.
    /// Final leaderboards of completed events are rebuilt from the
    /// restored rewards.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::StateConflict`] when a record clashes with
    /// one already loaded: a second aggregate for the same event, a second
    /// check-in for the same day, or a certificate rank or number that is
    /// already held.
    pub async fn restore(&self, state: StoredState) -> Result<(), GatewayError> {
        let StoredState {
            aggregates,
            mut check_ins,
            mut rewards,
            quotas,
            snapshots,
            certificates,
        } = state;

        let mut completed = Vec::new();
        let events = aggregates.len();
        for aggregate in aggregates {
            if aggregate.event.status == EventStatus::Completed {
                completed.push(aggregate.event.id);
            }
            let entry =
                EventEntry::restore(aggregate.event, aggregate.schedules, aggregate.enrollments);
            self.ctx.registry.insert(entry).await?;
        }

        check_ins.sort_by_key(|c| c.created_at);
        for check_in in check_ins {
            self.ctx.activity.record_check_in(check_in).await?;
        }

        rewards.sort_by_key(|r| r.created_at);
        let mut seen = HashSet::new();
        let reward_count = rewards.len();
        for reward in rewards {
            if seen.insert(reward.id) {
                self.ctx.activity.append_reward(reward).await;
            }
        }

        for quota in quotas {
            self.rewards.ledger().restore(quota).await;
        }
        for snapshot in snapshots {
            self.rankings.restore_snapshot(snapshot).await;
        }
        let certificate_count = certificates.len();
        for certificate in certificates {
            self.certificates.restore(certificate).await?;
        }
        for event_id in completed {
            self.rankings.finalize(event_id).await?;
        }

        tracing::info!(
            events,
            rewards = reward_count,
            certificates = certificate_count,
            "engine state restored"
        );
        Ok(())
    }
}
