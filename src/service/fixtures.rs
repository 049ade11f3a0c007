//! Shared setup for service tests.

#![allow(clippy::panic)]

use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::mpsc;

use super::{GiveOutcome, GiveRequest, ReadingEngine, RewardReceipt};
use crate::config::EngineSettings;
use crate::domain::event::tests::{date, draft};
use crate::domain::{
    Actor, CheckIn, Clock, DomainEvent, EnrollmentType, EventBus, EventDraft, EventId, ManualClock,
    UserId,
};

/// Engine on a manual clock with a leader and an admin.
#[derive(Debug)]
pub(crate) struct Harness {
    pub engine: ReadingEngine,
    pub clock: Arc<ManualClock>,
    pub leader: Actor,
    pub admin: Actor,
}

/// First reading day of [`event_draft`] (a Monday).
pub(crate) fn day0() -> NaiveDate {
    date(2026, 3, 2)
}

/// Seven-day event starting on [`day0`].
pub(crate) fn event_draft() -> EventDraft {
    draft(day0(), date(2026, 3, 8))
}

pub(crate) fn harness() -> Harness {
    harness_with(EngineSettings::default())
}

pub(crate) fn harness_with(settings: EngineSettings) -> Harness {
    build(settings, EventBus::new(256))
}

/// Like [`harness`], with every published event also journaled.
pub(crate) fn journaled_harness() -> (Harness, mpsc::UnboundedReceiver<DomainEvent>) {
    let (bus, journal) = EventBus::with_journal(256);
    (build(EngineSettings::default(), bus), journal)
}

fn build(settings: EngineSettings, bus: EventBus) -> Harness {
    let clock = Arc::new(ManualClock::at(date(2026, 2, 2), 9));
    let engine = ReadingEngine::new(settings, Arc::<ManualClock>::clone(&clock), bus);
    Harness {
        engine,
        clock,
        leader: Actor::member(UserId::new()),
        admin: Actor::admin(UserId::new()),
    }
}

impl Harness {
    /// Creates, submits and approves `draft`; enrollment opens on approval.
    pub(crate) async fn approved(&self, draft: EventDraft) -> EventId {
        let Ok(details) = self.engine.lifecycle.create_event(draft, &self.leader).await else {
            panic!("event should be created");
        };
        let event_id = details.event.id;
        let submitted = self.engine.approval.submit(event_id, &self.leader).await;
        assert!(submitted.is_ok(), "submit failed: {submitted:?}");
        let approved = self.engine.approval.approve(event_id, &self.admin).await;
        assert!(approved.is_ok(), "approve failed: {approved:?}");
        event_id
    }

    /// Enrolls `count` fresh participants.
    pub(crate) async fn enroll(&self, event_id: EventId, count: usize) -> Vec<UserId> {
        let mut users = Vec::with_capacity(count);
        for _ in 0..count {
            let user = UserId::new();
            let enrolled = self
                .engine
                .enrollments
                .enroll(event_id, user, EnrollmentType::Participant)
                .await;
            assert!(enrolled.is_ok(), "enroll failed: {enrolled:?}");
            users.push(user);
        }
        users
    }

    /// Approved event with `participants` enrolled, started on [`day0`].
    pub(crate) async fn started(&self, participants: usize) -> (EventId, Vec<UserId>) {
        let event_id = self.approved(event_draft()).await;
        let users = self.enroll(event_id, participants).await;
        self.clock.set(day0().and_hms_opt(8, 0, 0).unwrap_or_default().and_utc());
        let Ok(true) = self.engine.lifecycle.start(event_id).await else {
            panic!("event should start");
        };
        (event_id, users)
    }

    /// Checks `user` in for today.
    pub(crate) async fn check_in_today(&self, event_id: EventId, user: UserId) -> CheckIn {
        let today = self.clock.now().date_naive();
        let Ok(check_in) = self
            .engine
            .enrollments
            .check_in(event_id, user, today, None)
            .await
        else {
            panic!("check-in should succeed");
        };
        check_in
    }

    /// Confirmed give of `amount` from `giver` on `target`.
    pub(crate) async fn give(
        &self,
        giver: UserId,
        target: &CheckIn,
        amount: u32,
    ) -> Result<RewardReceipt, crate::error::GatewayError> {
        let outcome = self
            .engine
            .rewards
            .give(GiveRequest {
                event_id: target.event_id,
                giver_id: giver,
                recipient_id: target.user_id,
                target_id: target.id,
                amount,
                comment: None,
                anonymous: false,
                confirmed: true,
            })
            .await?;
        let GiveOutcome::Given(receipt) = outcome else {
            panic!("confirmed give returned a preview");
        };
        Ok(receipt)
    }
}
