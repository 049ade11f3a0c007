//! Shared setup for integration tests.

#![allow(dead_code, clippy::panic)]

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use readalong_gateway::config::EngineSettings;
use readalong_gateway::domain::{
    Actor, CheckIn, EventBus, EventDraft, EventId, FeeModel, LeaderAssignmentMode, ManualClock,
    UserId,
};
use readalong_gateway::service::ReadingEngine;

/// Calendar date, panicking on typos.
pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    let Some(date) = NaiveDate::from_ymd_opt(y, m, d) else {
        panic!("invalid date {y}-{m}-{d}");
    };
    date
}

/// `date` at `hour`:00 UTC.
pub fn at(date: NaiveDate, hour: u32) -> DateTime<Utc> {
    let Some(time) = date.and_hms_opt(hour, 0, 0) else {
        panic!("invalid hour {hour}");
    };
    time.and_utc()
}

/// Seven-day free event starting on 2026-03-02 for up to `max` readers.
pub fn week_draft(max: u32) -> EventDraft {
    EventDraft {
        title: "Spring Read".to_string(),
        book_title: "Moby-Dick".to_string(),
        description: None,
        start_date: date(2026, 3, 2),
        end_date: date(2026, 3, 8),
        max_participants: max,
        min_participants: 2,
        completion_threshold_percent: 80,
        weekend_rest: false,
        fee_model: FeeModel::Free,
        fee_amount: 0,
        leader_assignment: LeaderAssignmentMode::Voluntary,
    }
}

/// Engine on a manual clock set a month before the event.
pub struct World {
    pub engine: ReadingEngine,
    pub clock: Arc<ManualClock>,
    pub leader: Actor,
    pub admin: Actor,
}

impl World {
    pub fn new(settings: EngineSettings) -> Self {
        let clock = Arc::new(ManualClock::at(date(2026, 2, 2), 9));
        let engine =
            ReadingEngine::new(settings, Arc::<ManualClock>::clone(&clock), EventBus::new(1024));
        Self {
            engine,
            clock,
            leader: Actor::member(UserId::new()),
            admin: Actor::admin(UserId::new()),
        }
    }

    /// Creates, submits and approves `draft`.
    pub async fn approved(&self, draft: EventDraft) -> EventId {
        let Ok(details) = self.engine.lifecycle.create_event(draft, &self.leader).await else {
            panic!("create failed");
        };
        let event_id = details.event.id;
        let Ok(_) = self.engine.approval.submit(event_id, &self.leader).await else {
            panic!("submit failed");
        };
        let Ok(()) = self.engine.approval.approve(event_id, &self.admin).await else {
            panic!("approve failed");
        };
        event_id
    }

    pub async fn check_in(&self, event_id: EventId, user: UserId, day: NaiveDate) -> CheckIn {
        match self.engine.enrollments.check_in(event_id, user, day, None).await {
            Ok(check_in) => check_in,
            Err(e) => panic!("check-in on {day} failed: {e}"),
        }
    }
}
