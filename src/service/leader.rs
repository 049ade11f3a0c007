//! Daily leader assignment: voluntary claims and random round-robin.

use chrono::{DateTime, Utc};

use super::EngineContext;
use crate::domain::{
    ApprovalStatus, DomainEvent, EventEntry, EventId, EventStatus, LeaderAssignmentMode, Outbox,
    ReadingSchedule, ScheduleId, UserId,
};
use crate::error::GatewayError;

/// Assigns daily leaders to reading schedules.
#[derive(Debug, Clone)]
pub struct LeaderAssignment {
    ctx: EngineContext,
}

impl LeaderAssignment {
    /// Creates the service.
    #[must_use]
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    /// Claims `schedule_id` for `user_id` on a voluntary-mode event.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::NotFound`] for an unknown event or schedule.
    /// - [`GatewayError::StateConflict`] if the event is not in voluntary
    ///   mode, is closed, the day is already taken, or the user reached the
    ///   claim limit.
    /// - [`GatewayError::Authorization`] if the user is not a participant.
    pub async fn claim(
        &self,
        event_id: EventId,
        user_id: UserId,
        schedule_id: ScheduleId,
    ) -> Result<ReadingSchedule, GatewayError> {
        let entry_lock = self.ctx.registry.get(event_id).await?;
        let mut entry = entry_lock.write().await;

        if entry.event.leader_assignment != LeaderAssignmentMode::Voluntary {
            return Err(GatewayError::StateConflict(
                "daily leaders of this event are assigned automatically".to_string(),
            ));
        }
        if entry.event.approval_status != ApprovalStatus::Approved
            || entry.event.status == EventStatus::Completed
        {
            return Err(GatewayError::StateConflict(
                "reading days can only be claimed on approved, open events".to_string(),
            ));
        }
        if !entry.is_participant(user_id) {
            return Err(GatewayError::Authorization(
                "only enrolled participants may claim reading days".to_string(),
            ));
        }
        let max_claims = self.ctx.settings.max_leader_claims;
        if entry.leader_claims(user_id) >= max_claims {
            return Err(GatewayError::StateConflict(format!(
                "claim limit of {max_claims} reading days reached"
            )));
        }

        let schedule = entry
            .schedules
            .iter_mut()
            .find(|s| s.id == schedule_id)
            .ok_or_else(|| GatewayError::not_found("schedule", schedule_id))?;
        if let Some(current) = schedule.assigned_leader_id {
            return Err(GatewayError::StateConflict(format!(
                "day {} is already led by {current}",
                schedule.day_number
            )));
        }
        schedule.assigned_leader_id = Some(user_id);
        let claimed = schedule.clone();
        drop(entry);

        let mut outbox = Outbox::new();
        outbox.stage(DomainEvent::ScheduleClaimed {
            event_id,
            schedule_id,
            user_id,
            timestamp: self.ctx.clock.now(),
        });
        outbox.commit(&self.ctx.event_bus);

        tracing::info!(%event_id, %user_id, day = claimed.day_number, "reading day claimed");
        Ok(claimed)
    }

    /// Deals every schedule of a random-mode event to its participants.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::StateConflict`] for voluntary-mode or
    /// completed events and [`GatewayError::Validation`] when nobody is
    /// enrolled yet.
    pub async fn auto_assign(&self, event_id: EventId) -> Result<Vec<ReadingSchedule>, GatewayError> {
        let entry_lock = self.ctx.registry.get(event_id).await?;
        let mut entry = entry_lock.write().await;

        if entry.event.leader_assignment != LeaderAssignmentMode::Random {
            return Err(GatewayError::StateConflict(
                "automatic assignment is only available in random mode".to_string(),
            ));
        }
        if entry.event.status == EventStatus::Completed {
            return Err(GatewayError::StateConflict("event is completed".to_string()));
        }
        if entry.participant_count() == 0 {
            return Err(GatewayError::invalid(
                "participants",
                "at least one participant is required",
            ));
        }

        let mut outbox = Outbox::new();
        let now = self.ctx.clock.now();
        Self::assign_round_robin(&mut entry, now, &mut outbox);
        let schedules = entry.schedules.clone();
        drop(entry);
        outbox.commit(&self.ctx.event_bus);
        Ok(schedules)
    }

    /// Runs round-robin assignment on a write-locked aggregate when it is a
    /// random-mode event with at least `threshold` participants.
    ///
    /// Returns `true` when schedules were (re)assigned.
    pub(crate) fn assign_if_ready(
        entry: &mut EventEntry,
        threshold: usize,
        now: DateTime<Utc>,
        outbox: &mut Outbox,
    ) -> bool {
        if entry.event.leader_assignment != LeaderAssignmentMode::Random
            || entry.participant_count() < threshold
        {
            return false;
        }
        Self::assign_round_robin(entry, now, outbox) > 0
    }

    /// `schedule[i].leader = participants[i mod n]`, schedules ordered by
    /// day number and participants by enrollment order.
    fn assign_round_robin(entry: &mut EventEntry, now: DateTime<Utc>, outbox: &mut Outbox) -> usize {
        let participants = entry.participants();
        if participants.is_empty() {
            return 0;
        }
        entry.schedules.sort_by_key(|s| s.day_number);
        let mut assigned = 0;
        for (schedule, leader) in entry.schedules.iter_mut().zip(participants.iter().cycle()) {
            schedule.assigned_leader_id = Some(*leader);
            assigned += 1;
        }
        entry.event.leaders_assigned_at = Some(now);
        outbox.stage(DomainEvent::LeadersAssigned {
            event_id: entry.id(),
            schedule_count: assigned,
            timestamp: now,
        });
        tracing::info!(
            event_id = %entry.id(),
            schedules = assigned,
            participants = participants.len(),
            "daily leaders assigned"
        );
        assigned
    }

    /// Returns `true` if `user_id` currently leads the event.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] for an unknown event.
    pub async fn is_current_leader(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<bool, GatewayError> {
        let entry_lock = self.ctx.registry.get(event_id).await?;
        let entry = entry_lock.read().await;
        Ok(entry.is_current_leader(
            user_id,
            self.ctx.clock.today(),
            self.ctx.settings.leader_window_days,
        ))
    }
}
