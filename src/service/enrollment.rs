//! Enrollment, cancellation, check-ins and completion tracking.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};

use super::{EngineContext, LeaderAssignment};
use crate::domain::{
    Actor, ApprovalStatus, CheckIn, CheckInId, DomainEvent, Enrollment, EnrollmentStatus,
    EnrollmentType, EventId, EventStatus, FeeModel, Outbox, UserId, completion_rate,
};
use crate::error::GatewayError;

/// Manages the (event, user) enrollment records of events.
#[derive(Debug, Clone)]
pub struct EnrollmentService {
    ctx: EngineContext,
}

impl EnrollmentService {
    /// Creates the service.
    #[must_use]
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    /// Enrolls `user_id` in an approved event that is open for enrollment.
    ///
    /// When a random-mode event reaches the auto-assign threshold with this
    /// enrollment, daily leaders are dealt out in the same unit.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::StateConflict`] if the event is not approved
    /// or not enrolling, the user is already enrolled, or the event is full.
    pub async fn enroll(
        &self,
        event_id: EventId,
        user_id: UserId,
        enrollment_type: EnrollmentType,
    ) -> Result<Enrollment, GatewayError> {
        let entry_lock = self.ctx.registry.get(event_id).await?;
        let mut entry = entry_lock.write().await;

        if entry.event.approval_status != ApprovalStatus::Approved {
            return Err(GatewayError::StateConflict(
                "event has not been approved".to_string(),
            ));
        }
        if entry.event.status != EventStatus::Enrolling {
            return Err(GatewayError::StateConflict(
                "event is not open for enrollment".to_string(),
            ));
        }
        if entry.has_enrollment(user_id) {
            return Err(GatewayError::StateConflict(
                "user is already enrolled in this event".to_string(),
            ));
        }
        let participant = enrollment_type == EnrollmentType::Participant;
        let capacity = usize::try_from(entry.event.max_participants).unwrap_or(usize::MAX);
        if participant && entry.participant_count() >= capacity {
            return Err(GatewayError::StateConflict("event is full".to_string()));
        }

        let now = self.ctx.clock.now();
        let fee_paid = match (entry.event.fee_model, participant) {
            (FeeModel::Free, _) | (_, false) => 0,
            (FeeModel::Deposit | FeeModel::Paid, true) => entry.event.fee_amount,
        };
        let enrollment = Enrollment::new(event_id, user_id, enrollment_type, fee_paid, now);
        entry.insert_enrollment(enrollment.clone());

        let mut outbox = Outbox::new();
        outbox.stage(DomainEvent::EnrollmentCreated {
            event_id,
            enrollment_id: enrollment.id,
            user_id,
            fee_paid,
            timestamp: now,
        });
        let threshold = self.ctx.settings.auto_assign_threshold;
        if participant
            && entry.event.leaders_assigned_at.is_none()
            && entry.participant_count() == threshold
        {
            LeaderAssignment::assign_if_ready(&mut entry, threshold, now, &mut outbox);
        }
        drop(entry);
        outbox.commit(&self.ctx.event_bus);

        tracing::info!(%event_id, %user_id, ?enrollment_type, "user enrolled");
        Ok(enrollment)
    }

    /// Cancels the enrollment of `user_id` while the event is still enrolling.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Authorization`] unless the requester is the user or
    ///   an admin.
    /// - [`GatewayError::NotFound`] if the user is not enrolled.
    /// - [`GatewayError::StateConflict`] if the enrollment is not `Enrolled`
    ///   or the event has left the enrolling phase.
    pub async fn cancel(
        &self,
        event_id: EventId,
        user_id: UserId,
        requester: &Actor,
    ) -> Result<Enrollment, GatewayError> {
        if requester.user_id != user_id && !requester.is_admin() {
            return Err(GatewayError::Authorization(
                "only the enrolled user or an admin may cancel".to_string(),
            ));
        }
        let entry_lock = self.ctx.registry.get(event_id).await?;
        let mut entry = entry_lock.write().await;

        let handle = entry
            .enrollment(user_id)
            .ok_or_else(|| GatewayError::not_found("enrollment", user_id))?;
        let mut enrollment = handle.lock().await;
        if enrollment.status != EnrollmentStatus::Enrolled {
            return Err(GatewayError::StateConflict(format!(
                "enrollment is {:?}",
                enrollment.status
            )));
        }
        if entry.event.status != EventStatus::Enrolling {
            return Err(GatewayError::StateConflict(
                "enrollments can only be cancelled before the event starts".to_string(),
            ));
        }

        let now = self.ctx.clock.now();
        enrollment.status = EnrollmentStatus::Cancelled;
        enrollment.cancelled_at = Some(now);
        enrollment.fee_refunded = entry.event.fee_model.refund_on_cancel(enrollment.fee_paid);
        let cancelled = enrollment.clone();
        drop(enrollment);
        entry.mark_cancelled(user_id);
        drop(entry);

        let mut outbox = Outbox::new();
        outbox.stage(DomainEvent::EnrollmentCancelled {
            event_id,
            enrollment_id: cancelled.id,
            user_id,
            refund_amount: cancelled.fee_refunded,
            timestamp: now,
        });
        outbox.commit(&self.ctx.event_bus);

        tracing::info!(%event_id, %user_id, refund = cancelled.fee_refunded, "enrollment cancelled");
        Ok(cancelled)
    }

    /// Records a participant's check-in for `date` and refreshes their
    /// completion rate.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::StateConflict`] if the event is not in progress,
    ///   `date` is not an activity day or lies in the future, or the user
    ///   already checked in that day.
    /// - [`GatewayError::Authorization`] if the user is not a participant.
    pub async fn check_in(
        &self,
        event_id: EventId,
        user_id: UserId,
        date: NaiveDate,
        note: Option<String>,
    ) -> Result<CheckIn, GatewayError> {
        let entry_lock = self.ctx.registry.get(event_id).await?;
        let entry = entry_lock.read().await;

        if entry.event.status != EventStatus::InProgress {
            return Err(GatewayError::StateConflict(
                "check-ins are only accepted while the event is in progress".to_string(),
            ));
        }
        let today = self.ctx.clock.today();
        if !entry.event.is_activity_day(date) || date > today {
            return Err(GatewayError::StateConflict(format!(
                "{date} is not a reading day open for check-in"
            )));
        }
        if !entry.is_participant(user_id) {
            return Err(GatewayError::Authorization(
                "only enrolled participants may check in".to_string(),
            ));
        }
        let handle = entry
            .enrollment(user_id)
            .ok_or_else(|| GatewayError::not_found("enrollment", user_id))?;

        let now = self.ctx.clock.now();
        let check_in = self
            .ctx
            .activity
            .record_check_in(CheckIn {
                id: CheckInId::new(),
                event_id,
                user_id,
                date,
                note,
                created_at: now,
            })
            .await?;

        let mut outbox = Outbox::new();
        outbox.stage(DomainEvent::CheckInRecorded {
            event_id,
            check_in_id: check_in.id,
            user_id,
            date,
            timestamp: now,
        });

        let required = entry.required_days();
        let threshold = entry.event.completion_threshold_percent;
        let mut enrollment = handle.lock().await;
        // Read under the enrollment lock so the last writer sees every recorded day.
        let days = self.ctx.activity.check_in_days(event_id, user_id).await;
        enrollment.check_in_count = enrollment.check_in_count.saturating_add(1);
        if recompute(&mut enrollment, &required, &days, threshold, now) {
            outbox.stage(completed_event(&enrollment, now));
        }
        drop(enrollment);
        drop(entry);
        outbox.commit(&self.ctx.event_bus);

        tracing::info!(%event_id, %user_id, %date, "check-in recorded");
        Ok(check_in)
    }

    /// Recomputes the completion rate of one enrollment.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] for an unknown event or enrollment.
    pub async fn recompute_completion_rate(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<Enrollment, GatewayError> {
        let entry_lock = self.ctx.registry.get(event_id).await?;
        let entry = entry_lock.read().await;
        let handle = entry
            .enrollment(user_id)
            .ok_or_else(|| GatewayError::not_found("enrollment", user_id))?;

        let now = self.ctx.clock.now();
        let required = entry.required_days();
        let threshold = entry.event.completion_threshold_percent;

        let mut outbox = Outbox::new();
        let mut enrollment = handle.lock().await;
        let days = self.ctx.activity.check_in_days(event_id, user_id).await;
        if recompute(&mut enrollment, &required, &days, threshold, now) {
            outbox.stage(completed_event(&enrollment, now));
        }
        let result = enrollment.clone();
        drop(enrollment);
        drop(entry);
        outbox.commit(&self.ctx.event_bus);
        Ok(result)
    }

    /// Returns the enrollment of `user_id` in `event_id`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] for an unknown event or enrollment.
    pub async fn get(&self, event_id: EventId, user_id: UserId) -> Result<Enrollment, GatewayError> {
        let entry_lock = self.ctx.registry.get(event_id).await?;
        let entry = entry_lock.read().await;
        let handle = entry
            .enrollment(user_id)
            .ok_or_else(|| GatewayError::not_found("enrollment", user_id))?;
        let enrollment = handle.lock().await.clone();
        Ok(enrollment)
    }

    /// Returns every enrollment of the event in enrollment order.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] for an unknown event.
    pub async fn list(&self, event_id: EventId) -> Result<Vec<Enrollment>, GatewayError> {
        let entry_lock = self.ctx.registry.get(event_id).await?;
        let entry = entry_lock.read().await;
        let mut enrollments = Vec::new();
        for handle in entry.enrollments() {
            enrollments.push(handle.lock().await.clone());
        }
        Ok(enrollments)
    }
}

/// Applies the rate for `days` over `required` to an active participant.
/// Returns `true` when the enrollment latched into `Completed`.
pub(crate) fn recompute(
    enrollment: &mut Enrollment,
    required: &[NaiveDate],
    days: &BTreeSet<NaiveDate>,
    threshold: u8,
    now: DateTime<Utc>,
) -> bool {
    if !enrollment.is_active_participant() {
        return false;
    }
    let covered = required.iter().filter(|d| days.contains(d)).count();
    let rate = completion_rate(covered, required.len());
    enrollment.apply_completion_rate(rate, threshold, now)
}

pub(crate) fn completed_event(enrollment: &Enrollment, now: DateTime<Utc>) -> DomainEvent {
    DomainEvent::EnrollmentCompleted {
        event_id: enrollment.event_id,
        enrollment_id: enrollment.id,
        user_id: enrollment.user_id,
        completion_rate_percent: enrollment.completion_rate_percent,
        timestamp: now,
    }
}
