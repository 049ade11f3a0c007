//! Submission, review and the approval axis of an event.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::{EngineContext, LeaderAssignment};
use crate::domain::{
    Actor, ApprovalStatus, DomainEvent, EventEntry, EventId, EventStatus, FeeModel,
    LeaderAssignmentMode, Outbox,
};
use crate::error::{GatewayError, Violation};

/// Result of a successful submission.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SubmissionReceipt {
    /// Submitted event.
    pub event_id: EventId,
    /// 1-based position in the review queue.
    pub queue_position: usize,
    /// Submission time.
    pub submitted_at: DateTime<Utc>,
}

/// Validates and advances the approval axis of events.
#[derive(Debug, Clone)]
pub struct ApprovalWorkflow {
    ctx: EngineContext,
}

impl ApprovalWorkflow {
    /// Creates the workflow.
    #[must_use]
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    /// Submits a draft for review after full validation.
    ///
    /// Nothing is written unless every rule passes.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Authorization`] unless the requester leads the
    ///   event or is an admin.
    /// - [`GatewayError::StateConflict`] if the event is not a draft or is
    ///   already submitted or approved.
    /// - [`GatewayError::Validation`] listing every broken rule.
    pub async fn submit(
        &self,
        event_id: EventId,
        requester: &Actor,
    ) -> Result<SubmissionReceipt, GatewayError> {
        let entry_lock = self.ctx.registry.get(event_id).await?;
        let mut entry = entry_lock.write().await;

        if entry.event.leader_id != requester.user_id && !requester.is_admin() {
            return Err(GatewayError::Authorization(
                "only the event leader may submit it".to_string(),
            ));
        }
        if !entry.event.is_editable() {
            return Err(GatewayError::StateConflict(
                "event is not a draft awaiting submission".to_string(),
            ));
        }
        let violations = validate_for_submission(
            &entry,
            self.ctx.clock.today(),
            self.ctx.settings.auto_assign_threshold,
        );
        if !violations.is_empty() {
            tracing::debug!(%event_id, violations = violations.len(), "submission rejected");
            return Err(GatewayError::Validation(violations));
        }

        let now = self.ctx.clock.now();
        entry.event.approval_status = ApprovalStatus::Pending;
        entry.event.submitted_at = Some(now);
        entry.event.clear_rejection();
        entry.event.updated_at = now;
        drop(entry);

        let queue_position = self
            .ctx
            .registry
            .review_queue_position(event_id)
            .await
            .unwrap_or(1);

        let mut outbox = Outbox::new();
        outbox.stage(DomainEvent::EventSubmitted {
            event_id,
            queue_position,
            timestamp: now,
        });
        outbox.commit(&self.ctx.event_bus);

        tracing::info!(%event_id, queue_position, "event submitted for approval");
        Ok(SubmissionReceipt {
            event_id,
            queue_position,
            submitted_at: now,
        })
    }

    /// Approves a submitted event.
    ///
    /// Opens enrollment right away when configured to, and deals daily
    /// leaders if a random-mode event already has enough participants.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Authorization`] for non-admins and
    /// [`GatewayError::StateConflict`] unless the event awaits review.
    pub async fn approve(&self, event_id: EventId, admin: &Actor) -> Result<(), GatewayError> {
        if !admin.is_admin() {
            return Err(GatewayError::Authorization(
                "only admins may approve events".to_string(),
            ));
        }
        let entry_lock = self.ctx.registry.get(event_id).await?;
        let mut entry = entry_lock.write().await;
        if !entry.event.is_awaiting_review() {
            return Err(GatewayError::StateConflict(format!(
                "event is {:?}, not awaiting review",
                entry.event.approval_status
            )));
        }

        let now = self.ctx.clock.now();
        let mut outbox = Outbox::new();
        entry.event.approval_status = ApprovalStatus::Approved;
        entry.event.approved_by = Some(admin.user_id);
        entry.event.approved_at = Some(now);
        entry.event.updated_at = now;
        outbox.stage(DomainEvent::EventApproved {
            event_id,
            approved_by: admin.user_id,
            timestamp: now,
        });

        if self.ctx.settings.auto_open_enrollment && entry.event.status == EventStatus::Draft {
            entry.event.status = EventStatus::Enrolling;
            outbox.stage(DomainEvent::EnrollmentOpened {
                event_id,
                timestamp: now,
            });
        }
        LeaderAssignment::assign_if_ready(
            &mut entry,
            self.ctx.settings.auto_assign_threshold,
            now,
            &mut outbox,
        );
        drop(entry);
        outbox.commit(&self.ctx.event_bus);

        tracing::info!(%event_id, admin = %admin.user_id, "event approved");
        Ok(())
    }

    /// Rejects a submitted event with a reason. The event becomes editable
    /// and can be submitted again.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Authorization`] for non-admins,
    /// [`GatewayError::Validation`] for a blank reason and
    /// [`GatewayError::StateConflict`] unless the event awaits review.
    pub async fn reject(
        &self,
        event_id: EventId,
        admin: &Actor,
        reason: &str,
    ) -> Result<(), GatewayError> {
        if !admin.is_admin() {
            return Err(GatewayError::Authorization(
                "only admins may reject events".to_string(),
            ));
        }
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(GatewayError::invalid("reason", "a rejection reason is required"));
        }
        let entry_lock = self.ctx.registry.get(event_id).await?;
        let mut entry = entry_lock.write().await;
        if !entry.event.is_awaiting_review() {
            return Err(GatewayError::StateConflict(format!(
                "event is {:?}, not awaiting review",
                entry.event.approval_status
            )));
        }

        let now = self.ctx.clock.now();
        entry.event.approval_status = ApprovalStatus::Rejected;
        entry.event.rejected_by = Some(admin.user_id);
        entry.event.rejection_reason = Some(reason.to_string());
        entry.event.rejected_at = Some(now);
        entry.event.submitted_at = None;
        entry.event.updated_at = now;
        drop(entry);

        let mut outbox = Outbox::new();
        outbox.stage(DomainEvent::EventRejected {
            event_id,
            rejected_by: admin.user_id,
            reason: reason.to_string(),
            timestamp: now,
        });
        outbox.commit(&self.ctx.event_bus);

        tracing::info!(%event_id, admin = %admin.user_id, "event rejected");
        Ok(())
    }
}

/// Collects every rule a draft breaks before it may be reviewed.
#[must_use]
pub fn validate_for_submission(
    entry: &EventEntry,
    today: NaiveDate,
    auto_assign_threshold: usize,
) -> Vec<Violation> {
    let event = &entry.event;
    let mut violations = Vec::new();

    if event.title.trim().is_empty() {
        violations.push(Violation::new("title", "is required"));
    }
    if event.book_title.trim().is_empty() {
        violations.push(Violation::new("book_title", "is required"));
    }
    if event.start_date <= today {
        violations.push(Violation::new("start_date", "must be in the future"));
    }
    if event.end_date <= event.start_date {
        violations.push(Violation::new("end_date", "must be after the start date"));
    }
    if event.min_participants == 0 {
        violations.push(Violation::new("min_participants", "must be at least 1"));
    }
    if event.min_participants > event.max_participants {
        violations.push(Violation::new(
            "min_participants",
            "must not exceed max_participants",
        ));
    }
    if event.completion_threshold_percent == 0 || event.completion_threshold_percent > 100 {
        violations.push(Violation::new(
            "completion_threshold_percent",
            "must be between 1 and 100",
        ));
    }
    match event.fee_model {
        FeeModel::Free if event.fee_amount > 0 => {
            violations.push(Violation::new("fee_amount", "must be zero for free events"));
        }
        FeeModel::Deposit | FeeModel::Paid if event.fee_amount == 0 => {
            violations.push(Violation::new(
                "fee_amount",
                "must be positive for deposit and paid events",
            ));
        }
        _ => {}
    }
    if entry.schedules.is_empty() {
        violations.push(Violation::new(
            "schedules",
            "at least one reading day is required",
        ));
    }
    let seats = usize::try_from(event.max_participants).unwrap_or(usize::MAX);
    if event.leader_assignment == LeaderAssignmentMode::Random && seats < auto_assign_threshold {
        violations.push(Violation::new(
            "leader_assignment",
            format!("random assignment needs room for at least {auto_assign_threshold} participants"),
        ));
    }
    violations
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::config::EngineSettings;
    use crate::domain::event::tests::{date, draft};
    use crate::domain::{Event, UserId};
    use crate::service::fixtures::{event_draft, harness, harness_with};

    fn entry_with(mutate: impl FnOnce(&mut Event)) -> EventEntry {
        let mut event = Event::from_draft(
            draft(date(2026, 3, 2), date(2026, 3, 8)),
            UserId::new(),
            Utc::now(),
        );
        mutate(&mut event);
        EventEntry::new(event)
    }

    #[test]
    fn valid_draft_has_no_violations() {
        let entry = entry_with(|_| {});
        assert!(validate_for_submission(&entry, date(2026, 2, 1), 3).is_empty());
    }

    #[test]
    fn every_broken_rule_is_reported() {
        let entry = entry_with(|e| {
            e.title = " ".to_string();
            e.min_participants = 20;
            e.fee_model = FeeModel::Deposit;
            e.leader_assignment = LeaderAssignmentMode::Random;
            e.max_participants = 2;
        });
        let fields: Vec<String> = validate_for_submission(&entry, date(2026, 3, 2), 3)
            .into_iter()
            .map(|v| v.field)
            .collect();
        for expected in ["title", "start_date", "min_participants", "fee_amount", "leader_assignment"] {
            assert!(fields.iter().any(|f| f == expected), "missing {expected}");
        }
    }

    #[test]
    fn empty_calendar_is_rejected() {
        let mut entry = entry_with(|_| {});
        entry.schedules.clear();
        let violations = validate_for_submission(&entry, date(2026, 2, 1), 3);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations.first().map(|v| v.field.as_str()), Some("schedules"));
    }

    #[tokio::test]
    async fn only_the_leader_submits_and_only_once() {
        let h = harness();
        let Ok(details) = h.engine.lifecycle.create_event(event_draft(), &h.leader).await else {
            panic!("event should be created");
        };
        let event_id = details.event.id;

        let stranger = Actor::member(UserId::new());
        let result = h.engine.approval.submit(event_id, &stranger).await;
        let Err(GatewayError::Authorization(_)) = result else {
            panic!("expected authorization error, got {result:?}");
        };

        let Ok(receipt) = h.engine.approval.submit(event_id, &h.leader).await else {
            panic!("submit should succeed");
        };
        assert_eq!(receipt.queue_position, 1);
        let again = h.engine.approval.submit(event_id, &h.leader).await;
        let Err(GatewayError::StateConflict(_)) = again else {
            panic!("expected state conflict, got {again:?}");
        };
    }

    #[tokio::test]
    async fn failed_submission_changes_nothing() {
        let h = harness();
        let mut bad = event_draft();
        bad.min_participants = 50;
        let Ok(details) = h.engine.lifecycle.create_event(bad, &h.leader).await else {
            panic!("event should be created");
        };
        let result = h.engine.approval.submit(details.event.id, &h.leader).await;
        let Err(GatewayError::Validation(violations)) = result else {
            panic!("expected validation error, got {result:?}");
        };
        assert!(violations.iter().any(|v| v.field == "min_participants"));
        let Ok(after) = h.engine.lifecycle.get(details.event.id).await else {
            panic!("event exists");
        };
        assert!(after.event.submitted_at.is_none());
        assert!(after.event.is_editable());
    }

    #[tokio::test]
    async fn queue_positions_follow_submission_order() {
        let h = harness();
        let mut ids = Vec::new();
        for _ in 0..2 {
            let Ok(details) = h.engine.lifecycle.create_event(event_draft(), &h.leader).await else {
                panic!("event should be created");
            };
            ids.push(details.event.id);
        }
        let mut positions = Vec::new();
        for id in &ids {
            let Ok(receipt) = h.engine.approval.submit(*id, &h.leader).await else {
                panic!("submit should succeed");
            };
            positions.push(receipt.queue_position);
            h.clock.advance(chrono::Duration::minutes(5));
        }
        assert_eq!(positions, vec![1, 2]);
    }

    #[tokio::test]
    async fn approval_is_admin_only_and_opens_enrollment() {
        let h = harness();
        let Ok(details) = h.engine.lifecycle.create_event(event_draft(), &h.leader).await else {
            panic!("event should be created");
        };
        let event_id = details.event.id;
        let early = h.engine.approval.approve(event_id, &h.admin).await;
        let Err(GatewayError::StateConflict(_)) = early else {
            panic!("unsubmitted events cannot be approved, got {early:?}");
        };
        assert!(h.engine.approval.submit(event_id, &h.leader).await.is_ok());

        let result = h.engine.approval.approve(event_id, &h.leader).await;
        let Err(GatewayError::Authorization(_)) = result else {
            panic!("expected authorization error, got {result:?}");
        };

        let mut rx = h.engine.event_bus().subscribe();
        assert!(h.engine.approval.approve(event_id, &h.admin).await.is_ok());
        let Ok(after) = h.engine.lifecycle.get(event_id).await else {
            panic!("event exists");
        };
        assert_eq!(after.event.approval_status, ApprovalStatus::Approved);
        assert_eq!(after.event.status, EventStatus::Enrolling);
        assert_eq!(after.event.approved_by, Some(h.admin.user_id));
        let Ok(DomainEvent::EventApproved { .. }) = rx.try_recv() else {
            panic!("expected event.approved");
        };
        let Ok(DomainEvent::EnrollmentOpened { .. }) = rx.try_recv() else {
            panic!("expected event.enrollment_opened");
        };

        let twice = h.engine.approval.approve(event_id, &h.admin).await;
        let Err(GatewayError::StateConflict(_)) = twice else {
            panic!("expected state conflict, got {twice:?}");
        };
    }

    #[tokio::test]
    async fn manual_open_when_auto_open_is_off() {
        let h = harness_with(EngineSettings {
            auto_open_enrollment: false,
            ..EngineSettings::default()
        });
        let event_id = h.approved(event_draft()).await;
        let Ok(details) = h.engine.lifecycle.get(event_id).await else {
            panic!("event exists");
        };
        assert_eq!(details.event.status, EventStatus::Draft);

        let result = h.engine.lifecycle.open_enrollment(event_id, &h.leader).await;
        let Err(GatewayError::Authorization(_)) = result else {
            panic!("expected authorization error, got {result:?}");
        };
        assert!(h.engine.lifecycle.open_enrollment(event_id, &h.admin).await.is_ok());
        let again = h.engine.lifecycle.open_enrollment(event_id, &h.admin).await;
        let Err(GatewayError::StateConflict(_)) = again else {
            panic!("expected state conflict, got {again:?}");
        };
    }

    #[tokio::test]
    async fn rejected_event_can_be_fixed_and_resubmitted() {
        let h = harness();
        let Ok(details) = h.engine.lifecycle.create_event(event_draft(), &h.leader).await else {
            panic!("event should be created");
        };
        let event_id = details.event.id;
        assert!(h.engine.approval.submit(event_id, &h.leader).await.is_ok());

        let blank = h.engine.approval.reject(event_id, &h.admin, "  ").await;
        let Err(GatewayError::Validation(_)) = blank else {
            panic!("expected validation error, got {blank:?}");
        };
        assert!(
            h.engine
                .approval
                .reject(event_id, &h.admin, "pick a shorter book")
                .await
                .is_ok()
        );
        let Ok(rejected) = h.engine.lifecycle.get(event_id).await else {
            panic!("event exists");
        };
        assert_eq!(rejected.event.approval_status, ApprovalStatus::Rejected);
        assert_eq!(rejected.event.rejection_reason.as_deref(), Some("pick a shorter book"));
        assert!(rejected.event.is_editable());

        assert!(h.engine.approval.submit(event_id, &h.leader).await.is_ok());
        let Ok(resubmitted) = h.engine.lifecycle.get(event_id).await else {
            panic!("event exists");
        };
        assert_eq!(resubmitted.event.approval_status, ApprovalStatus::Pending);
        assert!(resubmitted.event.rejection_reason.is_none());
        assert!(resubmitted.event.rejected_by.is_none());
        assert!(h.engine.approval.approve(event_id, &h.admin).await.is_ok());
    }
}
