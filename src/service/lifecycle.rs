//! Status state machine of events: authoring, opening, start and completion.
//!
//! ```text
//! Draft ──approve/open──▶ Enrolling ──start──▶ InProgress ──complete──▶ Completed
//! ```
//!
//! The approval axis (pending, approved, rejected) is owned by
//! [`super::ApprovalWorkflow`]; every transition here checks it.

use serde::Serialize;
use utoipa::ToSchema;

use super::enrollment::{completed_event, recompute};
use super::{CertificateIssuer, EngineContext, RankingEngine};
use crate::domain::{
    Actor, ApprovalStatus, Certificate, DomainEvent, EnrollmentStatus, Event, EventDraft,
    EventEntry, EventId, EventPatch, EventStatus, EventSummary, FeeModel, FinalRanking, Outbox,
    ReadingSchedule,
};
use crate::error::{GatewayError, Violation};
use crate::service::certificate::MAX_CERTIFICATE_RANK;

/// An event with its reading calendar.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventDetails {
    /// Event record.
    pub event: Event,
    /// Reading days in order.
    pub schedules: Vec<ReadingSchedule>,
    /// Active participants.
    pub participant_count: usize,
}

impl From<&EventEntry> for EventDetails {
    fn from(entry: &EventEntry) -> Self {
        Self {
            event: entry.event.clone(),
            schedules: entry.schedules.clone(),
            participant_count: entry.participant_count(),
        }
    }
}

/// Outcome of [`EventLifecycleController::complete`].
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CompletionReport {
    /// Completed event.
    pub event_id: EventId,
    /// Enrollments in `Completed` after the final recompute.
    pub completed_enrollments: usize,
    /// Leaderboard over the whole event.
    pub final_ranking: FinalRanking,
    /// Certificates issued by this completion.
    pub certificates: Vec<Certificate>,
}

/// Top-level orchestrator of the event status axis.
#[derive(Debug, Clone)]
pub struct EventLifecycleController {
    ctx: EngineContext,
    rankings: RankingEngine,
    certificates: CertificateIssuer,
}

impl EventLifecycleController {
    /// Creates the controller.
    #[must_use]
    pub fn new(ctx: EngineContext, rankings: RankingEngine, certificates: CertificateIssuer) -> Self {
        Self {
            ctx,
            rankings,
            certificates,
        }
    }

    /// Creates a draft led by `creator`, with one reading day per activity
    /// day of its range.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] for a blank title, an inverted
    /// date range or a zero capacity.
    pub async fn create_event(
        &self,
        draft: EventDraft,
        creator: &Actor,
    ) -> Result<EventDetails, GatewayError> {
        let violations = check_draft_shape(&draft);
        if !violations.is_empty() {
            return Err(GatewayError::Validation(violations));
        }
        let now = self.ctx.clock.now();
        let entry = EventEntry::new(Event::from_draft(draft, creator.user_id, now));
        let details = EventDetails::from(&entry);
        let event_id = self.ctx.registry.insert(entry).await?;

        let mut outbox = Outbox::new();
        outbox.stage(DomainEvent::EventCreated {
            event_id,
            leader_id: creator.user_id,
            timestamp: now,
        });
        outbox.commit(&self.ctx.event_bus);

        tracing::info!(%event_id, leader = %creator.user_id, days = details.schedules.len(), "event created");
        Ok(details)
    }

    /// Edits a draft that is not under review. Editing a rejected event
    /// clears the rejection and makes it submittable again.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Authorization`] unless the requester leads the
    ///   event or is an admin.
    /// - [`GatewayError::StateConflict`] when the event is not editable.
    /// - [`GatewayError::Validation`] when the patched dates are inverted.
    pub async fn update_event(
        &self,
        event_id: EventId,
        patch: EventPatch,
        requester: &Actor,
    ) -> Result<EventDetails, GatewayError> {
        let entry_lock = self.ctx.registry.get(event_id).await?;
        let mut entry = entry_lock.write().await;
        if entry.event.leader_id != requester.user_id && !requester.is_admin() {
            return Err(GatewayError::Authorization(
                "only the event leader may edit it".to_string(),
            ));
        }
        if !entry.event.is_editable() {
            return Err(GatewayError::StateConflict(
                "event can no longer be edited".to_string(),
            ));
        }

        let mut event = entry.event.clone();
        let calendar_changed = patch.apply(&mut event);
        if event.end_date <= event.start_date {
            return Err(GatewayError::invalid("end_date", "must be after the start date"));
        }
        if event.approval_status == ApprovalStatus::Rejected {
            event.approval_status = ApprovalStatus::Pending;
            event.clear_rejection();
        }
        let now = self.ctx.clock.now();
        event.updated_at = now;
        entry.event = event;
        if calendar_changed {
            entry.rebuild_schedules();
        }
        let details = EventDetails::from(&*entry);
        drop(entry);

        let mut outbox = Outbox::new();
        outbox.stage(DomainEvent::EventUpdated {
            event_id,
            calendar_changed,
            timestamp: now,
        });
        outbox.commit(&self.ctx.event_bus);

        tracing::info!(%event_id, calendar_changed, "event updated");
        Ok(details)
    }

    /// Opens enrollment on an approved draft.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Authorization`] for non-admins and
    /// [`GatewayError::StateConflict`] unless the event is an approved draft.
    pub async fn open_enrollment(&self, event_id: EventId, admin: &Actor) -> Result<(), GatewayError> {
        if !admin.is_admin() {
            return Err(GatewayError::Authorization(
                "only admins may open enrollment".to_string(),
            ));
        }
        let entry_lock = self.ctx.registry.get(event_id).await?;
        let mut entry = entry_lock.write().await;
        if entry.event.approval_status != ApprovalStatus::Approved
            || entry.event.status != EventStatus::Draft
        {
            return Err(GatewayError::StateConflict(
                "enrollment opens only on approved drafts".to_string(),
            ));
        }
        let now = self.ctx.clock.now();
        entry.event.status = EventStatus::Enrolling;
        entry.event.updated_at = now;
        drop(entry);

        let mut outbox = Outbox::new();
        outbox.stage(DomainEvent::EnrollmentOpened {
            event_id,
            timestamp: now,
        });
        outbox.commit(&self.ctx.event_bus);

        tracing::info!(%event_id, "enrollment opened");
        Ok(())
    }

    /// Moves an enrolling event to `InProgress` when it is approved, its
    /// start date has arrived and enough participants joined.
    ///
    /// Returns `Ok(false)` without changing anything when a guard fails.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] for an unknown event.
    pub async fn start(&self, event_id: EventId) -> Result<bool, GatewayError> {
        let entry_lock = self.ctx.registry.get(event_id).await?;
        let mut entry = entry_lock.write().await;

        let today = self.ctx.clock.today();
        let participants = entry.participant_count();
        let minimum = usize::try_from(entry.event.min_participants).unwrap_or(usize::MAX);
        let ready = entry.event.status == EventStatus::Enrolling
            && entry.event.approval_status == ApprovalStatus::Approved
            && today >= entry.event.start_date
            && participants >= minimum;
        if !ready {
            tracing::debug!(
                %event_id,
                status = ?entry.event.status,
                participants,
                minimum,
                "start guard not met"
            );
            return Ok(false);
        }

        let now = self.ctx.clock.now();
        entry.event.status = EventStatus::InProgress;
        entry.event.started_at = Some(now);
        entry.event.updated_at = now;
        drop(entry);

        let mut outbox = Outbox::new();
        outbox.stage(DomainEvent::EventStarted {
            event_id,
            participant_count: participants,
            timestamp: now,
        });
        outbox.commit(&self.ctx.event_bus);

        tracing::info!(%event_id, participants, "event started");
        Ok(true)
    }

    /// Completes an in-progress event.
    ///
    /// The status flips to `Completed` first, under the event write lock,
    /// so no reward can commit afterwards. Completion rates are then
    /// recomputed in the same unit, and once the lock is released the final
    /// leaderboard is built and certificates are issued.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::StateConflict`] unless the event is in progress, or
    ///   when an admin who is not a current leader acts before the end date.
    /// - [`GatewayError::Authorization`] for requesters who are neither a
    ///   current leader nor an admin.
    pub async fn complete(
        &self,
        event_id: EventId,
        requester: &Actor,
    ) -> Result<CompletionReport, GatewayError> {
        let entry_lock = self.ctx.registry.get(event_id).await?;
        let mut entry = entry_lock.write().await;

        if entry.event.status != EventStatus::InProgress {
            return Err(GatewayError::StateConflict(format!(
                "event is {:?}, not in progress",
                entry.event.status
            )));
        }
        let today = self.ctx.clock.today();
        let leader = entry.is_current_leader(
            requester.user_id,
            today,
            self.ctx.settings.leader_window_days,
        );
        if !leader {
            if !requester.is_admin() {
                return Err(GatewayError::Authorization(
                    "only a current leader may complete the event".to_string(),
                ));
            }
            if today <= entry.event.end_date {
                return Err(GatewayError::StateConflict(format!(
                    "event runs until {}",
                    entry.event.end_date
                )));
            }
        }

        let now = self.ctx.clock.now();
        entry.event.status = EventStatus::Completed;
        entry.event.completed_at = Some(now);
        entry.event.updated_at = now;

        let mut outbox = Outbox::new();
        let required = entry.required_days();
        let threshold = entry.event.completion_threshold_percent;
        let deposit = entry.event.fee_model == FeeModel::Deposit;
        let mut completed_enrollments = 0;
        for handle in entry.enrollments() {
            let mut enrollment = handle.lock().await;
            let days = self
                .ctx
                .activity
                .check_in_days(event_id, enrollment.user_id)
                .await;
            if recompute(&mut enrollment, &required, &days, threshold, now) {
                outbox.stage(completed_event(&enrollment, now));
            }
            if enrollment.status == EnrollmentStatus::Completed {
                completed_enrollments += 1;
                if deposit && enrollment.fee_paid > 0 {
                    outbox.stage(DomainEvent::DepositRefundDue {
                        event_id,
                        user_id: enrollment.user_id,
                        amount: enrollment.fee_paid,
                        timestamp: now,
                    });
                }
            }
        }
        let has_participants = entry.participant_count() > 0;
        outbox.stage(DomainEvent::EventCompleted {
            event_id,
            completed_by: requester.user_id,
            completed_enrollments,
            timestamp: now,
        });
        drop(entry);
        outbox.commit(&self.ctx.event_bus);
        tracing::info!(%event_id, by = %requester.user_id, completed_enrollments, "event completed");

        let final_ranking = self.rankings.finalize(event_id).await?;
        let certificates = if has_participants {
            let top_n = self
                .ctx
                .settings
                .certificate_top_n
                .clamp(1, usize::from(MAX_CERTIFICATE_RANK));
            self.certificates.issue_top_n(event_id, top_n).await?
        } else {
            Vec::new()
        };

        Ok(CompletionReport {
            event_id,
            completed_enrollments,
            final_ranking,
            certificates,
        })
    }

    /// Returns an event with its calendar.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] for an unknown event.
    pub async fn get(&self, event_id: EventId) -> Result<EventDetails, GatewayError> {
        let entry_lock = self.ctx.registry.get(event_id).await?;
        let entry = entry_lock.read().await;
        Ok(EventDetails::from(&*entry))
    }

    /// Lists events, optionally filtered by status.
    pub async fn list(&self, status: Option<EventStatus>) -> Vec<EventSummary> {
        self.ctx.registry.list(status).await
    }
}

fn check_draft_shape(draft: &EventDraft) -> Vec<Violation> {
    let mut violations = Vec::new();
    if draft.title.trim().is_empty() {
        violations.push(Violation::new("title", "is required"));
    }
    if draft.end_date <= draft.start_date {
        violations.push(Violation::new("end_date", "must be after the start date"));
    }
    if draft.max_participants == 0 {
        violations.push(Violation::new("max_participants", "must be at least 1"));
    }
    violations
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::event::tests::date;
    use crate::domain::{Actor, UserId};
    use crate::service::fixtures::{day0, event_draft, harness};

    #[tokio::test]
    async fn create_builds_the_calendar_and_rejects_bad_shapes() {
        let h = harness();
        let Ok(details) = h.engine.lifecycle.create_event(event_draft(), &h.leader).await else {
            panic!("event should be created");
        };
        assert_eq!(details.event.status, EventStatus::Draft);
        assert_eq!(details.event.leader_id, h.leader.user_id);
        let days: Vec<u32> = details.schedules.iter().map(|s| s.day_number).collect();
        assert_eq!(days, (1..=7).collect::<Vec<_>>());

        let mut inverted = event_draft();
        inverted.end_date = inverted.start_date;
        let result = h.engine.lifecycle.create_event(inverted, &h.leader).await;
        let Err(GatewayError::Validation(_)) = result else {
            panic!("expected validation error, got {result:?}");
        };
    }

    #[tokio::test]
    async fn update_regenerates_schedules_and_respects_review() {
        let h = harness();
        let Ok(details) = h.engine.lifecycle.create_event(event_draft(), &h.leader).await else {
            panic!("event should be created");
        };
        let event_id = details.event.id;
        let mut rx = h.engine.event_bus().subscribe();

        let stranger = Actor::member(UserId::new());
        let forbidden = h
            .engine
            .lifecycle
            .update_event(event_id, EventPatch::default(), &stranger)
            .await;
        let Err(GatewayError::Authorization(_)) = forbidden else {
            panic!("expected authorization error, got {forbidden:?}");
        };

        let patch = EventPatch {
            end_date: Some(date(2026, 3, 15)),
            weekend_rest: Some(true),
            ..EventPatch::default()
        };
        let Ok(updated) = h.engine.lifecycle.update_event(event_id, patch, &h.leader).await else {
            panic!("update should succeed");
        };
        assert_eq!(updated.schedules.len(), 10);
        let Ok(DomainEvent::EventUpdated {
            calendar_changed: true,
            ..
        }) = rx.try_recv()
        else {
            panic!("expected event.updated after a calendar change");
        };

        assert!(h.engine.approval.submit(event_id, &h.leader).await.is_ok());
        let locked = h
            .engine
            .lifecycle
            .update_event(event_id, EventPatch::default(), &h.leader)
            .await;
        let Err(GatewayError::StateConflict(_)) = locked else {
            panic!("expected state conflict under review, got {locked:?}");
        };

        assert!(h.engine.approval.reject(event_id, &h.admin, "too long").await.is_ok());
        let patch = EventPatch {
            title: Some("Spring Classics".to_string()),
            ..EventPatch::default()
        };
        let Ok(fixed) = h.engine.lifecycle.update_event(event_id, patch, &h.leader).await else {
            panic!("rejected events are editable");
        };
        assert_eq!(fixed.event.approval_status, ApprovalStatus::Pending);
        assert!(fixed.event.rejection_reason.is_none());
        assert!(fixed.event.submitted_at.is_none());
    }

    #[tokio::test]
    async fn start_guard_returns_false_until_met() {
        let h = harness();
        let event_id = h.approved(event_draft()).await;
        h.enroll(event_id, 1).await;

        assert_eq!(h.engine.lifecycle.start(event_id).await.ok(), Some(false));
        h.clock.set(day0().and_hms_opt(8, 0, 0).unwrap_or_default().and_utc());
        assert_eq!(h.engine.lifecycle.start(event_id).await.ok(), Some(false));

        h.enroll(event_id, 1).await;
        assert_eq!(h.engine.lifecycle.start(event_id).await.ok(), Some(true));
        assert_eq!(h.engine.lifecycle.start(event_id).await.ok(), Some(false));
        let Ok(details) = h.engine.lifecycle.get(event_id).await else {
            panic!("event exists");
        };
        assert_eq!(details.event.status, EventStatus::InProgress);
        assert!(details.event.started_at.is_some());
    }

    #[tokio::test]
    async fn draft_never_starts() {
        let h = harness();
        let Ok(details) = h.engine.lifecycle.create_event(event_draft(), &h.leader).await else {
            panic!("event should be created");
        };
        h.clock.set(day0().and_hms_opt(8, 0, 0).unwrap_or_default().and_utc());
        assert_eq!(h.engine.lifecycle.start(details.event.id).await.ok(), Some(false));
    }

    #[tokio::test]
    async fn completion_needs_a_current_leader_or_an_ended_event() {
        let h = harness();
        let (event_id, users) = h.started(2).await;
        let Some(member) = users.first().map(|u| Actor::member(*u)) else {
            panic!("users exist");
        };

        let result = h.engine.lifecycle.complete(event_id, &member).await;
        let Err(GatewayError::Authorization(_)) = result else {
            panic!("expected authorization error, got {result:?}");
        };
        let result = h.engine.lifecycle.complete(event_id, &h.admin).await;
        let Err(GatewayError::StateConflict(_)) = result else {
            panic!("expected state conflict before the end date, got {result:?}");
        };

        h.clock.set(date(2026, 3, 9).and_hms_opt(9, 0, 0).unwrap_or_default().and_utc());
        let Ok(report) = h.engine.lifecycle.complete(event_id, &h.admin).await else {
            panic!("admin completes an ended event");
        };
        assert_eq!(report.event_id, event_id);
        assert_eq!(report.completed_enrollments, 0);

        let again = h.engine.lifecycle.complete(event_id, &h.admin).await;
        let Err(GatewayError::StateConflict(_)) = again else {
            panic!("completed is terminal, got {again:?}");
        };
        assert_eq!(h.engine.lifecycle.start(event_id).await.ok(), Some(false));
    }

    #[tokio::test]
    async fn completion_recomputes_rates_and_flags_deposit_refunds() {
        let h = harness();
        let mut draft = event_draft();
        draft.fee_model = FeeModel::Deposit;
        draft.fee_amount = 300;
        draft.completion_threshold_percent = 10;
        let event_id = h.approved(draft).await;
        let users = h.enroll(event_id, 2).await;
        let [reader, idler] = users.as_slice() else {
            panic!("two users");
        };
        h.clock.set(day0().and_hms_opt(8, 0, 0).unwrap_or_default().and_utc());
        assert_eq!(h.engine.lifecycle.start(event_id).await.ok(), Some(true));
        h.check_in_today(event_id, *reader).await;

        let mut rx = h.engine.event_bus().subscribe();
        let Ok(report) = h.engine.lifecycle.complete(event_id, &h.leader).await else {
            panic!("leader completes");
        };
        assert_eq!(report.completed_enrollments, 1);

        let events: Vec<DomainEvent> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        let refunds: Vec<UserId> = events
            .iter()
            .filter_map(|e| match e {
                DomainEvent::DepositRefundDue { user_id, amount, .. } => {
                    assert_eq!(*amount, 300);
                    Some(*user_id)
                }
                _ => None,
            })
            .collect();
        assert_eq!(refunds, vec![*reader]);
        assert!(!refunds.contains(idler));
        assert!(
            events
                .iter()
                .any(|e| matches!(e, DomainEvent::EventCompleted { completed_enrollments: 1, .. }))
        );
    }
}
