//! Event aggregate: the record plus everything it owns.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use utoipa::ToSchema;

use super::{
    ApprovalStatus, Enrollment, EnrollmentStatus, EnrollmentType, Event, EventId, EventStatus,
    ReadingSchedule, UserId, build_schedules,
};

#[derive(Debug, Clone, Copy)]
struct RosterSlot {
    user_id: UserId,
    enrollment_type: EnrollmentType,
    cancelled: bool,
}

/// Aggregate stored in the [`super::EventRegistry`].
///
/// Owns the event's reading schedules and enrollments. Changes to the
/// event record, its schedules, or the set of enrollments need the entry
/// write lock. Counters on a single enrollment may be bumped under the
/// read lock through that enrollment's own mutex.
#[derive(Debug)]
pub struct EventEntry {
    /// The event record.
    pub event: Event,
    /// Reading schedules ordered by day number.
    pub schedules: Vec<ReadingSchedule>,
    enrollments: HashMap<UserId, Arc<Mutex<Enrollment>>>,
    roster: Vec<RosterSlot>,
}

impl EventEntry {
    /// Wraps a fresh event and generates its reading schedules.
    #[must_use]
    pub fn new(event: Event) -> Self {
        let schedules = build_schedules(&event);
        Self {
            event,
            schedules,
            enrollments: HashMap::new(),
            roster: Vec::new(),
        }
    }

    /// Rebuilds an entry from stored records.
    ///
    /// Enrollments are replayed in `enrolled_at` order so the roster keeps
    /// its original sequence.
    #[must_use]
    pub fn restore(
        event: Event,
        mut schedules: Vec<ReadingSchedule>,
        mut enrollments: Vec<Enrollment>,
    ) -> Self {
        schedules.sort_by_key(|s| s.day_number);
        enrollments.sort_by_key(|e| e.enrolled_at);
        let mut entry = Self {
            event,
            schedules,
            enrollments: HashMap::new(),
            roster: Vec::new(),
        };
        for enrollment in enrollments {
            let user_id = enrollment.user_id;
            let cancelled = enrollment.status == EnrollmentStatus::Cancelled;
            entry.insert_enrollment(enrollment);
            if cancelled {
                entry.mark_cancelled(user_id);
            }
        }
        entry
    }

    /// Identifier of the wrapped event.
    #[must_use]
    pub fn id(&self) -> EventId {
        self.event.id
    }

    /// Regenerates schedules after the calendar changed. Drops prior claims.
    pub fn rebuild_schedules(&mut self) {
        self.schedules = build_schedules(&self.event);
    }

    /// Returns the enrollment of `user_id`, if any (cancelled included).
    #[must_use]
    pub fn enrollment(&self, user_id: UserId) -> Option<Arc<Mutex<Enrollment>>> {
        self.enrollments.get(&user_id).cloned()
    }

    /// Returns `true` if `user_id` has any enrollment record.
    #[must_use]
    pub fn has_enrollment(&self, user_id: UserId) -> bool {
        self.enrollments.contains_key(&user_id)
    }

    /// Stores a new enrollment at the end of the roster.
    pub fn insert_enrollment(&mut self, enrollment: Enrollment) {
        self.roster.push(RosterSlot {
            user_id: enrollment.user_id,
            enrollment_type: enrollment.enrollment_type,
            cancelled: false,
        });
        self.enrollments
            .insert(enrollment.user_id, Arc::new(Mutex::new(enrollment)));
    }

    /// Marks `user_id` as withdrawn in the roster.
    pub fn mark_cancelled(&mut self, user_id: UserId) {
        for slot in self.roster.iter_mut().filter(|s| s.user_id == user_id) {
            slot.cancelled = true;
        }
    }

    /// Active participants in enrollment order.
    #[must_use]
    pub fn participants(&self) -> Vec<UserId> {
        self.roster
            .iter()
            .filter(|s| s.enrollment_type == EnrollmentType::Participant && !s.cancelled)
            .map(|s| s.user_id)
            .collect()
    }

    /// Number of active participants.
    #[must_use]
    pub fn participant_count(&self) -> usize {
        self.roster
            .iter()
            .filter(|s| s.enrollment_type == EnrollmentType::Participant && !s.cancelled)
            .count()
    }

    /// Returns `true` if `user_id` is an active participant.
    #[must_use]
    pub fn is_participant(&self, user_id: UserId) -> bool {
        self.roster.iter().any(|s| {
            s.user_id == user_id
                && s.enrollment_type == EnrollmentType::Participant
                && !s.cancelled
        })
    }

    /// Enrollment handles in roster order.
    #[must_use]
    pub fn enrollments(&self) -> Vec<Arc<Mutex<Enrollment>>> {
        self.roster
            .iter()
            .filter_map(|s| self.enrollments.get(&s.user_id).cloned())
            .collect()
    }

    /// Required reading days, taken from the schedules.
    #[must_use]
    pub fn required_days(&self) -> Vec<NaiveDate> {
        self.schedules.iter().map(|s| s.date).collect()
    }

    /// Number of schedules claimed by or assigned to `user_id`.
    #[must_use]
    pub fn leader_claims(&self, user_id: UserId) -> usize {
        self.schedules
            .iter()
            .filter(|s| s.assigned_leader_id == Some(user_id))
            .count()
    }

    /// Returns `true` if `user_id` is the overall leader, or the daily leader
    /// of a schedule dated within `window_days` before `today` (inclusive).
    #[must_use]
    pub fn is_current_leader(&self, user_id: UserId, today: NaiveDate, window_days: u32) -> bool {
        if self.event.leader_id == user_id {
            return true;
        }
        let window_start = today
            .checked_sub_days(chrono::Days::new(u64::from(window_days)))
            .unwrap_or(NaiveDate::MIN);
        self.schedules.iter().any(|s| {
            s.assigned_leader_id == Some(user_id) && s.date <= today && s.date >= window_start
        })
    }
}

/// Lightweight summary of an event for list endpoints.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventSummary {
    /// Event identifier.
    pub event_id: EventId,
    /// Title.
    pub title: String,
    /// Book title.
    pub book_title: String,
    /// Lifecycle status.
    pub status: EventStatus,
    /// Approval status.
    pub approval_status: ApprovalStatus,
    /// First day.
    pub start_date: NaiveDate,
    /// Last day.
    pub end_date: NaiveDate,
    /// Active participants.
    pub participant_count: usize,
    /// Participant cap.
    pub max_participants: u32,
    /// Last submission time, for the review queue.
    pub submitted_at: Option<DateTime<Utc>>,
}

impl From<&EventEntry> for EventSummary {
    fn from(entry: &EventEntry) -> Self {
        Self {
            event_id: entry.event.id,
            title: entry.event.title.clone(),
            book_title: entry.event.book_title.clone(),
            status: entry.event.status,
            approval_status: entry.event.approval_status,
            start_date: entry.event.start_date,
            end_date: entry.event.end_date,
            participant_count: entry.participant_count(),
            max_participants: entry.event.max_participants,
            submitted_at: entry.event.submitted_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::tests::{date, draft};

    fn entry() -> EventEntry {
        EventEntry::new(Event::from_draft(
            draft(date(2026, 3, 2), date(2026, 3, 8)),
            UserId::new(),
            Utc::now(),
        ))
    }

    #[test]
    fn roster_tracks_participants_in_order() {
        let mut entry = entry();
        let (a, b, o) = (UserId::new(), UserId::new(), UserId::new());
        for (user, kind) in [
            (a, EnrollmentType::Participant),
            (o, EnrollmentType::Observer),
            (b, EnrollmentType::Participant),
        ] {
            entry.insert_enrollment(Enrollment::new(entry.id(), user, kind, 0, Utc::now()));
        }
        assert_eq!(entry.participants(), vec![a, b]);
        assert!(entry.has_enrollment(o));
        assert!(!entry.is_participant(o));

        entry.mark_cancelled(a);
        assert_eq!(entry.participant_count(), 1);
        assert!(entry.has_enrollment(a));
    }

    #[test]
    fn daily_leader_window_trails_the_schedule_date() {
        let mut entry = entry();
        let daily = UserId::new();
        if let Some(first) = entry.schedules.first_mut() {
            first.assigned_leader_id = Some(daily);
        }
        let day_one = date(2026, 3, 2);
        assert!(!entry.is_current_leader(daily, date(2026, 3, 1), 3));
        assert!(entry.is_current_leader(daily, day_one, 3));
        assert!(entry.is_current_leader(daily, date(2026, 3, 5), 3));
        assert!(!entry.is_current_leader(daily, date(2026, 3, 6), 3));

        let overall = entry.event.leader_id;
        assert!(entry.is_current_leader(overall, date(2027, 1, 1), 3));
    }

    #[test]
    fn oversized_window_reaches_back_to_the_first_day() {
        let mut entry = entry();
        let daily = UserId::new();
        if let Some(first) = entry.schedules.first_mut() {
            first.assigned_leader_id = Some(daily);
        }
        assert!(entry.is_current_leader(daily, date(2027, 1, 1), u32::MAX));
        assert!(!entry.is_current_leader(daily, date(2026, 3, 1), u32::MAX));
    }

    #[test]
    fn restore_rebuilds_the_roster_in_enrollment_order() {
        let base = entry();
        let (a, b) = (UserId::new(), UserId::new());
        let first = Enrollment::new(base.id(), a, EnrollmentType::Participant, 0, Utc::now());
        let mut second = Enrollment::new(
            base.id(),
            b,
            EnrollmentType::Participant,
            0,
            first.enrolled_at + chrono::Duration::seconds(5),
        );
        second.status = EnrollmentStatus::Cancelled;

        let restored = EventEntry::restore(
            base.event.clone(),
            base.schedules.iter().rev().cloned().collect(),
            vec![second, first],
        );
        assert_eq!(restored.participants(), vec![a]);
        assert!(restored.has_enrollment(b));
        assert_eq!(restored.required_days(), base.required_days());
    }
}
