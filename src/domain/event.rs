//! The reading event record, its reading schedule, and authoring inputs.

use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{EventId, ScheduleId, UserId};

/// Position of an event on the lifecycle axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    /// Being authored by its leader.
    Draft,
    /// Approved and accepting enrollments.
    Enrolling,
    /// Reading period running.
    InProgress,
    /// Terminal. Rankings are final and rewards are frozen.
    Completed,
}

/// Position of an event on the approval axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// Awaiting review (or not yet submitted when `submitted_at` is empty).
    Pending,
    /// Accepted by an admin.
    Approved,
    /// Sent back by an admin; editable and resubmittable.
    Rejected,
}

/// How participation is charged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FeeModel {
    /// No charge.
    Free,
    /// Refundable deposit, returned to participants who complete.
    Deposit,
    /// Participation fee.
    Paid,
}

impl FeeModel {
    /// Amount owed back when an enrollment is cancelled before the event starts.
    #[must_use]
    pub const fn refund_on_cancel(self, fee_paid: u64) -> u64 {
        match self {
            Self::Free => 0,
            Self::Deposit | Self::Paid => fee_paid,
        }
    }
}

/// How daily leaders are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LeaderAssignmentMode {
    /// Participants claim days themselves.
    Voluntary,
    /// Days are dealt round-robin to participants.
    Random,
}

/// A scheduled group reading activity.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Event {
    /// Event identifier.
    pub id: EventId,
    /// Display title.
    pub title: String,
    /// Title of the book being read.
    pub book_title: String,
    /// Optional long description.
    pub description: Option<String>,
    /// Overall leader (the author of the event).
    pub leader_id: UserId,
    /// Lifecycle status.
    pub status: EventStatus,
    /// Approval status.
    pub approval_status: ApprovalStatus,
    /// First reading day (inclusive).
    pub start_date: NaiveDate,
    /// Last reading day (inclusive).
    pub end_date: NaiveDate,
    /// Participant cap.
    pub max_participants: u32,
    /// Participants required before the event can start.
    pub min_participants: u32,
    /// Completion rate (percent) at which an enrollment counts as completed.
    pub completion_threshold_percent: u8,
    /// Skip Saturdays and Sundays.
    pub weekend_rest: bool,
    /// Fee model.
    pub fee_model: FeeModel,
    /// Fee or deposit amount in minor currency units.
    pub fee_amount: u64,
    /// Daily leader assignment mode.
    pub leader_assignment: LeaderAssignmentMode,
    /// When the event was last submitted for approval.
    pub submitted_at: Option<DateTime<Utc>>,
    /// Admin who approved the event.
    pub approved_by: Option<UserId>,
    /// Approval time.
    pub approved_at: Option<DateTime<Utc>>,
    /// Admin who rejected the event.
    pub rejected_by: Option<UserId>,
    /// Reason given on rejection.
    pub rejection_reason: Option<String>,
    /// Rejection time.
    pub rejected_at: Option<DateTime<Utc>>,
    /// When daily leaders were last dealt out automatically.
    pub leaders_assigned_at: Option<DateTime<Utc>>,
    /// Transition time into `InProgress`.
    pub started_at: Option<DateTime<Utc>>,
    /// Transition time into `Completed`.
    pub completed_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Builds a fresh `Draft` event from authoring input.
    #[must_use]
    pub fn from_draft(draft: EventDraft, leader_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: EventId::new(),
            title: draft.title,
            book_title: draft.book_title,
            description: draft.description,
            leader_id,
            status: EventStatus::Draft,
            approval_status: ApprovalStatus::Pending,
            start_date: draft.start_date,
            end_date: draft.end_date,
            max_participants: draft.max_participants,
            min_participants: draft.min_participants,
            completion_threshold_percent: draft.completion_threshold_percent,
            weekend_rest: draft.weekend_rest,
            fee_model: draft.fee_model,
            fee_amount: draft.fee_amount,
            leader_assignment: draft.leader_assignment,
            submitted_at: None,
            approved_by: None,
            approved_at: None,
            rejected_by: None,
            rejection_reason: None,
            rejected_at: None,
            leaders_assigned_at: None,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns `true` when `date` is inside the range and not a rest day.
    #[must_use]
    pub fn is_activity_day(&self, date: NaiveDate) -> bool {
        date >= self.start_date
            && date <= self.end_date
            && !(self.weekend_rest && is_weekend(date))
    }

    /// Every required reading day, in order.
    #[must_use]
    pub fn activity_days(&self) -> Vec<NaiveDate> {
        activity_days(self.start_date, self.end_date, self.weekend_rest)
    }

    /// Returns `true` while submitted and waiting for an admin decision.
    #[must_use]
    pub fn is_awaiting_review(&self) -> bool {
        self.approval_status == ApprovalStatus::Pending && self.submitted_at.is_some()
    }

    /// Returns `true` while the event may still be edited by its author.
    #[must_use]
    pub fn is_editable(&self) -> bool {
        self.status == EventStatus::Draft
            && match self.approval_status {
                ApprovalStatus::Pending => self.submitted_at.is_none(),
                ApprovalStatus::Rejected => true,
                ApprovalStatus::Approved => false,
            }
    }

    /// Returns `true` when rewards may be spent on this event.
    #[must_use]
    pub fn accepts_rewards(&self) -> bool {
        self.approval_status == ApprovalStatus::Approved
            && matches!(self.status, EventStatus::Enrolling | EventStatus::InProgress)
    }

    /// Clears the metadata left behind by a previous rejection.
    pub fn clear_rejection(&mut self) {
        self.rejected_by = None;
        self.rejection_reason = None;
        self.rejected_at = None;
    }
}

/// Returns `true` for Saturdays and Sundays.
#[must_use]
pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Lists the activity days between `start` and `end` inclusive.
#[must_use]
pub fn activity_days(start: NaiveDate, end: NaiveDate, weekend_rest: bool) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| !(weekend_rest && is_weekend(*d)))
        .collect()
}

/// One required reading day of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ReadingSchedule {
    /// Schedule identifier.
    pub id: ScheduleId,
    /// Owning event.
    pub event_id: EventId,
    /// Calendar date.
    pub date: NaiveDate,
    /// 1-based position among the activity days.
    pub day_number: u32,
    /// Daily leader, if one was claimed or assigned.
    pub assigned_leader_id: Option<UserId>,
}

/// Builds one schedule per activity day, numbered from 1.
#[must_use]
pub fn build_schedules(event: &Event) -> Vec<ReadingSchedule> {
    event
        .activity_days()
        .into_iter()
        .zip(1u32..)
        .map(|(date, day_number)| ReadingSchedule {
            id: ScheduleId::new(),
            event_id: event.id,
            date,
            day_number,
            assigned_leader_id: None,
        })
        .collect()
}

fn default_threshold() -> u8 {
    80
}

const fn default_fee_model() -> FeeModel {
    FeeModel::Free
}

const fn default_leader_assignment() -> LeaderAssignmentMode {
    LeaderAssignmentMode::Voluntary
}

/// Authoring input for a new event.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EventDraft {
    /// Display title.
    pub title: String,
    /// Title of the book being read.
    pub book_title: String,
    /// Optional long description.
    #[serde(default)]
    pub description: Option<String>,
    /// First reading day.
    pub start_date: NaiveDate,
    /// Last reading day.
    pub end_date: NaiveDate,
    /// Participant cap.
    pub max_participants: u32,
    /// Participants required to start.
    pub min_participants: u32,
    /// Completion threshold percent (defaults to 80).
    #[serde(default = "default_threshold")]
    pub completion_threshold_percent: u8,
    /// Skip weekends.
    #[serde(default)]
    pub weekend_rest: bool,
    /// Fee model (defaults to free).
    #[serde(default = "default_fee_model")]
    pub fee_model: FeeModel,
    /// Fee amount in minor units.
    #[serde(default)]
    pub fee_amount: u64,
    /// Leader assignment mode (defaults to voluntary).
    #[serde(default = "default_leader_assignment")]
    pub leader_assignment: LeaderAssignmentMode,
}

/// Partial update applied to an editable event.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct EventPatch {
    /// New title.
    #[serde(default)]
    pub title: Option<String>,
    /// New book title.
    #[serde(default)]
    pub book_title: Option<String>,
    /// New description.
    #[serde(default)]
    pub description: Option<String>,
    /// New start date.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    /// New end date.
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    /// New participant cap.
    #[serde(default)]
    pub max_participants: Option<u32>,
    /// New participant minimum.
    #[serde(default)]
    pub min_participants: Option<u32>,
    /// New completion threshold.
    #[serde(default)]
    pub completion_threshold_percent: Option<u8>,
    /// New weekend rule.
    #[serde(default)]
    pub weekend_rest: Option<bool>,
    /// New fee model.
    #[serde(default)]
    pub fee_model: Option<FeeModel>,
    /// New fee amount.
    #[serde(default)]
    pub fee_amount: Option<u64>,
    /// New leader assignment mode.
    #[serde(default)]
    pub leader_assignment: Option<LeaderAssignmentMode>,
}

impl EventPatch {
    /// Applies the patch. Returns `true` when the reading calendar changed.
    pub fn apply(self, event: &mut Event) -> bool {
        let calendar_before = (event.start_date, event.end_date, event.weekend_rest);
        if let Some(v) = self.title {
            event.title = v;
        }
        if let Some(v) = self.book_title {
            event.book_title = v;
        }
        if let Some(v) = self.description {
            event.description = Some(v);
        }
        if let Some(v) = self.start_date {
            event.start_date = v;
        }
        if let Some(v) = self.end_date {
            event.end_date = v;
        }
        if let Some(v) = self.max_participants {
            event.max_participants = v;
        }
        if let Some(v) = self.min_participants {
            event.min_participants = v;
        }
        if let Some(v) = self.completion_threshold_percent {
            event.completion_threshold_percent = v;
        }
        if let Some(v) = self.weekend_rest {
            event.weekend_rest = v;
        }
        if let Some(v) = self.fee_model {
            event.fee_model = v;
        }
        if let Some(v) = self.fee_amount {
            event.fee_amount = v;
        }
        if let Some(v) = self.leader_assignment {
            event.leader_assignment = v;
        }
        calendar_before != (event.start_date, event.end_date, event.weekend_rest)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
    }

    pub(crate) fn draft(start: NaiveDate, end: NaiveDate) -> EventDraft {
        EventDraft {
            title: "Winter Classics".to_string(),
            book_title: "Middlemarch".to_string(),
            description: None,
            start_date: start,
            end_date: end,
            max_participants: 10,
            min_participants: 2,
            completion_threshold_percent: 80,
            weekend_rest: false,
            fee_model: FeeModel::Free,
            fee_amount: 0,
            leader_assignment: LeaderAssignmentMode::Voluntary,
        }
    }

    #[test]
    fn weekend_rest_skips_saturday_and_sunday() {
        // 2026-03-02 is a Monday.
        let days = activity_days(date(2026, 3, 2), date(2026, 3, 15), true);
        assert_eq!(days.len(), 10);
        assert!(days.iter().all(|d| !is_weekend(*d)));
    }

    #[test]
    fn schedules_are_numbered_from_one() {
        let event = Event::from_draft(
            draft(date(2026, 3, 2), date(2026, 3, 8)),
            UserId::new(),
            Utc::now(),
        );
        let schedules = build_schedules(&event);
        assert_eq!(schedules.len(), 7);
        assert_eq!(schedules.first().map(|s| s.day_number), Some(1));
        assert_eq!(schedules.last().map(|s| s.day_number), Some(7));
        assert_eq!(schedules.last().map(|s| s.date), Some(date(2026, 3, 8)));
    }

    #[test]
    fn activity_day_respects_range_and_rest() {
        let mut d = draft(date(2026, 3, 2), date(2026, 3, 8));
        d.weekend_rest = true;
        let event = Event::from_draft(d, UserId::new(), Utc::now());
        assert!(event.is_activity_day(date(2026, 3, 6)));
        assert!(!event.is_activity_day(date(2026, 3, 7)));
        assert!(!event.is_activity_day(date(2026, 3, 1)));
        assert!(!event.is_activity_day(date(2026, 3, 9)));
    }

    #[test]
    fn patch_reports_calendar_changes() {
        let mut event = Event::from_draft(
            draft(date(2026, 3, 2), date(2026, 3, 8)),
            UserId::new(),
            Utc::now(),
        );
        let title_only = EventPatch {
            title: Some("Spring".to_string()),
            ..EventPatch::default()
        };
        assert!(!title_only.apply(&mut event));
        assert_eq!(event.title, "Spring");

        let dates = EventPatch {
            end_date: Some(date(2026, 3, 10)),
            ..EventPatch::default()
        };
        assert!(dates.apply(&mut event));
    }

    #[test]
    fn fresh_draft_is_editable_until_submitted() {
        let mut event = Event::from_draft(
            draft(date(2026, 3, 2), date(2026, 3, 8)),
            UserId::new(),
            Utc::now(),
        );
        assert!(event.is_editable());
        event.submitted_at = Some(Utc::now());
        assert!(!event.is_editable());
        assert!(event.is_awaiting_review());
        event.approval_status = ApprovalStatus::Rejected;
        assert!(event.is_editable());
    }
}
