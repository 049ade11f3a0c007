//! Enrollment records and completion-rate arithmetic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{EnrollmentId, EventId, UserId};

/// Kind of enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentType {
    /// Counts toward the participant cap; reads, checks in, leads and ranks.
    #[default]
    Participant,
    /// Follows along without taking a seat.
    Observer,
}

/// Status of an enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    /// Registered and reading.
    Enrolled,
    /// Reached the completion threshold. Never reverts.
    Completed,
    /// Withdrew before the event started.
    Cancelled,
}

/// A user's registration within an event. Unique per (event, user).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Enrollment {
    /// Enrollment identifier.
    pub id: EnrollmentId,
    /// Event enrolled in.
    pub event_id: EventId,
    /// Enrolled user.
    pub user_id: UserId,
    /// Participant or observer.
    pub enrollment_type: EnrollmentType,
    /// Current status.
    pub status: EnrollmentStatus,
    /// Share of required days with a check-in, in `[0, 100]`, two decimals.
    pub completion_rate_percent: f64,
    /// Number of check-ins recorded.
    pub check_in_count: u32,
    /// Number of rewards received.
    pub rewards_received_count: u32,
    /// Sum of reward amounts received.
    pub rewards_received_amount: u64,
    /// Number of rewards given.
    pub rewards_given_count: u32,
    /// Fee or deposit paid on enrollment (minor units).
    pub fee_paid: u64,
    /// Amount refunded (minor units).
    pub fee_refunded: u64,
    /// Enrollment time.
    pub enrolled_at: DateTime<Utc>,
    /// Time the completion threshold was first reached.
    pub completed_at: Option<DateTime<Utc>>,
    /// Cancellation time.
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Enrollment {
    /// Creates an `Enrolled` record.
    #[must_use]
    pub fn new(
        event_id: EventId,
        user_id: UserId,
        enrollment_type: EnrollmentType,
        fee_paid: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EnrollmentId::new(),
            event_id,
            user_id,
            enrollment_type,
            status: EnrollmentStatus::Enrolled,
            completion_rate_percent: 0.0,
            check_in_count: 0,
            rewards_received_count: 0,
            rewards_received_amount: 0,
            rewards_given_count: 0,
            fee_paid,
            fee_refunded: 0,
            enrolled_at: now,
            completed_at: None,
            cancelled_at: None,
        }
    }

    /// Returns `true` for a participant that has not cancelled.
    #[must_use]
    pub fn is_active_participant(&self) -> bool {
        self.enrollment_type == EnrollmentType::Participant
            && self.status != EnrollmentStatus::Cancelled
    }

    /// Stores a recomputed rate and latches `Enrolled -> Completed`.
    ///
    /// Returns `true` only on the call that flips the status. A lower rate
    /// later never moves a completed enrollment back.
    pub fn apply_completion_rate(
        &mut self,
        rate_percent: f64,
        threshold_percent: u8,
        now: DateTime<Utc>,
    ) -> bool {
        self.completion_rate_percent = rate_percent;
        if self.status == EnrollmentStatus::Enrolled
            && rate_percent >= f64::from(threshold_percent)
        {
            self.status = EnrollmentStatus::Completed;
            self.completed_at = Some(now);
            return true;
        }
        false
    }
}

/// `days_with_check_in / required_days * 100`, rounded to two decimals.
#[must_use]
pub fn completion_rate(days_with_check_in: usize, required_days: usize) -> f64 {
    if required_days == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let raw = days_with_check_in.min(required_days) as f64 / required_days as f64 * 100.0;
    (raw * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_rounds_to_two_decimals() {
        assert!((completion_rate(5, 7) - 71.43).abs() < f64::EPSILON);
        assert!((completion_rate(6, 7) - 85.71).abs() < f64::EPSILON);
        assert!((completion_rate(7, 7) - 100.0).abs() < f64::EPSILON);
        assert!(completion_rate(0, 0).abs() < f64::EPSILON);
    }

    #[test]
    fn completion_latch_never_reverts() {
        let mut e = Enrollment::new(
            EventId::new(),
            UserId::new(),
            EnrollmentType::Participant,
            0,
            Utc::now(),
        );
        assert!(!e.apply_completion_rate(71.43, 80, Utc::now()));
        assert_eq!(e.status, EnrollmentStatus::Enrolled);

        assert!(e.apply_completion_rate(85.71, 80, Utc::now()));
        assert_eq!(e.status, EnrollmentStatus::Completed);

        assert!(!e.apply_completion_rate(42.0, 80, Utc::now()));
        assert_eq!(e.status, EnrollmentStatus::Completed);
        assert!((e.completion_rate_percent - 42.0).abs() < f64::EPSILON);
    }

    #[test]
    fn cancelled_enrollment_does_not_complete() {
        let mut e = Enrollment::new(
            EventId::new(),
            UserId::new(),
            EnrollmentType::Participant,
            0,
            Utc::now(),
        );
        e.status = EnrollmentStatus::Cancelled;
        assert!(!e.apply_completion_rate(100.0, 80, Utc::now()));
        assert!(!e.is_active_participant());
    }
}
