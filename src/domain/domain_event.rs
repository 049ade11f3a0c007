//! Outbound domain events.
//!
//! Every committed mutation stages one or more [`DomainEvent`]s in an
//! [`super::Outbox`]; they reach the [`super::EventBus`] only after the
//! atomic unit has finished. Consumers (WebSocket clients, the database
//! sink, notification collaborators) can never roll a mutation back.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use super::{
    CertificateId, CheckInId, EnrollmentId, EventId, RankingEntry, RewardId, ScheduleId, UserId,
};

/// Domain event published after a successful state mutation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type")]
pub enum DomainEvent {
    /// A draft event was authored.
    #[serde(rename = "event.created")]
    EventCreated {
        /// Event.
        event_id: EventId,
        /// Author and overall leader.
        leader_id: UserId,
        /// Creation time.
        timestamp: DateTime<Utc>,
    },

    /// The leader edited the event while it was still editable.
    #[serde(rename = "event.updated")]
    EventUpdated {
        /// Event.
        event_id: EventId,
        /// Whether the schedules were regenerated.
        calendar_changed: bool,
        /// Edit time.
        timestamp: DateTime<Utc>,
    },

    /// A draft was submitted for review.
    #[serde(rename = "event.submitted")]
    EventSubmitted {
        /// Event.
        event_id: EventId,
        /// Position in the review queue (1-based).
        queue_position: usize,
        /// Submission time.
        timestamp: DateTime<Utc>,
    },

    /// An admin approved the event.
    #[serde(rename = "event.approved")]
    EventApproved {
        /// Event.
        event_id: EventId,
        /// Approving admin.
        approved_by: UserId,
        /// Approval time.
        timestamp: DateTime<Utc>,
    },

    /// An admin rejected the event.
    #[serde(rename = "event.rejected")]
    EventRejected {
        /// Event.
        event_id: EventId,
        /// Rejecting admin.
        rejected_by: UserId,
        /// Reason shown to the author.
        reason: String,
        /// Rejection time.
        timestamp: DateTime<Utc>,
    },

    /// The event moved to `Enrolling`.
    #[serde(rename = "event.enrollment_opened")]
    EnrollmentOpened {
        /// Event.
        event_id: EventId,
        /// Transition time.
        timestamp: DateTime<Utc>,
    },

    /// The event moved to `InProgress`.
    #[serde(rename = "event.started")]
    EventStarted {
        /// Event.
        event_id: EventId,
        /// Participants at start.
        participant_count: usize,
        /// Transition time.
        timestamp: DateTime<Utc>,
    },

    /// The event moved to `Completed`.
    #[serde(rename = "event.completed")]
    EventCompleted {
        /// Event.
        event_id: EventId,
        /// User who triggered completion.
        completed_by: UserId,
        /// Enrollments that reached the threshold.
        completed_enrollments: usize,
        /// Transition time.
        timestamp: DateTime<Utc>,
    },

    /// A user enrolled.
    #[serde(rename = "enrollment.created")]
    EnrollmentCreated {
        /// Event.
        event_id: EventId,
        /// Enrollment.
        enrollment_id: EnrollmentId,
        /// Enrolled user.
        user_id: UserId,
        /// Fee collected, in minor units.
        fee_paid: u64,
        /// Enrollment time.
        timestamp: DateTime<Utc>,
    },

    /// A user withdrew; the payment collaborator settles the refund.
    #[serde(rename = "enrollment.cancelled")]
    EnrollmentCancelled {
        /// Event.
        event_id: EventId,
        /// Enrollment.
        enrollment_id: EnrollmentId,
        /// Withdrawn user.
        user_id: UserId,
        /// Amount owed back, in minor units.
        refund_amount: u64,
        /// Cancellation time.
        timestamp: DateTime<Utc>,
    },

    /// An enrollment reached the completion threshold.
    #[serde(rename = "enrollment.completed")]
    EnrollmentCompleted {
        /// Event.
        event_id: EventId,
        /// Enrollment.
        enrollment_id: EnrollmentId,
        /// User.
        user_id: UserId,
        /// Rate that crossed the threshold.
        completion_rate_percent: f64,
        /// Latch time.
        timestamp: DateTime<Utc>,
    },

    /// A completed deposit holder is owed their deposit back.
    #[serde(rename = "deposit.refund_due")]
    DepositRefundDue {
        /// Event.
        event_id: EventId,
        /// User.
        user_id: UserId,
        /// Deposit amount in minor units.
        amount: u64,
        /// Event completion time.
        timestamp: DateTime<Utc>,
    },

    /// Daily leaders were dealt round-robin.
    #[serde(rename = "leaders.assigned")]
    LeadersAssigned {
        /// Event.
        event_id: EventId,
        /// Schedules that received a leader.
        schedule_count: usize,
        /// Assignment time.
        timestamp: DateTime<Utc>,
    },

    /// A participant claimed a reading day.
    #[serde(rename = "schedule.claimed")]
    ScheduleClaimed {
        /// Event.
        event_id: EventId,
        /// Claimed schedule.
        schedule_id: ScheduleId,
        /// New daily leader.
        user_id: UserId,
        /// Claim time.
        timestamp: DateTime<Utc>,
    },

    /// A participant checked in.
    #[serde(rename = "checkin.recorded")]
    CheckInRecorded {
        /// Event.
        event_id: EventId,
        /// Check-in.
        check_in_id: CheckInId,
        /// Author.
        user_id: UserId,
        /// Day covered.
        date: NaiveDate,
        /// Recording time.
        timestamp: DateTime<Utc>,
    },

    /// A reward was committed.
    #[serde(rename = "reward.given")]
    RewardGiven {
        /// Event.
        event_id: EventId,
        /// Reward.
        reward_id: RewardId,
        /// Spender; absent for anonymous rewards.
        giver_id: Option<UserId>,
        /// Beneficiary.
        recipient_id: UserId,
        /// Rewarded check-in.
        target_id: CheckInId,
        /// Tokens spent.
        amount: u32,
        /// Commit time.
        timestamp: DateTime<Utc>,
    },

    /// A daily leaderboard snapshot was (re)generated.
    #[serde(rename = "ranking.generated")]
    RankingGenerated {
        /// Event.
        event_id: EventId,
        /// Day covered.
        date: NaiveDate,
        /// Ordered rows.
        rankings: Vec<RankingEntry>,
        /// Generation time.
        timestamp: DateTime<Utc>,
    },

    /// A certificate was issued.
    #[serde(rename = "certificate.issued")]
    CertificateIssued {
        /// Event.
        event_id: EventId,
        /// Certificate.
        certificate_id: CertificateId,
        /// Holder.
        user_id: UserId,
        /// Final rank.
        rank: u8,
        /// Final total.
        total_amount: u64,
        /// Unique number.
        certificate_number: String,
        /// Expiry date.
        expires_at: NaiveDate,
        /// Issue time.
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// Returns the reading event this domain event belongs to.
    #[must_use]
    pub fn event_id(&self) -> EventId {
        match self {
            Self::EventCreated { event_id, .. }
            | Self::EventUpdated { event_id, .. }
            | Self::EventSubmitted { event_id, .. }
            | Self::EventApproved { event_id, .. }
            | Self::EventRejected { event_id, .. }
            | Self::EnrollmentOpened { event_id, .. }
            | Self::EventStarted { event_id, .. }
            | Self::EventCompleted { event_id, .. }
            | Self::EnrollmentCreated { event_id, .. }
            | Self::EnrollmentCancelled { event_id, .. }
            | Self::EnrollmentCompleted { event_id, .. }
            | Self::DepositRefundDue { event_id, .. }
            | Self::LeadersAssigned { event_id, .. }
            | Self::ScheduleClaimed { event_id, .. }
            | Self::CheckInRecorded { event_id, .. }
            | Self::RewardGiven { event_id, .. }
            | Self::RankingGenerated { event_id, .. }
            | Self::CertificateIssued { event_id, .. } => *event_id,
        }
    }

    /// Returns the dotted event type name.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::EventCreated { .. } => "event.created",
            Self::EventUpdated { .. } => "event.updated",
            Self::EventSubmitted { .. } => "event.submitted",
            Self::EventApproved { .. } => "event.approved",
            Self::EventRejected { .. } => "event.rejected",
            Self::EnrollmentOpened { .. } => "event.enrollment_opened",
            Self::EventStarted { .. } => "event.started",
            Self::EventCompleted { .. } => "event.completed",
            Self::EnrollmentCreated { .. } => "enrollment.created",
            Self::EnrollmentCancelled { .. } => "enrollment.cancelled",
            Self::EnrollmentCompleted { .. } => "enrollment.completed",
            Self::DepositRefundDue { .. } => "deposit.refund_due",
            Self::LeadersAssigned { .. } => "leaders.assigned",
            Self::ScheduleClaimed { .. } => "schedule.claimed",
            Self::CheckInRecorded { .. } => "checkin.recorded",
            Self::RewardGiven { .. } => "reward.given",
            Self::RankingGenerated { .. } => "ranking.generated",
            Self::CertificateIssued { .. } => "certificate.issued",
        }
    }

    /// Returns the time the underlying mutation committed.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::EventCreated { timestamp, .. }
            | Self::EventUpdated { timestamp, .. }
            | Self::EventSubmitted { timestamp, .. }
            | Self::EventApproved { timestamp, .. }
            | Self::EventRejected { timestamp, .. }
            | Self::EnrollmentOpened { timestamp, .. }
            | Self::EventStarted { timestamp, .. }
            | Self::EventCompleted { timestamp, .. }
            | Self::EnrollmentCreated { timestamp, .. }
            | Self::EnrollmentCancelled { timestamp, .. }
            | Self::EnrollmentCompleted { timestamp, .. }
            | Self::DepositRefundDue { timestamp, .. }
            | Self::LeadersAssigned { timestamp, .. }
            | Self::ScheduleClaimed { timestamp, .. }
            | Self::CheckInRecorded { timestamp, .. }
            | Self::RewardGiven { timestamp, .. }
            | Self::RankingGenerated { timestamp, .. }
            | Self::CertificateIssued { timestamp, .. } => *timestamp,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_dotted_type_tag() {
        let event = DomainEvent::RewardGiven {
            event_id: EventId::new(),
            reward_id: RewardId::new(),
            giver_id: None,
            recipient_id: UserId::new(),
            target_id: CheckInId::new(),
            amount: 2,
            timestamp: Utc::now(),
        };
        let Ok(json) = serde_json::to_value(&event) else {
            panic!("serialization failed");
        };
        assert_eq!(json.get("event_type").and_then(|v| v.as_str()), Some("reward.given"));
        assert_eq!(json.get("amount").and_then(serde_json::Value::as_u64), Some(2));
        assert_eq!(event.event_type_str(), "reward.given");
    }

    #[test]
    fn event_id_accessor() {
        let id = EventId::new();
        let event = DomainEvent::EnrollmentOpened {
            event_id: id,
            timestamp: Utc::now(),
        };
        assert_eq!(event.event_id(), id);
    }
}
