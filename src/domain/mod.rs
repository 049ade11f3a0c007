//! Domain layer: records, aggregates, stores, and the event system.
//!
//! Records (`Event`, `Enrollment`, `Quota`, `Reward`, ...) are plain data.
//! [`EventRegistry`] and [`ActivityLog`] are the in-process system of
//! record; [`EventBus`] and [`Outbox`] carry outbound domain events.

pub mod activity_log;
pub mod actor;
pub mod clock;
pub mod domain_event;
pub mod enrollment;
pub mod event;
pub mod event_bus;
pub mod event_entry;
pub mod event_registry;
pub mod ids;
pub mod quota;
pub mod ranking;

pub use activity_log::{ActivityLog, CheckIn, Reward};
pub use actor::{Actor, Role};
pub use clock::{Clock, ManualClock, SystemClock};
pub use domain_event::DomainEvent;
pub use enrollment::{Enrollment, EnrollmentStatus, EnrollmentType, completion_rate};
pub use event::{
    ApprovalStatus, Event, EventDraft, EventPatch, EventStatus, FeeModel, LeaderAssignmentMode,
    ReadingSchedule, build_schedules,
};
pub use event_bus::{EventBus, Outbox};
pub use event_entry::{EventEntry, EventSummary};
pub use event_registry::EventRegistry;
pub use ids::{
    CertificateId, CheckInId, EnrollmentId, EventId, QuotaId, RewardId, ScheduleId, SnapshotId,
    UserId,
};
pub use quota::{Quota, QuotaKey, QuotaStatus};
pub use ranking::{Certificate, DailyRankingSnapshot, FinalRanking, RankingEntry, rank_recipients};
