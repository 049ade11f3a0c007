//! Service layer: the components that mutate events.
//!
//! Every service is built from one shared [`EngineContext`]. Services stage
//! outbound [`crate::domain::DomainEvent`]s in an [`crate::domain::Outbox`]
//! while their atomic unit runs and publish them only after it commits.
//! [`ReadingEngine`] wires them together.

pub mod approval;
pub mod certificate;
pub mod context;
pub mod enrollment;
pub mod leader;
pub mod lifecycle;
pub mod quota_ledger;
pub mod ranking;
pub mod recovery;
pub mod reward_engine;

#[cfg(test)]
pub(crate) mod fixtures;

use std::sync::Arc;

pub use approval::{ApprovalWorkflow, SubmissionReceipt, validate_for_submission};
pub use certificate::{CertificateIssuer, MAX_CERTIFICATE_RANK};
pub use context::EngineContext;
pub use enrollment::EnrollmentService;
pub use leader::LeaderAssignment;
pub use lifecycle::{CompletionReport, EventDetails, EventLifecycleController};
pub use quota_ledger::QuotaLedger;
pub use ranking::RankingEngine;
pub use recovery::{ChangeSet, EventAggregate, StoredState};
pub use reward_engine::{
    GiveOutcome, GiveRequest, IRREVOCABLE_WARNING, QuotaReport, RewardEngine, RewardPreview,
    RewardReceipt,
};

use crate::config::EngineSettings;
use crate::domain::{Clock, EventBus};

/// All services over one set of stores.
#[derive(Debug, Clone)]
pub struct ReadingEngine {
    /// Shared stores, bus, clock and rules.
    pub ctx: EngineContext,
    /// Submission and review.
    pub approval: ApprovalWorkflow,
    /// Enrollment, check-ins and completion rates.
    pub enrollments: EnrollmentService,
    /// Daily leaders.
    pub leaders: LeaderAssignment,
    /// Reward transactions.
    pub rewards: RewardEngine,
    /// Leaderboards.
    pub rankings: RankingEngine,
    /// Certificates.
    pub certificates: CertificateIssuer,
    /// Status state machine.
    pub lifecycle: EventLifecycleController,
}

impl ReadingEngine {
    /// Builds every service over empty stores.
    #[must_use]
    pub fn new(settings: EngineSettings, clock: Arc<dyn Clock>, event_bus: EventBus) -> Self {
        let ledger = QuotaLedger::new(
            settings.default_daily_quota,
            settings.quota_lock_timeout,
            Arc::clone(&clock),
        );
        let ctx = EngineContext::new(settings, clock, event_bus);
        let rankings = RankingEngine::new(ctx.clone());
        let certificates = CertificateIssuer::new(ctx.clone(), rankings.clone());
        Self {
            approval: ApprovalWorkflow::new(ctx.clone()),
            enrollments: EnrollmentService::new(ctx.clone()),
            leaders: LeaderAssignment::new(ctx.clone()),
            rewards: RewardEngine::new(ctx.clone(), ledger),
            lifecycle: EventLifecycleController::new(
                ctx.clone(),
                rankings.clone(),
                certificates.clone(),
            ),
            rankings,
            certificates,
            ctx,
        }
    }

    /// The bus outbound events are published on.
    #[must_use]
    pub const fn event_bus(&self) -> &EventBus {
        &self.ctx.event_bus
    }
}
