//! The "give reward" transaction.
//!
//! A confirmed give is one atomic unit: the event read lock and the
//! giver's quota row lock are held while the quota is spent, the reward is
//! appended and both enrollments are updated. `RewardGiven` leaves through
//! the outbox only after both locks are released.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::OwnedMutexGuard;
use utoipa::ToSchema;

use super::{EngineContext, QuotaLedger};
use crate::domain::{
    CheckInId, DomainEvent, EnrollmentStatus, EventEntry, EventId, Outbox, Quota, QuotaKey,
    QuotaStatus, Reward, RewardId, UserId,
};
use crate::error::GatewayError;

/// Shown with every preview; rewards cannot be taken back.
pub const IRREVOCABLE_WARNING: &str =
    "Rewards are final: once given they cannot be edited, withdrawn or refunded.";

fn default_amount() -> u32 {
    1
}

/// Input of [`RewardEngine::give`].
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GiveRequest {
    /// Event the target check-in belongs to.
    pub event_id: EventId,
    /// Spender.
    pub giver_id: UserId,
    /// Author of the target check-in.
    pub recipient_id: UserId,
    /// Check-in being rewarded.
    pub target_id: CheckInId,
    /// Tokens to spend.
    #[serde(default = "default_amount")]
    pub amount: u32,
    /// Optional message.
    #[serde(default)]
    pub comment: Option<String>,
    /// Hide the giver from the recipient.
    #[serde(default)]
    pub anonymous: bool,
    /// `false` returns a preview without spending anything.
    #[serde(default)]
    pub confirmed: bool,
}

/// Non-mutating answer to an unconfirmed give.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RewardPreview {
    /// Giver's quota for today as it stands.
    pub quota: QuotaStatus,
    /// Tokens that would be spent.
    pub amount: u32,
    /// Whether a confirmed give would currently succeed.
    pub can_give: bool,
    /// Irrevocability notice.
    pub warning: String,
}

/// Result of a committed give.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RewardReceipt {
    /// The new reward.
    pub reward: Reward,
    /// Giver's quota after the spend.
    pub quota: QuotaStatus,
}

/// Either phase of a give.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum GiveOutcome {
    /// `confirmed = false`.
    Preview(RewardPreview),
    /// `confirmed = true` and committed.
    Given(RewardReceipt),
}

/// Giver's quota together with what was already spent that day.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuotaReport {
    /// Day the quota applies to.
    pub date: NaiveDate,
    /// Row figures (untouched defaults if no row exists yet).
    pub quota: QuotaStatus,
    /// Rewards given by the user that day.
    pub rewards_given: Vec<Reward>,
}

/// Orchestrates reward transactions on top of the [`QuotaLedger`].
#[derive(Debug, Clone)]
pub struct RewardEngine {
    ctx: EngineContext,
    ledger: QuotaLedger,
}

impl RewardEngine {
    /// Creates the engine.
    #[must_use]
    pub fn new(ctx: EngineContext, ledger: QuotaLedger) -> Self {
        Self { ctx, ledger }
    }

    /// The ledger rewards are spent from.
    #[must_use]
    pub const fn ledger(&self) -> &QuotaLedger {
        &self.ledger
    }

    /// Previews or commits a reward for today.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::SelfTargetNotAllowed`] when giver and recipient match.
    /// - [`GatewayError::InvalidTarget`] when the check-in does not exist,
    ///   belongs to another event or was written by someone else.
    /// - [`GatewayError::Authorization`] when the giver is not enrolled.
    /// - [`GatewayError::EventNotActive`], [`GatewayError::StateConflict`]
    ///   or [`GatewayError::InsufficientQuota`] from the quota check.
    /// - [`GatewayError::ConcurrencyConflict`] if the quota row stayed busy
    ///   through every retry.
    pub async fn give(&self, request: GiveRequest) -> Result<GiveOutcome, GatewayError> {
        if request.giver_id == request.recipient_id {
            return Err(GatewayError::SelfTargetNotAllowed);
        }
        if request.amount == 0 {
            return Err(GatewayError::invalid("amount", "must be at least 1"));
        }
        let event_id = request.event_id;
        let entry_lock = self.ctx.registry.get(event_id).await?;
        let entry = entry_lock.read().await;

        if !entry.event.accepts_rewards() {
            return Err(GatewayError::EventNotActive(event_id));
        }
        self.check_parties(&entry, &request).await?;

        let today = self.ctx.clock.today();
        if !request.confirmed {
            let can_give = self
                .ledger
                .can_give(&entry.event, request.giver_id, request.amount, today)
                .await?;
            let quota = self
                .ledger
                .peek(QuotaLedger::key(request.giver_id, event_id, today))
                .await?;
            tracing::debug!(%event_id, giver = %request.giver_id, can_give, "reward preview");
            return Ok(GiveOutcome::Preview(RewardPreview {
                quota,
                amount: request.amount,
                can_give,
                warning: IRREVOCABLE_WARNING.to_string(),
            }));
        }

        let mut quota = self
            .lock_with_retry(QuotaLedger::key(request.giver_id, event_id, today))
            .await?;
        QuotaLedger::consume_locked(&entry.event, &mut quota, request.amount, today)?;

        let now = self.ctx.clock.now();
        quota.give_count_today = quota.give_count_today.saturating_add(1);
        quota.last_given_at = Some(now);
        let quota_status = quota.status();

        let reward = Reward {
            id: RewardId::new(),
            event_id,
            giver_id: request.giver_id,
            recipient_id: request.recipient_id,
            target_id: request.target_id,
            amount: request.amount,
            comment: request.comment,
            anonymous: request.anonymous,
            created_at: now,
        };
        self.ctx.activity.append_reward(reward.clone()).await;

        if let Some(handle) = entry.enrollment(reward.recipient_id) {
            let mut recipient = handle.lock().await;
            recipient.rewards_received_count = recipient.rewards_received_count.saturating_add(1);
            recipient.rewards_received_amount = recipient
                .rewards_received_amount
                .saturating_add(u64::from(reward.amount));
        }
        if let Some(handle) = entry.enrollment(reward.giver_id) {
            let mut giver = handle.lock().await;
            giver.rewards_given_count = giver.rewards_given_count.saturating_add(1);
        }
        drop(quota);
        drop(entry);

        let mut outbox = Outbox::new();
        outbox.stage(DomainEvent::RewardGiven {
            event_id,
            reward_id: reward.id,
            giver_id: (!reward.anonymous).then_some(reward.giver_id),
            recipient_id: reward.recipient_id,
            target_id: reward.target_id,
            amount: reward.amount,
            timestamp: now,
        });
        outbox.commit(&self.ctx.event_bus);

        tracing::info!(
            %event_id,
            giver = %reward.giver_id,
            recipient = %reward.recipient_id,
            amount = reward.amount,
            remaining = quota_status.remaining,
            "reward given"
        );
        Ok(GiveOutcome::Given(RewardReceipt {
            reward,
            quota: quota_status,
        }))
    }

    /// Quota figures and spent rewards of `user_id` on `event_id` for `date`.
    /// Does not create a quota row.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] for an unknown event and
    /// [`GatewayError::ConcurrencyConflict`] if the row stays locked.
    pub async fn quota_status(
        &self,
        event_id: EventId,
        user_id: UserId,
        date: NaiveDate,
    ) -> Result<QuotaReport, GatewayError> {
        self.ctx.registry.get(event_id).await?;
        let quota = self
            .ledger
            .peek(QuotaLedger::key(user_id, event_id, date))
            .await?;
        let rewards_given = self
            .ctx
            .activity
            .rewards_given_on(event_id, user_id, date)
            .await;
        Ok(QuotaReport {
            date,
            quota,
            rewards_given,
        })
    }

    async fn check_parties(
        &self,
        entry: &EventEntry,
        request: &GiveRequest,
    ) -> Result<(), GatewayError> {
        let giver_enrolled = match entry.enrollment(request.giver_id) {
            Some(handle) => handle.lock().await.status != EnrollmentStatus::Cancelled,
            None => false,
        };
        if !giver_enrolled {
            return Err(GatewayError::Authorization(
                "only enrolled members may give rewards".to_string(),
            ));
        }

        let target = self
            .ctx
            .activity
            .check_in(request.target_id)
            .await
            .ok_or_else(|| {
                GatewayError::InvalidTarget(format!("check-in {} does not exist", request.target_id))
            })?;
        if target.event_id != request.event_id {
            return Err(GatewayError::InvalidTarget(format!(
                "check-in {} belongs to another event",
                request.target_id
            )));
        }
        if target.user_id != request.recipient_id {
            return Err(GatewayError::InvalidTarget(format!(
                "check-in {} was not written by the recipient",
                request.target_id
            )));
        }
        Ok(())
    }

    async fn lock_with_retry(&self, key: QuotaKey) -> Result<OwnedMutexGuard<Quota>, GatewayError> {
        let attempts = self.ctx.settings.reward_retry_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.ledger.lock(key).await {
                Ok(guard) => return Ok(guard),
                Err(err) if err.is_retryable() && attempt < attempts => {
                    tracing::warn!(
                        user_id = %key.user_id,
                        event_id = %key.event_id,
                        attempt,
                        "retrying contended quota row"
                    );
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
