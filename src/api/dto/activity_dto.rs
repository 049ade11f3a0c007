//! Bodies of enrollment, check-in, leader and reward endpoints.

use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::domain::{CheckInId, EnrollmentType, EventId, UserId};
use crate::service::GiveRequest;

/// Body of `POST /events/{id}/enrollments`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct EnrollRequest {
    /// Participant (default) or observer.
    #[serde(default)]
    pub enrollment_type: EnrollmentType,
}

/// Body of `POST /events/{id}/check-ins`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CheckInRequest {
    /// Reading day; today when omitted.
    #[serde(default)]
    pub date: Option<NaiveDate>,
    /// Reading note.
    #[serde(default)]
    pub note: Option<String>,
}

fn one() -> u32 {
    1
}

/// Body of `POST /events/{id}/rewards`. The giver is the calling user.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GiveRewardRequest {
    /// Author of the target check-in.
    pub recipient_id: UserId,
    /// Check-in being rewarded.
    pub target_id: CheckInId,
    /// Tokens to spend (default 1).
    #[serde(default = "one")]
    pub amount: u32,
    /// Optional message.
    #[serde(default)]
    pub comment: Option<String>,
    /// Hide the giver from the recipient.
    #[serde(default)]
    pub anonymous: bool,
    /// `false` (default) only previews the give.
    #[serde(default)]
    pub confirmed: bool,
}

impl GiveRewardRequest {
    /// Binds the body to an event and a giver.
    #[must_use]
    pub fn into_request(self, event_id: EventId, giver_id: UserId) -> GiveRequest {
        GiveRequest {
            event_id,
            giver_id,
            recipient_id: self.recipient_id,
            target_id: self.target_id,
            amount: self.amount,
            comment: self.comment,
            anonymous: self.anonymous,
            confirmed: self.confirmed,
        }
    }
}

/// Query of `GET /events/{id}/quota`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct QuotaQuery {
    /// Day to report; today when omitted.
    #[serde(default)]
    pub date: Option<NaiveDate>,
}
