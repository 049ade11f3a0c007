//! OpenAPI document assembled from the handler annotations.

use utoipa::OpenApi;

use super::dto::{
    CheckInRequest, EnrollRequest, EventListResponse, GiveRewardRequest, IssueCertificatesRequest,
    PaginationMeta, RejectRequest, StartResponse,
};
use super::handlers::{events, participation, rewards, standings, system};
use crate::domain::{
    Certificate, CheckIn, DailyRankingSnapshot, Enrollment, EventDraft, EventPatch, EventSummary,
    FinalRanking, QuotaStatus, RankingEntry, ReadingSchedule,
};
use crate::error::{ErrorBody, ErrorResponse, Violation};
use crate::service::{
    CompletionReport, EventDetails, GiveOutcome, QuotaReport, RewardPreview, RewardReceipt,
};

/// OpenAPI description of the REST surface.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "readalong-gateway",
        description = "Group reading events: approval, enrollment, daily reward quotas, rankings and certificates."
    ),
    paths(
        events::create_event,
        events::list_events,
        events::get_event,
        events::update_event,
        events::submit_event,
        events::approve_event,
        events::reject_event,
        events::open_enrollment,
        events::start_event,
        events::complete_event,
        participation::enroll,
        participation::list_enrollments,
        participation::cancel_enrollment,
        participation::check_in,
        participation::claim_schedule,
        participation::auto_assign,
        rewards::give_reward,
        rewards::get_quota,
        standings::generate_daily_ranking,
        standings::get_daily_ranking,
        standings::get_final_ranking,
        standings::issue_certificates,
        standings::list_event_certificates,
        standings::list_user_certificates,
        system::health_handler,
        system::rules_handler,
    ),
    components(schemas(
        EventDraft,
        EventPatch,
        EventSummary,
        EventDetails,
        EventListResponse,
        PaginationMeta,
        ReadingSchedule,
        Enrollment,
        CheckIn,
        QuotaStatus,
        QuotaReport,
        RewardPreview,
        RewardReceipt,
        GiveOutcome,
        RankingEntry,
        DailyRankingSnapshot,
        FinalRanking,
        Certificate,
        CompletionReport,
        EnrollRequest,
        CheckInRequest,
        GiveRewardRequest,
        RejectRequest,
        StartResponse,
        IssueCertificatesRequest,
        ErrorResponse,
        ErrorBody,
        Violation,
    )),
    tags(
        (name = "Events", description = "Event authoring and read models"),
        (name = "Review", description = "Submission and admin review"),
        (name = "Lifecycle", description = "Enrollment opening, start and completion"),
        (name = "Enrollments", description = "Enrollment and check-ins"),
        (name = "Leaders", description = "Daily leader claims and assignment"),
        (name = "Rewards", description = "Daily reward quotas"),
        (name = "Rankings", description = "Daily and final leaderboards"),
        (name = "Certificates", description = "Top-N certificates"),
        (name = "System", description = "Health and rules"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_reward_and_ranking_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/v1/events/{id}/rewards"));
        assert!(doc.paths.paths.contains_key("/api/v1/events/{id}/rankings/{date}"));
        assert!(doc.paths.paths.contains_key("/health"));
    }
}
