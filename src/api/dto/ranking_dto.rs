//! Bodies of ranking and certificate endpoints.

use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

/// Query of `POST /events/{id}/rankings/{date}`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GenerateRankingQuery {
    /// Rebuild an existing snapshot.
    #[serde(default)]
    pub force: bool,
}

/// Body of `POST /events/{id}/certificates`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct IssueCertificatesRequest {
    /// Number of top ranks to certify; the configured default when omitted.
    #[serde(default)]
    pub n: Option<usize>,
}
