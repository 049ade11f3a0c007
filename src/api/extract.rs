//! Request extractors.
//!
//! Identity comes from a trusted upstream: `x-user-id` carries the user
//! UUID and `x-user-role` (`member` or `admin`, default `member`) the role.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::domain::{Actor, Role, UserId};
use crate::error::GatewayError;

/// Header carrying the acting user's id.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the acting user's role.
pub const USER_ROLE_HEADER: &str = "x-user-role";

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| uuid::Uuid::parse_str(s.trim()).ok())
            .map(UserId::from_uuid)
            .ok_or_else(|| {
                GatewayError::Authorization(format!("missing or invalid {USER_ID_HEADER} header"))
            })?;

        let role = match parts.headers.get(USER_ROLE_HEADER).map(|v| v.to_str()) {
            None => Role::Member,
            Some(Ok(value)) if value.eq_ignore_ascii_case("admin") => Role::Admin,
            Some(Ok(value)) if value.eq_ignore_ascii_case("member") => Role::Member,
            Some(_) => {
                return Err(GatewayError::invalid(
                    USER_ROLE_HEADER,
                    "must be `member` or `admin`",
                ));
            }
        };
        Ok(Self { user_id, role })
    }
}
