//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type for the engine and the REST
//! layer. Each variant maps to a numeric code and an HTTP status, so callers
//! can tell "fix your input" from "forbidden" from "try again".

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 4001,
///     "message": "insufficient quota: 0 of 3 remaining (used 3)",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional machine-readable details (rule violations, quota figures).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// A single broken rule reported by validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Violation {
    /// Offending field or rule name.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl Violation {
    /// Creates a violation.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Engine error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category              | HTTP Status               |
/// |-----------|-----------------------|---------------------------|
/// | 1000–1999 | Validation            | 400 Bad Request           |
/// | 2000–2099 | Not found             | 404 Not Found             |
/// | 2100–2199 | State conflict        | 409 Conflict              |
/// | 3000–3999 | Server / contention   | 500 / 503                 |
/// | 4000–4999 | Quota                 | 409 Conflict              |
/// | 403       | Authorization         | 403 Forbidden             |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Input broke one or more rules. Not retryable without changes.
    #[error("validation failed: {}", summarize(.0))]
    Validation(Vec<Violation>),

    /// Reward target does not belong to the event or the recipient.
    #[error("invalid reward target: {0}")]
    InvalidTarget(String),

    /// Giver and recipient are the same user.
    #[error("cannot reward yourself")]
    SelfTargetNotAllowed,

    /// Actor lacks the role or relationship the operation needs.
    #[error("forbidden: {0}")]
    Authorization(String),

    /// Operation is not valid in the entity's current state.
    #[error("state conflict: {0}")]
    StateConflict(String),

    /// The event does not accept rewards in its current state.
    #[error("event {0} is not active")]
    EventNotActive(crate::domain::EventId),

    /// Giver's daily allowance cannot cover the requested amount.
    #[error("insufficient quota: {remaining} of {max} remaining (used {used})")]
    InsufficientQuota {
        /// Tokens left today.
        remaining: u32,
        /// Tokens spent today.
        used: u32,
        /// Daily allowance.
        max: u32,
    },

    /// Contention on a quota row could not be resolved in time. Retryable.
    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    /// Referenced entity is missing.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind (e.g. `"event"`).
        entity: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

fn summarize(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| format!("{}: {}", v.field, v.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl GatewayError {
    /// Shorthand for a single-rule validation failure.
    #[must_use]
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![Violation::new(field, message)])
    }

    /// Shorthand for a missing entity.
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns `true` for conflicts that depend on entity state, including
    /// insufficient quota and inactive events.
    #[must_use]
    pub const fn is_state_conflict(&self) -> bool {
        matches!(
            self,
            Self::StateConflict(_) | Self::EventNotActive(_) | Self::InsufficientQuota { .. }
        )
    }

    /// Returns `true` when retrying the same call may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict(_))
    }

    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Validation(_) => 1001,
            Self::InvalidTarget(_) => 1002,
            Self::SelfTargetNotAllowed => 1003,
            Self::NotFound { .. } => 2001,
            Self::StateConflict(_) => 2101,
            Self::EventNotActive(_) => 2102,
            Self::Internal(_) => 3000,
            Self::PersistenceError(_) => 3001,
            Self::ConcurrencyConflict(_) => 3002,
            Self::InsufficientQuota { .. } => 4001,
            Self::Authorization(_) => 403,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InvalidTarget(_) | Self::SelfTargetNotAllowed => {
                StatusCode::BAD_REQUEST
            }
            Self::Authorization(_) => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::StateConflict(_) | Self::EventNotActive(_) | Self::InsufficientQuota { .. } => {
                StatusCode::CONFLICT
            }
            Self::ConcurrencyConflict(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::PersistenceError(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Validation(violations) => serde_json::to_value(violations).ok(),
            Self::InsufficientQuota {
                remaining,
                used,
                max,
            } => Some(serde_json::json!({
                "remaining": remaining,
                "used": used,
                "max": max,
            })),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        Self::PersistenceError(err.to_string())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: self.details(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
