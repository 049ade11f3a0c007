//! The user on whose behalf an operation runs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::UserId;

/// Platform role of an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular reader.
    #[default]
    Member,
    /// Platform administrator; may approve and reject events.
    Admin,
}

/// Authenticated caller of an engine operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Actor {
    /// Acting user.
    pub user_id: UserId,
    /// Role granted to the user.
    pub role: Role,
}

impl Actor {
    /// Creates a member actor.
    #[must_use]
    pub const fn member(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Member,
        }
    }

    /// Creates an admin actor.
    #[must_use]
    pub const fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Admin,
        }
    }

    /// Returns `true` for administrators.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
