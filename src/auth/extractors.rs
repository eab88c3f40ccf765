use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use super::{
    repo_types::{Role, User},
    session::SessionKeys,
};
use crate::{error::ApiError, state::AppState};

/// The signed-in user behind a request, resolved from the session cookie.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub session_id: Uuid,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let keys = SessionKeys::from_ref(state);
        let session_id = keys.session_id(&parts.headers).ok_or_else(ApiError::unauthorized)?;

        let user = state
            .store
            .session_user(session_id, OffsetDateTime::now_utc())
            .await?
            .ok_or_else(|| {
                debug!(session_id = %session_id, "session unknown or expired");
                ApiError::unauthorized()
            })?;

        Ok(AuthUser { user, session_id })
    }
}

/// Role predicates checked before a handler body runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Editor,
    Admin,
}

impl Access {
    pub fn permits(self, role: Role) -> bool {
        match self {
            Access::Editor => matches!(role, Role::Admin | Role::Staff),
            Access::Admin => role == Role::Admin,
        }
    }

    pub fn check(self, user: &User) -> Result<(), ApiError> {
        if self.permits(user.role) {
            return Ok(());
        }
        debug!(user_id = user.id, role = user.role.as_str(), access = ?self, "access denied");
        let msg = match self {
            Access::Admin => "Forbidden. Admin access required.",
            Access::Editor => "Forbidden. Edit access required.",
        };
        Err(ApiError::Forbidden(msg.into()))
    }
}

/// Staff or admin.
pub struct RequireEditor(pub AuthUser);

#[async_trait]
impl FromRequestParts<AppState> for RequireEditor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth = AuthUser::from_request_parts(parts, state).await?;
        Access::Editor.check(&auth.user)?;
        Ok(RequireEditor(auth))
    }
}

pub struct RequireAdmin(pub AuthUser);

#[async_trait]
impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth = AuthUser::from_request_parts(parts, state).await?;
        Access::Admin.check(&auth.user)?;
        Ok(RequireAdmin(auth))
    }
}
