use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::dto::{AdminAck, CreateUserRequest, UpdateUserRequest, UserView};
use crate::{
    auth::{
        extractors::RequireAdmin,
        repo_types::{NewUser, Role, UserPatch},
    },
    error::ApiError,
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(list_users).post(create_user))
        .route(
            "/admin/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

fn user_not_found() -> ApiError {
    ApiError::NotFound("User not found".into())
}

#[instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    _admin: RequireAdmin,
) -> Result<Json<Vec<UserView>>, ApiError> {
    let users = state.store.list_users().await?;
    Ok(Json(users.into_iter().map(UserView::from).collect()))
}

#[instrument(skip_all)]
pub async fn get_user(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<UserView>, ApiError> {
    let Path(id) = id?;
    let user = state.store.find_user(id).await?.ok_or_else(user_not_found)?;
    Ok(Json(UserView::from(user)))
}

#[instrument(skip_all)]
pub async fn create_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AdminAck>), ApiError> {
    let Json(req) = payload?;
    let fields = [req.username, req.email, req.password, req.name, req.role]
        .map(|f| f.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()));
    let [Some(username), Some(email), Some(password), Some(name), Some(role)] = fields else {
        return Err(ApiError::validation("Missing required fields"));
    };
    let role = Role::parse(&role)
        .ok_or_else(|| ApiError::validation("Invalid role. Must be admin, staff, or user"))?;

    let user = state
        .store
        .create_user(&NewUser {
            username,
            email,
            password,
            name,
            role,
        })
        .await?;

    info!(admin_id = admin.user.id, user_id = user.id, role = role.as_str(), "user created");
    Ok((
        StatusCode::CREATED,
        Json(AdminAck {
            success: Some(true),
            message: "User created successfully",
            user: Some(UserView::from(user)),
        }),
    ))
}

#[instrument(skip_all)]
pub async fn update_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<AdminAck>, ApiError> {
    let Path(id) = id?;
    let Json(req) = payload?;

    let role = match req.role.as_deref() {
        Some(r) => Some(Role::parse(r).ok_or_else(|| ApiError::validation("Invalid role"))?),
        None => None,
    };
    let patch = UserPatch {
        name: req.name,
        email: req.email,
        role,
        password: req.password.filter(|p| !p.is_empty()),
    };
    if patch.is_empty() {
        return Ok(Json(AdminAck {
            success: None,
            message: "No changes provided",
            user: None,
        }));
    }

    if !state.store.update_user(id, &patch).await? {
        warn!(user_id = id, "update of unknown user");
        return Err(user_not_found());
    }
    info!(admin_id = admin.user.id, user_id = id, "user updated");
    Ok(Json(AdminAck::done("User updated successfully")))
}

#[instrument(skip_all)]
pub async fn delete_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<AdminAck>, ApiError> {
    let Path(id) = id?;
    if id == admin.user.id {
        return Err(ApiError::validation("Cannot delete your own account"));
    }
    if !state.store.delete_user(id).await? {
        return Err(user_not_found());
    }
    info!(admin_id = admin.user.id, user_id = id, "user deleted");
    Ok(Json(AdminAck::done("User deleted successfully")))
}
