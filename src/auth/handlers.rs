use axum::{
    extract::{rejection::JsonRejection, FromRef, State},
    http::{header, HeaderMap},
    response::{AppendHeaders, IntoResponse},
    routing::{get, post, put},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            Ack, AuthStatus, ForgotPasswordRequest, LoginRequest, LoginResponse, ResetPasswordRequest,
            SessionUser, ThemeRequest, ThemeResponse,
        },
        extractors::AuthUser,
        otp::OtpService,
        repo_types::Theme,
        session::SessionKeys,
    },
    error::ApiError,
    state::AppState,
};

const MIN_PASSWORD_LEN: usize = 8;

pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/check-auth", get(check_auth))
        .route("/user/theme", put(update_theme))
}

pub fn reset_routes() -> Router<AppState> {
    Router::new()
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    let (Some(login), Some(password)) = (present(payload.username), present(payload.password)) else {
        return Err(ApiError::validation("Username/email and password are required"));
    };

    let user = match state.store.find_user_by_login(&login).await? {
        Some(u) if u.password == password => u,
        Some(u) => {
            warn!(user_id = u.id, "login invalid password");
            return Err(ApiError::Unauthorized("Invalid credentials".into()));
        }
        None => {
            warn!(login = %login, "login unknown user");
            return Err(ApiError::Unauthorized("Invalid credentials".into()));
        }
    };

    let keys = SessionKeys::from_ref(&state);
    let now = OffsetDateTime::now_utc();
    let purged = state.store.purge_expired_sessions(now).await?;
    if purged > 0 {
        info!(purged, "expired sessions removed");
    }
    let session_id = state.store.create_session(user.id, keys.expires_at(now)).await?;
    let token = keys.sign(session_id, now)?;
    let cookie = keys.cookie(&token)?;

    info!(user_id = user.id, username = %user.username, "user logged in");
    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(LoginResponse {
            success: true,
            message: "Login successful",
            user: SessionUser::from(&user),
        }),
    ))
}

#[instrument(skip(state, headers))]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<impl IntoResponse, ApiError> {
    let keys = SessionKeys::from_ref(&state);
    if let Some(session_id) = keys.session_id(&headers) {
        state.store.delete_session(session_id).await?;
        info!(session_id = %session_id, "session ended");
    }
    Ok((
        AppendHeaders([(header::SET_COOKIE, keys.expired_cookie())]),
        Json(Ack::ok("Logged out successfully")),
    ))
}

#[instrument(skip_all)]
pub async fn check_auth(auth: Option<AuthUser>) -> Json<AuthStatus> {
    Json(AuthStatus {
        authenticated: auth.is_some(),
        user: auth.map(|a| SessionUser::from(&a.user)),
    })
}

#[instrument(skip(state, auth, payload), fields(user_id = auth.user.id, session_id = %auth.session_id))]
pub async fn update_theme(
    State(state): State<AppState>,
    auth: AuthUser,
    payload: Result<Json<ThemeRequest>, JsonRejection>,
) -> Result<Json<ThemeResponse>, ApiError> {
    let Json(payload) = payload?;
    let theme = payload
        .theme
        .as_deref()
        .and_then(Theme::parse)
        .ok_or_else(|| ApiError::validation("Invalid theme"))?;

    state.store.set_theme(auth.user.id, theme).await?;
    Ok(Json(ThemeResponse { success: true, theme }))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    payload: Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> Result<Json<Ack>, ApiError> {
    let Json(payload) = payload?;
    let email = present(payload.email).ok_or_else(|| ApiError::validation("Email is required"))?;

    OtpService::new(state.store.as_ref(), state.mailer.as_ref(), state.config.otp_ttl_minutes)
        .request(email.trim(), OffsetDateTime::now_utc())
        .await?;

    Ok(Json(Ack::ok("If your email is registered, you will receive an OTP shortly.")))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<Json<Ack>, ApiError> {
    let Json(payload) = payload?;
    let (Some(email), Some(otp), Some(new_password)) =
        (present(payload.email), present(payload.otp), present(payload.new_password))
    else {
        return Err(ApiError::validation("Missing required fields"));
    };
    if new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation("Password must be at least 8 characters long"));
    }

    OtpService::new(state.store.as_ref(), state.mailer.as_ref(), state.config.otp_ttl_minutes)
        .verify(email.trim(), otp.trim(), &new_password, OffsetDateTime::now_utc())
        .await?;

    Ok(Json(Ack::ok("Password reset successfully. Please login.")))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::app::testing::{login_cookie, send};
    use crate::auth::repo_types::Role;
    use crate::db::Store;
    use crate::state::testing::TestState;

    #[tokio::test]
    async fn login_sets_cookie_and_check_auth_sees_it() {
        let t = TestState::new();
        t.user("alice", Role::Staff).await;

        let res = send(&t, "POST", "/api/login", None, Some(json!({"username": "alice", "password": "alice-pass1"}))).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body["user"]["role"], "staff");
        assert_eq!(res.body["user"]["theme"], "light");
        let cookie = res.cookie().expect("session cookie");

        let res = send(&t, "GET", "/api/check-auth", Some(cookie.as_str()), None).await;
        assert_eq!(res.body["authenticated"], true);
        assert_eq!(res.body["user"]["username"], "alice");
    }

    #[tokio::test]
    async fn login_by_email_and_wrong_password() {
        let t = TestState::new();
        t.user("bob", Role::User).await;

        let res = send(&t, "POST", "/api/login", None, Some(json!({"username": "bob@company.com", "password": "bob-pass1"}))).await;
        assert_eq!(res.status, StatusCode::OK);

        let res = send(&t, "POST", "/api/login", None, Some(json!({"username": "bob", "password": "nope"}))).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
        assert_eq!(res.body["error"], "Invalid credentials");

        let res = send(&t, "POST", "/api/login", None, Some(json!({"username": "bob"}))).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn logout_ends_session() {
        let t = TestState::new();
        t.user("carol", Role::Admin).await;
        let cookie = login_cookie(&t, "carol").await;

        let res = send(&t, "POST", "/api/logout", Some(cookie.as_str()), None).await;
        assert_eq!(res.status, StatusCode::OK);
        assert!(res.set_cookie.unwrap().contains("Max-Age=0"));

        let res = send(&t, "GET", "/api/check-auth", Some(cookie.as_str()), None).await;
        assert_eq!(res.body, json!({"authenticated": false}));
        let res = send(&t, "GET", "/api/contractors", Some(cookie.as_str()), None).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn login_sweeps_expired_sessions() {
        let t = TestState::new();
        let user = t.user("dana", Role::User).await;
        let yesterday = time::OffsetDateTime::now_utc() - time::Duration::days(1);
        t.store.create_session(user.id, yesterday).await.unwrap();
        t.store.create_session(user.id, yesterday).await.unwrap();
        assert_eq!(t.store.session_count(), 2);

        login_cookie(&t, "dana").await;
        assert_eq!(t.store.session_count(), 1);
    }

    #[tokio::test]
    async fn theme_is_persisted() {
        let t = TestState::new();
        let user = t.user("dave", Role::User).await;
        let cookie = login_cookie(&t, "dave").await;

        let res = send(&t, "PUT", "/api/user/theme", Some(cookie.as_str()), Some(json!({"theme": "dark"}))).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body, json!({"success": true, "theme": "dark"}));
        let stored = t.store.find_user(user.id).await.unwrap().unwrap();
        assert_eq!(stored.theme_preference.as_str(), "dark");

        let res = send(&t, "PUT", "/api/user/theme", Some(cookie.as_str()), Some(json!({"theme": "blue"}))).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
        let res = send(&t, "PUT", "/api/user/theme", None, Some(json!({"theme": "dark"}))).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn forgot_password_is_generic_for_unknown_email() {
        let t = TestState::new();
        let res = send(&t, "POST", "/api/forgot-password", None, Some(json!({"email": "nobody@company.com"}))).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body["success"], true);
        assert!(t.store.reset_rows().is_empty());
    }

    #[tokio::test]
    async fn reset_password_flow_over_http() {
        let t = TestState::new();
        t.user("erin", Role::User).await;

        let res = send(&t, "POST", "/api/forgot-password", None, Some(json!({"email": "erin@company.com"}))).await;
        assert_eq!(res.status, StatusCode::OK);
        let code = t.mailer.last_code_for("erin@company.com").unwrap();

        let res = send(&t, "POST", "/api/reset-password", None, Some(json!({"email": "erin@company.com", "otp": code, "newPassword": "short"}))).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);

        let res = send(&t, "POST", "/api/reset-password", None, Some(json!({"email": "erin@company.com", "otp": "000000x", "newPassword": "long-enough"}))).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
        assert_eq!(res.body["error"], "Invalid or expired OTP");

        let res = send(&t, "POST", "/api/reset-password", None, Some(json!({"email": "erin@company.com", "otp": code, "newPassword": "long-enough"}))).await;
        assert_eq!(res.status, StatusCode::OK);

        let res = send(&t, "POST", "/api/login", None, Some(json!({"username": "erin", "password": "long-enough"}))).await;
        assert_eq!(res.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn reset_password_requires_all_fields() {
        let t = TestState::new();
        let res = send(&t, "POST", "/api/reset-password", None, Some(json!({"email": "x@company.com"}))).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
        assert_eq!(res.body["error"], "Missing required fields");
    }
}
