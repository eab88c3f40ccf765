use serde::{Deserialize, Serialize};

use super::repo_types::{Role, Theme, User};

/// Request body for login. `username` may also hold an email address.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: Option<String>,
    pub otp: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ThemeRequest {
    pub theme: Option<String>,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct SessionUser {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub role: Role,
    pub email: String,
    pub theme: Theme,
}

impl From<&User> for SessionUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            username: u.username.clone(),
            name: u.name.clone(),
            role: u.role,
            email: u.email.clone(),
            theme: u.theme_preference,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub message: &'static str,
    pub user: SessionUser,
}

#[derive(Debug, Serialize)]
pub struct AuthStatus {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<SessionUser>,
}

#[derive(Debug, Serialize)]
pub struct Ack {
    pub success: bool,
    pub message: &'static str,
}

impl Ack {
    pub fn ok(message: &'static str) -> Self {
        Self { success: true, message }
    }
}

#[derive(Debug, Serialize)]
pub struct ThemeResponse {
    pub success: bool,
    pub theme: Theme,
}
