use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::auth::repo_types::{Role, Theme, User};

/// User as shown on the admin screen; never carries the password.
#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub theme: Theme,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for UserView {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            name: u.name,
            role: u.role,
            theme: u.theme_preference,
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AdminAck {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserView>,
}

impl AdminAck {
    pub fn done(message: &'static str) -> Self {
        Self {
            success: Some(true),
            message,
            user: None,
        }
    }
}
