use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;
use time::{macros::format_description, UtcOffset};

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub cookie_name: String,
    pub cookie_secure: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub email: String,
    pub password: String,
}

/// First admin account, created only when the users table is empty.
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapAdmin {
    pub username: String,
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub session: SessionConfig,
    pub otp_ttl_minutes: i64,
    pub smtp: Option<SmtpConfig>,
    pub upload_limit_bytes: usize,
    pub static_dir: Option<PathBuf>,
    pub bootstrap_admin: Option<BootstrapAdmin>,
    /// Offset whose calendar day counts as "today" for expiry checks.
    pub utc_offset: UtcOffset,
}

fn var_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// `+05:30`, `-04:00`, `Z`.
fn parse_utc_offset(raw: &str) -> anyhow::Result<UtcOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return Ok(UtcOffset::UTC);
    }
    UtcOffset::parse(raw, format_description!("[offset_hour sign:mandatory]:[offset_minute]"))
        .with_context(|| format!("invalid APP_UTC_OFFSET '{raw}'"))
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let session = SessionConfig {
            secret: std::env::var("SESSION_SECRET").context("SESSION_SECRET is not set")?,
            issuer: std::env::var("SESSION_ISSUER").unwrap_or_else(|_| "contractor-dashboard".into()),
            audience: std::env::var("SESSION_AUDIENCE")
                .unwrap_or_else(|_| "contractor-dashboard-web".into()),
            ttl_minutes: var_or("SESSION_TTL_MINUTES", 24 * 60),
            cookie_name: std::env::var("SESSION_COOKIE_NAME")
                .unwrap_or_else(|_| "dashboard_session".into()),
            cookie_secure: var_or("SESSION_COOKIE_SECURE", false),
        };

        let smtp = match (non_empty("SMTP_SERVER"), non_empty("SMTP_EMAIL"), non_empty("SMTP_PASSWORD")) {
            (Some(server), Some(email), Some(password)) => Some(SmtpConfig {
                server,
                port: var_or("SMTP_PORT", 587),
                email,
                password,
            }),
            _ => None,
        };

        let bootstrap_admin = match (
            non_empty("BOOTSTRAP_ADMIN_USERNAME"),
            non_empty("BOOTSTRAP_ADMIN_EMAIL"),
            non_empty("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Some(username), Some(email), Some(password)) => Some(BootstrapAdmin {
                name: non_empty("BOOTSTRAP_ADMIN_NAME").unwrap_or_else(|| username.clone()),
                username,
                email,
                password,
            }),
            _ => None,
        };

        let utc_offset = match non_empty("APP_UTC_OFFSET") {
            Some(raw) => parse_utc_offset(&raw)?,
            None => UtcOffset::UTC,
        };

        Ok(Self {
            database_url,
            database_max_connections: var_or("DATABASE_MAX_CONNECTIONS", 10),
            session,
            otp_ttl_minutes: var_or("OTP_TTL_MINUTES", 5),
            smtp,
            upload_limit_bytes: var_or("UPLOAD_LIMIT_BYTES", 20 * 1024 * 1024),
            static_dir: non_empty("STATIC_DIR").map(PathBuf::from),
            bootstrap_admin,
            utc_offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::offset;

    #[test]
    fn utc_offsets() {
        assert_eq!(parse_utc_offset("+05:30").unwrap(), offset!(+5:30));
        assert_eq!(parse_utc_offset("-04:00").unwrap(), offset!(-4));
        assert_eq!(parse_utc_offset(" Z ").unwrap(), UtcOffset::UTC);
        assert!(parse_utc_offset("IST").is_err());
        assert!(parse_utc_offset("5:30").is_err());
    }
}
