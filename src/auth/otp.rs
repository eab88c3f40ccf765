//! One-time codes for password reset.
//!
//! A code is six random digits, mailed in the clear and stored only as an
//! Argon2 hash. A reset row is consumed at most once and only before it
//! expires.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::{rngs::OsRng, Rng};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::{error, info, warn};

use crate::{
    db::{Store, StoreError},
    mail::Mailer,
};

#[derive(Debug, Error)]
pub enum OtpError {
    #[error("Invalid or expired OTP")]
    InvalidOrExpired,

    #[error("New password cannot be the same as the old password")]
    PasswordReuse,

    #[error("otp delivery failed: {0}")]
    Delivery(anyhow::Error),

    #[error("otp hashing failed: {0}")]
    Hash(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub fn generate_code() -> String {
    format!("{:06}", OsRng.gen_range(0..1_000_000u32))
}

pub fn hash_code(code: &str) -> Result<String, OtpError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(code.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            OtpError::Hash(e.to_string())
        })
}

/// A malformed stored hash simply never matches.
pub fn code_matches(code: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default().verify_password(code.as_bytes(), &parsed).is_ok(),
        Err(e) => {
            warn!(error = %e, "unparseable otp hash");
            false
        }
    }
}

pub struct OtpService<'a> {
    store: &'a dyn Store,
    mailer: &'a dyn Mailer,
    ttl: Duration,
}

impl<'a> OtpService<'a> {
    pub fn new(store: &'a dyn Store, mailer: &'a dyn Mailer, ttl_minutes: i64) -> Self {
        Self {
            store,
            mailer,
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    /// Issues and mails a code when `email` belongs to a user. Unknown
    /// addresses succeed without side effects.
    pub async fn request(&self, email: &str, now: OffsetDateTime) -> Result<(), OtpError> {
        if self.store.find_user_by_email(email).await?.is_none() {
            info!(email, "password reset requested for unknown email");
            return Ok(());
        }

        let code = generate_code();
        let hash = hash_code(&code)?;
        self.store.insert_reset(email, &hash, now, now + self.ttl).await?;

        self.mailer
            .send_otp(email, &code, self.ttl.whole_minutes())
            .await
            .map_err(OtpError::Delivery)?;
        info!(email, "password reset code issued");
        Ok(())
    }

    /// Consumes a matching code and sets `new_password`.
    pub async fn verify(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
        now: OffsetDateTime,
    ) -> Result<(), OtpError> {
        let resets = self.store.active_resets(email, now).await?;
        let reset = resets
            .into_iter()
            .filter(|r| !r.used && r.expires_at > now)
            .find(|r| code_matches(code, &r.otp_hash))
            .ok_or(OtpError::InvalidOrExpired)?;

        if let Some(user) = self.store.find_user_by_email(email).await? {
            if user.password == new_password {
                warn!(email, "password reset rejected: reuse of current password");
                return Err(OtpError::PasswordReuse);
            }
        }

        if !self.store.complete_reset(reset.id, &reset.email, new_password).await? {
            warn!(email, reset_id = reset.id, "reset row consumed concurrently");
            return Err(OtpError::InvalidOrExpired);
        }
        info!(email, reset_id = reset.id, issued_at = %reset.created_at, "password reset completed");
        Ok(())
    }
}
