use axum::{
    extract::FromRef,
    http::{header, HeaderMap, HeaderValue},
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::{config::SessionConfig, state::AppState};

/// Payload of the signed session cookie. The session itself lives in the
/// `sessions` table; the cookie only proves which row it refers to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sid: Uuid,  // session ID
    pub iat: usize, // issued at (unix timestamp)
    pub exp: usize, // expires at (unix timestamp)
    pub iss: String,
    pub aud: String,
}

/// Signing keys plus the cookie settings derived from [`SessionConfig`].
#[derive(Clone)]
pub struct SessionKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
    pub cookie_name: String,
    pub cookie_secure: bool,
}

impl From<&SessionConfig> for SessionKeys {
    fn from(cfg: &SessionConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: Duration::minutes(cfg.ttl_minutes),
            cookie_name: cfg.cookie_name.clone(),
            cookie_secure: cfg.cookie_secure,
        }
    }
}

impl FromRef<AppState> for SessionKeys {
    fn from_ref(state: &AppState) -> Self {
        SessionKeys::from(&state.config.session)
    }
}

impl SessionKeys {
    pub fn expires_at(&self, now: OffsetDateTime) -> OffsetDateTime {
        now + self.ttl
    }

    pub fn sign(&self, session_id: Uuid, now: OffsetDateTime) -> anyhow::Result<String> {
        let claims = Claims {
            sid: session_id,
            iat: now.unix_timestamp() as usize,
            exp: self.expires_at(now).unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(session_id = %session_id, "session token signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }

    /// `Set-Cookie` value carrying a freshly signed token.
    pub fn cookie(&self, token: &str) -> anyhow::Result<HeaderValue> {
        let secure = if self.cookie_secure { "; Secure" } else { "" };
        let value = format!(
            "{name}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={age}{secure}",
            name = self.cookie_name,
            age = self.ttl.whole_seconds(),
        );
        Ok(HeaderValue::from_str(&value)?)
    }

    /// `Set-Cookie` value that makes the browser drop the session cookie.
    pub fn expired_cookie(&self) -> HeaderValue {
        let secure = if self.cookie_secure { "; Secure" } else { "" };
        let value = format!(
            "{name}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0{secure}",
            name = self.cookie_name,
        );
        HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("session=; Max-Age=0"))
    }

    /// The raw token from the request's `Cookie` headers, if present.
    pub fn token_from(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.cookie_name)
            .map(|(_, value)| value.to_string())
            .filter(|value| !value.is_empty())
    }

    /// Session id from a request, provided the cookie carries a valid token.
    pub fn session_id(&self, headers: &HeaderMap) -> Option<Uuid> {
        let token = self.token_from(headers)?;
        match self.verify(&token) {
            Ok(claims) => Some(claims.sid),
            Err(e) => {
                debug!(error = %e, "rejected session token");
                None
            }
        }
    }
}
