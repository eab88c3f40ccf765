//! Out-of-band delivery of password reset codes.

use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{info, warn};

use crate::config::SmtpConfig;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_otp(&self, to: &str, code: &str, valid_minutes: i64) -> anyhow::Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(cfg: &SmtpConfig) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.server)
            .with_context(|| format!("smtp relay {}", cfg.server))?
            .port(cfg.port)
            .credentials(Credentials::new(cfg.email.clone(), cfg.password.clone()))
            .build();
        let from = cfg
            .email
            .parse()
            .with_context(|| format!("SMTP_EMAIL '{}' is not a mailbox", cfg.email))?;
        Ok(Self { transport, from })
    }
}

fn otp_body(code: &str, valid_minutes: i64) -> String {
    format!(
        r#"<html>
    <body>
        <h2>Password Reset Request</h2>
        <p>Your OTP for password reset is:</p>
        <h1 style="color: #7b2cbf; letter-spacing: 5px;">{code}</h1>
        <p>This OTP is valid for {valid_minutes} minutes.</p>
        <p>If you did not request this, please ignore this email.</p>
    </body>
</html>"#
    )
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_otp(&self, to: &str, code: &str, valid_minutes: i64) -> anyhow::Result<()> {
        let to: Mailbox = to.parse().with_context(|| format!("invalid recipient '{to}'"))?;
        let mail = Message::builder()
            .from(self.from.clone())
            .to(to.clone())
            .subject("Password Reset OTP - Reminder Dashboard")
            .header(ContentType::TEXT_HTML)
            .body(otp_body(code, valid_minutes))
            .context("build otp mail")?;
        self.transport.send(mail).await.context("smtp send")?;
        info!(to = %to.email, "otp mail sent");
        Ok(())
    }
}

/// Used when SMTP settings are absent; every delivery fails.
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send_otp(&self, to: &str, _code: &str, _valid_minutes: i64) -> anyhow::Result<()> {
        warn!(to, "SMTP configuration missing; otp not delivered");
        anyhow::bail!("SMTP configuration missing")
    }
}

/// Captures codes instead of sending them.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: std::sync::Mutex<Vec<(String, String)>>,
}

#[cfg(test)]
impl RecordingMailer {
    pub fn last_code_for(&self, email: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, code)| code.clone())
    }
}

#[cfg(test)]
#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_otp(&self, to: &str, code: &str, _valid_minutes: i64) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push((to.to_string(), code.to_string()));
        Ok(())
    }
}
