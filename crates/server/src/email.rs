//! Outbound email delivery via SMTP.

use lettre::{
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::SmtpConfig;
use crate::db::ChangeRequestKind;

#[derive(Clone)]
pub struct Mailer {
    config: SmtpConfig,
    frontend_url: String,
}

impl Mailer {
    pub fn new(config: SmtpConfig, frontend_url: String) -> Self {
        Self {
            config,
            frontend_url,
        }
    }

    /// Email delivery is best-effort: failures are logged, the request
    /// that triggered the mail still succeeds.
    async fn deliver(&self, to: &str, subject: &str, html: String) {
        if !self.config.enabled {
            tracing::warn!("SMTP not configured, skipping '{}' mail to {}", subject, to);
            return;
        }

        if let Err(e) = self.send(to, subject, html).await {
            tracing::error!("Failed to send '{}' mail to {}: {}", subject, to, e);
        } else {
            tracing::info!("Sent '{}' mail to {}", subject, to);
        }
    }

    async fn send(
        &self,
        to: &str,
        subject: &str,
        html: String,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let email = Message::builder()
            .from(format!("{} <{}>", self.config.from_name, self.config.from_email).parse()?)
            .to(to.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html)?;

        let creds = Credentials::new(self.config.username.clone(), self.config.password.clone());

        let mailer: AsyncSmtpTransport<Tokio1Executor> =
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.host)?
                .credentials(creds)
                .port(self.config.port)
                .build();

        mailer.send(email).await?;
        Ok(())
    }

    pub async fn send_verification_email(&self, to: &str, token: &str) {
        let verification_url = format!("{}/verify-email/{}", self.frontend_url, token);
        let html = format!(
            r#"<h1>Verify Your Email</h1>
<p>Please click the link below to verify your email address:</p>
<a href="{url}">{url}</a>
<p>This link will expire in 24 hours.</p>"#,
            url = verification_url
        );
        self.deliver(to, "Verify Your Email", html).await;
    }

    pub async fn send_change_confirmation_email(
        &self,
        to: &str,
        token: &str,
        kind: ChangeRequestKind,
    ) {
        let what = match kind {
            ChangeRequestKind::Email => "email address",
            ChangeRequestKind::Password => "password",
        };
        let confirm_url = format!("{}/confirm-change/{}", self.frontend_url, token);
        let html = format!(
            r#"<h1>Confirm Your Change</h1>
<p>You requested to change your {what}. Click the link below to confirm:</p>
<a href="{url}">{url}</a>
<p>This link will expire in 24 hours.</p>
<p>If you didn't request this, you can safely ignore this email.</p>"#,
            what = what,
            url = confirm_url
        );
        self.deliver(to, "EstateFlow - Confirm Your Change", html).await;
    }

    pub async fn send_password_reset_email(&self, to: &str, token: &str) {
        let reset_url = format!("{}/reset-password?token={}", self.frontend_url, token);
        let html = format!(
            r#"<h1>Password Reset</h1>
<p>You requested a password reset for your EstateFlow account.</p>
<p>Click the link below to reset your password:</p>
<a href="{url}">{url}</a>
<p>This link will expire in 24 hours.</p>
<p>If you didn't request this, you can safely ignore this email.</p>"#,
            url = reset_url
        );
        self.deliver(to, "EstateFlow - Password Reset Request", html)
            .await;
    }

    pub async fn send_subscription_success_email(
        &self,
        to: &str,
        order_id: &str,
        plan_name: &str,
    ) {
        let html = format!(
            r#"<h1>Subscription Activated</h1>
<p>Your payment was received and your <b>{plan}</b> subscription is now active.</p>
<p>Order reference: {order}</p>
<p>Thank you for choosing EstateFlow!</p>"#,
            plan = plan_name,
            order = order_id
        );
        self.deliver(to, "EstateFlow - Subscription Activated", html)
            .await;
    }
}
