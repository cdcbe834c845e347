//! Notification email over SMTP.
//!
//! Supports two modes:
//! 1. Send through the configured SMTP relay
//! 2. Disabled (no SMTP_HOST): log and skip
//!
//! Callers treat every failure as non-fatal; nothing here may roll back
//! state that has already been committed.

use std::time::Duration;

use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::authentication::Credentials,
};

use crate::config::SmtpConfig;
use crate::error::{AppError, Result};
use crate::models::{App, User};
use crate::util::format_money;

/// Retry delays in seconds (exponential backoff: 1s, 4s, 16s)
const RETRY_DELAYS: &[u64] = &[1, 4, 16];

/// Result of attempting to send an email.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailSendResult {
    Sent,
    /// SMTP is not configured
    Disabled,
}

/// Rendered message ready to send.
#[derive(Debug, Clone)]
pub struct EmailContent {
    pub subject: String,
    pub text: String,
    pub html: String,
}

pub struct EmailService {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: String,
    retry_delays: Vec<u64>,
}

impl EmailService {
    /// Build the service. Without SMTP settings every send is a logged no-op.
    pub fn new(smtp: Option<&SmtpConfig>, from: &str) -> Result<Self> {
        from.parse::<Mailbox>()
            .map_err(|e| AppError::Internal(format!("Invalid MAIL_FROM address: {}", e)))?;

        let transport = match smtp {
            Some(smtp) => Some(build_transport(smtp)?),
            None => None,
        };

        Ok(Self {
            transport,
            from: from.to_string(),
            retry_delays: RETRY_DELAYS.to_vec(),
        })
    }

    pub fn disabled() -> Self {
        Self {
            transport: None,
            from: "no-reply@appmart.local".to_string(),
            retry_delays: Vec::new(),
        }
    }

    /// Override backoff delays (seconds). Tests use zeros.
    pub fn with_retry_delays(mut self, delays: Vec<u64>) -> Self {
        self.retry_delays = delays;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    pub async fn send_welcome(&self, user: &User) -> Result<EmailSendResult> {
        self.send(&user.email, welcome_email(user)).await
    }

    pub async fn send_app_approved(&self, app: &App) -> Result<EmailSendResult> {
        self.send(&app.owner_email, app_approved_email(app)).await
    }

    pub async fn send_payment_confirmed(
        &self,
        to: &str,
        app_title: &str,
        amount_cents: i64,
        download_url: &str,
    ) -> Result<EmailSendResult> {
        self.send(to, payment_confirmed_email(app_title, amount_cents, download_url))
            .await
    }

    /// Send with exponential backoff.
    ///
    /// Permanent SMTP rejections (5xx) fail immediately; connection problems
    /// and 4xx replies are retried.
    pub async fn send(&self, to: &str, content: EmailContent) -> Result<EmailSendResult> {
        let Some(transport) = &self.transport else {
            tracing::debug!(to = %to, subject = %content.subject, "SMTP disabled, skipping email");
            return Ok(EmailSendResult::Disabled);
        };

        let message = self.build_message(to, &content)?;
        let mut last_error: Option<AppError> = None;

        for (attempt, delay_secs) in std::iter::once(&0u64).chain(&self.retry_delays).enumerate() {
            if attempt > 0 {
                tracing::warn!(attempt, delay_secs, "Retrying email send after transient failure");
                tokio::time::sleep(Duration::from_secs(*delay_secs)).await;
            }

            match transport.send(message.clone()).await {
                Ok(_) => {
                    tracing::info!(to = %to, subject = %content.subject, attempt, "Email sent");
                    return Ok(EmailSendResult::Sent);
                }
                Err(e) if e.is_permanent() => {
                    return Err(AppError::Internal(format!("SMTP rejected email: {}", e)));
                }
                Err(e) => {
                    last_error = Some(AppError::Internal(format!("SMTP error: {}", e)));
                }
            }
        }

        tracing::error!(
            to = %to,
            attempts = self.retry_delays.len() + 1,
            "Email send failed after all retries"
        );
        Err(last_error.unwrap_or_else(|| AppError::Internal("Email send failed".into())))
    }

    fn build_message(&self, to: &str, content: &EmailContent) -> Result<Message> {
        let from: Mailbox = self
            .from
            .parse()
            .map_err(|e| AppError::Internal(format!("Invalid from address: {}", e)))?;
        let to: Mailbox = to
            .parse()
            .map_err(|e| AppError::BadRequest(format!("Invalid recipient address: {}", e)))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(&content.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(content.text.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(content.html.clone()),
                    ),
            )
            .map_err(|e| AppError::Internal(format!("Failed to build email: {}", e)))
    }
}

fn build_transport(smtp: &SmtpConfig) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
    let builder = match smtp.port {
        465 => AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host),
        587 => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host),
        // Local catchers (mailhog, smtp4dev) speak plain SMTP
        _ => Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp.host)),
    }
    .map_err(|e| AppError::Internal(format!("Failed to create SMTP transport: {}", e)))?;

    let builder = builder.port(smtp.port);
    let builder = match (&smtp.username, &smtp.password) {
        (Some(user), Some(pass)) => builder.credentials(Credentials::new(user.clone(), pass.clone())),
        _ => builder,
    };

    Ok(builder.build())
}

fn wrap_html(heading: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
<h2 style="color: #333;">{}</h2>
{}
<hr style="border: none; border-top: 1px solid #eee; margin: 30px 0;">
<p style="color: #999; font-size: 12px;">AppMart</p>
</body>
</html>"#,
        heading, body
    )
}

pub fn welcome_email(user: &User) -> EmailContent {
    EmailContent {
        subject: "Welcome to AppMart".to_string(),
        text: format!(
            "Hi {},\n\nYour AppMart account is ready. You can now browse, buy and publish apps.",
            user.name
        ),
        html: wrap_html(
            "Welcome to AppMart",
            &format!(
                "<p>Hi {},</p><p>Your account is ready. You can now browse, buy and publish apps.</p>",
                user.name
            ),
        ),
    }
}

pub fn app_approved_email(app: &App) -> EmailContent {
    EmailContent {
        subject: format!("Your app \"{}\" was approved", app.title),
        text: format!(
            "Good news! \"{}\" passed review and is now listed on AppMart.",
            app.title
        ),
        html: wrap_html(
            "Your app was approved",
            &format!(
                "<p>Good news! <strong>{}</strong> passed review and is now listed on AppMart.</p>",
                app.title
            ),
        ),
    }
}

pub fn payment_confirmed_email(app_title: &str, amount_cents: i64, download_url: &str) -> EmailContent {
    let amount = format_money(amount_cents);
    EmailContent {
        subject: format!("Payment confirmed: {}", app_title),
        text: format!(
            "Thanks for your purchase of {} ({}).\n\nDownload it here:\n{}\n\nThe link works once and expires after a few days.",
            app_title, amount, download_url
        ),
        html: wrap_html(
            "Payment confirmed",
            &format!(
                "<p>Thanks for your purchase of <strong>{}</strong> ({}).</p>\
                 <p><a href=\"{}\">Download your app</a></p>\
                 <p style=\"color: #666;\">The link works once and expires after a few days.</p>",
                app_title, amount, download_url
            ),
        ),
    }
}
