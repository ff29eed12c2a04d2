// ABOUTME: Outgoing email for verification links and community invitations
// ABOUTME: Delivers through the Resend HTTP API, or logs the message when no key is configured
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cpoint_core::errors::{AppError, AppResult};
use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::MailConfig;

const RESEND_API_URL: &str = "https://api.resend.com/emails";
const RESEND_TIMEOUT: Duration = Duration::from_secs(10);

/// A rendered email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    /// Recipient address
    pub to: String,
    /// Subject line
    pub subject: String,
    /// HTML body
    pub html: String,
    /// Plain text body
    pub text: String,
}

/// Email delivery backend
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Deliver one email
    async fn send(&self, email: &OutgoingEmail) -> AppResult<()>;
}

/// Delivery through the Resend API
pub struct ResendMailer {
    client: Client,
    api_key: String,
    from: String,
}

#[derive(Serialize)]
struct ResendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

impl ResendMailer {
    /// Create a Resend mailer
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn new(api_key: String, from: String) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(RESEND_TIMEOUT)
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key,
            from,
        })
    }
}

#[async_trait]
impl EmailSender for ResendMailer {
    async fn send(&self, email: &OutgoingEmail) -> AppResult<()> {
        let body = ResendRequest {
            from: &self.from,
            to: [email.to.as_str()],
            subject: &email.subject,
            html: &email.html,
            text: &email.text,
        };
        let response = self
            .client
            .post(RESEND_API_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to reach Resend");
                AppError::external_service("resend", e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(%status, "Resend rejected email: {detail}");
            return Err(AppError::external_service(
                "resend",
                format!("HTTP {status}"),
            ));
        }
        info!(to = %email.to, subject = %email.subject, "Email sent");
        Ok(())
    }
}

/// Logs emails instead of sending them
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl EmailSender for LogMailer {
    async fn send(&self, email: &OutgoingEmail) -> AppResult<()> {
        info!(
            to = %email.to,
            subject = %email.subject,
            "Email delivery disabled; message body follows:\n{}",
            email.text
        );
        Ok(())
    }
}

/// Pick the backend from configuration
///
/// # Errors
///
/// Returns an error if the Resend client cannot be built
pub fn mailer_from_config(config: &MailConfig) -> AppResult<Arc<dyn EmailSender>> {
    match &config.resend_api_key {
        Some(key) => Ok(Arc::new(ResendMailer::new(
            key.clone(),
            config.from_email.clone(),
        )?)),
        None => {
            warn!("RESEND_API_KEY not set; emails will be logged instead of sent");
            Ok(Arc::new(LogMailer))
        }
    }
}

/// Email verification message
#[must_use]
pub fn verification_email(to: &str, first_name: &str, link: &str) -> OutgoingEmail {
    OutgoingEmail {
        to: to.to_owned(),
        subject: "Verify your C-Point email".to_owned(),
        html: format!(
            "<p>Hi {first_name},</p>\
             <p>Confirm your email address to finish creating your C-Point account:</p>\
             <p><a href=\"{link}\">Verify email</a></p>\
             <p>The link expires in 24 hours.</p>"
        ),
        text: format!(
            "Hi {first_name},\n\nConfirm your email address to finish creating your C-Point account:\n{link}\n\nThe link expires in 24 hours."
        ),
    }
}

/// Community invitation message
#[must_use]
pub fn invitation_email(to: &str, community_name: &str, inviter: &str, link: &str) -> OutgoingEmail {
    OutgoingEmail {
        to: to.to_owned(),
        subject: format!("You're invited to join {community_name} on C-Point"),
        html: format!(
            "<p>{inviter} invited you to join <strong>{community_name}</strong> on C-Point.</p>\
             <p><a href=\"{link}\">Accept invitation</a></p>"
        ),
        text: format!("{inviter} invited you to join {community_name} on C-Point.\n{link}"),
    }
}

/// Send, logging failures instead of returning them
pub async fn send_best_effort(mailer: &dyn EmailSender, email: &OutgoingEmail) {
    if let Err(e) = mailer.send(email).await {
        warn!(to = %email.to, "Email delivery failed: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_email_contains_link() {
        let email = verification_email("a@b.co", "Ada", "http://x/verify?token=t");
        assert_eq!(email.to, "a@b.co");
        assert!(email.html.contains("http://x/verify?token=t"));
        assert!(email.text.contains("Ada"));
    }

    #[tokio::test]
    async fn test_log_mailer_succeeds() {
        let email = invitation_email("a@b.co", "Gym", "coach", "http://x");
        assert!(LogMailer.send(&email).await.is_ok());
    }
}
