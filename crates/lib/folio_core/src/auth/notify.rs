//! Delivery of password-reset links.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::auth::User;

/// Errors raised while delivering a reset notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Sends the plaintext reset token to the account owner.
#[async_trait]
pub trait ResetNotifier: Send + Sync {
    async fn send_password_reset(&self, user: &User, token: &str) -> Result<(), NotifyError>;
}

/// Build the link a user follows to reset their password.
pub fn reset_link(base_url: &str, token: &str) -> String {
    format!("{}/reset-password?token={token}", base_url.trim_end_matches('/'))
}

/// Development notifier: records that a link was issued. The link itself is
/// only emitted at debug level.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    base_url: String,
}

impl LogNotifier {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ResetNotifier for LogNotifier {
    async fn send_password_reset(&self, user: &User, token: &str) -> Result<(), NotifyError> {
        info!(user_id = %user.id, email = %user.email, "password reset link issued (no mailer configured)");
        debug!(link = %reset_link(&self.base_url, token), "password reset link");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResetWebhookBody<'a> {
    email: &'a str,
    name: Option<&'a str>,
    reset_url: String,
}

/// Posts reset details as JSON to an external mail relay.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    webhook_url: String,
    base_url: String,
}

impl WebhookNotifier {
    pub fn new(webhook_url: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url: webhook_url.into(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ResetNotifier for WebhookNotifier {
    async fn send_password_reset(&self, user: &User, token: &str) -> Result<(), NotifyError> {
        let body = ResetWebhookBody {
            email: &user.email,
            name: user.name.as_deref(),
            reset_url: reset_link(&self.base_url, token),
        };
        let resp = self.client.post(&self.webhook_url).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(NotifyError::Delivery(format!(
                "webhook returned {}",
                resp.status()
            )));
        }
        debug!(user_id = %user.id, "password reset webhook delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_link_joins_cleanly() {
        assert_eq!(
            reset_link("https://folio.dev/", "abc"),
            "https://folio.dev/reset-password?token=abc"
        );
        assert_eq!(
            reset_link("http://localhost:3000", "abc"),
            "http://localhost:3000/reset-password?token=abc"
        );
    }
}
