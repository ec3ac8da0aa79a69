//! Outbound e-mail notifications.
//!
//! Notifications are side effects: `spawn_notification` detaches the send so a
//! mail failure is logged and never fails the request that triggered it.

use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::SmtpConfig;

pub mod templates;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), NotifyError>;
}

/// Sends mail through an authenticated STARTTLS relay.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> Result<Self, NotifyError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();
        Ok(Self {
            transport,
            from: config.from.parse()?,
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, email: Email) -> Result<(), NotifyError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(email.to.parse()?)
            .subject(email.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(email.body)?;
        self.transport.send(message).await?;
        Ok(())
    }
}

/// Used when SMTP is not configured: records the notification in the log only.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, email: Email) -> Result<(), NotifyError> {
        info!(to = %email.to, subject = %email.subject, "SMTP not configured; notification not sent");
        Ok(())
    }
}

/// Fires a notification without blocking the caller.
pub fn spawn_notification(notifier: Arc<dyn Notifier>, email: Email) {
    tokio::spawn(async move {
        let to = email.to.clone();
        if let Err(e) = notifier.send(email).await {
            warn!(to = %to, "Notification e-mail failed: {e}");
        }
    });
}


#[cfg(test)]
mod tests {
    use super::testing::MemoryNotifier;
    use super::*;

    fn sample() -> Email {
        Email {
            to: "a@b.com".to_string(),
            subject: "hi".to_string(),
            body: "hello".to_string(),
        }
    }

    #[tokio::test]
    async fn test_spawned_notification_is_delivered() {
        let notifier = Arc::new(MemoryNotifier::default());
        spawn_notification(notifier.clone(), sample());
        for _ in 0..50 {
            if !notifier.sent().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(notifier.sent(), vec![sample()]);
    }

    #[tokio::test]
    async fn test_spawned_failure_does_not_panic() {
        let notifier = Arc::new(MemoryNotifier::failing());
        spawn_notification(notifier.clone(), sample());
        tokio::task::yield_now().await;
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_log_notifier_always_succeeds() {
        assert!(LogNotifier.send(sample()).await.is_ok());
    }
}
