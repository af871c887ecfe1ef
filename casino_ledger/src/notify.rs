//! Outbound notifications.
//!
//! Delivery is fire-and-forget: a failed send is logged and never undoes the
//! ledger work that triggered it.

use crate::ledger::UserId;
use async_trait::async_trait;
use thiserror::Error;

/// Where a message goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    User(UserId),
    /// Public results feed
    Channel,
}

impl std::fmt::Display for Recipient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Recipient::User(user_id) => write!(f, "user {}", user_id),
            Recipient::Channel => write!(f, "channel"),
        }
    }
}

#[derive(Debug, Error)]
#[error("notification to {recipient} failed: {reason}")]
pub struct NotifyError {
    pub recipient: Recipient,
    pub reason: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: Recipient, message: &str) -> Result<(), NotifyError>;
}

/// Writes notifications to the log. Used when no chat transport is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, recipient: Recipient, message: &str) -> Result<(), NotifyError> {
        log::info!("[notify {}] {}", recipient, message);
        Ok(())
    }
}

/// Send and log failures.
pub async fn notify_quietly(notifier: &dyn Notifier, recipient: Recipient, message: &str) {
    if let Err(err) = notifier.send(recipient, message).await {
        log::warn!("{}", err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn send(&self, recipient: Recipient, _message: &str) -> Result<(), NotifyError> {
            Err(NotifyError {
                recipient,
                reason: "chat API down".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_notify_quietly_swallows_failures() {
        notify_quietly(&FailingNotifier, Recipient::User(7), "hello").await;
        notify_quietly(&LogNotifier, Recipient::Channel, "hello").await;
    }

    #[test]
    fn test_recipient_display() {
        assert_eq!(Recipient::User(42).to_string(), "user 42");
        assert_eq!(Recipient::Channel.to_string(), "channel");
    }
}
