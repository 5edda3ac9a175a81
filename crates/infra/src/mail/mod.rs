//! Outbound mail transport.

pub mod smtp;

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;

pub use smtp::SmtpMailer;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MailError {
    #[error("invalid mail configuration: {0}")]
    Config(String),

    #[error("invalid email address: {0}")]
    Address(String),

    #[error("mail delivery failed: {0}")]
    Send(String),
}

/// A rendered message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError>;
}

/// Mailer that keeps messages in memory.
///
/// Used for local development without an SMTP relay and by tests, which can
/// inspect what was sent and make the next N deliveries fail.
#[derive(Debug, Default)]
pub struct InMemoryOutbox {
    sent: Mutex<Vec<OutgoingMail>>,
    failures_remaining: AtomicUsize,
}

impl InMemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` calls to `send` fail.
    pub fn fail_next(&self, n: usize) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn last_to(&self, to: &str) -> Option<OutgoingMail> {
        self.sent().into_iter().rev().find(|m| m.to == to)
    }
}

#[async_trait::async_trait]
impl Mailer for InMemoryOutbox {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        let failing = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(MailError::Send("simulated delivery failure".to_string()));
        }

        tracing::debug!(to = %mail.to, subject = %mail.subject, "mail captured in outbox");
        self.sent
            .lock()
            .map_err(|_| MailError::Send("outbox lock poisoned".to_string()))?
            .push(mail);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail(to: &str) -> OutgoingMail {
        OutgoingMail {
            to: to.to_string(),
            subject: "Hi".to_string(),
            html: "<p>hi</p>".to_string(),
        }
    }

    #[tokio::test]
    async fn outbox_records_messages() {
        let outbox = InMemoryOutbox::new();
        outbox.send(mail("a@example.com")).await.unwrap();
        outbox.send(mail("b@example.com")).await.unwrap();
        assert_eq!(outbox.sent().len(), 2);
        assert_eq!(outbox.last_to("b@example.com").unwrap().to, "b@example.com");
        assert!(outbox.last_to("c@example.com").is_none());
    }

    #[tokio::test]
    async fn fail_next_fails_exactly_n_times() {
        let outbox = InMemoryOutbox::new();
        outbox.fail_next(2);
        assert!(outbox.send(mail("a@example.com")).await.is_err());
        assert!(outbox.send(mail("a@example.com")).await.is_err());
        assert!(outbox.send(mail("a@example.com")).await.is_ok());
        assert_eq!(outbox.sent().len(), 1);
    }
}
