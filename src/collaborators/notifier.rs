use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use aws_sdk_sesv2::{
    types::{Body, Content, Destination, EmailContent, Message as SesMessage},
    Client as SesClient,
};
use log::{debug, info, warn};

use crate::error::{Error, Result};

/// Sends a message to a user.
#[rocket::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, message: &str) -> Result<()>;
}

/// Emails each notification to its recipient alone through Amazon SES.
pub struct SesNotifier {
    client: SesClient,
    from_address: String,
}

impl SesNotifier {
    pub fn new(client: SesClient, from_address: String) -> Self {
        Self {
            client,
            from_address,
        }
    }
}

fn destination(recipient: &str) -> Destination {
    Destination::builder().to_addresses(recipient).build()
}

fn email_content(subject: &str, message: &str) -> Result<EmailContent> {
    let text = |data: &str| {
        Content::builder()
            .data(data)
            .charset("UTF-8")
            .build()
            .map_err(|e| Error::DispatchFailed(e.to_string()))
    };
    let body = Body::builder().text(text(message)?).build();
    let message = SesMessage::builder()
        .subject(text(subject)?)
        .body(body)
        .build();
    Ok(EmailContent::builder().simple(message).build())
}

#[rocket::async_trait]
impl Notifier for SesNotifier {
    async fn send(&self, recipient: &str, subject: &str, message: &str) -> Result<()> {
        self.client
            .send_email()
            .from_email_address(&self.from_address)
            .destination(destination(recipient))
            .content(email_content(subject, message)?)
            .send()
            .await
            .map_err(|e| Error::DispatchFailed(e.to_string()))?;

        debug!("Emailed \"{subject}\" notification");
        Ok(())
    }
}

/// A message captured by the [`MemoryNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub recipient: String,
    pub subject: String,
    pub message: String,
}

/// Keeps every message in an outbox instead of sending it.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    outbox: Mutex<Vec<Message>>,
    failing: AtomicBool,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send fail, or succeed again.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Everything sent so far, oldest first.
    pub fn sent(&self) -> Vec<Message> {
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The most recent message sent to the given recipient.
    pub fn last_to(&self, recipient: &str) -> Option<Message> {
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .find(|message| message.recipient == recipient)
            .cloned()
    }
}

#[rocket::async_trait]
impl Notifier for MemoryNotifier {
    async fn send(&self, recipient: &str, subject: &str, message: &str) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            warn!("Dropping \"{subject}\" notification to {recipient}");
            return Err(Error::DispatchFailed("outbox is failing".to_string()));
        }
        info!("Notification to {recipient}: {subject}");
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Message {
                recipient: recipient.to_string(),
                subject: subject.to_string(),
                message: message.to_string(),
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rocket::async_test]
    async fn outbox_keeps_messages() {
        let notifier = MemoryNotifier::new();
        notifier.send("a@example.com", "One", "first").await.unwrap();
        notifier.send("b@example.com", "Two", "second").await.unwrap();
        notifier.send("a@example.com", "Three", "third").await.unwrap();

        assert_eq!(notifier.sent().len(), 3);
        assert_eq!(notifier.last_to("a@example.com").unwrap().subject, "Three");
        assert!(notifier.last_to("c@example.com").is_none());
    }

    #[test]
    fn emails_go_to_one_recipient() {
        let destination = destination("ada@example.com");
        assert_eq!(destination.to_addresses(), &["ada@example.com".to_string()]);
        assert!(destination.cc_addresses().is_empty());
        assert!(destination.bcc_addresses().is_empty());
        assert!(email_content("Subject", "Body").is_ok());
    }

    #[rocket::async_test]
    async fn failing_outbox() {
        let notifier = MemoryNotifier::new();
        notifier.set_failing(true);
        let result = notifier.send("a@example.com", "One", "first").await;
        assert!(matches!(result, Err(Error::DispatchFailed(_))));
        assert!(notifier.sent().is_empty());
    }
}
