use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::DispatchError;

/// A text message to be delivered through the messaging platform.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Business number to send from; the configured default is used when absent.
    pub business_number_id: Option<String>,
    pub recipient: String,
    pub body: String,
}

impl OutboundMessage {
    pub fn new(recipient: impl Into<String>, body: impl Into<String>) -> Self {
        Self { business_number_id: None, recipient: recipient.into(), body: body.into() }
    }

    pub fn from_business_number(mut self, business_number_id: Option<String>) -> Self {
        self.business_number_id = business_number_id;
        self
    }
}

/// Outbound transport. Callers treat failures as non-fatal.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<(), DispatchError>;
}

/// Records every attempted send. Recipients listed in `failing_recipients`
/// are recorded and then rejected.
#[derive(Clone, Default)]
pub struct InMemoryMessageSender {
    sent: Arc<Mutex<Vec<OutboundMessage>>>,
    failing_recipients: Arc<Mutex<Vec<String>>>,
}

impl InMemoryMessageSender {
    pub fn fail_for(&self, recipient: impl Into<String>) {
        match self.failing_recipients.lock() {
            Ok(mut failing) => failing.push(recipient.into()),
            Err(poisoned) => poisoned.into_inner().push(recipient.into()),
        }
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn sent_to(&self, recipient: &str) -> Vec<OutboundMessage> {
        self.sent().into_iter().filter(|message| message.recipient == recipient).collect()
    }

    fn is_failing(&self, recipient: &str) -> bool {
        match self.failing_recipients.lock() {
            Ok(failing) => failing.iter().any(|entry| entry == recipient),
            Err(poisoned) => poisoned.into_inner().iter().any(|entry| entry == recipient),
        }
    }
}

#[async_trait]
impl MessageSender for InMemoryMessageSender {
    async fn send(&self, message: &OutboundMessage) -> Result<(), DispatchError> {
        match self.sent.lock() {
            Ok(mut sent) => sent.push(message.clone()),
            Err(poisoned) => poisoned.into_inner().push(message.clone()),
        }

        if self.is_failing(&message.recipient) {
            return Err(DispatchError::Rejected {
                status: 400,
                body: format!("recipient {} rejected", message.recipient),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{InMemoryMessageSender, MessageSender, OutboundMessage};
    use crate::errors::DispatchError;

    #[tokio::test]
    async fn in_memory_sender_records_and_fails_configured_recipients() {
        let sender = InMemoryMessageSender::default();
        sender.fail_for("573000000000");

        sender.send(&OutboundMessage::new("571111111111", "hola")).await.expect("delivered");
        let error = sender
            .send(&OutboundMessage::new("573000000000", "hola"))
            .await
            .expect_err("rejected");

        assert!(matches!(error, DispatchError::Rejected { status: 400, .. }));
        assert_eq!(sender.sent().len(), 2);
        assert_eq!(sender.sent_to("571111111111")[0].body, "hola");
    }
}
