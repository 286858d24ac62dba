use std::sync::Arc;

use async_trait::async_trait;
use tendero_core::errors::DispatchError;
use tendero_core::outbound::{MessageSender, OutboundMessage};
use tracing::{error, warn};

/// Wraps a sender so that a failed delivery is reported once to the
/// human-agent channel.
///
/// The diagnostic goes straight to the inner sender, so a failing diagnostic
/// is only logged and can never trigger another one. Failures of messages
/// addressed to the agent itself are not mirrored.
pub struct DiagnosticSender {
    inner: Arc<dyn MessageSender>,
    agent_number: Option<String>,
}

impl DiagnosticSender {
    pub fn new(inner: Arc<dyn MessageSender>, agent_number: Option<String>) -> Self {
        Self {
            inner,
            agent_number: agent_number.filter(|number| !number.trim().is_empty()),
        }
    }

    async fn report(&self, failed: &OutboundMessage, failure: &DispatchError) {
        let Some(agent_number) = self.agent_number.as_deref() else {
            return;
        };
        if failed.recipient == agent_number {
            return;
        }

        let diagnostic = OutboundMessage::new(agent_number, diagnostic_text(failed, failure))
            .from_business_number(failed.business_number_id.clone());
        if let Err(diagnostic_error) = self.inner.send(&diagnostic).await {
            error!(
                event_name = "dispatch.diagnostic_failed",
                recipient = %failed.recipient,
                error = %diagnostic_error,
                "diagnostic for failed delivery could not be sent"
            );
        }
    }
}

fn diagnostic_text(failed: &OutboundMessage, failure: &DispatchError) -> String {
    format!(
        "⚠️ ERROR AL ENVIAR MENSAJE\n\nDestinatario: {}\nError: {failure}\n\nMensaje no entregado:\n{}",
        failed.recipient, failed.body
    )
}

#[async_trait]
impl MessageSender for DiagnosticSender {
    async fn send(&self, message: &OutboundMessage) -> Result<(), DispatchError> {
        let result = self.inner.send(message).await;
        if let Err(failure) = &result {
            warn!(
                event_name = "dispatch.diagnostic_triggered",
                recipient = %message.recipient,
                error = %failure,
                "delivery failed; mirroring to the human-agent channel"
            );
            self.report(message, failure).await;
        }
        result
    }
}
