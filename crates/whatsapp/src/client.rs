use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tendero_core::config::WhatsAppConfig;
use tendero_core::errors::{ConfigurationMissing, DispatchError};
use tendero_core::outbound::{MessageSender, OutboundMessage};
use tracing::debug;

/// Outbound text messages through the WhatsApp Cloud API
/// (`POST {api_base_url}/{phone_number_id}/messages`).
pub struct CloudApiSender {
    client: Client,
    api_base_url: String,
    access_token: Option<SecretString>,
    default_phone_number_id: Option<String>,
}

impl CloudApiSender {
    pub fn new(
        api_base_url: impl Into<String>,
        access_token: Option<SecretString>,
        default_phone_number_id: Option<String>,
        timeout: Duration,
    ) -> Self {
        let client = Client::builder().timeout(timeout).build().unwrap_or_default();
        Self {
            client,
            api_base_url: api_base_url.into().trim_end_matches('/').to_owned(),
            access_token,
            default_phone_number_id: default_phone_number_id
                .filter(|phone_number_id| !phone_number_id.trim().is_empty()),
        }
    }

    pub fn from_config(config: &WhatsAppConfig) -> Self {
        Self::new(
            config.api_base_url.clone(),
            config.access_token.clone(),
            config.phone_number_id.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// True when both the access token and a sending number are configured.
    pub fn is_ready(&self) -> bool {
        self.access_token.is_some() && self.default_phone_number_id.is_some()
    }

    fn endpoint(&self, phone_number_id: &str) -> String {
        format!("{}/{phone_number_id}/messages", self.api_base_url)
    }
}

#[derive(Serialize)]
struct SendTextRequest<'a> {
    messaging_product: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    text: TextBody<'a>,
}

#[derive(Serialize)]
struct TextBody<'a> {
    body: &'a str,
}

fn text_request(message: &OutboundMessage) -> SendTextRequest<'_> {
    SendTextRequest {
        messaging_product: "whatsapp",
        to: &message.recipient,
        kind: "text",
        text: TextBody { body: &message.body },
    }
}

#[async_trait]
impl MessageSender for CloudApiSender {
    async fn send(&self, message: &OutboundMessage) -> Result<(), DispatchError> {
        let access_token =
            self.access_token.as_ref().ok_or(ConfigurationMissing::new("whatsapp.access_token"))?;
        // The number the inbound message reached takes precedence over the configured one.
        let phone_number_id = message
            .business_number_id
            .as_deref()
            .or(self.default_phone_number_id.as_deref())
            .ok_or(ConfigurationMissing::new("whatsapp.phone_number_id"))?;

        let response = self
            .client
            .post(self.endpoint(phone_number_id))
            .bearer_auth(access_token.expose_secret())
            .json(&text_request(message))
            .send()
            .await
            .map_err(|error| DispatchError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Rejected { status: status.as_u16(), body });
        }

        debug!(
            event_name = "dispatch.sent",
            recipient = %message.recipient,
            phone_number_id,
            "outbound message accepted by the platform"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use secrecy::SecretString;
    use tendero_core::errors::DispatchError;
    use tendero_core::outbound::{MessageSender, OutboundMessage};

    use super::{text_request, CloudApiSender};

    #[test]
    fn request_body_matches_the_cloud_api_shape() {
        let message = OutboundMessage::new("573001112233", "¡Hola!");
        let json = serde_json::to_value(text_request(&message)).expect("serialize");

        assert_eq!(
            json,
            serde_json::json!({
                "messaging_product": "whatsapp",
                "to": "573001112233",
                "type": "text",
                "text": {"body": "¡Hola!"}
            })
        );
    }

    #[test]
    fn endpoint_uses_the_sending_number() {
        let sender = CloudApiSender::new(
            "https://graph.facebook.com/v20.0/",
            None,
            None,
            Duration::from_secs(5),
        );
        assert_eq!(sender.endpoint("1099"), "https://graph.facebook.com/v20.0/1099/messages");
        assert!(!sender.is_ready());
    }

    #[tokio::test]
    async fn missing_token_is_a_configuration_error() {
        let sender = CloudApiSender::new(
            "https://graph.facebook.com/v20.0",
            None,
            Some("1099".to_owned()),
            Duration::from_secs(5),
        );

        let error =
            sender.send(&OutboundMessage::new("57300", "hola")).await.expect_err("no token");
        assert!(matches!(
            error,
            DispatchError::ConfigurationMissing(missing) if missing.what == "whatsapp.access_token"
        ));
    }

    #[tokio::test]
    async fn missing_sending_number_is_a_configuration_error() {
        let sender = CloudApiSender::new(
            "https://graph.facebook.com/v20.0",
            Some(SecretString::from("token")),
            Some("  ".to_owned()),
            Duration::from_secs(5),
        );

        let error =
            sender.send(&OutboundMessage::new("57300", "hola")).await.expect_err("no number");
        assert!(matches!(
            error,
            DispatchError::ConfigurationMissing(missing) if missing.what == "whatsapp.phone_number_id"
        ));
    }
}
