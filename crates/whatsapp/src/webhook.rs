use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tendero_core::domain::message::{InboundMessage, MessageBody};
use thiserror::Error;

/// `POST /webhook` acknowledgement body expected by the platform.
pub const EVENT_RECEIVED: &str = "EVENT_RECEIVED";

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("malformed webhook payload: {0}")]
    Malformed(String),
}

/// Cloud API change notification. Only the fields the router reads are modeled;
/// everything else in the payload is ignored.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct WebhookNotification {
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct WebhookChange {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub value: ChangeValue,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub metadata: Option<ChangeMetadata>,
    #[serde(default)]
    pub messages: Vec<CloudMessage>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChangeMetadata {
    #[serde(default)]
    pub phone_number_id: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CloudMessage {
    pub id: String,
    pub from: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<TextContent>,
    #[serde(default)]
    pub image: Option<ImageContent>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TextContent {
    #[serde(default)]
    pub body: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ImageContent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
}

impl WebhookNotification {
    pub fn parse(raw: &[u8]) -> Result<Self, WebhookError> {
        serde_json::from_slice(raw).map_err(|error| WebhookError::Malformed(error.to_string()))
    }

    /// The first message of the first change, if any. Status callbacks
    /// (delivered/read receipts) carry no messages and yield `None`.
    pub fn first_message(&self) -> Option<InboundMessage> {
        let value = &self.entry.first()?.changes.first()?.value;
        let message = value.messages.first()?;
        let business_number_id =
            value.metadata.as_ref().and_then(|metadata| metadata.phone_number_id.clone());

        Some(InboundMessage {
            message_id: message.id.clone(),
            sender: message.from.clone(),
            business_number_id,
            body: message.body(),
        })
    }
}

impl CloudMessage {
    fn body(&self) -> MessageBody {
        match (self.kind.as_str(), &self.text, &self.image) {
            ("text", Some(text), _) => MessageBody::Text(text.body.clone()),
            ("text", None, _) => MessageBody::Text(String::new()),
            ("image", _, image) => MessageBody::Image {
                media_id: image.as_ref().and_then(|image| image.id.clone()),
                caption: image.as_ref().and_then(|image| image.caption.clone()),
            },
            (other, _, _) => MessageBody::Other { kind: other.to_owned() },
        }
    }
}

/// Query parameters of the `GET /webhook` subscription handshake.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct VerificationQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verification {
    /// Echo the challenge with 200.
    Accepted { challenge: String },
    /// Token or mode mismatch (403).
    Rejected,
    /// Required parameters absent (400).
    Incomplete,
}

pub fn verify_subscription(query: &VerificationQuery, expected: &SecretString) -> Verification {
    let (Some(mode), Some(token)) = (query.mode.as_deref(), query.verify_token.as_deref()) else {
        return Verification::Incomplete;
    };

    if mode == "subscribe" && token == expected.expose_secret() {
        Verification::Accepted { challenge: query.challenge.clone().unwrap_or_default() }
    } else {
        Verification::Rejected
    }
}
