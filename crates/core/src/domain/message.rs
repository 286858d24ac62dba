use serde::{Deserialize, Serialize};

/// Platform-neutral view of one inbound chat message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Platform message id, used for correlation and redelivery detection.
    pub message_id: String,
    pub sender: String,
    /// Business number the message was addressed to, when the platform reports it.
    pub business_number_id: Option<String>,
    pub body: MessageBody,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageBody {
    Text(String),
    Image { media_id: Option<String>, caption: Option<String> },
    Other { kind: String },
}

impl MessageBody {
    pub fn kind(&self) -> &str {
        match self {
            Self::Text(_) => "text",
            Self::Image { .. } => "image",
            Self::Other { kind } => kind,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}
