//! WhatsApp Cloud API integration
//!
//! - **Webhook** (`webhook`) - change-notification model and the subscription handshake
//! - **Outbound** (`client`) - text messages through `/{phone_number_id}/messages`
//! - **Diagnostics** (`diagnostics`) - one-level failure report to the human-agent channel
//!
//! # Architecture
//!
//! ```text
//! POST /webhook → WebhookNotification → InboundMessage → AgentRuntime
//!                                                            ↓
//!                      CloudApiSender ← DiagnosticSender ← OutboundMessage
//! ```

pub mod client;
pub mod diagnostics;
pub mod webhook;

pub use client::CloudApiSender;
pub use diagnostics::DiagnosticSender;
pub use webhook::{
    verify_subscription, Verification, VerificationQuery, WebhookError, WebhookNotification,
    EVENT_RECEIVED,
};
