use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use tendero_whatsapp::{
    verify_subscription, Verification, VerificationQuery, WebhookNotification, EVENT_RECEIVED,
};
use tracing::{info, warn};

use crate::routes::AppState;

pub async fn verify(
    State(state): State<AppState>,
    Query(query): Query<VerificationQuery>,
) -> (StatusCode, String) {
    match verify_subscription(&query, &state.verify_token) {
        Verification::Accepted { challenge } => {
            info!(event_name = "ingress.webhook.verified", "webhook subscription verified");
            (StatusCode::OK, challenge)
        }
        Verification::Rejected => {
            warn!(
                event_name = "ingress.webhook.verification_rejected",
                mode = query.mode.as_deref().unwrap_or_default(),
                "webhook verification token mismatch"
            );
            (StatusCode::FORBIDDEN, String::new())
        }
        Verification::Incomplete => (StatusCode::BAD_REQUEST, String::new()),
    }
}

/// Always acknowledges with 200 so the platform does not redeliver. The turn
/// runs on its own task; its outcome never reaches the HTTP response.
pub async fn receive(State(state): State<AppState>, body: Bytes) -> (StatusCode, &'static str) {
    let notification = match WebhookNotification::parse(&body) {
        Ok(notification) => notification,
        Err(error) => {
            warn!(
                event_name = "ingress.webhook.malformed",
                error = %error,
                bytes = body.len(),
                "ignoring malformed webhook payload"
            );
            return (StatusCode::OK, EVENT_RECEIVED);
        }
    };

    let Some(message) = notification.first_message() else {
        return (StatusCode::OK, EVENT_RECEIVED);
    };

    info!(
        event_name = "ingress.webhook.message_received",
        correlation_id = %message.message_id,
        user_id = %message.sender,
        message_kind = message.body.kind(),
        "inbound message accepted"
    );

    let runtime = state.runtime.clone();
    tokio::spawn(async move {
        runtime.handle_message(message).await;
    });

    (StatusCode::OK, EVENT_RECEIVED)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tendero_core::catalog::StaticCatalogFeed;
    use tendero_core::outbound::InMemoryMessageSender;
    use tower::ServiceExt;

    use crate::routes::{router, test_support};

    fn app(sender: InMemoryMessageSender) -> axum::Router {
        router(test_support::state(Box::new(StaticCatalogFeed::new(Vec::new())), sender, None))
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), 64 * 1024).await.expect("body");
        String::from_utf8(bytes.to_vec()).expect("utf8")
    }

    #[tokio::test]
    async fn verification_echoes_challenge() {
        let response = app(InMemoryMessageSender::default())
            .oneshot(
                Request::get(
                    "/webhook?hub.mode=subscribe&hub.verify_token=asoferru-token&hub.challenge=1158201444",
                )
                .body(Body::empty())
                .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "1158201444");
    }

    #[tokio::test]
    async fn verification_rejects_wrong_token_and_missing_params() {
        let forbidden = app(InMemoryMessageSender::default())
            .oneshot(
                Request::get("/webhook?hub.mode=subscribe&hub.verify_token=nope&hub.challenge=1")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

        let incomplete = app(InMemoryMessageSender::default())
            .oneshot(Request::get("/webhook").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(incomplete.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_payload_is_still_acknowledged() {
        let response = app(InMemoryMessageSender::default())
            .oneshot(Request::post("/webhook").body(Body::from("{oops")).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "EVENT_RECEIVED");
    }

    #[tokio::test]
    async fn inbound_text_is_acknowledged_and_answered_with_the_menu() {
        let sender = InMemoryMessageSender::default();
        let payload = r#"{"entry":[{"changes":[{"value":{
            "metadata":{"phone_number_id":"1099"},
            "messages":[{"from":"573001112233","id":"wamid.1","type":"text","text":{"body":"hola"}}]
        }}]}]}"#;

        let response = app(sender.clone())
            .oneshot(Request::post("/webhook").body(Body::from(payload)).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "EVENT_RECEIVED");

        let mut sent = Vec::new();
        for _ in 0..100 {
            sent = sender.sent();
            if !sent.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, "573001112233");
        assert_eq!(sent[0].business_number_id.as_deref(), Some("1099"));
        assert!(sent[0].body.contains("1. Asesor de productos"));
    }
}
