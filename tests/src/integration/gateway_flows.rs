//! # End-to-End Gateway Flows
//!
//! Drives the full axum router with genuinely signed requests: Ed25519
//! keypair per test, signature over `timestamp || body`, real classification
//! and dispatch, and a scripted follow-up transport standing in for Discord's
//! webhook API.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use axum::Router;
    use ed25519_dalek::{Signer, SigningKey};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use interactions_gateway::ports::outbound::{
        FollowUpMethod, FollowUpRequest, TransportError, TransportReply,
    };
    use interactions_gateway::{
        FollowUpClient, FollowUpTransport, GatewayConfig, GatewayService, HandlerError,
        HandlerOutput, HandlerRegistry, Interaction, MessagePayload,
    };

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    /// Records every outbound follow-up and always answers 200.
    struct RecordingTransport {
        calls: AtomicU32,
        requests: Mutex<Vec<FollowUpRequest>>,
    }

    impl RecordingTransport {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl FollowUpTransport for RecordingTransport {
        async fn execute(
            &self,
            request: FollowUpRequest,
        ) -> Result<TransportReply, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request);
            Ok(TransportReply {
                status: 200,
                retry_after: None,
            })
        }
    }

    struct Harness {
        router: Router,
        signing_key: SigningKey,
        transport: Arc<RecordingTransport>,
        followup: Arc<FollowUpClient>,
    }

    fn harness(margin: Duration) -> Harness {
        let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);

        let mut config = GatewayConfig::default();
        config.discord.public_key = hex::encode(signing_key.verifying_key().to_bytes());
        config.discord.application_id = "9900112233".into();
        config.discord.api_base = "https://discord.test/api/v10".into();
        config.deadline.response_margin = margin;
        config.followup.initial_backoff = Duration::from_millis(1);
        config.followup.max_backoff = Duration::from_millis(2);

        let registry = HandlerRegistry::builder()
            .command(
                "ping",
                Arc::new(|_i: Interaction| async {
                    Ok(HandlerOutput::Message(MessagePayload::text("pong")))
                }),
            )
            .command(
                "report",
                Arc::new(|_i: Interaction| async {
                    tokio::time::sleep(Duration::from_millis(120)).await;
                    Ok(HandlerOutput::Message(MessagePayload::text(
                        "report generated",
                    )))
                }),
            )
            .command(
                "broken",
                Arc::new(|_i: Interaction| async {
                    Err::<HandlerOutput, _>(HandlerError::new("backend offline"))
                }),
            )
            .component_prefix(
                "confirm_ban:",
                Arc::new(|i: Interaction| async move {
                    let target = i.route_key.trim_start_matches("confirm_ban:").to_string();
                    Ok(HandlerOutput::Update(MessagePayload::text(format!(
                        "banned {target}"
                    ))))
                }),
            )
            .modal(
                "feedback_form",
                Arc::new(|_i: Interaction| async {
                    tokio::time::sleep(Duration::from_millis(120)).await;
                    Ok(HandlerOutput::Message(MessagePayload::text("thanks")))
                }),
            )
            .autocomplete(
                "report",
                Arc::new(|_i: Interaction| async {
                    Ok(HandlerOutput::Choices(vec![
                        interactions_gateway::AutocompleteChoice {
                            name: "weekly".into(),
                            value: serde_json::json!("weekly"),
                        },
                    ]))
                }),
            )
            .build();

        let transport = RecordingTransport::new();
        let transport_port: Arc<dyn FollowUpTransport> = transport.clone();
        let service = GatewayService::new(config, registry, transport_port)
            .expect("valid test config");
        let followup = service.followup();
        Harness {
            router: service.router(),
            signing_key,
            transport,
            followup,
        }
    }

    fn sign(signing_key: &SigningKey, timestamp: &str, body: &str) -> String {
        let mut message = Vec::new();
        message.extend_from_slice(timestamp.as_bytes());
        message.extend_from_slice(body.as_bytes());
        hex::encode(signing_key.sign(&message).to_bytes())
    }

    fn signed_post(signing_key: &SigningKey, body: &str) -> Request<Body> {
        let timestamp = "1700000000";
        Request::builder()
            .method("POST")
            .uri("/interactions")
            .header("content-type", "application/json")
            .header("x-signature-ed25519", sign(signing_key, timestamp, body))
            .header("x-signature-timestamp", timestamp)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(harness: &Harness, body: &str) -> Response {
        harness
            .router
            .clone()
            .oneshot(signed_post(&harness.signing_key, body))
            .await
            .unwrap()
    }

    async fn json_of(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn await_delivery(followup: &FollowUpClient, count: u64) {
        for _ in 0..200 {
            let stats = followup.stats();
            if stats.delivered + stats.failed >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("follow-up never settled");
    }

    // =========================================================================
    // HANDSHAKE
    // =========================================================================

    #[tokio::test]
    async fn test_handshake_pong() {
        let harness = harness(Duration::from_millis(500));
        let response = send(&harness, r#"{"type":1}"#).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_of(response).await, serde_json::json!({"type": 1}));
    }

    #[tokio::test]
    async fn test_handshake_is_idempotent() {
        let harness = harness(Duration::from_millis(500));
        for _ in 0..3 {
            let response = send(&harness, r#"{"type":1}"#).await;
            assert_eq!(json_of(response).await, serde_json::json!({"type": 1}));
        }
        assert_eq!(harness.transport.calls.load(Ordering::SeqCst), 0);
    }

    // =========================================================================
    // AUTHENTICATION
    // =========================================================================

    #[tokio::test]
    async fn test_foreign_key_rejected() {
        let harness = harness(Duration::from_millis(500));
        let attacker = SigningKey::generate(&mut rand::rngs::OsRng);
        let response = harness
            .router
            .clone()
            .oneshot(signed_post(&attacker, r#"{"type":1}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_signature_covers_timestamp() {
        let harness = harness(Duration::from_millis(500));
        let body = r#"{"type":1}"#;
        let signature = sign(&harness.signing_key, "1700000000", body);
        // Replay with a different timestamp header.
        let request = Request::builder()
            .method("POST")
            .uri("/interactions")
            .header("x-signature-ed25519", signature)
            .header("x-signature-timestamp", "1700009999")
            .body(Body::from(body))
            .unwrap();

        let response = harness.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_tampered_body_rejected() {
        let harness = harness(Duration::from_millis(500));
        let signed = r#"{"type":2,"id":"1","token":"t","data":{"name":"ping"}}"#;
        let tampered = r#"{"type":2,"id":"1","token":"t","data":{"name":"ban"}}"#;
        let timestamp = "1700000000";
        let request = Request::builder()
            .method("POST")
            .uri("/interactions")
            .header(
                "x-signature-ed25519",
                sign(&harness.signing_key, timestamp, signed),
            )
            .header("x-signature-timestamp", timestamp)
            .body(Body::from(tampered))
            .unwrap();

        let response = harness.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    // =========================================================================
    // DISPATCH AND DEADLINE
    // =========================================================================

    #[tokio::test]
    async fn test_fast_command_end_to_end() {
        let harness = harness(Duration::from_millis(500));
        let response = send(
            &harness,
            r#"{"type":2,"id":"i1","token":"tok-1","data":{"name":"ping"}}"#,
        )
        .await;

        let json = json_of(response).await;
        assert_eq!(json["type"], 4);
        assert_eq!(json["data"]["content"], "pong");
        assert_eq!(harness.transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_slow_command_defers_and_follows_up() {
        let harness = harness(Duration::from_millis(30));
        let response = send(
            &harness,
            r#"{"type":2,"id":"i2","token":"tok-slow","data":{"name":"report"}}"#,
        )
        .await;

        let json = json_of(response).await;
        assert_eq!(json["type"], 5, "deferred channel message ack");

        await_delivery(&harness.followup, 1).await;
        let requests = harness.transport.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, FollowUpMethod::Post);
        assert_eq!(
            requests[0].url,
            "https://discord.test/api/v10/webhooks/9900112233/tok-slow"
        );
        assert_eq!(requests[0].body["content"], "report generated");
    }

    #[tokio::test]
    async fn test_component_prefix_end_to_end() {
        let harness = harness(Duration::from_millis(500));
        let response = send(
            &harness,
            r#"{"type":3,"id":"i3","token":"tok-3","data":{"custom_id":"confirm_ban:42"}}"#,
        )
        .await;

        let json = json_of(response).await;
        assert_eq!(json["type"], 7, "immediate update message");
        assert_eq!(json["data"]["content"], "banned 42");
    }

    #[tokio::test]
    async fn test_modal_defers_with_ephemeral_ack() {
        let harness = harness(Duration::from_millis(30));
        let response = send(
            &harness,
            r#"{"type":5,"id":"i4","token":"tok-4","data":{"custom_id":"feedback_form"}}"#,
        )
        .await;

        let json = json_of(response).await;
        assert_eq!(json["type"], 5);
        assert_eq!(json["data"]["flags"], 64, "modal ack is ephemeral");

        await_delivery(&harness.followup, 1).await;
        let requests = harness.transport.requests.lock().unwrap();
        assert_eq!(requests[0].body["content"], "thanks");
    }

    #[tokio::test]
    async fn test_autocomplete_answers_choices() {
        let harness = harness(Duration::from_millis(500));
        let response = send(
            &harness,
            r#"{"type":4,"id":"i5","token":"tok-5","data":{"name":"report","options":[{"name":"period","value":"we","focused":true}]}}"#,
        )
        .await;

        let json = json_of(response).await;
        assert_eq!(json["type"], 8);
        assert_eq!(json["data"]["choices"][0]["name"], "weekly");
    }

    // =========================================================================
    // FAILURE CONTAINMENT
    // =========================================================================

    #[tokio::test]
    async fn test_handler_error_is_ephemeral_message_not_500() {
        let harness = harness(Duration::from_millis(500));
        let response = send(
            &harness,
            r#"{"type":2,"id":"i6","token":"tok-6","data":{"name":"broken"}}"#,
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_of(response).await;
        assert_eq!(json["type"], 4);
        assert_eq!(json["data"]["flags"], 64);
    }

    #[tokio::test]
    async fn test_unregistered_command_gets_fallback() {
        let harness = harness(Duration::from_millis(500));
        let response = send(
            &harness,
            r#"{"type":2,"id":"i7","token":"tok-7","data":{"name":"nonexistent"}}"#,
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_of(response).await;
        assert_eq!(json["data"]["flags"], 64);
    }

    #[tokio::test]
    async fn test_unknown_wire_type_gets_fallback() {
        let harness = harness(Duration::from_millis(500));
        let response = send(
            &harness,
            r#"{"type":999,"id":"i8","token":"tok-8"}"#,
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_of(response).await;
        assert_eq!(json["type"], 4);
        assert_eq!(json["data"]["flags"], 64);
    }

    #[tokio::test]
    async fn test_token_never_appears_in_initial_response() {
        let harness = harness(Duration::from_millis(30));
        let response = send(
            &harness,
            r#"{"type":2,"id":"i9","token":"super-secret-token","data":{"name":"report"}}"#,
        )
        .await;

        let json = json_of(response).await;
        assert!(!json.to_string().contains("super-secret-token"));
        await_delivery(&harness.followup, 1).await;
    }
}
