//! # Follow-up Delivery Under Hostile Transports
//!
//! Runs deferred interactions through the whole service while the transport
//! misbehaves: flapping 5xx, rate limiting, and hard rejections. Verifies the
//! retry policy is bounded and the gateway's counters tell the truth.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use axum::Router;
    use ed25519_dalek::{Signer, SigningKey};
    use tower::ServiceExt;

    use interactions_gateway::ports::outbound::{
        FollowUpRequest, TransportError, TransportReply,
    };
    use interactions_gateway::{
        FollowUpClient, FollowUpTransport, GatewayConfig, GatewayService, HandlerOutput,
        HandlerRegistry, Interaction, MessagePayload,
    };

    /// Fails `failures` times, then succeeds.
    struct FlakyTransport {
        calls: AtomicU32,
        failures: u32,
        status_while_failing: u16,
    }

    #[async_trait]
    impl FollowUpTransport for FlakyTransport {
        async fn execute(
            &self,
            _request: FollowUpRequest,
        ) -> Result<TransportReply, TransportError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Ok(TransportReply {
                    status: self.status_while_failing,
                    retry_after: if self.status_while_failing == 429 {
                        Some(Duration::from_millis(1))
                    } else {
                        None
                    },
                })
            } else {
                Ok(TransportReply {
                    status: 200,
                    retry_after: None,
                })
            }
        }
    }

    fn service_with(
        transport: Arc<dyn FollowUpTransport>,
    ) -> (Router, SigningKey, Arc<FollowUpClient>) {
        let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);

        let mut config = GatewayConfig::default();
        config.discord.public_key = hex::encode(signing_key.verifying_key().to_bytes());
        config.discord.application_id = "app".into();
        config.discord.api_base = "https://discord.test/api/v10".into();
        config.deadline.response_margin = Duration::from_millis(20);
        config.followup.max_attempts = 4;
        config.followup.initial_backoff = Duration::from_millis(1);
        config.followup.max_backoff = Duration::from_millis(2);

        let registry = HandlerRegistry::builder()
            .command(
                "slow",
                Arc::new(|_i: Interaction| async {
                    tokio::time::sleep(Duration::from_millis(60)).await;
                    Ok(HandlerOutput::Message(MessagePayload::text("late")))
                }),
            )
            .build();

        let service = GatewayService::new(config, registry, transport).expect("valid test config");
        let followup = service.followup();
        (service.router(), signing_key, followup)
    }

    fn signed_slow_command(signing_key: &SigningKey, id: &str) -> Request<Body> {
        let body = format!(
            r#"{{"type":2,"id":"{id}","token":"tok-{id}","data":{{"name":"slow"}}}}"#
        );
        let timestamp = "1700000000";
        let mut message = Vec::new();
        message.extend_from_slice(timestamp.as_bytes());
        message.extend_from_slice(body.as_bytes());
        let signature = hex::encode(signing_key.sign(&message).to_bytes());

        Request::builder()
            .method("POST")
            .uri("/interactions")
            .header("content-type", "application/json")
            .header("x-signature-ed25519", signature)
            .header("x-signature-timestamp", timestamp)
            .body(Body::from(body))
            .unwrap()
    }

    async fn settle(followup: &FollowUpClient, terminal: u64) {
        for _ in 0..400 {
            let stats = followup.stats();
            if stats.delivered + stats.failed >= terminal {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("delivery never settled");
    }

    #[tokio::test]
    async fn test_transient_5xx_is_retried_to_success() {
        let transport = Arc::new(FlakyTransport {
            calls: AtomicU32::new(0),
            failures: 2,
            status_while_failing: 500,
        });
        let (router, signing_key, followup) = service_with(transport.clone());

        router
            .oneshot(signed_slow_command(&signing_key, "a1"))
            .await
            .unwrap();
        settle(&followup, 1).await;

        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
        let stats = followup.stats();
        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.pending, 0);
    }

    #[tokio::test]
    async fn test_persistent_5xx_is_bounded_by_max_attempts() {
        let transport = Arc::new(FlakyTransport {
            calls: AtomicU32::new(0),
            failures: u32::MAX,
            status_while_failing: 503,
        });
        let (router, signing_key, followup) = service_with(transport.clone());

        router
            .oneshot(signed_slow_command(&signing_key, "b1"))
            .await
            .unwrap();
        settle(&followup, 1).await;

        assert_eq!(transport.calls.load(Ordering::SeqCst), 4, "max_attempts");
        let stats = followup.stats();
        assert_eq!(stats.delivered, 0);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.pending, 0, "no pending entry leaks after failure");
    }

    #[tokio::test]
    async fn test_rate_limited_delivery_recovers() {
        let transport = Arc::new(FlakyTransport {
            calls: AtomicU32::new(0),
            failures: 1,
            status_while_failing: 429,
        });
        let (router, signing_key, followup) = service_with(transport.clone());

        router
            .oneshot(signed_slow_command(&signing_key, "c1"))
            .await
            .unwrap();
        settle(&followup, 1).await;

        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
        assert_eq!(followup.stats().delivered, 1);
    }

    #[tokio::test]
    async fn test_hard_rejection_never_retries() {
        let transport = Arc::new(FlakyTransport {
            calls: AtomicU32::new(0),
            failures: u32::MAX,
            status_while_failing: 404,
        });
        let (router, signing_key, followup) = service_with(transport.clone());

        router
            .oneshot(signed_slow_command(&signing_key, "d1"))
            .await
            .unwrap();
        settle(&followup, 1).await;

        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert_eq!(followup.stats().failed, 1);
    }

    #[tokio::test]
    async fn test_concurrent_deferrals_all_settle() {
        let transport = Arc::new(FlakyTransport {
            calls: AtomicU32::new(0),
            failures: 0,
            status_while_failing: 500,
        });
        let (router, signing_key, followup) = service_with(transport.clone());

        let mut handles = Vec::new();
        for n in 0..8 {
            let router = router.clone();
            let request = signed_slow_command(&signing_key, &format!("e{n}"));
            handles.push(tokio::spawn(
                async move { router.oneshot(request).await },
            ));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        settle(&followup, 8).await;

        let stats = followup.stats();
        assert_eq!(stats.deferred, 8);
        assert_eq!(stats.delivered, 8);
        assert_eq!(stats.pending, 0);
    }
}
