//! HTTP endpoint front.
//!
//! Owns the axum server, wires the verifier, classifier, router, and deadline
//! coordinator into the `POST /interactions` pipeline, and exposes `/health`
//! and `/pending` for operators.
//!
//! Status code contract: 401 for anything that fails authentication, 400 for
//! verified-but-malformed payloads, and 200 for everything after
//! classification. Discord shows the invoking user a hard "application did
//! not respond" failure on any non-200 once the interaction is real, so
//! handler errors and routing misses answer 200 with user-facing content.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tokio::sync::oneshot;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::adapters::ReqwestTransport;
use crate::deadline::DeadlineCoordinator;
use crate::domain::config::GatewayConfig;
use crate::domain::error::GatewayError;
use crate::domain::interaction::{classify, InteractionKind};
use crate::domain::response::InteractionResponse;
use crate::domain::signature::{SignatureCheck, SignatureVerifier};
use crate::followup::FollowUpClient;
use crate::ports::outbound::FollowUpTransport;
use crate::router::HandlerRegistry;

/// Signature header names, as sent by Discord.
const SIGNATURE_HEADER: &str = "x-signature-ed25519";
const TIMESTAMP_HEADER: &str = "x-signature-timestamp";

/// Fallback text for interactions the gateway cannot dispatch.
const UNROUTED_TEXT: &str = "This interaction is not currently available.";

/// Interaction gateway service.
pub struct GatewayService {
    config: GatewayConfig,
    state: AppState,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl GatewayService {
    /// Create a service with an explicit follow-up transport (tests inject
    /// mocks here).
    pub fn new(
        config: GatewayConfig,
        registry: HandlerRegistry,
        transport: Arc<dyn FollowUpTransport>,
    ) -> Result<Self, GatewayError> {
        config.validate()?;

        let verifier = SignatureVerifier::from_hex(&config.discord.public_key)?;
        let followup = Arc::new(FollowUpClient::new(
            &config.discord,
            config.followup.clone(),
            transport,
        ));
        let coordinator = Arc::new(DeadlineCoordinator::new(
            config.deadline.response_margin,
            Arc::clone(&followup),
        ));

        let registry = Arc::new(registry);
        info!(handlers = registry.len(), "handler registry frozen");

        Ok(Self {
            config,
            state: AppState {
                verifier: Arc::new(verifier),
                registry,
                coordinator,
                followup,
            },
            shutdown_tx: None,
        })
    }

    /// Create a service with the production reqwest transport.
    pub fn with_default_transport(
        config: GatewayConfig,
        registry: HandlerRegistry,
    ) -> Result<Self, GatewayError> {
        let transport = ReqwestTransport::new(config.followup.request_timeout)?;
        Self::new(config, registry, Arc::new(transport))
    }

    /// Follow-up client handle, for external health reporting.
    pub fn followup(&self) -> Arc<FollowUpClient> {
        Arc::clone(&self.state.followup)
    }

    /// Build the axum router. Public so tests can drive it without a socket.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/interactions", post(handle_interaction))
            .route("/health", get(health_check))
            .route("/pending", get(pending_stats))
            .layer(RequestBodyLimitLayer::new(self.config.limits.max_body_bytes))
            .layer(discord_cors_layer())
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Bind and serve until shutdown is requested or the server fails.
    pub async fn start(&mut self) -> Result<(), GatewayError> {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        self.shutdown_tx = Some(shutdown_tx);

        let addr = self.config.http_addr();
        let router = self.router();

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::Bind(format!("{addr}: {e}")))?;
        info!(addr = %addr, "interaction gateway listening");

        let server = tokio::spawn(async move { axum::serve(listener, router).await });

        tokio::select! {
            _ = &mut shutdown_rx => {
                info!("received shutdown signal");
            }
            result = server => {
                match result {
                    Ok(Err(e)) => error!(error = %e, "server error"),
                    Err(e) => error!(error = %e, "server task failed"),
                    Ok(Ok(())) => {}
                }
            }
        }

        info!("interaction gateway stopped");
        Ok(())
    }

    /// Trigger graceful shutdown.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Shared per-request state.
#[derive(Clone)]
struct AppState {
    verifier: Arc<SignatureVerifier>,
    registry: Arc<HandlerRegistry>,
    coordinator: Arc<DeadlineCoordinator>,
    followup: Arc<FollowUpClient>,
}

/// CORS for browser-originated preflights from Discord's activity surfaces.
/// Server-to-server interaction posts are unaffected.
fn discord_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("https://discord.com"),
            HeaderValue::from_static("https://ptb.discord.com"),
            HeaderValue::from_static("https://canary.discord.com"),
        ])
        .allow_methods([Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

async fn handle_interaction(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // Anchor the response budget before any parsing or crypto.
    let received_at = Instant::now();

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    let timestamp = headers
        .get(TIMESTAMP_HEADER)
        .and_then(|v| v.to_str().ok());
    let (signature, timestamp) = match (signature, timestamp) {
        (Some(signature), Some(timestamp)) => (signature, timestamp),
        _ => {
            warn!("interaction request missing signature headers");
            return (StatusCode::UNAUTHORIZED, "missing signature headers").into_response();
        }
    };

    match state.verifier.verify(timestamp, &body, signature) {
        SignatureCheck::Valid => {}
        SignatureCheck::Invalid => {
            warn!("interaction request signature did not verify");
            return (StatusCode::UNAUTHORIZED, "invalid request signature").into_response();
        }
        SignatureCheck::MalformedInput => {
            warn!("interaction request signature header malformed");
            return (StatusCode::UNAUTHORIZED, "invalid request signature").into_response();
        }
    }

    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "verified request body is not valid JSON");
            return (StatusCode::BAD_REQUEST, "malformed JSON body").into_response();
        }
    };

    let interaction = match classify(&payload, received_at) {
        Ok(interaction) => interaction,
        Err(err) => {
            warn!(error = %err, "verified payload failed classification");
            return (StatusCode::BAD_REQUEST, err.to_string()).into_response();
        }
    };

    // Handshake: answer on the fastest path, no routing, no deadline race.
    if interaction.kind == InteractionKind::Ping {
        debug!("answering endpoint-validation handshake");
        return (StatusCode::OK, Json(InteractionResponse::pong())).into_response();
    }

    if let InteractionKind::Unknown(raw) = interaction.kind {
        warn!(wire_type = raw, "unknown interaction type, answering fallback");
        return (
            StatusCode::OK,
            Json(InteractionResponse::ephemeral_text(UNROUTED_TEXT)),
        )
            .into_response();
    }

    let handler = match state.registry.route(&interaction) {
        Ok(handler) => handler,
        Err(err) => {
            // Likely a stale command registration on the Discord side.
            warn!(error = %err, "no handler for interaction, answering fallback");
            let response = match interaction.kind {
                InteractionKind::Autocomplete => InteractionResponse::choices(&[]),
                _ => InteractionResponse::ephemeral_text(UNROUTED_TEXT),
            };
            return (StatusCode::OK, Json(response)).into_response();
        }
    };

    let response = state.coordinator.run(interaction, handler).await;
    (StatusCode::OK, Json(response)).into_response()
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "interactions-gateway",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn pending_stats(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.followup.stats();
    Json(serde_json::json!({
        "pending": stats.pending,
        "oldest_pending_ms": state
            .followup
            .oldest_pending_age()
            .map(|age| age.as_millis() as u64),
        "totals": {
            "deferred": stats.deferred,
            "delivered": stats.delivered,
            "failed": stats.failed,
        }
    }))
}
