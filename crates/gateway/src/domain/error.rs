//! Gateway error taxonomy.
//!
//! Components return typed error values across boundaries; nothing propagates
//! as a panic out of a request task. The endpoint front maps each family to an
//! HTTP outcome: authentication failures to 401, malformed payloads to 400,
//! and everything else to a 200 with user-facing error content, since Discord
//! treats non-200 responses to a classified interaction as a hard failure with
//! no user feedback.

use std::time::Duration;

use thiserror::Error;

/// Configuration errors, surfaced at startup before any request is served.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Application public key missing or not a valid Ed25519 key.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
    /// Application id missing or empty.
    #[error("invalid application id: {0}")]
    InvalidApplicationId(String),
    /// Invalid size or count limit.
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    /// Invalid timeout or margin value.
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    /// General configuration error.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors from classifying a verified JSON payload into an [`Interaction`].
///
/// All variants are terminal: the endpoint front answers 400 and never
/// attempts dispatch.
///
/// [`Interaction`]: crate::domain::interaction::Interaction
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassificationError {
    /// Payload is not a JSON object or lacks an integer `type` field.
    #[error("payload missing integer `type` field")]
    MissingType,
    /// Non-handshake payload lacks `id` or `token`.
    #[error("payload missing `{0}` field")]
    MissingCredential(&'static str),
    /// Payload kind routes by `data.name`/`data.custom_id` but has neither.
    #[error("payload missing routing key `{0}`")]
    MissingRoutingKey(&'static str),
}

/// Errors from the dispatch router.
#[derive(Debug, Clone, Error)]
pub enum RouteError {
    /// No handler registered for this kind/key pair. Likely stale command
    /// registration on the Discord side; answered with a safe fallback, not
    /// an HTTP error.
    #[error("no handler registered for {kind} `{key}`")]
    NotFound {
        /// Human-readable interaction kind.
        kind: &'static str,
        /// Routing key that missed.
        key: String,
    },
}

/// Business-logic failure inside a registered handler.
///
/// Converted to user-facing error content (immediate or follow-up), never an
/// HTTP 5xx.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct HandlerError {
    /// Operator-facing description; logged at error level.
    pub message: String,
}

impl HandlerError {
    /// Create a handler error from any displayable cause.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Terminal failure delivering a follow-up message.
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    /// Discord rejected the request in a way retrying cannot fix
    /// (400/401/403/404).
    #[error("non-retryable response from Discord: HTTP {status}")]
    NonRetryable {
        /// HTTP status returned by Discord.
        status: u16,
    },
    /// Retry budget exhausted without a successful delivery.
    #[error("gave up after {attempts} delivery attempts")]
    AttemptsExhausted {
        /// Attempts actually made.
        attempts: u32,
    },
    /// The ~15 minute follow-up window elapsed; delivery is moot.
    #[error("follow-up window elapsed after {0:?}")]
    WindowElapsed(Duration),
    /// Transport-level failure (connect, TLS, timeout) on the final attempt.
    #[error("transport error: {0}")]
    Transport(String),
}

impl DeliveryError {
    /// Whether this terminal error came from exhausting the retry policy
    /// rather than a hard rejection.
    pub fn is_exhaustion(&self) -> bool {
        matches!(
            self,
            DeliveryError::AttemptsExhausted { .. } | DeliveryError::WindowElapsed(_)
        )
    }
}

/// Service-level errors (not per-interaction).
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// Server socket bind error.
    #[error("server bind error: {0}")]
    Bind(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}
