//! Outbound port: transport used by the follow-up delivery client.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

/// HTTP method for a follow-up call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUpMethod {
    /// New follow-up message (`POST /webhooks/{app}/{token}`).
    Post,
    /// Edit of the deferred original (`PATCH .../messages/@original`).
    Patch,
}

/// One outbound delivery call. The URL embeds the interaction token, so this
/// type deliberately has no `Debug`-visible URL field beyond what the
/// transport needs.
#[derive(Clone)]
pub struct FollowUpRequest {
    /// HTTP method.
    pub method: FollowUpMethod,
    /// Full URL including the interaction token.
    pub url: String,
    /// JSON body.
    pub body: Value,
}

impl std::fmt::Debug for FollowUpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FollowUpRequest")
            .field("method", &self.method)
            .field("url", &"[redacted]")
            .finish_non_exhaustive()
    }
}

/// Transport-level reply: enough to drive the retry policy, nothing more.
#[derive(Debug, Clone)]
pub struct TransportReply {
    /// HTTP status code.
    pub status: u16,
    /// Rate-limit hint from a `Retry-After` header or `retry_after` body
    /// field, if Discord provided one.
    pub retry_after: Option<Duration>,
}

impl TransportReply {
    /// 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Connection-level failure (DNS, TLS, timeout). Always retryable.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Executes follow-up HTTP calls.
///
/// Production uses the reqwest adapter; tests substitute a scripted mock.
#[async_trait]
pub trait FollowUpTransport: Send + Sync {
    /// Execute one HTTP call. Returns a reply even for non-2xx statuses;
    /// `Err` is reserved for transport failures where no status exists.
    async fn execute(&self, request: FollowUpRequest) -> Result<TransportReply, TransportError>;
}
