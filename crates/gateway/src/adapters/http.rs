//! Reqwest-backed follow-up transport.
//!
//! Thin by intent: one HTTP call in, one status plus optional rate-limit hint
//! out. All retry policy lives in the follow-up client. Error text is
//! stripped of URLs before it leaves this module, since follow-up URLs embed
//! the interaction token.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::domain::error::GatewayError;
use crate::ports::outbound::{FollowUpMethod, FollowUpRequest, FollowUpTransport, TransportError, TransportReply};

/// Production follow-up transport over a shared `reqwest::Client`.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport with the configured per-request timeout.
    pub fn new(request_timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|err| GatewayError::Internal(format!("http client: {err}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FollowUpTransport for ReqwestTransport {
    async fn execute(&self, request: FollowUpRequest) -> Result<TransportReply, TransportError> {
        let builder = match request.method {
            FollowUpMethod::Post => self.client.post(&request.url),
            FollowUpMethod::Patch => self.client.patch(&request.url),
        };

        let response = builder
            .json(&request.body)
            .send()
            .await
            .map_err(|err| TransportError(err.without_url().to_string()))?;

        let status = response.status();
        let mut retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_retry_after);

        // Discord's 429 body carries a fractional `retry_after` in seconds
        // that is more precise than the header.
        if status == StatusCode::TOO_MANY_REQUESTS {
            if let Ok(body) = response.json::<serde_json::Value>().await {
                if let Some(secs) = body.get("retry_after").and_then(serde_json::Value::as_f64) {
                    if secs.is_finite() && secs >= 0.0 {
                        retry_after = Some(Duration::from_secs_f64(secs));
                    }
                }
            }
        }

        Ok(TransportReply {
            status: status.as_u16(),
            retry_after,
        })
    }
}

fn parse_retry_after(value: &str) -> Option<Duration> {
    let secs: f64 = value.trim().parse().ok()?;
    if secs.is_finite() && secs >= 0.0 {
        Some(Duration::from_secs_f64(secs))
    } else {
        None
    }
}
