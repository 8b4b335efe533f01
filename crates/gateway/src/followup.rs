//! Follow-up delivery client.
//!
//! Once the coordinator defers an interaction, the handler's eventual result
//! (or error) leaves through this client: a webhook POST for a new message or
//! a PATCH of the deferred original. Delivery retries with exponential
//! backoff, honors rate-limit hints, and gives up on hard rejections. A
//! DashMap registry tracks in-flight deferrals so the `/pending` endpoint can
//! report them, with atomic counters for lifetime totals.
//!
//! Interaction tokens appear only inside the webhook URL, which is never
//! logged; log lines identify work by interaction id.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::domain::config::{DiscordConfig, FollowUpConfig};
use crate::domain::error::{DeliveryError, HandlerError};
use crate::domain::interaction::{Interaction, InteractionKind, InteractionToken};
use crate::domain::response::{HandlerOutput, MessagePayload};
use crate::ports::outbound::{FollowUpMethod, FollowUpRequest, FollowUpTransport};

/// Statuses retrying cannot fix.
const NON_RETRYABLE: [u16; 4] = [400, 401, 403, 404];

/// User-facing text sent when a deferred handler fails.
const HANDLER_FAILURE_TEXT: &str =
    "Something went wrong while processing this interaction. Please try again.";

/// One deferred interaction awaiting its follow-up.
#[derive(Debug, Clone)]
struct PendingEntry {
    kind: InteractionKind,
    deferred_at: Instant,
}

/// Counters exposed by the `/pending` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct FollowUpStats {
    /// Deferrals currently awaiting delivery.
    pub pending: usize,
    /// Total interactions ever deferred.
    pub deferred: u64,
    /// Follow-ups delivered successfully.
    pub delivered: u64,
    /// Follow-ups that failed terminally.
    pub failed: u64,
}

/// Delivers deferred results to Discord's webhook endpoints.
pub struct FollowUpClient {
    transport: Arc<dyn FollowUpTransport>,
    config: FollowUpConfig,
    api_base: String,
    application_id: String,
    pending: DashMap<String, PendingEntry>,
    deferred_total: AtomicU64,
    delivered_total: AtomicU64,
    failed_total: AtomicU64,
}

impl FollowUpClient {
    /// Build a client for the given application credentials and retry policy.
    pub fn new(
        discord: &DiscordConfig,
        config: FollowUpConfig,
        transport: Arc<dyn FollowUpTransport>,
    ) -> Self {
        Self {
            transport,
            config,
            api_base: discord.api_base().trim_end_matches('/').to_string(),
            application_id: discord.application_id.clone(),
            pending: DashMap::new(),
            deferred_total: AtomicU64::new(0),
            delivered_total: AtomicU64::new(0),
            failed_total: AtomicU64::new(0),
        }
    }

    /// Record a deferral. Called by the coordinator the moment it commits to
    /// the deferred ack, before the handler finishes.
    pub fn register_deferred(&self, interaction: &Interaction) {
        self.deferred_total.fetch_add(1, Ordering::Relaxed);
        self.pending.insert(
            interaction.id.clone(),
            PendingEntry {
                kind: interaction.kind,
                deferred_at: Instant::now(),
            },
        );
    }

    /// Deliver the terminal result of a deferred interaction.
    ///
    /// Maps a successful output to its wire form, a handler error to a
    /// user-facing ephemeral message, and drives the retry loop. The pending
    /// entry is removed whatever the outcome.
    pub async fn resolve(
        &self,
        interaction_id: &str,
        kind: InteractionKind,
        token: &InteractionToken,
        received_at: Instant,
        outcome: Result<HandlerOutput, HandlerError>,
    ) -> Result<(), DeliveryError> {
        let request = match &outcome {
            Ok(output) => self.request_for_output(token, output),
            Err(err) => {
                error!(
                    interaction_id,
                    kind = kind.label(),
                    error = %err,
                    "deferred handler failed, sending error follow-up"
                );
                self.post_webhook(token, &MessagePayload::ephemeral_text(HANDLER_FAILURE_TEXT))
            }
        };

        let result = self.deliver(&request, received_at).await;
        self.pending.remove(interaction_id);

        match &result {
            Ok(()) => {
                self.delivered_total.fetch_add(1, Ordering::Relaxed);
                info!(
                    interaction_id,
                    kind = kind.label(),
                    elapsed_ms = received_at.elapsed().as_millis() as u64,
                    "follow-up delivered"
                );
            }
            Err(err) => {
                self.failed_total.fetch_add(1, Ordering::Relaxed);
                error!(
                    interaction_id,
                    kind = kind.label(),
                    error = %err,
                    "follow-up delivery failed"
                );
            }
        }
        result
    }

    /// Execute one delivery with retries.
    ///
    /// Exponential backoff from `initial_backoff`, doubling to `max_backoff`;
    /// a rate-limit hint overrides the computed delay for that round. Hard
    /// rejections (400/401/403/404) end the loop immediately, and no attempt
    /// starts once `delivery_window` has elapsed since interaction receipt.
    pub async fn deliver(
        &self,
        request: &FollowUpRequest,
        received_at: Instant,
    ) -> Result<(), DeliveryError> {
        let mut backoff = self.config.initial_backoff;
        let mut attempt = 0u32;

        loop {
            let elapsed = received_at.elapsed();
            if elapsed >= self.config.delivery_window {
                return Err(DeliveryError::WindowElapsed(elapsed));
            }
            attempt += 1;

            let outcome = self.transport.execute(request.clone()).await;
            let mut retry_after = None;
            match &outcome {
                Ok(reply) if reply.is_success() => return Ok(()),
                Ok(reply) if NON_RETRYABLE.contains(&reply.status) => {
                    return Err(DeliveryError::NonRetryable {
                        status: reply.status,
                    });
                }
                Ok(reply) => {
                    retry_after = reply.retry_after;
                    warn!(
                        status = reply.status,
                        attempt, "retryable response from Discord"
                    );
                }
                Err(err) => {
                    warn!(attempt, error = %err, "transport failure on follow-up attempt");
                }
            }

            if attempt >= self.config.max_attempts {
                return Err(match outcome {
                    Err(err) => DeliveryError::Transport(err.0),
                    Ok(_) => DeliveryError::AttemptsExhausted { attempts: attempt },
                });
            }

            tokio::time::sleep(retry_after.unwrap_or(backoff)).await;
            backoff = (backoff * 2).min(self.config.max_backoff);
        }
    }

    /// Deferrals currently awaiting delivery.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Snapshot of lifetime counters plus the live pending count.
    pub fn stats(&self) -> FollowUpStats {
        FollowUpStats {
            pending: self.pending.len(),
            deferred: self.deferred_total.load(Ordering::Relaxed),
            delivered: self.delivered_total.load(Ordering::Relaxed),
            failed: self.failed_total.load(Ordering::Relaxed),
        }
    }

    /// Age of the oldest pending deferral, for diagnostics.
    pub fn oldest_pending_age(&self) -> Option<std::time::Duration> {
        self.pending
            .iter()
            .map(|entry| entry.deferred_at.elapsed())
            .max()
    }

    fn request_for_output(
        &self,
        token: &InteractionToken,
        output: &HandlerOutput,
    ) -> FollowUpRequest {
        match output {
            // New message after a deferred "thinking" ack.
            HandlerOutput::Message(payload) => self.post_webhook(token, payload),
            // Edit of the original after a deferred update ack.
            HandlerOutput::Update(payload) => FollowUpRequest {
                method: FollowUpMethod::Patch,
                url: self.original_url(token),
                body: serde_json::to_value(payload).unwrap_or_default(),
            },
            // Autocomplete never defers; the coordinator discards late
            // results before they reach this client.
            HandlerOutput::Choices(_) => {
                self.post_webhook(token, &MessagePayload::ephemeral_text(HANDLER_FAILURE_TEXT))
            }
        }
    }

    fn post_webhook(&self, token: &InteractionToken, payload: &MessagePayload) -> FollowUpRequest {
        FollowUpRequest {
            method: FollowUpMethod::Post,
            url: self.webhook_url(token),
            body: serde_json::to_value(payload).unwrap_or_default(),
        }
    }

    fn webhook_url(&self, token: &InteractionToken) -> String {
        format!(
            "{}/webhooks/{}/{}",
            self.api_base,
            self.application_id,
            token.expose()
        )
    }

    fn original_url(&self, token: &InteractionToken) -> String {
        format!("{}/messages/@original", self.webhook_url(token))
    }
}
