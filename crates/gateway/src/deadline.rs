//! Deadline coordination for the 3-second initial response.
//!
//! Every routed interaction follows the same state machine:
//!
//! ```text
//! Started -> RespondedImmediately
//!         -> Deferred -> FollowUpSent
//!                     -> FollowUpFailed
//! ```
//!
//! The handler runs as a spawned task racing a timer anchored at the
//! interaction's receipt time plus a configured margin. If the handler wins,
//! its output becomes the initial HTTP response. If the timer wins, the
//! coordinator answers with the kind-appropriate deferred ack and the task
//! keeps running; its eventual result (success, error, or panic) is handed to
//! the follow-up client. The select is biased toward the timer so a tie at
//! the cutoff defers rather than gambling on serialization headroom.
//!
//! Autocomplete has no deferred form on the wire: a late autocomplete answers
//! with an empty choice list and the handler's result is discarded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::domain::error::HandlerError;
use crate::domain::interaction::{Interaction, InteractionKind};
use crate::domain::response::InteractionResponse;
use crate::followup::FollowUpClient;
use crate::ports::InteractionHandler;

/// Single-assignment slot for the initial response.
///
/// The select below already yields exactly one branch, but the at-most-once
/// guarantee is load-bearing enough to enforce structurally: the slot's swap
/// makes a second assignment impossible rather than merely unlikely.
#[derive(Debug, Default)]
pub struct ResponseSlot {
    taken: AtomicBool,
}

impl ResponseSlot {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot. Returns `true` exactly once across all callers.
    pub fn claim(&self) -> bool {
        !self.taken.swap(true, Ordering::AcqRel)
    }
}

/// Races handlers against the response cutoff and owns the deferral handoff.
pub struct DeadlineCoordinator {
    response_margin: Duration,
    followup: Arc<FollowUpClient>,
}

impl DeadlineCoordinator {
    /// Build a coordinator with the configured margin (must be below the
    /// 3-second deadline; validated at startup).
    pub fn new(response_margin: Duration, followup: Arc<FollowUpClient>) -> Self {
        Self {
            response_margin,
            followup,
        }
    }

    /// Run one interaction through a handler and produce its initial
    /// response. Always returns a response; handler failures become
    /// user-facing content, never an HTTP error.
    pub async fn run(
        &self,
        interaction: Interaction,
        handler: Arc<dyn InteractionHandler>,
    ) -> InteractionResponse {
        let cutoff = tokio::time::Instant::from_std(interaction.received_at + self.response_margin);
        let slot = ResponseSlot::new();

        let mut task = tokio::spawn({
            let interaction = interaction.clone();
            async move { handler.handle(interaction).await }
        });

        tokio::select! {
            biased;

            _ = tokio::time::sleep_until(cutoff) => {
                debug_assert!(slot.claim());
                self.defer(interaction, task)
            }

            joined = &mut task => {
                debug_assert!(slot.claim());
                self.respond_immediately(&interaction, joined)
            }
        }
    }

    fn respond_immediately(
        &self,
        interaction: &Interaction,
        joined: Result<Result<crate::domain::response::HandlerOutput, HandlerError>, tokio::task::JoinError>,
    ) -> InteractionResponse {
        match joined {
            Ok(Ok(output)) => {
                debug!(
                    interaction_id = %interaction.id,
                    kind = interaction.kind.label(),
                    elapsed_ms = interaction.received_at.elapsed().as_millis() as u64,
                    "handler completed before cutoff"
                );
                InteractionResponse::from_output(&output)
            }
            Ok(Err(err)) => {
                error!(
                    interaction_id = %interaction.id,
                    kind = interaction.kind.label(),
                    error = %err,
                    "handler failed before cutoff"
                );
                self.immediate_failure(interaction.kind)
            }
            Err(join_err) => {
                error!(
                    interaction_id = %interaction.id,
                    kind = interaction.kind.label(),
                    error = %join_err,
                    "handler task panicked before cutoff"
                );
                self.immediate_failure(interaction.kind)
            }
        }
    }

    /// A pre-cutoff failure still answers with a valid callback for the kind.
    fn immediate_failure(&self, kind: InteractionKind) -> InteractionResponse {
        match kind {
            InteractionKind::Autocomplete => InteractionResponse::choices(&[]),
            _ => InteractionResponse::ephemeral_text(
                "Something went wrong while processing this interaction. Please try again.",
            ),
        }
    }

    fn defer(
        &self,
        interaction: Interaction,
        task: tokio::task::JoinHandle<Result<crate::domain::response::HandlerOutput, HandlerError>>,
    ) -> InteractionResponse {
        let ack = InteractionResponse::deferred_for(interaction.kind);

        // Autocomplete cannot be acknowledged late; drop the result once the
        // task settles so a panic still gets logged.
        if interaction.kind == InteractionKind::Autocomplete {
            warn!(
                interaction_id = %interaction.id,
                route_key = %interaction.route_key,
                "autocomplete handler missed cutoff, returning empty choices"
            );
            tokio::spawn(async move {
                if let Err(join_err) = task.await {
                    error!(
                        interaction_id = %interaction.id,
                        error = %join_err,
                        "late autocomplete handler panicked"
                    );
                }
            });
            return ack;
        }

        info!(
            interaction_id = %interaction.id,
            kind = interaction.kind.label(),
            route_key = %interaction.route_key,
            "handler missed cutoff, deferring"
        );
        self.followup.register_deferred(&interaction);

        let followup = Arc::clone(&self.followup);
        tokio::spawn(async move {
            let outcome = match task.await {
                Ok(result) => result,
                Err(join_err) => Err(HandlerError::new(format!(
                    "handler task panicked: {join_err}"
                ))),
            };
            // resolve() logs terminal failures itself.
            let _ = followup
                .resolve(
                    &interaction.id,
                    interaction.kind,
                    &interaction.token,
                    interaction.received_at,
                    outcome,
                )
                .await;
        });

        ack
    }
}
