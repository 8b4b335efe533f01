//! Inbound port: the handler interface the surrounding framework implements.

use async_trait::async_trait;

use crate::domain::error::HandlerError;
use crate::domain::interaction::Interaction;
use crate::domain::response::HandlerOutput;

/// A registered interaction handler.
///
/// The gateway hands the handler a normalized [`Interaction`] and receives an
/// output (or error) back; the framework's own object model never crosses
/// this boundary. Handlers may take arbitrarily long; the deadline
/// coordinator decides whether the result travels in the initial HTTP
/// response or in a follow-up. A handler that outlives the response cutoff
/// keeps running unattended, so implementations must be safe to run to
/// completion with nobody waiting.
#[async_trait]
pub trait InteractionHandler: Send + Sync {
    /// Process one interaction.
    async fn handle(&self, interaction: Interaction) -> Result<HandlerOutput, HandlerError>;
}

impl std::fmt::Debug for dyn InteractionHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("InteractionHandler")
    }
}

#[async_trait]
impl<F, Fut> InteractionHandler for F
where
    F: Fn(Interaction) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<HandlerOutput, HandlerError>> + Send,
{
    async fn handle(&self, interaction: Interaction) -> Result<HandlerOutput, HandlerError> {
        self(interaction).await
    }
}
