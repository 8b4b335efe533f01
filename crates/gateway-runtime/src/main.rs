//! Gateway runtime: loads configuration from the environment, registers
//! handlers, and serves until interrupted.

use anyhow::Context;
use interactions_gateway::{
    GatewayConfig, GatewayService, HandlerOutput, HandlerRegistry, Interaction, MessagePayload,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = config_from_env()?;
    let registry = build_registry();

    let mut service = GatewayService::with_default_transport(config, registry)
        .context("failed to construct gateway service")?;

    tokio::select! {
        result = service.start() => {
            result.context("gateway server failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
        }
    }

    Ok(())
}

/// Read configuration from the environment. Only the credentials are
/// mandatory; everything else has a sensible default.
fn config_from_env() -> anyhow::Result<GatewayConfig> {
    let mut config = GatewayConfig::default();

    config.discord.public_key = std::env::var("DISCORD_PUBLIC_KEY")
        .context("DISCORD_PUBLIC_KEY must be set")?;
    config.discord.application_id = std::env::var("DISCORD_APPLICATION_ID")
        .context("DISCORD_APPLICATION_ID must be set")?;

    if let Ok(api_base) = std::env::var("DISCORD_API_BASE") {
        config.discord.api_base = api_base;
    }
    if let Ok(host) = std::env::var("GATEWAY_HOST") {
        config.http.host = host.parse().context("GATEWAY_HOST is not an IP address")?;
    }
    if let Ok(port) = std::env::var("GATEWAY_PORT") {
        config.http.port = port.parse().context("GATEWAY_PORT is not a port number")?;
    }

    Ok(config)
}

/// Built-in handlers. Real deployments register their command set here.
fn build_registry() -> HandlerRegistry {
    HandlerRegistry::builder()
        .command(
            "ping",
            Arc::new(|_interaction: Interaction| async {
                Ok(HandlerOutput::Message(MessagePayload::text("pong")))
            }),
        )
        .build()
}
