//! HTTP interaction gateway for Discord applications.
//!
//! Receives Discord's outbound interaction webhooks, verifies their Ed25519
//! signatures, classifies and dispatches them to registered handlers, and
//! guarantees a response inside Discord's 3-second window by deferring slow
//! handlers and delivering their results as follow-ups.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    INTERACTION GATEWAY                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │  POST /interactions                                          │
//! │        │                                                     │
//! │  ┌─────┴──────────┐   body limit → signature → classify      │
//! │  │ Endpoint Front │   401 / 400 before any dispatch          │
//! │  └─────┬──────────┘                                          │
//! │        │                                                     │
//! │  ┌─────┴──────────┐   exact + longest-prefix lookup          │
//! │  │ Dispatch Router│                                          │
//! │  └─────┬──────────┘                                          │
//! │        │                                                     │
//! │  ┌─────┴──────────┐   handler races the response cutoff      │
//! │  │   Coordinator  │── immediate callback, or deferred ack    │
//! │  └─────┬──────────┘                                          │
//! │        │ (deferred)                                          │
//! │  ┌─────┴──────────┐   retry/backoff, rate-limit aware        │
//! │  │ Follow-up      │── POST webhook / PATCH @original         │
//! │  └────────────────┘                                          │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use interactions_gateway::{GatewayConfig, GatewayService, HandlerRegistry};
//!
//! let registry = HandlerRegistry::builder()
//!     .command("ping", ping_handler)
//!     .build();
//! let mut service = GatewayService::with_default_transport(config, registry)?;
//! service.start().await?;
//! ```
//!
//! # Security
//!
//! - Every request is verified against the application's Ed25519 public key
//!   over the raw body bytes before any parsing of the payload.
//! - Interaction tokens are capability credentials and never appear in logs.
//! - Oversized bodies are rejected before signature work.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
pub mod deadline;
pub mod domain;
pub mod followup;
pub mod ports;
pub mod router;
pub mod service;

pub use adapters::ReqwestTransport;
pub use deadline::DeadlineCoordinator;
pub use domain::config::GatewayConfig;
pub use domain::error::{
    ClassificationError, ConfigError, DeliveryError, GatewayError, HandlerError, RouteError,
};
pub use domain::interaction::{classify, Interaction, InteractionKind, InteractionToken};
pub use domain::response::{
    AutocompleteChoice, HandlerOutput, InteractionResponse, MessagePayload,
};
pub use domain::signature::{SignatureCheck, SignatureVerifier};
pub use followup::{FollowUpClient, FollowUpStats};
pub use ports::{FollowUpRequest, FollowUpTransport, InteractionHandler};
pub use router::{HandlerRegistry, HandlerRegistryBuilder};
pub use service::GatewayService;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
