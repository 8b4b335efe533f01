//! Port traits at the gateway's seams.
//!
//! Handlers are supplied by the surrounding bot framework; the follow-up
//! transport is implemented by [`crate::adapters::http::ReqwestTransport`] in
//! production and by mocks in tests.

pub mod inbound;
pub mod outbound;

pub use inbound::InteractionHandler;
pub use outbound::{FollowUpRequest, FollowUpTransport, TransportError, TransportReply};
