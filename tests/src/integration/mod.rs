//! Cross-component integration tests.

pub mod delivery;
pub mod gateway_flows;
