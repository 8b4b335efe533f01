//! Domain types: configuration, errors, signature verification, payload
//! classification, and response envelopes.

pub mod config;
pub mod error;
pub mod interaction;
pub mod response;
pub mod signature;
