//! Outbound adapters behind the gateway's ports.

pub mod http;

pub use http::ReqwestTransport;
