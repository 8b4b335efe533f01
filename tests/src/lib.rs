//! # Interaction Gateway Test Suite
//!
//! Unified test crate covering:
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── gateway_flows.rs   # Signed end-to-end HTTP flows
//!     └── delivery.rs        # Follow-up retry policy under hostile transports
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p gateway-tests
//! cargo test -p gateway-tests integration::
//! ```

#![allow(dead_code)]

pub mod integration;
