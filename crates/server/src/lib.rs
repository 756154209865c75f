//! HTTP surface for the vidingest pipeline.
//!
//! The binary in `main.rs` wires configuration, logging and the processor
//! together; everything it serves lives here so tests can build the router
//! in-process.

pub mod api;
pub mod metrics;
pub mod state;
