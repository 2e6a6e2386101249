//! Broker Bridge
//!
//! Boundary to the execution venue. The trading core only ever talks to the
//! [`Broker`] trait; concrete backends are the REST [`BridgeClient`] for an
//! MT5-style terminal bridge and the in-memory [`SimBroker`] used by tests
//! and simulation mode.
//!
//! # Components
//!
//! - [`broker`] - the venue boundary trait
//! - [`models`] - request/response data types for the REST bridge
//! - [`client`] - HTTP client with token authentication
//! - [`sim`] - in-memory simulated venue

pub mod broker;
pub mod client;
pub mod models;
pub mod sim;

// Re-export commonly used types
pub use broker::Broker;
pub use client::BridgeClient;
pub use sim::SimBroker;
