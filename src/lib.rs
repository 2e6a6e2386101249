// Library crate - exports shared types and the trading core

pub mod bridge;
pub mod config;
pub mod journal;
pub mod notify;
pub mod trading;
pub mod trading_core;
pub mod types;

// Re-export commonly used types
pub use config::{RunMode, Settings};
pub use types::*;
