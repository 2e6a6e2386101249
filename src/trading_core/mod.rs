//! Trading Core - strategy logic shared by the live bot and the pipeline
//!
//! This module contains the core strategy components:
//! - Liquidity sweep & reclaim signal detection
//! - Higher-timeframe trend bias
//! - Risk-normalized position sizing
//! - Daily-loss kill switch
//! - Position lifecycle management (breakeven promotion, burst entries)

pub mod detector;
pub mod guardian;
pub mod portfolio;
pub mod sizer;
pub mod trend;

// Re-export commonly used types
pub use detector::{LiquidityWindow, ReasonCode, Signal, SweepDetector};
pub use guardian::RiskGuardian;
pub use portfolio::{BreakevenTrigger, IdeaState, PortfolioState, PositionManager};
pub use sizer::{RejectReason, RiskSizer, SizedOrder, SizingRequest, SymbolSpec};
pub use trend::trend_bias;
