//! Execution venue boundary
//!
//! Everything the trading core needs from a broker, and nothing more:
//! market data, instrument economics, account state, order dispatch, stop
//! modification and live position snapshots. All position reads return
//! fresh snapshots; nothing here hands out a long-lived mutable view.

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::trading_core::sizer::SymbolSpec;
use crate::types::{AccountInfo, Candle, OrderFill, OrderRequest, PositionSnapshot, Quote, Timeframe};

/// Venue operations used by the scan loop and the lifecycle manager.
///
/// Implementations take `&self`; backends needing mutable state (token
/// refresh, simulated fills) use interior mutability.
pub trait Broker {
    /// Connectivity probe. `false` pauses all trading action.
    fn ping(&self) -> impl std::future::Future<Output = bool>;

    /// Broker server time, used for session (killzone) gating.
    fn server_time(&self) -> impl std::future::Future<Output = Result<DateTime<Utc>>>;

    /// Most recent `count` closed candles, oldest first.
    fn candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> impl std::future::Future<Output = Result<Vec<Candle>>>;

    fn account(&self) -> impl std::future::Future<Output = Result<AccountInfo>>;

    /// Tick economics and volume constraints, queried at sizing time.
    fn symbol_spec(&self, symbol: &str) -> impl std::future::Future<Output = Result<SymbolSpec>>;

    fn quote(&self, symbol: &str) -> impl std::future::Future<Output = Result<Quote>>;

    /// At-most-once market order submission. A rejection is an error; the
    /// caller does not retry within the same tick.
    fn place_market_order(
        &self,
        request: &OrderRequest,
    ) -> impl std::future::Future<Output = Result<OrderFill>>;

    /// Move the stop of an open position.
    fn modify_stop(
        &self,
        ticket: u64,
        new_stop: f64,
    ) -> impl std::future::Future<Output = Result<()>>;

    /// Fresh snapshot of one position; `None` when it no longer exists.
    fn position(
        &self,
        ticket: u64,
    ) -> impl std::future::Future<Output = Result<Option<PositionSnapshot>>>;

    /// Fresh snapshots of all open positions on a symbol.
    fn open_positions(
        &self,
        symbol: &str,
    ) -> impl std::future::Future<Output = Result<Vec<PositionSnapshot>>>;
}
