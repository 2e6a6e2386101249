//! In-memory simulated venue
//!
//! Fills market orders instantly at the current quote and keeps positions in
//! a plain map. Used by simulation mode and by every test that needs a
//! broker; the knobs (`set_quote`, `set_reject_modifies`, `close_position`)
//! exist so tests can script venue behavior.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use super::broker::Broker;
use crate::trading_core::sizer::SymbolSpec;
use crate::types::{
    AccountInfo, Candle, OrderFill, OrderRequest, PositionSnapshot, Quote, Side, Timeframe,
};

struct SimState {
    connected: bool,
    server_time: DateTime<Utc>,
    account: AccountInfo,
    specs: HashMap<String, SymbolSpec>,
    quotes: HashMap<String, Quote>,
    candles: HashMap<(String, Timeframe), Vec<Candle>>,
    positions: HashMap<u64, PositionSnapshot>,
    next_ticket: u64,
    reject_modifies: bool,
    modify_count: u64,
}

pub struct SimBroker {
    state: Mutex<SimState>,
}

impl SimBroker {
    pub fn new(account: AccountInfo) -> Self {
        Self {
            state: Mutex::new(SimState {
                connected: true,
                server_time: Utc::now(),
                account,
                specs: HashMap::new(),
                quotes: HashMap::new(),
                candles: HashMap::new(),
                positions: HashMap::new(),
                next_ticket: 1000,
                reject_modifies: false,
                modify_count: 0,
            }),
        }
    }

    /// Fresh sim with a 10k account and a standard five-decimal forex spec
    /// registered for the major pairs.
    pub fn with_default_forex() -> Self {
        let mut broker = Self::new(AccountInfo {
            balance: 10_000.0,
            equity: 10_000.0,
            margin: 0.0,
            free_margin: 10_000.0,
        });
        {
            let state = broker.state.get_mut();
            for symbol in ["EURUSD", "GBPUSD", "USDJPY", "AUDUSD", "USDCAD", "USDCHF", "NZDUSD"] {
                state.specs.insert(
                    symbol.to_string(),
                    SymbolSpec {
                        symbol: symbol.to_string(),
                        tick_size: 0.0001,
                        tick_value: 1.0,
                        min_size: 0.01,
                        max_size: 100.0,
                        step_size: 0.01,
                    },
                );
            }
        }
        broker
    }

    pub async fn set_connected(&self, connected: bool) {
        self.state.lock().await.connected = connected;
    }

    pub async fn set_server_time(&self, time: DateTime<Utc>) {
        self.state.lock().await.server_time = time;
    }

    pub async fn set_account(&self, account: AccountInfo) {
        self.state.lock().await.account = account;
    }

    pub async fn set_spec(&self, spec: SymbolSpec) {
        let mut state = self.state.lock().await;
        state.specs.insert(spec.symbol.clone(), spec);
    }

    pub async fn set_quote(&self, symbol: &str, bid: f64, ask: f64) {
        let mut state = self.state.lock().await;
        let time = state.server_time;
        state.quotes.insert(symbol.to_string(), Quote { bid, ask, time });
    }

    pub async fn set_candles(&self, symbol: &str, timeframe: Timeframe, candles: Vec<Candle>) {
        let mut state = self.state.lock().await;
        state.candles.insert((symbol.to_string(), timeframe), candles);
    }

    /// Close a position out from under the bot, as a stop-out would.
    pub async fn close_position(&self, ticket: u64) {
        self.state.lock().await.positions.remove(&ticket);
    }

    pub async fn set_reject_modifies(&self, reject: bool) {
        self.state.lock().await.reject_modifies = reject;
    }

    /// Number of stop modifications the venue accepted.
    pub async fn modify_count(&self) -> u64 {
        self.state.lock().await.modify_count
    }

    pub async fn open_position_count(&self) -> usize {
        self.state.lock().await.positions.len()
    }
}

impl Broker for SimBroker {
    async fn ping(&self) -> bool {
        self.state.lock().await.connected
    }

    async fn server_time(&self) -> Result<DateTime<Utc>> {
        Ok(self.state.lock().await.server_time)
    }

    async fn candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<Candle>> {
        let state = self.state.lock().await;
        let series = state
            .candles
            .get(&(symbol.to_string(), timeframe))
            .cloned()
            .unwrap_or_default();
        let start = series.len().saturating_sub(count);
        Ok(series[start..].to_vec())
    }

    async fn account(&self) -> Result<AccountInfo> {
        Ok(self.state.lock().await.account)
    }

    async fn symbol_spec(&self, symbol: &str) -> Result<SymbolSpec> {
        self.state
            .lock()
            .await
            .specs
            .get(symbol)
            .cloned()
            .ok_or_else(|| anyhow!("No symbol spec for '{}'", symbol))
    }

    async fn quote(&self, symbol: &str) -> Result<Quote> {
        self.state
            .lock()
            .await
            .quotes
            .get(symbol)
            .copied()
            .ok_or_else(|| anyhow!("No quote for '{}'", symbol))
    }

    async fn place_market_order(&self, request: &OrderRequest) -> Result<OrderFill> {
        let mut state = self.state.lock().await;
        if !state.connected {
            return Err(anyhow!("Sim venue disconnected"));
        }
        let quote = state
            .quotes
            .get(&request.symbol)
            .copied()
            .ok_or_else(|| anyhow!("No quote for '{}'", request.symbol))?;
        let price = match request.side {
            Side::Buy => quote.ask,
            Side::Sell => quote.bid,
        };

        let ticket = state.next_ticket;
        state.next_ticket += 1;
        state.positions.insert(
            ticket,
            PositionSnapshot {
                ticket,
                symbol: request.symbol.clone(),
                side: request.side,
                volume: request.volume,
                open_price: price,
                stop_loss: request.stop_loss,
                take_profit: request.take_profit,
            },
        );
        debug!(ticket, price, "sim fill: {} {} {}", request.side, request.volume, request.symbol);
        Ok(OrderFill { ticket, price })
    }

    async fn modify_stop(&self, ticket: u64, new_stop: f64) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.reject_modifies {
            return Err(anyhow!("Sim venue rejected stop modification"));
        }
        let pos = state
            .positions
            .get_mut(&ticket)
            .ok_or_else(|| anyhow!("Position #{} not found", ticket))?;
        pos.stop_loss = new_stop;
        state.modify_count += 1;
        Ok(())
    }

    async fn position(&self, ticket: u64) -> Result<Option<PositionSnapshot>> {
        Ok(self.state.lock().await.positions.get(&ticket).cloned())
    }

    async fn open_positions(&self, symbol: &str) -> Result<Vec<PositionSnapshot>> {
        let state = self.state.lock().await;
        let mut positions: Vec<PositionSnapshot> = state
            .positions
            .values()
            .filter(|p| p.symbol == symbol)
            .cloned()
            .collect();
        positions.sort_by_key(|p| p.ticket);
        Ok(positions)
    }
}
