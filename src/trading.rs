//! Live trading orchestration
//!
//! One `run_tick` call is one full pass of the polling loop: manage the open
//! primary, check the kill switch and the session killzone, then scan every
//! configured symbol in a stable order. All strategy calls are pure,
//! synchronous computations over already-fetched data; the only awaits are
//! the broker boundary calls.

use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Timelike, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bridge::Broker;
use crate::config::Settings;
use crate::journal::{JournalRecord, TradeJournal};
use crate::notify::TelegramNotifier;
use crate::trading_core::sizer::SizingRequest;
use crate::trading_core::{trend_bias, PositionManager, RiskGuardian, RiskSizer, Signal, SweepDetector};
use crate::types::{OrderRequest, Side};

/// Standard lot notional for forex margin estimation.
const CONTRACT_SIZE: f64 = 100_000.0;

/// Leverage used to estimate the margin a new position will require.
const EST_LEVERAGE: f64 = 30.0;

/// Per-session trading state driving the scan loop.
pub struct TradingSession {
    settings: Settings,
    detector: SweepDetector,
    sizer: RiskSizer,
    guardian: RiskGuardian,
    positions: PositionManager,
    journal: TradeJournal,
    notifier: Option<TelegramNotifier>,
    /// One-trade-per-candle markers: symbol -> open time of the last signal
    /// candle acted on (or deliberately skipped). The only silent
    /// suppression in the loop.
    processed: HashMap<String, DateTime<Utc>>,
}

impl TradingSession {
    pub fn new(settings: Settings, notifier: Option<TelegramNotifier>) -> Self {
        let detector = SweepDetector::new(settings.swing_lookback, settings.stop_buffer);
        let sizer = RiskSizer::new(settings.max_lots_hard_cap, settings.margin_safety_buffer);
        let guardian = RiskGuardian::new(settings.daily_loss_limit);
        let positions = PositionManager::new(settings.breakeven_trigger);
        let journal = TradeJournal::new(&settings.journal_path);
        Self {
            settings,
            detector,
            sizer,
            guardian,
            positions,
            journal,
            notifier,
            processed: HashMap::new(),
        }
    }

    pub fn positions(&self) -> &PositionManager {
        &self.positions
    }

    pub fn guardian(&self) -> &RiskGuardian {
        &self.guardian
    }

    /// One full polling tick.
    pub async fn run_tick<B: Broker>(&mut self, broker: &B) -> Result<()> {
        // Breakeven management runs before any admission gate: protecting an
        // open position is never blocked by the kill switch.
        self.positions.manage(broker).await?;

        let account = broker.account().await?;
        self.guardian.update_daily_pnl(account.balance);
        if !self.guardian.can_trade() {
            info!("Kill switch active, no trade admission this session");
            return Ok(());
        }

        let server_time = broker.server_time().await?;
        if !self.settings.killzone_hours.contains(&server_time.hour()) {
            debug!("Outside killzone ({}), waiting", server_time);
            return Ok(());
        }

        for symbol in self.settings.symbols.clone() {
            if let Err(e) = self.scan_symbol(broker, &symbol).await {
                // Transient venue failure on one symbol never aborts the
                // scan; state is re-derived next tick.
                warn!(symbol, "scan failed: {e:#}");
            }
        }
        Ok(())
    }

    async fn scan_symbol<B: Broker>(&mut self, broker: &B, symbol: &str) -> Result<()> {
        let ltf = broker
            .candles(symbol, self.settings.timeframe_ltf, self.settings.ltf_bars)
            .await?;
        if ltf.is_empty() {
            debug!(symbol, "no execution-timeframe data, skipping");
            return Ok(());
        }

        let htf = broker
            .candles(symbol, self.settings.timeframe_htf, self.settings.htf_bars)
            .await?;
        let htf_closes: Vec<f64> = htf.iter().map(|c| c.close).collect();
        let bias = trend_bias(&htf_closes, self.settings.trend_ema_period);

        let (window, signal) = self.detector.detect(&ltf, bias);
        if let Some(w) = window {
            debug!(
                symbol,
                bias,
                "watching liquidity {:.5}/{:.5}",
                w.high_liq,
                w.low_liq
            );
        }
        let Some(signal) = signal else {
            return Ok(());
        };

        // Already acted on this candle.
        if self.processed.get(symbol) == Some(&signal.timestamp) {
            return Ok(());
        }

        info!(
            symbol,
            "entry signal: {} @ {:.5} ({})", signal.action, signal.price, signal.reason
        );

        let open = broker.open_positions(symbol).await?;
        if open.is_empty() {
            // One primary per session, across all symbols: an untracked fill
            // would never be managed to breakeven and its risk would stack on
            // top of the tracked trade's.
            if self.positions.primary_ticket().is_none() {
                self.place_entry(broker, symbol, &signal, false).await?;
            } else {
                info!(symbol, "primary riding another symbol, signal skipped");
            }
        } else {
            // A position already rides this symbol. A new signal may only
            // pyramid when it is our primary and the primary is risk free.
            let ours = self
                .positions
                .primary_ticket()
                .map(|t| open.iter().any(|p| p.ticket == t))
                .unwrap_or(false);
            if ours && self.positions.check_burst_eligibility(broker).await? {
                self.place_entry(broker, symbol, &signal, true).await?;
            } else {
                info!(symbol, "position already open and not risk free, signal skipped");
            }
        }

        self.processed
            .insert(symbol.to_string(), signal.timestamp);
        Ok(())
    }

    /// Size and dispatch one entry. Soft rejections (slippage, risk, margin)
    /// return `Ok` and are only logged; a venue error propagates so the
    /// candle is not marked processed and the next tick retries naturally.
    async fn place_entry<B: Broker>(
        &mut self,
        broker: &B,
        symbol: &str,
        signal: &Signal,
        burst: bool,
    ) -> Result<()> {
        // Slippage guard: the signal priced at the candle close, the market
        // may have run away since.
        let quote = broker.quote(symbol).await?;
        let market_price = match signal.action {
            Side::Buy => quote.ask,
            Side::Sell => quote.bid,
        };
        if (market_price - signal.price).abs() > self.settings.max_slippage {
            info!(
                symbol,
                "slippage too high ({:.5} vs {:.5}), signal skipped", market_price, signal.price
            );
            return Ok(());
        }

        let spec = broker.symbol_spec(symbol).await?;
        let account = broker.account().await?;
        let sized = self.sizer.size(
            &spec,
            &SizingRequest {
                entry_price: signal.price,
                stop_price: signal.stop,
                risk_fraction: self.settings.risk_per_trade,
                account_balance: account.balance,
            },
        );
        if sized.rejected || sized.size <= 0.0 {
            info!(
                symbol,
                "signal rejected by risk sizer: {}",
                sized
                    .reject_reason
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "zero size".to_string())
            );
            return Ok(());
        }

        let est_margin = sized.size * CONTRACT_SIZE * signal.price / EST_LEVERAGE;
        let size = self
            .sizer
            .apply_margin_clamp(&spec, sized.size, est_margin, account.free_margin);

        let distance = (signal.price - signal.stop).abs();
        let target = match signal.action {
            Side::Buy => signal.price + distance * self.settings.risk_reward_ratio,
            Side::Sell => signal.price - distance * self.settings.risk_reward_ratio,
        };

        let request = OrderRequest {
            symbol: symbol.to_string(),
            side: signal.action,
            volume: size,
            stop_loss: signal.stop,
            take_profit: target,
            client_tag: format!("sweep-reclaim-{}", Uuid::new_v4()),
        };
        let fill = broker.place_market_order(&request).await?;
        info!(
            symbol,
            ticket = fill.ticket,
            "{} filled: {} {:.2} lots @ {:.5}, stop {:.5}, target {:.5}",
            if burst { "burst" } else { "primary" },
            signal.action,
            size,
            fill.price,
            signal.stop,
            target
        );

        if burst {
            self.positions.register_burst(broker, fill.ticket).await?;
        } else {
            self.positions.register_primary(fill.ticket);
        }

        // Informational side channels: failures never roll back the trade.
        let record = JournalRecord {
            timestamp: Utc::now(),
            symbol: symbol.to_string(),
            action: signal.action.to_string(),
            entry: signal.price,
            stop: signal.stop,
            target,
            lots: size,
            reason: signal.reason.to_string(),
            ticket: fill.ticket,
        };
        if let Err(e) = self.journal.append(&record) {
            warn!(symbol, "journal write failed: {e:#}");
        }
        if let Some(notifier) = &self.notifier {
            let msg = format!(
                "🎯 *SWEEP EXECUTION*\n\n*Symbol:* {}\n*Action:* {}\n*Entry:* {:.5}\n*SL:* {:.5}\n*TP:* {:.5} (RR 1:{})\n*Lots:* {:.2}\n*Logic:* {}",
                symbol,
                signal.action,
                signal.price,
                signal.stop,
                target,
                self.settings.risk_reward_ratio,
                size,
                signal.reason
            );
            notifier.send_alert(&msg).await;
        }
        Ok(())
    }
}
