//! Bot configuration
//!
//! Defaults mirror the tuned parameters the strategy was optimized for
//! (forex majors on M15 with an H4 structure filter). The operational knobs
//! (symbols, risk fractions, lookback, reward ratio, poll interval, journal
//! path) can be overridden from the environment so a container deployment
//! never needs a rebuild to change risk numbers; structural parameters are
//! code-level settings.

use serde::{Deserialize, Serialize};

use crate::trading_core::portfolio::BreakevenTrigger;
use crate::types::Timeframe;

/// Run mode determines whether orders are simulated or sent to the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunMode {
    /// In-memory simulated broker (no connectivity required)
    Simulation,
    /// Live trading through the REST bridge
    Live,
}

impl Default for RunMode {
    fn default() -> Self {
        Self::Simulation
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simulation => write!(f, "Simulation"),
            Self::Live => write!(f, "Live"),
        }
    }
}

/// Session-level configuration for the scan loop and the trading core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Symbols to scan each tick, in a stable order
    pub symbols: Vec<String>,
    /// Execution timeframe (signal candles)
    pub timeframe_ltf: Timeframe,
    /// Structure timeframe (trend bias)
    pub timeframe_htf: Timeframe,
    /// Candles fetched per symbol for the execution timeframe
    pub ltf_bars: usize,
    /// Candles fetched per symbol for the structure timeframe
    pub htf_bars: usize,
    /// Liquidity window lookback in candles
    pub swing_lookback: usize,
    /// EMA period for the structure trend filter
    pub trend_ema_period: usize,
    /// Stop buffer beyond the sweeping wick, in price units
    pub stop_buffer: f64,
    /// Fraction of balance risked per trade
    pub risk_per_trade: f64,
    /// Daily loss fraction that trips the kill switch
    pub daily_loss_limit: f64,
    /// Reward-to-risk ratio used to derive the target from the stop distance
    pub risk_reward_ratio: f64,
    /// Hard ceiling on position size, independent of any computed value
    pub max_lots_hard_cap: f64,
    /// Fraction of free margin the margin clamp may commit
    pub margin_safety_buffer: f64,
    /// Maximum tolerated gap between signal price and live quote
    pub max_slippage: f64,
    /// Breakeven promotion policy for the primary position
    pub breakeven_trigger: BreakevenTrigger,
    /// Server-time hours during which entries are allowed
    pub killzone_hours: Vec<u32>,
    /// Delay between scan ticks, in seconds
    pub poll_interval_secs: u64,
    /// Path of the CSV trade journal
    pub journal_path: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            symbols: vec![
                "EURUSD".to_string(),
                "GBPUSD".to_string(),
                "USDJPY".to_string(),
                "AUDUSD".to_string(),
                "USDCAD".to_string(),
                "USDCHF".to_string(),
                "NZDUSD".to_string(),
            ],
            timeframe_ltf: Timeframe::M15,
            timeframe_htf: Timeframe::H4,
            ltf_bars: 500,
            htf_bars: 100,
            // 96 M15 candles = 24h of range, daily liquidity
            swing_lookback: 96,
            trend_ema_period: 50,
            stop_buffer: 0.0002,
            risk_per_trade: 0.01,
            daily_loss_limit: 0.03,
            risk_reward_ratio: 3.0,
            max_lots_hard_cap: 10.0,
            margin_safety_buffer: 0.9,
            max_slippage: 0.0003,
            breakeven_trigger: BreakevenTrigger::FixedDistance(0.0020),
            // London (08-12) and New York (13-17) killzones, broker server time
            killzone_hours: (8..=17).collect(),
            poll_interval_secs: 10,
            journal_path: "bot_journal.csv".to_string(),
        }
    }
}

impl Settings {
    /// Build settings from defaults plus environment overrides.
    ///
    /// Recognized variables: `BOT_SYMBOLS` (comma-separated),
    /// `BOT_RISK_PER_TRADE`, `BOT_DAILY_LOSS_LIMIT`, `BOT_SWING_LOOKBACK`,
    /// `BOT_RISK_REWARD`, `BOT_POLL_INTERVAL_SECS`, `BOT_JOURNAL_PATH`.
    pub fn from_env() -> Self {
        let mut settings = Self::default();

        if let Ok(symbols) = std::env::var("BOT_SYMBOLS") {
            let parsed: Vec<String> = symbols
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect();
            if !parsed.is_empty() {
                settings.symbols = parsed;
            }
        }
        if let Some(v) = parse_env("BOT_RISK_PER_TRADE") {
            settings.risk_per_trade = v;
        }
        if let Some(v) = parse_env("BOT_DAILY_LOSS_LIMIT") {
            settings.daily_loss_limit = v;
        }
        if let Some(v) = parse_env("BOT_SWING_LOOKBACK") {
            settings.swing_lookback = v;
        }
        if let Some(v) = parse_env("BOT_RISK_REWARD") {
            settings.risk_reward_ratio = v;
        }
        if let Some(v) = parse_env("BOT_POLL_INTERVAL_SECS") {
            settings.poll_interval_secs = v;
        }
        if let Ok(path) = std::env::var("BOT_JOURNAL_PATH") {
            settings.journal_path = path;
        }

        settings
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
