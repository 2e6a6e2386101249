//! Bridge API Data Models
//!
//! Request and response types for the MT5 terminal REST bridge.

use serde::{Deserialize, Serialize};

// ============================================================================
// Authentication
// ============================================================================

/// Request body for terminal login
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequest {
    pub login: i64,
    pub password: String,
    pub server: String,
}

/// Response from the login endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: Option<String>,
    pub success: bool,
    pub error_message: Option<String>,
}

// ============================================================================
// Market data
// ============================================================================

/// Request for the most recent closed candles of a symbol/timeframe
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandlesRequest {
    pub symbol: String,
    pub timeframe: String,
    pub count: usize,
}

/// One OHLCV bar on the wire, epoch-seconds open time
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandleDto {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub tick_volume: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandlesResponse {
    pub candles: Option<Vec<CandleDto>>,
    pub success: bool,
    pub error_message: Option<String>,
}

/// Top-of-book tick for a symbol
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickResponse {
    pub bid: f64,
    pub ask: f64,
    pub time: i64,
    pub success: bool,
    pub error_message: Option<String>,
}

// ============================================================================
// Account & instrument info
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub balance: f64,
    pub equity: f64,
    pub margin: f64,
    pub free_margin: f64,
    pub success: bool,
    pub error_message: Option<String>,
}

/// Instrument tick economics and volume limits
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfoResponse {
    pub symbol: String,
    pub tick_size: f64,
    pub tick_value: f64,
    pub volume_min: f64,
    pub volume_max: f64,
    pub volume_step: f64,
    pub success: bool,
    pub error_message: Option<String>,
}

// ============================================================================
// Orders & positions
// ============================================================================

/// Market order submission
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub symbol: String,
    /// "BUY" or "SELL"
    pub side: String,
    pub volume: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub comment: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderResponse {
    pub ticket: Option<u64>,
    pub fill_price: Option<f64>,
    pub success: bool,
    pub error_message: Option<String>,
}

/// Stop modification for an open position
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyStopRequest {
    pub ticket: u64,
    pub stop_loss: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyStopResponse {
    pub success: bool,
    pub error_message: Option<String>,
}

/// One open position snapshot on the wire
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionDto {
    pub ticket: u64,
    pub symbol: String,
    /// "BUY" or "SELL"
    pub side: String,
    pub volume: f64,
    pub open_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionsResponse {
    pub positions: Option<Vec<PositionDto>>,
    pub success: bool,
    pub error_message: Option<String>,
}

/// Server clock, epoch seconds
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerTimeResponse {
    pub time: i64,
    pub success: bool,
    pub error_message: Option<String>,
}
