//! MT5 Terminal Bridge Client
//!
//! HTTP client for a REST bridge in front of an MT5-style terminal, with
//! token authentication and automatic re-login when the session expires.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::broker::Broker;
use super::models::*;
use crate::trading_core::sizer::SymbolSpec;
use crate::types::{
    AccountInfo, Candle, OrderFill, OrderRequest, PositionSnapshot, Quote, Side, Timeframe,
};

/// Default bridge URL for a locally hosted terminal
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8222";

/// Session tokens are refreshed well before the bridge's 24h expiry.
const TOKEN_REFRESH: Duration = Duration::from_secs(23 * 60 * 60);

struct Session {
    token: String,
    acquired_at: std::time::Instant,
}

/// Bridge client with automatic session management.
pub struct BridgeClient {
    client: Client,
    base_url: String,
    login: i64,
    password: String,
    server: String,
    session: RwLock<Option<Session>>,
}

impl BridgeClient {
    /// Create a client from environment variables
    ///
    /// Expects:
    /// - `BRIDGE_LOGIN` - terminal account number
    /// - `BRIDGE_PASSWORD` - terminal password
    /// - `BRIDGE_SERVER` - broker server name
    /// - `BRIDGE_URL` (optional) - bridge base URL, defaults to localhost
    pub fn from_env() -> Result<Self> {
        let login: i64 = std::env::var("BRIDGE_LOGIN")
            .context("BRIDGE_LOGIN environment variable not set")?
            .parse()
            .context("BRIDGE_LOGIN must be a number")?;
        let password = std::env::var("BRIDGE_PASSWORD")
            .context("BRIDGE_PASSWORD environment variable not set")?;
        let server = std::env::var("BRIDGE_SERVER")
            .context("BRIDGE_SERVER environment variable not set")?;
        let base_url =
            std::env::var("BRIDGE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        Ok(Self::new(login, password, server, base_url))
    }

    pub fn new(login: i64, password: String, server: String, base_url: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to create HTTP client"),
            base_url,
            login,
            password,
            server,
            session: RwLock::new(None),
        }
    }

    /// Ensure a valid session token, logging in again when stale.
    pub async fn ensure_authenticated(&self) -> Result<()> {
        {
            let session = self.session.read().await;
            if let Some(s) = session.as_ref() {
                if s.acquired_at.elapsed() < TOKEN_REFRESH {
                    return Ok(());
                }
            }
        }
        self.authenticate().await
    }

    async fn authenticate(&self) -> Result<()> {
        info!("Authenticating with terminal bridge at {}", self.base_url);

        let request = AuthRequest {
            login: self.login,
            password: self.password.clone(),
            server: self.server.clone(),
        };
        let response: AuthResponse = self
            .client
            .post(format!("{}/api/auth/login", self.base_url))
            .json(&request)
            .send()
            .await
            .context("Bridge login request failed")?
            .json()
            .await
            .context("Bridge login response was not valid JSON")?;

        if !response.success {
            return Err(anyhow!(
                "Bridge login rejected: {}",
                response.error_message.unwrap_or_default()
            ));
        }
        let token = response
            .token
            .ok_or_else(|| anyhow!("Bridge login succeeded but returned no token"))?;

        *self.session.write().await = Some(Session {
            token,
            acquired_at: std::time::Instant::now(),
        });
        info!("Bridge session established for account {}", self.login);
        Ok(())
    }

    async fn token(&self) -> Result<String> {
        self.ensure_authenticated().await?;
        let session = self.session.read().await;
        session
            .as_ref()
            .map(|s| s.token.clone())
            .ok_or_else(|| anyhow!("No bridge session"))
    }

    /// POST a JSON body to an authenticated endpoint.
    async fn post<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R> {
        let token = self.token().await?;
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Bridge request to {} failed", path))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Bridge returned {} for {}", status, path));
        }
        response
            .json()
            .await
            .with_context(|| format!("Bridge response from {} was not valid JSON", path))
    }

    /// GET an authenticated endpoint.
    async fn get<R: DeserializeOwned>(&self, path: &str) -> Result<R> {
        let token = self.token().await?;
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .send()
            .await
            .with_context(|| format!("Bridge request to {} failed", path))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Bridge returned {} for {}", status, path));
        }
        response
            .json()
            .await
            .with_context(|| format!("Bridge response from {} was not valid JSON", path))
    }
}

fn parse_side(side: &str) -> Result<Side> {
    match side {
        "BUY" => Ok(Side::Buy),
        "SELL" => Ok(Side::Sell),
        other => Err(anyhow!("Unknown side '{}' from bridge", other)),
    }
}

fn epoch_to_utc(secs: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| anyhow!("Invalid epoch timestamp {} from bridge", secs))
}

impl Broker for BridgeClient {
    async fn ping(&self) -> bool {
        match self
            .client
            .get(format!("{}/api/health", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(r) => r.status().is_success(),
            Err(e) => {
                warn!("Bridge ping failed: {}", e);
                false
            }
        }
    }

    async fn server_time(&self) -> Result<DateTime<Utc>> {
        let response: ServerTimeResponse = self.get("/api/time").await?;
        if !response.success {
            return Err(anyhow!(
                "Server time query failed: {}",
                response.error_message.unwrap_or_default()
            ));
        }
        epoch_to_utc(response.time)
    }

    async fn candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<Candle>> {
        let request = CandlesRequest {
            symbol: symbol.to_string(),
            timeframe: timeframe.as_str().to_string(),
            count,
        };
        let response: CandlesResponse = self.post("/api/candles", &request).await?;
        if !response.success {
            return Err(anyhow!(
                "Candle fetch for {} failed: {}",
                symbol,
                response.error_message.unwrap_or_default()
            ));
        }

        let dtos = response.candles.unwrap_or_default();
        debug!("Fetched {} {} candles for {}", dtos.len(), timeframe, symbol);
        dtos.into_iter()
            .map(|c| {
                Ok(Candle {
                    open_time: epoch_to_utc(c.time)?,
                    open: c.open,
                    high: c.high,
                    low: c.low,
                    close: c.close,
                    volume: c.tick_volume,
                })
            })
            .collect()
    }

    async fn account(&self) -> Result<AccountInfo> {
        let response: AccountResponse = self.get("/api/account").await?;
        if !response.success {
            return Err(anyhow!(
                "Account query failed: {}",
                response.error_message.unwrap_or_default()
            ));
        }
        Ok(AccountInfo {
            balance: response.balance,
            equity: response.equity,
            margin: response.margin,
            free_margin: response.free_margin,
        })
    }

    async fn symbol_spec(&self, symbol: &str) -> Result<SymbolSpec> {
        let response: SymbolInfoResponse =
            self.get(&format!("/api/symbols/{}", symbol)).await?;
        if !response.success {
            return Err(anyhow!(
                "Symbol info for {} failed: {}",
                symbol,
                response.error_message.unwrap_or_default()
            ));
        }
        Ok(SymbolSpec {
            symbol: response.symbol,
            tick_size: response.tick_size,
            tick_value: response.tick_value,
            min_size: response.volume_min,
            max_size: response.volume_max,
            step_size: response.volume_step,
        })
    }

    async fn quote(&self, symbol: &str) -> Result<Quote> {
        let response: TickResponse = self.get(&format!("/api/tick/{}", symbol)).await?;
        if !response.success {
            return Err(anyhow!(
                "Tick for {} failed: {}",
                symbol,
                response.error_message.unwrap_or_default()
            ));
        }
        Ok(Quote {
            bid: response.bid,
            ask: response.ask,
            time: epoch_to_utc(response.time)?,
        })
    }

    async fn place_market_order(&self, request: &OrderRequest) -> Result<OrderFill> {
        let wire = PlaceOrderRequest {
            symbol: request.symbol.clone(),
            side: request.side.to_string(),
            volume: request.volume,
            stop_loss: request.stop_loss,
            take_profit: request.take_profit,
            comment: request.client_tag.clone(),
        };
        let response: PlaceOrderResponse = self.post("/api/orders/market", &wire).await?;
        if !response.success {
            return Err(anyhow!(
                "Order rejected: {}",
                response.error_message.unwrap_or_default()
            ));
        }
        let ticket = response
            .ticket
            .ok_or_else(|| anyhow!("Fill acknowledged without a ticket"))?;
        let price = response.fill_price.unwrap_or(0.0);
        info!(ticket, "order filled: {} {} {} @ {:.5}", request.side, request.volume, request.symbol, price);
        Ok(OrderFill { ticket, price })
    }

    async fn modify_stop(&self, ticket: u64, new_stop: f64) -> Result<()> {
        let wire = ModifyStopRequest {
            ticket,
            stop_loss: new_stop,
        };
        let response: ModifyStopResponse = self.post("/api/positions/modify", &wire).await?;
        if !response.success {
            return Err(anyhow!(
                "Stop modification for #{} rejected: {}",
                ticket,
                response.error_message.unwrap_or_default()
            ));
        }
        Ok(())
    }

    async fn position(&self, ticket: u64) -> Result<Option<PositionSnapshot>> {
        let response: PositionsResponse =
            self.get(&format!("/api/positions?ticket={}", ticket)).await?;
        if !response.success {
            return Err(anyhow!(
                "Position query for #{} failed: {}",
                ticket,
                response.error_message.unwrap_or_default()
            ));
        }
        let Some(dto) = response.positions.unwrap_or_default().into_iter().next() else {
            return Ok(None);
        };
        Ok(Some(PositionSnapshot {
            ticket: dto.ticket,
            symbol: dto.symbol,
            side: parse_side(&dto.side)?,
            volume: dto.volume,
            open_price: dto.open_price,
            stop_loss: dto.stop_loss,
            take_profit: dto.take_profit,
        }))
    }

    async fn open_positions(&self, symbol: &str) -> Result<Vec<PositionSnapshot>> {
        let response: PositionsResponse =
            self.get(&format!("/api/positions?symbol={}", symbol)).await?;
        if !response.success {
            return Err(anyhow!(
                "Position query for {} failed: {}",
                symbol,
                response.error_message.unwrap_or_default()
            ));
        }
        response
            .positions
            .unwrap_or_default()
            .into_iter()
            .map(|dto| {
                Ok(PositionSnapshot {
                    ticket: dto.ticket,
                    symbol: dto.symbol,
                    side: parse_side(&dto.side)?,
                    volume: dto.volume,
                    open_price: dto.open_price,
                    stop_loss: dto.stop_loss,
                    take_profit: dto.take_profit,
                })
            })
            .collect()
    }
}
