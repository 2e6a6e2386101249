//! Position lifecycle management
//!
//! Tracks which position is the "primary" for the current trade idea and
//! which are pyramided "burst" entries. The manager owns only ticket
//! references; every decision is derived from a freshly fetched snapshot so
//! it can never act on a stale stop or price.
//!
//! Lifecycle per idea: NONE -> PRIMARY_OPEN -> PRIMARY_AT_RISK_FREE, with
//! the primary disappearing (stopped out, closed externally) silently
//! resetting to NONE. Bursts are admitted only while the primary is risk
//! free, so total capital at risk never exceeds the original single-trade
//! risk.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::bridge::Broker;
use crate::types::{PositionSnapshot, Side};

/// Breakeven promotion policy.
///
/// The trigger is deliberately not a true 1R multiple: once a stop has
/// moved, the original risk distance is no longer reliably retrievable from
/// the venue, so the threshold is either a fixed favorable-move distance or
/// a fraction of the entry price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BreakevenTrigger {
    /// Fixed favorable move in price units (e.g. 0.0020 = 20 pips)
    FixedDistance(f64),
    /// Favorable move as a fraction of the entry price
    PercentOfEntry(f64),
}

impl BreakevenTrigger {
    pub fn threshold(&self, entry_price: f64) -> f64 {
        match self {
            BreakevenTrigger::FixedDistance(d) => *d,
            BreakevenTrigger::PercentOfEntry(p) => entry_price * p,
        }
    }
}

/// State of the current trade idea.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdeaState {
    /// No primary tracked
    None,
    /// Primary open, stop still at initial risk
    PrimaryOpen,
    /// Primary stop at or beyond entry; bursts admitted
    PrimaryAtRiskFree,
}

impl std::fmt::Display for IdeaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdeaState::None => write!(f, "NONE"),
            IdeaState::PrimaryOpen => write!(f, "PRIMARY_OPEN"),
            IdeaState::PrimaryAtRiskFree => write!(f, "PRIMARY_AT_RISK_FREE"),
        }
    }
}

/// Process-local ticket bookkeeping for one trading session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortfolioState {
    pub primary_ticket: Option<u64>,
    pub burst_tickets: Vec<u64>,
}

/// Lifecycle manager for the primary/burst trade idea.
pub struct PositionManager {
    portfolio: PortfolioState,
    idea_state: IdeaState,
    trigger: BreakevenTrigger,
}

impl PositionManager {
    pub fn new(trigger: BreakevenTrigger) -> Self {
        Self {
            portfolio: PortfolioState::default(),
            idea_state: IdeaState::None,
            trigger,
        }
    }

    pub fn state(&self) -> IdeaState {
        self.idea_state
    }

    pub fn portfolio(&self) -> &PortfolioState {
        &self.portfolio
    }

    pub fn primary_ticket(&self) -> Option<u64> {
        self.portfolio.primary_ticket
    }

    /// Register the primary entry for a new trade idea.
    ///
    /// Returns `false` (no-op) when a primary is already tracked - only one
    /// primary per idea, a new one may be registered only after the prior
    /// one cleared.
    pub fn register_primary(&mut self, ticket: u64) -> bool {
        if self.portfolio.primary_ticket.is_some() {
            warn!(
                ticket,
                "primary registration refused: #{} still tracked",
                self.portfolio.primary_ticket.unwrap()
            );
            return false;
        }
        info!(ticket, "registered primary trade");
        self.portfolio.primary_ticket = Some(ticket);
        self.idea_state = IdeaState::PrimaryOpen;
        true
    }

    /// Per-tick management: fetch the live primary snapshot and promote the
    /// stop to breakeven once price has moved favorably past the trigger.
    ///
    /// Idempotent: a stop already at or beyond entry issues no modification,
    /// so re-running at the same price sends nothing. A venue-rejected
    /// modify is logged and retried naturally on the next tick.
    pub async fn manage<B: Broker>(&mut self, broker: &B) -> Result<()> {
        let Some(ticket) = self.portfolio.primary_ticket else {
            return Ok(());
        };

        let Some(pos) = broker.position(ticket).await? else {
            // Closed or never filled - expected lifecycle, not an error.
            info!(ticket, "primary no longer open, clearing trade idea");
            self.clear();
            return Ok(());
        };

        if stop_at_breakeven(&pos) {
            self.idea_state = IdeaState::PrimaryAtRiskFree;
            return Ok(());
        }

        let quote = broker.quote(&pos.symbol).await?;
        let current_price = match pos.side {
            Side::Buy => quote.bid,
            Side::Sell => quote.ask,
        };
        let profit_dist = match pos.side {
            Side::Buy => current_price - pos.open_price,
            Side::Sell => pos.open_price - current_price,
        };

        if profit_dist >= self.trigger.threshold(pos.open_price) {
            info!(
                ticket,
                "breakeven trigger hit ({:.5} in favor), moving stop to entry {:.5}",
                profit_dist,
                pos.open_price
            );
            match broker.modify_stop(ticket, pos.open_price).await {
                Ok(()) => self.idea_state = IdeaState::PrimaryAtRiskFree,
                // Retried next tick; state is re-derived, never replayed.
                Err(e) => warn!(ticket, "stop modification rejected: {e:#}"),
            }
        }

        Ok(())
    }

    /// A burst may only be risked once the primary is risk free, judged
    /// against the live snapshot, never a cached flag.
    pub async fn check_burst_eligibility<B: Broker>(&mut self, broker: &B) -> Result<bool> {
        let Some(ticket) = self.portfolio.primary_ticket else {
            return Ok(false);
        };
        let Some(pos) = broker.position(ticket).await? else {
            info!(ticket, "primary not found while checking burst eligibility, clearing");
            self.clear();
            return Ok(false);
        };
        Ok(stop_at_breakeven(&pos))
    }

    /// Append a burst entry, gated on current eligibility. Does not change
    /// the primary's state machine.
    pub async fn register_burst<B: Broker>(&mut self, broker: &B, ticket: u64) -> Result<bool> {
        if !self.check_burst_eligibility(broker).await? {
            warn!(ticket, "burst registration refused: primary not risk free");
            return Ok(false);
        }
        info!(ticket, "registered burst trade");
        self.portfolio.burst_tickets.push(ticket);
        Ok(true)
    }

    fn clear(&mut self) {
        self.portfolio.primary_ticket = None;
        self.portfolio.burst_tickets.clear();
        self.idea_state = IdeaState::None;
    }
}

/// Stop at or beyond entry in the favorable direction.
///
/// A short with stop 0.0 has no stop at all, not a protective one.
fn stop_at_breakeven(pos: &PositionSnapshot) -> bool {
    match pos.side {
        Side::Buy => pos.stop_loss >= pos.open_price,
        Side::Sell => pos.stop_loss > 0.0 && pos.stop_loss <= pos.open_price,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::SimBroker;
    use crate::types::{OrderRequest, Side};

    fn trigger() -> BreakevenTrigger {
        BreakevenTrigger::FixedDistance(0.0020)
    }

    async fn open_long(broker: &SimBroker) -> u64 {
        broker
            .place_market_order(&OrderRequest {
                symbol: "EURUSD".to_string(),
                side: Side::Buy,
                volume: 1.0,
                stop_loss: 1.0980,
                take_profit: 1.1060,
                client_tag: "test".to_string(),
            })
            .await
            .unwrap()
            .ticket
    }

    #[tokio::test]
    async fn test_single_primary_per_idea() {
        let mut manager = PositionManager::new(trigger());
        assert!(manager.register_primary(1));
        assert!(!manager.register_primary(2));
        assert_eq!(manager.primary_ticket(), Some(1));
        assert_eq!(manager.state(), IdeaState::PrimaryOpen);
    }

    #[tokio::test]
    async fn test_breakeven_promotion_once() {
        // Scenario D: favorable move past the trigger issues exactly one
        // stop-modify; a second tick at the same price issues none (P7).
        let broker = SimBroker::with_default_forex();
        broker.set_quote("EURUSD", 1.1000, 1.1001).await;
        let ticket = open_long(&broker).await;

        let mut manager = PositionManager::new(trigger());
        manager.register_primary(ticket);

        // Not yet past the trigger.
        broker.set_quote("EURUSD", 1.1015, 1.1016).await;
        manager.manage(&broker).await.unwrap();
        assert_eq!(manager.state(), IdeaState::PrimaryOpen);
        assert_eq!(broker.modify_count().await, 0);

        // 20 pips in favor.
        broker.set_quote("EURUSD", 1.1021, 1.1022).await;
        manager.manage(&broker).await.unwrap();
        assert_eq!(manager.state(), IdeaState::PrimaryAtRiskFree);
        assert_eq!(broker.modify_count().await, 1);
        let pos = broker.position(ticket).await.unwrap().unwrap();
        assert!((pos.stop_loss - pos.open_price).abs() < 1e-12);

        // Second tick at the same price: no second modification.
        manager.manage(&broker).await.unwrap();
        assert_eq!(broker.modify_count().await, 1);
    }

    #[tokio::test]
    async fn test_rejected_modify_retries_next_tick() {
        let broker = SimBroker::with_default_forex();
        broker.set_quote("EURUSD", 1.1000, 1.1001).await;
        let ticket = open_long(&broker).await;

        let mut manager = PositionManager::new(trigger());
        manager.register_primary(ticket);

        broker.set_quote("EURUSD", 1.1025, 1.1026).await;
        broker.set_reject_modifies(true).await;
        manager.manage(&broker).await.unwrap();
        assert_eq!(manager.state(), IdeaState::PrimaryOpen);

        // Venue recovers; the next tick re-derives and succeeds.
        broker.set_reject_modifies(false).await;
        manager.manage(&broker).await.unwrap();
        assert_eq!(manager.state(), IdeaState::PrimaryAtRiskFree);
        assert_eq!(broker.modify_count().await, 1);
    }

    #[tokio::test]
    async fn test_burst_gated_on_risk_free_primary() {
        // P6: registration before the primary is risk free is rejected.
        let broker = SimBroker::with_default_forex();
        broker.set_quote("EURUSD", 1.1000, 1.1001).await;
        let ticket = open_long(&broker).await;

        let mut manager = PositionManager::new(trigger());
        manager.register_primary(ticket);

        assert!(!manager.check_burst_eligibility(&broker).await.unwrap());
        assert!(!manager.register_burst(&broker, 99).await.unwrap());
        assert!(manager.portfolio().burst_tickets.is_empty());

        // Promote to breakeven, then the burst is admitted.
        broker.set_quote("EURUSD", 1.1025, 1.1026).await;
        manager.manage(&broker).await.unwrap();
        assert!(manager.check_burst_eligibility(&broker).await.unwrap());
        assert!(manager.register_burst(&broker, 99).await.unwrap());
        assert_eq!(manager.portfolio().burst_tickets, vec![99]);
    }

    #[tokio::test]
    async fn test_lost_primary_silently_resets() {
        let broker = SimBroker::with_default_forex();
        broker.set_quote("EURUSD", 1.1000, 1.1001).await;
        let ticket = open_long(&broker).await;

        let mut manager = PositionManager::new(trigger());
        manager.register_primary(ticket);
        manager.register_burst(&broker, 7).await.ok();

        broker.close_position(ticket).await;
        manager.manage(&broker).await.unwrap();
        assert_eq!(manager.state(), IdeaState::None);
        assert!(manager.primary_ticket().is_none());
        assert!(manager.portfolio().burst_tickets.is_empty());

        // A new idea may now register a fresh primary.
        assert!(manager.register_primary(500));
    }

    #[tokio::test]
    async fn test_short_breakeven_semantics() {
        let broker = SimBroker::with_default_forex();
        broker.set_quote("EURUSD", 1.1000, 1.1001).await;
        let ticket = broker
            .place_market_order(&OrderRequest {
                symbol: "EURUSD".to_string(),
                side: Side::Sell,
                volume: 1.0,
                stop_loss: 1.1020,
                take_profit: 1.0940,
                client_tag: "test".to_string(),
            })
            .await
            .unwrap()
            .ticket;

        let mut manager = PositionManager::new(trigger());
        manager.register_primary(ticket);

        // 20 pips in favor for a short: ask drops.
        broker.set_quote("EURUSD", 1.0979, 1.0980).await;
        manager.manage(&broker).await.unwrap();
        assert_eq!(manager.state(), IdeaState::PrimaryAtRiskFree);
        let pos = broker.position(ticket).await.unwrap().unwrap();
        assert!((pos.stop_loss - pos.open_price).abs() < 1e-12);
    }

    #[test]
    fn test_percent_of_entry_trigger() {
        let t = BreakevenTrigger::PercentOfEntry(0.001);
        assert!((t.threshold(2000.0) - 2.0).abs() < 1e-12);
        let f = BreakevenTrigger::FixedDistance(0.0020);
        assert!((f.threshold(2000.0) - 0.0020).abs() < 1e-12);
    }
}
