//! Daily-loss kill switch
//!
//! Tracks session PnL against the starting balance and blocks all further
//! trade admission once the daily loss limit is breached. The switch is
//! one-way: nothing re-enables trading except an explicit operator reset.

use tracing::{error, info};

#[derive(Debug)]
pub struct RiskGuardian {
    daily_loss_limit: f64,
    start_balance: f64,
    trading_allowed: bool,
}

impl RiskGuardian {
    /// `daily_loss_limit` is a fraction of the session starting balance
    /// (0.03 = 3%).
    pub fn new(daily_loss_limit: f64) -> Self {
        Self {
            daily_loss_limit,
            start_balance: 0.0,
            trading_allowed: true,
        }
    }

    /// Update session PnL from the current balance and trip the kill switch
    /// on a breach. The first observed balance anchors the session.
    pub fn update_daily_pnl(&mut self, current_balance: f64) {
        if self.start_balance == 0.0 {
            self.start_balance = current_balance;
            info!("Session anchored at balance {:.2}", current_balance);
            return;
        }

        let pnl_pct = (current_balance - self.start_balance) / self.start_balance;
        if pnl_pct <= -self.daily_loss_limit {
            self.activate_kill_switch(pnl_pct);
        }
    }

    fn activate_kill_switch(&mut self, pnl_pct: f64) {
        if self.trading_allowed {
            error!(
                "Daily loss limit reached ({:.2}% <= -{:.2}%). KILL SWITCH ACTIVATED - no further trade admission this session",
                pnl_pct * 100.0,
                self.daily_loss_limit * 100.0
            );
        }
        self.trading_allowed = false;
    }

    pub fn can_trade(&self) -> bool {
        self.trading_allowed
    }

    /// Operator reset: re-arms the switch and re-anchors the session.
    pub fn reset(&mut self, current_balance: f64) {
        info!("Risk guardian reset, new session anchor {:.2}", current_balance);
        self.start_balance = current_balance;
        self.trading_allowed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breach_trips_switch() {
        let mut guardian = RiskGuardian::new(0.03);
        guardian.update_daily_pnl(10_000.0);
        assert!(guardian.can_trade());

        guardian.update_daily_pnl(9_800.0); // -2%
        assert!(guardian.can_trade());

        guardian.update_daily_pnl(9_700.0); // -3%
        assert!(!guardian.can_trade());
    }

    #[test]
    fn test_switch_is_one_way() {
        let mut guardian = RiskGuardian::new(0.03);
        guardian.update_daily_pnl(10_000.0);
        guardian.update_daily_pnl(9_600.0);
        assert!(!guardian.can_trade());

        // A recovery does not re-enable trading.
        guardian.update_daily_pnl(10_500.0);
        assert!(!guardian.can_trade());
    }

    #[test]
    fn test_operator_reset_rearms() {
        let mut guardian = RiskGuardian::new(0.03);
        guardian.update_daily_pnl(10_000.0);
        guardian.update_daily_pnl(9_600.0);
        assert!(!guardian.can_trade());

        guardian.reset(9_600.0);
        assert!(guardian.can_trade());
        guardian.update_daily_pnl(9_500.0); // -1% off the new anchor
        assert!(guardian.can_trade());
    }
}
