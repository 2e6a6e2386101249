//! Risk-normalized position sizing
//!
//! One tick-based formula prices every instrument class - forex, metals,
//! indices, crypto - purely by substituting the venue's tick economics from
//! the symbol specification. There is no per-asset branching anywhere.
//!
//! ```text
//! risk_cash     = account_balance * risk_fraction
//! distance      = |entry_price - stop_price|
//! ticks_at_risk = distance / tick_size
//! loss_per_unit = ticks_at_risk * tick_value
//! raw_size      = risk_cash / loss_per_unit
//! ```
//!
//! The raw size is then rounded to the venue's step increment, clamped to
//! its min/max limits and to a hard safety ceiling that is independent of
//! any computed value.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Venue-reported tick economics and volume constraints for one instrument.
///
/// Queried fresh at sizing time - these can change, so they are never
/// cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolSpec {
    pub symbol: String,
    /// Minimum price increment
    pub tick_size: f64,
    /// Account-currency value of one tick for one unit of volume
    pub tick_value: f64,
    pub min_size: f64,
    pub max_size: f64,
    /// Volume step increment
    pub step_size: f64,
}

/// Proposed trade to be sized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingRequest {
    pub entry_price: f64,
    pub stop_price: f64,
    pub risk_fraction: f64,
    pub account_balance: f64,
}

/// Why a sizing request produced no size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// Entry or stop price is zero (invalid input, not an error)
    ZeroPrice,
    /// Stop distance smaller than one instrument tick
    DegenerateStopDistance,
    /// tick_size, tick_value or step_size of zero in the instrument spec
    MalformedSpec,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::ZeroPrice => write!(f, "zero entry or stop price"),
            RejectReason::DegenerateStopDistance => write!(f, "stop distance below one tick"),
            RejectReason::MalformedSpec => write!(f, "malformed instrument spec"),
        }
    }
}

/// Sizing result. A rejected request always carries size 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizedOrder {
    pub size: f64,
    pub rejected: bool,
    pub reject_reason: Option<RejectReason>,
}

impl SizedOrder {
    fn rejected(reason: RejectReason) -> Self {
        Self {
            size: 0.0,
            rejected: true,
            reject_reason: Some(reason),
        }
    }

    fn sized(size: f64) -> Self {
        Self {
            size,
            rejected: false,
            reject_reason: None,
        }
    }
}

/// Instrument-agnostic position sizer.
#[derive(Debug, Clone)]
pub struct RiskSizer {
    /// Hard ceiling on any computed size, guarding against formula blow-ups
    /// on pathological inputs
    hard_cap: f64,
    /// Fraction of free margin the margin clamp may commit
    margin_buffer: f64,
}

impl RiskSizer {
    pub fn new(hard_cap: f64, margin_buffer: f64) -> Self {
        Self {
            hard_cap,
            margin_buffer,
        }
    }

    /// Size a trade against the risk budget.
    pub fn size(&self, spec: &SymbolSpec, req: &SizingRequest) -> SizedOrder {
        if req.entry_price == 0.0 || req.stop_price == 0.0 {
            return SizedOrder::rejected(RejectReason::ZeroPrice);
        }
        if spec.tick_size <= 0.0 || spec.tick_value <= 0.0 || spec.step_size <= 0.0 {
            return SizedOrder::rejected(RejectReason::MalformedSpec);
        }

        let distance = (req.entry_price - req.stop_price).abs();
        if distance < spec.tick_size {
            return SizedOrder::rejected(RejectReason::DegenerateStopDistance);
        }

        let risk_cash = req.account_balance * req.risk_fraction;
        let ticks_at_risk = distance / spec.tick_size;
        let loss_per_unit = ticks_at_risk * spec.tick_value;
        let raw_size = risk_cash / loss_per_unit;

        let size = round_to_step(raw_size, spec.step_size)
            .clamp(spec.min_size, spec.max_size)
            .min(self.hard_cap);
        let size = round_two_decimals(size);

        debug!(
            symbol = %spec.symbol,
            raw_size,
            size,
            "sized trade: risk {:.2} over {:.1} ticks",
            risk_cash,
            ticks_at_risk
        );

        SizedOrder::sized(size)
    }

    /// Second clamp, applied after the risk-based size, never replacing it.
    ///
    /// If the estimated margin requirement exceeds the usable share of free
    /// margin, the size is scaled down proportionally and re-rounded to the
    /// step increment.
    pub fn apply_margin_clamp(
        &self,
        spec: &SymbolSpec,
        size: f64,
        required_margin: f64,
        free_margin: f64,
    ) -> f64 {
        if size <= 0.0 || required_margin <= 0.0 {
            return size;
        }
        let usable = free_margin * self.margin_buffer;
        if required_margin <= usable {
            return size;
        }

        let scaled = size * usable / required_margin;
        let clamped = round_to_step(scaled, spec.step_size)
            .clamp(spec.min_size, spec.max_size)
            .min(self.hard_cap);
        let clamped = round_two_decimals(clamped);
        debug!(
            symbol = %spec.symbol,
            size,
            clamped,
            "margin clamp: required {:.2} > usable {:.2}",
            required_margin,
            usable
        );
        clamped
    }
}

/// Round to the nearest multiple of `step`.
fn round_to_step(value: f64, step: f64) -> f64 {
    (value / step).round() * step
}

fn round_two_decimals(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forex_spec() -> SymbolSpec {
        SymbolSpec {
            symbol: "EURUSD".to_string(),
            tick_size: 0.0001,
            tick_value: 1.0,
            min_size: 0.01,
            max_size: 100.0,
            step_size: 0.01,
        }
    }

    fn sizer() -> RiskSizer {
        RiskSizer::new(10.0, 0.9)
    }

    #[test]
    fn test_forex_twenty_pip_stop() {
        // Scenario C: 100 risk cash over 20 ticks at 1.0/tick -> 5.0 lots,
        // under both the venue max and the hard ceiling.
        let order = sizer().size(
            &forex_spec(),
            &SizingRequest {
                entry_price: 1.1000,
                stop_price: 1.0980,
                risk_fraction: 0.01,
                account_balance: 10_000.0,
            },
        );
        assert!(!order.rejected);
        assert!((order.size - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_hard_ceiling_clamps_blowups() {
        // Tiny stop distance (2 ticks) explodes the raw size; the hard cap
        // holds it regardless of the venue max.
        let order = sizer().size(
            &forex_spec(),
            &SizingRequest {
                entry_price: 1.1000,
                stop_price: 1.0998,
                risk_fraction: 0.01,
                account_balance: 1_000_000.0,
            },
        );
        assert!(!order.rejected);
        assert!((order.size - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_inputs_size_zero() {
        // P5: zero prices and sub-tick distances are values, not errors.
        let s = sizer();
        let spec = forex_spec();

        let zero_entry = s.size(
            &spec,
            &SizingRequest {
                entry_price: 0.0,
                stop_price: 1.0980,
                risk_fraction: 0.01,
                account_balance: 10_000.0,
            },
        );
        assert!(zero_entry.rejected);
        assert_eq!(zero_entry.size, 0.0);
        assert_eq!(zero_entry.reject_reason, Some(RejectReason::ZeroPrice));

        let zero_stop = s.size(
            &spec,
            &SizingRequest {
                entry_price: 1.1000,
                stop_price: 0.0,
                risk_fraction: 0.01,
                account_balance: 10_000.0,
            },
        );
        assert!(zero_stop.rejected);
        assert_eq!(zero_stop.size, 0.0);

        let sub_tick = s.size(
            &spec,
            &SizingRequest {
                entry_price: 1.10005,
                stop_price: 1.10001,
                risk_fraction: 0.01,
                account_balance: 10_000.0,
            },
        );
        assert!(sub_tick.rejected);
        assert_eq!(
            sub_tick.reject_reason,
            Some(RejectReason::DegenerateStopDistance)
        );
    }

    #[test]
    fn test_malformed_spec_sizes_zero() {
        let mut spec = forex_spec();
        spec.tick_value = 0.0;
        let order = sizer().size(
            &spec,
            &SizingRequest {
                entry_price: 1.1000,
                stop_price: 1.0980,
                risk_fraction: 0.01,
                account_balance: 10_000.0,
            },
        );
        assert!(order.rejected);
        assert_eq!(order.reject_reason, Some(RejectReason::MalformedSpec));
    }

    #[test]
    fn test_sizing_monotonicity() {
        // P3: more risk never shrinks the size; a wider stop never grows it.
        let s = sizer();
        let spec = forex_spec();

        let mut last = 0.0;
        for risk in [0.002, 0.005, 0.01, 0.02] {
            let order = s.size(
                &spec,
                &SizingRequest {
                    entry_price: 1.1000,
                    stop_price: 1.0950,
                    risk_fraction: risk,
                    account_balance: 10_000.0,
                },
            );
            assert!(order.size >= last);
            last = order.size;
        }

        let mut last = f64::MAX;
        for pips in [10.0, 20.0, 40.0, 80.0] {
            let order = s.size(
                &spec,
                &SizingRequest {
                    entry_price: 1.1000,
                    stop_price: 1.1000 - pips * 0.0001,
                    risk_fraction: 0.01,
                    account_balance: 10_000.0,
                },
            );
            assert!(order.size <= last);
            last = order.size;
        }
    }

    #[test]
    fn test_bounds_and_step_multiple() {
        // P4: result within venue limits and a step multiple.
        let s = sizer();
        let spec = forex_spec();
        for (balance, risk, pips) in [
            (500.0, 0.001, 200.0),
            (10_000.0, 0.01, 20.0),
            (250_000.0, 0.02, 5.0),
        ] {
            let order = s.size(
                &spec,
                &SizingRequest {
                    entry_price: 1.1000,
                    stop_price: 1.1000 - pips * 0.0001,
                    risk_fraction: risk,
                    account_balance: balance,
                },
            );
            assert!(order.size >= spec.min_size);
            assert!(order.size <= spec.max_size);
            let steps = order.size / spec.step_size;
            assert!((steps - steps.round()).abs() < 1e-6, "size {} off-step", order.size);
        }
    }

    #[test]
    fn test_same_code_path_across_asset_classes() {
        // Gold: tick 0.01 worth 1.0 per lot-unit. 200 ticks at risk,
        // 100 risk cash -> 0.5 lots through the identical formula.
        let s = sizer();
        let gold = SymbolSpec {
            symbol: "XAUUSD".to_string(),
            tick_size: 0.01,
            tick_value: 1.0,
            min_size: 0.01,
            max_size: 50.0,
            step_size: 0.01,
        };
        let order = s.size(
            &gold,
            &SizingRequest {
                entry_price: 2000.0,
                stop_price: 1998.0,
                risk_fraction: 0.01,
                account_balance: 10_000.0,
            },
        );
        assert!((order.size - 0.5).abs() < 1e-9);

        // Index CFD: tick 0.25 worth 5.0. 40 ticks * 5.0 = 200 loss/unit,
        // 400 risk cash -> 2.0 contracts.
        let index = SymbolSpec {
            symbol: "US500".to_string(),
            tick_size: 0.25,
            tick_value: 5.0,
            min_size: 0.1,
            max_size: 20.0,
            step_size: 0.1,
        };
        let order = s.size(
            &index,
            &SizingRequest {
                entry_price: 5000.0,
                stop_price: 4990.0,
                risk_fraction: 0.02,
                account_balance: 20_000.0,
            },
        );
        assert!((order.size - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_margin_clamp_scales_down() {
        let s = sizer();
        let spec = forex_spec();
        // 5.0 lots need 5000 margin but only 2000 free: usable = 1800,
        // scaled = 5.0 * 1800/5000 = 1.8.
        let clamped = s.apply_margin_clamp(&spec, 5.0, 5000.0, 2000.0);
        assert!((clamped - 1.8).abs() < 1e-9);

        // Enough margin: untouched.
        let untouched = s.apply_margin_clamp(&spec, 5.0, 5000.0, 10_000.0);
        assert!((untouched - 5.0).abs() < 1e-9);
    }
}
