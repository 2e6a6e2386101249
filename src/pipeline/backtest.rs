//! Historical simulation for the sweep & reclaim strategy
//!
//! Loads OHLCV candles from CSV, generates the signal vector with the exact
//! live detector logic, and simulates fixed stop-distance / reward-ratio
//! bracket exits with a forward scan. The grid sweep runs the whole
//! parameter matrix in parallel and scores each cell in R-multiples.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use rayon::prelude::*;
use serde::Deserialize;
use tracing::info;

use sweep_reclaim::trading_core::SweepDetector;
use sweep_reclaim::types::{Candle, Side};

/// One CSV row: epoch-seconds open time plus OHLCV.
#[derive(Debug, Deserialize)]
struct CandleRow {
    time: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: u64,
}

/// Load a candle series from CSV, oldest first.
pub fn load_candles(path: &Path) -> Result<Vec<Candle>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open candle file {}", path.display()))?;

    let mut candles = Vec::new();
    for row in reader.deserialize() {
        let row: CandleRow = row.context("Malformed candle row")?;
        let open_time = Utc
            .timestamp_opt(row.time, 0)
            .single()
            .with_context(|| format!("Invalid timestamp {}", row.time))?;
        candles.push(Candle {
            open_time,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        });
    }
    info!("Loaded {} candles from {}", candles.len(), path.display());
    Ok(candles)
}

/// Outcome of one simulated pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimSummary {
    pub signals: usize,
    pub wins: usize,
    pub losses: usize,
    /// Entries where neither bracket leg was hit before data ran out
    pub unresolved: usize,
    /// Net result in R-multiples: wins * rr - losses
    pub total_r: f64,
}

impl SimSummary {
    pub fn win_rate(&self) -> f64 {
        let resolved = self.wins + self.losses;
        if resolved == 0 {
            0.0
        } else {
            self.wins as f64 / resolved as f64
        }
    }
}

/// Simulate fixed-bracket exits over the signal vector.
///
/// Entry at the signal candle's close; stop at `stop_pips` against, target
/// at `stop_pips * rr` in favor. First-touch forward scan; when stop and
/// target print on the same candle the stop wins (conservative fill).
pub fn simulate(candles: &[Candle], detector: &SweepDetector, stop_pips: f64, rr: f64, pip_size: f64) -> SimSummary {
    let signals = detector.generate_signals(candles, 0);
    let stop_dist = stop_pips * pip_size;
    let target_dist = stop_dist * rr;

    let mut summary = SimSummary::default();
    for (idx, signal) in signals.iter().enumerate() {
        let Some(signal) = signal else { continue };
        summary.signals += 1;

        let entry = candles[idx].close;
        let (stop, target) = match signal.action {
            Side::Buy => (entry - stop_dist, entry + target_dist),
            Side::Sell => (entry + stop_dist, entry - target_dist),
        };

        let mut resolved = false;
        for future in &candles[idx + 1..] {
            let (stop_hit, target_hit) = match signal.action {
                Side::Buy => (future.low <= stop, future.high >= target),
                Side::Sell => (future.high >= stop, future.low <= target),
            };
            if stop_hit {
                summary.losses += 1;
                resolved = true;
                break;
            }
            if target_hit {
                summary.wins += 1;
                resolved = true;
                break;
            }
        }
        if !resolved {
            summary.unresolved += 1;
        }
    }

    summary.total_r = summary.wins as f64 * rr - summary.losses as f64;
    summary
}

/// One cell of the parameter grid.
#[derive(Debug, Clone, Copy)]
pub struct SweepResult {
    pub stop_pips: f64,
    pub rr: f64,
    pub summary: SimSummary,
}

/// Grid-search stop distance and reward ratio in parallel.
pub fn run_sweep(
    candles: &[Candle],
    lookback: usize,
    stop_buffer: f64,
    stops_pips: &[f64],
    rr_ratios: &[f64],
    pip_size: f64,
) -> Vec<SweepResult> {
    let detector = SweepDetector::new(lookback, stop_buffer);
    let n_signals = detector.generate_mask(candles, 0).iter().filter(|&&s| s).count();
    info!("Signal vector ready: {} signals over {} candles", n_signals, candles.len());

    let grid: Vec<(f64, f64)> = stops_pips
        .iter()
        .flat_map(|&sl| rr_ratios.iter().map(move |&rr| (sl, rr)))
        .collect();
    let total = grid.len();
    let done = AtomicUsize::new(0);

    let mut results: Vec<SweepResult> = grid
        .par_iter()
        .map(|&(stop_pips, rr)| {
            let summary = simulate(candles, &detector, stop_pips, rr, pip_size);
            let completed = done.fetch_add(1, Ordering::Relaxed) + 1;
            info!(
                "[{}/{}] SL={} pips RR=1:{} -> {:.2} R ({:.0}% win)",
                completed,
                total,
                stop_pips,
                rr,
                summary.total_r,
                summary.win_rate() * 100.0
            );
            SweepResult {
                stop_pips,
                rr,
                summary,
            }
        })
        .collect();

    results.sort_by(|a, b| {
        a.stop_pips
            .partial_cmp(&b.stop_pips)
            .unwrap()
            .then(a.rr.partial_cmp(&b.rr).unwrap())
    });
    results
}

/// Write the sweep grid to CSV for later inspection.
pub fn write_results(path: &Path, results: &[SweepResult]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record(["stop_pips", "rr", "signals", "wins", "losses", "total_r", "win_rate"])?;
    for r in results {
        writer.write_record([
            format!("{}", r.stop_pips),
            format!("{}", r.rr),
            format!("{}", r.summary.signals),
            format!("{}", r.summary.wins),
            format!("{}", r.summary.losses),
            format!("{:.2}", r.summary.total_r),
            format!("{:.4}", r.summary.win_rate()),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
