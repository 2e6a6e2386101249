mod backtest;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use sweep_reclaim::trading_core::SweepDetector;

#[derive(Parser, Debug)]
#[command(name = "pipeline")]
#[command(about = "Sweep & reclaim backtesting and parameter optimization")]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Print verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Backtest the strategy on a historical candle file
    Backtest {
        /// CSV candle file (time,open,high,low,close,volume)
        #[arg(short, long)]
        data: PathBuf,

        /// Liquidity window lookback in candles
        #[arg(short, long, default_value = "96")]
        lookback: usize,

        /// Stop distance in pips
        #[arg(long, default_value = "20.0")]
        stop_pips: f64,

        /// Reward-to-risk ratio
        #[arg(long, default_value = "3.0")]
        rr: f64,

        /// Pip size in price units
        #[arg(long, default_value = "0.0001")]
        pip_size: f64,
    },

    /// Grid-search stop distance and reward ratio
    Sweep {
        /// CSV candle file (time,open,high,low,close,volume)
        #[arg(short, long)]
        data: PathBuf,

        /// Liquidity window lookback in candles
        #[arg(short, long, default_value = "96")]
        lookback: usize,

        /// Pip size in price units
        #[arg(long, default_value = "0.0001")]
        pip_size: f64,

        /// Output CSV for the result grid
        #[arg(short, long, default_value = "optimization_results.csv")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Commands::Backtest {
            data,
            lookback,
            stop_pips,
            rr,
            pip_size,
        } => {
            let candles = backtest::load_candles(&data)?;
            let detector = SweepDetector::new(lookback, 2.0 * pip_size);
            let summary = backtest::simulate(&candles, &detector, stop_pips, rr, pip_size);

            info!("=== BACKTEST RESULT ===");
            info!("Signals:    {}", summary.signals);
            info!("Wins:       {}", summary.wins);
            info!("Losses:     {}", summary.losses);
            info!("Unresolved: {}", summary.unresolved);
            info!("Win rate:   {:.1}%", summary.win_rate() * 100.0);
            info!("Total:      {:.2} R", summary.total_r);
        }

        Commands::Sweep {
            data,
            lookback,
            pip_size,
            output,
        } => {
            let candles = backtest::load_candles(&data)?;
            let stops = [5.0, 10.0, 15.0, 20.0, 30.0];
            let ratios = [1.5, 2.0, 3.0, 5.0, 10.0];

            let results =
                backtest::run_sweep(&candles, lookback, 2.0 * pip_size, &stops, &ratios, pip_size);

            println!("\n=== PARAMETER HEATMAP (Total R-Multiples) ===");
            print!("{:>8}", "SL\\RR");
            for rr in ratios {
                print!("{:>10.1}", rr);
            }
            println!();
            for sl in stops {
                print!("{:>8.0}", sl);
                for rr in ratios {
                    let cell = results
                        .iter()
                        .find(|r| r.stop_pips == sl && r.rr == rr)
                        .map(|r| r.summary.total_r)
                        .unwrap_or(0.0);
                    print!("{:>10.2}", cell);
                }
                println!();
            }

            if let Some(best) = results.iter().max_by(|a, b| {
                a.summary
                    .total_r
                    .partial_cmp(&b.summary.total_r)
                    .unwrap_or(std::cmp::Ordering::Equal)
            }) {
                println!("\nWINNER CONFIGURATION:");
                println!("Stop loss:   {} pips", best.stop_pips);
                println!(
                    "Take profit: 1:{} ({:.1} pips)",
                    best.rr,
                    best.stop_pips * best.rr
                );
                println!("Total gain:  {:.2} R", best.summary.total_r);
            }

            backtest::write_results(&output, &results)?;
            info!("Saved results to {}", output.display());
        }
    }

    Ok(())
}
