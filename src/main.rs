use anyhow::Result;
use clap::Parser;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use sweep_reclaim::bridge::{Broker, BridgeClient, SimBroker};
use sweep_reclaim::notify::TelegramNotifier;
use sweep_reclaim::trading::TradingSession;
use sweep_reclaim::{RunMode, Settings};

#[derive(Parser, Debug)]
#[command(author, version, about = "Liquidity sweep & reclaim trading bot")]
struct Args {
    /// Run mode: sim (connectivity dry-run) or live
    #[arg(short, long, default_value = "sim")]
    mode: String,

    /// Symbols to scan (comma-separated), overrides BOT_SYMBOLS
    #[arg(short, long)]
    symbols: Option<String>,

    /// Seconds between scan ticks
    #[arg(short, long)]
    interval: Option<u64>,

    /// Print verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("sweep_reclaim={level}"))),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut settings = Settings::from_env();
    if let Some(symbols) = args.symbols {
        settings.symbols = symbols
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if let Some(interval) = args.interval {
        settings.poll_interval_secs = interval;
    }

    let mode = match args.mode.to_lowercase().as_str() {
        "live" => RunMode::Live,
        "sim" | "simulation" => RunMode::Simulation,
        other => {
            warn!("Unknown mode '{}', defaulting to simulation", other);
            RunMode::Simulation
        }
    };

    info!("Starting sweep-reclaim bot");
    info!("Mode: {}", mode);
    info!("Symbols: {}", settings.symbols.join(", "));
    info!(
        "Risk: {:.1}% per trade, {:.1}% daily stop",
        settings.risk_per_trade * 100.0,
        settings.daily_loss_limit * 100.0
    );

    let notifier = TelegramNotifier::from_env();
    if let Some(n) = &notifier {
        n.send_alert(&format!(
            "🤖 Sweep-reclaim bot STARTED\nMode: {}\nRisk: {:.1}%",
            mode,
            settings.risk_per_trade * 100.0
        ))
        .await;
    } else {
        info!("Telegram alerts not configured");
    }

    match mode {
        RunMode::Live => {
            let broker = BridgeClient::from_env()?;
            broker.ensure_authenticated().await?;
            run_loop(&broker, settings, notifier).await
        }
        RunMode::Simulation => {
            // The sim venue starts with no market data: this mode exercises
            // the loop, gating and logging end to end without a terminal.
            // Historical runs belong to the pipeline binary.
            let broker = SimBroker::with_default_forex();
            info!("Simulation is a connectivity dry-run; use the pipeline binary for historical runs");
            run_loop(&broker, settings, notifier).await
        }
    }
}

/// The main polling loop: one tick, fixed delay, repeat. Connectivity loss
/// pauses trading entirely; no action is taken while disconnected.
async fn run_loop<B: Broker>(
    broker: &B,
    settings: Settings,
    notifier: Option<TelegramNotifier>,
) -> Result<()> {
    let interval = Duration::from_secs(settings.poll_interval_secs);
    let mut session = TradingSession::new(settings, notifier);

    info!("All systems green, entering main loop");
    loop {
        if !broker.ping().await {
            warn!("Venue unreachable, pausing and retrying");
            tokio::time::sleep(Duration::from_secs(5)).await;
            continue;
        }

        if let Err(e) = session.run_tick(broker).await {
            warn!("Tick failed: {e:#}");
        }

        tokio::time::sleep(interval).await;
    }
}
