use dotenvy::dotenv;
use std::{env, sync::Arc, time::Duration};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use common::actors::ActorType;
use common::config::{TradingConfig, parse_bool};
use common::logger;
use common::models::{SwapSignal, TradeEvent};
use common::shutdown::Shutdown;
use ledger::TradeLedger;
use signals::remote::get_feed_url;
use signals::services::SignalGateway;
use trading::SwapTrader;
use trading::remote::{HttpSwapClient, PaperTrader};
use trading::services::{Dispatcher, DispatcherService, SchedulerService, TradeExecutor};

use crate::actors::supervisor::Supervisor;
use crate::services::TelegramService;

mod actors;
mod services;

/// Longer than one swap API round trip.
const TRADE_DRAIN_TIMEOUT: Duration = Duration::from_secs(35);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let log_dir = env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string());
    let _log_guard = logger::setup_logger(&log_dir);
    info!("System starting up...");

    let cfg = TradingConfig::from_env()?;
    info!(
        "Hold {}s, buy {} SOL at {}% (max {} attempts), sell {}% from {}% +{} up to {}%",
        cfg.hold_time.num_seconds(),
        cfg.sol_amount,
        cfg.buy_slippage,
        cfg.max_buy_attempts,
        cfg.sell_percentage,
        cfg.sell_slippage,
        cfg.slippage_increase,
        cfg.max_sell_slippage,
    );

    let dry_run = match env::var("DRY_RUN") {
        Ok(raw) if !raw.trim().is_empty() => parse_bool("DRY_RUN", &raw)?,
        _ => false,
    };
    let trader: Arc<dyn SwapTrader> = if dry_run {
        warn!("DRY_RUN enabled: swaps are simulated");
        Arc::new(PaperTrader)
    } else {
        Arc::new(HttpSwapClient::from_env()?)
    };

    let feed_url = get_feed_url()?;
    let target_channel = env::var("TARGET_CHANNEL_ID").ok().filter(|c| !c.is_empty());

    let (stop_tx, shutdown) = Shutdown::new();
    let (signal_tx, _) = broadcast::channel::<Arc<SwapSignal>>(1_024);
    let (event_tx, _) = broadcast::channel::<TradeEvent>(256);

    let ledger = Arc::new(TradeLedger::new());
    let executor = Arc::new(
        TradeExecutor::new(trader, ledger.clone(), cfg, shutdown.clone())
            .with_events(event_tx.clone()),
    );
    let dispatcher = Arc::new(Dispatcher::new(executor.clone(), executor.config().raydium_only));

    let telegram = TelegramService::from_env()?;
    if telegram.is_none() {
        info!("Telegram not configured, trade events are logged only");
    }
    let notifier = tokio::spawn(TelegramService::notify(
        telegram.clone(),
        event_tx.subscribe(),
        shutdown.clone(),
    ));
    let commands = telegram.map(|svc| tokio::spawn(svc.serve_commands(ledger.clone(), shutdown.clone())));

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, shutting down..."),
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
        let _ = stop_tx.send(true);
    });

    let mut supervisor = Supervisor::new(shutdown.clone());

    let tx_for_gateway = signal_tx.clone();
    let shutdown_for_gateway = shutdown.clone();
    supervisor.register_actor(
        ActorType::SignalGateway,
        Box::new(move || {
            Box::new(SignalGateway::new(
                feed_url.clone(),
                target_channel.clone(),
                tx_for_gateway.clone(),
                shutdown_for_gateway.clone(),
            ))
        }),
    );

    let tx_for_dispatcher = signal_tx.clone();
    let shutdown_for_dispatcher = shutdown.clone();
    supervisor.register_actor(
        ActorType::Dispatcher,
        Box::new(move || {
            Box::new(DispatcherService::new(
                dispatcher.clone(),
                tx_for_dispatcher.subscribe(),
                shutdown_for_dispatcher.clone(),
            ))
        }),
    );

    let executor_for_scheduler = executor.clone();
    let shutdown_for_scheduler = shutdown.clone();
    supervisor.register_actor(
        ActorType::SellScheduler,
        Box::new(move || {
            Box::new(SchedulerService::new(
                executor_for_scheduler.clone(),
                shutdown_for_scheduler.clone(),
            ))
        }),
    );

    supervisor.start().await;

    // Detached per-signal and per-trade tasks may still be writing to the ledger.
    if tokio::time::timeout(TRADE_DRAIN_TIMEOUT, executor.drain()).await.is_err() {
        warn!("Trades still in flight after {:?}, summary may be incomplete", TRADE_DRAIN_TIMEOUT);
    }

    let _ = notifier.await;
    if let Some(commands) = commands {
        let _ = commands.await;
    }

    info!("Trade summary:\n{}", ledger.summary().await);
    info!("Shutdown complete.");
    Ok(())
}
