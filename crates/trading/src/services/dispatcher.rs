use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use common::{
    actors::{Actor, ActorType, ControlMessage},
    models::{Direction, SellReason, SignalKind, SwapSignal},
    shutdown::Shutdown,
};

use super::retry_executor::{SellOutcome, TradeExecutor};

const RAYDIUM: &str = "RAYDIUM";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    NotSwap,
    VenueFiltered,
    NoTokenAddress,
    NoDirection,
    /// Sell signal for a token we do not hold.
    NotHeld,
}

/// What the dispatcher did with one signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dispatch {
    Rejected(RejectReason),
    Buy(bool),
    CopySell(SellOutcome),
}

/// Routes interpreted signals to buy or copy-sell execution.
pub struct Dispatcher {
    executor: Arc<TradeExecutor>,
    raydium_only: bool,
}

impl Dispatcher {
    pub fn new(executor: Arc<TradeExecutor>, raydium_only: bool) -> Self {
        Self {
            executor,
            raydium_only,
        }
    }

    fn reject(reason: RejectReason) -> Dispatch {
        Dispatch::Rejected(reason)
    }

    pub async fn handle(&self, signal: &SwapSignal) -> Dispatch {
        if signal.kind != SignalKind::Swap {
            debug!("Ignoring non-swap notification: {:?}", signal.kind);
            return Self::reject(RejectReason::NotSwap);
        }

        if self.raydium_only && signal.source.as_deref() != Some(RAYDIUM) {
            info!("Skipping non-Raydium source: {:?}", signal.source);
            return Self::reject(RejectReason::VenueFiltered);
        }

        let Some(token) = signal.token_address.as_deref() else {
            warn!("No token address found in swap message");
            return Self::reject(RejectReason::NoTokenAddress);
        };

        match signal.direction {
            Direction::Buy => {
                info!("Detected buy swap for token: {}", token);
                Dispatch::Buy(self.executor.execute_buy(token).await)
            }
            Direction::Sell => {
                info!("Detected sell swap for token: {}", token);
                if !self.executor.ledger().is_active(token).await {
                    info!("No active trade found for {}, ignoring sell signal", token);
                    return Self::reject(RejectReason::NotHeld);
                }
                info!("Copying sell action for {}", token);
                Dispatch::CopySell(self.executor.execute_sell(token, SellReason::CopySell).await)
            }
            Direction::Unknown => {
                info!("Could not tell the swap direction for {}, ignoring", token);
                Self::reject(RejectReason::NoDirection)
            }
        }
    }
}

/// Actor wrapper: one task per signal, so a long exit on one token never
/// holds up signals for another.
pub struct DispatcherService {
    dispatcher: Arc<Dispatcher>,
    signal_rx: broadcast::Receiver<Arc<SwapSignal>>,
    shutdown: Shutdown,
}

#[async_trait]
impl Actor for DispatcherService {
    fn name(&self) -> ActorType {
        ActorType::Dispatcher
    }

    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
        let heartbeat_handle = self.spawn_heartbeat(supervisor_tx.clone());
        info!(
            "Starting Dispatcher (raydium_only={})",
            self.dispatcher.raydium_only
        );

        loop {
            let received = tokio::select! {
                res = self.signal_rx.recv() => res,
                _ = self.shutdown.wait() => break,
            };

            match received {
                Ok(signal) => {
                    let dispatcher = self.dispatcher.clone();
                    tokio::spawn(async move {
                        let outcome = dispatcher.handle(&signal).await;
                        debug!("Signal {:?} -> {:?}", signal.token_address, outcome);
                    });
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Dispatcher lagged: missed {} signals", n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    heartbeat_handle.abort();
                    supervisor_tx
                        .send(ControlMessage::Error(
                            self.name(),
                            "Signal channel closed unexpectedly.".to_string(),
                        ))
                        .await?;
                    anyhow::bail!("Signal channel closed unexpectedly.");
                }
            }
        }

        info!("Dispatcher stopped.");
        heartbeat_handle.abort();
        let _ = supervisor_tx.send(ControlMessage::Shutdown(self.name())).await;
        Ok(())
    }
}

impl DispatcherService {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        signal_rx: broadcast::Receiver<Arc<SwapSignal>>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            dispatcher,
            signal_rx,
            shutdown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::MockSwapTrader;
    use common::config::TradingConfig;
    use ledger::TradeLedger;
    use std::time::Duration;

    fn dispatcher(trader: MockSwapTrader, raydium_only: bool) -> Dispatcher {
        let executor = TradeExecutor::new(
            Arc::new(trader),
            Arc::new(TradeLedger::new()),
            TradingConfig {
                retry_delay: Duration::ZERO,
                ..TradingConfig::default()
            },
            Shutdown::never(),
        );
        Dispatcher::new(Arc::new(executor), raydium_only)
    }

    fn signal(source: &str, token: Option<&str>, direction: Direction) -> SwapSignal {
        SwapSignal {
            kind: SignalKind::Swap,
            source: Some(source.to_string()),
            token_address: token.map(str::to_owned),
            direction,
            ..SwapSignal::default()
        }
    }

    fn idle_trader() -> MockSwapTrader {
        let mut trader = MockSwapTrader::new();
        trader.expect_buy().never();
        trader.expect_sell().never();
        trader
    }

    #[tokio::test]
    async fn test_rejects_non_swap() {
        let d = dispatcher(idle_trader(), false);
        let mut s = signal("RAYDIUM", Some("ABCpump"), Direction::Buy);
        s.kind = SignalKind::Other;
        assert_eq!(d.handle(&s).await, Dispatch::Rejected(RejectReason::NotSwap));
    }

    #[tokio::test]
    async fn test_venue_filter() {
        let d = dispatcher(idle_trader(), true);
        let s = signal("JUPITER", Some("ABCpump"), Direction::Buy);
        assert_eq!(
            d.handle(&s).await,
            Dispatch::Rejected(RejectReason::VenueFiltered)
        );

        let mut no_source = signal("RAYDIUM", Some("ABCpump"), Direction::Buy);
        no_source.source = None;
        assert_eq!(
            d.handle(&no_source).await,
            Dispatch::Rejected(RejectReason::VenueFiltered)
        );
    }

    #[tokio::test]
    async fn test_venue_filter_off_accepts_any_source() {
        let mut trader = MockSwapTrader::new();
        trader.expect_buy().times(1).returning(|_, _, _| Ok(true));
        let d = dispatcher(trader, false);
        let s = signal("JUPITER", Some("ABCpump"), Direction::Buy);
        assert_eq!(d.handle(&s).await, Dispatch::Buy(true));
    }

    #[tokio::test]
    async fn test_rejects_missing_token_and_direction() {
        let d = dispatcher(idle_trader(), true);
        assert_eq!(
            d.handle(&signal("RAYDIUM", None, Direction::Buy)).await,
            Dispatch::Rejected(RejectReason::NoTokenAddress)
        );
        assert_eq!(
            d.handle(&signal("RAYDIUM", Some("ABCpump"), Direction::Unknown))
                .await,
            Dispatch::Rejected(RejectReason::NoDirection)
        );
    }

    #[tokio::test]
    async fn test_sell_signal_for_unheld_token_is_ignored() {
        let d = dispatcher(idle_trader(), true);
        let s = signal("RAYDIUM", Some("ABCpump"), Direction::Sell);
        assert_eq!(d.handle(&s).await, Dispatch::Rejected(RejectReason::NotHeld));
    }

    #[tokio::test]
    async fn test_buy_then_copy_sell() {
        let mut trader = MockSwapTrader::new();
        trader.expect_buy().times(1).returning(|_, _, _| Ok(true));
        trader.expect_sell().times(1).returning(|_, _, _| Ok(true));
        let d = dispatcher(trader, true);

        let buy = signal("RAYDIUM", Some("ABCpump"), Direction::Buy);
        assert_eq!(d.handle(&buy).await, Dispatch::Buy(true));

        let sell = signal("RAYDIUM", Some("ABCpump"), Direction::Sell);
        assert_eq!(
            d.handle(&sell).await,
            Dispatch::CopySell(SellOutcome::Sold {
                attempts: 1,
                slippage: 30.0
            })
        );
    }

    #[tokio::test]
    async fn test_service_stops_on_shutdown() {
        let (stop_tx, shutdown) = Shutdown::new();
        let (_signal_tx, signal_rx) = broadcast::channel(4);
        let (sup_tx, mut sup_rx) = mpsc::channel(64);
        let mut service =
            DispatcherService::new(Arc::new(dispatcher(idle_trader(), true)), signal_rx, shutdown);

        let handle = tokio::spawn(async move { service.run(sup_tx).await });
        stop_tx.send(true).unwrap();
        assert!(handle.await.unwrap().is_ok());

        let mut saw_shutdown = false;
        while let Ok(msg) = sup_rx.try_recv() {
            if matches!(msg, ControlMessage::Shutdown(ActorType::Dispatcher)) {
                saw_shutdown = true;
            }
        }
        assert!(saw_shutdown);
    }
}
