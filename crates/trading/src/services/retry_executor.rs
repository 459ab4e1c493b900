use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use common::{
    config::TradingConfig,
    models::{SellReason, TradeEvent},
    shutdown::Shutdown,
};
use ledger::{BuyFill, SellFill, TokenGuard, TradeLedger};

use crate::traits::SwapTrader;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SellOutcome {
    Sold { attempts: u32, slippage: f64 },
    /// Nothing to sell: the token is not an active trade (benign race).
    NotHeld,
    /// `max_sell_attempts` reached; the position is still held.
    ExitFailed { attempts: u32, slippage: f64 },
    Cancelled,
}

impl SellOutcome {
    pub fn is_sold(&self) -> bool {
        matches!(self, SellOutcome::Sold { .. })
    }
}

/// Next slippage after a failed exit attempt, never above the cap.
pub fn next_slippage(current: f64, increase: f64, cap: f64) -> f64 {
    (current + increase).min(cap)
}

/// Wraps the swap primitive with the buy and sell retry policies and records
/// the outcome in the ledger.
pub struct TradeExecutor {
    trader: Arc<dyn SwapTrader>,
    ledger: Arc<TradeLedger>,
    cfg: TradingConfig,
    shutdown: Shutdown,
    event_tx: Option<broadcast::Sender<TradeEvent>>,
    in_flight: watch::Sender<usize>,
}

/// Counts one running buy or sell until dropped.
struct InFlight<'a>(&'a watch::Sender<usize>);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a watch::Sender<usize>) -> Self {
        counter.send_modify(|n| *n += 1);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.send_modify(|n| *n -= 1);
    }
}

impl TradeExecutor {
    pub fn new(
        trader: Arc<dyn SwapTrader>,
        ledger: Arc<TradeLedger>,
        cfg: TradingConfig,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            trader,
            ledger,
            cfg,
            shutdown,
            event_tx: None,
            in_flight: watch::Sender::new(0),
        }
    }

    pub fn with_events(mut self, tx: broadcast::Sender<TradeEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn ledger(&self) -> &Arc<TradeLedger> {
        &self.ledger
    }

    pub fn config(&self) -> &TradingConfig {
        &self.cfg
    }

    /// Resolves once no buy or sell is running. Operations that start after
    /// shutdown return before touching the ledger, so after a shutdown this
    /// is the point where the ledger is final.
    pub async fn drain(&self) {
        let mut rx = self.in_flight.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    fn publish(&self, event: TradeEvent) {
        if let Some(ref tx) = self.event_tx {
            let _ = tx.send(event);
        }
    }

    /// Bounded buy: up to `max_buy_attempts` calls, first success opens the
    /// position. Returns `false` if every attempt failed.
    pub async fn execute_buy(&self, token: &str) -> bool {
        let _in_flight = InFlight::enter(&self.in_flight);
        let guard = self.ledger.lock_token(token).await;

        if self
            .ledger
            .reset_sell_slippage(&guard, self.cfg.sell_slippage)
            .await
        {
            info!("Resetting sell slippage for existing token {}", token);
        }

        let max_attempts = self.cfg.max_buy_attempts;
        for attempt in 1..=max_attempts {
            if self.shutdown.is_triggered() {
                warn!("Shutdown during buy of {}, giving up", token);
                return false;
            }

            info!("Buy attempt {}/{} for {}", attempt, max_attempts, token);
            match self
                .trader
                .buy(token, self.cfg.sol_amount, self.cfg.buy_slippage)
                .await
            {
                Ok(true) => {
                    self.ledger
                        .record_buy(
                            &guard,
                            &BuyFill {
                                buy_time: Utc::now(),
                                hold_time: self.cfg.hold_time,
                                sol_amount: self.cfg.sol_amount,
                                buy_slippage: self.cfg.buy_slippage,
                                base_sell_slippage: self.cfg.sell_slippage,
                            },
                        )
                        .await;
                    info!("Successfully bought {}", token);
                    self.publish(TradeEvent::Bought {
                        token: token.to_string(),
                        attempts: attempt,
                        sol_amount: self.cfg.sol_amount,
                        slippage: self.cfg.buy_slippage,
                    });
                    return true;
                }
                Ok(false) => warn!("Buy attempt {} for {} was not filled", attempt, token),
                Err(e) => error!("Error during buy attempt {} for {}: {}", attempt, token, e),
            }

            if attempt < max_attempts && !self.shutdown.sleep(self.cfg.retry_delay).await {
                warn!("Shutdown during buy of {}, giving up", token);
                return false;
            }
        }

        warn!("Failed to buy {} after {} attempts", token, max_attempts);
        self.publish(TradeEvent::BuyAbandoned {
            token: token.to_string(),
            attempts: max_attempts,
        });
        false
    }

    /// Sells the whole configured percentage, escalating slippage on every
    /// failure. Waits for the token lock first.
    pub async fn execute_sell(&self, token: &str, reason: SellReason) -> SellOutcome {
        let _in_flight = InFlight::enter(&self.in_flight);
        let guard = self.ledger.lock_token(token).await;
        self.execute_sell_locked(guard, reason).await
    }

    /// Same as [`execute_sell`](Self::execute_sell) for callers that already
    /// hold the token lock.
    pub async fn execute_sell_locked(&self, guard: TokenGuard, reason: SellReason) -> SellOutcome {
        let _in_flight = InFlight::enter(&self.in_flight);
        let token = guard.token();

        let Some(trade) = self.ledger.active_trade(token).await else {
            info!("No active trade found for {}, cannot sell", token);
            return SellOutcome::NotHeld;
        };

        let mut slippage = trade.current_sell_slippage;
        let mut attempt: u32 = 1;
        info!(
            "Starting sell for {} with initial slippage {}% (reason: {})",
            token, slippage, reason
        );

        loop {
            if self.shutdown.is_triggered() {
                warn!("Shutdown during sell of {} at attempt {}", token, attempt);
                return SellOutcome::Cancelled;
            }

            info!("Sell attempt {} for {} with {}% slippage", attempt, token, slippage);
            match self
                .trader
                .sell(token, self.cfg.sell_percentage, slippage)
                .await
            {
                Ok(true) => {
                    self.ledger
                        .record_sell(
                            &guard,
                            &SellFill {
                                sell_time: Utc::now(),
                                slippage,
                                attempts: attempt,
                                reason,
                            },
                        )
                        .await;
                    info!("Successfully sold {} with {}% slippage", token, slippage);
                    self.publish(TradeEvent::Sold {
                        token: token.to_string(),
                        reason,
                        attempts: attempt,
                        slippage,
                    });
                    return SellOutcome::Sold {
                        attempts: attempt,
                        slippage,
                    };
                }
                Ok(false) => warn!("Sell attempt {} for {} was not filled", attempt, token),
                Err(e) => error!("Error during sell attempt {} for {}: {}", attempt, token, e),
            }

            if let Some(max) = self.cfg.max_sell_attempts {
                if attempt >= max {
                    error!(
                        "Giving up on selling {} after {} attempts at {}% slippage",
                        token, attempt, slippage
                    );
                    self.ledger
                        .record_exit_failure(&guard, slippage, attempt, reason)
                        .await;
                    self.publish(TradeEvent::ExitFailed {
                        token: token.to_string(),
                        reason,
                        attempts: attempt,
                        slippage,
                    });
                    return SellOutcome::ExitFailed {
                        attempts: attempt,
                        slippage,
                    };
                }
            }

            slippage = next_slippage(
                slippage,
                self.cfg.slippage_increase,
                self.cfg.max_sell_slippage,
            );
            self.ledger.update_sell_slippage(&guard, slippage).await;
            attempt += 1;
            debug!("Sell attempt failed, increasing slippage to {}%", slippage);

            if !self.shutdown.sleep(self.cfg.retry_delay).await {
                warn!("Shutdown during sell of {} at attempt {}", token, attempt);
                return SellOutcome::Cancelled;
            }
        }
    }
}
