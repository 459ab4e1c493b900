use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use common::models::{
    ActiveTrade, ExitState, SellReason, TradeHistoryRecord, TradeStatus,
};

use crate::{
    summary,
    token_locks::{TokenGuard, TokenLocks},
};

#[derive(Debug, Clone, PartialEq)]
pub struct BuyFill {
    pub buy_time: DateTime<Utc>,
    pub hold_time: TimeDelta,
    pub sol_amount: f64,
    pub buy_slippage: f64,
    pub base_sell_slippage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SellFill {
    pub sell_time: DateTime<Utc>,
    pub slippage: f64,
    pub attempts: u32,
    pub reason: SellReason,
}

/// Process-local record of held positions and the last cycle per token.
///
/// Reads are open to anyone. Every mutation takes the token's [`TokenGuard`],
/// so a read-modify-write for one token cannot interleave with another.
#[derive(Default)]
pub struct TradeLedger {
    active: Mutex<HashMap<String, ActiveTrade>>,
    history: Mutex<HashMap<String, TradeHistoryRecord>>,
    locks: TokenLocks,
}

impl TradeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock_token(&self, token: &str) -> TokenGuard {
        self.locks.lock(token).await
    }

    pub async fn try_lock_token(&self, token: &str) -> Option<TokenGuard> {
        self.locks.try_lock(token).await
    }

    pub async fn prune_locks(&self) -> usize {
        self.locks.prune().await
    }

    pub async fn is_active(&self, token: &str) -> bool {
        self.active.lock().await.contains_key(token)
    }

    pub async fn active_trade(&self, token: &str) -> Option<ActiveTrade> {
        self.active.lock().await.get(token).cloned()
    }

    /// Copy of all active trades; callers iterate this, not the live map.
    pub async fn snapshot(&self) -> Vec<(String, ActiveTrade)> {
        let active = self.active.lock().await;
        let mut trades: Vec<_> = active
            .iter()
            .map(|(token, trade)| (token.clone(), trade.clone()))
            .collect();
        trades.sort_by(|a, b| a.1.scheduled_sell_time.cmp(&b.1.scheduled_sell_time));
        trades
    }

    pub async fn history(&self, token: &str) -> Option<TradeHistoryRecord> {
        self.history.lock().await.get(token).cloned()
    }

    pub async fn history_snapshot(&self) -> Vec<(String, TradeHistoryRecord)> {
        let history = self.history.lock().await;
        let mut records: Vec<_> = history
            .iter()
            .map(|(token, record)| (token.clone(), record.clone()))
            .collect();
        records.sort_by(|a, b| a.1.buy_time.cmp(&b.1.buy_time));
        records
    }

    /// Resets the sell slippage of an existing position before a re-buy.
    /// Returns `false` when the token is not held.
    pub async fn reset_sell_slippage(&self, guard: &TokenGuard, base: f64) -> bool {
        let mut active = self.active.lock().await;
        match active.get_mut(guard.token()) {
            Some(trade) => {
                trade.current_sell_slippage = base;
                true
            }
            None => false,
        }
    }

    /// Opens (or replaces) the position and starts a fresh history cycle.
    pub async fn record_buy(&self, guard: &TokenGuard, fill: &BuyFill) -> ActiveTrade {
        let trade = ActiveTrade {
            buy_time: fill.buy_time,
            scheduled_sell_time: fill.buy_time + fill.hold_time,
            current_sell_slippage: fill.base_sell_slippage,
            exit_state: ExitState::Pending,
        };

        self.active
            .lock()
            .await
            .insert(guard.token().to_string(), trade.clone());
        self.history.lock().await.insert(
            guard.token().to_string(),
            TradeHistoryRecord::bought(fill.buy_time, fill.sol_amount, fill.buy_slippage),
        );

        debug!(
            "Ledger: {} active until {}",
            guard.token(),
            trade.scheduled_sell_time
        );
        trade
    }

    /// Persists an escalated slippage so concurrent readers see it.
    pub async fn update_sell_slippage(&self, guard: &TokenGuard, slippage: f64) {
        if let Some(trade) = self.active.lock().await.get_mut(guard.token()) {
            trade.current_sell_slippage = slippage;
        }
    }

    /// Closes the position. Returns the removed trade, if it was held.
    pub async fn record_sell(&self, guard: &TokenGuard, fill: &SellFill) -> Option<ActiveTrade> {
        if let Some(record) = self.history.lock().await.get_mut(guard.token()) {
            record.sell_time = Some(fill.sell_time);
            record.final_sell_slippage = Some(fill.slippage);
            record.sell_attempts = Some(fill.attempts);
            record.sell_reason = Some(fill.reason);
            record.status = TradeStatus::Sold;
        }
        self.active.lock().await.remove(guard.token())
    }

    /// Marks an exit as given up. The position stays active so that a later
    /// copy-sell or re-buy can still act on it.
    pub async fn record_exit_failure(
        &self,
        guard: &TokenGuard,
        slippage: f64,
        attempts: u32,
        reason: SellReason,
    ) {
        if let Some(trade) = self.active.lock().await.get_mut(guard.token()) {
            trade.current_sell_slippage = slippage;
            trade.exit_state = ExitState::Failed;
        }
        if let Some(record) = self.history.lock().await.get_mut(guard.token()) {
            record.final_sell_slippage = Some(slippage);
            record.sell_attempts = Some(attempts);
            record.sell_reason = Some(reason);
            record.status = TradeStatus::Failed;
        }
    }

    /// Human-readable listing of every recorded cycle.
    pub async fn summary(&self) -> String {
        summary::render(&self.history_snapshot().await)
    }

    pub async fn active_summary(&self) -> String {
        summary::render_active(&self.snapshot().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(at: DateTime<Utc>) -> BuyFill {
        BuyFill {
            buy_time: at,
            hold_time: TimeDelta::seconds(60),
            sol_amount: 0.01,
            buy_slippage: 30.0,
            base_sell_slippage: 30.0,
        }
    }

    #[tokio::test]
    async fn test_buy_then_sell_cycle() {
        let ledger = TradeLedger::new();
        let now = Utc::now();
        let guard = ledger.lock_token("ABCpump").await;

        let trade = ledger.record_buy(&guard, &fill(now)).await;
        assert_eq!(trade.scheduled_sell_time, now + TimeDelta::seconds(60));
        assert!(ledger.is_active("ABCpump").await);
        assert_eq!(
            ledger.history("ABCpump").await.unwrap().status,
            TradeStatus::Bought
        );

        ledger.update_sell_slippage(&guard, 45.0).await;
        assert_eq!(
            ledger.active_trade("ABCpump").await.unwrap().current_sell_slippage,
            45.0
        );

        let removed = ledger
            .record_sell(
                &guard,
                &SellFill {
                    sell_time: now,
                    slippage: 45.0,
                    attempts: 4,
                    reason: SellReason::Scheduled,
                },
            )
            .await;
        assert!(removed.is_some());
        assert!(!ledger.is_active("ABCpump").await);

        let record = ledger.history("ABCpump").await.unwrap();
        assert_eq!(record.status, TradeStatus::Sold);
        assert_eq!(record.sell_attempts, Some(4));
        assert_eq!(record.final_sell_slippage, Some(45.0));
        assert_eq!(record.sell_reason, Some(SellReason::Scheduled));
    }

    #[tokio::test]
    async fn test_rebuy_overwrites_history() {
        let ledger = TradeLedger::new();
        let first = Utc::now();
        let guard = ledger.lock_token("ABCpump").await;
        ledger.record_buy(&guard, &fill(first)).await;
        ledger
            .record_sell(
                &guard,
                &SellFill {
                    sell_time: first,
                    slippage: 30.0,
                    attempts: 1,
                    reason: SellReason::CopySell,
                },
            )
            .await;

        let second = first + TimeDelta::seconds(5);
        ledger.record_buy(&guard, &fill(second)).await;

        let record = ledger.history("ABCpump").await.unwrap();
        assert_eq!(record.buy_time, second);
        assert_eq!(record.status, TradeStatus::Bought);
        assert_eq!(record.sell_reason, None);
        assert_eq!(ledger.history_snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn test_reset_slippage_only_for_held_tokens() {
        let ledger = TradeLedger::new();
        let guard = ledger.lock_token("ABCpump").await;
        assert!(!ledger.reset_sell_slippage(&guard, 30.0).await);

        ledger.record_buy(&guard, &fill(Utc::now())).await;
        ledger.update_sell_slippage(&guard, 80.0).await;
        assert!(ledger.reset_sell_slippage(&guard, 30.0).await);
        assert_eq!(
            ledger.active_trade("ABCpump").await.unwrap().current_sell_slippage,
            30.0
        );
    }

    #[tokio::test]
    async fn test_exit_failure_keeps_position() {
        let ledger = TradeLedger::new();
        let guard = ledger.lock_token("ABCpump").await;
        ledger.record_buy(&guard, &fill(Utc::now())).await;
        ledger
            .record_exit_failure(&guard, 95.0, 20, SellReason::Scheduled)
            .await;

        let trade = ledger.active_trade("ABCpump").await.unwrap();
        assert_eq!(trade.exit_state, ExitState::Failed);
        assert_eq!(trade.current_sell_slippage, 95.0);

        let record = ledger.history("ABCpump").await.unwrap();
        assert_eq!(record.status, TradeStatus::Failed);
        assert_eq!(record.sell_attempts, Some(20));
        assert_eq!(record.sell_time, None);
    }

    #[tokio::test]
    async fn test_snapshot_is_detached_copy() {
        let ledger = TradeLedger::new();
        let now = Utc::now();
        for token in ["AAApump", "BBBstart"] {
            let guard = ledger.lock_token(token).await;
            ledger.record_buy(&guard, &fill(now)).await;
        }

        let snapshot = ledger.snapshot().await;
        let guard = ledger.lock_token("AAApump").await;
        ledger
            .record_sell(
                &guard,
                &SellFill {
                    sell_time: now,
                    slippage: 30.0,
                    attempts: 1,
                    reason: SellReason::CopySell,
                },
            )
            .await;

        assert_eq!(snapshot.len(), 2);
        assert_eq!(ledger.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn test_ledger_guard_serializes_token() {
        let ledger = std::sync::Arc::new(TradeLedger::new());
        let guard = ledger.lock_token("ABCpump").await;
        assert!(ledger.try_lock_token("ABCpump").await.is_none());
        assert!(ledger.try_lock_token("XYZstart").await.is_some());

        let waiter = {
            let ledger = ledger.clone();
            tokio::spawn(async move {
                let guard = ledger.lock_token("ABCpump").await;
                ledger.record_buy(&guard, &fill(Utc::now())).await;
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        assert!(!ledger.is_active("ABCpump").await);

        drop(guard);
        waiter.await.unwrap();
        assert!(ledger.is_active("ABCpump").await);
    }
}
