use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SellReason {
    /// Hold time elapsed.
    Scheduled,
    /// The tracked wallet sold the same token.
    CopySell,
}

impl SellReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SellReason::Scheduled => "scheduled",
            SellReason::CopySell => "copy_sell",
        }
    }
}

impl fmt::Display for SellReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeStatus {
    Bought,
    Sold,
    Failed,
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TradeStatus::Bought => "bought",
            TradeStatus::Sold => "sold",
            TradeStatus::Failed => "failed",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitState {
    Pending,
    /// A capped sell sequence ran out of attempts. The position is still held.
    Failed,
}

/// A currently held position awaiting exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveTrade {
    pub buy_time: DateTime<Utc>,
    pub scheduled_sell_time: DateTime<Utc>,
    pub current_sell_slippage: f64,
    pub exit_state: ExitState,
}

impl ActiveTrade {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.exit_state == ExitState::Pending && now >= self.scheduled_sell_time
    }
}

/// Most recent buy/sell cycle of a token. Overwritten on re-buy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeHistoryRecord {
    pub buy_time: DateTime<Utc>,
    pub buy_amount: f64,
    pub buy_slippage: f64,
    pub status: TradeStatus,
    pub sell_time: Option<DateTime<Utc>>,
    pub final_sell_slippage: Option<f64>,
    pub sell_attempts: Option<u32>,
    pub sell_reason: Option<SellReason>,
}

impl TradeHistoryRecord {
    pub fn bought(buy_time: DateTime<Utc>, buy_amount: f64, buy_slippage: f64) -> Self {
        Self {
            buy_time,
            buy_amount,
            buy_slippage,
            status: TradeStatus::Bought,
            sell_time: None,
            final_sell_slippage: None,
            sell_attempts: None,
            sell_reason: None,
        }
    }
}

/// Terminal lifecycle transitions, published for notifiers.
#[derive(Debug, Clone, PartialEq)]
pub enum TradeEvent {
    Bought {
        token: String,
        attempts: u32,
        sol_amount: f64,
        slippage: f64,
    },
    BuyAbandoned {
        token: String,
        attempts: u32,
    },
    Sold {
        token: String,
        reason: SellReason,
        attempts: u32,
        slippage: f64,
    },
    ExitFailed {
        token: String,
        reason: SellReason,
        attempts: u32,
        slippage: f64,
    },
}

impl TradeEvent {
    pub fn token(&self) -> &str {
        match self {
            TradeEvent::Bought { token, .. }
            | TradeEvent::BuyAbandoned { token, .. }
            | TradeEvent::Sold { token, .. }
            | TradeEvent::ExitFailed { token, .. } => token,
        }
    }

    pub fn is_alert(&self) -> bool {
        matches!(self, TradeEvent::ExitFailed { .. })
    }
}

impl fmt::Display for TradeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeEvent::Bought {
                token,
                attempts,
                sol_amount,
                slippage,
            } => write!(
                f,
                "BOUGHT {token}: {sol_amount} SOL at {slippage}% slippage (attempt {attempts})"
            ),
            TradeEvent::BuyAbandoned { token, attempts } => {
                write!(f, "BUY ABANDONED {token} after {attempts} attempts")
            }
            TradeEvent::Sold {
                token,
                reason,
                attempts,
                slippage,
            } => write!(
                f,
                "SOLD {token} ({reason}): {slippage}% slippage after {attempts} attempts"
            ),
            TradeEvent::ExitFailed {
                token,
                reason,
                attempts,
                slippage,
            } => write!(
                f,
                "EXIT FAILED {token} ({reason}): still held after {attempts} attempts, last slippage {slippage}%"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn trade(exit_state: ExitState) -> ActiveTrade {
        let buy_time = Utc::now();
        ActiveTrade {
            buy_time,
            scheduled_sell_time: buy_time + Duration::seconds(10),
            current_sell_slippage: 30.0,
            exit_state,
        }
    }

    #[test]
    fn test_due_only_after_scheduled_time() {
        let t = trade(ExitState::Pending);
        assert!(!t.is_due(t.buy_time));
        assert!(t.is_due(t.scheduled_sell_time));
        assert!(t.is_due(t.scheduled_sell_time + Duration::seconds(1)));
    }

    #[test]
    fn test_failed_exit_is_never_due() {
        let t = trade(ExitState::Failed);
        assert!(!t.is_due(t.scheduled_sell_time + Duration::hours(1)));
    }

    #[test]
    fn test_event_display_names_token() {
        let ev = TradeEvent::Sold {
            token: "ABCpump".into(),
            reason: SellReason::CopySell,
            attempts: 2,
            slippage: 35.0,
        };
        let text = ev.to_string();
        assert!(text.contains("ABCpump"));
        assert!(text.contains("copy_sell"));
        assert!(!ev.is_alert());
    }
}
