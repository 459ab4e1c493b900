use std::fmt::Write;

use chrono::{DateTime, Utc};

use common::models::{ActiveTrade, ExitState, TradeHistoryRecord};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn fmt_time(t: Option<DateTime<Utc>>, missing: &str) -> String {
    t.map(|t| t.format(TIME_FORMAT).to_string())
        .unwrap_or_else(|| missing.to_string())
}

fn fmt_opt<T: ToString>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_else(|| "N/A".to_string())
}

pub fn render(records: &[(String, TradeHistoryRecord)]) -> String {
    if records.is_empty() {
        return "No trades recorded".to_string();
    }

    let mut out = String::new();
    for (token, trade) in records {
        // Writing into a String cannot fail.
        let _ = writeln!(out, "Token: {token}");
        let _ = writeln!(out, "Status: {}", trade.status);
        let _ = writeln!(out, "Buy Time: {}", fmt_time(Some(trade.buy_time), ""));
        let _ = writeln!(out, "Sell Time: {}", fmt_time(trade.sell_time, "Not sold"));
        let _ = writeln!(out, "Buy Slippage: {}%", trade.buy_slippage);
        let _ = writeln!(
            out,
            "Final Sell Slippage: {}{}",
            fmt_opt(trade.final_sell_slippage),
            if trade.final_sell_slippage.is_some() { "%" } else { "" }
        );
        let _ = writeln!(out, "Sell Attempts: {}", fmt_opt(trade.sell_attempts));
        let _ = writeln!(out, "Sell Reason: {}", fmt_opt(trade.sell_reason));
        out.push_str(&"-".repeat(40));
        out.push('\n');
    }
    out.truncate(out.trim_end().len());
    out
}

/// One line per held position, soonest exit first.
pub fn render_active(trades: &[(String, ActiveTrade)]) -> String {
    if trades.is_empty() {
        return "No active trades".to_string();
    }

    trades
        .iter()
        .map(|(token, trade)| {
            let state = match trade.exit_state {
                ExitState::Pending => "sell at",
                ExitState::Failed => "exit failed, due since",
            };
            format!(
                "{token}: {state} {} (sell slippage {}%)",
                trade.scheduled_sell_time.format(TIME_FORMAT),
                trade.current_sell_slippage
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use common::models::{SellReason, TradeStatus};

    #[test]
    fn test_empty_summary() {
        assert_eq!(render(&[]), "No trades recorded");
    }

    #[test]
    fn test_open_and_closed_trades() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let open = TradeHistoryRecord::bought(t0, 0.01, 30.0);
        let mut closed = TradeHistoryRecord::bought(t0, 0.01, 30.0);
        closed.status = TradeStatus::Sold;
        closed.sell_time = Some(t0 + chrono::TimeDelta::seconds(65));
        closed.final_sell_slippage = Some(40.0);
        closed.sell_attempts = Some(3);
        closed.sell_reason = Some(SellReason::Scheduled);

        let text = render(&[("AAApump".into(), open), ("BBBstart".into(), closed)]);

        assert!(text.starts_with("Token: AAApump\nStatus: bought\nBuy Time: 2024-05-01 12:00:00"));
        assert!(text.contains("Sell Time: Not sold"));
        assert!(text.contains("Final Sell Slippage: N/A\n"));
        assert!(text.contains("Token: BBBstart\nStatus: sold"));
        assert!(text.contains("Sell Time: 2024-05-01 12:01:05"));
        assert!(text.contains("Final Sell Slippage: 40%"));
        assert!(text.contains("Sell Attempts: 3"));
        assert!(text.contains("Sell Reason: scheduled"));
        assert!(text.ends_with(&"-".repeat(40)));
    }

    #[test]
    fn test_active_listing() {
        assert_eq!(render_active(&[]), "No active trades");

        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let pending = ActiveTrade {
            buy_time: t0,
            scheduled_sell_time: t0 + chrono::TimeDelta::seconds(1),
            current_sell_slippage: 30.0,
            exit_state: ExitState::Pending,
        };
        let stuck = ActiveTrade {
            current_sell_slippage: 95.0,
            exit_state: ExitState::Failed,
            ..pending.clone()
        };

        let text = render_active(&[("AAApump".into(), pending), ("BBBstart".into(), stuck)]);
        assert_eq!(
            text,
            "AAApump: sell at 2024-05-01 12:00:01 (sell slippage 30%)\n\
             BBBstart: exit failed, due since 2024-05-01 12:00:01 (sell slippage 95%)"
        );
    }
}
