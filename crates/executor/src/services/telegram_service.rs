use std::{env, sync::Arc};

use teloxide::{prelude::*, utils::command::BotCommands};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use common::{models::TradeEvent, shutdown::Shutdown};
use ledger::TradeLedger;

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Trade bot commands:")]
pub enum Command {
    #[command(description = "show this text.")]
    Help,
    #[command(description = "every recorded trade cycle.")]
    Summary,
    #[command(description = "positions still held.")]
    Active,
}

/// Pushes trade events to one chat and answers its commands.
#[derive(Clone)]
pub struct TelegramService {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramService {
    /// `Ok(None)` when no bot is configured; a malformed chat id is an error.
    pub fn from_env() -> anyhow::Result<Option<Self>> {
        let token = env::var("TELEGRAM_BOT_TOKEN").ok().filter(|t| !t.is_empty());
        let chat = env::var("TELEGRAM_CHAT_ID").ok().filter(|c| !c.is_empty());

        let (Some(token), Some(chat)) = (token, chat) else {
            return Ok(None);
        };
        let chat_id = chat
            .parse::<i64>()
            .map_err(|_| anyhow::anyhow!("TELEGRAM_CHAT_ID must be a number, got {chat:?}"))?;

        Ok(Some(Self {
            bot: Bot::new(token),
            chat_id: ChatId(chat_id),
        }))
    }

    /// Forwards trade events until shutdown. Without a bot the events are
    /// only logged.
    pub async fn notify(
        service: Option<Self>,
        mut rx: broadcast::Receiver<TradeEvent>,
        shutdown: Shutdown,
    ) {
        info!("Starting trade event notifier");

        loop {
            let received = tokio::select! {
                res = rx.recv() => res,
                _ = shutdown.wait() => break,
            };

            match received {
                Ok(event) => {
                    let text = format_event(&event);
                    if event.is_alert() {
                        warn!("{}", text);
                    } else {
                        info!("{}", text);
                    }

                    if let Some(service) = &service {
                        // Send failures are logged, never fatal.
                        if let Err(e) = service.bot.send_message(service.chat_id, text).await {
                            error!("Failed to send Telegram message: {}", e);
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    error!("Notifier lagged behind. Missed {} events.", n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!("Trade event channel closed. Stopping notifier.");
                    break;
                }
            }
        }
    }

    /// Answers `/summary`, `/active` and `/help` from the configured chat only.
    pub async fn serve_commands(self, ledger: Arc<TradeLedger>, shutdown: Shutdown) {
        let chat_id = self.chat_id;
        let handler = Update::filter_message()
            .filter(move |msg: Message| msg.chat.id == chat_id)
            .filter_command::<Command>()
            .endpoint(answer);

        let mut dispatcher = Dispatcher::builder(self.bot, handler)
            .dependencies(dptree::deps![ledger])
            .default_handler(|_| async {})
            .build();

        info!("Listening for Telegram commands");
        tokio::select! {
            _ = dispatcher.dispatch() => {}
            _ = shutdown.wait() => {}
        }
        info!("Telegram command listener stopped.");
    }
}

async fn answer(bot: Bot, msg: Message, cmd: Command, ledger: Arc<TradeLedger>) -> ResponseResult<()> {
    let text = reply_for(&cmd, &ledger).await;
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn reply_for(cmd: &Command, ledger: &TradeLedger) -> String {
    match cmd {
        Command::Help => Command::descriptions().to_string(),
        Command::Summary => ledger.summary().await,
        Command::Active => ledger.active_summary().await,
    }
}

fn format_event(event: &TradeEvent) -> String {
    if event.is_alert() {
        format!("ALERT: {event}")
    } else {
        event.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, Utc};
    use common::models::SellReason;
    use ledger::BuyFill;

    #[test]
    fn test_command_parsing() {
        assert_eq!(Command::parse("/summary", "bot").unwrap(), Command::Summary);
        assert_eq!(Command::parse("/active", "bot").unwrap(), Command::Active);
        assert!(Command::parse("/sell ABCpump", "bot").is_err());
    }

    #[test]
    fn test_alerts_are_flagged() {
        let failed = TradeEvent::ExitFailed {
            token: "ABCpump".into(),
            reason: SellReason::Scheduled,
            attempts: 20,
            slippage: 95.0,
        };
        assert!(format_event(&failed).starts_with("ALERT: "));

        let sold = TradeEvent::Sold {
            token: "ABCpump".into(),
            reason: SellReason::CopySell,
            attempts: 1,
            slippage: 30.0,
        };
        assert_eq!(format_event(&sold), sold.to_string());
    }

    #[tokio::test]
    async fn test_replies_read_the_ledger() {
        let ledger = TradeLedger::new();
        assert_eq!(reply_for(&Command::Summary, &ledger).await, "No trades recorded");
        assert_eq!(reply_for(&Command::Active, &ledger).await, "No active trades");

        let guard = ledger.lock_token("ABCpump").await;
        ledger
            .record_buy(
                &guard,
                &BuyFill {
                    buy_time: Utc::now(),
                    hold_time: TimeDelta::seconds(1),
                    sol_amount: 0.01,
                    buy_slippage: 30.0,
                    base_sell_slippage: 30.0,
                },
            )
            .await;

        assert!(reply_for(&Command::Summary, &ledger).await.contains("Token: ABCpump"));
        assert!(reply_for(&Command::Active, &ledger).await.starts_with("ABCpump: sell at"));
        assert!(reply_for(&Command::Help, &ledger).await.contains("/summary"));
    }

    #[tokio::test]
    async fn test_notifier_without_bot_drains_until_shutdown() {
        let (tx, rx) = broadcast::channel(8);
        let (stop_tx, shutdown) = Shutdown::new();
        let handle = tokio::spawn(TelegramService::notify(None, rx, shutdown));

        tx.send(TradeEvent::BuyAbandoned {
            token: "ABCpump".into(),
            attempts: 5,
        })
        .unwrap();
        stop_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
