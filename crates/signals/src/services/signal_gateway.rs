use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info};
use url::Url;

use common::{
    actors::{Actor, ActorType, ControlMessage},
    models::SwapSignal,
    shutdown::Shutdown,
};

use crate::{interpreter, remote::ChannelMessage};

/// Reads relayed chat messages off the signal feed and broadcasts one
/// interpreted [`SwapSignal`] per embed.
pub struct SignalGateway {
    feed_url: Url,
    target_channel: Option<String>,
    signal_tx: broadcast::Sender<Arc<SwapSignal>>,
    shutdown: Shutdown,
}

#[async_trait]
impl Actor for SignalGateway {
    fn name(&self) -> ActorType {
        ActorType::SignalGateway
    }

    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
        let heartbeat_handle = self.spawn_heartbeat(supervisor_tx.clone());

        info!("Connecting to signal feed: {}", self.feed_url);

        'feed: loop {
            let connect = tokio::select! {
                res = tokio_tungstenite::connect_async(self.feed_url.as_str()) => res,
                _ = self.shutdown.wait() => break,
            };

            match connect {
                Ok((ws_stream, _)) => {
                    info!("Signal feed connected");
                    let (mut write, mut read) = ws_stream.split();

                    loop {
                        let msg = tokio::select! {
                            msg = read.next() => msg,
                            _ = self.shutdown.wait() => {
                                let _ = write.send(Message::Close(None)).await;
                                break 'feed;
                            }
                        };

                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                if let Err(e) = self.handle_text(text.as_str()) {
                                    supervisor_tx
                                        .send(ControlMessage::Error(
                                            self.name(),
                                            format!("Unreadable feed message: {}", e),
                                        ))
                                        .await?;
                                }
                            }
                            Some(Ok(Message::Ping(pg))) => {
                                let _ = write.send(Message::Pong(pg)).await;
                                debug!("Ping - Pong message sent to signal feed.");
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Signal feed closed the connection");
                                break;
                            }
                            Some(Err(e)) => {
                                error!("Signal feed error: {}", e);
                                break;
                            }
                            Some(Ok(_)) => continue,
                        }
                    }
                }
                Err(e) => {
                    error!("Feed connection failed: {}. Retrying in 2s...", e);
                    supervisor_tx
                        .send(ControlMessage::Error(
                            self.name(),
                            format!("Feed connection failed: {}", e),
                        ))
                        .await?;
                }
            }

            if !self.shutdown.sleep(Duration::from_secs(2)).await {
                break;
            }
        }

        info!("Signal gateway stopped.");
        heartbeat_handle.abort();
        let _ = supervisor_tx.send(ControlMessage::Shutdown(self.name())).await;
        Ok(())
    }
}

impl SignalGateway {
    pub fn new(
        feed_url: Url,
        target_channel: Option<String>,
        signal_tx: broadcast::Sender<Arc<SwapSignal>>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            feed_url,
            target_channel,
            signal_tx,
            shutdown,
        }
    }

    fn handle_text(&self, text: &str) -> Result<usize, crate::remote::FeedError> {
        let message = ChannelMessage::parse(text)?;
        if !message.is_from(self.target_channel.as_deref()) {
            return Ok(0);
        }

        info!(
            "New message in #{} from {}",
            message.channel_id,
            message.author.as_deref().unwrap_or("unknown")
        );

        let signals: Vec<SwapSignal> = message
            .into_payloads()
            .iter()
            .map(interpreter::interpret)
            .collect();

        let count = signals.len();
        for signal in signals {
            debug!("Interpreted signal: {:?}", signal);
            // No receivers just means nobody is dispatching yet.
            let _ = self.signal_tx.send(Arc::new(signal));
        }
        Ok(count)
    }
}
