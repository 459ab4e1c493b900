use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::{sync::mpsc, task::JoinHandle, time};
use tracing::{debug, error, info};

use common::{
    actors::{Actor, ActorType, ControlMessage},
    models::SellReason,
    shutdown::Shutdown,
};

use super::retry_executor::{SellOutcome, TradeExecutor};

/// Triggers the exit of every trade whose hold time has elapsed.
pub struct SellScheduler {
    executor: Arc<TradeExecutor>,
}

impl SellScheduler {
    pub fn new(executor: Arc<TradeExecutor>) -> Self {
        Self { executor }
    }

    pub async fn tick(&self) -> Vec<(String, JoinHandle<SellOutcome>)> {
        self.tick_at(Utc::now()).await
    }

    /// Spawns one sell per due trade that nobody else is working on.
    /// Tokens whose lock is taken are left for a later tick.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> Vec<(String, JoinHandle<SellOutcome>)> {
        let ledger = self.executor.ledger();
        let mut started = Vec::new();

        for (token, trade) in ledger.snapshot().await {
            if !trade.is_due(now) {
                continue;
            }

            let Some(guard) = ledger.try_lock_token(&token).await else {
                debug!("{} is busy, checking again next tick", token);
                continue;
            };

            info!("Time to sell {}", token);
            let executor = self.executor.clone();
            let task_token = token.clone();
            let handle = tokio::spawn(async move {
                let outcome = executor
                    .execute_sell_locked(guard, SellReason::Scheduled)
                    .await;
                match outcome {
                    SellOutcome::NotHeld => {
                        debug!("{} was already sold before its scheduled exit", task_token)
                    }
                    SellOutcome::ExitFailed { attempts, .. } => {
                        error!("Scheduled exit of {} failed after {} attempts", task_token, attempts)
                    }
                    _ => {}
                }
                outcome
            });
            started.push((token, handle));
        }

        let pruned = ledger.prune_locks().await;
        if pruned > 0 {
            debug!("Pruned {} idle token locks", pruned);
        }
        started
    }
}

pub struct SchedulerService {
    scheduler: SellScheduler,
    shutdown: Shutdown,
}

#[async_trait]
impl Actor for SchedulerService {
    fn name(&self) -> ActorType {
        ActorType::SellScheduler
    }

    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
        let heartbeat_handle = self.spawn_heartbeat(supervisor_tx.clone());
        let period = self.scheduler.executor.config().poll_interval;
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        info!("Monitoring active trades every {:?}", period);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let started = self.scheduler.tick().await;
                    if !started.is_empty() {
                        debug!("Started {} scheduled exits", started.len());
                    }
                }
                _ = self.shutdown.wait() => break,
            }
        }

        info!("Sell scheduler stopped.");
        heartbeat_handle.abort();
        let _ = supervisor_tx.send(ControlMessage::Shutdown(self.name())).await;
        Ok(())
    }
}

impl SchedulerService {
    pub fn new(executor: Arc<TradeExecutor>, shutdown: Shutdown) -> Self {
        Self {
            scheduler: SellScheduler::new(executor),
            shutdown,
        }
    }
}
