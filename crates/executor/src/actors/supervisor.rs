use std::{collections::HashMap, time::Duration};
use tracing::{error, info, warn};

use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{self, Instant},
};

use common::shutdown::Shutdown;

use crate::actors::{Actor, ActorType, ControlMessage};

pub type ActorFactory = Box<dyn Fn() -> Box<dyn Actor> + Send + Sync>;

pub struct Supervisor {
    actor_factories: HashMap<ActorType, ActorFactory>,
    pulses: HashMap<ActorType, Instant>,
    handles: HashMap<ActorType, JoinHandle<()>>,
    shutdown: Shutdown,
    check_every: Duration,
    dead_after: Duration,
    grace: Duration,
}

impl Supervisor {
    pub fn new(shutdown: Shutdown) -> Self {
        Self {
            actor_factories: HashMap::new(),
            pulses: HashMap::new(),
            handles: HashMap::new(),
            shutdown,
            check_every: Duration::from_secs(1),
            dead_after: Duration::from_secs(3),
            grace: Duration::from_secs(5),
        }
    }

    pub fn with_timings(mut self, check_every: Duration, dead_after: Duration, grace: Duration) -> Self {
        self.check_every = check_every;
        self.dead_after = dead_after;
        self.grace = grace;
        self
    }

    pub fn register_actor(&mut self, actor_type: ActorType, factory: ActorFactory) {
        self.actor_factories.insert(actor_type, factory);
    }

    /// Runs until the shutdown signal fires, restarting actors whose
    /// heartbeat goes quiet. Returns once every actor has stopped.
    pub async fn start(&mut self) {
        let mut check_interval = time::interval(self.check_every);
        let (supervisor_tx, mut supervisor_rx) = mpsc::channel::<ControlMessage>(512);

        let actors: Vec<ActorType> = self.actor_factories.keys().copied().collect();
        for actor in actors {
            self.spawn_actor(actor, supervisor_tx.clone());
        }

        let shutdown = self.shutdown.clone();
        loop {
            tokio::select! {
                Some(msg) = supervisor_rx.recv() => self.handle_message(msg),

                _ = check_interval.tick() => {
                    let dead_timeout = Instant::now() - self.dead_after;

                    let dead_actors: Vec<ActorType> = self
                        .pulses
                        .iter()
                        .filter(|(_, last)| **last < dead_timeout)
                        .map(|(actor, _)| *actor)
                        .collect();

                    for actor in dead_actors {
                        warn!("{:?} is unresponsive! Restarting.", actor);
                        if let Some(handle) = self.handles.remove(&actor) {
                            handle.abort();
                        }
                        self.spawn_actor(actor, supervisor_tx.clone());
                    }
                }

                _ = shutdown.wait() => break,
            }
        }

        self.stop().await;
    }

    fn handle_message(&mut self, msg: ControlMessage) {
        match msg {
            ControlMessage::Heartbeat(actor_type) => {
                if self.handles.contains_key(&actor_type) {
                    self.pulses.insert(actor_type, Instant::now());
                }
            }
            ControlMessage::Shutdown(actor_type) => {
                warn!("{:?} is shutting down gracefully.", actor_type);
                self.pulses.remove(&actor_type);
                self.handles.remove(&actor_type);
            }
            ControlMessage::Error(actor_type, error_msg) => {
                error!("Actor {:?} reported error: {}", actor_type, error_msg);
            }
        }
    }

    /// Actors watch the same shutdown signal; give them a moment to finish
    /// before aborting whatever is left.
    async fn stop(&mut self) {
        info!("Stopping {} actors...", self.handles.len());
        self.pulses.clear();

        for (actor, mut handle) in self.handles.drain() {
            match time::timeout(self.grace, &mut handle).await {
                Ok(Ok(())) => info!("{:?} stopped.", actor),
                Ok(Err(e)) => error!("{:?} ended abnormally: {}", actor, e),
                Err(_) => {
                    warn!("{:?} did not stop in time, aborting.", actor);
                    handle.abort();
                }
            }
        }
    }

    fn spawn_actor(&mut self, actor_type: ActorType, tx: mpsc::Sender<ControlMessage>) {
        let Some(factory) = self.actor_factories.get(&actor_type) else {
            return;
        };
        let mut new_actor = factory();
        let new_actor_handle = tokio::spawn(async move {
            if let Err(e) = new_actor.run(tx).await {
                error!("Actor {:?} crashed: {}", actor_type, e);
            }
        });
        self.handles.insert(actor_type, new_actor_handle);
        self.pulses.insert(actor_type, Instant::now());
    }
}
