use std::time::Duration;

use tokio::{sync::watch, time};

/// Cloneable view of the process shutdown flag.
///
/// Long-running loops poll it at their suspension points. If the sending side
/// is dropped without ever signalling, the handle simply never fires.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self { rx })
    }

    /// A handle that is never triggered.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown has been signalled.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|stop| *stop).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Sleeps for `duration` unless shutdown fires first.
    ///
    /// Returns `false` when the sleep was cut short by shutdown.
    pub async fn sleep(&self, duration: Duration) -> bool {
        if self.is_triggered() {
            return false;
        }
        tokio::select! {
            _ = time::sleep(duration) => true,
            _ = self.wait() => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sleep_completes_without_signal() {
        let shutdown = Shutdown::never();
        assert!(shutdown.sleep(Duration::from_millis(5)).await);
        assert!(!shutdown.is_triggered());
    }

    #[tokio::test]
    async fn test_sleep_interrupted_by_signal() {
        let (tx, shutdown) = Shutdown::new();
        let sleeper = shutdown.clone();
        let handle = tokio::spawn(async move { sleeper.sleep(Duration::from_secs(60)).await });
        tx.send(true).unwrap();
        assert!(!handle.await.unwrap());
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn test_sleep_after_signal_returns_immediately() {
        let (tx, shutdown) = Shutdown::new();
        tx.send(true).unwrap();
        assert!(!shutdown.sleep(Duration::from_secs(60)).await);
    }
}
