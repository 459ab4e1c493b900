use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Exclusive right to mutate one token's ledger entries.
///
/// Held across the whole read-modify-write sequence of a buy or sell, including
/// the awaits on the trading primitive.
#[derive(Debug)]
pub struct TokenGuard {
    token: String,
    _guard: OwnedMutexGuard<()>,
}

impl TokenGuard {
    pub fn token(&self) -> &str {
        &self.token
    }
}

/// One async mutex per token address, created on first use.
///
/// Crate-private: guards only come out of [`TradeLedger`](crate::TradeLedger),
/// so every guard serializes against the ledger it is used with.
#[derive(Clone, Default)]
pub(crate) struct TokenLocks {
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl TokenLocks {
    async fn entry(&self, token: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(token.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Waits until the token is free.
    pub(crate) async fn lock(&self, token: &str) -> TokenGuard {
        let mutex = self.entry(token).await;
        TokenGuard {
            token: token.to_string(),
            _guard: mutex.lock_owned().await,
        }
    }

    /// `None` when someone else is working on the token right now.
    pub(crate) async fn try_lock(&self, token: &str) -> Option<TokenGuard> {
        let mutex = self.entry(token).await;
        mutex.try_lock_owned().ok().map(|guard| TokenGuard {
            token: token.to_string(),
            _guard: guard,
        })
    }

    /// Drops locks nobody holds or waits on. Clones are only handed out under
    /// the map lock, so a count of one means the map has the only reference.
    pub(crate) async fn prune(&self) -> usize {
        let mut locks = self.locks.lock().await;
        let before = locks.len();
        locks.retain(|_, m| Arc::strong_count(m) > 1);
        before - locks.len()
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }
}
