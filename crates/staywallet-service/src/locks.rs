//! Per-wallet pessimistic locks.
//!
//! Every read-modify-write on a wallet runs while holding that wallet's lock.
//! Two-wallet operations take both locks in ascending user-id order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use staywallet_core::UserId;

/// Registry of one async mutex per wallet owner.
#[derive(Debug, Default)]
pub struct WalletLocks {
    slots: Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>,
}

/// Held wallet locks. Dropping it releases them.
#[derive(Debug)]
pub struct WalletGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl WalletLocks {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, user_id: UserId) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(user_id).or_default())
    }

    /// Lock one wallet.
    pub async fn lock(&self, user_id: UserId) -> WalletGuard {
        let guard = self.slot(user_id).lock_owned().await;
        WalletGuard {
            _guards: vec![guard],
        }
    }

    /// Lock two wallets in ascending user-id order.
    pub async fn lock_pair(&self, a: UserId, b: UserId) -> WalletGuard {
        if a == b {
            return self.lock(a).await;
        }

        let (first, second) = if a < b { (a, b) } else { (b, a) };
        let first = self.slot(first).lock_owned().await;
        let second = self.slot(second).lock_owned().await;
        WalletGuard {
            _guards: vec![first, second],
        }
    }
}
