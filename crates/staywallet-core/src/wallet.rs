//! Wallet types.
//!
//! A wallet holds two independent, never-negative balances: `available`
//! (spendable) and `pending` (held until a booking's check-in).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::money::DEFAULT_CURRENCY;
use crate::{UserId, WalletId};

/// A user's wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    /// Wallet id.
    pub id: WalletId,

    /// The owner. Unique across wallets.
    pub user_id: UserId,

    /// Spendable funds.
    pub available_balance: Decimal,

    /// Funds credited but locked until release.
    pub pending_balance: Decimal,

    /// ISO 4217 currency code.
    pub currency: String,

    /// Whether the wallet accepts user-initiated movements.
    pub status: WalletStatus,

    /// When the last ledger entry was written against this wallet.
    pub last_transaction_at: Option<DateTime<Utc>>,

    /// When the wallet was created.
    pub created_at: DateTime<Utc>,

    /// When the wallet was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Create an empty, active wallet for a user.
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            id: WalletId::generate(),
            user_id,
            available_balance: Decimal::ZERO,
            pending_balance: Decimal::ZERO,
            currency: DEFAULT_CURRENCY.to_string(),
            status: WalletStatus::Active,
            last_transaction_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sum of both balances.
    #[must_use]
    pub fn total_balance(&self) -> Decimal {
        self.available_balance + self.pending_balance
    }

    /// Whether the wallet is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == WalletStatus::Active
    }

    /// Snapshot of the current balances.
    #[must_use]
    pub fn snapshot(&self) -> BalanceSnapshot {
        BalanceSnapshot {
            available: self.available_balance,
            pending: self.pending_balance,
        }
    }

    /// Overwrite the balances from a snapshot and stamp the update time.
    pub fn apply(&mut self, snapshot: BalanceSnapshot, at: DateTime<Utc>) {
        self.available_balance = snapshot.available;
        self.pending_balance = snapshot.pending;
        self.last_transaction_at = Some(at);
        self.updated_at = at;
    }
}

/// Wallet status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletStatus {
    /// Normal operation.
    Active,

    /// Frozen for user-initiated movements; settlements still apply.
    Suspended,
}

/// Both balances of a wallet at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    /// Available balance.
    pub available: Decimal,
    /// Pending balance.
    pub pending: Decimal,
}

impl BalanceSnapshot {
    /// Sum of both balances.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.available + self.pending
    }

    /// Value of one balance.
    #[must_use]
    pub fn get(&self, bucket: Bucket) -> Decimal {
        match bucket {
            Bucket::Available => self.available,
            Bucket::Pending => self.pending,
        }
    }

    /// Return a copy with `delta` added to one balance.
    #[must_use]
    pub fn with_delta(self, bucket: Bucket, delta: Decimal) -> Self {
        match bucket {
            Bucket::Available => Self {
                available: self.available + delta,
                ..self
            },
            Bucket::Pending => Self {
                pending: self.pending + delta,
                ..self
            },
        }
    }
}

/// One of the two wallet balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    /// The available balance.
    Available,
    /// The pending balance.
    Pending,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn new_wallet_is_empty_and_active() {
        let wallet = Wallet::new(UserId::generate());
        assert_eq!(wallet.available_balance, Decimal::ZERO);
        assert_eq!(wallet.pending_balance, Decimal::ZERO);
        assert_eq!(wallet.currency, "NGN");
        assert!(wallet.is_active());
        assert!(wallet.last_transaction_at.is_none());
    }

    #[test]
    fn snapshot_delta_touches_one_bucket() {
        let snap = BalanceSnapshot {
            available: dec!(1000),
            pending: dec!(0),
        };
        let held = snap.with_delta(Bucket::Pending, dec!(500));
        assert_eq!(held.available, dec!(1000));
        assert_eq!(held.pending, dec!(500));
        assert_eq!(held.total(), dec!(1500));
    }

    #[test]
    fn apply_updates_balances_and_timestamps() {
        let mut wallet = Wallet::new(UserId::generate());
        let at = Utc::now();
        wallet.apply(
            BalanceSnapshot {
                available: dec!(800),
                pending: dec!(200),
            },
            at,
        );
        assert_eq!(wallet.total_balance(), dec!(1000));
        assert_eq!(wallet.last_transaction_at, Some(at));
    }
}
