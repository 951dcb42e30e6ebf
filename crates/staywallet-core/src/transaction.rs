//! Ledger transaction types.
//!
//! Every balance change writes exactly one [`WalletTransaction`] carrying
//! before/after snapshots of both balances. Records are immutable except for a
//! pending credit, which moves to `completed` once its hold is settled
//! (released or reversed).

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WalletError};
use crate::wallet::{BalanceSnapshot, Bucket, Wallet};
use crate::{BookingId, TransactionId, UserId, WalletId};

/// An audit record of one balance change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletTransaction {
    /// Unique transaction ID (ULID for time-ordering).
    pub id: TransactionId,

    /// The wallet whose balance changed.
    pub wallet_id: WalletId,

    /// The wallet owner.
    pub user_id: UserId,

    /// Type of transaction.
    pub transaction_type: TransactionType,

    /// Which balance the entry moved.
    pub bucket: Bucket,

    /// Unsigned amount. The sign follows from `transaction_type`.
    pub amount: Decimal,

    /// Sum of both balances before the entry.
    pub balance_before: Decimal,

    /// Sum of both balances after the entry.
    pub balance_after: Decimal,

    /// Available balance before the entry.
    pub available_balance_before: Decimal,

    /// Available balance after the entry.
    pub available_balance_after: Decimal,

    /// Pending balance before the entry.
    pub pending_balance_before: Decimal,

    /// Pending balance after the entry.
    pub pending_balance_after: Decimal,

    /// Settlement status.
    pub status: TransactionStatus,

    /// Unique idempotency key.
    pub reference: String,

    /// The booking this entry settles, if any.
    pub booking_id: Option<BookingId>,

    /// When the hold unlocks. Only set on pending credits.
    pub release_date: Option<NaiveDate>,

    /// The entry this one reverses, refunds, or mirrors.
    pub related_transaction_id: Option<TransactionId>,

    /// Human-readable description.
    pub description: String,

    /// Typed details for this kind of entry.
    pub metadata: TransactionMetadata,

    /// When the entry was written.
    pub created_at: DateTime<Utc>,

    /// When the entry reached `completed`.
    pub completed_at: Option<DateTime<Utc>>,
}

impl WalletTransaction {
    /// Post a new entry against a wallet, computing the snapshots.
    ///
    /// The wallet is not modified; apply [`WalletTransaction::after`] to it when
    /// committing. A failed entry records the attempt only: its after
    /// snapshot equals the before snapshot.
    ///
    /// # Errors
    ///
    /// Returns `WalletError::InsufficientBalance` if the entry would drive the
    /// affected balance below zero.
    pub fn post(wallet: &Wallet, posting: Posting, at: DateTime<Utc>) -> Result<Self> {
        let before = wallet.snapshot();
        let delta = if posting.status == TransactionStatus::Failed {
            Decimal::ZERO
        } else {
            posting.transaction_type.sign() * posting.amount
        };
        let after = before.with_delta(posting.bucket, delta);

        if after.get(posting.bucket) < Decimal::ZERO {
            return Err(WalletError::InsufficientBalance {
                available: before.get(posting.bucket),
                required: posting.amount,
            });
        }

        let release_date = match &posting.metadata {
            TransactionMetadata::PendingCredit { release_date, .. } => Some(*release_date),
            _ => None,
        };

        let completed_at = (posting.status == TransactionStatus::Completed).then_some(at);

        Ok(Self {
            id: TransactionId::generate(),
            wallet_id: wallet.id,
            user_id: wallet.user_id,
            transaction_type: posting.transaction_type,
            bucket: posting.bucket,
            amount: posting.amount,
            balance_before: before.total(),
            balance_after: after.total(),
            available_balance_before: before.available,
            available_balance_after: after.available,
            pending_balance_before: before.pending,
            pending_balance_after: after.pending,
            status: posting.status,
            reference: posting.reference,
            booking_id: posting.booking_id,
            release_date,
            related_transaction_id: posting.related_transaction_id,
            description: posting.description,
            metadata: posting.metadata,
            created_at: at,
            completed_at,
        })
    }

    /// Balances right after this entry.
    #[must_use]
    pub fn after(&self) -> BalanceSnapshot {
        BalanceSnapshot {
            available: self.available_balance_after,
            pending: self.pending_balance_after,
        }
    }

    /// Contribution of this entry to the wallet total.
    ///
    /// Failed entries contribute nothing. Pending credits count, since their
    /// amount sits in the pending balance until settled.
    #[must_use]
    pub fn signed_amount(&self) -> Decimal {
        if self.status == TransactionStatus::Failed {
            return Decimal::ZERO;
        }
        self.transaction_type.sign() * self.amount
    }

    /// Whether this is a hold that has not been settled yet.
    #[must_use]
    pub fn is_open_hold(&self) -> bool {
        self.status == TransactionStatus::Pending
            && matches!(self.metadata, TransactionMetadata::PendingCredit { .. })
    }

    /// Settle a pending credit, stamping completion.
    ///
    /// # Errors
    ///
    /// Returns `WalletError::Validation` if the entry is not an open hold.
    pub fn settle_hold(&mut self, at: DateTime<Utc>, released: bool) -> Result<()> {
        let TransactionMetadata::PendingCredit { released_at, .. } = &mut self.metadata else {
            return Err(WalletError::Validation(format!(
                "transaction {} is not a pending credit",
                self.id
            )));
        };
        if self.status != TransactionStatus::Pending {
            return Err(WalletError::Validation(format!(
                "pending credit {} is already settled",
                self.id
            )));
        }

        if released {
            *released_at = Some(at);
        }
        self.status = TransactionStatus::Completed;
        self.completed_at = Some(at);
        Ok(())
    }
}

/// Input for [`WalletTransaction::post`].
#[derive(Debug, Clone)]
pub struct Posting {
    /// Type of entry.
    pub transaction_type: TransactionType,
    /// Balance to move.
    pub bucket: Bucket,
    /// Validated positive amount.
    pub amount: Decimal,
    /// Status at creation.
    pub status: TransactionStatus,
    /// Idempotency key.
    pub reference: String,
    /// Description.
    pub description: String,
    /// Typed details.
    pub metadata: TransactionMetadata,
    /// Related booking.
    pub booking_id: Option<BookingId>,
    /// Related transaction.
    pub related_transaction_id: Option<TransactionId>,
}

impl Posting {
    /// Start a completed posting.
    #[must_use]
    pub fn new(
        transaction_type: TransactionType,
        bucket: Bucket,
        amount: Decimal,
        reference: impl Into<String>,
        metadata: TransactionMetadata,
    ) -> Self {
        Self {
            transaction_type,
            bucket,
            amount,
            status: TransactionStatus::Completed,
            reference: reference.into(),
            description: String::new(),
            metadata,
            booking_id: None,
            related_transaction_id: None,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the creation status.
    #[must_use]
    pub fn with_status(mut self, status: TransactionStatus) -> Self {
        self.status = status;
        self
    }

    /// Link a booking.
    #[must_use]
    pub fn for_booking(mut self, booking_id: Option<BookingId>) -> Self {
        self.booking_id = booking_id;
        self
    }

    /// Link a related transaction.
    #[must_use]
    pub fn related_to(mut self, transaction_id: Option<TransactionId>) -> Self {
        self.related_transaction_id = transaction_id;
        self
    }
}

/// Type of ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Funds added (funding, pending booking credit).
    Credit,
    /// Funds removed (payment, pending reversal).
    Debit,
    /// Funds returned to a payer.
    Refund,
    /// Payout to an external account.
    Withdrawal,
    /// Incoming side of a wallet-to-wallet transfer.
    TransferIn,
    /// Outgoing side of a wallet-to-wallet transfer.
    TransferOut,
}

impl TransactionType {
    /// Check if this transaction type adds funds.
    #[must_use]
    pub const fn is_credit(&self) -> bool {
        matches!(self, Self::Credit | Self::Refund | Self::TransferIn)
    }

    /// Check if this transaction type removes funds.
    #[must_use]
    pub const fn is_debit(&self) -> bool {
        !self.is_credit()
    }

    /// `+1` for credits, `-1` for debits.
    #[must_use]
    pub fn sign(&self) -> Decimal {
        if self.is_credit() {
            Decimal::ONE
        } else {
            Decimal::NEGATIVE_ONE
        }
    }
}

/// Transaction status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Hold not yet settled.
    Pending,
    /// Applied.
    Completed,
    /// Not applied.
    Failed,
}

/// Typed details per kind of ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransactionMetadata {
    /// Top-up from the payment gateway.
    Funding {
        /// The gateway's reference for the payment.
        gateway_reference: Option<String>,
    },

    /// Operator or caller initiated credit/debit.
    Manual {
        /// Free-form note.
        note: Option<String>,
    },

    /// Booking payment held until check-in.
    PendingCredit {
        /// When the hold unlocks.
        release_date: NaiveDate,
        /// When the hold was released to the available balance.
        released_at: Option<DateTime<Utc>>,
    },

    /// Reversal of a hold before it was released.
    PendingReversal {
        /// Why the hold was reversed.
        reason: String,
    },

    /// Refund to a payer.
    Refund {
        /// The entry being refunded.
        original_transaction_id: Option<TransactionId>,
        /// Why the refund was issued.
        reason: Option<String>,
    },

    /// One side of a wallet-to-wallet transfer.
    Transfer {
        /// The other party.
        counterparty: UserId,
    },
}
