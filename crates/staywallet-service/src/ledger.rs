//! Balance mutation API.
//!
//! Every mutation locks the wallet(s) it touches, re-reads the current rows,
//! computes before/after snapshots and commits the ledger entries together
//! with the wallet rows (and any booking or outbox rows) as one [`WriteSet`].
//! An error before the commit leaves the store untouched.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use staywallet_core::{
    validate_amount, Booking, BookingId, Bucket, FundState, Posting, Result, SettlementEvent,
    SettlementEventKind, TransactionId, TransactionMetadata, TransactionStatus, TransactionType,
    UserId, Wallet, WalletError, WalletStatus, WalletTransaction, DEFAULT_CURRENCY,
};
use staywallet_store::{Store, WriteSet};

use crate::collaborators::PaymentGateway;
use crate::locks::{WalletGuard, WalletLocks};

const DEFAULT_HISTORY_LIMIT: usize = 20;
const MAX_HISTORY_LIMIT: usize = 100;

/// Idempotency key of the pending credit holding a booking's funds.
#[must_use]
pub fn pending_credit_reference(booking_id: &BookingId) -> String {
    format!("pending-credit:{booking_id}")
}

/// Idempotency key of the reversal of a booking's pending credit.
#[must_use]
pub fn pending_reversal_reference(booking_id: &BookingId) -> String {
    format!("pending-reversal:{booking_id}")
}

/// Who may move money on a wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    /// User-initiated movements need an active wallet.
    ActiveOnly,
    /// Settlement movements go through on suspended wallets too.
    Settlement,
}

/// A refund to credit back to a payer.
#[derive(Debug, Clone)]
pub struct RefundRequest {
    /// Wallet to credit.
    pub user_id: UserId,
    /// Amount to return.
    pub amount: Decimal,
    /// Description shown in the history.
    pub description: String,
    /// Why the refund was issued.
    pub reason: Option<String>,
    /// The entry being refunded.
    pub original_transaction_id: Option<TransactionId>,
    /// The booking being refunded.
    pub booking_id: Option<BookingId>,
    /// Idempotency key. Generated when absent.
    pub reference: Option<String>,
}

impl RefundRequest {
    /// Start a refund request.
    #[must_use]
    pub fn new(user_id: UserId, amount: Decimal, description: impl Into<String>) -> Self {
        Self {
            user_id,
            amount,
            description: description.into(),
            reason: None,
            original_transaction_id: None,
            booking_id: None,
            reference: None,
        }
    }

    /// Link the refunded entry.
    #[must_use]
    pub fn refunding(mut self, transaction_id: TransactionId) -> Self {
        self.original_transaction_id = Some(transaction_id);
        self
    }

    /// Link the refunded booking.
    #[must_use]
    pub fn for_booking(mut self, booking_id: BookingId) -> Self {
        self.booking_id = Some(booking_id);
        self
    }

    /// Record why.
    #[must_use]
    pub fn because(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Use a caller-chosen idempotency key.
    #[must_use]
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

/// Both sides of a wallet-to-wallet transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct Transfer {
    /// Debit on the sender.
    pub outgoing: WalletTransaction,
    /// Credit on the receiver.
    pub incoming: WalletTransaction,
}

/// An outstanding hold.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingHold {
    /// The pending credit.
    pub transaction_id: TransactionId,
    /// Booking it belongs to.
    pub booking_id: Option<BookingId>,
    /// Held amount.
    pub amount: Decimal,
    /// When it unlocks.
    pub release_date: Option<NaiveDate>,
}

/// Pending balance with its breakdown.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingBalance {
    /// Wallet owner.
    pub user_id: UserId,
    /// Current pending balance.
    pub pending_balance: Decimal,
    /// Outstanding holds, newest first.
    pub holds: Vec<PendingHold>,
}

/// Filters for [`WalletLedger::get_transaction_history`].
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    /// Only this type.
    pub transaction_type: Option<TransactionType>,
    /// Only this status.
    pub status: Option<TransactionStatus>,
    /// Only entries for this booking.
    pub booking_id: Option<BookingId>,
    /// Created at or after.
    pub from: Option<DateTime<Utc>>,
    /// Created before.
    pub to: Option<DateTime<Utc>>,
    /// Page size (default 20, at most 100).
    pub limit: Option<usize>,
    /// Entries to skip.
    pub offset: usize,
}

impl TransactionFilter {
    fn matches(&self, tx: &WalletTransaction) -> bool {
        self.transaction_type.map_or(true, |t| tx.transaction_type == t)
            && self.status.map_or(true, |s| tx.status == s)
            && self.booking_id.map_or(true, |b| tx.booking_id == Some(b))
            && self.from.map_or(true, |from| tx.created_at >= from)
            && self.to.map_or(true, |to| tx.created_at < to)
    }
}

/// One page of history.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionPage {
    /// Entries, newest first.
    pub transactions: Vec<WalletTransaction>,
    /// Page size used.
    pub limit: usize,
    /// Entries skipped.
    pub offset: usize,
    /// Whether more entries match past this page.
    pub has_more: bool,
}

/// Result of recomputing a wallet from its ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct WalletAudit {
    /// Wallet owner.
    pub user_id: UserId,
    /// Stored available balance.
    pub available_balance: Decimal,
    /// Stored pending balance.
    pub pending_balance: Decimal,
    /// Signed sum of all non-failed entries.
    pub ledger_total: Decimal,
    /// Sum of outstanding holds.
    pub open_holds: Decimal,
    /// Number of entries.
    pub transaction_count: usize,
}

impl WalletAudit {
    /// Whether the stored balances agree with the ledger.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.available_balance + self.pending_balance == self.ledger_total
    }
}

/// Post an entry against a wallet and apply it to the in-memory row.
pub(crate) fn stage(
    wallet: &mut Wallet,
    posting: Posting,
    at: DateTime<Utc>,
) -> Result<WalletTransaction> {
    let tx = WalletTransaction::post(wallet, posting, at)?;
    wallet.apply(tx.after(), at);
    Ok(tx)
}

/// The pending credit that holds a booking's payment for its owner.
pub(crate) fn pending_credit_posting(
    amount: Decimal,
    booking_id: BookingId,
    release_date: NaiveDate,
) -> Posting {
    Posting::new(
        TransactionType::Credit,
        Bucket::Pending,
        amount,
        pending_credit_reference(&booking_id),
        TransactionMetadata::PendingCredit {
            release_date,
            released_at: None,
        },
    )
    .with_status(TransactionStatus::Pending)
    .described(format!("Pending credit for booking {booking_id}"))
    .for_booking(Some(booking_id))
}

fn log_posted(tx: &WalletTransaction) {
    tracing::info!(
        user_id = %tx.user_id,
        transaction_id = %tx.id,
        transaction_type = ?tx.transaction_type,
        amount = %tx.amount,
        reference = %tx.reference,
        available = %tx.available_balance_after,
        pending = %tx.pending_balance_after,
        "Ledger entry posted"
    );
}

/// The wallet ledger.
pub struct WalletLedger {
    store: Arc<dyn Store>,
    locks: WalletLocks,
}

impl WalletLedger {
    /// Create a ledger over a store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            locks: WalletLocks::new(),
        }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub(crate) async fn lock(&self, user_id: UserId) -> WalletGuard {
        self.locks.lock(user_id).await
    }

    pub(crate) async fn lock_pair(&self, a: UserId, b: UserId) -> WalletGuard {
        self.locks.lock_pair(a, b).await
    }

    // =========================================================================
    // Wallets
    // =========================================================================

    /// Return the user's wallet, creating an empty active one if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn get_or_create_wallet(&self, user_id: UserId) -> Result<Wallet> {
        if let Some(wallet) = self.store.get_wallet(&user_id)? {
            return Ok(wallet);
        }

        let wallet = self.store.insert_wallet(&Wallet::new(user_id))?;
        tracing::info!(user_id = %user_id, wallet_id = %wallet.id, "Wallet created");
        Ok(wallet)
    }

    /// Return the user's wallet.
    ///
    /// # Errors
    ///
    /// Returns `WalletError::NotFound` if the user has no wallet.
    pub fn get_wallet(&self, user_id: UserId) -> Result<Wallet> {
        self.store
            .get_wallet(&user_id)?
            .ok_or_else(|| WalletError::not_found("wallet", user_id))
    }

    /// Suspend or reactivate a wallet.
    ///
    /// # Errors
    ///
    /// Returns `WalletError::NotFound` if the user has no wallet.
    pub async fn set_wallet_status(&self, user_id: UserId, status: WalletStatus) -> Result<Wallet> {
        let _guard = self.lock(user_id).await;
        let mut wallet = self.get_wallet(user_id)?;
        if wallet.status == status {
            return Ok(wallet);
        }

        wallet.status = status;
        wallet.updated_at = Utc::now();
        self.store.commit(WriteSet::new().wallet(wallet.clone()))?;

        tracing::info!(user_id = %user_id, status = ?status, "Wallet status changed");
        Ok(wallet)
    }

    pub(crate) fn load_wallet(&self, user_id: UserId, create: bool) -> Result<Wallet> {
        match self.store.get_wallet(&user_id)? {
            Some(wallet) => Ok(wallet),
            None if create => self.get_or_create_wallet(user_id),
            None => Err(WalletError::not_found("wallet", user_id)),
        }
    }

    pub(crate) fn ensure_unused(&self, reference: &str) -> Result<()> {
        if reference.trim().is_empty() {
            return Err(WalletError::Validation("reference is required".into()));
        }
        if self.store.get_transaction_by_reference(reference)?.is_some() {
            return Err(WalletError::DuplicateReference {
                reference: reference.to_string(),
            });
        }
        Ok(())
    }

    fn ensure_access(wallet: &Wallet, access: Access) -> Result<()> {
        if access == Access::ActiveOnly && !wallet.is_active() {
            return Err(WalletError::WalletNotActive {
                user_id: wallet.user_id,
            });
        }
        Ok(())
    }

    /// Post one entry to one wallet and commit it.
    async fn post(
        &self,
        user_id: UserId,
        posting: Posting,
        access: Access,
        create: bool,
    ) -> Result<WalletTransaction> {
        let _guard = self.lock(user_id).await;
        self.post_locked(user_id, posting, access, create)
    }

    /// [`WalletLedger::post`] for a caller already holding the wallet's lock.
    fn post_locked(
        &self,
        user_id: UserId,
        posting: Posting,
        access: Access,
        create: bool,
    ) -> Result<WalletTransaction> {
        self.ensure_unused(&posting.reference)?;
        let mut wallet = self.load_wallet(user_id, create)?;
        Self::ensure_access(&wallet, access)?;

        let tx = stage(&mut wallet, posting, Utc::now())?;
        self.store
            .commit(WriteSet::new().wallet(wallet).insert(tx.clone()))?;

        log_posted(&tx);
        Ok(tx)
    }

    // =========================================================================
    // Available balance
    // =========================================================================

    /// Add funds to the available balance.
    ///
    /// # Errors
    ///
    /// - `WalletError::Validation` for a malformed amount or empty reference.
    /// - `WalletError::WalletNotActive` if the wallet is suspended.
    /// - `WalletError::DuplicateReference` if the reference was used before.
    pub async fn credit(
        &self,
        user_id: UserId,
        amount: Decimal,
        reference: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<WalletTransaction> {
        let amount = validate_amount(amount)?;
        let posting = Posting::new(
            TransactionType::Credit,
            Bucket::Available,
            amount,
            reference,
            TransactionMetadata::Manual { note: None },
        )
        .described(description);

        self.post(user_id, posting, Access::ActiveOnly, true).await
    }

    /// Remove funds from the available balance.
    ///
    /// # Errors
    ///
    /// - `WalletError::InsufficientBalance` if `available < amount`.
    /// - `WalletError::NotFound` if the user has no wallet.
    /// - Otherwise as [`WalletLedger::credit`].
    pub async fn debit(
        &self,
        user_id: UserId,
        amount: Decimal,
        reference: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<WalletTransaction> {
        let amount = validate_amount(amount)?;
        let posting = Posting::new(
            TransactionType::Debit,
            Bucket::Available,
            amount,
            reference,
            TransactionMetadata::Manual { note: None },
        )
        .described(description);

        self.post(user_id, posting, Access::ActiveOnly, false).await
    }

    /// Top up a wallet from a verified gateway payment.
    ///
    /// The gateway reference is the idempotency key: replaying an applied
    /// reference for the same user returns the existing entry.
    ///
    /// # Errors
    ///
    /// - `WalletError::ExternalService` if the gateway cannot be reached.
    /// - `WalletError::Validation` if the payment failed, is in another
    ///   currency, or belongs to another user.
    /// - `WalletError::DuplicateReference` if the reference was used for
    ///   something else.
    pub async fn fund_from_gateway(
        &self,
        gateway: &dyn PaymentGateway,
        user_id: UserId,
        reference: &str,
    ) -> Result<WalletTransaction> {
        if let Some(existing) = self.funding_replay(user_id, reference)? {
            return Ok(existing);
        }

        let payment = gateway
            .verify(reference)
            .await
            .map_err(|e| e.into_wallet_error("payment_gateway"))?;

        if !payment.successful {
            return Err(WalletError::Validation(format!(
                "payment {reference} was not successful"
            )));
        }
        if !payment.currency.eq_ignore_ascii_case(DEFAULT_CURRENCY) {
            return Err(WalletError::Validation(format!(
                "payment {reference} is in {}, wallets hold {DEFAULT_CURRENCY}",
                payment.currency
            )));
        }
        if payment.user_id.is_some_and(|owner| owner != user_id) {
            return Err(WalletError::Validation(format!(
                "payment {reference} belongs to another user"
            )));
        }

        let amount = validate_amount(payment.amount)?;
        let posting = Posting::new(
            TransactionType::Credit,
            Bucket::Available,
            amount,
            reference,
            TransactionMetadata::Funding {
                gateway_reference: Some(payment.reference),
            },
        )
        .described("Wallet funding");

        match self.post(user_id, posting, Access::ActiveOnly, true).await {
            Err(e) if e.is_already_applied() => self.funding_replay(user_id, reference)?.ok_or(e),
            other => other,
        }
    }

    fn funding_replay(&self, user_id: UserId, reference: &str) -> Result<Option<WalletTransaction>> {
        let Some(existing) = self.store.get_transaction_by_reference(reference)? else {
            return Ok(None);
        };

        if existing.user_id == user_id
            && matches!(existing.metadata, TransactionMetadata::Funding { .. })
        {
            tracing::debug!(user_id = %user_id, reference = %reference, "Funding already applied");
            return Ok(Some(existing));
        }

        Err(WalletError::DuplicateReference {
            reference: reference.to_string(),
        })
    }

    /// Credit a refund to the available balance.
    ///
    /// # Errors
    ///
    /// - `WalletError::NotFound` if the original transaction does not exist.
    /// - `WalletError::DuplicateReference` if the reference was used before.
    pub async fn process_refund(&self, request: RefundRequest) -> Result<WalletTransaction> {
        let _guard = self.lock(request.user_id).await;
        self.process_refund_locked(request)
    }

    /// [`WalletLedger::process_refund`] for a caller already holding the
    /// payer's lock.
    pub(crate) fn process_refund_locked(&self, request: RefundRequest) -> Result<WalletTransaction> {
        let amount = validate_amount(request.amount)?;

        if let Some(original) = &request.original_transaction_id {
            if self.store.get_transaction(original)?.is_none() {
                return Err(WalletError::not_found("transaction", original));
            }
        }

        let reference = request
            .reference
            .unwrap_or_else(|| format!("refund:{}", TransactionId::generate()));
        let posting = Posting::new(
            TransactionType::Refund,
            Bucket::Available,
            amount,
            reference,
            TransactionMetadata::Refund {
                original_transaction_id: request.original_transaction_id,
                reason: request.reason,
            },
        )
        .described(request.description)
        .for_booking(request.booking_id)
        .related_to(request.original_transaction_id);

        self.post_locked(request.user_id, posting, Access::Settlement, true)
    }

    /// Move funds between two wallets.
    ///
    /// # Errors
    ///
    /// - `WalletError::Validation` when sender and receiver are the same.
    /// - `WalletError::InsufficientBalance` if the sender cannot cover it.
    /// - `WalletError::WalletNotActive` if either wallet is suspended.
    pub async fn transfer(
        &self,
        from: UserId,
        to: UserId,
        amount: Decimal,
        description: impl Into<String>,
    ) -> Result<Transfer> {
        if from == to {
            return Err(WalletError::Validation(
                "cannot transfer to the same wallet".into(),
            ));
        }
        let amount = validate_amount(amount)?;
        let description = description.into();

        let _guard = self.locks.lock_pair(from, to).await;

        let mut sender = self.load_wallet(from, false)?;
        Self::ensure_access(&sender, Access::ActiveOnly)?;
        // A new receiver wallet is only persisted with the transfer itself.
        let existing = self.store.get_wallet(&to)?;
        let receiver_is_new = existing.is_none();
        let mut receiver = existing.unwrap_or_else(|| Wallet::new(to));
        Self::ensure_access(&receiver, Access::ActiveOnly)?;

        let transfer_id = TransactionId::generate();
        let now = Utc::now();

        let mut outgoing = stage(
            &mut sender,
            Posting::new(
                TransactionType::TransferOut,
                Bucket::Available,
                amount,
                format!("transfer-out:{transfer_id}"),
                TransactionMetadata::Transfer { counterparty: to },
            )
            .described(description.clone()),
            now,
        )?;
        let incoming = stage(
            &mut receiver,
            Posting::new(
                TransactionType::TransferIn,
                Bucket::Available,
                amount,
                format!("transfer-in:{transfer_id}"),
                TransactionMetadata::Transfer { counterparty: from },
            )
            .described(description)
            .related_to(Some(outgoing.id)),
            now,
        )?;
        outgoing.related_transaction_id = Some(incoming.id);

        self.store.commit(
            WriteSet::new()
                .wallet(sender)
                .wallet(receiver)
                .insert(outgoing.clone())
                .insert(incoming.clone()),
        )?;

        if receiver_is_new {
            tracing::info!(user_id = %to, wallet_id = %incoming.wallet_id, "Wallet created");
        }
        log_posted(&outgoing);
        log_posted(&incoming);
        Ok(Transfer { outgoing, incoming })
    }

    // =========================================================================
    // Pending balance
    // =========================================================================

    /// Hold booking funds in the pending balance until `release_date`.
    ///
    /// # Errors
    ///
    /// Returns `WalletError::DuplicateReference` if the booking already has a
    /// hold.
    pub async fn credit_pending(
        &self,
        user_id: UserId,
        amount: Decimal,
        booking_id: BookingId,
        release_date: NaiveDate,
    ) -> Result<WalletTransaction> {
        let amount = validate_amount(amount)?;
        let posting = pending_credit_posting(amount, booking_id, release_date);
        self.post(user_id, posting, Access::Settlement, true).await
    }

    /// Reverse a booking's hold out of the pending balance.
    ///
    /// Settles the booking's original pending credit and writes a linked
    /// completed debit. A hold is reversed whole: `amount` must equal the
    /// held amount.
    ///
    /// # Errors
    ///
    /// - `WalletError::InsufficientBalance` if pending funds are short.
    /// - `WalletError::DuplicateReference` if the booking was already reversed.
    /// - `WalletError::Validation` if the hold was already settled or `amount`
    ///   differs from it.
    pub async fn debit_pending(
        &self,
        user_id: UserId,
        amount: Decimal,
        booking_id: BookingId,
        reason: impl Into<String>,
    ) -> Result<WalletTransaction> {
        let _guard = self.lock(user_id).await;
        self.debit_pending_locked(user_id, amount, booking_id, &reason.into())
    }

    /// [`WalletLedger::debit_pending`] for a caller already holding the
    /// wallet's lock.
    pub(crate) fn debit_pending_locked(
        &self,
        user_id: UserId,
        amount: Decimal,
        booking_id: BookingId,
        reason: &str,
    ) -> Result<WalletTransaction> {
        let amount = validate_amount(amount)?;
        let reference = pending_reversal_reference(&booking_id);

        self.ensure_unused(&reference)?;
        let mut wallet = self.load_wallet(user_id, false)?;

        let hold = self
            .store
            .get_transaction_by_reference(&pending_credit_reference(&booking_id))?
            .filter(|hold| hold.user_id == user_id);
        if let Some(hold) = &hold {
            if !hold.is_open_hold() {
                return Err(WalletError::Validation(format!(
                    "hold for booking {booking_id} is already settled"
                )));
            }
            if hold.amount != amount {
                return Err(WalletError::Validation(format!(
                    "hold for booking {booking_id} is {}, cannot reverse {amount}",
                    hold.amount
                )));
            }
        }

        let now = Utc::now();
        let posting = Posting::new(
            TransactionType::Debit,
            Bucket::Pending,
            amount,
            reference,
            TransactionMetadata::PendingReversal {
                reason: reason.to_string(),
            },
        )
        .described(format!("Reversal of pending credit for booking {booking_id}: {reason}"))
        .for_booking(Some(booking_id))
        .related_to(hold.as_ref().map(|hold| hold.id));

        let tx = stage(&mut wallet, posting, now)?;
        let mut writes = WriteSet::new().wallet(wallet).insert(tx.clone());
        if let Some(mut hold) = hold {
            hold.settle_hold(now, false)?;
            writes = writes.update(hold);
        }
        self.store.commit(writes)?;

        log_posted(&tx);
        Ok(tx)
    }

    /// Release a booking's hold to the available balance of the wallet that
    /// received it.
    ///
    /// Marks the pending credit completed, sets the booking's wallet status to
    /// `released` and enqueues a `funds_released` event in the same commit.
    ///
    /// # Errors
    ///
    /// - `WalletError::NotFound` if the booking or its hold does not exist.
    /// - `WalletError::ReleaseConflict` if the booking's funds are not pending,
    ///   which includes every repeat call.
    pub async fn release_pending(&self, booking_id: BookingId) -> Result<WalletTransaction> {
        let booking = self.booking(&booking_id)?;
        ensure_releasable(&booking)?;
        let hold = self.booking_hold(&booking)?;

        let _guard = self.lock(hold.user_id).await;

        // Re-read under the lock; a concurrent release may have won.
        let mut booking = self.booking(&booking_id)?;
        ensure_releasable(&booking)?;
        let mut hold = self
            .store
            .get_transaction(&hold.id)?
            .ok_or_else(|| WalletError::not_found("transaction", hold.id))?;
        if !hold.is_open_hold() {
            return Err(WalletError::ReleaseConflict {
                booking_id,
                state: booking.wallet_status,
            });
        }

        let mut wallet = self.load_wallet(hold.user_id, false)?;
        if wallet.pending_balance < hold.amount {
            return Err(WalletError::InsufficientBalance {
                available: wallet.pending_balance,
                required: hold.amount,
            });
        }

        let now = Utc::now();
        let after = wallet
            .snapshot()
            .with_delta(Bucket::Pending, -hold.amount)
            .with_delta(Bucket::Available, hold.amount);
        wallet.apply(after, now);
        hold.settle_hold(now, true)?;
        booking.transition_funds(FundState::Released, now)?;

        let event = SettlementEvent::new(
            SettlementEventKind::FundsReleased {
                booking_id,
                owner_id: hold.user_id,
                amount: hold.amount,
            },
            now,
        );
        self.store.commit(
            WriteSet::new()
                .wallet(wallet)
                .update(hold.clone())
                .booking(booking)
                .event(event),
        )?;

        tracing::info!(
            booking_id = %booking_id,
            user_id = %hold.user_id,
            amount = %hold.amount,
            "Pending funds released"
        );
        Ok(hold)
    }

    /// Pending balance and the holds that make it up.
    ///
    /// # Errors
    ///
    /// Returns `WalletError::NotFound` if the user has no wallet.
    pub fn get_pending_balance(&self, user_id: UserId) -> Result<PendingBalance> {
        let wallet = self.get_wallet(user_id)?;
        let holds = self
            .store
            .list_transactions_by_user(&user_id, usize::MAX, 0)?
            .into_iter()
            .filter(WalletTransaction::is_open_hold)
            .map(|tx| PendingHold {
                transaction_id: tx.id,
                booking_id: tx.booking_id,
                amount: tx.amount,
                release_date: tx.release_date,
            })
            .collect();

        Ok(PendingBalance {
            user_id,
            pending_balance: wallet.pending_balance,
            holds,
        })
    }

    /// A page of the wallet's history, newest first.
    ///
    /// # Errors
    ///
    /// Returns `WalletError::NotFound` if the user has no wallet.
    pub fn get_transaction_history(
        &self,
        user_id: UserId,
        filter: &TransactionFilter,
    ) -> Result<TransactionPage> {
        self.get_wallet(user_id)?;

        let limit = filter
            .limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT);
        let mut matching = self
            .store
            .list_transactions_by_user(&user_id, usize::MAX, 0)?
            .into_iter()
            .filter(|tx| filter.matches(tx))
            .skip(filter.offset);

        let transactions: Vec<_> = matching.by_ref().take(limit).collect();
        let has_more = matching.next().is_some();

        Ok(TransactionPage {
            transactions,
            limit,
            offset: filter.offset,
            has_more,
        })
    }

    /// Recompute a wallet's total from its ledger.
    ///
    /// # Errors
    ///
    /// Returns `WalletError::NotFound` if the user has no wallet.
    pub fn audit_wallet(&self, user_id: UserId) -> Result<WalletAudit> {
        let wallet = self.get_wallet(user_id)?;
        let transactions = self.store.list_transactions_by_user(&user_id, usize::MAX, 0)?;

        let audit = WalletAudit {
            user_id,
            available_balance: wallet.available_balance,
            pending_balance: wallet.pending_balance,
            ledger_total: transactions.iter().map(WalletTransaction::signed_amount).sum(),
            open_holds: transactions
                .iter()
                .filter(|tx| tx.is_open_hold())
                .map(|tx| tx.amount)
                .sum(),
            transaction_count: transactions.len(),
        };

        if !audit.is_balanced() {
            tracing::error!(
                user_id = %user_id,
                available = %audit.available_balance,
                pending = %audit.pending_balance,
                ledger_total = %audit.ledger_total,
                "Wallet does not match its ledger"
            );
        }
        Ok(audit)
    }

    // =========================================================================
    // Bookings
    // =========================================================================

    pub(crate) fn booking(&self, booking_id: &BookingId) -> Result<Booking> {
        self.store
            .get_booking(booking_id)?
            .ok_or_else(|| WalletError::not_found("booking", booking_id))
    }

    /// The pending credit created for a booking.
    pub(crate) fn booking_hold(&self, booking: &Booking) -> Result<WalletTransaction> {
        let hold = match booking.wallet_transaction_id {
            Some(id) => self.store.get_transaction(&id)?,
            None => self
                .store
                .get_transaction_by_reference(&pending_credit_reference(&booking.id))?,
        };
        hold.ok_or_else(|| WalletError::not_found("pending credit", booking.id))
    }
}

fn ensure_releasable(booking: &Booking) -> Result<()> {
    if booking.wallet_status == FundState::Pending {
        Ok(())
    } else {
        Err(WalletError::ReleaseConflict {
            booking_id: booking.id,
            state: booking.wallet_status,
        })
    }
}
