//! Per-booking fund movements.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;

use staywallet_core::{
    validate_amount, Booking, BookingId, BookingStatus, FundState, PaymentStatus, Result,
    SettlementEvent, SettlementEventKind, TransactionMetadata, WalletError, WalletTransaction,
};
use staywallet_store::WriteSet;

use crate::ledger::{
    pending_credit_posting, pending_credit_reference, stage, RefundRequest, WalletLedger,
};

/// Who cancelled a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancellationActor {
    /// The guest cancelled.
    Guest,
    /// The owner rejected the booking.
    Owner,
    /// An administrator cancelled.
    Admin,
    /// The auto-cancellation job.
    System,
}

impl CancellationActor {
    fn refund_reference(self, booking_id: &BookingId) -> String {
        match self {
            Self::System => format!("auto-cancel-refund:{booking_id}"),
            Self::Guest | Self::Owner | Self::Admin => format!("booking-refund:{booking_id}"),
        }
    }
}

/// What a cancellation did.
#[derive(Debug, Clone, PartialEq)]
pub struct CancellationOutcome {
    /// The booking as committed.
    pub booking: Booking,
    /// The owner's hold was reversed, or there was none to reverse.
    pub hold_reversed: bool,
    /// The guest refund was credited, or nothing was paid.
    pub refund_applied: bool,
    /// Amount credited to the guest.
    pub refunded_amount: Decimal,
    /// Ledger steps that failed.
    pub failures: Vec<String>,
}

impl CancellationOutcome {
    /// Whether a ledger step is missing and a person has to look at it.
    #[must_use]
    pub fn needs_reconciliation(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Drives a booking's funds through `none → pending → {released | refunded}`.
pub struct BookingFunds {
    ledger: Arc<WalletLedger>,
}

impl BookingFunds {
    /// Create over a ledger.
    #[must_use]
    pub fn new(ledger: Arc<WalletLedger>) -> Self {
        Self { ledger }
    }

    /// The ledger.
    #[must_use]
    pub fn ledger(&self) -> &Arc<WalletLedger> {
        &self.ledger
    }

    /// Hold a paid booking's funds in the owner's pending balance until
    /// check-in.
    ///
    /// The pending credit, the booking's `wallet_status = pending` and
    /// `wallet_transaction_id`, and a `funds_held` event are one commit.
    ///
    /// # Errors
    ///
    /// - `WalletError::NotFound` if the booking does not exist.
    /// - `WalletError::Validation` if nothing was paid.
    /// - `WalletError::InvalidTransition` if the booking's funds already moved.
    pub async fn hold_payment(&self, booking_id: BookingId) -> Result<WalletTransaction> {
        let owner_id = self.ledger.booking(&booking_id)?.owner_id;
        let _guard = self.ledger.lock(owner_id).await;

        let mut booking = self.ledger.booking(&booking_id)?;
        if !matches!(
            booking.payment_status,
            PaymentStatus::Completed | PaymentStatus::Partial
        ) {
            return Err(WalletError::Validation(format!(
                "booking {booking_id} has no payment to hold"
            )));
        }
        let amount = validate_amount(booking.refundable_amount())?;

        let now = Utc::now();
        booking.transition_funds(FundState::Pending, now)?;
        self.ledger
            .ensure_unused(&pending_credit_reference(&booking_id))?;

        let mut wallet = self.ledger.load_wallet(booking.owner_id, true)?;
        let tx = stage(
            &mut wallet,
            pending_credit_posting(amount, booking_id, booking.check_in_date),
            now,
        )?;
        booking.wallet_transaction_id = Some(tx.id);

        let event = SettlementEvent::new(
            SettlementEventKind::FundsHeld {
                booking_id,
                owner_id: booking.owner_id,
                amount,
            },
            now,
        );
        self.ledger.store().commit(
            WriteSet::new()
                .wallet(wallet)
                .insert(tx.clone())
                .booking(booking)
                .event(event),
        )?;

        tracing::info!(
            booking_id = %booking_id,
            owner_id = %owner_id,
            amount = %amount,
            release_date = ?tx.release_date,
            "Booking funds held"
        );
        Ok(tx)
    }

    /// Cancel a booking and return its money.
    ///
    /// Steps, each attempted even if an earlier one failed:
    /// 1. reverse the owner's hold when the funds are pending;
    /// 2. refund what the guest paid;
    /// 3. cancel (or reject) the booking, moving its funds to `refunded` when
    ///    both ledger steps went through, and enqueue the cancellation event.
    ///
    /// The owner and guest wallets stay locked from the state check to the
    /// final commit, so a concurrent release cannot pay out the same funds.
    ///
    /// Ledger steps use deterministic references, so a re-run after a crash
    /// skips whatever already applied. A failed ledger step does not stop the
    /// cancellation; it is reported in the outcome and a
    /// `reconciliation_required` event is committed with the booking.
    ///
    /// # Errors
    ///
    /// - `WalletError::NotFound` if the booking does not exist.
    /// - `WalletError::InvalidTransition` if the funds were already released or
    ///   refunded. Nothing is refunded in that case.
    /// - Storage errors from the final commit.
    pub async fn refund_booking(
        &self,
        booking_id: BookingId,
        reason: &str,
        actor: CancellationActor,
    ) -> Result<CancellationOutcome> {
        let booking = self.ledger.booking(&booking_id)?;
        ensure_refundable(&booking)?;

        let _guard = self.ledger.lock_pair(booking.owner_id, booking.user_id).await;

        // Re-read under the locks; a concurrent release may have won.
        let booking = self.ledger.booking(&booking_id)?;
        ensure_refundable(&booking)?;

        let mut failures = Vec::new();

        let hold_reversed = if booking.wallet_status == FundState::Pending {
            match self.reverse_hold(&booking, reason) {
                Ok(()) => true,
                Err(e @ WalletError::InvalidTransition { .. }) => return Err(e),
                Err(e) => {
                    tracing::error!(booking_id = %booking_id, error = %e, "Owner hold reversal failed");
                    failures.push(format!("owner hold reversal: {e}"));
                    false
                }
            }
        } else {
            true
        };

        let refundable = booking.refundable_amount();
        let refund_applied = if refundable > Decimal::ZERO {
            match self.refund_guest(&booking, refundable, reason, actor) {
                Ok(()) => true,
                Err(e) => {
                    tracing::error!(booking_id = %booking_id, error = %e, "Guest refund failed");
                    failures.push(format!("guest refund: {e}"));
                    false
                }
            }
        } else {
            true
        };
        let refunded_amount = if refund_applied {
            refundable
        } else {
            Decimal::ZERO
        };

        let now = Utc::now();
        let mut booking = self.ledger.booking(&booking_id)?;
        booking.cancel(reason, now);
        if actor == CancellationActor::Owner {
            booking.status = BookingStatus::Rejected;
        }
        if hold_reversed && refund_applied && booking.wallet_status == FundState::Pending {
            booking.transition_funds(FundState::Refunded, now)?;
        }
        if refund_applied && refunded_amount > Decimal::ZERO {
            booking.payment_status = PaymentStatus::Refunded;
        }

        let notice = if actor == CancellationActor::System {
            SettlementEventKind::BookingAutoCancelled {
                booking_id,
                property_id: booking.property_id,
                guest_id: booking.user_id,
                owner_id: booking.owner_id,
                refunded_amount,
                reason: reason.to_string(),
            }
        } else {
            SettlementEventKind::BookingRefunded {
                booking_id,
                property_id: booking.property_id,
                guest_id: booking.user_id,
                owner_id: booking.owner_id,
                refunded_amount,
                reason: reason.to_string(),
            }
        };

        let mut writes = WriteSet::new()
            .booking(booking.clone())
            .event(SettlementEvent::new(notice, now));
        if !failures.is_empty() {
            let detail = failures.join("; ");
            tracing::error!(
                booking_id = %booking_id,
                detail = %detail,
                "Cancellation needs manual reconciliation"
            );
            writes = writes.event(SettlementEvent::new(
                SettlementEventKind::ReconciliationRequired { booking_id, detail },
                now,
            ));
        }
        self.ledger.store().commit(writes)?;

        tracing::info!(
            booking_id = %booking_id,
            actor = ?actor,
            wallet_status = %booking.wallet_status,
            refunded_amount = %refunded_amount,
            "Booking cancelled"
        );

        Ok(CancellationOutcome {
            booking,
            hold_reversed,
            refund_applied,
            refunded_amount,
            failures,
        })
    }

    /// Caller holds the owner's lock.
    fn reverse_hold(&self, booking: &Booking, reason: &str) -> Result<()> {
        let hold = self.ledger.booking_hold(booking)?;
        if matches!(
            hold.metadata,
            TransactionMetadata::PendingCredit {
                released_at: Some(_),
                ..
            }
        ) {
            return Err(WalletError::InvalidTransition {
                from: FundState::Released,
                to: FundState::Refunded,
            });
        }

        let result = self
            .ledger
            .debit_pending_locked(hold.user_id, hold.amount, booking.id, reason);

        match result {
            Ok(_) => Ok(()),
            Err(e) if e.is_already_applied() => {
                tracing::debug!(booking_id = %booking.id, "Owner hold already reversed");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Caller holds the guest's lock.
    fn refund_guest(
        &self,
        booking: &Booking,
        amount: Decimal,
        reason: &str,
        actor: CancellationActor,
    ) -> Result<()> {
        let request = RefundRequest::new(
            booking.user_id,
            amount,
            format!("Refund for cancelled booking {}", booking.id),
        )
        .for_booking(booking.id)
        .because(reason)
        .with_reference(actor.refund_reference(&booking.id));

        match self.ledger.process_refund_locked(request) {
            Ok(_) => Ok(()),
            Err(e) if e.is_already_applied() => {
                tracing::debug!(booking_id = %booking.id, "Guest refund already applied");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

fn ensure_refundable(booking: &Booking) -> Result<()> {
    if booking.wallet_status.is_terminal() {
        return Err(WalletError::InvalidTransition {
            from: booking.wallet_status,
            to: FundState::Refunded,
        });
    }
    Ok(())
}
