//! Booking projection and the per-booking fund state machine.
//!
//! Bookings belong to the booking service. The ledger keeps the fields it
//! needs to decide when a booking's funds move, and owns `wallet_status`.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WalletError};
use crate::{BookingId, PropertyId, TransactionId, UserId};

/// The booking fields the settlement engine reads and writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    /// Booking id.
    pub id: BookingId,

    /// The booked property.
    pub property_id: PropertyId,

    /// The guest who paid.
    pub user_id: UserId,

    /// The property owner who receives the funds.
    pub owner_id: UserId,

    /// First night of the stay; funds unlock on this date.
    pub check_in_date: NaiveDate,

    /// Booking lifecycle status.
    pub status: BookingStatus,

    /// Guest payment status.
    pub payment_status: PaymentStatus,

    /// Where the booking's funds are in the ledger.
    pub wallet_status: FundState,

    /// The owner's pending credit for this booking.
    pub wallet_transaction_id: Option<TransactionId>,

    /// Kind of listing.
    pub booking_type: BookingType,

    /// Full price of the stay.
    pub total_price: Decimal,

    /// What the guest has paid so far.
    pub amount_paid: Decimal,

    /// Why the booking was cancelled.
    pub cancellation_reason: Option<String>,

    /// When the booking was cancelled.
    pub cancelled_at: Option<DateTime<Utc>>,

    /// When the booking was created.
    pub created_at: DateTime<Utc>,

    /// When the booking was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Amount to return to the guest on cancellation.
    ///
    /// Falls back to the total price when no partial amount was recorded for a
    /// fully paid booking.
    #[must_use]
    pub fn refundable_amount(&self) -> Decimal {
        if self.amount_paid > Decimal::ZERO {
            self.amount_paid
        } else if self.payment_status == PaymentStatus::Completed {
            self.total_price
        } else {
            Decimal::ZERO
        }
    }

    /// Whether the release job should pay this booking out on `today`.
    #[must_use]
    pub fn is_due_for_release(&self, today: NaiveDate) -> bool {
        self.check_in_date <= today
            && self.wallet_status == FundState::Pending
            && self.payment_status == PaymentStatus::Completed
    }

    /// Whether the auto-cancellation job should cancel this booking.
    #[must_use]
    pub fn is_auto_cancel_candidate(&self, cutoff: DateTime<Utc>) -> bool {
        matches!(
            self.status,
            BookingStatus::Pending | BookingStatus::InProgress
        ) && matches!(
            self.payment_status,
            PaymentStatus::Completed | PaymentStatus::Partial
        ) && matches!(self.booking_type, BookingType::Shortlet | BookingType::Hotel)
            && self.created_at < cutoff
    }

    /// Move the fund state, enforcing the state machine.
    ///
    /// # Errors
    ///
    /// Returns `WalletError::InvalidTransition` for transitions the state
    /// machine does not allow.
    pub fn transition_funds(&mut self, to: FundState, at: DateTime<Utc>) -> Result<()> {
        self.wallet_status = self.wallet_status.transition(to)?;
        self.updated_at = at;
        Ok(())
    }

    /// Mark the booking cancelled.
    pub fn cancel(&mut self, reason: impl Into<String>, at: DateTime<Utc>) {
        self.status = BookingStatus::Cancelled;
        self.cancellation_reason = Some(reason.into());
        self.cancelled_at = Some(at);
        self.updated_at = at;
    }
}

/// Per-booking wallet status.
///
/// `none → pending → {released | refunded}`. Both outcomes are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundState {
    /// No funds received yet.
    None,
    /// Funds held in the owner's pending balance.
    Pending,
    /// Funds paid out to the owner's available balance.
    Released,
    /// Funds returned to the guest.
    Refunded,
}

impl FundState {
    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Released | Self::Refunded)
    }

    /// Whether `self → to` is a valid transition.
    #[must_use]
    pub const fn can_transition(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::None, Self::Pending) | (Self::Pending, Self::Released | Self::Refunded)
        )
    }

    /// Return the next state.
    ///
    /// # Errors
    ///
    /// Returns `WalletError::InvalidTransition` if the transition is not allowed.
    pub fn transition(self, to: Self) -> Result<Self> {
        if self.can_transition(to) {
            Ok(to)
        } else {
            Err(WalletError::InvalidTransition { from: self, to })
        }
    }
}

impl fmt::Display for FundState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Pending => "pending",
            Self::Released => "released",
            Self::Refunded => "refunded",
        };
        f.write_str(name)
    }
}

/// Booking lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Awaiting owner confirmation.
    Pending,
    /// Being processed.
    InProgress,
    /// Confirmed by the owner.
    Confirmed,
    /// Stay finished.
    Completed,
    /// Cancelled.
    Cancelled,
    /// Rejected by the owner.
    Rejected,
}

/// Guest payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Not paid.
    Pending,
    /// Partly paid.
    Partial,
    /// Fully paid.
    Completed,
    /// Payment failed.
    Failed,
    /// Payment returned.
    Refunded,
}

/// Kind of listing booked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingType {
    /// Short-stay apartment.
    Shortlet,
    /// Hotel room.
    Hotel,
    /// Long-term rental.
    Rental,
    /// Property purchase.
    Sale,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn booking() -> Booking {
        let now = Utc::now();
        Booking {
            id: BookingId::generate(),
            property_id: PropertyId::generate(),
            user_id: UserId::generate(),
            owner_id: UserId::generate(),
            check_in_date: now.date_naive(),
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Completed,
            wallet_status: FundState::Pending,
            wallet_transaction_id: None,
            booking_type: BookingType::Shortlet,
            total_price: dec!(500),
            amount_paid: dec!(0),
            cancellation_reason: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn valid_fund_transitions() {
        assert_eq!(
            FundState::None.transition(FundState::Pending).unwrap(),
            FundState::Pending
        );
        assert_eq!(
            FundState::Pending.transition(FundState::Released).unwrap(),
            FundState::Released
        );
        assert_eq!(
            FundState::Pending.transition(FundState::Refunded).unwrap(),
            FundState::Refunded
        );
    }

    #[test]
    fn terminal_states_reject_everything() {
        for from in [FundState::Released, FundState::Refunded] {
            assert!(from.is_terminal());
            for to in [
                FundState::None,
                FundState::Pending,
                FundState::Released,
                FundState::Refunded,
            ] {
                assert!(matches!(
                    from.transition(to),
                    Err(WalletError::InvalidTransition { .. })
                ));
            }
        }
    }

    #[test]
    fn none_cannot_skip_pending() {
        assert!(!FundState::None.can_transition(FundState::Released));
        assert!(!FundState::None.can_transition(FundState::Refunded));
        assert!(!FundState::Pending.can_transition(FundState::Pending));
    }

    #[test]
    fn release_eligibility() {
        let mut b = booking();
        let today = b.check_in_date;
        assert!(b.is_due_for_release(today));
        assert!(!b.is_due_for_release(today - Duration::days(1)));

        b.payment_status = PaymentStatus::Partial;
        assert!(!b.is_due_for_release(today));
    }

    #[test]
    fn auto_cancel_eligibility() {
        let mut b = booking();
        b.created_at = Utc::now() - Duration::hours(30);
        let cutoff = Utc::now() - Duration::hours(24);
        assert!(b.is_auto_cancel_candidate(cutoff));

        b.booking_type = BookingType::Rental;
        assert!(!b.is_auto_cancel_candidate(cutoff));

        b.booking_type = BookingType::Hotel;
        b.status = BookingStatus::Confirmed;
        assert!(!b.is_auto_cancel_candidate(cutoff));

        b.status = BookingStatus::InProgress;
        b.created_at = Utc::now();
        assert!(!b.is_auto_cancel_candidate(cutoff));
    }

    #[test]
    fn refundable_amount_prefers_amount_paid() {
        let mut b = booking();
        assert_eq!(b.refundable_amount(), dec!(500));
        b.amount_paid = dec!(200);
        b.payment_status = PaymentStatus::Partial;
        assert_eq!(b.refundable_amount(), dec!(200));
    }

    #[test]
    fn cancel_records_reason() {
        let mut b = booking();
        b.cancel("timeout", Utc::now());
        assert_eq!(b.status, BookingStatus::Cancelled);
        assert_eq!(b.cancellation_reason.as_deref(), Some("timeout"));
        assert!(b.cancelled_at.is_some());
    }
}
