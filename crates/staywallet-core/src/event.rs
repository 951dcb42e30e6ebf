//! Settlement outbox events.
//!
//! An event is committed in the same write as the ledger change it describes.
//! A separate dispatcher delivers it to the notification and calendar
//! collaborators, retrying until it succeeds or is dead-lettered.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{BookingId, EventId, PropertyId, UserId};

/// A durable record that a settlement happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementEvent {
    /// Event id (ULID, oldest first).
    pub id: EventId,

    /// What happened.
    pub kind: SettlementEventKind,

    /// When the event was committed.
    pub created_at: DateTime<Utc>,

    /// Delivery attempts so far.
    pub attempts: u32,

    /// Error from the latest failed attempt.
    pub last_error: Option<String>,

    /// When the event was delivered.
    pub delivered_at: Option<DateTime<Utc>>,

    /// Set once delivery gave up.
    pub dead_lettered: bool,
}

impl SettlementEvent {
    /// Create an undelivered event.
    #[must_use]
    pub fn new(kind: SettlementEventKind, at: DateTime<Utc>) -> Self {
        Self {
            id: EventId::generate(),
            kind,
            created_at: at,
            attempts: 0,
            last_error: None,
            delivered_at: None,
            dead_lettered: false,
        }
    }

    /// Whether the dispatcher still has work to do for this event.
    #[must_use]
    pub fn is_outstanding(&self) -> bool {
        self.delivered_at.is_none() && !self.dead_lettered
    }

    /// Record a successful delivery.
    pub fn mark_delivered(&mut self, at: DateTime<Utc>) {
        self.attempts += 1;
        self.delivered_at = Some(at);
        self.last_error = None;
    }

    /// Record a failed delivery, dead-lettering after `max_attempts`.
    pub fn mark_failed(&mut self, error: impl Into<String>, max_attempts: u32) {
        self.attempts += 1;
        self.last_error = Some(error.into());
        if self.attempts >= max_attempts {
            self.dead_lettered = true;
        }
    }
}

/// What a settlement event describes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SettlementEventKind {
    /// A booking payment is now held for the owner.
    FundsHeld {
        /// The booking.
        booking_id: BookingId,
        /// The owner.
        owner_id: UserId,
        /// Held amount.
        amount: Decimal,
    },

    /// A hold was released to the owner's available balance.
    FundsReleased {
        /// The booking.
        booking_id: BookingId,
        /// The wallet owner that received the funds.
        owner_id: UserId,
        /// Released amount.
        amount: Decimal,
    },

    /// A booking was cancelled by a person and its funds returned.
    BookingRefunded {
        /// The booking.
        booking_id: BookingId,
        /// The booked property.
        property_id: PropertyId,
        /// The guest.
        guest_id: UserId,
        /// The owner.
        owner_id: UserId,
        /// Amount returned to the guest.
        refunded_amount: Decimal,
        /// Why.
        reason: String,
    },

    /// A booking was cancelled by the auto-cancellation job.
    BookingAutoCancelled {
        /// The booking.
        booking_id: BookingId,
        /// The booked property.
        property_id: PropertyId,
        /// The guest.
        guest_id: UserId,
        /// The owner.
        owner_id: UserId,
        /// Amount returned to the guest.
        refunded_amount: Decimal,
        /// Why.
        reason: String,
    },

    /// Ledger steps of a cancellation did not all apply; needs a person.
    ReconciliationRequired {
        /// The booking.
        booking_id: BookingId,
        /// What went wrong.
        detail: String,
    },
}

impl SettlementEventKind {
    /// The booking the event is about.
    #[must_use]
    pub const fn booking_id(&self) -> BookingId {
        match self {
            Self::FundsHeld { booking_id, .. }
            | Self::FundsReleased { booking_id, .. }
            | Self::BookingRefunded { booking_id, .. }
            | Self::BookingAutoCancelled { booking_id, .. }
            | Self::ReconciliationRequired { booking_id, .. } => *booking_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn released() -> SettlementEvent {
        SettlementEvent::new(
            SettlementEventKind::FundsReleased {
                booking_id: BookingId::generate(),
                owner_id: UserId::generate(),
                amount: dec!(500),
            },
            Utc::now(),
        )
    }

    #[test]
    fn new_event_is_outstanding() {
        let event = released();
        assert!(event.is_outstanding());
        assert_eq!(event.attempts, 0);
    }

    #[test]
    fn delivered_event_is_done() {
        let mut event = released();
        event.mark_delivered(Utc::now());
        assert!(!event.is_outstanding());
        assert_eq!(event.attempts, 1);
    }

    #[test]
    fn failures_dead_letter_at_max_attempts() {
        let mut event = released();
        event.mark_failed("smtp down", 2);
        assert!(event.is_outstanding());
        event.mark_failed("smtp down", 2);
        assert!(event.dead_lettered);
        assert!(!event.is_outstanding());
        assert_eq!(event.last_error.as_deref(), Some("smtp down"));
    }
}
