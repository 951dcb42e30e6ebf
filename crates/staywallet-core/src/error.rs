//! Error types for staywallet.

use rust_decimal::Decimal;

use crate::booking::FundState;
use crate::ids::{BookingId, IdError, UserId};

/// Result type for staywallet operations.
pub type Result<T> = std::result::Result<T, WalletError>;

/// Errors that can occur in wallet and settlement operations.
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    /// Malformed amount or missing identifier.
    #[error("validation error: {0}")]
    Validation(String),

    /// The balance being debited cannot cover the amount.
    #[error("insufficient balance: available={available}, required={required}")]
    InsufficientBalance {
        /// Funds present in the debited balance.
        available: Decimal,
        /// Amount the operation needed.
        required: Decimal,
    },

    /// The wallet is suspended.
    #[error("wallet for user {user_id} is not active")]
    WalletNotActive {
        /// Owner of the suspended wallet.
        user_id: UserId,
    },

    /// A wallet, booking, or transaction does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record.
        entity: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// The booking's funds are not in the `pending` state.
    #[error("booking {booking_id} cannot be released from wallet state {state}")]
    ReleaseConflict {
        /// The booking.
        booking_id: BookingId,
        /// Its current fund state.
        state: FundState,
    },

    /// A fund state transition outside the state machine.
    #[error("invalid fund state transition from {from} to {to}")]
    InvalidTransition {
        /// Current state.
        from: FundState,
        /// Requested state.
        to: FundState,
    },

    /// The transaction reference has already been applied.
    #[error("duplicate transaction reference: {reference}")]
    DuplicateReference {
        /// The idempotency key.
        reference: String,
    },

    /// A collaborator (gateway, notification, calendar) failed.
    #[error("external service error: {service} - {message}")]
    ExternalService {
        /// The collaborator that failed.
        service: String,
        /// Error message.
        message: String,
    },

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}

impl WalletError {
    /// Shorthand for a `NotFound` error.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Shorthand for an `ExternalService` error.
    pub fn external(service: impl Into<String>, message: impl ToString) -> Self {
        Self::ExternalService {
            service: service.into(),
            message: message.to_string(),
        }
    }

    /// Whether the error means the operation was already applied earlier.
    #[must_use]
    pub const fn is_already_applied(&self) -> bool {
        matches!(self, Self::DuplicateReference { .. })
    }
}
