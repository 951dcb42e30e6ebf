//! Core types for staywallet.
//!
//! This crate provides the foundational types of the booking wallet ledger:
//!
//! - **Identifiers**: `UserId`, `WalletId`, `BookingId`, `PropertyId`,
//!   `TransactionId`, `EventId`
//! - **Wallets**: `Wallet`, `WalletStatus`, `BalanceSnapshot`
//! - **Ledger entries**: `WalletTransaction`, `TransactionType`,
//!   `TransactionMetadata`
//! - **Bookings**: `Booking` and the `FundState` machine
//! - **Outbox**: `SettlementEvent`
//! - **Leases**: `JobLease`
//!
//! # Money
//!
//! Amounts are `rust_decimal::Decimal` in the currency's major unit with at
//! most two fractional digits. Both wallet balances are independently never
//! negative.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod booking;
pub mod error;
pub mod event;
pub mod ids;
pub mod lease;
pub mod money;
pub mod transaction;
pub mod wallet;

pub use booking::{Booking, BookingStatus, BookingType, FundState, PaymentStatus};
pub use error::{Result, WalletError};
pub use event::{SettlementEvent, SettlementEventKind};
pub use ids::{BookingId, EventId, IdError, PropertyId, TransactionId, UserId, WalletId};
pub use lease::JobLease;
pub use money::{validate_amount, DEFAULT_CURRENCY, MONEY_SCALE};
pub use transaction::{
    Posting, TransactionMetadata, TransactionStatus, TransactionType, WalletTransaction,
};
pub use wallet::{BalanceSnapshot, Bucket, Wallet, WalletStatus};
