//! Storage layer for staywallet.
//!
//! This crate persists wallets, ledger transactions, the booking projection,
//! settlement outbox events, and job leases.
//!
//! # Backends
//!
//! - [`RocksStore`] (feature `rocksdb-backend`, on by default): column
//!   families with secondary indexes, every [`WriteSet`] applied as one
//!   `WriteBatch`.
//! - [`MemoryStore`]: the same contract behind a single mutex, for tests and
//!   ephemeral runs.
//!
//! # Atomicity
//!
//! Reads are plain point lookups or scans. All writes that belong to one ledger
//! mutation are collected in a [`WriteSet`] and handed to [`Store::commit`],
//! which applies them all or none. Row-level serialization of concurrent
//! mutations is the caller's job (see `staywallet-service`'s wallet locks).
//!
//! # Example
//!
//! ```no_run
//! use staywallet_core::{UserId, Wallet};
//! use staywallet_store::{MemoryStore, Store};
//!
//! let store = MemoryStore::new();
//! let wallet = store.insert_wallet(&Wallet::new(UserId::generate())).unwrap();
//! assert!(store.get_wallet(&wallet.user_id).unwrap().is_some());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
#[cfg(feature = "rocksdb-backend")]
pub mod keys;
pub mod memory;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
#[cfg(feature = "rocksdb-backend")]
pub mod schema;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
#[cfg(feature = "rocksdb-backend")]
pub use rocks::RocksStore;

use staywallet_core::{
    Booking, BookingId, EventId, JobLease, SettlementEvent, TransactionId, UserId, Wallet,
    WalletTransaction,
};

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer, allowing for different
/// implementations (`RocksDB`, in-memory for testing).
pub trait Store: Send + Sync {
    // =========================================================================
    // Wallet Operations
    // =========================================================================

    /// Get a user's wallet.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_wallet(&self, user_id: &UserId) -> Result<Option<Wallet>>;

    /// Insert a wallet unless the user already has one.
    ///
    /// Returns the stored wallet: the new one, or the existing one if another
    /// caller created it first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn insert_wallet(&self, wallet: &Wallet) -> Result<Wallet>;

    // =========================================================================
    // Transaction Operations
    // =========================================================================

    /// Get a transaction by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_transaction(&self, transaction_id: &TransactionId) -> Result<Option<WalletTransaction>>;

    /// Get a transaction by its unique reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_transaction_by_reference(&self, reference: &str) -> Result<Option<WalletTransaction>>;

    /// List transactions for a user, ordered by time (newest first).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_transactions_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<WalletTransaction>>;

    /// List every transaction linked to a booking, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_transactions_by_booking(&self, booking_id: &BookingId)
        -> Result<Vec<WalletTransaction>>;

    // =========================================================================
    // Booking Operations
    // =========================================================================

    /// Insert or update a booking record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_booking(&self, booking: &Booking) -> Result<()>;

    /// Get a booking by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_booking(&self, booking_id: &BookingId) -> Result<Option<Booking>>;

    /// Return every booking matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn scan_bookings(&self, filter: &dyn Fn(&Booking) -> bool) -> Result<Vec<Booking>>;

    // =========================================================================
    // Outbox Operations
    // =========================================================================

    /// Oldest undelivered, non-dead-lettered events.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_outstanding_events(&self, limit: usize) -> Result<Vec<SettlementEvent>>;

    /// Get an event by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_event(&self, event_id: &EventId) -> Result<Option<SettlementEvent>>;

    /// Insert or update an event record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_event(&self, event: &SettlementEvent) -> Result<()>;

    // =========================================================================
    // Job Leases
    // =========================================================================

    /// Take the lease for `lease.job` if it is free, expired, or already ours.
    ///
    /// Returns `false` when another holder owns an unexpired lease.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn try_acquire_lease(&self, lease: &JobLease) -> Result<bool>;

    /// Drop the lease for `job` if `holder` owns it.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn release_lease(&self, job: &str, holder: &str) -> Result<()>;

    // =========================================================================
    // Compound Operations
    // =========================================================================

    /// Apply a set of writes atomically.
    ///
    /// # Errors
    ///
    /// - `StoreError::DuplicateReference` if a new transaction's reference is
    ///   already stored (nothing is written).
    /// - `StoreError::NotFound` if an updated transaction does not exist.
    fn commit(&self, writes: WriteSet) -> Result<()>;
}

/// All writes belonging to one ledger mutation.
#[derive(Debug, Clone, Default)]
pub struct WriteSet {
    /// Wallet rows to overwrite.
    pub wallets: Vec<Wallet>,
    /// New ledger entries. Their references must be unused.
    pub new_transactions: Vec<WalletTransaction>,
    /// Existing ledger entries to overwrite (hold settlement).
    pub updated_transactions: Vec<WalletTransaction>,
    /// Booking rows to overwrite.
    pub bookings: Vec<Booking>,
    /// Outbox events to enqueue.
    pub events: Vec<SettlementEvent>,
}

impl WriteSet {
    /// Create an empty write set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a wallet row.
    #[must_use]
    pub fn wallet(mut self, wallet: Wallet) -> Self {
        self.wallets.push(wallet);
        self
    }

    /// Add a new ledger entry.
    #[must_use]
    pub fn insert(mut self, transaction: WalletTransaction) -> Self {
        self.new_transactions.push(transaction);
        self
    }

    /// Add an updated ledger entry.
    #[must_use]
    pub fn update(mut self, transaction: WalletTransaction) -> Self {
        self.updated_transactions.push(transaction);
        self
    }

    /// Add a booking row.
    #[must_use]
    pub fn booking(mut self, booking: Booking) -> Self {
        self.bookings.push(booking);
        self
    }

    /// Add an outbox event.
    #[must_use]
    pub fn event(mut self, event: SettlementEvent) -> Self {
        self.events.push(event);
        self
    }

    /// References of the new entries, rejecting duplicates inside the set.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DuplicateReference` if two new entries share one.
    pub fn new_references(&self) -> Result<Vec<&str>> {
        let mut seen: Vec<&str> = Vec::with_capacity(self.new_transactions.len());
        for tx in &self.new_transactions {
            if seen.contains(&tx.reference.as_str()) {
                return Err(StoreError::DuplicateReference {
                    reference: tx.reference.clone(),
                });
            }
            seen.push(&tx.reference);
        }
        Ok(seen)
    }
}
