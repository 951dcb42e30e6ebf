//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Wallet records, keyed by `user_id`.
    pub const WALLETS: &str = "wallets";

    /// Ledger transactions, keyed by `transaction_id` (ULID).
    pub const TRANSACTIONS: &str = "transactions";

    /// Index: transactions by user, keyed by `user_id || transaction_id`.
    /// Value is empty (index only).
    pub const TRANSACTIONS_BY_USER: &str = "transactions_by_user";

    /// Index: transactions by booking, keyed by `booking_id || transaction_id`.
    /// Value is empty (index only).
    pub const TRANSACTIONS_BY_BOOKING: &str = "transactions_by_booking";

    /// Unique index: reference → `transaction_id`.
    pub const TRANSACTIONS_BY_REFERENCE: &str = "transactions_by_reference";

    /// Booking projection, keyed by `booking_id`.
    pub const BOOKINGS: &str = "bookings";

    /// Settlement outbox events, keyed by `event_id` (ULID).
    pub const OUTBOX: &str = "outbox";

    /// Index: undelivered outbox events, keyed by `event_id`.
    /// Value is empty (index only).
    pub const OUTBOX_PENDING: &str = "outbox_pending";

    /// Scheduled job leases, keyed by job name.
    pub const JOB_LEASES: &str = "job_leases";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::WALLETS,
        cf::TRANSACTIONS,
        cf::TRANSACTIONS_BY_USER,
        cf::TRANSACTIONS_BY_BOOKING,
        cf::TRANSACTIONS_BY_REFERENCE,
        cf::BOOKINGS,
        cf::OUTBOX,
        cf::OUTBOX_PENDING,
        cf::JOB_LEASES,
    ]
}
