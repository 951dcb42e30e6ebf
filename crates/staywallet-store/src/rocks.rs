//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};

use staywallet_core::{
    Booking, BookingId, EventId, JobLease, SettlementEvent, TransactionId, UserId, Wallet,
    WalletTransaction,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::{Store, WriteSet};

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    /// Serializes check-then-write sequences (reference uniqueness, leases,
    /// wallet creation).
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    fn write_guard(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| StoreError::Database("write lock poisoned".into()))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Point lookup of a CBOR value.
    fn get_value<T: serde::de::DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    /// Collect transaction ids under a 16-byte prefix of an index column family.
    fn index_scan(
        &self,
        cf_name: &str,
        prefix: &[u8; 16],
        newest_first: bool,
    ) -> Result<Vec<TransactionId>> {
        let cf = self.cf(cf_name)?;

        let upper = keys::indexed_transaction_key(prefix, &TransactionId::from_bytes([0xff; 16]));
        let mode = if newest_first {
            IteratorMode::From(upper.as_slice(), Direction::Reverse)
        } else {
            IteratorMode::From(&prefix[..], Direction::Forward)
        };

        let mut ids = Vec::new();
        for item in self.db.iterator_cf(&cf, mode) {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(prefix) {
                break;
            }
            if let Some(id) = keys::extract_transaction_id(&key) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    fn load_transactions(&self, ids: &[TransactionId]) -> Result<Vec<WalletTransaction>> {
        let mut transactions = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(tx) = self.get_transaction(id)? {
                transactions.push(tx);
            }
        }
        Ok(transactions)
    }

    fn stage_event(&self, batch: &mut WriteBatch, event: &SettlementEvent) -> Result<()> {
        let cf_outbox = self.cf(cf::OUTBOX)?;
        let cf_pending = self.cf(cf::OUTBOX_PENDING)?;
        let key = keys::event_key(&event.id);

        batch.put_cf(&cf_outbox, &key, Self::serialize(event)?);
        if event.is_outstanding() {
            batch.put_cf(&cf_pending, &key, b"");
        } else {
            batch.delete_cf(&cf_pending, &key);
        }
        Ok(())
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Wallet Operations
    // =========================================================================

    fn get_wallet(&self, user_id: &UserId) -> Result<Option<Wallet>> {
        self.get_value(cf::WALLETS, &keys::wallet_key(user_id))
    }

    fn insert_wallet(&self, wallet: &Wallet) -> Result<Wallet> {
        let _guard = self.write_guard()?;

        if let Some(existing) = self.get_wallet(&wallet.user_id)? {
            return Ok(existing);
        }

        let cf = self.cf(cf::WALLETS)?;
        self.db
            .put_cf(&cf, keys::wallet_key(&wallet.user_id), Self::serialize(wallet)?)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(wallet.clone())
    }

    // =========================================================================
    // Transaction Operations
    // =========================================================================

    fn get_transaction(&self, transaction_id: &TransactionId) -> Result<Option<WalletTransaction>> {
        self.get_value(cf::TRANSACTIONS, &keys::transaction_key(transaction_id))
    }

    fn get_transaction_by_reference(&self, reference: &str) -> Result<Option<WalletTransaction>> {
        let cf = self.cf(cf::TRANSACTIONS_BY_REFERENCE)?;
        let Some(raw) = self
            .db
            .get_cf(&cf, keys::reference_key(reference))
            .map_err(|e| StoreError::Database(e.to_string()))?
        else {
            return Ok(None);
        };

        let bytes: [u8; 16] = raw
            .as_slice()
            .try_into()
            .map_err(|_| StoreError::Serialization("malformed reference index entry".into()))?;
        self.get_transaction(&TransactionId::from_bytes(bytes))
    }

    fn list_transactions_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<WalletTransaction>> {
        let ids: Vec<_> = self
            .index_scan(cf::TRANSACTIONS_BY_USER, user_id.as_bytes(), true)?
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect();
        self.load_transactions(&ids)
    }

    fn list_transactions_by_booking(
        &self,
        booking_id: &BookingId,
    ) -> Result<Vec<WalletTransaction>> {
        let ids = self.index_scan(cf::TRANSACTIONS_BY_BOOKING, booking_id.as_bytes(), false)?;
        self.load_transactions(&ids)
    }

    // =========================================================================
    // Booking Operations
    // =========================================================================

    fn put_booking(&self, booking: &Booking) -> Result<()> {
        let cf = self.cf(cf::BOOKINGS)?;
        self.db
            .put_cf(&cf, keys::booking_key(&booking.id), Self::serialize(booking)?)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn get_booking(&self, booking_id: &BookingId) -> Result<Option<Booking>> {
        self.get_value(cf::BOOKINGS, &keys::booking_key(booking_id))
    }

    fn scan_bookings(&self, filter: &dyn Fn(&Booking) -> bool) -> Result<Vec<Booking>> {
        let cf = self.cf(cf::BOOKINGS)?;

        let mut bookings = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            let booking: Booking = Self::deserialize(&value)?;
            if filter(&booking) {
                bookings.push(booking);
            }
        }

        bookings.sort_by_key(|b| b.created_at);
        Ok(bookings)
    }

    // =========================================================================
    // Outbox Operations
    // =========================================================================

    fn list_outstanding_events(&self, limit: usize) -> Result<Vec<SettlementEvent>> {
        let cf_pending = self.cf(cf::OUTBOX_PENDING)?;

        let mut events = Vec::new();
        for item in self.db.iterator_cf(&cf_pending, IteratorMode::Start) {
            if events.len() >= limit {
                break;
            }
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            let Some(event_id) = keys::extract_event_id(&key) else {
                tracing::warn!("Skipping malformed outbox index key");
                continue;
            };
            if let Some(event) = self.get_event(&event_id)? {
                events.push(event);
            }
        }

        Ok(events)
    }

    fn get_event(&self, event_id: &EventId) -> Result<Option<SettlementEvent>> {
        self.get_value(cf::OUTBOX, &keys::event_key(event_id))
    }

    fn put_event(&self, event: &SettlementEvent) -> Result<()> {
        let mut batch = WriteBatch::default();
        self.stage_event(&mut batch, event)?;
        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    // =========================================================================
    // Job Leases
    // =========================================================================

    fn try_acquire_lease(&self, lease: &JobLease) -> Result<bool> {
        let _guard = self.write_guard()?;
        let key = keys::lease_key(&lease.job);

        let current: Option<JobLease> = self.get_value(cf::JOB_LEASES, &key)?;
        if let Some(current) = current {
            if current.holder != lease.holder && !current.is_expired(lease.acquired_at) {
                return Ok(false);
            }
        }

        let cf = self.cf(cf::JOB_LEASES)?;
        self.db
            .put_cf(&cf, key, Self::serialize(lease)?)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(true)
    }

    fn release_lease(&self, job: &str, holder: &str) -> Result<()> {
        let _guard = self.write_guard()?;
        let key = keys::lease_key(job);

        let current: Option<JobLease> = self.get_value(cf::JOB_LEASES, &key)?;
        if current.is_some_and(|l| l.holder == holder) {
            let cf = self.cf(cf::JOB_LEASES)?;
            self.db
                .delete_cf(&cf, key)
                .map_err(|e| StoreError::Database(e.to_string()))?;
        }
        Ok(())
    }

    // =========================================================================
    // Compound Operations
    // =========================================================================

    fn commit(&self, writes: WriteSet) -> Result<()> {
        let _guard = self.write_guard()?;

        let cf_wallets = self.cf(cf::WALLETS)?;
        let cf_tx = self.cf(cf::TRANSACTIONS)?;
        let cf_by_user = self.cf(cf::TRANSACTIONS_BY_USER)?;
        let cf_by_booking = self.cf(cf::TRANSACTIONS_BY_BOOKING)?;
        let cf_by_reference = self.cf(cf::TRANSACTIONS_BY_REFERENCE)?;
        let cf_bookings = self.cf(cf::BOOKINGS)?;

        // Check uniqueness and existence before staging anything
        for reference in writes.new_references()? {
            let exists = self
                .db
                .get_cf(&cf_by_reference, keys::reference_key(reference))
                .map_err(|e| StoreError::Database(e.to_string()))?
                .is_some();
            if exists {
                return Err(StoreError::DuplicateReference {
                    reference: reference.to_string(),
                });
            }
        }
        for tx in &writes.updated_transactions {
            if self.get_transaction(&tx.id)?.is_none() {
                return Err(StoreError::NotFound {
                    entity: "transaction",
                    id: tx.id.to_string(),
                });
            }
        }

        let mut batch = WriteBatch::default();

        for wallet in &writes.wallets {
            batch.put_cf(
                &cf_wallets,
                keys::wallet_key(&wallet.user_id),
                Self::serialize(wallet)?,
            );
        }

        for tx in &writes.new_transactions {
            batch.put_cf(&cf_tx, keys::transaction_key(&tx.id), Self::serialize(tx)?);
            batch.put_cf(&cf_by_user, keys::user_transaction_key(&tx.user_id, &tx.id), b"");
            if let Some(booking_id) = &tx.booking_id {
                batch.put_cf(
                    &cf_by_booking,
                    keys::booking_transaction_key(booking_id, &tx.id),
                    b"",
                );
            }
            batch.put_cf(
                &cf_by_reference,
                keys::reference_key(&tx.reference),
                tx.id.to_bytes(),
            );
        }

        for tx in &writes.updated_transactions {
            batch.put_cf(&cf_tx, keys::transaction_key(&tx.id), Self::serialize(tx)?);
        }

        for booking in &writes.bookings {
            batch.put_cf(
                &cf_bookings,
                keys::booking_key(&booking.id),
                Self::serialize(booking)?,
            );
        }

        for event in &writes.events {
            self.stage_event(&mut batch, event)?;
        }

        // Write atomically
        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }
}
