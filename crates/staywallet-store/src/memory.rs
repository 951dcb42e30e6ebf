//! In-memory storage implementation.
//!
//! Every table lives behind one mutex, so a [`WriteSet`] is validated and
//! applied inside a single critical section.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use staywallet_core::{
    Booking, BookingId, EventId, JobLease, SettlementEvent, TransactionId, UserId, Wallet,
    WalletTransaction,
};

use crate::error::{Result, StoreError};
use crate::{Store, WriteSet};

#[derive(Default)]
struct Tables {
    wallets: HashMap<UserId, Wallet>,
    transactions: BTreeMap<TransactionId, WalletTransaction>,
    by_user: HashMap<UserId, Vec<TransactionId>>,
    by_booking: HashMap<BookingId, Vec<TransactionId>>,
    by_reference: HashMap<String, TransactionId>,
    bookings: HashMap<BookingId, Booking>,
    events: BTreeMap<EventId, SettlementEvent>,
    leases: HashMap<String, JobLease>,
}

impl Tables {
    fn insert_transaction(&mut self, tx: WalletTransaction) {
        self.by_user.entry(tx.user_id).or_default().push(tx.id);
        if let Some(booking_id) = tx.booking_id {
            self.by_booking.entry(booking_id).or_default().push(tx.id);
        }
        self.by_reference.insert(tx.reference.clone(), tx.id);
        self.transactions.insert(tx.id, tx);
    }
}

/// Mutex-backed storage implementation.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Database("memory store lock poisoned".into()))
    }
}

impl Store for MemoryStore {
    fn get_wallet(&self, user_id: &UserId) -> Result<Option<Wallet>> {
        Ok(self.lock()?.wallets.get(user_id).cloned())
    }

    fn insert_wallet(&self, wallet: &Wallet) -> Result<Wallet> {
        let mut tables = self.lock()?;
        Ok(tables
            .wallets
            .entry(wallet.user_id)
            .or_insert_with(|| wallet.clone())
            .clone())
    }

    fn get_transaction(&self, transaction_id: &TransactionId) -> Result<Option<WalletTransaction>> {
        Ok(self.lock()?.transactions.get(transaction_id).cloned())
    }

    fn get_transaction_by_reference(&self, reference: &str) -> Result<Option<WalletTransaction>> {
        let tables = self.lock()?;
        Ok(tables
            .by_reference
            .get(reference)
            .and_then(|id| tables.transactions.get(id))
            .cloned())
    }

    fn list_transactions_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<WalletTransaction>> {
        let tables = self.lock()?;
        let Some(ids) = tables.by_user.get(user_id) else {
            return Ok(Vec::new());
        };

        let mut ids = ids.clone();
        ids.sort_unstable_by(|a, b| b.cmp(a));

        Ok(ids
            .iter()
            .skip(offset)
            .take(limit)
            .filter_map(|id| tables.transactions.get(id).cloned())
            .collect())
    }

    fn list_transactions_by_booking(
        &self,
        booking_id: &BookingId,
    ) -> Result<Vec<WalletTransaction>> {
        let tables = self.lock()?;
        let mut txs: Vec<_> = tables
            .by_booking
            .get(booking_id)
            .into_iter()
            .flatten()
            .filter_map(|id| tables.transactions.get(id).cloned())
            .collect();
        txs.sort_by_key(|tx| tx.id);
        Ok(txs)
    }

    fn put_booking(&self, booking: &Booking) -> Result<()> {
        self.lock()?.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    fn get_booking(&self, booking_id: &BookingId) -> Result<Option<Booking>> {
        Ok(self.lock()?.bookings.get(booking_id).cloned())
    }

    fn scan_bookings(&self, filter: &dyn Fn(&Booking) -> bool) -> Result<Vec<Booking>> {
        let tables = self.lock()?;
        let mut bookings: Vec<_> = tables
            .bookings
            .values()
            .filter(|b| filter(b))
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.created_at);
        Ok(bookings)
    }

    fn list_outstanding_events(&self, limit: usize) -> Result<Vec<SettlementEvent>> {
        Ok(self
            .lock()?
            .events
            .values()
            .filter(|e| e.is_outstanding())
            .take(limit)
            .cloned()
            .collect())
    }

    fn get_event(&self, event_id: &EventId) -> Result<Option<SettlementEvent>> {
        Ok(self.lock()?.events.get(event_id).cloned())
    }

    fn put_event(&self, event: &SettlementEvent) -> Result<()> {
        self.lock()?.events.insert(event.id, event.clone());
        Ok(())
    }

    fn try_acquire_lease(&self, lease: &JobLease) -> Result<bool> {
        let mut tables = self.lock()?;
        if let Some(current) = tables.leases.get(&lease.job) {
            if current.holder != lease.holder && !current.is_expired(lease.acquired_at) {
                return Ok(false);
            }
        }
        tables.leases.insert(lease.job.clone(), lease.clone());
        Ok(true)
    }

    fn release_lease(&self, job: &str, holder: &str) -> Result<()> {
        let mut tables = self.lock()?;
        if tables.leases.get(job).is_some_and(|l| l.holder == holder) {
            tables.leases.remove(job);
        }
        Ok(())
    }

    fn commit(&self, writes: WriteSet) -> Result<()> {
        let mut tables = self.lock()?;

        // Validate everything before touching any table.
        for reference in writes.new_references()? {
            if tables.by_reference.contains_key(reference) {
                return Err(StoreError::DuplicateReference {
                    reference: reference.to_string(),
                });
            }
        }
        for tx in &writes.updated_transactions {
            if !tables.transactions.contains_key(&tx.id) {
                return Err(StoreError::NotFound {
                    entity: "transaction",
                    id: tx.id.to_string(),
                });
            }
        }

        for wallet in writes.wallets {
            tables.wallets.insert(wallet.user_id, wallet);
        }
        for tx in writes.new_transactions {
            tables.insert_transaction(tx);
        }
        for tx in writes.updated_transactions {
            tables.transactions.insert(tx.id, tx);
        }
        for booking in writes.bookings {
            tables.bookings.insert(booking.id, booking);
        }
        for event in writes.events {
            tables.events.insert(event.id, event);
        }

        Ok(())
    }
}
