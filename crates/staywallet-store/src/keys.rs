//! Key encoding utilities for `RocksDB`.
//!
//! This module provides functions for encoding and decoding keys used in column families.

use staywallet_core::{BookingId, EventId, TransactionId, UserId};

/// Create a wallet key from the owner's user ID.
#[must_use]
pub fn wallet_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Create a transaction key from a transaction ID.
#[must_use]
pub fn transaction_key(transaction_id: &TransactionId) -> Vec<u8> {
    transaction_id.to_bytes().to_vec()
}

/// Create a secondary index key: `owner (16 bytes) || transaction_id (16 bytes)`.
///
/// Since ULIDs are time-ordered, entries under one owner sort by time.
#[must_use]
pub fn indexed_transaction_key(owner: &[u8; 16], transaction_id: &TransactionId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(owner);
    key.extend_from_slice(&transaction_id.to_bytes());
    key
}

/// Create a user-transaction index key.
#[must_use]
pub fn user_transaction_key(user_id: &UserId, transaction_id: &TransactionId) -> Vec<u8> {
    indexed_transaction_key(user_id.as_bytes(), transaction_id)
}

/// Create a booking-transaction index key.
#[must_use]
pub fn booking_transaction_key(booking_id: &BookingId, transaction_id: &TransactionId) -> Vec<u8> {
    indexed_transaction_key(booking_id.as_bytes(), transaction_id)
}

/// Extract the transaction ID from a 32-byte index key.
///
/// Returns `None` if the key is shorter than 32 bytes.
#[must_use]
pub fn extract_transaction_id(key: &[u8]) -> Option<TransactionId> {
    let bytes: [u8; 16] = key.get(16..32)?.try_into().ok()?;
    Some(TransactionId::from_bytes(bytes))
}

/// Create a reference index key.
#[must_use]
pub fn reference_key(reference: &str) -> Vec<u8> {
    reference.as_bytes().to_vec()
}

/// Create a booking key.
#[must_use]
pub fn booking_key(booking_id: &BookingId) -> Vec<u8> {
    booking_id.as_bytes().to_vec()
}

/// Create an outbox event key.
#[must_use]
pub fn event_key(event_id: &EventId) -> Vec<u8> {
    event_id.to_bytes().to_vec()
}

/// Extract the event ID from an outbox key.
#[must_use]
pub fn extract_event_id(key: &[u8]) -> Option<EventId> {
    let bytes: [u8; 16] = key.try_into().ok()?;
    Some(EventId::from_bytes(bytes))
}

/// Create a job lease key.
#[must_use]
pub fn lease_key(job: &str) -> Vec<u8> {
    job.as_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wallet_key_length() {
        assert_eq!(wallet_key(&UserId::generate()).len(), 16);
    }

    #[test]
    fn user_transaction_key_format() {
        let user_id = UserId::generate();
        let tx_id = TransactionId::generate();
        let key = user_transaction_key(&user_id, &tx_id);

        assert_eq!(key.len(), 32);
        assert_eq!(&key[..16], user_id.as_bytes());
        assert_eq!(&key[16..], tx_id.to_bytes());
    }

    #[test]
    fn extract_transaction_id_from_booking_key() {
        let booking_id = BookingId::generate();
        let tx_id = TransactionId::generate();
        let key = booking_transaction_key(&booking_id, &tx_id);

        assert_eq!(extract_transaction_id(&key), Some(tx_id));
        assert_eq!(extract_transaction_id(&key[..20]), None);
    }

    #[test]
    fn event_key_roundtrip() {
        let id = EventId::generate();
        assert_eq!(extract_event_id(&event_key(&id)), Some(id));
    }
}
