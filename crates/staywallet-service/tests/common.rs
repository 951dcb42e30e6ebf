//! Common test utilities for staywallet integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use staywallet_core::{
    Booking, BookingId, BookingStatus, BookingType, FundState, PaymentStatus, PropertyId, UserId,
};
use staywallet_service::collaborators::{
    Availability, CollaboratorResult, ConfigProvider, Notification, Notifier, PaymentGateway,
    StaticConfig, VerifiedPayment,
};
use staywallet_service::{
    AutoCancelJob, BookingFunds, CollaboratorError, OutboxDispatcher, ReleaseJob, WalletLedger,
};
use staywallet_store::{MemoryStore, Store};

/// Test harness wiring the ledger and settlement over an in-memory store.
pub struct TestHarness {
    /// The storage backend.
    pub store: Arc<dyn Store>,
    /// The wallet ledger.
    pub ledger: Arc<WalletLedger>,
    /// Booking fund movements.
    pub funds: Arc<BookingFunds>,
    /// Notifications the dispatcher sent.
    pub notifier: Arc<RecordingNotifier>,
    /// Calendar unblocks the dispatcher requested.
    pub availability: Arc<RecordingAvailability>,
}

impl TestHarness {
    /// Create a new test harness with a fresh in-memory store.
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    /// Create a harness over an existing store.
    pub fn with_store(store: Arc<dyn Store>) -> Self {
        let ledger = Arc::new(WalletLedger::new(Arc::clone(&store)));
        let funds = Arc::new(BookingFunds::new(Arc::clone(&ledger)));

        Self {
            store,
            ledger,
            funds,
            notifier: Arc::new(RecordingNotifier::default()),
            availability: Arc::new(RecordingAvailability::default()),
        }
    }

    /// Credit `amount` to a fresh reference.
    pub async fn fund(&self, user_id: UserId, amount: Decimal) {
        self.ledger
            .credit(
                user_id,
                amount,
                format!("seed:{}", uuid::Uuid::new_v4()),
                "Test funding",
            )
            .await
            .expect("Failed to fund wallet");
    }

    /// Store a fully paid shortlet booking created `created_at`.
    pub fn paid_booking(
        &self,
        guest: UserId,
        owner: UserId,
        amount: Decimal,
        check_in_date: NaiveDate,
        created_at: DateTime<Utc>,
    ) -> Booking {
        let booking = Booking {
            id: BookingId::generate(),
            property_id: PropertyId::generate(),
            user_id: guest,
            owner_id: owner,
            check_in_date,
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Completed,
            wallet_status: FundState::None,
            wallet_transaction_id: None,
            booking_type: BookingType::Shortlet,
            total_price: amount,
            amount_paid: amount,
            cancellation_reason: None,
            cancelled_at: None,
            created_at,
            updated_at: created_at,
        };
        self.store
            .put_booking(&booking)
            .expect("Failed to store booking");
        booking
    }

    /// Store a paid booking and hold its funds for the owner.
    pub async fn held_booking(
        &self,
        guest: UserId,
        owner: UserId,
        amount: Decimal,
        check_in_date: NaiveDate,
        created_at: DateTime<Utc>,
    ) -> Booking {
        let booking = self.paid_booking(guest, owner, amount, check_in_date, created_at);
        self.funds
            .hold_payment(booking.id)
            .await
            .expect("Failed to hold booking funds");
        self.booking(booking.id)
    }

    /// Reload a booking.
    pub fn booking(&self, booking_id: BookingId) -> Booking {
        self.store
            .get_booking(&booking_id)
            .expect("Failed to read booking")
            .expect("Booking missing")
    }

    /// Release job over this harness.
    pub fn release_job(&self) -> ReleaseJob {
        ReleaseJob::new(Arc::clone(&self.ledger))
    }

    /// Auto-cancellation job reading its timeout from `config`.
    pub fn auto_cancel_job(&self, config: Arc<dyn ConfigProvider>, default_hours: u32) -> AutoCancelJob {
        AutoCancelJob::new(Arc::clone(&self.funds), config, default_hours)
    }

    /// Auto-cancellation job with no configured timeout.
    pub fn default_auto_cancel_job(&self) -> AutoCancelJob {
        self.auto_cancel_job(Arc::new(StaticConfig::new()), 24)
    }

    /// Outbox dispatcher delivering to the recording collaborators.
    pub fn dispatcher(&self) -> OutboxDispatcher {
        OutboxDispatcher::new(
            Arc::clone(&self.store),
            Arc::clone(&self.notifier) as Arc<dyn Notifier>,
            Arc::clone(&self.availability) as Arc<dyn Availability>,
        )
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Notifier that records what it sends and can be switched to fail.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    /// Notifications delivered so far.
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    /// Templates delivered so far.
    pub fn templates(&self) -> Vec<String> {
        self.sent().into_iter().map(|n| n.template).collect()
    }

    /// Make every send fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> CollaboratorResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Api {
                status: 503,
                message: "notification service unavailable".into(),
            });
        }
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Availability that records unblock requests and can be switched to fail.
#[derive(Debug, Default)]
pub struct RecordingAvailability {
    unblocked: Mutex<Vec<(PropertyId, BookingId)>>,
    failing: AtomicBool,
}

impl RecordingAvailability {
    /// Unblock requests so far.
    pub fn unblocked(&self) -> Vec<(PropertyId, BookingId)> {
        self.unblocked.lock().unwrap().clone()
    }

    /// Make every unblock fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Availability for RecordingAvailability {
    async fn unblock_dates_for_booking(
        &self,
        property_id: PropertyId,
        booking_id: BookingId,
    ) -> CollaboratorResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Api {
                status: 502,
                message: "calendar service unavailable".into(),
            });
        }
        self.unblocked.lock().unwrap().push((property_id, booking_id));
        Ok(())
    }
}

/// Configuration provider that is always unreachable.
#[derive(Debug, Default)]
pub struct UnreachableConfig;

#[async_trait]
impl ConfigProvider for UnreachableConfig {
    async fn get_value(&self, _key: &str) -> CollaboratorResult<Option<String>> {
        Err(CollaboratorError::InvalidResponse("connection refused".into()))
    }
}

/// Gateway answering from a fixed table of payments.
#[derive(Debug, Default)]
pub struct FakeGateway {
    payments: Mutex<HashMap<String, VerifiedPayment>>,
    calls: AtomicUsize,
}

impl FakeGateway {
    /// Register a payment.
    pub fn with_payment(self, payment: VerifiedPayment) -> Self {
        self.payments
            .lock()
            .unwrap()
            .insert(payment.reference.clone(), payment);
        self
    }

    /// How many verifications were made.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn verify(&self, reference: &str) -> CollaboratorResult<VerifiedPayment> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.payments
            .lock()
            .unwrap()
            .get(reference)
            .cloned()
            .ok_or_else(|| CollaboratorError::Api {
                status: 404,
                message: format!("transaction {reference} not found"),
            })
    }
}

/// A successful NGN payment.
pub fn payment(reference: &str, amount: Decimal, user_id: Option<UserId>) -> VerifiedPayment {
    VerifiedPayment {
        reference: reference.to_string(),
        successful: true,
        amount,
        currency: "NGN".into(),
        user_id,
    }
}
