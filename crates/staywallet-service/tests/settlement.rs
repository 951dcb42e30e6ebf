//! Booking settlement integration tests: holds, releases and cancellations.

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal_macros::dec;

use common::{TestHarness, UnreachableConfig};
use staywallet_core::{
    BookingStatus, FundState, PaymentStatus, SettlementEventKind, UserId, WalletError,
};
use staywallet_service::collaborators::StaticConfig;
use staywallet_service::ledger::{pending_credit_reference, pending_reversal_reference};
use staywallet_service::{CancellationActor, RefundRequest};
use staywallet_store::WriteSet;

fn event_kinds(harness: &TestHarness) -> Vec<SettlementEventKind> {
    harness
        .store
        .list_outstanding_events(100)
        .unwrap()
        .into_iter()
        .map(|e| e.kind)
        .collect()
}

// ============================================================================
// Holding
// ============================================================================

#[tokio::test]
async fn hold_moves_booking_to_pending() {
    let harness = TestHarness::new();
    let owner = UserId::generate();
    let check_in = (Utc::now() + Duration::days(3)).date_naive();
    let booking = harness.paid_booking(UserId::generate(), owner, dec!(750), check_in, Utc::now());

    let hold = harness.funds.hold_payment(booking.id).await.unwrap();

    let booking = harness.booking(booking.id);
    assert_eq!(booking.wallet_status, FundState::Pending);
    assert_eq!(booking.wallet_transaction_id, Some(hold.id));
    assert_eq!(hold.reference, pending_credit_reference(&booking.id));
    assert_eq!(hold.release_date, Some(check_in));
    assert_eq!(
        harness.ledger.get_wallet(owner).unwrap().pending_balance,
        dec!(750)
    );
    let kinds = event_kinds(&harness);
    assert!(matches!(
        kinds.as_slice(),
        [SettlementEventKind::FundsHeld { amount, .. }] if *amount == dec!(750)
    ));
}

#[tokio::test]
async fn hold_twice_is_an_invalid_transition() {
    let harness = TestHarness::new();
    let booking = harness
        .held_booking(
            UserId::generate(),
            UserId::generate(),
            dec!(100),
            Utc::now().date_naive(),
            Utc::now(),
        )
        .await;

    let again = harness.funds.hold_payment(booking.id).await;

    assert!(matches!(again, Err(WalletError::InvalidTransition { .. })));
}

#[tokio::test]
async fn unpaid_booking_cannot_be_held() {
    let harness = TestHarness::new();
    let mut booking = harness.paid_booking(
        UserId::generate(),
        UserId::generate(),
        dec!(100),
        Utc::now().date_naive(),
        Utc::now(),
    );
    booking.payment_status = PaymentStatus::Pending;
    harness.store.put_booking(&booking).unwrap();

    let result = harness.funds.hold_payment(booking.id).await;

    assert!(matches!(result, Err(WalletError::Validation(_))));
}

// ============================================================================
// Release
// ============================================================================

#[tokio::test]
async fn release_job_pays_out_due_bookings_only() {
    let harness = TestHarness::new();
    let owner = UserId::generate();
    let today = Utc::now().date_naive();
    let due = harness
        .held_booking(UserId::generate(), owner, dec!(400), today, Utc::now())
        .await;
    let later = harness
        .held_booking(
            UserId::generate(),
            owner,
            dec!(250),
            today + Duration::days(10),
            Utc::now(),
        )
        .await;

    let report = harness.release_job().run(today).await.unwrap();

    assert_eq!(report.scanned, 1);
    assert_eq!(report.succeeded, 1);
    assert!(report.is_clean());
    assert_eq!(harness.booking(due.id).wallet_status, FundState::Released);
    assert_eq!(harness.booking(later.id).wallet_status, FundState::Pending);

    let wallet = harness.ledger.get_wallet(owner).unwrap();
    assert_eq!(wallet.available_balance, dec!(400));
    assert_eq!(wallet.pending_balance, dec!(250));

    let rerun = harness.release_job().run(today).await.unwrap();
    assert_eq!(rerun.scanned, 0);
    assert_eq!(
        harness.ledger.get_wallet(owner).unwrap().available_balance,
        dec!(400)
    );
}

#[tokio::test]
async fn second_release_is_a_conflict() {
    let harness = TestHarness::new();
    let owner = UserId::generate();
    let booking = harness
        .held_booking(
            UserId::generate(),
            owner,
            dec!(90),
            Utc::now().date_naive(),
            Utc::now(),
        )
        .await;

    harness.ledger.release_pending(booking.id).await.unwrap();
    let again = harness.ledger.release_pending(booking.id).await;

    assert!(matches!(again, Err(WalletError::ReleaseConflict { .. })));
    assert_eq!(
        harness.ledger.get_wallet(owner).unwrap().available_balance,
        dec!(90)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_releases_pay_once() {
    let harness = Arc::new(TestHarness::new());
    let owner = UserId::generate();
    let booking = harness
        .held_booking(
            UserId::generate(),
            owner,
            dec!(600),
            Utc::now().date_naive(),
            Utc::now(),
        )
        .await;

    let attempts = (0..4).map(|_| {
        let harness = Arc::clone(&harness);
        tokio::spawn(async move { harness.ledger.release_pending(booking.id).await })
    });
    let results = futures::future::join_all(attempts).await;

    let released = results.into_iter().filter(|r| matches!(r, Ok(Ok(_)))).count();
    assert_eq!(released, 1);
    let wallet = harness.ledger.get_wallet(owner).unwrap();
    assert_eq!(wallet.available_balance, dec!(600));
    assert_eq!(wallet.pending_balance, dec!(0));
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn owner_rejection_reverses_hold_and_refunds_guest() {
    let harness = TestHarness::new();
    let guest = UserId::generate();
    let owner = UserId::generate();
    let booking = harness
        .held_booking(
            guest,
            owner,
            dec!(500),
            (Utc::now() + Duration::days(5)).date_naive(),
            Utc::now(),
        )
        .await;

    let outcome = harness
        .funds
        .refund_booking(booking.id, "dates unavailable", CancellationActor::Owner)
        .await
        .unwrap();

    assert!(!outcome.needs_reconciliation());
    assert_eq!(outcome.refunded_amount, dec!(500));
    assert_eq!(outcome.booking.status, BookingStatus::Rejected);
    assert_eq!(outcome.booking.wallet_status, FundState::Refunded);
    assert_eq!(outcome.booking.payment_status, PaymentStatus::Refunded);

    assert_eq!(
        harness.ledger.get_wallet(owner).unwrap().pending_balance,
        dec!(0)
    );
    assert_eq!(
        harness.ledger.get_wallet(guest).unwrap().available_balance,
        dec!(500)
    );
    assert!(harness.ledger.audit_wallet(owner).unwrap().is_balanced());
    assert!(harness
        .store
        .get_transaction_by_reference(&format!("booking-refund:{}", booking.id))
        .unwrap()
        .is_some());
    assert!(event_kinds(&harness)
        .iter()
        .any(|k| matches!(k, SettlementEventKind::BookingRefunded { .. })));
}

#[tokio::test]
async fn refunded_booking_cannot_be_refunded_again() {
    let harness = TestHarness::new();
    let guest = UserId::generate();
    let booking = harness
        .held_booking(
            guest,
            UserId::generate(),
            dec!(80),
            Utc::now().date_naive(),
            Utc::now(),
        )
        .await;
    harness
        .funds
        .refund_booking(booking.id, "guest cancelled", CancellationActor::Guest)
        .await
        .unwrap();

    let again = harness
        .funds
        .refund_booking(booking.id, "guest cancelled", CancellationActor::Guest)
        .await;

    assert!(matches!(again, Err(WalletError::InvalidTransition { .. })));
    assert_eq!(
        harness.ledger.get_wallet(guest).unwrap().available_balance,
        dec!(80)
    );
}

#[tokio::test]
async fn released_booking_cannot_be_refunded() {
    let harness = TestHarness::new();
    let booking = harness
        .held_booking(
            UserId::generate(),
            UserId::generate(),
            dec!(80),
            Utc::now().date_naive(),
            Utc::now(),
        )
        .await;
    harness.ledger.release_pending(booking.id).await.unwrap();

    let result = harness
        .funds
        .refund_booking(booking.id, "too late", CancellationActor::Admin)
        .await;

    assert!(matches!(result, Err(WalletError::InvalidTransition { .. })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_release_and_cancellation_settle_funds_once() {
    let harness = Arc::new(TestHarness::new());

    for _ in 0..20 {
        let guest = UserId::generate();
        let owner = UserId::generate();
        let booking = harness
            .held_booking(guest, owner, dec!(500), Utc::now().date_naive(), Utc::now())
            .await;
        let barrier = Arc::new(tokio::sync::Barrier::new(2));

        let release = {
            let harness = Arc::clone(&harness);
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                harness.ledger.release_pending(booking.id).await
            })
        };
        let cancel = {
            let harness = Arc::clone(&harness);
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                harness
                    .funds
                    .refund_booking(booking.id, "guest cancelled", CancellationActor::Guest)
                    .await
            })
        };
        let released = release.await.unwrap();
        let cancelled = cancel.await.unwrap();

        let owner_wallet = harness.ledger.get_wallet(owner).unwrap();
        let guest_available = harness
            .store
            .get_wallet(&guest)
            .unwrap()
            .map_or(dec!(0), |w| w.available_balance);
        let stored = harness.booking(booking.id);

        match (released, cancelled) {
            (Ok(_), Err(WalletError::InvalidTransition { .. })) => {
                assert_eq!(owner_wallet.available_balance, dec!(500));
                assert_eq!(guest_available, dec!(0));
                assert_eq!(stored.wallet_status, FundState::Released);
            }
            (Err(WalletError::ReleaseConflict { .. }), Ok(outcome)) => {
                assert!(!outcome.needs_reconciliation());
                assert_eq!(owner_wallet.available_balance, dec!(0));
                assert_eq!(guest_available, dec!(500));
                assert_eq!(stored.wallet_status, FundState::Refunded);
            }
            (released, cancelled) => {
                panic!("both or neither settled: {released:?} / {cancelled:?}")
            }
        }
        assert_eq!(owner_wallet.pending_balance, dec!(0));
        assert!(harness.ledger.audit_wallet(owner).unwrap().is_balanced());
    }
}

#[tokio::test]
async fn released_hold_blocks_refund_even_if_booking_lags() {
    let harness = TestHarness::new();
    let guest = UserId::generate();
    let booking = harness
        .held_booking(
            guest,
            UserId::generate(),
            dec!(90),
            Utc::now().date_naive(),
            Utc::now(),
        )
        .await;
    harness.ledger.release_pending(booking.id).await.unwrap();

    // The booking row still says pending while its hold was paid out.
    let mut stale = harness.booking(booking.id);
    stale.wallet_status = FundState::Pending;
    harness.store.commit(WriteSet::new().booking(stale)).unwrap();

    let result = harness
        .funds
        .refund_booking(booking.id, "guest cancelled", CancellationActor::Guest)
        .await;

    assert!(matches!(
        result,
        Err(WalletError::InvalidTransition {
            from: FundState::Released,
            to: FundState::Refunded,
        })
    ));
    assert!(harness.store.get_wallet(&guest).unwrap().is_none());
    assert_eq!(harness.booking(booking.id).status, booking.status);
}

#[tokio::test]
async fn booking_without_hold_still_refunds_guest_once() {
    let harness = TestHarness::new();
    let guest = UserId::generate();
    let booking = harness.paid_booking(
        guest,
        UserId::generate(),
        dec!(120),
        Utc::now().date_naive(),
        Utc::now(),
    );

    let outcome = harness
        .funds
        .refund_booking(booking.id, "guest cancelled", CancellationActor::Guest)
        .await
        .unwrap();
    assert!(outcome.hold_reversed);
    assert!(outcome.refund_applied);
    assert_eq!(outcome.booking.wallet_status, FundState::None);
    assert_eq!(outcome.booking.status, BookingStatus::Cancelled);

    // A repeat finds the refund already applied.
    let repeat = harness
        .funds
        .refund_booking(booking.id, "guest cancelled", CancellationActor::Guest)
        .await
        .unwrap();
    assert!(repeat.refund_applied);
    assert_eq!(
        harness.ledger.get_wallet(guest).unwrap().available_balance,
        dec!(120)
    );
}

#[tokio::test]
async fn rerun_after_crash_skips_applied_steps() {
    let harness = TestHarness::new();
    let guest = UserId::generate();
    let owner = UserId::generate();
    let booking = harness
        .held_booking(guest, owner, dec!(300), Utc::now().date_naive(), Utc::now())
        .await;

    // Both ledger steps landed, the booking update did not.
    harness
        .ledger
        .debit_pending(owner, dec!(300), booking.id, "guest cancelled")
        .await
        .unwrap();
    harness
        .ledger
        .process_refund(
            RefundRequest::new(guest, dec!(300), "Refund")
                .for_booking(booking.id)
                .with_reference(format!("booking-refund:{}", booking.id)),
        )
        .await
        .unwrap();
    assert_eq!(harness.booking(booking.id).wallet_status, FundState::Pending);

    let outcome = harness
        .funds
        .refund_booking(booking.id, "guest cancelled", CancellationActor::Guest)
        .await
        .unwrap();

    assert!(!outcome.needs_reconciliation());
    assert_eq!(outcome.booking.wallet_status, FundState::Refunded);
    assert_eq!(
        harness.ledger.get_wallet(guest).unwrap().available_balance,
        dec!(300)
    );
    assert_eq!(
        harness.ledger.get_wallet(owner).unwrap().pending_balance,
        dec!(0)
    );
    assert!(harness
        .store
        .get_transaction_by_reference(&pending_reversal_reference(&booking.id))
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn failed_reversal_is_flagged_for_reconciliation() {
    let harness = TestHarness::new();
    let guest = UserId::generate();
    let owner = UserId::generate();
    let booking = harness
        .held_booking(guest, owner, dec!(200), Utc::now().date_naive(), Utc::now())
        .await;

    // Drain the owner's pending balance behind the ledger's back.
    let mut wallet = harness.ledger.get_wallet(owner).unwrap();
    wallet.pending_balance = dec!(0);
    harness.store.commit(WriteSet::new().wallet(wallet)).unwrap();

    let outcome = harness
        .funds
        .refund_booking(booking.id, "guest cancelled", CancellationActor::Guest)
        .await
        .unwrap();

    assert!(outcome.needs_reconciliation());
    assert!(!outcome.hold_reversed);
    assert!(outcome.refund_applied);
    assert_eq!(outcome.booking.status, BookingStatus::Cancelled);
    assert_eq!(outcome.booking.wallet_status, FundState::Pending);
    assert_eq!(
        harness.ledger.get_wallet(guest).unwrap().available_balance,
        dec!(200)
    );
    assert!(event_kinds(&harness)
        .iter()
        .any(|k| matches!(k, SettlementEventKind::ReconciliationRequired { .. })));
}

// ============================================================================
// Auto-cancellation
// ============================================================================

#[tokio::test]
async fn auto_cancel_refunds_stale_unconfirmed_bookings() {
    let harness = TestHarness::new();
    let guest = UserId::generate();
    let owner = UserId::generate();
    let now = Utc::now();
    let check_in = (now + Duration::days(14)).date_naive();

    let stale = harness
        .held_booking(guest, owner, dec!(500), check_in, now - Duration::hours(30))
        .await;
    let fresh = harness
        .held_booking(guest, owner, dec!(70), check_in, now - Duration::hours(2))
        .await;
    let mut confirmed = harness
        .held_booking(guest, owner, dec!(40), check_in, now - Duration::hours(48))
        .await;
    confirmed.status = BookingStatus::Confirmed;
    harness.store.put_booking(&confirmed).unwrap();

    let report = harness.default_auto_cancel_job().run(now).await.unwrap();

    assert_eq!(report.scanned, 1);
    assert_eq!(report.succeeded, 1);

    let stale = harness.booking(stale.id);
    assert_eq!(stale.status, BookingStatus::Cancelled);
    assert_eq!(stale.wallet_status, FundState::Refunded);
    assert!(stale
        .cancellation_reason
        .as_deref()
        .is_some_and(|r| r.contains("24 hours")));
    assert_eq!(harness.booking(fresh.id).status, BookingStatus::Pending);
    assert_eq!(harness.booking(confirmed.id).status, BookingStatus::Confirmed);

    assert_eq!(
        harness.ledger.get_wallet(owner).unwrap().pending_balance,
        dec!(110)
    );
    assert_eq!(
        harness.ledger.get_wallet(guest).unwrap().available_balance,
        dec!(500)
    );
    assert!(harness
        .store
        .get_transaction_by_reference(&format!("auto-cancel-refund:{}", stale.id))
        .unwrap()
        .is_some());
    assert!(event_kinds(&harness)
        .iter()
        .any(|k| matches!(k, SettlementEventKind::BookingAutoCancelled { .. })));

    let rerun = harness.default_auto_cancel_job().run(now).await.unwrap();
    assert_eq!(rerun.scanned, 0);
}

#[tokio::test]
async fn auto_cancel_timeout_comes_from_configuration() {
    let harness = TestHarness::new();
    let config = StaticConfig::new().with("booking_auto_cancel_hours", "1.5");
    let job = harness.auto_cancel_job(Arc::new(config), 24);

    assert_eq!(job.timeout().await, Duration::minutes(90));
}

#[tokio::test]
async fn auto_cancel_timeout_falls_back_to_default() {
    let harness = TestHarness::new();

    let unreachable = harness.auto_cancel_job(Arc::new(UnreachableConfig), 36);
    assert_eq!(unreachable.timeout().await, Duration::hours(36));

    let zero = harness.auto_cancel_job(
        Arc::new(StaticConfig::new().with("booking_auto_cancel_hours", "0")),
        12,
    );
    assert_eq!(zero.timeout().await, Duration::hours(12));

    let garbage = harness.auto_cancel_job(
        Arc::new(StaticConfig::new().with("booking_auto_cancel_hours", "soon")),
        24,
    );
    assert_eq!(garbage.timeout().await, Duration::hours(24));

    let missing = harness.default_auto_cancel_job();
    assert_eq!(missing.timeout().await, Duration::hours(24));
}

#[tokio::test]
async fn auto_cancel_counts_reconciliation_cases() {
    let harness = TestHarness::new();
    let owner = UserId::generate();
    let now = Utc::now();
    let booking = harness
        .held_booking(
            UserId::generate(),
            owner,
            dec!(60),
            (now + Duration::days(3)).date_naive(),
            now - Duration::hours(25),
        )
        .await;

    let mut wallet = harness.ledger.get_wallet(owner).unwrap();
    wallet.pending_balance = dec!(0);
    harness.store.commit(WriteSet::new().wallet(wallet)).unwrap();

    let report = harness.default_auto_cancel_job().run(now).await.unwrap();

    assert_eq!(report.reconciliation_required, 1);
    assert!(!report.is_clean());
    assert_eq!(harness.booking(booking.id).status, BookingStatus::Cancelled);
}
