//! Property tests: wallet balances always agree with the ledger.

mod common;

use chrono::{Duration, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;

use common::TestHarness;
use staywallet_core::{BookingId, UserId};
use staywallet_service::{CancellationActor, WalletAudit};

#[derive(Debug, Clone)]
enum Op {
    Credit(i64),
    Debit(i64),
    Hold(i64),
    ReleaseOldest,
    CancelOldest,
    TransferToGuest(i64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1i64..100_000).prop_map(Op::Credit),
        (1i64..100_000).prop_map(Op::Debit),
        (1i64..50_000).prop_map(Op::Hold),
        Just(Op::ReleaseOldest),
        Just(Op::CancelOldest),
        (1i64..50_000).prop_map(Op::TransferToGuest),
    ]
}

fn cents(value: i64) -> Decimal {
    Decimal::new(value, 2)
}

/// Apply the operations; errors such as overdrafts are expected and ignored.
async fn replay(ops: Vec<Op>) -> (WalletAudit, WalletAudit) {
    let harness = TestHarness::new();
    let owner = UserId::generate();
    let guest = UserId::generate();
    harness.fund(owner, cents(1)).await;
    harness.fund(guest, cents(1)).await;

    let mut open: Vec<BookingId> = Vec::new();
    for (i, op) in ops.into_iter().enumerate() {
        match op {
            Op::Credit(amount) => {
                let _ = harness
                    .ledger
                    .credit(owner, cents(amount), format!("credit-{i}"), "Credit")
                    .await;
            }
            Op::Debit(amount) => {
                let _ = harness
                    .ledger
                    .debit(owner, cents(amount), format!("debit-{i}"), "Debit")
                    .await;
            }
            Op::Hold(amount) => {
                let booking = harness
                    .held_booking(
                        guest,
                        owner,
                        cents(amount),
                        (Utc::now() + Duration::days(1)).date_naive(),
                        Utc::now(),
                    )
                    .await;
                open.push(booking.id);
            }
            Op::ReleaseOldest => {
                if !open.is_empty() {
                    let booking_id = open.remove(0);
                    let _ = harness.ledger.release_pending(booking_id).await;
                }
            }
            Op::CancelOldest => {
                if !open.is_empty() {
                    let booking_id = open.remove(0);
                    let _ = harness
                        .funds
                        .refund_booking(booking_id, "cancelled", CancellationActor::Guest)
                        .await;
                }
            }
            Op::TransferToGuest(amount) => {
                let _ = harness
                    .ledger
                    .transfer(owner, guest, cents(amount), "Transfer")
                    .await;
            }
        }
    }

    (
        harness.ledger.audit_wallet(owner).unwrap(),
        harness.ledger.audit_wallet(guest).unwrap(),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn balances_match_ledger(ops in prop::collection::vec(op(), 1..30)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let (owner, guest) = runtime.block_on(replay(ops));

        for audit in [owner, guest] {
            prop_assert!(audit.is_balanced(), "{audit:?}");
            prop_assert!(audit.available_balance >= Decimal::ZERO);
            prop_assert!(audit.pending_balance >= Decimal::ZERO);
        }
    }

    #[test]
    fn pending_balance_equals_open_holds(ops in prop::collection::vec(op(), 1..30)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let (owner, _) = runtime.block_on(replay(ops));

        prop_assert_eq!(owner.pending_balance, owner.open_holds);
    }
}
