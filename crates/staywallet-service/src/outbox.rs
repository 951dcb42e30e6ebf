//! Outbox dispatcher.
//!
//! Settlement events are committed together with the ledger change that
//! caused them. The dispatcher delivers them afterwards to the calendar and
//! notification collaborators, retrying on later runs until `max_attempts`,
//! after which an event is dead-lettered. Delivery is at-least-once.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;

use staywallet_core::{BookingId, PropertyId, Result, SettlementEventKind};
use staywallet_store::Store;

use crate::collaborators::{Availability, CollaboratorResult, Notification, Notifier};

/// Job name used for leases.
pub const OUTBOX_JOB: &str = "outbox";

/// Summary of one dispatcher run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Events picked up.
    pub attempted: usize,
    /// Events delivered.
    pub delivered: usize,
    /// Events that failed and will be retried.
    pub failed: usize,
    /// Events that failed for the last time.
    pub dead_lettered: usize,
}

/// Delivers outbox events to collaborators.
pub struct OutboxDispatcher {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    availability: Arc<dyn Availability>,
    max_attempts: u32,
    batch_size: usize,
}

impl OutboxDispatcher {
    /// Create a dispatcher with 5 attempts per event and batches of 100.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
        availability: Arc<dyn Availability>,
    ) -> Self {
        Self {
            store,
            notifier,
            availability,
            max_attempts: 5,
            batch_size: 100,
        }
    }

    /// Override the retry and batch limits.
    #[must_use]
    pub fn with_limits(mut self, max_attempts: u32, batch_size: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.batch_size = batch_size.max(1);
        self
    }

    /// Deliver up to one batch of outstanding events, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or updated. Delivery
    /// failures are recorded on the events, not returned.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<DispatchReport> {
        let events = self.store.list_outstanding_events(self.batch_size)?;
        let mut report = DispatchReport::default();

        for mut event in events {
            report.attempted += 1;

            match self.deliver(&event.kind).await {
                Ok(()) => {
                    event.mark_delivered(now);
                    report.delivered += 1;
                    tracing::debug!(event_id = %event.id, booking_id = %event.kind.booking_id(), "Event delivered");
                }
                Err(e) => {
                    event.mark_failed(e.to_string(), self.max_attempts);
                    if event.dead_lettered {
                        report.dead_lettered += 1;
                        tracing::error!(
                            event_id = %event.id,
                            booking_id = %event.kind.booking_id(),
                            attempts = event.attempts,
                            error = %e,
                            "Event dead-lettered"
                        );
                    } else {
                        report.failed += 1;
                        tracing::warn!(
                            event_id = %event.id,
                            attempts = event.attempts,
                            error = %e,
                            "Event delivery failed, will retry"
                        );
                    }
                }
            }

            self.store.put_event(&event)?;
        }

        if report.attempted > 0 {
            tracing::info!(
                attempted = report.attempted,
                delivered = report.delivered,
                failed = report.failed,
                dead_lettered = report.dead_lettered,
                "Outbox run finished"
            );
        }
        Ok(report)
    }

    async fn deliver(&self, kind: &SettlementEventKind) -> CollaboratorResult<()> {
        match kind {
            SettlementEventKind::FundsHeld {
                booking_id,
                owner_id,
                amount,
            } => {
                self.notifier
                    .send(&Notification::to_user(
                        *owner_id,
                        "booking_funds_held",
                        json!({ "booking_id": booking_id, "amount": amount }),
                    ))
                    .await
            }
            SettlementEventKind::FundsReleased {
                booking_id,
                owner_id,
                amount,
            } => {
                self.notifier
                    .send(&Notification::to_user(
                        *owner_id,
                        "booking_funds_released",
                        json!({ "booking_id": booking_id, "amount": amount }),
                    ))
                    .await
            }
            SettlementEventKind::BookingRefunded {
                booking_id,
                property_id,
                guest_id,
                owner_id,
                refunded_amount,
                reason,
            } => {
                let data = json!({
                    "booking_id": booking_id,
                    "refunded_amount": refunded_amount,
                    "reason": reason,
                });
                self.close_booking(
                    *property_id,
                    *booking_id,
                    &[
                        Notification::to_user(*guest_id, "booking_refunded_guest", data.clone()),
                        Notification::to_user(*owner_id, "booking_refunded_owner", data),
                    ],
                )
                .await
            }
            SettlementEventKind::BookingAutoCancelled {
                booking_id,
                property_id,
                guest_id,
                owner_id,
                refunded_amount,
                reason,
            } => {
                let data = json!({
                    "booking_id": booking_id,
                    "refunded_amount": refunded_amount,
                    "reason": reason,
                });
                self.close_booking(
                    *property_id,
                    *booking_id,
                    &[
                        Notification::to_user(*guest_id, "booking_auto_cancelled_guest", data.clone()),
                        Notification::to_user(*owner_id, "booking_auto_cancelled_owner", data),
                    ],
                )
                .await
            }
            SettlementEventKind::ReconciliationRequired { booking_id, detail } => {
                self.notifier
                    .send(&Notification::to_operations(
                        "settlement_reconciliation_required",
                        json!({ "booking_id": booking_id, "detail": detail }),
                    ))
                    .await
            }
        }
    }

    /// Unblock a cancelled booking's dates and notify both parties.
    ///
    /// Every step is attempted even when another fails. The event fails if
    /// any step did; a retry repeats all of them.
    async fn close_booking(
        &self,
        property_id: PropertyId,
        booking_id: BookingId,
        notifications: &[Notification],
    ) -> CollaboratorResult<()> {
        let (unblocked, notified) = futures::future::join(
            self.availability
                .unblock_dates_for_booking(property_id, booking_id),
            futures::future::join_all(notifications.iter().map(|n| self.notifier.send(n))),
        )
        .await;

        let mut errors = std::iter::once(unblocked)
            .chain(notified)
            .filter_map(std::result::Result::err);
        let Some(first) = errors.next() else {
            return Ok(());
        };
        for e in errors {
            tracing::warn!(booking_id = %booking_id, error = %e, "Cancellation step failed");
        }
        Err(first)
    }
}
