//! Hourly cancellation of bookings nobody confirmed in time.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use staywallet_core::{Booking, Result};

use super::funds::{BookingFunds, CancellationActor};
use super::report::JobReport;
use crate::collaborators::ConfigProvider;

/// Job name used for leases and reports.
pub const AUTO_CANCEL_JOB: &str = "auto_cancel";

/// Configuration key holding the timeout in hours.
pub const AUTO_CANCEL_HOURS_KEY: &str = "booking_auto_cancel_hours";

/// Cancels and refunds unconfirmed short-stay bookings.
pub struct AutoCancelJob {
    funds: Arc<BookingFunds>,
    config: Arc<dyn ConfigProvider>,
    default_hours: u32,
}

impl AutoCancelJob {
    /// Create the job.
    ///
    /// `default_hours` applies when the configuration provider has no usable
    /// value.
    #[must_use]
    pub fn new(funds: Arc<BookingFunds>, config: Arc<dyn ConfigProvider>, default_hours: u32) -> Self {
        Self {
            funds,
            config,
            default_hours,
        }
    }

    /// Resolve the timeout: configuration provider, then the default.
    pub async fn timeout(&self) -> Duration {
        let fallback = Decimal::from(self.default_hours);
        let hours = match self.config.get_numeric_value(AUTO_CANCEL_HOURS_KEY).await {
            Ok(Some(hours)) if hours > Decimal::ZERO => hours,
            Ok(Some(hours)) => {
                tracing::warn!(value = %hours, "Ignoring non-positive auto-cancel timeout");
                fallback
            }
            Ok(None) => fallback,
            Err(e) => {
                tracing::warn!(error = %e, "Configuration provider unavailable, using default timeout");
                fallback
            }
        };

        (hours * Decimal::from(3600))
            .trunc()
            .to_i64()
            .and_then(Duration::try_seconds)
            .unwrap_or_else(|| Duration::hours(i64::from(self.default_hours)))
    }

    /// Cancel every candidate booking created before `now - timeout`.
    ///
    /// Candidates are shortlet and hotel bookings still `pending` or
    /// `in_progress` with a completed or partial payment. Each booking is
    /// handled by [`BookingFunds::refund_booking`]; failures are recorded and
    /// the run moves on.
    ///
    /// # Errors
    ///
    /// Returns an error only if the candidate scan fails.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<JobReport> {
        let timeout = self.timeout().await;
        let cutoff = now - timeout;

        let candidates = self
            .funds
            .ledger()
            .store()
            .scan_bookings(&|booking: &Booking| booking.is_auto_cancel_candidate(cutoff))?;

        tracing::info!(
            cutoff = %cutoff,
            timeout_hours = timeout.num_hours(),
            count = candidates.len(),
            "Auto-cancelling unconfirmed bookings"
        );
        let mut report = JobReport::new(AUTO_CANCEL_JOB, candidates.len());
        let reason = format!(
            "Automatically cancelled: not confirmed within {} hours",
            timeout.num_hours()
        );

        for booking in candidates {
            match self
                .funds
                .refund_booking(booking.id, &reason, CancellationActor::System)
                .await
            {
                Ok(outcome) if outcome.needs_reconciliation() => {
                    report.record_reconciliation(booking.id, outcome.failures.join("; "));
                }
                Ok(_) => report.record_success(),
                Err(e) => report.record_failure(booking.id, e),
            }
        }

        report.log();
        Ok(report)
    }
}
