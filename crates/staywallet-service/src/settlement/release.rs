//! Daily release of held booking funds.

use std::sync::Arc;

use chrono::NaiveDate;

use staywallet_core::{Booking, Result};

use super::report::JobReport;
use crate::ledger::WalletLedger;

/// Job name used for leases and reports.
pub const RELEASE_JOB: &str = "release";

/// Pays out holds whose check-in date has arrived.
pub struct ReleaseJob {
    ledger: Arc<WalletLedger>,
}

impl ReleaseJob {
    /// Create over a ledger.
    #[must_use]
    pub fn new(ledger: Arc<WalletLedger>) -> Self {
        Self { ledger }
    }

    /// Release every fully paid booking with `check_in_date <= today` whose
    /// funds are still pending.
    ///
    /// Bookings are processed one at a time; a failure is recorded and the run
    /// moves on.
    ///
    /// # Errors
    ///
    /// Returns an error only if the candidate scan fails.
    pub async fn run(&self, today: NaiveDate) -> Result<JobReport> {
        let due = self
            .ledger
            .store()
            .scan_bookings(&|booking: &Booking| booking.is_due_for_release(today))?;

        tracing::info!(today = %today, count = due.len(), "Releasing pending booking funds");
        let mut report = JobReport::new(RELEASE_JOB, due.len());

        for booking in due {
            match self.ledger.release_pending(booking.id).await {
                Ok(_) => report.record_success(),
                Err(e) => report.record_failure(booking.id, e),
            }
        }

        report.log();
        Ok(report)
    }
}
